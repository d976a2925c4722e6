//! CSS content processing: fingerprinting, scoping and the lightningcss
//! pipeline (nesting flattening and vendor prefixing)

use crate::error::{CompilerError, Result};
use crate::types::VariantTable;
use crate::utils::fingerprint;
use crate::{BrowserTargets, CompilerOptions};
use lightningcss::error::PrinterError;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Features, Targets};
use std::collections::HashMap;
use std::fmt::Write;

/// Stand-in class used while fingerprinting a variant table
const VARIANT_PLACEHOLDER: &str = "__stylec_variant__";

/// How raw CSS text is wrapped before the pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssScope {
    /// `.<prefix>-<fp> { ... }`
    Class,
    /// `@keyframes <prefix>-<fp> { ... }`
    Keyframes,
    /// Emitted as written
    Global,
}

/// Identifies the declaration CSS came from, for error reporting
#[derive(Debug, Clone, Copy)]
pub struct CssOrigin<'a> {
    pub file: &'a str,
    pub name: &'a str,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedCss {
    pub fingerprint: String,
    pub class_name: String,
    pub css: String,
}

pub struct CssProcessor {
    prefix: String,
    targets: Targets,
    minify: bool,
}

/// Lowers nesting and nothing else
fn flatten_targets() -> Targets {
    Targets {
        browsers: None,
        include: Features::Nesting,
        exclude: Features::VendorPrefixes,
    }
}

impl CssProcessor {
    pub fn new(options: &CompilerOptions) -> Result<Self> {
        Ok(Self {
            prefix: options.class_prefix.clone(),
            targets: resolve_targets(&options.targets)?,
            minify: options.minify,
        })
    }

    pub fn class_name(&self, fingerprint: &str) -> String {
        format!("{}-{}", self.prefix, fingerprint)
    }

    /// Fingerprints the unwrapped text, scopes it and runs the pipeline
    pub fn process(&self, raw: &str, scope: CssScope, origin: CssOrigin<'_>) -> Result<ProcessedCss> {
        check_braces(raw, origin)?;
        let fingerprint = fingerprint(raw);
        let class_name = self.class_name(&fingerprint);
        let wrapped = match scope {
            CssScope::Class => format!(".{} {{ {} }}", class_name, raw),
            CssScope::Keyframes => format!("@keyframes {} {{ {} }}", class_name, raw),
            CssScope::Global => raw.to_string(),
        };
        let css = self.transform(&wrapped, origin)?;
        Ok(ProcessedCss {
            fingerprint,
            class_name,
            css,
        })
    }

    /// Base, modifier and compound rules of a variant table. The fingerprint
    /// covers the whole table so identical tables share a class.
    pub fn process_variant_table(&self, table: &VariantTable, origin: CssOrigin<'_>) -> Result<ProcessedCss> {
        let pieces = table
            .base
            .iter()
            .chain(table.variants.iter().flat_map(|group| group.values.iter().map(|(_, css)| css)))
            .chain(table.compound_variants.iter().map(|rule| &rule.css));
        for css in pieces {
            check_braces(css, origin)?;
        }

        let fingerprint = fingerprint(&variant_table_css(table, VARIANT_PLACEHOLDER));
        let class_name = self.class_name(&fingerprint);
        let css = self.transform(&variant_table_css(table, &class_name), origin)?;
        Ok(ProcessedCss {
            fingerprint,
            class_name,
            css,
        })
    }

    /// Parses, lowers nesting, prefixes and prints one stylesheet.
    ///
    /// Without `minify`, every declaration is kept as written and in order:
    /// the prefixed output is only used when it still contains the flattened
    /// declarations as a subsequence of each rule, since lightningcss's
    /// minifier merges fallbacks such as `width: 100%; width: -webkit-fill-available`.
    pub fn transform(&self, css: &str, origin: CssOrigin<'_>) -> Result<String> {
        let css_error = |message: String| CompilerError::css(origin.file, origin.name, origin.offset, message);

        let parse = || {
            let parser_options = ParserOptions {
                filename: origin.file.to_string(),
                ..ParserOptions::default()
            };
            StyleSheet::parse(css, parser_options).map_err(|e| css_error(format!("parse error: {}", e)))
        };
        let print = |stylesheet: &StyleSheet, minify: bool, targets: Targets| {
            print_stylesheet(stylesheet, minify, targets).map_err(|e| css_error(format!("print error: {}", e)))
        };
        let minified = |minify: bool| -> Result<String> {
            let mut stylesheet = parse()?;
            stylesheet
                .minify(MinifyOptions {
                    targets: self.targets.clone(),
                    ..MinifyOptions::default()
                })
                .map_err(|e| css_error(format!("transform error: {}", e)))?;
            print(&stylesheet, minify, self.targets.clone())
        };

        if self.minify {
            return minified(true);
        }

        let flattened = print(&parse()?, false, flatten_targets())?;
        if self.targets.browsers.is_none() {
            return Ok(flattened);
        }

        let prefixed = minified(false)?;
        match missing_declaration(&flattened, &prefixed) {
            None => Ok(prefixed),
            Some(declaration) => {
                log::debug!(
                    "{}: '{}' prefixing would drop or reorder `{}`; emitting unprefixed CSS",
                    origin.file,
                    origin.name,
                    declaration
                );
                Ok(flattened)
            }
        }
    }
}

fn print_stylesheet(stylesheet: &StyleSheet, minify: bool, targets: Targets) -> std::result::Result<String, PrinterError> {
    let printed = stylesheet.to_css(PrinterOptions {
        minify,
        targets,
        ..PrinterOptions::default()
    })?;
    Ok(printed.code)
}

/// Rejects CSS whose braces would close the generated wrapper rule or leave
/// it open. Strings, comments and escapes are skipped.
fn check_braces(raw: &str, origin: CssOrigin<'_>) -> Result<()> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => match raw[i + 2..].find("*/") {
                Some(end) => i += end + 3,
                None => break,
            },
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    return Err(CompilerError::css(
                        origin.file,
                        origin.name,
                        origin.offset,
                        format!("unbalanced '}}' at offset {} of the style text", i),
                    ));
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }

    if depth != 0 {
        return Err(CompilerError::css(
            origin.file,
            origin.name,
            origin.offset,
            format!("{} unclosed '{{' in the style text", depth),
        ));
    }
    Ok(())
}

/// Declarations of printed, non-minified CSS grouped by their enclosing rule
/// headers, in source order
fn declarations_by_rule(printed: &str) -> HashMap<String, Vec<&str>> {
    let mut rules: HashMap<String, Vec<&str>> = HashMap::new();
    let mut headers: Vec<&str> = Vec::new();
    for line in printed.lines().map(str::trim) {
        if let Some(header) = line.strip_suffix('{') {
            headers.push(header.trim_end());
        } else if line == "}" {
            headers.pop();
        } else if line.ends_with(';') {
            rules.entry(headers.join(" > ")).or_default().push(line);
        }
    }
    rules
}

/// First declaration of `expected` that `actual` drops or moves
fn missing_declaration<'e>(expected: &'e str, actual: &str) -> Option<&'e str> {
    let actual = declarations_by_rule(actual);
    for (rule, declarations) in declarations_by_rule(expected) {
        let mut remaining = actual.get(&rule).map(Vec::as_slice).unwrap_or_default().iter();
        for declaration in declarations {
            if !remaining.any(|found| *found == declaration) {
                return Some(declaration);
            }
        }
    }
    None
}

/// Nesting is always lowered; prefixing follows the configured browsers
fn resolve_targets(targets: &BrowserTargets) -> Result<Targets> {
    match targets {
        BrowserTargets::Disabled => Ok(Targets {
            browsers: None,
            include: Features::Nesting,
            exclude: Features::VendorPrefixes,
        }),
        BrowserTargets::Queries(queries) => {
            let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
                .map_err(|e| CompilerError::config(format!("Invalid browser targets {:?}: {}", queries, e)))?;
            Ok(Targets {
                browsers,
                include: Features::Nesting,
                exclude: Features::empty(),
            })
        }
    }
}

/// Unprocessed stylesheet for a variant table with `class` as the base class
pub fn variant_table_css(table: &VariantTable, class: &str) -> String {
    let mut out = String::new();

    if let Some(base) = &table.base {
        let _ = writeln!(out, ".{} {{ {} }}", class, base);
    }
    for group in &table.variants {
        for (value, css) in &group.values {
            let _ = writeln!(out, ".{}--{}-{} {{ {} }}", class, group.name, value, css);
        }
    }
    for rule in &table.compound_variants {
        let reachable = rule.conditions.iter().all(|(variant, value)| {
            !value.is_empty() && table.group(variant).is_some()
        });
        if !reachable {
            log::debug!("Compound variant {:?} can never match; skipped", rule.conditions);
            continue;
        }
        let mut selector = format!(".{}", class);
        for (variant, value) in &rule.conditions {
            let _ = write!(selector, ".{}--{}-{}", class, variant, value);
        }
        let _ = writeln!(out, "{} {{ {} }}", selector, rule.css);
    }

    out
}
