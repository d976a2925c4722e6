//! Source rewriting and CSS unit emission
//!
//! Replacements are computed against original offsets and spliced in a
//! single forward pass, so no replacement can shift a later one.

use crate::css_processor::{CssOrigin, CssProcessor, CssScope, ProcessedCss};
use crate::error::Result;
use crate::position_map::PositionMap;
use crate::types::{
    ClassifiedConstruct, ComponentRef, ConstructKind, EmittedCssUnit, VariantHelper,
    VariantTable, DEFAULT_COMPONENT_TAG, VIRTUAL_UNIT_PREFIX,
};
use crate::utils::js_string;
use crate::{CompilerOptions, CssOutputMode};
use serde::Serialize;
use std::collections::BTreeSet;

/// Runtime functions rewritten code may import
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RuntimeHelper {
    Styled,
    Extend,
    Global,
    Variants,
    VariantClass,
    Polymorphic,
}

impl RuntimeHelper {
    pub const ALL: [RuntimeHelper; 6] = [
        Self::Styled,
        Self::Extend,
        Self::Global,
        Self::Variants,
        Self::VariantClass,
        Self::Polymorphic,
    ];

    pub fn import_name(self) -> &'static str {
        match self {
            Self::Styled => "__styled",
            Self::Extend => "__extend",
            Self::Global => "__global",
            Self::Variants => "__variants",
            Self::VariantClass => "__variantClass",
            Self::Polymorphic => "__polymorphic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RewriteOutput {
    pub code: String,
    pub position_map: PositionMap,
    pub css_units: Vec<EmittedCssUnit>,
    pub runtime_helpers: Vec<RuntimeHelper>,
}

/// Generated code and CSS for one construct
struct Replacement {
    code: String,
    css: Option<String>,
    helper: Option<RuntimeHelper>,
}

pub struct Rewriter<'a> {
    options: &'a CompilerOptions,
    processor: &'a CssProcessor,
    file: &'a str,
    file_hash: &'a str,
    file_stem: String,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        options: &'a CompilerOptions,
        processor: &'a CssProcessor,
        file: &'a str,
        file_hash: &'a str,
    ) -> Self {
        let file_stem = std::path::Path::new(file)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "styles".to_string());
        Self {
            options,
            processor,
            file,
            file_hash,
            file_stem,
        }
    }

    pub fn unit_key(&self, ordinal: usize) -> String {
        format!("{}-{}.css", self.file_hash, ordinal)
    }

    pub fn unit_specifier(&self, key: &str) -> String {
        match self.options.css_output {
            CssOutputMode::Virtual => format!("{}{}", VIRTUAL_UNIT_PREFIX, key),
            CssOutputMode::Physical => format!("./{}.{}", self.file_stem, key),
        }
    }

    /// Rewrites `source`, replacing every construct in source order. The
    /// prelude goes right after `prologue_end`, the end of any hashbang line
    /// and directive prologue, which must stay first in the module.
    pub fn rewrite(
        &self,
        source: &str,
        prologue_end: usize,
        constructs: &[ClassifiedConstruct],
    ) -> Result<RewriteOutput> {
        let mut ordered: Vec<&ClassifiedConstruct> = constructs.iter().collect();
        ordered.sort_by_key(|construct| construct.span.start);

        let mut css_units = Vec::new();
        let mut helpers = BTreeSet::new();
        let mut pieces: Vec<(&ClassifiedConstruct, String)> = Vec::with_capacity(ordered.len());
        let mut last_end = prologue_end;

        for construct in ordered {
            if construct.span.start < last_end {
                log::warn!(
                    "{}: construct '{}' overlaps a previous one; left untouched",
                    self.file,
                    construct.name
                );
                continue;
            }
            last_end = construct.span.end;

            let replacement = self.replacement(construct)?;
            if let Some(css) = replacement.css {
                let index = css_units.len();
                let key = self.unit_key(index);
                css_units.push(EmittedCssUnit {
                    import_specifier: self.unit_specifier(&key),
                    key,
                    file_hash: self.file_hash.to_string(),
                    index,
                    css,
                    declaration: construct.name.clone(),
                });
            }
            if let Some(helper) = replacement.helper {
                helpers.insert(helper);
            }
            pieces.push((construct, replacement.code));
        }

        let mut prelude = self.prelude(&css_units, &helpers);
        if prologue_end > 0 && !prelude.is_empty() {
            // the prologue's own line break stays after the prelude
            prelude.pop();
            prelude.insert(0, '\n');
        }
        let mut code = String::with_capacity(prelude.len() + source.len());
        let mut position_map = PositionMap::new();
        code.push_str(&source[..prologue_end]);
        position_map.push_copied(0..prologue_end);
        code.push_str(&prelude);
        position_map.push_inserted(prelude.len());

        let mut cursor = prologue_end;
        for (construct, replacement) in &pieces {
            code.push_str(&source[cursor..construct.span.start]);
            position_map.push_copied(cursor..construct.span.start);
            code.push_str(replacement);
            position_map.push_replaced(replacement.len(), construct.span.start..construct.span.end);
            cursor = construct.span.end;
        }
        code.push_str(&source[cursor..]);
        position_map.push_copied(cursor..source.len());

        Ok(RewriteOutput {
            code,
            position_map,
            css_units,
            runtime_helpers: helpers.into_iter().collect(),
        })
    }

    /// CSS unit imports first, then one combined runtime import
    fn prelude(&self, css_units: &[EmittedCssUnit], helpers: &BTreeSet<RuntimeHelper>) -> String {
        let mut prelude = String::new();
        for unit in css_units {
            prelude.push_str(&format!("import {};\n", js_string(&unit.import_specifier)));
        }
        if !helpers.is_empty() {
            let names: Vec<&str> = helpers.iter().map(|helper| helper.import_name()).collect();
            prelude.push_str(&format!(
                "import {{ {} }} from {};\n",
                names.join(", "),
                js_string(&self.options.runtime_module)
            ));
        }
        prelude
    }

    fn origin<'c>(&'c self, construct: &'c ClassifiedConstruct) -> CssOrigin<'c> {
        CssOrigin {
            file: self.file,
            name: &construct.name,
            offset: construct.span.start,
        }
    }

    fn process(&self, construct: &ClassifiedConstruct, raw: &str, scope: CssScope) -> Result<ProcessedCss> {
        self.processor.process(raw, scope, self.origin(construct))
    }

    fn replacement(&self, construct: &ClassifiedConstruct) -> Result<Replacement> {
        let replacement = match &construct.kind {
            ConstructKind::ElementStyle { tag, css } => {
                let processed = self.process(construct, &css.text, CssScope::Class)?;
                let mut args = vec![js_string(tag), js_string(&processed.class_name)];
                if self.options.dev_mode {
                    args.push("null".to_string());
                }
                self.runtime_call(construct, RuntimeHelper::Styled, args, Some(processed.css))
            }
            ConstructKind::ElementWithDefaults { tag, attrs, css } => {
                let processed = self.process(construct, &css.text, CssScope::Class)?;
                let args = vec![js_string(tag), js_string(&processed.class_name), attrs.clone()];
                self.runtime_call(construct, RuntimeHelper::Styled, args, Some(processed.css))
            }
            ConstructKind::ExtensionStyle { base, css } => {
                let processed = self.process(construct, &css.text, CssScope::Class)?;
                let args = vec![base.clone(), js_string(&processed.class_name)];
                self.runtime_call(construct, RuntimeHelper::Extend, args, Some(processed.css))
            }
            ConstructKind::UtilityStyle { css } => {
                let processed = self.process(construct, &css.text, CssScope::Class)?;
                Replacement {
                    code: js_string(&processed.class_name),
                    css: Some(processed.css),
                    helper: None,
                }
            }
            ConstructKind::Keyframes { css } => {
                let processed = self.process(construct, &css.text, CssScope::Keyframes)?;
                Replacement {
                    code: js_string(&processed.class_name),
                    css: Some(processed.css),
                    helper: None,
                }
            }
            ConstructKind::GlobalStyle { css } => {
                let processed = self.process(construct, &css.text, CssScope::Global)?;
                self.runtime_call(construct, RuntimeHelper::Global, Vec::new(), Some(processed.css))
            }
            ConstructKind::Variants { helper, table } => {
                let processed = self
                    .processor
                    .process_variant_table(table, self.origin(construct))?;
                let mut args = Vec::new();
                let runtime_helper = match helper {
                    VariantHelper::Component => {
                        args.push(component_expression(table));
                        RuntimeHelper::Variants
                    }
                    VariantHelper::ClassName => RuntimeHelper::VariantClass,
                };
                args.push(js_string(&processed.class_name));
                args.push(variant_keys_expression(table));
                args.push(defaults_expression(table));
                self.runtime_call(construct, runtime_helper, args, Some(processed.css))
            }
            ConstructKind::Polymorphic { target, component } => {
                let args = vec![target.clone(), component.clone()];
                self.runtime_call(construct, RuntimeHelper::Polymorphic, args, None)
            }
        };
        Ok(replacement)
    }

    /// `helper(args..., "Name"?)`; the name is only passed in dev mode
    fn runtime_call(
        &self,
        construct: &ClassifiedConstruct,
        helper: RuntimeHelper,
        mut args: Vec<String>,
        css: Option<String>,
    ) -> Replacement {
        if self.options.dev_mode {
            args.push(js_string(&construct.name));
        }
        Replacement {
            code: format!("{}({})", helper.import_name(), args.join(", ")),
            css,
            helper: Some(helper),
        }
    }
}

fn component_expression(table: &VariantTable) -> String {
    match &table.component {
        Some(ComponentRef::Tag(tag)) => js_string(tag),
        Some(ComponentRef::Identifier(name)) => name.clone(),
        None => js_string(DEFAULT_COMPONENT_TAG),
    }
}

fn variant_keys_expression(table: &VariantTable) -> String {
    let keys: Vec<String> = table.variant_keys().into_iter().map(js_string).collect();
    format!("[{}]", keys.join(", "))
}

fn defaults_expression(table: &VariantTable) -> String {
    if table.default_variants.is_empty() {
        return "{}".to_string();
    }
    let entries: Vec<String> = table
        .default_variants
        .iter()
        .map(|(name, value)| format!("{}: {}", js_string(name), js_string(value)))
        .collect();
    format!("{{ {} }}", entries.join(", "))
}
