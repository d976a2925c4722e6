//! Stylec: compile-time style extraction
//!
//! Scans component source files for declarations made with the styling
//! library (`styled`, `css`, `createGlobalStyle`, `keyframes`,
//! `styleVariants`, `cssVariants`, `polymorphic`, ...), computes the CSS each
//! one produces, emits that CSS as addressable units and rewrites the source
//! to call a minimal runtime instead.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use stylec::{compile_source, Result};
//!
//! fn main() -> Result<()> {
//!     let source = "import { styled } from 'stylec';\nconst Button = styled.button`padding: 1rem;`;\n";
//!     if let Some(output) = compile_source(source, "src/Button.tsx")? {
//!         for unit in &output.css_units {
//!             println!("{}: {}", unit.key, unit.css);
//!         }
//!         println!("{}", output.code);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Phase 1**: Parse - Build a syntax tree with tree-sitter
//! 2. **Phase 2**: Import Resolver - Find the library's local bindings
//! 3. **Phase 3**: Construct Classifier - Match declarations (and variant tables)
//! 4. **Phase 4**: CSS Processor - Fingerprint, scope, flatten and prefix
//! 5. **Phase 5**: Rewriter - Splice runtime calls and emit CSS units
//!
//! A file that cannot be parsed, or that has no recognized constructs,
//! compiles to `None` and should be left untouched by the host.

pub mod types;
pub mod error;
pub mod utils;
pub mod parser;

pub mod import_resolver;
pub mod classifier;
pub mod variant_parser;
pub mod css_processor;
pub mod rewriter;
pub mod position_map;
pub mod session;
pub mod runtime;
pub mod cli;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

// Re-export commonly used types and functions
pub use error::{CompilerError, Result};
pub use types::*;
pub use utils::{fingerprint, file_hash, is_valid_css_identifier};

pub use parser::{SourceLanguage, SourceParser};
pub use import_resolver::ImportResolver;
pub use classifier::ConstructClassifier;
pub use variant_parser::VariantTableParser;
pub use css_processor::{CssProcessor, CssScope, ProcessedCss};
pub use rewriter::{RewriteOutput, Rewriter, RuntimeHelper};
pub use position_map::{PositionMap, Segment, SegmentKind};
pub use session::CompilationSession;
pub use cli::EnhancedCli;

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Browsers vendor prefixes are generated for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserTargets {
    /// No prefixing; nesting is still flattened
    Disabled,
    /// browserslist queries, e.g. `["defaults", "safari 12"]`
    Queries(Vec<String>),
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self::Queries(vec!["defaults".to_string()])
    }
}

/// How emitted CSS units are exposed to the host build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssOutputMode {
    /// Host-managed resources imported as `virtual:stylec/<key>`
    #[default]
    Virtual,
    /// Files written next to the output, imported as `./<stem>.<key>`
    Physical,
}

/// Compilation options and settings
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerOptions {
    /// Class-name prefix, `<prefix>-<fingerprint>`
    pub class_prefix: String,

    /// Vendor prefixing targets
    pub targets: BrowserTargets,

    /// Log every pipeline phase
    pub verbose: bool,

    /// Virtual or physical CSS units
    pub css_output: CssOutputMode,

    /// Pass declared names to the runtime for diagnostics
    pub dev_mode: bool,

    /// Minify emitted CSS
    pub minify: bool,

    /// Module specifiers recognized as the styling library
    pub module_sources: Vec<String>,

    /// Module rewritten code imports runtime helpers from
    pub runtime_module: String,

    /// Project root; file paths are made relative to it before hashing so
    /// unit keys do not depend on the checkout location
    pub root: Option<PathBuf>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            class_prefix: DEFAULT_CLASS_PREFIX.to_string(),
            targets: BrowserTargets::default(),
            verbose: false,
            css_output: CssOutputMode::default(),
            dev_mode: false,
            minify: false,
            module_sources: DEFAULT_MODULE_SOURCES.iter().map(|s| s.to_string()).collect(),
            runtime_module: DEFAULT_RUNTIME_MODULE.to_string(),
            root: None,
        }
    }
}

impl CompilerOptions {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_css_identifier(&self.class_prefix) {
            return Err(CompilerError::config(format!(
                "Class prefix '{}' is not a valid CSS identifier",
                self.class_prefix
            )));
        }
        if self.module_sources.iter().all(|source| source.trim().is_empty()) {
            return Err(CompilerError::config("At least one module source is required"));
        }
        if self.runtime_module.trim().is_empty() {
            return Err(CompilerError::config("Runtime module must not be empty"));
        }
        if let BrowserTargets::Queries(queries) = &self.targets {
            if queries.is_empty() {
                return Err(CompilerError::config(
                    "Browser targets are empty; disable prefixing explicitly instead",
                ));
            }
        }
        Ok(())
    }
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationStats {
    /// Original source size in bytes
    pub source_size: usize,

    /// Rewritten source size in bytes
    pub output_size: usize,

    /// Number of classified constructs
    pub construct_count: usize,

    /// Number of emitted CSS units
    pub css_unit_count: usize,

    /// Total bytes of emitted CSS
    pub css_size: usize,

    /// Number of runtime helpers imported
    pub runtime_helper_count: usize,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Result of compiling one file that contained recognized constructs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    /// Path as given to the compiler
    pub file: String,
    pub file_hash: String,
    /// Rewritten source
    pub code: String,
    pub position_map: PositionMap,
    pub css_units: Vec<EmittedCssUnit>,
    pub runtime_helpers: Vec<RuntimeHelper>,
    pub stats: CompilationStats,
}

impl CompileOutput {
    /// V3 source map from the rewritten code back to `original`
    pub fn source_map_json(&self, original: &str) -> Result<String> {
        self.position_map
            .to_source_map_json(&self.code, original, &self.file)
    }
}

/// Bindings and constructs found in one file
#[derive(Debug, Clone, Serialize)]
pub struct SourceAnalysis {
    pub bindings: ImportBindings,
    pub constructs: Vec<ClassifiedConstruct>,
    /// End of the hashbang line and directive prologue, 0 when absent
    pub prologue_end: usize,
}

/// Per-file hash of `filename`, relative to `root` when given
pub fn unit_file_hash(filename: &str, root: Option<&Path>) -> String {
    file_hash(&utils::relativize_path(filename, root))
}

/// Runs phases 1-3. `None` when the file cannot be parsed or does not
/// use the styling library.
pub fn analyze_source(
    source: &str,
    filename: &str,
    options: &CompilerOptions,
) -> Result<Option<SourceAnalysis>> {
    // Cheap pre-check: every recognized import names one of the sources
    if !options
        .module_sources
        .iter()
        .any(|module| source.contains(module.as_str()))
    {
        if options.verbose {
            log::debug!("{}: no styling library import, skipped", filename);
        }
        return Ok(None);
    }

    // Phase 1: Parse
    if options.verbose {
        log::debug!("Phase 1: Parsing {} ({} bytes)...", filename, source.len());
    }

    let mut parser = SourceParser::for_path(filename)?;
    let Some(tree) = parser.parse(source) else {
        log::warn!("{}: source could not be parsed; leaving it untouched", filename);
        return Ok(None);
    };
    let root = tree.root_node();

    // Phase 2: Resolve imports
    if options.verbose {
        log::debug!("Phase 2: Resolving library imports...");
    }

    let bindings = ImportResolver::new(&options.module_sources).resolve(root, source);
    if bindings.is_empty() {
        if options.verbose {
            log::debug!("Phase 2 complete. No bindings found");
        }
        return Ok(None);
    }

    if options.verbose {
        log::debug!(
            "Phase 2 complete. {} bindings from '{}'",
            bindings.len(),
            bindings.source.as_deref().unwrap_or_default()
        );
    }

    // Phase 3: Classify declarations
    if options.verbose {
        log::debug!("Phase 3: Classifying declarations...");
    }

    let constructs = ConstructClassifier::new(&bindings).classify(root, source);

    if options.verbose {
        log::debug!("Phase 3 complete. Constructs: {}", constructs.len());
        for construct in &constructs {
            log::debug!("  {} '{}' at {}..{}", construct.kind.label(), construct.name, construct.span.start, construct.span.end);
        }
    }

    if constructs.is_empty() {
        return Ok(None);
    }

    Ok(Some(SourceAnalysis {
        bindings,
        constructs,
        prologue_end: parser::prologue_end(root),
    }))
}

/// Compile with default options
pub fn compile_source(source: &str, filename: &str) -> Result<Option<CompileOutput>> {
    compile_source_with_options(source, filename, &CompilerOptions::default())
}

/// Compile with custom options
pub fn compile_source_with_options(
    source: &str,
    filename: &str,
    options: &CompilerOptions,
) -> Result<Option<CompileOutput>> {
    let start_time = Instant::now();
    options.validate()?;

    if options.verbose {
        log::debug!("Starting compilation pipeline for {}", filename);
        log::debug!("Compiler options: {:?}", options);
    }

    let Some(analysis) = analyze_source(source, filename, options)? else {
        return Ok(None);
    };

    // Phase 4: CSS pipeline setup
    if options.verbose {
        log::debug!("Phase 4: Preparing CSS pipeline (targets: {:?})...", options.targets);
    }

    let processor = CssProcessor::new(options)?;
    let file_hash = unit_file_hash(filename, options.root.as_deref());

    // Phase 5: Rewrite
    if options.verbose {
        log::debug!("Phase 5: Rewriting source (file hash {})...", file_hash);
    }

    let rewriter = Rewriter::new(options, &processor, filename, &file_hash);
    let rewritten = rewriter.rewrite(source, analysis.prologue_end, &analysis.constructs)?;

    let stats = CompilationStats {
        source_size: source.len(),
        output_size: rewritten.code.len(),
        construct_count: analysis.constructs.len(),
        css_unit_count: rewritten.css_units.len(),
        css_size: rewritten.css_units.iter().map(|unit| unit.css.len()).sum(),
        runtime_helper_count: rewritten.runtime_helpers.len(),
        compile_time_ms: start_time.elapsed().as_millis() as u64,
    };

    if options.verbose {
        log::info!(
            "Compiled {}: {} constructs, {} CSS units, {}ms",
            filename,
            stats.construct_count,
            stats.css_unit_count,
            stats.compile_time_ms
        );
        log::debug!("Full stats: {:?}", stats);
    }

    Ok(Some(CompileOutput {
        file: filename.to_string(),
        file_hash,
        code: rewritten.code,
        position_map: rewritten.position_map,
        css_units: rewritten.css_units,
        runtime_helpers: rewritten.runtime_helpers,
        stats,
    }))
}

/// Reads and compiles one file with default options
pub fn compile_file(input_path: &str) -> Result<Option<CompileOutput>> {
    compile_file_with_options(input_path, &CompilerOptions::default())
}

pub fn compile_file_with_options(
    input_path: &str,
    options: &CompilerOptions,
) -> Result<Option<CompileOutput>> {
    let source = std::fs::read_to_string(input_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", input_path, e),
    })?;
    compile_source_with_options(&source, input_path, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn options() -> CompilerOptions {
        CompilerOptions {
            targets: BrowserTargets::Disabled,
            ..CompilerOptions::default()
        }
    }

    fn squash(css: &str) -> String {
        css.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_button_scenario() {
        let source = "import { styled } from 'stylec';\nconst Button = styled.button`padding: 1rem;`;\n";
        let output = compile_source_with_options(source, "src/Button.tsx", &options())
            .unwrap()
            .unwrap();

        let fp = fingerprint("padding: 1rem;");
        assert_eq!(output.css_units.len(), 1);
        assert_eq!(squash(&output.css_units[0].css), format!(".ss-{} {{ padding: 1rem; }}", fp));
        assert_eq!(output.runtime_helpers, vec![RuntimeHelper::Styled]);
        assert!(output
            .code
            .contains("import { __styled } from \"stylec/runtime\";\n"));
        assert!(output
            .code
            .contains(&format!("const Button = __styled(\"button\", \"ss-{}\");", fp)));
        assert!(output.code.contains("import { styled } from 'stylec';"));
        assert_eq!(output.stats.construct_count, 1);
    }

    #[test]
    fn test_use_client_directive_stays_first() {
        let source = "'use client';\nimport { styled } from 'stylec';\nexport const Card = styled.section`padding: 8px;`;\n";
        let output = compile_source_with_options(source, "src/Card.tsx", &options())
            .unwrap()
            .unwrap();

        assert!(output.code.starts_with("'use client';\nimport \"virtual:stylec/"));
        assert_eq!(output.position_map.original_offset(0), Some(0));
        assert!(output.source_map_json(source).is_ok());
    }

    #[test]
    fn test_same_css_in_two_files() {
        let source = "import { css } from 'stylec';\nexport const red = css`color: red;`;\n";
        let a = compile_source_with_options(source, "src/a.ts", &options()).unwrap().unwrap();
        let b = compile_source_with_options(source, "src/b.ts", &options()).unwrap().unwrap();

        let class = format!("\"ss-{}\"", fingerprint("color: red;"));
        assert!(a.code.contains(&class));
        assert!(b.code.contains(&class));
        assert_ne!(a.css_units[0].key, b.css_units[0].key);
        assert_eq!(a.css_units[0].css, b.css_units[0].css);
    }

    #[test]
    fn test_no_op_and_parse_failure_return_none() {
        let plain = "const x = 1;\n";
        assert!(compile_source_with_options(plain, "a.ts", &options()).unwrap().is_none());

        let unused = "import { styled } from 'stylec';\nconst x = 1;\n";
        assert!(compile_source_with_options(unused, "a.ts", &options()).unwrap().is_none());

        let broken = "import { styled } from 'stylec';\nconst A = styled.div`color: red;`\nconst = = ;\n";
        assert!(compile_source_with_options(broken, "a.ts", &options()).unwrap().is_none());
    }

    #[test]
    fn test_local_css_helper_is_left_alone() {
        let source = "import { styled } from 'stylec';\nconst css = (x) => x.toUpperCase();\nconst y = css`color: red;`;\n";
        assert!(compile_source_with_options(source, "a.js", &options()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_css_fails_the_file() {
        let source = "import { createGlobalStyle } from 'stylec';\nconst Reset = createGlobalStyle`..broken { color: red; }`;\n";
        let err = compile_source_with_options(source, "src/reset.ts", &options()).unwrap_err();
        assert!(err.is_fatal());
        let message = err.to_string();
        assert!(message.contains("src/reset.ts"));
        assert!(message.contains("Reset"));
        assert!(message.contains(&format!("byte {}", source.find("createGlobalStyle`").unwrap())));
    }

    #[test]
    fn test_invalid_prefix_is_rejected() {
        let options = CompilerOptions {
            class_prefix: "1bad prefix".to_string(),
            ..options()
        };
        let result = compile_source_with_options("", "a.ts", &options);
        assert!(matches!(result, Err(CompilerError::Config { .. })));
    }

    #[test]
    fn test_root_makes_file_hash_location_independent() {
        let a = unit_file_hash("/home/a/project/src/x.ts", Some(Path::new("/home/a/project")));
        let b = unit_file_hash("/srv/b/project/src/x.ts", Some(Path::new("/srv/b/project")));
        assert_eq!(a, b);
        assert_ne!(a, unit_file_hash("/srv/b/project/src/y.ts", Some(Path::new("/srv/b/project"))));
    }

    #[test]
    fn test_source_map_for_compiled_file() {
        let source = "import { css } from 'stylec';\nconst a = css`color: red;`;\nexport default a;\n";
        let output = compile_source_with_options(source, "a.ts", &options()).unwrap().unwrap();
        let json = output.source_map_json(source).unwrap();
        assert!(json.contains("\"version\":3"));
        assert!(json.contains("a.ts"));
    }

    #[test]
    fn test_compile_file_reads_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let input_path = temp_dir.path().join("Card.tsx");
        fs::write(
            &input_path,
            "import { styled, keyframes } from 'stylec';\n\
             const fade = keyframes`from { opacity: 0; } to { opacity: 1; }`;\n\
             export const Card = styled.section`border: 1px solid;`;\n",
        )
        .unwrap();

        let output = compile_file_with_options(input_path.to_str().unwrap(), &options())
            .unwrap()
            .unwrap();
        assert_eq!(output.css_units.len(), 2);
        assert!(output.css_units[0].css.contains("@keyframes"));
        assert_eq!(output.css_units[1].index, 1);

        let missing = temp_dir.path().join("missing.tsx");
        assert!(matches!(
            compile_file(missing.to_str().unwrap()),
            Err(CompilerError::FileNotFound { .. })
        ));
    }
}
