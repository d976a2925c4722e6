//! Core types and constants for the stylec compiler

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// Naming defaults
pub const DEFAULT_CLASS_PREFIX: &str = "ss";
pub const DEFAULT_RUNTIME_MODULE: &str = "stylec/runtime";
pub const DEFAULT_MODULE_SOURCES: &[&str] = &[
    "stylec",
    "stylec/styled",
    "./styled",
    "../styled",
    "../../styled",
];
pub const VIRTUAL_UNIT_PREFIX: &str = "virtual:stylec/";
pub const DEFAULT_COMPONENT_TAG: &str = "div";

// Hash lengths (hex digits)
pub const FINGERPRINT_LEN: usize = 6;
pub const FILE_HASH_LEN: usize = 6;

/// Props starting with this character never reach the rendered element
pub const TRANSIENT_MARKER: char = '$';

/// Exported symbols of the styling library the compiler knows how to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleSymbol {
    Styled,
    Extend,
    Css,
    CreateGlobalStyle,
    Keyframes,
    StyleVariants,
    CssVariants,
    Polymorphic,
}

impl StyleSymbol {
    pub const ALL: [StyleSymbol; 8] = [
        Self::Styled,
        Self::Extend,
        Self::Css,
        Self::CreateGlobalStyle,
        Self::Keyframes,
        Self::StyleVariants,
        Self::CssVariants,
        Self::Polymorphic,
    ];

    pub fn export_name(self) -> &'static str {
        match self {
            Self::Styled => "styled",
            Self::Extend => "extend",
            Self::Css => "css",
            Self::CreateGlobalStyle => "createGlobalStyle",
            Self::Keyframes => "keyframes",
            Self::StyleVariants => "styleVariants",
            Self::CssVariants => "cssVariants",
            Self::Polymorphic => "polymorphic",
        }
    }

    pub fn from_export_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|symbol| symbol.export_name() == name)
    }
}

impl fmt::Display for StyleSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.export_name())
    }
}

/// Local names under which this file imported the styling library's symbols
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportBindings {
    pub source: Option<String>,
    locals: BTreeMap<StyleSymbol, String>,
}

impl ImportBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&mut self, symbol: StyleSymbol, local: impl Into<String>, source: &str) {
        if self.source.is_none() {
            self.source = Some(source.to_string());
        }
        self.locals.insert(symbol, local.into());
    }

    pub fn local(&self, symbol: StyleSymbol) -> Option<&str> {
        self.locals.get(&symbol).map(String::as_str)
    }

    /// Whether `name` is the local binding of `symbol` in this file
    pub fn is_bound(&self, symbol: StyleSymbol, name: &str) -> bool {
        self.local(symbol) == Some(name)
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }
}

/// Half-open byte range into the original source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Raw CSS text of a template region with the range it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CssSource {
    pub text: String,
    pub span: Span,
}

/// What a variant component renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ComponentRef {
    Tag(String),
    Identifier(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VariantHelper {
    Component,
    ClassName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantGroup {
    pub name: String,
    /// value name -> css text, in declaration order
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompoundRule {
    /// variant name -> required value name
    pub conditions: Vec<(String, String)>,
    pub css: String,
}

impl CompoundRule {
    /// A compound rule fires only when every condition matches the selection
    pub fn matches(&self, selection: &[(String, String)]) -> bool {
        self.conditions.iter().all(|(variant, value)| {
            selection
                .iter()
                .any(|(selected, chosen)| selected == variant && chosen == value)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariantTable {
    pub component: Option<ComponentRef>,
    pub base: Option<String>,
    pub variants: Vec<VariantGroup>,
    pub default_variants: Vec<(String, String)>,
    pub compound_variants: Vec<CompoundRule>,
}

impl VariantTable {
    pub fn group(&self, name: &str) -> Option<&VariantGroup> {
        self.variants.iter().find(|group| group.name == name)
    }

    pub fn variant_keys(&self) -> Vec<&str> {
        self.variants.iter().map(|group| group.name.as_str()).collect()
    }

    /// Inserts or replaces a group, keeping first-declaration order
    pub(crate) fn upsert_group(&mut self, group: VariantGroup) {
        match self.variants.iter_mut().find(|existing| existing.name == group.name) {
            Some(existing) => existing.values = group.values,
            None => self.variants.push(group),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConstructKind {
    ElementStyle {
        tag: String,
        css: CssSource,
    },
    ExtensionStyle {
        base: String,
        css: CssSource,
    },
    UtilityStyle {
        css: CssSource,
    },
    GlobalStyle {
        css: CssSource,
    },
    Keyframes {
        css: CssSource,
    },
    ElementWithDefaults {
        tag: String,
        /// verbatim source of the attrs argument; never evaluated
        attrs: String,
        css: CssSource,
    },
    Variants {
        helper: VariantHelper,
        table: VariantTable,
    },
    Polymorphic {
        /// verbatim source of the default render target argument
        target: String,
        component: String,
    },
}

impl ConstructKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ElementStyle { .. } => "element-style",
            Self::ExtensionStyle { .. } => "extension-style",
            Self::UtilityStyle { .. } => "utility-style",
            Self::GlobalStyle { .. } => "global-style",
            Self::Keyframes { .. } => "keyframes",
            Self::ElementWithDefaults { .. } => "element-with-defaults",
            Self::Variants { .. } => "variants",
            Self::Polymorphic { .. } => "polymorphic",
        }
    }

    pub fn css_source(&self) -> Option<&CssSource> {
        match self {
            Self::ElementStyle { css, .. }
            | Self::ExtensionStyle { css, .. }
            | Self::UtilityStyle { css }
            | Self::GlobalStyle { css }
            | Self::Keyframes { css }
            | Self::ElementWithDefaults { css, .. } => Some(css),
            Self::Variants { .. } | Self::Polymorphic { .. } => None,
        }
    }

    /// Whether this construct produces an emitted CSS unit
    pub fn emits_css(&self) -> bool {
        !matches!(self, Self::Polymorphic { .. })
    }
}

/// One recognized styling declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedConstruct {
    /// Declared variable name
    pub name: String,
    /// Range of the initializer expression that gets replaced
    pub span: Span,
    pub kind: ConstructKind,
}

/// Final CSS for one construct, addressable by `<file-hash>-<ordinal>.css`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmittedCssUnit {
    pub key: String,
    pub file_hash: String,
    pub index: usize,
    pub css: String,
    /// Specifier the rewritten source imports this unit by
    pub import_specifier: String,
    /// Declaration the unit was extracted from
    pub declaration: String,
}
