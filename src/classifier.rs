//! Construct classification over top-level declarations
//!
//! Each rule is a predicate-plus-extractor over one initializer node. Rules
//! are tried in precedence order and the first match wins; anything that
//! matches no rule is left untouched.

use crate::parser::{
    call_arguments, has_substitutions, node_span, node_text, significant_children,
    template_content,
};
use crate::types::{
    ClassifiedConstruct, ConstructKind, CssSource, ImportBindings, StyleSymbol, VariantHelper,
};
use crate::variant_parser::VariantTableParser;
use tree_sitter::Node;

type Rule = fn(&ConstructClassifier<'_>, Node<'_>, &str) -> Option<ConstructKind>;

/// Rules in precedence order
const RULES: &[(&str, Rule)] = &[
    ("element-style", |c, node, src| c.match_element_style(node, src)),
    ("extension-style", |c, node, src| c.match_extension_style(node, src)),
    ("utility-style", |c, node, src| c.match_utility_style(node, src)),
    ("global-style", |c, node, src| c.match_global_style(node, src)),
    ("keyframes", |c, node, src| c.match_keyframes(node, src)),
    ("element-with-defaults", |c, node, src| c.match_element_with_defaults(node, src)),
    ("variants", |c, node, src| c.match_variants(node, src)),
    ("polymorphic", |c, node, src| c.match_polymorphic(node, src)),
];

pub struct ConstructClassifier<'b> {
    bindings: &'b ImportBindings,
}

impl<'b> ConstructClassifier<'b> {
    pub fn new(bindings: &'b ImportBindings) -> Self {
        Self { bindings }
    }

    /// Classifies every recognized declaration in source order
    pub fn classify(&self, root: Node<'_>, source: &str) -> Vec<ClassifiedConstruct> {
        let mut constructs = Vec::new();

        for declaration in top_level_declarations(root) {
            for declarator in significant_children(declaration) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name) = declarator.child_by_field_name("name") else {
                    continue;
                };
                if name.kind() != "identifier" {
                    continue;
                }
                let Some(value) = declarator.child_by_field_name("value") else {
                    continue;
                };
                if let Some(kind) = self.classify_initializer(value, source) {
                    let name = node_text(name, source).to_string();
                    log::debug!("Classified '{}' as {} at byte {}", name, kind.label(), value.start_byte());
                    constructs.push(ClassifiedConstruct {
                        name,
                        span: node_span(value),
                        kind,
                    });
                }
            }
        }

        constructs
    }

    pub fn classify_initializer(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        RULES.iter().find_map(|(label, rule)| {
            let kind = rule(self, value, source)?;
            log::trace!("Rule {} matched", label);
            Some(kind)
        })
    }

    fn is_bound_identifier(&self, node: Node<'_>, source: &str, symbol: StyleSymbol) -> bool {
        node.kind() == "identifier" && self.bindings.is_bound(symbol, node_text(node, source))
    }

    /// `styled.<tag>` followed by a template
    fn match_element_style(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        let (function, css) = tagged_template(value, source)?;
        let tag = self.styled_member_tag(function, source)?;
        Some(ConstructKind::ElementStyle { tag, css })
    }

    /// `styled(<identifier>)` followed by a template
    fn match_extension_style(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        let (function, css) = tagged_template(value, source)?;
        if function.kind() != "call_expression" {
            return None;
        }
        let callee = function.child_by_field_name("function")?;
        if !self.is_bound_identifier(callee, source, StyleSymbol::Styled)
            && !self.is_bound_identifier(callee, source, StyleSymbol::Extend)
        {
            return None;
        }
        let arguments = call_arguments(function)?;
        match arguments.as_slice() {
            [base] if base.kind() == "identifier" => Some(ConstructKind::ExtensionStyle {
                base: node_text(*base, source).to_string(),
                css,
            }),
            _ => {
                log::debug!(
                    "Skipping extension at byte {}: base must be a plain identifier",
                    value.start_byte()
                );
                None
            }
        }
    }

    fn match_utility_style(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        let (function, css) = tagged_template(value, source)?;
        self.is_bound_identifier(function, source, StyleSymbol::Css)
            .then(|| ConstructKind::UtilityStyle { css })
    }

    fn match_global_style(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        let (function, css) = tagged_template(value, source)?;
        self.is_bound_identifier(function, source, StyleSymbol::CreateGlobalStyle)
            .then(|| ConstructKind::GlobalStyle { css })
    }

    fn match_keyframes(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        let (function, css) = tagged_template(value, source)?;
        self.is_bound_identifier(function, source, StyleSymbol::Keyframes)
            .then(|| ConstructKind::Keyframes { css })
    }

    /// `styled.<tag>.attrs(<object or function>)` followed by a template
    fn match_element_with_defaults(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        let (function, css) = tagged_template(value, source)?;
        if function.kind() != "call_expression" {
            return None;
        }
        let callee = function.child_by_field_name("function")?;
        if callee.kind() != "member_expression" {
            return None;
        }
        let property = callee.child_by_field_name("property")?;
        if node_text(property, source) != "attrs" {
            return None;
        }
        let tag = self.styled_member_tag(callee.child_by_field_name("object")?, source)?;

        let arguments = call_arguments(function)?;
        match arguments.as_slice() {
            [attrs]
                if matches!(
                    attrs.kind(),
                    "object" | "arrow_function" | "function_expression" | "function"
                ) =>
            {
                Some(ConstructKind::ElementWithDefaults {
                    tag,
                    attrs: node_text(*attrs, source).to_string(),
                    css,
                })
            }
            _ => None,
        }
    }

    /// `styleVariants({...})` or `cssVariants({...})`
    fn match_variants(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        if value.kind() != "call_expression" {
            return None;
        }
        let callee = value.child_by_field_name("function")?;
        let helper = if self.is_bound_identifier(callee, source, StyleSymbol::StyleVariants) {
            VariantHelper::Component
        } else if self.is_bound_identifier(callee, source, StyleSymbol::CssVariants) {
            VariantHelper::ClassName
        } else {
            return None;
        };

        let arguments = call_arguments(value)?;
        let [config] = arguments.as_slice() else {
            return None;
        };
        let table = VariantTableParser::new(self.bindings).parse(*config, source)?;
        Some(ConstructKind::Variants { helper, table })
    }

    /// `polymorphic(<tag or identifier>, <identifier>)`
    fn match_polymorphic(&self, value: Node<'_>, source: &str) -> Option<ConstructKind> {
        if value.kind() != "call_expression" {
            return None;
        }
        let callee = value.child_by_field_name("function")?;
        if !self.is_bound_identifier(callee, source, StyleSymbol::Polymorphic) {
            return None;
        }
        let arguments = call_arguments(value)?;
        match arguments.as_slice() {
            [target, component]
                if matches!(target.kind(), "string" | "identifier")
                    && component.kind() == "identifier" =>
            {
                Some(ConstructKind::Polymorphic {
                    target: node_text(*target, source).to_string(),
                    component: node_text(*component, source).to_string(),
                })
            }
            _ => None,
        }
    }

    /// Tag of a `styled.<tag>` member expression
    fn styled_member_tag(&self, node: Node<'_>, source: &str) -> Option<String> {
        if node.kind() != "member_expression" {
            return None;
        }
        let object = node.child_by_field_name("object")?;
        let property = node.child_by_field_name("property")?;
        if !self.is_bound_identifier(object, source, StyleSymbol::Styled)
            || property.kind() != "property_identifier"
        {
            return None;
        }
        Some(node_text(property, source).to_string())
    }
}

/// Variable declarations at the top level, including those directly inside
/// an `export` statement
fn top_level_declarations<'tree>(root: Node<'tree>) -> Vec<Node<'tree>> {
    let is_declaration =
        |node: &Node<'_>| matches!(node.kind(), "lexical_declaration" | "variable_declaration");

    significant_children(root)
        .into_iter()
        .filter_map(|statement| {
            if is_declaration(&statement) {
                return Some(statement);
            }
            if statement.kind() == "export_statement" {
                return statement
                    .child_by_field_name("declaration")
                    .filter(|declaration| is_declaration(declaration));
            }
            None
        })
        .collect()
}

/// `(function, css)` of a call whose argument is a substitution-free template
fn tagged_template<'tree>(node: Node<'tree>, source: &str) -> Option<(Node<'tree>, CssSource)> {
    if node.kind() != "call_expression" {
        return None;
    }
    let template = node.child_by_field_name("arguments")?;
    if template.kind() != "template_string" {
        return None;
    }
    if has_substitutions(template) {
        log::debug!(
            "Skipping template at byte {}: interpolations are not supported",
            node.start_byte()
        );
        return None;
    }
    let function = node.child_by_field_name("function")?;
    Some((function, template_content(template, source)?))
}
