//! Variant table extraction from `styleVariants({...})` / `cssVariants({...})`
//! configuration literals

use crate::parser::{
    node_text, object_pairs, property_key_name, significant_children, string_value,
    template_content,
};
use crate::types::{
    ComponentRef, CompoundRule, ImportBindings, StyleSymbol, VariantGroup, VariantTable,
};
use crate::utils::{is_valid_variant_name, sanitize_class_segment};
use tree_sitter::Node;

const COMPONENT_FIELD: &str = "component";
const BASE_FIELD: &str = "base";
const VARIANTS_FIELD: &str = "variants";
const DEFAULTS_FIELD: &str = "defaultVariants";
const COMPOUNDS_FIELD: &str = "compoundVariants";
const COMPOUND_CSS_FIELD: &str = "css";

pub struct VariantTableParser<'b> {
    bindings: &'b ImportBindings,
}

impl<'b> VariantTableParser<'b> {
    pub fn new(bindings: &'b ImportBindings) -> Self {
        Self { bindings }
    }

    /// Builds a table from the configuration object. Returns None when the
    /// literal has no `variants` object; statically unknown values are dropped.
    pub fn parse(&self, config: Node<'_>, source: &str) -> Option<VariantTable> {
        if config.kind() != "object" {
            return None;
        }

        let mut table = VariantTable::default();
        let mut has_variants = false;

        for (key, value) in object_pairs(config) {
            let Some(field) = property_key_name(key, source) else {
                continue;
            };
            match field.as_str() {
                COMPONENT_FIELD => table.component = component_ref(value, source),
                BASE_FIELD => table.base = self.css_text(value, source),
                VARIANTS_FIELD if value.kind() == "object" => {
                    has_variants = true;
                    self.parse_variants(value, source, &mut table);
                }
                DEFAULTS_FIELD if value.kind() == "object" => {
                    table.default_variants = parse_defaults(value, source);
                }
                COMPOUNDS_FIELD if value.kind() == "array" => {
                    table.compound_variants = self.parse_compounds(value, source);
                }
                _ => {}
            }
        }

        if !has_variants {
            return None;
        }
        Some(table)
    }

    /// A plain string, a substitution-free template, or a `css` helper call
    /// all yield the same text
    pub fn css_text(&self, node: Node<'_>, source: &str) -> Option<String> {
        match node.kind() {
            "string" => string_value(node, source),
            "template_string" => template_content(node, source).map(|css| css.text),
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                if function.kind() != "identifier"
                    || !self
                        .bindings
                        .is_bound(StyleSymbol::Css, node_text(function, source))
                {
                    return None;
                }
                let template = node.child_by_field_name("arguments")?;
                template_content(template, source).map(|css| css.text)
            }
            _ => None,
        }
    }

    fn parse_variants(&self, variants: Node<'_>, source: &str, table: &mut VariantTable) {
        for (key, value) in object_pairs(variants) {
            let Some(name) = property_key_name(key, source) else {
                continue;
            };
            if !is_valid_variant_name(&name) || value.kind() != "object" {
                log::debug!("Skipping variant '{}': unsupported name or value", name);
                continue;
            }

            let mut group = VariantGroup {
                name,
                values: Vec::new(),
            };
            for (value_key, css_node) in object_pairs(value) {
                let Some(value_name) = property_key_name(value_key, source) else {
                    continue;
                };
                let value_name = sanitize_class_segment(&value_name);
                if value_name.is_empty() {
                    continue;
                }
                let Some(css) = self.css_text(css_node, source) else {
                    log::debug!(
                        "Dropping non-static value '{}' of variant '{}'",
                        value_name,
                        group.name
                    );
                    continue;
                };
                match group.values.iter_mut().find(|(existing, _)| *existing == value_name) {
                    Some(entry) => entry.1 = css,
                    None => group.values.push((value_name, css)),
                }
            }
            table.upsert_group(group);
        }
    }

    fn parse_compounds(&self, array: Node<'_>, source: &str) -> Vec<CompoundRule> {
        let mut rules = Vec::new();

        for element in significant_children(array) {
            if element.kind() != "object" {
                continue;
            }
            let mut conditions = Vec::new();
            let mut css = None;
            for (key, value) in object_pairs(element) {
                let Some(field) = property_key_name(key, source) else {
                    continue;
                };
                if field == COMPOUND_CSS_FIELD {
                    css = self.css_text(value, source);
                } else if let Some(expected) = string_value(value, source) {
                    conditions.push((field, sanitize_class_segment(&expected)));
                }
            }

            match css {
                Some(css) if !conditions.is_empty() => rules.push(CompoundRule { conditions, css }),
                _ => log::debug!("Dropping compound variant without conditions or static css"),
            }
        }

        rules
    }
}

fn component_ref(node: Node<'_>, source: &str) -> Option<ComponentRef> {
    match node.kind() {
        "string" => string_value(node, source).map(ComponentRef::Tag),
        "identifier" => Some(ComponentRef::Identifier(node_text(node, source).to_string())),
        _ => None,
    }
}

fn parse_defaults(object: Node<'_>, source: &str) -> Vec<(String, String)> {
    let mut defaults: Vec<(String, String)> = Vec::new();

    for (key, value) in object_pairs(object) {
        let Some(name) = property_key_name(key, source) else {
            continue;
        };
        let literal = match value.kind() {
            "string" => string_value(value, source),
            "number" | "true" | "false" => Some(node_text(value, source).to_string()),
            _ => None,
        };
        let Some(literal) = literal.map(|v| sanitize_class_segment(&v)) else {
            continue;
        };
        if literal.is_empty() {
            continue;
        }
        match defaults.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = literal,
            None => defaults.push((name, literal)),
        }
    }

    defaults
}
