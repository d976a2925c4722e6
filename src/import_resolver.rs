//! Import resolution for the styling library's symbols

use crate::parser::{node_text, significant_children, string_value};
use crate::types::{ImportBindings, StyleSymbol};
use tree_sitter::Node;

pub struct ImportResolver {
    module_sources: Vec<String>,
}

impl ImportResolver {
    pub fn new(module_sources: &[String]) -> Self {
        Self {
            module_sources: module_sources.to_vec(),
        }
    }

    pub fn accepts_module(&self, specifier: &str) -> bool {
        self.module_sources.iter().any(|accepted| accepted == specifier)
    }

    /// Collects local bindings for every recognized named import from an
    /// accepted module. An empty result means the file has nothing to extract.
    pub fn resolve(&self, root: Node<'_>, source: &str) -> ImportBindings {
        let mut bindings = ImportBindings::new();

        for statement in significant_children(root) {
            if statement.kind() != "import_statement" || is_type_only_import(statement, source) {
                continue;
            }
            let Some(module) = statement
                .child_by_field_name("source")
                .and_then(|node| string_value(node, source))
            else {
                continue;
            };
            if !self.accepts_module(&module) {
                continue;
            }

            let clauses = significant_children(statement)
                .into_iter()
                .filter(|child| child.kind() == "import_clause");
            for clause in clauses {
                for group in significant_children(clause) {
                    if group.kind() == "named_imports" {
                        self.bind_specifiers(group, source, &module, &mut bindings);
                    }
                }
            }
        }

        if !bindings.is_empty() {
            log::trace!("Resolved {} style bindings from '{:?}'", bindings.len(), bindings.source);
        }
        bindings
    }

    fn bind_specifiers(
        &self,
        named_imports: Node<'_>,
        source: &str,
        module: &str,
        bindings: &mut ImportBindings,
    ) {
        for specifier in significant_children(named_imports) {
            if specifier.kind() != "import_specifier" {
                continue;
            }
            if node_text(specifier, source).starts_with("type ") {
                continue;
            }
            let Some(name_node) = specifier.child_by_field_name("name") else {
                continue;
            };
            let imported = match name_node.kind() {
                "identifier" => node_text(name_node, source).to_string(),
                "string" => match string_value(name_node, source) {
                    Some(value) => value,
                    None => continue,
                },
                _ => continue,
            };
            let Some(symbol) = StyleSymbol::from_export_name(&imported) else {
                continue;
            };
            let local = specifier
                .child_by_field_name("alias")
                .map(|alias| node_text(alias, source))
                .unwrap_or(imported.as_str());
            bindings.bind(symbol, local, module);
        }
    }
}

fn is_type_only_import(statement: Node<'_>, source: &str) -> bool {
    let rest = node_text(statement, source)
        .trim_start_matches("import")
        .trim_start();
    (rest.starts_with("type ") || rest.starts_with("type{"))
        && !rest.starts_with("type from")
        && !rest.starts_with("type,")
}
