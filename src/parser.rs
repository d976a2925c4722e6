//! Component source parsing on top of tree-sitter
//!
//! The compiler never builds its own AST: classification works directly on
//! tree-sitter nodes, which carry the byte ranges the rewriter needs.

use crate::error::{CompilerError, Result};
use crate::types::{CssSource, Span};
use crate::utils::unquote_js_string;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Grammar used for a source file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    TypeScript,
    Tsx,
    JavaScript,
}

impl SourceLanguage {
    pub fn from_path(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        match extension {
            "ts" | "mts" | "cts" => Self::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            _ => Self::Tsx,
        }
    }

    fn grammar(self) -> tree_sitter::Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// Extensions the host hands to the compiler
pub fn is_supported_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("ts" | "tsx" | "mts" | "cts" | "js" | "jsx" | "mjs" | "cjs")
    )
}

pub struct SourceParser {
    parser: Parser,
}

impl SourceParser {
    pub fn new(language: SourceLanguage) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|e| CompilerError::Language {
                message: format!("Failed to set {:?} grammar: {}", language, e),
            })?;
        Ok(Self { parser })
    }

    pub fn for_path(path: &str) -> Result<Self> {
        Self::new(SourceLanguage::from_path(path))
    }

    /// Parses `source`; None when the text is not valid source. Partial trees
    /// with error nodes are rejected so nothing is rewritten from a guess.
    pub fn parse(&mut self, source: &str) -> Option<Tree> {
        let tree = self.parser.parse(source, None)?;
        if tree.root_node().has_error() {
            return None;
        }
        Some(tree)
    }
}

pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

pub fn node_span(node: Node<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

/// Named children, without the comments tree-sitter attaches anywhere
pub fn significant_children<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// End of the hashbang line and directive prologue (`'use client';`,
/// `"use strict";`) at the top of a module; 0 when there is neither.
/// Anything emitted ahead of the module body must land after this offset.
pub fn prologue_end(root: Node<'_>) -> usize {
    let mut end = 0;
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "comment" => {}
            "hash_bang_line" => end = child.end_byte(),
            "expression_statement"
                if child.named_child_count() == 1
                    && child.named_child(0).is_some_and(|expr| expr.kind() == "string") =>
            {
                end = child.end_byte()
            }
            _ => break,
        }
    }
    end
}

/// Decoded value of a `string` node
pub fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    unquote_js_string(node_text(node, source))
}

/// Raw content of a `template_string` node without substitutions
pub fn template_content(node: Node<'_>, source: &str) -> Option<CssSource> {
    if node.kind() != "template_string" {
        return None;
    }
    if significant_children(node)
        .iter()
        .any(|child| child.kind() == "template_substitution")
    {
        return None;
    }

    let start = node.start_byte() + 1;
    let end = node.end_byte().saturating_sub(1).max(start);
    Some(CssSource {
        text: source[start..end].to_string(),
        span: Span::new(start, end),
    })
}

/// Whether a template carries `${...}` substitutions
pub fn has_substitutions(node: Node<'_>) -> bool {
    node.kind() == "template_string"
        && significant_children(node)
            .iter()
            .any(|child| child.kind() == "template_substitution")
}

/// Static name of an object property key
pub fn property_key_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "property_identifier" | "number" => Some(node_text(node, source).to_string()),
        "string" => string_value(node, source),
        _ => None,
    }
}

/// `(key node, value node)` for every `pair` in an object literal
pub fn object_pairs<'tree>(object: Node<'tree>) -> Vec<(Node<'tree>, Node<'tree>)> {
    significant_children(object)
        .into_iter()
        .filter(|child| child.kind() == "pair")
        .filter_map(|pair| {
            Some((
                pair.child_by_field_name("key")?,
                pair.child_by_field_name("value")?,
            ))
        })
        .collect()
}

/// Call arguments when the call uses a parenthesized argument list
pub fn call_arguments<'tree>(call: Node<'tree>) -> Option<Vec<Node<'tree>>> {
    let arguments = call.child_by_field_name("arguments")?;
    if arguments.kind() != "arguments" {
        return None;
    }
    Some(significant_children(arguments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, path: &str) -> Option<Tree> {
        SourceParser::for_path(path).unwrap().parse(source)
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(SourceLanguage::from_path("a/b.ts"), SourceLanguage::TypeScript);
        assert_eq!(SourceLanguage::from_path("a/b.tsx"), SourceLanguage::Tsx);
        assert_eq!(SourceLanguage::from_path("a/b.jsx"), SourceLanguage::JavaScript);
        assert_eq!(SourceLanguage::from_path("a/b.mjs"), SourceLanguage::JavaScript);
        assert_eq!(SourceLanguage::from_path("no_extension"), SourceLanguage::Tsx);
    }

    #[test]
    fn test_supported_sources() {
        assert!(is_supported_source(Path::new("src/Button.tsx")));
        assert!(is_supported_source(Path::new("src/theme.js")));
        assert!(!is_supported_source(Path::new("src/theme.css")));
        assert!(!is_supported_source(Path::new("README")));
    }

    #[test]
    fn test_parse_rejects_broken_source() {
        assert!(parse("const a = ;", "a.ts").is_none());
        assert!(parse("const a = 1;", "a.ts").is_some());
    }

    #[test]
    fn test_template_content_and_substitutions() {
        let source = "const a = css`color: red;`;\nconst b = css`color: ${c};`;";
        let tree = parse(source, "a.js").unwrap();
        let root = tree.root_node();
        let templates: Vec<_> = significant_children(root)
            .into_iter()
            .filter_map(|decl| {
                let declarator = significant_children(decl).into_iter().next()?;
                let call = declarator.child_by_field_name("value")?;
                call.child_by_field_name("arguments")
            })
            .collect();
        assert_eq!(templates.len(), 2);

        let content = template_content(templates[0], source).unwrap();
        assert_eq!(content.text, "color: red;");
        assert_eq!(content.span.slice(source), "color: red;");
        assert!(!has_substitutions(templates[0]));

        assert!(template_content(templates[1], source).is_none());
        assert!(has_substitutions(templates[1]));
    }

    #[test]
    fn test_object_pairs_and_keys() {
        let source = "const o = { a: 1, 'b-c': 2, 3: 4, ...rest, /* note */ d };";
        let tree = parse(source, "a.js").unwrap();
        let declaration = significant_children(tree.root_node())[0];
        let declarator = significant_children(declaration)[0];
        let object = declarator.child_by_field_name("value").unwrap();

        let keys: Vec<_> = object_pairs(object)
            .into_iter()
            .filter_map(|(key, _)| property_key_name(key, source))
            .collect();
        assert_eq!(keys, vec!["a", "b-c", "3"]);
    }

    #[test]
    fn test_prologue_end() {
        let plain = "import a from 'a';\n";
        assert_eq!(prologue_end(parse(plain, "a.ts").unwrap().root_node()), 0);

        let client = "'use client';\n\"use strict\";\nimport a from 'a';\n";
        let tree = parse(client, "a.tsx").unwrap();
        assert_eq!(&client[..prologue_end(tree.root_node())], "'use client';\n\"use strict\";");

        let script = "#!/usr/bin/env node\n// cli\n'use strict';\nconst a = 1;\n";
        let tree = parse(script, "a.js").unwrap();
        assert_eq!(
            &script[..prologue_end(tree.root_node())],
            "#!/usr/bin/env node\n// cli\n'use strict';"
        );

        // a string that is part of a larger expression is not a directive
        let expression = "'a' + b;\n";
        assert_eq!(prologue_end(parse(expression, "a.js").unwrap().root_node()), 0);
    }
}
