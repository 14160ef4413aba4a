// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Tree-sitter front end for Java source files.

use crate::InstrumentError;
use tree_sitter::{Node, Parser, Tree};

/// A parsed Java compilation unit. Owns the source text; all node spans and
/// extracted text borrow from it.
pub struct JavaUnit {
    source: String,
    tree: Tree,
}

impl std::fmt::Debug for JavaUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JavaUnit")
            .field("source", &self.source)
            .field("root", &self.tree.root_node().to_sexp())
            .finish()
    }
}

impl JavaUnit {
    /// Parse a Java source file. Malformed source is fatal for the file and
    /// is reported with the path and the first error position.
    pub fn parse(path: &str, source: impl Into<String>) -> Result<Self, InstrumentError> {
        let source = source.into();
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| InstrumentError::ParseError {
                path: path.to_owned(),
                line: 1,
                column: 1,
                message: format!("failed to set Java grammar: {e}"),
            })?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| InstrumentError::ParseError {
                path: path.to_owned(),
                line: 1,
                column: 1,
                message: "failed to parse source".to_owned(),
            })?;

        if tree.root_node().has_error() {
            return Err(find_parse_error(path, &tree.root_node(), &source));
        }

        Ok(Self { source, tree })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Source text spanned by a node.
    pub fn text(&self, node: Node<'_>) -> &str {
        &self.source[node.byte_range()]
    }
}

/// Locate the innermost ERROR or missing node for diagnostics.
fn find_parse_error(path: &str, node: &Node<'_>, source: &str) -> InstrumentError {
    if node.is_error() || node.is_missing() {
        let pos = node.start_position();
        let text = &source[node.byte_range()];
        let message = if node.is_missing() {
            format!("missing {}", node.kind())
        } else {
            format!("syntax error near {:?}", text.chars().take(40).collect::<String>())
        };
        return InstrumentError::ParseError {
            path: path.to_owned(),
            line: pos.row + 1,
            column: pos.column + 1,
            message,
        };
    }

    for child in node.children(&mut node.walk()) {
        if child.has_error() {
            return find_parse_error(path, &child, source);
        }
    }

    let pos = node.start_position();
    InstrumentError::ParseError {
        path: path.to_owned(),
        line: pos.row + 1,
        column: pos.column + 1,
        message: "unknown parse error".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InstrumentError;
    use unindent::unindent;

    #[test]
    fn parses_a_well_formed_class() {
        let source = unindent(
            r#"
            public class Calculator {
                int add(int a, int b) {
                    return a + b;
                }
            }
            "#,
        );
        let unit = JavaUnit::parse("Calculator.java", source).unwrap();
        assert_eq!(unit.root().kind(), "program");
    }

    #[test]
    fn malformed_source_reports_path_and_position() {
        let err = JavaUnit::parse("Broken.java", "class { int").unwrap_err();
        match err {
            InstrumentError::ParseError { path, line, .. } => {
                assert_eq!(path, "Broken.java");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
