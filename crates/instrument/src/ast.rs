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

//! Typed statement tree for method bodies.
//!
//! Only the constructs the transformer specializes get typed nodes; every
//! other statement (`switch`, `synchronized`, labeled statements,
//! declarations, expression statements) is carried as verbatim source text
//! and passes through the rewrite unmodified. Expression positions (headers,
//! conditions, return/throw operands) are always verbatim text.

use crate::parse::JavaUnit;
use tree_sitter::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `return;` / `return expr;` with the operand's source text.
    Return(Option<String>),
    Throw(String),
    If {
        /// Condition text including its parentheses.
        condition: String,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        condition: String,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        condition: String,
    },
    /// Classic `for`; the whole `( ... ; ... ; ... )` header is verbatim.
    For {
        header: String,
        body: Vec<Stmt>,
    },
    ForEach {
        header: String,
        body: Vec<Stmt>,
    },
    Try {
        /// `try-with-resources` specification including parentheses, if any.
        resources: Option<String>,
        body: Vec<Stmt>,
        catches: Vec<CatchArm>,
        finally: Option<Vec<Stmt>>,
    },
    Block(Vec<Stmt>),
    /// `super(...)` / `this(...)`, kept as its full statement text.
    ExplicitConstructorInvocation(String),
    /// Any statement the transformer does not specialize, dedented to its
    /// own first line.
    Verbatim(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchArm {
    /// The `catch (...)` parameter text, e.g. `IOException | SQLException e`.
    pub param: String,
    pub body: Vec<Stmt>,
}

impl Stmt {
    /// Whether control cannot fall past this statement: a return or throw,
    /// or a block whose last statement is terminating.
    pub fn is_terminating(&self) -> bool {
        match self {
            Stmt::Return(_) | Stmt::Throw(_) => true,
            Stmt::Block(stmts) => stmts.last().is_some_and(Stmt::is_terminating),
            _ => false,
        }
    }
}

/// Lower a `block`/`constructor_body` node into a statement list.
pub fn lower_body(unit: &JavaUnit, body: Node<'_>) -> Vec<Stmt> {
    let mut cursor = body.walk();
    body.named_children(&mut cursor)
        .map(|child| lower_stmt(unit, child))
        .collect()
}

fn lower_stmt(unit: &JavaUnit, node: Node<'_>) -> Stmt {
    match node.kind() {
        "return_statement" => Stmt::Return(node.named_child(0).map(|e| unit.text(e).to_owned())),
        "throw_statement" => Stmt::Throw(
            node.named_child(0)
                .map(|e| unit.text(e).to_owned())
                .unwrap_or_default(),
        ),
        "if_statement" => {
            let condition = node
                .child_by_field_name("condition")
                .map(|c| unit.text(c).to_owned())
                .unwrap_or_else(|| "(true)".to_owned());
            let then_branch = node
                .child_by_field_name("consequence")
                .map(|b| lower_branch(unit, b))
                .unwrap_or_default();
            let else_branch = node
                .child_by_field_name("alternative")
                .map(|b| lower_branch(unit, b));
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            }
        }
        "while_statement" => Stmt::While {
            condition: node
                .child_by_field_name("condition")
                .map(|c| unit.text(c).to_owned())
                .unwrap_or_else(|| "(true)".to_owned()),
            body: node
                .child_by_field_name("body")
                .map(|b| lower_branch(unit, b))
                .unwrap_or_default(),
        },
        "do_statement" => Stmt::DoWhile {
            body: node
                .child_by_field_name("body")
                .map(|b| lower_branch(unit, b))
                .unwrap_or_default(),
            condition: node
                .child_by_field_name("condition")
                .map(|c| unit.text(c).to_owned())
                .unwrap_or_else(|| "(true)".to_owned()),
        },
        "for_statement" => Stmt::For {
            header: paren_header(unit, node),
            body: node
                .child_by_field_name("body")
                .map(|b| lower_branch(unit, b))
                .unwrap_or_default(),
        },
        "enhanced_for_statement" => Stmt::ForEach {
            header: paren_header(unit, node),
            body: node
                .child_by_field_name("body")
                .map(|b| lower_branch(unit, b))
                .unwrap_or_default(),
        },
        "try_statement" | "try_with_resources_statement" => lower_try(unit, node),
        "block" => Stmt::Block(lower_body(unit, node)),
        "explicit_constructor_invocation" => {
            Stmt::ExplicitConstructorInvocation(unit.text(node).to_owned())
        }
        _ => Stmt::Verbatim(dedented_text(unit, node)),
    }
}

/// A branch position: blocks flatten to their statement list, a bare single
/// statement becomes a one-element list (the unparser always re-braces).
fn lower_branch(unit: &JavaUnit, node: Node<'_>) -> Vec<Stmt> {
    if node.kind() == "block" {
        lower_body(unit, node)
    } else {
        vec![lower_stmt(unit, node)]
    }
}

fn lower_try(unit: &JavaUnit, node: Node<'_>) -> Stmt {
    let resources = node
        .child_by_field_name("resources")
        .map(|r| unit.text(r).to_owned());
    let body = node
        .child_by_field_name("body")
        .map(|b| lower_body(unit, b))
        .unwrap_or_default();

    let mut catches = Vec::new();
    let mut finally = None;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "catch_clause" => {
                let param = child
                    .named_children(&mut child.walk())
                    .find(|c| c.kind() == "catch_formal_parameter")
                    .map(|p| unit.text(p).to_owned())
                    .unwrap_or_default();
                let body = child
                    .child_by_field_name("body")
                    .map(|b| lower_body(unit, b))
                    .unwrap_or_default();
                catches.push(CatchArm { param, body });
            }
            "finally_clause" => {
                finally = child
                    .named_children(&mut child.walk())
                    .find(|c| c.kind() == "block")
                    .map(|b| lower_body(unit, b));
            }
            _ => {}
        }
    }
    Stmt::Try {
        resources,
        body,
        catches,
        finally,
    }
}

/// The `( ... )` header of a `for`/for-each, verbatim.
fn paren_header(unit: &JavaUnit, node: Node<'_>) -> String {
    let mut cursor = node.walk();
    let mut open = None;
    let mut close = None;
    for child in node.children(&mut cursor) {
        match child.kind() {
            "(" if open.is_none() => open = Some(child.start_byte()),
            ")" => close = Some(child.end_byte()),
            _ => {}
        }
    }
    match (open, close) {
        (Some(start), Some(end)) => unit.source()[start..end].to_owned(),
        _ => "()".to_owned(),
    }
}

/// Statement text with continuation lines dedented to the statement's own
/// starting column, so the unparser can re-indent the whole thing uniformly.
fn dedented_text(unit: &JavaUnit, node: Node<'_>) -> String {
    let text = unit.text(node);
    if !text.contains('\n') {
        return text.to_owned();
    }
    let column = node.start_position().column;
    let mut lines = text.lines();
    let mut out = String::new();
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push('\n');
        let mut stripped = line;
        for _ in 0..column {
            match stripped.strip_prefix(' ').or_else(|| stripped.strip_prefix('\t')) {
                Some(rest) => stripped = rest,
                None => break,
            }
        }
        out.push_str(stripped);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::all_sites;
    use pretty_assertions::assert_eq;
    use unindent::unindent;

    fn body_of(source: &str) -> (JavaUnit, Vec<Stmt>) {
        let unit = JavaUnit::parse("T.java", unindent(source)).unwrap();
        let body = {
            let sites = all_sites(&unit);
            sites[0].body.expect("body")
        };
        let stmts = lower_body(&unit, body);
        (unit, stmts)
    }

    #[test]
    fn return_and_throw_carry_operand_text() {
        let (_unit, stmts) = body_of(
            r#"
            class T {
                int f(int x) {
                    if (x < 0) {
                        throw new IllegalArgumentException("negative");
                    }
                    return x * 2;
                }
            }
            "#,
        );
        assert_eq!(stmts.len(), 2);
        match &stmts[0] {
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                assert_eq!(condition, "(x < 0)");
                assert_eq!(
                    then_branch,
                    &vec![Stmt::Throw(
                        "new IllegalArgumentException(\"negative\")".to_owned()
                    )]
                );
                assert!(else_branch.is_none());
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(stmts[1], Stmt::Return(Some("x * 2".to_owned())));
    }

    #[test]
    fn unbraced_branches_become_single_statement_lists() {
        let (_unit, stmts) = body_of(
            r#"
            class T {
                int f(int x) {
                    if (x > 0) return x; else return -x;
                }
            }
            "#,
        );
        match &stmts[0] {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert_eq!(then_branch, &vec![Stmt::Return(Some("x".to_owned()))]);
                assert_eq!(
                    else_branch,
                    &Some(vec![Stmt::Return(Some("-x".to_owned()))])
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn try_catch_finally_sections_lower_independently() {
        let (_unit, stmts) = body_of(
            r#"
            class T {
                void f() {
                    try {
                        work();
                    } catch (IOException | RuntimeException e) {
                        throw e;
                    } finally {
                        cleanup();
                    }
                }
            }
            "#,
        );
        match &stmts[0] {
            Stmt::Try {
                resources,
                body,
                catches,
                finally,
            } => {
                assert!(resources.is_none());
                assert_eq!(body, &vec![Stmt::Verbatim("work();".to_owned())]);
                assert_eq!(catches.len(), 1);
                assert_eq!(catches[0].param, "IOException | RuntimeException e");
                assert_eq!(catches[0].body, vec![Stmt::Throw("e".to_owned())]);
                assert_eq!(
                    finally,
                    &Some(vec![Stmt::Verbatim("cleanup();".to_owned())])
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unspecialized_statements_pass_through_verbatim() {
        let (_unit, stmts) = body_of(
            r#"
            class T {
                int f(int x) {
                    switch (x) {
                        case 0:
                            x = 1;
                        default:
                            x = 2;
                    }
                    return x;
                }
            }
            "#,
        );
        match &stmts[0] {
            Stmt::Verbatim(text) => {
                assert!(text.starts_with("switch (x) {"));
                assert!(text.contains("case 0:"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn constructor_delegation_is_typed() {
        let (_unit, stmts) = body_of(
            r#"
            class T {
                T(int x) {
                    super();
                    this.x = x;
                }
                int x;
            }
            "#,
        );
        assert_eq!(
            stmts[0],
            Stmt::ExplicitConstructorInvocation("super();".to_owned())
        );
    }

    #[test]
    fn block_termination_recurses_into_last_statement() {
        let terminating = Stmt::Block(vec![
            Stmt::Verbatim("x = 1;".to_owned()),
            Stmt::Return(None),
        ]);
        assert!(terminating.is_terminating());
        let open = Stmt::Block(vec![Stmt::Return(None), Stmt::Verbatim("x = 1;".to_owned())]);
        assert!(!open.is_terminating());
        assert!(!Stmt::Verbatim("x = 1;".to_owned()).is_terminating());
    }
}
