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

//! Pretty-printer from the statement tree back to Java source.
//!
//! All branch bodies are emitted braced, whatever the original had; `else if`
//! chains stay on one line. Verbatim statements keep their internal relative
//! indentation and get the current indent prefixed to every line.

use crate::ast::{CatchArm, Stmt};

pub const INDENT_LEVEL: usize = 4;

/// Render a statement list at the given indent depth (in levels, not spaces).
pub fn unparse_stmts(stmts: &[Stmt], depth: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for stmt in stmts {
        unparse_stmt(stmt, depth, &mut lines);
    }
    lines
}

fn indent_of(depth: usize) -> String {
    " ".repeat(depth * INDENT_LEVEL)
}

fn unparse_stmt(stmt: &Stmt, depth: usize, lines: &mut Vec<String>) {
    let indent = indent_of(depth);
    match stmt {
        Stmt::Return(None) => lines.push(format!("{indent}return;")),
        Stmt::Return(Some(expr)) => lines.push(format!("{indent}return {expr};")),
        Stmt::Throw(expr) => lines.push(format!("{indent}throw {expr};")),
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            lines.push(format!("{indent}if {condition} {{"));
            lines.extend(unparse_stmts(then_branch, depth + 1));
            unparse_else(else_branch.as_deref(), depth, lines);
        }
        Stmt::While { condition, body } => {
            lines.push(format!("{indent}while {condition} {{"));
            lines.extend(unparse_stmts(body, depth + 1));
            lines.push(format!("{indent}}}"));
        }
        Stmt::DoWhile { body, condition } => {
            lines.push(format!("{indent}do {{"));
            lines.extend(unparse_stmts(body, depth + 1));
            lines.push(format!("{indent}}} while {condition};"));
        }
        Stmt::For { header, body } => {
            lines.push(format!("{indent}for {header} {{"));
            lines.extend(unparse_stmts(body, depth + 1));
            lines.push(format!("{indent}}}"));
        }
        Stmt::ForEach { header, body } => {
            lines.push(format!("{indent}for {header} {{"));
            lines.extend(unparse_stmts(body, depth + 1));
            lines.push(format!("{indent}}}"));
        }
        Stmt::Try {
            resources,
            body,
            catches,
            finally,
        } => {
            match resources {
                Some(res) => lines.push(format!("{indent}try {res} {{")),
                None => lines.push(format!("{indent}try {{")),
            }
            lines.extend(unparse_stmts(body, depth + 1));
            for CatchArm { param, body } in catches {
                lines.push(format!("{indent}}} catch ({param}) {{"));
                lines.extend(unparse_stmts(body, depth + 1));
            }
            if let Some(finally) = finally {
                lines.push(format!("{indent}}} finally {{"));
                lines.extend(unparse_stmts(finally, depth + 1));
            }
            lines.push(format!("{indent}}}"));
        }
        Stmt::Block(stmts) => {
            lines.push(format!("{indent}{{"));
            lines.extend(unparse_stmts(stmts, depth + 1));
            lines.push(format!("{indent}}}"));
        }
        Stmt::ExplicitConstructorInvocation(text) | Stmt::Verbatim(text) => {
            for line in text.lines() {
                lines.push(format!("{indent}{line}"));
            }
        }
    }
}

fn unparse_else(else_branch: Option<&[Stmt]>, depth: usize, lines: &mut Vec<String>) {
    let indent = indent_of(depth);
    match else_branch {
        None => lines.push(format!("{indent}}}")),
        // `else if` chain: keep the nested if on the closing line.
        Some(
            [
                Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                },
            ],
        ) => {
            lines.push(format!("{indent}}} else if {condition} {{"));
            lines.extend(unparse_stmts(then_branch, depth + 1));
            unparse_else(else_branch.as_deref(), depth, lines);
        }
        Some(stmts) => {
            lines.push(format!("{indent}}} else {{"));
            lines.extend(unparse_stmts(stmts, depth + 1));
            lines.push(format!("{indent}}}"));
        }
    }
}

/// Render a whole method body (braces included) for splicing at the original
/// body's span. `base_column` is the column the declaration starts at; the
/// closing brace lands back on it.
pub fn render_body(stmts: &[Stmt], base_column: usize) -> String {
    let base = " ".repeat(base_column);
    let depth = base_column / INDENT_LEVEL + 1;
    let mut out = String::from("{\n");
    for line in unparse_stmts(stmts, depth) {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.push_str(&base);
    out.push('}');
    out
}
