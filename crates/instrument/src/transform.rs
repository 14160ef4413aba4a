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

//! Method and constructor body rewriting.
//!
//! A transformed body generates an invocation id, builds the parameter map
//! and field-filter literals, reports entry, then runs the original
//! statements with every return/throw path routed through an exit report.
//! Constructor delegation (`super(...)`/`this(...)`) stays first; tracing
//! never precedes it. The declaration's signature, name, and visibility are
//! untouched; the unit is marked `@Traced` unless already annotated.

use crate::ast::{self, CatchArm, Stmt};
use crate::fields::compute_field_filter;
use crate::javadoc::javadoc_for;
use crate::locate::{self, MethodSite};
use crate::parse::JavaUnit;
use crate::report::{InstrumentedFile, TransformResult};
use crate::unparse::render_body;
use crate::{InstrumentError, TargetSpec};
use jtrace_probe::FieldFilter;
use tracing::warn;
use tree_sitter::Node;

pub const PROBE_IMPORT: &str = "import org.jtrace.TraceProbe;";
pub const ANNOTATION_IMPORT: &str = "import org.jtrace.Traced;";
pub const ANNOTATION_NAME: &str = "Traced";

const ID_VAR: &str = "__jtrace_id";
const PARAMS_VAR: &str = "__jtrace_params";
const FILTER_VAR: &str = "__jtrace_fieldFilter";
const RET_VAR: &str = "__jtrace_ret";

/// Instrument one source file against a target spec. Returns the rewritten
/// source plus per-unit metadata captured before any rewriting.
///
/// Selections may nest (range mode selects an anonymous-class method along
/// with its enclosing method). Innermost selections are rewritten first;
/// an enclosing selection is then re-parsed from the already-edited text, so
/// its body carries the inner rewrite verbatim instead of splicing with
/// stale byte offsets.
pub fn instrument_source(
    path: &str,
    source: &str,
    spec: &TargetSpec,
) -> Result<InstrumentedFile, InstrumentError> {
    let unit = JavaUnit::parse(path, source)?;
    let sites = locate::locate(&unit, path, spec)?;
    let selected: Vec<usize> = sites.iter().map(|s| s.node.id()).collect();

    // A body rewrite neither adds nor removes method declarations, so
    // document-order indices identify the selections across passes.
    let mut units = Vec::new();
    let mut pending: Vec<usize> = Vec::new();
    for (index, site) in locate::all_sites(&unit).iter().enumerate() {
        if !selected.contains(&site.node.id()) {
            continue;
        }
        if site.body.is_none() {
            warn!(
                path,
                signature = %site.signature,
                "skipping method without a body (abstract or interface)"
            );
            continue;
        }
        // Captured before any rewrite; the body transform is not idempotent.
        units.push(TransformResult {
            file: path.to_owned(),
            signature: site.signature.clone(),
            code: unit.text(site.node).to_owned(),
            javadoc: javadoc_for(&unit, site.node),
        });
        pending.push(index);
    }

    let mut current = source.to_owned();
    while !pending.is_empty() {
        let unit = JavaUnit::parse(path, &current)?;
        let all = locate::all_sites(&unit);
        let mut deferred = Vec::new();
        let mut edits = Vec::new();
        for &index in &pending {
            let site = &all[index];
            let encloses_pending = pending.iter().any(|&other| {
                other != index
                    && site.node.start_byte() <= all[other].node.start_byte()
                    && all[other].node.end_byte() <= site.node.end_byte()
            });
            if encloses_pending {
                deferred.push(index);
            } else {
                edits.extend(site_edits(&unit, site, path));
            }
        }
        current = apply_edits(&current, edits);
        pending = deferred;
    }

    if !units.is_empty() {
        let unit = JavaUnit::parse(path, &current)?;
        if let Some(edit) = import_edit(&unit) {
            current = apply_edits(&current, vec![edit]);
        }
    }

    Ok(InstrumentedFile {
        source: current,
        units,
    })
}

/// Body replacement plus, when missing, the annotation insertion for one
/// declaration.
fn site_edits(unit: &JavaUnit, site: &MethodSite<'_>, path: &str) -> Vec<Edit> {
    let Some(body) = site.body else {
        return Vec::new();
    };
    let filter = compute_field_filter(unit, site);
    let original = ast::lower_body(unit, body);
    let instrumented = build_instrumented_body(site, &original, &filter, path);
    let mut edits = vec![Edit {
        start: body.start_byte(),
        end: body.end_byte(),
        text: render_body(&instrumented, site.node.start_position().column),
    }];
    if !has_traced_annotation(unit, site.node) {
        let indent = " ".repeat(site.node.start_position().column);
        edits.push(Edit {
            start: site.node.start_byte(),
            end: site.node.start_byte(),
            text: format!("@{ANNOTATION_NAME}\n{indent}"),
        });
    }
    edits
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    // Descending by start; an insertion at a replacement's start byte must
    // come after the replacement so it ends up in front of the new text.
    edits.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));
    let mut out = source.to_owned();
    for edit in edits {
        out.replace_range(edit.start..edit.end, &edit.text);
    }
    out
}

/// Insert missing probe imports after the last import (or the package
/// declaration, or at the top of the file).
fn import_edit(unit: &JavaUnit) -> Option<Edit> {
    let root = unit.root();
    let mut insert_after = None;
    let mut have_probe = false;
    let mut have_annotation = false;
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "package_declaration" => insert_after = Some(child.end_byte()),
            "import_declaration" => {
                insert_after = Some(child.end_byte());
                if let Some(name) = imported_name(unit, child) {
                    have_probe |= name == "org.jtrace.TraceProbe";
                    have_annotation |= name == "org.jtrace.Traced";
                }
            }
            _ => {}
        }
    }

    let mut imports = String::new();
    if !have_probe {
        imports.push_str(PROBE_IMPORT);
    }
    if !have_annotation {
        if !imports.is_empty() {
            imports.push('\n');
        }
        imports.push_str(ANNOTATION_IMPORT);
    }
    if imports.is_empty() {
        return None;
    }

    Some(match insert_after {
        Some(pos) => Edit {
            start: pos,
            end: pos,
            text: format!("\n{imports}"),
        },
        None => Edit {
            start: 0,
            end: 0,
            text: format!("{imports}\n\n"),
        },
    })
}

/// The exact qualified name an import declaration brings in. Substring
/// matching would be fooled by a longer name sharing the prefix.
fn imported_name<'t>(unit: &'t JavaUnit, import: Node<'_>) -> Option<&'t str> {
    let mut cursor = import.walk();
    import
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|n| unit.text(n))
}

fn has_traced_annotation(unit: &JavaUnit, decl: Node<'_>) -> bool {
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        if child.kind() != "modifiers" {
            continue;
        }
        let mut mc = child.walk();
        for modifier in child.children(&mut mc) {
            if matches!(modifier.kind(), "marker_annotation" | "annotation") {
                let name = modifier
                    .child_by_field_name("name")
                    .map(|n| unit.text(n))
                    .unwrap_or_default();
                if name == ANNOTATION_NAME || name == "org.jtrace.Traced" {
                    return true;
                }
            }
        }
    }
    false
}

struct Ctx {
    receiver: &'static str,
    has_return_holder: bool,
    signature: String,
    file_path: String,
}

fn build_instrumented_body(
    site: &MethodSite<'_>,
    original: &[Stmt],
    filter: &FieldFilter,
    file_path: &str,
) -> Vec<Stmt> {
    let ctx = Ctx {
        receiver: if site.is_static { "null" } else { "this" },
        has_return_holder: site.return_type.is_some(),
        signature: escape_java_string(&site.signature),
        file_path: escape_java_string(file_path),
    };

    let mut out = Vec::new();

    // Delegation first: field state is not valid until after super()/this().
    let tail = match original.first() {
        Some(stmt @ Stmt::ExplicitConstructorInvocation(_)) if site.is_constructor => {
            out.push(stmt.clone());
            &original[1..]
        }
        _ => original,
    };

    out.push(Stmt::Verbatim(format!(
        "final String {ID_VAR} = TraceProbe.newInvocationId();"
    )));
    out.push(Stmt::Verbatim(format!(
        "final java.util.Map<String, Object> {PARAMS_VAR} = new java.util.LinkedHashMap<>();"
    )));
    for param in &site.params {
        out.push(Stmt::Verbatim(format!(
            "{PARAMS_VAR}.put(\"{}\", {});",
            param.name, param.name
        )));
    }
    out.extend(filter_literal(filter));
    out.push(Stmt::Verbatim(format!(
        "TraceProbe.writeEntry({}, {PARAMS_VAR}, {ID_VAR}, \"{}\", \"{}\", {FILTER_VAR});",
        ctx.receiver, ctx.signature, ctx.file_path
    )));

    if let Some(return_type) = &site.return_type {
        out.push(Stmt::Verbatim(format!("{return_type} {RET_VAR};")));
    }

    let transformed = transform_stmts(tail, &ctx);
    let ends_terminating = transformed.last().is_some_and(Stmt::is_terminating);
    out.extend(transformed);

    // Fall-off-the-end path of void methods and constructors.
    if !ctx.has_return_holder && !ends_terminating {
        out.push(exit_call(&ctx, None));
    }
    out
}

/// Materialize the field filter as a nested map-of-lists literal, or bind the
/// filter variable to null when there is no restriction.
fn filter_literal(filter: &FieldFilter) -> Vec<Stmt> {
    if filter.is_empty() {
        return vec![Stmt::Verbatim(format!(
            "final java.util.Map<String, java.util.List<String>> {FILTER_VAR} = null;"
        ))];
    }
    let mut out = vec![Stmt::Verbatim(format!(
        "final java.util.Map<String, java.util.List<String>> {FILTER_VAR} = new java.util.LinkedHashMap<>();"
    ))];
    for (i, (alias, paths)) in filter.iter().enumerate() {
        let list_var = format!("__jtrace_fields_{i}");
        out.push(Stmt::Verbatim(format!(
            "final java.util.List<String> {list_var} = new java.util.ArrayList<>();"
        )));
        for path in paths {
            out.push(Stmt::Verbatim(format!(
                "{list_var}.add(\"{}\");",
                escape_java_string(path)
            )));
        }
        out.push(Stmt::Verbatim(format!(
            "{FILTER_VAR}.put(\"{}\", {list_var});",
            escape_java_string(alias)
        )));
    }
    out
}

/// Rewrite a statement list: route every return/throw through an exit report
/// and recurse into compound statements. Statements after a terminating
/// statement are unreachable and dropped.
fn transform_stmts(stmts: &[Stmt], ctx: &Ctx) -> Vec<Stmt> {
    let mut out = Vec::new();
    for stmt in stmts {
        match stmt {
            Stmt::Return(None) => {
                out.push(exit_call(ctx, None));
                out.push(Stmt::Return(None));
                break;
            }
            Stmt::Return(Some(expr)) => {
                if ctx.has_return_holder {
                    out.push(Stmt::Verbatim(format!("{RET_VAR} = {expr};")));
                    out.push(exit_call(ctx, Some(&format!("(Object) {RET_VAR}"))));
                    out.push(Stmt::Return(Some(RET_VAR.to_owned())));
                } else {
                    out.push(exit_call(ctx, None));
                    out.push(stmt.clone());
                }
                break;
            }
            Stmt::Throw(_) => {
                out.push(exit_call(ctx, None));
                out.push(stmt.clone());
                break;
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => out.push(Stmt::If {
                condition: condition.clone(),
                then_branch: transform_stmts(then_branch, ctx),
                else_branch: else_branch.as_ref().map(|b| transform_stmts(b, ctx)),
            }),
            Stmt::While { condition, body } => out.push(Stmt::While {
                condition: condition.clone(),
                body: transform_stmts(body, ctx),
            }),
            Stmt::DoWhile { body, condition } => out.push(Stmt::DoWhile {
                body: transform_stmts(body, ctx),
                condition: condition.clone(),
            }),
            Stmt::For { header, body } => out.push(Stmt::For {
                header: header.clone(),
                body: transform_stmts(body, ctx),
            }),
            Stmt::ForEach { header, body } => out.push(Stmt::ForEach {
                header: header.clone(),
                body: transform_stmts(body, ctx),
            }),
            // Each section is an independent termination boundary.
            Stmt::Try {
                resources,
                body,
                catches,
                finally,
            } => out.push(Stmt::Try {
                resources: resources.clone(),
                body: transform_stmts(body, ctx),
                catches: catches
                    .iter()
                    .map(|arm| CatchArm {
                        param: arm.param.clone(),
                        body: transform_stmts(&arm.body, ctx),
                    })
                    .collect(),
                finally: finally.as_ref().map(|b| transform_stmts(b, ctx)),
            }),
            Stmt::Block(body) => out.push(Stmt::Block(transform_stmts(body, ctx))),
            Stmt::ExplicitConstructorInvocation(_) | Stmt::Verbatim(_) => out.push(stmt.clone()),
        }
    }
    out
}

fn exit_call(ctx: &Ctx, ret: Option<&str>) -> Stmt {
    Stmt::Verbatim(format!(
        "TraceProbe.writeExit({}, {}, {ID_VAR}, \"{}\", \"{}\", {FILTER_VAR});",
        ctx.receiver,
        ret.unwrap_or("null"),
        ctx.signature,
        ctx.file_path
    ))
}

fn escape_java_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
