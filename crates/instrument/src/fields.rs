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

//! Static field-usage analysis for a method body.
//!
//! Produces a per-alias allow-list of dotted field paths, limiting what the
//! runtime probe serializes for the receiver and each parameter. The filter
//! is a trace-size optimization only: paths attributed to `_self` come from
//! `this.`/`super.` chains and from bare references to instance fields of the
//! enclosing class; paths attributed to a parameter alias come from chains
//! rooted at that parameter's name. Chains rooted anywhere else are not
//! attributable and contribute nothing.

use crate::locate::MethodSite;
use crate::parse::JavaUnit;
use jtrace_probe::{FieldFilter, SELF_ALIAS};
use std::collections::HashSet;
use tree_sitter::Node;

/// Compute the minimal field filter for one method/constructor body. An
/// empty result means "no restriction".
pub fn compute_field_filter(unit: &JavaUnit, site: &MethodSite<'_>) -> FieldFilter {
    let Some(body) = site.body else {
        return FieldFilter::new();
    };

    let param_names: HashSet<String> = site.params.iter().map(|p| p.name.clone()).collect();
    let class_fields = enclosing_instance_fields(unit, site.node);
    let shadowed = shadow_set(unit, body, &param_names);

    let mut filter = FieldFilter::new();
    collect(unit, body, &param_names, &class_fields, &shadowed, &mut filter);
    filter.retain(|_, paths| !paths.is_empty());
    filter
}

fn collect(
    unit: &JavaUnit,
    node: Node<'_>,
    param_names: &HashSet<String>,
    class_fields: &HashSet<String>,
    shadowed: &HashSet<String>,
    filter: &mut FieldFilter,
) {
    match node.kind() {
        "field_access" => {
            // Only the outermost link of a chain carries the full path.
            if !is_object_of_field_access(node) {
                if let Some((alias, path)) = resolve_chain(unit, node, param_names) {
                    push_path(filter, &alias, path);
                }
            }
            // Still descend: the chain's root may itself be an attributable
            // expression (e.g. a method call argument inside an array index).
        }
        "identifier" => {
            let name = unit.text(node);
            if class_fields.contains(name)
                && !shadowed.contains(name)
                && is_bare_value_reference(node)
            {
                push_path(filter, SELF_ALIAS, name.to_owned());
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(unit, child, param_names, class_fields, shadowed, filter);
    }
}

/// Resolve `root.a.b` into `(alias, "a.b")` for `this`/`super` roots, or
/// `(alias, "a.b")` minus the root for a parameter root. `None` when the
/// chain starts at anything else.
fn resolve_chain(
    unit: &JavaUnit,
    node: Node<'_>,
    param_names: &HashSet<String>,
) -> Option<(String, String)> {
    let mut segments = Vec::new();
    let mut current = node;
    loop {
        let field = current.child_by_field_name("field")?;
        segments.push(unit.text(field).to_owned());
        let object = current.child_by_field_name("object")?;
        match object.kind() {
            "field_access" => current = object,
            "this" | "super" => {
                segments.reverse();
                return Some((SELF_ALIAS.to_owned(), segments.join(".")));
            }
            "identifier" => {
                let root = unit.text(object);
                if param_names.contains(root) {
                    segments.reverse();
                    return Some((root.to_owned(), segments.join(".")));
                }
                return None;
            }
            _ => return None,
        }
    }
}

fn push_path(filter: &mut FieldFilter, alias: &str, path: String) {
    let paths = filter.entry(alias.to_owned()).or_default();
    if !paths.contains(&path) {
        paths.push(path);
    }
}

fn is_object_of_field_access(node: Node<'_>) -> bool {
    node.parent().is_some_and(|p| {
        p.kind() == "field_access"
            && p.child_by_field_name("object")
                .is_some_and(|o| o.id() == node.id())
    })
}

/// Whether an identifier reads as a bare value, as opposed to being the
/// `.field` of a qualified access, an invoked method's name, a declared
/// name, or a type position.
fn is_bare_value_reference(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    let in_field = |p: Node<'_>, field: &str| {
        p.child_by_field_name(field)
            .is_some_and(|c| c.id() == node.id())
    };
    match parent.kind() {
        "field_access" => !in_field(parent, "field"),
        "method_invocation" => !in_field(parent, "name"),
        "variable_declarator" | "formal_parameter" | "catch_formal_parameter" => {
            !in_field(parent, "name")
        }
        "labeled_statement" | "break_statement" | "continue_statement" => false,
        _ => true,
    }
}

/// Names that shadow instance fields anywhere in the body: every declared
/// local plus every parameter. Flat over the whole body, not block-scoped.
fn shadow_set(unit: &JavaUnit, body: Node<'_>, param_names: &HashSet<String>) -> HashSet<String> {
    let mut shadowed = param_names.clone();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if matches!(
            node.kind(),
            "local_variable_declaration" | "enhanced_for_statement" | "catch_formal_parameter"
        ) {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "variable_declarator" {
                    if let Some(name) = child.child_by_field_name("name") {
                        shadowed.insert(unit.text(name).to_owned());
                    }
                }
            }
            if let Some(name) = node.child_by_field_name("name") {
                shadowed.insert(unit.text(name).to_owned());
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
    shadowed
}

/// Instance field names declared by the class enclosing a declaration.
fn enclosing_instance_fields(unit: &JavaUnit, decl: Node<'_>) -> HashSet<String> {
    let mut fields = HashSet::new();
    let mut node = decl;
    let class_body = loop {
        let Some(parent) = node.parent() else {
            return fields;
        };
        if matches!(parent.kind(), "class_body" | "enum_body_declarations") {
            break parent;
        }
        node = parent;
    };

    let mut cursor = class_body.walk();
    for member in class_body.named_children(&mut cursor) {
        if member.kind() != "field_declaration" {
            continue;
        }
        if crate::locate::has_modifier(unit, member, "static") {
            continue;
        }
        let mut mc = member.walk();
        for child in member.children(&mut mc) {
            if child.kind() == "variable_declarator" {
                if let Some(name) = child.child_by_field_name("name") {
                    fields.insert(unit.text(name).to_owned());
                }
            }
        }
    }
    fields
}
