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

//! Method/constructor location within a parsed compilation unit.
//!
//! Signature strings arrive from an external diff/AST tool with arbitrary
//! formatting, so matching is by normalized-signature set membership rather
//! than positional index. Range mode selects declarations whose line spans
//! intersect the supplied changed-line ranges.

use crate::parse::JavaUnit;
use crate::{InstrumentError, TargetSpec};
use itertools::Itertools;
use tracing::warn;
use tree_sitter::Node;

/// One declared parameter, with the sanitized name the rest of the pipeline
/// (param map literal, field filter aliases) agrees on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub type_text: String,
    pub name: String,
}

/// One instrumentable declaration found in the file.
#[derive(Debug)]
pub struct MethodSite<'t> {
    pub node: Node<'t>,
    pub signature: String,
    pub is_constructor: bool,
    pub is_static: bool,
    /// `None` for constructors and `void` methods.
    pub return_type: Option<String>,
    pub params: Vec<ParamInfo>,
    pub body: Option<Node<'t>>,
}

impl MethodSite<'_> {
    pub fn is_void(&self) -> bool {
        self.return_type.is_none()
    }

    /// Inclusive 1-based line span of the whole declaration.
    pub fn line_span(&self) -> (usize, usize) {
        (
            self.node.start_position().row + 1,
            self.node.end_position().row + 1,
        )
    }
}

/// Canonicalize a signature string for matching across formatting variants:
/// collapse whitespace runs, strip a leading `final` from each parameter,
/// strip characters outside `[a-zA-Z0-9\s(),<>{}\[\]]`, trim.
pub fn normalize_signature(signature: &str) -> String {
    let collapsed = signature.split_whitespace().join(" ");
    let definal = match (collapsed.find('('), collapsed.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let params = collapsed[open + 1..close]
                .split(',')
                .map(|p| {
                    let p = p.trim();
                    p.strip_prefix("final ").unwrap_or(p)
                })
                .join(", ");
            format!("{}({})", &collapsed[..open], params)
        }
        _ => collapsed,
    };
    let filtered: String = definal
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || " (),<>{}[]".contains(*c))
        .collect();
    filtered.split_whitespace().join(" ")
}

/// Sanitize a parameter name for use as an identifier: keep `[a-zA-Z0-9_]`,
/// strip leading digits, fall back to a positional name.
pub fn sanitize_param_name(raw: &str, index: usize) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let trimmed = kept.trim_start_matches(|c: char| c.is_ascii_digit());
    if trimmed.is_empty() {
        format!("param{index}")
    } else {
        trimmed.to_owned()
    }
}

/// Every method and constructor declaration in the unit, in document order,
/// including those of nested types.
pub fn all_sites<'t>(unit: &'t JavaUnit) -> Vec<MethodSite<'t>> {
    let mut sites = Vec::new();
    let mut stack = vec![unit.root()];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        // Reverse so the stack pops children in document order.
        let children: Vec<_> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
        match node.kind() {
            "method_declaration" | "constructor_declaration" => {
                sites.push(site_for(unit, node));
            }
            _ => {}
        }
    }
    sites.sort_by_key(|s| s.node.start_byte());
    sites
}

fn site_for<'t>(unit: &'t JavaUnit, node: Node<'t>) -> MethodSite<'t> {
    let is_constructor = node.kind() == "constructor_declaration";
    let name = node
        .child_by_field_name("name")
        .map(|n| unit.text(n).to_owned())
        .unwrap_or_default();
    let params = parameter_infos(unit, node);
    let return_type = if is_constructor {
        None
    } else {
        node.child_by_field_name("type")
            .map(|n| unit.text(n).to_owned())
            .filter(|t| t != "void")
    };

    let rendered_params = params
        .iter()
        .map(|p| format!("{} {}", p.type_text, p.name))
        .join(", ");
    let signature = if is_constructor {
        format!("{name}({rendered_params})")
    } else {
        let type_text = node
            .child_by_field_name("type")
            .map(|n| unit.text(n).to_owned())
            .unwrap_or_else(|| "void".to_owned());
        format!("{type_text} {name}({rendered_params})")
    };

    MethodSite {
        node,
        signature,
        is_constructor,
        is_static: has_modifier(unit, node, "static"),
        return_type,
        params,
        body: node.child_by_field_name("body"),
    }
}

/// Ordered parameters with sanitized names. Varargs render as `Type... name`.
pub fn parameter_infos(unit: &JavaUnit, decl: Node<'_>) -> Vec<ParamInfo> {
    let Some(params_node) = decl.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut infos = Vec::new();
    let mut cursor = params_node.walk();
    for (i, child) in params_node
        .named_children(&mut cursor)
        .filter(|c| matches!(c.kind(), "formal_parameter" | "spread_parameter"))
        .enumerate()
    {
        let (type_text, raw_name) = if child.kind() == "spread_parameter" {
            // spread_parameter: (type) "..." (variable_declarator (identifier))
            let mut tc = child.walk();
            let named: Vec<_> = child.named_children(&mut tc).collect();
            let type_text = named
                .iter()
                .find(|n| n.kind() != "variable_declarator" && n.kind() != "modifiers")
                .map(|n| format!("{}...", unit.text(*n)))
                .unwrap_or_else(|| "Object...".to_owned());
            let raw_name = named
                .iter()
                .find(|n| n.kind() == "variable_declarator")
                .and_then(|d| d.child_by_field_name("name"))
                .map(|n| unit.text(n).to_owned())
                .unwrap_or_default();
            (type_text, raw_name)
        } else {
            let type_text = child
                .child_by_field_name("type")
                .map(|n| unit.text(n).to_owned())
                .unwrap_or_default();
            let raw_name = child
                .child_by_field_name("name")
                .map(|n| unit.text(n).to_owned())
                .unwrap_or_default();
            (type_text, raw_name)
        };
        infos.push(ParamInfo {
            type_text,
            name: sanitize_param_name(&raw_name, i),
        });
    }
    infos
}

/// Whether the declaration carries a given plain modifier keyword.
pub fn has_modifier(unit: &JavaUnit, decl: Node<'_>, keyword: &str) -> bool {
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        if child.kind() == "modifiers" {
            let mut mc = child.walk();
            return child
                .children(&mut mc)
                .any(|m| m.kind() == keyword || unit.text(m) == keyword);
        }
    }
    false
}

/// Select the declarations a target spec names.
///
/// Signature mode: zero matches is a reported error enumerating requested and
/// available signatures; a partial match is warned and proceeds with what was
/// found. Range mode: zero matches is warned, not an error, since an empty
/// intersection is a legitimate diff outcome.
pub fn locate<'t>(
    unit: &'t JavaUnit,
    path: &str,
    spec: &TargetSpec,
) -> Result<Vec<MethodSite<'t>>, InstrumentError> {
    let sites = all_sites(unit);
    match spec {
        TargetSpec::Signatures(requested) => {
            let wanted: Vec<String> = requested.iter().map(|s| normalize_signature(s)).collect();
            let matched: Vec<MethodSite<'t>> = sites
                .into_iter()
                .filter(|s| wanted.contains(&normalize_signature(&s.signature)))
                .collect();
            if matched.is_empty() {
                let available = all_sites(unit)
                    .iter()
                    .map(|s| normalize_signature(&s.signature))
                    .collect();
                return Err(InstrumentError::NoMatchingTargets {
                    path: path.to_owned(),
                    requested: wanted,
                    available,
                });
            }
            if matched.len() < requested.len() {
                warn!(
                    path,
                    requested = requested.len(),
                    found = matched.len(),
                    "not all requested signatures matched, proceeding with the found subset"
                );
            }
            Ok(matched)
        }
        TargetSpec::LineRanges(ranges) => {
            let matched: Vec<MethodSite<'t>> = sites
                .into_iter()
                .filter(|s| {
                    let (start, end) = s.line_span();
                    ranges.iter().any(|(rs, re)| start <= *re && *rs <= end)
                })
                .collect();
            if matched.is_empty() {
                warn!(path, "no declarations intersect the requested line ranges");
            }
            Ok(matched)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstrumentError, TargetSpec};
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use unindent::unindent;

    fn fixture() -> JavaUnit {
        let source = unindent(
            r#"
            public class Calculator {
                private int total;

                public Calculator(int seed) {
                    this.total = seed;
                }

                public int calculate(int a, int b, int c) {
                    return a + b + c;
                }

                static String describe(final String label, int... values) {
                    return label + values.length;
                }
            }
            "#,
        );
        JavaUnit::parse("Calculator.java", source).unwrap()
    }

    #[test_case("int  add( int a , int b )", "int add(int a, int b)"; "whitespace runs collapse")]
    #[test_case("String describe(final String label)", "String describe(String label)"; "leading final stripped per parameter")]
    #[test_case("int get(@NonNull String key)", "int get(NonNull String key)"; "disallowed characters dropped")]
    #[test_case("List<String> names()", "List<String> names()"; "generics survive")]
    fn signature_normalization(input: &str, expected: &str) {
        assert_eq!(normalize_signature(input), expected);
    }

    #[test_case("count", 0, "count"; "plain name kept")]
    #[test_case("_buf", 1, "_buf"; "leading underscore kept")]
    #[test_case("1st", 0, "st"; "leading digits stripped")]
    #[test_case("$$$", 2, "param2"; "empty after sanitization falls back")]
    fn parameter_sanitization(raw: &str, index: usize, expected: &str) {
        assert_eq!(sanitize_param_name(raw, index), expected);
    }

    #[test]
    fn derives_signatures_in_document_order() {
        let unit = fixture();
        let sigs: Vec<String> = all_sites(&unit).iter().map(|s| s.signature.clone()).collect();
        assert_eq!(
            sigs,
            vec![
                "Calculator(int seed)".to_owned(),
                "int calculate(int a, int b, int c)".to_owned(),
                "String describe(String label, int... values)".to_owned(),
            ]
        );
    }

    #[test]
    fn matches_by_normalized_signature() {
        let unit = fixture();
        let spec = TargetSpec::Signatures(vec!["int   calculate(int a,int b,int c)".to_owned()]);
        let found = locate(&unit, "Calculator.java", &spec).unwrap();
        assert_eq!(found.len(), 1);
        assert!(!found[0].is_constructor);
        assert_eq!(found[0].return_type.as_deref(), Some("int"));
    }

    #[test]
    fn missing_signature_reports_requested_and_available() {
        let unit = fixture();
        let spec = TargetSpec::Signatures(vec!["int calculate(int a, int b)".to_owned()]);
        let err = locate(&unit, "Calculator.java", &spec).unwrap_err();
        match err {
            InstrumentError::NoMatchingTargets {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, vec!["int calculate(int a, int b)".to_owned()]);
                assert!(available.contains(&"int calculate(int a, int b, int c)".to_owned()));
            }
            other => panic!("unexpected error: {other}"),
        }
        // The rendered diagnostic itself carries both strings.
        let err = locate(&unit, "Calculator.java", &spec).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("int calculate(int a, int b)"));
        assert!(text.contains("int calculate(int a, int b, int c)"));
    }

    #[test]
    fn range_mode_selects_intersecting_spans() {
        let unit = fixture();
        let spec = TargetSpec::LineRanges(vec![(9, 9)]);
        let found = locate(&unit, "Calculator.java", &spec).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signature, "int calculate(int a, int b, int c)");
    }

    #[test]
    fn range_mode_with_no_intersection_is_empty_not_fatal() {
        let unit = fixture();
        let spec = TargetSpec::LineRanges(vec![(200, 300)]);
        let found = locate(&unit, "Calculator.java", &spec).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn constructor_and_static_flags() {
        let unit = fixture();
        let sites = all_sites(&unit);
        assert!(sites[0].is_constructor);
        assert!(sites[0].is_void());
        assert!(!sites[0].is_static);
        assert!(sites[2].is_static);
    }
}
