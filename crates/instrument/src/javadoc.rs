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

//! Capture of the `/** ... */` block preceding a declaration.
//!
//! Structured into description plus `@param`/`@return`/`@throws` tags.
//! Inherited documentation resolution is out of scope; only the literal
//! comment attached to the declaration is captured.

use crate::parse::JavaUnit;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavadocInfo {
    pub description: String,
    pub params: IndexMap<String, String>,
    pub returns: Option<String>,
    pub throws: IndexMap<String, String>,
}

/// The javadoc block immediately preceding a declaration, if any. Other
/// comments between the block and the declaration break the attachment.
pub fn javadoc_for(unit: &JavaUnit, decl: Node<'_>) -> Option<JavadocInfo> {
    let mut sibling = decl.prev_sibling();
    while let Some(node) = sibling {
        match node.kind() {
            "block_comment" => {
                let text = unit.text(node);
                return text.starts_with("/**").then(|| parse_javadoc(text));
            }
            "line_comment" => sibling = node.prev_sibling(),
            _ => return None,
        }
    }
    None
}

/// Parse the raw `/** ... */` text. Lines before the first tag form the
/// description; tag bodies continue across lines until the next tag.
pub fn parse_javadoc(raw: &str) -> JavadocInfo {
    let body = raw
        .trim()
        .trim_start_matches("/**")
        .trim_end_matches("*/");

    let mut info = JavadocInfo::default();
    let mut description_lines: Vec<String> = Vec::new();
    // (tag, subject, accumulated text)
    let mut current: Option<(String, String, String)> = None;

    for line in body.lines() {
        let line = line.trim().trim_start_matches('*').trim();
        if let Some(rest) = line.strip_prefix('@') {
            flush_tag(&mut info, current.take());
            let mut words = rest.splitn(2, char::is_whitespace);
            let tag = words.next().unwrap_or_default().to_owned();
            let remainder = words.next().unwrap_or_default().trim().to_owned();
            current = Some(match tag.as_str() {
                "param" | "throws" | "exception" => {
                    let mut parts = remainder.splitn(2, char::is_whitespace);
                    let subject = parts.next().unwrap_or_default().to_owned();
                    let text = parts.next().unwrap_or_default().trim().to_owned();
                    (tag, subject, text)
                }
                _ => (tag, String::new(), remainder),
            });
        } else if let Some((_, _, text)) = current.as_mut() {
            if !line.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(line);
            }
        } else if !(line.is_empty() && description_lines.is_empty()) {
            description_lines.push(line.to_owned());
        }
    }
    flush_tag(&mut info, current);

    while description_lines.last().is_some_and(|l| l.is_empty()) {
        description_lines.pop();
    }
    info.description = description_lines.join("\n");
    info
}

fn flush_tag(info: &mut JavadocInfo, tag: Option<(String, String, String)>) {
    let Some((tag, subject, text)) = tag else {
        return;
    };
    match tag.as_str() {
        "param" => {
            info.params.insert(subject, text);
        }
        "throws" | "exception" => {
            info.throws.insert(subject, text);
        }
        "return" | "returns" => info.returns = Some(text),
        _ => {}
    }
}
