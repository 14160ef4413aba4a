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

//! JSON rendering of per-unit transformation metadata for downstream
//! consumers (reporting, diffing, javadoc enrichment).

use crate::javadoc::JavadocInfo;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Metadata for one transformed method/constructor, captured before the
/// rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResult {
    pub file: String,
    pub signature: String,
    pub code: String,
    pub javadoc: Option<JavadocInfo>,
}

/// The outcome of instrumenting one file.
pub struct InstrumentedFile {
    /// The rewritten source text.
    pub source: String,
    /// Per-unit metadata, in document order. Skipped units (no body) are
    /// omitted.
    pub units: Vec<TransformResult>,
}

/// Render one file's units as a pretty JSON array.
pub fn render_units(units: &[TransformResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(units)
}

/// Batch report over several files.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub instrumented: IndexMap<String, Vec<TransformResult>>,
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn add_file(&mut self, path: impl Into<String>, units: Vec<TransformResult>) {
        self.instrumented.insert(path.into(), units);
    }

    pub fn add_error(&mut self, error: impl ToString) {
        self.errors.push(error.to_string());
    }

    pub fn render(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn unit() -> TransformResult {
        TransformResult {
            file: "Demo.java".to_owned(),
            signature: "int f(int x)".to_owned(),
            code: "int f(int x) { return x; }".to_owned(),
            javadoc: None,
        }
    }

    #[test]
    fn units_render_as_an_array_with_nullable_javadoc() {
        let rendered = render_units(&[unit()]).unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            parsed,
            json!([{
                "file": "Demo.java",
                "signature": "int f(int x)",
                "code": "int f(int x) { return x; }",
                "javadoc": null,
            }])
        );
    }

    #[test]
    fn batch_report_keys_units_by_file() {
        let mut report = BatchReport::default();
        report.add_file("Demo.java", vec![unit()]);
        report.add_error("parse error in Broken.java at line 1, column 7: missing }");
        let parsed: Value = serde_json::from_str(&report.render().unwrap()).unwrap();
        assert_eq!(parsed["instrumented"]["Demo.java"][0]["signature"], json!("int f(int x)"));
        assert_eq!(
            parsed["errors"],
            json!(["parse error in Broken.java at line 1, column 7: missing }"])
        );
    }

    #[test]
    fn units_round_trip() {
        let original = unit();
        let rendered = render_units(std::slice::from_ref(&original)).unwrap();
        let back: Vec<TransformResult> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(back, vec![original]);
    }
}
