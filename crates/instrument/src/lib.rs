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

//! Source-to-source instrumentation of Java methods and constructors.
//!
//! Given a Java source file and a set of targets (signature strings or
//! changed line ranges), this crate parses the file, locates the matching
//! declarations, computes per-method field filters, and rewrites each body so
//! that every entry, return, throw, and fall-through path reports to the
//! runtime trace probe. The rewritten file compiles against the injected
//! `org.jtrace.TraceProbe` runtime; the Rust rendition of that runtime lives
//! in the companion `jtrace-probe` crate.

pub mod ast;
pub mod fields;
pub mod javadoc;
pub mod locate;
pub mod parse;
pub mod report;
pub mod transform;
pub mod unparse;

use std::path::Path;
use thiserror::Error;

pub use parse::JavaUnit;
pub use report::{InstrumentedFile, TransformResult};
pub use transform::instrument_source;

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("parse error in {path} at line {line}, column {column}: {message}")]
    ParseError {
        path: String,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("no requested method matches in {path}; requested: {requested:?}; available: {available:?}")]
    NoMatchingTargets {
        path: String,
        requested: Vec<String>,
        available: Vec<String>,
    },
    #[error("malformed line range {token:?}, expected \"start:end\"")]
    InvalidRange { token: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// How target methods are selected within one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Free-form signature strings, matched after normalization.
    Signatures(Vec<String>),
    /// Inclusive `[start, end]` line ranges; a declaration is selected when
    /// its line span intersects any range.
    LineRanges(Vec<(usize, usize)>),
}

impl TargetSpec {
    /// Parse `"start:end"` tokens, as supplied by the diff-range provider.
    pub fn from_range_tokens(tokens: &[String]) -> Result<Self, InstrumentError> {
        let mut ranges = Vec::with_capacity(tokens.len());
        for token in tokens {
            let parsed = token.split_once(':').and_then(|(start, end)| {
                let start = start.trim().parse::<usize>().ok()?;
                let end = end.trim().parse::<usize>().ok()?;
                Some((start, end))
            });
            match parsed {
                Some((start, end)) if start <= end => ranges.push((start, end)),
                _ => {
                    return Err(InstrumentError::InvalidRange {
                        token: token.clone(),
                    });
                }
            }
        }
        Ok(TargetSpec::LineRanges(ranges))
    }
}

/// Read, instrument, and return the rewritten file plus per-unit metadata.
pub fn instrument_file(
    path: impl AsRef<Path>,
    spec: &TargetSpec,
) -> Result<InstrumentedFile, InstrumentError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let source = std::fs::read_to_string(path).map_err(|source| InstrumentError::Io {
        path: display.clone(),
        source,
    })?;
    transform::instrument_source(&display, &source, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn range_tokens_parse_inclusive_pairs() {
        let spec =
            TargetSpec::from_range_tokens(&["3:7".to_owned(), " 10 : 10 ".to_owned()]).unwrap();
        assert_eq!(spec, TargetSpec::LineRanges(vec![(3, 7), (10, 10)]));
    }

    #[test]
    fn malformed_range_token_is_rejected() {
        for bad in ["7", "a:b", "9:3", "4:"] {
            let err = TargetSpec::from_range_tokens(&[bad.to_owned()]).unwrap_err();
            assert!(matches!(err, InstrumentError::InvalidRange { .. }), "{bad}");
        }
    }
}
