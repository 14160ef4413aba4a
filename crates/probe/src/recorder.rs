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

//! Process-wide sink for method entry/exit trace events.
//!
//! Instrumented code may run on many threads at once; every event takes one
//! global lock across record construction, the in-memory append, and the
//! full rewrite of the output file, so the trace file is a single well-formed
//! JSON array at any point a consumer inspects it.

use crate::inspect::Inspect;
use crate::serialize::serialize;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Alias → allowed dotted field paths. The receiver's alias is
/// [`SELF_ALIAS`]; every other alias is a sanitized parameter name. An empty
/// path list (or a missing alias) means unrestricted serialization.
pub type FieldFilter = IndexMap<String, Vec<String>>;

/// Alias under which the receiver's field paths are filtered.
pub const SELF_ALIAS: &str = "_self";

/// Environment variable naming the trace output file.
pub const OUTPUT_ENV_VAR: &str = "JTRACE_OUT";

/// Fallback output path when [`OUTPUT_ENV_VAR`] is unset or empty.
pub const DEFAULT_OUTPUT_PATH: &str = "jtrace.out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Entry,
    Exit,
}

/// One entry or exit event. Written once, never mutated; every entry record
/// has at most one exit record sharing its `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub id: String,
    pub phase: Phase,
    #[serde(rename = "self")]
    pub self_value: Value,
    pub params: Value,
    pub ret: Value,
    pub method_signature: String,
    pub file_path: String,
}

/// A failed trace write is a test-infrastructure failure: a missing or
/// truncated trace silently defeats the tool, so it escalates instead of
/// being swallowed.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to write trace file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode trace records: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The trace sink. One process-wide instance serves instrumented code (see
/// [`write_entry`]/[`write_exit`]); tests construct private instances with a
/// fixed output path.
pub struct Recorder {
    records: Mutex<Vec<TraceRecord>>,
    out_path: Option<PathBuf>,
}

impl Recorder {
    /// A recorder writing to a fixed path, ignoring the environment.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            out_path: Some(path.into()),
        }
    }

    /// A recorder resolving its output path from [`OUTPUT_ENV_VAR`] on every
    /// write, falling back to [`DEFAULT_OUTPUT_PATH`].
    pub fn from_env() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            out_path: None,
        }
    }

    fn output_path(&self) -> PathBuf {
        if let Some(path) = &self.out_path {
            return path.clone();
        }
        std::env::var(OUTPUT_ENV_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH))
    }

    /// Record a method entry. Panics on trace I/O failure, by contract.
    pub fn write_entry(
        &self,
        self_value: Option<&dyn Inspect>,
        params: &[(&str, &dyn Inspect)],
        id: &str,
        method_signature: &str,
        file_path: &str,
        filter: Option<&FieldFilter>,
    ) {
        let params_value = Value::Object(
            params
                .iter()
                .map(|(name, value)| {
                    let allowed = alias_paths(filter, name);
                    ((*name).to_owned(), serialize(*value, allowed))
                })
                .collect::<Map<String, Value>>(),
        );
        let record = self.build_record(Phase::Entry, self_value, params_value, Value::Null, id, method_signature, file_path, filter);
        if let Err(e) = self.append(record) {
            panic!("trace recording failed: {e}");
        }
    }

    /// Record a method exit. `ret` is `None` for void methods, constructors,
    /// and the pre-throw exit. Panics on trace I/O failure, by contract.
    pub fn write_exit(
        &self,
        self_value: Option<&dyn Inspect>,
        ret: Option<&dyn Inspect>,
        id: &str,
        method_signature: &str,
        file_path: &str,
        filter: Option<&FieldFilter>,
    ) {
        let ret_value = match ret {
            Some(v) => serialize(v, None),
            None => Value::Null,
        };
        let record = self.build_record(Phase::Exit, self_value, Value::Null, ret_value, id, method_signature, file_path, filter);
        if let Err(e) = self.append(record) {
            panic!("trace recording failed: {e}");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record(
        &self,
        phase: Phase,
        self_value: Option<&dyn Inspect>,
        params: Value,
        ret: Value,
        id: &str,
        method_signature: &str,
        file_path: &str,
        filter: Option<&FieldFilter>,
    ) -> TraceRecord {
        let self_json = match self_value {
            Some(v) => serialize(v, alias_paths(filter, SELF_ALIAS)),
            None => Value::Null,
        };
        TraceRecord {
            id: id.to_owned(),
            phase,
            self_value: self_json,
            params,
            ret,
            method_signature: method_signature.to_owned(),
            file_path: file_path.to_owned(),
        }
    }

    fn append(&self, record: TraceRecord) -> Result<(), TraceError> {
        // Single lock across append and rewrite: interleaved writes from
        // concurrent instrumented threads would corrupt the JSON array.
        let mut records = self.locked();
        records.push(record);
        let path = self.output_path();
        write_records(&path, &records)
    }

    /// A panic in instrumented code under test must not disable tracing for
    /// the rest of the run, so a poisoned lock is recovered.
    fn locked(&self) -> MutexGuard<'_, Vec<TraceRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            warn!("recovering poisoned trace lock");
            poisoned.into_inner()
        })
    }

    /// Number of records accumulated so far.
    pub fn len(&self) -> usize {
        self.locked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the accumulated records.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.locked().clone()
    }
}

fn write_records(path: &Path, records: &[TraceRecord]) -> Result<(), TraceError> {
    let json = serde_json::to_string(records)?;
    std::fs::write(path, json).map_err(|source| TraceError::Io {
        path: path.to_owned(),
        source,
    })
}

fn alias_paths<'a>(filter: Option<&'a FieldFilter>, alias: &str) -> Option<&'a [String]> {
    filter
        .and_then(|f| f.get(alias))
        .map(|paths| paths.as_slice())
}

lazy_static! {
    static ref GLOBAL_RECORDER: Recorder = Recorder::from_env();
}

/// Fresh correlation identifier linking one entry record to its exit record.
pub fn new_invocation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Record a method entry against the process-wide sink.
pub fn write_entry(
    self_value: Option<&dyn Inspect>,
    params: &[(&str, &dyn Inspect)],
    id: &str,
    method_signature: &str,
    file_path: &str,
    filter: Option<&FieldFilter>,
) {
    GLOBAL_RECORDER.write_entry(self_value, params, id, method_signature, file_path, filter);
}

/// Record a method exit against the process-wide sink.
pub fn write_exit(
    self_value: Option<&dyn Inspect>,
    ret: Option<&dyn Inspect>,
    id: &str,
    method_signature: &str,
    file_path: &str,
    filter: Option<&FieldFilter>,
) {
    GLOBAL_RECORDER.write_exit(self_value, ret, id, method_signature, file_path, filter);
}
