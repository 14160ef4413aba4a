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

//! Runtime side of the trace pipeline: value introspection, bounded JSON
//! serialization, and the process-wide sink instrumented methods report to.
//!
//! The instrumentation layer rewrites method bodies to call [`write_entry`]
//! at the top and [`write_exit`] on every return, throw, and fall-through
//! path, correlating the pair with an id from [`new_invocation_id`]. This
//! crate turns those calls into an atomically-rewritten JSON array of
//! [`TraceRecord`]s.

pub mod inspect;
pub mod recorder;
pub mod serialize;

pub use inspect::{Inspect, Shape, Slot};
pub use recorder::{
    DEFAULT_OUTPUT_PATH, FieldFilter, OUTPUT_ENV_VAR, Phase, Recorder, SELF_ALIAS, TraceError,
    TraceRecord, new_invocation_id, write_entry, write_exit,
};
pub use serialize::{MAX_SERIALIZATION_DEPTH, serialize};
