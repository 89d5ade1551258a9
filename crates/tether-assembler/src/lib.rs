// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Streaming message assembler.
//!
//! Folds the agent's event stream (text deltas, tool events, terminal results,
//! history and turn snapshots) into an ordered list of display records with
//! at most one live turn.

mod assembler;
mod model;

pub use assembler::Assembler;
pub use model::{AgentActivity, Completion, DisplayRecord, Part, PartId, TextPart, ToolPart, Turn};
