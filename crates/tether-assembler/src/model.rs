// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tether_common_protocol::{HistoryRole, ToolStatus};

// ============================================================================
// Parts
// ============================================================================

/// Local identifier of a part. Never sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PartId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextPart {
	pub id: PartId,
	pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolPart {
	pub id: PartId,
	pub tool_name: String,
	pub status: ToolStatus,
	pub input: Option<Value>,
	pub output: Option<Value>,
	pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
	Text(TextPart),
	Tool(ToolPart),
}

impl Part {
	pub fn id(&self) -> PartId {
		match self {
			Self::Text(p) => p.id,
			Self::Tool(p) => p.id,
		}
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(p) => Some(&p.text),
			Self::Tool(_) => None,
		}
	}
}

// ============================================================================
// Turns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
	Complete,
	Interrupted,
}

/// One prompt/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
	pub request_id: String,
	pub parts: Vec<Part>,
	/// `None` while live.
	pub completion: Option<Completion>,
	/// The remote flagged the last text chunk. The turn stays live until a
	/// terminal event.
	pub stream_done: bool,
}

impl Turn {
	pub(crate) fn new(request_id: impl Into<String>) -> Self {
		Self {
			request_id: request_id.into(),
			parts: Vec::new(),
			completion: None,
			stream_done: false,
		}
	}

	pub fn is_live(&self) -> bool {
		self.completion.is_none()
	}

	/// Concatenated text of every text part.
	pub fn text(&self) -> String {
		self.parts.iter().filter_map(Part::as_text).collect()
	}
}

// ============================================================================
// Display records
// ============================================================================

/// Everything the panel shows, in display order. Records are frozen: once
/// appended they only change through an authoritative turn snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum DisplayRecord {
	Prompt {
		request_id: String,
		content: String,
	},
	Turn(Turn),
	/// Cost and timing of a finished turn, or the failure of a turn that
	/// rendered nothing.
	Metadata {
		request_id: String,
		success: bool,
		error: Option<String>,
		cost_usd: Option<f64>,
		duration_ms: Option<u64>,
	},
	Error {
		request_id: Option<String>,
		message: String,
	},
	/// A message restored from the connect-time history snapshot.
	History {
		role: HistoryRole,
		content: String,
		tool_name: Option<String>,
		timestamp: Option<DateTime<Utc>>,
	},
}

impl DisplayRecord {
	pub fn as_turn(&self) -> Option<&Turn> {
		match self {
			Self::Turn(turn) => Some(turn),
			_ => None,
		}
	}
}

/// What the agent last said it was doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentActivity {
	pub value: String,
	pub request_id: Option<String>,
	pub processing: bool,
}

pub(crate) fn timestamp_from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
	millis.and_then(DateTime::from_timestamp_millis)
}
