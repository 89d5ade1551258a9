// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Outbound requests
// ============================================================================

/// Requests the client sends over the session channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
	Prompt(PromptRequest),
	NewSession,
	Stop,
	DiscardChanges,
	ListBranches,
	SwitchBranch(SwitchBranchRequest),
	CreateBranch(CreateBranchRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
	pub id: String,
	pub content: String,
	/// Server-side ids returned by the upload side channel.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub attachment_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchBranchRequest {
	pub branch_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchRequest {
	pub branch_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub base: Option<String>,
}

// ============================================================================
// Inbound events
// ============================================================================

/// Events the remote side streams back over the session channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
	TextDelta(TextDelta),
	ToolEvent(ToolEvent),
	TerminalResult(TerminalResult),
	TerminalError(TerminalError),
	Status(StatusUpdate),
	SessionReset,
	StopAck,
	BulkHistory(BulkHistory),
	TurnSnapshot(TurnSnapshot),
	BranchList(BranchList),
	BranchSwitchResult(BranchOutcome),
	BranchCreateResult(BranchOutcome),
	DiscardResult(DiscardResult),
	/// Any discriminator this build does not know about.
	#[serde(other)]
	Unknown,
}

impl ServerEvent {
	/// The request id the event belongs to, when it carries one.
	pub fn request_id(&self) -> Option<&str> {
		match self {
			Self::TextDelta(e) => Some(&e.request_id),
			Self::ToolEvent(e) => Some(&e.request_id),
			Self::TerminalResult(e) => Some(&e.request_id),
			Self::TerminalError(e) => e.request_id.as_deref(),
			Self::Status(e) => e.request_id.as_deref(),
			Self::TurnSnapshot(e) => Some(&e.request_id),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDelta {
	pub request_id: String,
	pub chunk: String,
	#[serde(default)]
	pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
	Started,
	Completed,
	Failed,
}

impl ToolStatus {
	/// Whether the tool has left `started` and should be shown.
	pub fn is_settled(self) -> bool {
		!matches!(self, Self::Started)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEvent {
	pub request_id: String,
	pub tool_name: String,
	pub status: ToolStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub input: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub output: Option<Value>,
	/// Milliseconds since the unix epoch.
	#[serde(default)]
	pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalResult {
	pub request_id: String,
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cost_usd: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
}

impl TerminalResult {
	/// Whether cost or duration accompanied the result.
	pub fn has_metrics(&self) -> bool {
		self.cost_usd.is_some() || self.duration_ms.is_some()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalError {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_id: Option<String>,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
	pub value: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_id: Option<String>,
}

impl StatusUpdate {
	/// Whether the agent reports that it is working on something.
	pub fn is_processing(&self) -> bool {
		matches!(
			self.value.as_str(),
			"processing" | "running" | "thinking" | "busy"
		)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRole {
	User,
	Assistant,
	Tool,
	System,
}

/// One persisted message delivered in the connect-time snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
	pub role: HistoryRole,
	#[serde(default)]
	pub content: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tool_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkHistory {
	#[serde(default)]
	pub entries: Vec<HistoryEntry>,
}

/// Authoritative replacement for the parts of one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnSnapshot {
	pub request_id: String,
	#[serde(default)]
	pub parts: Vec<SnapshotPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SnapshotPart {
	Text {
		text: String,
	},
	#[serde(rename_all = "camelCase")]
	Tool {
		tool_name: String,
		status: ToolStatus,
		#[serde(default)]
		input: Option<Value>,
		#[serde(default)]
		output: Option<Value>,
		#[serde(default)]
		timestamp: Option<i64>,
	},
}

// ============================================================================
// Branches
// ============================================================================

/// One branch as listed by the executing side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRecord {
	pub name: String,
	#[serde(default)]
	pub current: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pr_number: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pr_title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_activity: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub remote_only: bool,
}

impl BranchRecord {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			current: false,
			pr_number: None,
			pr_title: None,
			last_activity: None,
			remote_only: false,
		}
	}

	pub fn current(mut self) -> Self {
		self.current = true;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchList {
	#[serde(default)]
	pub branches: Vec<BranchRecord>,
}

/// Result of a switch or create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOutcome {
	pub branch_name: String,
	pub success: bool,
	/// On failure the reason; on success an optional warning, such as a
	/// stash that could not be restored cleanly.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardResult {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Frame;
	use serde_json::json;

	fn decode(value: Value) -> ServerEvent {
		Frame::from_value(value).unwrap().decode().unwrap()
	}

	#[test]
	fn test_prompt_wire_shape() {
		let frame = Frame::encode(&ClientMessage::Prompt(PromptRequest {
			id: "p1".to_string(),
			content: "add a button".to_string(),
			attachment_refs: vec![],
		}))
		.unwrap();
		assert_eq!(frame.frame_type(), "prompt");
		assert_eq!(frame.get("id"), Some(&json!("p1")));
		assert_eq!(frame.get("content"), Some(&json!("add a button")));
		assert_eq!(frame.get("attachmentRefs"), None);
	}

	#[test]
	fn test_unit_requests_carry_only_type() {
		for (message, expected) in [
			(ClientMessage::NewSession, "new-session"),
			(ClientMessage::Stop, "stop"),
			(ClientMessage::DiscardChanges, "discard-changes"),
			(ClientMessage::ListBranches, "list-branches"),
		] {
			let frame = Frame::encode(&message).unwrap();
			assert_eq!(frame.frame_type(), expected);
			assert_eq!(frame.to_text(), format!(r#"{{"type":"{expected}"}}"#));
		}
	}

	#[test]
	fn test_switch_branch_uses_camel_case() {
		let frame = Frame::encode(&ClientMessage::SwitchBranch(SwitchBranchRequest {
			branch_name: "feature/x".to_string(),
		}))
		.unwrap();
		assert_eq!(frame.frame_type(), "switch-branch");
		assert_eq!(frame.get("branchName"), Some(&json!("feature/x")));
	}

	#[test]
	fn test_decode_text_delta() {
		let event = decode(json!({
			"type": "text-delta",
			"requestId": "p1",
			"chunk": "Sure, ",
			"done": false,
		}));
		assert_eq!(
			event,
			ServerEvent::TextDelta(TextDelta {
				request_id: "p1".to_string(),
				chunk: "Sure, ".to_string(),
				done: false,
			})
		);
		assert_eq!(event.request_id(), Some("p1"));
	}

	#[test]
	fn test_decode_terminal_result_metrics() {
		let event = decode(json!({
			"type": "terminal-result",
			"requestId": "p1",
			"success": true,
			"costUsd": 0.012,
			"durationMs": 5400,
		}));
		let ServerEvent::TerminalResult(result) = event else {
			panic!("expected terminal-result");
		};
		assert!(result.has_metrics());
		assert_eq!(result.duration_ms, Some(5400));
		assert_eq!(result.payload, None);
	}

	#[test]
	fn test_decode_unit_events() {
		assert_eq!(decode(json!({"type": "session-reset"})), ServerEvent::SessionReset);
		assert_eq!(decode(json!({"type": "stop-ack"})), ServerEvent::StopAck);
	}

	#[test]
	fn test_unknown_type_is_tolerated() {
		assert_eq!(
			decode(json!({"type": "bundle-progress", "done": 3})),
			ServerEvent::Unknown
		);
	}

	#[test]
	fn test_decode_branch_list() {
		let event = decode(json!({
			"type": "branch-list",
			"branches": [
				{"name": "main", "current": true},
				{"name": "feature", "prNumber": 12, "prTitle": "Add button",
				 "lastActivity": "2025-06-01T10:00:00Z"},
				{"name": "old", "remoteOnly": true},
			],
		}));
		let ServerEvent::BranchList(list) = event else {
			panic!("expected branch-list");
		};
		assert_eq!(list.branches.len(), 3);
		assert!(list.branches[0].current);
		assert_eq!(list.branches[1].pr_number, Some(12));
		assert!(list.branches[1].last_activity.is_some());
		assert!(list.branches[2].remote_only);
	}

	#[test]
	fn test_decode_history_roles() {
		let event = decode(json!({
			"type": "bulk-history",
			"entries": [
				{"role": "user", "content": "hi"},
				{"role": "assistant", "content": "hello"},
				{"role": "tool", "content": "", "toolName": "Edit"},
				{"role": "system", "content": "compacted"},
			],
		}));
		let ServerEvent::BulkHistory(history) = event else {
			panic!("expected bulk-history");
		};
		let roles: Vec<_> = history.entries.iter().map(|e| e.role).collect();
		assert_eq!(
			roles,
			vec![
				HistoryRole::User,
				HistoryRole::Assistant,
				HistoryRole::Tool,
				HistoryRole::System
			]
		);
	}

	#[test]
	fn test_decode_turn_snapshot_parts() {
		let event = decode(json!({
			"type": "turn-snapshot",
			"requestId": "p1",
			"parts": [
				{"kind": "text", "text": "done"},
				{"kind": "tool", "toolName": "Bash", "status": "completed", "timestamp": 1},
			],
		}));
		let ServerEvent::TurnSnapshot(snapshot) = event else {
			panic!("expected turn-snapshot");
		};
		assert_eq!(snapshot.parts.len(), 2);
		assert!(matches!(
			&snapshot.parts[1],
			SnapshotPart::Tool { tool_name, status: ToolStatus::Completed, .. } if tool_name == "Bash"
		));
	}

	#[test]
	fn test_status_processing_values() {
		let busy = StatusUpdate {
			value: "processing".to_string(),
			request_id: None,
		};
		let idle = StatusUpdate {
			value: "idle".to_string(),
			request_id: None,
		};
		assert!(busy.is_processing());
		assert!(!idle.is_processing());
	}
}
