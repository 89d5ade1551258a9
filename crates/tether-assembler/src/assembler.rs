// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tether_common_protocol::{
	BulkHistory, ServerEvent, SnapshotPart, StatusUpdate, TerminalError, TerminalResult, TextDelta,
	ToolEvent, TurnSnapshot,
};
use tracing::{debug, trace};

use crate::model::{
	timestamp_from_millis, AgentActivity, Completion, DisplayRecord, Part, PartId, TextPart,
	ToolPart, Turn,
};

/// Folds session events into display state.
///
/// At most one turn is live. Everything else is a frozen [`DisplayRecord`].
/// A turn freezes on its terminal event, on a new request id, on an explicit
/// stop, or when the transport drops mid-stream.
#[derive(Debug, Default)]
pub struct Assembler {
	records: Vec<DisplayRecord>,
	live: Option<Turn>,
	next_part: u64,
	activity: Option<AgentActivity>,
}

impl Assembler {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn records(&self) -> &[DisplayRecord] {
		&self.records
	}

	pub fn live(&self) -> Option<&Turn> {
		self.live.as_ref()
	}

	pub fn activity(&self) -> Option<&AgentActivity> {
		self.activity.as_ref()
	}

	/// Applies one inbound event. Returns whether display state changed.
	pub fn apply(&mut self, event: &ServerEvent) -> bool {
		match event {
			ServerEvent::TextDelta(delta) => self.text_delta(delta),
			ServerEvent::ToolEvent(tool) => self.tool_event(tool),
			ServerEvent::TerminalResult(result) => self.terminal_result(result),
			ServerEvent::TerminalError(error) => self.terminal_error(error),
			ServerEvent::Status(status) => self.status(status),
			ServerEvent::SessionReset => self.session_reset(),
			ServerEvent::StopAck => self.stop_ack(),
			ServerEvent::BulkHistory(history) => self.bulk_history(history),
			ServerEvent::TurnSnapshot(snapshot) => self.turn_snapshot(snapshot),
			ServerEvent::BranchList(_)
			| ServerEvent::BranchSwitchResult(_)
			| ServerEvent::BranchCreateResult(_)
			| ServerEvent::DiscardResult(_)
			| ServerEvent::Unknown => false,
		}
	}

	pub fn text_delta(&mut self, delta: &TextDelta) -> bool {
		let Some(next_part) = self.next_part_id_if_open(&delta.request_id) else {
			return false;
		};
		let turn = self.live_turn(&delta.request_id);
		if delta.done {
			turn.stream_done = true;
		}
		if delta.chunk.is_empty() {
			return delta.done;
		}

		match turn.parts.last_mut() {
			Some(Part::Text(text)) => text.text.push_str(&delta.chunk),
			_ => {
				turn.parts.push(Part::Text(TextPart {
					id: next_part,
					text: delta.chunk.clone(),
				}));
				self.next_part += 1;
			}
		}
		true
	}

	pub fn tool_event(&mut self, tool: &ToolEvent) -> bool {
		let Some(next_part) = self.next_part_id_if_open(&tool.request_id) else {
			return false;
		};
		let turn = self.live_turn(&tool.request_id);
		if !tool.status.is_settled() {
			trace!(request_id = %tool.request_id, tool = %tool.tool_name, "tool started");
			return false;
		}

		turn.parts.push(Part::Tool(ToolPart {
			id: next_part,
			tool_name: tool.tool_name.clone(),
			status: tool.status,
			input: tool.input.clone(),
			output: tool.output.clone(),
			timestamp: timestamp_from_millis(tool.timestamp),
		}));
		self.next_part += 1;
		true
	}

	pub fn terminal_result(&mut self, result: &TerminalResult) -> bool {
		if self.is_frozen(&result.request_id) {
			debug!(request_id = %result.request_id, "ignoring result for a frozen turn");
			return false;
		}

		let mut turn = match self.live.take() {
			Some(turn) if turn.request_id == result.request_id => turn,
			Some(other) => {
				self.freeze(other, Completion::Interrupted);
				Turn::new(&result.request_id)
			}
			None => Turn::new(&result.request_id),
		};

		if turn.parts.is_empty() && result.success {
			if let Some(payload) = result.payload.as_deref().filter(|p| !p.is_empty()) {
				turn.parts.push(Part::Text(TextPart {
					id: self.allocate_part(),
					text: payload.to_string(),
				}));
			}
		}

		let rendered = !turn.parts.is_empty();
		self.freeze(turn, Completion::Complete);

		if result.has_metrics() || (!result.success && !rendered) {
			self.records.push(DisplayRecord::Metadata {
				request_id: result.request_id.clone(),
				success: result.success,
				error: result.error.clone(),
				cost_usd: result.cost_usd,
				duration_ms: result.duration_ms,
			});
		}
		true
	}

	pub fn terminal_error(&mut self, error: &TerminalError) -> bool {
		self.interrupt_live();
		self.records.push(DisplayRecord::Error {
			request_id: error.request_id.clone(),
			message: error.message.clone(),
		});
		true
	}

	pub fn status(&mut self, status: &StatusUpdate) -> bool {
		let activity = AgentActivity {
			value: status.value.clone(),
			request_id: status.request_id.clone(),
			processing: status.is_processing(),
		};
		if self.activity.as_ref() == Some(&activity) {
			return false;
		}
		self.activity = Some(activity);
		true
	}

	pub fn stop_ack(&mut self) -> bool {
		self.interrupt_live()
	}

	/// Starts over: nothing displayed, part ids from zero.
	pub fn session_reset(&mut self) -> bool {
		debug!(records = self.records.len(), "session reset");
		*self = Self::default();
		true
	}

	/// Replaces everything displayed with the persisted history.
	pub fn bulk_history(&mut self, history: &BulkHistory) -> bool {
		debug!(entries = history.entries.len(), "loading history snapshot");
		self.live = None;
		self.records = history
			.entries
			.iter()
			.map(|entry| DisplayRecord::History {
				role: entry.role,
				content: entry.content.clone(),
				tool_name: entry.tool_name.clone(),
				timestamp: timestamp_from_millis(entry.timestamp),
			})
			.collect();
		true
	}

	/// Replaces the parts of a turn with the server's authoritative copy.
	pub fn turn_snapshot(&mut self, snapshot: &TurnSnapshot) -> bool {
		let parts = self.snapshot_parts(&snapshot.parts);

		if let Some(live) = self.live.as_mut().filter(|t| t.request_id == snapshot.request_id) {
			live.parts = parts;
			return true;
		}

		let frozen = self.records.iter_mut().rev().find_map(|record| match record {
			DisplayRecord::Turn(turn) if turn.request_id == snapshot.request_id => Some(turn),
			_ => None,
		});
		match frozen {
			Some(turn) => turn.parts = parts,
			None => {
				debug!(request_id = %snapshot.request_id, "snapshot for an unseen turn");
				let mut turn = Turn::new(&snapshot.request_id);
				turn.parts = parts;
				self.freeze(turn, Completion::Complete);
			}
		}
		true
	}

	/// Freezes a truncated live turn. Used when the transport drops.
	pub fn interrupt_live(&mut self) -> bool {
		match self.live.take() {
			Some(turn) => {
				debug!(request_id = %turn.request_id, parts = turn.parts.len(), "interrupting live turn");
				self.freeze(turn, Completion::Interrupted);
				true
			}
			None => false,
		}
	}

	/// Records a prompt the local user sent.
	pub fn push_prompt(&mut self, request_id: impl Into<String>, content: impl Into<String>) {
		self.records.push(DisplayRecord::Prompt {
			request_id: request_id.into(),
			content: content.into(),
		});
	}

	/// Returns the id the next part would get, or `None` if events for
	/// `request_id` must be ignored because its turn is already frozen.
	fn next_part_id_if_open(&self, request_id: &str) -> Option<PartId> {
		if self.is_frozen(request_id) {
			debug!(request_id, "ignoring event for a frozen turn");
			return None;
		}
		Some(PartId(self.next_part))
	}

	/// Late events for a frozen turn are ignored. The displayed records are
	/// the only memory of which turns are frozen.
	fn is_frozen(&self, request_id: &str) -> bool {
		if self.live.as_ref().is_some_and(|t| t.request_id == request_id) {
			return false;
		}
		self.records
			.iter()
			.rev()
			.filter_map(DisplayRecord::as_turn)
			.any(|turn| turn.request_id == request_id)
	}

	/// The live turn for `request_id`, freezing a different live turn first.
	fn live_turn(&mut self, request_id: &str) -> &mut Turn {
		if self.live.as_ref().is_some_and(|t| t.request_id != request_id) {
			self.interrupt_live();
		}
		self.live.get_or_insert_with(|| Turn::new(request_id))
	}

	fn freeze(&mut self, mut turn: Turn, completion: Completion) {
		turn.completion = Some(completion);
		self.records.push(DisplayRecord::Turn(turn));
	}

	fn allocate_part(&mut self) -> PartId {
		let id = PartId(self.next_part);
		self.next_part += 1;
		id
	}

	fn snapshot_parts(&mut self, parts: &[SnapshotPart]) -> Vec<Part> {
		parts
			.iter()
			.map(|part| match part {
				SnapshotPart::Text { text } => Part::Text(TextPart {
					id: self.allocate_part(),
					text: text.clone(),
				}),
				SnapshotPart::Tool {
					tool_name,
					status,
					input,
					output,
					timestamp,
				} => Part::Tool(ToolPart {
					id: self.allocate_part(),
					tool_name: tool_name.clone(),
					status: *status,
					input: input.clone(),
					output: output.clone(),
					timestamp: timestamp_from_millis(*timestamp),
				}),
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use tether_common_protocol::{HistoryEntry, HistoryRole, ToolStatus};

	fn delta(id: &str, chunk: &str) -> ServerEvent {
		ServerEvent::TextDelta(TextDelta {
			request_id: id.to_string(),
			chunk: chunk.to_string(),
			done: false,
		})
	}

	fn tool(id: &str, name: &str, status: ToolStatus) -> ServerEvent {
		ServerEvent::ToolEvent(ToolEvent {
			request_id: id.to_string(),
			tool_name: name.to_string(),
			status,
			input: None,
			output: None,
			timestamp: Some(1_700_000_000_000),
		})
	}

	fn result(id: &str, success: bool) -> TerminalResult {
		TerminalResult {
			request_id: id.to_string(),
			success,
			payload: None,
			error: None,
			cost_usd: None,
			duration_ms: None,
		}
	}

	fn turns(assembler: &Assembler) -> Vec<&Turn> {
		assembler.records().iter().filter_map(DisplayRecord::as_turn).collect()
	}

	#[test]
	fn test_deltas_merge_into_one_text_part() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "Sure, "));
		assembler.apply(&delta("p1", "adding it."));

		let live = assembler.live().unwrap();
		assert_eq!(live.parts.len(), 1);
		assert_eq!(live.text(), "Sure, adding it.");
		assert!(assembler.records().is_empty());
	}

	#[test]
	fn test_started_tool_is_invisible_until_settled() {
		let mut assembler = Assembler::new();
		assert!(!assembler.apply(&tool("p1", "Edit", ToolStatus::Started)));
		assert!(assembler.live().unwrap().parts.is_empty());

		assert!(assembler.apply(&tool("p1", "Edit", ToolStatus::Completed)));
		assembler.apply(&delta("p1", "done"));

		let parts = &assembler.live().unwrap().parts;
		assert!(matches!(&parts[0], Part::Tool(t) if t.tool_name == "Edit" && t.timestamp.is_some()));
		assert!(matches!(&parts[1], Part::Text(t) if t.text == "done"));
	}

	#[test]
	fn test_text_after_tool_starts_new_part() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "a"));
		assembler.apply(&tool("p1", "Bash", ToolStatus::Failed));
		assembler.apply(&delta("p1", "b"));
		let ids: Vec<PartId> = assembler.live().unwrap().parts.iter().map(Part::id).collect();
		assert_eq!(ids, vec![PartId(0), PartId(1), PartId(2)]);
	}

	#[test]
	fn test_done_flag_keeps_turn_live() {
		let mut assembler = Assembler::new();
		assembler.apply(&ServerEvent::TextDelta(TextDelta {
			request_id: "p1".to_string(),
			chunk: String::new(),
			done: true,
		}));
		let live = assembler.live().unwrap();
		assert!(live.stream_done);
		assert!(live.is_live());
	}

	#[test]
	fn test_result_freezes_complete_without_metadata() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "hello"));
		assembler.apply(&ServerEvent::TerminalResult(result("p1", true)));

		assert!(assembler.live().is_none());
		assert_eq!(assembler.records().len(), 1);
		let turn = assembler.records()[0].as_turn().unwrap();
		assert_eq!(turn.completion, Some(Completion::Complete));
		assert_eq!(turn.text(), "hello");
	}

	#[test]
	fn test_result_metrics_append_metadata_record() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "hello"));
		let mut done = result("p1", true);
		done.cost_usd = Some(0.02);
		done.duration_ms = Some(1200);
		assembler.apply(&ServerEvent::TerminalResult(done));

		assert_eq!(assembler.records().len(), 2);
		assert!(matches!(
			&assembler.records()[1],
			DisplayRecord::Metadata { duration_ms: Some(1200), success: true, .. }
		));
	}

	#[test]
	fn test_payload_rendered_only_when_nothing_streamed() {
		let mut assembler = Assembler::new();
		let mut done = result("p1", true);
		done.payload = Some("final answer".to_string());
		assembler.apply(&ServerEvent::TerminalResult(done.clone()));
		assert_eq!(turns(&assembler)[0].text(), "final answer");

		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "final answer"));
		assembler.apply(&ServerEvent::TerminalResult(done));
		let turn = turns(&assembler)[0];
		assert_eq!(turn.parts.len(), 1);
		assert_eq!(turn.text(), "final answer");
	}

	#[test]
	fn test_failure_without_parts_gets_metadata() {
		let mut assembler = Assembler::new();
		let mut failed = result("p1", false);
		failed.error = Some("rate limited".to_string());
		failed.payload = Some("ignored".to_string());
		assembler.apply(&ServerEvent::TerminalResult(failed));

		assert!(turns(&assembler)[0].parts.is_empty());
		assert!(matches!(
			&assembler.records()[1],
			DisplayRecord::Metadata { success: false, error: Some(e), .. } if e == "rate limited"
		));
	}

	/// Test: a new request id while a turn is live freezes the old turn as
	/// interrupted with its partial parts intact.
	///
	/// Why this test is important: a prompt that overlaps a still-streaming
	/// answer must not lose what was already shown, and the two answers must
	/// never interleave in one turn.
	#[test]
	fn test_new_request_interrupts_previous() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "partial"));
		assembler.apply(&tool("p1", "Read", ToolStatus::Completed));
		assembler.apply(&delta("p2", "next"));

		let frozen = turns(&assembler);
		assert_eq!(frozen.len(), 1);
		assert_eq!(frozen[0].request_id, "p1");
		assert_eq!(frozen[0].completion, Some(Completion::Interrupted));
		assert_eq!(frozen[0].parts.len(), 2);
		assert_eq!(assembler.live().unwrap().request_id, "p2");
	}

	#[test]
	fn test_late_events_for_frozen_turn_are_ignored() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "a"));
		assembler.apply(&ServerEvent::TerminalResult(result("p1", true)));

		assert!(!assembler.apply(&delta("p1", "late")));
		assert!(!assembler.apply(&ServerEvent::TerminalResult(result("p1", true))));
		assert!(assembler.live().is_none());
		assert_eq!(turns(&assembler)[0].text(), "a");
	}

	/// Test: once the history snapshot replaces the display, ids of turns it
	/// dropped are accepted again.
	///
	/// Why this test is important: frozen ids are read off the displayed
	/// records, so nothing outlives a history load or grows with a long
	/// session beyond what is on screen.
	#[test]
	fn test_history_load_forgets_frozen_ids() {
		let mut assembler = Assembler::new();
		for id in ["p1", "p2", "p3"] {
			assembler.apply(&delta(id, "a"));
			assembler.apply(&ServerEvent::TerminalResult(result(id, true)));
		}
		assert!(!assembler.apply(&delta("p2", "late")));

		assembler.apply(&ServerEvent::BulkHistory(BulkHistory { entries: Vec::new() }));
		assert!(assembler.apply(&delta("p2", "again")));
		assert_eq!(assembler.live().unwrap().text(), "again");
	}

	#[test]
	fn test_result_for_other_id_interrupts_live() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "a"));
		assembler.apply(&ServerEvent::TerminalResult(result("p2", true)));

		let frozen = turns(&assembler);
		assert_eq!(frozen[0].completion, Some(Completion::Interrupted));
		assert_eq!(frozen[1].request_id, "p2");
		assert_eq!(frozen[1].completion, Some(Completion::Complete));
	}

	#[test]
	fn test_terminal_error_interrupts_and_records() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "a"));
		assembler.apply(&ServerEvent::TerminalError(TerminalError {
			request_id: Some("p1".to_string()),
			message: "agent crashed".to_string(),
		}));

		assert_eq!(turns(&assembler)[0].completion, Some(Completion::Interrupted));
		assert!(matches!(
			&assembler.records()[1],
			DisplayRecord::Error { message, .. } if message == "agent crashed"
		));

		assembler.apply(&ServerEvent::TerminalError(TerminalError {
			request_id: None,
			message: "again".to_string(),
		}));
		assert_eq!(assembler.records().len(), 3);
	}

	#[test]
	fn test_stop_ack_preserves_partial_parts() {
		let mut assembler = Assembler::new();
		assert!(!assembler.apply(&ServerEvent::StopAck));
		assembler.apply(&delta("p1", "half"));
		assert!(assembler.apply(&ServerEvent::StopAck));

		let turn = turns(&assembler)[0];
		assert_eq!(turn.completion, Some(Completion::Interrupted));
		assert_eq!(turn.text(), "half");
	}

	#[test]
	fn test_session_reset_clears_and_restarts_ids() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "a"));
		assembler.apply(&ServerEvent::TerminalResult(result("p1", true)));
		assembler.apply(&ServerEvent::SessionReset);

		assert!(assembler.records().is_empty());
		assert!(assembler.live().is_none());
		assembler.apply(&delta("p1", "fresh"));
		assert_eq!(assembler.live().unwrap().parts[0].id(), PartId(0));
	}

	#[test]
	fn test_bulk_history_replaces_display() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p0", "stale"));
		assembler.apply(&ServerEvent::BulkHistory(BulkHistory {
			entries: vec![
				HistoryEntry {
					role: HistoryRole::User,
					content: "add a button".to_string(),
					tool_name: None,
					timestamp: None,
				},
				HistoryEntry {
					role: HistoryRole::Assistant,
					content: "done".to_string(),
					tool_name: None,
					timestamp: Some(1_700_000_000_000),
				},
			],
		}));

		assert!(assembler.live().is_none());
		let roles: Vec<HistoryRole> = assembler
			.records()
			.iter()
			.filter_map(|r| match r {
				DisplayRecord::History { role, .. } => Some(*role),
				_ => None,
			})
			.collect();
		assert_eq!(roles, vec![HistoryRole::User, HistoryRole::Assistant]);
	}

	#[test]
	fn test_snapshot_replaces_frozen_turn_parts() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "trunc"));
		assembler.interrupt_live();

		assembler.apply(&ServerEvent::TurnSnapshot(TurnSnapshot {
			request_id: "p1".to_string(),
			parts: vec![
				SnapshotPart::Text {
					text: "truncated no more".to_string(),
				},
				SnapshotPart::Tool {
					tool_name: "Edit".to_string(),
					status: ToolStatus::Completed,
					input: None,
					output: None,
					timestamp: None,
				},
			],
		}));

		let frozen = turns(&assembler);
		assert_eq!(frozen.len(), 1);
		assert_eq!(frozen[0].parts.len(), 2);
		assert_eq!(frozen[0].text(), "truncated no more");
		assert_eq!(frozen[0].completion, Some(Completion::Interrupted));
		assert_eq!(frozen[0].parts[0].id(), PartId(1));
	}

	#[test]
	fn test_snapshot_for_live_and_unseen_turns() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "x"));
		assembler.apply(&ServerEvent::TurnSnapshot(TurnSnapshot {
			request_id: "p1".to_string(),
			parts: vec![SnapshotPart::Text { text: "y".to_string() }],
		}));
		assert_eq!(assembler.live().unwrap().text(), "y");

		assembler.apply(&ServerEvent::TurnSnapshot(TurnSnapshot {
			request_id: "p0".to_string(),
			parts: vec![SnapshotPart::Text { text: "old".to_string() }],
		}));
		assert_eq!(turns(&assembler)[0].request_id, "p0");
		assert_eq!(assembler.live().unwrap().request_id, "p1");
	}

	#[test]
	fn test_interrupt_live_leaves_frozen_records() {
		let mut assembler = Assembler::new();
		assembler.apply(&delta("p1", "a"));
		assembler.apply(&ServerEvent::TerminalResult(result("p1", true)));
		let before = assembler.records().to_vec();

		assert!(!assembler.interrupt_live());
		assembler.apply(&delta("p2", "b"));
		assert!(assembler.interrupt_live());
		assert_eq!(&assembler.records()[..before.len()], &before[..]);
	}

	#[test]
	fn test_status_tracks_activity() {
		let mut assembler = Assembler::new();
		let busy = StatusUpdate {
			value: "processing".to_string(),
			request_id: Some("p1".to_string()),
		};
		assert!(assembler.apply(&ServerEvent::Status(busy.clone())));
		assert!(!assembler.apply(&ServerEvent::Status(busy)));
		assert!(assembler.activity().unwrap().processing);
	}

	#[test]
	fn test_prompt_record_and_branch_events_ignored() {
		let mut assembler = Assembler::new();
		assembler.push_prompt("p1", "add a button");
		assert!(matches!(
			&assembler.records()[0],
			DisplayRecord::Prompt { content, .. } if content == "add a button"
		));
		assert!(!assembler.apply(&ServerEvent::Unknown));
	}

	#[derive(Debug, Clone)]
	enum Op {
		Text(String),
		ToolStarted,
		ToolSettled(bool),
	}

	fn op_strategy() -> impl Strategy<Value = Op> {
		prop_oneof![
			"[a-z ]{1,6}".prop_map(Op::Text),
			Just(Op::ToolStarted),
			any::<bool>().prop_map(Op::ToolSettled),
		]
	}

	#[derive(Debug, PartialEq)]
	enum Expected {
		Text(String),
		Tool(ToolStatus),
	}

	fn apply_ops(assembler: &mut Assembler, id: &str, ops: &[Op]) -> Vec<Expected> {
		let mut expected: Vec<Expected> = Vec::new();
		for op in ops {
			match op {
				Op::Text(chunk) => {
					assembler.apply(&delta(id, chunk));
					match expected.last_mut() {
						Some(Expected::Text(text)) => text.push_str(chunk),
						_ => expected.push(Expected::Text(chunk.clone())),
					}
				}
				Op::ToolStarted => {
					assembler.apply(&tool(id, "Bash", ToolStatus::Started));
				}
				Op::ToolSettled(ok) => {
					let status = if *ok { ToolStatus::Completed } else { ToolStatus::Failed };
					assembler.apply(&tool(id, "Bash", status));
					expected.push(Expected::Tool(status));
				}
			}
		}
		expected
	}

	fn observed(turn: &Turn) -> Vec<Expected> {
		turn.parts
			.iter()
			.map(|part| match part {
				Part::Text(t) => Expected::Text(t.text.clone()),
				Part::Tool(t) => Expected::Tool(t.status),
			})
			.collect()
	}

	// Property: for one live request id, the live turn's parts are exactly the
	// arrival order of visible events, with consecutive text merged.
	//
	// Why this test is important: the panel renders parts in this order; any
	// reordering shows tool output before the text that introduced it.
	proptest! {
		#[test]
		fn prop_parts_follow_arrival_order(ops in prop::collection::vec(op_strategy(), 0..30)) {
			let mut assembler = Assembler::new();
			let expected = apply_ops(&mut assembler, "p1", &ops);
			let actual = assembler.live().map(observed).unwrap_or_default();
			prop_assert_eq!(actual, expected);

			let ids: Vec<u64> = assembler.live().map(|t| t.parts.iter().map(|p| p.id().0).collect()).unwrap_or_default();
			let mut sorted = ids.clone();
			sorted.sort_unstable();
			sorted.dedup();
			prop_assert_eq!(ids, sorted);
		}

		#[test]
		fn prop_new_request_freezes_previous_intact(
			first in prop::collection::vec(op_strategy(), 1..15),
			second in prop::collection::vec(op_strategy(), 1..15),
		) {
			let mut assembler = Assembler::new();
			let expected_first = apply_ops(&mut assembler, "p1", &first);
			let expected_second = apply_ops(&mut assembler, "p2", &second);

			let frozen = turns(&assembler);
			prop_assert_eq!(frozen.len(), 1);
			prop_assert_eq!(frozen[0].completion, Some(Completion::Interrupted));
			prop_assert_eq!(observed(frozen[0]), expected_first);
			prop_assert_eq!(assembler.live().map(observed).unwrap_or_default(), expected_second);
		}
	}
}
