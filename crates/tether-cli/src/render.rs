// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Plain-text rendering of display state for a terminal.

use tether_assembler::{Assembler, Completion, DisplayRecord, Part, ToolPart, Turn};
use tether_common_protocol::{BranchRecord, HistoryRole, ToolStatus};

/// How much of the streaming turn has been written already.
#[derive(Debug)]
struct Progress {
	request_id: String,
	parts: usize,
	text_len: usize,
}

/// Writes display state incrementally: each frozen record once, and the live
/// turn as it grows.
#[derive(Debug, Default)]
pub struct Renderer {
	shown: usize,
	streaming: Option<Progress>,
}

impl Renderer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Forgets what was written; the next render starts from the top.
	pub fn reset(&mut self) {
		self.shown = 0;
		self.streaming = None;
	}

	/// Output produced since the last call.
	pub fn render(&mut self, assembler: &Assembler) -> String {
		let mut out = String::new();
		let records = assembler.records();
		if records.len() < self.shown {
			self.reset();
		}

		for record in &records[self.shown..] {
			match (record, self.streaming.take()) {
				(DisplayRecord::Turn(turn), Some(mut progress)) if progress.request_id == turn.request_id => {
					continue_turn(turn, &mut progress, &mut out);
					finish_turn(turn, &mut out);
				}
				(record, streaming) => {
					self.streaming = streaming;
					write_record(record, &mut out);
				}
			}
		}
		self.shown = records.len();

		if let Some(live) = assembler.live() {
			let progress = match self.streaming.take() {
				Some(progress) if progress.request_id == live.request_id => progress,
				_ => Progress {
					request_id: live.request_id.clone(),
					parts: 0,
					text_len: 0,
				},
			};
			let mut progress = progress;
			continue_turn(live, &mut progress, &mut out);
			self.streaming = Some(progress);
		}
		out
	}
}

fn continue_turn(turn: &Turn, progress: &mut Progress, out: &mut String) {
	let last = turn.parts.len().saturating_sub(1);
	for (index, part) in turn.parts.iter().enumerate().skip(progress.parts) {
		match part {
			Part::Text(text) => {
				out.push_str(text.text.get(progress.text_len..).unwrap_or_default());
				if index == last && turn.is_live() {
					progress.text_len = text.text.len();
					return;
				}
			}
			Part::Tool(tool) => write_tool(tool, out),
		}
		progress.parts += 1;
		progress.text_len = 0;
	}
}

fn finish_turn(turn: &Turn, out: &mut String) {
	match turn.completion {
		Some(Completion::Interrupted) => out.push_str("\n[interrupted]\n"),
		_ => out.push('\n'),
	}
}

fn write_tool(tool: &ToolPart, out: &mut String) {
	out.push_str(&format!("\n[{} {}]\n", tool.tool_name, tool_status(tool)));
}

fn tool_status(tool: &ToolPart) -> &'static str {
	match tool.status {
		ToolStatus::Started => "started",
		ToolStatus::Completed => "completed",
		ToolStatus::Failed => "failed",
	}
}

fn write_record(record: &DisplayRecord, out: &mut String) {
	match record {
		DisplayRecord::Prompt { content, .. } => out.push_str(&format!("> {content}\n")),
		DisplayRecord::Turn(turn) => {
			let mut progress = Progress {
				request_id: turn.request_id.clone(),
				parts: 0,
				text_len: 0,
			};
			continue_turn(turn, &mut progress, out);
			finish_turn(turn, out);
		}
		DisplayRecord::Metadata {
			success,
			error,
			cost_usd,
			duration_ms,
			..
		} => {
			let mut fields = Vec::new();
			if !success {
				fields.push(format!("failed: {}", error.as_deref().unwrap_or("unknown error")));
			}
			if let Some(cost) = cost_usd {
				fields.push(format!("${cost:.4}"));
			}
			if let Some(ms) = duration_ms {
				fields.push(format!("{:.1}s", *ms as f64 / 1000.0));
			}
			out.push_str(&format!("({})\n", fields.join(", ")));
		}
		DisplayRecord::Error { message, .. } => out.push_str(&format!("! {message}\n")),
		DisplayRecord::History {
			role,
			content,
			tool_name,
			..
		} => {
			let label = match (role, tool_name) {
				(HistoryRole::Tool, Some(name)) => name.as_str(),
				(HistoryRole::User, _) => ">",
				(HistoryRole::Assistant, _) => "agent",
				(HistoryRole::Tool, None) => "tool",
				(HistoryRole::System, _) => "system",
			};
			out.push_str(&format!("{label}: {content}\n"));
		}
	}
}

/// One line per branch, current first marker `*`.
pub fn format_branches(branches: &[BranchRecord]) -> String {
	let mut out = String::new();
	for branch in branches {
		out.push_str(if branch.current { "* " } else { "  " });
		out.push_str(&branch.name);
		if branch.remote_only {
			out.push_str(" (remote)");
		}
		if let Some(number) = branch.pr_number {
			out.push_str(&format!(" #{number}"));
			if let Some(title) = &branch.pr_title {
				out.push_str(&format!(" {title}"));
			}
		}
		if let Some(at) = branch.last_activity {
			out.push_str(&format!("  {}", at.format("%Y-%m-%d %H:%M")));
		}
		out.push('\n');
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use tether_common_protocol::{ServerEvent, TerminalResult, TextDelta, ToolEvent};

	fn delta(id: &str, chunk: &str) -> ServerEvent {
		ServerEvent::TextDelta(TextDelta {
			request_id: id.to_string(),
			chunk: chunk.to_string(),
			done: false,
		})
	}

	#[test]
	fn test_streams_each_byte_once() {
		let mut assembler = Assembler::new();
		let mut renderer = Renderer::new();
		assembler.push_prompt("p1", "add a button");
		assert_eq!(renderer.render(&assembler), "> add a button\n");

		assembler.apply(&delta("p1", "Sure, "));
		assert_eq!(renderer.render(&assembler), "Sure, ");
		assembler.apply(&delta("p1", "adding it."));
		assert_eq!(renderer.render(&assembler), "adding it.");

		assembler.apply(&ServerEvent::ToolEvent(ToolEvent {
			request_id: "p1".to_string(),
			tool_name: "Edit".to_string(),
			status: ToolStatus::Completed,
			input: None,
			output: None,
			timestamp: None,
		}));
		assert_eq!(renderer.render(&assembler), "\n[Edit completed]\n");

		assembler.apply(&ServerEvent::TerminalResult(TerminalResult {
			request_id: "p1".to_string(),
			success: true,
			payload: None,
			error: None,
			cost_usd: Some(0.01),
			duration_ms: Some(2500),
		}));
		assert_eq!(renderer.render(&assembler), "\n($0.0100, 2.5s)\n");
		assert_eq!(renderer.render(&assembler), "");
	}

	#[test]
	fn test_interrupted_turn_is_marked() {
		let mut assembler = Assembler::new();
		let mut renderer = Renderer::new();
		assembler.apply(&delta("p1", "half"));
		renderer.render(&assembler);
		assembler.apply(&delta("p2", "next"));
		assert_eq!(renderer.render(&assembler), "\n[interrupted]\nnext");
	}

	#[test]
	fn test_reset_renders_from_scratch() {
		let mut assembler = Assembler::new();
		let mut renderer = Renderer::new();
		assembler.push_prompt("p1", "a");
		assembler.push_prompt("p2", "b");
		renderer.render(&assembler);
		assembler.apply(&ServerEvent::SessionReset);
		assembler.push_prompt("p3", "c");
		assert_eq!(renderer.render(&assembler), "> c\n");
	}

	#[test]
	fn test_format_branches() {
		let mut remote = BranchRecord::new("feature");
		remote.remote_only = true;
		let rendered = format_branches(&[BranchRecord::new("main").current(), remote]);
		assert_eq!(rendered, "* main\n  feature (remote)\n");
	}
}
