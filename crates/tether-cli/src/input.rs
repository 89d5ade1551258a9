// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
	Prompt(String),
	Stop,
	NewSession,
	Branches,
	Switch(String),
	Create { name: String, base: Option<String> },
	Discard,
	Attach(PathBuf),
	Retry,
	Help,
	Quit,
}

pub const HELP: &str = "\
commands:
  /stop                  stop the current turn
  /new                   start a new session
  /branches              list branches
  /switch <name>         switch branch
  /create <name> [base]  create and switch to a branch
  /discard               discard uncommitted changes
  /attach <path>         attach a file to the next prompt
  /retry                 reconnect after giving up
  /quit                  exit
anything else is sent as a prompt";

/// Parses a line. Blank lines yield `Ok(None)`.
pub fn parse_input(line: &str) -> Result<Option<Input>, String> {
	let line = line.trim();
	if line.is_empty() {
		return Ok(None);
	}
	let Some(command) = line.strip_prefix('/') else {
		return Ok(Some(Input::Prompt(line.to_string())));
	};

	let mut words = command.split_whitespace();
	let name = words.next().unwrap_or_default();
	let args: Vec<&str> = words.collect();
	let input = match (name, args.as_slice()) {
		("stop", []) => Input::Stop,
		("new", []) => Input::NewSession,
		("branches", []) => Input::Branches,
		("switch", [branch]) => Input::Switch(branch.to_string()),
		("create", [branch]) => Input::Create {
			name: branch.to_string(),
			base: None,
		},
		("create", [branch, base]) => Input::Create {
			name: branch.to_string(),
			base: Some(base.to_string()),
		},
		("discard", []) => Input::Discard,
		("attach", [_, ..]) => Input::Attach(PathBuf::from(args.join(" "))),
		("retry", []) => Input::Retry,
		("help", []) => Input::Help,
		("quit" | "exit", []) => Input::Quit,
		_ => return Err(format!("unknown command: /{command} (try /help)")),
	};
	Ok(Some(input))
}
