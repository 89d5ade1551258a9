// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side branch state.
//!
//! Switching is optimistic: the target shows as current the moment the
//! request is made and is rolled back if the remote refuses. Creation is not:
//! nothing changes until the remote confirms.
//!
//! Results are not redelivered after a reconnect. A switch in flight when the
//! connection dropped is settled by the next listing instead, and a pending
//! create fails at once.

use tether_common_protocol::{
	BranchOutcome, BranchRecord, ClientMessage, CreateBranchRequest, ServerEvent, SwitchBranchRequest,
};
use tracing::{debug, info, warn};

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SwitchState {
	#[default]
	Idle,
	Pending {
		target: String,
		prior: Option<String>,
	},
	Committed,
	RolledBack {
		error: String,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CreateState {
	#[default]
	Closed,
	Open,
	Pending {
		name: String,
	},
	Failed {
		error: String,
	},
}

impl CreateState {
	/// The create form is on screen.
	pub fn is_open(&self) -> bool {
		!matches!(self, Self::Closed)
	}
}

// ============================================================================
// Manager
// ============================================================================

#[derive(Debug, Default)]
pub struct BranchManager {
	branches: Vec<BranchRecord>,
	current: Option<String>,
	selector_open: bool,
	switch: SwitchState,
	/// The pending switch was sent on a connection that has since dropped.
	orphaned: bool,
	create: CreateState,
	error: Option<String>,
	notice: Option<String>,
}

impl BranchManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn branches(&self) -> &[BranchRecord] {
		&self.branches
	}

	pub fn current(&self) -> Option<&str> {
		self.current.as_deref()
	}

	pub fn selector_open(&self) -> bool {
		self.selector_open
	}

	pub fn switch_state(&self) -> &SwitchState {
		&self.switch
	}

	pub fn create_state(&self) -> &CreateState {
		&self.create
	}

	/// Error text from the last rejected switch, verbatim from the remote.
	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	/// Warning attached to an accepted switch or create, e.g. stashed changes
	/// that could not be restored on the new branch.
	pub fn notice(&self) -> Option<&str> {
		self.notice.as_deref()
	}

	pub fn open_selector(&mut self) {
		self.selector_open = true;
	}

	pub fn close_selector(&mut self) {
		self.selector_open = false;
	}

	pub fn request_list(&self) -> ClientMessage {
		ClientMessage::ListBranches
	}

	/// Replaces the list wholesale. Exactly one record ends up current: the
	/// pending switch target if there is one, else the first record the
	/// remote flagged, else the branch already known to be current, else the
	/// first record.
	pub fn apply_list(&mut self, branches: Vec<BranchRecord>) {
		self.branches = branches;
		if self.branches.is_empty() {
			return;
		}

		if self.orphaned {
			self.settle_orphaned_switch();
			return;
		}

		let pending = match &self.switch {
			SwitchState::Pending { target, .. } => Some(target.as_str()),
			_ => None,
		};
		let contains = |name: &str| self.branches.iter().any(|b| b.name == name);
		let current = pending
			.filter(|&name| contains(name))
			.map(str::to_string)
			.or_else(|| self.branches.iter().find(|b| b.current).map(|b| b.name.clone()))
			.or_else(|| self.current.clone().filter(|name| contains(name.as_str())))
			.unwrap_or_else(|| self.branches[0].name.clone());

		debug!(branches = self.branches.len(), current = %current, "applied branch list");
		self.mark_current(&current);
	}

	/// Optimistically switches to `name` and returns the request to send.
	/// Returns `None` when `name` is already current or a switch is in flight
	/// on the live connection.
	pub fn request_switch(&mut self, name: &str) -> Option<ClientMessage> {
		let prior = match &self.switch {
			SwitchState::Pending { .. } if !self.orphaned => {
				debug!(target_branch = name, "switch already in flight");
				return None;
			}
			SwitchState::Pending { prior, .. } => prior.clone(),
			_ => self.current.clone(),
		};
		if self.current.as_deref() == Some(name) {
			self.selector_open = false;
			return None;
		}

		self.mark_current(name);
		self.selector_open = false;
		self.orphaned = false;
		self.switch = SwitchState::Pending {
			target: name.to_string(),
			prior,
		};
		Some(ClientMessage::SwitchBranch(SwitchBranchRequest {
			branch_name: name.to_string(),
		}))
	}

	/// Settles a pending switch. Returns whether the outcome matched it.
	pub fn resolve_switch(&mut self, outcome: &BranchOutcome) -> bool {
		let prior = match &self.switch {
			SwitchState::Pending { target, prior } if *target == outcome.branch_name => prior.clone(),
			_ => {
				debug!(branch = %outcome.branch_name, "switch result without a matching request");
				return false;
			}
		};

		self.orphaned = false;
		if outcome.success {
			info!(branch = %outcome.branch_name, "branch switch confirmed");
			self.switch = SwitchState::Committed;
			self.error = None;
			self.notice = outcome.error.clone();
			return true;
		}

		let error = outcome
			.error
			.clone()
			.unwrap_or_else(|| format!("could not switch to {}", outcome.branch_name));
		warn!(branch = %outcome.branch_name, error = %error, "branch switch rejected, rolling back");
		self.roll_back(prior.as_deref(), error);
		true
	}

	/// Call when the connection drops. Returns whether branch state changed.
	pub fn connection_lost(&mut self) -> bool {
		let mut changed = false;
		if let SwitchState::Pending { target, .. } = &self.switch {
			if !self.orphaned {
				debug!(target_branch = %target, "switch outcome lost with the connection");
				self.orphaned = true;
			}
		}
		if let CreateState::Pending { name } = &self.create {
			let error = format!("connection lost before {name} was created");
			warn!(branch = %name, "branch creation outcome lost with the connection");
			self.create = CreateState::Failed { error };
			changed = true;
		}
		changed
	}

	/// The remote's flag is the only word left on an orphaned switch.
	fn settle_orphaned_switch(&mut self) {
		self.orphaned = false;
		let SwitchState::Pending { target, prior } = std::mem::take(&mut self.switch) else {
			return;
		};
		let flagged = self.branches.iter().find(|b| b.current).map(|b| b.name.clone());
		if flagged.as_deref() == Some(target.as_str()) {
			info!(branch = %target, "branch switch confirmed by listing");
			self.mark_current(&target);
			self.switch = SwitchState::Committed;
			self.error = None;
			return;
		}

		let contains = |name: &str| self.branches.iter().any(|b| b.name == name);
		let restored = flagged
			.or_else(|| prior.filter(|name| contains(name.as_str())))
			.unwrap_or_else(|| self.branches[0].name.clone());
		warn!(branch = %target, current = %restored, "branch switch not applied, rolling back");
		self.roll_back(Some(restored.as_str()), format!("connection lost before switching to {target}"));
	}

	fn roll_back(&mut self, prior: Option<&str>, error: String) {
		match prior {
			Some(prior) => self.mark_current(prior),
			None => {
				self.current = None;
				for branch in &mut self.branches {
					branch.current = false;
				}
			}
		}
		self.selector_open = true;
		self.error = Some(error.clone());
		self.switch = SwitchState::RolledBack { error };
	}

	pub fn open_create(&mut self) {
		self.create = CreateState::Open;
	}

	pub fn cancel_create(&mut self) {
		self.create = CreateState::Closed;
	}

	/// Returns the create request. Local state only records that it is in
	/// flight; the list and current branch are untouched until confirmed.
	pub fn request_create(&mut self, name: &str, base: Option<&str>) -> Option<ClientMessage> {
		if matches!(self.create, CreateState::Pending { .. }) || name.trim().is_empty() {
			return None;
		}
		self.create = CreateState::Pending {
			name: name.to_string(),
		};
		Some(ClientMessage::CreateBranch(CreateBranchRequest {
			branch_name: name.to_string(),
			base: base.map(str::to_string),
		}))
	}

	pub fn resolve_create(&mut self, outcome: &BranchOutcome) -> bool {
		match &self.create {
			CreateState::Pending { name } if *name == outcome.branch_name => {}
			_ => {
				debug!(branch = %outcome.branch_name, "create result without a matching request");
				return false;
			}
		}

		if !outcome.success {
			let error = outcome
				.error
				.clone()
				.unwrap_or_else(|| format!("could not create {}", outcome.branch_name));
			warn!(branch = %outcome.branch_name, error = %error, "branch creation rejected");
			self.create = CreateState::Failed { error };
			return true;
		}

		info!(branch = %outcome.branch_name, "branch created");
		if !self.branches.iter().any(|b| b.name == outcome.branch_name) {
			self.branches.insert(0, BranchRecord::new(&outcome.branch_name));
		}
		self.mark_current(&outcome.branch_name);
		self.create = CreateState::Closed;
		self.notice = outcome.error.clone();
		true
	}

	/// Applies a branch event. Returns whether branch state changed.
	pub fn apply(&mut self, event: &ServerEvent) -> bool {
		match event {
			ServerEvent::BranchList(list) => {
				self.apply_list(list.branches.clone());
				true
			}
			ServerEvent::BranchSwitchResult(outcome) => self.resolve_switch(outcome),
			ServerEvent::BranchCreateResult(outcome) => self.resolve_create(outcome),
			_ => false,
		}
	}

	fn mark_current(&mut self, name: &str) {
		for branch in &mut self.branches {
			branch.current = branch.name == name;
		}
		self.current = Some(name.to_string());
	}
}
