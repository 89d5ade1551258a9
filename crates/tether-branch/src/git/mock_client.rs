// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::client::{GitClient, RefEntry, StashEntry};
use super::error::GitError;

/// Recorded call to the mock git client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
	IsRepository,
	HasChanges,
	CurrentBranch,
	StashPush(String),
	StashList,
	StashPop(String),
	UnmergedPaths,
	ResetHard,
	CleanStashedUntracked(String),
	Checkout(String),
	CreateBranch { name: String, base: Option<String> },
	ListRefs,
	DiscardChanges,
}

/// Mock git client for testing.
///
/// Stash entries are shared state: a push adds an entry that a later list or
/// pop observes, so stash sequencing can be exercised without a repository.
#[derive(Clone, Default)]
pub struct MockGitClient {
	/// Whether is_repository returns true.
	pub is_repo: bool,
	/// Whether has_changes returns true. A stash push cleans the tree and a
	/// successful pop dirties it again.
	pub dirty: Arc<AtomicBool>,
	/// Branch returned from current_branch.
	pub branch: Option<String>,
	/// Refs returned from list_refs.
	pub refs: Vec<RefEntry>,
	/// If set, checkout and create_branch return this error.
	pub checkout_error: Option<String>,
	/// If non-empty, stash_pop fails and unmerged_paths returns these paths.
	pub conflicts: Vec<String>,
	/// If set, stash_pop fails with this stderr without leaving conflicts.
	pub pop_error: Option<String>,
	/// If set, discard_changes returns this error.
	pub discard_error: Option<String>,
	/// Current stash entries, most recent first.
	pub stashes: Arc<Mutex<Vec<StashEntry>>>,
	/// Track calls for verification.
	pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockGitClient {
	pub fn new() -> Self {
		Self {
			is_repo: true,
			branch: Some("main".to_string()),
			..Self::default()
		}
	}

	pub fn not_a_repo(mut self) -> Self {
		self.is_repo = false;
		self
	}

	pub fn dirty(self) -> Self {
		self.dirty.store(true, Ordering::SeqCst);
		self
	}

	pub fn with_refs(mut self, refs: Vec<RefEntry>) -> Self {
		self.refs = refs;
		self
	}

	pub fn with_checkout_error(mut self, error: impl Into<String>) -> Self {
		self.checkout_error = Some(error.into());
		self
	}

	pub fn with_conflicts(mut self, paths: Vec<String>) -> Self {
		self.conflicts = paths;
		self
	}

	pub fn with_pop_error(mut self, error: impl Into<String>) -> Self {
		self.pop_error = Some(error.into());
		self
	}

	pub fn with_discard_error(mut self, error: impl Into<String>) -> Self {
		self.discard_error = Some(error.into());
		self
	}

	pub fn with_stash(self, message: impl Into<String>) -> Self {
		self.lock_stashes().insert(
			0,
			StashEntry {
				reference: String::new(),
				message: message.into(),
			},
		);
		self
	}

	/// Returns the recorded calls.
	pub fn get_calls(&self) -> Vec<MockCall> {
		self.calls
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	/// Clears recorded calls.
	pub fn clear_calls(&self) {
		self.calls
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
	}

	/// Returns the current stash entries.
	pub fn get_stashes(&self) -> Vec<StashEntry> {
		self.lock_stashes().clone()
	}

	fn record(&self, call: MockCall) {
		self.calls
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(call);
	}

	fn lock_stashes(&self) -> std::sync::MutexGuard<'_, Vec<StashEntry>> {
		let mut stashes = self.stashes.lock().unwrap_or_else(PoisonError::into_inner);
		for (i, entry) in stashes.iter_mut().enumerate() {
			entry.reference = format!("stash@{{{i}}}");
		}
		stashes
	}

	fn failure(args: &[&str], stderr: &str) -> GitError {
		GitError::CommandFailed {
			cmd: "git",
			args: args.iter().map(|s| s.to_string()).collect(),
			stderr: stderr.to_string(),
		}
	}
}

#[async_trait]
impl GitClient for MockGitClient {
	async fn is_repository(&self, _path: &Path) -> bool {
		self.record(MockCall::IsRepository);
		self.is_repo
	}

	async fn has_changes(&self, _path: &Path) -> Result<bool, GitError> {
		self.record(MockCall::HasChanges);
		Ok(self.dirty.load(Ordering::SeqCst))
	}

	async fn current_branch(&self, _path: &Path) -> Result<Option<String>, GitError> {
		self.record(MockCall::CurrentBranch);
		Ok(self.branch.clone())
	}

	async fn stash_push(&self, _path: &Path, label: &str) -> Result<(), GitError> {
		self.record(MockCall::StashPush(label.to_string()));
		let branch = self.branch.as_deref().unwrap_or("(no branch)");
		self.lock_stashes().insert(
			0,
			StashEntry {
				reference: String::new(),
				message: format!("On {branch}: {label}"),
			},
		);
		self.dirty.store(false, Ordering::SeqCst);
		Ok(())
	}

	async fn stash_list(&self, _path: &Path) -> Result<Vec<StashEntry>, GitError> {
		self.record(MockCall::StashList);
		Ok(self.get_stashes())
	}

	async fn stash_pop(&self, _path: &Path, reference: &str) -> Result<(), GitError> {
		self.record(MockCall::StashPop(reference.to_string()));
		if !self.conflicts.is_empty() {
			return Err(Self::failure(&["stash", "pop", reference], "CONFLICT (content)"));
		}
		if let Some(error) = &self.pop_error {
			return Err(Self::failure(&["stash", "pop", reference], error));
		}
		let mut stashes = self.lock_stashes();
		match stashes.iter().position(|e| e.reference == reference) {
			Some(index) => {
				stashes.remove(index);
				self.dirty.store(true, Ordering::SeqCst);
				Ok(())
			}
			None => Err(Self::failure(
				&["stash", "pop", reference],
				"is not a stash-like commit",
			)),
		}
	}

	async fn unmerged_paths(&self, _path: &Path) -> Result<Vec<String>, GitError> {
		self.record(MockCall::UnmergedPaths);
		Ok(self.conflicts.clone())
	}

	async fn reset_hard(&self, _path: &Path) -> Result<(), GitError> {
		self.record(MockCall::ResetHard);
		Ok(())
	}

	async fn clean_stashed_untracked(&self, _path: &Path, reference: &str) -> Result<Vec<String>, GitError> {
		self.record(MockCall::CleanStashedUntracked(reference.to_string()));
		Ok(Vec::new())
	}

	async fn checkout(&self, _path: &Path, branch: &str) -> Result<(), GitError> {
		self.record(MockCall::Checkout(branch.to_string()));
		match &self.checkout_error {
			Some(error) => Err(Self::failure(&["switch", branch], error)),
			None => Ok(()),
		}
	}

	async fn create_branch(&self, _path: &Path, name: &str, base: Option<&str>) -> Result<(), GitError> {
		self.record(MockCall::CreateBranch {
			name: name.to_string(),
			base: base.map(str::to_string),
		});
		match &self.checkout_error {
			Some(error) => Err(Self::failure(&["switch", "--create", name], error)),
			None => Ok(()),
		}
	}

	async fn list_refs(&self, _path: &Path) -> Result<Vec<RefEntry>, GitError> {
		self.record(MockCall::ListRefs);
		Ok(self.refs.clone())
	}

	async fn discard_changes(&self, _path: &Path) -> Result<(), GitError> {
		self.record(MockCall::DiscardChanges);
		match &self.discard_error {
			Some(error) => Err(Self::failure(&["reset", "--hard", "HEAD"], error)),
			None => Ok(()),
		}
	}
}
