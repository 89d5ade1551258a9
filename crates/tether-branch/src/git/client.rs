// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;

use async_trait::async_trait;

use super::error::GitError;

/// One `git stash list` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StashEntry {
	/// Reflog selector, e.g. `stash@{0}`.
	pub reference: String,
	/// Reflog subject, e.g. `On main: tether-autostash:switch-1f2e`.
	pub message: String,
}

/// One local or remote-tracking ref.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefEntry {
	/// Full ref name, e.g. `refs/heads/main` or `refs/remotes/origin/feature`.
	pub refname: String,
	/// HEAD points at this ref.
	pub is_head: bool,
	/// Committer date of the tip, unix seconds.
	pub committed_at: Option<i64>,
}

/// Trait abstracting git operations for testability.
#[async_trait]
pub trait GitClient: Send + Sync {
	/// Check if the path is inside a git repository.
	async fn is_repository(&self, path: &Path) -> bool;

	/// Whether the working tree or index has any change, untracked files included.
	async fn has_changes(&self, path: &Path) -> Result<bool, GitError>;

	/// Short name of the checked-out branch; `None` on a detached HEAD.
	async fn current_branch(&self, path: &Path) -> Result<Option<String>, GitError>;

	/// `git stash push -u -m <label>`.
	async fn stash_push(&self, path: &Path, label: &str) -> Result<(), GitError>;

	/// Stash entries, most recent first.
	async fn stash_list(&self, path: &Path) -> Result<Vec<StashEntry>, GitError>;

	/// `git stash pop <reference>`. Git keeps the entry when the pop conflicts.
	async fn stash_pop(&self, path: &Path, reference: &str) -> Result<(), GitError>;

	/// Paths left unmerged in the index.
	async fn unmerged_paths(&self, path: &Path) -> Result<Vec<String>, GitError>;

	/// `git reset --hard HEAD`.
	async fn reset_hard(&self, path: &Path) -> Result<(), GitError>;

	/// Deletes the untracked files recorded in a stash entry from the working
	/// tree. Tracked files are left alone. Returns the recorded paths.
	async fn clean_stashed_untracked(&self, path: &Path, reference: &str) -> Result<Vec<String>, GitError>;

	/// Switch to an existing branch, creating a tracking branch for a
	/// remote-only one.
	async fn checkout(&self, path: &Path, branch: &str) -> Result<(), GitError>;

	/// Create a branch from `base` (or HEAD) and switch to it.
	async fn create_branch(&self, path: &Path, name: &str, base: Option<&str>) -> Result<(), GitError>;

	/// Local and remote-tracking refs, most recently committed first.
	async fn list_refs(&self, path: &Path) -> Result<Vec<RefEntry>, GitError>;

	/// Drop every uncommitted change, untracked files included.
	async fn discard_changes(&self, path: &Path) -> Result<(), GitError>;
}
