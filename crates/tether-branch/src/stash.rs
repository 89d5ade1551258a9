// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stash isolation around branch operations.
//!
//! Uncommitted work is parked in a labelled stash entry before the branch
//! changes and restored afterwards. A restore that fails never leaves a
//! half-applied tree behind: tracked files go back to HEAD, restored
//! untracked files are removed, and the entry stays in the stash list for
//! the user to resolve.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::BranchError;
use crate::git::{GitClient, StashEntry};

pub const DEFAULT_STASH_PREFIX: &str = "tether-autostash";

/// Label of one stash entry. The label ends with the tag it was created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashHandle {
	label: String,
}

impl StashHandle {
	pub fn new(prefix: &str, tag: &str) -> Self {
		Self {
			label: format!("{prefix}:{tag}"),
		}
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	/// `git stash list` subjects look like `On <branch>: <label>`.
	pub fn matches(&self, entry: &StashEntry) -> bool {
		entry.message.ends_with(&self.label)
	}
}

pub struct Stasher {
	git: Arc<dyn GitClient>,
	prefix: String,
}

impl Stasher {
	pub fn new(git: Arc<dyn GitClient>) -> Self {
		Self {
			git,
			prefix: DEFAULT_STASH_PREFIX.to_string(),
		}
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	pub fn handle(&self, tag: &str) -> StashHandle {
		StashHandle::new(&self.prefix, tag)
	}

	/// Parks every uncommitted change, untracked files included. Returns
	/// `None` without touching the repository when the tree is clean.
	pub async fn stash(&self, repo: &Path, tag: &str) -> Result<Option<StashHandle>, BranchError> {
		if !self.git.has_changes(repo).await? {
			debug!(repo = %repo.display(), tag, "working tree clean, nothing to stash");
			return Ok(None);
		}
		let handle = self.handle(tag);
		self.git.stash_push(repo, handle.label()).await?;
		info!(repo = %repo.display(), label = handle.label(), "stashed uncommitted changes");
		Ok(Some(handle))
	}

	/// Restores the most recent entry created for `tag`. Returns `false` when
	/// there is no such entry.
	pub async fn pop_stash(&self, repo: &Path, tag: &str) -> Result<bool, BranchError> {
		let handle = self.handle(tag);
		let entries = self.git.stash_list(repo).await?;
		let Some(entry) = entries.into_iter().find(|e| handle.matches(e)) else {
			debug!(repo = %repo.display(), label = handle.label(), "no stash entry to restore");
			return Ok(false);
		};
		self.pop_entry(repo, &entry, handle.label()).await?;
		Ok(true)
	}

	/// Restores `stash@{0}`, whatever created it.
	pub async fn pop_latest(&self, repo: &Path) -> Result<bool, BranchError> {
		let entries = self.git.stash_list(repo).await?;
		let Some(entry) = entries.into_iter().next() else {
			return Ok(false);
		};
		let label = entry.message.clone();
		self.pop_entry(repo, &entry, &label).await?;
		Ok(true)
	}

	async fn pop_entry(&self, repo: &Path, entry: &StashEntry, label: &str) -> Result<(), BranchError> {
		let was_clean = !self.git.has_changes(repo).await?;
		let Err(pop_error) = self.git.stash_pop(repo, &entry.reference).await else {
			info!(repo = %repo.display(), label, "restored stashed changes");
			return Ok(());
		};

		let paths = self.git.unmerged_paths(repo).await?;
		if paths.is_empty() && !was_clean {
			// Local work predates the pop; leave the tree as it is.
			return Err(pop_error.into());
		}

		warn!(
			repo = %repo.display(),
			label,
			reference = %entry.reference,
			conflicts = paths.len(),
			error = %pop_error,
			"stash restore failed, resetting working tree"
		);
		self.git.reset_hard(repo).await?;
		if was_clean {
			self.git.clean_stashed_untracked(repo, &entry.reference).await?;
		}

		if paths.is_empty() {
			let reason = pop_error
				.stderr()
				.and_then(|stderr| stderr.lines().find(|line| !line.trim().is_empty()))
				.map(str::to_string)
				.unwrap_or_else(|| pop_error.to_string());
			return Err(BranchError::StashNotRestored {
				label: label.to_string(),
				reference: entry.reference.clone(),
				reason,
			});
		}
		Err(BranchError::StashConflict {
			label: label.to_string(),
			reference: entry.reference.clone(),
			paths,
		})
	}
}
