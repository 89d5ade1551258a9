// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

use crate::git::GitError;

#[derive(Debug, Error)]
pub enum BranchError {
	#[error(transparent)]
	Git(#[from] GitError),

	#[error("not a git repository: {}", .0.display())]
	NotARepository(PathBuf),

	#[error("invalid branch name: {0:?}")]
	InvalidBranchName(String),

	/// The stashed changes did not apply cleanly. The working tree was reset
	/// to HEAD and the stash entry is still there.
	#[error(
		"stashed changes conflict with HEAD in {}; the working tree was reset and your changes are kept in {reference} ({label}). Run `git stash pop {reference}` and resolve the conflicts to restore them",
		paths.join(", ")
	)]
	StashConflict {
		label: String,
		reference: String,
		paths: Vec<String>,
	},

	/// The stashed changes could not be restored for a reason other than a
	/// merge conflict. The working tree was cleaned and the entry kept.
	#[error(
		"stashed changes could not be restored ({reason}); the working tree was cleaned and your changes are kept in {reference} ({label})"
	)]
	StashNotRestored {
		label: String,
		reference: String,
		reason: String,
	},

	#[error("{cause}; restoring the stashed changes also failed: {restore}")]
	RollbackFailed {
		cause: Box<BranchError>,
		restore: Box<BranchError>,
	},
}

impl BranchError {
	pub fn is_stash_conflict(&self) -> bool {
		matches!(self, Self::StashConflict { .. })
	}

	/// The operation went through but the carried changes stayed in the
	/// stash.
	pub fn is_stash_retained(&self) -> bool {
		matches!(self, Self::StashConflict { .. } | Self::StashNotRestored { .. })
	}
}
