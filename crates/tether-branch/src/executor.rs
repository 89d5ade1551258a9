// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tether_common_protocol::{
	BranchList, BranchOutcome, BranchRecord, ClientMessage, DiscardResult, ServerEvent, TerminalError,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::BranchError;
use crate::git::GitClient;
use crate::listing::branch_records;
use crate::stash::Stasher;

/// Runs branch requests against one repository.
///
/// Uncommitted work is carried across a switch or create: it is stashed
/// first and restored on the new branch. If the branch change itself fails
/// the stash is restored on the original branch.
pub struct BranchExecutor {
	git: Arc<dyn GitClient>,
	stasher: Stasher,
	repo: PathBuf,
}

impl BranchExecutor {
	pub fn new(git: Arc<dyn GitClient>, repo: impl Into<PathBuf>) -> Self {
		Self {
			stasher: Stasher::new(Arc::clone(&git)),
			git,
			repo: repo.into(),
		}
	}

	pub fn with_stash_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.stasher = self.stasher.with_prefix(prefix);
		self
	}

	pub fn repo(&self) -> &Path {
		&self.repo
	}

	pub fn stasher(&self) -> &Stasher {
		&self.stasher
	}

	pub async fn list(&self) -> Result<Vec<BranchRecord>, BranchError> {
		self.ensure_repository().await?;
		let refs = self.git.list_refs(&self.repo).await?;
		Ok(branch_records(&refs))
	}

	/// Switches to `name`.
	///
	/// `Err(BranchError::StashConflict)` means the switch happened but the
	/// carried changes did not apply; they stay in the stash.
	#[instrument(skip(self), fields(repo = %self.repo.display()))]
	pub async fn switch(&self, name: &str) -> Result<(), BranchError> {
		validate_name(name)?;
		self.ensure_repository().await?;
		let tag = format!("switch-{}", Uuid::new_v4());
		let stashed = self.stasher.stash(&self.repo, &tag).await?;

		if let Err(e) = self.git.checkout(&self.repo, name).await {
			return Err(self.roll_back(e.into(), stashed.is_some()).await);
		}
		info!(branch = name, "switched branch");

		if stashed.is_some() {
			self.stasher.pop_stash(&self.repo, &tag).await?;
		}
		Ok(())
	}

	/// Creates `name` from `base` (HEAD when absent) and switches to it.
	#[instrument(skip(self), fields(repo = %self.repo.display()))]
	pub async fn create(&self, name: &str, base: Option<&str>) -> Result<(), BranchError> {
		validate_name(name)?;
		self.ensure_repository().await?;
		let tag = format!("create-{}", Uuid::new_v4());
		let stashed = self.stasher.stash(&self.repo, &tag).await?;

		if let Err(e) = self.git.create_branch(&self.repo, name, base).await {
			return Err(self.roll_back(e.into(), stashed.is_some()).await);
		}
		info!(branch = name, "created branch");

		if stashed.is_some() {
			self.stasher.pop_stash(&self.repo, &tag).await?;
		}
		Ok(())
	}

	pub async fn discard(&self) -> Result<(), BranchError> {
		self.ensure_repository().await?;
		self.git.discard_changes(&self.repo).await?;
		info!(repo = %self.repo.display(), "discarded uncommitted changes");
		Ok(())
	}

	/// Answers a branch request. Returns `None` for messages that are not
	/// branch requests.
	pub async fn handle(&self, message: &ClientMessage) -> Option<ServerEvent> {
		let event = match message {
			ClientMessage::ListBranches => match self.list().await {
				Ok(branches) => ServerEvent::BranchList(BranchList { branches }),
				Err(e) => {
					error!(error = %e, "listing branches failed");
					ServerEvent::TerminalError(TerminalError {
						request_id: None,
						message: e.to_string(),
					})
				}
			},
			ClientMessage::SwitchBranch(request) => {
				let result = self.switch(&request.branch_name).await;
				ServerEvent::BranchSwitchResult(outcome(&request.branch_name, result))
			}
			ClientMessage::CreateBranch(request) => {
				let result = self.create(&request.branch_name, request.base.as_deref()).await;
				ServerEvent::BranchCreateResult(outcome(&request.branch_name, result))
			}
			ClientMessage::DiscardChanges => match self.discard().await {
				Ok(()) => ServerEvent::DiscardResult(DiscardResult {
					success: true,
					error: None,
				}),
				Err(e) => ServerEvent::DiscardResult(DiscardResult {
					success: false,
					error: Some(e.to_string()),
				}),
			},
			ClientMessage::Prompt(_) | ClientMessage::NewSession | ClientMessage::Stop => return None,
		};
		Some(event)
	}

	async fn ensure_repository(&self) -> Result<(), BranchError> {
		if self.git.is_repository(&self.repo).await {
			Ok(())
		} else {
			Err(BranchError::NotARepository(self.repo.clone()))
		}
	}

	async fn roll_back(&self, cause: BranchError, stashed: bool) -> BranchError {
		warn!(error = %cause, stashed, "branch change failed");
		if !stashed {
			return cause;
		}
		match self.stasher.pop_latest(&self.repo).await {
			Ok(_) => cause,
			Err(restore) => BranchError::RollbackFailed {
				cause: Box::new(cause),
				restore: Box::new(restore),
			},
		}
	}
}

fn validate_name(name: &str) -> Result<(), BranchError> {
	if name.trim().is_empty() || name.starts_with('-') {
		return Err(BranchError::InvalidBranchName(name.to_string()));
	}
	Ok(())
}

fn outcome(branch_name: &str, result: Result<(), BranchError>) -> BranchOutcome {
	let (success, error) = match result {
		Ok(()) => (true, None),
		// The branch changed; only the carried changes are parked.
		Err(e) if e.is_stash_retained() => (true, Some(e.to_string())),
		Err(e) => (false, Some(e.to_string())),
	};
	BranchOutcome {
		branch_name: branch_name.to_string(),
		success,
		error,
	}
}
