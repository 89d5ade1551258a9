// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use super::client::{GitClient, RefEntry, StashEntry};
use super::error::GitError;

const REF_FORMAT: &str = "--format=%(refname)%00%(HEAD)%00%(committerdate:unix)";
const STASH_FORMAT: &str = "--format=%gd%x00%gs";

/// Git client implementation using the git CLI.
pub struct CommandGitClient;

impl CommandGitClient {
	pub fn new() -> Self {
		Self
	}
}

impl Default for CommandGitClient {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl GitClient for CommandGitClient {
	async fn is_repository(&self, path: &Path) -> bool {
		run_git(path, &["rev-parse", "--show-toplevel"])
			.await
			.is_ok()
	}

	async fn has_changes(&self, path: &Path) -> Result<bool, GitError> {
		let status = run_git(path, &["status", "--porcelain"]).await?;
		Ok(!status.is_empty())
	}

	async fn current_branch(&self, path: &Path) -> Result<Option<String>, GitError> {
		match run_git(path, &["symbolic-ref", "--quiet", "--short", "HEAD"]).await {
			Ok(name) if !name.is_empty() => Ok(Some(name)),
			Ok(_) => Ok(None),
			// Exit status 1 with no stderr: HEAD is detached.
			Err(GitError::CommandFailed { stderr, .. }) if stderr.is_empty() => Ok(None),
			Err(e) => Err(e),
		}
	}

	async fn stash_push(&self, path: &Path, label: &str) -> Result<(), GitError> {
		run_git(path, &["stash", "push", "--include-untracked", "-m", label]).await?;
		debug!(path = %path.display(), label, "stashed working tree");
		Ok(())
	}

	async fn stash_list(&self, path: &Path) -> Result<Vec<StashEntry>, GitError> {
		let output = run_git(path, &["stash", "list", STASH_FORMAT]).await?;
		Ok(parse_stash_list(&output))
	}

	async fn stash_pop(&self, path: &Path, reference: &str) -> Result<(), GitError> {
		run_git(path, &["stash", "pop", reference]).await?;
		debug!(path = %path.display(), reference, "popped stash");
		Ok(())
	}

	async fn unmerged_paths(&self, path: &Path) -> Result<Vec<String>, GitError> {
		let output = run_git(path, &["diff", "--name-only", "--diff-filter=U"]).await?;
		Ok(output.lines().map(str::to_string).collect())
	}

	async fn reset_hard(&self, path: &Path) -> Result<(), GitError> {
		run_git(path, &["reset", "--hard", "HEAD"]).await?;
		debug!(path = %path.display(), "reset working tree to HEAD");
		Ok(())
	}

	async fn clean_stashed_untracked(&self, path: &Path, reference: &str) -> Result<Vec<String>, GitError> {
		// Untracked files live in the entry's third parent, absent without -u.
		let untracked = format!("{reference}^3");
		if run_git(path, &["rev-parse", "--verify", "--quiet", &untracked]).await.is_err() {
			return Ok(Vec::new());
		}
		let listed = run_git(path, &["ls-tree", "-r", "-z", "--name-only", &untracked]).await?;
		let paths: Vec<String> = listed
			.split('\0')
			.filter(|p| !p.is_empty())
			.map(str::to_string)
			.collect();
		if paths.is_empty() {
			return Ok(paths);
		}

		let mut args = vec!["clean", "-f", "-q", "--"];
		args.extend(paths.iter().map(String::as_str));
		run_git(path, &args).await?;
		debug!(path = %path.display(), reference, files = paths.len(), "removed restored untracked files");
		Ok(paths)
	}

	async fn checkout(&self, path: &Path, branch: &str) -> Result<(), GitError> {
		run_git(path, &["switch", branch]).await?;
		debug!(path = %path.display(), branch, "switched branch");
		Ok(())
	}

	async fn create_branch(&self, path: &Path, name: &str, base: Option<&str>) -> Result<(), GitError> {
		let mut args = vec!["switch", "--create", name];
		if let Some(base) = base {
			args.push(base);
		}
		run_git(path, &args).await?;
		debug!(path = %path.display(), name, base, "created branch");
		Ok(())
	}

	async fn list_refs(&self, path: &Path) -> Result<Vec<RefEntry>, GitError> {
		let output = run_git(
			path,
			&[
				"for-each-ref",
				"--sort=-committerdate",
				REF_FORMAT,
				"refs/heads",
				"refs/remotes",
			],
		)
		.await?;
		let refs = parse_ref_list(&output);
		debug!(path = %path.display(), refs = refs.len(), "listed refs");
		Ok(refs)
	}

	async fn discard_changes(&self, path: &Path) -> Result<(), GitError> {
		run_git(path, &["reset", "--hard", "HEAD"]).await?;
		run_git(path, &["clean", "-fd"]).await?;
		debug!(path = %path.display(), "discarded uncommitted changes");
		Ok(())
	}
}

/// Runs a git command and returns the stdout on success.
async fn run_git(path: &Path, args: &[&str]) -> Result<String, GitError> {
	let mut cmd = Command::new("git");
	cmd.arg("-C").arg(path).args(args);

	trace!(
			cmd = %format!("git -C {} {}", path.display(), args.join(" ")),
			"running git command"
	);

	let output = cmd.output().await.map_err(|e| {
		if e.kind() == std::io::ErrorKind::NotFound {
			warn!("git not found in PATH");
			GitError::GitNotInstalled
		} else {
			GitError::Io(e)
		}
	})?;

	if output.status.success() {
		Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
	} else {
		let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
		Err(GitError::CommandFailed {
			cmd: "git",
			args: args.iter().map(|s| s.to_string()).collect(),
			stderr,
		})
	}
}

fn parse_stash_list(output: &str) -> Vec<StashEntry> {
	output
		.lines()
		.filter_map(|line| {
			let (reference, message) = line.split_once('\0')?;
			Some(StashEntry {
				reference: reference.to_string(),
				message: message.to_string(),
			})
		})
		.collect()
}

fn parse_ref_list(output: &str) -> Vec<RefEntry> {
	output
		.lines()
		.filter_map(|line| {
			let mut fields = line.split('\0');
			let refname = fields.next().filter(|r| !r.is_empty())?;
			let is_head = fields.next().is_some_and(|h| h.trim() == "*");
			let committed_at = fields.next().and_then(|t| t.trim().parse().ok());
			Some(RefEntry {
				refname: refname.to_string(),
				is_head,
				committed_at,
			})
		})
		.collect()
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use std::fs;
	use std::process::Command as StdCommand;
	use tempfile::TempDir;

	pub(crate) fn git(dir: &Path, args: &[&str]) -> String {
		let output = StdCommand::new("git")
			.args(args)
			.current_dir(dir)
			.output()
			.expect("git failed to start");
		assert!(
			output.status.success(),
			"git {args:?} failed: {}",
			String::from_utf8_lossy(&output.stderr)
		);
		String::from_utf8_lossy(&output.stdout).trim().to_string()
	}

	/// A repository with one commit of `a.txt` on branch `main`.
	pub(crate) fn init_repo() -> TempDir {
		let temp = TempDir::new().unwrap();
		let dir = temp.path();
		git(dir, &["init", "--quiet"]);
		git(dir, &["config", "user.email", "test@test.com"]);
		git(dir, &["config", "user.name", "Test"]);
		fs::write(dir.join("a.txt"), "base\n").unwrap();
		git(dir, &["add", "."]);
		git(dir, &["commit", "--quiet", "-m", "Initial commit"]);
		git(dir, &["branch", "-M", "main"]);
		temp
	}

	#[test]
	fn test_parse_stash_list() {
		let entries = parse_stash_list("stash@{0}\0On main: tether-autostash:x\nstash@{1}\0WIP on main: abc\n");
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0].reference, "stash@{0}");
		assert_eq!(entries[0].message, "On main: tether-autostash:x");
		assert!(parse_stash_list("").is_empty());
	}

	#[test]
	fn test_parse_ref_list() {
		let refs = parse_ref_list("refs/heads/main\0*\01700000000\nrefs/remotes/origin/x\0 \0\n");
		assert_eq!(
			refs,
			vec![
				RefEntry {
					refname: "refs/heads/main".to_string(),
					is_head: true,
					committed_at: Some(1_700_000_000),
				},
				RefEntry {
					refname: "refs/remotes/origin/x".to_string(),
					is_head: false,
					committed_at: None,
				},
			]
		);
	}

	/// Test: is_repository distinguishes repositories from plain directories.
	///
	/// Why this test is important: the executor refuses to touch a path that
	/// is not a repository before it stashes anything.
	#[tokio::test]
	async fn test_is_repository() {
		let repo = init_repo();
		let plain = TempDir::new().unwrap();
		let client = CommandGitClient::new();
		assert!(client.is_repository(repo.path()).await);
		assert!(!client.is_repository(plain.path()).await);
	}

	#[tokio::test]
	async fn test_has_changes_sees_untracked_files() {
		let repo = init_repo();
		let client = CommandGitClient::new();
		assert!(!client.has_changes(repo.path()).await.unwrap());

		fs::write(repo.path().join("new.txt"), "new").unwrap();
		assert!(client.has_changes(repo.path()).await.unwrap());
	}

	#[tokio::test]
	async fn test_current_branch_and_detached_head() {
		let repo = init_repo();
		let client = CommandGitClient::new();
		assert_eq!(client.current_branch(repo.path()).await.unwrap(), Some("main".to_string()));

		git(repo.path(), &["checkout", "--quiet", "--detach"]);
		assert_eq!(client.current_branch(repo.path()).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_stash_push_list_pop() {
		let repo = init_repo();
		let client = CommandGitClient::new();
		fs::write(repo.path().join("a.txt"), "changed\n").unwrap();
		fs::write(repo.path().join("untracked.txt"), "u").unwrap();

		client.stash_push(repo.path(), "tether-autostash:t1").await.unwrap();
		assert!(!client.has_changes(repo.path()).await.unwrap());

		let entries = client.stash_list(repo.path()).await.unwrap();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].reference, "stash@{0}");
		assert!(entries[0].message.ends_with("tether-autostash:t1"));

		client.stash_pop(repo.path(), "stash@{0}").await.unwrap();
		assert_eq!(fs::read_to_string(repo.path().join("a.txt")).unwrap(), "changed\n");
		assert!(repo.path().join("untracked.txt").exists());
		assert!(client.stash_list(repo.path()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_create_checkout_and_list_refs() {
		let repo = init_repo();
		let client = CommandGitClient::new();

		client.create_branch(repo.path(), "feature", Some("main")).await.unwrap();
		assert_eq!(client.current_branch(repo.path()).await.unwrap(), Some("feature".to_string()));

		client.checkout(repo.path(), "main").await.unwrap();
		let refs = client.list_refs(repo.path()).await.unwrap();
		let mut names: Vec<&str> = refs.iter().map(|r| r.refname.as_str()).collect();
		names.sort_unstable();
		assert_eq!(names, vec!["refs/heads/feature", "refs/heads/main"]);
		let head: Vec<&RefEntry> = refs.iter().filter(|r| r.is_head).collect();
		assert_eq!(head.len(), 1);
		assert_eq!(head[0].refname, "refs/heads/main");
		assert!(head[0].committed_at.is_some());
	}

	#[tokio::test]
	async fn test_checkout_missing_branch_fails() {
		let repo = init_repo();
		let client = CommandGitClient::new();
		let err = client.checkout(repo.path(), "does-not-exist").await.unwrap_err();
		assert!(matches!(err, GitError::CommandFailed { .. }));
		assert!(err.stderr().is_some_and(|s| !s.is_empty()));
	}

	#[tokio::test]
	async fn test_discard_changes_removes_everything() {
		let repo = init_repo();
		let client = CommandGitClient::new();
		fs::write(repo.path().join("a.txt"), "changed\n").unwrap();
		fs::create_dir(repo.path().join("scratch")).unwrap();
		fs::write(repo.path().join("scratch/b.txt"), "b").unwrap();

		client.discard_changes(repo.path()).await.unwrap();
		assert!(!client.has_changes(repo.path()).await.unwrap());
		assert_eq!(fs::read_to_string(repo.path().join("a.txt")).unwrap(), "base\n");
		assert!(!repo.path().join("scratch").exists());
	}

	#[tokio::test]
	async fn test_clean_stashed_untracked_spares_tracked_files() {
		let repo = init_repo();
		let client = CommandGitClient::new();
		fs::write(repo.path().join("new.txt"), "untracked\n").unwrap();
		fs::write(repo.path().join("a.txt"), "changed\n").unwrap();
		client.stash_push(repo.path(), "tether-autostash:t").await.unwrap();

		git(repo.path(), &["stash", "apply", "stash@{0}"]);
		let paths = client.clean_stashed_untracked(repo.path(), "stash@{0}").await.unwrap();
		assert_eq!(paths, vec!["new.txt".to_string()]);
		assert!(!repo.path().join("new.txt").exists());
		assert_eq!(fs::read_to_string(repo.path().join("a.txt")).unwrap(), "changed\n");

		fs::write(repo.path().join("a.txt"), "again\n").unwrap();
		git(repo.path(), &["stash", "push", "-m", "tracked only"]);
		assert!(client.clean_stashed_untracked(repo.path(), "stash@{0}").await.unwrap().is_empty());
	}
}
