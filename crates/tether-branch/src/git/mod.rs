// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The git seam used by the executing side.

mod client;
mod command_client;
mod error;
mod mock_client;

pub use client::{GitClient, RefEntry, StashEntry};
pub use command_client::CommandGitClient;
pub use error::GitError;
pub use mock_client::{MockCall, MockGitClient};

#[cfg(test)]
pub(crate) use command_client::tests as fixtures;
