// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Branch lifecycle for tether.
//!
//! The client half ([`BranchManager`]) keeps the branch selector state and
//! switches optimistically. The executing half ([`BranchExecutor`]) runs the
//! requests against the project repository, isolating uncommitted work in a
//! labelled stash around every branch change.

mod error;
mod executor;
pub mod git;
mod listing;
mod optimistic;
mod stash;

pub use error::BranchError;
pub use executor::BranchExecutor;
pub use listing::branch_records;
pub use optimistic::{BranchManager, CreateState, SwitchState};
pub use stash::{StashHandle, Stasher, DEFAULT_STASH_PREFIX};
