// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared wire types for tether.
//!
//! Every message exchanged over a session is one self-describing JSON object
//! carrying a `type` discriminator. This crate provides:
//! - [`Frame`], the untyped unit the transport moves and captures
//! - [`ClientMessage`] and [`ServerEvent`], the typed request/event vocabulary
//! - branch and history records shared by the client and the executor

mod error;
mod frame;
mod message;

pub use error::ProtocolError;
pub use frame::Frame;
pub use message::{
	BranchList, BranchOutcome, BranchRecord, BulkHistory, ClientMessage, CreateBranchRequest,
	DiscardResult, HistoryEntry, HistoryRole, PromptRequest, ServerEvent, SnapshotPart,
	StatusUpdate, SwitchBranchRequest, TerminalError, TerminalResult, TextDelta, ToolEvent,
	ToolStatus, TurnSnapshot,
};
