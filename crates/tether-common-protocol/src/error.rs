// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors raised while turning raw text into frames or frames into messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("invalid JSON: {0}")]
	InvalidJson(#[from] serde_json::Error),

	#[error("frame is not a JSON object")]
	NotAnObject,

	#[error("frame has no string `type` discriminator")]
	MissingType,
}
