// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use tether_common_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
	/// The frame was not transmitted. `captured` tells whether it was kept
	/// for replay on the next successful connection.
	#[error("session is not connected (frame captured for replay: {captured})")]
	SendWhileDisconnected { captured: bool },

	#[error("connection attempt timed out after {0:?}")]
	ConnectTimeout(Duration),

	#[error("websocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("protocol error: {0}")]
	Protocol(#[from] ProtocolError),

	#[error("invalid session address: {0}")]
	InvalidAddress(String),

	#[error("session task has shut down")]
	Closed,
}

impl TransportError {
	/// Whether the error is the benign "not connected" signal.
	pub fn is_disconnected(&self) -> bool {
		matches!(self, Self::SendWhileDisconnected { .. })
	}
}
