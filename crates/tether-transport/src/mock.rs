// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory [`Connector`] for exercising reconnect behavior without a network.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use tether_common_protocol::Frame;
use tokio::sync::mpsc;

use crate::address::SessionAddress;
use crate::connector::{Connector, Link};
use crate::error::TransportError;

#[derive(Debug, Default)]
struct MockState {
	refuse: u32,
	opened: Vec<SessionAddress>,
}

/// Connector whose every successful `open` hands the far end of the link to
/// the test through [`MockRemotes`].
#[derive(Clone)]
pub struct MockConnector {
	state: Arc<Mutex<MockState>>,
	remotes: mpsc::UnboundedSender<MockRemote>,
}

impl MockConnector {
	pub fn new() -> (Self, MockRemotes) {
		let (tx, rx) = mpsc::unbounded_channel();
		let connector = Self {
			state: Arc::new(Mutex::new(MockState::default())),
			remotes: tx,
		};
		(connector, MockRemotes { rx })
	}

	/// Makes the next `count` opens fail.
	pub fn refuse_next(&self, count: u32) {
		self.lock().refuse = count;
	}

	/// Addresses of every open attempt, refused ones included.
	pub fn opened(&self) -> Vec<SessionAddress> {
		self.lock().opened.clone()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[async_trait]
impl Connector for MockConnector {
	async fn open(&self, address: &SessionAddress) -> Result<Link, TransportError> {
		{
			let mut state = self.lock();
			state.opened.push(address.clone());
			if state.refuse > 0 {
				state.refuse -= 1;
				return Err(TransportError::ConnectTimeout(Duration::ZERO));
			}
		}

		let (client_tx, remote_rx) = fmpsc::unbounded::<Frame>();
		let (remote_tx, client_rx) = fmpsc::unbounded::<Result<Frame, TransportError>>();

		let remote = MockRemote {
			address: address.clone(),
			incoming: remote_rx,
			outgoing: remote_tx,
		};
		self.remotes.send(remote).map_err(|_| TransportError::Closed)?;

		Ok(Link {
			sink: Box::pin(client_tx.sink_map_err(|_| TransportError::Closed)),
			stream: Box::pin(client_rx),
		})
	}
}

/// Receives the far end of each link the connector opens.
pub struct MockRemotes {
	rx: mpsc::UnboundedReceiver<MockRemote>,
}

impl MockRemotes {
	pub async fn accept(&mut self) -> Option<MockRemote> {
		self.rx.recv().await
	}
}

/// The server side of one mock link. Dropping it (or calling
/// [`close`](Self::close)) looks like the remote hanging up.
pub struct MockRemote {
	pub address: SessionAddress,
	incoming: fmpsc::UnboundedReceiver<Frame>,
	outgoing: fmpsc::UnboundedSender<Result<Frame, TransportError>>,
}

impl MockRemote {
	/// Next frame the client wrote.
	pub async fn recv(&mut self) -> Option<Frame> {
		self.incoming.next().await
	}

	/// Frames the client has written that have not been received yet.
	pub fn drain(&mut self) -> Vec<Frame> {
		let mut frames = Vec::new();
		while let Ok(Some(frame)) = self.incoming.try_next() {
			frames.push(frame);
		}
		frames
	}

	/// Delivers a frame to the client.
	pub fn push(&self, frame: Frame) {
		let _ = self.outgoing.unbounded_send(Ok(frame));
	}

	/// Breaks the link with an error rather than a clean close.
	pub fn fail(&self) {
		let _ = self.outgoing.unbounded_send(Err(TransportError::Closed));
	}

	pub fn close(self) {}
}
