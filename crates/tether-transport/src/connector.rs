// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tether_common_protocol::Frame;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::address::SessionAddress;
use crate::error::TransportError;

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// One open connection: frames out, frames in.
///
/// The stream ending (or yielding an error) means the connection dropped.
pub struct Link {
	pub sink: FrameSink,
	pub stream: FrameStream,
}

/// Opens links to a session address.
#[async_trait]
pub trait Connector: Send + Sync {
	async fn open(&self, address: &SessionAddress) -> Result<Link, TransportError>;
}

/// WebSocket connector: one JSON object per text message.
#[derive(Debug, Clone)]
pub struct WsConnector {
	connect_timeout: Duration,
}

impl WsConnector {
	pub fn new(connect_timeout: Duration) -> Self {
		Self { connect_timeout }
	}
}

impl Default for WsConnector {
	fn default() -> Self {
		Self::new(Duration::from_secs(10))
	}
}

#[async_trait]
impl Connector for WsConnector {
	async fn open(&self, address: &SessionAddress) -> Result<Link, TransportError> {
		let url = address.connect_url();
		debug!(address = %address, "opening websocket");

		let (ws, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
			.await
			.map_err(|_| TransportError::ConnectTimeout(self.connect_timeout))??;

		let (sink, stream) = ws.split();

		let sink = sink
			.sink_map_err(TransportError::WebSocket)
			.with(|frame: Frame| future::ready(Ok::<_, TransportError>(Message::Text(frame.to_text()))));

		let stream = stream.filter_map(|message| future::ready(decode_message(message)));

		Ok(Link {
			sink: Box::pin(sink),
			stream: Box::pin(stream),
		})
	}
}

fn decode_message(
	message: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<Frame, TransportError>> {
	let text = match message {
		Ok(Message::Text(text)) => text,
		Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
			Ok(text) => text,
			Err(_) => {
				warn!("ignoring non-UTF-8 binary message");
				return None;
			}
		},
		Ok(_) => return None,
		Err(e) => return Some(Err(e.into())),
	};

	match Frame::parse(&text) {
		Ok(frame) => Some(Ok(frame)),
		Err(e) => {
			warn!(error = %e, "ignoring malformed frame");
			None
		}
	}
}
