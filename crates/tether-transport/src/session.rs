// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A session connection that heals itself.
//!
//! [`ResilientSession`] owns one background task per connection. The task
//! holds the socket, the capture buffer and the attempt counter; callers talk
//! to it over a command channel, so commands are applied strictly in order.
//! After an unexpected close the task waits per [`RetryPolicy`], reconnects,
//! replays captured setup frames and only then reports `Connected`.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tether_common_protocol::Frame;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

use crate::address::SessionAddress;
use crate::capture::{CaptureBuffer, CaptureNone, CapturePredicate};
use crate::connector::{Connector, Link, WsConnector};
use crate::error::TransportError;
use crate::policy::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
	Disconnected,
	Connecting,
	Connected,
	Sending,
	Processing,
}

impl ConnectionStatus {
	/// Whether frames written now reach the remote.
	pub fn is_open(self) -> bool {
		matches!(self, Self::Connected | Self::Sending | Self::Processing)
	}
}

/// Everything the session task reports to its owner.
#[derive(Debug, Clone)]
pub enum TransportEvent {
	Status(ConnectionStatus),
	/// A frame from the remote.
	Frame(Frame),
	/// The connection closed without being asked to.
	Dropped { reason: String },
	Reconnecting { attempt: u32, delay: Duration },
	/// Captured frames were re-sent on a fresh connection.
	Replayed { frames: usize },
	/// The attempt cap was reached; the session stays disconnected until
	/// [`ResilientSession::reconnect`].
	Exhausted { attempts: u32 },
}

/// Frames sent a short while after a reconnect, once the remote has settled.
#[derive(Debug, Clone)]
pub struct PostReady {
	pub settle: Duration,
	pub frames: Vec<Frame>,
}

#[derive(Clone)]
pub struct SessionOptions {
	pub policy: RetryPolicy,
	pub capture: Arc<dyn CapturePredicate>,
	pub post_ready: Option<PostReady>,
	pub connector: Arc<dyn Connector>,
}

impl SessionOptions {
	pub fn new(connector: Arc<dyn Connector>) -> Self {
		Self {
			policy: RetryPolicy::session_default(),
			capture: Arc::new(CaptureNone),
			post_ready: None,
			connector,
		}
	}

	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn with_capture(mut self, capture: Arc<dyn CapturePredicate>) -> Self {
		self.capture = capture;
		self
	}

	pub fn with_post_ready(mut self, post_ready: PostReady) -> Self {
		self.post_ready = Some(post_ready);
		self
	}
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self::new(Arc::new(WsConnector::default()))
	}
}

enum Command {
	Send {
		frame: Frame,
		reply: oneshot::Sender<Result<(), TransportError>>,
	},
	Disconnect,
	Reconnect,
	SetProcessing(bool),
	Captured(oneshot::Sender<Vec<Frame>>),
}

/// Handle to a self-healing session connection.
///
/// Dropping the handle stops the background task and closes the socket.
pub struct ResilientSession {
	address: SessionAddress,
	commands: mpsc::UnboundedSender<Command>,
	status: watch::Receiver<ConnectionStatus>,
	task: JoinHandle<()>,
}

impl ResilientSession {
	/// Starts connecting in the background and returns immediately.
	///
	/// Must be called from within a tokio runtime.
	pub fn connect(
		address: SessionAddress,
		options: SessionOptions,
	) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
		let (commands_tx, commands_rx) = mpsc::unbounded_channel();
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

		info!(address = %address, "starting session");

		let driver = Driver {
			address: address.clone(),
			options,
			commands: commands_rx,
			events: events_tx,
			status: status_tx,
			capture: CaptureBuffer::new(),
			attempts: 0,
			resumed: false,
			processing: false,
		};
		let task = tokio::spawn(driver.run());

		let session = Self {
			address,
			commands: commands_tx,
			status: status_rx,
			task,
		};
		(session, events_rx)
	}

	pub fn address(&self) -> &SessionAddress {
		&self.address
	}

	pub fn status(&self) -> ConnectionStatus {
		*self.status.borrow()
	}

	/// A receiver that observes every status change.
	pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
		self.status.clone()
	}

	/// Writes one frame.
	///
	/// Captured frames are remembered for replay even when the write cannot
	/// happen now; everything else is dropped while disconnected.
	pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
		let (reply, rx) = oneshot::channel();
		self
			.commands
			.send(Command::Send { frame, reply })
			.map_err(|_| TransportError::Closed)?;
		rx.await.map_err(|_| TransportError::Closed)?
	}

	/// Hands a frame to the session task without waiting for the write.
	/// Only fails when the task is gone; the write itself may still be
	/// dropped like any other send.
	pub fn queue(&self, frame: Frame) -> Result<(), TransportError> {
		let (reply, _) = oneshot::channel();
		self
			.commands
			.send(Command::Send { frame, reply })
			.map_err(|_| TransportError::Closed)
	}

	/// Encodes a typed message and writes it.
	pub async fn send_message<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
		self.send(Frame::encode(message)?).await
	}

	/// Closes the connection and cancels any pending reconnect.
	pub fn disconnect(&self) {
		let _ = self.commands.send(Command::Disconnect);
	}

	/// Starts over with a fresh attempt count. Used after exhaustion.
	pub fn reconnect(&self) {
		let _ = self.commands.send(Command::Reconnect);
	}

	/// Moves status between `Connected` and `Processing`.
	pub fn set_processing(&self, processing: bool) {
		let _ = self.commands.send(Command::SetProcessing(processing));
	}

	/// Frames currently held for replay, in replay order.
	pub async fn captured_frames(&self) -> Result<Vec<Frame>, TransportError> {
		let (reply, rx) = oneshot::channel();
		self
			.commands
			.send(Command::Captured(reply))
			.map_err(|_| TransportError::Closed)?;
		rx.await.map_err(|_| TransportError::Closed)
	}
}

impl Drop for ResilientSession {
	fn drop(&mut self) {
		self.task.abort();
	}
}

enum Phase {
	Connecting,
	Waiting(Pin<Box<Sleep>>),
	Open { link: Link, resumed: bool },
	Idle,
	Shutdown,
}

struct Driver {
	address: SessionAddress,
	options: SessionOptions,
	commands: mpsc::UnboundedReceiver<Command>,
	events: mpsc::UnboundedSender<TransportEvent>,
	status: watch::Sender<ConnectionStatus>,
	capture: CaptureBuffer,
	attempts: u32,
	/// Set when the next successful open must replay captured frames.
	resumed: bool,
	processing: bool,
}

impl Driver {
	async fn run(mut self) {
		let mut phase = Phase::Connecting;
		loop {
			phase = match phase {
				Phase::Connecting => self.connecting().await,
				Phase::Waiting(timer) => self.waiting(timer).await,
				Phase::Open { link, resumed } => self.pump(link, resumed).await,
				Phase::Idle => self.idle().await,
				Phase::Shutdown => break,
			};
		}
		self.set_status(ConnectionStatus::Disconnected);
		debug!(address = %self.address, "session task finished");
	}

	async fn connecting(&mut self) -> Phase {
		self.set_status(ConnectionStatus::Connecting);

		let connector = Arc::clone(&self.options.connector);
		let address = self.address.clone();
		let open = connector.open(&address);
		tokio::pin!(open);

		loop {
			tokio::select! {
				biased;

				command = self.commands.recv() => match command {
					None => return Phase::Shutdown,
					Some(Command::Reconnect) => debug!("reconnect requested while connecting"),
					Some(other) => {
						if let Some(next) = self.on_closed_command(other) {
							return next;
						}
					}
				},

				result = &mut open => {
					return match result {
						Ok(link) => self.established(link).await,
						Err(e) => {
							warn!(address = %self.address, error = %e, attempt = self.attempts, "connection attempt failed");
							self.resumed = true;
							self.schedule_retry()
						}
					};
				}
			}
		}
	}

	async fn established(&mut self, mut link: Link) -> Phase {
		self.attempts = 0;
		let resumed = self.resumed;

		if resumed {
			let frames: Vec<Frame> = self.capture.frames().cloned().collect();
			for frame in &frames {
				if let Err(e) = link.sink.send(frame.clone()).await {
					return self.dropped(format!("replay failed: {e}"));
				}
			}
			if !frames.is_empty() {
				debug!(frames = frames.len(), "replayed captured frames");
				self.emit(TransportEvent::Replayed {
					frames: frames.len(),
				});
			}
			self.resumed = false;
		}

		info!(address = %self.address, resumed, "session connected");
		self.set_status(self.settled_status());
		Phase::Open { link, resumed }
	}

	async fn pump(&mut self, mut link: Link, resumed: bool) -> Phase {
		let mut settle: Option<Pin<Box<Sleep>>> = match &self.options.post_ready {
			Some(post_ready) if resumed && !post_ready.frames.is_empty() => {
				Some(Box::pin(sleep(post_ready.settle)))
			}
			_ => None,
		};

		loop {
			tokio::select! {
				biased;

				command = self.commands.recv() => match command {
					None => {
						let _ = link.sink.close().await;
						return Phase::Shutdown;
					}
					Some(Command::Send { frame, reply }) => {
						let captured = self.capture.offer(self.options.capture.as_ref(), &frame);
						self.set_status(ConnectionStatus::Sending);
						match link.sink.send(frame).await {
							Ok(()) => {
								self.set_status(self.settled_status());
								let _ = reply.send(Ok(()));
							}
							Err(e) => {
								let _ = reply.send(Err(TransportError::SendWhileDisconnected { captured }));
								return self.dropped(format!("write failed: {e}"));
							}
						}
					}
					Some(Command::Disconnect) => {
						info!(address = %self.address, "disconnecting");
						let _ = link.sink.close().await;
						self.processing = false;
						self.set_status(ConnectionStatus::Disconnected);
						return Phase::Idle;
					}
					Some(Command::Reconnect) => debug!("reconnect requested while connected"),
					Some(Command::SetProcessing(processing)) => {
						self.processing = processing;
						self.set_status(self.settled_status());
					}
					Some(Command::Captured(reply)) => {
						let _ = reply.send(self.capture.frames().cloned().collect());
					}
				},

				_ = async {
					if let Some(timer) = settle.as_mut() {
						timer.await;
					}
				}, if settle.is_some() => {
					settle = None;
					let frames = self
						.options
						.post_ready
						.as_ref()
						.map(|p| p.frames.clone())
						.unwrap_or_default();
					debug!(frames = frames.len(), "sending post-ready frames");
					for frame in frames {
						if let Err(e) = link.sink.send(frame).await {
							return self.dropped(format!("post-ready write failed: {e}"));
						}
					}
				}

				incoming = link.stream.next() => match incoming {
					Some(Ok(frame)) => self.emit(TransportEvent::Frame(frame)),
					Some(Err(e)) => return self.dropped(e.to_string()),
					None => return self.dropped("remote closed the connection".to_string()),
				},
			}
		}
	}

	async fn waiting(&mut self, mut timer: Pin<Box<Sleep>>) -> Phase {
		loop {
			tokio::select! {
				biased;

				command = self.commands.recv() => match command {
					None => return Phase::Shutdown,
					Some(Command::Reconnect) => {
						debug!("reconnect requested, skipping backoff");
						return Phase::Connecting;
					}
					Some(other) => {
						if let Some(next) = self.on_closed_command(other) {
							return next;
						}
					}
				},

				() = &mut timer => return Phase::Connecting,
			}
		}
	}

	async fn idle(&mut self) -> Phase {
		loop {
			match self.commands.recv().await {
				None => return Phase::Shutdown,
				Some(Command::Reconnect) => {
					info!(address = %self.address, "restarting session");
					self.attempts = 0;
					return Phase::Connecting;
				}
				Some(Command::Disconnect) => {}
				Some(other) => {
					if let Some(next) = self.on_closed_command(other) {
						return next;
					}
				}
			}
		}
	}

	/// Applies a command that arrived while no link is open.
	fn on_closed_command(&mut self, command: Command) -> Option<Phase> {
		match command {
			Command::Send { frame, reply } => {
				let captured = self.capture.offer(self.options.capture.as_ref(), &frame);
				if captured {
					self.resumed = true;
				}
				debug!(frame_type = frame.frame_type(), captured, "send while disconnected");
				let _ = reply.send(Err(TransportError::SendWhileDisconnected { captured }));
				None
			}
			Command::Disconnect => {
				info!(address = %self.address, "disconnecting, pending reconnect cancelled");
				self.processing = false;
				self.set_status(ConnectionStatus::Disconnected);
				Some(Phase::Idle)
			}
			Command::Reconnect => {
				self.attempts = 0;
				Some(Phase::Connecting)
			}
			Command::SetProcessing(processing) => {
				self.processing = processing;
				None
			}
			Command::Captured(reply) => {
				let _ = reply.send(self.capture.frames().cloned().collect());
				None
			}
		}
	}

	fn dropped(&mut self, reason: String) -> Phase {
		warn!(address = %self.address, reason = %reason, "connection dropped");
		self.emit(TransportEvent::Dropped { reason });
		self.resumed = true;
		self.processing = false;
		self.schedule_retry()
	}

	fn schedule_retry(&mut self) -> Phase {
		let max_attempts = self.options.policy.max_attempts();
		if self.attempts >= max_attempts {
			warn!(address = %self.address, attempts = self.attempts, "reconnect attempts exhausted");
			self.emit(TransportEvent::Exhausted {
				attempts: self.attempts,
			});
			self.set_status(ConnectionStatus::Disconnected);
			return Phase::Idle;
		}

		self.attempts += 1;
		let delay = self.options.policy.delay_for(self.attempts);
		debug!(
			attempt = self.attempts,
			delay_ms = delay.as_millis() as u64,
			"scheduling reconnect"
		);
		self.emit(TransportEvent::Reconnecting {
			attempt: self.attempts,
			delay,
		});
		self.set_status(ConnectionStatus::Disconnected);
		Phase::Waiting(Box::pin(sleep(delay)))
	}

	fn settled_status(&self) -> ConnectionStatus {
		if self.processing {
			ConnectionStatus::Processing
		} else {
			ConnectionStatus::Connected
		}
	}

	fn set_status(&self, next: ConnectionStatus) {
		let changed = self.status.send_if_modified(|current| {
			if *current == next {
				false
			} else {
				*current = next;
				true
			}
		});
		if changed {
			self.emit(TransportEvent::Status(next));
		}
	}

	fn emit(&self, event: TransportEvent) {
		let _ = self.events.send(event);
	}
}
