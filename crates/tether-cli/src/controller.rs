// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Glue between the session transport, the message assembler and the
//! branch manager for one interactive session.

use std::collections::VecDeque;
use std::time::Duration;

use tether_assembler::Assembler;
use tether_branch::{BranchManager, SwitchState};
use tether_common_protocol::{BranchOutcome, ClientMessage, Frame, PromptRequest, ServerEvent};
use tether_transport::reload::{log_opt_in, register_entrypoints};
use tether_transport::{
	Attachment, AttachmentUploader, ConnectionStatus, ReloadChannel, ResilientSession, SessionAddress,
	SessionOptions, TransportError, TransportEvent, UploadFailure,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Something the terminal should redraw or report.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
	Status(ConnectionStatus),
	/// The assembler's records or live turn changed.
	Display,
	/// The assembler's records were replaced wholesale.
	Redraw,
	/// Branch list, current branch or branch error changed.
	Branches,
	Notice(String),
	Reconnecting { attempt: u32, delay: Duration },
	/// Retries are used up; only an explicit retry reconnects.
	Exhausted { attempts: u32 },
}

/// Result of sending a prompt.
#[derive(Debug)]
pub struct PromptReceipt {
	pub request_id: String,
	pub failures: Vec<UploadFailure>,
}

struct ReloadLink {
	session: ResilientSession,
	events: mpsc::UnboundedReceiver<TransportEvent>,
}

enum Source {
	Session(Option<TransportEvent>),
	Reload(TransportEvent),
}

pub struct SessionController {
	session: ResilientSession,
	events: mpsc::UnboundedReceiver<TransportEvent>,
	reload: Option<ReloadLink>,
	uploader: Option<AttachmentUploader>,
	assembler: Assembler,
	branches: BranchManager,
	attachments: Vec<Attachment>,
	listed: bool,
	queued: VecDeque<Update>,
}

impl SessionController {
	pub fn connect(address: SessionAddress, options: SessionOptions) -> Self {
		let uploader = match AttachmentUploader::new(&address) {
			Ok(uploader) => Some(uploader),
			Err(e) => {
				warn!(error = %e, "attachments disabled");
				None
			}
		};
		let (session, events) = ResilientSession::connect(address, options);
		Self {
			session,
			events,
			reload: None,
			uploader,
			assembler: Assembler::new(),
			branches: BranchManager::new(),
			attachments: Vec::new(),
			listed: false,
			queued: VecDeque::new(),
		}
	}

	/// Opens the live-reload channel and registers the entry points. The
	/// registration is captured, so it lands whenever the channel opens.
	pub async fn attach_reload(&mut self, channel: &ReloadChannel, address: SessionAddress, entry_points: &[String]) {
		let (session, events) = channel.connect(address);
		if !entry_points.is_empty() {
			for frame in [register_entrypoints(entry_points.iter().cloned()), log_opt_in()] {
				match session.send(frame).await {
					Ok(()) | Err(TransportError::SendWhileDisconnected { captured: true }) => {}
					Err(e) => warn!(error = %e, "reload registration failed"),
				}
			}
		}
		self.reload = Some(ReloadLink { session, events });
	}

	pub fn status(&self) -> ConnectionStatus {
		self.session.status()
	}

	pub fn assembler(&self) -> &Assembler {
		&self.assembler
	}

	pub fn branches(&self) -> &BranchManager {
		&self.branches
	}

	pub fn pending_attachments(&self) -> usize {
		self.attachments.len()
	}

	/// Waits for the next change worth showing. `None` once the session task
	/// is gone.
	///
	/// Cancel safe: an event is fully applied before anything else awaits,
	/// so dropping the future in a `select!` loses nothing.
	pub async fn next(&mut self) -> Option<Update> {
		loop {
			if let Some(update) = self.queued.pop_front() {
				return Some(update);
			}
			let source = match self.reload.as_mut() {
				Some(reload) => tokio::select! {
					event = self.events.recv() => Source::Session(event),
					Some(event) = reload.events.recv() => Source::Reload(event),
				},
				None => Source::Session(self.events.recv().await),
			};
			match source {
				Source::Session(None) => return None,
				Source::Session(Some(event)) => self.on_session_event(event),
				Source::Reload(event) => self.queued.extend(on_reload_event(event)),
			}
		}
	}

	fn on_session_event(&mut self, event: TransportEvent) {
		let update = match event {
			TransportEvent::Status(status) => {
				if status == ConnectionStatus::Connected && !self.listed {
					self.listed = true;
					self.queue_list_request();
				}
				Some(Update::Status(status))
			}
			TransportEvent::Frame(frame) => self.on_frame(&frame),
			TransportEvent::Dropped { reason } => {
				info!(reason = %reason, "session dropped");
				if self.assembler.interrupt_live() {
					self.queued.push_back(Update::Display);
				}
				if self.branches.connection_lost() {
					self.queued.push_back(Update::Branches);
				}
				// An orphaned switch is settled by the next listing.
				if matches!(self.branches.switch_state(), SwitchState::Pending { .. }) {
					self.listed = false;
				}
				None
			}
			TransportEvent::Reconnecting { attempt, delay } => Some(Update::Reconnecting { attempt, delay }),
			TransportEvent::Replayed { frames } => {
				debug!(frames, "setup frames replayed");
				None
			}
			TransportEvent::Exhausted { attempts } => Some(Update::Exhausted { attempts }),
		};
		self.queued.extend(update);
	}

	fn queue_list_request(&self) {
		let queued = Frame::encode(&self.branches.request_list())
			.map_err(TransportError::from)
			.and_then(|frame| self.session.queue(frame));
		if let Err(e) = queued {
			debug!(error = %e, "branch list request not queued");
		}
	}

	fn on_frame(&mut self, frame: &Frame) -> Option<Update> {
		let event: ServerEvent = match frame.decode() {
			Ok(event) => event,
			Err(e) => {
				warn!(frame_type = %frame.frame_type(), error = %e, "undecodable frame");
				return None;
			}
		};

		match &event {
			ServerEvent::Status(status) => self.session.set_processing(status.is_processing()),
			ServerEvent::TerminalResult(_)
			| ServerEvent::TerminalError(_)
			| ServerEvent::StopAck
			| ServerEvent::SessionReset => self.session.set_processing(false),
			_ => {}
		}

		match event {
			ServerEvent::BranchList(_) | ServerEvent::BranchSwitchResult(_) | ServerEvent::BranchCreateResult(_) => {
				self.branches.apply(&event).then_some(Update::Branches)
			}
			ServerEvent::DiscardResult(result) => Some(Update::Notice(match result.error {
				Some(error) if !result.success => format!("discard failed: {error}"),
				_ => "changes discarded".to_string(),
			})),
			ServerEvent::Unknown => {
				debug!(frame_type = %frame.frame_type(), "ignoring unknown frame");
				None
			}
			ServerEvent::BulkHistory(_) | ServerEvent::SessionReset => {
				self.assembler.apply(&event).then_some(Update::Redraw)
			}
			other => self.assembler.apply(&other).then_some(Update::Display),
		}
	}

	/// Queues a file for the next prompt.
	pub fn attach(&mut self, attachment: Attachment) {
		self.attachments.push(attachment);
	}

	/// Uploads queued attachments, sends the prompt and records it for
	/// display. Attachments stay queued if the prompt could not be sent.
	pub async fn prompt(&mut self, content: &str) -> Result<PromptReceipt, TransportError> {
		if !self.session.status().is_open() {
			return Err(TransportError::SendWhileDisconnected { captured: false });
		}
		let attachments = std::mem::take(&mut self.attachments);
		let report = match (&self.uploader, attachments.is_empty()) {
			(Some(uploader), false) => uploader.upload_all(&attachments).await,
			_ => Default::default(),
		};

		let request_id = uuid::Uuid::new_v4().to_string();
		let message = ClientMessage::Prompt(PromptRequest {
			id: request_id.clone(),
			content: content.to_string(),
			attachment_refs: report.refs,
		});
		if let Err(e) = self.session.send_message(&message).await {
			self.attachments = attachments;
			return Err(e);
		}

		self.assembler.push_prompt(&request_id, content);
		Ok(PromptReceipt {
			request_id,
			failures: report.failures,
		})
	}

	pub async fn stop(&self) -> Result<(), TransportError> {
		self.session.send_message(&ClientMessage::Stop).await
	}

	pub async fn new_session(&self) -> Result<(), TransportError> {
		self.session.send_message(&ClientMessage::NewSession).await
	}

	pub async fn discard_changes(&self) -> Result<(), TransportError> {
		self.session.send_message(&ClientMessage::DiscardChanges).await
	}

	/// Opens the selector and asks for a fresh list.
	pub async fn browse_branches(&mut self) {
		self.branches.open_selector();
		self.request_branches().await;
	}

	/// Asks for the branch list. Failures are logged; the list is refreshed
	/// on the next connect.
	pub async fn request_branches(&self) {
		let request = self.branches.request_list();
		if let Err(e) = self.session.send_message(&request).await {
			debug!(error = %e, "branch list request not sent");
		}
	}

	/// Switches optimistically. Returns `false` when there was nothing to do.
	/// A send failure rolls the optimistic switch back.
	pub async fn switch_branch(&mut self, name: &str) -> Result<bool, TransportError> {
		let Some(request) = self.branches.request_switch(name) else {
			return Ok(false);
		};
		if let Err(e) = self.session.send_message(&request).await {
			self.branches.resolve_switch(&BranchOutcome {
				branch_name: name.to_string(),
				success: false,
				error: Some(e.to_string()),
			});
			return Err(e);
		}
		Ok(true)
	}

	pub async fn create_branch(&mut self, name: &str, base: Option<&str>) -> Result<bool, TransportError> {
		self.branches.open_create();
		let Some(request) = self.branches.request_create(name, base) else {
			return Ok(false);
		};
		if let Err(e) = self.session.send_message(&request).await {
			self.branches.resolve_create(&BranchOutcome {
				branch_name: name.to_string(),
				success: false,
				error: Some(e.to_string()),
			});
			return Err(e);
		}
		Ok(true)
	}

	/// Starts a fresh round of connection attempts on every channel.
	pub fn retry(&self) {
		self.session.reconnect();
		if let Some(reload) = &self.reload {
			reload.session.reconnect();
		}
	}

	pub fn disconnect(&self) {
		self.session.disconnect();
		if let Some(reload) = &self.reload {
			reload.session.disconnect();
		}
	}
}

fn on_reload_event(event: TransportEvent) -> Option<Update> {
	match event {
		TransportEvent::Frame(frame) if frame.frame_type() == "reload" => Some(Update::Notice("bundle reloaded".to_string())),
		TransportEvent::Exhausted { attempts } => Some(Update::Notice(format!(
			"live reload disconnected after {attempts} attempts"
		))),
		other => {
			debug!(event = ?other, "reload channel event");
			None
		}
	}
}
