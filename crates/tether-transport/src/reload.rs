// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Adapter for the bundler's live-reload socket.
//!
//! The bundler only keeps pushing reloads to clients that have registered
//! their entry points and opted in to logs. Those two frames are the entire
//! setup state of the channel: they are captured, and after a reconnect
//! nothing else is replayed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tether_common_protocol::Frame;
use tokio::sync::mpsc;

use crate::address::SessionAddress;
use crate::capture::CapturePredicate;
use crate::connector::Connector;
use crate::policy::RetryPolicy;
use crate::session::{PostReady, ResilientSession, SessionOptions, TransportEvent};

pub const REGISTER_ENTRYPOINTS: &str = "register-entrypoints";
pub const LOG_OPT_IN: &str = "log-opt-in";

/// Recognizes the bundler registration frames.
///
/// `register-entrypoints` counts only when `entryPoints` is an array; a
/// malformed registration would be rejected by the bundler anyway and must
/// not displace a good one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReloadCapture;

impl CapturePredicate for ReloadCapture {
	fn should_capture(&self, frame: &Frame) -> bool {
		match frame.frame_type() {
			REGISTER_ENTRYPOINTS => matches!(frame.get("entryPoints"), Some(Value::Array(_))),
			LOG_OPT_IN => true,
			_ => false,
		}
	}
}

/// Builds a `register-entrypoints` frame.
pub fn register_entrypoints<I, S>(entry_points: I) -> Frame
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let entry_points: Vec<String> = entry_points.into_iter().map(Into::into).collect();
	Frame::new(REGISTER_ENTRYPOINTS).with("entryPoints", entry_points)
}

/// Builds a `log-opt-in` frame.
pub fn log_opt_in() -> Frame {
	Frame::new(LOG_OPT_IN)
}

/// Options for a live-reload connection.
pub struct ReloadChannel {
	policy: RetryPolicy,
	post_ready: Option<PostReady>,
	connector: Arc<dyn Connector>,
}

impl ReloadChannel {
	pub fn new(connector: Arc<dyn Connector>) -> Self {
		Self {
			policy: RetryPolicy::reload_default(),
			post_ready: None,
			connector,
		}
	}

	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// One extra frame sent `settle` after each reconnect, following the
	/// replayed registrations.
	pub fn with_post_ready(mut self, frame: Frame, settle: Duration) -> Self {
		self.post_ready = Some(PostReady {
			settle,
			frames: vec![frame],
		});
		self
	}

	pub fn options(&self) -> SessionOptions {
		let mut options = SessionOptions::new(Arc::clone(&self.connector))
			.with_policy(self.policy.clone())
			.with_capture(Arc::new(ReloadCapture));
		options.post_ready = self.post_ready.clone();
		options
	}

	pub fn connect(
		&self,
		address: SessionAddress,
	) -> (ResilientSession, mpsc::UnboundedReceiver<TransportEvent>) {
		ResilientSession::connect(address, self.options())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::MockConnector;
	use crate::session::ConnectionStatus;
	use serde_json::json;
	use tokio::time::timeout;

	fn frame(value: Value) -> Frame {
		Frame::from_value(value).unwrap()
	}

	#[test]
	fn test_captures_registration_shapes() {
		let capture = ReloadCapture;
		assert!(capture.should_capture(&register_entrypoints(["index.bundle?platform=ios"])));
		assert!(capture.should_capture(&frame(json!({"type": "register-entrypoints", "entryPoints": []}))));
		assert!(capture.should_capture(&log_opt_in()));
		assert!(capture.should_capture(&frame(json!({"type": "log-opt-in", "extra": 1}))));
	}

	#[test]
	fn test_ignores_everything_else() {
		let capture = ReloadCapture;
		for value in [
			json!({"type": "register-entrypoints"}),
			json!({"type": "register-entrypoints", "entryPoints": "index.bundle"}),
			json!({"type": "register-entrypoints", "entryPoints": null}),
			json!({"type": "Register-Entrypoints", "entryPoints": []}),
			json!({"type": "log-opt-out"}),
			json!({"type": "reload"}),
			json!({"type": "update-start"}),
			json!({"type": "prompt", "content": "hi"}),
		] {
			assert!(!capture.should_capture(&frame(value.clone())), "captured {value}");
		}
	}

	#[test]
	fn test_register_frame_shape() {
		let registration = register_entrypoints(["a.bundle", "b.bundle"]);
		assert_eq!(
			registration.to_text(),
			r#"{"entryPoints":["a.bundle","b.bundle"],"type":"register-entrypoints"}"#
		);
	}

	#[test]
	fn test_options_use_reload_policy() {
		let (connector, _remotes) = MockConnector::new();
		let options = ReloadChannel::new(Arc::new(connector)).options();
		assert_eq!(options.policy, RetryPolicy::reload_default());
		assert!(options.post_ready.is_none());
	}

	/// Test: after a drop the bundler sees the latest registration and the
	/// opt-in, then the post-ready frame, and none of the other traffic.
	///
	/// Why this test is important: replaying anything beyond registration
	/// (for example a stale reload acknowledgement) would confuse the
	/// bundler, while missing the registration silently stops hot reload.
	#[tokio::test]
	async fn test_reconnect_replays_only_registrations() {
		let (connector, mut remotes) = MockConnector::new();
		let channel = ReloadChannel::new(Arc::new(connector))
			.with_policy(RetryPolicy::Exponential {
				base: Duration::from_millis(5),
				factor: 1.5,
				ceiling: Duration::from_millis(20),
				jitter: 0.2,
				max_attempts: 50,
			})
			.with_post_ready(frame(json!({"type": "request-reload"})), Duration::from_millis(10));
		let address = SessionAddress::parse("ws://localhost:8081/hot").unwrap();
		let (session, mut events) = channel.connect(address);

		let wait = Duration::from_secs(2);
		let mut first = timeout(wait, remotes.accept()).await.unwrap().unwrap();
		loop {
			let event = timeout(wait, events.recv()).await.unwrap().unwrap();
			if matches!(event, TransportEvent::Status(ConnectionStatus::Connected)) {
				break;
			}
		}

		session.send(register_entrypoints(["old.bundle"])).await.unwrap();
		session.send(log_opt_in()).await.unwrap();
		session.send(frame(json!({"type": "heartbeat"}))).await.unwrap();
		session.send(register_entrypoints(["index.bundle"])).await.unwrap();
		assert_eq!(first.drain().len(), 4);

		first.close();
		let mut second = timeout(wait, remotes.accept()).await.unwrap().unwrap();
		let mut received = Vec::new();
		for _ in 0..3 {
			received.push(timeout(wait, second.recv()).await.unwrap().unwrap());
		}
		assert_eq!(
			received,
			vec![
				register_entrypoints(["index.bundle"]),
				log_opt_in(),
				frame(json!({"type": "request-reload"})),
			]
		);
	}
}
