// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Setup frames that must be re-sent after every reconnect.

use std::collections::HashSet;

use tether_common_protocol::Frame;

/// Decides which outbound frames are setup state worth replaying.
pub trait CapturePredicate: Send + Sync {
	fn should_capture(&self, frame: &Frame) -> bool;
}

impl<F> CapturePredicate for F
where
	F: Fn(&Frame) -> bool + Send + Sync,
{
	fn should_capture(&self, frame: &Frame) -> bool {
		self(frame)
	}
}

/// Captures nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureNone;

impl CapturePredicate for CaptureNone {
	fn should_capture(&self, _frame: &Frame) -> bool {
		false
	}
}

/// Captures every frame whose `type` is in the set.
#[derive(Debug, Clone, Default)]
pub struct CaptureTypes {
	types: HashSet<String>,
}

impl CaptureTypes {
	pub fn new<I, S>(types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			types: types.into_iter().map(Into::into).collect(),
		}
	}
}

impl CapturePredicate for CaptureTypes {
	fn should_capture(&self, frame: &Frame) -> bool {
		self.types.contains(frame.frame_type())
	}
}

/// At most one frame per `type`, kept in the order each type was first seen.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
	entries: Vec<(String, Frame)>,
}

impl CaptureBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores the frame, replacing an earlier one of the same type in place.
	pub fn insert(&mut self, frame: Frame) {
		let kind = frame.frame_type().to_string();
		match self.entries.iter_mut().find(|(k, _)| *k == kind) {
			Some(slot) => slot.1 = frame,
			None => self.entries.push((kind, frame)),
		}
	}

	/// Stores the frame if the predicate accepts it. Returns whether it did.
	pub fn offer(&mut self, predicate: &dyn CapturePredicate, frame: &Frame) -> bool {
		if !predicate.should_capture(frame) {
			return false;
		}
		self.insert(frame.clone());
		true
	}

	/// Frames in replay order.
	pub fn frames(&self) -> impl Iterator<Item = &Frame> {
		self.entries.iter().map(|(_, frame)| frame)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
