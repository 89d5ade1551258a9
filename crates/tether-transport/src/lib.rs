// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resilient session transport for tether.
//!
//! A [`ResilientSession`] looks like one continuously available connection
//! even while the tunnel underneath rotates or the device changes networks:
//! it reconnects per a [`RetryPolicy`], replays captured setup frames before
//! reporting `Connected`, and turns every failure into a status change or a
//! [`TransportEvent`].

mod address;
mod capture;
mod connector;
mod error;
pub mod mock;
mod policy;
pub mod reload;
mod session;
mod upload;

pub use address::SessionAddress;
pub use capture::{CaptureBuffer, CaptureNone, CapturePredicate, CaptureTypes};
pub use connector::{Connector, FrameSink, FrameStream, Link, WsConnector};
pub use error::TransportError;
pub use policy::RetryPolicy;
pub use reload::{ReloadCapture, ReloadChannel};
pub use session::{
	ConnectionStatus, PostReady, ResilientSession, SessionOptions, TransportEvent,
};
pub use upload::{Attachment, AttachmentUploader, UploadError, UploadFailure, UploadReport};
