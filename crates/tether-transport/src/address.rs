// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session addresses of the form `scheme://host:port[/path][?secret=TOKEN]`.
//!
//! The bearer token lives in the address so it survives every reconnect
//! unchanged. It is held apart from the rest of the URL, zeroized on drop and
//! never rendered by `Display` or `Debug`.

use std::fmt;
use std::str::FromStr;

use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::TransportError;

const SECRET_PARAM: &str = "secret";
const REDACTED: &str = "[REDACTED]";
const UPLOAD_PATH: &str = "/upload";

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
struct SecretToken(String);

impl fmt::Debug for SecretToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

/// Where a session lives, plus its optional bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionAddress {
	/// The address with the `secret` query parameter removed.
	base: Url,
	secret: Option<SecretToken>,
}

impl SessionAddress {
	pub fn parse(input: &str) -> Result<Self, TransportError> {
		let url = Url::parse(input)
			.map_err(|e| TransportError::InvalidAddress(format!("{}: {e}", redact_input(input))))?;

		match url.scheme() {
			"ws" | "wss" => {}
			other => {
				return Err(TransportError::InvalidAddress(format!(
					"unsupported scheme `{other}`, expected ws or wss"
				)))
			}
		}
		if url.host_str().is_none() {
			return Err(TransportError::InvalidAddress(
				"address has no host".to_string(),
			));
		}

		let mut secret = None;
		let mut rest = Vec::new();
		for (key, value) in url.query_pairs() {
			if key == SECRET_PARAM {
				secret = Some(SecretToken(value.into_owned()));
			} else {
				rest.push((key.into_owned(), value.into_owned()));
			}
		}

		let mut base = url.clone();
		base.set_query(None);
		if !rest.is_empty() {
			base.query_pairs_mut().extend_pairs(rest);
		}

		Ok(Self { base, secret })
	}

	/// The bearer token, if the address carries one.
	pub fn secret(&self) -> Option<&str> {
		self.secret.as_ref().map(|s| s.0.as_str())
	}

	pub fn host(&self) -> &str {
		self.base.host_str().unwrap_or_default()
	}

	pub fn port(&self) -> Option<u16> {
		self.base.port_or_known_default()
	}

	/// The full URL to dial, token included. Never log the result.
	pub fn connect_url(&self) -> Url {
		let mut url = self.base.clone();
		if let Some(secret) = &self.secret {
			url.query_pairs_mut().append_pair(SECRET_PARAM, &secret.0);
		}
		url
	}

	/// The sibling HTTP endpoint for attachment uploads: same host and port,
	/// `ws` mapped to `http` and `wss` to `https`, fixed `/upload` path, token
	/// preserved.
	pub fn upload_url(&self) -> Result<Url, TransportError> {
		let scheme = match self.base.scheme() {
			"wss" => "https",
			_ => "http",
		};
		let mut url = self.connect_url();
		url.set_scheme(scheme).map_err(|_| {
			TransportError::InvalidAddress(format!("cannot derive {scheme} upload address"))
		})?;
		url.set_path(UPLOAD_PATH);
		Ok(url)
	}
}

impl FromStr for SessionAddress {
	type Err = TransportError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl fmt::Display for SessionAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.base.as_str())?;
		if self.secret.is_some() {
			let separator = if self.base.query().is_some() { '&' } else { '?' };
			write!(f, "{separator}{SECRET_PARAM}={REDACTED}")?;
		}
		Ok(())
	}
}

impl fmt::Debug for SessionAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SessionAddress")
			.field(&self.to_string())
			.finish()
	}
}

fn redact_input(input: &str) -> &str {
	input.split('?').next().unwrap_or(input)
}
