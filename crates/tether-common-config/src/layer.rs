// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer for merging from multiple sources.

use serde::Deserialize;
use std::path::PathBuf;

/// Partial configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
	#[serde(default)]
	pub session: Option<SessionLayer>,
	#[serde(default)]
	pub reload: Option<ReloadLayer>,
	#[serde(default)]
	pub logging: Option<LoggingLayer>,
	#[serde(default)]
	pub branch: Option<BranchLayer>,
}

#[derive(Clone, Default, Deserialize)]
pub struct SessionLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub retry_interval_ms: Option<u64>,
	#[serde(default)]
	pub max_attempts: Option<u32>,
	#[serde(default)]
	pub settle_ms: Option<u64>,
}

impl std::fmt::Debug for SessionLayer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionLayer")
			.field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
			.field("retry_interval_ms", &self.retry_interval_ms)
			.field("max_attempts", &self.max_attempts)
			.field("settle_ms", &self.settle_ms)
			.finish()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReloadLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub base_delay_ms: Option<u64>,
	#[serde(default)]
	pub backoff_factor: Option<f64>,
	#[serde(default)]
	pub max_delay_ms: Option<u64>,
	#[serde(default)]
	pub jitter: Option<f64>,
	#[serde(default)]
	pub max_attempts: Option<u32>,
	#[serde(default)]
	pub entry_points: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchLayer {
	#[serde(default)]
	pub repo: Option<PathBuf>,
	#[serde(default)]
	pub stash_prefix: Option<String>,
}

impl ConfigLayer {
	/// Merge another layer into this one. Values from `other` win.
	pub fn merge(&mut self, other: ConfigLayer) {
		merge_option(&mut self.session, other.session, SessionLayer::merge);
		merge_option(&mut self.reload, other.reload, ReloadLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingLayer::merge);
		merge_option(&mut self.branch, other.branch, BranchLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

fn merge_field<T>(target: &mut Option<T>, source: Option<T>) {
	if source.is_some() {
		*target = source;
	}
}

impl SessionLayer {
	fn merge(&mut self, other: SessionLayer) {
		merge_field(&mut self.url, other.url);
		merge_field(&mut self.retry_interval_ms, other.retry_interval_ms);
		merge_field(&mut self.max_attempts, other.max_attempts);
		merge_field(&mut self.settle_ms, other.settle_ms);
	}
}

impl ReloadLayer {
	fn merge(&mut self, other: ReloadLayer) {
		merge_field(&mut self.url, other.url);
		merge_field(&mut self.base_delay_ms, other.base_delay_ms);
		merge_field(&mut self.backoff_factor, other.backoff_factor);
		merge_field(&mut self.max_delay_ms, other.max_delay_ms);
		merge_field(&mut self.jitter, other.jitter);
		merge_field(&mut self.max_attempts, other.max_attempts);
		merge_field(&mut self.entry_points, other.entry_points);
	}
}

impl LoggingLayer {
	fn merge(&mut self, other: LoggingLayer) {
		merge_field(&mut self.level, other.level);
		merge_field(&mut self.format, other.format);
	}
}

impl BranchLayer {
	fn merge(&mut self, other: BranchLayer) {
		merge_field(&mut self.repo, other.repo);
		merge_field(&mut self.stash_prefix, other.stash_prefix);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_parse_sections() {
		let layer: ConfigLayer = toml::from_str(
			r#"
			[session]
			url = "wss://abc.trycloudflare.com/session?secret=t0k3n"
			max_attempts = 4

			[reload]
			backoff_factor = 2.0
			entry_points = ["index.bundle?platform=ios"]

			[branch]
			repo = "/work/app"
			"#,
		)
		.unwrap();

		let session = layer.session.as_ref().unwrap();
		assert_eq!(session.max_attempts, Some(4));
		assert!(session.retry_interval_ms.is_none());
		assert!(!format!("{session:?}").contains("t0k3n"));
		assert_eq!(layer.reload.unwrap().backoff_factor, Some(2.0));
		assert_eq!(layer.branch.unwrap().repo, Some(PathBuf::from("/work/app")));
		assert!(layer.logging.is_none());
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = ConfigLayer {
			session: Some(SessionLayer {
				url: Some("ws://a".to_string()),
				max_attempts: Some(3),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(ConfigLayer {
			session: Some(SessionLayer {
				max_attempts: Some(7),
				..Default::default()
			}),
			logging: Some(LoggingLayer {
				level: Some("debug".to_string()),
				format: None,
			}),
			..Default::default()
		});

		let session = base.session.unwrap();
		assert_eq!(session.url.as_deref(), Some("ws://a"));
		assert_eq!(session.max_attempts, Some(7));
		assert_eq!(base.logging.unwrap().level.as_deref(), Some("debug"));
	}

	// Property: merging is last-writer-wins per field.
	//
	// Why this test is important: precedence between file, environment and
	// CLI is implemented entirely by merge order. A field lost or kept from
	// the wrong layer would silently override what the user asked for.
	proptest! {
		#[test]
		fn prop_merge_last_writer_wins(
			a in proptest::option::of(1u32..100),
			b in proptest::option::of(1u32..100),
		) {
			let layer = |v: Option<u32>| ConfigLayer {
				session: Some(SessionLayer { max_attempts: v, ..Default::default() }),
				..Default::default()
			};
			let mut merged = layer(a);
			merged.merge(layer(b));
			let expected = b.or(a);
			prop_assert_eq!(merged.session.and_then(|s| s.max_attempts), expected);
		}
	}
}
