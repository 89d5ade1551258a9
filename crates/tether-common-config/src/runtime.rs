// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration types with resolved defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::layer::*;
use crate::paths::PathsConfig;
use crate::ConfigError;

/// The final, validated configuration for tether.
#[derive(Debug, Clone, Serialize)]
pub struct TetherConfig {
	pub session: SessionConfig,
	pub reload: ReloadConfig,
	pub logging: LoggingConfig,
	pub branch: BranchConfig,

	/// Resolved XDG paths (not serialized)
	#[serde(skip)]
	pub paths: PathsConfig,
}

/// The agent session channel. Reconnects on a fixed interval.
#[derive(Clone, Serialize)]
pub struct SessionConfig {
	/// Carries the bearer token; never logged.
	#[serde(skip)]
	pub url: Option<String>,
	#[serde(with = "millis")]
	pub retry_interval: Duration,
	pub max_attempts: u32,
	/// Delay before the post-reconnect frames are sent.
	#[serde(with = "millis")]
	pub settle: Duration,
}

impl std::fmt::Debug for SessionConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionConfig")
			.field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
			.field("retry_interval", &self.retry_interval)
			.field("max_attempts", &self.max_attempts)
			.field("settle", &self.settle)
			.finish()
	}
}

/// The bundler's live-reload channel. Reconnects with exponential backoff.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadConfig {
	pub url: Option<String>,
	#[serde(with = "millis")]
	pub base_delay: Duration,
	pub backoff_factor: f64,
	#[serde(with = "millis")]
	pub max_delay: Duration,
	/// Fraction of the delay added or removed at random.
	pub jitter: f64,
	pub max_attempts: u32,
	pub entry_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
	pub level: LogLevel,
	pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Error,
	Warn,
	#[default]
	Info,
	Debug,
	Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
	Compact,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchConfig {
	/// Repository the branch commands act on. `None` means the working directory.
	pub repo: Option<PathBuf>,
	pub stash_prefix: String,
}

mod millis {
	use serde::Serializer;
	use std::time::Duration;

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
	}
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			url: None,
			retry_interval: Duration::from_secs(3),
			max_attempts: 10,
			settle: Duration::from_millis(500),
		}
	}
}

impl Default for ReloadConfig {
	fn default() -> Self {
		Self {
			url: None,
			base_delay: Duration::from_secs(2),
			backoff_factor: 1.5,
			max_delay: Duration::from_secs(30),
			jitter: 0.2,
			max_attempts: 50,
			entry_points: Vec::new(),
		}
	}
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: LogLevel::Info,
			format: LogFormat::Pretty,
		}
	}
}

impl Default for BranchConfig {
	fn default() -> Self {
		Self {
			repo: None,
			stash_prefix: "tether-autostash".to_string(),
		}
	}
}

impl TetherConfig {
	/// Resolve a merged layer into runtime config, filling defaults.
	pub fn from_layer(layer: ConfigLayer, paths: PathsConfig) -> Result<Self, ConfigError> {
		let mut session = SessionConfig::default();
		if let Some(l) = layer.session {
			session.url = l.url;
			if let Some(ms) = l.retry_interval_ms {
				session.retry_interval = Duration::from_millis(ms);
			}
			session.max_attempts = l.max_attempts.unwrap_or(session.max_attempts);
			if let Some(ms) = l.settle_ms {
				session.settle = Duration::from_millis(ms);
			}
		}

		let mut reload = ReloadConfig::default();
		if let Some(l) = layer.reload {
			reload.url = l.url;
			if let Some(ms) = l.base_delay_ms {
				reload.base_delay = Duration::from_millis(ms);
			}
			reload.backoff_factor = l.backoff_factor.unwrap_or(reload.backoff_factor);
			if let Some(ms) = l.max_delay_ms {
				reload.max_delay = Duration::from_millis(ms);
			}
			reload.jitter = l.jitter.unwrap_or(reload.jitter);
			reload.max_attempts = l.max_attempts.unwrap_or(reload.max_attempts);
			reload.entry_points = l.entry_points.unwrap_or_default();
		}

		let mut logging = LoggingConfig::default();
		if let Some(l) = layer.logging {
			if let Some(level) = l.level {
				logging.level = parse_log_level(&level)?;
			}
			if let Some(format) = l.format {
				logging.format = parse_log_format(&format)?;
			}
		}

		let mut branch = BranchConfig::default();
		if let Some(l) = layer.branch {
			branch.repo = l.repo;
			if let Some(prefix) = l.stash_prefix {
				branch.stash_prefix = prefix;
			}
		}

		Ok(Self {
			session,
			reload,
			logging,
			branch,
			paths,
		})
	}
}

fn parse_log_level(s: &str) -> Result<LogLevel, ConfigError> {
	match s.to_ascii_lowercase().as_str() {
		"error" => Ok(LogLevel::Error),
		"warn" => Ok(LogLevel::Warn),
		"info" => Ok(LogLevel::Info),
		"debug" => Ok(LogLevel::Debug),
		"trace" => Ok(LogLevel::Trace),
		_ => Err(ConfigError::invalid_value(
			"logging.level",
			format!("unknown level {s:?}, expected error, warn, info, debug or trace"),
		)),
	}
}

fn parse_log_format(s: &str) -> Result<LogFormat, ConfigError> {
	match s.to_ascii_lowercase().as_str() {
		"pretty" => Ok(LogFormat::Pretty),
		"json" => Ok(LogFormat::Json),
		"compact" => Ok(LogFormat::Compact),
		_ => Err(ConfigError::invalid_value(
			"logging.format",
			format!("unknown format {s:?}, expected pretty, json or compact"),
		)),
	}
}
