// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: files, environment and CLI. Built-in defaults
//! are filled in when the merged layer is resolved.

use std::path::PathBuf;

use tracing::{debug, trace, warn};

use crate::layer::*;
use crate::paths::PathsConfig;
use crate::ConfigError;

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	SystemFile = 20,
	UserFile = 30,
	Environment = 50,
	Cli = 60,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	/// Name for logging
	fn name(&self) -> &'static str;

	/// Precedence level
	fn precedence(&self) -> Precedence;

	/// Load configuration layer from this source
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// File-based configuration source (TOML).
pub struct FileSource {
	path: PathBuf,
	precedence: Precedence,
	name: &'static str,
}

impl FileSource {
	/// System config: /etc/tether/config.toml
	pub fn system(paths: &PathsConfig) -> Self {
		Self {
			path: paths.system_config_file.clone(),
			precedence: Precedence::SystemFile,
			name: "system-config",
		}
	}

	/// User config: ~/.config/tether/config.toml
	pub fn user(paths: &PathsConfig) -> Self {
		Self {
			path: paths.user_config_file.clone(),
			precedence: Precedence::UserFile,
			name: "user-config",
		}
	}

	/// Custom file path with specified precedence
	pub fn custom(path: PathBuf, precedence: Precedence, name: &'static str) -> Self {
		Self {
			path,
			precedence,
			name,
		}
	}
}

impl ConfigSource for FileSource {
	fn name(&self) -> &'static str {
		self.name
	}
	fn precedence(&self) -> Precedence {
		self.precedence
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), source = self.name, "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), source = self.name, "loading config file");

		let content = std::fs::read_to_string(&self.path)?;
		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(source = self.name, "parsed config layer");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Recognized: `TETHER_SESSION_URL`, `TETHER_RELOAD_URL`, `TETHER_LOG_LEVEL`,
/// `TETHER_LOG_FORMAT`, `TETHER_REPO`, `TETHER_SESSION_MAX_ATTEMPTS`,
/// `TETHER_RELOAD_MAX_ATTEMPTS`.
#[derive(Default)]
pub struct EnvSource {
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads the given variables instead of the process environment.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let vars: Vec<(String, String)> = match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		};

		let mut layer = ConfigLayer::default();
		for (key, value) in vars {
			if !key.starts_with("TETHER_") {
				continue;
			}

			let value = value.trim().to_string();
			if value.is_empty() {
				continue;
			}

			trace!(key = %key, "processing env var");

			match key.as_str() {
				"TETHER_SESSION_URL" => {
					layer.session.get_or_insert_with(SessionLayer::default).url = Some(value);
				}
				"TETHER_SESSION_MAX_ATTEMPTS" => match value.parse() {
					Ok(v) => layer.session.get_or_insert_with(SessionLayer::default).max_attempts = Some(v),
					Err(_) => warn!(key = %key, "ignoring non-numeric value"),
				},
				"TETHER_RELOAD_URL" => {
					layer.reload.get_or_insert_with(ReloadLayer::default).url = Some(value);
				}
				"TETHER_RELOAD_MAX_ATTEMPTS" => match value.parse() {
					Ok(v) => layer.reload.get_or_insert_with(ReloadLayer::default).max_attempts = Some(v),
					Err(_) => warn!(key = %key, "ignoring non-numeric value"),
				},
				"TETHER_LOG_LEVEL" => {
					layer.logging.get_or_insert_with(LoggingLayer::default).level = Some(value);
				}
				"TETHER_LOG_FORMAT" => {
					layer.logging.get_or_insert_with(LoggingLayer::default).format = Some(value);
				}
				"TETHER_REPO" => {
					layer.branch.get_or_insert_with(BranchLayer::default).repo = Some(PathBuf::from(value));
				}
				_ => {
					// Unknown TETHER_ variable, ignore
				}
			}
		}

		Ok(layer)
	}
}

/// CLI override source.
pub struct CliSource {
	overrides: CliOverrides,
}

/// CLI argument overrides.
#[derive(Clone, Default)]
pub struct CliOverrides {
	pub session_url: Option<String>,
	pub reload_url: Option<String>,
	pub repo: Option<PathBuf>,
	pub log_level: Option<String>,
	pub log_format: Option<String>,
	pub config_file: Option<PathBuf>,
}

impl std::fmt::Debug for CliOverrides {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CliOverrides")
			.field("session_url", &self.session_url.as_ref().map(|_| "[REDACTED]"))
			.field("reload_url", &self.reload_url)
			.field("repo", &self.repo)
			.field("log_level", &self.log_level)
			.field("log_format", &self.log_format)
			.field("config_file", &self.config_file)
			.finish()
	}
}

impl CliSource {
	pub fn new(overrides: CliOverrides) -> Self {
		Self { overrides }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading CLI overrides");
		let mut layer = ConfigLayer::default();

		if let Some(ref url) = self.overrides.session_url {
			layer.session.get_or_insert_with(SessionLayer::default).url = Some(url.clone());
		}

		if let Some(ref url) = self.overrides.reload_url {
			layer.reload.get_or_insert_with(ReloadLayer::default).url = Some(url.clone());
		}

		if let Some(ref repo) = self.overrides.repo {
			layer.branch.get_or_insert_with(BranchLayer::default).repo = Some(repo.clone());
		}

		if let Some(ref level) = self.overrides.log_level {
			layer.logging.get_or_insert_with(LoggingLayer::default).level = Some(level.clone());
		}

		if let Some(ref format) = self.overrides.log_format {
			layer.logging.get_or_insert_with(LoggingLayer::default).format = Some(format.clone());
		}

		Ok(layer)
	}
}
