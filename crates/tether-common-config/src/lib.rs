// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for tether.
//!
//! This crate provides:
//! - XDG Base Directory compliant path resolution
//! - Layered configuration from multiple sources
//! - TOML configuration file parsing
//! - Environment variable overrides
//! - Configuration validation

pub mod error;
pub mod layer;
pub mod paths;
pub mod registry;
pub mod runtime;
pub mod sources;
pub mod validation;

pub use error::ConfigError;
pub use layer::ConfigLayer;
pub use paths::PathsConfig;
pub use registry::ConfigRegistry;
pub use runtime::{BranchConfig, LogFormat, LogLevel, LoggingConfig, ReloadConfig, SessionConfig, TetherConfig};
pub use sources::{CliOverrides, ConfigSource, Precedence};

/// Load configuration from files, environment and CLI overrides. Unset
/// values fall back to built-in defaults.
///
/// An explicit `config_file` replaces the user config file.
pub fn load_config_with_cli(cli: CliOverrides) -> Result<TetherConfig, ConfigError> {
	let paths = paths::resolve_xdg_paths()?;

	if let Some(path) = cli.config_file.as_ref().filter(|p| !p.exists()) {
		return Err(ConfigError::validation(format!(
			"config file {} does not exist",
			path.display()
		)));
	}

	let mut registry = ConfigRegistry::default();
	registry.register(Box::new(sources::FileSource::system(&paths)));
	match &cli.config_file {
		Some(path) => registry.register(Box::new(sources::FileSource::custom(
			path.clone(),
			Precedence::UserFile,
			"explicit-config",
		))),
		None => registry.register(Box::new(sources::FileSource::user(&paths))),
	}
	registry.register(Box::new(sources::EnvSource::new()));
	registry.register(Box::new(sources::CliSource::new(cli)));

	registry.load(paths)
}
