// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration validation rules.

use tracing::warn;

use crate::runtime::TetherConfig;
use crate::ConfigError;

/// Validate the configuration.
///
/// Returns Ok(()) if valid, or the first violated rule.
pub fn validate_config(config: &TetherConfig) -> Result<(), ConfigError> {
	validate_session(config)?;
	validate_reload(config)?;
	validate_branch(config)?;

	Ok(())
}

fn validate_url(field: &str, url: Option<&str>) -> Result<(), ConfigError> {
	match url {
		Some(url) if !(url.starts_with("ws://") || url.starts_with("wss://")) => Err(
			ConfigError::invalid_value(field, "must be a ws:// or wss:// address"),
		),
		_ => Ok(()),
	}
}

fn validate_session(config: &TetherConfig) -> Result<(), ConfigError> {
	let session = &config.session;
	validate_url("session.url", session.url.as_deref())?;
	if session.max_attempts == 0 {
		return Err(ConfigError::invalid_value(
			"session.max_attempts",
			"must be at least 1",
		));
	}
	if session.retry_interval.is_zero() {
		warn!("session.retry_interval_ms is 0, reconnects will not back off");
	}
	Ok(())
}

fn validate_reload(config: &TetherConfig) -> Result<(), ConfigError> {
	let reload = &config.reload;
	validate_url("reload.url", reload.url.as_deref())?;
	if reload.max_attempts == 0 {
		return Err(ConfigError::invalid_value(
			"reload.max_attempts",
			"must be at least 1",
		));
	}
	if !(reload.backoff_factor >= 1.0) {
		return Err(ConfigError::invalid_value(
			"reload.backoff_factor",
			"must be at least 1.0",
		));
	}
	if !(0.0..1.0).contains(&reload.jitter) {
		return Err(ConfigError::invalid_value(
			"reload.jitter",
			"must be in [0, 1)",
		));
	}
	if reload.base_delay > reload.max_delay {
		return Err(ConfigError::validation(
			"reload.base_delay_ms must not exceed reload.max_delay_ms",
		));
	}
	Ok(())
}

fn validate_branch(config: &TetherConfig) -> Result<(), ConfigError> {
	if config.branch.stash_prefix.trim().is_empty() {
		return Err(ConfigError::invalid_value(
			"branch.stash_prefix",
			"cannot be empty",
		));
	}
	Ok(())
}
