// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconnect schedules.

use std::time::Duration;

/// How long to wait before each reconnect attempt, and when to give up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
	/// Same delay before every attempt.
	Fixed { interval: Duration, max_attempts: u32 },
	/// `base * factor^(attempt - 1)`, capped at `ceiling`, then spread by
	/// `±jitter` (a fraction of the capped delay).
	Exponential {
		base: Duration,
		factor: f64,
		ceiling: Duration,
		jitter: f64,
		max_attempts: u32,
	},
}

impl RetryPolicy {
	/// Default for the agent session channel: every 3s, at most 10 times.
	pub fn session_default() -> Self {
		Self::Fixed {
			interval: Duration::from_secs(3),
			max_attempts: 10,
		}
	}

	/// Default for the bundler's live-reload channel.
	pub fn reload_default() -> Self {
		Self::Exponential {
			base: Duration::from_secs(2),
			factor: 1.5,
			ceiling: Duration::from_secs(30),
			jitter: 0.2,
			max_attempts: 50,
		}
	}

	pub fn max_attempts(&self) -> u32 {
		match self {
			Self::Fixed { max_attempts, .. } | Self::Exponential { max_attempts, .. } => {
				*max_attempts
			}
		}
	}

	/// Delay before the given 1-based attempt.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		self.delay_with(attempt, &mut fastrand::Rng::new())
	}

	/// Like [`delay_for`](Self::delay_for) with an explicit random source.
	pub fn delay_with(&self, attempt: u32, rng: &mut fastrand::Rng) -> Duration {
		match self {
			Self::Fixed { interval, .. } => *interval,
			Self::Exponential {
				base,
				factor,
				ceiling,
				jitter,
				..
			} => {
				let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
				let raw = base.as_secs_f64() * factor.powi(exponent);
				let capped = raw.min(ceiling.as_secs_f64());
				let spread = capped * jitter.clamp(0.0, 1.0);
				let offset = (rng.f64() * 2.0 - 1.0) * spread;
				Duration::from_secs_f64((capped + offset).max(0.0))
			}
		}
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::session_default()
	}
}
