//! Jittered exponential backoff for token endpoint retries.
//!
//! [`ExponentialBackoff`] is a restartable state object: [`start`](ExponentialBackoff::start)
//! rewinds it, and each [`next`](ExponentialBackoff::next) either suspends the caller for a
//! jittered wait and reports the attempt number, or signals exhaustion with `None`. Exhaustion is
//! not an error; the caller decides what to raise.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, error::ConfigError};

/// Resumable backoff sequence with bounded attempts.
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialBackoff {
	total_attempts: u32,
	initial_wait: StdDuration,
	current_wait: StdDuration,
	randomization_factor: f64,
	multiplier: f64,
	attempts_made: u32,
}
impl ExponentialBackoff {
	/// Default number of retry attempts.
	pub const DEFAULT_TOTAL_ATTEMPTS: u32 = 3;
	/// Default first wait.
	pub const DEFAULT_INITIAL_WAIT: StdDuration = StdDuration::from_secs(1);
	/// Default jitter (±10% around the nominal wait).
	pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.1;
	/// Default growth per attempt.
	pub const DEFAULT_MULTIPLIER: f64 = 2.0;

	/// Creates a validated sequence.
	///
	/// `randomization_factor` must lie in `[0, 1)` and `multiplier` must exceed `1`.
	pub fn new(
		total_attempts: u32,
		initial_wait: StdDuration,
		randomization_factor: f64,
		multiplier: f64,
	) -> Result<Self, ConfigError> {
		if !(0.0..1.0).contains(&randomization_factor) {
			return Err(ConfigError::InvalidBackoff {
				reason: "randomization factor must be within [0, 1)",
			});
		}
		if !multiplier.is_finite() || multiplier <= 1.0 {
			return Err(ConfigError::InvalidBackoff { reason: "multiplier must be greater than 1" });
		}

		Ok(Self {
			total_attempts,
			initial_wait,
			current_wait: initial_wait,
			randomization_factor,
			multiplier,
			attempts_made: 0,
		})
	}

	/// Rewinds the sequence so the next draw starts from the initial wait.
	pub fn start(&mut self) -> &mut Self {
		self.attempts_made = 0;
		self.current_wait = self.initial_wait;

		self
	}

	/// Advances the sequence and returns the jittered wait, or `None` once exhausted.
	///
	/// Does not sleep; [`next`](Self::next) is the suspending form.
	pub fn next_delay(&mut self) -> Option<StdDuration> {
		if self.attempts_made >= self.total_attempts {
			return None;
		}

		self.attempts_made += 1;

		let delay = self.jittered(self.current_wait);

		self.current_wait = scale(self.current_wait, self.multiplier);

		Some(delay)
	}

	/// Waits out the next jittered delay and returns the attempt number, or `None` once
	/// exhausted.
	pub async fn next(&mut self) -> Option<u32> {
		let delay = self.next_delay()?;

		tokio::time::sleep(delay).await;

		Some(self.attempts_made)
	}

	/// Maximum number of attempts the sequence yields.
	pub fn total_attempts(&self) -> u32 {
		self.total_attempts
	}

	/// Attempts yielded since the last [`start`](Self::start).
	pub fn attempts_made(&self) -> u32 {
		self.attempts_made
	}

	/// Nominal (un-jittered) wait for the next draw.
	pub fn current_wait(&self) -> StdDuration {
		self.current_wait
	}

	/// First nominal wait.
	pub fn initial_wait(&self) -> StdDuration {
		self.initial_wait
	}

	/// Jitter factor applied around the nominal wait.
	pub fn randomization_factor(&self) -> f64 {
		self.randomization_factor
	}

	/// Growth applied after every draw.
	pub fn multiplier(&self) -> f64 {
		self.multiplier
	}

	fn jittered(&self, nominal: StdDuration) -> StdDuration {
		let secs = nominal.as_secs_f64();
		let variance = secs * self.randomization_factor;
		let drawn = rand::rng().random_range((secs - variance)..=(secs + variance));

		StdDuration::try_from_secs_f64(drawn).unwrap_or(StdDuration::MAX)
	}
}
impl Default for ExponentialBackoff {
	fn default() -> Self {
		Self {
			total_attempts: Self::DEFAULT_TOTAL_ATTEMPTS,
			initial_wait: Self::DEFAULT_INITIAL_WAIT,
			current_wait: Self::DEFAULT_INITIAL_WAIT,
			randomization_factor: Self::DEFAULT_RANDOMIZATION_FACTOR,
			multiplier: Self::DEFAULT_MULTIPLIER,
			attempts_made: 0,
		}
	}
}

fn scale(wait: StdDuration, multiplier: f64) -> StdDuration {
	StdDuration::try_from_secs_f64(wait.as_secs_f64() * multiplier).unwrap_or(StdDuration::MAX)
}
