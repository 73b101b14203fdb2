// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Delayed-retry policy for transient failures.
//!
//! The backoff is seeded by any server-advised wait (`Retry-After`) and
//! doubles the previous delay on each consecutive failure:
//! `next = retry_after + previous * 2`, capped at [`MAX_BACKOFF_DELAY`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60);

/// Classifies errors for the retry policy.
///
/// Errors that do not implement this (or report `is_retryable() == false`)
/// are rethrown immediately without consuming retry budget.
pub trait RetryableError {
	/// Whether another attempt may succeed.
	fn is_retryable(&self) -> bool;

	/// Server-advised minimum wait before the next attempt, if any.
	fn retry_after(&self) -> Option<Duration> {
		None
	}
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		self.is_timeout() || self.is_connect()
	}
}

impl<E: RetryableError + ?Sized> RetryableError for Arc<E> {
	fn is_retryable(&self) -> bool {
		(**self).is_retryable()
	}

	fn retry_after(&self) -> Option<Duration> {
		(**self).retry_after()
	}
}

/// Configuration for [`retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Maximum number of total attempts (not just retries).
	pub max_attempts: u32,
	/// Delay applied before the first attempt.
	pub initial_delay: Duration,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_delay: Duration::ZERO,
		}
	}
}

/// Terminal outcome of an exhausted or non-retryable [`retry`] call.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
	E: std::error::Error + 'static,
{
	/// All attempts failed with retryable errors.
	#[error("max retry attempts ({attempts}) exceeded")]
	MaxAttemptsExceeded {
		attempts: u32,
		#[source]
		last: E,
	},

	/// A non-retryable error ended the attempt sequence.
	#[error(transparent)]
	Permanent(E),
}

impl<E> RetryError<E>
where
	E: std::error::Error + 'static,
{
	/// Returns the underlying error from the final attempt.
	pub fn into_last(self) -> E {
		match self {
			RetryError::MaxAttemptsExceeded { last, .. } => last,
			RetryError::Permanent(e) => e,
		}
	}
}

/// Runs `operation` after `delay`, resolving with its outcome.
///
/// This is the unit of composable backoff: callers thread the delay they
/// computed from the previous failure into the next invocation.
pub async fn with_delay<T, F, Fut>(delay: Duration, operation: F) -> T
where
	F: FnOnce() -> Fut,
	Fut: Future<Output = T>,
{
	if !delay.is_zero() {
		tokio::time::sleep(delay).await;
	}
	operation().await
}

/// Repeatedly invokes `operation` until it succeeds, a non-retryable error
/// occurs, or `config.max_attempts` attempts have failed.
///
/// `on_error` is invoked for every failed attempt, before the error is
/// classified, so callers can record or surface each individual failure.
pub async fn retry<T, E, F, Fut, H>(
	config: &RetryConfig,
	mut on_error: H,
	mut operation: F,
) -> Result<T, RetryError<E>>
where
	E: RetryableError + std::error::Error + 'static,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	H: FnMut(&E),
{
	let mut delay = config.initial_delay;
	let mut attempts = 0u32;

	loop {
		attempts += 1;
		match with_delay(delay, &mut operation).await {
			Ok(value) => return Ok(value),
			Err(e) => {
				on_error(&e);

				if !e.is_retryable() {
					return Err(RetryError::Permanent(e));
				}
				if attempts >= config.max_attempts {
					return Err(RetryError::MaxAttemptsExceeded { attempts, last: e });
				}

				delay = next_backoff_delay(e.retry_after().unwrap_or_default(), delay);
				debug!(
					attempts,
					next_delay_ms = delay.as_millis() as u64,
					"Retrying after transient failure"
				);
			}
		}
	}
}

/// Computes the next backoff delay from a server-advised wait and the
/// previous delay.
///
/// Saturating arithmetic: the server-advised wait is attacker-controlled
/// (parsed from a response header) and must not be able to overflow the
/// addition.
pub(crate) fn next_backoff_delay(retry_after: Duration, previous: Duration) -> Duration {
	retry_after
		.saturating_add(previous.saturating_mul(2))
		.min(MAX_BACKOFF_DELAY)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Debug, Error)]
	enum TestError {
		#[error("transient")]
		Transient { retry_after: Option<Duration> },
		#[error("permanent")]
		Permanent,
	}

	impl RetryableError for TestError {
		fn is_retryable(&self) -> bool {
			matches!(self, TestError::Transient { .. })
		}

		fn retry_after(&self) -> Option<Duration> {
			match self {
				TestError::Transient { retry_after } => *retry_after,
				TestError::Permanent => None,
			}
		}
	}

	#[tokio::test(start_paused = true)]
	async fn retry_exhausts_attempts_with_retryable_errors() {
		let attempts = AtomicU32::new(0);
		let errors_seen = AtomicU32::new(0);
		let config = RetryConfig {
			max_attempts: 2,
			initial_delay: Duration::ZERO,
		};

		let result: Result<(), _> = retry(
			&config,
			|_e: &TestError| {
				errors_seen.fetch_add(1, Ordering::SeqCst);
			},
			|| async {
				attempts.fetch_add(1, Ordering::SeqCst);
				Err(TestError::Transient { retry_after: None })
			},
		)
		.await;

		assert_eq!(attempts.load(Ordering::SeqCst), 2);
		assert_eq!(errors_seen.load(Ordering::SeqCst), 2);
		assert!(matches!(
			result,
			Err(RetryError::MaxAttemptsExceeded { attempts: 2, .. })
		));
	}

	#[tokio::test]
	async fn retry_rethrows_non_retryable_immediately() {
		let attempts = AtomicU32::new(0);
		let errors_seen = AtomicU32::new(0);
		let config = RetryConfig::default();

		let result: Result<(), _> = retry(
			&config,
			|_e: &TestError| {
				errors_seen.fetch_add(1, Ordering::SeqCst);
			},
			|| async {
				attempts.fetch_add(1, Ordering::SeqCst);
				Err(TestError::Permanent)
			},
		)
		.await;

		assert_eq!(attempts.load(Ordering::SeqCst), 1);
		assert_eq!(errors_seen.load(Ordering::SeqCst), 1);
		assert!(matches!(result, Err(RetryError::Permanent(_))));
	}

	#[tokio::test]
	async fn retry_returns_first_success() {
		let attempts = AtomicU32::new(0);
		let config = RetryConfig::default();

		let result: Result<u32, RetryError<TestError>> =
			retry(&config, |_| {}, || async {
				Ok(attempts.fetch_add(1, Ordering::SeqCst))
			})
			.await;

		assert_eq!(result.unwrap(), 0);
		assert_eq!(attempts.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn retry_succeeds_after_transient_failures() {
		let attempts = AtomicU32::new(0);
		let config = RetryConfig {
			max_attempts: 3,
			initial_delay: Duration::from_millis(10),
		};

		let result: Result<&str, RetryError<TestError>> = retry(
			&config,
			|_| {},
			|| async {
				if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(TestError::Transient {
						retry_after: Some(Duration::from_millis(5)),
					})
				} else {
					Ok("done")
				}
			},
		)
		.await;

		assert_eq!(result.unwrap(), "done");
		assert_eq!(attempts.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn max_attempts_error_preserves_last_error_as_source() {
		let config = RetryConfig {
			max_attempts: 1,
			initial_delay: Duration::ZERO,
		};

		let result: Result<(), _> = retry(
			&config,
			|_: &TestError| {},
			|| async { Err(TestError::Transient { retry_after: None }) },
		)
		.await;

		let err = result.unwrap_err();
		assert!(std::error::Error::source(&err).is_some());
		assert!(matches!(
			err.into_last(),
			TestError::Transient { .. }
		));
	}

	#[test]
	fn backoff_seeds_from_retry_after() {
		let next = next_backoff_delay(Duration::from_secs(1), Duration::ZERO);
		assert_eq!(next, Duration::from_secs(1));

		let next = next_backoff_delay(Duration::from_secs(1), next);
		assert_eq!(next, Duration::from_secs(3));

		let next = next_backoff_delay(Duration::from_secs(1), next);
		assert_eq!(next, Duration::from_secs(7));
	}

	#[test]
	fn backoff_caps_at_max_delay() {
		let next = next_backoff_delay(Duration::from_secs(10), Duration::from_secs(50));
		assert_eq!(next, MAX_BACKOFF_DELAY);
	}

	#[test]
	fn backoff_saturates_on_huge_inputs() {
		let next = next_backoff_delay(Duration::from_secs(u64::MAX), Duration::from_secs(1));
		assert_eq!(next, MAX_BACKOFF_DELAY);

		let next = next_backoff_delay(Duration::ZERO, Duration::from_secs(u64::MAX));
		assert_eq!(next, MAX_BACKOFF_DELAY);
	}

	#[test]
	fn reqwest_retryable_is_conservative() {
		// A builder error is neither a timeout nor a connect failure.
		let err = reqwest::Client::new()
			.get("not a url")
			.build()
			.unwrap_err();
		assert!(!err.is_retryable());
	}

	proptest! {
		#[test]
		fn backoff_never_exceeds_cap(
			retry_after_ms in any::<u64>(),
			previous_ms in any::<u64>(),
		) {
			let next = next_backoff_delay(
				Duration::from_millis(retry_after_ms),
				Duration::from_millis(previous_ms),
			);
			prop_assert!(next <= MAX_BACKOFF_DELAY);
		}

		#[test]
		fn backoff_grows_until_capped(previous_ms in 1u64..20_000) {
			let previous = Duration::from_millis(previous_ms);
			let next = next_backoff_delay(Duration::ZERO, previous);
			prop_assert!(next >= previous);
		}
	}
}
