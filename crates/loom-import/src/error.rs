// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for the import SDK.

use loom_common_http::RetryableError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Import SDK errors.
#[derive(Debug, Error)]
pub enum ImportError {
	/// Network-level error during HTTP communication.
	#[error("network error: {0}")]
	Network(#[from] reqwest::Error),

	/// Request timed out.
	#[error("request timed out")]
	Timeout,

	/// Rate limited by the server (HTTP 429).
	#[error("rate limited, retry after {retry_after:?}")]
	RateLimited { retry_after: Option<Duration> },

	/// Server returned a non-2xx response.
	#[error("server error ({status}) {code}: {message}")]
	Api {
		status: u16,
		code: String,
		message: String,
	},

	/// Server returned 2xx but the body could not be parsed.
	#[error("unable to parse response body (status {status})")]
	ParseResponse { status: u16, body: String },

	/// A caller-supplied argument is invalid.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// All retry attempts were exhausted with retryable errors.
	#[error("max retry attempts ({attempts}) exceeded")]
	MaxRetryExceeded {
		attempts: u32,
		#[source]
		last: Arc<ImportError>,
	},

	/// The job has already started executing; its requests are frozen.
	#[error("job already executed, can not add more requests")]
	JobAlreadyExecuted,

	/// The server's create-job response carried no usable job id.
	#[error("unable to get job ID after creating a job")]
	MissingJobId,

	/// An attempt was made to associate the job with a different remote id.
	#[error("job already has id {current}, can not take id {received}")]
	JobIdMismatch { current: String, received: String },

	/// A status poll returned a value this SDK does not recognize.
	#[error("unknown job status received: {0}")]
	UnknownJobStatus(String),

	/// The job was cancelled by the caller.
	#[error("job cancelled")]
	Cancelled,

	/// Anything the SDK cannot classify further.
	#[error("unknown error: {0}")]
	Unknown(String),
}

impl RetryableError for ImportError {
	fn is_retryable(&self) -> bool {
		match self {
			ImportError::Network(e) => e.is_retryable(),
			ImportError::Timeout => true,
			ImportError::RateLimited { .. } => true,
			ImportError::Api { status, .. } => {
				matches!(*status, 408 | 500 | 502 | 503 | 504)
			}
			_ => false,
		}
	}

	fn retry_after(&self) -> Option<Duration> {
		match self {
			ImportError::RateLimited { retry_after } => *retry_after,
			_ => None,
		}
	}
}

/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;
