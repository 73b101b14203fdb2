// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Job metadata and status shapes for asynchronous batch imports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote status of an asynchronous import job.
///
/// `PROCESSING` is the only non-terminal status. Statuses this SDK does not
/// know about deserialize into [`JobStatus::Unknown`] so a poll response can
/// be surfaced as an error instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
	/// The job has been accepted by the server and is being processed.
	Processing,
	/// The job completed without any errors.
	Completed,
	/// The job has failures, including partial failures.
	Failed,
	/// Any status value this SDK does not recognize.
	#[default]
	#[serde(other)]
	Unknown,
}

impl JobStatus {
	/// Whether no further status transitions are possible.
	pub fn is_terminal(&self) -> bool {
		matches!(self, JobStatus::Completed | JobStatus::Failed)
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			JobStatus::Processing => "PROCESSING",
			JobStatus::Completed => "COMPLETED",
			JobStatus::Failed => "FAILED",
			JobStatus::Unknown => "UNKNOWN",
		};
		write!(f, "{s}")
	}
}

/// Metadata about a server-side asynchronous import job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMetadata {
	/// ID of the job. May be empty in status responses from servers that
	/// drop it; callers re-attach the known id.
	#[serde(default)]
	pub id: String,
	#[serde(default)]
	pub status: JobStatus,
	/// Time the job was accepted.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub created: Option<DateTime<Utc>>,
	/// Time the job finished, either successfully or unsuccessfully.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub finished: Option<DateTime<Utc>>,
}

/// Response to a job status poll.
///
/// The `job` substructure is optional as a workaround for server responses
/// that omit it entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStatusResponse {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub job: Option<JobMetadata>,
	/// Number of records imported so far.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub imports: Option<u64>,
	/// Number of records that failed so far.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub errors: Option<u64>,
}

/// One page of terminal job results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResults<T> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total_records: Option<String>,
	#[serde(default = "Vec::new")]
	pub results: Vec<T>,
	/// Token for the next page; empty or absent on the last page.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next_page_token: Option<String>,
}

impl<T> PagedResults<T> {
	/// Returns the next page token, treating an empty string as exhausted.
	pub fn next_token(&self) -> Option<&str> {
		self.next_page_token.as_deref().filter(|t| !t.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn job_status_uses_wire_casing() {
		let status: JobStatus = serde_json::from_str("\"PROCESSING\"").unwrap();
		assert_eq!(status, JobStatus::Processing);
		assert_eq!(serde_json::to_string(&JobStatus::Failed).unwrap(), "\"FAILED\"");
	}

	#[test]
	fn unrecognized_status_maps_to_unknown() {
		let status: JobStatus = serde_json::from_str("\"ARCHIVED\"").unwrap();
		assert_eq!(status, JobStatus::Unknown);
	}

	#[test]
	fn terminal_statuses() {
		assert!(!JobStatus::Processing.is_terminal());
		assert!(JobStatus::Completed.is_terminal());
		assert!(JobStatus::Failed.is_terminal());
		assert!(!JobStatus::Unknown.is_terminal());
	}

	#[test]
	fn metadata_tolerates_missing_id() {
		let meta: JobMetadata =
			serde_json::from_str(r#"{"status": "COMPLETED"}"#).unwrap();
		assert!(meta.id.is_empty());
		assert_eq!(meta.status, JobStatus::Completed);
		assert!(meta.created.is_none());
	}

	#[test]
	fn status_response_tolerates_missing_job() {
		let rsp: ImportStatusResponse = serde_json::from_str("{}").unwrap();
		assert!(rsp.job.is_none());
	}

	#[test]
	fn paged_results_empty_token_is_exhausted() {
		let page: PagedResults<u32> = serde_json::from_str(
			r#"{"total_records": "3", "results": [1, 2, 3], "next_page_token": ""}"#,
		)
		.unwrap();
		assert_eq!(page.results, vec![1, 2, 3]);
		assert!(page.next_token().is_none());

		let page: PagedResults<u32> =
			serde_json::from_str(r#"{"results": [], "next_page_token": "abc"}"#).unwrap();
		assert_eq!(page.next_token(), Some("abc"));
	}
}
