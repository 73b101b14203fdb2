// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Event submission and event batch imports.

use crate::batch::{BatchJob, BatchJobOptions, BatchRequester};
use crate::error::Result;
use crate::transport::Transport;
use crate::users::fetch_all_pages;
use async_trait::async_trait;
use loom_import_core::events::{
	CreateEventsRequest, CreateEventsResponse, FailedEventsImport, ImportedEvent,
};
use loom_import_core::{ImportStatusResponse, JobMetadata};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const EVENTS_PATH: &str = "/api/import/events";
const EVENTS_BATCH_PATH: &str = "/api/import/events/batch";

/// API for the event resource.
///
/// Obtained from [`ImportClient::events`](crate::ImportClient::events).
pub struct EventsApi {
	transport: Arc<Transport>,
	batch_options: BatchJobOptions,
}

impl EventsApi {
	pub(crate) fn new(transport: Arc<Transport>, batch_options: BatchJobOptions) -> Self {
		Self {
			transport,
			batch_options,
		}
	}

	/// Records events for a user or session.
	///
	/// If the client was built with an integration source, it is stamped on
	/// the event context unless the caller already set one.
	pub async fn create(&self, request: &CreateEventsRequest) -> Result<CreateEventsResponse> {
		let request = tag_integration(&self.transport, request.clone());
		self.transport.post(EVENTS_PATH, &request).await
	}

	/// Creates a batch import job for events, using the client's default job
	/// options. The job is not submitted until
	/// [`execute`](BatchJob::execute) is called.
	pub fn batch_create(&self, requests: Vec<CreateEventsRequest>) -> EventsBatchJob {
		self.batch_create_with(requests, self.batch_options.clone())
	}

	/// Creates a batch import job with explicit options.
	pub fn batch_create_with(
		&self,
		requests: Vec<CreateEventsRequest>,
		options: BatchJobOptions,
	) -> EventsBatchJob {
		BatchJob::new(
			EventsBatchRequester {
				transport: Arc::clone(&self.transport),
			},
			requests,
			options,
		)
	}
}

/// A batch import job over event records.
pub type EventsBatchJob = BatchJob<EventsBatchRequester>;

#[derive(Serialize)]
struct CreateBatchRequest<'a> {
	requests: &'a [CreateEventsRequest],
}

#[derive(Deserialize)]
struct CreateBatchResponse {
	#[serde(default)]
	job: Option<JobMetadata>,
}

/// Issues the event batch import requests on behalf of an [`EventsBatchJob`].
pub struct EventsBatchRequester {
	transport: Arc<Transport>,
}

#[async_trait]
impl BatchRequester for EventsBatchRequester {
	type Request = CreateEventsRequest;
	type Imported = ImportedEvent;
	type Failed = FailedEventsImport;

	async fn create_job(&self, requests: Vec<Self::Request>) -> Result<JobMetadata> {
		// Stamp the integration source at submission time so records added
		// after job construction are covered too.
		let requests: Vec<CreateEventsRequest> = requests
			.into_iter()
			.map(|r| tag_integration(&self.transport, r))
			.collect();
		let response: CreateBatchResponse = self
			.transport
			.post(EVENTS_BATCH_PATH, &CreateBatchRequest { requests: &requests })
			.await?;
		Ok(response.job.unwrap_or_default())
	}

	async fn job_status(&self, job_id: &str) -> Result<ImportStatusResponse> {
		self.transport
			.get(&format!("{EVENTS_BATCH_PATH}/{job_id}"), &[])
			.await
	}

	async fn imports(&self, job_id: &str) -> Result<Vec<Self::Imported>> {
		fetch_all_pages(&self.transport, &format!("{EVENTS_BATCH_PATH}/{job_id}/imports"))
			.await
	}

	async fn import_errors(&self, job_id: &str) -> Result<Vec<Self::Failed>> {
		fetch_all_pages(&self.transport, &format!("{EVENTS_BATCH_PATH}/{job_id}/errors"))
			.await
	}
}

/// Applies the configured integration source to a request's context when the
/// caller did not set one themselves.
fn tag_integration(transport: &Transport, mut request: CreateEventsRequest) -> CreateEventsRequest {
	if let Some(source) = transport.integration_source() {
		let context = request.context.get_or_insert_with(Default::default);
		if context.integration.as_deref().map_or(true, str::is_empty) {
			context.integration = Some(source.to_string());
		}
	}
	request
}
