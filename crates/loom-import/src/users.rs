// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! User CRUD operations and user batch imports.

use crate::batch::{BatchJob, BatchJobOptions, BatchRequester};
use crate::error::Result;
use crate::transport::Transport;
use async_trait::async_trait;
use loom_import_core::users::{
	BatchUserImportRequest, CreateUserRequest, FailedUserImport, ImportedUser,
	ListUsersResponse, UpdateUserRequest, UserResponse,
};
use loom_import_core::{ImportStatusResponse, JobMetadata, PagedResults};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const USERS_PATH: &str = "/api/import/users";
const USERS_BATCH_PATH: &str = "/api/import/users/batch";

/// Filters for listing users. All fields are optional and combined with AND.
#[derive(Debug, Clone, Default)]
pub struct ListUsersQuery {
	pub uid: Option<String>,
	pub email: Option<String>,
	pub display_name: Option<String>,
	pub is_identified: Option<bool>,
	/// Token from a previous page's `next_page_token`.
	pub page_token: Option<String>,
}

impl ListUsersQuery {
	fn params(&self) -> Vec<(&'static str, String)> {
		let mut params = Vec::new();
		if let Some(uid) = &self.uid {
			params.push(("uid", uid.clone()));
		}
		if let Some(email) = &self.email {
			params.push(("email", email.clone()));
		}
		if let Some(display_name) = &self.display_name {
			params.push(("display_name", display_name.clone()));
		}
		if let Some(is_identified) = self.is_identified {
			params.push(("is_identified", is_identified.to_string()));
		}
		if let Some(page_token) = &self.page_token {
			params.push(("page_token", page_token.clone()));
		}
		params
	}
}

/// API for the user resource.
///
/// Obtained from [`ImportClient::users`](crate::ImportClient::users).
pub struct UsersApi {
	transport: Arc<Transport>,
	batch_options: BatchJobOptions,
}

impl UsersApi {
	pub(crate) fn new(transport: Arc<Transport>, batch_options: BatchJobOptions) -> Self {
		Self {
			transport,
			batch_options,
		}
	}

	/// Fetches a single user by its server-assigned id.
	pub async fn get(&self, id: &str) -> Result<UserResponse> {
		self.transport.get(&format!("{USERS_PATH}/{id}"), &[]).await
	}

	/// Creates a user. Users are upserted by `uid`.
	pub async fn create(&self, request: &CreateUserRequest) -> Result<UserResponse> {
		self.transport.post(USERS_PATH, request).await
	}

	/// Lists users matching the query, one page at a time.
	pub async fn list(&self, query: &ListUsersQuery) -> Result<ListUsersResponse> {
		self.transport.get(USERS_PATH, &query.params()).await
	}

	/// Updates an existing user.
	pub async fn update(&self, id: &str, request: &UpdateUserRequest) -> Result<UserResponse> {
		self.transport
			.post(&format!("{USERS_PATH}/{id}"), request)
			.await
	}

	/// Deletes a user by its server-assigned id.
	pub async fn delete(&self, id: &str) -> Result<()> {
		self.transport.delete(&format!("{USERS_PATH}/{id}")).await
	}

	/// Creates a batch import job for users, using the client's default job
	/// options. The job is not submitted until
	/// [`execute`](BatchJob::execute) is called.
	pub fn batch_create(&self, requests: Vec<BatchUserImportRequest>) -> UsersBatchJob {
		self.batch_create_with(requests, self.batch_options.clone())
	}

	/// Creates a batch import job with explicit options.
	pub fn batch_create_with(
		&self,
		requests: Vec<BatchUserImportRequest>,
		options: BatchJobOptions,
	) -> UsersBatchJob {
		BatchJob::new(
			UsersBatchRequester {
				transport: Arc::clone(&self.transport),
			},
			requests,
			options,
		)
	}
}

/// A batch import job over user records.
pub type UsersBatchJob = BatchJob<UsersBatchRequester>;

#[derive(Serialize)]
struct CreateBatchRequest<'a, T> {
	requests: &'a [T],
}

#[derive(Deserialize)]
struct CreateBatchResponse {
	#[serde(default)]
	job: Option<JobMetadata>,
}

/// Issues the user batch import requests on behalf of a [`UsersBatchJob`].
pub struct UsersBatchRequester {
	transport: Arc<Transport>,
}

#[async_trait]
impl BatchRequester for UsersBatchRequester {
	type Request = BatchUserImportRequest;
	type Imported = ImportedUser;
	type Failed = FailedUserImport;

	async fn create_job(&self, requests: Vec<Self::Request>) -> Result<JobMetadata> {
		let response: CreateBatchResponse = self
			.transport
			.post(USERS_BATCH_PATH, &CreateBatchRequest { requests: &requests })
			.await?;
		Ok(response.job.unwrap_or_default())
	}

	async fn job_status(&self, job_id: &str) -> Result<ImportStatusResponse> {
		self.transport
			.get(&format!("{USERS_BATCH_PATH}/{job_id}"), &[])
			.await
	}

	async fn imports(&self, job_id: &str) -> Result<Vec<Self::Imported>> {
		fetch_all_pages(&self.transport, &format!("{USERS_BATCH_PATH}/{job_id}/imports")).await
	}

	async fn import_errors(&self, job_id: &str) -> Result<Vec<Self::Failed>> {
		fetch_all_pages(&self.transport, &format!("{USERS_BATCH_PATH}/{job_id}/errors")).await
	}
}

/// Drains a paginated result endpoint into a single vector.
pub(crate) async fn fetch_all_pages<T: serde::de::DeserializeOwned>(
	transport: &Transport,
	path: &str,
) -> Result<Vec<T>> {
	let mut results = Vec::new();
	let mut page_token: Option<String> = None;
	loop {
		let mut query: Vec<(&str, String)> = Vec::new();
		if let Some(token) = &page_token {
			query.push(("page_token", token.clone()));
		}
		let page: PagedResults<T> = transport.get(path, &query).await?;
		let next = page.next_token().map(str::to_string);
		results.extend(page.results);
		match next {
			Some(token) => page_token = Some(token),
			None => break,
		}
	}
	Ok(results)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn list_query_builds_only_set_params() {
		let query = ListUsersQuery {
			uid: Some("u1".into()),
			is_identified: Some(true),
			..Default::default()
		};
		assert_eq!(
			query.params(),
			vec![("uid", "u1".to_string()), ("is_identified", "true".to_string())]
		);
		assert!(ListUsersQuery::default().params().is_empty());
	}

	#[test]
	fn batch_create_body_wraps_requests() {
		let requests = vec![BatchUserImportRequest {
			uid: Some("u1".into()),
			..Default::default()
		}];
		let body = serde_json::to_value(CreateBatchRequest {
			requests: &requests,
		})
		.unwrap();
		assert_eq!(body, serde_json::json!({"requests": [{"uid": "u1"}]}));
	}
}
