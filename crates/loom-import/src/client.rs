// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Import client construction.

use crate::batch::BatchJobOptions;
use crate::error::{ImportError, Result};
use crate::events::EventsApi;
use crate::transport::Transport;
use crate::users::UsersApi;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Server targeted when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://loom.ghuntley.com";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for constructing an [`ImportClient`].
pub struct ImportClientBuilder {
	api_key: Option<String>,
	base_url: Option<String>,
	request_timeout: Duration,
	batch_options: BatchJobOptions,
	integration_source: Option<String>,
}

impl ImportClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			api_key: None,
			base_url: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			batch_options: BatchJobOptions::default(),
			integration_source: None,
		}
	}

	/// Sets the API key. Required.
	///
	/// A bare key is sent as `Basic {key}`; a value that already carries a
	/// scheme (contains a space) is sent as-is.
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	/// Sets the base URL of the server. Defaults to [`DEFAULT_BASE_URL`].
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	/// Sets the HTTP request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Sets the default options for batch import jobs created through this
	/// client.
	pub fn batch_options(mut self, options: BatchJobOptions) -> Self {
		self.batch_options = options;
		self
	}

	/// Tags requests as originating from a named integration built on this
	/// SDK.
	pub fn integration_source(mut self, source: impl Into<String>) -> Self {
		self.integration_source = Some(source.into());
		self
	}

	/// Builds the [`ImportClient`].
	pub fn build(self) -> Result<ImportClient> {
		let api_key = match self.api_key {
			Some(key) if !key.trim().is_empty() => key,
			_ => {
				return Err(ImportError::InvalidArgument(
					"api_key is required".into(),
				))
			}
		};
		let authorization = if api_key.contains(' ') {
			api_key
		} else {
			format!("Basic {api_key}")
		};

		// Normalize base URL
		let base_url = self
			.base_url
			.unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
			.trim_end_matches('/')
			.to_string();

		let http_client = loom_common_http::builder()
			.timeout(self.request_timeout)
			.build()
			.map_err(ImportError::Network)?;

		info!(base_url = %base_url, "import client initialized");

		Ok(ImportClient {
			inner: Arc::new(ClientInner {
				transport: Arc::new(Transport::new(
					http_client,
					base_url,
					authorization,
					self.integration_source,
				)),
				batch_options: self.batch_options,
			}),
		})
	}
}

impl Default for ImportClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Debug)]
struct ClientInner {
	transport: Arc<Transport>,
	batch_options: BatchJobOptions,
}

/// Client for the server-side import API.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
///
/// # Example
///
/// ```ignore
/// use loom_import::ImportClient;
///
/// let client = ImportClient::builder()
///     .api_key("your_api_key")
///     .build()?;
///
/// let job = client.users().batch_create(users);
/// job.on_done(|imported, failed| { /* ... */ });
/// job.execute();
/// ```
#[derive(Clone, Debug)]
pub struct ImportClient {
	inner: Arc<ClientInner>,
}

impl ImportClient {
	pub fn builder() -> ImportClientBuilder {
		ImportClientBuilder::new()
	}

	/// API for the user resource.
	pub fn users(&self) -> UsersApi {
		UsersApi::new(
			Arc::clone(&self.inner.transport),
			self.inner.batch_options.clone(),
		)
	}

	/// API for the event resource.
	pub fn events(&self) -> EventsApi {
		EventsApi::new(
			Arc::clone(&self.inner.transport),
			self.inner.batch_options.clone(),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::users::ListUsersQuery;
	use loom_import_core::events::CreateEventsRequest;
	use loom_import_core::users::CreateUserRequest;
	use serde_json::json;
	use wiremock::matchers::{body_json, header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn client_for(server: &MockServer) -> ImportClient {
		ImportClient::builder()
			.api_key("test-key")
			.base_url(server.uri())
			.build()
			.unwrap()
	}

	#[test]
	fn build_requires_api_key() {
		let err = ImportClient::builder().build().unwrap_err();
		assert!(matches!(err, ImportError::InvalidArgument(_)));

		let err = ImportClient::builder().api_key("").build().unwrap_err();
		assert!(matches!(err, ImportError::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn bare_api_key_is_sent_with_basic_scheme() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/u1"))
			.and(header("Authorization", "Basic test-key"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u1"})))
			.expect(1)
			.mount(&server)
			.await;

		let client = client_for(&server);
		let user = client.users().get("u1").await.unwrap();
		assert_eq!(user.id, "u1");
	}

	#[tokio::test]
	async fn api_key_with_scheme_is_sent_verbatim() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/u1"))
			.and(header("Authorization", "Bearer token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u1"})))
			.expect(1)
			.mount(&server)
			.await;

		let client = ImportClient::builder()
			.api_key("Bearer token")
			.base_url(server.uri())
			.build()
			.unwrap();
		client.users().get("u1").await.unwrap();
	}

	#[tokio::test]
	async fn trailing_slash_in_base_url_is_trimmed() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/u1"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u1"})))
			.mount(&server)
			.await;

		let client = ImportClient::builder()
			.api_key("test-key")
			.base_url(format!("{}/", server.uri()))
			.build()
			.unwrap();
		client.users().get("u1").await.unwrap();
	}

	#[tokio::test]
	async fn rate_limiting_surfaces_the_advised_wait() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/u1"))
			.respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
			.mount(&server)
			.await;

		let err = client_for(&server).users().get("u1").await.unwrap_err();
		match err {
			ImportError::RateLimited { retry_after } => {
				assert_eq!(retry_after, Some(Duration::from_secs(7)));
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn structured_error_bodies_are_parsed() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/u1"))
			.respond_with(ResponseTemplate::new(400).set_body_json(json!({
				"code": "invalid_argument",
				"message": "bad uid",
			})))
			.mount(&server)
			.await;

		let err = client_for(&server).users().get("u1").await.unwrap_err();
		match err {
			ImportError::Api {
				status,
				code,
				message,
			} => {
				assert_eq!(status, 400);
				assert_eq!(code, "invalid_argument");
				assert_eq!(message, "bad uid");
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn unstructured_error_bodies_are_kept_raw() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/u1"))
			.respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
			.mount(&server)
			.await;

		let err = client_for(&server).users().get("u1").await.unwrap_err();
		match err {
			ImportError::Api {
				status, message, ..
			} => {
				assert_eq!(status, 500);
				assert_eq!(message, "upstream exploded");
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn malformed_success_bodies_are_parse_errors() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/u1"))
			.respond_with(ResponseTemplate::new(200).set_body_string("not json"))
			.mount(&server)
			.await;

		let err = client_for(&server).users().get("u1").await.unwrap_err();
		assert!(matches!(err, ImportError::ParseResponse { status: 200, .. }));
	}

	#[tokio::test]
	async fn create_and_delete_user() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/import/users"))
			.and(body_json(json!({"uid": "app-1", "email": "a@b.test"})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"id": "u1",
				"uid": "app-1",
				"email": "a@b.test",
			})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("DELETE"))
			.and(path("/api/import/users/u1"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let client = client_for(&server);
		let user = client
			.users()
			.create(&CreateUserRequest {
				uid: Some("app-1".into()),
				email: Some("a@b.test".into()),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(user.id, "u1");
		client.users().delete("u1").await.unwrap();
	}

	#[tokio::test]
	async fn list_users_forwards_filters() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/import/users"))
			.and(query_param("uid", "app-1"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"results": [{"id": "u1", "uid": "app-1"}],
				"next_page_token": "t2",
			})))
			.mount(&server)
			.await;

		let listed = client_for(&server)
			.users()
			.list(&ListUsersQuery {
				uid: Some("app-1".into()),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(listed.results.len(), 1);
		assert_eq!(listed.next_page_token.as_deref(), Some("t2"));
	}

	#[tokio::test]
	async fn event_creation_tags_the_integration_source() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/import/events"))
			.and(body_json(json!({
				"name": "signup",
				"context": {"integration": "the-app"},
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"events": [{"name": "signup"}],
			})))
			.expect(1)
			.mount(&server)
			.await;

		let client = ImportClient::builder()
			.api_key("test-key")
			.base_url(server.uri())
			.integration_source("the-app")
			.build()
			.unwrap();
		let response = client
			.events()
			.create(&CreateEventsRequest {
				name: "signup".into(),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(response.events.len(), 1);
	}

	#[tokio::test]
	async fn batch_results_are_fetched_across_pages() {
		let server = MockServer::start().await;
		// More specific mock first; wiremock picks the first match.
		Mock::given(method("GET"))
			.and(path("/api/import/users/batch/J1/imports"))
			.and(query_param("page_token", "t2"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"results": [{"id": "u3"}],
				"next_page_token": "",
			})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/batch/J1/imports"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"total_records": "3",
				"results": [{"id": "u1"}, {"id": "u2"}],
				"next_page_token": "t2",
			})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/api/import/users/batch/J1"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"job": {"id": "J1", "status": "COMPLETED"},
			})))
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/api/import/users/batch"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"job": {"id": "J1", "status": "PROCESSING"},
			})))
			.expect(1)
			.mount(&server)
			.await;

		let client = client_for(&server);
		let job = client.users().batch_create_with(
			vec![Default::default()],
			crate::BatchJobOptions {
				poll_interval: Duration::from_millis(10),
				..Default::default()
			},
		);
		let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
		job.on_done(move |imports, _| {
			tx.send(imports.to_vec()).ok();
		});
		job.execute();
		let imports = rx.recv().await.unwrap();
		let ids: Vec<_> = imports.iter().map(|u| u.id.as_str()).collect();
		assert_eq!(ids, vec!["u1", "u2", "u3"]);
	}
}
