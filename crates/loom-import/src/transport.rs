// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP transport shared by the resource APIs.
//!
//! Owns the base URL, authorization header and response classification.
//! Retry decisions belong to callers; the transport reports each failure
//! exactly once.

use crate::error::{ImportError, Result};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Error body returned by the server for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
	#[serde(default)]
	code: String,
	#[serde(default)]
	message: String,
}

#[derive(Debug)]
pub(crate) struct Transport {
	http: reqwest::Client,
	base_url: String,
	authorization: String,
	integration_source: Option<String>,
}

impl Transport {
	pub(crate) fn new(
		http: reqwest::Client,
		base_url: String,
		authorization: String,
		integration_source: Option<String>,
	) -> Self {
		Self {
			http,
			base_url,
			authorization,
			integration_source,
		}
	}

	/// Origin tag to stamp on outgoing event context, if configured.
	pub(crate) fn integration_source(&self) -> Option<&str> {
		self.integration_source.as_deref()
	}

	pub(crate) async fn get<T: DeserializeOwned>(
		&self,
		path: &str,
		query: &[(&str, String)],
	) -> Result<T> {
		let request = self
			.http
			.request(Method::GET, format!("{}{}", self.base_url, path))
			.header("Authorization", &self.authorization)
			.query(query);
		self.execute(request).await
	}

	pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
		&self,
		path: &str,
		body: &B,
	) -> Result<T> {
		let request = self
			.http
			.request(Method::POST, format!("{}{}", self.base_url, path))
			.header("Authorization", &self.authorization)
			.json(body);
		self.execute(request).await
	}

	pub(crate) async fn delete(&self, path: &str) -> Result<()> {
		let request = self
			.http
			.request(Method::DELETE, format!("{}{}", self.base_url, path))
			.header("Authorization", &self.authorization);
		let response = self.send(request).await?;
		self.check_status(response).await?;
		Ok(())
	}

	async fn execute<T: DeserializeOwned>(
		&self,
		request: reqwest::RequestBuilder,
	) -> Result<T> {
		let response = self.send(request).await?;
		let response = self.check_status(response).await?;
		let status = response.status().as_u16();
		let body = response.text().await.map_err(ImportError::Network)?;
		serde_json::from_str(&body).map_err(|e| {
			debug!(status, error = %e, "unable to parse response body");
			ImportError::ParseResponse { status, body }
		})
	}

	async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
		request.send().await.map_err(|e| {
			if e.is_timeout() {
				ImportError::Timeout
			} else {
				ImportError::Network(e)
			}
		})
	}

	/// Classifies a non-success response into an [`ImportError`], passing
	/// successful responses through untouched.
	async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		if status == StatusCode::TOO_MANY_REQUESTS {
			let retry_after = response
				.headers()
				.get("Retry-After")
				.and_then(|v| v.to_str().ok())
				.and_then(|v| v.parse::<u64>().ok())
				.map(Duration::from_secs);
			debug!(?retry_after, "rate limited");
			return Err(ImportError::RateLimited { retry_after });
		}

		let body = match response.text().await {
			Ok(body) => body,
			Err(e) => {
				return Err(ImportError::Unknown(format!(
					"unable to read error response body: {e}"
				)))
			}
		};
		let err = match serde_json::from_str::<ErrorBody>(&body) {
			Ok(parsed) if !parsed.message.is_empty() || !parsed.code.is_empty() => {
				ImportError::Api {
					status: status.as_u16(),
					code: parsed.code,
					message: parsed.message,
				}
			}
			_ => ImportError::Api {
				status: status.as_u16(),
				code: String::new(),
				message: body,
			},
		};
		debug!(status = status.as_u16(), error = %err, "request failed");
		Err(err)
	}
}
