// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! User resource shapes for CRUD and batch import.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to create or import a single user. Users are upserted: created if
/// they do not exist, updated if they do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchUserImportRequest {
	/// Application-specific unique identifier for the user.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Free-form user properties.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub properties: Option<Value>,
}

/// Request body for creating a single user.
pub type CreateUserRequest = BatchUserImportRequest;

/// Request body for updating an existing user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub properties: Option<Value>,
}

/// A user as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
	/// Server-assigned user id.
	#[serde(default)]
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub properties: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub is_identified: Option<bool>,
}

/// A successfully imported user from a batch job.
pub type ImportedUser = UserResponse;

/// A user record that failed to import, with the server's reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailedUserImport {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	/// The original request record that failed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user: Option<BatchUserImportRequest>,
}

/// Response to a user listing request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListUsersResponse {
	#[serde(default = "Vec::new")]
	pub results: Vec<UserResponse>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next_page_token: Option<String>,
}
