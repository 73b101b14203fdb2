// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Event resource shapes for submission and batch import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies the user an event belongs to, by server id or application uid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
}

/// Identifies the session an event belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionIdRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
}

/// Mobile app details attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MobileContext {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub app_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub app_version: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub app_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub build_variant: Option<String>,
}

/// Coarse location details attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationContext {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub country: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub city: Option<String>,
}

/// Contextual data shared by the events in a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
	/// Origin tag for requests made by integrations built on this SDK.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub integration: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mobile: Option<MobileContext>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub location: Option<LocationContext>,
}

/// Request to record a single event, also the record type for batch import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEventsRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user: Option<UserIdRequest>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session: Option<SessionIdRequest>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub context: Option<EventContext>,
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub properties: Option<Value>,
}

/// An event as echoed back by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub properties: Option<Value>,
}

/// Response to recording events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEventsResponse {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user: Option<UserIdRequest>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session: Option<SessionIdRequest>,
	#[serde(default = "Vec::new")]
	pub events: Vec<Event>,
}

/// A successfully imported event from a batch job.
pub type ImportedEvent = Event;

/// An event record that failed to import, with the server's reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailedEventsImport {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	/// The original request record that failed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub event: Option<CreateEventsRequest>,
}
