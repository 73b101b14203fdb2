// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Rust SDK for the Loom event/user analytics import API.
//!
//! Provides CRUD access to users, event submission, and asynchronous batch
//! import jobs with background polling and observer callbacks.
//!
//! # Example
//!
//! ```ignore
//! use loom_import::ImportClient;
//! use loom_import::users::BatchUserImportRequest;
//!
//! let client = ImportClient::builder().api_key("your_api_key").build()?;
//!
//! let job = client.users().batch_create(vec![BatchUserImportRequest {
//!     uid: Some("user-1".into()),
//!     ..Default::default()
//! }]);
//! job.on_done(|imported, failed| {
//!     println!("{} imported, {} failed", imported.len(), failed.len());
//! });
//! job.on_abort(|errors| {
//!     eprintln!("import gave up after {} errors", errors.len());
//! });
//! job.execute();
//! ```

pub mod batch;
pub mod client;
pub mod error;
pub mod events;
mod transport;
pub mod users;

pub use batch::{
	BatchJob, BatchJobOptions, BatchRequester, ExecutionStatus, DEFAULT_MAX_RETRY,
	DEFAULT_POLL_INTERVAL,
};
pub use client::{ImportClient, ImportClientBuilder, DEFAULT_BASE_URL};
pub use error::{ImportError, Result};
pub use events::{EventsApi, EventsBatchJob};
pub use users::{ListUsersQuery, UsersApi, UsersBatchJob};

pub use loom_common_http::{RetryConfig, RetryableError};
pub use loom_import_core::{ImportStatusResponse, JobMetadata, JobStatus, PagedResults};
