// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Core data types for the Loom batch import API.
//!
//! This crate holds the wire-level shapes shared by the import SDK and
//! anything that needs to speak the import API: job metadata, paged result
//! envelopes, and the event/user resource models. No I/O lives here.

pub mod events;
pub mod job;
pub mod users;

pub use job::{ImportStatusResponse, JobMetadata, JobStatus, PagedResults};
