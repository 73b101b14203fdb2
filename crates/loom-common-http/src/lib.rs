// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the Loom import SDK.
//!
//! This crate provides:
//! - A pre-configured HTTP client with consistent User-Agent header
//! - A delayed-retry policy that honors server-advised wait times

mod client;
mod retry;

pub use client::{builder, new_client, new_client_with_timeout, user_agent};
pub use retry::{retry, with_delay, RetryConfig, RetryError, RetryableError, MAX_BACKOFF_DELAY};
