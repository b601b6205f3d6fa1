//! Integration tests for Quillscout
//!
//! These tests drive the orchestrator end-to-end against wiremock servers
//! and scripted fetchers standing in for the browser strategies.

mod crawl_tests;
mod support;
mod telemetry_tests;
