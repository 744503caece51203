//! Integration tests for geocrawl
//!
//! These tests use wiremock to stand in for the lookup service and a
//! directory-backed bucket, then run whole batches end-to-end.

mod pipeline_tests;
