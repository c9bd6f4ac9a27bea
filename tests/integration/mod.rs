//! Integration tests
//!
//! End-to-end turns through the router over an in-memory database and a
//! scripted reasoning provider.

mod support;

mod admin_test;
mod gatekeeper_test;
mod http_test;
mod panel_test;
mod partition_test;
mod retrieval_test;
