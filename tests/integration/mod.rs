//! Integration tests for request_diagnostics
//!
//! Each test starts an in-process server on 127.0.0.1:0 and talks to it
//! over real HTTP.
//!
//! Run with: cargo test --test integration

mod helpers;

mod health;
mod report;
