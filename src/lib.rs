//! Stream CircleCI job step metrics to newline-delimited JSON.
//!
//! Crawls the pipeline → workflow → job → build-detail hierarchy of one
//! project and flattens every executed (step, action) pair into one record,
//! with cursor pagination, bounded per-stage concurrency, and per-request
//! retry.

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod crawl;
pub mod error;
pub mod progress;
pub mod sink;
