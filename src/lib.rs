//! EcoWatch - environmental telemetry dashboard with threshold alerts.
//!
//! # Overview
//!
//! EcoWatch tracks a set of monitored zones, samples six environmental
//! metrics per zone on each dashboard pass, and records every threshold
//! breach in an append-only alert log. Operators can ask an assistant about
//! the recorded state; its context is assembled only from the alert log and
//! the session's own conversation history.
//!
//! At most [`model::FEATURED_CAPACITY`] zones are featured on the dashboard.
//!
//! # Modules
//!
//! - [`model`]: Zones, samples, alerts, chat messages, request bodies
//! - [`config`]: Thresholds, alert policy, environment configuration
//! - [`evaluator`]: Threshold classification of metric samples
//! - [`storage`]: SQLite zone registry, alert log, and conversation memory
//! - [`sources`]: Metric sample providers
//! - [`context`]: Prompt context assembly
//! - [`assistant`]: Answer generation backends and chat turns
//! - [`dashboard`]: Dashboard and live-update evaluation cycles
//! - [`api`]: HTTP API handlers
//! - [`error`]: Error types

pub mod api;
pub mod assistant;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod sources;
pub mod storage;
