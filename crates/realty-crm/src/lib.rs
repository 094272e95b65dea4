//! Realty CRM lead routing: assignment rules, match scoring, and agent workload tracking.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
