//! Common types and utilities for the phz analyzer.
//!
//! This crate provides foundational types used across all phz crates:
//! - Issue reporting values (`IssueKind`, `IssueInstance`, `IssueCollector`)
//! - Centralized analysis limits

// Issue values handed to the (external) reporting layer
pub mod diagnostics;
pub use diagnostics::{
    IssueCategory, IssueCollector, IssueInstance, IssueKind, Severity, format_message,
};

// Centralized limits and thresholds
pub mod limits;
