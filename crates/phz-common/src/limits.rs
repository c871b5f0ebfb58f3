//! Centralized limits and thresholds for the analyzer.
//!
//! Solver recursion limits used by `RecursionGuard` are defined in
//! `phz_solver::recursion::RecursionProfile`, which reads the values here so
//! there is a single place to tune them.

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum depth for expanding a class type over its ancestors.
///
/// Legitimate hierarchies are shallow; anything deeper is almost always a
/// cyclic or malformed inheritance graph. Exceeding the limit surfaces as
/// `TypeError::RecursionDepthExceeded`, which the caller downgrades to an issue.
///
/// ```php
/// class A extends B {}
/// class B extends A {} // expansion of A never terminates without the bound
/// ```
pub const MAX_TYPE_EXPANSION_DEPTH: u32 = 20;

/// Total work budget for a single expansion (number of guarded entries).
pub const MAX_TYPE_EXPANSION_ITERATIONS: u32 = 10_000;

/// Maximum nesting of condition expressions (`!`, `&&`, `||`, parentheses)
/// the condition visitor follows before giving up and keeping the context.
pub const MAX_CONDITION_DEPTH: u32 = 100;

/// Maximum nesting of statements and expressions the walker descends into.
pub const MAX_WALK_DEPTH: u32 = 500;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Unions larger than this are not expanded member-by-member when narrowing;
/// the narrowing falls back to the unexpanded members.
pub const MAX_NARROWING_UNION_SIZE: usize = 256;

/// Highest alternate id the declaration collector will hand out for one name.
pub const MAX_ALTERNATE_ID: u32 = 1_000;
