//! Analysis phase for the phz analyzer.
//!
//! This crate is organized into several modules:
//! - `scope` - variable scopes, branch scopes and the shared global state
//! - `context` - the analysis position and name resolution
//! - `conditions` - narrowing of `if`/`while` conditions
//! - `walker` - statement walk and expression inference for one file
//! - `plugin` - hooks for analysis plugins
//! - `error` - errors raised while checking, and their issue mapping

pub mod conditions;
pub mod context;
pub mod error;
pub mod plugin;
pub mod scope;
pub mod walker;

pub use conditions::{BinaryCondition, ConditionVisitor};
pub use context::Context;
pub use error::{CheckError, CheckResult};
pub use plugin::{AnalysisPlugin, PluginSet};
pub use scope::{GlobalState, Scope, ScopeKind, Variable, VariableFlags};
pub use walker::{StatementWalker, WalkOptions};
