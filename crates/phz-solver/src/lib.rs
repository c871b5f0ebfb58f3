//! Type algebra for the phz analyzer.
//!
//! - [`qsn`]: interned qualified symbol names and namespace resolution
//! - [`types`] / [`union_type`]: atomic types and immutable unions
//! - [`cast`]: cast compatibility
//! - [`expand`]: class expansion over the hierarchy, with its cache
//! - [`narrowing`]: applying condition guards to unions
//! - [`recursion`]: guards for recursive walks

pub mod cast;
pub mod error;
pub mod expand;
pub mod narrowing;
pub mod qsn;
pub mod recursion;
pub mod types;
pub mod union_type;

pub use cast::Soundness;
pub use error::{NameError, TypeError};
pub use expand::{Ancestors, ExpansionCache, ExpansionCacheStats, TypeDatabase};
pub use narrowing::{NarrowingContext, RelationalOp, TypeCheck, TypeGuard};
pub use qsn::{ImportKind, NamespaceMap, Qsn, SymbolKind};
pub use recursion::{DepthCounter, RecursionGuard, RecursionProfile, RecursionResult};
pub use types::{ArrayKey, LiteralValue, ShapeKey, Truthiness, Type};
pub use union_type::{UnionFlags, UnionType};
