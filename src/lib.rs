//! phz: flow-sensitive type inference and symbol resolution for PHP-like
//! code.
//!
//! The engine is split across the workspace crates:
//! - `phz_common` - issues and limits
//! - `phz_ast` - the syntax tree handed over by a parser
//! - `phz_solver` - qualified names, types and narrowing
//! - `phz_codebase` - the symbol table and the declaration phase
//! - `phz_checker` - scopes, condition narrowing and the statement walker
//!
//! This crate drives them: [`Analyzer`] runs the declaration phase over every
//! file and then the analysis phase, configured by [`AnalyzerOptions`].

pub mod analyzer;
pub mod options;
pub mod tracing_config;

pub use analyzer::{Analyzer, RunSummary};
pub use options::AnalyzerOptions;
pub use tracing_config::init_tracing;

pub use phz_ast as ast;
pub use phz_checker as checker;
pub use phz_codebase as codebase;
pub use phz_common as common;
pub use phz_solver as solver;
