//! Whole-program symbol table for the phz analyzer.
//!
//! - [`CodeBase`]: QSN-keyed declaration indexes plus per-file bookkeeping
//! - [`decls`]: the declaration records
//! - [`DeclarationCollector`]: the declaration phase over one file's tree
//! - [`CodeBaseSnapshot`]: bulk export/import for a persistence layer

pub mod codebase;
pub mod declare;
pub mod decls;
pub mod error;
pub mod snapshot;

pub use codebase::{CodeBase, Declaration, ScopeMap};
pub use declare::{DeclarationCollector, literal_type};
pub use decls::{
    ClassDecl, ConstantDecl, DeclFlags, DeclInfo, FunctionDecl, MethodDecl, ParamDecl,
    PropertyDecl, Visibility,
};
pub use error::CodeBaseError;
pub use snapshot::CodeBaseSnapshot;
