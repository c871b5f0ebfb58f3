use phz_solver::{Qsn, SymbolKind};
use thiserror::Error;

/// Symbol table lookup and insertion failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CodeBaseError {
    /// No declaration is recorded under `qsn`.
    #[error("{} {qsn} is not declared", kind_label(.kind))]
    NotFound { kind: SymbolKind, qsn: Qsn },

    /// A declaration already occupies `qsn`; the caller must pick another
    /// alternate id before inserting.
    #[error("{} {qsn} is already declared", kind_label(.kind))]
    AlreadyDeclared { kind: SymbolKind, qsn: Qsn },
}

impl CodeBaseError {
    pub fn qsn(&self) -> &Qsn {
        match self {
            CodeBaseError::NotFound { qsn, .. } | CodeBaseError::AlreadyDeclared { qsn, .. } => qsn,
        }
    }

    pub(crate) fn not_found(qsn: &Qsn) -> Self {
        CodeBaseError::NotFound {
            kind: qsn.kind(),
            qsn: qsn.clone(),
        }
    }

    pub(crate) fn already_declared(qsn: &Qsn) -> Self {
        CodeBaseError::AlreadyDeclared {
            kind: qsn.kind(),
            qsn: qsn.clone(),
        }
    }
}

pub(crate) fn kind_label(kind: &SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Class => "class",
        SymbolKind::Function => "function",
        SymbolKind::GlobalConstant => "constant",
        SymbolKind::Method => "method",
        SymbolKind::Property => "property",
        SymbolKind::ClassConstant => "class constant",
    }
}
