use phz_codebase::CodeBaseError;
use phz_common::{IssueInstance, IssueKind};
use phz_solver::{NameError, SymbolKind, TypeError};
use std::sync::Arc;
use thiserror::Error;

/// Failures raised while walking a file.
///
/// Everything except [`CheckError::InvariantViolation`] and
/// [`CheckError::NestingLimit`] is recoverable: the walker turns it into an
/// issue at the statement that raised it and keeps going.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    CodeBase(#[from] CodeBaseError),

    /// Statement or expression nesting went past the walk limit.
    #[error("nesting exceeds the limit of {limit}")]
    NestingLimit { limit: u32 },

    /// Internal state is inconsistent; the current file must be abandoned.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

pub type CheckResult<T> = Result<T, CheckError>;

impl CheckError {
    /// Whether the walker must stop analysing the current file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CheckError::InvariantViolation(_) | CheckError::NestingLimit { .. }
        )
    }

    /// The issue this error is reported as.
    pub fn to_issue(&self, file: &Arc<str>, line: u32) -> IssueInstance {
        let (kind, args) = match self {
            CheckError::Name(NameError::Malformed { text, reason }) => {
                (IssueKind::MalformedName, vec![text.clone(), reason.to_string()])
            }
            CheckError::Type(err) => (IssueKind::RecursionDepthExceeded, vec![err.class().to_string()]),
            CheckError::CodeBase(CodeBaseError::NotFound { kind, qsn }) => {
                (undefined_kind(*kind), vec![qsn.to_string()])
            }
            CheckError::CodeBase(CodeBaseError::AlreadyDeclared { kind, qsn }) => {
                let kind = if *kind == SymbolKind::Class {
                    IssueKind::RedeclaredClass
                } else {
                    IssueKind::RedeclaredFunction
                };
                (kind, vec![qsn.to_string(), qsn.canonical().to_string()])
            }
            CheckError::NestingLimit { .. } | CheckError::InvariantViolation(_) => {
                (IssueKind::AnalysisAborted, vec![self.to_string()])
            }
        };
        IssueInstance::new(kind, file.clone(), line, args)
    }
}

fn undefined_kind(kind: SymbolKind) -> IssueKind {
    match kind {
        SymbolKind::Class => IssueKind::UndefinedClass,
        SymbolKind::Function => IssueKind::UndefinedFunction,
        SymbolKind::Method => IssueKind::UndefinedMethod,
        SymbolKind::Property | SymbolKind::GlobalConstant | SymbolKind::ClassConstant => {
            IssueKind::UndefinedConstant
        }
    }
}
