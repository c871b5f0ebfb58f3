//! Issue types handed to the reporting layer.
//!
//! The analysis core never formats or prints anything. Every problem it finds
//! is recorded as an [`IssueInstance`]: an issue kind, a location, and the
//! substitution arguments for the kind's message template. Rendering (text,
//! JSON, colors) belongs to whoever drains the [`IssueCollector`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Issue Metadata
// =============================================================================

/// Broad grouping of issue kinds, used by reporters for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IssueCategory {
    Undefined,
    TypeError,
    Redefine,
    Internal,
}

/// How serious an issue is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low = 0,
    Normal = 5,
    Critical = 10,
}

/// Every issue the core can raise.
///
/// The numeric codes are stable and are what persisted baselines key on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IssueKind {
    UndefinedVariable,
    PossiblyUndefinedVariable,
    UndefinedFunction,
    UndefinedClass,
    UndefinedMethod,
    UndefinedConstant,
    TypeMismatchReturn,
    TypeMismatchArgument,
    ImpossibleCondition,
    RedundantCondition,
    RedeclaredFunction,
    RedeclaredClass,
    MalformedName,
    RecursionDepthExceeded,
    AnalysisAborted,
}

impl IssueKind {
    pub const fn code(self) -> u32 {
        match self {
            Self::UndefinedVariable => 1001,
            Self::PossiblyUndefinedVariable => 1002,
            Self::UndefinedFunction => 1003,
            Self::UndefinedClass => 1004,
            Self::UndefinedMethod => 1005,
            Self::UndefinedConstant => 1006,
            Self::TypeMismatchReturn => 2001,
            Self::TypeMismatchArgument => 2002,
            Self::ImpossibleCondition => 2003,
            Self::RedundantCondition => 2004,
            Self::RedeclaredFunction => 3001,
            Self::RedeclaredClass => 3002,
            Self::MalformedName => 9001,
            Self::RecursionDepthExceeded => 9002,
            Self::AnalysisAborted => 9003,
        }
    }

    pub const fn category(self) -> IssueCategory {
        match self {
            Self::UndefinedVariable
            | Self::PossiblyUndefinedVariable
            | Self::UndefinedFunction
            | Self::UndefinedClass
            | Self::UndefinedMethod
            | Self::UndefinedConstant => IssueCategory::Undefined,
            Self::TypeMismatchReturn
            | Self::TypeMismatchArgument
            | Self::ImpossibleCondition
            | Self::RedundantCondition => IssueCategory::TypeError,
            Self::RedeclaredFunction | Self::RedeclaredClass => IssueCategory::Redefine,
            Self::MalformedName | Self::RecursionDepthExceeded | Self::AnalysisAborted => {
                IssueCategory::Internal
            }
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            Self::PossiblyUndefinedVariable
            | Self::RedundantCondition
            | Self::RedeclaredFunction
            | Self::RedeclaredClass => Severity::Low,
            Self::UndefinedVariable
            | Self::TypeMismatchReturn
            | Self::TypeMismatchArgument
            | Self::ImpossibleCondition
            | Self::RecursionDepthExceeded => Severity::Normal,
            Self::UndefinedFunction
            | Self::UndefinedClass
            | Self::UndefinedMethod
            | Self::UndefinedConstant
            | Self::MalformedName
            | Self::AnalysisAborted => Severity::Critical,
        }
    }

    /// Message template. `{0}`, `{1}`, ... are replaced by the instance arguments.
    pub const fn template(self) -> &'static str {
        match self {
            Self::UndefinedVariable => "Variable ${0} is undeclared",
            Self::PossiblyUndefinedVariable => "Variable ${0} might not have been defined",
            Self::UndefinedFunction => "Call to undeclared function {0}",
            Self::UndefinedClass => "Reference to undeclared class {0}",
            Self::UndefinedMethod => "Call to undeclared method {0}",
            Self::UndefinedConstant => "Reference to undeclared constant {0}",
            Self::TypeMismatchReturn => {
                "Returning type {0} but {1}() is declared to return {2}"
            }
            Self::TypeMismatchArgument => {
                "Argument {0} (${1}) is {2} but {3}() takes {4}"
            }
            Self::ImpossibleCondition => "Impossible condition: ${0} of type {1} can never be {2}",
            Self::RedundantCondition => "Redundant condition: ${0} of type {1} is always {2}",
            Self::RedeclaredFunction => "Function {0} is declared more than once (also {1})",
            Self::RedeclaredClass => "Class {0} is declared more than once (also {1})",
            Self::MalformedName => "Malformed symbol name {0}: {1}",
            Self::RecursionDepthExceeded => "Type expansion of {0} exceeded the recursion limit",
            Self::AnalysisAborted => "Analysis of this file was abandoned: {0}",
        }
    }

    /// Stable, human-readable name used by reporters and suppressions.
    pub const fn name(self) -> &'static str {
        match self {
            Self::UndefinedVariable => "UndefinedVariable",
            Self::PossiblyUndefinedVariable => "PossiblyUndefinedVariable",
            Self::UndefinedFunction => "UndefinedFunction",
            Self::UndefinedClass => "UndefinedClass",
            Self::UndefinedMethod => "UndefinedMethod",
            Self::UndefinedConstant => "UndefinedConstant",
            Self::TypeMismatchReturn => "TypeMismatchReturn",
            Self::TypeMismatchArgument => "TypeMismatchArgument",
            Self::ImpossibleCondition => "ImpossibleCondition",
            Self::RedundantCondition => "RedundantCondition",
            Self::RedeclaredFunction => "RedeclaredFunction",
            Self::RedeclaredClass => "RedeclaredClass",
            Self::MalformedName => "MalformedName",
            Self::RecursionDepthExceeded => "RecursionDepthExceeded",
            Self::AnalysisAborted => "AnalysisAborted",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Issue Instances
// =============================================================================

/// One occurrence of an issue at a source location.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct IssueInstance {
    pub kind: IssueKind,
    pub file: Arc<str>,
    pub line: u32,
    pub args: Vec<String>,
}

impl IssueInstance {
    pub fn new(kind: IssueKind, file: impl Into<Arc<str>>, line: u32, args: Vec<String>) -> Self {
        Self {
            kind,
            file: file.into(),
            line,
            args,
        }
    }

    /// The message with its template arguments substituted.
    pub fn message(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        format_message(self.kind.template(), &args)
    }
}

impl fmt::Display for IssueInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} {}",
            self.file,
            self.line,
            self.kind.name(),
            self.message()
        )
    }
}

/// Replace `{0}`, `{1}`, ... in `message` with `args`.
pub fn format_message(message: &str, args: &[&str]) -> String {
    let mut result = message.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// Accumulates issues raised while analyzing.
///
/// Exact duplicates (same kind, file, line and arguments) are dropped so that
/// re-walking a loop body does not double-report.
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<IssueInstance>,
    seen: rustc_hash::FxHashSet<IssueInstance>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, issue: IssueInstance) {
        if self.seen.insert(issue.clone()) {
            tracing::trace!(kind = issue.kind.name(), line = issue.line, "issue emitted");
            self.issues.push(issue);
        }
    }

    pub fn emit_kind(
        &mut self,
        kind: IssueKind,
        file: impl Into<Arc<str>>,
        line: u32,
        args: Vec<String>,
    ) {
        self.emit(IssueInstance::new(kind, file, line, args));
    }

    pub fn issues(&self) -> &[IssueInstance] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_kind(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }

    pub fn count_kind(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind == kind).count()
    }

    /// Drop every issue raised for `file` (used before re-analysing it).
    pub fn clear_file(&mut self, file: &str) {
        self.issues.retain(|issue| &*issue.file != file);
        self.seen.retain(|issue| &*issue.file != file);
    }

    /// Move all accumulated issues out, leaving the collector empty.
    pub fn take(&mut self) -> Vec<IssueInstance> {
        self.seen.clear();
        std::mem::take(&mut self.issues)
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = IssueInstance>) {
        for issue in issues {
            self.emit(issue);
        }
    }
}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod tests;
