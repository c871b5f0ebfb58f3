//! The analysis position: file, line, namespace and scope.

use crate::error::CheckResult;
use crate::scope::{Scope, Variable};
use phz_codebase::CodeBase;
use phz_common::{IssueInstance, IssueKind};
use phz_solver::{NameError, NamespaceMap, Qsn, SymbolKind};
use std::fmt;
use std::sync::Arc;

/// Where the walker is and what it can see there.
///
/// A `Context` is an immutable value; every `with_*` returns a new one.
#[derive(Clone, Debug)]
pub struct Context {
    scope: Scope,
    file: Arc<str>,
    line: u32,
    namespace_map: Arc<NamespaceMap>,
    class: Option<Qsn>,
    function: Option<Qsn>,
}

impl Context {
    pub fn new(file: impl Into<Arc<str>>, scope: Scope) -> Context {
        Context {
            class: scope.lexical_class().cloned(),
            function: scope.function_qsn().cloned(),
            scope,
            file: file.into(),
            line: 0,
            namespace_map: Arc::new(NamespaceMap::new()),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn namespace_map(&self) -> &NamespaceMap {
        &self.namespace_map
    }

    /// The class whose body contains the current position.
    pub fn class(&self) -> Option<&Qsn> {
        self.class.as_ref()
    }

    /// The function or method whose body contains the current position.
    pub fn function(&self) -> Option<&Qsn> {
        self.function.as_ref()
    }

    pub fn with_scope(&self, scope: Scope) -> Context {
        Context {
            scope,
            ..self.clone()
        }
    }

    pub fn with_line(&self, line: u32) -> Context {
        Context {
            line,
            ..self.clone()
        }
    }

    pub fn with_namespace_map(&self, namespace_map: NamespaceMap) -> Context {
        Context {
            namespace_map: Arc::new(namespace_map),
            ..self.clone()
        }
    }

    pub fn with_class(&self, class: Option<Qsn>) -> Context {
        Context {
            class,
            ..self.clone()
        }
    }

    pub fn with_function(&self, function: Option<Qsn>) -> Context {
        Context {
            function,
            ..self.clone()
        }
    }

    pub fn with_variable(&self, variable: Variable) -> Context {
        self.with_scope(self.scope.with_variable(variable))
    }

    pub fn get_variable(&self, name: &str) -> Option<Variable> {
        self.scope.get_variable(name)
    }

    pub fn is_in_class_scope(&self) -> bool {
        self.class.is_some() || self.scope.is_in_class_scope()
    }

    /// The class `self` and `static` refer to here.
    fn self_class(&self) -> Option<&Qsn> {
        self.scope.bound_class().or(self.class.as_ref()).or(self.scope.class_qsn())
    }

    // -------------------------------------------------------------------------
    // Name resolution
    // -------------------------------------------------------------------------

    /// Resolve a class name as written at this position, including `self`,
    /// `static` and `parent`.
    pub fn resolve_class_name(&self, text: &str, codebase: &CodeBase) -> CheckResult<Qsn> {
        let word = text.trim();
        if word.eq_ignore_ascii_case("self") || word.eq_ignore_ascii_case("static") {
            return self
                .self_class()
                .cloned()
                .ok_or_else(|| malformed(word, "used outside a class").into());
        }
        if word.eq_ignore_ascii_case("parent") {
            let Some(class) = self.self_class() else {
                return Err(malformed(word, "used outside a class").into());
            };
            let decl = codebase.get_class(class)?;
            return decl
                .parent
                .clone()
                .ok_or_else(|| malformed(word, "class has no parent").into());
        }
        self.resolve_qsn(SymbolKind::Class, word)
    }

    /// Resolve a non-member name against the namespace and imports.
    pub fn resolve_qsn(&self, kind: SymbolKind, text: &str) -> CheckResult<Qsn> {
        Ok(Qsn::from_string_in_context(kind, text, &self.namespace_map)?)
    }

    /// Resolve a function or constant name, falling back to the root
    /// namespace for an unqualified name that is not declared in the
    /// current one. A name whose first declaration is gone resolves to its
    /// lowest surviving alternate.
    pub fn resolve_global_fallback(
        &self,
        kind: SymbolKind,
        text: &str,
        codebase: &CodeBase,
    ) -> CheckResult<Qsn> {
        let qsn = self.resolve_qsn(kind, text)?;
        if let Some(declared) = codebase.resolve_alternate(&qsn) {
            return Ok(declared);
        }
        let word = text.trim();
        if word.contains('\\') {
            return Ok(qsn);
        }
        let global = Qsn::from_fully_qualified_string(kind, word)?;
        Ok(codebase.resolve_alternate(&global).unwrap_or(qsn))
    }

    /// An issue of `kind` at this position.
    pub fn issue(&self, kind: IssueKind, args: Vec<String>) -> IssueInstance {
        IssueInstance::new(kind, self.file.clone(), self.line, args)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

fn malformed(text: &str, reason: &'static str) -> NameError {
    NameError::Malformed {
        text: text.to_string(),
        reason,
    }
}

#[cfg(test)]
#[path = "../tests/context_tests.rs"]
mod tests;
