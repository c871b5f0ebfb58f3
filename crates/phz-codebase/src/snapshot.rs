//! Bulk export and import of the symbol table.
//!
//! A persistence layer can store a [`CodeBaseSnapshot`] (any serde format)
//! and import it on the next run instead of declaring unchanged files again.
//! Imported files count as loaded.

use crate::codebase::{CodeBase, Declaration};
use crate::decls::{ClassDecl, ConstantDecl, FunctionDecl, MethodDecl, PropertyDecl};
use crate::error::CodeBaseError;
use phz_solver::{Qsn, SymbolKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Every record of a [`CodeBase`] (or of some of its files), sorted by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeBaseSnapshot {
    pub files: Vec<Arc<str>>,
    pub classes: Vec<ClassDecl>,
    pub functions: Vec<FunctionDecl>,
    pub methods: Vec<MethodDecl>,
    pub properties: Vec<PropertyDecl>,
    pub constants: Vec<ConstantDecl>,
}

impl CodeBaseSnapshot {
    /// Number of declaration records.
    pub fn len(&self) -> usize {
        self.classes.len()
            + self.functions.len()
            + self.methods.len()
            + self.properties.len()
            + self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn qsns(&self) -> impl Iterator<Item = &Qsn> + '_ {
        self.classes
            .iter()
            .map(Declaration::qsn)
            .chain(self.functions.iter().map(Declaration::qsn))
            .chain(self.methods.iter().map(Declaration::qsn))
            .chain(self.properties.iter().map(Declaration::qsn))
            .chain(self.constants.iter().map(Declaration::qsn))
    }

    fn sort(&mut self) {
        self.classes.sort_by(|a, b| a.qsn.cmp(&b.qsn));
        self.functions.sort_by(|a, b| a.qsn.cmp(&b.qsn));
        self.methods.sort_by(|a, b| a.qsn.cmp(&b.qsn));
        self.properties.sort_by(|a, b| a.qsn.cmp(&b.qsn));
        self.constants.sort_by(|a, b| a.qsn.cmp(&b.qsn));
    }
}

impl CodeBase {
    pub fn export_snapshot(&self) -> CodeBaseSnapshot {
        let mut snapshot = CodeBaseSnapshot {
            files: self.loaded_files().cloned().collect(),
            classes: self.classes().cloned().collect(),
            functions: self.functions().cloned().collect(),
            methods: self.methods().cloned().collect(),
            properties: self.properties().cloned().collect(),
            constants: self.constants().cloned().collect(),
        };
        snapshot.files.sort();
        snapshot.sort();
        snapshot
    }

    /// The records declared by `file` alone.
    pub fn export_file_snapshot(&self, file: &str) -> CodeBaseSnapshot {
        let mut snapshot = CodeBaseSnapshot::default();
        if !self.is_file_loaded(file) {
            return snapshot;
        }
        snapshot.files.push(Arc::from(file));
        for qsn in self.declared_in_file(file) {
            match qsn.kind() {
                SymbolKind::Class => snapshot.classes.extend(self.get_class(qsn).ok().cloned()),
                SymbolKind::Function => {
                    snapshot.functions.extend(self.get_function(qsn).ok().cloned())
                }
                SymbolKind::Method => snapshot.methods.extend(self.get_method(qsn).ok().cloned()),
                SymbolKind::Property => {
                    snapshot.properties.extend(self.get_property(qsn).ok().cloned())
                }
                SymbolKind::GlobalConstant | SymbolKind::ClassConstant => {
                    snapshot.constants.extend(self.get_constant(qsn).ok().cloned())
                }
            }
        }
        snapshot.sort();
        snapshot
    }

    /// Add every record of `snapshot`. Nothing is added when any of its names
    /// is already declared. Returns the number of records added.
    pub fn import_snapshot(&mut self, snapshot: CodeBaseSnapshot) -> Result<usize, CodeBaseError> {
        if let Some(taken) = snapshot.qsns().find(|qsn| self.has_symbol(qsn)) {
            return Err(CodeBaseError::AlreadyDeclared {
                kind: taken.kind(),
                qsn: taken.clone(),
            });
        }
        let count = snapshot.len();
        for file in &snapshot.files {
            self.begin_file(file);
        }
        for decl in snapshot.classes {
            self.add_class(decl)?;
        }
        for decl in snapshot.functions {
            self.add_function(decl)?;
        }
        for decl in snapshot.methods {
            self.add_method(decl)?;
        }
        for decl in snapshot.properties {
            self.add_property(decl)?;
        }
        for decl in snapshot.constants {
            self.add_constant(decl)?;
        }
        debug!(records = count, files = snapshot.files.len(), "imported snapshot");
        Ok(count)
    }
}

#[cfg(test)]
#[path = "../tests/snapshot_tests.rs"]
mod tests;
