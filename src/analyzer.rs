//! The analysis driver.
//!
//! An [`Analyzer`] owns the symbol table, the shared global state and the
//! issues of one run. Files go through two phases:
//!
//! 1. [`Analyzer::add_file`] declares every symbol of the file.
//! 2. [`Analyzer::analyze_file`] / [`Analyzer::analyze_all`] walk the
//!    statements once all files are declared, so that forward references
//!    across files resolve.
//!
//! [`Analyzer::reanalyze_file`] replaces a file in place: its declarations
//! are dropped and collected again from the new tree, which moves the
//! symbol table generation and so invalidates expanded-type caches.

use crate::options::AnalyzerOptions;
use anyhow::{Context as _, Result, bail};
use indexmap::IndexMap;
use phz_ast::{NodeArena, NodeIndex};
use phz_checker::{AnalysisPlugin, Context, GlobalState, PluginSet, StatementWalker};
use phz_codebase::{CodeBase, CodeBaseSnapshot, DeclarationCollector};
use phz_common::{IssueCollector, IssueInstance};
use phz_solver::Qsn;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A file's syntax tree, kept between the declaration and analysis phases.
struct SourceFile {
    arena: NodeArena,
    root: NodeIndex,
}

/// Counts from [`Analyzer::analyze_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub analyzed: usize,
    pub abandoned: usize,
}

pub struct Analyzer {
    options: AnalyzerOptions,
    codebase: CodeBase,
    plugins: PluginSet,
    globals: Arc<GlobalState>,
    files: IndexMap<Arc<str>, SourceFile, FxBuildHasher>,
    /// Issues raised while declaring (redeclarations, malformed names).
    declaration_issues: IssueCollector,
    /// Issues raised while walking; replaced per file on every walk.
    analysis_issues: IssueCollector,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        let mut codebase = CodeBase::new();
        codebase.set_expansion_depth_limit(options.max_expansion_depth);
        Analyzer {
            options,
            codebase,
            plugins: PluginSet::new(),
            globals: GlobalState::new(),
            files: IndexMap::default(),
            declaration_issues: IssueCollector::new(),
            analysis_issues: IssueCollector::new(),
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn codebase(&self) -> &CodeBase {
        &self.codebase
    }

    pub fn globals(&self) -> &Arc<GlobalState> {
        &self.globals
    }

    pub fn register_plugin(&mut self, plugin: impl AnalysisPlugin + 'static) {
        self.plugins.register(Box::new(plugin));
    }

    /// Paths in the order they were added.
    pub fn files(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.keys().map(|path| &**path)
    }

    /// Every issue of the run: declaration issues first, then analysis
    /// issues in walk order.
    pub fn issues(&self) -> impl Iterator<Item = &IssueInstance> + '_ {
        self.declaration_issues
            .issues()
            .iter()
            .chain(self.analysis_issues.issues())
    }

    pub fn issue_count(&self) -> usize {
        self.declaration_issues.len() + self.analysis_issues.len()
    }

    /// Declaration phase for one file. Returns the number of symbols
    /// declared.
    ///
    /// A file whose declarations are already loaded (for example from a
    /// snapshot) keeps them; only its tree is recorded for analysis.
    pub fn add_file(&mut self, path: &str, arena: NodeArena, root: NodeIndex) -> usize {
        let declared = if self.codebase.is_file_loaded(path) {
            debug!(file = path, "declarations already loaded");
            0
        } else {
            DeclarationCollector::new(&mut self.codebase, &arena, path, &mut self.declaration_issues)
                .collect(root)
                .len()
        };
        self.files.insert(Arc::from(path), SourceFile { arena, root });
        declared
    }

    /// Analysis phase for one added file. Returns the context at the end of
    /// the file, or `None` when the file was abandoned (an `AnalysisAborted`
    /// issue is recorded in that case).
    pub fn analyze_file(&mut self, path: &str) -> Result<Option<Context>> {
        let Some(source) = self.files.get(path) else {
            bail!("file `{path}` was never added");
        };
        self.analysis_issues.clear_file(path);

        let result = StatementWalker::with_options(
            &self.codebase,
            &source.arena,
            &self.plugins,
            &mut self.analysis_issues,
            self.options.walk_options(),
        )
        .walk_file(source.root, path, Arc::clone(&self.globals));

        match result {
            Ok(ctx) => Ok(Some(ctx)),
            Err(err) => {
                warn!(file = path, error = %err, "analysis abandoned, continuing with next file");
                Ok(None)
            }
        }
    }

    /// Analyze every added file, in the order they were added.
    #[tracing::instrument(level = "info", skip_all, fields(files = self.files.len()))]
    pub fn analyze_all(&mut self) -> RunSummary {
        let paths: Vec<Arc<str>> = self.files.keys().cloned().collect();
        let mut summary = RunSummary::default();
        for path in paths {
            match self.analyze_file(&path) {
                Ok(Some(_)) => summary.analyzed += 1,
                Ok(None) => summary.abandoned += 1,
                Err(err) => warn!(file = %path, error = %err, "file skipped"),
            }
        }
        info!(
            analyzed = summary.analyzed,
            abandoned = summary.abandoned,
            issues = self.issue_count(),
            "analysis finished"
        );
        summary
    }

    /// Replace `path` with a new tree: drop its declarations and issues,
    /// declare it again and walk it.
    ///
    /// Other files are not walked again; callers that track dependents
    /// analyze those afterwards.
    pub fn reanalyze_file(
        &mut self,
        path: &str,
        arena: NodeArena,
        root: NodeIndex,
    ) -> Result<Option<Context>> {
        let removed = self.codebase.remove_file(path);
        self.declaration_issues.clear_file(path);
        self.analysis_issues.clear_file(path);
        let declared = self.add_file(path, arena, root);
        debug!(
            file = path,
            removed,
            declared,
            generation = self.codebase.generation(),
            "redeclared file"
        );
        self.analyze_file(path)
    }

    /// Forget a file entirely.
    pub fn remove_file(&mut self, path: &str) -> bool {
        self.codebase.remove_file(path);
        self.declaration_issues.clear_file(path);
        self.analysis_issues.clear_file(path);
        self.files.shift_remove(path).is_some()
    }

    /// Start an independent run: clears the global variable state, the
    /// symbol table, the files and all issues. Options and plugins stay.
    /// Interned names that nothing refers to any more are released; names
    /// another live analyzer still uses are kept.
    pub fn reset(&mut self) {
        self.globals.clear();
        self.codebase.clear();
        self.files.clear();
        self.declaration_issues = IssueCollector::new();
        self.analysis_issues = IssueCollector::new();
        let released = Qsn::release_unused();
        info!(released, "analyzer reset");
    }

    /// Serialize the symbol table for a persistence layer.
    pub fn snapshot_json(&self) -> Result<String> {
        serde_json::to_string(&self.codebase.export_snapshot())
            .context("failed to serialize symbol table snapshot")
    }

    /// Load a snapshot produced by [`Analyzer::snapshot_json`]. Files in it
    /// count as declared, so [`Analyzer::add_file`] skips their declarations.
    pub fn load_snapshot_json(&mut self, json: &str) -> Result<usize> {
        let snapshot: CodeBaseSnapshot =
            serde_json::from_str(json).context("failed to parse symbol table snapshot")?;
        let files = snapshot.files.len();
        let records = self
            .codebase
            .import_snapshot(snapshot)
            .context("failed to import symbol table snapshot")?;
        debug!(records, files, "loaded snapshot");
        Ok(records)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::new(AnalyzerOptions::default())
    }
}
