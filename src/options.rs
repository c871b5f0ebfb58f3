//! Analyzer options, loaded from a JSON config file.

use anyhow::{Context, Result};
use phz_checker::WalkOptions;
use phz_common::limits;
use phz_solver::Soundness;
use serde::{Deserialize, Serialize};

/// Options for an [`Analyzer`](crate::Analyzer) run.
///
/// Field names are camelCase on the wire; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerOptions {
    /// Ancestor levels followed when expanding a class type.
    pub max_expansion_depth: u32,
    /// Require every member of an assigned or passed type to fit the
    /// declared type, instead of any one member.
    pub strict_casts: bool,
    pub report_possibly_undefined: bool,
    /// Statement and expression nesting allowed before a file is abandoned.
    pub max_walk_depth: u32,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            max_expansion_depth: limits::MAX_TYPE_EXPANSION_DEPTH,
            strict_casts: false,
            report_possibly_undefined: true,
            max_walk_depth: limits::MAX_WALK_DEPTH,
        }
    }
}

impl AnalyzerOptions {
    pub fn from_json_str(source: &str) -> Result<Self> {
        let options: AnalyzerOptions =
            serde_json::from_str(source).context("failed to parse analyzer options JSON")?;
        if options.max_walk_depth == 0 {
            anyhow::bail!("maxWalkDepth must be at least 1");
        }
        Ok(options)
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            soundness: if self.strict_casts {
                Soundness::Strict
            } else {
                Soundness::Lenient
            },
            report_possibly_undefined: self.report_possibly_undefined,
            max_depth: self.max_walk_depth,
        }
    }
}
