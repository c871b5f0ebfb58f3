use crate::qsn::Qsn;
use thiserror::Error;

/// A symbol name that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("malformed name '{text}': {reason}")]
    Malformed { text: String, reason: &'static str },
}

impl NameError {
    pub(crate) fn malformed(text: &str, reason: &'static str) -> Self {
        NameError::Malformed {
            text: text.to_string(),
            reason,
        }
    }
}

/// Failure while expanding a type over the class hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeError {
    /// The ancestor walk exceeded its depth or work budget.
    #[error("expansion of {class} exceeded the recursion limit of {limit}")]
    RecursionDepthExceeded { class: Qsn, limit: u32 },

    /// `class` reached itself through its own ancestors.
    #[error("inheritance cycle through {class}")]
    InheritanceCycle { class: Qsn },
}

impl TypeError {
    /// The class the expansion failed on.
    pub fn class(&self) -> &Qsn {
        match self {
            TypeError::RecursionDepthExceeded { class, .. }
            | TypeError::InheritanceCycle { class } => class,
        }
    }
}
