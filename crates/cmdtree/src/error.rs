//! Error types.
//!
//! Validation outcomes (`ValidationError`) are values carried by
//! [`Outcome::Invalid`](crate::Outcome::Invalid); they never travel as `Err`.
//! `ClaimError` and `DefinitionError` report misuse of the claim table and of
//! the construction pass respectively.

use thiserror::Error;

/// Why a command line did not validate.
///
/// The `Display` text is the diagnostic line printed before usage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A parser declaring commands got no token, or a token that names none of them.
    #[error("missing command")]
    MissingCommand,

    /// A mandatory flag of the failing level was never claimed.
    #[error("missing mandatory flag [{flag}]")]
    MissingMandatoryFlag { flag: String },

    /// A mandatory parameter (or parameter array) received no token.
    #[error("missing required parameter [{name}]")]
    MissingMandatoryParameter { name: String },
}

/// Claim-table misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("argument {index} ('{text}') is already claimed by another item")]
    AlreadyClaimed { index: usize, text: String },

    #[error("no argument at position {0}")]
    OutOfRange(usize),

    #[error("item {0} is not part of this command line")]
    UnknownItem(usize),
}

/// A declaration that breaks the parser tree invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("flag '{description}' has neither a short nor a long name")]
    UnnamedFlag { description: String },

    #[error("command name cannot be empty")]
    EmptyCommandName,

    #[error("command '{0}' is declared twice at the same level")]
    DuplicateCommand(String),

    #[error("parameter array '{second}' declared after '{first}'; only one is allowed per parser")]
    DuplicateParameterArray { first: String, second: String },
}

pub type Result<T, E = ClaimError> = std::result::Result<T, E>;
