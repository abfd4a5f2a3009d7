//! Error types for ACL configuration and registration.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AclError>;

/// Errors raised while building the ACL configuration.
///
/// Every variant is fatal to the configuration load that produced it; none
/// of them is ever raised while evaluating a request.
#[derive(Error, Debug)]
pub enum AclError {
    /// Flag character outside the `A`..=`z` alphabet.
    #[error("invalid flag character '{0}'")]
    InvalidFlag(char),

    /// Flag is not supported by the ACL type being parsed.
    #[error("flag '-{flag}' is not supported")]
    UnsupportedFlag { flag: char },

    /// Flag needs a parameter but none was given.
    #[error("parameter required for flag '-{flag}'")]
    MissingFlagParameter { flag: char },

    /// Flag takes no parameter but one was given.
    #[error("flag '-{flag}' does not take a parameter (got '{value}')")]
    UnexpectedFlagParameter { flag: char, value: String },

    /// Parameter rejected by the flag's own constraints.
    #[error("parameter '{value}' for flag '-{flag}' is not supported")]
    InvalidFlagParameter { flag: char, value: String },

    /// A double quote was opened but never closed.
    #[error("unterminated quoted token")]
    UnterminatedQuote,

    /// A required token was missing from the configuration line.
    #[error("missing {0}")]
    MissingToken(&'static str),

    /// A type-specific value could not be parsed.
    #[error("invalid {acl_type} value '{value}': {reason}")]
    InvalidValue {
        acl_type: &'static str,
        value: String,
        reason: String,
    },

    /// ACL name exceeds the supported length.
    #[error("ACL name '{name}' too long, max {max} characters supported")]
    NameTooLong { name: String, max: usize },

    /// ACL name is empty or starts with a reserved character.
    #[error("invalid ACL name '{0}'")]
    InvalidName(String),

    /// `context()` was called on a node that already has an identity.
    #[error("ACL '{0}' already has a name")]
    AlreadyNamed(String),

    /// No prototype is registered under the requested type name.
    #[error("invalid ACL type '{0}'")]
    UnknownType(String),

    /// A second prototype was registered under an existing type name.
    #[error("ACL type '{0}' is already registered")]
    DuplicateType(String),

    /// The process-wide registry was installed twice.
    #[error("ACL registry is already installed")]
    RegistryInstalled,

    /// An ACL was redeclared with a different type.
    #[error("ACL '{name}' already exists with type '{existing}', cannot redeclare as '{requested}'")]
    TypeMismatch {
        name: String,
        existing: String,
        requested: String,
    },

    /// Post-parse sanity check failed.
    #[error("invalid ACL '{0}'")]
    InvalidAcl(String),

    /// Access rule refers to an ACL that was never declared.
    #[error("unknown ACL '{0}' in access rule")]
    UnknownAcl(String),

    /// A custom access verb reuses a name that is already mapped.
    #[error("access verb '{0}' is already defined")]
    DuplicateVerb(String),

    /// Access rule uses an action verb with no mapping.
    #[error("unknown access verb '{0}'")]
    UnknownVerb(String),

    /// An ACL file could not be read.
    #[error("failed to read ACL file '{}'", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any of the above, tagged with the configuration text that caused it.
    #[error("{}: {} in '{}'", location(.line_no), .source, .line)]
    Config {
        line: String,
        line_no: Option<usize>,
        #[source]
        source: Box<AclError>,
    },
}

fn location(line_no: &Option<usize>) -> String {
    match line_no {
        Some(n) => format!("line {}", n),
        None => "configuration".to_string(),
    }
}

impl AclError {
    /// Attach the original configuration line to this error.
    ///
    /// Errors that already carry a line keep it, so wrapping is idempotent.
    pub fn in_line(self, line: &str, line_no: Option<usize>) -> Self {
        match self {
            AclError::Config { .. } => self,
            other => AclError::Config {
                line: line.to_string(),
                line_no,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping any configuration-line wrapper.
    pub fn root(&self) -> &AclError {
        match self {
            AclError::Config { source, .. } => source.root(),
            other => other,
        }
    }
}
