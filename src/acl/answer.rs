//! Access check answers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result code of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclMatchCode {
    Denied,
    Allowed,
    #[default]
    Dunno,
    /// Credentials are missing
    AuthRequired,
}

impl AclMatchCode {
    pub fn as_str(self) -> &'static str {
        match self {
            AclMatchCode::Denied => "DENIED",
            AclMatchCode::Allowed => "ALLOWED",
            AclMatchCode::Dunno => "DUNNO",
            AclMatchCode::AuthRequired => "AUTH_REQUIRED",
        }
    }

    /// `ALLOWED` for `DENIED` and the reverse; `DUNNO` for anything else
    pub fn opposite(self) -> Self {
        match self {
            AclMatchCode::Denied => AclMatchCode::Allowed,
            AclMatchCode::Allowed => AclMatchCode::Denied,
            _ => AclMatchCode::Dunno,
        }
    }
}

impl fmt::Display for AclMatchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to an access check
///
/// `kind` tells apart custom verbs that share a code. Comparing two answers
/// compares both fields; comparing an answer with a bare [`AclMatchCode`]
/// only looks at the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Answer {
    pub code: AclMatchCode,
    pub kind: i32,
}

impl Answer {
    pub fn new(code: AclMatchCode, kind: i32) -> Self {
        Self { code, kind }
    }

    pub fn allowed() -> Self {
        AclMatchCode::Allowed.into()
    }

    pub fn denied() -> Self {
        AclMatchCode::Denied.into()
    }

    pub fn dunno() -> Self {
        AclMatchCode::Dunno.into()
    }

    pub fn auth_required() -> Self {
        AclMatchCode::AuthRequired.into()
    }

    pub fn is_allowed(&self) -> bool {
        self.code == AclMatchCode::Allowed
    }

    pub fn is_denied(&self) -> bool {
        self.code == AclMatchCode::Denied
    }
}

impl From<AclMatchCode> for Answer {
    fn from(code: AclMatchCode) -> Self {
        Self { code, kind: 0 }
    }
}

impl From<Answer> for AclMatchCode {
    fn from(answer: Answer) -> Self {
        answer.code
    }
}

impl PartialEq<AclMatchCode> for Answer {
    fn eq(&self, code: &AclMatchCode) -> bool {
        self.code == *code
    }
}

impl PartialEq<Answer> for AclMatchCode {
    fn eq(&self, answer: &Answer) -> bool {
        *self == answer.code
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.code, f)
    }
}
