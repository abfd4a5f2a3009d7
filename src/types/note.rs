//! `note` ACL type: transaction annotations
//!
//! ```text
//! acl aclname note [-m[=delimiters]] [-s] name [value ...]
//! ```
//!
//! Without values the ACL matches when the annotation exists. With `-m` the
//! annotation is split on the delimiters (`,` by default) and any piece may
//! match; adding `-s` requires every piece to match.

use crate::acl::{AclType, Flag, FlagSet, MatchResult, FLAG_STRICT, FLAG_SUBSTRING};
use crate::checklist::Checklist;
use crate::error::{AclError, Result};
use crate::parser::ConfigParser;

const TYPE_NAME: &str = "note";

#[derive(Debug, Clone, Default)]
pub struct NoteAcl {
    name: Option<String>,
    values: Vec<String>,
}

impl NoteAcl {
    pub fn new() -> Self {
        Self::default()
    }

    fn value_matches(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

impl AclType for NoteAcl {
    fn type_string(&self) -> &'static str {
        TYPE_NAME
    }

    fn supported_flags(&self) -> &'static [Flag] {
        &[FLAG_SUBSTRING, FLAG_STRICT]
    }

    fn clone_unconfigured(&self) -> Box<dyn AclType> {
        Box::new(Self::new())
    }

    fn parse(&mut self, _flags: &FlagSet, parser: &mut ConfigParser) -> Result<()> {
        let name = parser
            .next_token()
            .ok_or(AclError::MissingToken("annotation name"))?;

        match &self.name {
            Some(existing) if *existing != name => {
                return Err(AclError::InvalidValue {
                    acl_type: TYPE_NAME,
                    value: name,
                    reason: format!("ACL already matches annotation '{}'", existing),
                });
            }
            Some(_) => {}
            None => self.name = Some(name),
        }

        self.values.extend(parser.remaining());
        Ok(())
    }

    fn dump(&self) -> Vec<String> {
        self.name
            .iter()
            .cloned()
            .chain(self.values.iter().cloned())
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.name.is_none()
    }

    fn match_checklist(&self, flags: &FlagSet, checklist: &mut dyn Checklist) -> MatchResult {
        let name = match &self.name {
            Some(name) => name,
            None => return MatchResult::NoMatch,
        };
        let note = match checklist.note(name) {
            Some(note) => note,
            None => return MatchResult::NoMatch,
        };

        if self.values.is_empty() {
            return MatchResult::Match;
        }

        match flags.delimiters() {
            Some(delimiters) => {
                let mut pieces = delimiters.split(note).peekable();
                if pieces.peek().is_none() {
                    return MatchResult::NoMatch;
                }
                if flags.is_set(FLAG_STRICT) {
                    pieces.all(|piece| self.value_matches(piece)).into()
                } else {
                    pieces.any(|piece| self.value_matches(piece)).into()
                }
            }
            None => self.value_matches(note).into(),
        }
    }
}
