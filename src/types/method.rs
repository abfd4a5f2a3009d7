//! `method` ACL type: request method

use crate::acl::{AclType, Flag, FlagSet, MatchResult, FLAG_CASE_INSENSITIVE};
use crate::checklist::Checklist;
use crate::error::{AclError, Result};
use crate::parser::ConfigParser;

const TYPE_NAME: &str = "method";

#[derive(Debug, Clone, Default)]
pub struct MethodAcl {
    methods: Vec<String>,
    case_insensitive: bool,
}

impl MethodAcl {
    pub fn new() -> Self {
        Self::default()
    }
}

/// RFC 9110 token characters
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

impl AclType for MethodAcl {
    fn type_string(&self) -> &'static str {
        TYPE_NAME
    }

    fn supported_flags(&self) -> &'static [Flag] {
        &[FLAG_CASE_INSENSITIVE]
    }

    fn clone_unconfigured(&self) -> Box<dyn AclType> {
        Box::new(Self::new())
    }

    fn parse(&mut self, flags: &FlagSet, parser: &mut ConfigParser) -> Result<()> {
        self.case_insensitive = flags.is_set(FLAG_CASE_INSENSITIVE);
        while let Some(method) = parser.next_token() {
            if !method.chars().all(is_token_char) {
                return Err(AclError::InvalidValue {
                    acl_type: TYPE_NAME,
                    value: method,
                    reason: "not a valid method token".to_string(),
                });
            }
            if !self.methods.contains(&method) {
                self.methods.push(method);
            }
        }
        Ok(())
    }

    fn dump(&self) -> Vec<String> {
        self.methods.clone()
    }

    fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn requires_request(&self) -> bool {
        true
    }

    fn match_checklist(&self, _flags: &FlagSet, checklist: &mut dyn Checklist) -> MatchResult {
        let method = match checklist.method() {
            Some(method) => method,
            None => return MatchResult::NoMatch,
        };
        self.methods
            .iter()
            .any(|m| {
                if self.case_insensitive {
                    m.eq_ignore_ascii_case(method)
                } else {
                    m == method
                }
            })
            .into()
    }
}
