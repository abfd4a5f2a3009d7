//! `proxy_auth` ACL type: authenticated user name
//!
//! ```text
//! acl aclname proxy_auth [-i] username ...
//! acl aclname proxy_auth REQUIRED
//! ```
//!
//! `REQUIRED` accepts any authenticated user. A transaction without
//! credentials cannot be decided; the checklist is asked to authenticate.
//! Verifying credentials is the expensive part, so results are kept in the
//! node's match cache per user.

use crate::acl::{AclType, Flag, FlagSet, MatchResult, FLAG_CASE_INSENSITIVE};
use crate::checklist::{AsyncStep, Checklist};
use crate::error::Result;
use crate::parser::ConfigParser;

const TYPE_NAME: &str = "proxy_auth";
const REQUIRED: &str = "REQUIRED";

#[derive(Debug, Clone, Default)]
pub struct ProxyAuthAcl {
    users: Vec<String>,
    required: bool,
    case_insensitive: bool,
}

impl ProxyAuthAcl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AclType for ProxyAuthAcl {
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
        while let Some(user) = parser.next_token() {
            if user == REQUIRED {
                self.required = true;
            } else {
                self.users.push(user);
            }
        }
        Ok(())
    }

    fn dump(&self) -> Vec<String> {
        if self.required {
            vec![REQUIRED.to_string()]
        } else {
            self.users.clone()
        }
    }

    fn is_empty(&self) -> bool {
        !self.required && self.users.is_empty()
    }

    /// `REQUIRED` cannot be combined with explicit user names
    fn valid(&self) -> bool {
        !(self.required && !self.users.is_empty())
    }

    fn is_proxy_auth(&self) -> bool {
        true
    }

    fn requires_request(&self) -> bool {
        true
    }

    fn uses_match_cache(&self) -> bool {
        true
    }

    fn match_checklist(&self, _flags: &FlagSet, checklist: &mut dyn Checklist) -> MatchResult {
        let user = match checklist.user() {
            Some(user) => user,
            None => {
                checklist.go_async(AsyncStep::Authenticate);
                return MatchResult::Unknown;
            }
        };

        if self.required {
            return MatchResult::Match;
        }
        self.users
            .iter()
            .any(|u| {
                if self.case_insensitive {
                    u.eq_ignore_ascii_case(user)
                } else {
                    u == user
                }
            })
            .into()
    }
}
