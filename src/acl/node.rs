//! ACL nodes
//!
//! An [`AclNode`] is one named ACL declaration. The behaviour that differs
//! between ACL types (grammar, predicate, dump format) lives behind
//! [`AclType`]; everything shared (identity, flags, precondition checks,
//! result caching, debug output) lives in the node. Evaluation always goes
//! through [`AclNode::matches`], which is the only caller of
//! [`AclType::match_checklist`].

use super::cache::{MatchCache, DEFAULT_MAX_ENTRIES};
use super::flags::{Flag, FlagSet};
use crate::checklist::{AsyncStep, Checklist};
use crate::error::{AclError, Result};
use crate::parser::{quote_token, ConfigParser};
use std::fmt;
use tracing::{debug, trace};

/// Size of the ACL name buffer; names hold at most `ACL_NAME_SZ - 1` bytes
pub const ACL_NAME_SZ: usize = 64;

/// Outcome of evaluating one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchResult {
    NoMatch,
    Match,
    /// Could not be decided now; the checklist may have been asked to go async
    Unknown,
}

impl MatchResult {
    /// `1` for a match, `0` for no match, `-1` when unknown
    pub fn as_i32(self) -> i32 {
        match self {
            MatchResult::NoMatch => 0,
            MatchResult::Match => 1,
            MatchResult::Unknown => -1,
        }
    }

    pub fn is_match(self) -> bool {
        self == MatchResult::Match
    }
}

impl From<bool> for MatchResult {
    fn from(matched: bool) -> Self {
        if matched {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }
}

/// Lifecycle of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclState {
    Unconfigured,
    Parsed,
    Prepared,
    InUse,
}

/// Behaviour of one ACL type
///
/// Implementations hold only their parsed values. They must not change
/// while matching: one node is evaluated by many transactions at once.
pub trait AclType: Send + Sync + fmt::Debug + AclTypeClone {
    /// Name used in `acl <name> <type>` declarations
    fn type_string(&self) -> &'static str;

    /// Flags this type accepts
    fn supported_flags(&self) -> &'static [Flag] {
        &[]
    }

    /// A fresh, unparsed instance of the same type
    fn clone_unconfigured(&self) -> Box<dyn AclType>;

    /// Parse the values following the flags; may be called again to append
    fn parse(&mut self, flags: &FlagSet, parser: &mut ConfigParser) -> Result<()>;

    /// Values in configuration syntax, without name, type or flags
    fn dump(&self) -> Vec<String>;

    /// True when the ACL has nothing to match against
    fn is_empty(&self) -> bool;

    /// Consistency check after the whole declaration was parsed
    fn valid(&self) -> bool {
        true
    }

    /// Called once after all configuration is loaded
    fn prepare_for_use(&mut self) {}

    fn is_proxy_auth(&self) -> bool {
        false
    }

    /// Whether matching needs an access-log entry
    fn requires_ale(&self) -> bool {
        false
    }

    /// Whether matching needs the request
    fn requires_request(&self) -> bool {
        false
    }

    /// Whether matching needs the reply
    fn requires_reply(&self) -> bool {
        false
    }

    /// Whether results should be cached per subject
    fn uses_match_cache(&self) -> bool {
        false
    }

    /// Match the checklist against this ACL's values
    fn match_checklist(&self, flags: &FlagSet, checklist: &mut dyn Checklist) -> MatchResult;

    /// Evaluation used to fill the match cache
    fn match_for_cache(&self, flags: &FlagSet, checklist: &mut dyn Checklist) -> MatchResult {
        self.match_checklist(flags, checklist)
    }
}

/// Copying a configured type instance, used to stage appended declarations
pub trait AclTypeClone {
    fn clone_box(&self) -> Box<dyn AclType>;
}

impl<T> AclTypeClone for T
where
    T: AclType + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn AclType> {
        Box::new(self.clone())
    }
}

/// A named, configured ACL
#[derive(Debug)]
pub struct AclNode {
    name: String,
    cfgline: String,
    flags: FlagSet,
    state: AclState,
    registered: bool,
    match_cache: Option<MatchCache>,
    kind: Box<dyn AclType>,
}

impl AclNode {
    /// Wrap an unparsed type instance
    pub fn new(kind: Box<dyn AclType>) -> Self {
        let match_cache = kind
            .uses_match_cache()
            .then(|| MatchCache::new(DEFAULT_MAX_ENTRIES));
        Self {
            name: String::new(),
            cfgline: String::new(),
            flags: FlagSet::new(kind.supported_flags()),
            state: AclState::Unconfigured,
            registered: false,
            match_cache,
            kind,
        }
    }

    /// An unconfigured node of the same type
    pub fn clone_unconfigured(&self) -> AclNode {
        AclNode::new(self.kind.clone_unconfigured())
    }

    /// Record the ACL name and the configuration line it came from
    pub fn context(&mut self, name: &str, configuration: &str) -> Result<()> {
        if !self.name.is_empty() {
            return Err(AclError::AlreadyNamed(self.name.clone()));
        }
        validate_name(name)?;
        self.name = name.to_string();
        self.cfgline = configuration.to_string();
        Ok(())
    }

    /// Parse flags then type-specific values from `parser`
    ///
    /// Parsing works on a copy of the flags and values; on error the node
    /// keeps what it had before the call.
    pub fn parse(&mut self, parser: &mut ConfigParser) -> Result<()> {
        self.parse_staged(parser, false)
    }

    /// Parse a redeclaration that appends to this node
    ///
    /// Like [`AclNode::parse`], and the result must also pass
    /// [`AclType::valid`] before it replaces the current values.
    pub fn append(&mut self, parser: &mut ConfigParser) -> Result<()> {
        self.parse_staged(parser, true)
    }

    fn parse_staged(&mut self, parser: &mut ConfigParser, require_valid: bool) -> Result<()> {
        let mut flags = self.flags.clone();
        let mut kind = self.kind.clone_box();

        flags.parse_flags(parser)?;
        kind.parse(&flags, parser)?;
        if require_valid && !kind.valid() {
            return Err(AclError::InvalidAcl(self.name.clone()));
        }

        self.flags = flags;
        self.kind = kind;
        self.state = AclState::Parsed;
        self.clear_match_cache();
        trace!(acl = %self.name, acl_type = self.type_string(), "Parsed ACL");
        Ok(())
    }

    /// Run the type's post-load hook
    pub fn prepare_for_use(&mut self) {
        self.kind.prepare_for_use();
        if self.state == AclState::Parsed {
            self.state = AclState::Prepared;
        }
    }

    /// Mark the node as part of the active configuration
    pub fn mark_in_use(&mut self) {
        self.state = AclState::InUse;
    }

    /// Evaluate the checklist against this ACL
    ///
    /// Returns true only for a successful match. When the checklist lacks
    /// context the type needs, the checklist is asked to fetch it and the
    /// node reports no match for now.
    pub fn matches(&self, checklist: &mut dyn Checklist) -> bool {
        debug!(acl = %self.name, "checking ACL");

        let result = match self.missing_context(checklist) {
            Some(step) => {
                debug!(
                    acl = %self.name,
                    missing = %step,
                    "ACL used in context without required state, deferring"
                );
                checklist.go_async(step);
                MatchResult::Unknown
            }
            None => match &self.match_cache {
                Some(cache) => self.cache_match_acl(cache, checklist),
                None => self.kind.match_checklist(&self.flags, checklist),
            },
        };

        debug!(
            acl = %self.name,
            result = result.as_i32(),
            pending = ?checklist.async_in_progress(),
            "checked ACL"
        );
        result.is_match()
    }

    /// Look up the checklist subject in `cache`, evaluating on a miss
    ///
    /// Checklists without a subject are evaluated without caching. Unknown
    /// results are never stored.
    pub fn cache_match_acl(&self, cache: &MatchCache, checklist: &mut dyn Checklist) -> MatchResult {
        let subject = match checklist.cache_subject() {
            Some(subject) => subject.to_string(),
            None => return self.kind.match_for_cache(&self.flags, checklist),
        };

        if let Some(result) = cache.lookup(&subject) {
            debug!(acl = %self.name, subject = %subject, "match cache hit");
            return result;
        }

        let result = self.kind.match_for_cache(&self.flags, checklist);
        if result != MatchResult::Unknown {
            let stored = cache.insert(&subject, result);
            debug!(
                acl = %self.name,
                subject = %subject,
                result = result.as_i32(),
                stored,
                "match cache miss"
            );
        }
        result
    }

    fn missing_context(&self, checklist: &dyn Checklist) -> Option<AsyncStep> {
        if self.kind.requires_ale() && !checklist.has_ale() {
            Some(AsyncStep::FetchAle)
        } else if self.kind.requires_request() && !checklist.has_request() {
            Some(AsyncStep::FetchRequest)
        } else if self.kind.requires_reply() && !checklist.has_reply() {
            Some(AsyncStep::FetchReply)
        } else {
            None
        }
    }

    /// The declaration in configuration syntax
    pub fn dump(&self) -> Vec<String> {
        let mut line = format!("acl {} {}", self.name, self.type_string());

        let flags = self.flags.flags_str();
        if !flags.is_empty() {
            line.push(' ');
            line.push_str(&flags);
        }

        let values = self.kind.dump();
        if values.first().is_some_and(|v| v.starts_with('-')) {
            line.push_str(" --");
        }
        for value in &values {
            line.push(' ');
            line.push_str(&quote_token(value));
        }

        vec![line]
    }

    /// Replace the match cache with one sized by configuration
    ///
    /// Has no effect on types that do not cache.
    pub fn configure_match_cache(&mut self, enabled: bool, max_entries: usize) {
        self.match_cache = (enabled && self.kind.uses_match_cache())
            .then(|| MatchCache::new(max_entries));
    }

    pub fn clear_match_cache(&self) {
        if let Some(cache) = &self.match_cache {
            cache.clear();
        }
    }

    pub fn match_cache(&self) -> Option<&MatchCache> {
        self.match_cache.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cfgline(&self) -> &str {
        &self.cfgline
    }

    pub fn type_string(&self) -> &'static str {
        self.kind.type_string()
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn state(&self) -> AclState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
    }

    pub fn valid(&self) -> bool {
        self.kind.valid()
    }

    pub fn is_proxy_auth(&self) -> bool {
        self.kind.is_proxy_auth()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn set_registered(&mut self) {
        self.registered = true;
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.len() >= ACL_NAME_SZ {
        return Err(AclError::NameTooLong {
            name: name.to_string(),
            max: ACL_NAME_SZ - 1,
        });
    }
    if name.is_empty() || name.starts_with('-') || name.starts_with('!') {
        return Err(AclError::InvalidName(name.to_string()));
    }
    Ok(())
}
