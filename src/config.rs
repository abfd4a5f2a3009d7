//! Configuration types for the ACL engine
//!
//! Provides JSON-serializable configuration for ACL declarations, access
//! rules, custom access verbs and match caching. Declarations and rules are
//! kept in proxy configuration syntax and parsed by the engine.

use crate::acl::{AclMatchCode, DEFAULT_MAX_ENTRIES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ACL Engine Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AclEngineConfig {
    /// Files with one `acl` declaration per line, read first
    pub acl_files: Vec<PathBuf>,

    /// Inline `acl <name> <type> [flags] values...` declarations
    pub acls: Vec<String>,

    /// Access rules (`allow|deny acl [!acl]...`), first match wins
    pub access: Vec<String>,

    /// Extra action verbs usable in access rules
    pub verbs: Vec<AccessVerb>,

    /// Per-ACL match result caching
    pub match_cache: MatchCacheConfig,

    /// Log a warning for ACLs without values
    pub warn_empty: bool,
}

impl Default for AclEngineConfig {
    fn default() -> Self {
        Self {
            acl_files: Vec::new(),
            acls: Vec::new(),
            access: Vec::new(),
            verbs: Vec::new(),
            match_cache: MatchCacheConfig::default(),
            warn_empty: default_true(),
        }
    }
}

/// A custom action verb
///
/// Several verbs may share a code; `kind` tells them apart in the answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct AccessVerb {
    /// Verb as written in access rules
    pub name: String,
    /// Code produced when a rule with this verb matches
    pub code: AclMatchCode,
    /// Distinguishes verbs sharing `code`
    #[serde(default)]
    pub kind: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct MatchCacheConfig {
    /// Cache results of expensive ACL types
    pub enabled: bool,

    /// Maximum cached subjects per ACL
    pub max_entries: usize,
}

impl Default for MatchCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

fn default_true() -> bool {
    true
}
