//! Access Control List (ACL) module
//!
//! Named, typed ACLs declared with `acl` lines, the registry that creates
//! them by type name, per-ACL match caching, and the access rules that
//! combine ACLs into answers.

mod access;
mod answer;
mod cache;
mod flags;
mod list;
mod node;
mod registry;

pub use access::{AccessDecision, AccessList, AccessRule, AclRef};
pub use answer::{AclMatchCode, Answer};
pub use cache::{CacheEntry, CacheStats, MatchCache, DEFAULT_MAX_ENTRIES};
pub use flags::{
    CharacterSet, Flag, FlagSet, FlagStatus, FlagsTokenizer, FLAG_CASE_INSENSITIVE,
    FLAG_INDEX_MAX, FLAG_NO_LOOKUP, FLAG_STRICT, FLAG_SUBSTRING,
};
pub use list::{AclId, AclList};
pub use node::{AclNode, AclState, AclType, AclTypeClone, MatchResult, ACL_NAME_SZ};
pub use registry::AclRegistry;
