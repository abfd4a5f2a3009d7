//! ACL Evaluation Core for Sentinel Proxy
//!
//! Named, typed access control lists evaluated against a request context:
//!
//! - **Declarations**: `acl <name> <type> [flags] values...` lines parsed by
//!   the type's own parser, with redeclaration appending values
//! - **Flags**: single-letter options (`-i`, `-m=delims`, ...) validated
//!   against what each type supports, with `--` ending the flags
//! - **Registry**: prototype-based factory creating ACLs by type name
//! - **Match caching**: per-ACL results cached by subject for expensive types
//! - **Access rules**: `allow|deny acl [!acl]...`, first match wins
//!
//! # Architecture
//!
//! An [`AclNode`](acl::AclNode) holds the name, flags and lifecycle state
//! common to every ACL and delegates type-specific behaviour to a boxed
//! [`AclType`](acl::AclType). Evaluation reads the request through the
//! [`Checklist`](checklist::Checklist) trait; when required context is not
//! available yet the ACL asks the checklist to go asynchronous and reports
//! no match.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "acls": [
//!     "acl localnet src 10.0.0.0/8 192.168.0.0/16",
//!     "acl safe_methods method -i GET HEAD",
//!     "acl staff proxy_auth alice bob"
//!   ],
//!   "access": [
//!     "allow localnet safe_methods",
//!     "allow staff",
//!     "deny localnet"
//!   ],
//!   "match-cache": { "max-entries": 512 }
//! }
//! ```

pub mod acl;
pub mod checklist;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod types;

// Re-export main types
pub use acl::{AclMatchCode, AclNode, AclRegistry, Answer};
pub use checklist::{Checklist, FilledChecklist};
pub use config::AclEngineConfig;
pub use engine::AclEngine;
pub use error::{AclError, Result};
