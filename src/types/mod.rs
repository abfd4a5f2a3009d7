//! Built-in ACL types

mod method;
mod note;
mod proxy_auth;
mod src;
mod url_regex;

pub use method::MethodAcl;
pub use note::NoteAcl;
pub use proxy_auth::ProxyAuthAcl;
pub use src::SourceIpAcl;
pub use url_regex::{RegexAcl, RegexTarget};

use crate::acl::AclRegistry;
use crate::error::Result;

/// Register every built-in type with `registry`
pub fn register_builtin(registry: &mut AclRegistry) -> Result<()> {
    registry.register(Box::new(SourceIpAcl::new()))?;
    registry.register(Box::new(MethodAcl::new()))?;
    registry.register(Box::new(RegexAcl::url()))?;
    registry.register(Box::new(RegexAcl::url_path()))?;
    registry.register(Box::new(ProxyAuthAcl::new()))?;
    registry.register(Box::new(NoteAcl::new()))?;
    Ok(())
}
