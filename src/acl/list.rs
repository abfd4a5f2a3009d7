//! Declared ACLs
//!
//! [`AclList`] owns every node of one configuration, in declaration order.
//! Access rules refer to nodes through [`AclId`] handles, so a reload
//! replaces the whole list at once.

use super::node::AclNode;
use super::registry::AclRegistry;
use crate::config::MatchCacheConfig;
use crate::error::{AclError, Result};
use crate::parser::ConfigParser;
use std::collections::HashMap;
use tracing::{debug, warn};

const ACL_KEYWORD: &str = "acl";

/// Handle to a node in an [`AclList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AclId(usize);

impl AclId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered collection of named ACLs
#[derive(Debug, Default)]
pub struct AclList {
    nodes: Vec<AclNode>,
    by_name: HashMap<String, AclId>,
    cache: MatchCacheConfig,
    warn_empty: bool,
}

impl AclList {
    pub fn new(cache: MatchCacheConfig, warn_empty: bool) -> Self {
        Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
            cache,
            warn_empty,
        }
    }

    /// Parse one `acl <name> <type> [flags] values...` declaration
    ///
    /// The leading `acl` keyword is optional. Declaring an existing name
    /// again with the same type appends values to that ACL. Errors carry
    /// the offending line.
    pub fn parse_acl_line(
        &mut self,
        registry: &AclRegistry,
        parser: &mut ConfigParser,
    ) -> Result<AclId> {
        let line = parser.line().to_string();
        let line_no = parser.line_no();
        self.parse_declaration(registry, parser, &line)
            .map_err(|e| e.in_line(&line, line_no))
    }

    /// Parse a declaration given as text
    pub fn parse_line(&mut self, registry: &AclRegistry, line: &str) -> Result<AclId> {
        let mut parser = ConfigParser::from_line(line).map_err(|e| e.in_line(line, None))?;
        self.parse_acl_line(registry, &mut parser)
    }

    fn parse_declaration(
        &mut self,
        registry: &AclRegistry,
        parser: &mut ConfigParser,
        line: &str,
    ) -> Result<AclId> {
        if parser.peek_token() == Some(ACL_KEYWORD) {
            parser.next_token();
        }
        let name = parser.next_token().ok_or(AclError::MissingToken("ACL name"))?;
        let acl_type = parser.next_token().ok_or(AclError::MissingToken("ACL type"))?;

        if let Some(id) = self.find_by_name(&name) {
            let node = &mut self.nodes[id.0];
            if node.type_string() != acl_type {
                return Err(AclError::TypeMismatch {
                    name,
                    existing: node.type_string().to_string(),
                    requested: acl_type,
                });
            }
            debug!(acl = %name, "Appending to ACL");
            node.append(parser)?;
            return Ok(id);
        }

        debug!(acl = %name, acl_type = %acl_type, "Creating ACL");
        let mut node = registry.factory(&acl_type)?;
        node.context(&name, line)?;
        node.parse(parser)?;

        if node.is_empty() && self.warn_empty {
            warn!(acl = %name, line = %line, "Empty ACL");
        }
        if !node.valid() {
            return Err(AclError::InvalidAcl(name));
        }

        node.configure_match_cache(self.cache.enabled, self.cache.max_entries);
        node.set_registered();

        let id = AclId(self.nodes.len());
        self.nodes.push(node);
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<AclId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: AclId) -> Option<&AclNode> {
        self.nodes.get(id.0)
    }

    /// Node declared under `name`
    pub fn by_name(&self, name: &str) -> Option<&AclNode> {
        self.find_by_name(name).and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AclNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run every node's post-load hook and mark the list active
    pub fn prepare_for_use(&mut self) {
        for node in &mut self.nodes {
            node.prepare_for_use();
            node.mark_in_use();
        }
    }

    /// Every declaration in configuration syntax
    pub fn dump(&self) -> Vec<String> {
        self.nodes.iter().flat_map(AclNode::dump).collect()
    }

    pub fn clear_match_caches(&self) {
        for node in &self.nodes {
            node.clear_match_cache();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::node::AclState;
    use crate::checklist::FilledChecklist;

    fn registry() -> AclRegistry {
        AclRegistry::with_builtin_types().unwrap()
    }

    fn list() -> AclList {
        AclList::new(MatchCacheConfig::default(), true)
    }

    #[test]
    fn test_declare_and_match() {
        let registry = registry();
        let mut acls = list();
        let id = acls
            .parse_line(&registry, "acl test_ips src -i 10.0.0.0/8")
            .unwrap();

        let node = acls.get(id).unwrap();
        assert_eq!(node.name(), "test_ips");
        assert_eq!(node.cfgline(), "acl test_ips src -i 10.0.0.0/8");
        assert!(node.is_registered());
        assert_eq!(node.dump(), vec!["acl test_ips src -i 10.0.0.0/8"]);

        let mut inside = FilledChecklist::new().with_src("10.1.2.3".parse().unwrap());
        assert!(node.matches(&mut inside));
        let mut outside = FilledChecklist::new().with_src("192.168.1.1".parse().unwrap());
        assert!(!node.matches(&mut outside));
    }

    #[test]
    fn test_keyword_optional() {
        let registry = registry();
        let mut acls = list();
        acls.parse_line(&registry, "local src 127.0.0.1").unwrap();
        assert!(acls.find_by_name("local").is_some());
    }

    #[test]
    fn test_append_to_existing() {
        let registry = registry();
        let mut acls = list();
        let first = acls.parse_line(&registry, "acl m method GET").unwrap();
        let second = acls.parse_line(&registry, "acl m method POST").unwrap();
        assert_eq!(first, second);
        assert_eq!(acls.len(), 1);
        assert_eq!(acls.dump(), vec!["acl m method GET POST"]);
    }

    #[test]
    fn test_failed_append_keeps_node() {
        let registry = registry();
        let mut acls = list();
        acls.parse_line(&registry, "acl m method GET").unwrap();

        let err = acls.parse_line(&registry, "acl m method -i POST b@d").unwrap_err();
        assert!(matches!(err.root(), AclError::InvalidValue { .. }));
        let node = acls.by_name("m").unwrap();
        assert!(node.flags().is_empty());
        assert_eq!(acls.dump(), vec!["acl m method GET"]);

        acls.parse_line(&registry, "acl auth proxy_auth REQUIRED").unwrap();
        let err = acls.parse_line(&registry, "acl auth proxy_auth alice").unwrap_err();
        assert!(matches!(err.root(), AclError::InvalidAcl(n) if n == "auth"));
        assert_eq!(acls.by_name("auth").unwrap().dump(), vec!["acl auth proxy_auth REQUIRED"]);
    }

    #[test]
    fn test_redeclare_with_other_type() {
        let registry = registry();
        let mut acls = list();
        acls.parse_line(&registry, "acl m method GET").unwrap();
        let err = acls.parse_line(&registry, "acl m src 10.0.0.1").unwrap_err();
        assert!(matches!(err.root(), AclError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_type_carries_line() {
        let registry = registry();
        let mut acls = list();
        let mut parser = ConfigParser::from_line("acl x bogus 1 2").unwrap().with_line_no(12);
        let err = acls.parse_acl_line(&registry, &mut parser).unwrap_err();

        match &err {
            AclError::Config { line, line_no, source } => {
                assert_eq!(line, "acl x bogus 1 2");
                assert_eq!(*line_no, Some(12));
                assert!(matches!(**source, AclError::UnknownType(ref t) if t == "bogus"));
            }
            other => panic!("Expected Config error, got {:?}", other),
        }
        assert!(acls.is_empty());
    }

    #[test]
    fn test_missing_tokens() {
        let registry = registry();
        let mut acls = list();
        let err = acls.parse_line(&registry, "acl").unwrap_err();
        assert!(matches!(err.root(), AclError::MissingToken("ACL name")));
        let err = acls.parse_line(&registry, "acl lonely").unwrap_err();
        assert!(matches!(err.root(), AclError::MissingToken("ACL type")));
    }

    #[test]
    fn test_failed_parse_not_registered() {
        let registry = registry();
        let mut acls = list();
        let err = acls.parse_line(&registry, "acl bad src -q 10.0.0.1").unwrap_err();
        assert!(matches!(err.root(), AclError::UnsupportedFlag { flag: 'q' }));
        assert!(acls.find_by_name("bad").is_none());
    }

    #[test]
    fn test_invalid_after_parse() {
        let registry = registry();
        let mut acls = list();
        let err = acls
            .parse_line(&registry, "acl auth proxy_auth REQUIRED alice")
            .unwrap_err();
        assert!(matches!(err.root(), AclError::InvalidAcl(n) if n == "auth"));
    }

    #[test]
    fn test_empty_acl_allowed() {
        let registry = registry();
        let mut acls = list();
        let id = acls.parse_line(&registry, "acl nothing src").unwrap();
        assert!(acls.get(id).unwrap().is_empty());
    }

    #[test]
    fn test_prepare_marks_in_use() {
        let registry = registry();
        let mut acls = list();
        acls.parse_line(&registry, "acl a src all").unwrap();
        acls.prepare_for_use();
        assert_eq!(acls.by_name("a").unwrap().state(), AclState::InUse);
    }

    #[test]
    fn test_cache_configuration_applied() {
        let registry = registry();
        let mut acls = AclList::new(
            MatchCacheConfig {
                enabled: true,
                max_entries: 2,
            },
            false,
        );
        acls.parse_line(&registry, "acl auth proxy_auth alice").unwrap();
        acls.parse_line(&registry, "acl m method GET").unwrap();

        assert_eq!(
            acls.by_name("auth").unwrap().match_cache().unwrap().max_entries(),
            2
        );
        assert!(acls.by_name("m").unwrap().match_cache().is_none());

        let mut disabled = AclList::new(
            MatchCacheConfig {
                enabled: false,
                max_entries: 2,
            },
            false,
        );
        disabled.parse_line(&registry, "acl auth proxy_auth alice").unwrap();
        assert!(disabled.by_name("auth").unwrap().match_cache().is_none());
    }
}
