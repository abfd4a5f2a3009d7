//! ACL evaluation engine
//!
//! Loads declarations and access rules from an [`AclEngineConfig`] and
//! answers access checks. A reload builds a complete new configuration
//! before swapping it in, so checks never see a half-parsed state.

use crate::acl::{AccessDecision, AccessList, AclList, AclRegistry, Answer};
use crate::checklist::Checklist;
use crate::config::AclEngineConfig;
use crate::error::{AclError, Result};
use crate::parser::ConfigParser;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One fully parsed and prepared configuration
#[derive(Debug)]
pub struct LoadedConfig {
    pub acls: AclList,
    pub access: AccessList,
}

impl LoadedConfig {
    fn build(registry: &AclRegistry, config: &AclEngineConfig) -> Result<Self> {
        let mut acls = AclList::new(config.match_cache, config.warn_empty);

        for path in &config.acl_files {
            load_acl_file(&mut acls, registry, path)?;
        }
        for line in &config.acls {
            acls.parse_line(registry, line)?;
        }
        acls.prepare_for_use();

        let mut access = AccessList::with_verbs(&config.verbs)?;
        for line in &config.access {
            access.parse_line(&acls, line)?;
        }

        Ok(Self { acls, access })
    }
}

fn load_acl_file(acls: &mut AclList, registry: &AclRegistry, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path).map_err(|source| AclError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut declared = 0usize;
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parser = ConfigParser::from_line(line)
            .map_err(|e| e.in_line(line, Some(idx + 1)))?
            .with_line_no(idx + 1);
        acls.parse_acl_line(registry, &mut parser)?;
        declared += 1;
    }

    debug!(path = %path.display(), declarations = declared, "Loaded ACL file");
    Ok(())
}

/// ACL Engine - evaluates access checks against the active configuration
#[derive(Debug)]
pub struct AclEngine {
    registry: Arc<AclRegistry>,
    state: RwLock<Arc<LoadedConfig>>,
}

impl AclEngine {
    /// Create a new engine from configuration
    pub fn new(registry: Arc<AclRegistry>, config: &AclEngineConfig) -> Result<Self> {
        let loaded = LoadedConfig::build(&registry, config).map_err(|e| {
            warn!(error = %e, "Failed to load ACL configuration");
            e
        })?;

        info!(
            acls = loaded.acls.len(),
            rules = loaded.access.len(),
            "ACL configuration loaded"
        );

        Ok(Self {
            registry,
            state: RwLock::new(Arc::new(loaded)),
        })
    }

    /// Replace the active configuration
    ///
    /// On error the previous configuration stays active.
    pub fn reconfigure(&self, config: &AclEngineConfig) -> Result<()> {
        let loaded = LoadedConfig::build(&self.registry, config).map_err(|e| {
            warn!(error = %e, "Rejected ACL reconfiguration, keeping previous configuration");
            e
        })?;

        info!(
            acls = loaded.acls.len(),
            rules = loaded.access.len(),
            "ACL configuration reloaded"
        );
        *self.state.write() = Arc::new(loaded);
        Ok(())
    }

    /// Snapshot of the active configuration
    pub fn current(&self) -> Arc<LoadedConfig> {
        Arc::clone(&self.state.read())
    }

    /// Run the access rules against `checklist`
    pub fn check(&self, checklist: &mut dyn Checklist) -> Answer {
        let loaded = self.current();
        loaded.access.check(&loaded.acls, checklist)
    }

    /// Run the access rules, reporting the deciding rule and ACL
    pub fn decide(&self, checklist: &mut dyn Checklist) -> AccessDecision {
        let loaded = self.current();
        loaded.access.decide(&loaded.acls, checklist)
    }

    /// Evaluate a single named ACL
    ///
    /// Returns `None` when no ACL has that name.
    pub fn matches(&self, name: &str, checklist: &mut dyn Checklist) -> Option<bool> {
        let loaded = self.current();
        let node = loaded.acls.by_name(name)?;
        Some(node.matches(checklist))
    }

    /// Declarations followed by access rules, in configuration syntax
    pub fn dump(&self) -> Vec<String> {
        let loaded = self.current();
        let mut lines = loaded.acls.dump();
        lines.extend(loaded.access.dump(&loaded.acls));
        lines
    }

    /// Drop every cached match result
    pub fn reset_match_caches(&self) {
        self.current().acls.clear_match_caches();
    }

    /// Get the number of declared ACLs
    pub fn acl_count(&self) -> usize {
        self.state.read().acls.len()
    }

    /// Get the number of access rules
    pub fn rule_count(&self) -> usize {
        self.state.read().access.len()
    }

    pub fn registry(&self) -> &Arc<AclRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::FilledChecklist;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn registry() -> Arc<AclRegistry> {
        Arc::new(AclRegistry::with_builtin_types().unwrap())
    }

    fn make_config(acls: &[&str], access: &[&str]) -> AclEngineConfig {
        AclEngineConfig {
            acls: acls.iter().map(|s| s.to_string()).collect(),
            access: access.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn client(addr: &str) -> FilledChecklist {
        FilledChecklist::new()
            .with_src(addr.parse().unwrap())
            .with_request("GET", "http://example.com/index.html")
    }

    #[test]
    fn test_basic_check() {
        let config = make_config(
            &["acl localnet src 192.168.0.0/16", "acl all src all"],
            &["allow localnet", "deny all"],
        );
        let engine = AclEngine::new(registry(), &config).unwrap();

        assert_eq!(engine.acl_count(), 2);
        assert_eq!(engine.rule_count(), 2);
        assert!(engine.check(&mut client("192.168.1.1")).is_allowed());
        assert!(engine.check(&mut client("10.0.0.1")).is_denied());
    }

    #[test]
    fn test_load_acl_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# office networks").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "acl office src 172.16.0.0/12").unwrap();
        writeln!(file, "acl office src 10.10.0.0/16").unwrap();
        file.flush().unwrap();

        let config = AclEngineConfig {
            acl_files: vec![file.path().to_path_buf()],
            access: vec!["allow office".to_string()],
            ..Default::default()
        };
        let engine = AclEngine::new(registry(), &config).unwrap();

        assert_eq!(engine.acl_count(), 1);
        assert_eq!(engine.matches("office", &mut client("10.10.3.4")), Some(true));
        assert_eq!(engine.matches("office", &mut client("10.11.3.4")), Some(false));
        assert_eq!(engine.matches("missing", &mut client("10.10.3.4")), None);
    }

    #[test]
    fn test_file_error_reports_line_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "acl ok src 10.0.0.1").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "acl broken nosuchtype x").unwrap();
        file.flush().unwrap();

        let config = AclEngineConfig {
            acl_files: vec![file.path().to_path_buf()],
            ..Default::default()
        };
        let err = AclEngine::new(registry(), &config).unwrap_err();
        match err {
            AclError::Config { line_no, .. } => assert_eq!(line_no, Some(3)),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let config = AclEngineConfig {
            acl_files: vec!["/nonexistent/acls.conf".into()],
            ..Default::default()
        };
        let err = AclEngine::new(registry(), &config).unwrap_err();
        assert!(matches!(err, AclError::Io { .. }));
    }

    #[test]
    fn test_reconfigure_swaps_atomically() {
        let engine = AclEngine::new(
            registry(),
            &make_config(&["acl all src all"], &["deny all"]),
        )
        .unwrap();
        assert!(engine.check(&mut client("10.0.0.1")).is_denied());

        engine
            .reconfigure(&make_config(&["acl all src all"], &["allow all"]))
            .unwrap();
        assert!(engine.check(&mut client("10.0.0.1")).is_allowed());

        // A broken reload keeps the previous rules
        let err = engine
            .reconfigure(&make_config(&["acl all src all"], &["allow nobody"]))
            .unwrap_err();
        assert!(matches!(err.root(), AclError::UnknownAcl(_)));
        assert!(engine.check(&mut client("10.0.0.1")).is_allowed());
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let engine = AclEngine::new(registry(), &make_config(&["acl a src all"], &[])).unwrap();
        let before = engine.current();
        engine
            .reconfigure(&make_config(&["acl b src all", "acl c src all"], &[]))
            .unwrap();

        assert_eq!(before.acls.len(), 1);
        assert_eq!(engine.acl_count(), 2);
    }

    #[test]
    fn test_dump() {
        let engine = AclEngine::new(
            registry(),
            &make_config(
                &["acl localnet src 10.0.0.0/8", "acl get method GET"],
                &["allow localnet get"],
            ),
        )
        .unwrap();
        assert_eq!(
            engine.dump(),
            vec![
                "acl localnet src 10.0.0.0/8",
                "acl get method GET",
                "allow localnet get",
            ]
        );
    }

    #[test]
    fn test_reset_match_caches() {
        let engine = AclEngine::new(
            registry(),
            &make_config(&["acl staff proxy_auth alice bob"], &["allow staff"]),
        )
        .unwrap();
        let mut alice = client("10.0.0.1").with_user("alice");
        assert!(engine.check(&mut alice).is_allowed());

        let loaded = engine.current();
        let cache = loaded.acls.by_name("staff").unwrap().match_cache().unwrap();
        assert_eq!(cache.len(), 1);

        engine.reset_match_caches();
        assert!(cache.is_empty());
    }
}
