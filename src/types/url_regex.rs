//! `url_regex` and `urlpath_regex` ACL types
//!
//! ```text
//! acl aclname url_regex [-i] pattern ...
//! acl aclname urlpath_regex [-i] pattern ...
//! ```
//!
//! `-i` applies to every pattern of the ACL, so a redeclaration may not
//! switch it on once patterns without it exist. Patterns are compiled one
//! by one while parsing so a bad pattern is reported against its own line. Once configuration is loaded they are
//! merged into a single [`RegexSet`].

use crate::acl::{AclType, Flag, FlagSet, MatchResult, FLAG_CASE_INSENSITIVE};
use crate::checklist::Checklist;
use crate::error::{AclError, Result};
use crate::parser::ConfigParser;
use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use tracing::warn;

/// Which part of the request a regex ACL looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexTarget {
    Url,
    UrlPath,
}

impl RegexTarget {
    fn type_name(self) -> &'static str {
        match self {
            RegexTarget::Url => "url_regex",
            RegexTarget::UrlPath => "urlpath_regex",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegexAcl {
    target: RegexTarget,
    patterns: Vec<String>,
    compiled: Vec<Regex>,
    case_insensitive: bool,
    set: Option<RegexSet>,
}

impl RegexAcl {
    pub fn new(target: RegexTarget) -> Self {
        Self {
            target,
            patterns: Vec::new(),
            compiled: Vec::new(),
            case_insensitive: false,
            set: None,
        }
    }

    pub fn url() -> Self {
        Self::new(RegexTarget::Url)
    }

    pub fn url_path() -> Self {
        Self::new(RegexTarget::UrlPath)
    }

    fn is_match(&self, subject: &str) -> bool {
        match &self.set {
            Some(set) => set.is_match(subject),
            None => self.compiled.iter().any(|re| re.is_match(subject)),
        }
    }
}

impl AclType for RegexAcl {
    fn type_string(&self) -> &'static str {
        self.target.type_name()
    }

    fn supported_flags(&self) -> &'static [Flag] {
        &[FLAG_CASE_INSENSITIVE]
    }

    fn clone_unconfigured(&self) -> Box<dyn AclType> {
        Box::new(Self::new(self.target))
    }

    fn parse(&mut self, flags: &FlagSet, parser: &mut ConfigParser) -> Result<()> {
        let case_insensitive = flags.is_set(FLAG_CASE_INSENSITIVE);
        if !self.patterns.is_empty() && case_insensitive != self.case_insensitive {
            return Err(AclError::InvalidValue {
                acl_type: self.target.type_name(),
                value: "-i".to_string(),
                reason: "case sensitivity cannot change between declarations of one ACL"
                    .to_string(),
            });
        }
        self.case_insensitive = case_insensitive;
        while let Some(pattern) = parser.next_token() {
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(self.case_insensitive)
                .build()
                .map_err(|e| AclError::InvalidValue {
                    acl_type: self.target.type_name(),
                    value: pattern.clone(),
                    reason: e.to_string(),
                })?;
            self.compiled.push(regex);
            self.patterns.push(pattern);
        }
        self.set = None;
        Ok(())
    }

    fn dump(&self) -> Vec<String> {
        self.patterns.clone()
    }

    fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn prepare_for_use(&mut self) {
        if self.patterns.len() < 2 {
            return;
        }
        match RegexSetBuilder::new(&self.patterns)
            .case_insensitive(self.case_insensitive)
            .build()
        {
            Ok(set) => self.set = Some(set),
            Err(e) => {
                warn!(
                    acl_type = self.target.type_name(),
                    error = %e,
                    "Could not merge patterns, matching them one by one"
                );
            }
        }
    }

    fn requires_request(&self) -> bool {
        true
    }

    fn match_checklist(&self, _flags: &FlagSet, checklist: &mut dyn Checklist) -> MatchResult {
        let subject = match self.target {
            RegexTarget::Url => checklist.url(),
            RegexTarget::UrlPath => checklist.url_path(),
        };
        match subject {
            Some(subject) => self.is_match(subject).into(),
            None => MatchResult::NoMatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AclNode;
    use crate::checklist::FilledChecklist;

    fn node(acl: RegexAcl, values: &str) -> AclNode {
        let mut node = AclNode::new(Box::new(acl));
        node.context("re", values).unwrap();
        node.parse(&mut ConfigParser::from_line(values).unwrap()).unwrap();
        node
    }

    fn get(url: &str) -> FilledChecklist {
        FilledChecklist::new().with_request("GET", url)
    }

    #[test]
    fn test_url_regex() {
        let acl = node(RegexAcl::url(), r"^https?://[^/]*\.example\.com/");
        assert!(acl.matches(&mut get("http://www.example.com/index.html")));
        assert!(!acl.matches(&mut get("http://www.EXAMPLE.com/index.html")));
        assert!(!acl.matches(&mut get("http://example.org/")));
    }

    #[test]
    fn test_case_insensitive() {
        let acl = node(RegexAcl::url(), r"-i \.exe$");
        assert!(acl.matches(&mut get("http://host/setup.EXE")));
    }

    #[test]
    fn test_urlpath_regex_ignores_host() {
        let acl = node(RegexAcl::url_path(), r"^/admin");
        assert!(acl.matches(&mut get("http://host/admin/panel?x=1")));
        assert!(!acl.matches(&mut get("http://admin/public")));
    }

    #[test]
    fn test_regex_set_after_prepare() {
        let mut acl = node(RegexAcl::url_path(), r"^/a/ ^/b/ \.css$");
        acl.prepare_for_use();
        assert!(acl.matches(&mut get("http://host/b/x")));
        assert!(acl.matches(&mut get("http://host/site.css")));
        assert!(!acl.matches(&mut get("http://host/c/")));
    }

    #[test]
    fn test_case_flag_cannot_change_on_append() {
        let mut acl = node(RegexAcl::url(), r"^http://foo/");
        let err = acl
            .append(&mut ConfigParser::from_line(r"-i ^http://bar/").unwrap())
            .unwrap_err();
        assert!(matches!(err, AclError::InvalidValue { ref value, .. } if value == "-i"));

        assert!(!acl.matches(&mut get("http://FOO/")));
        acl.prepare_for_use();
        assert!(!acl.matches(&mut get("http://FOO/")));
        assert_eq!(acl.dump(), vec![r"acl re url_regex ^http://foo/"]);
    }

    #[test]
    fn test_case_flag_carries_over_on_append() {
        let mut acl = node(RegexAcl::url(), r"-i ^http://foo/");
        acl.append(&mut ConfigParser::from_line(r"^http://bar/").unwrap())
            .unwrap();

        let before = acl.matches(&mut get("http://BAR/"));
        acl.prepare_for_use();
        let after = acl.matches(&mut get("http://BAR/"));
        assert!(before);
        assert_eq!(before, after);
        assert!(acl.matches(&mut get("http://FOO/")));
        assert_eq!(acl.dump(), vec![r"acl re url_regex -i ^http://foo/ ^http://bar/"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let mut acl = AclNode::new(Box::new(RegexAcl::url()));
        let err = acl
            .parse(&mut ConfigParser::new(["(unclosed"]))
            .unwrap_err();
        assert!(matches!(err, AclError::InvalidValue { acl_type: "url_regex", .. }));
    }

    #[test]
    fn test_type_strings() {
        assert_eq!(RegexAcl::url().type_string(), "url_regex");
        assert_eq!(RegexAcl::url_path().type_string(), "urlpath_regex");
        let copy = RegexAcl::url_path().clone_unconfigured();
        assert_eq!(copy.type_string(), "urlpath_regex");
    }
}
