//! Access rules
//!
//! ```text
//! allow|deny|<verb> aclname [!aclname] ...
//! ```
//!
//! The ACLs of one rule must all match (a `!` inverts one). Rules are
//! checked in order and the first matching rule decides. When nothing
//! matches, the answer is the opposite of the last rule's.

use super::answer::Answer;
use super::list::{AclId, AclList};
use crate::checklist::{AsyncStep, Checklist};
use crate::config::AccessVerb;
use crate::error::{AclError, Result};
use crate::parser::ConfigParser;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Reference from a rule to a declared ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclRef {
    pub id: AclId,
    pub negated: bool,
}

/// One access rule
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub verb: String,
    pub answer: Answer,
    pub acls: Vec<AclRef>,
}

/// Outcome of an access check
///
/// `matched_acl` names the last ACL of the rule that decided, which is what
/// error pages are selected by. It is `None` for the implicit answer and
/// when evaluation was suspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccessDecision {
    pub answer: Answer,
    pub rule: Option<usize>,
    pub matched_acl: Option<String>,
}

impl AccessDecision {
    fn implicit(answer: Answer) -> Self {
        Self {
            answer,
            rule: None,
            matched_acl: None,
        }
    }
}

/// Ordered access rules plus the verbs they may use
#[derive(Debug, Clone)]
pub struct AccessList {
    rules: Vec<AccessRule>,
    verbs: HashMap<String, Answer>,
}

impl Default for AccessList {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessList {
    /// Create an empty list understanding `allow` and `deny`
    pub fn new() -> Self {
        let mut verbs = HashMap::new();
        verbs.insert("allow".to_string(), Answer::allowed());
        verbs.insert("deny".to_string(), Answer::denied());
        Self {
            rules: Vec::new(),
            verbs,
        }
    }

    /// Create an empty list with additional verbs
    ///
    /// A custom verb may not reuse `allow`, `deny` or another custom name.
    pub fn with_verbs(custom: &[AccessVerb]) -> Result<Self> {
        let mut list = Self::new();
        for verb in custom {
            if list.has_verb(&verb.name) {
                return Err(AclError::DuplicateVerb(verb.name.clone()));
            }
            list.verbs
                .insert(verb.name.clone(), Answer::new(verb.code, verb.kind));
        }
        Ok(list)
    }

    /// Parse one rule, resolving ACL names against `acls`
    pub fn parse_rule(&mut self, acls: &AclList, parser: &mut ConfigParser) -> Result<()> {
        let line = parser.line().to_string();
        let line_no = parser.line_no();
        let rule = self
            .build_rule(acls, parser)
            .map_err(|e| e.in_line(&line, line_no))?;
        self.rules.push(rule);
        Ok(())
    }

    /// Parse a rule given as text
    pub fn parse_line(&mut self, acls: &AclList, line: &str) -> Result<()> {
        let mut parser = ConfigParser::from_line(line).map_err(|e| e.in_line(line, None))?;
        self.parse_rule(acls, &mut parser)
    }

    fn build_rule(&self, acls: &AclList, parser: &mut ConfigParser) -> Result<AccessRule> {
        let verb = parser
            .next_token()
            .ok_or(AclError::MissingToken("access verb"))?;
        let answer = *self
            .verbs
            .get(&verb)
            .ok_or_else(|| AclError::UnknownVerb(verb.clone()))?;

        let mut refs = Vec::new();
        while let Some(token) = parser.next_token() {
            let (name, negated) = match token.strip_prefix('!') {
                Some(name) => (name, true),
                None => (token.as_str(), false),
            };
            let id = acls
                .find_by_name(name)
                .ok_or_else(|| AclError::UnknownAcl(name.to_string()))?;
            refs.push(AclRef { id, negated });
        }
        if refs.is_empty() {
            return Err(AclError::MissingToken("ACL name"));
        }

        Ok(AccessRule {
            verb,
            answer,
            acls: refs,
        })
    }

    /// Decide the checklist against the rules
    ///
    /// If an ACL suspends evaluation, the answer is `AUTH_REQUIRED` when
    /// credentials are needed and `DUNNO` otherwise; the caller retries once
    /// the pending step is done and cleared.
    pub fn check(&self, acls: &AclList, checklist: &mut dyn Checklist) -> Answer {
        self.decide(acls, checklist).answer
    }

    /// Like [`AccessList::check`], also reporting which rule and ACL decided
    pub fn decide(&self, acls: &AclList, checklist: &mut dyn Checklist) -> AccessDecision {
        for (index, rule) in self.rules.iter().enumerate() {
            match self.rule_matches(rule, acls, checklist) {
                Some(true) => {
                    let matched_acl = rule
                        .acls
                        .last()
                        .and_then(|acl_ref| acls.get(acl_ref.id))
                        .map(|node| node.name().to_string());
                    debug!(
                        rule = index,
                        verb = %rule.verb,
                        answer = %rule.answer,
                        acl = ?matched_acl,
                        "access rule matched"
                    );
                    return AccessDecision {
                        answer: rule.answer,
                        rule: Some(index),
                        matched_acl,
                    };
                }
                Some(false) => continue,
                None => {
                    let answer = match checklist.async_in_progress() {
                        Some(AsyncStep::Authenticate) => Answer::auth_required(),
                        _ => Answer::dunno(),
                    };
                    debug!(rule = index, answer = %answer, "access check suspended");
                    return AccessDecision::implicit(answer);
                }
            }
        }

        let answer = match self.rules.last() {
            Some(last) => Answer::from(last.answer.code.opposite()),
            None => Answer::dunno(),
        };
        debug!(answer = %answer, "no access rule matched, using implicit answer");
        AccessDecision::implicit(answer)
    }

    /// `None` when an ACL could not be decided yet
    fn rule_matches(
        &self,
        rule: &AccessRule,
        acls: &AclList,
        checklist: &mut dyn Checklist,
    ) -> Option<bool> {
        for acl_ref in &rule.acls {
            let node = acls.get(acl_ref.id)?;
            let matched = node.matches(checklist);
            if checklist.async_in_progress().is_some() {
                return None;
            }
            if matched == acl_ref.negated {
                return Some(false);
            }
        }
        Some(true)
    }

    /// Rules in configuration syntax
    pub fn dump(&self, acls: &AclList) -> Vec<String> {
        self.rules
            .iter()
            .map(|rule| {
                let mut line = rule.verb.clone();
                for acl_ref in &rule.acls {
                    let name = acls.get(acl_ref.id).map(|n| n.name()).unwrap_or("?");
                    line.push(' ');
                    if acl_ref.negated {
                        line.push('!');
                    }
                    line.push_str(name);
                }
                line
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the verb is known
    pub fn has_verb(&self, verb: &str) -> bool {
        self.verbs.contains_key(verb)
    }

    /// Answer a verb maps to
    pub fn verb_answer(&self, verb: &str) -> Option<Answer> {
        self.verbs.get(verb).copied()
    }
}
