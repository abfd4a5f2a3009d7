//! Token stream over a single configuration line
//!
//! ACL parsing never sees raw configuration text; it pulls whitespace
//! delimited tokens from a [`ConfigParser`]. Flag parsing peeks at the next
//! token and leaves it in place when it is not a flag, so the type-specific
//! parser that runs afterwards starts exactly where flags stopped.

use crate::error::{AclError, Result};
use std::borrow::Cow;

/// Cursor over the tokens of one configuration line
#[derive(Debug, Clone)]
pub struct ConfigParser {
    tokens: Vec<String>,
    pos: usize,
    line: String,
    line_no: Option<usize>,
}

impl ConfigParser {
    /// Create a parser over already-split tokens
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let line = tokens.join(" ");
        Self {
            tokens,
            pos: 0,
            line,
            line_no: None,
        }
    }

    /// Split a configuration line into tokens
    ///
    /// Tokens are separated by whitespace. A double-quoted token may contain
    /// whitespace; `\"` and `\\` escapes are honoured inside quotes. A quote
    /// left open at the end of the line is an error.
    pub fn from_line(line: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut in_token = false;
        let mut quoted = false;
        let mut chars = line.chars();

        while let Some(c) = chars.next() {
            if quoted {
                match c {
                    '"' => quoted = false,
                    '\\' => {
                        if let Some(next) = chars.next() {
                            current.push(next);
                        }
                    }
                    _ => current.push(c),
                }
                continue;
            }

            if c.is_whitespace() {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            } else if c == '"' {
                quoted = true;
                in_token = true;
            } else {
                current.push(c);
                in_token = true;
            }
        }
        if quoted {
            return Err(AclError::UnterminatedQuote);
        }
        if in_token {
            tokens.push(current);
        }

        Ok(Self {
            tokens,
            pos: 0,
            line: line.trim().to_string(),
            line_no: None,
        })
    }

    /// Record the line number this parser came from
    pub fn with_line_no(mut self, line_no: usize) -> Self {
        self.line_no = Some(line_no);
        self
    }

    /// Look at the next token without consuming it
    pub fn peek_token(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    /// Consume and return the next token
    pub fn next_token(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Whether any tokens remain
    pub fn has_more(&self) -> bool {
        self.pos < self.tokens.len()
    }

    /// Consume every remaining token
    pub fn remaining(&mut self) -> Vec<String> {
        let rest = self.tokens[self.pos..].to_vec();
        self.pos = self.tokens.len();
        rest
    }

    /// The original configuration text
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Line number, when the line came from a file
    pub fn line_no(&self) -> Option<usize> {
        self.line_no
    }
}

/// Render `token` so that [`ConfigParser::from_line`] reads it back unchanged
///
/// Empty tokens and tokens holding whitespace, `"` or `\` are quoted.
pub fn quote_token(token: &str) -> Cow<'_, str> {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return Cow::Borrowed(token);
    }

    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}
