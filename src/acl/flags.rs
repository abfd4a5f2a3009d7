//! Single-letter ACL option flags
//!
//! An ACL declaration may carry flags between its type name and its values:
//!
//! ```text
//! acl aclname type [-f[=parameter]]... [--] values...
//! ```
//!
//! Several letters may share one token (`-im`); only the last letter of a
//! token can take a parameter (`-im=/` binds `/` to `m`). Flag parsing stops
//! at the first token that does not start with `-`, or after a literal `--`.

use crate::error::{AclError, Result};
use crate::parser::ConfigParser;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

/// Highest bit position a flag can occupy (`'z' - 'A'`)
pub const FLAG_INDEX_MAX: u32 = (b'z' - b'A') as u32;

/// Delimiters used by `-m` when it is given without a parameter
const DEFAULT_DELIMITERS: &str = ",";

/// A flag letter, stored as its bit position in the flag alphabet
///
/// The alphabet runs from `A` to `z`, which includes the six punctuation
/// characters between `Z` and `a`. Every position fits in a `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Flag(u8);

impl Flag {
    /// Build a flag from an ASCII byte, panicking outside the alphabet
    pub const fn from_ascii(c: u8) -> Flag {
        assert!(c >= b'A' && c <= b'z', "ACL flag outside the A..=z alphabet");
        Flag(c - b'A')
    }

    /// Build a flag from a configuration character
    pub fn new(c: char) -> Option<Flag> {
        if ('A'..='z').contains(&c) {
            Some(Flag(c as u8 - b'A'))
        } else {
            None
        }
    }

    /// The flag letter
    pub fn as_char(self) -> char {
        (self.0 + b'A') as char
    }

    fn bit(self) -> u64 {
        1u64 << self.0
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Case-insensitive matching
pub const FLAG_CASE_INSENSITIVE: Flag = Flag::from_ascii(b'i');
/// Do not perform lookups while matching
pub const FLAG_NO_LOOKUP: Flag = Flag::from_ascii(b'n');
/// Strict matching
pub const FLAG_STRICT: Flag = Flag::from_ascii(b's');
/// Substring matching, optionally with custom delimiters
pub const FLAG_SUBSTRING: Flag = Flag::from_ascii(b'm');

/// How a flag is treated by a particular [`FlagSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagStatus {
    NotSupported,
    NoParameter,
    ParameterOptional,
    ParameterRequired,
}

/// A set of characters, built from a flag parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSet {
    chars: BTreeSet<char>,
}

impl CharacterSet {
    pub fn new(chars: &str) -> Self {
        Self {
            chars: chars.chars().collect(),
        }
    }

    pub fn contains(&self, c: char) -> bool {
        self.chars.contains(&c)
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Split `input` on every member of the set, skipping empty pieces
    pub fn split<'a>(&'a self, input: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        input
            .split(move |c: char| self.contains(c))
            .filter(|piece| !piece.is_empty())
    }
}

/// Flags attached to one ACL declaration
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    /// Flags the owning ACL type understands
    supported: u64,
    /// Flags currently set
    flags: u64,
    parameters: BTreeMap<Flag, String>,
    delimiters: OnceLock<CharacterSet>,
}

impl FlagSet {
    /// Create an empty set accepting the given flags
    pub fn new(supported: &[Flag]) -> Self {
        assert!(
            supported.len() as u32 <= FLAG_INDEX_MAX + 1,
            "too many supported ACL flags"
        );
        Self {
            supported: supported.iter().fold(0, |mask, f| mask | f.bit()),
            ..Self::default()
        }
    }

    /// Whether the owning ACL type accepts `flag`
    pub fn supports(&self, flag: Flag) -> bool {
        self.supported & flag.bit() != 0
    }

    /// Classify `flag` before trying to consume a parameter for it
    pub fn flag_status(&self, flag: Flag) -> FlagStatus {
        if !self.supports(flag) {
            FlagStatus::NotSupported
        } else if flag == FLAG_SUBSTRING {
            FlagStatus::ParameterOptional
        } else {
            FlagStatus::NoParameter
        }
    }

    /// Whether `value` is an acceptable parameter for `flag`
    ///
    /// Substring delimiters must be non-empty and may not contain letters
    /// or digits.
    pub fn parameter_supported(&self, flag: Flag, value: &str) -> bool {
        if flag == FLAG_SUBSTRING {
            !value.is_empty() && !value.chars().any(|c| c.is_ascii_alphanumeric())
        } else {
            true
        }
    }

    /// Set `flag`, storing `param` when it is non-empty
    pub fn make_set(&mut self, flag: Flag, param: &str) -> Result<()> {
        if !self.supports(flag) {
            return Err(AclError::UnsupportedFlag {
                flag: flag.as_char(),
            });
        }
        self.flags |= flag.bit();
        if !param.is_empty() {
            self.parameters.insert(flag, param.to_string());
        }
        if flag == FLAG_SUBSTRING {
            self.delimiters = OnceLock::new();
        }
        Ok(())
    }

    /// Clear `flag`; any stored parameter is kept
    pub fn make_unset(&mut self, flag: Flag) {
        self.flags &= !flag.bit();
    }

    pub fn is_set(&self, flag: Flag) -> bool {
        self.flags & flag.bit() != 0
    }

    /// Whether no flag is set
    pub fn is_empty(&self) -> bool {
        self.flags == 0
    }

    /// The stored parameter for `flag`, or an empty string
    pub fn parameter(&self, flag: Flag) -> &str {
        self.parameters.get(&flag).map(String::as_str).unwrap_or("")
    }

    /// Delimiters derived from the `-m` parameter
    ///
    /// Built on first use and cached; `None` when `-m` is not set.
    pub fn delimiters(&self) -> Option<&CharacterSet> {
        if !self.is_set(FLAG_SUBSTRING) {
            return None;
        }
        Some(self.delimiters.get_or_init(|| {
            let raw = match self.parameter(FLAG_SUBSTRING) {
                "" => DEFAULT_DELIMITERS,
                param => param,
            };
            CharacterSet::new(raw)
        }))
    }

    /// Consume leading flag tokens from `parser`
    pub fn parse_flags(&mut self, parser: &mut ConfigParser) -> Result<()> {
        let mut tokenizer = FlagsTokenizer::new(parser);

        while let Some(c) = tokenizer.next_flag() {
            let flag = Flag::new(c).ok_or(AclError::InvalidFlag(c))?;
            let param = tokenizer.parameter();

            match self.flag_status(flag) {
                FlagStatus::NotSupported => {
                    return Err(AclError::UnsupportedFlag { flag: c });
                }
                FlagStatus::NoParameter => {
                    if let Some(value) = param {
                        return Err(AclError::UnexpectedFlagParameter { flag: c, value });
                    }
                    self.make_set(flag, "")?;
                }
                FlagStatus::ParameterRequired => {
                    let value = param.ok_or(AclError::MissingFlagParameter { flag: c })?;
                    if !self.parameter_supported(flag, &value) {
                        return Err(AclError::InvalidFlagParameter { flag: c, value });
                    }
                    self.make_set(flag, &value)?;
                }
                FlagStatus::ParameterOptional => {
                    let value = param.unwrap_or_default();
                    if !value.is_empty() && !self.parameter_supported(flag, &value) {
                        return Err(AclError::InvalidFlagParameter { flag: c, value });
                    }
                    self.make_set(flag, &value)?;
                }
            }
        }

        Ok(())
    }

    /// Render the set flags in configuration syntax
    ///
    /// Parameterless flags share one token in alphabet order (`-ns`); each
    /// flag carrying a parameter follows as its own token (`-m=/`) so the
    /// output parses back to the same set. Empty when nothing is set.
    pub fn flags_str(&self) -> String {
        let mut bare = String::new();
        let mut with_param = Vec::new();

        for index in 0..=FLAG_INDEX_MAX as u8 {
            let flag = Flag(index);
            if !self.is_set(flag) {
                continue;
            }
            match self.parameters.get(&flag) {
                Some(param) => with_param.push(format!("-{}={}", flag, param)),
                None => bare.push(flag.as_char()),
            }
        }

        let mut parts = Vec::with_capacity(with_param.len() + 1);
        if !bare.is_empty() {
            parts.push(format!("-{}", bare));
        }
        parts.extend(with_param);
        parts.join(" ")
    }
}

/// Lexer for flag tokens
///
/// ```text
/// flag := '-' [A-Za-z]+ ['=' parameter]
/// ```
///
/// Walks tokens from a [`ConfigParser`] one letter at a time. A token that
/// is not a flag is left in the parser; `--` is consumed. After either, the
/// tokenizer yields nothing more.
pub struct FlagsTokenizer<'a> {
    parser: &'a mut ConfigParser,
    /// Current token without its leading `-`
    token: Vec<char>,
    /// Index of the last flag returned from `token`
    pos: Option<usize>,
    finished: bool,
}

impl<'a> FlagsTokenizer<'a> {
    pub fn new(parser: &'a mut ConfigParser) -> Self {
        Self {
            parser,
            token: Vec::new(),
            pos: None,
            finished: false,
        }
    }

    /// The next flag letter, or `None` once flags are exhausted
    pub fn next_flag(&mut self) -> Option<char> {
        if self.finished {
            return None;
        }
        if self.need_next_token() {
            if !self.next_token() {
                self.finished = true;
                return None;
            }
            self.pos = Some(0);
        } else {
            self.pos = self.pos.map(|p| p + 1);
        }
        self.pos.map(|p| self.token[p])
    }

    /// Whether an `=parameter` follows the last flag returned
    pub fn has_parameter(&self) -> bool {
        match self.pos {
            Some(p) => self.token.get(p + 1) == Some(&'=') && self.token.len() > p + 2,
            None => false,
        }
    }

    /// Parameter of the last flag, or an empty string
    pub fn get_parameter(&self) -> String {
        self.parameter().unwrap_or_default()
    }

    fn parameter(&self) -> Option<String> {
        if !self.has_parameter() {
            return None;
        }
        self.pos.map(|p| self.token[p + 2..].iter().collect())
    }

    /// True when the letters of the current token are used up
    fn need_next_token(&self) -> bool {
        match self.pos {
            None => true,
            Some(p) => p + 1 >= self.token.len() || self.token[p + 1] == '=',
        }
    }

    /// Load the next token if it is a flag token
    fn next_token(&mut self) -> bool {
        let is_flag = match self.parser.peek_token() {
            Some(t) => t.starts_with('-') && t.len() > 1,
            None => false,
        };
        if !is_flag {
            return false;
        }

        let token = match self.parser.next_token() {
            Some(t) => t,
            None => return false,
        };
        if token == "--" {
            return false;
        }

        self.token = token.chars().skip(1).collect();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_flags() -> Vec<Flag> {
        (b'A'..=b'z').map(Flag::from_ascii).collect()
    }

    #[test]
    fn test_set_and_unset_every_flag() {
        let flags = all_flags();
        assert_eq!(flags.len() as u32, FLAG_INDEX_MAX + 1);

        let mut set = FlagSet::new(&flags);
        for flag in &flags {
            set.make_set(*flag, "").unwrap();
            assert!(set.is_set(*flag));
            set.make_unset(*flag);
            assert!(!set.is_set(*flag));
        }
    }

    #[test]
    fn test_unsupported_flag() {
        let mut set = FlagSet::new(&[FLAG_CASE_INSENSITIVE]);
        let err = set.make_set(FLAG_SUBSTRING, "").unwrap_err();
        assert!(matches!(err, AclError::UnsupportedFlag { flag: 'm' }));
        assert!(!set.is_set(FLAG_SUBSTRING));
        assert_eq!(set.flag_status(FLAG_SUBSTRING), FlagStatus::NotSupported);
    }

    #[test]
    fn test_flag_alphabet_bounds() {
        assert!(Flag::new('@').is_none());
        assert!(Flag::new('{').is_none());
        assert_eq!(Flag::new('_').map(Flag::as_char), Some('_'));
        assert_eq!(Flag::new('A').map(Flag::as_char), Some('A'));
        assert_eq!(Flag::new('z').map(Flag::as_char), Some('z'));
    }

    #[test]
    fn test_unset_keeps_parameter() {
        let mut set = FlagSet::new(&[FLAG_SUBSTRING]);
        set.make_set(FLAG_SUBSTRING, "/").unwrap();
        set.make_unset(FLAG_SUBSTRING);
        assert!(!set.is_set(FLAG_SUBSTRING));
        assert_eq!(set.parameter(FLAG_SUBSTRING), "/");
        assert!(set.delimiters().is_none());
    }

    #[test]
    fn test_tokenizer_compound_token() {
        let mut parser = ConfigParser::new(["-im=foo", "value"]);
        let mut tokenizer = FlagsTokenizer::new(&mut parser);

        assert_eq!(tokenizer.next_flag(), Some('i'));
        assert!(!tokenizer.has_parameter());
        assert_eq!(tokenizer.next_flag(), Some('m'));
        assert!(tokenizer.has_parameter());
        assert_eq!(tokenizer.get_parameter(), "foo");
        assert_eq!(tokenizer.next_flag(), None);
        assert_eq!(tokenizer.next_flag(), None);

        assert_eq!(parser.next_token().as_deref(), Some("value"));
    }

    #[test]
    fn test_tokenizer_stops_at_double_dash() {
        let mut parser = ConfigParser::new(["-i", "--", "-n", "value"]);
        let mut tokenizer = FlagsTokenizer::new(&mut parser);

        assert_eq!(tokenizer.next_flag(), Some('i'));
        assert_eq!(tokenizer.next_flag(), None);
        assert_eq!(tokenizer.next_flag(), None);

        assert_eq!(parser.remaining(), vec!["-n", "value"]);
    }

    #[test]
    fn test_tokenizer_leaves_non_flag_token() {
        let mut parser = ConfigParser::new(["10.0.0.0/8", "-i"]);
        let mut tokenizer = FlagsTokenizer::new(&mut parser);
        assert_eq!(tokenizer.next_flag(), None);
        assert_eq!(parser.peek_token(), Some("10.0.0.0/8"));

        let mut parser = ConfigParser::new(["-", "x"]);
        let mut tokenizer = FlagsTokenizer::new(&mut parser);
        assert_eq!(tokenizer.next_flag(), None);
        assert_eq!(parser.peek_token(), Some("-"));
    }

    #[test]
    fn test_tokenizer_empty_parameter() {
        let mut parser = ConfigParser::new(["-m="]);
        let mut tokenizer = FlagsTokenizer::new(&mut parser);
        assert_eq!(tokenizer.next_flag(), Some('m'));
        assert!(!tokenizer.has_parameter());
        assert_eq!(tokenizer.get_parameter(), "");
        assert_eq!(tokenizer.next_flag(), None);
    }

    #[test]
    fn test_parse_flags_and_round_trip() {
        let supported = [FLAG_SUBSTRING, FLAG_STRICT, FLAG_NO_LOOKUP];
        let mut set = FlagSet::new(&supported);
        set.make_set(FLAG_SUBSTRING, "").unwrap();
        set.make_set(FLAG_NO_LOOKUP, "").unwrap();

        let rendered = set.flags_str();
        assert_eq!(rendered, "-mn");

        let mut parser = ConfigParser::from_line(&rendered).unwrap();
        let mut reparsed = FlagSet::new(&supported);
        reparsed.parse_flags(&mut parser).unwrap();
        assert!(reparsed.is_set(FLAG_SUBSTRING));
        assert!(reparsed.is_set(FLAG_NO_LOOKUP));
        assert!(!reparsed.is_set(FLAG_STRICT));
        assert_eq!(reparsed.flags_str(), rendered);
    }

    #[test]
    fn test_flags_str_with_parameter() {
        let mut set = FlagSet::new(&[FLAG_SUBSTRING, FLAG_STRICT]);
        let mut parser = ConfigParser::new(["-s", "-m=/", "key"]);
        set.parse_flags(&mut parser).unwrap();

        assert_eq!(set.flags_str(), "-s -m=/");
        assert_eq!(parser.peek_token(), Some("key"));

        let mut again = FlagSet::new(&[FLAG_SUBSTRING, FLAG_STRICT]);
        again
            .parse_flags(&mut ConfigParser::from_line(&set.flags_str()).unwrap())
            .unwrap();
        assert_eq!(again.parameter(FLAG_SUBSTRING), "/");
        assert!(again.is_set(FLAG_STRICT));
    }

    #[test]
    fn test_flags_str_empty() {
        assert_eq!(FlagSet::new(&[FLAG_STRICT]).flags_str(), "");
    }

    #[test]
    fn test_parse_flags_errors() {
        let mut set = FlagSet::new(&[FLAG_CASE_INSENSITIVE, FLAG_SUBSTRING]);

        let err = set
            .parse_flags(&mut ConfigParser::new(["-x"]))
            .unwrap_err();
        assert!(matches!(err, AclError::UnsupportedFlag { flag: 'x' }));

        let err = set
            .parse_flags(&mut ConfigParser::new(["-i=yes"]))
            .unwrap_err();
        assert!(matches!(err, AclError::UnexpectedFlagParameter { flag: 'i', .. }));

        let err = set
            .parse_flags(&mut ConfigParser::new(["-m=ab"]))
            .unwrap_err();
        assert!(matches!(err, AclError::InvalidFlagParameter { flag: 'm', .. }));

        let err = set
            .parse_flags(&mut ConfigParser::new(["-1"]))
            .unwrap_err();
        assert!(matches!(err, AclError::InvalidFlag('1')));
    }

    #[test]
    fn test_parameter_supported() {
        let set = FlagSet::new(&[FLAG_SUBSTRING]);
        assert!(set.parameter_supported(FLAG_SUBSTRING, "/:"));
        assert!(!set.parameter_supported(FLAG_SUBSTRING, ""));
        assert!(!set.parameter_supported(FLAG_SUBSTRING, "a/"));
        assert!(set.parameter_supported(FLAG_STRICT, "anything"));
    }

    #[test]
    fn test_delimiters_cached() {
        let mut set = FlagSet::new(&[FLAG_STRICT, FLAG_SUBSTRING]);
        set.parse_flags(&mut ConfigParser::new(["-s", "-m=/"]))
            .unwrap();

        assert_eq!(set.parameter(FLAG_SUBSTRING), "/");
        let first = set.delimiters().unwrap();
        assert!(first.contains('/'));
        assert!(!first.contains(','));
        let second = set.delimiters().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_default_delimiters() {
        let mut set = FlagSet::new(&[FLAG_SUBSTRING]);
        set.parse_flags(&mut ConfigParser::new(["-m"])).unwrap();
        let delimiters = set.delimiters().unwrap();
        assert!(delimiters.contains(','));
        assert_eq!(
            delimiters.split("a,,b,c").collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }
}
