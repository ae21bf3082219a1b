//! Template Dialects
//!
//! A [`Dialect`] is plain data describing one flavour of template syntax: the
//! transition character, the [`KeywordTable`] mapping reserved words to block
//! behaviour, and the lexical rules of the embedded code language. The parser
//! core never hard-codes a keyword; everything it knows about `if`, `model` or
//! `End Code` comes from here.
//!
//! Two dialects ship with the crate:
//!
//! | Dialect                  | Bodies         | Keywords         | Target |
//! |--------------------------|----------------|------------------|--------|
//! | [`Dialect::c_like`]      | `{ ... }`      | case sensitive   | C#     |
//! | [`Dialect::basic_like`]  | `... End If`   | case insensitive | VB     |
//!
//! Dialects can also be loaded from JSON:
//!
//! ```rust
//! use razorblade::engine::dialect::Dialect;
//!
//! let json = Dialect::c_like().to_json().unwrap();
//! let dialect = Dialect::from_json(&json).unwrap();
//! assert!(dialect.is_keyword("if"));
//! ```

use super::regex_cache;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How code bodies are delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementBoundary {
    /// Brace balanced bodies; markup may start after `{`, `}` or `;`
    Braces,
    /// Line oriented bodies closed by an end pattern; markup may start a line
    Lines,
}

/// Language the code generator targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetLanguage {
    /// C-family output
    CSharp,
    /// Basic-family output
    Basic,
}

/// Lexical rules of the embedded code language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxRules {
    /// Characters that open and close string literals
    pub string_delimiters: Vec<char>,
    /// Escape character inside strings; `None` means a doubled delimiter escapes
    #[serde(default)]
    pub escape: Option<char>,
    /// Line comment prefix
    #[serde(default)]
    pub line_comment: Option<String>,
    /// Block comment delimiters
    #[serde(default)]
    pub block_comment: Option<(String, String)>,
    /// Body style
    pub boundary: StatementBoundary,
}

/// Behaviour of a keyword statement (`if`, `foreach`, `While`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRule {
    /// Keywords that may continue the statement after its body (`else`, `catch`)
    #[serde(default)]
    pub continuations: Vec<String>,
    /// Pattern matching the line that closes a line-oriented body
    #[serde(default)]
    pub end: Option<String>,
    /// Pattern matching a line that opens a nested body of the same kind
    #[serde(default)]
    pub nest: Option<String>,
}

/// Directive semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    /// Declares the model type
    ModelType,
    /// Declares the base class
    BaseType,
    /// Sets the layout page
    Layout,
    /// Imports a namespace
    Import,
    /// Opens a named section
    Section,
    /// Defines a helper
    Helper,
    /// Adds class members
    Functions,
}

/// Behaviour of a directive keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveRule {
    /// What the directive does
    pub kind: DirectiveKind,
    /// May appear at most once per document
    #[serde(default)]
    pub unique: bool,
    /// Directive kinds that may not appear in the same document
    #[serde(default)]
    pub excludes: Vec<DirectiveKind>,
    /// Pattern closing a line-oriented directive body
    #[serde(default)]
    pub end: Option<String>,
}

impl DirectiveRule {
    /// A directive with no constraints
    pub fn new(kind: DirectiveKind) -> Self {
        Self {
            kind,
            unique: false,
            excludes: Vec::new(),
            end: None,
        }
    }

    /// Allow only one occurrence
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Conflict with another directive kind
    pub fn excludes(mut self, kind: DirectiveKind) -> Self {
        self.excludes.push(kind);
        self
    }

    /// Close the body with a line pattern
    pub fn with_end(mut self, pattern: impl Into<String>) -> Self {
        self.end = Some(pattern.into());
        self
    }
}

/// What a keyword introduces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeywordBehavior {
    /// A control-flow statement with a body
    Statement(StatementRule),
    /// A plain code block closed by a line pattern (`Code ... End Code`)
    CodeBlock {
        /// Pattern closing the block
        end: String,
    },
    /// A directive
    Directive(DirectiveRule),
    /// A word that may not follow the transition
    Reserved,
}

/// Injected mapping from reserved word to behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTable {
    case_sensitive: bool,
    entries: HashMap<String, KeywordBehavior>,
}

impl KeywordTable {
    /// Create an empty table
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            entries: HashMap::new(),
        }
    }

    fn key(&self, word: &str) -> String {
        if self.case_sensitive {
            word.to_string()
        } else {
            word.to_lowercase()
        }
    }

    /// Whether lookups are case sensitive
    #[inline]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Register a keyword, replacing any previous behaviour
    pub fn insert(&mut self, keyword: &str, behavior: KeywordBehavior) {
        let key = self.key(keyword);
        self.entries.insert(key, behavior);
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, keyword: &str, behavior: KeywordBehavior) -> Self {
        self.insert(keyword, behavior);
        self
    }

    /// Behaviour of `word`
    pub fn get(&self, word: &str) -> Option<&KeywordBehavior> {
        if self.case_sensitive {
            self.entries.get(word)
        } else {
            self.entries.get(&word.to_lowercase())
        }
    }

    /// Whether `word` is a keyword
    pub fn contains(&self, word: &str) -> bool {
        self.get(word).is_some()
    }

    /// Number of keywords
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keywords and behaviours, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeywordBehavior)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn normalize_keys(&mut self) {
        if !self.case_sensitive {
            let entries = std::mem::take(&mut self.entries);
            self.entries = entries
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect();
        }
    }
}

/// Invalid dialect definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialectError {
    /// JSON could not be read or written
    Json(String),
    /// The transition must be a visible non-word character
    InvalidTransition(char),
    /// A keyword pattern does not compile
    InvalidPattern {
        /// Keyword owning the pattern
        keyword: String,
        /// The pattern
        pattern: String,
    },
    /// Line-oriented dialects need end patterns on every block keyword
    MissingEndPattern {
        /// Keyword lacking a pattern
        keyword: String,
    },
}

impl fmt::Display for DialectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectError::Json(e) => write!(f, "Invalid dialect JSON: {}", e),
            DialectError::InvalidTransition(ch) => {
                write!(f, "Invalid transition character {:?}", ch)
            }
            DialectError::InvalidPattern { keyword, pattern } => {
                write!(f, "Invalid pattern for keyword '{}': {}", keyword, pattern)
            }
            DialectError::MissingEndPattern { keyword } => {
                write!(f, "Keyword '{}' needs an end pattern", keyword)
            }
        }
    }
}

impl std::error::Error for DialectError {}

/// A complete template syntax description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
    /// Display name
    pub name: String,
    /// Character switching from markup to code
    pub transition: char,
    /// Reserved words
    pub keywords: KeywordTable,
    /// Code lexing rules
    pub syntax: SyntaxRules,
    /// Whether implicit expressions keep a trailing `.`
    pub accept_trailing_dot: bool,
    /// Code generation target
    pub language: TargetLanguage,
}

impl Dialect {
    /// Whether `word` is a keyword of this dialect
    #[inline]
    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }

    /// Behaviour of `word`
    #[inline]
    pub fn keyword(&self, word: &str) -> Option<&KeywordBehavior> {
        self.keywords.get(word)
    }

    /// Whether bodies are line oriented
    #[inline]
    pub fn uses_lines(&self) -> bool {
        self.syntax.boundary == StatementBoundary::Lines
    }

    /// Check the definition and normalize keyword case
    pub fn validate(mut self) -> Result<Self, DialectError> {
        if self.transition.is_alphanumeric() || self.transition.is_whitespace() {
            return Err(DialectError::InvalidTransition(self.transition));
        }
        self.keywords.normalize_keys();

        let lines = self.uses_lines();
        for (keyword, behavior) in self.keywords.iter() {
            let patterns: Vec<&String> = match behavior {
                KeywordBehavior::Statement(rule) => {
                    if lines && rule.end.is_none() {
                        return Err(DialectError::MissingEndPattern {
                            keyword: keyword.to_string(),
                        });
                    }
                    rule.end.iter().chain(rule.nest.iter()).collect()
                }
                KeywordBehavior::CodeBlock { end } => vec![end],
                KeywordBehavior::Directive(rule) => {
                    let has_body = matches!(
                        rule.kind,
                        DirectiveKind::Section | DirectiveKind::Helper | DirectiveKind::Functions
                    );
                    if lines && has_body && rule.end.is_none() {
                        return Err(DialectError::MissingEndPattern {
                            keyword: keyword.to_string(),
                        });
                    }
                    rule.end.iter().collect()
                }
                KeywordBehavior::Reserved => Vec::new(),
            };
            for pattern in patterns {
                if !regex_cache::is_valid(pattern) {
                    return Err(DialectError::InvalidPattern {
                        keyword: keyword.to_string(),
                        pattern: pattern.clone(),
                    });
                }
            }
        }
        Ok(self)
    }

    /// Load and validate a dialect from JSON
    pub fn from_json(json: &str) -> Result<Self, DialectError> {
        let dialect: Dialect =
            serde_json::from_str(json).map_err(|e| DialectError::Json(e.to_string()))?;
        dialect.validate()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, DialectError> {
        serde_json::to_string_pretty(self).map_err(|e| DialectError::Json(e.to_string()))
    }

    /// Brace-delimited dialect targeting C#
    pub fn c_like() -> Self {
        use DirectiveKind::*;

        let statement = |continuations: &[&str]| {
            KeywordBehavior::Statement(StatementRule {
                continuations: continuations.iter().map(|s| s.to_string()).collect(),
                end: None,
                nest: None,
            })
        };

        let keywords = KeywordTable::new(true)
            .with("if", statement(&["else"]))
            .with("for", statement(&[]))
            .with("foreach", statement(&[]))
            .with("while", statement(&[]))
            .with("switch", statement(&[]))
            .with("lock", statement(&[]))
            .with("do", statement(&["while"]))
            .with("try", statement(&["catch", "finally"]))
            .with(
                "model",
                KeywordBehavior::Directive(DirectiveRule::new(ModelType).unique().excludes(BaseType)),
            )
            .with(
                "inherits",
                KeywordBehavior::Directive(DirectiveRule::new(BaseType).unique().excludes(ModelType)),
            )
            .with(
                "layout",
                KeywordBehavior::Directive(DirectiveRule::new(Layout).unique()),
            )
            .with("using", KeywordBehavior::Directive(DirectiveRule::new(Import)))
            .with("section", KeywordBehavior::Directive(DirectiveRule::new(Section)))
            .with("helper", KeywordBehavior::Directive(DirectiveRule::new(Helper)))
            .with(
                "functions",
                KeywordBehavior::Directive(DirectiveRule::new(Functions)),
            )
            .with("namespace", KeywordBehavior::Reserved)
            .with("class", KeywordBehavior::Reserved);

        Self {
            name: "c-like".to_string(),
            transition: '@',
            keywords,
            syntax: SyntaxRules {
                string_delimiters: vec!['"', '\''],
                escape: Some('\\'),
                line_comment: Some("//".to_string()),
                block_comment: Some(("/*".to_string(), "*/".to_string())),
                boundary: StatementBoundary::Braces,
            },
            accept_trailing_dot: false,
            language: TargetLanguage::CSharp,
        }
    }

    /// Line-oriented, case-insensitive dialect targeting VB
    pub fn basic_like() -> Self {
        use DirectiveKind::*;

        let statement = |end: &str, nest: &str| {
            KeywordBehavior::Statement(StatementRule {
                continuations: Vec::new(),
                end: Some(format!(r"(?i)^{}", end)),
                nest: Some(format!(r"(?i)^{}", nest)),
            })
        };

        let keywords = KeywordTable::new(false)
            .with("If", statement(r"End\s+If\b", r"If\b.*\bThen\s*$"))
            .with("Do", statement(r"Loop\b", r"Do\b"))
            .with("For", statement(r"Next\b", r"For\b"))
            .with("While", statement(r"End\s+While\b", r"While\b"))
            .with("Select", statement(r"End\s+Select\b", r"Select\s+Case\b"))
            .with("Using", statement(r"End\s+Using\b", r"Using\b"))
            .with("Try", statement(r"End\s+Try\b", r"Try\b"))
            .with("With", statement(r"End\s+With\b", r"With\b"))
            .with("SyncLock", statement(r"End\s+SyncLock\b", r"SyncLock\b"))
            .with(
                "Code",
                KeywordBehavior::CodeBlock {
                    end: r"(?i)^End\s+Code\b".to_string(),
                },
            )
            .with(
                "ModelType",
                KeywordBehavior::Directive(DirectiveRule::new(ModelType).unique().excludes(BaseType)),
            )
            .with(
                "Inherits",
                KeywordBehavior::Directive(DirectiveRule::new(BaseType).unique().excludes(ModelType)),
            )
            .with(
                "Layout",
                KeywordBehavior::Directive(DirectiveRule::new(Layout).unique()),
            )
            .with("Imports", KeywordBehavior::Directive(DirectiveRule::new(Import)))
            .with(
                "Section",
                KeywordBehavior::Directive(
                    DirectiveRule::new(Section).with_end(r"(?i)^End\s+Section\b"),
                ),
            )
            .with(
                "Helper",
                KeywordBehavior::Directive(
                    DirectiveRule::new(Helper).with_end(r"(?i)^End\s+Helper\b"),
                ),
            )
            .with(
                "Functions",
                KeywordBehavior::Directive(
                    DirectiveRule::new(Functions).with_end(r"(?i)^End\s+Functions\b"),
                ),
            )
            .with("Namespace", KeywordBehavior::Reserved)
            .with("Class", KeywordBehavior::Reserved);

        Self {
            name: "basic-like".to_string(),
            transition: '@',
            keywords,
            syntax: SyntaxRules {
                string_delimiters: vec!['"'],
                escape: None,
                line_comment: Some("'".to_string()),
                block_comment: None,
                boundary: StatementBoundary::Lines,
            },
            accept_trailing_dot: true,
            language: TargetLanguage::Basic,
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::c_like()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_like_keywords_are_case_sensitive() {
        let dialect = Dialect::c_like();
        assert!(dialect.is_keyword("if"));
        assert!(!dialect.is_keyword("If"));
        assert!(matches!(
            dialect.keyword("model"),
            Some(KeywordBehavior::Directive(DirectiveRule {
                kind: DirectiveKind::ModelType,
                unique: true,
                ..
            }))
        ));
    }

    #[test]
    fn test_basic_like_keywords_ignore_case() {
        let dialect = Dialect::basic_like();
        assert!(dialect.is_keyword("if"));
        assert!(!dialect.is_keyword("END"));
        assert!(dialect.is_keyword("modeltype"));
        assert!(dialect.is_keyword("CODE"));
    }

    #[test]
    fn test_builtin_dialects_validate() {
        assert!(Dialect::c_like().validate().is_ok());
        assert!(Dialect::basic_like().validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_keeps_keywords() {
        let json = Dialect::basic_like().to_json().unwrap();
        let dialect = Dialect::from_json(&json).unwrap();
        assert_eq!(dialect, Dialect::basic_like());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut dialect = Dialect::c_like();
        dialect.transition = 'x';
        assert_eq!(
            dialect.validate().unwrap_err(),
            DialectError::InvalidTransition('x')
        );
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut dialect = Dialect::basic_like();
        dialect.keywords.insert(
            "Broken",
            KeywordBehavior::CodeBlock {
                end: "(".to_string(),
            },
        );
        assert!(matches!(
            dialect.validate(),
            Err(DialectError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_custom_dialect_from_json() {
        let json = r#"{
            "name": "tiny",
            "transition": "~",
            "keywords": {
                "case_sensitive": true,
                "entries": { "when": { "Statement": { "continuations": ["otherwise"] } } }
            },
            "syntax": { "string_delimiters": ["\""], "boundary": "Braces" },
            "accept_trailing_dot": false,
            "language": "CSharp"
        }"#;
        let dialect = Dialect::from_json(json).unwrap();
        assert_eq!(dialect.transition, '~');
        assert!(dialect.is_keyword("when"));
        assert!(!dialect.is_keyword("if"));
    }
}
