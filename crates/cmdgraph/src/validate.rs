//! Value validation: allowed values, built-in rules and patterns.
//!
//! Three independent checks run on the raw tokens of a symbol, in this
//! order:
//!
//! 1. the allowed-value set,
//! 2. the enabled [`ValidationRules`] flags, in declaration order,
//! 3. the regex pattern.
//!
//! Each check reports at most one error, for its first failing token. The
//! rule set stops at the first rule that fails.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use regex::Regex;
use url::Url;

use crate::error::{AuthoringError, ParseError};
use crate::fs::FileSystem;

/// Built-in validation rules, combinable with `|`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValidationRules(u16);

impl ValidationRules {
    pub const NONE: Self = Self(0);
    pub const EXISTING_FILE: Self = Self(1);
    pub const NON_EXISTING_FILE: Self = Self(1 << 1);
    pub const EXISTING_DIRECTORY: Self = Self(1 << 2);
    pub const NON_EXISTING_DIRECTORY: Self = Self(1 << 3);
    pub const EXISTING_FILE_OR_DIRECTORY: Self = Self(1 << 4);
    pub const NON_EXISTING_FILE_OR_DIRECTORY: Self = Self(1 << 5);
    pub const LEGAL_PATH: Self = Self(1 << 6);
    pub const LEGAL_FILE_NAME: Self = Self(1 << 7);
    pub const LEGAL_URI: Self = Self(1 << 8);
    pub const LEGAL_URL: Self = Self(1 << 9);

    const ORDERED: [(Self, &'static str); 10] = [
        (Self::EXISTING_FILE, "EXISTING_FILE"),
        (Self::NON_EXISTING_FILE, "NON_EXISTING_FILE"),
        (Self::EXISTING_DIRECTORY, "EXISTING_DIRECTORY"),
        (Self::NON_EXISTING_DIRECTORY, "NON_EXISTING_DIRECTORY"),
        (Self::EXISTING_FILE_OR_DIRECTORY, "EXISTING_FILE_OR_DIRECTORY"),
        (Self::NON_EXISTING_FILE_OR_DIRECTORY, "NON_EXISTING_FILE_OR_DIRECTORY"),
        (Self::LEGAL_PATH, "LEGAL_PATH"),
        (Self::LEGAL_FILE_NAME, "LEGAL_FILE_NAME"),
        (Self::LEGAL_URI, "LEGAL_URI"),
        (Self::LEGAL_URL, "LEGAL_URL"),
    ];

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn iter(self) -> impl Iterator<Item = Self> {
        Self::ORDERED
            .into_iter()
            .map(|(rule, _)| rule)
            .filter(move |rule| self.contains(*rule))
    }
}

impl fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::ORDERED
            .iter()
            .filter(|(rule, _)| self.contains(*rule))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

impl BitOr for ValidationRules {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ValidationRules {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Declared constraints on a symbol's values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueConstraints {
    pub allowed_values: Vec<String>,
    pub rules: ValidationRules,
    pub pattern: Option<String>,
    pub pattern_message: Option<String>,
}

/// [`ValueConstraints`] with the pattern compiled.
#[derive(Debug, Clone, Default)]
pub(crate) struct Validator {
    allowed_values: Vec<String>,
    rules: ValidationRules,
    pattern: Option<Regex>,
    pattern_message: Option<String>,
}

impl Validator {
    pub(crate) fn compile(member: &str, constraints: &ValueConstraints) -> Result<Self, AuthoringError> {
        let pattern = constraints
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|source| AuthoringError::InvalidPattern {
                member: member.to_string(),
                source,
            })?;

        Ok(Self {
            allowed_values: constraints.allowed_values.clone(),
            rules: constraints.rules,
            pattern,
            pattern_message: constraints.pattern_message.clone(),
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.allowed_values.is_empty() && self.rules.is_empty() && self.pattern.is_none()
    }

    pub(crate) fn allowed_values(&self) -> &[String] {
        &self.allowed_values
    }

    /// Checks the tokens supplied for `symbol`.
    pub(crate) fn check(
        &self,
        symbol: &str,
        tokens: &[String],
        fs: &dyn FileSystem,
    ) -> Vec<ParseError> {
        let mut errors = Vec::new();

        if !self.allowed_values.is_empty() {
            if let Some(token) = tokens.iter().find(|t| !self.allowed_values.contains(t)) {
                let allowed: Vec<String> =
                    self.allowed_values.iter().map(|v| format!("'{}'", v)).collect();
                errors.push(ParseError::validation(
                    symbol,
                    format!(
                        "Argument '{}' not recognized. Must be one of: {}.",
                        token,
                        allowed.join(", ")
                    ),
                ));
            }
        }

        let failed_rule = self.rules.iter().find_map(|rule| {
            tokens
                .iter()
                .find(|t| !passes(rule, t, fs))
                .map(|token| rule_message(rule, token))
        });
        if let Some(message) = failed_rule {
            errors.push(ParseError::validation(symbol, message));
        }

        if let Some(pattern) = &self.pattern {
            if let Some(token) = tokens.iter().find(|t| !pattern.is_match(t)) {
                let message = match &self.pattern_message {
                    Some(custom) => custom.replace("{value}", token),
                    None => format!(
                        "Value '{}' does not match the pattern '{}'.",
                        token,
                        pattern.as_str()
                    ),
                };
                errors.push(ParseError::validation(symbol, message));
            }
        }

        errors
    }
}

fn passes(rule: ValidationRules, token: &str, fs: &dyn FileSystem) -> bool {
    match rule {
        ValidationRules::EXISTING_FILE => fs.file_exists(token),
        ValidationRules::NON_EXISTING_FILE => !fs.file_exists(token),
        ValidationRules::EXISTING_DIRECTORY => fs.directory_exists(token),
        ValidationRules::NON_EXISTING_DIRECTORY => !fs.directory_exists(token),
        ValidationRules::EXISTING_FILE_OR_DIRECTORY => {
            fs.file_exists(token) || fs.directory_exists(token)
        }
        ValidationRules::NON_EXISTING_FILE_OR_DIRECTORY => {
            !fs.file_exists(token) && !fs.directory_exists(token)
        }
        ValidationRules::LEGAL_PATH => {
            !token.is_empty() && !token.contains(fs.invalid_path_chars())
        }
        ValidationRules::LEGAL_FILE_NAME => {
            !token.is_empty() && !token.contains(fs.invalid_file_name_chars())
        }
        ValidationRules::LEGAL_URI => is_legal_uri(token),
        ValidationRules::LEGAL_URL => is_legal_url(token),
        _ => true,
    }
}

fn rule_message(rule: ValidationRules, token: &str) -> String {
    match rule {
        ValidationRules::EXISTING_FILE => format!("File does not exist: '{}'.", token),
        ValidationRules::NON_EXISTING_FILE => format!("File already exists: '{}'.", token),
        ValidationRules::EXISTING_DIRECTORY => format!("Directory does not exist: '{}'.", token),
        ValidationRules::NON_EXISTING_DIRECTORY => {
            format!("Directory already exists: '{}'.", token)
        }
        ValidationRules::EXISTING_FILE_OR_DIRECTORY => {
            format!("File or directory does not exist: '{}'.", token)
        }
        ValidationRules::NON_EXISTING_FILE_OR_DIRECTORY => {
            format!("File or directory already exists: '{}'.", token)
        }
        ValidationRules::LEGAL_PATH => format!("Character not allowed in a path: '{}'.", token),
        ValidationRules::LEGAL_FILE_NAME => {
            format!("Character not allowed in a file name: '{}'.", token)
        }
        ValidationRules::LEGAL_URI => format!("Value is not a legal URI: '{}'.", token),
        _ => format!("Value is not a legal HTTP or HTTPS URL: '{}'.", token),
    }
}

/// Absolute URIs, or relative references without whitespace.
fn is_legal_uri(token: &str) -> bool {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return false;
    }
    if Url::parse(token).is_ok() {
        return true;
    }
    Url::parse("http://localhost/")
        .and_then(|base| base.join(token))
        .is_ok()
}

fn is_legal_url(token: &str) -> bool {
    match Url::parse(token) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}
