//! Session token validation
//!
//! A token is client-chosen and becomes part of a filesystem path, so it has
//! to pass a [`TokenPolicy`] before anything else happens with it. Rejections
//! are deliberately uninformative: every failed check produces the same
//! [`EngineError::InvalidParameters`].

use std::fmt;

use crate::compiler::errors::EngineError;
use crate::config::DEFAULT_TOKEN_PREFIX;

/// A token that has passed validation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Decides which raw tokens are acceptable
pub trait TokenPolicy: Send + Sync {
    fn validate(&self, raw: &str) -> Result<SessionToken, EngineError>;
}

/// Alphanumerics and hyphens, starting with a fixed prefix
#[derive(Debug, Clone)]
pub struct PrefixPolicy {
    prefix: String,
}

impl PrefixPolicy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn accepts(&self, raw: &str) -> bool {
        let mut stripped = raw.chars().filter(|c| *c != '-').peekable();
        stripped.peek().is_some()
            && stripped.all(char::is_alphanumeric)
            && raw.starts_with(&self.prefix)
    }
}

impl Default for PrefixPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_PREFIX)
    }
}

impl TokenPolicy for PrefixPolicy {
    fn validate(&self, raw: &str) -> Result<SessionToken, EngineError> {
        if self.accepts(raw) {
            Ok(SessionToken(raw.to_string()))
        } else {
            Err(EngineError::InvalidParameters)
        }
    }
}
