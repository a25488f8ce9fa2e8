//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum EmailError {
    /// Nothing was left after trimming.
    #[error("email is empty")]
    Empty,
    /// The input exceeds the length limit.
    #[error("email is longer than {0} characters")]
    TooLong(usize),
    /// The input is not `local@domain` with both sides non-empty, or it
    /// contains interior whitespace.
    #[error("email is not of the form local@domain")]
    Malformed,
}

/// An email address, normalized for comparison.
///
/// Accounts are keyed by email, and the same mailbox can arrive typed with
/// stray whitespace or different casing depending on the sign-in form it
/// came through. Parsing trims and lowercases, so two `Email` values compare
/// equal whenever they name the same mailbox.
///
/// Deserialization is transparent and does not re-validate: values read back
/// from the wire or from persisted state were produced by a trusted writer.
///
/// ```
/// use plateful_core::Email;
///
/// let typed = Email::parse(" Maya@Example.COM ").unwrap();
/// let stored = Email::parse("maya@example.com").unwrap();
/// assert_eq!(typed, stored);
///
/// assert!(Email::parse("maya.example.com").is_err());
/// assert!(Email::parse("@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Longest accepted address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email`, trimming surrounding whitespace and lowercasing.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] when the trimmed input is empty, too long, or
    /// not shaped like `local@domain`.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let candidate = input.trim();

        if candidate.is_empty() {
            return Err(EmailError::Empty);
        }
        if candidate.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong(Self::MAX_LENGTH));
        }

        let well_formed = candidate
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !well_formed || candidate.chars().any(char::is_whitespace) {
            return Err(EmailError::Malformed);
        }

        Ok(Self(candidate.to_lowercase()))
    }

    /// The normalized address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_addresses() {
        for input in ["maya@example.com", "m.okonkwo+food@mail.co.uk", "a@b"] {
            assert!(Email::parse(input).is_ok(), "rejected {input:?}");
        }
    }

    #[test]
    fn test_normalizes_case_and_surrounding_whitespace() {
        let email = Email::parse("  Maya@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "maya@example.com");
        assert_eq!(email, Email::parse("maya@example.com").unwrap());
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(matches!(Email::parse(""), Err(EmailError::Empty)));
        assert!(matches!(Email::parse("   "), Err(EmailError::Empty)));
    }

    #[test]
    fn test_rejects_overlong_input() {
        let long = format!("{}@example.com", "m".repeat(250));
        assert!(matches!(Email::parse(&long), Err(EmailError::TooLong(_))));
    }

    #[test]
    fn test_rejects_malformed_shapes() {
        for input in [
            "no-at-symbol",
            "@example.com",
            "maya@",
            "maya okonkwo@example.com",
        ] {
            assert!(
                matches!(Email::parse(input), Err(EmailError::Malformed)),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_serde_is_transparent() {
        let email = Email::parse("maya@example.com").unwrap();
        assert_eq!(
            serde_json::to_string(&email).unwrap(),
            "\"maya@example.com\""
        );

        // Decoding trusts the writer; no re-validation happens.
        let odd: Email = serde_json::from_str("\"Not An Email\"").unwrap();
        assert_eq!(odd.as_str(), "Not An Email");
    }

    #[test]
    fn test_from_str() {
        let email: Email = "maya@example.com".parse().unwrap();
        assert_eq!(email.as_str(), "maya@example.com");
    }
}
