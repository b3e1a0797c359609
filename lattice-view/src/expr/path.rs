//! Dotted-path expressions (`user.address.city`).

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::{Error, PathFault, Result};

/// A parsed, non-empty dotted path. Surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    expression: String,
    segments: SmallVec<[String; 4]>,
}

impl Path {
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(Error::path(expression, "", PathFault::Empty));
        }

        let mut segments = SmallVec::new();
        for segment in trimmed.split('.') {
            if segment.is_empty() {
                return Err(Error::path(trimmed, segment, PathFault::Empty));
            }
            if !segment.chars().all(is_identifier_char) {
                return Err(Error::path(trimmed, segment, PathFault::Invalid));
            }
            segments.push(segment.to_string());
        }

        Ok(Self {
            expression: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Every segment but the last, and the last.
    pub fn split_last(&self) -> (&[String], &str) {
        match self.segments.split_last() {
            Some((last, parents)) => (parents, last),
            None => (&[], ""),
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims() {
        let path = Path::parse("  user.address.city ").unwrap();
        assert_eq!(path.as_str(), "user.address.city");
        assert_eq!(path.segments(), ["user", "address", "city"]);

        let (parents, last) = path.split_last();
        assert_eq!(parents, ["user", "address"]);
        assert_eq!(last, "city");
    }

    #[test]
    fn accepts_dollar_and_digits() {
        let path: Path = "$data.items.0".parse().unwrap();
        assert_eq!(path.segments().len(), 3);
    }

    #[test]
    fn rejects_empty_segments() {
        for bad in ["", "   ", "a..b", ".a", "a."] {
            let err = Path::parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::Path { fault: PathFault::Empty, .. }),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_operators() {
        let err = Path::parse("a + b").unwrap_err();
        assert!(matches!(err, Error::Path { fault: PathFault::Invalid, .. }));

        let err = Path::parse("greet()").unwrap_err();
        assert!(matches!(err, Error::Path { fault: PathFault::Invalid, .. }));
    }
}
