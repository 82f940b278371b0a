//! A validated, lowercased `type/subtype` MIME name used as the repository's lookup key.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A MIME type name, e.g. `image/png`. Always stored lowercased so callers never
/// have to remember to normalize before comparing or indexing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mime(String);

impl Mime {
    /// Builds a `Mime` from a raw name, rejecting empty strings and names with
    /// no `/` separator, and lowercasing the result.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, Error> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(Error::MalformedDatabase("empty mime-type name".into()));
        }
        if !raw.contains('/') {
            return Err(Error::MalformedDatabase(format!(
                "mime-type name missing '/': {raw}"
            )));
        }
        Ok(Mime(raw.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Mime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mime::new(s)
    }
}

impl AsRef<str> for Mime {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases() {
        assert_eq!(Mime::new("Image/PNG").unwrap().as_str(), "image/png");
    }

    #[test]
    fn rejects_empty() {
        assert!(Mime::new("").is_err());
    }

    #[test]
    fn rejects_missing_slash() {
        assert!(Mime::new("image-png").is_err());
    }
}
