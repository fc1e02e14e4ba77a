//! WAMP URI validation
//!
//! Topics and procedures are named by dot-separated URIs such as
//! `com.myapp.user.created`. The facade rejects malformed names at the
//! boundary with [`Error::InvalidArgument`] before anything reaches the
//! session.
//!
//! Rules applied (the loose WAMP URI form):
//! - not empty
//! - every component between dots is non-empty
//! - no whitespace and no `#`

use crate::{Error, Result};

/// Check that `uri` is a usable topic or procedure name
pub fn validate_uri(uri: &str) -> Result<()> {
    if uri.is_empty() {
        return Err(Error::InvalidArgument("URI must not be empty".to_string()));
    }

    if let Some(bad) = uri.chars().find(|c| c.is_whitespace() || *c == '#') {
        return Err(Error::InvalidArgument(format!(
            "URI '{uri}' contains invalid character {bad:?}"
        )));
    }

    if uri.split('.').any(str::is_empty) {
        return Err(Error::InvalidArgument(format!(
            "URI '{uri}' has an empty component"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_uris() {
        for uri in ["add2", "com.example.add2", "a.b.c_d", "com.example.topic-1"] {
            assert!(validate_uri(uri).is_ok(), "{uri} should be valid");
        }
    }

    #[test]
    fn test_invalid_uris() {
        for uri in ["", "com..example", ".com", "com.", "has space", "tab\tbed", "com.#"] {
            let err = validate_uri(uri).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{uri:?} should be rejected");
        }
    }
}
