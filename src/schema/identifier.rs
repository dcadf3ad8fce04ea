use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Checks that the given name can be safely used as an unquoted table,
/// column, index or constraint name.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER_REGEX.is_match(name) {
        Ok(name)
    } else {
        Err(Error::invalid_identifier(name))
    }
}

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_REGEX.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::{is_valid_identifier, validate_identifier};
    use crate::error::ErrorKind;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(is_valid_identifier("migration_version"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("Users2"));
    }

    #[test]
    fn rejects_anything_else() {
        for name in ["", "2fast", "user name", "users;DROP TABLE x", "\"quoted\""] {
            let err = validate_identifier(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
        }
    }
}
