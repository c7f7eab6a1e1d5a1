//! Argument guards used before any SQL is built.

use crate::{DaoError, DaoResult};

/// Unwraps a required optional argument.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] naming `name` when `value` is `None`.
pub fn require_param<T>(value: Option<T>, name: &str) -> DaoResult<T> {
    value.ok_or_else(|| DaoError::invalid_argument(format!("{name} is required")))
}

/// Checks that a required text argument is not blank.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] when `value` is empty or whitespace.
pub fn require_text<'a>(value: &'a str, name: &str) -> DaoResult<&'a str> {
    if value.trim().is_empty() {
        return Err(DaoError::invalid_argument(format!("{name} is required")));
    }
    Ok(value)
}

/// Checks that a required list argument has at least one element.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] when `values` is empty.
pub fn require_non_empty<'a, T>(values: &'a [T], name: &str) -> DaoResult<&'a [T]> {
    if values.is_empty() {
        return Err(DaoError::invalid_argument(format!("{name} must not be empty")));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_param() {
        assert_eq!(require_param(Some(3), "id").unwrap(), 3);
        let err = require_param(None::<i32>, "entity.id").unwrap_err();
        assert!(err.to_string().contains("entity.id is required"));
    }

    #[test]
    fn test_require_text_rejects_blank() {
        assert!(require_text("name", "field").is_ok());
        assert!(require_text("", "field").is_err());
        assert!(require_text("   ", "field").is_err());
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty(&[1], "ids").is_ok());
        assert!(require_non_empty::<i32>(&[], "ids").is_err());
    }
}
