//! Database repositories for the job board.
//!
//! This module provides data access for:
//! - Users, including identity linking and admin credentials
//! - Profiles
//! - Awards

pub mod awards;
pub mod profiles;
pub mod users;

pub use awards::{AwardChanges, AwardFilter, AwardRecord, AwardRepository, NewAward};
pub use profiles::{CreateProfile, NewProfile, ProfileChanges, ProfileRecord, ProfileRepository};
pub use users::{FindOrCreate, Reinstate, UserChanges, UserFilter, UserRepository};

/// Returns true if `err` is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Wraps a column decoding failure as a `sqlx::Error`.
pub(crate) fn decode_error(column: &str, err: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {column}: {err}"),
    )))
}

/// Escapes `%`, `_` and `\` for use inside a `LIKE` pattern.
pub(crate) fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("ada"), "%ada%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn row_not_found_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn decode_error_names_column() {
        let err = decode_error("role", "unknown role 'x'");
        assert!(err.to_string().contains("invalid role"));
    }
}
