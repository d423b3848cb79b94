//! Local credentials for administrator accounts.
//!
//! Administrators sign in with email and password, then confirm with a
//! one-time code sent by email. Passwords are stored as argon2 PHC strings.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
#[cfg(test)]
use argon2::{Algorithm, Params, Version};
use rand::Rng;

use crate::error::AuthenticationError;

/// Number of digits in an administrator one-time code.
pub const OTP_DIGITS: usize = 4;

fn argon2_instance() -> Argon2<'static> {
    #[cfg(test)]
    {
        // Minimal cost so the test suite stays fast.
        let params = Params::new(1024, 1, 1, None).expect("valid Argon2 params for tests");
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    #[cfg(not(test))]
    {
        Argon2::default()
    }
}

/// Hashes `password` with a fresh salt.
///
/// # Errors
///
/// Returns [`AuthenticationError::PasswordHashing`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthenticationError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2_instance()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthenticationError::PasswordHashing {
            reason: e.to_string(),
        })
}

/// Checks `password` against a stored PHC string.
///
/// An unparseable hash never verifies.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("stored password hash is not a valid PHC string");
        return false;
    };
    argon2_instance()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generates a zero-padded numeric one-time code.
#[must_use]
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..10_u32.pow(OTP_DIGITS as u32));
    format!("{code:0width$}", width = OTP_DIGITS)
}

/// Rejects an empty password before it reaches the hasher.
///
/// # Errors
///
/// Returns [`AuthenticationError::InvalidCredentials`] for an empty password.
pub fn require_password(password: &str) -> Result<&str, AuthenticationError> {
    if password.is_empty() {
        Err(AuthenticationError::InvalidCredentials)
    } else {
        Ok(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("pw").expect("hash");
        let b = hash_password("pw").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("pw", "not-a-phc-string"));
        assert!(!verify_password("pw", ""));
    }

    #[test]
    fn otp_is_four_digits() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert_eq!(otp.len(), OTP_DIGITS);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn empty_password_is_rejected() {
        assert_eq!(
            require_password(""),
            Err(AuthenticationError::InvalidCredentials)
        );
        assert_eq!(require_password("x"), Ok("x"));
    }
}
