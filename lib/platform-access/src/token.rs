//! Access token issuance and verification.
//!
//! Access tokens are HS256 JWTs carrying `{authorized, provider_id, exp}`.
//! They are not stored server-side and cannot be revoked; `exp` is the only
//! lifecycle control. Web clients get 30 minutes, mobile clients a year.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AuthenticationError;

/// User-agent fragments that mark a mobile client.
const MOBILE_AGENT_MARKERS: [&str; 3] = ["Android", "iPhone", "iPad"];

/// Token lifetime for browser clients.
#[must_use]
pub fn web_token_lifetime() -> Duration {
    Duration::minutes(30)
}

/// Token lifetime for mobile clients.
#[must_use]
pub fn mobile_token_lifetime() -> Duration {
    Duration::days(365)
}

/// Returns true if the `User-Agent` header names a mobile client.
#[must_use]
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    MOBILE_AGENT_MARKERS
        .iter()
        .any(|marker| user_agent.contains(marker))
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Always true for tokens minted here.
    pub authorized: bool,
    /// The user's `provider_id`.
    pub provider_id: String,
    /// Expiry as a UNIX timestamp in seconds.
    pub exp: i64,
}

/// A freshly signed token and the claims inside it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: AccessClaims,
}

/// Signs and verifies access tokens with the server-wide HMAC secret.
#[derive(Clone)]
pub struct AccessTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for AccessTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenIssuer").finish_non_exhaustive()
    }
}

impl AccessTokenIssuer {
    /// Creates an issuer for `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::InvalidSigningKey`] for an empty secret.
    pub fn new(secret: &str) -> Result<Self, AuthenticationError> {
        if secret.trim().is_empty() {
            return Err(AuthenticationError::InvalidSigningKey);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Issues a token for `provider_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::TokenSigning`] if encoding fails.
    pub fn issue(
        &self,
        provider_id: &str,
        is_mobile: bool,
    ) -> Result<IssuedToken, AuthenticationError> {
        let lifetime = if is_mobile {
            mobile_token_lifetime()
        } else {
            web_token_lifetime()
        };
        let claims = AccessClaims {
            authorized: true,
            provider_id: provider_id.to_string(),
            exp: (Utc::now() + lifetime).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthenticationError::TokenSigning {
                reason: e.to_string(),
            })?;

        tracing::debug!(provider_id, is_mobile, exp = claims.exp, "Issued access token");
        Ok(IssuedToken { token, claims })
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Only HS256 is accepted, whatever the token's header claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::InvalidToken`] for any signature,
    /// algorithm, expiry or claim failure.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthenticationError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| AuthenticationError::InvalidToken {
                reason: format!("{:?}", e.kind()),
            },
        )?;

        if !data.claims.authorized {
            return Err(AuthenticationError::InvalidToken {
                reason: "token is not authorized".to_string(),
            });
        }
        if data.claims.provider_id.is_empty() {
            return Err(AuthenticationError::InvalidToken {
                reason: "empty provider_id".to_string(),
            });
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const SECRET: &str = "test-secret-key";

    fn issuer() -> AccessTokenIssuer {
        AccessTokenIssuer::new(SECRET).expect("issuer")
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            AccessTokenIssuer::new(""),
            Err(AuthenticationError::InvalidSigningKey)
        ));
        assert!(AccessTokenIssuer::new("   ").is_err());
    }

    #[test]
    fn web_token_expires_in_thirty_minutes() {
        let before = Utc::now();
        let issued = issuer().issue("12345", false).expect("issue");
        let after = Utc::now();

        assert!(issued.claims.exp >= (before + Duration::minutes(29)).timestamp());
        assert!(issued.claims.exp <= (after + Duration::minutes(30)).timestamp());
        assert!(issued.claims.authorized);
        assert_eq!(issued.claims.provider_id, "12345");
    }

    #[test]
    fn mobile_token_expires_in_a_year() {
        let before = Utc::now();
        let issued = issuer().issue("12345", true).expect("issue");
        let after = Utc::now();

        assert!(issued.claims.exp >= (before + Duration::days(364)).timestamp());
        assert!(issued.claims.exp <= (after + Duration::days(365)).timestamp());
    }

    #[test]
    fn verify_round_trips_issue() {
        let issuer = issuer();
        let issued = issuer.issue("12345", false).expect("issue");
        let claims = issuer.verify(&issued.token).expect("verify");
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let issued = issuer().issue("12345", false).expect("issue");
        let other = AccessTokenIssuer::new("another-secret").expect("issuer");
        assert!(matches!(
            other.verify(&issued.token),
            Err(AuthenticationError::InvalidToken { .. })
        ));
    }

    #[test]
    fn other_hmac_algorithm_is_invalid_even_with_right_secret() {
        let claims = AccessClaims {
            authorized: true,
            provider_id: "12345".to_string(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");

        let err = issuer().verify(&token).expect_err("should reject");
        assert!(matches!(err, AuthenticationError::InvalidToken { .. }));
    }

    #[test]
    fn unsigned_token_is_invalid() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let payload = URL_SAFE_NO_PAD.encode(
            format!(r#"{{"authorized":true,"provider_id":"12345","exp":{exp}}}"#).as_bytes(),
        );
        let token = format!("{header}.{payload}.");

        assert!(issuer().verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_invalid() {
        let claims = AccessClaims {
            authorized: true,
            provider_id: "12345".to_string(),
            exp: (Utc::now() - Duration::minutes(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");

        assert!(issuer().verify(&token).is_err());
    }

    #[test]
    fn missing_provider_id_is_invalid() {
        #[derive(Serialize)]
        struct Partial {
            authorized: bool,
            exp: i64,
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Partial {
                authorized: true,
                exp: (Utc::now() + Duration::minutes(5)).timestamp(),
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");

        assert!(matches!(
            issuer().verify(&token),
            Err(AuthenticationError::InvalidToken { .. })
        ));
    }

    #[test]
    fn wrong_typed_provider_id_is_invalid() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({
                "authorized": true,
                "provider_id": 12345,
                "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
            }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");

        assert!(issuer().verify(&token).is_err());
    }

    #[test]
    fn mobile_detection_matches_markers_only() {
        assert!(is_mobile_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"
        ));
        assert!(is_mobile_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8)"));
        assert!(is_mobile_user_agent("Mozilla/5.0 (iPad; CPU OS 17_0)"));
        assert!(!is_mobile_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0"
        ));
        assert!(!is_mobile_user_agent("android-lowercase"));
        assert!(!is_mobile_user_agent(""));
    }
}
