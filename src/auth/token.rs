//! Bearer token verification and issuing (HS256 JWT)
//!
//! The server only ever *verifies* tokens; issuing belongs to the login
//! surface, which is a separate service. [`JwtIssuer`] exists so tests and
//! demos can mint tokens that [`JwtVerifier`] accepts.

use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::Identity;

/// Environment variable holding the shared token secret
pub const SECRET_ENV_VAR: &str = "SECRET_KEY";

/// Claims carried by a chat token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Display name
    pub sub: String,
    /// Numeric user id
    pub uid: i64,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

/// Error type for token operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token signature, structure, or claims are invalid
    Invalid,
    /// Token was valid once but has expired
    Expired,
    /// No signing secret available in the environment
    MissingSecret,
    /// Token could not be signed
    Signing,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Invalid => write!(f, "Invalid token"),
            AuthError::Expired => write!(f, "Token expired"),
            AuthError::MissingSecret => {
                write!(f, "{} is not set in the environment", SECRET_ENV_VAR)
            }
            AuthError::Signing => write!(f, "Failed to sign token"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Validates bearer tokens into identities.
///
/// Pure validation: implementations must not perform I/O.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// HS256 JWT verifier
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier from a shared secret
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Create a verifier from the `SECRET_KEY` environment variable
    pub fn from_env() -> Result<Self, AuthError> {
        let secret = std::env::var(SECRET_ENV_VAR).map_err(|_| AuthError::MissingSecret)?;
        Ok(Self::new(secret.as_bytes()))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            }
        })?;
        Ok(Identity::new(data.claims.uid, data.claims.sub))
    }
}

/// HS256 JWT issuer for demos and tests
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl JwtIssuer {
    /// Create an issuer with a 24 hour token lifetime
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(secret, Duration::from_secs(24 * 60 * 60))
    }

    /// Create an issuer with a custom token lifetime
    pub fn with_ttl(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Mint a token carrying `identity`
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        let claims = Claims {
            sub: identity.username.clone(),
            uid: identity.user_id,
            exp: chrono::Utc::now().timestamp() + self.ttl.as_secs() as i64,
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| AuthError::Signing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_issue_verify_roundtrip() {
        let issuer = JwtIssuer::new(SECRET);
        let verifier = JwtVerifier::new(SECRET);

        let identity = Identity::new(7, "alice");
        let token = issuer.issue(&identity).unwrap();
        let verified = verifier.verify(&token).unwrap();

        assert_eq!(verified, identity);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        assert_eq!(verifier.verify("not.a.token"), Err(AuthError::Invalid));
        assert_eq!(verifier.verify(""), Err(AuthError::Invalid));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtIssuer::new(b"other-secret");
        let verifier = JwtVerifier::new(SECRET);

        let token = issuer.issue(&Identity::new(1, "mallory")).unwrap();
        assert_eq!(verifier.verify(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = JwtVerifier::new(SECRET);

        // Well past the default 60s validation leeway
        let claims = Claims {
            sub: "alice".to_string(),
            uid: 7,
            exp: chrono::Utc::now().timestamp() - 600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(verifier.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_missing_uid_claim_rejected() {
        let verifier = JwtVerifier::new(SECRET);

        #[derive(Serialize)]
        struct Partial {
            sub: String,
            exp: i64,
        }
        let token = encode(
            &Header::default(),
            &Partial {
                sub: "alice".to_string(),
                exp: chrono::Utc::now().timestamp() + 600,
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(verifier.verify(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(SECRET_ENV_VAR, "env-secret");
        let verifier = JwtVerifier::from_env().unwrap();

        let token = JwtIssuer::new(b"env-secret")
            .issue(&Identity::new(3, "bob"))
            .unwrap();
        assert!(verifier.verify(&token).is_ok());
    }
}
