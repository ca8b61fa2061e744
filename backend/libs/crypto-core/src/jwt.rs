/// Shared JWT module for the direct-chat services
///
/// Bearer tokens are HS256-signed with a single process-wide secret. The
/// secret is loaded once at startup into a [`JwtVerifier`] which is then
/// shared by reference (REST middleware and websocket handshake) and never
/// mutated.
///
/// ## Usage
///
/// ```rust,ignore
/// use crypto_core::jwt::JwtVerifier;
///
/// let secret = std::env::var("JWT_SECRET")?;
/// let verifier = JwtVerifier::from_secret(secret.as_bytes())?;
///
/// let user_id = verifier.verify(Some(token))?;
/// ```
///
/// Token issuance for real users is owned by the external credential service.
/// [`JwtIssuer`] exists for tests and local tooling.
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Tokens minted by the local issuer live for a day, matching the legacy
/// credential service.
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Only HS256 is accepted. Tokens carrying any other `alg` are rejected.
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

// ============================================================================
// Data Structures
// ============================================================================

/// JWT claims
///
/// `sub` carries the user id. Tokens minted by the legacy issuer used an `id`
/// claim instead; when both are present `sub` wins. Either may be a JSON
/// string or an integer and is normalized to its decimal string form.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Claims {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// User id the token was issued for, if any claim carries a non-blank one
    pub fn subject(&self) -> Option<&str> {
        [self.sub.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSubject {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<RawSubject>::deserialize(deserializer)?;
    Ok(raw.map(|subject| match subject {
        RawSubject::Text(s) => s,
        RawSubject::Signed(n) => n.to_string(),
        RawSubject::Unsigned(n) => n.to_string(),
    }))
}

/// Verification failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("no token provided")]
    MissingToken,

    #[error("invalid or expired token: {0}")]
    InvalidToken(String),
}

// ============================================================================
// Verification
// ============================================================================

/// Validates bearer tokens and extracts the user id
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithm", &JWT_ALGORITHM)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// Build a verifier from the shared secret
    ///
    /// ## Errors
    ///
    /// Returns error if the secret is empty.
    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(anyhow!("JWT secret must not be empty"));
        }

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Allow `secs` of clock skew when checking `exp`
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.validation.leeway = secs;
        self
    }

    /// Validate a token and return its claims
    ///
    /// `None`, an empty string, or whitespace all count as a missing token.
    pub fn decode_claims(&self, token: Option<&str>) -> Result<Claims, TokenError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingToken)?;

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "token expired".to_string(),
                ErrorKind::InvalidSignature => "signature mismatch".to_string(),
                ErrorKind::InvalidAlgorithm => "unsupported algorithm".to_string(),
                _ => e.to_string(),
            };
            TokenError::InvalidToken(reason)
        })?;

        if data.claims.subject().is_none() {
            return Err(TokenError::InvalidToken("empty subject".to_string()));
        }

        Ok(data.claims)
    }

    /// Validate a token and return the user id it was issued for
    pub fn verify(&self, token: Option<&str>) -> Result<String, TokenError> {
        let claims = self.decode_claims(token)?;
        claims
            .subject()
            .map(str::to_string)
            .ok_or_else(|| TokenError::InvalidToken("empty subject".to_string()))
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
///
/// Any other scheme yields `None`, which verification reports as a missing
/// token.
pub fn bearer_token(header_value: Option<&str>) -> Option<&str> {
    header_value
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// ============================================================================
// Issuance (tests and local tooling)
// ============================================================================

/// Mints HS256 tokens with the shared secret
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(anyhow!("JWT secret must not be empty"));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Mint a token for `user_id` valid for the configured ttl
    pub fn generate_access_token(&self, user_id: &str) -> Result<String> {
        self.generate_token_expiring_at(user_id, Utc::now() + self.ttl)
    }

    /// Mint a token with an explicit expiry (may be in the past)
    pub fn generate_token_expiring_at(&self, user_id: &str, expires_at: DateTime<Utc>) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: Some(user_id.to_string()),
            id: None,
            iat: now.timestamp().min(expires_at.timestamp()),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to generate access token: {e}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
