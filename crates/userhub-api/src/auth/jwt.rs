//! JWT token encoding and decoding
//!
//! Implements the token codec with HMAC-SHA256 signing. Access and refresh
//! tokens are signed with separate secrets (the refresh secret falls back to
//! the access secret when not configured).
//!
//! Claim shapes:
//! - access:  `{sub, role, iat, exp, jti}`
//! - refresh: `{sub, iat, exp, kind: "refresh", jti}`
//!
//! Decoding checks signature and structure only; expiry and revocation are
//! evaluated by [`TokenService`](super::token::TokenService).

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use userhub_core::{AuthConfig, Identity, Role};
use uuid::Uuid;

/// Token class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, authorizes API calls
    #[default]
    Access,
    /// Long-lived, authorizes issuing a new token pair
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    fn is_access(&self) -> bool {
        *self == TokenKind::Access
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,
    /// User's role; present on access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: u64,
    /// Token class; omitted on the wire for access tokens
    #[serde(default, skip_serializing_if = "TokenKind::is_access")]
    pub kind: TokenKind,
    /// Unique token identifier, so tokens minted in the same second differ
    pub jti: String,
}

impl Claims {
    /// Identity carried by an access token
    pub fn identity(&self) -> Option<Identity> {
        self.role.map(|role| Identity::new(self.sub.clone(), role))
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.exp
    }
}

/// A freshly signed token together with its claims
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Failed to encode JWT: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies tokens
///
/// Signature comparison is constant-time (delegated to `jsonwebtoken`).
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by the token service against its own clock
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        Self {
            access: KeyPair::from_secret(&config.jwt_secret),
            refresh: KeyPair::from_secret(config.refresh_secret()),
            validation,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Issue a token valid from now for `ttl_secs`
    pub fn issue(
        &self,
        identity: &Identity,
        kind: TokenKind,
        ttl_secs: u64,
    ) -> Result<IssuedToken, CodecError> {
        self.issue_at(identity, kind, now_secs(), ttl_secs)
    }

    /// Issue a token with an explicit issue time
    pub fn issue_at(
        &self,
        identity: &Identity,
        kind: TokenKind,
        issued_at: u64,
        ttl_secs: u64,
    ) -> Result<IssuedToken, CodecError> {
        let claims = Claims {
            sub: identity.subject_id.clone(),
            role: match kind {
                TokenKind::Access => Some(identity.role),
                TokenKind::Refresh => None,
            },
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
            kind,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify the signature with the secret for `kind` and extract claims
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims, CodecError> {
        decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => CodecError::SignatureInvalid,
                _ => CodecError::Malformed(e.to_string()),
            })
    }

    /// Decode a token of unknown class, trying the access secret first
    pub fn decode_any(&self, token: &str) -> Result<Claims, CodecError> {
        match self.decode(token, TokenKind::Access) {
            Err(CodecError::SignatureInvalid) => self.decode(token, TokenKind::Refresh),
            other => other,
        }
    }
}

/// Current Unix time in seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn codec() -> TokenCodec {
        TokenCodec::new(&AuthConfig {
            jwt_refresh_secret: Some("refresh-secret".to_string()),
            ..AuthConfig::with_secret("access-secret")
        })
    }

    /// Reads the payload segment without verifying, to inspect the wire shape
    fn payload_json(token: &str) -> serde_json::Value {
        let segment = token.split('.').nth(1).unwrap();
        let bytes = URL_SAFE_NO_PAD.decode(segment).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_issue_and_decode_access_token() {
        let codec = codec();
        let identity = Identity::new("user-1", Role::Admin);

        let issued = codec.issue(&identity, TokenKind::Access, 900).unwrap();
        let claims = codec.decode(&issued.token, TokenKind::Access).unwrap();

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Some(Role::Admin));
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.identity(), Some(identity));
    }

    #[test]
    fn test_refresh_token_has_no_role() {
        let codec = codec();
        let identity = Identity::new("user-2", Role::User);

        let issued = codec.issue(&identity, TokenKind::Refresh, 60).unwrap();
        let claims = codec.decode(&issued.token, TokenKind::Refresh).unwrap();

        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.role, None);
        assert_eq!(claims.identity(), None);
    }

    #[test]
    fn test_wire_claim_shapes() {
        let codec = codec();
        let identity = Identity::new("user-3", Role::User);

        let access = codec.issue(&identity, TokenKind::Access, 60).unwrap();
        let json = payload_json(&access.token);
        assert_eq!(json["sub"], "user-3");
        assert_eq!(json["role"], "user");
        assert!(json.get("kind").is_none());

        let refresh = codec.issue(&identity, TokenKind::Refresh, 60).unwrap();
        let json = payload_json(&refresh.token);
        assert_eq!(json["kind"], "refresh");
        assert!(json.get("role").is_none());
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let codec = codec();
        let identity = Identity::new("user-4", Role::User);

        let a = codec.issue_at(&identity, TokenKind::Refresh, 1_000, 60).unwrap();
        let b = codec.issue_at(&identity, TokenKind::Refresh, 1_000, 60).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_wrong_secret_is_signature_invalid() {
        let codec = codec();
        let identity = Identity::new("user-5", Role::User);
        let refresh = codec.issue(&identity, TokenKind::Refresh, 60).unwrap();

        let result = codec.decode(&refresh.token, TokenKind::Access);
        assert!(matches!(result, Err(CodecError::SignatureInvalid)));

        let other = TokenCodec::new(&AuthConfig::with_secret("another"));
        let result = other.decode(&refresh.token, TokenKind::Refresh);
        assert!(matches!(result, Err(CodecError::SignatureInvalid)));
    }

    #[test]
    fn test_decode_any_finds_either_kind() {
        let codec = codec();
        let identity = Identity::new("user-6", Role::User);
        let access = codec.issue(&identity, TokenKind::Access, 60).unwrap();
        let refresh = codec.issue(&identity, TokenKind::Refresh, 60).unwrap();

        assert_eq!(codec.decode_any(&access.token).unwrap().kind, TokenKind::Access);
        assert_eq!(codec.decode_any(&refresh.token).unwrap().kind, TokenKind::Refresh);
    }

    #[test]
    fn test_expired_token_still_decodes() {
        let codec = codec();
        let identity = Identity::new("user-7", Role::User);
        let issued = codec
            .issue_at(&identity, TokenKind::Access, now_secs() - 7200, 3600)
            .unwrap();

        let claims = codec.decode(&issued.token, TokenKind::Access).unwrap();
        assert!(claims.is_expired_at(now_secs()));
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec();
        assert!(matches!(
            codec.decode("invalid.token.here", TokenKind::Access),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            codec.decode("", TokenKind::Access),
            Err(CodecError::Malformed(_))
        ));
    }
}
