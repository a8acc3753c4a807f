//! Token service
//!
//! Composes the [`TokenCodec`] and a [`RevocationStore`] to issue token
//! pairs, verify tokens and rotate refresh tokens. A token is usable iff its
//! signature verifies, it has not expired and it has not been revoked.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use userhub_core::{AuthConfig, Identity};
use utoipa::ToSchema;

use super::jwt::{now_secs, Claims, CodecError, IssuedToken, TokenCodec, TokenKind};
use super::revocation::{InMemoryRevocationStore, RevocationStore};

/// Token verification and issuance errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Failed to issue token: {0}")]
    Issue(#[source] CodecError),
}

/// A signed token and the instant it stops being valid
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenInfo {
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl From<IssuedToken> for TokenInfo {
    fn from(issued: IssuedToken) -> Self {
        let expires = i64::try_from(issued.claims.exp)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            token: issued.token,
            expires,
        }
    }
}

/// Access and refresh tokens issued together for one identity
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access: TokenInfo,
    pub refresh: TokenInfo,
}

/// Stable identifier used for revocation: hex SHA-256 of the full token
pub fn token_identifier(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct TokenService {
    codec: TokenCodec,
    revoked: Arc<dyn RevocationStore>,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("revoked", &self.revoked.len())
            .finish()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig, revoked: Arc<dyn RevocationStore>) -> Self {
        Self {
            codec: TokenCodec::new(config),
            revoked,
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        }
    }

    /// Token service backed by a fresh process-local revocation store
    pub fn in_memory(config: &AuthConfig) -> Self {
        Self::new(config, Arc::new(InMemoryRevocationStore::new()))
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn revocation_store(&self) -> &Arc<dyn RevocationStore> {
        &self.revoked
    }

    /// Issue an access and a refresh token sharing the same `iat`
    pub fn generate_auth_tokens(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        let issued_at = now_secs();
        let access = self
            .codec
            .issue_at(identity, TokenKind::Access, issued_at, self.access_ttl_secs)
            .map_err(TokenError::Issue)?;
        let refresh = self
            .codec
            .issue_at(identity, TokenKind::Refresh, issued_at, self.refresh_ttl_secs)
            .map_err(TokenError::Issue)?;

        Ok(TokenPair {
            access: access.into(),
            refresh: refresh.into(),
        })
    }

    /// Verify a token of the expected kind and return its claims
    pub fn verify_token(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self
            .codec
            .decode(token, expected)
            .map_err(|_| TokenError::Invalid)?;

        if claims.kind != expected {
            return Err(TokenError::Invalid);
        }
        if claims.is_expired_at(now_secs()) {
            return Err(TokenError::Expired);
        }
        if self.revoked.is_revoked(&token_identifier(token)) {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    /// Verify an access token and return the identity it carries
    pub fn verify_access_token(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_token(token, TokenKind::Access)?
            .identity()
            .ok_or(TokenError::Invalid)
    }

    /// Revoke a token until its natural expiry.
    ///
    /// Tokens that do not verify under either secret are ignored; they are
    /// already unusable. Returns whether a new revocation entry was added.
    pub fn blacklist_token(&self, token: &str) -> bool {
        match self.codec.decode_any(token) {
            Ok(claims) => {
                let added = self.revoked.revoke(&token_identifier(token), claims.exp);
                tracing::debug!(kind = %claims.kind, added, "Token blacklisted");
                added
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring blacklist request for undecodable token");
                false
            }
        }
    }

    /// Exchange a refresh token for a new pair. Each refresh token is single-use.
    ///
    /// `identity` is the current state of the token's subject; its role is
    /// embedded into the new access token.
    pub fn rotate_refresh_token(
        &self,
        old_refresh_token: &str,
        identity: &Identity,
    ) -> Result<TokenPair, TokenError> {
        let claims = self.verify_token(old_refresh_token, TokenKind::Refresh)?;
        if claims.sub != identity.subject_id {
            return Err(TokenError::Invalid);
        }

        // Only the caller that inserts the revocation entry may proceed
        if !self
            .revoked
            .revoke(&token_identifier(old_refresh_token), claims.exp)
        {
            return Err(TokenError::Revoked);
        }

        self.generate_auth_tokens(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use userhub_core::Role;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_refresh_secret: Some("refresh-secret".to_string()),
            ..AuthConfig::with_secret("access-secret")
        }
    }

    fn service() -> TokenService {
        TokenService::in_memory(&config())
    }

    fn alice() -> Identity {
        Identity::new("alice-id", Role::User)
    }

    #[test]
    fn test_generate_and_verify_access_token() {
        let service = service();
        for identity in [alice(), Identity::new("root-id", Role::Admin)] {
            let pair = service.generate_auth_tokens(&identity).unwrap();
            let verified = service.verify_access_token(&pair.access.token).unwrap();
            assert_eq!(verified, identity);
        }
    }

    #[test]
    fn test_pair_shares_issued_at_and_uses_configured_ttls() {
        let service = service();
        let pair = service.generate_auth_tokens(&alice()).unwrap();

        let access = service
            .verify_token(&pair.access.token, TokenKind::Access)
            .unwrap();
        let refresh = service
            .verify_token(&pair.refresh.token, TokenKind::Refresh)
            .unwrap();

        assert_eq!(access.iat, refresh.iat);
        assert_eq!(access.exp - access.iat, 15 * 60);
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
        assert_eq!(pair.access.expires.timestamp() as u64, access.exp);
    }

    #[test]
    fn test_kind_mismatch_is_invalid() {
        let service = service();
        let pair = service.generate_auth_tokens(&alice()).unwrap();

        assert!(matches!(
            service.verify_token(&pair.refresh.token, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            service.verify_token(&pair.access.token, TokenKind::Refresh),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_kind_mismatch_is_invalid_with_shared_secret() {
        let service = TokenService::in_memory(&AuthConfig::with_secret("only-one"));
        let pair = service.generate_auth_tokens(&alice()).unwrap();

        assert!(matches!(
            service.verify_token(&pair.refresh.token, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            service.verify_token(&pair.access.token, TokenKind::Refresh),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_reports_expired() {
        let service = service();
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let stale = service
                .codec()
                .issue_at(&alice(), kind, now_secs() - 7200, 3600)
                .unwrap();
            assert!(matches!(
                service.verify_token(&stale.token, kind),
                Err(TokenError::Expired)
            ));
        }
    }

    #[test]
    fn test_blacklisted_token_is_revoked_for_any_kind() {
        let service = service();
        let pair = service.generate_auth_tokens(&alice()).unwrap();

        assert!(service.blacklist_token(&pair.access.token));
        assert!(service.blacklist_token(&pair.refresh.token));
        assert!(!service.blacklist_token(&pair.refresh.token));

        assert!(matches!(
            service.verify_token(&pair.access.token, TokenKind::Access),
            Err(TokenError::Revoked)
        ));
        assert!(matches!(
            service.verify_token(&pair.refresh.token, TokenKind::Refresh),
            Err(TokenError::Revoked)
        ));
    }

    #[test]
    fn test_blacklist_ignores_garbage_and_forged_tokens() {
        let service = service();
        assert!(!service.blacklist_token("not-a-token"));

        let forged = TokenService::in_memory(&AuthConfig::with_secret("attacker"))
            .generate_auth_tokens(&alice())
            .unwrap();
        assert!(!service.blacklist_token(&forged.access.token));
        assert!(service.revocation_store().is_empty());
    }

    #[test]
    fn test_refresh_rotation_is_single_use() {
        let service = service();
        let identity = alice();
        let pair = service.generate_auth_tokens(&identity).unwrap();

        let rotated = service
            .rotate_refresh_token(&pair.refresh.token, &identity)
            .unwrap();
        assert_ne!(rotated.refresh.token, pair.refresh.token);
        assert!(service.verify_access_token(&rotated.access.token).is_ok());

        assert!(matches!(
            service.rotate_refresh_token(&pair.refresh.token, &identity),
            Err(TokenError::Revoked)
        ));
        assert!(service
            .rotate_refresh_token(&rotated.refresh.token, &identity)
            .is_ok());
    }

    #[test]
    fn test_rotation_picks_up_current_role() {
        let service = service();
        let pair = service.generate_auth_tokens(&alice()).unwrap();
        let promoted = Identity::new("alice-id", Role::Admin);

        let rotated = service
            .rotate_refresh_token(&pair.refresh.token, &promoted)
            .unwrap();
        let identity = service.verify_access_token(&rotated.access.token).unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn test_rotation_rejects_foreign_subject() {
        let service = service();
        let pair = service.generate_auth_tokens(&alice()).unwrap();
        let mallory = Identity::new("mallory-id", Role::User);

        assert!(matches!(
            service.rotate_refresh_token(&pair.refresh.token, &mallory),
            Err(TokenError::Invalid)
        ));
        // A failed attempt must not burn the token
        assert!(service
            .rotate_refresh_token(&pair.refresh.token, &alice())
            .is_ok());
    }

    #[test]
    fn test_rotation_rejects_access_token() {
        let service = service();
        let pair = service.generate_auth_tokens(&alice()).unwrap();
        assert!(matches!(
            service.rotate_refresh_token(&pair.access.token, &alice()),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_concurrent_rotation_has_one_winner() {
        let service = Arc::new(service());
        let identity = alice();
        let pair = service.generate_auth_tokens(&identity).unwrap();

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let service = service.clone();
                    let token = pair.refresh.token.clone();
                    let identity = identity.clone();
                    scope.spawn(move || service.rotate_refresh_token(&token, &identity).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 1);
    }

    #[test]
    fn test_token_identifier_is_stable_hex() {
        let id = token_identifier("abc");
        assert_eq!(id.len(), 64);
        assert_eq!(id, token_identifier("abc"));
        assert_ne!(id, token_identifier("abd"));
    }

    proptest! {
        #[test]
        fn prop_tampered_token_is_rejected(
            position in any::<prop::sample::Index>(),
            replacement in "[A-Za-z0-9_-]",
        ) {
            let service = service();
            let token = service.generate_auth_tokens(&alice()).unwrap().access.token;

            let i = position.index(token.len());
            prop_assume!(token[i..i + 1] != replacement);

            let mut tampered = token.clone();
            tampered.replace_range(i..i + 1, &replacement);

            prop_assert!(matches!(
                service.verify_token(&tampered, TokenKind::Access),
                Err(TokenError::Invalid)
            ));
        }
    }
}
