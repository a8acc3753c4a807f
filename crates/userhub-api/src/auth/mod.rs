//! Authentication and authorization module
//!
//! This module provides JWT-based authentication with the following components:
//! - Token codec (HS256 signing and decoding)
//! - Revocation registry for blacklisted tokens
//! - Token service (issuance, verification, refresh rotation)
//! - Password hashing with Argon2
//! - Authentication service (register, login, logout, refresh)
//! - Middleware for request authentication and role checks

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod revocation;
pub mod service;
pub mod token;

pub use jwt::{Claims, CodecError, TokenCodec, TokenKind};
pub use middleware::{auth_middleware, authenticate, authorize, require_roles, AuthenticatedUser};
pub use password::{validate_password_strength, CredentialVerifier, PasswordConfig, PasswordError};
pub use revocation::{InMemoryRevocationStore, RevocationStore};
pub use service::{AuthPayload, AuthService, LoginRequest, RefreshTokenRequest, RegisterRequest};
pub use token::{token_identifier, TokenError, TokenInfo, TokenPair, TokenService};
