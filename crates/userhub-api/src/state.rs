//! Application state management

use crate::auth::{AuthService, CredentialVerifier, PasswordConfig, TokenService};
use crate::users::UserService;
use std::sync::Arc;
use std::time::Instant;
use userhub_core::config::AppConfig;
use userhub_core::{InMemoryUserDirectory, UserDirectory};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    pub directory: Arc<dyn UserDirectory>,
    /// Shared with the authentication middleware
    pub tokens: Arc<TokenService>,
    pub auth: AuthService,
    pub users: UserService,
}

impl AppState {
    /// Wire the services over a user directory with production password costs
    pub fn new(config: AppConfig, directory: Arc<dyn UserDirectory>) -> Self {
        Self::with_credentials(config, directory, CredentialVerifier::default())
    }

    pub fn with_credentials(
        config: AppConfig,
        directory: Arc<dyn UserDirectory>,
        credentials: CredentialVerifier,
    ) -> Self {
        let tokens = Arc::new(TokenService::in_memory(&config.auth));
        let auth = AuthService::new(directory.clone(), tokens.clone(), credentials.clone());
        let users = UserService::new(directory.clone(), credentials);

        Self {
            config,
            start_time: Instant::now(),
            directory,
            tokens,
            auth,
            users,
        }
    }

    /// State backed by a process-local directory and cheap password hashing
    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_credentials(
            config,
            Arc::new(InMemoryUserDirectory::new()),
            CredentialVerifier::new(PasswordConfig::minimal()),
        )
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
