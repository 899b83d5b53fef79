use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::ServiceError;

/// Supplies the logged-in user's email, the key the reward service credits.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_email: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Email and password are required.")]
    MissingFields,

    #[error("Login failed. Please check your credentials.")]
    LoginFailed(#[source] ServiceError),

    #[error("Failed to store session at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Session persisted as a small JSON file next to the kiosk config.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<Session> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("Ignoring unreadable session file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let storage_err = |source| SessionError::Storage {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(storage_err)?;
            }
        }
        let contents = serde_json::to_string_pretty(session)
            .map_err(|e| storage_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        std::fs::write(&self.path, contents).map_err(storage_err)?;
        log::info!("Session stored for {}", session.user_email);
        Ok(())
    }

    /// Logging out just forgets the stored session.
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Storage {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl IdentityResolver for SessionStore {
    // Read on every call so a logout elsewhere is seen by the next reward.
    fn resolve(&self) -> Option<String> {
        self.load()
            .map(|session| session.user_email)
            .filter(|email| !email.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "Token")]
    token: String,
}

pub struct SessionClient {
    client: Client,
    login_url: String,
    store: SessionStore,
}

impl SessionClient {
    pub fn new(client: Client, login_url: impl Into<String>, store: SessionStore) -> Self {
        Self {
            client,
            login_url: login_url.into(),
            store,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(SessionError::MissingFields);
        }

        let token = self
            .request_token(email, password)
            .await
            .map_err(|e| {
                log::warn!("Login for {} failed: {}", email, e);
                SessionError::LoginFailed(e)
            })?;

        let session = Session {
            token,
            user_email: email.to_string(),
        };
        self.store.save(&session)?;
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.store.clear()
    }

    async fn request_token(&self, email: &str, password: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(&self.login_url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status { status });
        }
        let body = response.bytes().await?;
        let parsed: LoginResponse =
            serde_json::from_slice(&body).map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(parsed.token)
    }
}
