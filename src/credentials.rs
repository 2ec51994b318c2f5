//! Persistent credentials: API key, base URL and the identity of the
//! authenticated agent.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
};

pub const API_KEY_ENV: &str = "MOLTBOOK_API_KEY";
pub const CANONICAL_HOST: &str = "www.moltbook.com";
pub const DEFAULT_API_BASE: &str = "https://www.moltbook.com/api/v1";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            agent_id: None,
            username: None,
        }
    }
}

/// Fields to overwrite on save. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct CredentialsUpdate {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub agent_id: Option<String>,
    pub username: Option<String>,
}

impl Credentials {
    pub fn merge(mut self, update: &CredentialsUpdate) -> Self {
        if let Some(api_key) = &update.api_key {
            self.api_key = Some(api_key.clone());
        }
        if let Some(api_base) = &update.api_base {
            self.api_base = api_base.clone();
        }
        if let Some(agent_id) = &update.agent_id {
            self.agent_id = Some(agent_id.clone());
        }
        if let Some(username) = &update.username {
            self.username = Some(username.clone());
        }
        self
    }
}

pub trait CredentialStore {
    /// Never fails: a missing or unreadable document yields defaults.
    fn load(&self) -> Credentials;

    fn save(&self, update: &CredentialsUpdate) -> Result<Credentials>;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/moltbook/credentials.json`
    pub fn default_location() -> Result<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join("moltbook").join("credentials.json")))
            .ok_or(Error::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Credentials {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                log::debug!("No credentials at {}: {}", self.path.display(), err);
                return Credentials::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|err| {
            log::warn!(
                "Ignoring malformed credentials at {}: {}",
                self.path.display(),
                err
            );
            Credentials::default()
        })
    }

    fn save(&self, update: &CredentialsUpdate) -> Result<Credentials> {
        let merged = self.load().merge(update);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&merged)?)?;
        log::debug!("Saved credentials to {}", self.path.display());

        Ok(merged)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    credentials: RefCell<Credentials>,
}

impl MemoryStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: RefCell::new(credentials),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Credentials {
        self.credentials.borrow().clone()
    }

    fn save(&self, update: &CredentialsUpdate) -> Result<Credentials> {
        let merged = self.load().merge(update);
        *self.credentials.borrow_mut() = merged.clone();
        Ok(merged)
    }
}

/// Environment value first, then the stored key. Empty strings count as unset.
pub fn resolve_key_with(env_value: Option<String>, credentials: &Credentials) -> Option<String> {
    env_value
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            credentials
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty())
        })
}

pub fn resolve_key(store: &dyn CredentialStore) -> Option<String> {
    resolve_key_with(std::env::var(API_KEY_ENV).ok(), &store.load())
}

pub fn require_key(store: &dyn CredentialStore) -> Result<String> {
    resolve_key(store).ok_or(Error::MissingApiKey)
}
