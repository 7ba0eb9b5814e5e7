//! Local profile registry and login session, persisted with file locking.
//!
//! This stands in for the hosted auth provider: it records which profiles
//! exist on this device and which one is logged in. No credentials are kept.

use crate::lockfile::LockGuard;
use crate::{Error, Result, UserProfile};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Fields collected by the registration form
#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Registered profiles keyed by normalized email, plus the current login
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SessionState {
    pub profiles: BTreeMap<String, UserProfile>,
    pub current: Option<String>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(Error::Auth(format!("'{}' is not a valid email address", email)));
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(Error::Auth(format!("'{}' is not a valid email address", email)));
    }
    Ok(())
}

impl SessionState {
    /// Register a new profile; the new profile is not logged in
    pub fn register(&mut self, registration: Registration) -> Result<UserProfile> {
        let email = normalize_email(&registration.email);
        validate_email(&email)?;

        let username = registration.username.trim().to_string();
        if username.is_empty() {
            return Err(Error::Auth("username is required".into()));
        }
        if self.profiles.contains_key(&email) {
            return Err(Error::Auth(format!("an account for {} already exists", email)));
        }

        let profile = UserProfile {
            id: Uuid::new_v4(),
            username,
            email: email.clone(),
            gender: registration.gender,
            date_of_birth: registration.date_of_birth,
            created_at: Utc::now(),
        };
        self.profiles.insert(email, profile.clone());
        tracing::info!("Registered profile {}", profile.id);
        Ok(profile)
    }

    /// Log in as an already registered profile
    pub fn login(&mut self, email: &str) -> Result<UserProfile> {
        let email = normalize_email(email);
        let profile = self
            .profiles
            .get(&email)
            .cloned()
            .ok_or_else(|| Error::Auth(format!("no account found for {}", email)))?;
        self.current = Some(email);
        tracing::info!("Logged in as {}", profile.id);
        Ok(profile)
    }

    /// Clear the current login; returns whether anyone was logged in
    pub fn logout(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn current_user(&self) -> Option<&UserProfile> {
        self.current
            .as_ref()
            .and_then(|email| self.profiles.get(email))
    }

    /// Read the session file under its shared lock
    ///
    /// A missing file is an empty registry. A damaged one is logged and read
    /// the same way, leaving the user signed out but able to register again.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let _lock = LockGuard::shared(path)?;
        Ok(Self::read_locked(path))
    }

    /// Replace the session file under its exclusive lock
    pub fn save(&self, path: &Path) -> Result<()> {
        let _lock = LockGuard::exclusive(path)?;
        self.write_locked(path)
    }

    /// Load, modify and save while holding the exclusive lock throughout
    ///
    /// The closure's result is returned; nothing is saved if it fails.
    pub fn update<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut SessionState) -> Result<T>,
    {
        let _lock = LockGuard::exclusive(path)?;
        let mut state = Self::read_locked(path);
        let value = f(&mut state)?;
        state.write_locked(path)?;
        Ok(value)
    }

    fn read_locked(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Session file {:?} is unreadable ({}); starting signed out", path, e);
                return Self::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!("Session file {:?} is damaged ({}); starting signed out", path, e);
            Self::default()
        })
    }

    /// Temp file in the same directory, fsynced, then renamed into place
    fn write_locked(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&serde_json::to_vec_pretty(self)?)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Wrote {} profiles to {:?}", self.profiles.len(), path);
        Ok(())
    }
}
