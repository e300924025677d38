//! Report key and its validation state.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::api::ReportApi;
use crate::error::ReportError;

/// Format of `expires_at` in key validation replies.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// What the service last said about the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyState {
    /// No key configured.
    Missing,
    /// Configured but not validated yet.
    Unverified,
    /// Accepted. `None` when the service gave no expiry.
    Valid { expires_at: Option<DateTime<Utc>> },
    Expired,
    Rejected { reason: String },
}

impl KeyState {
    /// Classifies a validation reply at `now`.
    pub fn from_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match expires_at {
            Some(at) if at <= now => Self::Expired,
            expires_at => Self::Valid { expires_at },
        }
    }

    pub fn usable_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Valid { expires_at } => expires_at.is_none_or(|at| at > now),
            _ => false,
        }
    }
}

impl std::fmt::Display for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::Unverified => f.write_str("unverified"),
            Self::Valid { expires_at: None } => f.write_str("valid"),
            Self::Valid {
                expires_at: Some(at),
            } => write!(f, "valid until {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            Self::Expired => f.write_str("expired"),
            Self::Rejected { reason } => write!(f, "rejected ({reason})"),
        }
    }
}

/// Parses an `expires_at` value.
pub fn parse_expiry(value: &str) -> Result<DateTime<Utc>, ReportError> {
    NaiveDateTime::parse_from_str(value, EXPIRY_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ReportError::InvalidExpiry(value.to_string()))
}

/// Shared key and validation state.
#[derive(Debug)]
pub struct Credentials {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    key: String,
    state: KeyState,
}

impl Credentials {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into().trim().to_string();
        let state = if key.is_empty() {
            KeyState::Missing
        } else {
            KeyState::Unverified
        };
        Self {
            inner: RwLock::new(Inner { key, state }),
        }
    }

    pub fn state(&self) -> KeyState {
        self.read(|inner| inner.state.clone())
    }

    pub fn set_state(&self, state: KeyState) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.state = state;
    }

    /// The key, if the service accepted it and it has not expired.
    pub fn usable_key(&self) -> Option<String> {
        self.usable_key_at(Utc::now())
    }

    pub fn usable_key_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.read(|inner| inner.state.usable_at(now).then(|| inner.key.clone()))
    }

    /// Time left before the key expires, for a countdown display.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        match self.state() {
            KeyState::Valid {
                expires_at: Some(at),
            } if at > now => Some(at - now),
            _ => None,
        }
    }

    /// Validates the key for `player` and records the outcome.
    ///
    /// Transport failures leave the previous state in place.
    pub async fn validate(
        &self,
        api: &dyn ReportApi,
        player: &str,
    ) -> Result<KeyState, ReportError> {
        let key = self.read(|inner| inner.key.clone());
        if key.is_empty() {
            self.set_state(KeyState::Missing);
            return Ok(KeyState::Missing);
        }
        let state = api.validate_key(&key, player).await?;
        match &state {
            KeyState::Valid { .. } => {
                tracing::info!(player, status = %state, "report key accepted")
            }
            other => tracing::warn!(player, status = %other, "report key not usable"),
        }
        self.set_state(state.clone());
        Ok(state)
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&inner)
    }
}
