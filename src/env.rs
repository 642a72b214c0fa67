//! Process-wide environment configuration for internal services.
//!
//! Operator configuration is loaded into an [`EnvMap`] before any service is
//! started. Entries are plain `KEY=VALUE` tokens, optionally scoped to a
//! single service with a `service:` prefix. At container-create time each
//! service receives a [snapshot](EnvMap::snapshot) of the effective
//! environment; changes made after that point only take effect on restart.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Separator between a service scope and the key, as in `coordinator:SERVER_ID`.
const SCOPE_SEPARATOR: char = ':';

/// Shared key/value configuration store for internal services.
///
/// A single mutex guards the whole map. Hold times are one read or one write;
/// the lock is never held across a start sequence, so service startup and
/// configuration loading can proceed concurrently.
#[derive(Debug, Default)]
pub struct EnvMap {
    entries: Mutex<HashMap<String, String>>,
}

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single key. The key may carry a `service:` scope prefix.
    ///
    /// Last writer wins. Fails with [`Error::MalformedEntry`] for an empty
    /// key or a key containing `=`.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let mut entries = self.entries.lock().expect("env map lock poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Merge a batch of `"KEY=VALUE"` / `"service:KEY=VALUE"` tokens.
    ///
    /// The batch is all-or-nothing: every token is validated before any is
    /// applied, so a malformed token leaves the map exactly as it was.
    pub fn merge<S: AsRef<str>>(&self, tokens: &[S]) -> Result<()> {
        let mut parsed = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token = token.as_ref();
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| Error::MalformedEntry(token.to_string()))?;
            validate_key(key)?;
            parsed.push((key.to_string(), value.to_string()));
        }

        let mut entries = self.entries.lock().expect("env map lock poisoned");
        for (key, value) in parsed {
            entries.insert(key, value);
        }
        Ok(())
    }

    /// The effective environment visible to one service: global entries
    /// overlaid with that service's scoped entries, scoped wins on conflict.
    ///
    /// Scoped entries for other services are not visible.
    pub fn snapshot(&self, service: &str) -> HashMap<String, String> {
        let entries = self.entries.lock().expect("env map lock poisoned");
        let mut snapshot = HashMap::new();
        // Globals first so scoped entries overwrite them below.
        for (key, value) in entries.iter() {
            if !key.contains(SCOPE_SEPARATOR) {
                snapshot.insert(key.clone(), value.clone());
            }
        }
        let prefix = format!("{}{}", service, SCOPE_SEPARATOR);
        for (key, value) in entries.iter() {
            if let Some(bare) = key.strip_prefix(&prefix) {
                snapshot.insert(bare.to_string(), value.clone());
            }
        }
        snapshot
    }

    /// Number of entries currently held (scoped and global alike).
    pub fn len(&self) -> usize {
        self.entries.lock().expect("env map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_key(key: &str) -> Result<()> {
    // An empty key, an empty scoped key ("svc:"), or a stray '=' are all
    // caller input errors; nothing is applied.
    let bare = key
        .rsplit_once(SCOPE_SEPARATOR)
        .map(|(_, k)| k)
        .unwrap_or(key);
    if bare.is_empty() || key.contains('=') {
        return Err(Error::MalformedEntry(key.to_string()));
    }
    Ok(())
}
