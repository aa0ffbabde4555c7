// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Observable state containers.
//!
//! A front end needs two things from a piece of session state: a way to read
//! it whenever it likes, and a way to be told when it changes. [`Observable`]
//! provides both on top of a [`tokio::sync::watch`] channel. It can also
//! persist its value to disk as TOML, so small bits of user state survive
//! between runs.

use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{create_dir_all, read_to_string, write},
    path::{Path, PathBuf},
};
use tokio::sync::watch;

/// Shared, observable value.
///
/// Writers mutate the value through shared references, so an engine can keep
/// publishing while readers hold a [`watch::Receiver`] from
/// [`Observable::subscribe`].
#[derive(Debug)]
pub struct Observable<T> {
    sender: watch::Sender<T>,
}

impl<T> Observable<T> {
    /// Construct new observable holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            sender: watch::Sender::new(value),
        }
    }

    /// Replace current value, notifying subscribers.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Mutate current value in place, notifying subscribers.
    pub fn update(&self, modify: impl FnOnce(&mut T)) {
        self.sender.send_modify(modify);
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone> Observable<T> {
    /// Snapshot of current value.
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Observable<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Load observable from TOML file.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Read`] if file cannot be read.
    /// - Return [`StateError::Deserialize`] if file content is not valid.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_to_string(path).map_err(|err| StateError::Read {
            source: err,
            path: path.to_path_buf(),
        })?;
        let value = toml::de::from_str(&content)?;

        Ok(Self::new(value))
    }

    /// Load observable from TOML file, or fall back to default value if the
    /// file does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Read`] if file exists but cannot be read.
    /// - Return [`StateError::Deserialize`] if file content is not valid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self>
    where
        T: Default,
    {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }

        Self::load_from(path)
    }

    /// Save current value to TOML file.
    ///
    /// Creates parent directories as needed.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Serialize`] if value cannot be serialized.
    /// - Return [`StateError::Write`] if file cannot be written.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::ser::to_string_pretty(&*self.sender.borrow())?;

        if let Some(parent) = path.parent() {
            create_dir_all(parent).map_err(|err| StateError::Write {
                source: err,
                path: path.to_path_buf(),
            })?;
        }

        write(path, content.as_bytes()).map_err(|err| StateError::Write {
            source: err,
            path: path.to_path_buf(),
        })?;

        Ok(())
    }
}

/// State persistence error types.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// State file cannot be read from.
    #[error("failed to read state file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file cannot be written to.
    #[error("failed to write state file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file content is malformed.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// State cannot be rendered.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

/// Friendly result alias :3
pub type Result<T, E = StateError> = std::result::Result<T, E>;
