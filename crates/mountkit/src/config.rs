//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::cred::Credentials;
use crate::error::{Errno, Error, Result};
use crate::file::FileOptions;

/// Settings for a [`Vfs`](crate::Vfs).
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes:
///
/// ```rust
/// use mountkit::VfsConfig;
///
/// let config = VfsConfig::from_json(r#"{"check_access": false, "credentials": {"uid": 1000}}"#)?;
/// assert!(!config.check_access);
/// assert_eq!(config.credentials.uid, 1000);
/// assert!(config.update_on_read);
/// # Ok::<(), mountkit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Credentials used by operations that don't supply their own
    pub credentials: Credentials,
    /// Enforce permission checks (default: true)
    pub check_access: bool,
    /// Reads update `atime` and mark files dirty (default: true)
    pub update_on_read: bool,
    /// Flush open files after every mutation (default: false)
    pub sync_immediately: bool,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            check_access: true,
            update_on_read: true,
            sync_immediately: false,
        }
    }
}

impl VfsConfig {
    /// Parse a JSON document.
    ///
    /// Fails with `EINVAL` on malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::new(Errno::EINVAL, format!("invalid configuration: {}", e)))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::new(Errno::EINVAL, format!("cannot encode configuration: {}", e)))
    }

    /// Options for files opened under this configuration.
    pub fn file_options(&self) -> FileOptions {
        FileOptions {
            update_on_read: self.update_on_read,
            sync_immediately: self.sync_immediately,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VfsConfig::from_json("{}").unwrap();
        assert_eq!(config, VfsConfig::default());
        assert!(config.check_access);
        assert!(config.credentials.is_privileged());
        assert_eq!(config.file_options(), FileOptions::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = VfsConfig {
            credentials: Credentials::new(1, 2).with_groups([3]),
            check_access: false,
            update_on_read: false,
            sync_immediately: true,
        };
        let parsed = VfsConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_malformed() {
        let err = VfsConfig::from_json("{\"check_access\": 3}").unwrap_err();
        assert!(err.is(Errno::EINVAL));
    }
}
