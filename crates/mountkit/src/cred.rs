//! Caller identity.

use serde::{Deserialize, Serialize};

/// Credentials an operation is performed as.
///
/// Carries the real, effective and saved user/group ids plus supplementary
/// groups. Passed explicitly to every operation; the [`Vfs`](crate::Vfs)
/// keeps one default for callers that don't supply their own.
///
/// `Default` is root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Real user id
    pub uid: u32,
    /// Real group id
    pub gid: u32,
    /// Saved user id
    pub suid: u32,
    /// Saved group id
    pub sgid: u32,
    /// Effective user id
    pub euid: u32,
    /// Effective group id
    pub egid: u32,
    /// Supplementary groups
    pub groups: Vec<u32>,
}

impl Credentials {
    /// Credentials with all ids set to `uid` / `gid`.
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            suid: uid,
            sgid: gid,
            euid: uid,
            egid: gid,
            groups: Vec::new(),
        }
    }

    /// The superuser.
    pub fn root() -> Self {
        Self::new(0, 0)
    }

    /// Add supplementary groups.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = u32>) -> Self {
        self.groups.extend(groups);
        self
    }

    /// Same identity with effective ids raised to root.
    ///
    /// Ownership of created files still comes from `uid`/`gid`.
    pub fn elevated(&self) -> Self {
        Self {
            euid: 0,
            egid: 0,
            ..self.clone()
        }
    }

    /// True when every access check passes unconditionally.
    pub fn is_privileged(&self) -> bool {
        self.euid == 0 || self.egid == 0
    }

    /// True when `gid` is the primary group or a supplementary group.
    pub fn in_group(&self, gid: u32) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_root() {
        assert_eq!(Credentials::default(), Credentials::root());
        assert!(Credentials::default().is_privileged());
    }

    #[test]
    fn test_groups() {
        let cred = Credentials::new(1000, 100).with_groups([10, 20]);
        assert!(cred.in_group(100));
        assert!(cred.in_group(20));
        assert!(!cred.in_group(30));
        assert!(!cred.is_privileged());
    }

    #[test]
    fn test_elevated_keeps_owner() {
        let cred = Credentials::new(1000, 100).elevated();
        assert!(cred.is_privileged());
        assert_eq!(cred.uid, 1000);
        assert_eq!(cred.gid, 100);
    }

    #[test]
    fn test_deserialize_partial() {
        let cred: Credentials = serde_json::from_str(r#"{"uid": 5, "euid": 5}"#).unwrap();
        assert_eq!(cred.uid, 5);
        assert_eq!(cred.gid, 0);
        assert!(cred.groups.is_empty());
    }
}
