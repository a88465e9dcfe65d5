//! User and group resolution.
//!
//! The daemon never inspects the identity store directly; it goes through
//! [`IdentityProvider`], which answers two questions: does this username
//! exist (and with which uid), and which groups is it a member of.
//! `SystemIdentity` answers from the host's user database; `MemoryIdentity`
//! is a self-contained table for tests and local experiments.

use std::collections::HashMap;

/// A resolved user entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub uid: u32,
    pub primary_gid: u32,
}

pub trait IdentityProvider: Send + Sync {
    /// Resolve a username to its record, or `None` if it does not exist.
    fn resolve_user(&self, username: &str) -> Option<UserRecord>;

    /// Names of every group the user is a member of (primary group
    /// included). Empty for unknown users.
    fn group_memberships(&self, username: &str) -> Vec<String>;
}

/// Identity provider backed by the host's user database via the usual
/// `getpwnam_r` / `getgrouplist` calls.
#[cfg(unix)]
pub struct SystemIdentity;

#[cfg(unix)]
mod system {
    use super::{IdentityProvider, SystemIdentity, UserRecord};
    use std::ffi::{CStr, CString};

    const INITIAL_BUF: usize = 1024;

    impl IdentityProvider for SystemIdentity {
        fn resolve_user(&self, username: &str) -> Option<UserRecord> {
            let c_name = CString::new(username).ok()?;
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut buf = vec![0u8; INITIAL_BUF];
            let mut result: *mut libc::passwd = std::ptr::null_mut();
            loop {
                let rc = unsafe {
                    libc::getpwnam_r(
                        c_name.as_ptr(),
                        &mut pwd,
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                        &mut result,
                    )
                };
                if rc == libc::ERANGE {
                    buf.resize(buf.len() * 2, 0);
                    continue;
                }
                if rc != 0 || result.is_null() {
                    return None;
                }
                break;
            }
            Some(UserRecord {
                name: username.to_string(),
                uid: pwd.pw_uid,
                primary_gid: pwd.pw_gid,
            })
        }

        fn group_memberships(&self, username: &str) -> Vec<String> {
            let Some(user) = self.resolve_user(username) else {
                return Vec::new();
            };
            let Ok(c_name) = CString::new(username) else {
                return Vec::new();
            };
            let mut ngroups: libc::c_int = 16;
            let mut gids = vec![0 as libc::gid_t; ngroups as usize];
            loop {
                let rc = unsafe {
                    libc::getgrouplist(
                        c_name.as_ptr(),
                        user.primary_gid,
                        gids.as_mut_ptr(),
                        &mut ngroups,
                    )
                };
                if rc == -1 && ngroups as usize > gids.len() {
                    gids.resize(ngroups as usize, 0);
                    continue;
                }
                break;
            }
            gids.truncate(ngroups.max(0) as usize);
            gids.into_iter().filter_map(group_name).collect()
        }
    }

    fn group_name(gid: libc::gid_t) -> Option<String> {
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut buf = vec![0u8; INITIAL_BUF];
        let mut result: *mut libc::group = std::ptr::null_mut();
        loop {
            let rc = unsafe {
                libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr().cast(), buf.len(), &mut result)
            };
            if rc == libc::ERANGE {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() {
                return None;
            }
            break;
        }
        let name = unsafe { CStr::from_ptr(grp.gr_name) };
        name.to_str().ok().map(str::to_owned)
    }

    /// Gid of a named group, if it exists. Used by directory bootstrap.
    pub fn group_gid(name: &str) -> Option<u32> {
        let c_name = CString::new(name).ok()?;
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut buf = vec![0u8; INITIAL_BUF];
        let mut result: *mut libc::group = std::ptr::null_mut();
        loop {
            let rc = unsafe {
                libc::getgrnam_r(
                    c_name.as_ptr(),
                    &mut grp,
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                    &mut result,
                )
            };
            if rc == libc::ERANGE {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() {
                return None;
            }
            break;
        }
        Some(grp.gr_gid)
    }
}

#[cfg(unix)]
pub use system::group_gid;

/// In-memory identity table. The authoritative provider in tests, where the
/// real user database must never be consulted.
#[derive(Default)]
pub struct MemoryIdentity {
    users: HashMap<String, (u32, u32)>,
    groups: HashMap<String, Vec<String>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with the given uid and group memberships.
    pub fn with_user(mut self, name: &str, uid: u32, groups: &[&str]) -> Self {
        let primary_gid = uid; // synthetic, one gid per user
        self.users.insert(name.to_string(), (uid, primary_gid));
        for group in groups {
            self.groups
                .entry(group.to_string())
                .or_default()
                .push(name.to_string());
        }
        self
    }
}

impl IdentityProvider for MemoryIdentity {
    fn resolve_user(&self, username: &str) -> Option<UserRecord> {
        self.users.get(username).map(|&(uid, primary_gid)| UserRecord {
            name: username.to_string(),
            uid,
            primary_gid,
        })
    }

    fn group_memberships(&self, username: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == username))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_identity_resolves_known_users() {
        let dir = MemoryIdentity::new().with_user("alice", 1001, &["Manufacturing"]);
        let user = dir.resolve_user("alice").unwrap();
        assert_eq!(user.uid, 1001);
        assert_eq!(user.name, "alice");
        assert!(dir.resolve_user("mallory").is_none());
    }

    #[test]
    fn memory_identity_lists_memberships() {
        let dir = MemoryIdentity::new()
            .with_user("carol", 1003, &["Manufacturing", "Distribution"])
            .with_user("dave", 1004, &[]);
        let mut groups = dir.group_memberships("carol");
        groups.sort();
        assert_eq!(groups, vec!["Distribution", "Manufacturing"]);
        assert!(dir.group_memberships("dave").is_empty());
        assert!(dir.group_memberships("nobody").is_empty());
    }
}
