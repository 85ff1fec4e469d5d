//! Default user managers.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Result, ScanError};
use crate::host::{run_checked, CommandRunner, FileSystem};
use crate::registry::UserManager;
use crate::types::UserDescriptor;

pub const PASSWD_PATH: &str = "/etc/passwd";
pub const DSCL_COMMAND: &str = "dscl . -list /Users UniqueID";

/// Users from `/etc/passwd` (Linux, FreeBSD).
pub struct PasswdUsers {
    fs: Arc<dyn FileSystem>,
}

impl PasswdUsers {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        PasswdUsers { fs }
    }
}

impl UserManager for PasswdUsers {
    fn list(&self) -> Result<Vec<UserDescriptor>> {
        let path = Path::new(PASSWD_PATH);
        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| ScanError::io(path, e))?;
        let users = parse_passwd(&content);
        debug!(count = users.len(), "read users from passwd");
        Ok(users)
    }
}

/// Users from the macOS directory service.
pub struct DsclUsers {
    runner: Arc<dyn CommandRunner>,
}

impl DsclUsers {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        DsclUsers { runner }
    }
}

impl UserManager for DsclUsers {
    fn list(&self) -> Result<Vec<UserDescriptor>> {
        let stdout = run_checked(self.runner.as_ref(), DSCL_COMMAND)?;
        Ok(parse_dscl(&stdout))
    }
}

/// `name:password:uid:gid:gecos:home:shell`
pub fn parse_passwd(content: &str) -> Vec<UserDescriptor> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let uid = fields.nth(1)?.parse().ok();
            if uid.is_none() {
                trace!(line, "skipping passwd entry");
            }
            Some(UserDescriptor {
                uid: uid?,
                name: name.to_string(),
            })
        })
        .collect()
}

/// `name   uid` per line.
pub fn parse_dscl(output: &str) -> Vec<UserDescriptor> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let uid = fields.next()?.parse().ok()?;
            Some(UserDescriptor {
                uid,
                name: name.to_string(),
            })
        })
        .collect()
}
