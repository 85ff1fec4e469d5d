//! The public socket inventory: enumerate, filter, and resolve owners.

use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, ScanError};
use crate::memo::Memo;
use crate::platform;
use crate::session::Session;
use crate::types::{ProcessDescriptor, SocketRecord, SocketState, UserDescriptor};

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Attach owning processes while listing. On Linux this walks every
    /// `/proc/<pid>/fd`; with it off, [`Ports::process`] still resolves on
    /// demand.
    pub resolve_processes: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            resolve_processes: true,
        }
    }
}

/// Socket inventory for one session. The listing is taken once and reused
/// by every query on the same instance.
pub struct Ports {
    session: Arc<Session>,
    options: ScanOptions,
    all: Memo<Vec<SocketRecord>>,
}

impl Ports {
    pub fn new(session: Arc<Session>) -> Self {
        Ports::with_options(session, ScanOptions::default())
    }

    pub fn with_options(session: Arc<Session>, options: ScanOptions) -> Self {
        Ports {
            session,
            options,
            all: Memo::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Every socket on the host, with owners attached where they resolve.
    pub fn list(&self) -> Result<&[SocketRecord]> {
        self.all.get_or_compute(|| self.scan()).map(Vec::as_slice)
    }

    /// Sockets in the `listen` state, in listing order.
    pub fn listening(&self) -> Result<Vec<SocketRecord>> {
        Ok(listening(self.list()?))
    }

    /// The process owning `record`.
    ///
    /// On Linux this goes through the socket's kernel inode, which must be
    /// known. Elsewhere it is the owner attached during listing, or a lookup
    /// of the owner pid the source reported.
    pub fn process(&self, record: &SocketRecord) -> Result<Option<Arc<ProcessDescriptor>>> {
        if !self.session.platform().uses_inodes() {
            if record.process.is_some() {
                return Ok(record.process.clone());
            }
            return match record.owner_pid {
                Some(pid) => self.session.processes().by_pid(pid),
                None => Ok(None),
            };
        }
        if record.inode == 0 {
            return Err(ScanError::NoInode);
        }
        self.session.processes().by_socket_inode(record.inode)
    }

    /// The user owning `record`, if the source reported a uid.
    pub fn user(&self, record: &SocketRecord) -> Result<Option<Arc<UserDescriptor>>> {
        if record.user.is_some() {
            return Ok(record.user.clone());
        }
        match record.uid {
            Some(uid) => self.session.users().by_uid(uid),
            None => Ok(None),
        }
    }

    fn scan(&self) -> Result<Vec<SocketRecord>> {
        let session = &self.session;
        let mut records = platform::enumerate(session.platform(), session.runner(), session.fs())?;

        self.attach_users(&mut records);
        if self.options.resolve_processes {
            self.attach_processes(&mut records);
        }

        Ok(records)
    }

    // Registry failures leave associations empty here; the cached error
    // resurfaces from `process()`/`user()`.
    fn attach_users(&self, records: &mut [SocketRecord]) {
        if records.iter().all(|r| r.uid.is_none()) {
            return;
        }
        let users = match self.session.users().list() {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "cannot resolve socket users");
                return;
            }
        };
        for record in records.iter_mut() {
            record.user = record.uid.and_then(|uid| users.get(&uid).cloned());
        }
    }

    fn attach_processes(&self, records: &mut [SocketRecord]) {
        if records.is_empty() {
            return;
        }
        let index = match self.session.processes().list() {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "cannot resolve socket processes");
                return;
            }
        };

        let by_inode = self.session.platform().uses_inodes();
        for record in records.iter_mut() {
            record.process = if by_inode {
                match record.inode {
                    0 => None,
                    inode => index.by_socket_inode.get(&inode).cloned(),
                }
            } else {
                record.owner_pid.and_then(|pid| index.by_pid.get(&pid).cloned())
            };
        }
    }
}

/// Keep only listening sockets, preserving order.
pub fn listening(records: &[SocketRecord]) -> Vec<SocketRecord> {
    records
        .iter()
        .filter(|r| r.state == SocketState::Listen)
        .cloned()
        .collect()
}
