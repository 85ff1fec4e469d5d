//! Per-session process and user registries.
//!
//! Each registry asks its manager for a full listing exactly once, builds its
//! indices from it, and serves every later lookup from those immutable maps.
//! A failed listing is cached as well and returned to every caller.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, ScanError};
use crate::memo::{Memo, MemoState};
use crate::types::{ProcessDescriptor, UserDescriptor};

pub trait ProcessManager: Send + Sync {
    fn list(&self) -> Result<Vec<ProcessDescriptor>>;
}

pub trait UserManager: Send + Sync {
    fn list(&self) -> Result<Vec<UserDescriptor>>;
}

/// A fixed process table.
impl ProcessManager for Vec<ProcessDescriptor> {
    fn list(&self) -> Result<Vec<ProcessDescriptor>> {
        Ok(self.clone())
    }
}

/// A fixed user table.
impl UserManager for Vec<UserDescriptor> {
    fn list(&self) -> Result<Vec<UserDescriptor>> {
        Ok(self.clone())
    }
}

#[derive(Debug, Default)]
pub struct ProcessIndex {
    pub by_pid: HashMap<u32, Arc<ProcessDescriptor>>,
    pub by_socket_inode: HashMap<u64, Arc<ProcessDescriptor>>,
}

impl ProcessIndex {
    fn build(processes: Vec<ProcessDescriptor>) -> Self {
        let mut index = ProcessIndex::default();
        for process in processes {
            let process = Arc::new(process);
            for &inode in &process.socket_inodes {
                index.by_socket_inode.insert(inode, Arc::clone(&process));
            }
            index.by_pid.insert(process.pid, process);
        }
        index
    }
}

pub struct ProcessRegistry {
    manager: Arc<dyn ProcessManager>,
    index: Memo<ProcessIndex>,
}

impl ProcessRegistry {
    pub fn new(manager: Arc<dyn ProcessManager>) -> Self {
        ProcessRegistry {
            manager,
            index: Memo::new(),
        }
    }

    pub fn list(&self) -> Result<&ProcessIndex> {
        self.index.get_or_compute(|| {
            let processes = self
                .manager
                .list()
                .map_err(|e| registry_error("process", e))?;
            debug!(count = processes.len(), "process registry populated");
            Ok(ProcessIndex::build(processes))
        })
    }

    pub fn by_pid(&self, pid: u32) -> Result<Option<Arc<ProcessDescriptor>>> {
        Ok(self.list()?.by_pid.get(&pid).cloned())
    }

    pub fn by_socket_inode(&self, inode: u64) -> Result<Option<Arc<ProcessDescriptor>>> {
        Ok(self.list()?.by_socket_inode.get(&inode).cloned())
    }

    pub fn state(&self) -> MemoState<'_, ProcessIndex> {
        self.index.state()
    }
}

pub struct UserRegistry {
    manager: Arc<dyn UserManager>,
    by_uid: Memo<HashMap<u32, Arc<UserDescriptor>>>,
}

impl UserRegistry {
    pub fn new(manager: Arc<dyn UserManager>) -> Self {
        UserRegistry {
            manager,
            by_uid: Memo::new(),
        }
    }

    pub fn list(&self) -> Result<&HashMap<u32, Arc<UserDescriptor>>> {
        self.by_uid.get_or_compute(|| {
            let users = self.manager.list().map_err(|e| registry_error("user", e))?;
            debug!(count = users.len(), "user registry populated");
            Ok(users.into_iter().map(|u| (u.uid, Arc::new(u))).collect())
        })
    }

    pub fn by_uid(&self, uid: u32) -> Result<Option<Arc<UserDescriptor>>> {
        Ok(self.list()?.get(&uid).cloned())
    }

    pub fn state(&self) -> MemoState<'_, HashMap<u32, Arc<UserDescriptor>>> {
        self.by_uid.state()
    }
}

fn registry_error(registry: &'static str, err: ScanError) -> ScanError {
    match err {
        ScanError::RegistryPopulation { .. } => err,
        other => ScanError::RegistryPopulation {
            registry,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcesses {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ProcessManager for CountingProcesses {
        fn list(&self) -> Result<Vec<ProcessDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScanError::CommandExecution {
                    command: "ps".to_string(),
                    status: 1,
                    stderr: "permission denied".to_string(),
                });
            }
            Ok(vec![process(10, &[100, 101]), process(20, &[])])
        }
    }

    fn process(pid: u32, inodes: &[u64]) -> ProcessDescriptor {
        ProcessDescriptor {
            pid,
            executable: format!("/usr/bin/p{pid}"),
            command: format!("p{pid} --serve"),
            state: "sleeping".to_string(),
            socket_inodes: inodes.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_process_indices() {
        let manager = Arc::new(CountingProcesses {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let registry = ProcessRegistry::new(manager.clone());
        assert!(matches!(registry.state(), MemoState::NotComputed));

        assert_eq!(registry.by_pid(10).unwrap().unwrap().pid, 10);
        assert_eq!(registry.by_socket_inode(101).unwrap().unwrap().pid, 10);
        assert!(registry.by_socket_inode(999).unwrap().is_none());
        assert!(registry.by_pid(30).unwrap().is_none());

        assert_eq!(manager.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(registry.state(), MemoState::Computed(_)));
    }

    #[test]
    fn test_process_registry_error_is_sticky() {
        let manager = Arc::new(CountingProcesses {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let registry = ProcessRegistry::new(manager.clone());

        for _ in 0..3 {
            let err = registry.by_pid(10).unwrap_err();
            assert!(matches!(
                err,
                ScanError::RegistryPopulation {
                    registry: "process",
                    ..
                }
            ));
            assert!(err.to_string().contains("permission denied"));
        }
        assert_eq!(manager.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_user_registry() {
        let users = vec![
            UserDescriptor {
                uid: 0,
                name: "root".to_string(),
            },
            UserDescriptor {
                uid: 1000,
                name: "alice".to_string(),
            },
        ];
        let registry = UserRegistry::new(Arc::new(users));
        assert_eq!(registry.by_uid(1000).unwrap().unwrap().name, "alice");
        assert!(registry.by_uid(4096).unwrap().is_none());
        assert_eq!(registry.list().unwrap().len(), 2);
    }
}
