//! A scan session: the host capabilities plus the registries built from them.

use std::path::PathBuf;
use std::sync::Arc;

use crate::host::{CommandRunner, FileSystem, LocalCommandRunner, LocalFileSystem};
use crate::platform::linux::ProcFsProcesses;
use crate::platform::ps::PsProcesses;
use crate::platform::windows::PowerShellProcesses;
use crate::platform::PlatformFamily;
use crate::registry::{ProcessManager, ProcessRegistry, UserManager, UserRegistry};
use crate::types::{ProcessDescriptor, UserDescriptor};
use crate::users::{DsclUsers, PasswdUsers};

/// Owns everything a scan reads from. Registries live exactly as long as
/// the session; start a new session for fresh process and user tables.
pub struct Session {
    platform: PlatformFamily,
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
    processes: ProcessRegistry,
    users: UserRegistry,
}

impl Session {
    /// A session with the default process and user managers for `platform`.
    pub fn new(
        platform: PlatformFamily,
        runner: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let process_manager = default_process_manager(&platform, &runner, &fs);
        let user_manager = default_user_manager(&platform, &runner, &fs);
        Session {
            processes: ProcessRegistry::new(process_manager),
            users: UserRegistry::new(user_manager),
            platform,
            runner,
            fs,
        }
    }

    /// Inspect the local machine, reading files under `root` (`/` if unset).
    pub fn local(platform: PlatformFamily, root: Option<PathBuf>) -> Self {
        let fs = match root {
            Some(root) => LocalFileSystem::with_root(root),
            None => LocalFileSystem::new(),
        };
        Session::new(platform, Arc::new(LocalCommandRunner), Arc::new(fs))
    }

    pub fn with_process_manager(mut self, manager: Arc<dyn ProcessManager>) -> Self {
        self.processes = ProcessRegistry::new(manager);
        self
    }

    pub fn with_user_manager(mut self, manager: Arc<dyn UserManager>) -> Self {
        self.users = UserRegistry::new(manager);
        self
    }

    pub fn platform(&self) -> &PlatformFamily {
        &self.platform
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }
}

fn default_process_manager(
    platform: &PlatformFamily,
    runner: &Arc<dyn CommandRunner>,
    fs: &Arc<dyn FileSystem>,
) -> Arc<dyn ProcessManager> {
    match platform {
        PlatformFamily::Linux => Arc::new(ProcFsProcesses::new(Arc::clone(fs))),
        PlatformFamily::Windows => Arc::new(PowerShellProcesses::new(Arc::clone(runner))),
        PlatformFamily::Darwin | PlatformFamily::FreeBsd => {
            Arc::new(PsProcesses::new(Arc::clone(runner)))
        }
        PlatformFamily::Other(_) => Arc::new(Vec::<ProcessDescriptor>::new()),
    }
}

fn default_user_manager(
    platform: &PlatformFamily,
    runner: &Arc<dyn CommandRunner>,
    fs: &Arc<dyn FileSystem>,
) -> Arc<dyn UserManager> {
    match platform {
        PlatformFamily::Linux | PlatformFamily::FreeBsd => Arc::new(PasswdUsers::new(Arc::clone(fs))),
        PlatformFamily::Darwin => Arc::new(DsclUsers::new(Arc::clone(runner))),
        // Windows sockets carry no uid.
        PlatformFamily::Windows | PlatformFamily::Other(_) => Arc::new(Vec::<UserDescriptor>::new()),
    }
}
