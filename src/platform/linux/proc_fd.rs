use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Result, ScanError};
use crate::host::FileSystem;
use crate::registry::ProcessManager;
use crate::types::ProcessDescriptor;

/// Lists processes by walking `/proc/<pid>`, including the socket inodes
/// each one holds open.
pub struct ProcFsProcesses {
    fs: Arc<dyn FileSystem>,
}

impl ProcFsProcesses {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        ProcFsProcesses { fs }
    }

    fn read_process(&self, pid: u32) -> Option<ProcessDescriptor> {
        let dir = PathBuf::from(format!("/proc/{pid}"));

        // A process that exits mid-walk loses its stat file first.
        let state = read_state(self.fs.as_ref(), &dir)?;
        let cmdline = self
            .fs
            .read_to_string(&dir.join("cmdline"))
            .ok()
            .map(|raw| split_cmdline(&raw))
            .unwrap_or_default();
        let comm = self
            .fs
            .read_to_string(&dir.join("comm"))
            .ok()
            .map(|s| s.trim().to_string());

        let executable = self
            .fs
            .read_link(&dir.join("exe"))
            .ok()
            .map(|p| p.to_string_lossy().trim_end_matches(" (deleted)").to_string())
            .or_else(|| cmdline.first().cloned())
            .or_else(|| comm.clone())
            .unwrap_or_default();

        let command = if cmdline.is_empty() {
            // Kernel threads have an empty cmdline.
            comm.map(|c| format!("[{c}]")).unwrap_or_default()
        } else {
            cmdline.join(" ")
        };

        Some(ProcessDescriptor {
            pid,
            executable,
            command,
            state,
            socket_inodes: self.read_socket_inodes(&dir),
        })
    }

    fn read_socket_inodes(&self, dir: &Path) -> BTreeSet<u64> {
        let fd_dir = dir.join("fd");
        let Ok(entries) = self.fs.read_dir(&fd_dir) else {
            // Other users' fd directories are not readable without privileges.
            trace!(path = %fd_dir.display(), "fd directory not readable");
            return BTreeSet::new();
        };

        entries
            .iter()
            .filter_map(|entry| self.fs.read_link(entry).ok())
            .filter_map(|target| parse_socket_link(&target))
            .collect()
    }
}

impl ProcessManager for ProcFsProcesses {
    fn list(&self) -> Result<Vec<ProcessDescriptor>> {
        let proc_dir = Path::new("/proc");
        let entries = self
            .fs
            .read_dir(proc_dir)
            .map_err(|e| ScanError::io(proc_dir, e))?;

        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();

        let processes: Vec<_> = pids.into_iter().filter_map(|pid| self.read_process(pid)).collect();
        debug!(count = processes.len(), "listed processes from /proc");

        Ok(processes)
    }
}

fn split_cmdline(raw: &str) -> Vec<String> {
    raw.split('\0')
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read the one-letter state from `/proc/<pid>/stat`.
///
/// Format: `pid (comm) state ppid ...`; comm may contain spaces and
/// parentheses, so the state follows the LAST `)`.
fn read_state(fs: &dyn FileSystem, dir: &Path) -> Option<String> {
    let stat = fs.read_to_string(&dir.join("stat")).ok()?;
    let rest = stat.get(stat.rfind(')')? + 1..)?;
    let state = rest.split_whitespace().next()?.chars().next()?;
    Some(describe_state(state))
}

pub fn describe_state(state: char) -> String {
    match state {
        'R' => "running",
        'S' => "sleeping",
        'D' => "disk sleep",
        'Z' => "zombie",
        'T' => "stopped",
        't' => "tracing stop",
        'X' | 'x' => "dead",
        'I' => "idle",
        'W' => "paging",
        'P' => "parked",
        'K' => "wakekill",
        other => return other.to_string(),
    }
    .to_string()
}

fn parse_socket_link(path: &Path) -> Option<u64> {
    let s = path.to_string_lossy();
    s.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket_link_valid() {
        let path = PathBuf::from("socket:[12345]");
        assert_eq!(parse_socket_link(&path), Some(12345));
    }

    #[test]
    fn test_parse_socket_link_large_inode() {
        let path = PathBuf::from("socket:[9876543210]");
        assert_eq!(parse_socket_link(&path), Some(9876543210));
    }

    #[test]
    fn test_parse_socket_link_not_socket() {
        assert_eq!(parse_socket_link(Path::new("/dev/null")), None);
        assert_eq!(parse_socket_link(Path::new("pipe:[12345]")), None);
        assert_eq!(parse_socket_link(Path::new("anon_inode:[eventfd]")), None);
    }

    #[test]
    fn test_split_cmdline() {
        assert_eq!(
            split_cmdline("/usr/sbin/nginx\0-g\0daemon off;\0"),
            vec!["/usr/sbin/nginx", "-g", "daemon off;"]
        );
        assert!(split_cmdline("").is_empty());
    }

    #[test]
    fn test_describe_state() {
        assert_eq!(describe_state('S'), "sleeping");
        assert_eq!(describe_state('Z'), "zombie");
        assert_eq!(describe_state('?'), "?");
    }

    #[cfg(unix)]
    #[test]
    fn test_list_fixture_proc() {
        use crate::host::LocalFileSystem;
        use std::fs;
        use std::os::unix::fs::symlink;

        let root = tempfile::tempdir().unwrap();
        let proc_dir = root.path().join("proc");

        let nginx = proc_dir.join("812");
        fs::create_dir_all(nginx.join("fd")).unwrap();
        fs::write(nginx.join("stat"), "812 (nginx: master) S 1 812 812 0 -1").unwrap();
        fs::write(nginx.join("cmdline"), "nginx: master process\0").unwrap();
        fs::write(nginx.join("comm"), "nginx\n").unwrap();
        symlink("/usr/sbin/nginx", nginx.join("exe")).unwrap();
        symlink("socket:[12345]", nginx.join("fd/6")).unwrap();
        symlink("socket:[12346]", nginx.join("fd/7")).unwrap();
        symlink("/var/log/nginx/access.log", nginx.join("fd/3")).unwrap();

        let kthread = proc_dir.join("2");
        fs::create_dir_all(&kthread).unwrap();
        fs::write(kthread.join("stat"), "2 (kthreadd) S 0 0 0 0 -1").unwrap();
        fs::write(kthread.join("cmdline"), "").unwrap();
        fs::write(kthread.join("comm"), "kthreadd\n").unwrap();

        // Exited between readdir and stat.
        fs::create_dir_all(proc_dir.join("999")).unwrap();
        fs::create_dir_all(proc_dir.join("net")).unwrap();

        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::with_root(root.path()));
        let processes = ProcFsProcesses::new(fs).list().unwrap();

        assert_eq!(processes.len(), 2);
        assert_eq!(processes[0].pid, 2);
        assert_eq!(processes[0].command, "[kthreadd]");
        assert_eq!(processes[0].executable, "kthreadd");
        assert!(processes[0].socket_inodes.is_empty());

        let nginx = &processes[1];
        assert_eq!(nginx.pid, 812);
        assert_eq!(nginx.executable, "/usr/sbin/nginx");
        assert_eq!(nginx.command, "nginx: master process");
        assert_eq!(nginx.state, "sleeping");
        assert_eq!(
            nginx.socket_inodes.iter().copied().collect::<Vec<_>>(),
            vec![12345, 12346]
        );
    }
}
