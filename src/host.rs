//! Host capabilities the scanner needs: running commands and reading files.
//!
//! Both are traits so a session can target the local machine, a mounted
//! image, or an in-memory fixture.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Result, ScanError};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

pub trait CommandRunner: Send + Sync {
    /// Run `command` through the host shell and capture its output.
    fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Run a command and treat a non-zero exit as a failure.
pub fn run_checked(runner: &dyn CommandRunner, command: &str) -> Result<String> {
    let output = runner.run(command)?;
    if output.exit_status != 0 {
        return Err(ScanError::CommandExecution {
            command: command.to_string(),
            status: output.exit_status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Runs commands on the local machine via `sh -c` (or `cmd /C` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCommandRunner;

impl CommandRunner for LocalCommandRunner {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!(command, "running command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        let output = cmd.output().map_err(|e| ScanError::CommandExecution {
            command: command.to_string(),
            status: -1,
            stderr: e.to_string(),
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Killed by a signal: no exit code.
            exit_status: output.status.code().unwrap_or(-1),
        })
    }
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn is_dir(&self, path: &Path) -> io::Result<bool>;

    /// Entries of a directory, as paths in this filesystem's namespace.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;
}

/// The local filesystem, optionally re-rooted under a prefix.
///
/// With a prefix of `/mnt/host`, a request for `/proc/net/tcp` reads
/// `/mnt/host/proc/net/tcp`. Paths handed back by `read_dir` are stripped of
/// the prefix again.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    root: Option<PathBuf>,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        LocalFileSystem { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if root == Path::new("/") {
            return LocalFileSystem { root: None };
        }
        LocalFileSystem { root: Some(root) }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            None => path.to_path_buf(),
            Some(root) => root.join(path.strip_prefix("/").unwrap_or(path)),
        }
    }

    fn unresolve(&self, path: PathBuf) -> PathBuf {
        match &self.root {
            None => path,
            Some(root) => match path.strip_prefix(root) {
                Ok(rel) => Path::new("/").join(rel),
                Err(_) => path,
            },
        }
    }
}

impl FileSystem for LocalFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(self.resolve(path))
    }

    fn is_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(fs::metadata(self.resolve(path))?.is_dir())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(path))?.flatten() {
            entries.push(self.unresolve(entry.path()));
        }
        Ok(entries)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        // Link targets are not re-rooted: `socket:[N]` and `/usr/bin/x` are
        // meaningful as-is.
        fs::read_link(self.resolve(path))
    }
}
