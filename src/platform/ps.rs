//! Process listing through BSD `ps` (macOS, FreeBSD).
//!
//! The executable and the command line come from two separate listings
//! joined by pid: `command` is argv as the process left it, which is
//! neither space-safe nor guaranteed to start with the executable.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::host::{run_checked, CommandRunner};
use crate::platform::linux::proc_fd::describe_state;
use crate::registry::ProcessManager;
use crate::types::ProcessDescriptor;

/// `comm` goes last so executable paths may contain spaces.
pub const PS_EXECUTABLES_COMMAND: &str = "ps -axo pid=,state=,comm=";
pub const PS_COMMAND_LINES_COMMAND: &str = "ps -axo pid=,command=";

pub struct PsProcesses {
    runner: Arc<dyn CommandRunner>,
}

impl PsProcesses {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        PsProcesses { runner }
    }
}

impl ProcessManager for PsProcesses {
    fn list(&self) -> Result<Vec<ProcessDescriptor>> {
        let executables = run_checked(self.runner.as_ref(), PS_EXECUTABLES_COMMAND)?;
        let command_lines = run_checked(self.runner.as_ref(), PS_COMMAND_LINES_COMMAND)?;
        let processes = parse_ps_output(&executables, &command_lines);
        debug!(count = processes.len(), "listed processes from ps");
        Ok(processes)
    }
}

/// Join `pid state comm` lines with `pid command` lines.
///
/// Processes missing from the command line listing (exited in between) keep
/// their executable as the command. Unparsable lines are skipped.
pub fn parse_ps_output(executables: &str, command_lines: &str) -> Vec<ProcessDescriptor> {
    let mut commands: HashMap<u32, String> = command_lines
        .lines()
        .filter_map(split_pid)
        .map(|(pid, command)| (pid, command.trim().to_string()))
        .collect();

    executables
        .lines()
        .filter_map(parse_ps_line)
        .map(|mut process| {
            match commands.remove(&process.pid) {
                Some(command) if !command.is_empty() => process.command = command,
                _ => process.command = process.executable.clone(),
            }
            process
        })
        .collect()
}

fn split_pid(line: &str) -> Option<(u32, &str)> {
    let line = line.trim_start();
    if line.is_empty() {
        return None;
    }
    let (pid, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match pid.parse::<u32>() {
        Ok(pid) => Some((pid, rest)),
        Err(_) => {
            warn!(line, "cannot parse ps pid");
            None
        }
    }
}

fn parse_ps_line(line: &str) -> Option<ProcessDescriptor> {
    let (pid, rest) = split_pid(line)?;
    let rest = rest.trim_start();
    let (state, executable) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));

    Some(ProcessDescriptor {
        pid,
        executable: executable.trim().to_string(),
        command: String::new(),
        // BSD state strings carry flag letters after the primary state (`Ss+`).
        state: state.chars().next().map(describe_state).unwrap_or_default(),
        socket_inodes: Default::default(),
    })
}
