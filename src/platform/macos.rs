//! macOS and FreeBSD sockets via `lsof` field output.

use tracing::debug;

use crate::error::{Result, ScanError};
use crate::host::{run_checked, CommandRunner};
use crate::types::{Protocol, SocketRecord, SocketState};

pub const LSOF_COMMAND: &str = "lsof -nP -i -F";

const SOURCE: &str = "lsof";

/// One process set from `lsof -F` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LsofProcess {
    pub pid: u32,
    pub uid: Option<u32>,
    pub command: Option<String>,
    pub files: Vec<LsofFile>,
}

/// One file set belonging to a process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LsofFile {
    pub fd: String,
    pub file_type: String,
    pub protocol: String,
    pub name: String,
    /// Value of the `TST=` TCP info field.
    pub tcp_state: Option<String>,
}

impl LsofFile {
    pub fn is_ip_socket(&self) -> bool {
        self.file_type == "IPv4" || self.file_type == "IPv6"
    }
}

/// Endpoints of a network file name such as `10.0.0.1:22->10.0.0.9:51234`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFile {
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
}

pub fn list_sockets(runner: &dyn CommandRunner) -> Result<Vec<SocketRecord>> {
    let stdout = run_checked(runner, LSOF_COMMAND).inspect_err(|e| {
        if let ScanError::CommandExecution { status: 1, stderr, .. } = e {
            if stderr.is_empty() {
                debug!("lsof exited 1 without stderr, usually because no socket matched");
            }
        }
    })?;
    let processes = parse_lsof_output(&stdout)?;

    let mut records = Vec::new();
    for process in &processes {
        for file in &process.files {
            if let Some(record) = to_socket_record(process, file)? {
                records.push(record);
            }
        }
    }
    debug!(
        processes = processes.len(),
        sockets = records.len(),
        "decoded lsof output"
    );

    Ok(records)
}

/// Group `lsof -F` lines into process sets.
///
/// Every line is a one-letter field identifier followed by its value. A `p`
/// line opens a process set, an `f` line opens a file set within it.
pub fn parse_lsof_output(output: &str) -> Result<Vec<LsofProcess>> {
    let mut processes: Vec<LsofProcess> = Vec::new();

    for line in output.lines() {
        let mut chars = line.chars();
        let Some(tag) = chars.next() else {
            continue;
        };
        let value = chars.as_str();

        if tag == 'p' {
            let pid = value
                .parse()
                .map_err(|_| ScanError::malformed(SOURCE, "pid", value))?;
            processes.push(LsofProcess {
                pid,
                ..Default::default()
            });
            continue;
        }

        let Some(process) = processes.last_mut() else {
            return Err(ScanError::malformed(SOURCE, "pid", line));
        };

        match tag {
            'u' => {
                let uid = value
                    .parse()
                    .map_err(|_| ScanError::malformed(SOURCE, "uid", value))?;
                process.uid = Some(uid);
            }
            'c' => process.command = Some(value.to_string()),
            'f' => process.files.push(LsofFile {
                fd: value.to_string(),
                ..Default::default()
            }),
            _ => {
                // Process-level fields we don't use (g, R, L, ...) come before
                // the first file set.
                let Some(file) = process.files.last_mut() else {
                    continue;
                };
                match tag {
                    't' => file.file_type = value.to_string(),
                    'P' => file.protocol = value.to_string(),
                    'n' => file.name = value.to_string(),
                    'T' => {
                        if let Some(state) = value.strip_prefix("ST=") {
                            file.tcp_state = Some(state.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(processes)
}

/// Split an lsof network name into its endpoints.
///
/// The port follows the last `:`, so bracketed IPv6 addresses survive
/// intact. A `*` port is reported as 0, as is a missing remote side.
pub fn parse_network_file(name: &str) -> Result<NetworkFile> {
    let (local, remote) = match name.split_once("->") {
        Some((local, remote)) => (local, Some(remote)),
        None => (name, None),
    };

    let (local_address, local_port) = split_endpoint(local)?;
    let (remote_address, remote_port) = match remote {
        Some(remote) => split_endpoint(remote)?,
        None => (String::new(), 0),
    };

    Ok(NetworkFile {
        local_address,
        local_port,
        remote_address,
        remote_port,
    })
}

fn split_endpoint(endpoint: &str) -> Result<(String, u16)> {
    let (address, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| ScanError::malformed(SOURCE, "name", endpoint))?;
    let port = match port {
        "*" => 0,
        p => p
            .parse()
            .map_err(|_| ScanError::malformed(SOURCE, "port", endpoint))?,
    };
    Ok((address.to_string(), port))
}

/// Map lsof's `TST=` values into the canonical state vocabulary.
pub fn tcp_state(state: Option<&str>) -> SocketState {
    match state {
        Some("LISTEN") => SocketState::Listen,
        Some("ESTABLISHED") => SocketState::Established,
        Some("SYN_SENT") => SocketState::SynSent,
        Some("SYN_RCVD") | Some("SYN_RECEIVED") => SocketState::SynRecv,
        Some("FIN_WAIT_1") => SocketState::FinWait1,
        Some("FIN_WAIT_2") => SocketState::FinWait2,
        Some("TIME_WAIT") => SocketState::TimeWait,
        Some("CLOSED") => SocketState::Close,
        Some("CLOSE_WAIT") => SocketState::CloseWait,
        Some("LAST_ACK") => SocketState::LastAck,
        Some("CLOSING") => SocketState::Closing,
        _ => SocketState::Unknown,
    }
}

/// Turn one IP file set into a socket record. Non-IP files yield `None`.
pub fn to_socket_record(process: &LsofProcess, file: &LsofFile) -> Result<Option<SocketRecord>> {
    if !file.is_ip_socket() {
        return Ok(None);
    }

    let ipv6 = file.file_type == "IPv6";
    let Some(protocol) = Protocol::from_parts(&file.protocol, ipv6) else {
        return Ok(None);
    };

    let endpoints = parse_network_file(&file.name)?;
    let mut local_address = endpoints.local_address;
    // lsof shows a socket bound to any IPv6 address as `*`.
    if protocol.is_ipv6() && local_address == "*" {
        local_address = "[::]".to_string();
    }

    let mut record = SocketRecord::new(
        protocol,
        local_address,
        endpoints.local_port,
        endpoints.remote_address,
        endpoints.remote_port,
        tcp_state(file.tcp_state.as_deref()),
    );
    record.uid = process.uid;
    record.owner_pid = Some(process.pid);

    Ok(Some(record))
}
