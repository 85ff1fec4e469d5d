//! Windows TCP connections via `Get-NetTCPConnection`.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, ScanError};
use crate::host::{run_checked, CommandRunner};
use crate::registry::ProcessManager;
use crate::types::{ProcessDescriptor, Protocol, SocketRecord, SocketState};

pub const TCP_CONNECTIONS_SCRIPT: &str = "Get-NetTCPConnection | ConvertTo-Json";

pub const PROCESSES_SCRIPT: &str =
    "Get-Process | Select-Object Id,ProcessName,Path | ConvertTo-Json";

/// One entry of `Get-NetTCPConnection` JSON output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetTcpConnection {
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub state: u32,
    pub owning_process: u32,
}

/// `MSFT_NetTCPConnection.State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpConnectionState {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
    TimeWait,
    DeleteTcb,
    Bound,
}

impl TcpConnectionState {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => TcpConnectionState::Closed,
            2 => TcpConnectionState::Listen,
            3 => TcpConnectionState::SynSent,
            4 => TcpConnectionState::SynReceived,
            5 => TcpConnectionState::Established,
            6 => TcpConnectionState::FinWait1,
            7 => TcpConnectionState::FinWait2,
            8 => TcpConnectionState::CloseWait,
            9 => TcpConnectionState::Closing,
            10 => TcpConnectionState::LastAck,
            11 => TcpConnectionState::TimeWait,
            12 => TcpConnectionState::DeleteTcb,
            100 => TcpConnectionState::Bound,
            _ => return None,
        })
    }

    pub fn canonical(self) -> SocketState {
        match self {
            TcpConnectionState::Listen => SocketState::Listen,
            TcpConnectionState::Closed => SocketState::Close,
            TcpConnectionState::SynSent => SocketState::SynSent,
            TcpConnectionState::SynReceived => SocketState::SynRecv,
            TcpConnectionState::Established => SocketState::Established,
            TcpConnectionState::FinWait1 => SocketState::FinWait1,
            TcpConnectionState::FinWait2 => SocketState::FinWait2,
            TcpConnectionState::CloseWait => SocketState::CloseWait,
            TcpConnectionState::Closing => SocketState::Closing,
            TcpConnectionState::LastAck => SocketState::LastAck,
            TcpConnectionState::TimeWait => SocketState::TimeWait,
            TcpConnectionState::DeleteTcb => SocketState::DeleteTcb,
            TcpConnectionState::Bound => SocketState::Bound,
        }
    }
}

/// Wrap a PowerShell script into a `-EncodedCommand` invocation.
///
/// The encoding is base64 over UTF-16LE, which sidesteps all shell quoting.
pub fn encode_powershell(script: &str) -> String {
    let utf16: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    format!(
        "powershell.exe -NoProfile -NonInteractive -EncodedCommand {}",
        STANDARD.encode(utf16)
    )
}

pub fn list_sockets(runner: &dyn CommandRunner) -> Result<Vec<SocketRecord>> {
    let stdout = run_checked(runner, &encode_powershell(TCP_CONNECTIONS_SCRIPT))?;
    let connections: Vec<NetTcpConnection> = parse_json_list(&stdout, "Get-NetTCPConnection")?;
    debug!(count = connections.len(), "decoded windows tcp connections");
    Ok(connections.iter().map(to_socket_record).collect())
}

pub fn to_socket_record(conn: &NetTcpConnection) -> SocketRecord {
    let protocol = if conn.local_address.contains(':') {
        Protocol::Tcp6
    } else {
        Protocol::Tcp4
    };
    let state = TcpConnectionState::from_code(conn.state)
        .map(TcpConnectionState::canonical)
        .unwrap_or(SocketState::Unknown);

    let mut record = SocketRecord::new(
        protocol,
        conn.local_address.clone(),
        conn.local_port,
        conn.remote_address.clone(),
        conn.remote_port,
        state,
    );
    record.owner_pid = Some(conn.owning_process);
    record
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// `ConvertTo-Json` emits a bare object for a single result and nothing at
/// all for none.
pub fn parse_json_list<T: DeserializeOwned>(stdout: &str, source: &str) -> Result<Vec<T>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str(trimmed) {
        Ok(OneOrMany::Many(items)) => Ok(items),
        Ok(OneOrMany::One(item)) => Ok(vec![item]),
        Err(e) => Err(ScanError::MalformedOutput {
            source_name: source.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WinProcess {
    id: u32,
    process_name: String,
    path: Option<String>,
}

/// Lists processes through `Get-Process`.
pub struct PowerShellProcesses {
    runner: Arc<dyn CommandRunner>,
}

impl PowerShellProcesses {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        PowerShellProcesses { runner }
    }
}

impl ProcessManager for PowerShellProcesses {
    fn list(&self) -> Result<Vec<ProcessDescriptor>> {
        let stdout = run_checked(self.runner.as_ref(), &encode_powershell(PROCESSES_SCRIPT))?;
        let processes: Vec<WinProcess> = parse_json_list(&stdout, "Get-Process")?;

        Ok(processes
            .into_iter()
            .map(|p| {
                let executable = p.path.unwrap_or_else(|| p.process_name.clone());
                ProcessDescriptor {
                    pid: p.id,
                    command: executable.clone(),
                    executable,
                    state: "running".to_string(),
                    socket_inodes: Default::default(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTIONS: &str = r#"[
    {
        "LocalAddress": "0.0.0.0",
        "LocalPort": 135,
        "RemoteAddress": "0.0.0.0",
        "RemotePort": 0,
        "State": 2,
        "AppliedSetting": null,
        "OwningProcess": 1044,
        "CreationTime": "\/Date(1700000000000)\/"
    },
    {
        "LocalAddress": "::",
        "LocalPort": 445,
        "RemoteAddress": "::",
        "RemotePort": 0,
        "State": 2,
        "OwningProcess": 4
    },
    {
        "LocalAddress": "10.0.0.5",
        "LocalPort": 50123,
        "RemoteAddress": "20.42.65.90",
        "RemotePort": 443,
        "State": 5,
        "OwningProcess": 7312
    },
    {
        "LocalAddress": "10.0.0.5",
        "LocalPort": 50200,
        "RemoteAddress": "0.0.0.0",
        "RemotePort": 0,
        "State": 100,
        "OwningProcess": 7312
    }
]"#;

    #[test]
    fn test_parse_connections() {
        let conns: Vec<NetTcpConnection> = parse_json_list(CONNECTIONS, "test").unwrap();
        assert_eq!(conns.len(), 4);
        assert_eq!(conns[0].owning_process, 1044);

        let records: Vec<SocketRecord> = conns.iter().map(to_socket_record).collect();
        assert_eq!(records[0].protocol, Protocol::Tcp4);
        assert_eq!(records[0].state, SocketState::Listen);
        assert_eq!(records[1].protocol, Protocol::Tcp6);
        assert_eq!(records[1].address, "::");
        assert_eq!(records[2].state, SocketState::Established);
        assert_eq!(records[2].remote_port, 443);
        assert_eq!(records[3].state.to_string(), "bound");
        assert_eq!(records[2].owner_pid, Some(7312));
        assert!(records.iter().all(|r| r.inode == 0 && r.uid.is_none()));
    }

    #[test]
    fn test_parse_single_object() {
        let single = r#"{"LocalAddress":"127.0.0.1","LocalPort":5357,"RemoteAddress":"0.0.0.0","RemotePort":0,"State":12,"OwningProcess":4}"#;
        let conns: Vec<NetTcpConnection> = parse_json_list(single, "test").unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(to_socket_record(&conns[0]).state, SocketState::DeleteTcb);
    }

    #[test]
    fn test_parse_empty_output() {
        let conns: Vec<NetTcpConnection> = parse_json_list("  \r\n", "test").unwrap();
        assert!(conns.is_empty());
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_json_list::<NetTcpConnection>("Get-NetTCPConnection : not recognized", "Get-NetTCPConnection")
            .unwrap_err();
        assert!(matches!(err, ScanError::MalformedOutput { .. }));
    }

    #[test]
    fn test_state_mapping_is_exhaustive() {
        let expected = [
            (1, "close"),
            (2, "listen"),
            (3, "syn sent"),
            (4, "syn recv"),
            (5, "established"),
            (6, "fin wait1"),
            (7, "fin wait2"),
            (8, "close wait"),
            (9, "closing"),
            (10, "last ack"),
            (11, "time wait"),
            (12, "deletetcb"),
            (100, "bound"),
        ];
        for (code, name) in expected {
            let state = TcpConnectionState::from_code(code).unwrap().canonical();
            assert_eq!(state.to_string(), name, "code {code}");
        }
        assert_eq!(TcpConnectionState::from_code(42), None);
    }

    #[test]
    fn test_encode_powershell() {
        let cmd = encode_powershell("dir");
        // "dir" as UTF-16LE: 64 00 69 00 72 00
        assert_eq!(
            cmd,
            "powershell.exe -NoProfile -NonInteractive -EncodedCommand ZABpAHIA"
        );
    }
}
