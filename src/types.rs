//! Core data types for socket information.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::cli::{ProtocolFilter, SortField};

/// One socket as seen on the host, in the canonical model shared by every
/// platform decoder.
///
/// Equality and hashing follow the natural key only (protocol, both
/// endpoints and state); process, user and inode are associations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketRecord {
    pub protocol: Protocol,
    pub address: String,
    pub port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub state: SocketState,
    pub process: Option<Arc<ProcessDescriptor>>,
    pub user: Option<Arc<UserDescriptor>>,
    /// Owner uid as reported by the socket source.
    #[serde(skip)]
    pub uid: Option<u32>,
    /// Owner pid as reported by the socket source (Windows, lsof).
    #[serde(skip)]
    pub owner_pid: Option<u32>,
    /// Kernel socket inode (Linux only, 0 elsewhere).
    #[serde(skip)]
    pub inode: u64,
}

/// Identity of a socket record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocketKey<'a> {
    pub protocol: Protocol,
    pub address: &'a str,
    pub port: u16,
    pub remote_address: &'a str,
    pub remote_port: u16,
    pub state: SocketState,
}

impl SocketRecord {
    pub fn new(
        protocol: Protocol,
        address: impl Into<String>,
        port: u16,
        remote_address: impl Into<String>,
        remote_port: u16,
        state: SocketState,
    ) -> Self {
        SocketRecord {
            protocol,
            address: address.into(),
            port,
            remote_address: remote_address.into(),
            remote_port,
            state,
            process: None,
            user: None,
            uid: None,
            owner_pid: None,
            inode: 0,
        }
    }

    pub fn key(&self) -> SocketKey<'_> {
        SocketKey {
            protocol: self.protocol,
            address: &self.address,
            port: self.port,
            remote_address: &self.remote_address,
            remote_port: self.remote_port,
            state: self.state,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.pid).or(self.owner_pid)
    }

    pub fn process_name(&self) -> Option<&str> {
        self.process.as_ref().map(|p| p.name())
    }

    pub fn sort_vec(records: &mut [SocketRecord], sort: Option<SortField>) {
        match sort {
            Some(SortField::Port) => records.sort_by_key(|r| r.port),
            Some(SortField::Pid) => records.sort_by_key(|r| r.pid()),
            Some(SortField::Name) => records.sort_by(|a, b| a.process_name().cmp(&b.process_name())),
            None => {}
        }
    }

    pub fn filter_protocol(
        records: Vec<SocketRecord>,
        filter: Option<ProtocolFilter>,
    ) -> Vec<SocketRecord> {
        match filter {
            None => records,
            Some(ProtocolFilter::Tcp) => records.into_iter().filter(|r| r.protocol.is_tcp()).collect(),
            Some(ProtocolFilter::Udp) => records.into_iter().filter(|r| !r.protocol.is_tcp()).collect(),
        }
    }
}

impl PartialEq for SocketRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SocketRecord {}

impl Hash for SocketRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp4,
    Tcp6,
    Udp4,
    Udp6,
}

impl Protocol {
    pub fn is_tcp(self) -> bool {
        matches!(self, Protocol::Tcp4 | Protocol::Tcp6)
    }

    pub fn is_ipv6(self) -> bool {
        matches!(self, Protocol::Tcp6 | Protocol::Udp6)
    }

    /// Combine a transport name (`tcp`/`udp`, any case) with an IP version.
    pub fn from_parts(transport: &str, ipv6: bool) -> Option<Self> {
        match (transport.to_ascii_lowercase().as_str(), ipv6) {
            ("tcp", false) => Some(Protocol::Tcp4),
            ("tcp", true) => Some(Protocol::Tcp6),
            ("udp", false) => Some(Protocol::Udp4),
            ("udp", true) => Some(Protocol::Udp6),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp4 => write!(f, "tcp4"),
            Protocol::Tcp6 => write!(f, "tcp6"),
            Protocol::Udp4 => write!(f, "udp4"),
            Protocol::Udp6 => write!(f, "udp6"),
        }
    }
}

/// Canonical socket state vocabulary every decoder maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
    /// Windows only; no Unix equivalent.
    DeleteTcb,
    /// Windows only; no Unix equivalent.
    Bound,
    Unknown,
}

impl SocketState {
    /// Linux kernel TCP state numbering, as found in `/proc/net/*`.
    pub fn from_kernel(num: u64) -> Self {
        match num {
            1 => SocketState::Established,
            2 => SocketState::SynSent,
            3 => SocketState::SynRecv,
            4 => SocketState::FinWait1,
            5 => SocketState::FinWait2,
            6 => SocketState::TimeWait,
            7 => SocketState::Close,
            8 => SocketState::CloseWait,
            9 => SocketState::LastAck,
            10 => SocketState::Listen,
            11 => SocketState::Closing,
            12 => SocketState::NewSynRecv,
            _ => SocketState::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SocketState::Established => "established",
            SocketState::SynSent => "syn sent",
            SocketState::SynRecv => "syn recv",
            SocketState::FinWait1 => "fin wait1",
            SocketState::FinWait2 => "fin wait2",
            SocketState::TimeWait => "time wait",
            SocketState::Close => "close",
            SocketState::CloseWait => "close wait",
            SocketState::LastAck => "last ack",
            SocketState::Listen => "listen",
            SocketState::Closing => "closing",
            SocketState::NewSynRecv => "new syn recv",
            SocketState::DeleteTcb => "deletetcb",
            SocketState::Bound => "bound",
            SocketState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SocketState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A running process as reported by the process manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDescriptor {
    pub pid: u32,
    pub executable: String,
    pub command: String,
    pub state: String,
    /// Socket inodes held open by the process (Linux).
    #[serde(skip)]
    pub socket_inodes: BTreeSet<u64>,
}

impl ProcessDescriptor {
    /// Short display name: the executable's file name.
    pub fn name(&self) -> &str {
        let exe = self.executable.trim_end_matches(['/', '\\']);
        exe.rsplit(['/', '\\']).next().unwrap_or(exe)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDescriptor {
    pub uid: u32,
    pub name: String,
}
