pub mod proc_fd;
pub mod proc_parser;

use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, ScanError};
use crate::host::FileSystem;
use crate::types::{Protocol, SocketRecord};
use proc_parser::parse_proc_net_file;

pub use proc_fd::ProcFsProcesses;

/// Kernel socket tables in enumeration order.
pub const PROC_NET_TABLES: [(&str, Protocol); 4] = [
    ("/proc/net/tcp", Protocol::Tcp4),
    ("/proc/net/udp", Protocol::Udp4),
    ("/proc/net/tcp6", Protocol::Tcp6),
    ("/proc/net/udp6", Protocol::Udp6),
];

/// Read and decode all four `/proc/net` tables.
///
/// The IPv6 tables are absent when IPv6 is disabled; they count as empty.
/// Any other failure aborts the whole enumeration.
pub fn list_sockets(fs: &dyn FileSystem) -> Result<Vec<SocketRecord>> {
    let mut records = Vec::new();
    for (path, protocol) in PROC_NET_TABLES {
        records.extend(read_table(fs, Path::new(path), protocol)?);
    }
    Ok(records)
}

fn read_table(fs: &dyn FileSystem, path: &Path, protocol: Protocol) -> Result<Vec<SocketRecord>> {
    match fs.is_dir(path) {
        Ok(false) => {}
        Ok(true) => return Err(ScanError::NotAFile { path: path.into() }),
        Err(e) if e.kind() == io::ErrorKind::NotFound && protocol.is_ipv6() => {
            debug!(path = %path.display(), "ipv6 socket table missing, treating as empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ScanError::io(path, e)),
    }

    let content = fs.read_to_string(path).map_err(|e| ScanError::io(path, e))?;
    let records = parse_proc_net_file(&content, protocol, &path.display().to_string())?;
    debug!(path = %path.display(), count = records.len(), "decoded socket table");

    Ok(records)
}
