use anyhow::{Context, Result};

use super::ViewOptions;
use crate::ports::Ports;
use crate::types::SocketRecord;

pub fn execute(ports: &Ports, query: &str, view: &ViewOptions) -> Result<()> {
    let records = super::select(ports, view).context("Failed to list sockets")?;
    let mut filtered = filter_records(records, query);
    super::print(&mut filtered, view)
}

/// A numeric query matches the local port; anything else matches process
/// names, case-insensitively.
pub fn filter_records(records: Vec<SocketRecord>, query: &str) -> Vec<SocketRecord> {
    if let Ok(port) = query.parse::<u16>() {
        return records.into_iter().filter(|r| r.port == port).collect();
    }

    let needle = query.to_lowercase();
    records
        .into_iter()
        .filter(|r| {
            r.process_name()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProcessDescriptor, Protocol, SocketState};
    use std::sync::Arc;

    fn owned(port: u16, exe: &str) -> SocketRecord {
        let mut record =
            SocketRecord::new(Protocol::Tcp4, "0.0.0.0", port, "0.0.0.0", 0, SocketState::Listen);
        record.process = Some(Arc::new(ProcessDescriptor {
            pid: u32::from(port),
            executable: exe.to_string(),
            command: exe.to_string(),
            state: "sleeping".to_string(),
            socket_inodes: Default::default(),
        }));
        record
    }

    #[test]
    fn test_filter_by_port() {
        let records = vec![owned(22, "/usr/sbin/sshd"), owned(80, "/usr/sbin/nginx")];
        let result = filter_records(records, "80");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].port, 80);
    }

    #[test]
    fn test_filter_by_name_case_insensitive() {
        let mut unowned =
            SocketRecord::new(Protocol::Udp4, "0.0.0.0", 68, "0.0.0.0", 0, SocketState::Close);
        unowned.process = None;
        let records = vec![owned(22, "/usr/sbin/sshd"), owned(80, "/usr/sbin/nginx"), unowned];

        let result = filter_records(records, "NGINX");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].port, 80);
    }
}
