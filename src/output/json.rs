use anyhow::Result;

use crate::types::SocketRecord;

pub fn print_records(records: &[SocketRecord]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}
