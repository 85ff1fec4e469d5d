pub mod list;
pub mod query;

use anyhow::Result;

use crate::cli::{ProtocolFilter, SortField};
use crate::output::{json, table};
use crate::ports::Ports;
use crate::types::SocketRecord;

#[derive(Clone, Copy)]
pub struct ViewOptions {
    pub json: bool,
    /// Every state rather than only listening sockets.
    pub all: bool,
    pub sort: Option<SortField>,
    pub protocol: Option<ProtocolFilter>,
}

impl ViewOptions {
    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }
}

fn select(ports: &Ports, view: &ViewOptions) -> Result<Vec<SocketRecord>> {
    let records = if view.all {
        ports.list()?.to_vec()
    } else {
        ports.listening()?
    };
    Ok(SocketRecord::filter_protocol(records, view.protocol))
}

fn print(records: &mut [SocketRecord], view: &ViewOptions) -> Result<()> {
    SocketRecord::sort_vec(records, view.sort);
    if view.json {
        json::print_records(records)?;
    } else {
        table::print_records(records);
    }
    Ok(())
}
