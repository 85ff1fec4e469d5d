use anyhow::{Context, Result};

use super::ViewOptions;
use crate::ports::Ports;

pub fn execute(ports: &Ports, view: &ViewOptions) -> Result<()> {
    let mut records = super::select(ports, view).context("Failed to list sockets")?;
    super::print(&mut records, view)
}
