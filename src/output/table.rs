use colored::Colorize;
use comfy_table::{Cell, Color, Table};

use crate::types::{SocketRecord, SocketState};

pub fn print_records(records: &[SocketRecord]) {
    if records.is_empty() {
        println!("{}", "No results found".yellow());
        return;
    }

    println!("{}", build_table(records));
    println!("\n{} result(s)", records.len().to_string().green());
}

fn build_table(records: &[SocketRecord]) -> Table {
    let has_remote = records.iter().any(|r| r.state != SocketState::Listen);
    let has_user = records.iter().any(|r| r.user.is_some() || r.uid.is_some());

    let mut headers = vec!["PROTO", "ADDRESS", "PORT"];
    if has_remote {
        headers.push("REMOTE");
    }
    headers.extend(["STATE", "PID", "PROCESS"]);
    if has_user {
        headers.push("USER");
    }

    let mut table = Table::new();
    table.set_header(headers);

    for record in records {
        let proto_color = if record.protocol.is_tcp() {
            Color::Cyan
        } else {
            Color::Magenta
        };

        let mut row = vec![
            Cell::new(record.protocol).fg(proto_color),
            Cell::new(&record.address),
            Cell::new(record.port).fg(Color::Cyan),
        ];

        if has_remote {
            let remote = if record.remote_address.is_empty() {
                "-".to_string()
            } else {
                format!("{}:{}", record.remote_address, record.remote_port)
            };
            row.push(Cell::new(remote));
        }

        let state_color = match record.state {
            SocketState::Listen => Color::Green,
            SocketState::Established => Color::Reset,
            SocketState::Unknown => Color::DarkGrey,
            _ => Color::Yellow,
        };
        row.push(Cell::new(record.state).fg(state_color));

        row.push(Cell::new(
            record.pid().map_or_else(|| "-".to_string(), |pid| pid.to_string()),
        ));
        row.push(Cell::new(record.process_name().unwrap_or("-")));

        if has_user {
            let user = match (&record.user, record.uid) {
                (Some(user), _) => user.name.clone(),
                (None, Some(uid)) => uid.to_string(),
                (None, None) => "-".to_string(),
            };
            row.push(Cell::new(user));
        }

        table.add_row(row);
    }

    table
}
