// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The operator REPL: `ls`, `msg <id> <text>`, `file <id> <path>`, `q`.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing::error;

use crate::messenger::Messenger;

/// Prompt interactively for the peer display name and interface when a
/// flag was left unset on the command line, matching the original
/// startup-prompt behavior for a fully unconfigured invocation.
pub fn prompt_missing_settings(name: Option<String>, iface: Option<String>) -> io::Result<(String, String)> {
    let name = match name {
        Some(name) => name,
        None => dialoguer::Input::new().with_prompt("Display name").interact_text()?,
    };

    let iface = match iface {
        Some(iface) => iface,
        None => {
            let ifaces = crate::transceiver::interface_names();
            if ifaces.is_empty() {
                dialoguer::Input::new().with_prompt("Monitor-mode interface").interact_text()?
            } else {
                let selection = dialoguer::Select::new()
                    .with_prompt("Monitor-mode interface")
                    .items(&ifaces)
                    .default(0)
                    .interact()?;
                ifaces[selection].clone()
            }
        }
    };

    Ok((name, iface))
}

/// Run the interactive command loop until `q` or EOF on stdin.
pub fn run(messenger: &Messenger, our_name: &str) {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("ghostframe> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let Some(Ok(line)) = lines.next() else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(2, ' ');
        let command = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match command {
            "ls" => cmd_ls(messenger),
            "msg" => cmd_msg(messenger, our_name, rest),
            "file" => cmd_file(messenger, rest),
            "q" => {
                println!("shutting down...");
                break;
            }
            other => println!("unknown command: {other:?} (try ls, msg, file, q)"),
        }
    }
}

fn cmd_ls(messenger: &Messenger) {
    let peers = messenger.known_peers();
    if peers.is_empty() {
        println!("(no peers known yet)");
        return;
    }
    for peer in peers {
        let age = peer.last_seen.elapsed().as_secs();
        println!("{}\t{}\tlast seen {}s ago", peer.id, peer.mac, age);
    }
}

fn cmd_msg(messenger: &Messenger, our_name: &str, rest: &str) {
    let Some((peer_id, text)) = rest.split_once(' ') else {
        println!("usage: msg <id> <text>");
        return;
    };
    match messenger.send_message(peer_id, text) {
        Ok(()) => println!("{our_name} -> {peer_id}: {text}"),
        Err(e) => {
            error!(error = %e, "send_message failed");
            println!("{e}");
        }
    }
}

fn cmd_file(messenger: &Messenger, rest: &str) {
    let Some((peer_id, path)) = rest.split_once(' ') else {
        println!("usage: file <id> <path>");
        return;
    };
    let path = PathBuf::from(path.trim());
    match messenger.send_file(peer_id, &path) {
        Ok(chunk_count) => println!("sent {} chunks of {}", chunk_count, path.display()),
        Err(e) => {
            error!(error = %e, "send_file failed");
            println!("{e}");
        }
    }
}
