// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CLI arguments and the optional JSON config file that can supply
//! defaults for any of them.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Ghost Frames peer-to-peer messenger over raw 802.11 data frames.
#[derive(Parser, Debug)]
#[command(name = "ghostframe")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Display name to announce to other peers
    #[arg(long)]
    pub name: Option<String>,

    /// Monitor-mode interface to inject and sniff frames on
    #[arg(long)]
    pub iface: Option<String>,

    /// Raise the log filter from info to debug
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Optional JSON config file supplying defaults for --name/--iface/--debug
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// The on-disk config shape merged with `--name`/`--iface`/`--debug` when
/// those flags are absent. Every field is optional so a partial file can
/// still fill in just what's missing from the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub iface: Option<String>,
    #[serde(default)]
    pub debug: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(s) => write!(f, "failed to read config file: {s}"),
            Self::Parse(s) => write!(f, "failed to parse config file: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// The fully resolved settings the rest of the program runs with, after
/// merging CLI flags over an optional config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub name: Option<String>,
    pub iface: Option<String>,
    pub debug: bool,
}

impl Settings {
    /// Merge CLI args with an optional config file: a CLI flag always wins
    /// over the file, and the file fills in anything the CLI left unset.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => Some(FileConfig::from_file(path)?),
            None => None,
        };

        let name = args.name.clone().or_else(|| file.as_ref().and_then(|f| f.name.clone()));
        let iface = args.iface.clone().or_else(|| file.as_ref().and_then(|f| f.iface.clone()));
        let debug = args.debug || file.as_ref().and_then(|f| f.debug).unwrap_or(false);

        Ok(Self { name, iface, debug })
    }
}
