//! Command-line configuration, mirroring the original server's `optparse`
//! flags (`-H/--host`, `-p/--port`, `-m/--max-clients`, ...) as a
//! `clap::Parser`.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "kvault-server", about = "In-memory multi-datatype key-value server")]
pub struct Cli {
    /// Address to bind the TCP listener to.
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 31337)]
    pub port: u16,

    /// Maximum number of concurrent client connections.
    #[arg(short = 'm', long = "max-clients", default_value_t = 1024)]
    pub max_clients: usize,

    /// Tracing filter directive, e.g. "info" or "kvault=debug".
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    pub log_level: String,

    /// Optional path to write structured logs to, in addition to stderr.
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Snapshot file to RESTORE from at startup, if present.
    #[arg(short = 's', long = "snapshot-path")]
    pub snapshot_path: Option<PathBuf>,
}

impl Cli {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
