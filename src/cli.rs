use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::VfsOptions;

#[derive(Parser, Debug)]
#[command(name = "zipvfs")]
#[command(version)]
#[command(about = "Serve files out of a set of ZIP archives by path", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipvfs -l content.zip extra.zip            list every indexed path\n  \
  zipvfs -p a/index.html content.zip         write one entry to stdout\n  \
  zipvfs --no-wait -p a/index.html big.zip   serve before indexing finishes")]
pub struct Cli {
    /// ZIP archives, highest priority first
    #[arg(value_name = "ARCHIVE", required = true)]
    pub archives: Vec<PathBuf>,

    /// List indexed paths (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Write the entry at PATH to stdout (repeatable)
    #[arg(short = 'p', value_name = "PATH")]
    pub print: Vec<String>,

    /// Print the number of indexed entries
    #[arg(short = 'c')]
    pub count: bool,

    /// Maximum number of archives indexed at once
    #[arg(short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Do not verify CRC-32 of served entries
    #[arg(long)]
    pub no_verify: bool,

    /// Serve -p paths without waiting for the index
    #[arg(long)]
    pub no_wait: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn options(&self) -> VfsOptions {
        let mut options = VfsOptions::default().with_verify_crc(!self.no_verify);
        if let Some(jobs) = self.jobs {
            options = options.with_max_parallel_indexing(jobs);
        }
        options
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Maximum level for log output on stderr.
    pub fn log_level(&self) -> Level {
        if self.is_very_quiet() {
            Level::ERROR
        } else if self.is_quiet() {
            Level::WARN
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}
