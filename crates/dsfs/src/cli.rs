//! Command-line front end: argument parsing and subcommand dispatch.

use crate::config::FsConfig;
use crate::filesystem::FileSystem;
use crate::info::FileInfo;
use crate::types::{FileMode, OpenFlags};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;

/// Global options and the subcommand to run.
#[derive(Parser, Debug)]
#[command(name = "dsfs")]
#[command(about = "Filesystem on a key-value document store", long_about = None)]
pub struct Cli {
    /// Config file (.toml or .json)
    #[arg(short, long, env = "DSFS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Snapshot file to load and flush the store to
    #[arg(short, long, env = "DSFS_STORE")]
    pub store: Option<PathBuf>,

    /// Store namespace to operate in
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Entity kind records are stored as
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Filesystem operations exposed on the command line.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a directory
    Mkdir {
        /// Directory to create
        path: String,
        /// Create missing parents; an existing directory is not an error
        #[arg(short, long)]
        parents: bool,
        /// Octal mode including the directory bit
        #[arg(short, long, default_value = "40755", value_parser = parse_mode)]
        mode: FileMode,
    },
    /// Write a file from an argument or stdin, replacing any existing one
    Put {
        /// File to write
        path: String,
        /// Contents; read from stdin when omitted
        data: Option<String>,
    },
    /// Print a file's contents
    Cat {
        /// File to read
        path: String,
    },
    /// List a directory, or describe a file
    Ls {
        /// Path to list
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show metadata for a path
    Stat {
        /// Path to describe
        path: String,
    },
    /// Rename a file or directory record
    Mv {
        /// Current path
        from: String,
        /// New path
        to: String,
    },
    /// Remove a path
    Rm {
        /// Path to remove
        path: String,
        /// Remove everything beneath the path too
        #[arg(short, long)]
        recursive: bool,
    },
    /// Resize a file, zero-padding when growing
    Truncate {
        /// File to resize
        path: String,
        /// New size in bytes
        size: i64,
    },
}

fn parse_mode(s: &str) -> std::result::Result<FileMode, String> {
    u32::from_str_radix(s, 8)
        .map(FileMode::new)
        .map_err(|e| format!("invalid octal mode {:?}: {}", s, e))
}

impl Cli {
    /// Resolves the effective config: the file named by `--config` (if
    /// any), then command-line overrides.
    pub fn load_config(&self) -> Result<FsConfig> {
        let mut config = match &self.config {
            Some(path) => FsConfig::from_file(path)?,
            None => FsConfig::default(),
        };
        if let Some(store) = &self.store {
            config.store_path = Some(store.clone());
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(kind) = &self.kind {
            config.kind = kind.clone();
        }
        config.verbose |= self.verbose;
        Ok(config)
    }

    /// Runs the subcommand. `input` feeds `put` when no data argument is
    /// given; listings and file contents go to `out`.
    pub fn run(&self, fs: &FileSystem, input: &mut dyn Read, out: &mut dyn Write) -> Result<()> {
        match &self.command {
            Command::Mkdir {
                path,
                parents,
                mode,
            } => {
                if *parents {
                    fs.mkdir_all(path, *mode)?;
                } else {
                    fs.mkdir(path, *mode)?;
                }
            }
            Command::Put { path, data } => {
                let bytes = match data {
                    Some(data) => data.clone().into_bytes(),
                    None => {
                        let mut buf = Vec::new();
                        input.read_to_end(&mut buf)?;
                        buf
                    }
                };
                let mut file = fs.create(path)?;
                file.write(&bytes)?;
                file.close()?;
            }
            Command::Cat { path } => {
                let mut file = fs.open(path)?;
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)?;
                out.write_all(&buf)?;
            }
            Command::Ls { path } => {
                let mut dir = fs.open(path)?;
                let info = dir.stat()?;
                if info.is_dir() {
                    for entry in dir.read_dir(0)? {
                        Self::print_entry(out, &entry)?;
                    }
                } else {
                    Self::print_entry(out, &info)?;
                }
            }
            Command::Stat { path } => {
                let info = fs.stat(path)?;
                writeln!(out, "Name: {}", info.name())?;
                writeln!(out, "Size: {}", info.size())?;
                writeln!(out, "Mode: {}", info.mode())?;
                writeln!(out, "Directory: {}", info.is_dir())?;
                writeln!(out, "Modified: {}", info.mod_time().secs)?;
            }
            Command::Mv { from, to } => fs.rename(from, to)?,
            Command::Rm { path, recursive } => {
                if *recursive {
                    fs.remove_all(path)?;
                } else {
                    fs.remove(path)?;
                }
            }
            Command::Truncate { path, size } => {
                let mut file = fs.open_file(path, OpenFlags::READ_WRITE, FileMode::DEFAULT_FILE)?;
                file.truncate(*size)?;
                file.close()?;
            }
        }
        Ok(())
    }

    fn print_entry(out: &mut dyn Write, info: &FileInfo) -> Result<()> {
        let suffix = if info.is_dir() { "/" } else { "" };
        writeln!(
            out,
            "{:>7} {:>10} {}{}",
            info.mode().to_string(),
            info.size(),
            info.name(),
            suffix
        )?;
        Ok(())
    }
}
