//! Command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Modbus slave simulator
#[derive(Parser, Debug)]
#[command(name = "slavesim")]
#[command(author, version, about = "Modbus slave simulator (TCP and serial RTU)")]
pub struct Cli {
    /// Service settings file (YAML)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// Log level or filter directive, overrides the settings file
    #[arg(short, long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start every slave of a document and serve until Ctrl+C
    Run {
        /// Simulator document (.mbsim)
        config: PathBuf,
        /// Write live register values back to the document on exit
        #[arg(long)]
        save_on_exit: bool,
    },

    /// Check a document without binding any transport
    Validate {
        /// Simulator document (.mbsim)
        config: PathBuf,
    },

    /// Write a sample document
    Init {
        /// Output path
        #[arg(default_value = "slavesim.mbsim")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
