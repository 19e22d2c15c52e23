//! Command-line definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tablecraft - configuration-driven CRUD screens from the terminal
#[derive(Parser, Debug)]
#[command(name = "tablecraft")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Read table/validation config from this directory instead of the backend
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the CLI configuration file
    Config {
        /// Config action
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List configured tables
    Tables,

    /// Show a table's records
    List {
        /// Table name
        table: String,
        /// Case-insensitive search text
        #[arg(short, long)]
        search: Option<String>,
        /// Column to sort by
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
    },

    /// Show a table's form
    Form {
        /// Table name
        table: String,
        /// JSON file with the record to edit; omitted for a create form
        #[arg(short, long)]
        record: Option<PathBuf>,
    },

    /// Validate a record without sending it
    Validate {
        /// Table name
        table: String,
        /// JSON file with the record
        file: PathBuf,
        /// Validate as an edit of an existing record
        #[arg(long)]
        edit: bool,
    },

    /// Validate a record and create or update it
    Submit {
        /// Table name
        table: String,
        /// JSON file with the record
        file: PathBuf,
        /// Update the existing record instead of creating one
        #[arg(long)]
        edit: bool,
    },

    /// Delete a record by key
    Delete {
        /// Table name
        table: String,
        /// Key columns as COLUMN=VALUE (repeat for composite keys)
        #[arg(short, long = "key", required = true, num_args = 1..)]
        keys: Vec<String>,
    },

    /// Generate configuration files from schema metadata
    Generate {
        /// Schema metadata JSON file
        metadata: PathBuf,
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path
    Path,
    /// Get a value by dotted key
    Get {
        /// Dotted key, e.g. `api.base_url`
        key: String,
    },
    /// Set a value by dotted key
    Set {
        /// Dotted key, e.g. `api.base_url`
        key: String,
        /// New value
        value: String,
    },
    /// Create a default config file
    Init {
        /// Where to write it; defaults to the platform config directory
        #[arg(short, long)]
        file: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration as environment variables
    Export {
        /// Format as `--env` flags for `docker run`
        #[arg(long)]
        docker_env: bool,
    },
}
