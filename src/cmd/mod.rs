mod import;
mod statements;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use mysql_import::ConnectionSettings;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mysql-import")]
#[command(version)]
#[command(about = "Import MySQL dump files into a live database, one statement at a time", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import dump files into a database, in order
    Import(ImportArgs),

    /// Print the statements a dump splits into, without touching a database
    Statements {
        /// Dump files, directories, or glob patterns (e.g., dumps/**/*.sql)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Text encoding of the dump files
        #[arg(short, long, default_value = "utf8")]
        encoding: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ImportArgs {
    /// Dump files, directories (searched recursively), or glob patterns.
    /// Supports .gz, .bz2, .xz, .zst compression
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// YAML config file with connection settings and encoding
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Text encoding of the dump files: utf8, utf16le, latin1, ascii
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Import into a local DuckDB database file instead of a MySQL server
    #[arg(long, value_name = "PATH")]
    pub duckdb: Option<PathBuf>,

    /// Show progress during import
    #[arg(short, long)]
    pub progress: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Connection flags. Each one overrides the config file.
#[derive(Args, Default)]
pub struct ConnectionArgs {
    /// Server host
    #[arg(long)]
    pub host: Option<String>,

    /// Server port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// User name
    #[arg(short, long)]
    pub user: Option<String>,

    /// Password (falls back to MYSQL_PWD)
    #[arg(long)]
    pub password: Option<String>,

    /// Database to import into
    #[arg(short = 'D', long)]
    pub database: Option<String>,

    /// Unix socket path
    #[arg(short = 'S', long)]
    pub socket: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Layer the flags over `base`, then fill a missing password from `env_password`.
    pub fn apply(&self, mut base: ConnectionSettings, env_password: Option<String>) -> ConnectionSettings {
        if let Some(host) = &self.host {
            base.host = host.clone();
        }
        if let Some(port) = self.port {
            base.port = port;
        }
        if let Some(user) = &self.user {
            base.user = user.clone();
        }
        if self.password.is_some() {
            base.password = self.password.clone();
        }
        if self.database.is_some() {
            base.database = self.database.clone();
        }
        if self.socket.is_some() {
            base.socket = self.socket.clone();
        }
        if base.password.is_none() {
            base.password = env_password;
        }
        base
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Import(args) => import::run(args),
        Commands::Statements {
            inputs,
            encoding,
            json,
        } => statements::run(inputs, encoding, json),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "mysql-import",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}
