use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a mapping over a batch of document ids.
    Run {
        /// Path to the mapping definition (camelCase JSON).
        #[arg(long)]
        mapping: PathBuf,

        /// Comma-separated document ids.
        #[arg(long, conflicts_with = "ids_file")]
        ids: Option<String>,

        /// File with one document id per line.
        #[arg(long)]
        ids_file: Option<PathBuf>,

        /// Server connection url, `key=url`. Repeatable. Keys not given
        /// here fall back to `TRASPASO_SERVER_<KEY>` env variables.
        #[arg(long = "server", value_name = "KEY=URL")]
        servers: Vec<String>,

        /// State directory (mapping/execution/counter stores).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Validate a mapping definition and print the findings.
    Validate {
        #[arg(long)]
        mapping: PathBuf,
    },

    /// Inspect or reset a centralized counter.
    Counter {
        #[command(subcommand)]
        action: CounterAction,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Probe a server connection.
    Ping {
        /// Connection url (mysql://, postgres://, mssql://, ADO string).
        #[arg(long)]
        url: String,
    },

    /// List execution records for a mapping.
    Executions {
        #[arg(long)]
        mapping_id: String,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CounterAction {
    /// Show the counter document.
    Show { name: String },

    /// Set the counter to a value, regardless of its current one.
    Reset {
        name: String,
        #[arg(long)]
        value: i64,
        #[arg(long)]
        segment: Option<String>,
    },

    /// Windowed counter metrics (last 24 h).
    Metrics { name: String },

    /// Reclaim expired reservations now.
    Sweep { name: String },
}
