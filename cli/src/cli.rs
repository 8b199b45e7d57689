use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "wellspring")]
#[command(about = "Maintenance jobs for the Wellspring content directory", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show timing/latency information
    #[arg(long, global = true)]
    pub timing: bool,

    /// Enable verbose debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the items under a prefix
    List {
        #[command(flatten)]
        target: Target,

        /// Items requested per listing call
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Delete every item under a prefix
    Clear {
        #[command(flatten)]
        target: Target,

        /// Identifiers per delete call
        #[arg(long, short = 'b')]
        batch_size: Option<usize>,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,

        /// Stop at the first failed batch
        #[arg(long)]
        abort_on_failure: bool,

        /// Delete what was found even if listing stopped early
        #[arg(long)]
        allow_partial: bool,
    },
    /// Find the best product match for some keywords
    Lookup {
        /// Search keywords
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Look up one product by ASIN
    Item {
        asin: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Which collection to operate on, and where in it.
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Storage backend
    #[arg(long, value_enum)]
    pub backend: Backend,

    /// Folder or key prefix, e.g. `Home/`
    #[arg(long, short = 'p')]
    pub prefix: String,

    /// Only items directly under the prefix, not in nested folders
    #[arg(long)]
    pub direct_children: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Cloudinary,
    R2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
