use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Use this snapshot file instead of the configured one
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub db: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add the packages of JSON record files, one transaction per file
    #[command(arg_required_else_help = true)]
    Import {
        /// JSON files holding an array of package records
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        files: Vec<String>,
    },

    /// Remove a feed from the database
    #[command(arg_required_else_help = true)]
    #[clap(name = "drop-feed")]
    DropFeed {
        /// Feed as Type:Name
        feed: String,
    },

    /// Show a package instance and its dependencies
    #[command(arg_required_else_help = true)]
    Find {
        /// Package as Type:Name/Version
        package: String,

        /// Also show ghost packages
        #[arg(long)]
        ghost: bool,
    },

    /// Show the versions each feed publishes for a package
    #[command(arg_required_else_help = true)]
    Versions {
        /// Package as Type:Name
        package: String,
    },

    /// List package instances
    #[clap(name = "list", visible_alias = "ls")]
    List {
        /// Restrict to a type (NuGet) or a package (NuGet:Name)
        filter: Option<String>,
    },

    /// List feeds
    Feeds,

    /// Show snapshot statistics
    Inspect,

    /// Stamp the database with the current time
    Touch,

    /// Print the configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}
