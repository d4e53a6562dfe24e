use std::sync::Arc;

use clap::Parser;
use cli::{Args, Commands};
use error::CliResult;
use events::spawn_event_handler;
use logging::setup_logging;
use nu_ansi_term::Color::Yellow;
use pkgdb_config::config::{config_path, Config};
use pkgdb_events::{ChannelSink, EventSinkHandle};
use pkgdb_utils::path::resolve_path;
use session::Session;
use tracing::{debug, warn};
use utils::{set_color, Colored};

mod cli;
mod error;
mod events;
mod inspect;
mod logging;
mod modify;
mod query;
mod session;
mod utils;

fn handle_cli(args: Args) -> CliResult<()> {
    let config_file = match &args.config {
        Some(path) => resolve_path(path)?,
        None => config_path(),
    };

    if let Commands::Config { init: true } = args.command {
        return inspect::init_config(&config_file);
    }

    let config = Config::load_from(&config_file)?;
    if args.no_color || !config.display.color() {
        set_color(false);
    }
    debug!(config = %config_file.display(), "configuration loaded");

    let (sink, receiver) = ChannelSink::new();
    let guard = spawn_event_handler(receiver);
    let events: EventSinkHandle = Arc::new(sink);
    let session = Session::new(config, args.db.as_deref(), events)?;

    let result = match &args.command {
        Commands::Import { files } => modify::import_files(&session, files),
        Commands::DropFeed { feed } => modify::drop_feed(&session, feed),
        Commands::Touch => modify::touch(&session),
        Commands::Find { package, ghost } => {
            session
                .load()
                .and_then(|db| query::find_package(&session, &db, package, *ghost))
        }
        Commands::Versions { package } => {
            session
                .load()
                .and_then(|db| query::list_versions(&session, &db, package))
        }
        Commands::List { filter } => {
            session
                .load()
                .and_then(|db| query::list_packages(&session, &db, filter.as_deref()))
        }
        Commands::Feeds => {
            session
                .load()
                .and_then(|db| query::list_feeds(&session, &db))
        }
        Commands::Inspect => {
            session
                .load()
                .and_then(|db| inspect::inspect_database(&session, &db))
        }
        Commands::Config { .. } => inspect::show_config(&session, &config_file),
    };

    drop(session);
    let mismatches = guard.finish();
    if mismatches > 0 {
        warn!(
            "{} package(s) were re-submitted with different content",
            Colored(Yellow, mismatches)
        );
    }
    result
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let args = Args::parse();
    if let Err(err) = setup_logging(&args).and_then(|()| handle_cli(args)) {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
