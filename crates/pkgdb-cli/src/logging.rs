use std::io::{self, Stderr, Stdout, Write};

use nu_ansi_term::Color::{Blue, Magenta, Red, Yellow};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields, MakeWriter,
    },
    registry::LookupSpan,
};

use crate::{cli::Args, error::CliError, utils::Colored};

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

/// Prints the bare message, prefixed with the level unless it is `INFO`.
pub struct CustomFormatter;

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        match *event.metadata().level() {
            Level::TRACE => write!(writer, "{} ", Colored(Magenta, "[TRACE]")),
            Level::DEBUG => write!(writer, "{} ", Colored(Blue, "[DEBUG]")),
            Level::INFO => Ok(()),
            Level::WARN => write!(writer, "{} ", Colored(Yellow, "[WARN]")),
            Level::ERROR => write!(writer, "{} ", Colored(Red, "[ERROR]")),
        }?;

        match visitor.message {
            Some(message) => writeln!(writer, "{message}"),
            None => writeln!(writer),
        }
    }
}

/// Command output goes to stdout, diagnostics to stderr.
pub enum OutputWriter {
    Stdout(Stdout),
    Stderr(Stderr),
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputWriter::Stdout(out) => out.write(buf),
            OutputWriter::Stderr(err) => err.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputWriter::Stdout(out) => out.flush(),
            OutputWriter::Stderr(err) => err.flush(),
        }
    }
}

struct WriterBuilder;

impl<'a> MakeWriter<'a> for WriterBuilder {
    type Writer = OutputWriter;

    fn make_writer(&'a self) -> Self::Writer {
        OutputWriter::Stdout(io::stdout())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        if meta.level() == &Level::INFO {
            OutputWriter::Stdout(io::stdout())
        } else {
            OutputWriter::Stderr(io::stderr())
        }
    }
}

pub fn filter_level(args: &Args) -> Level {
    if args.quiet {
        Level::ERROR
    } else if args.verbose >= 2 {
        Level::TRACE
    } else if args.verbose == 1 {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

pub fn setup_logging(args: &Args) -> Result<(), CliError> {
    let level = filter_level(args);
    let builder = fmt::Subscriber::builder()
        .with_env_filter(format!("pkgdb={level}"))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(WriterBuilder)
        .compact()
        .without_time();

    let subscriber: Box<dyn Subscriber + Send + Sync> = if args.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(builder.event_format(CustomFormatter).finish())
    };

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| CliError::Custom(format!("failed to set tracing subscriber: {err}")))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_filter_level() {
        let parse = |argv: &[&str]| Args::parse_from(argv);
        assert_eq!(filter_level(&parse(&["pkgdb", "feeds"])), Level::INFO);
        assert_eq!(filter_level(&parse(&["pkgdb", "-v", "feeds"])), Level::DEBUG);
        assert_eq!(filter_level(&parse(&["pkgdb", "-vv", "feeds"])), Level::TRACE);
        assert_eq!(filter_level(&parse(&["pkgdb", "-q", "-v", "feeds"])), Level::ERROR);
    }
}
