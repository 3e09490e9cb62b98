use console::style;
use env_logger::fmt::Formatter;
use env_logger::{Builder, Target};
use log::{Level, LevelFilter, Record};
use std::io::{self, Write};

fn level_tag(level: Level) -> String {
    let tag = match level {
        Level::Error => style("ERROR").red().bold(),
        Level::Warn => style("WARN ").yellow().bold(),
        Level::Info => style("INFO ").green(),
        Level::Debug => style("DEBUG").cyan(),
        Level::Trace => style("TRACE").dim(),
    };
    tag.to_string()
}

fn write_record(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    writeln!(
        buf,
        "{} {} {}",
        level_tag(record.level()),
        style(record.target()).dim(),
        record.args()
    )
}

/// Logger writing to stderr, so log lines never mix with replies on stdout.
///
/// `directives` (the `RUST_LOG` syntax) win when present; otherwise
/// `verbose` picks between debug and warn.
fn builder(verbose: bool, directives: Option<&str>) -> Builder {
    let mut builder = Builder::new();
    builder.format(write_record).target(Target::Stderr);

    match directives {
        Some(directives) => {
            builder.parse_filters(directives);
        }
        None if verbose => {
            builder.filter_level(LevelFilter::Debug);
        }
        None => {
            builder.filter_level(LevelFilter::Warn);
        }
    }
    builder
}

pub fn init_logger(verbose: bool) {
    let directives = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty());
    builder(verbose, directives.as_deref()).init();
}
