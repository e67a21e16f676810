use std::fmt::{self as stdfmt, Write as _};
use std::path::Path;

use anyhow::Result;
use nw_config::{LogFormat, LoggingConfig};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

// ---------------------------------------------------------------------------
// FileFields: separate span field cache for the file layer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FileFields(DefaultFields);

impl<'writer> FormatFields<'writer> for FileFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: Writer<'writer>,
        fields: R,
    ) -> stdfmt::Result {
        self.0.format_fields(writer, fields)
    }
}

// ---------------------------------------------------------------------------
// DomainFormat
// ---------------------------------------------------------------------------

/// Plain-text event format that lifts the `domain` field into a prefix:
///
/// ```text
/// 2026-10-19T08:00:00Z  INFO [win] named window created window="Orders"
/// ```
#[derive(Default)]
struct DomainFormat {
    timer: SystemTime,
}

fn paint(writer: &mut Writer<'_>, code: &str, text: impl stdfmt::Display) -> stdfmt::Result {
    if writer.has_ansi_escapes() {
        write!(writer, "\x1b[{code}m{text}\x1b[0m")
    } else {
        write!(writer, "{text}")
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "31",
        Level::WARN => "33",
        Level::INFO => "32",
        Level::DEBUG => "34",
        Level::TRACE => "35",
    }
}

impl<S, N> FormatEvent<S, N> for DomainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let mut ts = String::new();
        if self.timer.format_time(&mut Writer::new(&mut ts)).is_err() {
            ts.push_str("<unknown time>");
        }
        paint(&mut writer, "2", ts)?;

        let level = *event.metadata().level();
        write!(writer, " ")?;
        paint(&mut writer, level_color(level), format_args!("{level:>5}"))?;
        write!(writer, " ")?;

        let mut fields = FieldSplitter::default();
        event.record(&mut fields);

        if let Some(domain) = &fields.domain {
            paint(&mut writer, "1;36", format_args!("[{domain}]"))?;
            write!(writer, " ")?;
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                paint(&mut writer, "1", span.name())?;
                write!(writer, ": ")?;
            }
        }

        write!(writer, "{}", fields.message)?;
        if !fields.rest.is_empty() {
            write!(writer, " ")?;
            paint(&mut writer, "3", &fields.rest)?;
        }
        writeln!(writer)
    }
}

/// Separates `domain` and `message` from the remaining event fields.
#[derive(Default)]
struct FieldSplitter {
    domain: Option<String>,
    message: String,
    rest: String,
}

impl FieldSplitter {
    fn push(&mut self, name: &str, value: impl stdfmt::Display) {
        if !self.rest.is_empty() {
            self.rest.push(' ');
        }
        let _ = write!(self.rest, "{name}={value}");
    }
}

impl Visit for FieldSplitter {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.push(name, format_args!("{value:?}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => {
                self.domain = Some(format!("{value:?}").trim_matches('"').to_string());
            }
            "message" => {
                let _ = write!(self.message, "{value:?}");
            }
            name => self.push(name, format_args!("{value:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Filter directives derived from config: global level, then per-module
/// overrides in module order.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.level.clone();
    for (module, level) in &config.modules {
        let _ = write!(directives, ",{module}={level}");
    }
    directives
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::from_default_env());
    }
    let directives = filter_directives(config);
    EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::default())
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .fmt_fields(FileFields::default())
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::default())
            .fmt_fields(FileFields::default())
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global `tracing` subscriber described by `config`.
///
/// The returned [`WorkerGuard`] (present when a log file is configured) must
/// be held until exit; dropping it flushes the file writer. `RUST_LOG`
/// overrides the configured directives. `log` records from `nw-core` reach
/// the same subscriber through tracing-subscriber's `tracing-log` bridge.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(config.format)];
    let mut guard = None;

    if let Some(resolved) = config.resolve_file(base_dir) {
        let dir = resolved
            .parent()
            .ok_or_else(|| anyhow::anyhow!("log file path has no parent directory"))?;
        let file_name = resolved
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("log file path has no file name"))?;
        std::fs::create_dir_all(dir)?;

        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        layers.push(file_layer(config.format, writer));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing subscriber already installed: {e}"))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_without_modules() {
        let config = LoggingConfig::default();
        assert_eq!(filter_directives(&config), "info");
    }

    #[test]
    fn directives_sorted_module_overrides() {
        let mut config = LoggingConfig::default();
        config.level = "warn".into();
        config.modules.insert("nw_runtime".into(), "info".into());
        config.modules.insert("nw_core::named".into(), "debug".into());
        assert_eq!(
            filter_directives(&config),
            "warn,nw_core::named=debug,nw_runtime=info"
        );
    }
}
