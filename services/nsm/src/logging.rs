//! Log line formatting and subscriber setup.
//!
//! Lines look like `[timestamp] [service] [level] message`. An event carrying
//! a `component` field is attributed to `nsm-<component>` instead of the
//! service name; the `component_*!` macros set that field.

use std::fmt;
use std::io::IsTerminal;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Width of the service column
const SERVICE_COLUMN: usize = 20;
/// Width of the level column
const LEVEL_COLUMN: usize = 9;

/// ANSI escapes
mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const TIMESTAMP: &str = "\x1b[36m";
    pub const ERROR: &str = "\x1b[91m";
    pub const WARN: &str = "\x1b[93m";
    pub const INFO: &str = "\x1b[32m";
    pub const VERBOSE: &str = "\x1b[90m";
}

/// Label and colour of a level
fn level_style(level: &Level) -> (&'static str, &'static str) {
    match *level {
        Level::ERROR => ("✗ ERROR", ansi::ERROR),
        Level::WARN => ("⚠ WARN", ansi::WARN),
        Level::INFO => ("ℹ INFO", ansi::INFO),
        Level::DEBUG => ("◦ DEBUG", ansi::VERBOSE),
        Level::TRACE => ("◦ TRACE", ansi::VERBOSE),
    }
}

/// Event formatter producing aligned, optionally coloured lines
pub struct NsmLogFormatter {
    service_name: String,
    color_enabled: bool,
}

/// Log at info level on behalf of a component
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Log at warn level on behalf of a component
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

/// Log at debug level on behalf of a component
#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

/// Log at error level on behalf of a component
#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

impl NsmLogFormatter {
    /// Formatter for `service_name`, coloured when stderr is a terminal
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            color_enabled: color_supported(),
        }
    }

    /// Force colours on or off
    pub fn with_color(mut self, enabled: bool) -> Self {
        self.color_enabled = enabled;
        self
    }

    /// Service column: the component when the event names one, padded or
    /// cut to a fixed width
    fn service_column(&self, component: Option<&str>) -> String {
        let name = component
            .map(|component| format!("nsm-{}", component))
            .unwrap_or_else(|| self.service_name.clone());

        let mut column: String = name.chars().take(SERVICE_COLUMN).collect();
        if name.chars().count() > SERVICE_COLUMN {
            column.pop();
            column.push('…');
        }
        format!("{:<width$}", column, width = SERVICE_COLUMN)
    }

    fn paint(&self, code: &'static str) -> &'static str {
        if self.color_enabled {
            code
        } else {
            ""
        }
    }

    fn write_line(&self, writer: &mut dyn fmt::Write, level: &Level, fields: &EventFields) -> fmt::Result {
        let (label, color) = level_style(level);
        let reset = self.paint(ansi::RESET);

        write!(
            writer,
            "{}[{}] [{}] [{}{:<lw$}{}] ",
            self.paint(ansi::TIMESTAMP),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            self.service_column(fields.component.as_deref()),
            self.paint(color),
            label,
            reset,
            lw = LEVEL_COLUMN,
        )?;
        writeln!(writer, "{}{}", fields.message, reset)
    }
}

impl<S, N> FormatEvent<S, N> for NsmLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = EventFields::default();
        event.record(&mut fields);
        self.write_line(&mut writer, event.metadata().level(), &fields)
    }
}

/// The `message` and `component` fields of an event
#[derive(Default)]
struct EventFields {
    message: String,
    component: Option<String>,
}

impl EventFields {
    fn set(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "component" => self.component = Some(value),
            _ => {}
        }
    }
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        let unquoted = rendered
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .map(str::to_string);
        self.set(field, unquoted.unwrap_or(rendered));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field, value.to_string());
    }
}

fn color_supported() -> bool {
    std::env::var("TERM").map_or(true, |term| term != "dumb") && std::io::stderr().is_terminal()
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(service_name: &str, level: &str) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };
    let formatter = NsmLogFormatter::new(service_name);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(formatter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(formatter: &NsmLogFormatter, level: Level, component: Option<&str>) -> String {
        let fields = EventFields {
            message: "connection healed".to_string(),
            component: component.map(str::to_string),
        };
        let mut out = String::new();
        formatter.write_line(&mut out, &level, &fields).unwrap();
        out
    }

    #[test]
    fn test_line_layout() {
        let formatter = NsmLogFormatter::new("nsc").with_color(false);
        let line = render(&formatter, Level::INFO, None);

        assert!(line.starts_with('['));
        assert!(line.contains(&format!("] [{:<20}] [ℹ INFO", "nsc")));
        assert!(line.ends_with("connection healed\n"));
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn test_component_renames_service() {
        let formatter = NsmLogFormatter::new("nsc").with_color(false);
        let line = render(&formatter, Level::WARN, Some("heal"));
        assert!(line.contains("[nsm-heal "));
        assert!(line.contains("⚠ WARN"));
    }

    #[test]
    fn test_long_service_name_truncated() {
        let formatter = NsmLogFormatter::new("a-very-long-service-name-indeed").with_color(false);
        let name = formatter.service_column(None);
        assert_eq!(name.chars().count(), SERVICE_COLUMN);
        assert!(name.ends_with('…'));
    }

    #[test]
    fn test_colored_line() {
        let formatter = NsmLogFormatter::new("nsc").with_color(true);
        let line = render(&formatter, Level::ERROR, None);
        assert!(line.starts_with(ansi::TIMESTAMP));
        assert!(line.contains(ansi::ERROR));
    }
}
