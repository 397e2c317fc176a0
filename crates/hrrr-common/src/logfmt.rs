//! Process-wide log formatting.
//!
//! Every service in this workspace logs one line per event in a fixed shape:
//!
//! ```text
//! 2024-02-27T18:02:59.864Z interp-demo main INFO:interp_demo:Interp to dataframe took 17.05 seconds
//! ```
//!
//! i.e. an ISO 8601 UTC timestamp with millisecond precision, the process
//! name, the thread name, then `LEVEL:target:message`.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

static PROCESS_NAME: OnceLock<String> = OnceLock::new();

/// Install the process-wide subscriber with the fixed line format.
///
/// `level` is the default verbosity; `RUST_LOG` directives still take
/// precedence. Returns an error if a global subscriber is already set.
pub fn init(level: Level) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(LineFormat::new())
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

/// Parse a log level name, falling back to `info`.
pub fn parse_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// The fixed demo line format.
#[derive(Debug, Default)]
pub struct LineFormat {
    _private: (),
}

impl LineFormat {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        write!(
            writer,
            "{} {} {} {}:{}:",
            format_timestamp(Utc::now()),
            process_name(),
            thread_name(),
            metadata.level(),
            metadata.target(),
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// UTC timestamp with millisecond precision and a literal trailing `Z`.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn process_name() -> &'static str {
    PROCESS_NAME
        .get_or_init(|| {
            std::env::args()
                .next()
                .as_deref()
                .map(std::path::Path::new)
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "main".to_string())
        })
        .as_str()
}

fn thread_name() -> String {
    std::thread::current()
        .name()
        .unwrap_or("unnamed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_timestamp_shape() {
        let dt = Utc.with_ymd_and_hms(2024, 2, 27, 18, 2, 59).unwrap()
            + chrono::Duration::milliseconds(864);
        assert_eq!(format_timestamp(dt), "2024-02-27T18:02:59.864Z");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }

    #[test]
    fn test_line_format_shape() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .event_format(LineFormat::new())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "grib_demo", "hello");
        });

        let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let line = out.lines().next().expect("one log line");

        assert!(line.contains(" INFO:grib_demo:hello"), "line: {line}");

        let timestamp = line.split(' ').next().unwrap();
        assert!(timestamp.ends_with('Z'));
        assert_eq!(timestamp.len(), "2024-02-27T18:02:59.864Z".len());
    }
}
