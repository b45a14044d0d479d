//! The logging pipeline handed to the rest of the service.
//!
//! A [`Logger`] is built once at startup and shared as `Arc<Logger>`. Its
//! public methods never fail and never panic: internal faults are counted
//! and reported on the fallback channel.

use crate::adapter::{ConsoleSink, FileSink};
use crate::config::Settings;
use crate::domain::{Failure, LogLevel, Metadata};
use crate::error::LoggerError;
use crate::normalize::normalize;
use crate::render::{RendererKind, Renderers};
use crate::router::{Destination, FALLBACK_TARGET, Feed, SinkRouter, isolate, panic_message};
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

/// Tag written into every persisted record.
pub const DEFAULT_SERVICE: &str = "athletiqly";

pub const EXCEPTION_MESSAGE: &str = "uncaughtException";
pub const REJECTION_MESSAGE: &str = "unhandledRejection";

pub struct Logger {
    level: LogLevel,
    router: SinkRouter,
    faults: AtomicU64,
}

pub struct LoggerBuilder {
    level: LogLevel,
    service: String,
    colorize: bool,
    destinations: Vec<Destination>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            service: DEFAULT_SERVICE.to_string(),
            colorize: false,
            destinations: Vec::new(),
        }
    }
}

impl LoggerBuilder {
    /// Calls below this level are discarded before normalization.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// ANSI colors in human-rendered destinations.
    pub fn colorize(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    pub fn destination(mut self, destination: Destination) -> Self {
        self.destinations.push(destination);
        self
    }

    pub fn build(self) -> Logger {
        Logger {
            level: self.level,
            router: SinkRouter::new(
                Renderers::new(self.service, self.colorize),
                self.destinations,
            ),
            faults: AtomicU64::new(0),
        }
    }
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// The standard destination set: `error`, `combined`, `exceptions`,
    /// `rejections`, plus `console` outside production.
    pub fn from_settings(settings: &Settings) -> Result<Self, LoggerError> {
        settings.validate()?;
        let mut builder = Logger::builder()
            .level(settings.log_level)
            .destination(
                Destination::new("error", Arc::new(FileSink::open(&settings.error_file)?))
                    .min_level(LogLevel::Error),
            )
            .destination(
                Destination::new("combined", Arc::new(FileSink::open(&settings.combined_file)?))
                    .min_level(settings.log_level),
            )
            .destination(
                Destination::new(
                    "exceptions",
                    Arc::new(FileSink::open_synced(&settings.exceptions_file)?),
                )
                .feed(Feed::Exceptions),
            )
            .destination(
                Destination::new(
                    "rejections",
                    Arc::new(FileSink::open_synced(&settings.rejections_file)?),
                )
                .feed(Feed::Rejections),
            );

        if settings.environment.attaches_console() {
            builder = builder
                .colorize(io::stdout().is_terminal())
                .destination(
                    Destination::new("console", Arc::new(ConsoleSink::stdout()))
                        .min_level(settings.log_level)
                        .renderer(RendererKind::Human),
                );
        }

        Ok(builder.build())
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level.passes(self.level)
    }

    pub fn router(&self) -> &SinkRouter {
        &self.router
    }

    /// Normalizes, classifies, renders and delivers one call.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, metadata: Metadata) {
        if !self.enabled(level) {
            return;
        }
        let message = message.into();
        self.dispatch(Feed::Ordinary, || normalize(level, message, metadata));
    }

    pub fn error(&self, message: impl Into<String>, metadata: Metadata) {
        self.log(LogLevel::Error, message, metadata);
    }

    pub fn warn(&self, message: impl Into<String>, metadata: Metadata) {
        self.log(LogLevel::Warn, message, metadata);
    }

    pub fn info(&self, message: impl Into<String>, metadata: Metadata) {
        self.log(LogLevel::Info, message, metadata);
    }

    pub fn http(&self, message: impl Into<String>, metadata: Metadata) {
        self.log(LogLevel::Http, message, metadata);
    }

    pub fn debug(&self, message: impl Into<String>, metadata: Metadata) {
        self.log(LogLevel::Debug, message, metadata);
    }

    /// Records a panic on the `exceptions` feed and flushes it before returning.
    pub fn report_exception(&self, failure: Failure) {
        self.report_crash(Feed::Exceptions, EXCEPTION_MESSAGE, failure);
    }

    /// Records a failed background task on the `rejections` feed and
    /// flushes it before returning.
    pub fn report_rejection(&self, failure: Failure) {
        self.report_crash(Feed::Rejections, REJECTION_MESSAGE, failure);
    }

    fn report_crash(&self, feed: Feed, message: &str, failure: Failure) {
        let metadata = Metadata::new().error(failure);
        self.dispatch(feed, || normalize(LogLevel::Error, message, metadata));
    }

    fn dispatch(&self, feed: Feed, event: impl FnOnce() -> crate::domain::LogEvent) {
        let outcome = isolate(|| {
            let event = event();
            match feed {
                Feed::Ordinary => self.router.route(feed, &event),
                Feed::Exceptions | Feed::Rejections => self.router.route_and_flush(feed, &event),
            }
        });
        if let Err(panic) = outcome {
            self.faults.fetch_add(1, Ordering::Relaxed);
            error!(
                target: FALLBACK_TARGET,
                error = %panic_message(panic.as_ref()),
                "internal fault while logging"
            );
        }
    }

    /// Panics caught inside the pipeline itself.
    pub fn internal_faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Delivery failures summed over all destinations.
    pub fn delivery_failures(&self) -> u64 {
        self.router.destinations().iter().map(Destination::failures).sum()
    }

    pub fn flush(&self) {
        self.router.flush();
    }

    /// Adapter for access-log middleware.
    pub fn stream(self: &Arc<Self>) -> AccessLogStream {
        AccessLogStream {
            logger: Arc::clone(self),
            pending: Vec::new(),
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.router.flush();
    }
}

/// Forwards access-log lines at `http` level.
///
/// As an `io::Write`, bytes are held until a `\n` completes the line; a
/// trailing partial line is forwarded on `flush` or drop.
pub struct AccessLogStream {
    logger: Arc<Logger>,
    pending: Vec<u8>,
}

impl AccessLogStream {
    pub fn write(&self, line: &str) {
        let line = line.trim();
        if !line.is_empty() {
            self.logger.http(line, Metadata::new());
        }
    }

    fn forward_pending(&mut self) {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            AccessLogStream::write(self, &String::from_utf8_lossy(&rest));
        }
    }
}

impl Clone for AccessLogStream {
    /// The clone starts with no partial line of its own.
    fn clone(&self) -> Self {
        self.logger.stream()
    }
}

impl io::Write for AccessLogStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            AccessLogStream::write(self, &String::from_utf8_lossy(&line));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.forward_pending();
        self.logger.flush();
        Ok(())
    }
}

impl Drop for AccessLogStream {
    fn drop(&mut self) {
        self.forward_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemorySink;
    use crate::domain::ApplicationError;
    use std::io::Write as _;
    use tracing_test::traced_test;

    fn memory_logger(level: LogLevel) -> (Arc<Logger>, Arc<MemorySink>, Arc<MemorySink>) {
        let error = Arc::new(MemorySink::new());
        let combined = Arc::new(MemorySink::new());
        let logger = Logger::builder()
            .level(level)
            .service("test")
            .destination(Destination::new("error", error.clone()).min_level(LogLevel::Error))
            .destination(Destination::new("combined", combined.clone()).min_level(level))
            .build();
        (Arc::new(logger), error, combined)
    }

    #[test]
    fn test_logger_level_gates_before_destinations() {
        let (logger, _, combined) = memory_logger(LogLevel::Info);
        logger.debug("noise", Metadata::new());
        logger.info("signal", Metadata::new());
        assert_eq!(combined.len(), 1);
        assert_eq!(combined.records()[0]["message"], "signal");
    }

    #[test]
    fn test_error_goes_to_both_destinations() {
        let (logger, error, combined) = memory_logger(LogLevel::Info);
        logger.error("Crash", Metadata::new().error(ApplicationError::internal("boom")));
        assert_eq!(error.len(), 1);
        assert_eq!(combined.len(), 1);
        assert_eq!(error.records()[0]["service"], "test");
    }

    #[test]
    fn test_stream_trims_and_forwards_at_http_level() {
        let (logger, _, combined) = memory_logger(LogLevel::Http);
        let stream = logger.stream();
        stream.write("  GET /health 200 3ms\n");
        stream.write("   \n");
        let records = combined.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "http");
        assert_eq!(records[0]["message"], "GET /health 200 3ms");
    }

    #[test]
    fn test_stream_as_io_writer_splits_lines() {
        let (logger, _, combined) = memory_logger(LogLevel::Http);
        let mut stream = logger.stream();
        writeln!(stream, "GET /a 200").unwrap();
        stream.write_all(b"GET /b 404\nGET /c 500\n").unwrap();
        stream.flush().unwrap();
        let messages: Vec<_> = combined
            .records()
            .iter()
            .map(|r| r["message"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(messages, vec!["GET /a 200", "GET /b 404", "GET /c 500"]);
    }

    #[test]
    fn test_formatted_line_is_one_record() {
        let (logger, _, combined) = memory_logger(LogLevel::Http);
        let mut stream = logger.stream();
        writeln!(stream, "GET {} {}", "/a", 200).unwrap();
        write!(stream, "POST /b ").unwrap();
        assert_eq!(combined.len(), 1);
        write!(stream, "{}\n", 201).unwrap();

        let messages: Vec<_> = combined
            .records()
            .iter()
            .map(|r| r["message"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(messages, vec!["GET /a 200", "POST /b 201"]);
    }

    #[test]
    fn test_partial_line_forwarded_on_flush() {
        let (logger, _, combined) = memory_logger(LogLevel::Http);
        let mut stream = logger.stream();
        write!(stream, "GET /c {}", 204).unwrap();
        assert!(combined.is_empty());
        stream.flush().unwrap();
        assert_eq!(combined.records()[0]["message"], "GET /c 204");

        write!(stream, "GET /d 304").unwrap();
        drop(stream);
        assert_eq!(combined.records()[1]["message"], "GET /d 304");
    }

    #[test]
    fn test_internal_fault_is_contained_and_counted() {
        let (logger, _, combined) = memory_logger(LogLevel::Info);

        logger.dispatch(Feed::Ordinary, || panic!("normalizer bug"));
        logger.info("after", Metadata::new());

        assert_eq!(logger.internal_faults(), 1);
        assert_eq!(logger.delivery_failures(), 0);
        assert_eq!(combined.records()[0]["message"], "after");
    }

    #[traced_test]
    #[test]
    fn test_internal_fault_is_reported_on_fallback_channel() {
        let (logger, _, _) = memory_logger(LogLevel::Info);
        logger.dispatch(Feed::Ordinary, || panic!("renderer bug"));
        assert!(logs_contain("internal fault while logging"));
        assert!(logs_contain("renderer bug"));
    }

    #[test]
    fn test_http_lines_dropped_at_info_level() {
        let (logger, _, combined) = memory_logger(LogLevel::Info);
        logger.stream().write("GET / 200");
        assert!(combined.is_empty());
    }

    #[test]
    fn test_crash_reports_skip_ordinary_destinations() {
        let combined = Arc::new(MemorySink::new());
        let exceptions = Arc::new(MemorySink::new());
        let rejections = Arc::new(MemorySink::new());
        let logger = Logger::builder()
            .destination(Destination::new("combined", combined.clone()))
            .destination(Destination::new("exceptions", exceptions.clone()).feed(Feed::Exceptions))
            .destination(Destination::new("rejections", rejections.clone()).feed(Feed::Rejections))
            .build();

        logger.report_exception(Failure::new("Panic", "index out of bounds"));
        logger.report_rejection(Failure::new("TaskError", "sync job failed"));

        assert!(combined.is_empty());
        let exception = &exceptions.records()[0];
        assert_eq!(exception["message"], "uncaughtException: index out of bounds");
        assert_eq!(exception["type"], "Error");
        assert_eq!(exception["errorCategory"], "system");
        assert_eq!(exceptions.flush_count(), 1);
        assert_eq!(rejections.records()[0]["message"], "unhandledRejection: sync job failed");
        assert_eq!(rejections.flush_count(), 1);
    }

    #[test]
    fn test_log_never_propagates_sink_panics() {
        let sink = Arc::new(MemorySink::new());
        sink.set_should_panic(true);
        let logger = Logger::builder()
            .destination(Destination::new("combined", sink))
            .build();

        logger.info("still fine", Metadata::new());

        assert_eq!(logger.delivery_failures(), 1);
        assert_eq!(logger.internal_faults(), 0);
    }
}
