//! Fan-out of one event to every matching destination.
//!
//! Each destination is its own failure domain: a render error, an I/O error
//! or a panic while writing to one destination is counted on that
//! destination, reported on the fallback channel, and never reaches the
//! other destinations or the caller.

use crate::domain::{LogEvent, LogLevel};
use crate::port::Sink;
use crate::render::{RenderCache, RendererKind, Renderers};
use std::any::Any;
use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

pub const FALLBACK_TARGET: &str = "athletiqly_log::fallback";

/// Which stream of events a destination consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// Ordinary `log` calls.
    Ordinary,
    /// Panics caught by the process-wide hook.
    Exceptions,
    /// Failed background tasks.
    Rejections,
}

pub struct Destination {
    name: String,
    minimum_level: LogLevel,
    renderer: RendererKind,
    feed: Feed,
    sink: Arc<dyn Sink>,
    failures: AtomicU64,
}

impl Destination {
    /// Accepts every level of ordinary events, rendered as JSON.
    pub fn new(name: impl Into<String>, sink: Arc<dyn Sink>) -> Self {
        Self {
            name: name.into(),
            minimum_level: LogLevel::Debug,
            renderer: RendererKind::Json,
            feed: Feed::Ordinary,
            sink,
            failures: AtomicU64::new(0),
        }
    }

    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.minimum_level = level;
        self
    }

    pub fn renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn feed(mut self, feed: Feed) -> Self {
        self.feed = feed;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn minimum_level(&self) -> LogLevel {
        self.minimum_level
    }

    pub fn renderer_kind(&self) -> RendererKind {
        self.renderer
    }

    pub fn feed_kind(&self) -> Feed {
        self.feed
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn accepts(&self, feed: Feed, level: LogLevel) -> bool {
        self.feed == feed && level.passes(self.minimum_level)
    }

    fn record_failure(&self, reason: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            target: FALLBACK_TARGET,
            destination = %self.name,
            error = %reason,
            "log delivery failed"
        );
    }

    fn deliver(&self, cache: &mut RenderCache<'_>) -> bool {
        let line = match cache.line(self.renderer) {
            Ok(line) => line,
            Err(reason) => {
                self.record_failure(reason);
                return false;
            }
        };
        match isolate(|| self.sink.write_line(line)) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.record_failure(&e.to_string());
                false
            }
            Err(panic) => {
                self.record_failure(&panic_message(panic.as_ref()));
                false
            }
        }
    }

    fn flush(&self) {
        match isolate(|| self.sink.flush()) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.record_failure(&format!("flush: {e}")),
            Err(panic) => self.record_failure(&format!("flush: {}", panic_message(panic.as_ref()))),
        }
    }
}

/// Outcome of routing one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

/// Flushes every destination it holds when dropped, on every exit path.
pub struct FlushGuard<'a> {
    destinations: Vec<&'a Destination>,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        for destination in &self.destinations {
            destination.flush();
        }
    }
}

/// Fixed set of destinations, built once at startup.
pub struct SinkRouter {
    renderers: Renderers,
    destinations: Vec<Destination>,
}

impl SinkRouter {
    pub fn new(renderers: Renderers, destinations: Vec<Destination>) -> Self {
        Self {
            renderers,
            destinations,
        }
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn destination(&self, name: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.name == name)
    }

    pub fn renderers(&self) -> &Renderers {
        &self.renderers
    }

    pub fn route(&self, feed: Feed, event: &LogEvent) -> Delivery {
        let mut cache = RenderCache::new(&self.renderers, event);
        let mut delivery = Delivery::default();
        for destination in self.matching(feed, event.level) {
            if destination.deliver(&mut cache) {
                delivery.delivered += 1;
            } else {
                delivery.failed += 1;
            }
        }
        delivery
    }

    /// Routes an event and flushes the destinations it touched before
    /// returning, even if delivery unwinds.
    pub fn route_and_flush(&self, feed: Feed, event: &LogEvent) -> Delivery {
        let _guard = FlushGuard {
            destinations: self.matching(feed, event.level).collect(),
        };
        self.route(feed, event)
    }

    pub fn flush(&self) {
        for destination in &self.destinations {
            destination.flush();
        }
    }

    fn matching(&self, feed: Feed, level: LogLevel) -> impl Iterator<Item = &Destination> {
        self.destinations
            .iter()
            .filter(move |destination| destination.accepts(feed, level))
    }
}

thread_local! {
    static ISOLATING: Cell<u32> = const { Cell::new(0) };
}

/// Runs `f`, catching any panic. While it runs, [`is_isolating`] is true on
/// this thread so the process-wide panic hook can tell contained panics
/// from uncaught ones.
pub fn isolate<R>(f: impl FnOnce() -> R) -> std::thread::Result<R> {
    ISOLATING.with(|depth| depth.set(depth.get() + 1));
    let result = catch_unwind(AssertUnwindSafe(f));
    ISOLATING.with(|depth| depth.set(depth.get() - 1));
    result
}

pub fn is_isolating() -> bool {
    ISOLATING.with(|depth| depth.get() > 0)
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemorySink;
    use crate::domain::{ApplicationError, Metadata};
    use crate::normalize::normalize;
    use tracing_test::traced_test;

    fn router_with(sinks: &[(&str, LogLevel, Arc<MemorySink>)]) -> SinkRouter {
        let destinations = sinks
            .iter()
            .map(|(name, level, sink)| Destination::new(*name, sink.clone()).min_level(*level))
            .collect();
        SinkRouter::new(Renderers::new("test", false), destinations)
    }

    #[test]
    fn test_level_filter_per_destination() {
        let error = Arc::new(MemorySink::new());
        let combined = Arc::new(MemorySink::new());
        let router = router_with(&[
            ("error", LogLevel::Error, error.clone()),
            ("combined", LogLevel::Debug, combined.clone()),
        ]);

        let event = normalize(LogLevel::Warn, "slow", Metadata::new());
        let delivery = router.route(Feed::Ordinary, &event);

        assert_eq!(delivery, Delivery { delivered: 1, failed: 0 });
        assert!(error.is_empty());
        assert_eq!(combined.len(), 1);
    }

    #[test]
    fn test_failed_destination_does_not_block_others() {
        let error = Arc::new(MemorySink::new());
        let combined = Arc::new(MemorySink::new());
        error.set_should_fail(true);
        let router = router_with(&[
            ("error", LogLevel::Error, error.clone()),
            ("combined", LogLevel::Debug, combined.clone()),
        ]);

        let meta = Metadata::new().error(ApplicationError::internal("boom"));
        let delivery = router.route(Feed::Ordinary, &normalize(LogLevel::Error, "Crash", meta));

        assert_eq!(delivery, Delivery { delivered: 1, failed: 1 });
        assert_eq!(combined.len(), 1);
        assert_eq!(router.destination("error").unwrap().failures(), 1);
        assert_eq!(router.destination("combined").unwrap().failures(), 0);
    }

    #[test]
    fn test_panicking_destination_is_contained() {
        let bad = Arc::new(MemorySink::new());
        let good = Arc::new(MemorySink::new());
        bad.set_should_panic(true);
        let router = router_with(&[
            ("bad", LogLevel::Debug, bad.clone()),
            ("good", LogLevel::Debug, good.clone()),
        ]);

        let event = normalize(LogLevel::Info, "hello", Metadata::new());
        let delivery = router.route(Feed::Ordinary, &event);

        assert_eq!(delivery.failed, 1);
        assert_eq!(good.len(), 1);
        assert!(!is_isolating());
    }

    #[test]
    fn test_feeds_are_separate() {
        let combined = Arc::new(MemorySink::new());
        let exceptions = Arc::new(MemorySink::new());
        let router = SinkRouter::new(
            Renderers::new("test", false),
            vec![
                Destination::new("combined", combined.clone()),
                Destination::new("exceptions", exceptions.clone()).feed(Feed::Exceptions),
            ],
        );
        let event = normalize(LogLevel::Error, "x", Metadata::new());

        router.route(Feed::Ordinary, &event);
        assert_eq!((combined.len(), exceptions.len()), (1, 0));

        router.route_and_flush(Feed::Exceptions, &event);
        assert_eq!((combined.len(), exceptions.len()), (1, 1));
        assert_eq!(exceptions.flush_count(), 1);
        assert_eq!(combined.flush_count(), 0);
    }

    #[test]
    fn test_human_and_json_destinations_share_one_event() {
        let json = Arc::new(MemorySink::new());
        let human = Arc::new(MemorySink::new());
        let router = SinkRouter::new(
            Renderers::new("svc", false),
            vec![
                Destination::new("combined", json.clone()),
                Destination::new("console", human.clone()).renderer(RendererKind::Human),
            ],
        );

        router.route(Feed::Ordinary, &normalize(LogLevel::Info, "ready", Metadata::new()));

        assert_eq!(json.records()[0]["message"], "ready");
        assert!(human.lines()[0].ends_with("[info]: ready"));
    }

    #[traced_test]
    #[test]
    fn test_delivery_failure_is_reported_on_fallback_channel() {
        let sink = Arc::new(MemorySink::new());
        sink.set_should_fail(true);
        let router = router_with(&[("error", LogLevel::Error, sink)]);

        router.route(Feed::Ordinary, &normalize(LogLevel::Error, "x", Metadata::new()));

        assert!(logs_contain("log delivery failed"));
        assert!(logs_contain("memory sink configured to fail"));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
