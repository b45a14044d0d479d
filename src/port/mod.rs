use std::io;

/// An append-only output target.
///
/// Implementations own their own lock; the router never serializes access
/// across sinks.
pub trait Sink: Send + Sync {
    /// Appends one rendered event. The sink adds the line terminator.
    fn write_line(&self, line: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;
}
