//! Process-wide uncaught-failure hooks.
//!
//! Panics that escape to the panic hook go to the `exceptions` feed.
//! Background tasks started with [`spawn_supervised`] that fail or panic go
//! to the `rejections` feed. Both feeds are flushed before the reporting
//! call returns.

use crate::domain::Failure;
use crate::logger::Logger;
use crate::router::{is_isolating, panic_message};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::future::Future;
use std::panic::PanicHookInfo;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};

tokio::task_local! {
    static SUPERVISED_TASK: String;
}

/// Routes uncaught panics to the logger, then runs the previous hook.
///
/// Panics contained by the pipeline itself and panics inside supervised
/// tasks are left to their own reporting.
pub fn install_panic_hook(logger: Arc<Logger>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let supervised = SUPERVISED_TASK.try_with(|_| ()).is_ok();
        if !is_isolating() && !supervised {
            logger.report_exception(failure_from_panic(info));
            // The hook holds the logger for the life of the process, so its
            // drop-time flush may never run.
            logger.flush();
        }
        previous(info);
    }));
}

pub fn failure_from_panic(info: &PanicHookInfo<'_>) -> Failure {
    let message = panic_message(info.payload());
    let mut stack = format!("Panic: {message}");
    if let Some(location) = info.location() {
        stack.push_str(&format!(
            "\n    at {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ));
    }
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        stack.push('\n');
        stack.push_str(&backtrace.to_string());
    }
    Failure::new("Panic", message).with_stack(stack)
}

/// Spawns `task` and reports it on the `rejections` feed if it returns an
/// error or panics. The handle yields `None` in those cases; aborting it
/// also aborts `task`.
pub fn spawn_supervised<F, T, E>(
    logger: Arc<Logger>,
    name: impl Into<String>,
    task: F,
) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + 'static,
{
    let name = name.into();
    let inner = tokio::spawn(SUPERVISED_TASK.scope(name.clone(), task));
    let guard = AbortOnDrop(inner.abort_handle());

    tokio::spawn(async move {
        let _guard = guard;
        match inner.await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                let cause = Failure::from_error(&e);
                let failure = Failure::new(cause.name(), format!("{name}: {}", cause.message()));
                let failure = match cause.stack() {
                    Some(stack) => failure.with_stack(stack),
                    None => failure,
                };
                logger.report_rejection(failure);
                None
            }
            Err(join_error) if join_error.is_panic() => {
                let message = panic_message(join_error.into_panic().as_ref());
                logger.report_rejection(Failure::new("Panic", format!("{name}: {message}")));
                None
            }
            // Cancelled through its handle; nothing failed.
            Err(_) => None,
        }
    })
}

/// Aborts the supervised task when the supervisor is dropped or aborted.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
