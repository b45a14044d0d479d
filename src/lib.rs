#![warn(rust_2018_idioms)]

pub mod adapter;
pub mod app;
pub mod classify;
pub mod config;
pub mod crash;
pub mod domain;
pub mod error;
pub mod logger;
pub mod normalize;
pub mod port;
pub mod render;
pub mod router;

pub use domain::{ApplicationError, ErrorKind, Failure, LogLevel, Metadata};
pub use error::LoggerError;
pub use logger::{AccessLogStream, Logger};
