use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::APIConfig;

/// A destination for the output of a `console` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    /// The standard output stream.
    StdOut,
    /// The standard error stream.
    StdErr,
    /// Drops the output. The line is still emitted as a `tracing` event.
    Discard,
}

impl LogStream {
    pub(super) fn open(self) -> Rc<RefCell<dyn Write>> {
        match self {
            Self::StdOut => Rc::new(RefCell::new(io::stdout())),
            Self::StdErr => Rc::new(RefCell::new(io::stderr())),
            Self::Discard => Rc::new(RefCell::new(io::sink())),
        }
    }
}

/// The `console` methods, from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Debug,
    Log,
    Info,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub(super) const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Debug,
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
    ];

    /// The name of the `console` method.
    pub fn method(self) -> &'static str {
        match self {
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        }
    }
}

/// Where each `console` method writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConsoleConfig {
    streams: [LogStream; 5],
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            streams: ConsoleLevel::ALL.map(|level| match level {
                ConsoleLevel::Warn | ConsoleLevel::Error => LogStream::StdErr,
                _ => LogStream::StdOut,
            }),
        }
    }
}

impl ConsoleConfig {
    pub(super) fn stream(&self, level: ConsoleLevel) -> LogStream {
        self.streams[level as usize]
    }

    fn route(&mut self, level: ConsoleLevel, stream: LogStream) {
        self.streams[level as usize] = stream;
    }
}

impl APIConfig {
    /// Sets the destination of a single `console` method.
    ///
    /// ```
    /// # use jsbridge_apis::{APIConfig, ConsoleLevel, LogStream};
    /// let mut api_config = APIConfig::default();
    /// api_config
    ///     .console_stream(ConsoleLevel::Debug, LogStream::Discard)
    ///     .console_stream(ConsoleLevel::Info, LogStream::StdErr);
    /// ```
    pub fn console_stream(&mut self, level: ConsoleLevel, stream: LogStream) -> &mut Self {
        self.console.route(level, stream);
        self
    }

    /// Sets the destination of `console.debug`, `console.log` and
    /// `console.info`. Standard output by default.
    pub fn log_stream(&mut self, stream: LogStream) -> &mut Self {
        for level in [ConsoleLevel::Debug, ConsoleLevel::Log, ConsoleLevel::Info] {
            self.console.route(level, stream);
        }
        self
    }

    /// Sets the destination of `console.warn` and `console.error`. Standard
    /// error by default.
    pub fn error_stream(&mut self, stream: LogStream) -> &mut Self {
        for level in [ConsoleLevel::Warn, ConsoleLevel::Error] {
            self.console.route(level, stream);
        }
        self
    }
}
