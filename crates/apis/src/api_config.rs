#[cfg(feature = "console")]
use crate::console::ConsoleConfig;
#[cfg(feature = "exports")]
use crate::exports::Exports;
#[cfg(feature = "timers")]
use crate::Timers;

/// A configuration for APIs added in this crate.
///
/// Example usage:
/// ```
/// # use jsbridge_apis::{APIConfig, ConsoleLevel, LogStream};
/// let mut api_config = APIConfig::default();
/// api_config
///     .console_stream(ConsoleLevel::Log, LogStream::StdErr)
///     .exports(true);
/// ```
#[derive(Debug, Default)]
pub struct APIConfig {
    #[cfg(feature = "console")]
    pub(crate) console: ConsoleConfig,
    #[cfg(feature = "timers")]
    pub(crate) timers: Option<Timers>,
    #[cfg(feature = "exports")]
    pub(crate) exports: Option<Exports>,
}

#[cfg(feature = "timers")]
impl APIConfig {
    /// Installs `setTimeout`, `setImmediate` and `clearTimeout` backed by
    /// `timers`. Without it, no timer functions are installed.
    pub fn timers(&mut self, timers: Timers) -> &mut Self {
        self.timers = Some(timers);
        self
    }
}

#[cfg(feature = "exports")]
impl APIConfig {
    /// Installs a global `exports` object, and a `require` returning `null`
    /// when `require` is set and the global has none.
    pub fn exports(&mut self, require: bool) -> &mut Self {
        self.exports = Some(Exports { require });
        self
    }
}
