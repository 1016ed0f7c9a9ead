//! JS APIs for the jsbridge runtime.
//!
//! Example usage:
//! ```
//! use jsbridge::{Config, Runtime};
//! use jsbridge_apis::{APIConfig, RuntimeExt, Timers};
//!
//! let timers = Timers::new();
//! let mut api_config = APIConfig::default();
//! api_config.timers(timers.clone());
//! let runtime = Runtime::new_with_apis(Config::default(), api_config)?;
//!
//! runtime.with(|cx| {
//!     let global = cx.global_object();
//!     assert!(global.get_property("console")?.is_object());
//!     assert!(global.get_property("setTimeout")?.is_function());
//!     Ok::<_, anyhow::Error>(())
//! })?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use jsbridge::{JSContextRef, Runtime};

pub use api_config::APIConfig;
#[cfg(feature = "console")]
pub use console::{ConsoleLevel, LogStream};
pub use runtime_ext::RuntimeExt;
#[cfg(feature = "timers")]
pub use timers::Timers;

mod api_config;
#[cfg(feature = "console")]
mod console;
#[cfg(feature = "exports")]
mod exports;
mod runtime_ext;
#[cfg(feature = "timers")]
mod timers;

pub(crate) trait JSApiSet {
    fn register<'js>(&self, context: &JSContextRef<'js>, config: &APIConfig) -> Result<()>;
}

/// Adds the enabled JS APIs to the global object of a [`Runtime`].
pub fn add_to_runtime(runtime: &Runtime, config: &APIConfig) -> Result<()> {
    runtime.with(|context| {
        #[cfg(feature = "console")]
        console::Console::new().register(&context, config)?;

        #[cfg(feature = "timers")]
        if let Some(timers) = &config.timers {
            timers.register(&context, config)?;
        }

        #[cfg(feature = "exports")]
        if let Some(exports) = &config.exports {
            exports.register(&context, config)?;
        }

        Ok(())
    })
}
