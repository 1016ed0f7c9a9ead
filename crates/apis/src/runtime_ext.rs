use anyhow::Result;
use jsbridge::{Config, Runtime};

#[cfg(feature = "timers")]
use crate::Timers;
use crate::APIConfig;

/// An extension trait for [`Runtime`] that creates it with the APIs of this
/// crate installed.
///
/// ## Example
/// ```
/// use jsbridge::Runtime;
/// use jsbridge_apis::RuntimeExt;
///
/// let runtime = Runtime::new_with_defaults()?;
/// runtime.with(|cx| {
///     assert!(cx.global_object().get_property("console")?.is_object());
///     Ok::<_, anyhow::Error>(())
/// })?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub trait RuntimeExt: Sized {
    /// A runtime with the APIs `api_config` enables.
    fn new_with_apis(config: Config, api_config: APIConfig) -> Result<Self>;

    /// A runtime with `console` and, when built in, `exports`.
    fn new_with_defaults() -> Result<Self>;

    /// A runtime with the default APIs plus timers, returning the scheduler
    /// that drives them.
    #[cfg(feature = "timers")]
    fn new_with_timers(config: Config) -> Result<(Self, Timers)>;

    /// Calls every timer callback that is due and returns how many ran.
    #[cfg(feature = "timers")]
    fn run_timers(&self, timers: &Timers) -> Result<usize>;
}

impl RuntimeExt for Runtime {
    fn new_with_apis(config: Config, api_config: APIConfig) -> Result<Runtime> {
        let runtime = Runtime::new(config)?;
        crate::add_to_runtime(&runtime, &api_config)?;
        Ok(runtime)
    }

    fn new_with_defaults() -> Result<Runtime> {
        Self::new_with_apis(Config::default(), default_apis())
    }

    #[cfg(feature = "timers")]
    fn new_with_timers(config: Config) -> Result<(Runtime, Timers)> {
        let timers = Timers::new();
        let mut api_config = default_apis();
        api_config.timers(timers.clone());
        let runtime = Self::new_with_apis(config, api_config)?;
        Ok((runtime, timers))
    }

    #[cfg(feature = "timers")]
    fn run_timers(&self, timers: &Timers) -> Result<usize> {
        let ran = self.with(|cx| timers.run_expired(&cx))?;
        tracing::trace!(ran, pending = timers.has_pending(), "ran expired timers");
        Ok(ran)
    }
}

fn default_apis() -> APIConfig {
    #[allow(unused_mut)]
    let mut api_config = APIConfig::default();
    #[cfg(feature = "exports")]
    api_config.exports(false);
    api_config
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use jsbridge::{Config, Runtime};

    use super::RuntimeExt;
    use crate::APIConfig;

    #[test]
    fn test_defaults_install_console_and_exports() -> Result<()> {
        let runtime = Runtime::new_with_defaults()?;
        runtime.with(|cx| {
            let global = cx.global_object();
            assert!(global.get_property("console")?.is_object());
            assert!(global.get_property("exports")?.is_object());
            assert!(global.get_property("require")?.is_undefined());
            assert!(global.get_property("setTimeout")?.is_undefined());
            Ok(())
        })
    }

    #[test]
    fn test_apis_follow_config() -> Result<()> {
        let runtime = Runtime::new_with_apis(Config::default(), APIConfig::default())?;
        runtime.with(|cx| {
            let global = cx.global_object();
            assert!(global.get_property("console")?.is_object());
            assert!(global.get_property("exports")?.is_undefined());
            Ok::<_, anyhow::Error>(())
        })?;

        let mut api_config = APIConfig::default();
        api_config.exports(true);
        let runtime = Runtime::new_with_apis(Config::default(), api_config)?;
        runtime.with(|cx| {
            assert!(cx.eval("require('path')")?.is_null());
            Ok(())
        })
    }

    #[test]
    fn test_timers_run_through_runtime() -> Result<()> {
        let (runtime, timers) = Runtime::new_with_timers(Config::default())?;
        runtime.with(|cx| {
            cx.eval("var fired = []; setTimeout((v) => fired.push(v), 0, 'a'); setImmediate(() => fired.push('b'));")
                .map(drop)
        })?;
        assert!(timers.has_pending());

        assert_eq!(2, runtime.run_timers(&timers)?);
        assert!(!timers.has_pending());
        assert_eq!(0, runtime.run_timers(&timers)?);

        let fired = runtime.with(|cx| cx.eval("fired.join(',')")?.as_str())?;
        assert_eq!("a,b", fired);
        Ok(())
    }
}
