use anyhow::Result;
use rquickjs::{Context, Runtime as QRuntime};

use crate::{Config, JSContextRef};

/// A JavaScript Runtime
///
/// Owns a QuickJS runtime and a single context. [`Self::with()`] enters the
/// context and hands out a [`JSContextRef`] carrying this runtime's
/// [`Config`]; [`Self::context()`] exposes the raw QuickJS context.
///
/// ## Examples
///
/// ```
/// # use jsbridge::{Config, Runtime};
/// let runtime = Runtime::new(Config::default()).unwrap();
/// runtime.with(|cx| {
///     let value = cx.encode(&vec![1, 2, 3]).unwrap();
///     assert!(value.is_array());
///     assert_eq!(6.0, cx.eval("[1, 2, 3].reduce((a, b) => a + b)").unwrap().as_f64().unwrap());
/// });
/// ```
pub struct Runtime {
    context: Context,
    inner: QRuntime,
    config: Config,
}

impl Default for Runtime {
    /// Returns a [`Runtime`] with a default configuration. Panics if there's
    /// an error.
    fn default() -> Self {
        Self::new(Config::default()).unwrap()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Creates a new [`Runtime`]
    pub fn new(config: Config) -> Result<Self> {
        tracing::debug!(?config, "creating runtime");
        let inner = QRuntime::new()?;
        let context = Context::full(&inner)?;
        Ok(Self {
            context,
            inner,
            config,
        })
    }

    /// A reference to the QuickJS [`Context`].
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// A reference to the inner QuickJS runtime.
    pub fn inner(&self) -> &QRuntime {
        &self.inner
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Enters the context and runs `f` with a [`JSContextRef`] to it.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: for<'js> FnOnce(JSContextRef<'js>) -> R,
    {
        self.context
            .with(|ctx| f(JSContextRef::new(ctx, &self.config)))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::Runtime;
    use crate::Config;

    #[test]
    fn test_state_persists_between_entries() -> Result<()> {
        let runtime = Runtime::default();
        runtime.with(|cx| cx.eval("var counter = 1;").map(drop))?;
        runtime.with(|cx| cx.eval("counter += 1;").map(drop))?;
        let counter = runtime.with(|cx| cx.eval("counter").map(|v| v.as_f64()))?;
        assert_eq!(Some(2.0), counter);
        Ok(())
    }

    #[test]
    fn test_context_carries_config() {
        let mut config = Config::default();
        config.date(false);
        let runtime = Runtime::new(config).unwrap();
        runtime.with(|cx| {
            assert!(!cx.supports_date());
            assert!(cx.supports_array_buffer());
        });
    }
}
