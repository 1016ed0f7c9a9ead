use bitflags::bitflags;

bitflags! {
    /// Native value kinds a context is able to create.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Capabilities: u32 {
        const ARRAY_BUFFER = 1;
        const DATE = 1 << 1;
    }
}

bitflags! {
    /// Options that change how values are decoded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct CodingOptions: u32 {
        const LOSSY_NUMBERS = 1;
    }
}

/// A configuration for [`Runtime`](crate::Runtime).
///
/// ```
/// # use jsbridge::{Config, Runtime};
/// let mut config = Config::default();
/// config.array_buffer(false).lossy_numbers(true);
/// let runtime = Runtime::new(config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) capabilities: Capabilities,
    pub(crate) options: CodingOptions,
}

impl Default for Config {
    /// Creates a [`Config`] with default values.
    fn default() -> Self {
        Self {
            capabilities: Capabilities::all(),
            options: CodingOptions::empty(),
        }
    }
}

impl Config {
    /// Whether the context supports `ArrayBuffer` values.
    ///
    /// Without it, encoding a byte blob fails with
    /// [`Error::CapabilityUnavailable`](crate::Error::CapabilityUnavailable).
    /// Enabled by default.
    pub fn array_buffer(&mut self, enabled: bool) -> &mut Self {
        self.capabilities.set(Capabilities::ARRAY_BUFFER, enabled);
        self
    }

    /// Whether the context supports `Date` values. Enabled by default.
    pub fn date(&mut self, enabled: bool) -> &mut Self {
        self.capabilities.set(Capabilities::DATE, enabled);
        self
    }

    /// Whether decoding a number into a narrower integer type truncates and
    /// saturates instead of failing.
    ///
    /// Disabled by default: a fractional, non-finite or out of range number
    /// fails with [`Error::DataCorrupted`](crate::Error::DataCorrupted).
    pub fn lossy_numbers(&mut self, enabled: bool) -> &mut Self {
        self.options.set(CodingOptions::LOSSY_NUMBERS, enabled);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, CodingOptions, Config};

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.capabilities.contains(Capabilities::ARRAY_BUFFER));
        assert!(config.capabilities.contains(Capabilities::DATE));
        assert!(!config.options.contains(CodingOptions::LOSSY_NUMBERS));
    }

    #[test]
    fn test_builder() {
        let mut config = Config::default();
        config.array_buffer(false).date(false).lossy_numbers(true);
        assert!(config.capabilities.is_empty());
        assert!(config.options.contains(CodingOptions::LOSSY_NUMBERS));
    }
}
