use anyhow::Result;
use jsbridge::{JSContextRef, JSValue};

use crate::{APIConfig, JSApiSet};

/// Provides a CommonJS `exports` object for scripts that assign to it, and
/// optionally a `require` that resolves nothing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Exports {
    pub(crate) require: bool,
}

impl JSApiSet for Exports {
    fn register<'js>(&self, context: &JSContextRef<'js>, _config: &APIConfig) -> Result<()> {
        let global = context.global_object();

        if !global.get_property("exports")?.is_object() {
            global.set_property("exports", context.object_value()?)?;
        }

        if self.require && global.get_property("require")?.is_undefined() {
            global.set_property(
                "require",
                context.wrap_callback(|cx, _this, args| {
                    let module = args
                        .first()
                        .map(JSValue::to_js_string)
                        .transpose()?
                        .unwrap_or_default();
                    tracing::debug!(module = %module, "require has no modules to resolve");
                    Ok(cx.null_value())
                })?,
            )?;
        }

        Ok(())
    }
}
