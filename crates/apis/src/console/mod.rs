use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use anyhow::Result;
use jsbridge::{JSContextRef, JSValue};

use crate::{APIConfig, JSApiSet};

pub(crate) use config::ConsoleConfig;
pub use config::{ConsoleLevel, LogStream};

mod config;

pub(super) struct Console {}

impl Console {
    pub(super) fn new() -> Self {
        Console {}
    }
}

impl JSApiSet for Console {
    fn register<'js>(&self, context: &JSContextRef<'js>, config: &APIConfig) -> Result<()> {
        register_console(context, |level| config.console.stream(level).open())
    }
}

/// Installs `console` with one method per level, each writing to the stream
/// `stream_for` opens for it.
fn register_console<'js, F>(context: &JSContextRef<'js>, stream_for: F) -> Result<()>
where
    F: Fn(ConsoleLevel) -> Rc<RefCell<dyn Write>>,
{
    let console = context.object_value()?;

    for level in ConsoleLevel::ALL {
        let stream = stream_for(level);
        console.set_property(
            level.method(),
            context.wrap_callback(move |cx, _this, args| {
                log(args, level, &mut *stream.borrow_mut())?;
                Ok(cx.undefined_value())
            })?,
        )?;
    }

    context.global_object().set_property("console", console)?;
    Ok(())
}

fn log<T: Write + ?Sized>(args: &[JSValue<'_>], level: ConsoleLevel, stream: &mut T) -> Result<()> {
    let line = args
        .iter()
        .map(JSValue::to_js_string)
        .collect::<Result<Vec<_>>>()?
        .join(" ");

    match level {
        ConsoleLevel::Debug => tracing::debug!(target: "console", "{line}"),
        ConsoleLevel::Log | ConsoleLevel::Info => tracing::info!(target: "console", "{line}"),
        ConsoleLevel::Warn => tracing::warn!(target: "console", "{line}"),
        ConsoleLevel::Error => tracing::error!(target: "console", "{line}"),
    }

    writeln!(stream, "{line}")?;
    Ok(())
}
