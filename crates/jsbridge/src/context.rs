use anyhow::Result;
use rquickjs::{
    function::{Constructor, Rest, This},
    Array, ArrayBuffer, Ctx, Function, Object, String as JSString, Value,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::{Capabilities, CodingOptions, Config};
use crate::serde::err::{Capability, Error};
use crate::serde::{de::Decoder, ser::Encoder, CodingPath};
use crate::{from_js_error, to_js_error, JSValue};

/// A handle to a QuickJS context together with the capabilities and coding
/// options of the [`Runtime`](crate::Runtime) it belongs to.
///
/// Obtained through [`Runtime::with`](crate::Runtime::with). Cloning yields
/// another reference to the same context.
#[derive(Clone)]
pub struct JSContextRef<'js> {
    ctx: Ctx<'js>,
    capabilities: Capabilities,
    options: CodingOptions,
}

impl std::fmt::Debug for JSContextRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JSContextRef")
            .field("capabilities", &self.capabilities)
            .field("options", &self.options)
            .finish()
    }
}

impl<'js> JSContextRef<'js> {
    pub(crate) fn new(ctx: Ctx<'js>, config: &Config) -> Self {
        Self {
            ctx,
            capabilities: config.capabilities,
            options: config.options,
        }
    }

    /// The underlying QuickJS context.
    pub fn ctx(&self) -> &Ctx<'js> {
        &self.ctx
    }

    pub(crate) fn options(&self) -> CodingOptions {
        self.options
    }

    /// Whether this context can create `ArrayBuffer` values.
    pub fn supports_array_buffer(&self) -> bool {
        self.capabilities.contains(Capabilities::ARRAY_BUFFER)
    }

    /// Whether this context can create `Date` values.
    pub fn supports_date(&self) -> bool {
        self.capabilities.contains(Capabilities::DATE)
    }

    /// Evaluates `source` as a global script and returns its completion value.
    pub fn eval(&self, source: &str) -> Result<JSValue<'js>> {
        self.ctx
            .eval::<Value<'js>, _>(source)
            .map(JSValue::from)
            .map_err(|e| from_js_error(self.ctx.clone(), e))
    }

    pub fn global_object(&self) -> JSValue<'js> {
        JSValue::from(self.ctx.globals().into_value())
    }

    pub fn undefined_value(&self) -> JSValue<'js> {
        JSValue::from(Value::new_undefined(self.ctx.clone()))
    }

    pub fn null_value(&self) -> JSValue<'js> {
        JSValue::from(Value::new_null(self.ctx.clone()))
    }

    pub fn value_from_bool(&self, val: bool) -> JSValue<'js> {
        JSValue::from(Value::new_bool(self.ctx.clone(), val))
    }

    pub fn value_from_f64(&self, val: f64) -> JSValue<'js> {
        JSValue::from(Value::new_float(self.ctx.clone(), val))
    }

    pub fn value_from_i32(&self, val: i32) -> JSValue<'js> {
        JSValue::from(Value::new_int(self.ctx.clone(), val))
    }

    pub fn value_from_str(&self, val: &str) -> Result<JSValue<'js>> {
        let string = JSString::from_str(self.ctx.clone(), val)?;
        Ok(JSValue::from(string.into_value()))
    }

    /// Creates a new empty array.
    pub fn array_value(&self) -> Result<JSValue<'js>> {
        Ok(JSValue::from(Array::new(self.ctx.clone())?.into_value()))
    }

    /// Creates a new empty object.
    pub fn object_value(&self) -> Result<JSValue<'js>> {
        Ok(JSValue::from(Object::new(self.ctx.clone())?.into_value()))
    }

    /// Creates a `Date` from milliseconds since the UNIX epoch.
    pub fn date_value(&self, ms: f64) -> Result<JSValue<'js>, Error> {
        if !self.supports_date() {
            return Err(Error::CapabilityUnavailable {
                capability: Capability::Date,
                path: CodingPath::default(),
            });
        }
        self.ctx
            .globals()
            .get::<_, Constructor<'js>>("Date")
            .and_then(|date| date.construct::<_, Value<'js>>((ms,)))
            .map(JSValue::from)
            .map_err(|e| Error::engine(from_js_error(self.ctx.clone(), e), &CodingPath::default()))
    }

    /// Creates an `ArrayBuffer` holding a copy of `bytes`.
    pub fn array_buffer_value(&self, bytes: &[u8]) -> Result<JSValue<'js>, Error> {
        if !self.supports_array_buffer() {
            return Err(Error::CapabilityUnavailable {
                capability: Capability::ArrayBuffer,
                path: CodingPath::default(),
            });
        }
        ArrayBuffer::new(self.ctx.clone(), bytes.to_vec())
            .map(|buffer| JSValue::from(buffer.into_value()))
            .map_err(|e| Error::engine(from_js_error(self.ctx.clone(), e), &CodingPath::default()))
    }

    /// Wraps a Rust closure as a function value callable from JavaScript.
    ///
    /// An error returned by the closure is thrown into JavaScript as an
    /// `Error` carrying its message.
    pub fn wrap_callback<F>(&self, f: F) -> Result<JSValue<'js>>
    where
        F: Fn(&JSContextRef<'js>, &JSValue<'js>, &[JSValue<'js>]) -> Result<JSValue<'js>> + 'js,
    {
        let capabilities = self.capabilities;
        let options = self.options;
        let function = Function::new(
            self.ctx.clone(),
            move |cx: Ctx<'js>, this: This<Value<'js>>, args: Rest<Value<'js>>| {
                let context = JSContextRef {
                    ctx: cx.clone(),
                    capabilities,
                    options,
                };
                let args: Vec<JSValue<'js>> = args.0.into_iter().map(JSValue::from).collect();
                f(&context, &JSValue::from(this.0), &args)
                    .map(JSValue::into_inner)
                    .map_err(|e| to_js_error(cx, e))
            },
        )?;
        Ok(JSValue::from(function.into_value()))
    }

    /// Encodes `value` into a value of this context.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<JSValue<'js>, Error> {
        Encoder::new(self).encode(value)
    }

    /// Decodes `value` into a `T`.
    pub fn decode<T: DeserializeOwned>(&self, value: &JSValue<'js>) -> Result<T, Error> {
        Decoder::new(self, value.clone()).decode()
    }
}
