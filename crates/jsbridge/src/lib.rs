//! Encodes Rust values into JavaScript values and decodes them back.
//!
//! A [`Runtime`] owns a QuickJS context. [`Runtime::with`] enters it with a
//! [`JSContextRef`], which creates [`JSValue`]s. The [`Encoder`] and
//! [`Decoder`] convert between those values and any type implementing serde's
//! traits or this crate's [`Encode`] and [`Decode`].
//!
//! ```
//! use jsbridge::{Runtime, Timestamp};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Entry {
//!     title: String,
//!     created: Timestamp,
//!     tags: Vec<String>,
//! }
//!
//! let runtime = Runtime::default();
//! let entry = Entry {
//!     title: "hello".into(),
//!     created: Timestamp::from_millis(0.0),
//!     tags: vec!["a".into()],
//! };
//! runtime.with(|cx| {
//!     let value = jsbridge::to_value(&cx, &entry).unwrap();
//!     assert!(value.get_property("created").unwrap().is_date());
//!     cx.global_object().set_property("entry", value).unwrap();
//!
//!     let copy = cx.eval("({ ...entry, tags: entry.tags.concat('b') })").unwrap();
//!     let back: Entry = jsbridge::from_value(&cx, &copy).unwrap();
//!     assert_eq!(vec!["a", "b"], back.tags);
//! });
//! ```

use anyhow::anyhow;
use rquickjs::{convert::Coerced, Ctx, Exception, FromJs, String as JSString};

mod config;
mod context;
mod runtime;
pub mod serde;
mod value;

pub use crate::config::Config;
pub use crate::context::JSContextRef;
pub use crate::runtime::Runtime;
pub use crate::serde::de::Decoder;
pub use crate::serde::decode::{Decode, KeyedDecoder, SingleValueDecoder, UnkeyedDecoder};
pub use crate::serde::encode::{
    Encode, KeyedContainer, ReferencingEncoder, SingleValueContainer, UnkeyedContainer,
};
pub use crate::serde::err::{Capability, Error};
pub use crate::serde::ser::Encoder;
pub use crate::serde::{Bytes, CodingPath, PathSegment, Timestamp};
pub use crate::value::{JSValue, ValueKind};
pub use rquickjs as quickjs;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "messagepack")]
pub mod messagepack;

/// Encodes `value` into a [`JSValue`] of `context`.
pub fn to_value<'js, T>(context: &JSContextRef<'js>, value: &T) -> Result<JSValue<'js>, Error>
where
    T: ::serde::Serialize + ?Sized,
{
    Encoder::new(context).encode(value)
}

/// Decodes a `T` out of `value`.
pub fn from_value<'js, T>(context: &JSContextRef<'js>, value: &JSValue<'js>) -> Result<T, Error>
where
    T: ::serde::de::DeserializeOwned,
{
    Decoder::new(context, value.clone()).decode()
}

/// Converts an [`anyhow::Error`] into an exception thrown in `cx`.
///
/// Errors that already are QuickJS errors are passed through.
pub fn to_js_error(cx: Ctx<'_>, e: anyhow::Error) -> rquickjs::Error {
    match e.downcast::<rquickjs::Error>() {
        Ok(e) => e,
        Err(e) => Exception::throw_message(&cx, &e.to_string()),
    }
}

/// Converts a QuickJS error into an [`anyhow::Error`], taking the pending
/// exception out of `ctx` when there is one.
pub fn from_js_error(ctx: Ctx<'_>, e: rquickjs::Error) -> anyhow::Error {
    if !e.is_exception() {
        return anyhow::Error::new(e);
    }
    let exception = ctx.catch();
    if let Some(object) = exception.as_object() {
        let name = object.get::<_, Option<String>>("name").ok().flatten();
        let message = object.get::<_, Option<String>>("message").ok().flatten();
        if let Some(message) = message {
            return match name {
                Some(name) => anyhow!("{name}: {message}"),
                None => anyhow!("{message}"),
            };
        }
    }
    match <Coerced<JSString>>::from_js(&ctx, exception) {
        Ok(thrown) => match thrown.0.to_string() {
            Ok(thrown) => anyhow!("Uncaught {thrown}"),
            Err(e) => anyhow::Error::new(e),
        },
        Err(e) => anyhow::Error::new(e),
    }
}
