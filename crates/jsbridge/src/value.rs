use std::fmt;

use anyhow::{anyhow, bail, Result};
use rquickjs::{
    convert::Coerced,
    function::{Rest, This},
    Array, ArrayBuffer, Ctx, Filter, FromJs, Function, IntoJs, Object, String as JSString, Value,
};

use crate::{from_js_error, JSContextRef};

/// A value living in the QuickJS heap of the context that created it.
///
/// Cloning a [`JSValue`] yields another reference to the same engine value,
/// so a container attached to a parent and populated afterwards is observed
/// through the parent. The `'js` lifetime ties every value to its context.
#[derive(Clone)]
pub struct JSValue<'js>(Value<'js>);

/// The classification of a [`JSValue`] into the kinds a bridge can see.
///
/// Obtained from [`JSValue::kind`]. Anything that is neither a primitive
/// listed here nor one of the recognised object kinds is an
/// [`Object`](ValueKind::Object).
#[derive(Clone)]
pub enum ValueKind<'js> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(JSString<'js>),
    /// Milliseconds since the UNIX epoch.
    Date(f64),
    ArrayBuffer(ArrayBuffer<'js>),
    Array(Array<'js>),
    Object(Object<'js>),
    Function(Function<'js>),
}

impl ValueKind<'_> {
    /// The runtime type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Bool(_) => "boolean",
            ValueKind::Number(_) => "number",
            ValueKind::String(_) => "string",
            ValueKind::Date(_) => "Date",
            ValueKind::ArrayBuffer(_) => "ArrayBuffer",
            ValueKind::Array(_) => "Array",
            ValueKind::Object(_) => "Object",
            ValueKind::Function(_) => "Function",
        }
    }
}

impl fmt::Debug for ValueKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool(b) => write!(f, "Bool({b})"),
            ValueKind::Number(n) => write!(f, "Number({n})"),
            ValueKind::Date(ms) => write!(f, "Date({ms})"),
            other => f.write_str(other.type_name()),
        }
    }
}

impl<'js> JSValue<'js> {
    /// Classifies this value.
    ///
    /// Fails for engine values no bridge understands, such as symbols.
    pub fn kind(&self) -> Result<ValueKind<'js>> {
        let value = &self.0;
        if value.is_undefined() {
            return Ok(ValueKind::Undefined);
        }
        if value.is_null() {
            return Ok(ValueKind::Null);
        }
        if let Some(b) = value.as_bool() {
            return Ok(ValueKind::Bool(b));
        }
        if let Some(n) = value.as_number() {
            return Ok(ValueKind::Number(n));
        }
        if let Some(s) = value.as_string() {
            return Ok(ValueKind::String(s.clone()));
        }
        // Arrays and functions are objects too, so they are tested first.
        if let Some(function) = value.as_function() {
            return Ok(ValueKind::Function(function.clone()));
        }
        if let Some(array) = value.as_array() {
            return Ok(ValueKind::Array(array.clone()));
        }
        if let Some(object) = value.as_object() {
            if let Some(buffer) = ArrayBuffer::from_object(object.clone()) {
                return Ok(ValueKind::ArrayBuffer(buffer));
            }
            if let Some(ms) = date_millis(object)? {
                return Ok(ValueKind::Date(ms));
            }
            return Ok(ValueKind::Object(object.clone()));
        }
        bail!("Unsupported JS value of type {:?}", value.type_of())
    }

    pub fn is_undefined(&self) -> bool {
        self.0.is_undefined()
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn is_null_or_undefined(&self) -> bool {
        self.is_null() || self.is_undefined()
    }

    pub fn is_bool(&self) -> bool {
        self.0.is_bool()
    }

    pub fn is_number(&self) -> bool {
        self.0.is_number()
    }

    pub fn is_str(&self) -> bool {
        self.0.is_string()
    }

    pub fn is_date(&self) -> bool {
        matches!(self.kind(), Ok(ValueKind::Date(_)))
    }

    pub fn is_array_buffer(&self) -> bool {
        matches!(self.kind(), Ok(ValueKind::ArrayBuffer(_)))
    }

    pub fn is_array(&self) -> bool {
        self.0.is_array()
    }

    /// Whether this is a plain object, as opposed to an array, a function,
    /// a `Date` or an `ArrayBuffer`.
    pub fn is_object(&self) -> bool {
        matches!(self.kind(), Ok(ValueKind::Object(_)))
    }

    pub fn is_function(&self) -> bool {
        self.0.is_function()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.0.as_bool()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_number()
    }

    /// Copies a string value out of the engine.
    pub fn as_str(&self) -> Result<String> {
        match self.0.as_string() {
            Some(s) => Ok(s.to_string()?),
            None => bail!("Can't represent {} as str", self.type_name()),
        }
    }

    /// Milliseconds since the UNIX epoch of a `Date`.
    pub fn as_date(&self) -> Option<f64> {
        match self.kind() {
            Ok(ValueKind::Date(ms)) => Some(ms),
            _ => None,
        }
    }

    /// A copy of the bytes of an `ArrayBuffer`.
    pub fn copy_bytes(&self) -> Option<Vec<u8>> {
        match self.kind() {
            Ok(ValueKind::ArrayBuffer(buffer)) => buffer.as_bytes().map(<[u8]>::to_vec),
            _ => None,
        }
    }

    /// The runtime type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            Ok(kind) => kind.type_name(),
            Err(_) => "unknown",
        }
    }

    /// Number of elements of an array.
    pub fn count(&self) -> Option<usize> {
        self.0.as_array().map(Array::len)
    }

    /// Own enumerable string keys in enumeration order.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .properties()?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Own enumerable string-keyed properties in enumeration order.
    pub fn properties(&self) -> Result<Vec<(String, JSValue<'js>)>> {
        let object = self.as_object_handle()?;
        object
            .own_props::<String, Value<'js>>(Filter::new().enum_only().string())
            .map(|entry| {
                let (key, value) = entry.map_err(|e| self.engine_error(e))?;
                Ok((key, JSValue(value)))
            })
            .collect()
    }

    pub fn get_property(&self, key: &str) -> Result<JSValue<'js>> {
        let object = self.as_object_handle()?;
        object
            .get::<_, Value<'js>>(key)
            .map(JSValue)
            .map_err(|e| self.engine_error(e))
    }

    pub fn set_property(&self, key: &str, value: JSValue<'js>) -> Result<()> {
        let object = self.as_object_handle()?;
        object.set(key, value.0).map_err(|e| self.engine_error(e))
    }

    /// Removes an own property. Removing a missing key is not an error.
    pub fn delete_property(&self, key: &str) -> Result<()> {
        let object = self.as_object_handle()?;
        object.remove(key).map_err(|e| self.engine_error(e))
    }

    pub fn get_indexed_property(&self, index: usize) -> Result<JSValue<'js>> {
        let object = self.as_object_handle()?;
        object
            .get::<_, Value<'js>>(array_index(index)?)
            .map(JSValue)
            .map_err(|e| self.engine_error(e))
    }

    pub fn set_indexed_property(&self, index: usize, value: JSValue<'js>) -> Result<()> {
        let object = self.as_object_handle()?;
        object
            .set(array_index(index)?, value.0)
            .map_err(|e| self.engine_error(e))
    }

    /// Appends `value` as the last element of an array.
    pub fn append_property(&self, value: JSValue<'js>) -> Result<()> {
        let array = self.as_array_handle()?;
        array
            .set(array.len(), value.0)
            .map_err(|e| self.engine_error(e))
    }

    /// Inserts `value` at `index`, shifting later elements up by one.
    pub(crate) fn insert_indexed_property(&self, index: usize, value: JSValue<'js>) -> Result<()> {
        let array = self.as_array_handle()?;
        let len = array.len();
        if index >= len {
            return self.set_indexed_property(index, value);
        }
        for i in (index..len).rev() {
            let element = self.get_indexed_property(i)?;
            self.set_indexed_property(i + 1, element)?;
        }
        self.set_indexed_property(index, value)
    }

    pub fn call(
        &self,
        context: &JSContextRef<'js>,
        this: &JSValue<'js>,
        args: &[JSValue<'js>],
    ) -> Result<JSValue<'js>> {
        let Some(function) = self.0.as_function() else {
            bail!("{} is not a function", self.type_name());
        };
        let args: Vec<Value<'js>> = args.iter().map(|arg| arg.0.clone()).collect();
        function
            .call::<_, Value<'js>>((This(this.0.clone()), Rest(args)))
            .map(JSValue)
            .map_err(|e| from_js_error(context.ctx().clone(), e))
    }

    /// The string JS produces for this value when it is printed or joined.
    pub fn to_js_string(&self) -> Result<String> {
        let ctx = self.0.ctx();
        let string = <Coerced<JSString>>::from_js(ctx, self.0.clone())
            .map_err(|e| from_js_error(ctx.clone(), e))?;
        Ok(string.0.to_string()?)
    }

    /// The underlying engine value.
    pub fn into_inner(self) -> Value<'js> {
        self.0
    }

    pub fn as_inner(&self) -> &Value<'js> {
        &self.0
    }

    fn as_object_handle(&self) -> Result<&Object<'js>> {
        self.0
            .as_object()
            .ok_or_else(|| anyhow!("Cannot access properties of {}", self.type_name()))
    }

    fn as_array_handle(&self) -> Result<&Array<'js>> {
        self.0
            .as_array()
            .ok_or_else(|| anyhow!("Cannot append to {}", self.type_name()))
    }

    fn engine_error(&self, e: rquickjs::Error) -> anyhow::Error {
        from_js_error(self.0.ctx().clone(), e)
    }
}

// Array indices stop at 2^32 - 2; larger ones are rejected rather than
// being turned into ordinary property names.
fn array_index(index: usize) -> Result<u32> {
    u32::try_from(index)
        .ok()
        .filter(|index| *index < u32::MAX)
        .ok_or_else(|| anyhow!("Index {index} is out of range for a JS array"))
}

fn date_millis<'js>(object: &Object<'js>) -> Result<Option<f64>> {
    let ctx = object.ctx();
    let date: Function<'js> = ctx
        .globals()
        .get("Date")
        .map_err(|e| from_js_error(ctx.clone(), e))?;
    if !object.is_instance_of(&date) {
        return Ok(None);
    }
    let get_time: Function<'js> = object
        .get("getTime")
        .map_err(|e| from_js_error(ctx.clone(), e))?;
    let ms: Value<'js> = get_time
        .call((This(object.clone()),))
        .map_err(|e| from_js_error(ctx.clone(), e))?;
    Ok(Some(ms.as_number().unwrap_or(f64::NAN)))
}

impl<'js> From<Value<'js>> for JSValue<'js> {
    fn from(value: Value<'js>) -> Self {
        Self(value)
    }
}

impl<'js> From<JSValue<'js>> for Value<'js> {
    fn from(value: JSValue<'js>) -> Self {
        value.0
    }
}

impl<'js> AsRef<Value<'js>> for JSValue<'js> {
    fn as_ref(&self) -> &Value<'js> {
        &self.0
    }
}

impl<'js> IntoJs<'js> for JSValue<'js> {
    fn into_js(self, _ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(self.0)
    }
}

impl<'js> FromJs<'js> for JSValue<'js> {
    fn from_js(_ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<Self> {
        Ok(Self(value))
    }
}

impl fmt::Debug for JSValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JSValue").field(&self.0).finish()
    }
}
