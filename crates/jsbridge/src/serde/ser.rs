use std::any::type_name;

use serde::{ser, ser::Error as SerError, Serialize};

use crate::serde::encode::{Encode, KeyedContainer, SingleValueContainer, UnkeyedContainer};
use crate::serde::err::{Error, Result};
use crate::serde::stack::{self, CodingState, HasCodingState};
use crate::serde::{CodingPath, PathSegment, TIMESTAMP_TOKEN};
use crate::{JSContextRef, JSValue};

/// `Encoder` converts Rust values into [`JSValue`]s.
///
/// `&mut Encoder` implements `serde::Serializer`. Types encoding themselves by
/// hand implement [`Encode`] and use the keyed, unkeyed and single value
/// containers the encoder hands out.
///
/// ```
/// # use jsbridge::{Encoder, Runtime};
/// let runtime = Runtime::default();
/// runtime.with(|cx| {
///     let value = Encoder::new(&cx).encode(&(1, "two", true)).unwrap();
///     assert_eq!(Some(3), value.count());
/// });
/// ```
pub struct Encoder<'js> {
    context: JSContextRef<'js>,
    pub(crate) state: CodingState<'js>,
}

impl<'js> HasCodingState<'js> for Encoder<'js> {
    fn coding_state(&mut self) -> &mut CodingState<'js> {
        &mut self.state
    }
}

impl<'js> Encoder<'js> {
    pub fn new(context: &JSContextRef<'js>) -> Self {
        Self::at(context, CodingPath::default())
    }

    /// An encoder whose values live at `path` of an enclosing graph.
    pub(crate) fn at(context: &JSContextRef<'js>, path: CodingPath) -> Self {
        Self {
            context: context.clone(),
            state: CodingState::new(path),
        }
    }

    pub fn context(&self) -> &JSContextRef<'js> {
        &self.context
    }

    pub fn coding_path(&self) -> &CodingPath {
        self.state.path()
    }

    /// Encodes `value` through its `Serialize` implementation.
    pub fn encode<T: Serialize + ?Sized>(mut self, value: &T) -> Result<JSValue<'js>> {
        value
            .serialize(&mut self)
            .map_err(|e| e.resolve(self.state.path()))?;
        self.finish(type_name::<T>())
    }

    /// Encodes `value` through its [`Encode`] implementation.
    pub fn encode_custom<T: Encode + ?Sized>(mut self, value: &T) -> Result<JSValue<'js>> {
        value
            .encode(&mut self)
            .map_err(|e| e.resolve(self.state.path()))?;
        self.finish(type_name::<T>())
    }

    /// A container storing values by key, backed by a JS object.
    ///
    /// # Panics
    ///
    /// When a value other than an object was already stored by this encoder.
    pub fn keyed_container(&mut self) -> Result<KeyedContainer<'_, 'js>> {
        let object = if self.state.can_accept_new_container() {
            let object = self.new_object()?;
            self.state.push_container(object.clone());
            object
        } else {
            match self.state.current() {
                Some(object) if object.is_object() => object.clone(),
                _ => panic!(
                    "attempt to push a keyed container at {} where a different value was already encoded",
                    self.state.path()
                ),
            }
        };
        Ok(KeyedContainer::new(self, object, false))
    }

    /// A container appending values in order, backed by a JS array.
    ///
    /// # Panics
    ///
    /// When a value other than an array was already stored by this encoder.
    pub fn unkeyed_container(&mut self) -> Result<UnkeyedContainer<'_, 'js>> {
        let array = if self.state.can_accept_new_container() {
            let array = self.new_array()?;
            self.state.push_container(array.clone());
            array
        } else {
            match self.state.current() {
                Some(array) if array.is_array() => array.clone(),
                _ => panic!(
                    "attempt to push an unkeyed container at {} where a different value was already encoded",
                    self.state.path()
                ),
            }
        };
        Ok(UnkeyedContainer::new(self, array, false))
    }

    /// A container holding exactly one value.
    pub fn single_value_container(&mut self) -> SingleValueContainer<'_, 'js> {
        SingleValueContainer::new(self)
    }

    pub(crate) fn store(&mut self, value: JSValue<'js>) -> Result<()> {
        self.state.push_container(value);
        Ok(())
    }

    /// Attaches the current path to a failed engine call.
    pub(crate) fn located<T>(&self, result: anyhow::Result<T>) -> Result<T> {
        result.map_err(|e| Error::engine(e, self.state.path()))
    }

    pub(crate) fn new_object(&self) -> Result<JSValue<'js>> {
        self.located(self.context.object_value())
    }

    pub(crate) fn new_array(&self) -> Result<JSValue<'js>> {
        self.located(self.context.array_value())
    }

    /// Encodes a child value at `segment` and returns it without storing it.
    pub(crate) fn box_value<F>(
        &mut self,
        segment: PathSegment,
        value_type: &'static str,
        f: F,
    ) -> Result<JSValue<'js>>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        stack::scoped(self, segment, |encoder| {
            let depth = encoder.state.len();
            f(encoder).map_err(|e| e.resolve(encoder.state.path()))?;
            if encoder.state.len() > depth {
                if let Some(value) = encoder.state.pop_container() {
                    return Ok(value);
                }
            }
            Err(Error::EncodingProducedNoValue {
                value: value_type.to_string(),
                path: encoder.state.path().clone(),
            })
        })
    }

    /// Takes the value stored at the root of this encoder, if any.
    pub(crate) fn take_value(&mut self) -> Option<JSValue<'js>> {
        if self.state.len() > 0 {
            self.state.pop_container()
        } else {
            None
        }
    }

    pub(crate) fn finish(mut self, value_type: &'static str) -> Result<JSValue<'js>> {
        match self.take_value() {
            Some(value) => Ok(value),
            None => Err(Error::EncodingProducedNoValue {
                value: value_type.to_string(),
                path: self.state.path().clone(),
            }),
        }
    }

    fn serialize_integer(&mut self, v: i64) -> Result<()> {
        let value = match i32::try_from(v) {
            Ok(v) => self.context.value_from_i32(v),
            // NOTE: precision is lost beyond 2^53, numbers are doubles in JS.
            Err(_) => self.context.value_from_f64(v as f64),
        };
        self.store(value)
    }

    fn serialize_timestamp<T: Serialize + ?Sized>(&mut self, millis: &T) -> Result<()> {
        let depth = self.state.len();
        millis.serialize(&mut *self)?;
        let stored = if self.state.len() > depth {
            self.state.pop_container()
        } else {
            None
        };
        match stored.as_ref().and_then(JSValue::as_f64) {
            Some(ms) => {
                let date = self
                    .context
                    .date_value(ms)
                    .map_err(|e| e.with_path(self.state.path()))?;
                self.store(date)
            }
            None => Err(Error::data_corrupted(
                "timestamps must encode as milliseconds since the UNIX epoch",
                self.state.path(),
            )),
        }
    }

    /// Stores `{ variant: <container> }` and enters the inner container.
    fn enter_variant(&mut self, variant: &'static str, container: JSValue<'js>) -> Result<()> {
        let outer = self.new_object()?;
        self.located(outer.set_property(variant, container.clone()))?;
        self.store(outer)?;
        self.state.push_frame(PathSegment::from(variant), container);
        Ok(())
    }
}

impl<'e, 'js> ser::Serializer for &'e mut Encoder<'js> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SerializeArray<'e, 'js>;
    type SerializeTuple = SerializeArray<'e, 'js>;
    type SerializeTupleStruct = SerializeArray<'e, 'js>;
    type SerializeTupleVariant = SerializeArray<'e, 'js>;
    type SerializeMap = SerializeObject<'e, 'js>;
    type SerializeStruct = SerializeObject<'e, 'js>;
    type SerializeStructVariant = SerializeObject<'e, 'js>;

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_integer(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_integer(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_integer(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.serialize_integer(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_integer(i64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_integer(i64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_integer(i64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        match i64::try_from(v) {
            Ok(v) => self.serialize_integer(v),
            Err(_) => self.serialize_f64(v as f64),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        let value = self.context.value_from_f64(v);
        self.store(value)
    }

    fn serialize_bool(self, b: bool) -> Result<()> {
        let value = self.context.value_from_bool(b);
        self.store(value)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.serialize_str(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        let value = self.located(self.context.value_from_str(v))?;
        self.store(value)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        let buffer = self
            .context
            .array_buffer_value(v)
            .map_err(|e| e.with_path(self.state.path()))?;
        self.store(buffer)
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit(self) -> Result<()> {
        let value = self.context.null_value();
        self.store(value)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        if name == TIMESTAMP_TOKEN {
            return self.serialize_timestamp(value);
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let object = self.new_object()?;
        self.store(object.clone())?;
        let payload = self.box_value(PathSegment::from(variant), type_name::<T>(), |encoder| {
            value.serialize(encoder)
        })?;
        self.located(object.set_property(variant, payload))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        let array = self.new_array()?;
        self.store(array.clone())?;
        Ok(SerializeArray {
            encoder: self,
            array,
            len: 0,
            variant: false,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        let array = self.new_array()?;
        self.enter_variant(variant, array.clone())?;
        Ok(SerializeArray {
            encoder: self,
            array,
            len: 0,
            variant: true,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        let object = self.new_object()?;
        self.store(object.clone())?;
        Ok(SerializeObject {
            encoder: self,
            object,
            key: None,
            variant: false,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        let object = self.new_object()?;
        self.enter_variant(variant, object.clone())?;
        Ok(SerializeObject {
            encoder: self,
            object,
            key: None,
            variant: true,
        })
    }
}

/// Serializes sequences, tuples and tuple variants into a JS array.
pub struct SerializeArray<'e, 'js> {
    encoder: &'e mut Encoder<'js>,
    array: JSValue<'js>,
    len: usize,
    variant: bool,
}

impl SerializeArray<'_, '_> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let element = self
            .encoder
            .box_value(PathSegment::Index(self.len), type_name::<T>(), |encoder| {
                value.serialize(encoder)
            })?;
        self.encoder
            .located(self.array.set_indexed_property(self.len, element))?;
        self.len += 1;
        Ok(())
    }

    fn finish(self) -> Result<()> {
        if self.variant {
            self.encoder.state.pop_frame();
        }
        Ok(())
    }
}

impl ser::SerializeSeq for SerializeArray<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl ser::SerializeTuple for SerializeArray<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SerializeArray<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SerializeArray<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// Serializes maps, structs and struct variants into a JS object.
pub struct SerializeObject<'e, 'js> {
    encoder: &'e mut Encoder<'js>,
    object: JSValue<'js>,
    key: Option<String>,
    variant: bool,
}

impl SerializeObject<'_, '_> {
    fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let property = self
            .encoder
            .box_value(PathSegment::from(key), type_name::<T>(), |encoder| {
                value.serialize(encoder)
            })?;
        self.encoder
            .located(self.object.set_property(key, property))
    }

    fn finish(self) -> Result<()> {
        if self.variant {
            self.encoder.state.pop_frame();
        }
        Ok(())
    }
}

impl ser::SerializeMap for SerializeObject<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = key
            .serialize(MapKeySerializer)
            .map_err(|e| e.resolve(self.encoder.state.path()))?;
        self.key = Some(key);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .key
            .take()
            .ok_or_else(|| Error::custom("serialize_value called before serialize_key"))?;
        self.insert(&key, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl ser::SerializeStruct for SerializeObject<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.insert(key, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for SerializeObject<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.insert(key, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

// Property names of float keys, spelled the way JS prints numbers.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n.is_sign_positive() { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

/// Turns map keys into property names.
struct MapKeySerializer;

impl ser::Serializer for MapKeySerializer {
    type Ok = String;
    type Error = Error;

    type SerializeSeq = ser::Impossible<String, Error>;
    type SerializeTuple = ser::Impossible<String, Error>;
    type SerializeTupleStruct = ser::Impossible<String, Error>;
    type SerializeTupleVariant = ser::Impossible<String, Error>;
    type SerializeMap = ser::Impossible<String, Error>;
    type SerializeStruct = ser::Impossible<String, Error>;
    type SerializeStructVariant = ser::Impossible<String, Error>;

    fn serialize_bool(self, v: bool) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<String> {
        Ok(format_number(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<String> {
        Ok(format_number(v))
    }

    fn serialize_char(self, v: char) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_none(self) -> Result<String> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_some<T>(self, value: &T) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(Error::key_must_be_a_string())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::key_must_be_a_string())
    }
}
