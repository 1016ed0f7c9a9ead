use std::any::type_name;

use rquickjs::String as JSString;
use serde::de::{self, DeserializeOwned, IntoDeserializer};
use serde::forward_to_deserialize_any;

use crate::config::CodingOptions;
use crate::serde::decode::{Decode, KeyedDecoder, SingleValueDecoder, UnkeyedDecoder};
use crate::serde::err::{Error, Result};
use crate::serde::stack::{self, CodingState, HasCodingState};
use crate::serde::{CodingPath, PathSegment, MAX_SAFE_INTEGER, MIN_SAFE_INTEGER, TIMESTAMP_TOKEN};
use crate::{JSContextRef, JSValue, ValueKind};

/// `Decoder` converts [`JSValue`]s into Rust values.
///
/// `&mut Decoder` implements `serde::Deserializer`. Types decoding themselves
/// by hand implement [`Decode`] and read through the keyed, unkeyed and single
/// value containers the decoder hands out.
///
/// ```
/// # use jsbridge::{Decoder, Runtime};
/// let runtime = Runtime::default();
/// let numbers: Vec<u8> = runtime.with(|cx| {
///     let value = cx.eval("[1, 2, 3]").unwrap();
///     Decoder::new(&cx, value).decode().unwrap()
/// });
/// assert_eq!(vec![1, 2, 3], numbers);
/// ```
#[derive(Debug)]
pub struct Decoder<'js> {
    options: CodingOptions,
    root: JSValue<'js>,
    pub(crate) state: CodingState<'js>,
}

impl<'js> HasCodingState<'js> for Decoder<'js> {
    fn coding_state(&mut self) -> &mut CodingState<'js> {
        &mut self.state
    }
}

impl<'js> Decoder<'js> {
    pub fn new(context: &JSContextRef<'js>, value: JSValue<'js>) -> Self {
        Self::at(context.options(), CodingPath::default(), value)
    }

    /// A decoder rooted at `value`, which lives at `path` of an enclosing graph.
    pub(crate) fn at(options: CodingOptions, path: CodingPath, value: JSValue<'js>) -> Self {
        let mut state = CodingState::new(path);
        state.push_container(value.clone());
        Self {
            options,
            root: value,
            state,
        }
    }

    pub fn coding_path(&self) -> &CodingPath {
        self.state.path()
    }

    /// Decodes a `T` through its `Deserialize` implementation.
    pub fn decode<T: DeserializeOwned>(mut self) -> Result<T> {
        T::deserialize(&mut self).map_err(|e| e.resolve(self.state.path()))
    }

    /// Decodes a `T` through its [`Decode`] implementation.
    pub fn decode_custom<T: Decode>(mut self) -> Result<T> {
        T::decode(&mut self).map_err(|e| e.resolve(self.state.path()))
    }

    /// A container reading the properties of the current object.
    pub fn keyed_container(&mut self) -> Result<KeyedDecoder<'_, 'js>> {
        let (object, keys) = self.expect_keyed()?;
        Ok(KeyedDecoder::new(self, object, keys, false))
    }

    /// A container reading the elements of the current array in order.
    pub fn unkeyed_container(&mut self) -> Result<UnkeyedDecoder<'_, 'js>> {
        let array = self.expect_array()?;
        Ok(UnkeyedDecoder::new(self, array, false))
    }

    /// A container reading the current value as a whole.
    pub fn single_value_container(&mut self) -> SingleValueDecoder<'_, 'js> {
        SingleValueDecoder::new(self)
    }

    pub(crate) fn options(&self) -> CodingOptions {
        self.options
    }

    /// The value being decoded.
    pub(crate) fn current(&self) -> JSValue<'js> {
        self.state.top().unwrap_or(&self.root).clone()
    }

    /// The kind of the value being decoded.
    fn kind(&self) -> Result<ValueKind<'js>> {
        self.current()
            .kind()
            .map_err(|e| Error::engine(e, self.state.path()))
    }

    /// Maps an engine failure to the current path.
    pub(crate) fn located<T>(&self, result: anyhow::Result<T>) -> Result<T> {
        result.map_err(|e| Error::engine(e, self.state.path()))
    }

    /// Decodes `value`, found at `segment` below the current value.
    pub(crate) fn unbox<T, F>(&mut self, segment: PathSegment, value: JSValue<'js>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        stack::scoped(self, segment, |decoder| {
            decoder.state.push_container(value);
            f(decoder).map_err(|e| e.resolve(decoder.state.path()))
        })
    }

    /// The current object and its own enumerable keys.
    pub(crate) fn expect_keyed(&self) -> Result<(JSValue<'js>, Vec<String>)> {
        match self.kind()? {
            ValueKind::Object(_) => {
                let object = self.current();
                let keys = self.located(object.keys())?;
                Ok((object, keys))
            }
            other => Err(self.mismatch("Object", &other)),
        }
    }

    pub(crate) fn expect_array(&self) -> Result<JSValue<'js>> {
        match self.kind()? {
            ValueKind::Array(_) => Ok(self.current()),
            other => Err(self.mismatch("Array", &other)),
        }
    }

    /// The error for finding `actual` where `expected` was requested.
    pub(crate) fn mismatch(&self, expected: &str, actual: &ValueKind<'js>) -> Error {
        match actual {
            ValueKind::Null | ValueKind::Undefined => Error::ValueNotFound {
                expected: expected.to_string(),
                reason: format!("found {} instead", actual.type_name()),
                path: self.state.path().clone(),
            },
            _ => Error::TypeMismatch {
                expected: expected.to_string(),
                actual: actual.type_name().to_string(),
                path: self.state.path().clone(),
            },
        }
    }

    fn string(&self, s: &JSString<'js>) -> Result<String> {
        s.to_string().map_err(|e| Error::engine(e, self.state.path()))
    }

    fn number(&self, expected: &str) -> Result<f64> {
        match self.kind()? {
            ValueKind::Number(n) => Ok(n),
            other => Err(self.mismatch(expected, &other)),
        }
    }

    fn integer<I: FromNumber>(&self) -> Result<I> {
        let n = self.number(type_name::<I>())?;
        if self.options.contains(CodingOptions::LOSSY_NUMBERS) {
            return Ok(I::saturating(n));
        }
        I::checked(n).ok_or_else(|| {
            Error::data_corrupted(
                format!("number {n} does not fit in {}", type_name::<I>()),
                self.state.path(),
            )
        })
    }

    fn bytes(&self, buffer: &rquickjs::ArrayBuffer<'js>) -> Result<Vec<u8>> {
        buffer.as_bytes().map(<[u8]>::to_vec).ok_or_else(|| {
            Error::data_corrupted("ArrayBuffer is detached", self.state.path())
        })
    }

    fn deserialize_number<'de, V>(&mut self, n: f64, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let is_positive = n.is_sign_positive();
        let safe_integer_range = (MIN_SAFE_INTEGER as f64)..=(MAX_SAFE_INTEGER as f64);
        let whole = n.fract() == 0.0;

        // -0 stays a float so that it survives a round trip.
        if whole && is_positive && n <= u32::MAX as f64 {
            return visitor.visit_u32(n as u32);
        }

        if whole && !(n == 0.0 && !is_positive) && safe_integer_range.contains(&n) {
            return visitor.visit_i64(n as i64);
        }

        visitor.visit_f64(n)
    }
}

/// Conversion of a JS number into a Rust integer type.
trait FromNumber: Sized {
    /// `None` unless `n` is integral and within range.
    fn checked(n: f64) -> Option<Self>;

    /// Truncates and saturates. `NaN` becomes zero.
    fn saturating(n: f64) -> Self;
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl FromNumber for $ty {
                fn checked(n: f64) -> Option<Self> {
                    // MAX + 1 is a power of two and exact, unlike MAX itself for
                    // 64 bit types.
                    let upper = <$ty>::MAX as f64 + 1.0;
                    let in_range = n >= <$ty>::MIN as f64 && n < upper;
                    (n.fract() == 0.0 && in_range).then_some(n as $ty)
                }

                fn saturating(n: f64) -> Self {
                    n as $ty
                }
            }
        )*
    };
}

impl_from_number!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! deserialize_integer {
    ($($method:ident => $visit:ident),*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: de::Visitor<'de>,
            {
                let n = self.integer()?;
                visitor.$visit(n)
            }
        )*
    };
}

impl<'de, 'js> de::Deserializer<'de> for &mut Decoder<'js> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.kind()? {
            ValueKind::Undefined | ValueKind::Null => visitor.visit_unit(),
            ValueKind::Bool(b) => visitor.visit_bool(b),
            ValueKind::Number(n) => self.deserialize_number(n, visitor),
            ValueKind::String(s) => visitor.visit_string(self.string(&s)?),
            ValueKind::Date(ms) => visitor.visit_f64(ms),
            ValueKind::ArrayBuffer(buffer) => visitor.visit_byte_buf(self.bytes(&buffer)?),
            ValueKind::Array(_) => {
                let array = self.current();
                visitor.visit_seq(SeqAccess::new(self, array))
            }
            ValueKind::Object(_) => {
                let properties = self.located(self.current().properties())?;
                visitor.visit_map(MapAccess::new(self, properties))
            }
            other @ ValueKind::Function(_) => Err(self.mismatch("a decodable value", &other)),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.kind()? {
            ValueKind::Bool(b) => visitor.visit_bool(b),
            other => Err(self.mismatch("bool", &other)),
        }
    }

    deserialize_integer! {
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64
    }

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let n = self.number("f32")?;
        visitor.visit_f32(n as f32)
    }

    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let n = self.number("f64")?;
        visitor.visit_f64(n)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.kind()? {
            ValueKind::String(s) => {
                let s = self.string(&s)?;
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => visitor.visit_char(c),
                    _ => Err(Error::data_corrupted(
                        format!("expected a single character but found {s:?}"),
                        self.state.path(),
                    )),
                }
            }
            other => Err(self.mismatch("char", &other)),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.kind()? {
            ValueKind::String(s) => visitor.visit_string(self.string(&s)?),
            other => Err(self.mismatch("string", &other)),
        }
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.kind()? {
            ValueKind::ArrayBuffer(buffer) => visitor.visit_byte_buf(self.bytes(&buffer)?),
            other => Err(self.mismatch("ArrayBuffer", &other)),
        }
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        if self.current().is_null_or_undefined() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.kind()? {
            ValueKind::Null | ValueKind::Undefined => visitor.visit_unit(),
            other => Err(self.mismatch("null", &other)),
        }
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        if name == TIMESTAMP_TOKEN {
            return match self.kind()? {
                ValueKind::Date(ms) => visitor.visit_f64(ms),
                other => Err(self.mismatch("Date", &other)),
            };
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let array = self.expect_array()?;
        visitor.visit_seq(SeqAccess::new(self, array))
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let (object, _) = self.expect_keyed()?;
        let properties = self.located(object.properties())?;
        visitor.visit_map(MapAccess::new(self, properties))
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.kind()? {
            ValueKind::String(s) => {
                let variant = self.string(&s)?;
                visitor.visit_enum(variant.into_deserializer())
            }
            ValueKind::Object(_) => {
                let mut entries = self.located(self.current().properties())?;
                if entries.len() != 1 {
                    return Err(Error::data_corrupted(
                        format!(
                            "expected an object with a single variant key but found {} keys",
                            entries.len()
                        ),
                        self.state.path(),
                    ));
                }
                let (variant, value) = entries.remove(0);
                visitor.visit_enum(EnumAccess {
                    de: self,
                    variant,
                    value,
                })
            }
            other => Err(self.mismatch("enum", &other)),
        }
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_unit()
    }
}

struct MapAccess<'a, 'js> {
    de: &'a mut Decoder<'js>,
    properties: std::vec::IntoIter<(String, JSValue<'js>)>,
    current: Option<(String, JSValue<'js>)>,
}

impl<'a, 'js> MapAccess<'a, 'js> {
    fn new(de: &'a mut Decoder<'js>, properties: Vec<(String, JSValue<'js>)>) -> Self {
        Self {
            de,
            properties: properties.into_iter(),
            current: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for MapAccess<'_, '_> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        let Some((key, value)) = self.properties.next() else {
            return Ok(None);
        };
        let path = self.de.state.path().child(PathSegment::from(key.as_str()));
        let deserialized = seed
            .deserialize(KeyDeserializer { key: &key })
            .map_err(|e| e.resolve(&path))?;
        self.current = Some((key, value));
        Ok(Some(deserialized))
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        let (key, value) = self
            .current
            .take()
            .ok_or_else(|| {
                <Error as de::Error>::custom("next_value_seed called before next_key_seed")
            })?;
        self.de
            .unbox(PathSegment::Key(key), value, |decoder| seed.deserialize(decoder))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.properties.len())
    }
}

struct SeqAccess<'a, 'js> {
    de: &'a mut Decoder<'js>,
    seq: JSValue<'js>,
    length: usize,
    index: usize,
}

impl<'a, 'js> SeqAccess<'a, 'js> {
    fn new(de: &'a mut Decoder<'js>, seq: JSValue<'js>) -> Self {
        Self {
            de,
            length: seq.count().unwrap_or_default(),
            seq,
            index: 0,
        }
    }
}

impl<'de> de::SeqAccess<'de> for SeqAccess<'_, '_> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        if self.index < self.length {
            let index = self.index;
            let value = self.de.located(self.seq.get_indexed_property(index))?;
            self.index += 1;
            self.de
                .unbox(PathSegment::Index(index), value, |decoder| seed.deserialize(decoder))
                .map(Some)
        } else {
            Ok(None)
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.length - self.index)
    }
}

struct EnumAccess<'a, 'js> {
    de: &'a mut Decoder<'js>,
    variant: String,
    value: JSValue<'js>,
}

impl<'de, 'a, 'js> de::EnumAccess<'de> for EnumAccess<'a, 'js> {
    type Error = Error;
    type Variant = VariantAccess<'a, 'js>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: de::DeserializeSeed<'de>,
    {
        let path = self.de.state.path().child(PathSegment::from(self.variant.as_str()));
        let variant = seed
            .deserialize(self.variant.as_str().into_deserializer())
            .map_err(|e: Error| e.resolve(&path))?;
        Ok((
            variant,
            VariantAccess {
                de: self.de,
                variant: self.variant,
                value: self.value,
            },
        ))
    }
}

struct VariantAccess<'a, 'js> {
    de: &'a mut Decoder<'js>,
    variant: String,
    value: JSValue<'js>,
}

impl<'de> de::VariantAccess<'de> for VariantAccess<'_, '_> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        self.de.unbox(PathSegment::Key(self.variant), self.value, |decoder| {
            de::Deserialize::deserialize(decoder)
        })
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: de::DeserializeSeed<'de>,
    {
        self.de.unbox(PathSegment::Key(self.variant), self.value, |decoder| {
            seed.deserialize(decoder)
        })
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.de.unbox(PathSegment::Key(self.variant), self.value, |decoder| {
            de::Deserializer::deserialize_seq(decoder, visitor)
        })
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.de.unbox(PathSegment::Key(self.variant), self.value, |decoder| {
            de::Deserializer::deserialize_map(decoder, visitor)
        })
    }
}

/// Deserializes property names, parsing them when a number or bool is
/// requested.
struct KeyDeserializer<'k> {
    key: &'k str,
}

macro_rules! deserialize_parsed_key {
    ($($method:ident => $visit:ident),*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: de::Visitor<'de>,
            {
                match self.key.parse() {
                    Ok(parsed) => visitor.$visit(parsed),
                    Err(_) => Err(de::Error::invalid_type(
                        de::Unexpected::Str(self.key),
                        &visitor,
                    )),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for KeyDeserializer<'_> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_str(self.key)
    }

    deserialize_parsed_key! {
        deserialize_bool => visit_bool,
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_f32 => visit_f32,
        deserialize_f64 => visit_f64,
        deserialize_char => visit_char
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_enum(self.key.into_deserializer())
    }

    forward_to_deserialize_any! {
        str string bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}
