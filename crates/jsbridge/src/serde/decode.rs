use std::any::type_name;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::serde::de::Decoder;
use crate::serde::err::{Error, Result};
use crate::serde::{CodingPath, PathSegment, SUPER_KEY};
use crate::JSValue;

/// A type that decodes itself through the containers of a [`Decoder`].
///
/// ```
/// # use jsbridge::{Decode, Decoder, Runtime};
/// #[derive(Debug, PartialEq)]
/// struct Point {
///     x: f64,
///     y: f64,
/// }
///
/// impl Decode for Point {
///     fn decode(decoder: &mut Decoder<'_>) -> jsbridge::serde::Result<Self> {
///         let mut container = decoder.keyed_container()?;
///         Ok(Point {
///             x: container.decode("x")?,
///             y: container.decode_if_present("y")?.unwrap_or_default(),
///         })
///     }
/// }
///
/// let runtime = Runtime::default();
/// let point: Point = runtime.with(|cx| {
///     let value = cx.eval("({ x: 1 })").unwrap();
///     Decoder::new(&cx, value).decode_custom().unwrap()
/// });
/// assert_eq!(Point { x: 1.0, y: 0.0 }, point);
/// ```
pub trait Decode: Sized {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self>;
}

/// Reads the properties of a JS object by key.
pub struct KeyedDecoder<'d, 'js> {
    decoder: &'d mut Decoder<'js>,
    object: JSValue<'js>,
    keys: Vec<String>,
    nested: bool,
}

impl fmt::Debug for KeyedDecoder<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedDecoder")
            .field("path", self.coding_path())
            .field("keys", &self.keys)
            .finish()
    }
}

impl<'d, 'js> KeyedDecoder<'d, 'js> {
    pub(crate) fn new(
        decoder: &'d mut Decoder<'js>,
        object: JSValue<'js>,
        keys: Vec<String>,
        nested: bool,
    ) -> Self {
        Self {
            decoder,
            object,
            keys,
            nested,
        }
    }

    pub fn coding_path(&self) -> &CodingPath {
        self.decoder.coding_path()
    }

    /// Own enumerable keys in enumeration order.
    pub fn all_keys(&self) -> &[String] {
        &self.keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Whether the value under `key` is `null` or `undefined`.
    pub fn decode_nil(&self, key: &str) -> Result<bool> {
        Ok(self.entry(key)?.is_null_or_undefined())
    }

    pub fn decode<T: DeserializeOwned>(&mut self, key: &str) -> Result<T> {
        let value = self.entry(key)?;
        self.decoder
            .unbox(PathSegment::from(key), value, |decoder| T::deserialize(decoder))
    }

    /// `None` when `key` is absent, `null` or `undefined`.
    pub fn decode_if_present<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        if !self.contains(key) || self.entry(key)?.is_null_or_undefined() {
            return Ok(None);
        }
        self.decode(key).map(Some)
    }

    pub fn decode_custom<T: Decode>(&mut self, key: &str) -> Result<T> {
        let value = self.entry(key)?;
        self.decoder
            .unbox(PathSegment::from(key), value, |decoder| T::decode(decoder))
    }

    pub fn nested_keyed_container(&mut self, key: &str) -> Result<KeyedDecoder<'_, 'js>> {
        let value = self.entry(key)?;
        let (object, keys) =
            self.decoder
                .enter(PathSegment::from(key), value, Decoder::expect_keyed)?;
        Ok(KeyedDecoder::new(&mut *self.decoder, object, keys, true))
    }

    pub fn nested_unkeyed_container(&mut self, key: &str) -> Result<UnkeyedDecoder<'_, 'js>> {
        let value = self.entry(key)?;
        let array = self
            .decoder
            .enter(PathSegment::from(key), value, Decoder::expect_array)?;
        Ok(UnkeyedDecoder::new(&mut *self.decoder, array, true))
    }

    /// A decoder for the parent's encoding, stored under `"super"`.
    pub fn super_decoder(&self) -> Result<Decoder<'js>> {
        let value = self.entry(SUPER_KEY)?;
        Ok(Decoder::at(
            self.decoder.options(),
            self.coding_path().child(PathSegment::Super),
            value,
        ))
    }

    /// A decoder for the parent's encoding, stored under `key`.
    pub fn super_decoder_for_key(&self, key: &str) -> Result<Decoder<'js>> {
        let value = self.entry(key)?;
        Ok(Decoder::at(
            self.decoder.options(),
            self.coding_path().child(PathSegment::from(key)),
            value,
        ))
    }

    fn entry(&self, key: &str) -> Result<JSValue<'js>> {
        if !self.contains(key) {
            return Err(Error::KeyNotFound {
                key: key.to_string(),
                path: self.coding_path().clone(),
            });
        }
        self.decoder.located(self.object.get_property(key))
    }
}

impl Drop for KeyedDecoder<'_, '_> {
    fn drop(&mut self) {
        if self.nested {
            self.decoder.state.pop_frame();
        }
    }
}

/// Reads the elements of a JS array in order.
pub struct UnkeyedDecoder<'d, 'js> {
    decoder: &'d mut Decoder<'js>,
    array: JSValue<'js>,
    count: usize,
    index: usize,
    nested: bool,
}

impl fmt::Debug for UnkeyedDecoder<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnkeyedDecoder")
            .field("path", self.coding_path())
            .field("count", &self.count)
            .field("index", &self.index)
            .finish()
    }
}

impl<'d, 'js> UnkeyedDecoder<'d, 'js> {
    pub(crate) fn new(decoder: &'d mut Decoder<'js>, array: JSValue<'js>, nested: bool) -> Self {
        Self {
            decoder,
            count: array.count().unwrap_or_default(),
            array,
            index: 0,
            nested,
        }
    }

    pub fn coding_path(&self) -> &CodingPath {
        self.decoder.coding_path()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Index of the next element to be read.
    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.count
    }

    /// Whether the next element is `null` or `undefined`, consuming it if so.
    pub fn decode_nil(&mut self) -> Result<bool> {
        let value = self.next_value("nil")?;
        if value.is_null_or_undefined() {
            self.index += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<T> {
        let value = self.next_value(type_name::<T>())?;
        let decoded = self.decoder.unbox(PathSegment::Index(self.index), value, |decoder| {
            T::deserialize(decoder)
        })?;
        self.index += 1;
        Ok(decoded)
    }

    pub fn decode_custom<T: Decode>(&mut self) -> Result<T> {
        let value = self.next_value(type_name::<T>())?;
        let decoded = self.decoder.unbox(PathSegment::Index(self.index), value, |decoder| {
            T::decode(decoder)
        })?;
        self.index += 1;
        Ok(decoded)
    }

    pub fn nested_keyed_container(&mut self) -> Result<KeyedDecoder<'_, 'js>> {
        let value = self.next_value("Object")?;
        let (object, keys) =
            self.decoder
                .enter(PathSegment::Index(self.index), value, Decoder::expect_keyed)?;
        self.index += 1;
        Ok(KeyedDecoder::new(&mut *self.decoder, object, keys, true))
    }

    pub fn nested_unkeyed_container(&mut self) -> Result<UnkeyedDecoder<'_, 'js>> {
        let value = self.next_value("Array")?;
        let array =
            self.decoder
                .enter(PathSegment::Index(self.index), value, Decoder::expect_array)?;
        self.index += 1;
        Ok(UnkeyedDecoder::new(&mut *self.decoder, array, true))
    }

    /// A decoder for the parent's encoding, read from the next element.
    pub fn super_decoder(&mut self) -> Result<Decoder<'js>> {
        let value = self.next_value("super")?;
        let decoder = Decoder::at(
            self.decoder.options(),
            self.coding_path().child(PathSegment::Index(self.index)),
            value,
        );
        self.index += 1;
        Ok(decoder)
    }

    fn next_value(&self, expected: &str) -> Result<JSValue<'js>> {
        if self.is_at_end() {
            return Err(Error::ValueNotFound {
                expected: expected.to_string(),
                reason: "unkeyed container is at end".to_string(),
                path: self.coding_path().child(PathSegment::Index(self.index)),
            });
        }
        self.decoder
            .located(self.array.get_indexed_property(self.index))
    }
}

impl Drop for UnkeyedDecoder<'_, '_> {
    fn drop(&mut self) {
        if self.nested {
            self.decoder.state.pop_frame();
        }
    }
}

/// Reads the current value as a whole.
pub struct SingleValueDecoder<'d, 'js> {
    decoder: &'d mut Decoder<'js>,
}

impl<'d, 'js> SingleValueDecoder<'d, 'js> {
    pub(crate) fn new(decoder: &'d mut Decoder<'js>) -> Self {
        Self { decoder }
    }

    pub fn coding_path(&self) -> &CodingPath {
        self.decoder.coding_path()
    }

    /// Whether the value is `null` or `undefined`.
    pub fn decode_nil(&self) -> bool {
        self.decoder.current().is_null_or_undefined()
    }

    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<T> {
        let path = self.decoder.coding_path().clone();
        T::deserialize(&mut *self.decoder).map_err(|e| e.resolve(&path))
    }

    pub fn decode_custom<T: Decode>(&mut self) -> Result<T> {
        T::decode(self.decoder)
    }
}

impl<'js> Decoder<'js> {
    /// Enters the frame of a nested container, which pops it when dropped.
    /// The frame is left again when `container` rejects the value.
    fn enter<C>(
        &mut self,
        segment: PathSegment,
        value: JSValue<'js>,
        container: impl FnOnce(&Self) -> Result<C>,
    ) -> Result<C> {
        self.state.push_frame(segment, value);
        let result = container(self);
        if result.is_err() {
            self.state.pop_frame();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::Decode;
    use crate::serde::de::Decoder;
    use crate::serde::err::{Error, Result};
    use crate::{JSContextRef, Runtime};

    fn decoder_for<'js>(cx: &JSContextRef<'js>, source: &str) -> Decoder<'js> {
        Decoder::new(cx, cx.eval(source).unwrap())
    }

    #[test]
    fn test_keyed_decoder() {
        let runtime = Runtime::default();
        runtime.with(|cx| {
            let mut decoder = decoder_for(&cx, "({ x: 1, z: null, s: 'XYZ' })");
            let mut container = decoder.keyed_container().unwrap();
            assert_eq!(vec!["x", "z", "s"], container.all_keys());
            assert!(container.contains("z"));
            assert!(!container.contains("w"));
            assert!(container.decode_nil("z").unwrap());
            assert!(!container.decode_nil("x").unwrap());
            assert_eq!(1u8, container.decode::<u8>("x").unwrap());
            assert_eq!(None::<u8>, container.decode_if_present("z").unwrap());
            assert_eq!(None::<u8>, container.decode_if_present("w").unwrap());
            assert_eq!("XYZ", container.decode::<String>("s").unwrap());
        });
    }

    #[test]
    fn test_inherited_keys_are_not_contained() {
        let runtime = Runtime::default();
        runtime.with(|cx| {
            let mut decoder = decoder_for(
                &cx,
                "Object.create({ inherited: 1 }, { own: { value: 2, enumerable: true } })",
            );
            let mut container = decoder.keyed_container().unwrap();
            assert_eq!(vec!["own"], container.all_keys());
            assert!(!container.contains("inherited"));
            assert!(matches!(
                container.decode::<u8>("inherited"),
                Err(Error::KeyNotFound { .. })
            ));
            assert_eq!(2, container.decode::<u8>("own").unwrap());
        });
    }

    #[test]
    fn test_missing_key_leaves_path_unchanged() {
        let runtime = Runtime::default();
        runtime.with(|cx| {
            let mut decoder = decoder_for(&cx, "({ a: 1 })");
            let mut container = decoder.keyed_container().unwrap();
            let err = container.decode::<u8>("b").unwrap_err();
            assert!(matches!(err, Error::KeyNotFound { ref key, ref path } if key == "b" && path.is_empty()));
            assert!(container.coding_path().is_empty());
            assert!(matches!(container.decode_nil("b"), Err(Error::KeyNotFound { .. })));
            assert!(matches!(container.super_decoder(), Err(Error::KeyNotFound { .. })));
        });
    }

    #[test]
    fn test_unkeyed_decoder() {
        let runtime = Runtime::default();
        runtime.with(|cx| {
            let mut decoder = decoder_for(&cx, "[true, null, 'X', 2.5]");
            let mut container = decoder.unkeyed_container().unwrap();
            assert_eq!(4, container.count());
            assert!(!container.decode_nil().unwrap());
            assert_eq!(0, container.current_index());
            assert!(container.decode::<bool>().unwrap());
            assert!(container.decode_nil().unwrap());
            assert_eq!(2, container.current_index());

            let err = container.decode::<f64>().unwrap_err();
            assert!(matches!(err, Error::TypeMismatch { ref path, .. } if path.to_string() == "$[2]"));
            assert_eq!(2, container.current_index());

            assert_eq!("X", container.decode::<String>().unwrap());
            assert_eq!(2.5, container.decode::<f64>().unwrap());
            assert!(container.is_at_end());

            let err = container.decode::<f64>().unwrap_err();
            match err {
                Error::ValueNotFound { reason, path, .. } => {
                    assert_eq!("unkeyed container is at end", reason);
                    assert_eq!("$[4]", path.to_string());
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(4, container.current_index());
            assert!(container.decode_nil().is_err());
            assert_eq!(4, container.current_index());
        });
    }

    #[test]
    fn test_nested_containers() {
        let runtime = Runtime::default();
        runtime.with(|cx| {
            let mut decoder = decoder_for(&cx, "({ q: [1, [true, ['X', [2.3]]], 'Z'] })");
            let mut root = decoder.keyed_container().unwrap();
            {
                let mut q = root.nested_unkeyed_container("q").unwrap();
                assert_eq!("$.q", q.coding_path().to_string());
                assert_eq!(1, q.decode::<u8>().unwrap());
                {
                    let mut inner = q.nested_unkeyed_container().unwrap();
                    assert_eq!("$.q[1]", inner.coding_path().to_string());
                    assert!(inner.decode::<bool>().unwrap());
                    let err = inner.nested_keyed_container().unwrap_err();
                    assert!(matches!(err, Error::TypeMismatch { ref path, .. } if path.to_string() == "$.q[1][1]"));
                    assert_eq!("$.q[1]", inner.coding_path().to_string());
                    assert_eq!(1, inner.current_index());
                    let mut deepest = inner.nested_unkeyed_container().unwrap();
                    assert_eq!("X", deepest.decode::<String>().unwrap());
                    assert_eq!(vec![2.3], deepest.decode::<Vec<f64>>().unwrap());
                }
                assert_eq!("Z", q.decode::<String>().unwrap());
            }
            assert!(root.coding_path().is_empty());
            assert!(matches!(
                root.nested_keyed_container("q"),
                Err(Error::TypeMismatch { .. })
            ));
        });
    }

    #[test]
    fn test_container_on_null_is_value_not_found() {
        let runtime = Runtime::default();
        runtime.with(|cx| {
            let mut decoder = Decoder::new(&cx, cx.null_value());
            assert!(matches!(
                decoder.keyed_container(),
                Err(Error::ValueNotFound { .. })
            ));
            assert!(matches!(
                decoder.unkeyed_container(),
                Err(Error::ValueNotFound { .. })
            ));
            assert!(decoder.single_value_container().decode_nil());
            assert!(decoder.single_value_container().decode_nil());
        });
    }

    #[derive(Debug, PartialEq)]
    struct Base {
        id: u32,
    }

    impl Decode for Base {
        fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
            let mut container = decoder.keyed_container()?;
            Ok(Base {
                id: container.decode("id")?,
            })
        }
    }

    #[derive(Debug, PartialEq)]
    struct Derived {
        base: Base,
        name: String,
    }

    impl Decode for Derived {
        fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
            let mut container = decoder.keyed_container()?;
            let name = container.decode("name")?;
            let base = container.super_decoder()?.decode_custom()?;
            Ok(Derived { base, name })
        }
    }

    #[test]
    fn test_super_decoder() {
        let runtime = Runtime::default();
        let derived: Derived = runtime.with(|cx| {
            decoder_for(&cx, "({ name: 'derived', super: { id: 7 } })")
                .decode_custom()
                .unwrap()
        });
        assert_eq!(
            Derived {
                base: Base { id: 7 },
                name: "derived".to_string()
            },
            derived
        );
    }

    #[test]
    fn test_super_decoder_path() {
        let runtime = Runtime::default();
        let err = runtime.with(|cx| {
            decoder_for(&cx, "({ name: 'derived', super: { id: 'seven' } })")
                .decode_custom::<Derived>()
                .unwrap_err()
        });
        assert!(matches!(err, Error::TypeMismatch { ref path, .. } if path.to_string() == "$.super.id"));
    }

    #[test]
    fn test_super_decoder_for_key() {
        let runtime = Runtime::default();
        runtime.with(|cx| {
            let mut decoder = decoder_for(&cx, "({ parent: { id: 3 } })");
            let container = decoder.keyed_container().unwrap();
            let parent = container.super_decoder_for_key("parent").unwrap();
            assert_eq!("$.parent", parent.coding_path().to_string());
            assert_eq!(Base { id: 3 }, parent.decode_custom().unwrap());
            assert!(matches!(
                container.super_decoder_for_key("missing"),
                Err(Error::KeyNotFound { .. })
            ));
        });
    }

    #[test]
    fn test_unkeyed_decode_custom_and_super() {
        let runtime = Runtime::default();
        runtime.with(|cx| {
            let mut decoder = decoder_for(&cx, "[{ id: 1 }, { id: 2 }]");
            let mut container = decoder.unkeyed_container().unwrap();
            assert_eq!(Base { id: 1 }, container.decode_custom().unwrap());
            let second = container.super_decoder().unwrap();
            assert_eq!("$[1]", second.coding_path().to_string());
            assert_eq!(Base { id: 2 }, second.decode_custom().unwrap());
            assert!(container.is_at_end());
            assert!(container.super_decoder().is_err());
        });
    }
}
