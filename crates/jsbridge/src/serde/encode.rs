use std::any::type_name;
use std::ops::{Deref, DerefMut};

use serde::Serialize;

use crate::serde::err::Result;
use crate::serde::ser::Encoder;
use crate::serde::{CodingPath, PathSegment, SUPER_KEY};
use crate::{JSContextRef, JSValue};

/// A type that encodes itself through the containers of an [`Encoder`].
///
/// ```
/// # use jsbridge::{Encode, Encoder, Runtime};
/// struct Point {
///     x: f64,
///     y: f64,
/// }
///
/// impl Encode for Point {
///     fn encode(&self, encoder: &mut Encoder<'_>) -> jsbridge::serde::Result<()> {
///         let mut container = encoder.keyed_container()?;
///         container.encode("x", &self.x)?;
///         container.encode("y", &self.y)
///     }
/// }
///
/// let runtime = Runtime::default();
/// runtime.with(|cx| {
///     let value = Encoder::new(&cx).encode_custom(&Point { x: 1.0, y: 2.0 }).unwrap();
///     assert_eq!(Some(2.0), value.get_property("y").unwrap().as_f64());
/// });
/// ```
pub trait Encode {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<()>;
}

/// Encodes values by key into a JS object.
pub struct KeyedContainer<'e, 'js> {
    encoder: &'e mut Encoder<'js>,
    object: JSValue<'js>,
    nested: bool,
}

impl<'e, 'js> KeyedContainer<'e, 'js> {
    pub(crate) fn new(encoder: &'e mut Encoder<'js>, object: JSValue<'js>, nested: bool) -> Self {
        Self {
            encoder,
            object,
            nested,
        }
    }

    pub fn coding_path(&self) -> &CodingPath {
        self.encoder.coding_path()
    }

    pub fn encode<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let property =
            self.encoder
                .box_value(PathSegment::from(key), type_name::<T>(), |encoder| {
                    value.serialize(encoder)
                })?;
        self.insert(key, property)
    }

    pub fn encode_custom<T: Encode + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let property = self
            .encoder
            .box_value(PathSegment::from(key), type_name::<T>(), |encoder| {
                value.encode(encoder)
            })?;
        self.insert(key, property)
    }

    pub fn encode_nil(&mut self, key: &str) -> Result<()> {
        let null = self.encoder.context().null_value();
        self.insert(key, null)
    }

    /// Attaches an empty object under `key` and returns a container for it.
    pub fn nested_keyed_container(&mut self, key: &str) -> Result<KeyedContainer<'_, 'js>> {
        let object = self.encoder.new_object()?;
        self.insert(key, object.clone())?;
        self.encoder
            .state
            .push_frame(PathSegment::from(key), object.clone());
        Ok(KeyedContainer::new(&mut *self.encoder, object, true))
    }

    /// Attaches an empty array under `key` and returns a container for it.
    pub fn nested_unkeyed_container(&mut self, key: &str) -> Result<UnkeyedContainer<'_, 'js>> {
        let array = self.encoder.new_array()?;
        self.insert(key, array.clone())?;
        self.encoder
            .state
            .push_frame(PathSegment::from(key), array.clone());
        Ok(UnkeyedContainer::new(&mut *self.encoder, array, true))
    }

    /// An encoder for the parent's encoding, stored under `"super"`.
    pub fn super_encoder(&mut self) -> ReferencingEncoder<'js> {
        ReferencingEncoder::new(
            self.encoder.context(),
            self.encoder.coding_path().child(PathSegment::Super),
            Reference::Property(self.object.clone(), SUPER_KEY.to_string()),
        )
    }

    /// An encoder for the parent's encoding, stored under `key`.
    pub fn super_encoder_for_key(&mut self, key: &str) -> ReferencingEncoder<'js> {
        ReferencingEncoder::new(
            self.encoder.context(),
            self.encoder.coding_path().child(PathSegment::from(key)),
            Reference::Property(self.object.clone(), key.to_string()),
        )
    }

    fn insert(&mut self, key: &str, value: JSValue<'js>) -> Result<()> {
        self.encoder.located(self.object.set_property(key, value))
    }
}

impl Drop for KeyedContainer<'_, '_> {
    fn drop(&mut self) {
        if self.nested {
            self.encoder.state.pop_frame();
        }
    }
}

/// Encodes values in order into a JS array.
pub struct UnkeyedContainer<'e, 'js> {
    encoder: &'e mut Encoder<'js>,
    array: JSValue<'js>,
    nested: bool,
}

impl<'e, 'js> UnkeyedContainer<'e, 'js> {
    pub(crate) fn new(encoder: &'e mut Encoder<'js>, array: JSValue<'js>, nested: bool) -> Self {
        Self {
            encoder,
            array,
            nested,
        }
    }

    pub fn coding_path(&self) -> &CodingPath {
        self.encoder.coding_path()
    }

    /// Number of elements encoded so far.
    pub fn count(&self) -> usize {
        self.array.count().unwrap_or(0)
    }

    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let index = self.count();
        let element =
            self.encoder
                .box_value(PathSegment::Index(index), type_name::<T>(), |encoder| {
                    value.serialize(encoder)
                })?;
        self.push(element)
    }

    pub fn encode_custom<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        let index = self.count();
        let element =
            self.encoder
                .box_value(PathSegment::Index(index), type_name::<T>(), |encoder| {
                    value.encode(encoder)
                })?;
        self.push(element)
    }

    pub fn encode_nil(&mut self) -> Result<()> {
        let null = self.encoder.context().null_value();
        self.push(null)
    }

    /// Appends an empty object and returns a container for it.
    pub fn nested_keyed_container(&mut self) -> Result<KeyedContainer<'_, 'js>> {
        let index = self.count();
        let object = self.encoder.new_object()?;
        self.push(object.clone())?;
        self.encoder
            .state
            .push_frame(PathSegment::Index(index), object.clone());
        Ok(KeyedContainer::new(&mut *self.encoder, object, true))
    }

    /// Appends an empty array and returns a container for it.
    pub fn nested_unkeyed_container(&mut self) -> Result<UnkeyedContainer<'_, 'js>> {
        let index = self.count();
        let array = self.encoder.new_array()?;
        self.push(array.clone())?;
        self.encoder
            .state
            .push_frame(PathSegment::Index(index), array.clone());
        Ok(UnkeyedContainer::new(&mut *self.encoder, array, true))
    }

    /// An encoder for the parent's encoding, inserted at the current count
    /// once it finishes.
    pub fn super_encoder(&mut self) -> ReferencingEncoder<'js> {
        let index = self.count();
        ReferencingEncoder::new(
            self.encoder.context(),
            self.encoder.coding_path().child(PathSegment::Index(index)),
            Reference::Element(self.array.clone(), index),
        )
    }

    fn push(&mut self, value: JSValue<'js>) -> Result<()> {
        self.encoder.located(self.array.append_property(value))
    }
}

impl Drop for UnkeyedContainer<'_, '_> {
    fn drop(&mut self) {
        if self.nested {
            self.encoder.state.pop_frame();
        }
    }
}

/// Encodes exactly one value.
pub struct SingleValueContainer<'e, 'js> {
    encoder: &'e mut Encoder<'js>,
}

impl<'e, 'js> SingleValueContainer<'e, 'js> {
    pub(crate) fn new(encoder: &'e mut Encoder<'js>) -> Self {
        Self { encoder }
    }

    pub fn coding_path(&self) -> &CodingPath {
        self.encoder.coding_path()
    }

    /// # Panics
    ///
    /// When a value was already encoded into this container.
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.assert_can_encode();
        value.serialize(&mut *self.encoder)
    }

    /// # Panics
    ///
    /// When a value was already encoded into this container.
    pub fn encode_custom<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.assert_can_encode();
        value.encode(self.encoder)
    }

    /// # Panics
    ///
    /// When a value was already encoded into this container.
    pub fn encode_nil(&mut self) -> Result<()> {
        self.assert_can_encode();
        let null = self.encoder.context().null_value();
        self.encoder.store(null)
    }

    fn assert_can_encode(&self) {
        assert!(
            self.encoder.state.can_accept_new_container(),
            "attempt to encode a value through a single value container at {} that already holds one",
            self.encoder.coding_path()
        );
    }
}

pub(crate) enum Reference<'js> {
    Property(JSValue<'js>, String),
    Element(JSValue<'js>, usize),
}

/// An encoder whose value is written into a slot of an ancestor container.
///
/// The value is written when [`ReferencingEncoder::finish`] is called or, at
/// the latest, when the encoder is dropped. An encoder that stored nothing
/// writes an empty object.
pub struct ReferencingEncoder<'js> {
    encoder: Encoder<'js>,
    reference: Reference<'js>,
    finished: bool,
}

impl<'js> ReferencingEncoder<'js> {
    fn new(context: &JSContextRef<'js>, path: CodingPath, reference: Reference<'js>) -> Self {
        Self {
            encoder: Encoder::at(context, path),
            reference,
            finished: false,
        }
    }

    /// Writes the encoded value into the referenced slot.
    pub fn finish(mut self) -> Result<()> {
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let value = match self.encoder.take_value() {
            Some(value) => value,
            None => self.encoder.new_object()?,
        };
        tracing::trace!(path = %self.encoder.coding_path(), "flush super encoder");
        let written = match &self.reference {
            Reference::Property(object, key) => object.set_property(key, value),
            Reference::Element(array, index) => array.insert_indexed_property(*index, value),
        };
        self.encoder.located(written)
    }
}

impl<'js> Deref for ReferencingEncoder<'js> {
    type Target = Encoder<'js>;

    fn deref(&self) -> &Self::Target {
        &self.encoder
    }
}

impl DerefMut for ReferencingEncoder<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.encoder
    }
}

impl Drop for ReferencingEncoder<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "dropped super encoder failed to write its value");
        }
    }
}
