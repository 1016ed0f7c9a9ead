use anyhow::Result;

use crate::{Decoder, Encoder, JSContextRef, JSValue};

/// Transcodes a byte slice containing a MessagePack encoded payload into a [`JSValue`].
///
/// Arguments:
/// * `context` - A reference to the [`JSContextRef`] that will contain the
///   returned [`JSValue`].
/// * `bytes` - A byte slice containing a MessagePack encoded payload.
pub fn transcode_input<'js>(context: &JSContextRef<'js>, bytes: &[u8]) -> Result<JSValue<'js>> {
    let mut deserializer = rmp_serde::Deserializer::from_read_ref(bytes);
    let mut encoder = Encoder::new(context);
    serde_transcode::transcode(&mut deserializer, &mut encoder)
        .map_err(|e| e.resolve(encoder.coding_path()))?;
    Ok(encoder.finish("MessagePack")?)
}

/// Transcodes a [`JSValue`] into a MessagePack encoded byte vector.
pub fn transcode_output<'js>(context: &JSContextRef<'js>, value: JSValue<'js>) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut decoder = Decoder::new(context, value);
    let mut serializer = rmp_serde::Serializer::new(&mut output);
    serde_transcode::transcode(&mut decoder, &mut serializer)?;
    Ok(output)
}
