use anyhow::Result;

use crate::{Decoder, Encoder, JSContextRef, JSValue};

/// Transcodes a byte slice containing a JSON encoded payload into a [`JSValue`].
///
/// The slice is parsed in place and its contents are unspecified afterwards.
pub fn parse<'js>(context: &JSContextRef<'js>, bytes: &mut [u8]) -> Result<JSValue<'js>> {
    let mut deserializer = simd_json::Deserializer::from_slice(bytes)?;
    let mut encoder = Encoder::new(context);
    serde_transcode::transcode(&mut deserializer, &mut encoder)
        .map_err(|e| e.resolve(encoder.coding_path()))?;
    Ok(encoder.finish("JSON")?)
}

/// Transcodes a [`JSValue`] into a slice of JSON bytes.
pub fn stringify<'js>(context: &JSContextRef<'js>, value: JSValue<'js>) -> Result<Vec<u8>> {
    let mut output: Vec<u8> = Vec::new();
    let mut decoder = Decoder::new(context, value);
    let mut serializer = serde_json::Serializer::new(&mut output);
    serde_transcode::transcode(&mut decoder, &mut serializer)?;
    Ok(output)
}
