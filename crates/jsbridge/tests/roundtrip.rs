use std::collections::BTreeMap;

use anyhow::Result;
use jsbridge::{Bytes, Config, Decode, Decoder, Encode, Encoder, Error, Runtime, Timestamp};
use quickcheck::quickcheck;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn roundtrip<T>(runtime: &Runtime, value: &T) -> T
where
    T: Serialize + DeserializeOwned,
{
    runtime.with(|cx| {
        let encoded = jsbridge::to_value(&cx, value).unwrap();
        jsbridge::from_value(&cx, &encoded).unwrap()
    })
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Point {
    x: u32,
    y: Vec<Flag>,
    z: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

#[test]
fn object_with_null_member() -> Result<()> {
    let runtime = Runtime::default();
    let input = serde_json::json!({"x": 1, "y": [true, false, "XYZ"], "z": null});
    let point: Point = runtime.with(|cx| {
        let value = jsbridge::to_value(&cx, &input)?;
        jsbridge::from_value::<Point>(&cx, &value)
    })?;

    let expected = Point {
        x: 1,
        y: vec![
            Flag::Bool(true),
            Flag::Bool(false),
            Flag::Text("XYZ".to_string()),
        ],
        z: None,
    };
    assert_eq!(expected, point);
    assert_eq!(expected, roundtrip(&runtime, &point));

    runtime.with(|cx| {
        let encoded = jsbridge::to_value(&cx, &point)?;
        assert!(encoded.get_property("z")?.is_null());
        Ok(())
    })
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Node {
    Number(f64),
    Bool(bool),
    Text(String),
    List(Vec<Node>),
}

#[test]
fn deeply_nested_arrays() -> Result<()> {
    let runtime = Runtime::default();
    let expected: BTreeMap<String, Node> = [(
        "q".to_string(),
        Node::List(vec![
            Node::Number(1.0),
            Node::List(vec![
                Node::Bool(true),
                Node::List(vec![
                    Node::Text("X".to_string()),
                    Node::List(vec![Node::Number(2.3)]),
                ]),
            ]),
            Node::Text("Z".to_string()),
        ]),
    )]
    .into_iter()
    .collect();

    assert_eq!(expected, roundtrip(&runtime, &expected));

    runtime.with(|cx| {
        let value = jsbridge::to_value(&cx, &expected)?;
        let deepest = value
            .get_property("q")?
            .get_indexed_property(1)?
            .get_indexed_property(1)?
            .get_indexed_property(1)?
            .get_indexed_property(0)?;
        assert_eq!(Some(2.3), deepest.as_f64());

        cx.global_object().set_property("tree", value)?;
        assert_eq!(Some(2.3), cx.eval("tree.q[1][1][1][0]")?.as_f64());
        Ok(())
    })
}

#[test]
fn random_byte_blobs() {
    let runtime = Runtime::default();
    for len in [0, 1, 10_000] {
        let mut blob = vec![0u8; len];
        fastrand::fill(&mut blob);
        let expected = Bytes::from(blob);

        runtime.with(|cx| {
            let value = jsbridge::to_value(&cx, &expected).unwrap();
            assert!(value.is_array_buffer());
            assert_eq!(Some(len), value.copy_bytes().map(|b| b.len()));
        });
        assert_eq!(expected, roundtrip(&runtime, &expected));
    }
}

#[test]
fn timestamps_become_dates() {
    let runtime = Runtime::default();
    let now = Timestamp::from_millis(fastrand::u32(..) as f64);
    runtime.with(|cx| {
        let value = jsbridge::to_value(&cx, &now).unwrap();
        assert_eq!(Some(now.as_millis()), value.as_date());
    });
    assert_eq!(now, roundtrip(&runtime, &now));
}

#[test]
fn key_order_is_irrelevant() -> Result<()> {
    #[derive(Debug, PartialEq, Deserialize)]
    struct Pair {
        a: String,
        b: f64,
    }

    let runtime = Runtime::default();
    let pair: Pair = runtime.with(|cx| {
        let value = cx.object_value()?;
        value.set_property("b", cx.value_from_f64(2.0))?;
        value.set_property("a", cx.value_from_str("one")?)?;
        Ok::<_, anyhow::Error>(jsbridge::from_value::<Pair>(&cx, &value)?)
    })?;
    assert_eq!(
        Pair {
            a: "one".to_string(),
            b: 2.0
        },
        pair
    );
    Ok(())
}

#[test]
fn missing_key_leaves_path_unchanged() -> Result<()> {
    let runtime = Runtime::default();
    runtime.with(|cx| {
        let value = jsbridge::to_value(&cx, &BTreeMap::from([("present", 1)]))?;

        let mut decoder = Decoder::new(&cx, value);
        let mut container = decoder.keyed_container()?;
        let before = container.coding_path().clone();

        let err = container.decode::<u32>("absent").unwrap_err();
        match err {
            Error::KeyNotFound { key, path } => {
                assert_eq!("absent", key);
                assert_eq!(before, path);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(&before, container.coding_path());
        assert_eq!(1, container.decode::<u32>("present")?);
        Ok(())
    })
}

#[test]
fn unkeyed_read_at_end() -> Result<()> {
    let runtime = Runtime::default();
    runtime.with(|cx| {
        let value = jsbridge::to_value(&cx, &[10, 20])?;

        let mut decoder = Decoder::new(&cx, value);
        let mut container = decoder.unkeyed_container()?;
        assert_eq!(10, container.decode::<u8>()?);
        assert_eq!(20, container.decode::<u8>()?);
        assert!(container.is_at_end());

        let err = container.decode::<u8>().unwrap_err();
        assert!(matches!(err, Error::ValueNotFound { .. }), "{err}");
        assert_eq!(Some("$[2]"), err.path().map(ToString::to_string).as_deref());
        assert_eq!(2, container.current_index());
        Ok(())
    })
}

#[test]
fn string_is_not_a_number() {
    let runtime = Runtime::default();
    let err = runtime.with(|cx| {
        let value = cx.value_from_str("42").unwrap();
        jsbridge::from_value::<f64>(&cx, &value).unwrap_err()
    });
    match err {
        Error::TypeMismatch {
            expected, actual, ..
        } => {
            assert_eq!("f64", expected);
            assert_eq!("string", actual);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_capabilities_are_reported_with_a_path() {
    #[derive(Serialize)]
    struct Upload {
        name: String,
        data: Bytes,
    }

    let mut config = Config::default();
    config.array_buffer(false);
    let runtime = Runtime::new(config).unwrap();

    let upload = Upload {
        name: "a".to_string(),
        data: Bytes::from(vec![1, 2, 3]),
    };
    let err = runtime.with(|cx| jsbridge::to_value(&cx, &upload).unwrap_err());
    assert!(matches!(err, Error::CapabilityUnavailable { .. }), "{err}");
    assert_eq!(
        "ArrayBuffer values are not supported by this context at $.data",
        err.to_string()
    );
}

#[test]
fn lossy_numbers_truncate() {
    let mut config = Config::default();
    config.lossy_numbers(true);
    let lossy = Runtime::new(config).unwrap();
    let strict = Runtime::default();

    let truncated = lossy.with(|cx| {
        let value = cx.value_from_f64(300.7);
        jsbridge::from_value::<u8>(&cx, &value).unwrap()
    });
    assert_eq!(255u8, truncated);
    let rejected = strict.with(|cx| {
        let value = cx.value_from_f64(300.7);
        jsbridge::from_value::<u8>(&cx, &value).unwrap_err()
    });
    assert!(matches!(rejected, Error::DataCorrupted { .. }));
}

struct Animal {
    legs: u32,
}

struct Dog {
    animal: Animal,
    name: String,
}

impl Encode for Animal {
    fn encode(&self, encoder: &mut Encoder<'_>) -> jsbridge::serde::Result<()> {
        encoder.keyed_container()?.encode("legs", &self.legs)
    }
}

impl Decode for Animal {
    fn decode(decoder: &mut Decoder<'_>) -> jsbridge::serde::Result<Self> {
        let mut container = decoder.keyed_container()?;
        Ok(Animal {
            legs: container.decode("legs")?,
        })
    }
}

impl Encode for Dog {
    fn encode(&self, encoder: &mut Encoder<'_>) -> jsbridge::serde::Result<()> {
        let mut container = encoder.keyed_container()?;
        container.encode("name", &self.name)?;
        // Left to the drop of the referencing encoder.
        let mut parent = container.super_encoder_for_key("animal");
        self.animal.encode(&mut parent)
    }
}

impl Decode for Dog {
    fn decode(decoder: &mut Decoder<'_>) -> jsbridge::serde::Result<Self> {
        let mut container = decoder.keyed_container()?;
        let mut parent = container.super_decoder_for_key("animal")?;
        let animal = Animal::decode(&mut parent)?;
        Ok(Dog {
            animal,
            name: container.decode("name")?,
        })
    }
}

#[test]
fn super_encoders_write_into_their_slot() {
    let runtime = Runtime::default();
    let dog = Dog {
        animal: Animal { legs: 4 },
        name: "rex".to_string(),
    };

    let back: Dog = runtime.with(|cx| {
        let value = Encoder::new(&cx).encode_custom(&dog).unwrap();
        let legs = value.get_property("animal").unwrap().get_property("legs").unwrap();
        assert_eq!(Some(4.0), legs.as_f64());
        Decoder::new(&cx, value).decode_custom().unwrap()
    });
    assert_eq!(4, back.animal.legs);
    assert_eq!("rex", back.name);
}

const DOCUMENT: &str =
    r#"{"list":[1,-2,3.5,"four",null,{"nested":[true]}],"empty":{},"none":[]}"#;

#[cfg(feature = "json")]
#[test]
fn json_preserves_structure() -> Result<()> {
    let runtime = Runtime::default();
    let json = runtime.with(|cx| {
        let value = jsbridge::json::parse(&cx, &mut DOCUMENT.as_bytes().to_vec())?;
        jsbridge::json::stringify(&cx, value)
    })?;
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(DOCUMENT)?,
        serde_json::from_slice::<serde_json::Value>(&json)?
    );
    Ok(())
}

#[cfg(all(feature = "json", feature = "messagepack"))]
#[test]
fn messagepack_preserves_structure() -> Result<()> {
    let runtime = Runtime::default();
    let text = DOCUMENT;

    let json = runtime.with(|cx| {
        let value = jsbridge::json::parse(&cx, &mut text.as_bytes().to_vec())?;
        let packed = jsbridge::messagepack::transcode_output(&cx, value)?;
        let unpacked = jsbridge::messagepack::transcode_input(&cx, &packed)?;
        jsbridge::json::stringify(&cx, unpacked)
    })?;
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(text)?,
        serde_json::from_slice::<serde_json::Value>(&json)?
    );
    Ok(())
}

quickcheck! {
    fn strings_and_numbers(name: String, count: u32, ratio: f32) -> quickcheck::TestResult {
        if ratio.is_nan() {
            return quickcheck::TestResult::discard();
        }

        let runtime = Runtime::default();
        let expected = (name, count, ratio);
        quickcheck::TestResult::from_bool(expected == roundtrip(&runtime, &expected))
    }

    fn optional_values(values: Vec<Option<i16>>) -> bool {
        let runtime = Runtime::default();
        values == roundtrip(&runtime, &values)
    }

    fn maps_of_lists(map: BTreeMap<String, Vec<bool>>) -> bool {
        let runtime = Runtime::default();
        map == roundtrip(&runtime, &map)
    }
}
