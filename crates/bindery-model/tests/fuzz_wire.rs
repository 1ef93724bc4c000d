// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use bindery_model::wire::{Reader, WireError, Writer};
use bindery_model::{QName, Value};
use bytes::Bytes;
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Empty),
        any::<bool>().prop_map(Value::Boolean),
        any::<i8>().prop_map(Value::Int8),
        any::<i64>().prop_map(Value::Int64),
        any::<u16>().prop_map(Value::Uint16),
        any::<u64>().prop_map(Value::Uint64),
        ".{0,16}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(|b| Value::Binary(Bytes::from(b))),
        prop_oneof![Just("alpha"), Just("beta"), Just("gamma")]
            .prop_map(|local| Value::QName(QName::new("urn:bindery:ids", local))),
    ]
}

proptest! {
    #[test]
    fn fuzz_read_value_no_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut reader = Reader::new(&bytes);
        while reader.remaining() > 0 {
            if reader.read_value().is_err() {
                break;
            }
        }
    }

    #[test]
    fn value_streams_share_one_qname_dictionary(values in prop::collection::vec(value_strategy(), 0..12)) {
        let mut writer = Writer::default();
        for value in &values {
            writer.write_value(value).unwrap();
        }
        let bytes = writer.into_vec();
        let mut reader = Reader::new(&bytes);
        for value in &values {
            prop_assert_eq!(&reader.read_value().unwrap(), value);
        }
        prop_assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn unsigned_order_is_never_reinterpreted(a in any::<u64>(), b in any::<u64>()) {
        prop_assert_eq!(Value::Uint64(a).compare_natural(&Value::Uint64(b)), Some(a.cmp(&b)));
    }
}

#[test]
fn bounded_reader_refuses_long_strings() {
    let mut writer = Writer::default();
    writer.write_value(&Value::String("x".repeat(64))).unwrap();
    let bytes = writer.into_vec();
    let err = Reader::with_max_len(&bytes, 16).read_value().unwrap_err();
    assert_eq!(err, WireError::LengthTooLarge { len: 64, max: 16 });
}

#[test]
fn back_reference_before_definition_is_dangling() {
    let mut writer = Writer::default();
    let q = QName::new("urn:bindery:ids", "alpha");
    writer.write_value(&Value::QName(q.clone())).unwrap();
    writer.write_value(&Value::QName(q)).unwrap();
    let bytes = writer.into_vec();
    // Skip the defining occurrence and read the back-reference alone.
    let mut first = Reader::new(&bytes);
    first.read_value().unwrap();
    let consumed = bytes.len() - first.remaining();
    let err = Reader::new(&bytes[consumed..]).read_value().unwrap_err();
    assert_eq!(err, WireError::DanglingReference(0));
}
