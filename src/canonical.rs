//! Deterministic JSON encoding of request bodies.
//!
//! Output rules:
//! - object keys sorted by byte order, at every depth
//! - arrays keep their order
//! - `,` and `:` separators, no whitespace
//! - scalars encoded the way `serde_json` encodes them
//!
//! A top-level `null` (including `Option::None`) encodes as `{}`.

use std::collections::BTreeMap;

use serde::ser::{self, Serialize};
use serde_json::value::RawValue;

use crate::error::SerializationError;

/// Canonical JSON string for `body`.
///
/// Fails without producing output if the body holds a non-finite float, a
/// map with non-string keys, or a `Serialize` impl that errors.
pub fn canonicalize<T>(body: &T) -> Result<String, SerializationError>
where
    T: Serialize + ?Sized,
{
    // serde_json silently maps NaN/inf to null, so reject them up front.
    body.serialize(FiniteGuard)?;

    // Reorder serde_json's own compact text; scalar tokens are copied
    // verbatim so f32 and 128-bit integers keep their encoding.
    let text = serde_json::to_string(body)?;
    let raw: &RawValue = serde_json::from_str(&text)?;

    let mut out = String::with_capacity(text.len());
    if raw.get() == "null" {
        out.push_str("{}");
    } else {
        write_raw(raw, &mut out)?;
    }
    Ok(out)
}

fn write_raw(raw: &RawValue, out: &mut String) -> Result<(), SerializationError> {
    let text = raw.get();
    match text.as_bytes().first() {
        Some(b'{') => {
            let entries: BTreeMap<String, &RawValue> = serde_json::from_str(text)?;

            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_raw(item, out)?;
            }
            out.push('}');
        }
        Some(b'[') => {
            let items: Vec<&RawValue> = serde_json::from_str(text)?;

            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_raw(item, out)?;
            }
            out.push(']');
        }
        _ => out.push_str(text),
    }
    Ok(())
}

/// Walks a value and fails on the first non-finite float.
#[derive(Clone, Copy)]
struct FiniteGuard;

impl FiniteGuard {
    fn check(v: f64) -> Result<(), serde_json::Error> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(ser::Error::custom(format!("non-finite number {}", v)))
        }
    }
}

macro_rules! accept {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<(), serde_json::Error> {
                Ok(())
            }
        )*
    };
}

impl ser::Serializer for FiniteGuard {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8],
        serialize_unit_struct: &'static str,
    }

    fn serialize_f32(self, v: f32) -> Result<(), serde_json::Error> {
        Self::check(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), serde_json::Error> {
        Self::check(v)
    }

    fn serialize_none(self) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteGuard {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteGuard {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteGuard {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteGuard {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteGuard {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), serde_json::Error> {
        key.serialize(*self)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteGuard {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteGuard {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::{json, Value};
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn sorts_keys_without_whitespace() {
        let body = json!({"b": 2, "a": 1});
        assert_eq!(canonicalize(&body).unwrap(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn sorts_nested_objects_and_keeps_array_order() {
        let body = json!({
            "z": [3, 1, {"y": true, "x": null}],
            "a": {"d": "four", "c": 3.5},
        });
        assert_eq!(
            canonicalize(&body).unwrap(),
            r#"{"a":{"c":3.5,"d":"four"},"z":[3,1,{"x":null,"y":true}]}"#
        );
    }

    #[test]
    fn struct_field_order_does_not_matter() {
        #[derive(Serialize)]
        struct Booking {
            user_id: &'static str,
            action: &'static str,
        }

        let from_struct = canonicalize(&Booking { user_id: "12345", action: "create_booking" }).unwrap();
        let from_json = canonicalize(&json!({"action": "create_booking", "user_id": "12345"})).unwrap();
        assert_eq!(from_struct, from_json);
    }

    #[test]
    fn hash_map_iteration_order_does_not_leak() {
        let mut map = HashMap::new();
        for key in ["delta", "alpha", "charlie", "bravo"] {
            map.insert(key, key.len());
        }
        assert_eq!(
            canonicalize(&map).unwrap(),
            r#"{"alpha":5,"bravo":5,"charlie":7,"delta":5}"#
        );
    }

    #[test]
    fn null_body_is_empty_object() {
        assert_eq!(canonicalize(&Value::Null).unwrap(), "{}");
        assert_eq!(canonicalize(&None::<Value>).unwrap(), "{}");
        assert_eq!(canonicalize(&json!({"k": null})).unwrap(), r#"{"k":null}"#);
    }

    #[test]
    fn scalars_use_json_encoding() {
        assert_eq!(canonicalize(&json!("a\"b\n")).unwrap(), r#""a\"b\n""#);
        assert_eq!(canonicalize(&json!([true, false, -7, "é"])).unwrap(), r#"[true,false,-7,"é"]"#);
        assert_eq!(canonicalize(&json!([])).unwrap(), "[]");
        assert_eq!(canonicalize(&json!({})).unwrap(), "{}");
    }

    #[test]
    fn rejects_non_finite_numbers() {
        assert!(canonicalize(&f64::NAN).is_err());
        assert!(canonicalize(&vec![1.0, f64::INFINITY]).is_err());

        let mut nested = BTreeMap::new();
        nested.insert("ratio", f32::NEG_INFINITY);
        assert!(canonicalize(&nested).is_err());
    }

    #[test]
    fn f32_fields_keep_their_json_encoding() {
        #[derive(Serialize)]
        struct Reading {
            ratio: f32,
            label: &'static str,
        }

        let reading = Reading { ratio: 0.1, label: "x" };
        assert_eq!(canonicalize(&reading).unwrap(), r#"{"label":"x","ratio":0.1}"#);
        assert_eq!(
            canonicalize(&reading).unwrap(),
            canonicalize(&serde_json::from_str::<Value>(r#"{"ratio":0.1,"label":"x"}"#).unwrap()).unwrap()
        );
    }

    #[test]
    fn wide_integers_are_encoded_in_full() {
        assert_eq!(
            canonicalize(&(u64::MAX as u128 + 1)).unwrap(),
            "18446744073709551616"
        );

        let mut map = BTreeMap::new();
        map.insert("small", 1i128);
        map.insert("big", i128::MIN);
        assert_eq!(
            canonicalize(&map).unwrap(),
            r#"{"big":-170141183460469231731687303715884105728,"small":1}"#
        );
    }

    #[test]
    fn rejects_non_string_map_keys() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "value");
        assert!(canonicalize(&map).is_err());
    }
}
