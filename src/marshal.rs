//! JSON marshaling of logged values.
//!
//! `serde_json` quietly turns `NaN` and infinities into `null`. Values are
//! walked once with [`FiniteFloats`] first so such floats surface as a
//! marshal error instead.

use serde::ser::{self, Serialize};
use serde_json::Value;
use std::fmt;

/// Marshal `value`, rejecting floats JSON cannot represent.
pub(crate) fn to_value<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Value> {
    value
        .serialize(FiniteFloats)
        .map_err(<serde_json::Error as ser::Error>::custom)?;
    serde_json::to_value(value)
}

#[derive(Debug)]
pub(crate) struct Unsupported(String);

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Unsupported {}

impl ser::Error for Unsupported {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Unsupported(msg.to_string())
    }
}

fn check_float(v: f64) -> Result<(), Unsupported> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(Unsupported(format!("unsupported value: {}", v)))
    }
}

/// Serializer that produces nothing and fails on the first non-finite float.
struct FiniteFloats;

type Checked = Result<(), Unsupported>;

impl ser::Serializer for FiniteFloats {
    type Ok = ();
    type Error = Unsupported;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Checked {
        Ok(())
    }
    fn serialize_i8(self, _: i8) -> Checked {
        Ok(())
    }
    fn serialize_i16(self, _: i16) -> Checked {
        Ok(())
    }
    fn serialize_i32(self, _: i32) -> Checked {
        Ok(())
    }
    fn serialize_i64(self, _: i64) -> Checked {
        Ok(())
    }
    fn serialize_u8(self, _: u8) -> Checked {
        Ok(())
    }
    fn serialize_u16(self, _: u16) -> Checked {
        Ok(())
    }
    fn serialize_u32(self, _: u32) -> Checked {
        Ok(())
    }
    fn serialize_u64(self, _: u64) -> Checked {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Checked {
        check_float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Checked {
        check_float(v)
    }

    fn serialize_char(self, _: char) -> Checked {
        Ok(())
    }
    fn serialize_str(self, _: &str) -> Checked {
        Ok(())
    }
    fn serialize_bytes(self, _: &[u8]) -> Checked {
        Ok(())
    }
    fn serialize_none(self) -> Checked {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Checked {
        Ok(())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Checked {
        Ok(())
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
        Ok(())
    }

    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, Unsupported> {
        Ok(self)
    }
    fn serialize_tuple(self, _: usize) -> Result<Self, Unsupported> {
        Ok(self)
    }
    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, Unsupported> {
        Ok(self)
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, Unsupported> {
        Ok(self)
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self, Unsupported> {
        Ok(self)
    }
    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, Unsupported> {
        Ok(self)
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, Unsupported> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteFloats {
    type Ok = ();
    type Error = Unsupported;

    fn serialize_element<T>(&mut self, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteFloats {
    type Ok = ();
    type Error = Unsupported;

    fn serialize_element<T>(&mut self, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteFloats {
    type Ok = ();
    type Error = Unsupported;

    fn serialize_field<T>(&mut self, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteFloats {
    type Ok = ();
    type Error = Unsupported;

    fn serialize_field<T>(&mut self, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = Unsupported;

    fn serialize_key<T>(&mut self, key: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        key.serialize(FiniteFloats)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteFloats {
    type Ok = ();
    type Error = Unsupported;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteFloats {
    type Ok = ();
    type Error = Unsupported;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> Checked
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(serde::Serialize)]
    struct Reading {
        sensor: &'static str,
        samples: Vec<f32>,
    }

    #[test]
    fn finite_values_marshal_normally() {
        let reading = Reading {
            sensor: "a",
            samples: vec![1.5, -2.0],
        };
        assert_eq!(
            to_value(&reading).unwrap(),
            json!({"sensor": "a", "samples": [1.5, -2.0]})
        );
        assert_eq!(to_value(&None::<f64>).unwrap(), Value::Null);
    }

    #[test]
    fn nan_is_rejected() {
        let err = to_value(&f64::NAN).unwrap_err();
        assert_eq!(err.to_string(), "unsupported value: NaN");
    }

    #[test]
    fn nested_infinity_is_rejected() {
        let reading = Reading {
            sensor: "a",
            samples: vec![1.0, f32::INFINITY],
        };
        assert_eq!(to_value(&reading).unwrap_err().to_string(), "unsupported value: inf");

        let mut by_name = BTreeMap::new();
        by_name.insert("low", Some(f64::NEG_INFINITY));
        assert_eq!(to_value(&by_name).unwrap_err().to_string(), "unsupported value: -inf");
    }
}
