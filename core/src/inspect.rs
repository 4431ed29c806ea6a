//! Shallow questions asked of a `Serialize` value before it is encoded.
//!
//! # Design
//! Both checks are small serializers that produce nothing. `is_absent` looks
//! only at the outermost shape and stops at the first non-wrapper.
//! `ensure_finite` walks the whole value, because `serde_json` would otherwise
//! write NaN and infinities as `null` without complaint.

use serde::ser::{self, Impossible, Serialize};
use thiserror::Error;

/// `None`, `()`, unit structs and wrappers around them count as "nothing
/// supplied". Anything else, including non-finite floats, is present.
pub(crate) fn is_absent<T: Serialize + ?Sized>(value: &T) -> bool {
    matches!(value.serialize(Absence), Ok(true))
}

/// Fail on the first NaN or infinite float anywhere inside `value`.
pub(crate) fn ensure_finite<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    value.serialize(Finite)
}

#[derive(Debug, Error)]
#[error("value is present")]
struct Present;

impl ser::Error for Present {
    fn custom<T: std::fmt::Display>(_msg: T) -> Self {
        Present
    }
}

struct Absence;

impl ser::Serializer for Absence {
    type Ok = bool;
    type Error = Present;
    type SerializeSeq = Impossible<bool, Present>;
    type SerializeTuple = Impossible<bool, Present>;
    type SerializeTupleStruct = Impossible<bool, Present>;
    type SerializeTupleVariant = Impossible<bool, Present>;
    type SerializeMap = Impossible<bool, Present>;
    type SerializeStruct = Impossible<bool, Present>;
    type SerializeStructVariant = Impossible<bool, Present>;

    fn serialize_none(self) -> Result<bool, Present> {
        Ok(true)
    }

    fn serialize_unit(self) -> Result<bool, Present> {
        Ok(true)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<bool, Present> {
        Ok(true)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<bool, Present> {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<bool, Present> {
        value.serialize(self)
    }

    fn serialize_bool(self, _v: bool) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i8(self, _v: i8) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i16(self, _v: i16) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i32(self, _v: i32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i64(self, _v: i64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i128(self, _v: i128) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u8(self, _v: u8) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u16(self, _v: u16) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u32(self, _v: u32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u64(self, _v: u64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u128(self, _v: u128) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_f32(self, _v: f32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_f64(self, _v: f64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_char(self, _v: char) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_str(self, _v: &str) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<bool, Present> {
        Ok(false)
    }

    // Compound values are present whatever they hold.

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Present> {
        Err(Present)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Present> {
        Err(Present)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Present> {
        Err(Present)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Present> {
        Err(Present)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Present> {
        Err(Present)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Present> {
        Err(Present)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Present> {
        Err(Present)
    }
}

#[derive(Clone, Copy)]
struct Finite;

fn non_finite() -> Result<(), serde_json::Error> {
    Err(ser::Error::custom("NaN and infinite floats cannot be encoded as JSON"))
}

impl ser::Serializer for Finite {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_f32(self, v: f32) -> Result<(), serde_json::Error> {
        if v.is_finite() { Ok(()) } else { non_finite() }
    }

    fn serialize_f64(self, v: f64) -> Result<(), serde_json::Error> {
        if v.is_finite() { Ok(()) } else { non_finite() }
    }

    fn serialize_bool(self, _v: bool) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_char(self, _v: char) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_none(self) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
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

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }
}

impl ser::SerializeSeq for Finite {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeTuple for Finite {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for Finite {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for Finite {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeMap for Finite {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), serde_json::Error> {
        key.serialize(*self)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

impl ser::SerializeStruct for Finite {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
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

impl ser::SerializeStructVariant for Finite {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
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
