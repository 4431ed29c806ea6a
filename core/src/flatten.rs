//! Flattening of nested serializable values into `(key, value)` string pairs.
//!
//! # Design
//! `Flattener` is a `serde::Serializer`, so the set of shapes it understands is
//! the serde data model rather than runtime reflection:
//!
//! | shape                         | key produced         | empty key |
//! |-------------------------------|----------------------|-----------|
//! | string, char, bytes, scalar   | `prefix`             | error     |
//! | sequence, tuple               | `prefix[i]`          | error     |
//! | map (string keys only)        | `prefix.key` / `key` | allowed   |
//! | struct (declared field order) | `prefix.field`       | allowed   |
//! | `None`, unit                  | nothing emitted      | allowed   |
//! | `Some(v)`, newtype struct     | `prefix` (unchanged) | allowed   |
//!
//! Field renames come from `#[serde(rename = "...")]`. Every nested call
//! consumes one level of the depth budget; running out fails the whole
//! traversal with `FlattenError::TooComplex`. Cycles are only caught by that
//! budget.
//!
//! Byte sequences are values serialized through `serialize_bytes`, such as
//! [`Bytes`]. A plain `Vec<u8>` goes through serde as a sequence of numbers.
//! Byte values must be valid UTF-8, since every emitted value is a `String`.

use std::fmt::Display;

use serde::ser::{self, Impossible, Serialize};
use thiserror::Error;

/// A sink for flattened pairs.
pub trait FlattenTarget {
    fn add(&mut self, key: String, value: String);
}

impl FlattenTarget for Vec<(String, String)> {
    fn add(&mut self, key: String, value: String) {
        self.push((key, value));
    }
}

/// Reasons a value cannot be flattened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlattenError {
    /// A scalar, byte sequence or sequence appeared where no key exists yet.
    #[error("a bare {shape} cannot be flattened without a key")]
    MissingKey { shape: &'static str },

    #[error("map keys must be strings")]
    NonStringKey,

    /// Byte sequences become string values, so they must be valid UTF-8.
    #[error("byte sequence at {key:?} is not valid UTF-8")]
    InvalidUtf8 { key: String },

    #[error("value nested deeper than {limit} levels")]
    TooComplex { limit: usize },

    /// Raised by a `Serialize` impl through `serde::ser::Error::custom`.
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for FlattenError {
    fn custom<T: Display>(msg: T) -> Self {
        FlattenError::Custom(msg.to_string())
    }
}

/// Flatten `value` into `target`, allowing at most `max_depth` nested levels.
pub fn flatten<T, S>(value: &T, target: &mut S, max_depth: usize) -> Result<(), FlattenError>
where
    T: Serialize + ?Sized,
    S: FlattenTarget + ?Sized,
{
    value.serialize(Flattener {
        target,
        key: String::new(),
        remaining: max_depth,
        limit: max_depth,
    })
}

/// Wraps a byte buffer so it serializes as a byte sequence instead of a
/// sequence of numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytes<T>(pub T);

impl<T: AsRef<[u8]>> Serialize for Bytes<T> {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0.as_ref())
    }
}

struct Flattener<'a, S: ?Sized> {
    target: &'a mut S,
    key: String,
    remaining: usize,
    limit: usize,
}

impl<'a, S: FlattenTarget + ?Sized> Flattener<'a, S> {
    fn descend(&mut self) -> Result<(), FlattenError> {
        if self.remaining == 0 {
            return Err(FlattenError::TooComplex { limit: self.limit });
        }
        self.remaining -= 1;
        Ok(())
    }

    fn leaf(&mut self, shape: &'static str) -> Result<(), FlattenError> {
        self.descend()?;
        if self.key.is_empty() {
            return Err(FlattenError::MissingKey { shape });
        }
        Ok(())
    }

    fn emit(mut self, shape: &'static str, value: String) -> Result<(), FlattenError> {
        self.leaf(shape)?;
        self.target.add(self.key, value);
        Ok(())
    }

    fn scalar<V: ToString>(self, value: V) -> Result<(), FlattenError> {
        self.emit("scalar", value.to_string())
    }

    fn child(&mut self, key: String) -> Flattener<'_, S> {
        Flattener {
            target: &mut *self.target,
            key,
            remaining: self.remaining,
            limit: self.limit,
        }
    }

    fn join(&self, name: &str) -> String {
        if self.key.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.key)
        }
    }

    fn sequence(mut self) -> Result<SeqFlattener<'a, S>, FlattenError> {
        self.descend()?;
        if self.key.is_empty() {
            return Err(FlattenError::MissingKey { shape: "sequence" });
        }
        Ok(SeqFlattener {
            parent: self,
            index: 0,
        })
    }

    fn nested(mut self, variant: &str) -> Result<Self, FlattenError> {
        self.descend()?;
        self.key = self.join(variant);
        Ok(self)
    }
}

impl<'a, S: FlattenTarget + ?Sized> ser::Serializer for Flattener<'a, S> {
    type Ok = ();
    type Error = FlattenError;
    type SerializeSeq = SeqFlattener<'a, S>;
    type SerializeTuple = SeqFlattener<'a, S>;
    type SerializeTupleStruct = SeqFlattener<'a, S>;
    type SerializeTupleVariant = SeqFlattener<'a, S>;
    type SerializeMap = MapFlattener<'a, S>;
    type SerializeStruct = StructFlattener<'a, S>;
    type SerializeStructVariant = StructFlattener<'a, S>;

    fn serialize_bool(self, v: bool) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_i8(self, v: i8) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_i16(self, v: i16) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_i32(self, v: i32) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_i64(self, v: i64) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_i128(self, v: i128) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_u8(self, v: u8) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_u16(self, v: u16) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_u32(self, v: u32) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_u64(self, v: u64) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_u128(self, v: u128) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_f32(self, v: f32) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_f64(self, v: f64) -> Result<(), FlattenError> {
        self.scalar(v)
    }

    fn serialize_char(self, v: char) -> Result<(), FlattenError> {
        self.emit("string", v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<(), FlattenError> {
        self.emit("string", v.to_owned())
    }

    fn serialize_bytes(mut self, v: &[u8]) -> Result<(), FlattenError> {
        self.leaf("byte sequence")?;
        match String::from_utf8(v.to_vec()) {
            Ok(value) => {
                self.target.add(self.key, value);
                Ok(())
            }
            Err(_) => Err(FlattenError::InvalidUtf8 { key: self.key }),
        }
    }

    fn serialize_none(mut self) -> Result<(), FlattenError> {
        self.descend()
    }

    fn serialize_some<T: Serialize + ?Sized>(mut self, value: &T) -> Result<(), FlattenError> {
        self.descend()?;
        value.serialize(self)
    }

    fn serialize_unit(mut self) -> Result<(), FlattenError> {
        self.descend()
    }

    fn serialize_unit_struct(mut self, _name: &'static str) -> Result<(), FlattenError> {
        self.descend()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), FlattenError> {
        self.emit("string", variant.to_owned())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        mut self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        self.descend()?;
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        value.serialize(self.nested(variant)?)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, FlattenError> {
        self.sequence()
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, FlattenError> {
        self.sequence()
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, FlattenError> {
        self.sequence()
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, FlattenError> {
        Ok(SeqFlattener {
            parent: self.nested(variant)?,
            index: 0,
        })
    }

    fn serialize_map(mut self, _len: Option<usize>) -> Result<Self::SerializeMap, FlattenError> {
        self.descend()?;
        Ok(MapFlattener {
            parent: self,
            pending: None,
        })
    }

    fn serialize_struct(
        mut self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, FlattenError> {
        self.descend()?;
        Ok(StructFlattener { parent: self })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, FlattenError> {
        Ok(StructFlattener {
            parent: self.nested(variant)?,
        })
    }
}

struct SeqFlattener<'a, S: ?Sized> {
    parent: Flattener<'a, S>,
    index: usize,
}

impl<S: FlattenTarget + ?Sized> SeqFlattener<'_, S> {
    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        let key = format!("{}[{}]", self.parent.key, self.index);
        self.index += 1;
        value.serialize(self.parent.child(key))
    }
}

impl<S: FlattenTarget + ?Sized> ser::SerializeSeq for SeqFlattener<'_, S> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        self.element(value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

impl<S: FlattenTarget + ?Sized> ser::SerializeTuple for SeqFlattener<'_, S> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        self.element(value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

impl<S: FlattenTarget + ?Sized> ser::SerializeTupleStruct for SeqFlattener<'_, S> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        self.element(value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

impl<S: FlattenTarget + ?Sized> ser::SerializeTupleVariant for SeqFlattener<'_, S> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        self.element(value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

struct MapFlattener<'a, S: ?Sized> {
    parent: Flattener<'a, S>,
    pending: Option<String>,
}

impl<S: FlattenTarget + ?Sized> ser::SerializeMap for MapFlattener<'_, S> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), FlattenError> {
        self.pending = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        let name = self
            .pending
            .take()
            .ok_or_else(|| FlattenError::Custom("map value without a key".to_string()))?;
        let key = self.parent.join(&name);
        value.serialize(self.parent.child(key))
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

struct StructFlattener<'a, S: ?Sized> {
    parent: Flattener<'a, S>,
}

impl<S: FlattenTarget + ?Sized> StructFlattener<'_, S> {
    fn field<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), FlattenError> {
        let key = self.parent.join(name);
        value.serialize(self.parent.child(key))
    }
}

impl<S: FlattenTarget + ?Sized> ser::SerializeStruct for StructFlattener<'_, S> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

impl<S: FlattenTarget + ?Sized> ser::SerializeStructVariant for StructFlattener<'_, S> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

/// Accepts string map keys (directly, through a newtype, or as a unit enum
/// variant) and rejects everything else.
struct KeySerializer;

fn non_string<T>() -> Result<T, FlattenError> {
    Err(FlattenError::NonStringKey)
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = FlattenError;
    type SerializeSeq = Impossible<String, FlattenError>;
    type SerializeTuple = Impossible<String, FlattenError>;
    type SerializeTupleStruct = Impossible<String, FlattenError>;
    type SerializeTupleVariant = Impossible<String, FlattenError>;
    type SerializeMap = Impossible<String, FlattenError>;
    type SerializeStruct = Impossible<String, FlattenError>;
    type SerializeStructVariant = Impossible<String, FlattenError>;

    fn serialize_str(self, v: &str) -> Result<String, FlattenError> {
        Ok(v.to_owned())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, FlattenError> {
        value.serialize(self)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, FlattenError> {
        Ok(variant.to_owned())
    }

    fn serialize_bool(self, _v: bool) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_i8(self, _v: i8) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_i16(self, _v: i16) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_i32(self, _v: i32) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_i64(self, _v: i64) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_i128(self, _v: i128) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_u8(self, _v: u8) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_u16(self, _v: u16) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_u32(self, _v: u32) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_u64(self, _v: u64) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_u128(self, _v: u128) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_f32(self, _v: f32) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_f64(self, _v: f64) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_char(self, _v: char) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_none(self) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _value: &T) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_unit(self) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, FlattenError> {
        non_string()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, FlattenError> {
        non_string()
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, FlattenError> {
        non_string()
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, FlattenError> {
        non_string()
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, FlattenError> {
        non_string()
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, FlattenError> {
        non_string()
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, FlattenError> {
        non_string()
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, FlattenError> {
        non_string()
    }
}
