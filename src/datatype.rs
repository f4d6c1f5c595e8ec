//! Transportable element types and record layouts.
//!
//! This module provides the [`Datatype`] trait, which marks the element types
//! the collective layer can move between ranks, the [`Reducible`] trait for
//! element types that support [`ReduceOp`], and [`StructType`], the committed
//! layout of a fixed-size record type.
//!
//! # Supported Types
//!
//! | Rust Type | Tag                    | Reducible |
//! |-----------|------------------------|-----------|
//! | `f32`     | [`DatatypeTag::F32`]    | yes       |
//! | `f64`     | [`DatatypeTag::F64`]    | yes       |
//! | `i32`     | [`DatatypeTag::I32`]    | yes       |
//! | `i64`     | [`DatatypeTag::I64`]    | yes       |
//! | `u8`      | [`DatatypeTag::U8`]     | yes       |
//! | `u32`     | [`DatatypeTag::U32`]    | yes       |
//! | `u64`     | [`DatatypeTag::U64`]    | yes       |
//! | records   | [`DatatypeTag::Record`] | no        |

use crate::error::{Error, Result};
use crate::ReduceOp;

/// Seals [`Reducible`] against external implementations.
mod sealed {
    pub trait Sealed {}
}

/// Tag identifying the element type of a collective buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatatypeTag {
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
    /// Fixed-layout record; the name identifies the record type
    Record(&'static str),
}

/// Trait for types that can be used in collective operations.
///
/// Values are moved between ranks by copy, so implementors must be plain
/// `Copy` data. Record types implement this with [`DatatypeTag::Record`] and
/// additionally implement [`Record`] to describe their layout.
pub trait Datatype: Copy + Send + Sync + 'static {
    /// The datatype tag checked by peers in the same collective round.
    const TAG: DatatypeTag;
}

/// Element types that can be combined with a [`ReduceOp`].
///
/// This is a **sealed trait**: only the primitive numeric types implement it.
pub trait Reducible: Datatype + sealed::Sealed {
    /// Combine two values with `op`.
    fn combine(self, other: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_int_datatype {
    ($ty:ty, $tag:expr) => {
        impl sealed::Sealed for $ty {}
        impl Datatype for $ty {
            const TAG: DatatypeTag = $tag;
        }
        impl Reducible for $ty {
            fn combine(self, other: Self, op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => self.wrapping_add(other),
                    ReduceOp::Prod => self.wrapping_mul(other),
                    ReduceOp::Min => self.min(other),
                    ReduceOp::Max => self.max(other),
                }
            }
        }
    };
}

macro_rules! impl_float_datatype {
    ($ty:ty, $tag:expr) => {
        impl sealed::Sealed for $ty {}
        impl Datatype for $ty {
            const TAG: DatatypeTag = $tag;
        }
        impl Reducible for $ty {
            fn combine(self, other: Self, op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => self + other,
                    ReduceOp::Prod => self * other,
                    ReduceOp::Min => self.min(other),
                    ReduceOp::Max => self.max(other),
                }
            }
        }
    };
}

impl_float_datatype!(f32, DatatypeTag::F32);
impl_float_datatype!(f64, DatatypeTag::F64);
impl_int_datatype!(i32, DatatypeTag::I32);
impl_int_datatype!(i64, DatatypeTag::I64);
impl_int_datatype!(u8, DatatypeTag::U8);
impl_int_datatype!(u32, DatatypeTag::U32);
impl_int_datatype!(u64, DatatypeTag::U64);

/// One field of a record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name, used in error messages
    pub name: &'static str,
    /// Byte offset from the start of the record
    pub offset: usize,
    /// Size of the field in bytes
    pub size: usize,
}

impl Field {
    /// Describe a field of type `T` at `offset`.
    pub fn of<T>(name: &'static str, offset: usize) -> Self {
        Field {
            name,
            offset,
            size: std::mem::size_of::<T>(),
        }
    }
}

/// A committed record layout.
///
/// Committing checks that every field lies inside the record and that no two
/// fields share bytes, so a layout that assigns two fields the same offset is
/// rejected instead of silently corrupting transported records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    name: &'static str,
    size: usize,
    fields: Vec<Field>,
}

impl StructType {
    /// Validate and commit a layout of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayout`] if there are no fields, a field has
    /// zero size, a field extends past `size`, or two fields overlap.
    pub fn commit(name: &'static str, size: usize, fields: Vec<Field>) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidLayout {
            record: name,
            reason,
        };

        if fields.is_empty() {
            return Err(invalid("no fields".into()));
        }

        for field in &fields {
            if field.size == 0 {
                return Err(invalid(format!("field `{}` has zero size", field.name)));
            }
            if field.offset + field.size > size {
                return Err(invalid(format!(
                    "field `{}` at offset {} ({} bytes) exceeds record size {size}",
                    field.name, field.offset, field.size
                )));
            }
        }

        let mut sorted: Vec<&Field> = fields.iter().collect();
        sorted.sort_by_key(|f| f.offset);
        for pair in sorted.windows(2) {
            if pair[0].offset + pair[0].size > pair[1].offset {
                return Err(invalid(format!(
                    "fields `{}` and `{}` overlap at offset {}",
                    pair[0].name, pair[1].name, pair[1].offset
                )));
            }
        }

        Ok(StructType { name, size, fields })
    }

    /// Record type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Record size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// A fixed-layout record that can be moved as a single unit.
pub trait Record: Datatype {
    /// Record type name.
    const NAME: &'static str;

    /// Field layout in declaration order.
    fn fields() -> Vec<Field>;

    /// Commit the layout of this record type.
    fn struct_type() -> Result<StructType> {
        StructType::commit(Self::NAME, std::mem::size_of::<Self>(), Self::fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Debug, Clone, Copy)]
    struct Triple {
        a: i32,
        b: i32,
        c: i32,
    }

    #[test]
    fn reduce_ops_on_integers() {
        assert_eq!(3i32.combine(4, ReduceOp::Sum), 7);
        assert_eq!(3i32.combine(4, ReduceOp::Prod), 12);
        assert_eq!(3i32.combine(-4, ReduceOp::Min), -4);
        assert_eq!(3i32.combine(-4, ReduceOp::Max), 3);
        assert_eq!(u8::MAX.combine(1, ReduceOp::Sum), 0);
    }

    #[test]
    fn reduce_ops_on_floats() {
        assert!((1.5f64.combine(2.0, ReduceOp::Sum) - 3.5).abs() < f64::EPSILON);
        assert!((1.5f32.combine(2.0, ReduceOp::Max) - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn primitive_tags() {
        assert_eq!(i32::TAG, DatatypeTag::I32);
        assert_eq!(f64::TAG, DatatypeTag::F64);
        assert_ne!(u32::TAG, u64::TAG);
    }

    #[test]
    fn commit_accepts_packed_layout() {
        let layout = StructType::commit(
            "Triple",
            std::mem::size_of::<Triple>(),
            vec![
                Field::of::<i32>("a", std::mem::offset_of!(Triple, a)),
                Field::of::<i32>("b", std::mem::offset_of!(Triple, b)),
                Field::of::<i32>("c", std::mem::offset_of!(Triple, c)),
            ],
        )
        .unwrap();
        assert_eq!(layout.size(), 12);
        assert_eq!(layout.fields().len(), 3);
        assert_eq!(layout.name(), "Triple");
    }

    #[test]
    fn commit_rejects_shared_offset() {
        // The third field reuses the first field's slot.
        let err = StructType::commit(
            "Triple",
            12,
            vec![
                Field::of::<i32>("a", 8),
                Field::of::<i32>("b", 4),
                Field::of::<i32>("c", 8),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidLayout { record: "Triple", .. }));
    }

    #[test]
    fn commit_rejects_out_of_bounds_and_empty() {
        assert!(StructType::commit("T", 8, vec![Field::of::<i64>("x", 4)]).is_err());
        assert!(StructType::commit("T", 8, Vec::new()).is_err());
        assert!(StructType::commit("T", 8, vec![Field::of::<()>("unit", 0)]).is_err());
    }
}
