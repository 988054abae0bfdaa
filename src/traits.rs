//! Encoding-class classification and the registration traits.
//!
//! Every serializable type belongs to exactly one of six encoding classes
//! ([`Shape`]). The host registers a type by implementing one hook trait
//! ([`Serializable`], [`StructLike`], [`VectorLike`], [`DynamicSize`],
//! [`UnionLike`], or nothing beyond the built-in scalar impls) and wiring it
//! to the driver trait [`Flat`] with the matching `flat_*!` macro. Rust
//! coherence allows a single `Flat` impl per type, so a type claimed by two
//! classes fails to compile instead of corrupting messages at runtime.

use crate::error::Result;
use crate::layout::align_to_power_of_two;
use crate::read::{FieldCursor, LoadCx};
use crate::vtable::VTableCollector;
use crate::write::{Image, TableBuilder, Writer};

// ─────────────────────────────────────────────────────────────────────────────
// Shape: the six encoding classes
// ─────────────────────────────────────────────────────────────────────────────

/// Encoding class of a type. Exactly one applies per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Fixed-width little-endian primitive; stored inline.
    Scalar {
        /// Byte width; also the alignment (rounded to a power of two).
        size: usize,
    },
    /// Fixed composite of scalars; stored inline, no vtable, nothing optional.
    Struct {
        /// Total byte size, already right-aligned.
        size: usize,
        /// Max field alignment.
        align: usize,
    },
    /// Variable-layout composite with optional fields; stored behind a
    /// forward offset, begins with a signed 32-bit vtable backref.
    Table,
    /// Length-prefixed homogeneous sequence; stored behind a forward offset.
    Vector,
    /// Length-prefixed raw byte payload (strings, blobs); stored behind a
    /// forward offset.
    Bytes,
    /// Tagged choice among alternatives; occupies two table slots (one-byte
    /// tag, four-byte offset). Only valid as a table member.
    Union,
}

impl Shape {
    /// Bytes a value of this shape occupies in a table slot or vector
    /// element: the natural size for inline classes, four (an offset) for
    /// indirect ones. For unions this is the offset half; the tag slot is
    /// accounted separately by [`push_member_shape`].
    pub const fn stride(self) -> usize {
        match self {
            Shape::Scalar { size } => size,
            Shape::Struct { size, .. } => size,
            Shape::Table | Shape::Vector | Shape::Bytes | Shape::Union => 4,
        }
    }

    /// Alignment of a value of this shape within the buffer.
    pub const fn align(self) -> usize {
        match self {
            Shape::Scalar { size } => align_to_power_of_two(size),
            Shape::Struct { align, .. } => align,
            Shape::Table | Shape::Vector | Shape::Bytes | Shape::Union => 4,
        }
    }

    /// Whether values of this shape are stored behind a relative offset.
    pub const fn is_indirect(self) -> bool {
        matches!(self, Shape::Table | Shape::Vector | Shape::Bytes)
    }
}

/// Append the vtable slot shape(s) a member of type `T` contributes to its
/// containing table: one `(size, align)` pair for most classes, two for a
/// union (tag byte, then offset).
pub fn push_member_shape<T: Flat>(shapes: &mut Vec<(usize, usize)>) {
    match T::SHAPE {
        Shape::Union => {
            shapes.push((1, 1));
            shapes.push((4, 4));
        }
        shape => shapes.push((shape.stride(), shape.align())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flat: the driver trait
// ─────────────────────────────────────────────────────────────────────────────

/// Serialization driver. One impl per type; generated by the `flat_*!`
/// macros from the hook traits below (scalar impls are built in).
///
/// The borrow in `save_*` ties the writer to the value being saved:
/// [`DynamicSize::save`] may hand out borrowed byte blocks, and those must
/// stay alive until the buffer is materialized.
pub trait Flat: Sized + 'static {
    /// Encoding class of this type.
    const SHAPE: Shape;

    /// Record every vtable reachable from this type (its own, its members',
    /// vector elements', union alternatives' and their wrappers'). Type
    /// level; memoized per `TypeId`, so recursive types terminate.
    fn collect_vtables(_collector: &mut VTableCollector) {}

    /// Encode out of line and return the object's buffer position. Only
    /// indirect classes have an out-of-line form.
    fn save_object<'a>(&'a self, _writer: &mut Writer<'a>) -> Result<usize> {
        unreachable!("inline encoding class has no out-of-line form")
    }

    /// Decode from the object's address. Only indirect classes.
    fn load_object(&mut self, _cx: &LoadCx<'_>, _at: usize) -> Result<()> {
        unreachable!("inline encoding class has no out-of-line form")
    }

    /// Encode into a single slot (table field or vector element) at byte
    /// offset `at` of `image`: inline classes write their bytes, indirect
    /// classes write themselves out of line and leave a forward offset.
    fn save_slot<'a>(&'a self, writer: &mut Writer<'a>, image: &mut Image, at: usize) -> Result<()> {
        let pos = self.save_object(writer)?;
        image.offset_slot(at, pos);
        Ok(())
    }

    /// Decode from a single slot at buffer address `at`.
    fn load_slot(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
        let target = cx.follow_offset(at)?;
        self.load_object(cx, target)
    }

    /// Encode as a table member, consuming this type's vtable slot(s).
    /// The default takes one slot; unions override to take tag + offset.
    fn save_member<'a>(&'a self, writer: &mut Writer<'a>, table: &mut TableBuilder) -> Result<()> {
        let at = table.next_slot();
        self.save_slot(writer, table.image_mut(), at)
    }

    /// Decode as a table member, consuming this type's vtable slot(s).
    /// An absent field leaves `self` untouched.
    fn load_member(&mut self, cx: &LoadCx<'_>, fields: &mut FieldCursor<'_>) -> Result<()> {
        if let Some(at) = fields.next() {
            self.load_slot(cx, at)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Member visitors and the table hook
// ─────────────────────────────────────────────────────────────────────────────

/// Read-side visitor over a table's members, in declaration order.
pub trait MemberVisitor<'a> {
    fn field<T: Flat>(&mut self, member: &'a T) -> Result<()>;
}

/// Write-side visitor over a table's members, in declaration order.
pub trait MemberVisitorMut {
    fn field<T: Flat>(&mut self, member: &mut T) -> Result<()>;
}

/// Hook for the table class: visit every member, in declaration order, for
/// both directions. The two methods must list the same members in the same
/// order; round-trip tests catch divergence.
///
/// Table types additionally need `Default`: the vtable collector and the
/// vector/union loaders materialize scratch instances.
pub trait Serializable {
    fn members<'a, V: MemberVisitor<'a>>(&'a self, visitor: &mut V) -> Result<()>;
    fn members_mut<V: MemberVisitorMut>(&mut self, visitor: &mut V) -> Result<()>;
}

/// Collect the vtable slot shapes of every member of a table value.
pub(crate) fn member_shapes<T: Serializable + ?Sized>(value: &T) -> Vec<(usize, usize)> {
    struct ShapeVisitor {
        shapes: Vec<(usize, usize)>,
    }
    impl<'a> MemberVisitor<'a> for ShapeVisitor {
        fn field<F: Flat>(&mut self, _member: &'a F) -> Result<()> {
            push_member_shape::<F>(&mut self.shapes);
            Ok(())
        }
    }
    let mut visitor = ShapeVisitor { shapes: Vec::new() };
    // The visitor is infallible; a member list cannot error while only
    // recording shapes.
    let _ = value.members(&mut visitor);
    visitor.shapes
}

// ─────────────────────────────────────────────────────────────────────────────
// Remaining hooks: struct, vector, dynamic bytes, union
// ─────────────────────────────────────────────────────────────────────────────

/// Hook for the struct class: scalar field widths plus per-field byte
/// encode/decode. Field offsets and total size come from [`crate::layout`];
/// structs cannot nest, which this hook makes inexpressible (fields are
/// scalar widths only).
pub trait StructLike: Sized {
    /// Byte width of each scalar field, in declaration order.
    const FIELD_SIZES: &'static [usize];

    /// Write field `index` little-endian into `out` (exactly the field's
    /// width).
    fn save_field(&self, index: usize, out: &mut [u8]);

    /// Read field `index` from `input` (exactly the field's width).
    fn load_field(&mut self, index: usize, input: &[u8]);
}

/// Hook for the vector class: element type and the load-side operations
/// (bulk reserve, append, and an optional completion callback). Save-side
/// iteration lives in the type's `Flat` impl via
/// [`save_vector_with`](crate::write::save_vector_with).
pub trait VectorLike {
    type Value: Flat;

    fn len(&self) -> usize;

    /// Clear and reserve for `n` incoming elements.
    fn reserve(&mut self, n: usize);

    /// Append one decoded element.
    fn push(&mut self, value: Self::Value);

    /// Called once after the final element has been appended.
    fn done(&mut self) {}
}

/// Hook for the dynamic-bytes class (strings and opaque blobs).
pub trait DynamicSize {
    /// The payload as one or more contiguous byte blocks, in order. Blocks
    /// borrow from `self` and stay alive until the buffer is materialized;
    /// the writer's lifetime parameter enforces this.
    fn save(&self) -> Vec<&[u8]>;

    /// Rebuild the value from the raw payload.
    fn load(&mut self, bytes: &[u8]);
}

/// Hook for the union class: a tagged choice among up to 254 alternatives.
///
/// On the wire the tag is the declared index plus one; zero means empty and
/// 255 is reserved. Every alternative that is not itself a table is
/// transparently wrapped in a single-member table
/// ([`save_ensure_table`](crate::write::save_ensure_table) /
/// [`load_ensure_table`](crate::read::load_ensure_table)), so a union payload
/// is always reachable through one 32-bit offset.
pub trait UnionLike: Sized {
    /// Declared alternative count. At most 254.
    const ALTERNATIVES: usize;

    /// Declaration index of the active alternative.
    fn index(&self) -> u8;

    /// Whether the union is in its empty state (encoded as tag zero with no
    /// payload).
    fn is_empty(&self) -> bool;

    /// Put the union into its empty state (decoding a zero tag).
    fn set_empty(&mut self);

    /// Encode the active alternative (via
    /// [`save_ensure_table`](crate::write::save_ensure_table)) and return
    /// its position.
    fn save_alternative<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize>;

    /// Decode alternative `index` (0-based, already untagged) from the
    /// offset slot at `at` (via
    /// [`load_ensure_table`](crate::read::load_ensure_table)).
    fn load_alternative(&mut self, cx: &LoadCx<'_>, index: u8, at: usize) -> Result<()>;

    /// Record every alternative with
    /// [`VTableCollector::alternative`], which also interns the wrapper
    /// vtable for non-table alternatives.
    fn collect_alternatives(collector: &mut VTableCollector);
}

// ─────────────────────────────────────────────────────────────────────────────
// File identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// 32-bit message-type tag written into the envelope after the root offset.
pub type FileIdentifier = u32;

/// Attached at type-declaration time to every type usable as a message root.
pub trait FileIdentified {
    const FILE_IDENTIFIER: FileIdentifier;
}

macro_rules! impl_file_identifier {
    ($($ty:ty => $id:expr,)+) => {
        $(
            impl FileIdentified for $ty {
                const FILE_IDENTIFIER: FileIdentifier = $id;
            }
        )+
    };
}

impl_file_identifier! {
    i32 => 1,
    u32 => 2,
    i64 => 3,
    u64 => 4,
    i16 => 7,
    u16 => 8,
    i8 => 9,
    u8 => 10,
    bool => 11,
}
