//! Buffer walking: bounds-checked, vtable-driven, tolerant of version skew.
//!
//! The reader owns no memory; it walks the caller's slice following forward
//! relative offsets. Every read is bounds-checked and an out-of-range offset
//! or length is [`Error::Truncated`] — there is no further validation, and
//! none is needed for cycles because forward offsets cannot form one.
//!
//! A destination type with more declared members than the sender wrote sees
//! the extra members as absent (the vtable entry count bounds the walk); a
//! destination with fewer members simply never consumes the sender's extra
//! entries. Absent members leave the destination value untouched.

use crate::error::{Error, Result};
use crate::traits::{
    FileIdentified, Flat, MemberVisitorMut, Serializable, Shape, StructLike, UnionLike, VectorLike,
};

/// Root offset plus file identifier.
const ENVELOPE_BYTES: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// Bounds-checked access
// ─────────────────────────────────────────────────────────────────────────────

/// A load in progress: the source buffer plus checked accessors. Addresses
/// are byte offsets from the start of the buffer.
pub struct LoadCx<'b> {
    buf: &'b [u8],
}

impl<'b> LoadCx<'b> {
    pub fn new(buf: &'b [u8]) -> LoadCx<'b> {
        LoadCx { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// `len` bytes at `at`, or `Truncated`.
    pub fn bytes(&self, at: usize, len: usize) -> Result<&'b [u8]> {
        let truncated = Error::Truncated { offset: at, len, buffer_len: self.buf.len() };
        let end = at.checked_add(len).ok_or(truncated)?;
        self.buf.get(at..end).ok_or(truncated)
    }

    /// A fixed-size array at `at`, or `Truncated`.
    pub fn array<const N: usize>(&self, at: usize) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(at, N)?);
        Ok(out)
    }

    pub fn u8_at(&self, at: usize) -> Result<u8> {
        Ok(self.array::<1>(at)?[0])
    }

    pub fn u16_at(&self, at: usize) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array::<2>(at)?))
    }

    pub fn u32_at(&self, at: usize) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array::<4>(at)?))
    }

    pub fn i32_at(&self, at: usize) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array::<4>(at)?))
    }

    /// Follow the forward relative offset stored at `at`; returns the target
    /// address.
    pub fn follow_offset(&self, at: usize) -> Result<usize> {
        let relative = self.u32_at(at)? as usize;
        let target = at + relative;
        if target >= self.buf.len() {
            return Err(Error::Truncated { offset: target, len: 1, buffer_len: self.buf.len() });
        }
        Ok(target)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// VTable walking
// ─────────────────────────────────────────────────────────────────────────────

/// Cursor over one table's vtable entries, consumed in declaration order.
/// The cursor always advances, present or not, so interior absences keep
/// later members aligned with their entries.
pub struct FieldCursor<'b> {
    table: usize,
    entries: &'b [u8],
    index: usize,
}

impl<'b> FieldCursor<'b> {
    /// Resolve the vtable of the table at address `table` and position a
    /// cursor at its first field entry.
    pub fn at_table(cx: &LoadCx<'b>, table: usize) -> Result<FieldCursor<'b>> {
        let backref = cx.i32_at(table)? as i64;
        let vtable = table as i64 - backref;
        if vtable < 0 {
            return Err(Error::Truncated { offset: table, len: 4, buffer_len: cx.len() });
        }
        let vtable = vtable as usize;
        let vtable_bytes = cx.u16_at(vtable)? as usize;
        if vtable_bytes < 4 {
            return Err(Error::Truncated { offset: vtable, len: 4, buffer_len: cx.len() });
        }
        let entries = cx.bytes(vtable + 4, vtable_bytes - 4)?;
        Ok(FieldCursor { table, entries, index: 0 })
    }

    /// Consume one entry. `Some(address)` when the field is present (the
    /// entry exists and its slot offset is at least 4), `None` when absent.
    pub fn next(&mut self) -> Option<usize> {
        let i = self.index;
        self.index += 1;
        if 2 * i + 2 > self.entries.len() {
            return None;
        }
        let slot = u16::from_le_bytes([self.entries[2 * i], self.entries[2 * i + 1]]) as usize;
        if slot < 4 {
            return None;
        }
        Some(self.table + slot)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Load drivers
// ─────────────────────────────────────────────────────────────────────────────

struct LoadVisitor<'c, 'b> {
    cx: &'c LoadCx<'b>,
    fields: FieldCursor<'b>,
}

impl MemberVisitorMut for LoadVisitor<'_, '_> {
    fn field<T: Flat>(&mut self, member: &mut T) -> Result<()> {
        member.load_member(self.cx, &mut self.fields)
    }
}

/// Decode a table-class value from the table at address `at`.
pub fn load_as_table<T: Serializable>(value: &mut T, cx: &LoadCx<'_>, at: usize) -> Result<()> {
    let fields = FieldCursor::at_table(cx, at)?;
    value.members_mut(&mut LoadVisitor { cx, fields })
}

/// Decode a vector-class value from its count prefix at address `at`.
pub fn load_vector<L: VectorLike>(value: &mut L, cx: &LoadCx<'_>, at: usize) -> Result<()>
where
    L::Value: Default,
{
    let count = cx.u32_at(at)? as usize;
    let stride = <L::Value as Flat>::SHAPE.stride();
    let body = count.checked_mul(stride).ok_or(Error::Truncated {
        offset: at + 4,
        len: usize::MAX,
        buffer_len: cx.len(),
    })?;
    // Bound the whole element area before reserving anything: a hostile
    // count must not drive allocation.
    cx.bytes(at + 4, body)?;
    value.reserve(count);
    for i in 0..count {
        let mut element = L::Value::default();
        element.load_slot(cx, at + 4 + i * stride)?;
        value.push(element);
    }
    value.done();
    Ok(())
}

/// Decode a struct-class value from its inline slot at address `at`.
pub fn load_struct_slot<T: StructLike>(value: &mut T, cx: &LoadCx<'_>, at: usize) -> Result<()> {
    for (index, &size) in T::FIELD_SIZES.iter().enumerate() {
        let offset = crate::layout::struct_field_offset(T::FIELD_SIZES, index);
        value.load_field(index, cx.bytes(at + offset, size)?);
    }
    Ok(())
}

/// Decode a union alternative from the offset slot at `at`, unwrapping the
/// single-member table that non-table alternatives are encoded through.
pub fn load_ensure_table<T: Flat + Default>(cx: &LoadCx<'_>, at: usize) -> Result<T> {
    let mut value = T::default();
    if let Shape::Table = T::SHAPE {
        value.load_slot(cx, at)?;
    } else {
        let wrapper = cx.follow_offset(at)?;
        let mut fields = FieldCursor::at_table(cx, wrapper)?;
        value.load_member(cx, &mut fields)?;
    }
    Ok(value)
}

/// Decode a union member: tag entry, then offset entry. Tag zero resets the
/// union to its empty state; a tag past the declared alternatives is
/// [`Error::BadUnionTag`]; a present tag with a missing offset entry is
/// treated as absent.
pub fn load_union_member<T: UnionLike>(
    value: &mut T,
    cx: &LoadCx<'_>,
    fields: &mut FieldCursor<'_>,
) -> Result<()> {
    let tag_at = fields.next();
    let offset_at = fields.next();
    let Some(tag_at) = tag_at else { return Ok(()) };
    let tag = cx.u8_at(tag_at)?;
    if tag == 0 {
        value.set_empty();
        return Ok(());
    }
    if tag as usize > T::ALTERNATIVES {
        return Err(Error::BadUnionTag { tag, alternatives: T::ALTERNATIVES as u8 });
    }
    let Some(offset_at) = offset_at else { return Ok(()) };
    value.load_alternative(cx, tag - 1, offset_at)
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry points
// ─────────────────────────────────────────────────────────────────────────────

/// Deserialize a buffer produced by [`save`](crate::save) into `root`.
///
/// The file identifier is checked against `R`'s before any decoding. On
/// error the destination may be partially populated; discard it.
pub fn load<R>(buf: &[u8], root: &mut R) -> Result<()>
where
    R: Flat + FileIdentified,
{
    debug_assert!(matches!(R::SHAPE, Shape::Table), "message roots must be tables");
    let found = read_file_identifier(buf)?;
    if found != R::FILE_IDENTIFIER {
        return Err(Error::BadFileIdentifier { expected: R::FILE_IDENTIFIER, found });
    }
    let cx = LoadCx::new(buf);
    let at = buf.len() - ENVELOPE_BYTES;
    let relative = cx.u32_at(at)? as usize;
    let table = at.checked_sub(relative).ok_or(Error::Truncated {
        offset: at,
        len: 4,
        buffer_len: buf.len(),
    })?;
    root.load_object(&cx, table)
}

/// Read the file identifier from a buffer's envelope without decoding it.
pub fn read_file_identifier(buf: &[u8]) -> Result<u32> {
    if buf.len() < ENVELOPE_BYTES {
        return Err(Error::Truncated { offset: 0, len: ENVELOPE_BYTES, buffer_len: buf.len() });
    }
    LoadCx::new(buf).u32_at(buf.len() - 4)
}
