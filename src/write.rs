//! Two-pass save: plan, then materialize.
//!
//! Positions are distances from the end of the buffer; the final address of
//! position `p` is `buffer_len - p`. Pass one is a single traversal that
//! assigns every object its position and emits a plan of write operations
//! (finalized byte images plus borrowed dynamic-bytes blocks). Relative
//! offsets are resolved while planning, since a slot's position and its
//! target's position are both known once the enclosing object is placed.
//! Pass two allocates the exact buffer and applies the plan; a plan entry
//! that does not fit is the defensive [`Error::InternalLayout`].
//!
//! Placement order, and therefore the buffer layout from high addresses
//! down: the 8-byte envelope (root offset, file identifier), the packed
//! vtable blob, then payload objects in traversal order with children above
//! the parents that reference them. All inter-object offsets are unsigned
//! and point forward (toward higher addresses); the root offset counts back
//! from the envelope; table backrefs are signed.

use crate::error::{Error, Result};
use crate::layout::right_align;
use crate::traits::{
    member_shapes, push_member_shape, FileIdentified, Flat, MemberVisitor, Serializable, Shape,
    StructLike, UnionLike,
};
use crate::vtable::{intern_vtable, vtable_set_for, VTableSet};

/// Root offset plus file identifier.
const ENVELOPE_BYTES: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// Plan entries
// ─────────────────────────────────────────────────────────────────────────────

enum WriteOp<'a> {
    /// A finalized object image (table, vector, length prefix, envelope).
    Image { pos: usize, bytes: Vec<u8> },
    /// A byte block borrowed from the value being saved, copied in pass two.
    Borrowed { pos: usize, bytes: &'a [u8] },
}

impl WriteOp<'_> {
    fn pos(&self) -> usize {
        match self {
            WriteOp::Image { pos, .. } | WriteOp::Borrowed { pos, .. } => *pos,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            WriteOp::Image { bytes, .. } => bytes,
            WriteOp::Borrowed { bytes, .. } => bytes,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Plan-building writer for one save operation. The lifetime ties it to the
/// value being saved: dynamic-bytes blocks are borrowed until pass two runs.
pub struct Writer<'a> {
    pos: usize,
    ops: Vec<WriteOp<'a>>,
    vtables: &'static VTableSet,
}

impl<'a> Writer<'a> {
    fn new(vtables: &'static VTableSet) -> Writer<'a> {
        let blob = vtables.packed();
        let mut writer = Writer { pos: ENVELOPE_BYTES, ops: Vec::new(), vtables };
        writer.pos += blob.len();
        writer.ops.push(WriteOp::Borrowed { pos: writer.pos, bytes: blob });
        writer
    }

    /// Current high-water position (the running buffer size).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position of one interned vtable inside the packed blob.
    fn vtable_position(&self, vtable: &'static [u16]) -> Result<usize> {
        let index = self.vtables.offset_of(vtable).ok_or(Error::InternalLayout {
            position: self.pos,
            length: 0,
            buffer_len: 0,
        })?;
        Ok(ENVELOPE_BYTES + self.vtables.packed().len() - index)
    }

    /// Encode a dynamic-bytes payload: a four-byte length prefix, four-byte
    /// aligned, followed by the blocks in order. Returns the position of the
    /// prefix.
    pub fn save_raw_blocks(&mut self, blocks: Vec<&'a [u8]>) -> Result<usize> {
        let total: usize = blocks.iter().map(|block| block.len()).sum();
        let pos = right_align(self.pos + total + 4, 4);
        self.ops.push(WriteOp::Image { pos, bytes: (total as u32).to_le_bytes().to_vec() });
        let mut at = pos - 4;
        for block in blocks {
            if !block.is_empty() {
                self.ops.push(WriteOp::Borrowed { pos: at, bytes: block });
            }
            at -= block.len();
        }
        self.pos = pos;
        Ok(pos)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pending object images
// ─────────────────────────────────────────────────────────────────────────────

/// A not-yet-placed object image: raw bytes plus the offset slots that must
/// be fixed up once the object's position is known.
pub struct Image {
    bytes: Vec<u8>,
    fixups: Vec<(usize, usize)>,
}

impl Image {
    fn zeroed(len: usize) -> Image {
        Image { bytes: vec![0; len], fixups: Vec::new() }
    }

    /// Copy raw bytes into the image at byte offset `at`.
    pub fn put(&mut self, at: usize, data: &[u8]) {
        self.bytes[at..at + data.len()].copy_from_slice(data);
    }

    /// Mutable view of `len` bytes at `at` (struct field encoding).
    pub fn slice_mut(&mut self, at: usize, len: usize) -> &mut [u8] {
        &mut self.bytes[at..at + len]
    }

    /// Record that the four bytes at `at` must become the forward relative
    /// offset from that slot to the object at `target_pos`.
    pub fn offset_slot(&mut self, at: usize, target_pos: usize) {
        self.fixups.push((at, target_pos));
    }

    /// Place the image at `pos`: resolve offset slots and emit the plan op.
    fn finish(mut self, writer: &mut Writer<'_>, pos: usize) -> Result<()> {
        debug_assert!(pos >= writer.pos + self.bytes.len(), "image placed over allocated space");
        for &(at, target_pos) in &self.fixups {
            let slot_pos = pos - at;
            let relative = slot_pos.checked_sub(target_pos).ok_or(Error::InternalLayout {
                position: slot_pos,
                length: 4,
                buffer_len: 0,
            })?;
            let le = (relative as u32).to_le_bytes();
            self.bytes[at..at + 4].copy_from_slice(&le);
        }
        writer.ops.push(WriteOp::Image { pos, bytes: self.bytes });
        writer.pos = pos;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table building
// ─────────────────────────────────────────────────────────────────────────────

/// In-progress table: its interned vtable, a pending field-area image, and a
/// cursor over the vtable's slot entries.
pub struct TableBuilder {
    vtable: &'static [u16],
    image: Image,
    slot: usize,
    max_align: usize,
}

impl TableBuilder {
    fn new(vtable: &'static [u16], max_align: usize) -> TableBuilder {
        let table_bytes = vtable[1] as usize;
        TableBuilder { vtable, image: Image::zeroed(table_bytes), slot: 2, max_align }
    }

    /// Consume the next vtable entry and return the slot's byte offset
    /// within the table.
    pub fn next_slot(&mut self) -> usize {
        let at = self.vtable[self.slot] as usize;
        self.slot += 1;
        at
    }

    /// The table's pending image (the backref bytes stay zero until
    /// placement).
    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    /// Place the table: the table start is aligned to the larger of four
    /// (the backref) and the max member alignment, so every slot offset the
    /// vtable assigned lands on its natural boundary in the buffer. Then
    /// resolve the vtable backref and any offset slots.
    fn finish(mut self, writer: &mut Writer<'_>) -> Result<usize> {
        let table_bytes = self.vtable[1] as usize;
        let align = self.max_align.max(4);
        let pos = right_align(writer.pos + table_bytes, align);
        let vtable_pos = writer.vtable_position(self.vtable)?;
        let backref = vtable_pos as i64 - pos as i64;
        self.image.put(0, &(backref as i32).to_le_bytes());
        self.image.finish(writer, pos)?;
        Ok(pos)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Save drivers
// ─────────────────────────────────────────────────────────────────────────────

struct SaveVisitor<'w, 'a> {
    writer: &'w mut Writer<'a>,
    table: TableBuilder,
}

impl<'a> MemberVisitor<'a> for SaveVisitor<'_, 'a> {
    fn field<T: Flat>(&mut self, member: &'a T) -> Result<()> {
        member.save_member(self.writer, &mut self.table)
    }
}

/// Encode a table-class value out of line; returns its position. Members are
/// saved first (landing at higher addresses), then the table itself.
pub fn save_as_table<'a, T: Serializable>(value: &'a T, writer: &mut Writer<'a>) -> Result<usize> {
    let shapes = member_shapes(value);
    let vtable = intern_vtable(&shapes);
    let max_align = shapes.iter().map(|&(_, align)| align).max().unwrap_or(1);
    let mut visitor = SaveVisitor { writer, table: TableBuilder::new(vtable, max_align) };
    value.members(&mut visitor)?;
    let SaveVisitor { writer, table } = visitor;
    table.finish(writer)
}

/// Encode a vector-class value out of line; returns the position of its
/// count prefix. `element` fills the slot at byte offset `at` of the image
/// for element `i`; indirect elements save their targets through the writer
/// first.
pub fn save_vector_with<'a, F>(
    writer: &mut Writer<'a>,
    len: usize,
    stride: usize,
    align: usize,
    mut element: F,
) -> Result<usize>
where
    F: FnMut(&mut Writer<'a>, &mut Image, usize, usize) -> Result<()>,
{
    let body = len * stride;
    let mut image = Image::zeroed(4 + body);
    image.put(0, &(len as u32).to_le_bytes());
    for i in 0..len {
        element(writer, &mut image, 4 + i * stride, i)?;
    }
    let pos = right_align(writer.pos + body, align.max(4)) + 4;
    image.finish(writer, pos)?;
    Ok(pos)
}

/// Encode a struct-class value inline at byte offset `at` of `image`.
pub fn save_struct_slot<T: StructLike>(value: &T, image: &mut Image, at: usize) -> Result<()> {
    for (index, &size) in T::FIELD_SIZES.iter().enumerate() {
        let offset = crate::layout::struct_field_offset(T::FIELD_SIZES, index);
        value.save_field(index, image.slice_mut(at + offset, size));
    }
    Ok(())
}

/// Encode one map entry as a pair table without materializing an owned
/// `(K, V)`: the members and slot shapes are exactly those of the owned
/// pair, so both land on the same interned vtable.
pub fn save_pair_table<'a, K: Flat, V: Flat>(
    key: &'a K,
    value: &'a V,
    writer: &mut Writer<'a>,
) -> Result<usize> {
    let mut shapes = Vec::new();
    push_member_shape::<K>(&mut shapes);
    push_member_shape::<V>(&mut shapes);
    let vtable = intern_vtable(&shapes);
    let max_align = shapes.iter().map(|&(_, align)| align).max().unwrap_or(1);
    let mut table = TableBuilder::new(vtable, max_align);
    key.save_member(writer, &mut table)?;
    value.save_member(writer, &mut table)?;
    table.finish(writer)
}

/// Encode a union alternative so it is always reachable through one 32-bit
/// offset: tables encode directly, anything else is wrapped in a
/// single-member table.
pub fn save_ensure_table<'a, T: Flat>(value: &'a T, writer: &mut Writer<'a>) -> Result<usize> {
    if let Shape::Table = T::SHAPE {
        return value.save_object(writer);
    }
    let mut shapes = Vec::new();
    push_member_shape::<T>(&mut shapes);
    let vtable = intern_vtable(&shapes);
    let max_align = shapes.iter().map(|&(_, align)| align).max().unwrap_or(1);
    let mut table = TableBuilder::new(vtable, max_align);
    value.save_member(writer, &mut table)?;
    table.finish(writer)
}

/// Encode a union member: a tag byte (declared index + 1; 0 when empty) and,
/// when non-empty, a forward offset to the encoded alternative. The offset
/// slot stays zeroed for the empty state.
pub fn save_union_member<'a, T: UnionLike>(
    value: &'a T,
    writer: &mut Writer<'a>,
    table: &mut TableBuilder,
) -> Result<()> {
    debug_assert!(T::ALTERNATIVES <= 254, "unions support at most 254 alternatives");
    let tag_at = table.next_slot();
    let offset_at = table.next_slot();
    if value.is_empty() {
        table.image_mut().put(tag_at, &[0]);
        return Ok(());
    }
    table.image_mut().put(tag_at, &[value.index() + 1]);
    let pos = value.save_alternative(writer)?;
    table.image_mut().offset_slot(offset_at, pos);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point and materialization
// ─────────────────────────────────────────────────────────────────────────────

/// Serialize `root` into a fresh buffer.
///
/// The buffer ends with the envelope: a `u32` counting back from its own
/// position to the root table, then the root type's file identifier. Total
/// length is a multiple of 8 and at least 16. Identical input produces an
/// identical buffer, across calls and process restarts.
pub fn save<R>(root: &R) -> Result<Vec<u8>>
where
    R: Flat + FileIdentified,
{
    debug_assert!(matches!(R::SHAPE, Shape::Table), "message roots must be tables");
    let mut writer = Writer::new(vtable_set_for::<R>());
    let root_pos = root.save_object(&mut writer)?;
    materialize(writer, root_pos, R::FILE_IDENTIFIER)
}

fn materialize(mut writer: Writer<'_>, root_pos: usize, file_id: u32) -> Result<Vec<u8>> {
    let mut envelope = [0u8; ENVELOPE_BYTES];
    envelope[..4].copy_from_slice(&((root_pos - ENVELOPE_BYTES) as u32).to_le_bytes());
    envelope[4..].copy_from_slice(&file_id.to_le_bytes());
    writer.ops.push(WriteOp::Image { pos: ENVELOPE_BYTES, bytes: envelope.to_vec() });

    let buffer_len = right_align(writer.pos, 8);
    let mut out = vec![0u8; buffer_len];
    for op in &writer.ops {
        let (pos, bytes) = (op.pos(), op.bytes());
        let oob = Error::InternalLayout { position: pos, length: bytes.len(), buffer_len };
        let start = buffer_len.checked_sub(pos).ok_or(oob)?;
        if bytes.len() > pos {
            return Err(oob);
        }
        out[start..start + bytes.len()].copy_from_slice(bytes);
    }
    Ok(out)
}
