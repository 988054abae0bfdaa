// Byte-exact wire format tests.
//
// Verifies the envelope (root offset + file identifier in the last eight
// bytes, total length a multiple of eight, sixteen-byte minimum), table and
// vtable images down to the byte, little-endian scalar encoding, natural
// alignment of eight-byte scalars, union tag bytes (declared index + 1, zero
// when empty), and vtable sharing between structurally identical tables.

use flatwire::read::{FieldCursor, LoadCx};
use flatwire::{
    flat_table, flat_union, load, load_ensure_table, read_file_identifier, save,
    save_ensure_table, Error, FileIdentified, FileIdentifier, Result, UnionLike, VTableCollector,
    Writer,
};

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct ScalarPair {
    a: u32,
    b: bool,
}
flat_table!(ScalarPair { a, b });
impl FileIdentified for ScalarPair {
    const FILE_IDENTIFIER: FileIdentifier = 0xAB;
}

#[derive(Debug, Default, PartialEq)]
struct OnlyA {
    a: u32,
}
flat_table!(OnlyA { a });
impl FileIdentified for OnlyA {
    const FILE_IDENTIFIER: FileIdentifier = 0xAB;
}

#[derive(Debug, Default, PartialEq)]
struct Wide {
    x: u64,
}
flat_table!(Wide { x });
impl FileIdentified for Wide {
    const FILE_IDENTIFIER: FileIdentifier = 0x57;
}

#[derive(Debug, Default, PartialEq)]
struct AMsg {
    x: u32,
}
flat_table!(AMsg { x });

#[derive(Debug, Default, PartialEq)]
struct BMsg {
    y: u32,
}
flat_table!(BMsg { y });

/// Three-way choice with an explicit empty state, mirroring a
/// `variant<Void, A, B>` declaration: `Void` is alternative 0 and doubles as
/// the empty state, so an active `B` carries wire tag 3.
#[derive(Debug, PartialEq)]
enum Choice {
    Void,
    A(AMsg),
    B(BMsg),
}

impl Default for Choice {
    fn default() -> Choice {
        Choice::Void
    }
}

impl UnionLike for Choice {
    const ALTERNATIVES: usize = 3;

    fn index(&self) -> u8 {
        match self {
            Choice::Void => 0,
            Choice::A(_) => 1,
            Choice::B(_) => 2,
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Choice::Void)
    }

    fn set_empty(&mut self) {
        *self = Choice::Void;
    }

    fn save_alternative<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
        match self {
            Choice::Void => unreachable!("empty unions carry no payload"),
            Choice::A(a) => save_ensure_table(a, writer),
            Choice::B(b) => save_ensure_table(b, writer),
        }
    }

    fn load_alternative(&mut self, cx: &LoadCx<'_>, index: u8, at: usize) -> Result<()> {
        *self = match index {
            0 => Choice::Void,
            1 => Choice::A(load_ensure_table(cx, at)?),
            2 => Choice::B(load_ensure_table(cx, at)?),
            _ => unreachable!("tag validated before dispatch"),
        };
        Ok(())
    }

    fn collect_alternatives(collector: &mut VTableCollector) {
        collector.alternative::<()>();
        collector.alternative::<AMsg>();
        collector.alternative::<BMsg>();
    }
}
flat_union!(Choice);

#[derive(Debug, Default, PartialEq)]
struct Holder {
    choice: Choice,
}
flat_table!(Holder { choice });
impl FileIdentified for Holder {
    const FILE_IDENTIFIER: FileIdentifier = 0xC0;
}

#[derive(Debug, Default, PartialEq)]
struct Inner {
    v: u32,
}
flat_table!(Inner { v });

#[derive(Debug, Default, PartialEq)]
struct Outer {
    left: Inner,
    right: Inner,
}
flat_table!(Outer { left, right });
impl FileIdentified for Outer {
    const FILE_IDENTIFIER: FileIdentifier = 0x4f55;
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalar table, full buffer
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn scalar_pair_exact_bytes() {
    let buf = save(&ScalarPair { a: 7, b: true }).unwrap();
    #[rustfmt::skip]
    let expected: [u8; 32] = [
        0, 0, 0, 0,             // length-alignment filler
        0xF4, 0xFF, 0xFF, 0xFF, // vtable backref: -12 (vtable sits above)
        7, 0, 0, 0,             // a, little-endian at slot 4
        1, 0, 0, 0,             // b at slot 8, three bytes of padding
        8, 0, 12, 0, 4, 0, 8, 0, // vtable: 8 bytes, 12-byte table, a@4, b@8
        20, 0, 0, 0,            // root offset, counting back from here
        0xAB, 0, 0, 0,          // file identifier
    ];
    assert_eq!(buf, expected);
}

#[test]
fn sorted_vtable_puts_aligned_field_first() {
    // a (align 4) is placed at slot 4 even though b would fit there; b
    // (align 1) follows at 8.
    let buf = save(&ScalarPair { a: 1, b: false }).unwrap();
    assert_eq!(&buf[16..24], &[8, 0, 12, 0, 4, 0, 8, 0]);
}

#[test]
fn shorter_type_emits_shorter_vtable() {
    let buf = save(&OnlyA { a: 7 }).unwrap();
    #[rustfmt::skip]
    let expected: [u8; 24] = [
        0xF6, 0xFF, 0xFF, 0xFF, // backref: -10
        7, 0, 0, 0,             // a
        0, 0,                   // slack below the vtable blob
        6, 0, 8, 0, 4, 0,       // one-entry vtable
        16, 0, 0, 0,            // root offset
        0xAB, 0, 0, 0,
    ];
    assert_eq!(buf, expected);
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_root_is_sixteen_bytes() {
    let buf = save(&()).unwrap();
    #[rustfmt::skip]
    let expected: [u8; 16] = [
        0xFC, 0xFF, 0xFF, 0xFF, // backref: -4
        4, 0, 4, 0,             // zero-field vtable
        8, 0, 0, 0,             // root offset
        0, 0, 0, 0,             // unit file identifier
    ];
    assert_eq!(buf, expected);
}

#[test]
fn buffer_length_is_eight_aligned() {
    for n in 0..9u32 {
        let buf = save(&OnlyA { a: n }).unwrap();
        assert_eq!(buf.len() % 8, 0);
        assert!(buf.len() >= 16);
    }
}

#[test]
fn identifier_sits_in_final_word() {
    let buf = save(&Wide { x: 1 }).unwrap();
    assert_eq!(read_file_identifier(&buf).unwrap(), 0x57);
    assert_eq!(&buf[buf.len() - 4..], &[0x57, 0, 0, 0]);
}

#[test]
fn root_offset_counts_back_to_the_root_table() {
    let buf = save(&ScalarPair { a: 7, b: true }).unwrap();
    let at = buf.len() - 8;
    let relative =
        u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]) as usize;
    let table = at - relative;
    // The table's first four bytes are its signed vtable backref; resolve it
    // and check the vtable header is where it claims.
    let backref = i32::from_le_bytes([buf[table], buf[table + 1], buf[table + 2], buf[table + 3]]);
    let vtable = (table as i64 - backref as i64) as usize;
    assert_eq!(u16::from_le_bytes([buf[vtable], buf[vtable + 1]]), 8);
}

// ─────────────────────────────────────────────────────────────────────────────
// Endianness and alignment
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn scalars_encode_little_endian() {
    let buf = save(&OnlyA { a: 0x01020304 }).unwrap();
    assert_eq!(&buf[4..8], &[0x04, 0x03, 0x02, 0x01]);
}

#[test]
fn eight_byte_scalar_lands_eight_aligned() {
    let buf = save(&Wide { x: 0x1122334455667788 }).unwrap();
    #[rustfmt::skip]
    let expected: [u8; 32] = [
        0xEE, 0xFF, 0xFF, 0xFF, // backref: -18
        0, 0, 0, 0,             // padding up to the 8-aligned slot
        0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, // x at offset 8
        0, 0,                   // slack below the vtable blob
        6, 0, 16, 0, 8, 0,      // vtable: 16-byte table, x@8
        24, 0, 0, 0,            // root offset
        0x57, 0, 0, 0,
    ];
    assert_eq!(buf, expected);
    // Natural alignment in absolute address.
    assert_eq!((8usize) % 8, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Union tag bytes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn active_third_alternative_writes_tag_three() {
    let buf = save(&Holder { choice: Choice::B(BMsg { y: 42 }) }).unwrap();
    assert_eq!(buf.len(), 48);
    // Holder's vtable is [8, 12, 8, 4]: tag at table+8, offset at table+4.
    // The root table sits at address 0 here.
    assert_eq!(buf[8], 3, "wire tag is declared index + 1");
    assert_eq!(&buf[4..8], &[8, 0, 0, 0], "offset slot points forward to the payload");
    assert_eq!(&buf[16..20], &[42, 0, 0, 0], "payload table carries y");
}

#[test]
fn empty_union_writes_tag_zero_and_no_offset() {
    let buf = save(&Holder { choice: Choice::Void }).unwrap();
    assert_eq!(buf.len(), 40);
    assert_eq!(buf[8], 0, "empty state is tag zero");
    assert_eq!(&buf[4..8], &[0, 0, 0, 0], "offset slot stays zeroed");
}

#[test]
fn oversized_tag_is_rejected() {
    let mut buf = save(&Holder { choice: Choice::B(BMsg { y: 42 }) }).unwrap();
    buf[8] = 9; // five past the declared three alternatives
    let mut back = Holder::default();
    assert_eq!(
        load(&buf, &mut back),
        Err(Error::BadUnionTag { tag: 9, alternatives: 3 })
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// VTable sharing within a buffer
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn sibling_tables_resolve_to_one_vtable() {
    let buf = save(&Outer {
        left: Inner { v: 1 },
        right: Inner { v: 2 },
    })
    .unwrap();

    // Walk to the two inner tables through the public reader primitives.
    let cx = LoadCx::new(&buf);
    let at = buf.len() - 8;
    let root = at - cx.u32_at(at).unwrap() as usize;
    let mut fields = FieldCursor::at_table(&cx, root).unwrap();
    let left_slot = fields.next().unwrap();
    let right_slot = fields.next().unwrap();
    let left = cx.follow_offset(left_slot).unwrap();
    let right = cx.follow_offset(right_slot).unwrap();

    let vtable_of = |table: usize| {
        let backref = cx.i32_at(table).unwrap();
        (table as i64 - backref as i64) as usize
    };
    assert_ne!(left, right);
    assert_eq!(vtable_of(left), vtable_of(right), "shared interned vtable, one offset");
}

// ─────────────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn repeated_saves_are_bit_identical() {
    let value = Holder { choice: Choice::A(AMsg { x: 3 }) };
    let first = save(&value).unwrap();
    let second = save(&value).unwrap();
    assert_eq!(first, second);

    let rebuilt = Holder { choice: Choice::A(AMsg { x: 3 }) };
    assert_eq!(first, save(&rebuilt).unwrap());
}
