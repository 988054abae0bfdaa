// Version-skew and malformed-input tests.
//
// Forward compatibility: a reader with fewer declared members than the
// sender ignores the sender's trailing vtable entries. Backward
// compatibility: a reader with more declared members sees the missing
// trailing entries as absent and keeps its defaults. Interior absences are
// zero vtable slots. Malformed buffers fail with Truncated or
// BadFileIdentifier and never panic.

use flatwire::{flat_table, load, read_file_identifier, save, Error, FileIdentified, FileIdentifier};

// Three versions of one record type, sharing a file identifier the way a
// deployed sender and receiver fleet would.
const RECORD_ID: FileIdentifier = 0x52454331;

#[derive(Debug, Default, PartialEq)]
struct RecordV1 {
    a: u32,
}
flat_table!(RecordV1 { a });
impl FileIdentified for RecordV1 {
    const FILE_IDENTIFIER: FileIdentifier = RECORD_ID;
}

#[derive(Debug, Default, PartialEq)]
struct RecordV2 {
    a: u32,
    b: String,
}
flat_table!(RecordV2 { a, b });
impl FileIdentified for RecordV2 {
    const FILE_IDENTIFIER: FileIdentifier = RECORD_ID;
}

#[derive(Debug, Default, PartialEq)]
struct RecordV3 {
    a: u32,
    b: String,
    c: Vec<u64>,
}
flat_table!(RecordV3 { a, b, c });
impl FileIdentified for RecordV3 {
    const FILE_IDENTIFIER: FileIdentifier = RECORD_ID;
}

// ─────────────────────────────────────────────────────────────────────────────
// Forward compatibility: new sender, old reader
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn old_reader_ignores_appended_fields() {
    let sent = RecordV3 {
        a: 11,
        b: "extra".into(),
        c: vec![1, 2, 3],
    };
    let buf = save(&sent).unwrap();

    let mut v1 = RecordV1::default();
    load(&buf, &mut v1).unwrap();
    assert_eq!(v1, RecordV1 { a: 11 });

    let mut v2 = RecordV2::default();
    load(&buf, &mut v2).unwrap();
    assert_eq!(v2, RecordV2 { a: 11, b: "extra".into() });
}

// ─────────────────────────────────────────────────────────────────────────────
// Backward compatibility: old sender, new reader
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn new_reader_defaults_missing_trailing_fields() {
    let buf = save(&RecordV1 { a: 5 }).unwrap();

    let mut v3 = RecordV3::default();
    load(&buf, &mut v3).unwrap();
    assert_eq!(v3, RecordV3 { a: 5, b: String::new(), c: vec![] });
}

#[test]
fn absent_fields_do_not_clobber_destination() {
    // Absence means "leave the field alone": a pre-populated destination
    // keeps its value, matching in-place load semantics.
    let buf = save(&RecordV1 { a: 5 }).unwrap();
    let mut v2 = RecordV2 { a: 0, b: "preset".into() };
    load(&buf, &mut v2).unwrap();
    assert_eq!(v2, RecordV2 { a: 5, b: "preset".into() });
}

// ─────────────────────────────────────────────────────────────────────────────
// Interior absence: zero vtable slot
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct Pair {
    a: u32,
    b: bool,
}
flat_table!(Pair { a, b });
impl FileIdentified for Pair {
    const FILE_IDENTIFIER: FileIdentifier = 0xAB;
}

#[test]
fn zero_slot_reads_as_absent() {
    // Hand-built message for Pair with a's vtable entry zeroed: a sender
    // that knows the field but did not write it. Geometry matches the
    // writer's own layout for this shape.
    #[rustfmt::skip]
    let buf: [u8; 32] = [
        0, 0, 0, 0,             // filler
        0xF4, 0xFF, 0xFF, 0xFF, // backref -12
        0, 0, 0, 0,             // dead bytes where a would sit
        1, 0, 0, 0,             // b = true at slot 8
        8, 0, 12, 0, 0, 0, 8, 0, // vtable: entry for a is 0 (absent)
        20, 0, 0, 0,            // root offset
        0xAB, 0, 0, 0,          // Pair's identifier
    ];

    let mut pair = Pair { a: 99, b: false };
    load(&buf, &mut pair).unwrap();
    assert_eq!(pair, Pair { a: 99, b: true });
}

// ─────────────────────────────────────────────────────────────────────────────
// File identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn identifier_mismatch_is_rejected_before_decoding() {
    let buf = save(&RecordV1 { a: 1 }).unwrap();
    let mut pair = Pair::default();
    assert_eq!(
        load(&buf, &mut pair),
        Err(Error::BadFileIdentifier { expected: 0xAB, found: RECORD_ID })
    );
}

#[test]
fn identifier_is_readable_without_decoding() {
    let buf = save(&RecordV2 { a: 1, b: "x".into() }).unwrap();
    assert_eq!(read_file_identifier(&buf).unwrap(), RECORD_ID);
}

// ─────────────────────────────────────────────────────────────────────────────
// Malformed input
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn short_buffers_are_truncated_errors() {
    for len in 0..8 {
        let buf = vec![0u8; len];
        assert!(matches!(read_file_identifier(&buf), Err(Error::Truncated { .. })));
        let mut dest = RecordV1::default();
        assert!(matches!(load(&buf, &mut dest), Err(Error::Truncated { .. })));
    }
}

#[test]
fn corrupt_root_offset_is_truncated() {
    let mut buf = save(&RecordV1 { a: 1 }).unwrap();
    let at = buf.len() - 8;
    // Point the root offset past the front of the buffer.
    buf[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    let mut dest = RecordV1::default();
    assert!(matches!(load(&buf, &mut dest), Err(Error::Truncated { .. })));
}

#[test]
fn corrupt_member_offset_is_truncated() {
    let sent = RecordV2 { a: 1, b: "payload".into() };
    let mut buf = save(&sent).unwrap();

    // Find b's offset slot through the root table and stomp it.
    let cx = flatwire::LoadCx::new(&buf);
    let at = buf.len() - 8;
    let root = at - cx.u32_at(at).unwrap() as usize;
    let backref = cx.i32_at(root).unwrap();
    let vtable = (root as i64 - backref as i64) as usize;
    let slot_b = cx.u16_at(vtable + 6).unwrap() as usize;
    let slot_addr = root + slot_b;
    buf[slot_addr..slot_addr + 4].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

    let mut dest = RecordV2::default();
    assert!(matches!(load(&buf, &mut dest), Err(Error::Truncated { .. })));
}

#[test]
fn corrupt_vector_count_is_truncated() {
    let sent = RecordV3 { a: 1, b: String::new(), c: vec![7, 8] };
    let mut buf = save(&sent).unwrap();

    let cx = flatwire::LoadCx::new(&buf);
    let at = buf.len() - 8;
    let root = at - cx.u32_at(at).unwrap() as usize;
    let backref = cx.i32_at(root).unwrap();
    let vtable = (root as i64 - backref as i64) as usize;
    let slot_c = cx.u16_at(vtable + 8).unwrap() as usize;
    let vector = cx.follow_offset(root + slot_c).unwrap();
    // Claim a billion elements; the bounds check must fire before any
    // allocation-driven work.
    buf[vector..vector + 4].copy_from_slice(&1_000_000_000u32.to_le_bytes());

    let mut dest = RecordV3::default();
    assert!(matches!(load(&buf, &mut dest), Err(Error::Truncated { .. })));
}

#[test]
fn partial_destination_is_discardable() {
    // A load that fails mid-way may leave earlier fields populated; the
    // contract is only that the error is reported.
    let sent = RecordV2 { a: 42, b: "x".into() };
    let mut buf = save(&sent).unwrap();
    let cx = flatwire::LoadCx::new(&buf);
    let at = buf.len() - 8;
    let root = at - cx.u32_at(at).unwrap() as usize;
    let backref = cx.i32_at(root).unwrap();
    let vtable = (root as i64 - backref as i64) as usize;
    let slot_b = cx.u16_at(vtable + 6).unwrap() as usize;
    let slot_addr = root + slot_b;
    buf[slot_addr..slot_addr + 4].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

    let mut dest = RecordV2::default();
    assert!(load(&buf, &mut dest).is_err());
}
