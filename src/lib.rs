//! flatwire — schema-driven flat binary serialization.
//!
//! Converts in-memory values to and from a self-describing, little-endian,
//! alignment-correct buffer. Objects with optional fields (tables) are
//! indexed through shared, interned vtables, which is what makes senders and
//! receivers with different type versions interoperate: a missing trailing
//! field is a shorter vtable, a missing interior field is a zero slot, and a
//! reader ignores entries beyond what it declares.
//!
//! Schemas are expressed by the host types themselves: each serializable
//! type implements exactly one registration hook ([`Serializable`],
//! [`StructLike`], [`VectorLike`], [`DynamicSize`], [`UnionLike`]) and wires
//! it up with the matching `flat_*!` macro. Scalars, tuples, `Vec`,
//! `BTreeMap`, `String`, `bytes::Bytes`, and `Box` are built in.
//!
//! ```
//! use flatwire::{flat_table, FileIdentified, FileIdentifier};
//!
//! #[derive(Default, Debug, PartialEq)]
//! struct Ping {
//!     sequence: u64,
//!     payload: String,
//! }
//! flat_table!(Ping { sequence, payload });
//! impl FileIdentified for Ping {
//!     const FILE_IDENTIFIER: FileIdentifier = 0x50494e47;
//! }
//!
//! let ping = Ping { sequence: 7, payload: "hello".into() };
//! let buf = flatwire::save(&ping).unwrap();
//! let mut back = Ping::default();
//! flatwire::load(&buf, &mut back).unwrap();
//! assert_eq!(back, ping);
//! ```

pub mod error;
pub mod layout;
pub mod read;
pub mod traits;
pub mod vtable;
pub mod write;

mod impls;
mod macros;

// ─────────────────────────────────────────────────────────────────────────────
// Primary entry points
// ─────────────────────────────────────────────────────────────────────────────

/// Serialize a root table into a fresh buffer.
pub use write::save;
/// Deserialize a buffer into a caller-provided root, checking the file
/// identifier first.
pub use read::load;
/// Peek at a buffer's file identifier without decoding it.
pub use read::read_file_identifier;

// ─────────────────────────────────────────────────────────────────────────────
// Error handling
// ─────────────────────────────────────────────────────────────────────────────

pub use error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Classification and registration surface
// ─────────────────────────────────────────────────────────────────────────────

/// Encoding-class classification of a type.
pub use traits::Shape;
/// Serialization driver; one impl per type, generated by the `flat_*!`
/// macros.
pub use traits::Flat;
/// Table-class hook: member visitation in declaration order.
pub use traits::{MemberVisitor, MemberVisitorMut, Serializable};
/// Struct-class hook: scalar field widths plus per-field byte codecs.
pub use traits::StructLike;
/// Vector-class hook: element type and load-side container operations.
pub use traits::VectorLike;
/// Dynamic-bytes hook: borrowed save blocks, owned load.
pub use traits::DynamicSize;
/// Union-class hook: tagged alternatives with an explicit empty state.
pub use traits::UnionLike;
/// Message-type tagging for root types.
pub use traits::{FileIdentified, FileIdentifier};

// ─────────────────────────────────────────────────────────────────────────────
// Machinery reachable from hook implementations
// ─────────────────────────────────────────────────────────────────────────────

/// VTable interning and per-root collection.
pub use vtable::VTableCollector;
/// Plan-building writer handed to save-side hook code.
pub use write::{Image, TableBuilder, Writer};
/// Union-alternative encode helper (ensure-table wrapping).
pub use write::save_ensure_table;
/// Bounds-checked buffer access handed to load-side hook code.
pub use read::{FieldCursor, LoadCx};
/// Union-alternative decode helper (ensure-table unwrapping).
pub use read::load_ensure_table;
