//! VTable generation, process-wide interning, and per-root vtable sets.
//!
//! A vtable is a sequence of little-endian `u16` words:
//!
//! ```text
//! u16 vtable_bytes      // size of the vtable itself, including this header
//! u16 table_bytes       // size of the referencing table's field area
//! u16 field_offsets[n]  // per-slot offset within the table, declaration order
//! ```
//!
//! Slots are placed most-aligned first (ties broken by declaration order) so
//! padding is minimal, but the emitted entries stay in declaration order.
//! Two tables with identical slot shapes share one interned vtable; interned
//! vtables live for the program lifetime and structural equality is pointer
//! equality.

use std::any::TypeId;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::layout::right_align;
use crate::traits::{member_shapes, Flat, Serializable, Shape};

// ─────────────────────────────────────────────────────────────────────────────
// Generation
// ─────────────────────────────────────────────────────────────────────────────

/// Build the vtable for a table whose slots have the given `(size, align)`
/// shapes, in declaration order. Union members contribute two consecutive
/// shapes (the tag, then the offset) before this is called.
pub fn generate_vtable(shapes: &[(usize, usize)]) -> Vec<u16> {
    let n = shapes.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| (Reverse(shapes[i].1), i));

    let mut offsets = vec![0u16; n];
    let mut cursor = 4; // past the vtable backref
    let mut max_align = 1;
    for &i in &order {
        let (size, align) = shapes[i];
        if align > max_align {
            max_align = align;
        }
        cursor = right_align(cursor, align);
        offsets[i] = cursor as u16;
        cursor += size;
    }
    let table_bytes = right_align(cursor, max_align);
    debug_assert!(table_bytes < 1 << 16, "table field area exceeds u16 range");

    let mut vtable = Vec::with_capacity(2 + n);
    vtable.push((2 * (2 + n)) as u16);
    vtable.push(table_bytes as u16);
    vtable.extend_from_slice(&offsets);
    vtable
}

// ─────────────────────────────────────────────────────────────────────────────
// Process-wide interning
// ─────────────────────────────────────────────────────────────────────────────

static INTERNED: Lazy<RwLock<HashMap<Vec<(usize, usize)>, &'static [u16]>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Intern the vtable for a slot-shape list. The first caller for a given
/// shape generates and leaks it; every later caller gets the same pointer.
pub fn intern_vtable(shapes: &[(usize, usize)]) -> &'static [u16] {
    if let Some(&vtable) = INTERNED.read().unwrap().get(shapes) {
        return vtable;
    }
    let mut map = INTERNED.write().unwrap();
    // Another thread may have inserted while we waited for the write lock.
    if let Some(&vtable) = map.get(shapes) {
        return vtable;
    }
    let vtable: &'static [u16] = Box::leak(generate_vtable(shapes).into_boxed_slice());
    map.insert(shapes.to_vec(), vtable);
    vtable
}

// ─────────────────────────────────────────────────────────────────────────────
// Collection: every vtable reachable from a root type
// ─────────────────────────────────────────────────────────────────────────────

/// Accumulates the distinct vtables reachable from a root type, in
/// deterministic traversal order (root first, then members depth-first).
/// Traversal order matters: the packed blob is emitted in this order, and
/// output bytes must not depend on allocation addresses.
#[derive(Default)]
pub struct VTableCollector {
    tables: Vec<&'static [u16]>,
    seen_vtables: HashSet<usize>,
    seen_types: HashSet<TypeId>,
}

impl VTableCollector {
    /// Record one interned vtable, once.
    pub fn insert(&mut self, vtable: &'static [u16]) {
        if self.seen_vtables.insert(vtable.as_ptr() as usize) {
            self.tables.push(vtable);
        }
    }

    /// Returns `true` the first time a type is visited. Breaks cycles for
    /// recursive types.
    pub fn mark<T: 'static>(&mut self) -> bool {
        self.seen_types.insert(TypeId::of::<T>())
    }

    /// Recurse into a member, element, or alternative type.
    pub fn visit<T: Flat>(&mut self) {
        T::collect_vtables(self);
    }

    /// Record a union alternative: non-table alternatives also get the
    /// single-member wrapper table they are encoded through.
    pub fn alternative<T: Flat>(&mut self) {
        if !matches!(T::SHAPE, Shape::Table) {
            let mut shapes = Vec::new();
            crate::traits::push_member_shape::<T>(&mut shapes);
            self.insert(intern_vtable(&shapes));
        }
        self.visit::<T>();
    }
}

/// Record a table type's own vtable, then recurse into its member types.
/// `scratch` is a default instance; only the member types matter.
pub fn collect_table_vtables<T: Serializable>(scratch: &T, collector: &mut VTableCollector) {
    let shapes = member_shapes(scratch);
    collector.insert(intern_vtable(&shapes));

    struct CollectVisitor<'c> {
        collector: &'c mut VTableCollector,
    }
    impl<'a> crate::traits::MemberVisitor<'a> for CollectVisitor<'_> {
        fn field<F: Flat>(&mut self, _member: &'a F) -> crate::error::Result<()> {
            self.collector.visit::<F>();
            Ok(())
        }
    }
    let _ = scratch.members(&mut CollectVisitor { collector });
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-root packed sets
// ─────────────────────────────────────────────────────────────────────────────

/// Every vtable reachable from one root type, packed back to back, with each
/// vtable's byte offset inside the blob. The blob is re-emitted at the top
/// of every buffer written for that root.
pub struct VTableSet {
    packed: Vec<u8>,
    offsets: HashMap<usize, usize>,
}

impl VTableSet {
    fn build(collector: VTableCollector) -> VTableSet {
        let mut packed = Vec::new();
        let mut offsets = HashMap::new();
        for vtable in collector.tables {
            offsets.insert(vtable.as_ptr() as usize, packed.len());
            for word in vtable {
                packed.extend_from_slice(&word.to_le_bytes());
            }
        }
        VTableSet { packed, offsets }
    }

    /// The concatenated little-endian image of every vtable in the set.
    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    /// Byte offset of an interned vtable within the packed blob, or `None`
    /// if the vtable was never collected for this root (a planner bug).
    pub fn offset_of(&self, vtable: &'static [u16]) -> Option<usize> {
        self.offsets.get(&(vtable.as_ptr() as usize)).copied()
    }
}

static VTABLE_SETS: Lazy<RwLock<HashMap<TypeId, &'static VTableSet>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The packed vtable set for root type `R`, built on first use and cached
/// for the program lifetime. Safe under concurrent first access; building is
/// idempotent, and whichever entry lands in the map first wins.
pub fn vtable_set_for<R: Flat>() -> &'static VTableSet {
    let key = TypeId::of::<R>();
    if let Some(&set) = VTABLE_SETS.read().unwrap().get(&key) {
        return set;
    }
    let mut collector = VTableCollector::default();
    R::collect_vtables(&mut collector);
    let built: &'static VTableSet = Box::leak(Box::new(VTableSet::build(collector)));
    let mut map = VTABLE_SETS.write().unwrap();
    *map.entry(key).or_insert(built)
}
