//! Vector class: `Vec<T>` and ordered maps.
//!
//! A map encodes as a vector of pair tables in the map's iteration order.
//! Only `BTreeMap` is supported: output bytes must be a pure function of
//! the value, and a randomized-order map would break that.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::read::{load_vector, LoadCx};
use crate::traits::{FileIdentified, FileIdentifier, Flat, Shape, VectorLike};
use crate::vtable::VTableCollector;
use crate::write::{save_pair_table, save_vector_with, Writer};

// ─────────────────────────────────────────────────────────────────────────────
// Vec<T>
// ─────────────────────────────────────────────────────────────────────────────

impl<T: Flat + Default> VectorLike for Vec<T> {
    type Value = T;

    fn len(&self) -> usize {
        self.len()
    }

    fn reserve(&mut self, n: usize) {
        self.clear();
        self.reserve(n);
    }

    fn push(&mut self, value: T) {
        self.push(value);
    }
}

impl<T: Flat + Default> Flat for Vec<T> {
    const SHAPE: Shape = Shape::Vector;

    fn collect_vtables(collector: &mut VTableCollector) {
        collector.visit::<T>();
    }

    fn save_object<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
        let shape = T::SHAPE;
        save_vector_with(writer, self.len(), shape.stride(), shape.align(), |writer, image, at, i| {
            self[i].save_slot(writer, image, at)
        })
    }

    fn load_object(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
        load_vector(self, cx, at)
    }
}

impl<T: FileIdentified> FileIdentified for Vec<T> {
    const FILE_IDENTIFIER: FileIdentifier = (0x10 << 24) | T::FILE_IDENTIFIER;
}

// ─────────────────────────────────────────────────────────────────────────────
// BTreeMap<K, V>
// ─────────────────────────────────────────────────────────────────────────────

impl<K, V> VectorLike for BTreeMap<K, V>
where
    K: Flat + Default + Ord,
    V: Flat + Default,
{
    type Value = (K, V);

    fn len(&self) -> usize {
        self.len()
    }

    fn reserve(&mut self, _n: usize) {
        self.clear();
    }

    fn push(&mut self, (key, value): (K, V)) {
        self.insert(key, value);
    }
}

impl<K, V> Flat for BTreeMap<K, V>
where
    K: Flat + Default + Ord,
    V: Flat + Default,
{
    const SHAPE: Shape = Shape::Vector;

    fn collect_vtables(collector: &mut VTableCollector) {
        collector.visit::<(K, V)>();
    }

    fn save_object<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
        // Map entries are keyed storage, not contiguous pairs; each entry is
        // written as a pair table sharing the owned pair's vtable.
        let entries: Vec<(&'a K, &'a V)> = self.iter().collect();
        save_vector_with(writer, entries.len(), 4, 4, |writer, image, at, i| {
            let (key, value) = entries[i];
            let pos = save_pair_table(key, value, writer)?;
            image.offset_slot(at, pos);
            Ok(())
        })
    }

    fn load_object(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
        load_vector(self, cx, at)
    }
}

/// A map shares its pair's identifier.
impl<K, V> FileIdentified for BTreeMap<K, V>
where
    K: FileIdentified,
    V: FileIdentified,
{
    const FILE_IDENTIFIER: FileIdentifier = K::FILE_IDENTIFIER ^ V::FILE_IDENTIFIER;
}
