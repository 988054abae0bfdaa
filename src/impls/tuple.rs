//! Tuples as tables.
//!
//! Pairs double as map entries (a map is a vector of pair tables), so every
//! tuple takes the table class: its members may be indirect, which the
//! inline struct class cannot hold. The unit type is the zero-field table —
//! the smallest possible message and the natural empty union alternative.

use crate::error::Result;
use crate::read::LoadCx;
use crate::traits::{
    FileIdentified, FileIdentifier, Flat, MemberVisitor, MemberVisitorMut, Serializable, Shape,
};
use crate::vtable::{collect_table_vtables, VTableCollector};
use crate::write::Writer;

macro_rules! impl_flat_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Flat + Default),+> Serializable for ($($name,)+) {
            fn members<'a, V: MemberVisitor<'a>>(&'a self, visitor: &mut V) -> Result<()> {
                $( visitor.field(&self.$idx)?; )+
                Ok(())
            }

            fn members_mut<V: MemberVisitorMut>(&mut self, visitor: &mut V) -> Result<()> {
                $( visitor.field(&mut self.$idx)?; )+
                Ok(())
            }
        }

        impl<$($name: Flat + Default),+> Flat for ($($name,)+) {
            const SHAPE: Shape = Shape::Table;

            fn collect_vtables(collector: &mut VTableCollector) {
                if !collector.mark::<Self>() {
                    return;
                }
                let scratch = <Self as Default>::default();
                collect_table_vtables(&scratch, collector);
            }

            fn save_object<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
                crate::write::save_as_table(self, writer)
            }

            fn load_object(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
                crate::read::load_as_table(self, cx, at)
            }
        }
    };
}

impl_flat_tuple!(A: 0);
impl_flat_tuple!(A: 0, B: 1);
impl_flat_tuple!(A: 0, B: 1, C: 2);
impl_flat_tuple!(A: 0, B: 1, C: 2, D: 3);

impl Serializable for () {
    fn members<'a, V: MemberVisitor<'a>>(&'a self, _visitor: &mut V) -> Result<()> {
        Ok(())
    }

    fn members_mut<V: MemberVisitorMut>(&mut self, _visitor: &mut V) -> Result<()> {
        Ok(())
    }
}

impl Flat for () {
    const SHAPE: Shape = Shape::Table;

    fn collect_vtables(collector: &mut VTableCollector) {
        if !collector.mark::<Self>() {
            return;
        }
        collect_table_vtables(&(), collector);
    }

    fn save_object<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
        crate::write::save_as_table(self, writer)
    }

    fn load_object(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
        crate::read::load_as_table(self, cx, at)
    }
}

impl FileIdentified for () {
    const FILE_IDENTIFIER: FileIdentifier = 0;
}

/// A pair's identifier folds its halves together.
impl<F: FileIdentified, S: FileIdentified> FileIdentified for (F, S) {
    const FILE_IDENTIFIER: FileIdentifier = F::FILE_IDENTIFIER ^ S::FILE_IDENTIFIER;
}
