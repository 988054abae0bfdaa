//! `Box<T>` is transparent: same class, same bytes as `T`.
//!
//! Needed for recursive message types (a union alternative that contains its
//! own union again must be boxed to have a finite size in the host).

use crate::error::Result;
use crate::read::{FieldCursor, LoadCx};
use crate::traits::{FileIdentified, FileIdentifier, Flat, Shape};
use crate::vtable::VTableCollector;
use crate::write::{Image, TableBuilder, Writer};

impl<T: Flat> Flat for Box<T> {
    const SHAPE: Shape = T::SHAPE;

    fn collect_vtables(collector: &mut VTableCollector) {
        collector.visit::<T>();
    }

    fn save_object<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
        (**self).save_object(writer)
    }

    fn load_object(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
        (**self).load_object(cx, at)
    }

    fn save_slot<'a>(&'a self, writer: &mut Writer<'a>, image: &mut Image, at: usize) -> Result<()> {
        (**self).save_slot(writer, image, at)
    }

    fn load_slot(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
        (**self).load_slot(cx, at)
    }

    fn save_member<'a>(&'a self, writer: &mut Writer<'a>, table: &mut TableBuilder) -> Result<()> {
        (**self).save_member(writer, table)
    }

    fn load_member(&mut self, cx: &LoadCx<'_>, fields: &mut FieldCursor<'_>) -> Result<()> {
        (**self).load_member(cx, fields)
    }
}

impl<T: FileIdentified> FileIdentified for Box<T> {
    const FILE_IDENTIFIER: FileIdentifier = T::FILE_IDENTIFIER;
}
