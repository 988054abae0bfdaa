//! Wiring macros: one hook impl in, one [`Flat`](crate::Flat) impl out.
//!
//! Each serializable host type implements exactly one hook trait and invokes
//! the matching macro. Scalar impls are built in; vector-likes are generic
//! over their element and written by hand (see `impls/vector.rs` for the
//! pattern).

/// Wire a [`Serializable`](crate::Serializable) type into the table class.
///
/// The one-argument form expects an existing `Serializable` impl. The
/// field-list form generates it too:
///
/// ```ignore
/// flat_table!(CommitRecord { version, mutations, tag });
/// ```
///
/// Table types must also be `Default` (scratch instances drive vtable
/// collection and element decoding).
#[macro_export]
macro_rules! flat_table {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::Serializable for $ty {
            fn members<'a, V: $crate::MemberVisitor<'a>>(
                &'a self,
                visitor: &mut V,
            ) -> $crate::Result<()> {
                $( visitor.field(&self.$field)?; )+
                Ok(())
            }

            fn members_mut<V: $crate::MemberVisitorMut>(
                &mut self,
                visitor: &mut V,
            ) -> $crate::Result<()> {
                $( visitor.field(&mut self.$field)?; )+
                Ok(())
            }
        }

        $crate::flat_table!($ty);
    };
    ($ty:ty) => {
        impl $crate::Flat for $ty {
            const SHAPE: $crate::Shape = $crate::Shape::Table;

            fn collect_vtables(collector: &mut $crate::VTableCollector) {
                if !collector.mark::<Self>() {
                    return;
                }
                let scratch = <Self as ::core::default::Default>::default();
                $crate::vtable::collect_table_vtables(&scratch, collector);
            }

            fn save_object<'a>(
                &'a self,
                writer: &mut $crate::Writer<'a>,
            ) -> $crate::Result<usize> {
                $crate::write::save_as_table(self, writer)
            }

            fn load_object(&mut self, cx: &$crate::LoadCx<'_>, at: usize) -> $crate::Result<()> {
                $crate::read::load_as_table(self, cx, at)
            }
        }
    };
}

/// Wire a [`StructLike`](crate::StructLike) type into the struct class.
#[macro_export]
macro_rules! flat_struct {
    ($ty:ty) => {
        impl $crate::Flat for $ty {
            const SHAPE: $crate::Shape = $crate::Shape::Struct {
                size: $crate::layout::struct_size(<$ty as $crate::StructLike>::FIELD_SIZES),
                align: $crate::layout::struct_align(<$ty as $crate::StructLike>::FIELD_SIZES),
            };

            fn save_slot<'a>(
                &'a self,
                _writer: &mut $crate::Writer<'a>,
                image: &mut $crate::Image,
                at: usize,
            ) -> $crate::Result<()> {
                $crate::write::save_struct_slot(self, image, at)
            }

            fn load_slot(&mut self, cx: &$crate::LoadCx<'_>, at: usize) -> $crate::Result<()> {
                $crate::read::load_struct_slot(self, cx, at)
            }
        }
    };
}

/// Wire a [`DynamicSize`](crate::DynamicSize) type into the dynamic-bytes
/// class.
#[macro_export]
macro_rules! flat_bytes {
    ($ty:ty) => {
        impl $crate::Flat for $ty {
            const SHAPE: $crate::Shape = $crate::Shape::Bytes;

            fn save_object<'a>(
                &'a self,
                writer: &mut $crate::Writer<'a>,
            ) -> $crate::Result<usize> {
                writer.save_raw_blocks(<Self as $crate::DynamicSize>::save(self))
            }

            fn load_object(&mut self, cx: &$crate::LoadCx<'_>, at: usize) -> $crate::Result<()> {
                let len = cx.u32_at(at)? as usize;
                <Self as $crate::DynamicSize>::load(self, cx.bytes(at + 4, len)?);
                Ok(())
            }
        }
    };
}

/// Wire a [`UnionLike`](crate::UnionLike) type into the union class.
///
/// Unions occupy two table slots and are only valid as table members; using
/// one as a vector element or struct field is a programming error and
/// panics.
#[macro_export]
macro_rules! flat_union {
    ($ty:ty) => {
        impl $crate::Flat for $ty {
            const SHAPE: $crate::Shape = $crate::Shape::Union;

            fn collect_vtables(collector: &mut $crate::VTableCollector) {
                if !collector.mark::<Self>() {
                    return;
                }
                <Self as $crate::UnionLike>::collect_alternatives(collector);
            }

            fn save_slot<'a>(
                &'a self,
                _writer: &mut $crate::Writer<'a>,
                _image: &mut $crate::Image,
                _at: usize,
            ) -> $crate::Result<()> {
                unreachable!("unions are only supported as table members")
            }

            fn load_slot(&mut self, _cx: &$crate::LoadCx<'_>, _at: usize) -> $crate::Result<()> {
                unreachable!("unions are only supported as table members")
            }

            fn save_member<'a>(
                &'a self,
                writer: &mut $crate::Writer<'a>,
                table: &mut $crate::TableBuilder,
            ) -> $crate::Result<()> {
                $crate::write::save_union_member(self, writer, table)
            }

            fn load_member(
                &mut self,
                cx: &$crate::LoadCx<'_>,
                fields: &mut $crate::FieldCursor<'_>,
            ) -> $crate::Result<()> {
                $crate::read::load_union_member(self, cx, fields)
            }
        }
    };
}
