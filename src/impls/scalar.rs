//! Scalar class: fixed-width little-endian primitives.

use crate::error::Result;
use crate::read::LoadCx;
use crate::traits::{Flat, Shape};
use crate::write::{Image, Writer};

macro_rules! impl_flat_scalar {
    ($($ty:ty => $size:literal,)+) => {
        $(
            impl Flat for $ty {
                const SHAPE: Shape = Shape::Scalar { size: $size };

                fn save_slot<'a>(
                    &'a self,
                    _writer: &mut Writer<'a>,
                    image: &mut Image,
                    at: usize,
                ) -> Result<()> {
                    image.put(at, &self.to_le_bytes());
                    Ok(())
                }

                fn load_slot(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
                    *self = <$ty>::from_le_bytes(cx.array::<$size>(at)?);
                    Ok(())
                }
            }
        )+
    };
}

impl_flat_scalar! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
}

impl Flat for bool {
    const SHAPE: Shape = Shape::Scalar { size: 1 };

    fn save_slot<'a>(&'a self, _writer: &mut Writer<'a>, image: &mut Image, at: usize) -> Result<()> {
        image.put(at, &[*self as u8]);
        Ok(())
    }

    fn load_slot(&mut self, cx: &LoadCx<'_>, at: usize) -> Result<()> {
        *self = cx.u8_at(at)? != 0;
        Ok(())
    }
}
