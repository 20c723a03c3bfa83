//! Numeric representations accepted by the engine.
//!
//! Every cube element type is widened to `f64` before any arithmetic, so the
//! solver and the deviation reducers have a single implementation. The only
//! per-type behavior is the nodata test and the conversion back to the raw
//! representation when writing integer composites.

use num_traits::AsPrimitive;

/// An element type of an observation cube.
pub trait Sample: Copy + PartialEq + Send + Sync + 'static {
    /// Short type name used in log fields.
    const NAME: &'static str;

    /// Widen into the working domain.
    fn to_f64(self) -> f64;

    /// Narrow from the working domain. Integer types round to nearest and
    /// saturate at their bounds.
    fn from_f64(value: f64) -> Self;

    /// True only for floating-point NaN.
    fn is_nan(self) -> bool {
        false
    }

    /// True if this value marks a missing observation.
    ///
    /// NaN is always missing. A value equal to `nodata` is missing.
    #[inline]
    fn is_nodata(self, nodata: Option<Self>) -> bool {
        self.is_nan() || nodata.is_some_and(|n| self == n)
    }
}

macro_rules! impl_float_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                const NAME: &'static str = stringify!($t);

                #[inline]
                fn to_f64(self) -> f64 {
                    AsPrimitive::<f64>::as_(self)
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    AsPrimitive::<$t>::as_(value)
                }

                #[inline]
                fn is_nan(self) -> bool {
                    <$t>::is_nan(self)
                }
            }
        )*
    };
}

macro_rules! impl_int_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                const NAME: &'static str = stringify!($t);

                #[inline]
                fn to_f64(self) -> f64 {
                    AsPrimitive::<f64>::as_(self)
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    // `as` saturates out-of-range values and maps NaN to zero.
                    AsPrimitive::<$t>::as_(value.round())
                }
            }
        )*
    };
}

impl_float_sample!(f32, f64);
impl_int_sample!(i8, u8, i16, u16, i32, u32);
