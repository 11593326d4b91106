use std::fmt::Debug;

/// Numeric accumulator stored in each bucket.
///
/// Averages are always computed in `f64`, whatever the accumulator type.
pub trait Sample: Copy + Default + PartialEq + Debug + Send + 'static {
    /// `self + other`. Integer accumulators wrap on overflow instead of panicking.
    fn accumulate(self, other: Self) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! impl_sample_int {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                #[inline]
                fn accumulate(self, other: Self) -> Self {
                    self.wrapping_add(other)
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

macro_rules! impl_sample_float {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                #[inline]
                fn accumulate(self, other: Self) -> Self {
                    self + other
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_sample_int!(i64, i32, u64, u32);
impl_sample_float!(f64, f32);
