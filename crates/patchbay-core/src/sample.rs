mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Sample types the render pipeline can run at.
///
/// Sealed to `f32` and `f64`; the conversions exist for the adapter that
/// bridges a sequence running at one precision to a processor prepared at
/// the other.
pub trait Sample:
    sealed::Sealed + Copy + Default + PartialEq + PartialOrd + Send + Sync + 'static
{
    const ZERO: Self;
    const IS_DOUBLE: bool;

    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Sample for f32 {
    const ZERO: Self = 0.0;
    const IS_DOUBLE: bool = false;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Sample for f64 {
    const ZERO: Self = 0.0;
    const IS_DOUBLE: bool = true;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}
