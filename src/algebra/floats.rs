#![allow(non_snake_case)]
use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::{Debug, Display, LowerExp};
use std::sync::atomic::{AtomicU32, Ordering};

/// Core traits for internal scalar values.
///
/// This trait defines a subset of bounds for [`Scalar`], which is preferred
/// throughout for use in the solver.  `Scalar` additionally requires the
/// fixed-size serialization contract of [`FixedBytes`], which checkpointing
/// and cross-process reductions rely on.
pub trait CoreScalar:
    'static
    + Send
    + Float
    + NumAssign
    + Default
    + FromPrimitive
    + Display
    + LowerExp
    + Debug
    + Sized
{
}

impl<T> CoreScalar for T where
    T: 'static
        + Send
        + Float
        + NumAssign
        + Default
        + FromPrimitive
        + Display
        + LowerExp
        + Debug
        + Sized
{
}

/// Fixed-size byte encoding and process-wide precision for a scalar type.
///
/// The encoding must be bit-exact under round-trip: checkpoint files store
/// raw encoded values and resumed runs must reproduce the saved state
/// exactly.  `serialized_size` may depend on the configured precision but
/// must be constant from the moment the precision is set at process startup.
pub trait FixedBytes: Sized {
    /// Record the working precision in bits.  Called once per process
    /// before any solver data is constructed.  Backends with a fixed
    /// native precision record the request and otherwise ignore it.
    fn set_default_precision(bits: u32);

    /// The precision most recently recorded by `set_default_precision`.
    fn default_precision() -> u32;

    /// Encoded size in bytes of one value at the current precision.
    fn serialized_size() -> usize;

    /// Encode into a buffer of exactly `serialized_size()` bytes.
    fn write_bytes(&self, buf: &mut [u8]);

    /// Decode from a buffer of exactly `serialized_size()` bytes.
    fn from_bytes(buf: &[u8]) -> Self;
}

/// Main trait for scalar values used in the solver.
///
/// All numeric state is generic over `Scalar`.  An implementation is
/// provided for `f64`; any other type satisfying the bounds plugs in
/// without changes to the solver, so arbitrary-precision backends can be
/// supplied externally.  No specific precision library is assumed.
pub trait Scalar: CoreScalar + FixedBytes {}
impl<T> Scalar for T where T: CoreScalar + FixedBytes {}

// f64 has a fixed 53-bit mantissa; the requested precision is recorded so
// that diagnostics can report what the run asked for.
static F64_REQUESTED_PRECISION: AtomicU32 = AtomicU32::new(53);

impl FixedBytes for f64 {
    fn set_default_precision(bits: u32) {
        F64_REQUESTED_PRECISION.store(bits, Ordering::Relaxed);
    }

    fn default_precision() -> u32 {
        F64_REQUESTED_PRECISION.load(Ordering::Relaxed)
    }

    fn serialized_size() -> usize {
        std::mem::size_of::<u64>()
    }

    fn write_bytes(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_bits().to_le_bytes());
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let mut bits = [0u8; 8];
        bits.copy_from_slice(buf);
        f64::from_bits(u64::from_le_bytes(bits))
    }
}

/// Trait for converting Rust primitives to [`Scalar`]
///
/// Implemented on f32/64 and u32/64 so that constants can be written
/// `(2.0).as_T()` rather than `T::from_f64(2.0).unwrap()`.  Required
/// internally by the solver and by the settings defaults.
pub trait AsScalarT<T>: 'static {
    fn as_T(&self) -> T;
}

macro_rules! impl_as_ScalarT {
    ($ty:ty, $ident:ident) => {
        impl<T> AsScalarT<T> for $ty
        where
            T: std::ops::Mul<T, Output = T> + FromPrimitive + 'static,
        {
            #[inline]
            fn as_T(&self) -> T {
                T::$ident(*self).unwrap()
            }
        }
    };
}
impl_as_ScalarT!(u32, from_u32);
impl_as_ScalarT!(u64, from_u64);
impl_as_ScalarT!(usize, from_usize);
impl_as_ScalarT!(f32, from_f32);
impl_as_ScalarT!(f64, from_f64);

#[test]
fn test_f64_fixed_bytes_roundtrip() {
    let values = [0.0, -0.0, 1.5, -1.0e300, f64::MIN_POSITIVE, f64::INFINITY];
    let mut buf = vec![0u8; f64::serialized_size()];
    for v in values {
        v.write_bytes(&mut buf);
        let w = f64::from_bytes(&buf);
        assert_eq!(v.to_bits(), w.to_bits());
    }
}
