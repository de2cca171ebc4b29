//! Sample representations
//!
//! A stream and its frames carry one numeric sample type for their whole
//! lifetime. The set of types is closed: [`SampleFormat`] names them and the
//! [`Sample`] trait gives each one its byte width, little-endian codec and
//! the representation the audio driver works with.

use std::fmt;

/// Closed set of supported sample encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    I8,
    U8,
    I16,
    I24,
    I32,
    F32,
}

impl SampleFormat {
    /// Bytes per sample in the packed wire encoding
    pub const fn bytes(self) -> usize {
        match self {
            SampleFormat::I8 | SampleFormat::U8 => 1,
            SampleFormat::I16 => 2,
            SampleFormat::I24 => 3,
            SampleFormat::I32 | SampleFormat::F32 => 4,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::I8 => "i8",
            SampleFormat::U8 => "u8",
            SampleFormat::I16 => "i16",
            SampleFormat::I24 => "i24",
            SampleFormat::I32 => "i32",
            SampleFormat::F32 => "f32",
        };
        f.write_str(name)
    }
}

/// Packed signed 24-bit sample.
///
/// Stored in an `i32` whose value is always within the 24-bit range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct I24(i32);

impl I24 {
    pub const MIN: I24 = I24(-(1 << 23));
    pub const MAX: I24 = I24((1 << 23) - 1);

    /// Returns None when `value` does not fit in 24 bits.
    pub fn new(value: i32) -> Option<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Keep the low 24 bits of `value`, sign-extending bit 23.
    pub fn wrapping_from_i32(value: i32) -> Self {
        Self((value << 8) >> 8)
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

/// A sample type a stream can carry.
///
/// `Native` is the type handed to the driver. It equals `Self` for every
/// format except [`I24`], which travels left-aligned in an `i32`.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const FORMAT: SampleFormat;

    type Native: cpal::SizedSample + Send + 'static;

    /// Decode one sample from exactly `FORMAT.bytes()` little-endian bytes.
    fn from_le_bytes(bytes: &[u8]) -> Self;

    /// Encode into exactly `FORMAT.bytes()` little-endian bytes.
    fn write_le_bytes(self, out: &mut [u8]);

    fn to_native(self) -> Self::Native;

    fn from_native(native: Self::Native) -> Self;
}

macro_rules! impl_sample_identity {
    ($ty:ty, $format:expr) => {
        impl Sample for $ty {
            const FORMAT: SampleFormat = $format;

            type Native = $ty;

            #[inline]
            fn from_le_bytes(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }

            #[inline]
            fn write_le_bytes(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn to_native(self) -> Self::Native {
                self
            }

            #[inline]
            fn from_native(native: Self::Native) -> Self {
                native
            }
        }
    };
}

impl_sample_identity!(i8, SampleFormat::I8);
impl_sample_identity!(u8, SampleFormat::U8);
impl_sample_identity!(i16, SampleFormat::I16);
impl_sample_identity!(i32, SampleFormat::I32);
impl_sample_identity!(f32, SampleFormat::F32);

impl Sample for I24 {
    const FORMAT: SampleFormat = SampleFormat::I24;

    type Native = i32;

    #[inline]
    fn from_le_bytes(bytes: &[u8]) -> Self {
        I24(i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8)
    }

    #[inline]
    fn write_le_bytes(self, out: &mut [u8]) {
        out.copy_from_slice(&self.0.to_le_bytes()[..3]);
    }

    #[inline]
    fn to_native(self) -> i32 {
        self.0 << 8
    }

    #[inline]
    fn from_native(native: i32) -> Self {
        I24(native >> 8)
    }
}

/// Decode a packed little-endian byte block into `out`.
///
/// `bytes.len()` must equal `out.len() * T::FORMAT.bytes()`.
pub fn decode_le<T: Sample>(bytes: &[u8], out: &mut [T]) {
    let width = T::FORMAT.bytes();
    debug_assert_eq!(bytes.len(), out.len() * width);
    for (sample, chunk) in out.iter_mut().zip(bytes.chunks_exact(width)) {
        *sample = T::from_le_bytes(chunk);
    }
}

/// Encode samples into a packed little-endian byte block.
pub fn encode_le<T: Sample>(samples: &[T], out: &mut [u8]) {
    let width = T::FORMAT.bytes();
    debug_assert_eq!(out.len(), samples.len() * width);
    for (sample, chunk) in samples.iter().zip(out.chunks_exact_mut(width)) {
        sample.write_le_bytes(chunk);
    }
}
