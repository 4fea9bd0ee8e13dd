use core::fmt;

/// An exact numeric payload.
///
/// Integers keep their full precision; conversions out of a `Number` either
/// succeed exactly or return `None`. Nothing is truncated or rounded, apart
/// from the narrowing of a float to `f32`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// A signed integer.
    Int(i64),
    /// An unsigned integer too large for, or produced from, an unsigned type.
    UInt(u64),
    /// A binary floating point number.
    Float(f64),
}

// Largest integer magnitude an f64 represents without gaps.
const F64_EXACT: u64 = 1 << 53;

impl Number {
    /// The value as an `i128`, if it is an integer (or an integral float).
    pub fn to_i128(self) -> Option<i128> {
        match self {
            Number::Int(i) => Some(i128::from(i)),
            Number::UInt(u) => Some(i128::from(u)),
            Number::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 2f64.powi(127) {
                    Some(f as i128)
                } else {
                    None
                }
            }
        }
    }

    /// The value as an `i64`, if it is exactly representable.
    pub fn to_i64(self) -> Option<i64> {
        self.to_i128().and_then(|i| i64::try_from(i).ok())
    }

    /// The value as a `u64`, if it is exactly representable.
    pub fn to_u64(self) -> Option<u64> {
        self.to_i128().and_then(|i| u64::try_from(i).ok())
    }

    /// The value as an `f64`, if it is exactly representable.
    pub fn to_f64(self) -> Option<f64> {
        match self {
            Number::Float(f) => Some(f),
            Number::Int(i) if i.unsigned_abs() <= F64_EXACT => Some(i as f64),
            Number::UInt(u) if u <= F64_EXACT => Some(u as f64),
            _ => None,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Number::Float(a), Number::Float(b)) => a == b,
            (Number::Float(f), n) | (n, Number::Float(f)) => n.to_f64() == Some(f),
            (a, b) => a.to_i128() == b.to_i128(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::UInt(u) => write!(f, "{u}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident => $wide:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Number {
                fn from(n: $t) -> Self {
                    Number::$variant(n as $wide)
                }
            }
        )*
    };
}

impl_from_int!(Int => i64: i8, i16, i32, i64, isize);
impl_from_int!(UInt => u64: u8, u16, u32, u64, usize);

impl From<f32> for Number {
    fn from(n: f32) -> Self {
        Number::Float(f64::from(n))
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::Float(n)
    }
}

impl TryFrom<i128> for Number {
    type Error = i128;

    fn try_from(n: i128) -> Result<Self, i128> {
        if let Ok(i) = i64::try_from(n) {
            Ok(Number::Int(i))
        } else if let Ok(u) = u64::try_from(n) {
            Ok(Number::UInt(u))
        } else {
            Err(n)
        }
    }
}

impl TryFrom<u128> for Number {
    type Error = u128;

    fn try_from(n: u128) -> Result<Self, u128> {
        u64::try_from(n).map(Number::UInt).map_err(|_| n)
    }
}
