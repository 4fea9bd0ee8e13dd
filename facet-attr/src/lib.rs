#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![doc = include_str!("../README.md")]

mod error;
pub use error::{AttrError, AttrErrorKind, ErrorClass};

mod number;
pub use number::Number;

mod ty;
pub use ty::AttrType;

pub mod value;
pub use value::{AttrValue, Payload, State};

mod unknowable;
pub use unknowable::Unknowable;

pub mod options;
pub use options::{Absence, EmptyPolicy, FromConverter, Options, Registry, Scope, ToConverter};

mod from;
pub use from::{type_of, value_from};

mod to;
pub use to::value_to;

pub use facet_walk::{PathStep, WalkPath};

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
#[macro_export]
/// Forwards to tracing::trace when the tracing feature is enabled
macro_rules! trace {
    ($($tt:tt)*) => {};
}
#[cfg(not(feature = "tracing"))]
#[macro_export]
/// Forwards to tracing::debug when the tracing feature is enabled
macro_rules! debug {
    ($($tt:tt)*) => {};
}
