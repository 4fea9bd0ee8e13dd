//! A value that may not be resolved yet.

use facet::Facet;
use facet_core::Shape;
use facet_walk::{Child, Node, WalkOptions, WalkPath};

use crate::AttrError;

/// A `T` that is present, intentionally absent, or not yet resolved.
///
/// `Option<T>` only distinguishes present from absent. A field of type
/// `Unknowable<T>` also records that its value is unknown, which
/// [`value_from`](crate::value_from) turns into an unknown
/// [`AttrValue`](crate::AttrValue) of `T`'s type and
/// [`value_to`](crate::value_to) turns back.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct Unknowable<T> {
    value: Option<T>,
    unknown: bool,
}

impl<T> Unknowable<T> {
    /// A known value.
    pub fn known(value: T) -> Self {
        Self {
            value: Some(value),
            unknown: false,
        }
    }

    /// An intentionally absent value.
    pub fn null() -> Self {
        Self {
            value: None,
            unknown: false,
        }
    }

    /// A value that is not resolved yet.
    pub fn unknown() -> Self {
        Self {
            value: None,
            unknown: true,
        }
    }

    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        self.unknown
    }

    /// Whether the value is intentionally absent.
    pub fn is_null(&self) -> bool {
        !self.unknown && self.value.is_none()
    }

    /// The value, if it is known.
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The value, if it is known.
    pub fn into_option(self) -> Option<T> {
        self.value
    }
}

impl<T> Default for Unknowable<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<T> for Unknowable<T> {
    fn from(value: T) -> Self {
        Self::known(value)
    }
}

// Every instantiation of `Unknowable` shares one declaration; the two
// fields are reached by position.

pub(crate) const VALUE_FIELD: usize = 0;
pub(crate) const UNKNOWN_FIELD: usize = 1;

pub(crate) fn is_unknowable(shape: &Shape) -> bool {
    shape.decl_id == <Unknowable<()> as Facet<'static>>::SHAPE.decl_id
}

/// Split an `Unknowable` node into its unknown flag and its `value` child.
///
/// An absent node is neither unknown nor present.
pub(crate) fn unwrap<'mem, 'facet>(
    node: &Node<'mem, 'facet>,
    path: &WalkPath,
    options: &WalkOptions,
) -> Result<(bool, Child<'mem, 'facet>), AttrError> {
    let mut children = node.children(path, options)?.into_iter();
    let (Some(value), Some(unknown)) = (children.next(), children.next()) else {
        return Err(AttrError::reflect(format_args!(
            "{} does not have the fields of Unknowable",
            node.shape()
        ))
        .at(path));
    };
    let is_unknown = match unknown.node.peek() {
        Some(peek) => *peek.get::<bool>().map_err(|e| AttrError::reflect(e).at(path))?,
        None => false,
    };
    Ok((is_unknown, value))
}
