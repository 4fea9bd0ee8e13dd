//! Errors raised by [`value_from`](crate::value_from) and
//! [`value_to`](crate::value_to).

use facet_walk::{WalkError, WalkPath};
use miette::Diagnostic;
use thiserror::Error;

use crate::{AttrType, Number};

static ROOT: WalkPath = WalkPath::root();

fn or_root(path: &Option<WalkPath>) -> &WalkPath {
    path.as_ref().unwrap_or(&ROOT)
}

/// A conversion failure, located at the node where it happened.
#[derive(Debug, Error)]
#[error("{}: {kind}", or_root(.path))]
pub struct AttrError {
    path: Option<WalkPath>,
    kind: AttrErrorKind,
}

impl AttrError {
    /// An error that has not been located yet.
    ///
    /// The engine fills in the path of the node being converted when the
    /// error surfaces from a converter.
    pub fn new(kind: AttrErrorKind) -> Self {
        Self { path: None, kind }
    }

    /// A free-form conversion error, for use in converters.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(AttrErrorKind::Custom(message.into()))
    }

    pub(crate) fn reflect(error: impl core::fmt::Display) -> Self {
        Self::new(AttrErrorKind::Reflect(error.to_string()))
    }

    /// Locate this error at `path`, unless it is already located.
    ///
    /// Nested conversions locate their own errors, so an error is wrapped
    /// with exactly one path no matter how many frames it crosses.
    #[must_use]
    pub fn at(mut self, path: &WalkPath) -> Self {
        if self.path.is_none() {
            self.path = Some(path.clone());
        }
        self
    }

    /// Where the error happened. Unlocated errors report `<root>`.
    pub fn path(&self) -> &WalkPath {
        or_root(&self.path)
    }

    /// What went wrong.
    pub fn kind(&self) -> &AttrErrorKind {
        &self.kind
    }

    /// Which family of failure this is.
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    /// Shorthand for `self.class() == ErrorClass::InvariantViolation`.
    pub fn is_invariant_violation(&self) -> bool {
        self.class() == ErrorClass::InvariantViolation
    }
}

impl From<AttrErrorKind> for AttrError {
    fn from(kind: AttrErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<WalkError> for AttrError {
    fn from(error: WalkError) -> Self {
        let path = error.path().clone();
        Self::new(AttrErrorKind::Walk(error)).at(&path)
    }
}

impl Diagnostic for AttrError {
    fn code<'a>(&'a self) -> Option<Box<dyn core::fmt::Display + 'a>> {
        self.kind.code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn core::fmt::Display + 'a>> {
        match &self.kind {
            AttrErrorKind::MissingAttribute {
                suggestion: Some(s),
                ..
            }
            | AttrErrorKind::UnexpectedAttribute {
                suggestion: Some(s),
                ..
            } => Some(Box::new(format!("did you mean `{s}`?"))),
            kind => kind.help(),
        }
    }
}

/// The three families of [`AttrError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The Rust type cannot be represented as an attribute tree at all: a
    /// missing attribute name, elements of differing types, an unsupported
    /// kind. Fix the type, not the data.
    InvariantViolation,
    /// A value could not be converted: an inexact number, a converter that
    /// rejected its input.
    Conversion,
    /// The tree disagrees with the type it is being read into.
    Protocol,
}

/// What went wrong.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum AttrErrorKind {
    // invariant violations
    /// A struct field has no external attribute name.
    #[error("field `{field}` of {type_name} has no attribute name")]
    #[diagnostic(
        code(facet_attr::missing_attribute_name),
        help("add #[facet(rename = \"...\")] to the field, or #[facet(skip)] to exclude it")
    )]
    MissingAttributeName {
        /// Rust name of the field.
        field: &'static str,
        /// The struct declaring it.
        type_name: String,
    },

    /// Elements of one list, set or map converted to different types.
    #[error("elements have differing types: {first} and {other}")]
    #[diagnostic(code(facet_attr::heterogeneous_elements))]
    HeterogeneousElements {
        /// Type of the first element.
        first: AttrType,
        /// Type of the element that disagreed with it.
        other: AttrType,
    },

    /// The type has a kind with no attribute representation.
    #[error("{kind} type {type_name} has no attribute representation")]
    #[diagnostic(
        code(facet_attr::unsupported),
        help("register a converter for the type")
    )]
    Unsupported {
        /// Short name of the kind, e.g. `"enum"`.
        kind: &'static str,
        /// The offending type.
        type_name: String,
    },

    /// A type contains itself, so its attribute type would be infinite.
    #[error("recursive type {type_name} has no finite attribute type")]
    #[diagnostic(code(facet_attr::recursive_type))]
    RecursiveType {
        /// The type that recurs.
        type_name: String,
    },

    /// The walker could not descend into a value.
    #[error("{}", .0.reason())]
    #[diagnostic(code(facet_attr::walk))]
    Walk(WalkError),

    // conversion errors
    /// A number does not fit the target exactly.
    #[error("{number} cannot be represented exactly as {target}")]
    #[diagnostic(code(facet_attr::inexact))]
    Inexact {
        /// The number in the tree.
        number: Number,
        /// The target type.
        target: String,
    },

    /// A converter was handed a value of a type it was not registered for.
    #[error("converter expected {expected}, got {found}")]
    #[diagnostic(code(facet_attr::converter_mismatch))]
    ConverterMismatch {
        /// Type the converter handles.
        expected: String,
        /// Type it was given.
        found: String,
    },

    /// A null tree reached a type with no zero value.
    #[error("{type_name} has no zero value")]
    #[diagnostic(
        code(facet_attr::no_zero_value),
        help("derive Default for the type, or build its converter with ToConverter::passing_nulls")
    )]
    NoZeroValue {
        /// The target type.
        type_name: String,
    },

    /// Reflection refused an operation.
    #[error("reflection error: {0}")]
    #[diagnostic(code(facet_attr::reflect))]
    Reflect(String),

    /// Error reported by a converter.
    #[error("{0}")]
    #[diagnostic(code(facet_attr::custom))]
    Custom(String),

    // protocol errors
    /// The tree's type disagrees with the target.
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(facet_attr::type_mismatch))]
    TypeMismatch {
        /// What the target needs, e.g. `"list"`.
        expected: String,
        /// The type found in the tree.
        found: AttrType,
    },

    /// An unknown value reached a target that cannot hold one.
    #[error("unknown value cannot be stored in {target}")]
    #[diagnostic(
        code(facet_attr::unknown_value),
        help("use Unknowable<T> for the field, or convert with Options::zero_unknowns()")
    )]
    UnknownValue {
        /// The target type.
        target: String,
    },

    /// The tree lacks an attribute a struct field needs.
    #[error("missing attribute `{name}` (available: {})", .available.join(", "))]
    #[diagnostic(code(facet_attr::missing_attribute))]
    MissingAttribute {
        /// The attribute name.
        name: String,
        /// The attribute names the tree does have.
        available: Vec<String>,
        /// The closest available name, if any is close.
        suggestion: Option<String>,
    },

    /// The tree has an attribute no struct field claims.
    #[error("unexpected attribute `{name}`")]
    #[diagnostic(code(facet_attr::unexpected_attribute))]
    UnexpectedAttribute {
        /// The attribute name.
        name: String,
        /// The closest field attribute name, if any is close.
        suggestion: Option<String>,
    },

    /// A fixed-size array received the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    #[diagnostic(code(facet_attr::length_mismatch))]
    LengthMismatch {
        /// The array length.
        expected: usize,
        /// Elements in the tree.
        found: usize,
    },

    /// A payload does not match the type it was declared with.
    #[error("payload does not match {ty}: {reason}")]
    #[diagnostic(code(facet_attr::invalid_payload))]
    InvalidPayload {
        /// The declared type.
        ty: AttrType,
        /// What disagreed.
        reason: String,
    },
}

/// Map a reflection error to an [`AttrError`] located at `path`.
pub(crate) fn located<E: core::fmt::Display>(path: &WalkPath) -> impl FnOnce(E) -> AttrError + '_ {
    move |e| AttrError::reflect(e).at(path)
}

impl AttrErrorKind {
    /// Which family of failure this is.
    pub fn class(&self) -> ErrorClass {
        match self {
            AttrErrorKind::MissingAttributeName { .. }
            | AttrErrorKind::HeterogeneousElements { .. }
            | AttrErrorKind::Unsupported { .. }
            | AttrErrorKind::RecursiveType { .. }
            | AttrErrorKind::Walk(_) => ErrorClass::InvariantViolation,
            AttrErrorKind::Inexact { .. }
            | AttrErrorKind::ConverterMismatch { .. }
            | AttrErrorKind::NoZeroValue { .. }
            | AttrErrorKind::Reflect(_)
            | AttrErrorKind::Custom(_) => ErrorClass::Conversion,
            AttrErrorKind::TypeMismatch { .. }
            | AttrErrorKind::UnknownValue { .. }
            | AttrErrorKind::MissingAttribute { .. }
            | AttrErrorKind::UnexpectedAttribute { .. }
            | AttrErrorKind::LengthMismatch { .. }
            | AttrErrorKind::InvalidPayload { .. } => ErrorClass::Protocol,
        }
    }
}

/// The closest candidate to `name`, if one is close enough to be a likely
/// typo.
#[cfg(feature = "suggestions")]
pub(crate) fn suggest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    candidates
        .into_iter()
        .map(|c| (c, strsim::jaro_winkler(name, c)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c.to_owned())
}

#[cfg(not(feature = "suggestions"))]
pub(crate) fn suggest<'a>(_name: &str, _candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    None
}
