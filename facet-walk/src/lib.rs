#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![doc = include_str!("../README.md")]

use core::fmt;

pub mod access;
pub use access::TraverseError;

mod error;
pub use error::WalkError;

pub mod walk;
pub use walk::{Child, Node, ShapeKind, VisitDecision, Visitor, WalkOptions, walk};

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

/// A single step in a [`WalkPath`].
///
/// Steps address nodes in a *value* graph, so a map key is recorded by its
/// rendered key rather than by an entry position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathStep {
    /// Navigate to a struct field.
    Field {
        /// Declaration index of the field.
        index: usize,
        /// Rust name of the field.
        name: &'static str,
    },
    /// Navigate to a list, array, slice or set element by position.
    Index(usize),
    /// The synthetic element visited inside an empty container.
    ///
    /// It stands for "any element" and never addresses a real value.
    Placeholder,
    /// Navigate to the value stored under a map key, rendered as a string.
    MapKey(String),
    /// Navigate through an `Option`, a smart pointer or a transparent wrapper.
    Deref,
}

/// An immutable path from a root value to one of its nodes.
///
/// Paths are built by [`walk`] and by the converters in `facet-attr`; they
/// are never mutated in place. [`WalkPath::join`] returns an extended copy.
///
/// The [`Display`](fmt::Display) form reads like a Rust place expression:
/// fields are `.name`, positions and keys are `[i]`, the placeholder is
/// `[<>]`, and a dereference puts a `*` right after the opening delimiter
/// of the segment it dereferences:
///
/// ```text
/// .*middle.*inner.value
/// .items[*0].name
/// .tags[<>]
/// ```
///
/// The empty path renders as `<root>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalkPath {
    steps: Vec<PathStep>,
}

impl WalkPath {
    /// The empty path, addressing the root itself.
    pub const fn root() -> Self {
        Self { steps: Vec::new() }
    }

    /// Build a path from a sequence of steps.
    pub fn from_steps(steps: impl IntoIterator<Item = PathStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    /// Return a copy of this path extended by `step`.
    #[must_use]
    pub fn join(&self, step: PathStep) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend_from_slice(&self.steps);
        steps.push(step);
        Self { steps }
    }

    /// The path without its last step, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.steps.split_last()?;
        Some(Self {
            steps: rest.to_vec(),
        })
    }

    /// The last step, if any.
    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// Get the steps in this path.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Get the length of this path.
    pub const fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if this path is empty.
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether `prefix` is a leading run of this path's steps.
    pub fn starts_with(&self, prefix: &WalkPath) -> bool {
        self.steps.starts_with(&prefix.steps)
    }
}

impl fmt::Display for WalkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A deref is zero-width: it stars the segment it dereferences.
        let mut segments: Vec<(usize, &PathStep)> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match (step, segments.last_mut()) {
                (PathStep::Deref, Some((stars, _))) => *stars += 1,
                (PathStep::Deref, None) => {}
                (step, _) => segments.push((0, step)),
            }
        }

        if segments.is_empty() {
            return f.write_str("<root>");
        }

        for (stars, step) in segments {
            f.write_str(if matches!(step, PathStep::Field { .. }) {
                "."
            } else {
                "["
            })?;
            for _ in 0..stars {
                f.write_str("*")?;
            }
            match step {
                PathStep::Field { name, .. } => f.write_str(name)?,
                PathStep::Index(i) => write!(f, "{i}]")?,
                PathStep::Placeholder => f.write_str("<>]")?,
                PathStep::MapKey(key) => write!(f, "{key}]")?,
                PathStep::Deref => {}
            }
        }
        Ok(())
    }
}

impl FromIterator<PathStep> for WalkPath {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Self::from_steps(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &'static str) -> PathStep {
        PathStep::Field { index: 0, name }
    }

    #[test]
    fn empty_path_renders_as_root() {
        assert_eq!(WalkPath::root().to_string(), "<root>");
    }

    #[test]
    fn deref_stars_the_segment_it_follows() {
        let path = WalkPath::from_steps([field("a"), PathStep::Deref]);
        assert_eq!(path.to_string(), ".*a");

        let path = WalkPath::from_steps([field("x"), PathStep::Deref, PathStep::Deref]);
        assert_eq!(path.to_string(), ".**x");
    }

    #[test]
    fn root_deref_renders_nothing() {
        let path = WalkPath::from_steps([PathStep::Deref]);
        assert_eq!(path.to_string(), "<root>");

        let path = WalkPath::from_steps([PathStep::Deref, field("a")]);
        assert_eq!(path.to_string(), ".a");
    }

    #[test]
    fn join_does_not_mutate_receiver() {
        let base = WalkPath::root().join(field("a"));
        let longer = base.join(PathStep::Index(3));
        assert_eq!(base.len(), 1);
        assert_eq!(longer.to_string(), ".a[3]");
        assert_eq!(longer.parent(), Some(base.clone()));
        assert!(longer.starts_with(&base));
    }
}
