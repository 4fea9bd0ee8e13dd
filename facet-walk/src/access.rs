//! Re-applying a recorded [`WalkPath`] to another value.
//!
//! A path recorded while walking one value addresses the corresponding node
//! in any other value of the same type. [`WalkPath::try_traverse`] follows it
//! and reports every way that can go wrong as a [`TraverseError`]; it never
//! panics, even if reflection does.

use std::panic::{AssertUnwindSafe, catch_unwind};

use facet_core::Shape;
use facet_reflect::Peek;

use crate::walk::{ascending, render_key};
use crate::{PathStep, ShapeKind, WalkPath, trace};

/// Error returned by [`WalkPath::try_traverse`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TraverseError {
    /// The root does not have the shape the path was recorded on.
    RootShapeMismatch {
        /// The shape the path was recorded on.
        expected: &'static Shape,
        /// The shape of the root it was applied to.
        found: &'static Shape,
    },

    /// The step kind doesn't apply to the current shape.
    ///
    /// For example, a field step on a list, or an index step on a struct.
    WrongStepKind {
        /// The step that didn't apply.
        step: PathStep,
        /// Index of this step in the path (0-based).
        step_index: usize,
        /// The shape at the point where the step was attempted.
        shape: &'static Shape,
    },

    /// A field or element index is out of bounds.
    IndexOutOfBounds {
        /// Index of this step in the path (0-based).
        step_index: usize,
        /// The shape of the container.
        shape: &'static Shape,
        /// The index that was requested.
        index: usize,
        /// The number of available items.
        bound: usize,
    },

    /// No entry of the map renders as the recorded key.
    MissingKey {
        /// Index of this step in the path (0-based).
        step_index: usize,
        /// The map shape.
        shape: &'static Shape,
        /// The recorded key.
        key: String,
    },

    /// A `Deref` step reached a `None` or a pointer with nothing behind it.
    Absent {
        /// Index of this step in the path (0-based).
        step_index: usize,
        /// The option or pointer shape.
        shape: &'static Shape,
    },

    /// The path goes through a [`PathStep::Placeholder`], which addresses no
    /// real value.
    Placeholder {
        /// Index of this step in the path (0-based).
        step_index: usize,
    },

    /// Reflection refused an access along the way.
    Reflect {
        /// Index of this step in the path (0-based).
        step_index: usize,
        /// Rendered reflection error.
        message: String,
    },

    /// Traversal panicked; the panic was caught and its message kept.
    Panicked {
        /// The path being traversed.
        path: WalkPath,
        /// The panic payload, if it was a string.
        message: String,
    },
}

impl core::fmt::Display for TraverseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TraverseError::RootShapeMismatch { expected, found } => {
                write!(f, "path recorded on {expected} applied to {found}")
            }
            TraverseError::WrongStepKind {
                step,
                step_index,
                shape,
            } => {
                write!(
                    f,
                    "step {step_index} ({step:?}) does not apply to shape {shape}"
                )
            }
            TraverseError::IndexOutOfBounds {
                step_index,
                shape,
                index,
                bound,
            } => {
                write!(
                    f,
                    "step {step_index}: index {index} out of bounds for {shape} (has {bound})"
                )
            }
            TraverseError::MissingKey {
                step_index,
                shape,
                key,
            } => {
                write!(f, "step {step_index}: {shape} has no key {key:?}")
            }
            TraverseError::Absent { step_index, shape } => {
                write!(
                    f,
                    "step {step_index}: {shape} holds no value to dereference"
                )
            }
            TraverseError::Placeholder { step_index } => {
                write!(
                    f,
                    "step {step_index}: a placeholder does not address a value"
                )
            }
            TraverseError::Reflect {
                step_index,
                message,
            } => {
                write!(f, "step {step_index}: {message}")
            }
            TraverseError::Panicked { path, message } => {
                write!(f, "traversing {path} panicked: {message}")
            }
        }
    }
}

impl core::error::Error for TraverseError {}

impl WalkPath {
    /// Follow this path from `root` and return the node it addresses.
    ///
    /// `root` should have the shape of the value the path was recorded on.
    /// Every step is checked against the live value; a panic raised by
    /// reflection is caught and returned as [`TraverseError::Panicked`].
    pub fn try_traverse<'mem, 'facet>(
        &self,
        root: Peek<'mem, 'facet>,
    ) -> Result<Peek<'mem, 'facet>, TraverseError> {
        trace!(path = %self, root = %root.shape(), "try_traverse");
        match catch_unwind(AssertUnwindSafe(|| self.traverse(root))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_owned());
                Err(TraverseError::Panicked {
                    path: self.clone(),
                    message,
                })
            }
        }
    }

    /// Like [`WalkPath::try_traverse`], but first checks that `root` has the
    /// `expected` shape the path was recorded on.
    pub fn try_traverse_as<'mem, 'facet>(
        &self,
        root: Peek<'mem, 'facet>,
        expected: &'static Shape,
    ) -> Result<Peek<'mem, 'facet>, TraverseError> {
        if root.shape().id != expected.id {
            return Err(TraverseError::RootShapeMismatch {
                expected,
                found: root.shape(),
            });
        }
        self.try_traverse(root)
    }

    fn traverse<'mem, 'facet>(
        &self,
        root: Peek<'mem, 'facet>,
    ) -> Result<Peek<'mem, 'facet>, TraverseError> {
        let mut current = root;
        for (step_index, step) in self.steps().iter().enumerate() {
            current = traverse_step(current, step, step_index)?;
        }
        Ok(current)
    }
}

fn traverse_step<'mem, 'facet>(
    current: Peek<'mem, 'facet>,
    step: &PathStep,
    step_index: usize,
) -> Result<Peek<'mem, 'facet>, TraverseError> {
    let shape = current.shape();
    let reflect = |e: &dyn core::fmt::Display| TraverseError::Reflect {
        step_index,
        message: e.to_string(),
    };
    let wrong_kind = || TraverseError::WrongStepKind {
        step: step.clone(),
        step_index,
        shape,
    };

    match (step, ShapeKind::of(shape)) {
        (PathStep::Placeholder, _) => Err(TraverseError::Placeholder { step_index }),

        (PathStep::Field { index, .. }, ShapeKind::Struct(st)) => {
            if *index >= st.fields.len() {
                return Err(TraverseError::IndexOutOfBounds {
                    step_index,
                    shape,
                    index: *index,
                    bound: st.fields.len(),
                });
            }
            current
                .into_struct()
                .map_err(|e| reflect(&e))?
                .field(*index)
                .map_err(|e| reflect(&e))
        }

        (PathStep::Index(index), ShapeKind::List { .. } | ShapeKind::Array { .. }) => {
            let list = current.into_list_like().map_err(|e| reflect(&e))?;
            let bound = list.len();
            list.get(*index).ok_or(TraverseError::IndexOutOfBounds {
                step_index,
                shape,
                index: *index,
                bound,
            })
        }

        (PathStep::Index(index), ShapeKind::Set { .. }) => {
            // Sets are addressed in ascending order, as the walker visits them.
            let mut items: Vec<_> = current
                .into_set()
                .map_err(|e| reflect(&e))?
                .iter()
                .collect();
            let bound = items.len();
            items.sort_by(ascending);
            items
                .get(*index)
                .copied()
                .ok_or(TraverseError::IndexOutOfBounds {
                    step_index,
                    shape,
                    index: *index,
                    bound,
                })
        }

        (PathStep::MapKey(key), ShapeKind::Map { .. }) => current
            .into_map()
            .map_err(|e| reflect(&e))?
            .iter()
            .find(|(k, _)| render_key(*k) == *key)
            .map(|(_, v)| v)
            .ok_or_else(|| TraverseError::MissingKey {
                step_index,
                shape,
                key: key.clone(),
            }),

        (PathStep::Deref, ShapeKind::Option { .. }) => current
            .into_option()
            .map_err(|e| reflect(&e))?
            .value()
            .ok_or(TraverseError::Absent { step_index, shape }),

        (PathStep::Deref, ShapeKind::Pointer { .. }) => current
            .into_pointer()
            .map_err(|e| reflect(&e))?
            .borrow_inner()
            .ok_or(TraverseError::Absent { step_index, shape }),

        (PathStep::Deref, ShapeKind::Transparent { .. }) => current
            .into_struct()
            .map_err(|e| reflect(&e))?
            .field(0)
            .map_err(|e| reflect(&e)),

        _ => Err(wrong_kind()),
    }
}
