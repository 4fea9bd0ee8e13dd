use facet_core::Shape;

use crate::WalkPath;

/// Error raised while computing the children of a node.
///
/// Both variants describe a type the walker cannot descend into, which is a
/// defect in the type being walked rather than a property of the data.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum WalkError {
    /// The shape has a kind the walker has no rule for (function pointers,
    /// unions, enums other than `Option`, opaque types).
    Unsupported {
        /// Short name of the offending kind, e.g. `"enum"`.
        kind: &'static str,
        /// The offending shape.
        shape: &'static Shape,
        /// Where in the value graph it was found.
        path: WalkPath,
    },

    /// Reflection refused to give access to a node's contents.
    Reflect {
        /// The shape being inspected.
        shape: &'static Shape,
        /// Where in the value graph it happened.
        path: WalkPath,
        /// Rendered reflection error.
        message: String,
    },
}

impl WalkError {
    /// The path of the node that could not be walked.
    pub fn path(&self) -> &WalkPath {
        match self {
            WalkError::Unsupported { path, .. } | WalkError::Reflect { path, .. } => path,
        }
    }

    /// What went wrong, without the path.
    pub fn reason(&self) -> String {
        match self {
            WalkError::Unsupported { kind, shape, .. } => {
                format!("cannot walk {kind} type {shape}")
            }
            WalkError::Reflect { shape, message, .. } => {
                format!("cannot inspect {shape}: {message}")
            }
        }
    }
}

impl core::fmt::Display for WalkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.path(), self.reason())
    }
}

impl core::error::Error for WalkError {}
