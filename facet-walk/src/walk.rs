//! Value visitor API for deterministic traversal of reflected values.
//!
//! [`walk`] descends a value through [`Peek`], emitting a [`WalkPath`] for
//! every node it reaches. Where the value has nothing to show (a `None`, an
//! empty container) the walker can keep going with an *absent* [`Node`]: a
//! node that carries only a [`Shape`]. That way the full static shape of the
//! value is always discoverable, even from a value that is mostly empty.
//!
//! # Traversal order
//!
//! - **Depth-first, pre-order.** A node is visited before its children.
//! - Struct fields come in declaration order, flattened fields included.
//! - List, array and slice elements come in index order.
//! - Set elements and map entries come in **ascending order**, never in the
//!   container's own iteration order. Keys are compared with
//!   [`PartialOrd`] and fall back to their rendered form when not comparable.
//!
//! # Traversal control
//!
//! [`Visitor::visit`] returns:
//!
//! | Return                           | Effect                           |
//! |----------------------------------|----------------------------------|
//! | `Ok(VisitDecision::Recurse)`     | Visit children.                  |
//! | `Ok(VisitDecision::SkipChildren)`| Prune everything below the node. |
//! | `Err(e)`                         | Abort the walk with `e`.         |
//!
//! # Absent nodes
//!
//! | Situation                                  | Child                              |
//! |--------------------------------------------|------------------------------------|
//! | `None` / dangling pointer                  | `Deref` to an absent pointee       |
//! | same, below a `#[facet(flatten)]` field    | only with [`WalkOptions::visit_embedded_nil_structs`] |
//! | empty (or absent) list, set, map           | one `Placeholder` with [`WalkOptions::visit_empty_containers`] |
//! | absent struct                              | every field, absent                |
//!
//! An absent node whose shape is already one of its ancestors is reported but
//! not expanded, so recursive types terminate.

use core::cmp::Ordering;

use facet_core::{ConstTypeId, Def, Field, Shape, StructType, Type, UserType};
use facet_reflect::Peek;

use crate::{PathStep, WalkError, WalkPath, trace};

/// Decision returned by [`Visitor::visit`] to control traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitDecision {
    /// Descend into this node's children.
    Recurse,
    /// Skip this node's descendants.
    SkipChildren,
}

/// Callbacks for [`walk`].
pub trait Visitor<'mem, 'facet> {
    /// Error type of the visitor. Walk failures convert into it.
    type Error: From<WalkError>;

    /// Called for every node, parent before children.
    fn visit(
        &mut self,
        path: &WalkPath,
        node: &Node<'mem, 'facet>,
    ) -> Result<VisitDecision, Self::Error>;
}

/// Options for [`walk`] and [`Node::children`].
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    root: WalkPath,
    visit_empty_containers: bool,
    visit_embedded_nil_structs: bool,
}

impl WalkOptions {
    /// Default options: no placeholders, start at `<root>`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give every empty list, set or map one [`PathStep::Placeholder`]
    /// child so the element shape can still be discovered.
    #[must_use]
    pub fn visit_empty_containers(mut self) -> Self {
        self.visit_empty_containers = true;
        self
    }

    /// Keep descending through a `None` below a flattened field, into an
    /// absent node of the pointee shape.
    #[must_use]
    pub fn visit_embedded_nil_structs(mut self) -> Self {
        self.visit_embedded_nil_structs = true;
        self
    }

    /// Report every path relative to `root` instead of `<root>`.
    #[must_use]
    pub fn with_root(mut self, root: WalkPath) -> Self {
        self.root = root;
        self
    }

    /// The path prefix the walk starts at.
    pub fn root(&self) -> &WalkPath {
        &self.root
    }
}

/// The walker's classification of a [`Shape`].
///
/// Every shape the walker accepts falls into exactly one variant, and every
/// consumer dispatches on this enum instead of re-inspecting `ty`/`def`.
#[derive(Debug, Clone, Copy)]
pub enum ShapeKind {
    /// A leaf: bool, numbers, strings and other `Def::Scalar` types.
    Scalar,
    /// `Option<T>`.
    Option {
        /// Shape of `T`.
        inner: &'static Shape,
    },
    /// `Box<T>`, `Arc<T>`, `&T` and other pointers with a known pointee.
    Pointer {
        /// Shape of `T`.
        pointee: &'static Shape,
    },
    /// A `#[facet(transparent)]` newtype.
    Transparent {
        /// Shape of the wrapped type.
        inner: &'static Shape,
    },
    /// `Vec<T>`, `[T]` and other growable or unsized sequences.
    List {
        /// Shape of `T`.
        element: &'static Shape,
    },
    /// `[T; N]`.
    Array {
        /// Shape of `T`.
        element: &'static Shape,
        /// `N`.
        len: usize,
    },
    /// `HashSet<T>`, `BTreeSet<T>`.
    Set {
        /// Shape of `T`.
        element: &'static Shape,
    },
    /// `HashMap<K, V>`, `BTreeMap<K, V>`.
    Map {
        /// Shape of `K`.
        key: &'static Shape,
        /// Shape of `V`.
        value: &'static Shape,
    },
    /// A struct, tuple struct, tuple or unit struct.
    Struct(&'static StructType),
    /// Anything the walker refuses to descend into.
    Unsupported(&'static str),
}

impl ShapeKind {
    /// Classify `shape`.
    pub fn of(shape: &'static Shape) -> Self {
        match shape.def {
            Def::Scalar => return ShapeKind::Scalar,
            Def::Option(od) => return ShapeKind::Option { inner: od.t() },
            Def::Pointer(pd) => {
                return match pd.pointee() {
                    Some(pointee) => ShapeKind::Pointer { pointee },
                    None => ShapeKind::Unsupported("opaque pointer"),
                };
            }
            Def::List(ld) => return ShapeKind::List { element: ld.t() },
            Def::Slice(sd) => return ShapeKind::List { element: sd.t() },
            Def::Array(ad) => {
                return ShapeKind::Array {
                    element: ad.t(),
                    len: ad.n,
                };
            }
            Def::Set(sd) => return ShapeKind::Set { element: sd.t() },
            Def::Map(md) => {
                return ShapeKind::Map {
                    key: md.k(),
                    value: md.v(),
                };
            }
            Def::Result(_) => return ShapeKind::Unsupported("result"),
            Def::DynamicValue(_) => return ShapeKind::Unsupported("dynamic value"),
            _ => {}
        }

        if shape.scalar_type().is_some() {
            return ShapeKind::Scalar;
        }

        match &shape.ty {
            Type::User(UserType::Struct(st)) => match shape.inner {
                Some(inner) if st.fields.len() == 1 => ShapeKind::Transparent { inner },
                _ => ShapeKind::Struct(st),
            },
            Type::User(UserType::Enum(_)) => ShapeKind::Unsupported("enum"),
            Type::User(UserType::Union(_)) => ShapeKind::Unsupported("union"),
            Type::Pointer(_) => ShapeKind::Unsupported("pointer"),
            _ => ShapeKind::Unsupported("opaque"),
        }
    }
}

/// One node of a walked value.
///
/// A node either wraps a live [`Peek`] or is *absent*: it has a shape but no
/// value, standing in for a `None` or for the element of an empty container.
#[derive(Clone, Copy)]
pub struct Node<'mem, 'facet> {
    shape: &'static Shape,
    peek: Option<Peek<'mem, 'facet>>,
    field: Option<&'static Field>,
}

impl<'mem, 'facet> Node<'mem, 'facet> {
    /// A node for a live value.
    pub fn new(peek: Peek<'mem, 'facet>) -> Self {
        Self {
            shape: peek.shape(),
            peek: Some(peek),
            field: None,
        }
    }

    /// A node for a value of type `T`.
    pub fn of<T: facet_core::Facet<'facet>>(value: &'mem T) -> Self {
        Self::new(Peek::new(value))
    }

    /// A node with a shape but no value.
    pub fn absent(shape: &'static Shape) -> Self {
        Self {
            shape,
            peek: None,
            field: None,
        }
    }

    /// Attach the struct field this node was reached through.
    #[must_use]
    pub fn in_field(mut self, field: &'static Field) -> Self {
        self.field = Some(field);
        self
    }

    /// Shape of the node.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// The live value, unless the node is absent.
    pub fn peek(&self) -> Option<Peek<'mem, 'facet>> {
        self.peek
    }

    /// Whether the node has no value.
    pub fn is_absent(&self) -> bool {
        self.peek.is_none()
    }

    /// The struct field this node belongs to.
    ///
    /// Dereferences keep the field of the node they start from, so the
    /// `T` inside a field of type `Option<T>` still reports that field.
    pub fn field(&self) -> Option<&'static Field> {
        self.field
    }

    /// Whether the node sits under a `#[facet(flatten)]` field.
    pub fn is_embedded(&self) -> bool {
        self.field.is_some_and(|f| f.is_flattened())
    }

    /// Classification of the node's shape.
    pub fn kind(&self) -> ShapeKind {
        ShapeKind::of(self.shape)
    }

    /// The direct children of this node, in walk order.
    ///
    /// `path` is only used to label errors.
    pub fn children(
        &self,
        path: &WalkPath,
        options: &WalkOptions,
    ) -> Result<Vec<Child<'mem, 'facet>>, WalkError> {
        let reflect = |e: &dyn core::fmt::Display| WalkError::Reflect {
            shape: self.shape,
            path: path.clone(),
            message: e.to_string(),
        };

        let mut children = Vec::new();
        match self.kind() {
            ShapeKind::Scalar => {}
            ShapeKind::Option { inner } => {
                let some = match self.peek {
                    Some(peek) => peek.into_option().map_err(|e| reflect(&e))?.value(),
                    None => None,
                };
                self.push_deref(&mut children, some, inner, options);
            }
            ShapeKind::Pointer { pointee } => {
                let target = match self.peek {
                    Some(peek) => peek.into_pointer().map_err(|e| reflect(&e))?.borrow_inner(),
                    None => None,
                };
                self.push_deref(&mut children, target, pointee, options);
            }
            ShapeKind::Transparent { inner } => {
                let target = match self.peek {
                    Some(peek) => Some(
                        peek.into_struct()
                            .map_err(|e| reflect(&e))?
                            .field(0)
                            .map_err(|e| reflect(&e))?,
                    ),
                    None => None,
                };
                self.push_deref(&mut children, target, inner, options);
            }
            ShapeKind::List { element } | ShapeKind::Array { element, .. } => {
                if let Some(peek) = self.peek {
                    let list = peek.into_list_like().map_err(|e| reflect(&e))?;
                    for (i, item) in list.iter().enumerate() {
                        children.push(Child::new(PathStep::Index(i), Node::new(item)));
                    }
                }
                self.push_placeholder(&mut children, element, options);
            }
            ShapeKind::Set { element } => {
                if let Some(peek) = self.peek {
                    let mut items: Vec<_> = peek.into_set().map_err(|e| reflect(&e))?.iter().collect();
                    items.sort_by(ascending);
                    for (i, item) in items.into_iter().enumerate() {
                        children.push(Child::new(PathStep::Index(i), Node::new(item)));
                    }
                }
                self.push_placeholder(&mut children, element, options);
            }
            ShapeKind::Map { value, .. } => {
                if let Some(peek) = self.peek {
                    let mut entries: Vec<_> = peek.into_map().map_err(|e| reflect(&e))?.iter().collect();
                    entries.sort_by(|(a, _), (b, _)| ascending(a, b));
                    for (key, val) in entries {
                        children.push(Child::new(PathStep::MapKey(render_key(key)), Node::new(val)));
                    }
                }
                self.push_placeholder(&mut children, value, options);
            }
            ShapeKind::Struct(st) => {
                let fields = match self.peek {
                    Some(peek) => {
                        let ps = peek.into_struct().map_err(|e| reflect(&e))?;
                        let mut values = Vec::with_capacity(st.fields.len());
                        for i in 0..st.fields.len() {
                            values.push(Some(ps.field(i).map_err(|e| reflect(&e))?));
                        }
                        values
                    }
                    None => vec![None; st.fields.len()],
                };
                for (index, (field, value)) in st.fields.iter().zip(fields).enumerate() {
                    let node = match value {
                        Some(peek) => Node::new(peek),
                        None => Node::absent(field.shape()),
                    };
                    children.push(Child::new(
                        PathStep::Field {
                            index,
                            name: field.name,
                        },
                        node.in_field(field),
                    ));
                }
            }
            ShapeKind::Unsupported(kind) => {
                return Err(WalkError::Unsupported {
                    kind,
                    shape: self.shape,
                    path: path.clone(),
                });
            }
        }
        Ok(children)
    }

    fn push_deref(
        &self,
        children: &mut Vec<Child<'mem, 'facet>>,
        target: Option<Peek<'mem, 'facet>>,
        pointee: &'static Shape,
        options: &WalkOptions,
    ) {
        let node = match target {
            Some(peek) => Node::new(peek),
            None if self.is_embedded() && !options.visit_embedded_nil_structs => return,
            None => Node::absent(pointee),
        };
        let node = Node {
            field: self.field,
            ..node
        };
        children.push(Child::new(PathStep::Deref, node));
    }

    fn push_placeholder(
        &self,
        children: &mut Vec<Child<'mem, 'facet>>,
        element: &'static Shape,
        options: &WalkOptions,
    ) {
        if children.is_empty() && options.visit_empty_containers {
            children.push(Child::new(PathStep::Placeholder, Node::absent(element)));
        }
    }
}

impl core::fmt::Debug for Node<'_, '_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.peek {
            Some(peek) => write!(f, "Node({} = {peek})", self.shape),
            None => write!(f, "Node({} absent)", self.shape),
        }
    }
}

/// A child of a [`Node`] together with the step that reaches it.
#[derive(Debug, Clone)]
pub struct Child<'mem, 'facet> {
    /// The step from the parent to this child.
    pub step: PathStep,
    /// The child itself.
    pub node: Node<'mem, 'facet>,
}

impl<'mem, 'facet> Child<'mem, 'facet> {
    fn new(step: PathStep, node: Node<'mem, 'facet>) -> Self {
        Self { step, node }
    }
}

/// Render a map key for a [`PathStep::MapKey`].
pub fn render_key(key: Peek<'_, '_>) -> String {
    match key.as_str() {
        Some(s) => s.to_owned(),
        None => key.to_string(),
    }
}

pub(crate) fn ascending<'mem, 'facet>(a: &Peek<'mem, 'facet>, b: &Peek<'mem, 'facet>) -> Ordering {
    PartialOrd::partial_cmp(a, b).unwrap_or_else(|| render_key(*a).cmp(&render_key(*b)))
}

/// Walk `root` depth-first, calling `visitor` at each node.
///
/// See the [module docs](self) for traversal order and control semantics.
pub fn walk<'mem, 'facet, V>(
    root: Node<'mem, 'facet>,
    visitor: &mut V,
    options: &WalkOptions,
) -> Result<(), V::Error>
where
    V: Visitor<'mem, 'facet>,
{
    let mut ancestors: Vec<ConstTypeId> = Vec::new();
    walk_recursive(options.root().clone(), root, visitor, options, &mut ancestors)
}

fn walk_recursive<'mem, 'facet, V>(
    path: WalkPath,
    node: Node<'mem, 'facet>,
    visitor: &mut V,
    options: &WalkOptions,
    ancestors: &mut Vec<ConstTypeId>,
) -> Result<(), V::Error>
where
    V: Visitor<'mem, 'facet>,
{
    trace!(%path, shape = %node.shape(), absent = node.is_absent(), "visit");

    if visitor.visit(&path, &node)? == VisitDecision::SkipChildren {
        return Ok(());
    }

    // An absent node of a type already on the path would expand forever.
    let id = node.shape().id;
    if node.is_absent() && ancestors.contains(&id) {
        return Ok(());
    }

    let children = node.children(&path, options)?;
    ancestors.push(id);
    let result = children.into_iter().try_for_each(|child| {
        walk_recursive(path.join(child.step), child.node, visitor, options, ancestors)
    });
    ancestors.pop();
    result
}
