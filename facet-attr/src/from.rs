//! Domain values to attribute value trees.

use std::collections::BTreeMap;

use facet_core::{ConstTypeId, Facet, ScalarType, Shape};
use facet_walk::{Child, Node, PathStep, ShapeKind, WalkOptions, WalkPath};

use crate::error::located;
use crate::options::{Absence, EmptyPolicy, Scope};
use crate::unknowable;
use crate::{AttrError, AttrErrorKind, AttrType, AttrValue, Number, Options, Payload, debug, trace};

/// Convert `value` to an attribute value tree.
///
/// Every node of the result carries its full type, including nodes for
/// `None` fields and the elements of empty containers. Errors are located at
/// the node that caused them, relative to [`Options::root`].
pub fn value_from<'facet, T: Facet<'facet>>(
    value: &T,
    options: &Options,
) -> Result<AttrValue, AttrError> {
    value_from_at(value, options, options.root())
}

/// The attribute type values of `T` convert to.
pub fn type_of<'facet, T: Facet<'facet>>(options: &Options) -> Result<AttrType, AttrError> {
    type_of_at(T::SHAPE, options, options.root())
}

pub(crate) fn value_from_at<'facet, T: Facet<'facet>>(
    value: &T,
    options: &Options,
    root: &WalkPath,
) -> Result<AttrValue, AttrError> {
    debug!(shape = %T::SHAPE, %root, "value_from");
    let result = FromCx::new(options).convert(root.clone(), Node::of(value), Flags::default());
    debug!(ok = result.is_ok(), "value_from done");
    result
}

pub(crate) fn type_of_at(
    shape: &'static Shape,
    options: &Options,
    root: &WalkPath,
) -> Result<AttrType, AttrError> {
    FromCx::new(options)
        .convert(root.clone(), Node::absent(shape), Flags::default())
        .map(AttrValue::into_type)
}

/// What the wrappers around a node said about it.
#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    /// Some `Option` or pointer on the way was empty.
    nil: bool,
    /// Some `Unknowable` on the way was unknown.
    unknown: bool,
}

impl Flags {
    fn is_absent(self) -> bool {
        self.nil || self.unknown
    }

    fn absence(self) -> Absence {
        if self.unknown {
            Absence::Unknown
        } else {
            Absence::Null
        }
    }

    /// Unknown wins over null.
    fn absent_value(self, ty: AttrType) -> AttrValue {
        match self.absence() {
            Absence::Unknown => AttrValue::unknown(ty),
            Absence::Null => AttrValue::null(ty),
        }
    }
}

struct FromCx<'o> {
    options: &'o Options,
    walk: WalkOptions,
    /// Structs being converted, outermost first.
    stack: Vec<ConstTypeId>,
}

impl<'o> FromCx<'o> {
    fn new(options: &'o Options) -> Self {
        Self {
            options,
            walk: WalkOptions::new().visit_embedded_nil_structs(),
            stack: Vec::new(),
        }
    }

    fn convert<'mem, 'facet>(
        &mut self,
        path: WalkPath,
        node: Node<'mem, 'facet>,
        mut flags: Flags,
    ) -> Result<AttrValue, AttrError> {
        let (path, node) = self.peel(path, node, &mut flags)?;
        trace!(%path, shape = %node.shape(), nil = flags.nil, unknown = flags.unknown, "value_from node");

        if let Some(converter) = self.options.find_from(node.shape()) {
            trace!(%path, converter = converter.name(), "from-converter");
            let scope = Scope {
                options: self.options,
                path: &path,
            };
            let result = match node.peek() {
                Some(peek) if !flags.is_absent() => converter.convert(peek, &scope),
                _ => converter.absent(flags.absence(), &scope),
            };
            return result.map_err(|e| e.at(&path));
        }

        match node.kind() {
            ShapeKind::Option { .. } | ShapeKind::Pointer { .. } | ShapeKind::Transparent { .. } => {
                let child = self.deref(&path, &node)?;
                self.convert(path.join(child.step), child.node, flags)
            }
            ShapeKind::Scalar => self.scalar(&path, &node, flags),
            ShapeKind::List { element } | ShapeKind::Array { element, .. } => {
                let as_set = self.options.is_set_element(element);
                self.elements(&path, &node, element, flags, as_set)
            }
            ShapeKind::Set { element } => self.elements(&path, &node, element, flags, true),
            ShapeKind::Map { value, .. } => self.map(&path, &node, value, flags),
            ShapeKind::Struct(_) => self.object(&path, &node, flags),
            ShapeKind::Unsupported(kind) => Err(AttrError::new(AttrErrorKind::Unsupported {
                kind,
                type_name: node.shape().to_string(),
            })
            .at(&path)),
        }
    }

    /// Strip `Option`s, pointers and `Unknowable`s, recording what they said.
    fn peel<'mem, 'facet>(
        &self,
        mut path: WalkPath,
        mut node: Node<'mem, 'facet>,
        flags: &mut Flags,
    ) -> Result<(WalkPath, Node<'mem, 'facet>), AttrError> {
        loop {
            flags.nil |= node.is_absent();
            let child = if unknowable::is_unknowable(node.shape()) {
                let (unknown, value) = unknowable::unwrap(&node, &path, &self.walk)?;
                flags.unknown |= unknown;
                value
            } else if matches!(node.kind(), ShapeKind::Option { .. } | ShapeKind::Pointer { .. }) {
                self.deref(&path, &node)?
            } else {
                return Ok((path, node));
            };
            path = path.join(child.step);
            node = child.node;
        }
    }

    fn deref<'mem, 'facet>(
        &self,
        path: &WalkPath,
        node: &Node<'mem, 'facet>,
    ) -> Result<Child<'mem, 'facet>, AttrError> {
        node.children(path, &self.walk)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AttrError::reflect(format_args!("{} has nothing to dereference", node.shape()))
                    .at(path)
            })
    }

    fn scalar(&self, path: &WalkPath, node: &Node<'_, '_>, flags: Flags) -> Result<AttrValue, AttrError> {
        let shape = node.shape();
        let unsupported = || {
            AttrError::new(AttrErrorKind::Unsupported {
                kind: "scalar",
                type_name: shape.to_string(),
            })
            .at(path)
        };
        let scalar = shape.scalar_type().ok_or_else(unsupported)?;
        let ty = match scalar {
            ScalarType::Bool => AttrType::Bool,
            ScalarType::Char | ScalarType::Str | ScalarType::String | ScalarType::CowStr => {
                AttrType::String
            }
            ScalarType::F32
            | ScalarType::F64
            | ScalarType::U8
            | ScalarType::U16
            | ScalarType::U32
            | ScalarType::U64
            | ScalarType::U128
            | ScalarType::USize
            | ScalarType::I8
            | ScalarType::I16
            | ScalarType::I32
            | ScalarType::I64
            | ScalarType::I128
            | ScalarType::ISize => AttrType::Number,
            _ => return Err(unsupported()),
        };

        let peek = match node.peek() {
            Some(peek) if !flags.is_absent() => peek,
            _ => return Ok(flags.absent_value(ty)),
        };

        macro_rules! get {
            ($t:ty) => {
                *peek.get::<$t>().map_err(located(path))?
            };
        }
        let too_wide = |approx: f64| {
            AttrError::new(AttrErrorKind::Inexact {
                number: Number::Float(approx),
                target: "number".to_owned(),
            })
            .at(path)
        };

        Ok(match scalar {
            ScalarType::Bool => AttrValue::bool(get!(bool)),
            ScalarType::Char => AttrValue::string(get!(char).to_string()),
            ScalarType::F32 => AttrValue::number(get!(f32)),
            ScalarType::F64 => AttrValue::number(get!(f64)),
            ScalarType::U8 => AttrValue::number(get!(u8)),
            ScalarType::U16 => AttrValue::number(get!(u16)),
            ScalarType::U32 => AttrValue::number(get!(u32)),
            ScalarType::U64 => AttrValue::number(get!(u64)),
            ScalarType::USize => AttrValue::number(get!(usize)),
            ScalarType::I8 => AttrValue::number(get!(i8)),
            ScalarType::I16 => AttrValue::number(get!(i16)),
            ScalarType::I32 => AttrValue::number(get!(i32)),
            ScalarType::I64 => AttrValue::number(get!(i64)),
            ScalarType::ISize => AttrValue::number(get!(isize)),
            ScalarType::U128 => {
                let n = get!(u128);
                AttrValue::number(Number::try_from(n).map_err(|n| too_wide(n as f64))?)
            }
            ScalarType::I128 => {
                let n = get!(i128);
                AttrValue::number(Number::try_from(n).map_err(|n| too_wide(n as f64))?)
            }
            _ => AttrValue::string(peek.as_str().ok_or_else(|| {
                AttrError::reflect(format_args!("{shape} is not readable as a string")).at(path)
            })?),
        })
    }

    fn elements(
        &mut self,
        path: &WalkPath,
        node: &Node<'_, '_>,
        element: &'static Shape,
        flags: Flags,
        as_set: bool,
    ) -> Result<AttrValue, AttrError> {
        let wrap = |ty| {
            if as_set {
                AttrType::set(ty)
            } else {
                AttrType::list(ty)
            }
        };
        if flags.is_absent() {
            return Ok(flags.absent_value(wrap(self.placeholder_type(path, element)?)));
        }

        let mut elements = Vec::new();
        let mut element_ty = None;
        for child in node.children(path, &self.walk)? {
            let child_path = path.join(child.step);
            let value = self.convert(child_path.clone(), child.node, Flags::default())?;
            homogeneous(&mut element_ty, &value, &child_path)?;
            elements.push(value);
        }
        let element_ty = match element_ty {
            Some(ty) => ty,
            None => self.placeholder_type(path, element)?,
        };
        Ok(self.container(path, node.shape(), wrap(element_ty), Payload::Elements(elements)))
    }

    fn map(
        &mut self,
        path: &WalkPath,
        node: &Node<'_, '_>,
        value: &'static Shape,
        flags: Flags,
    ) -> Result<AttrValue, AttrError> {
        if flags.is_absent() {
            return Ok(flags.absent_value(AttrType::map(self.placeholder_type(path, value)?)));
        }

        let mut entries = BTreeMap::new();
        let mut value_ty = None;
        for child in node.children(path, &self.walk)? {
            let key = match &child.step {
                PathStep::MapKey(key) => key.clone(),
                _ => continue,
            };
            let child_path = path.join(child.step);
            let converted = self.convert(child_path.clone(), child.node, Flags::default())?;
            homogeneous(&mut value_ty, &converted, &child_path)?;
            entries.insert(key, converted);
        }
        let value_ty = match value_ty {
            Some(ty) => ty,
            None => self.placeholder_type(path, value)?,
        };
        Ok(self.container(path, node.shape(), AttrType::map(value_ty), Payload::Entries(entries)))
    }

    fn object(
        &mut self,
        path: &WalkPath,
        node: &Node<'_, '_>,
        flags: Flags,
    ) -> Result<AttrValue, AttrError> {
        let shape = node.shape();
        if node.is_absent() && self.stack.contains(&shape.id) {
            return Err(AttrError::new(AttrErrorKind::RecursiveType {
                type_name: shape.to_string(),
            })
            .at(path));
        }

        self.stack.push(shape.id);
        let attributes = self.attributes(path, node, shape);
        self.stack.pop();
        let attributes = attributes?;

        let ty = AttrType::Object(
            attributes
                .iter()
                .map(|(name, value)| (name.clone(), value.ty().clone()))
                .collect(),
        );
        if flags.is_absent() {
            return Ok(flags.absent_value(ty));
        }
        Ok(AttrValue::known_unchecked(ty, Payload::Entries(attributes)))
    }

    fn attributes(
        &mut self,
        path: &WalkPath,
        node: &Node<'_, '_>,
        shape: &'static Shape,
    ) -> Result<BTreeMap<String, AttrValue>, AttrError> {
        let mut attributes = BTreeMap::new();
        for child in node.children(path, &self.walk)? {
            let Some(field) = child.node.field() else {
                continue;
            };
            if field.should_skip_deserializing() {
                continue;
            }
            let child_path = path.join(child.step);
            let Some(name) = field.rename else {
                return Err(AttrError::new(AttrErrorKind::MissingAttributeName {
                    field: field.name,
                    type_name: shape.to_string(),
                })
                .at(&child_path));
            };
            let value = self.convert(child_path, child.node, Flags::default())?;
            attributes.insert(name.to_owned(), value);
        }
        Ok(attributes)
    }

    /// The type of the elements of an empty or absent container.
    fn placeholder_type(&mut self, path: &WalkPath, element: &'static Shape) -> Result<AttrType, AttrError> {
        self.convert(
            path.join(PathStep::Placeholder),
            Node::absent(element),
            Flags::default(),
        )
        .map(AttrValue::into_type)
    }

    fn container(&self, path: &WalkPath, shape: &'static Shape, ty: AttrType, payload: Payload) -> AttrValue {
        let empty = match &payload {
            Payload::Elements(elements) => elements.is_empty(),
            Payload::Entries(entries) => entries.is_empty(),
            _ => false,
        };
        if empty && self.options.empty_policy(path, shape) == EmptyPolicy::Null {
            trace!(%path, "empty container as null");
            return AttrValue::null(ty);
        }
        AttrValue::known_unchecked(ty, payload)
    }
}

fn homogeneous(first: &mut Option<AttrType>, value: &AttrValue, path: &WalkPath) -> Result<(), AttrError> {
    match first {
        None => {
            *first = Some(value.ty().clone());
            Ok(())
        }
        Some(ty) if ty == value.ty() => Ok(()),
        Some(ty) => Err(AttrError::new(AttrErrorKind::HeterogeneousElements {
            first: ty.clone(),
            other: value.ty().clone(),
        })
        .at(path)),
    }
}
