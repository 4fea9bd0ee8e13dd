//! Attribute value trees to domain values.

use std::borrow::Cow;
use std::collections::BTreeMap;

use facet_core::{Characteristic, Facet, Shape};
use facet_reflect::Partial;
use facet_walk::{PathStep, ShapeKind, WalkPath};

use crate::error::{located, suggest};
use crate::options::Scope;
use crate::unknowable::{self, UNKNOWN_FIELD, VALUE_FIELD};
use crate::{AttrError, AttrErrorKind, AttrType, AttrValue, Options, Payload, State, debug, trace};

/// Build a `T` from an attribute value tree.
///
/// This is the inverse of [`value_from`](crate::value_from): any tree that
/// `value_from` produced for a `T` converts back to an equal `T`. A null tree
/// produces the zero value of its target: `None`, an empty container, a
/// default scalar, or a struct whose fields are each zeroed.
pub fn value_to<'facet, T: Facet<'facet>>(tree: &AttrValue, options: &Options) -> Result<T, AttrError> {
    value_to_at(tree, options, options.root())
}

pub(crate) fn value_to_at<'facet, T: Facet<'facet>>(
    tree: &AttrValue,
    options: &Options,
    root: &WalkPath,
) -> Result<T, AttrError> {
    debug!(shape = %T::SHAPE, %root, ty = %tree.ty(), "value_to");
    let wip: Partial<'facet, true> = Partial::alloc::<T>().map_err(located(root))?;
    let wip = ToCx { options }.fill(root, tree, wip)?;
    let value = wip
        .build()
        .map_err(located(root))?
        .materialize::<T>()
        .map_err(located(root))?;
    debug!("value_to done");
    Ok(value)
}

struct ToCx<'o> {
    options: &'o Options,
}

impl ToCx<'_> {
    fn fill<'p>(
        &self,
        path: &WalkPath,
        tree: &AttrValue,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        let shape = wip.shape();
        trace!(%path, %shape, ty = %tree.ty(), "value_to node");

        // Known payloads are checked as they are read; absent ones only
        // have their type to disagree with.
        if !tree.is_known() {
            self.check_absent(path, tree, shape)?;
        }

        if unknowable::is_unknowable(shape) {
            return self.fill_unknowable(path, tree, wip);
        }

        let kind = ShapeKind::of(shape);
        if !matches!(kind, ShapeKind::Option { .. })
            && let Some(converter) = self.options.find_to(shape)
        {
            trace!(%path, converter = converter.name(), "to-converter");
            let tree = if tree.is_unknown() && self.options.zeroes_unknowns() {
                Cow::Owned(AttrValue::null(tree.ty().clone()))
            } else {
                Cow::Borrowed(tree)
            };
            if tree.is_null() && converter.zeroes_nulls() {
                return self.zero(path, wip);
            }
            let scope = Scope {
                options: self.options,
                path,
            };
            return converter.apply(&tree, &scope, wip).map_err(|e| e.at(path));
        }

        let deref = path.join(PathStep::Deref);
        match kind {
            ShapeKind::Option { .. } => {
                if self.is_nullish(tree) {
                    return wip.set_default().map_err(located(path));
                }
                let wip = wip.begin_some().map_err(located(path))?;
                self.fill(&deref, tree, wip)?.end().map_err(located(path))
            }
            ShapeKind::Pointer { .. } => {
                let wip = wip.begin_smart_ptr().map_err(located(path))?;
                self.fill(&deref, tree, wip)?.end().map_err(located(path))
            }
            ShapeKind::Transparent { .. } => {
                let wip = wip.begin_inner().map_err(located(path))?;
                self.fill(&deref, tree, wip)?.end().map_err(located(path))
            }
            ShapeKind::List { .. } => self.fill_list(path, tree, shape, wip),
            ShapeKind::Array { len, .. } => self.fill_array(path, tree, shape, len, wip),
            ShapeKind::Set { .. } => self.fill_set(path, tree, shape, wip),
            ShapeKind::Map { key, .. } => self.fill_map(path, tree, shape, key, wip),
            ShapeKind::Struct(_) => self.fill_struct(path, tree, shape, wip),
            ShapeKind::Scalar => Err(unsupported("scalar", shape, path)),
            ShapeKind::Unsupported(kind) => Err(unsupported(kind, shape, path)),
        }
    }

    fn check_absent(
        &self,
        path: &WalkPath,
        tree: &AttrValue,
        shape: &'static Shape,
    ) -> Result<(), AttrError> {
        let expected = crate::from::type_of_at(shape, self.options, path)?;
        if expected.accepts(tree.ty()) {
            return Ok(());
        }
        Err(AttrError::new(AttrErrorKind::TypeMismatch {
            expected: expected.to_string(),
            found: tree.ty().clone(),
        })
        .at(path))
    }

    /// Write the zero value of the target: its `Default`, or failing that a
    /// struct or array of zeroes.
    fn zero<'p>(
        &self,
        path: &WalkPath,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        let shape = wip.shape();
        if shape.is(Characteristic::Default) {
            return wip.set_default().map_err(located(path));
        }
        match ShapeKind::of(shape) {
            ShapeKind::Struct(st) => {
                let mut wip = wip;
                for (index, field) in st.fields.iter().enumerate() {
                    let field_path = path.join(PathStep::Field {
                        index,
                        name: field.name,
                    });
                    wip = wip.begin_nth_field(index).map_err(located(&field_path))?;
                    wip = self.zero(&field_path, wip)?;
                    wip = wip.end().map_err(located(&field_path))?;
                }
                Ok(wip)
            }
            ShapeKind::Array { len, .. } => {
                let mut wip = wip.init_array().map_err(located(path))?;
                for i in 0..len {
                    let element_path = path.join(PathStep::Index(i));
                    wip = wip.begin_nth_field(i).map_err(located(&element_path))?;
                    wip = self.zero(&element_path, wip)?;
                    wip = wip.end().map_err(located(&element_path))?;
                }
                Ok(wip)
            }
            _ => Err(AttrError::new(AttrErrorKind::NoZeroValue {
                type_name: shape.to_string(),
            })
            .at(path)),
        }
    }

    fn is_nullish(&self, tree: &AttrValue) -> bool {
        tree.is_null() || (tree.is_unknown() && self.options.zeroes_unknowns())
    }

    /// Check the tree's type, and return its payload unless it reads as null.
    fn payload<'t>(
        &self,
        path: &WalkPath,
        tree: &'t AttrValue,
        target: &'static Shape,
        expected: &str,
        accepts: impl Fn(&AttrType) -> bool,
    ) -> Result<Option<&'t Payload>, AttrError> {
        if !accepts(tree.ty()) {
            return Err(AttrError::new(AttrErrorKind::TypeMismatch {
                expected: expected.to_owned(),
                found: tree.ty().clone(),
            })
            .at(path));
        }
        match tree.state() {
            State::Known(payload) => Ok(Some(payload)),
            State::Null => Ok(None),
            State::Unknown if self.options.zeroes_unknowns() => Ok(None),
            State::Unknown => Err(AttrError::new(AttrErrorKind::UnknownValue {
                target: target.to_string(),
            })
            .at(path)),
        }
    }

    fn elements<'t>(
        &self,
        path: &WalkPath,
        tree: &'t AttrValue,
        target: &'static Shape,
    ) -> Result<Option<&'t [AttrValue]>, AttrError> {
        let is_sequence = |ty: &AttrType| matches!(ty, AttrType::List(_) | AttrType::Set(_));
        match self.payload(path, tree, target, "list or set", is_sequence)? {
            None => Ok(None),
            Some(Payload::Elements(elements)) => Ok(Some(elements)),
            Some(_) => Err(invalid_payload(tree, "expected elements", path)),
        }
    }

    fn fill_list<'p>(
        &self,
        path: &WalkPath,
        tree: &AttrValue,
        target: &'static Shape,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        let elements = self.elements(path, tree, target)?;
        let mut wip = wip.init_list().map_err(located(path))?;
        for (i, element) in elements.unwrap_or_default().iter().enumerate() {
            wip = wip.begin_list_item().map_err(located(path))?;
            wip = self.fill(&path.join(PathStep::Index(i)), element, wip)?;
            wip = wip.end().map_err(located(path))?;
        }
        Ok(wip)
    }

    fn fill_array<'p>(
        &self,
        path: &WalkPath,
        tree: &AttrValue,
        target: &'static Shape,
        len: usize,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        let elements = self.elements(path, tree, target)?;
        let zero;
        let elements: Vec<&AttrValue> = match elements {
            Some(elements) if elements.len() != len => {
                return Err(AttrError::new(AttrErrorKind::LengthMismatch {
                    expected: len,
                    found: elements.len(),
                })
                .at(path));
            }
            Some(elements) => elements.iter().collect(),
            None => {
                // Every element of a null array is null.
                let element_ty = tree.ty().element().cloned().ok_or_else(|| {
                    invalid_payload(tree, "sequence without element type", path)
                })?;
                zero = AttrValue::null(element_ty);
                vec![&zero; len]
            }
        };

        let mut wip = wip.init_array().map_err(located(path))?;
        for (i, element) in elements.into_iter().enumerate() {
            wip = wip.begin_nth_field(i).map_err(located(path))?;
            wip = self.fill(&path.join(PathStep::Index(i)), element, wip)?;
            wip = wip.end().map_err(located(path))?;
        }
        Ok(wip)
    }

    fn fill_set<'p>(
        &self,
        path: &WalkPath,
        tree: &AttrValue,
        target: &'static Shape,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        let elements = self.elements(path, tree, target)?;
        let mut wip = wip.init_set().map_err(located(path))?;
        for (i, element) in elements.unwrap_or_default().iter().enumerate() {
            wip = wip.begin_set_item().map_err(located(path))?;
            wip = self.fill(&path.join(PathStep::Index(i)), element, wip)?;
            wip = wip.end().map_err(located(path))?;
        }
        Ok(wip)
    }

    fn fill_map<'p>(
        &self,
        path: &WalkPath,
        tree: &AttrValue,
        target: &'static Shape,
        key_shape: &'static Shape,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        let is_map = |ty: &AttrType| matches!(ty, AttrType::Map(_));
        let entries = match self.payload(path, tree, target, "map", is_map)? {
            None => None,
            Some(Payload::Entries(entries)) => Some(entries),
            Some(_) => return Err(invalid_payload(tree, "expected entries", path)),
        };

        let mut wip = wip.init_map().map_err(located(path))?;
        let Some(entries) = entries else {
            return Ok(wip);
        };
        let string_keys = key_shape.id == <String as Facet>::SHAPE.id;
        for (key, value) in entries {
            let entry_path = path.join(PathStep::MapKey(key.clone()));
            wip = wip.begin_key().map_err(located(&entry_path))?;
            wip = if string_keys {
                wip.set(key.clone())
            } else {
                wip.parse_from_str(key)
            }
            .map_err(located(&entry_path))?;
            wip = wip.end().map_err(located(&entry_path))?;
            wip = wip.begin_value().map_err(located(&entry_path))?;
            wip = self.fill(&entry_path, value, wip)?;
            wip = wip.end().map_err(located(&entry_path))?;
        }
        Ok(wip)
    }

    fn fill_struct<'p>(
        &self,
        path: &WalkPath,
        tree: &AttrValue,
        target: &'static Shape,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        let ShapeKind::Struct(st) = ShapeKind::of(target) else {
            return Err(unsupported("non-struct", target, path));
        };
        let AttrType::Object(types) = tree.ty() else {
            return Err(AttrError::new(AttrErrorKind::TypeMismatch {
                expected: "object".to_owned(),
                found: tree.ty().clone(),
            })
            .at(path));
        };
        let attributes = match self.payload(path, tree, target, "object", |_| true)? {
            None => None,
            Some(Payload::Entries(attributes)) => Some(attributes),
            Some(_) => return Err(invalid_payload(tree, "expected attributes", path)),
        };

        let claimed: Vec<&'static str> = st
            .fields
            .iter()
            .filter(|field| !field.should_skip_deserializing())
            .filter_map(|field| field.rename)
            .collect();
        if let Some(name) = types.keys().find(|name| !claimed.contains(&name.as_str())) {
            return Err(AttrError::new(AttrErrorKind::UnexpectedAttribute {
                name: name.clone(),
                suggestion: suggest(name, claimed.iter().copied()),
            })
            .at(path));
        }

        let mut wip = wip;
        for (index, field) in st.fields.iter().enumerate() {
            let field_path = path.join(PathStep::Field {
                index,
                name: field.name,
            });
            if field.should_skip_deserializing() {
                wip = wip.begin_nth_field(index).map_err(located(&field_path))?;
                wip = wip.set_default().map_err(located(&field_path))?;
                wip = wip.end().map_err(located(&field_path))?;
                continue;
            }
            let Some(name) = field.rename else {
                return Err(AttrError::new(AttrErrorKind::MissingAttributeName {
                    field: field.name,
                    type_name: target.to_string(),
                })
                .at(&field_path));
            };

            let null;
            let value = match attributes {
                Some(attributes) => attributes.get(name),
                None => match types.get(name) {
                    Some(ty) => {
                        null = AttrValue::null(ty.clone());
                        Some(&null)
                    }
                    None => None,
                },
            };
            let Some(value) = value else {
                return Err(missing_attribute(name, types, path));
            };

            wip = wip.begin_nth_field(index).map_err(located(&field_path))?;
            wip = self.fill(&field_path, value, wip)?;
            wip = wip.end().map_err(located(&field_path))?;
        }
        Ok(wip)
    }

    fn fill_unknowable<'p>(
        &self,
        path: &WalkPath,
        tree: &AttrValue,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        let unknown = tree.is_unknown() && !self.options.zeroes_unknowns();
        let value_path = path.join(PathStep::Field {
            index: VALUE_FIELD,
            name: "value",
        });

        let mut wip = wip.begin_nth_field(VALUE_FIELD).map_err(located(path))?;
        wip = if unknown {
            wip.set_default().map_err(located(&value_path))?
        } else {
            self.fill(&value_path, tree, wip)?
        };
        wip = wip.end().map_err(located(path))?;

        wip = wip.begin_nth_field(UNKNOWN_FIELD).map_err(located(path))?;
        wip = wip.set(unknown).map_err(located(path))?;
        wip.end().map_err(located(path))
    }
}

fn unsupported(kind: &'static str, shape: &'static Shape, path: &WalkPath) -> AttrError {
    AttrError::new(AttrErrorKind::Unsupported {
        kind,
        type_name: shape.to_string(),
    })
    .at(path)
}

fn invalid_payload(tree: &AttrValue, reason: &str, path: &WalkPath) -> AttrError {
    AttrError::new(AttrErrorKind::InvalidPayload {
        ty: tree.ty().clone(),
        reason: reason.to_owned(),
    })
    .at(path)
}

fn missing_attribute(name: &str, types: &BTreeMap<String, AttrType>, path: &WalkPath) -> AttrError {
    AttrError::new(AttrErrorKind::MissingAttribute {
        name: name.to_owned(),
        available: types.keys().cloned().collect(),
        suggestion: suggest(name, types.keys().map(String::as_str)),
    })
    .at(path)
}
