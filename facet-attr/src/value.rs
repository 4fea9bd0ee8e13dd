//! Attribute value trees.

use core::fmt;
use std::collections::BTreeMap;

use facet_walk::{PathStep, WalkPath};

use crate::{AttrError, AttrErrorKind, AttrType, Number};

/// Whether a value is present.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    /// Intentionally absent.
    Null,
    /// Not yet resolved; will be known later.
    Unknown,
    /// Present.
    Known(Payload),
}

/// The data of a [`State::Known`] value.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A bool.
    Bool(bool),
    /// A string.
    String(String),
    /// A number.
    Number(Number),
    /// Elements of a list or set.
    Elements(Vec<AttrValue>),
    /// Entries of a map, or attributes of an object.
    Entries(BTreeMap<String, AttrValue>),
}

/// A node of an attribute value tree: a [`State`] together with the
/// [`AttrType`] it has whatever the state.
///
/// Constructors check the payload against the type, so every value built
/// through this API is well formed. [`AttrValue::validate`] re-checks a
/// whole tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrValue {
    ty: AttrType,
    state: State,
}

impl AttrValue {
    /// A null value of type `ty`.
    pub fn null(ty: AttrType) -> Self {
        Self {
            ty,
            state: State::Null,
        }
    }

    /// An unknown value of type `ty`.
    pub fn unknown(ty: AttrType) -> Self {
        Self {
            ty,
            state: State::Unknown,
        }
    }

    /// A known bool.
    pub fn bool(b: bool) -> Self {
        Self::known_unchecked(AttrType::Bool, Payload::Bool(b))
    }

    /// A known string.
    pub fn string(s: impl Into<String>) -> Self {
        Self::known_unchecked(AttrType::String, Payload::String(s.into()))
    }

    /// A known number.
    pub fn number(n: impl Into<Number>) -> Self {
        Self::known_unchecked(AttrType::Number, Payload::Number(n.into()))
    }

    /// A known list whose elements all have type `element`.
    pub fn list(element: AttrType, elements: Vec<AttrValue>) -> Result<Self, AttrError> {
        Self::known(AttrType::list(element), Payload::Elements(elements))
    }

    /// A known set whose elements all have type `element`.
    ///
    /// Elements are kept in the order given.
    pub fn set(element: AttrType, elements: Vec<AttrValue>) -> Result<Self, AttrError> {
        Self::known(AttrType::set(element), Payload::Elements(elements))
    }

    /// A known map whose values all have type `value`.
    pub fn map<K: Into<String>>(
        value: AttrType,
        entries: impl IntoIterator<Item = (K, AttrValue)>,
    ) -> Result<Self, AttrError> {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::known(AttrType::map(value), Payload::Entries(entries))
    }

    /// A known object. Its type is made of the types of `attributes`.
    pub fn object<N: Into<String>>(attributes: impl IntoIterator<Item = (N, AttrValue)>) -> Self {
        let attributes: BTreeMap<String, AttrValue> = attributes
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        let ty = AttrType::Object(
            attributes
                .iter()
                .map(|(name, value)| (name.clone(), value.ty.clone()))
                .collect(),
        );
        Self::known_unchecked(ty, Payload::Entries(attributes))
    }

    /// A known value of type `ty`, checking the payload one level deep.
    pub fn known(ty: AttrType, payload: Payload) -> Result<Self, AttrError> {
        check_payload(&ty, &payload)?;
        Ok(Self::known_unchecked(ty, payload))
    }

    pub(crate) fn known_unchecked(ty: AttrType, payload: Payload) -> Self {
        Self {
            ty,
            state: State::Known(payload),
        }
    }

    /// The value's type.
    pub fn ty(&self) -> &AttrType {
        &self.ty
    }

    /// The value's type, dropping the value.
    pub fn into_type(self) -> AttrType {
        self.ty
    }

    /// The value's state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// The payload, if the value is known.
    pub fn payload(&self) -> Option<&Payload> {
        match &self.state {
            State::Known(payload) => Some(payload),
            _ => None,
        }
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self.state, State::Null)
    }

    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self.state, State::Unknown)
    }

    /// Whether the value is known.
    pub fn is_known(&self) -> bool {
        matches!(self.state, State::Known(_))
    }

    /// The bool, if this is a known bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self.payload()? {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string, if this is a known string.
    pub fn as_str(&self) -> Option<&str> {
        match self.payload()? {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number, if this is a known number.
    pub fn as_number(&self) -> Option<Number> {
        match self.payload()? {
            Payload::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The elements, if this is a known list or set.
    pub fn elements(&self) -> Option<&[AttrValue]> {
        match self.payload()? {
            Payload::Elements(elements) => Some(elements),
            _ => None,
        }
    }

    /// The entries, if this is a known map.
    pub fn entries(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match (&self.ty, self.payload()?) {
            (AttrType::Map(_), Payload::Entries(entries)) => Some(entries),
            _ => None,
        }
    }

    /// The attributes, if this is a known object.
    pub fn attributes(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match (&self.ty, self.payload()?) {
            (AttrType::Object(_), Payload::Entries(attributes)) => Some(attributes),
            _ => None,
        }
    }

    /// One attribute of a known object.
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes()?.get(name)
    }

    /// Check the whole tree: every payload matches its type, at every depth.
    ///
    /// The returned error is located at the first offending node. Object
    /// attributes are addressed like map keys.
    pub fn validate(&self) -> Result<(), AttrError> {
        self.validate_at(&WalkPath::root())
    }

    fn validate_at(&self, path: &WalkPath) -> Result<(), AttrError> {
        let Some(payload) = self.payload() else {
            return Ok(());
        };
        check_payload(&self.ty, payload).map_err(|e| e.at(path))?;
        match payload {
            Payload::Elements(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    element.validate_at(&path.join(PathStep::Index(i)))?;
                }
            }
            Payload::Entries(entries) => {
                for (key, value) in entries {
                    value.validate_at(&path.join(PathStep::MapKey(key.clone())))?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn check_payload(ty: &AttrType, payload: &Payload) -> Result<(), AttrError> {
    let invalid = |reason: String| {
        AttrError::new(AttrErrorKind::InvalidPayload {
            ty: ty.clone(),
            reason,
        })
    };

    match (ty, payload) {
        (AttrType::Bool, Payload::Bool(_))
        | (AttrType::String, Payload::String(_))
        | (AttrType::Number, Payload::Number(_)) => Ok(()),
        (AttrType::List(element) | AttrType::Set(element), Payload::Elements(elements)) => {
            match elements.iter().position(|e| e.ty != **element) {
                Some(i) => Err(invalid(format!(
                    "element {i} has type {}",
                    elements[i].ty
                ))),
                None => Ok(()),
            }
        }
        (AttrType::Map(value), Payload::Entries(entries)) => {
            match entries.iter().find(|(_, v)| v.ty != **value) {
                Some((key, v)) => Err(invalid(format!("entry {key:?} has type {}", v.ty))),
                None => Ok(()),
            }
        }
        (AttrType::Object(types), Payload::Entries(attributes)) => {
            if let Some(name) = types.keys().find(|name| !attributes.contains_key(*name)) {
                return Err(invalid(format!("attribute `{name}` is missing")));
            }
            for (name, value) in attributes {
                match types.get(name) {
                    None => return Err(invalid(format!("attribute `{name}` is not declared"))),
                    Some(t) if *t != value.ty => {
                        return Err(invalid(format!("attribute `{name}` has type {}", value.ty)));
                    }
                    Some(_) => {}
                }
            }
            Ok(())
        }
        (_, payload) => Err(invalid(format!("{} payload", payload_name(payload)))),
    }
}

fn payload_name(payload: &Payload) -> &'static str {
    match payload {
        Payload::Bool(_) => "bool",
        Payload::String(_) => "string",
        Payload::Number(_) => "number",
        Payload::Elements(_) => "elements",
        Payload::Entries(_) => "entries",
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match &self.state {
            State::Null => return f.write_str("null"),
            State::Unknown => return f.write_str("unknown"),
            State::Known(payload) => payload,
        };
        match payload {
            Payload::Bool(b) => write!(f, "{b}"),
            Payload::String(s) => write!(f, "{s:?}"),
            Payload::Number(n) => write!(f, "{n}"),
            Payload::Elements(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Payload::Entries(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_keeps_its_type() {
        let ty = AttrType::list(AttrType::object([("id", AttrType::Number)]));
        let value = AttrValue::null(ty.clone());
        assert!(value.is_null());
        assert_eq!(value.ty(), &ty);
        assert_eq!(value.to_string(), "null");
    }

    #[test]
    fn list_rejects_foreign_elements() {
        let err = AttrValue::list(
            AttrType::Number,
            vec![AttrValue::number(1u8), AttrValue::string("two")],
        )
        .unwrap_err();
        insta::assert_snapshot!(err, @"<root>: payload does not match list<number>: element 1 has type string");
    }

    #[test]
    fn display_is_compact() {
        let value = AttrValue::object([
            ("name", AttrValue::string("web")),
            (
                "ports",
                AttrValue::set(
                    AttrType::Number,
                    vec![AttrValue::number(80u16), AttrValue::number(443u16)],
                )
                .unwrap(),
            ),
            ("extra", AttrValue::null(AttrType::map(AttrType::Bool))),
        ]);
        insta::assert_snapshot!(value, @r#"{"extra": null, "name": "web", "ports": [80, 443]}"#);
        assert_eq!(value.attribute("name").and_then(AttrValue::as_str), Some("web"));
    }

    #[test]
    fn validate_finds_nested_errors() {
        let bad_inner = AttrValue {
            ty: AttrType::object([("on", AttrType::Bool)]),
            state: State::Known(Payload::Entries(BTreeMap::new())),
        };
        let outer = AttrValue::object([("inner", bad_inner)]);
        let err = outer.validate().unwrap_err();
        assert_eq!(err.path().to_string(), "[inner]");
        assert!(err.to_string().ends_with("attribute `on` is missing"), "{err}");
    }
}
