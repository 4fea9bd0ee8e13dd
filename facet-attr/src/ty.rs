use core::fmt;
use std::collections::BTreeMap;

/// The type of an [`AttrValue`](crate::AttrValue).
///
/// Every value carries its type, whatever its state, so a null list of
/// objects still knows the attributes of its objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrType {
    /// `true` or `false`.
    Bool,
    /// UTF-8 text.
    String,
    /// An exact [`Number`](crate::Number).
    Number,
    /// An ordered sequence of one element type.
    List(Box<AttrType>),
    /// A sequence of one element type, kept in ascending order.
    Set(Box<AttrType>),
    /// String keys to values of one type.
    Map(Box<AttrType>),
    /// Named attributes, each with its own type.
    Object(BTreeMap<String, AttrType>),
}

impl AttrType {
    /// `list<element>`.
    pub fn list(element: AttrType) -> Self {
        AttrType::List(Box::new(element))
    }

    /// `set<element>`.
    pub fn set(element: AttrType) -> Self {
        AttrType::Set(Box::new(element))
    }

    /// `map<value>`.
    pub fn map(value: AttrType) -> Self {
        AttrType::Map(Box::new(value))
    }

    /// An object type from `(name, type)` pairs.
    pub fn object<N: Into<String>>(attributes: impl IntoIterator<Item = (N, AttrType)>) -> Self {
        AttrType::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// The element type of a list or set, or the value type of a map.
    pub fn element(&self) -> Option<&AttrType> {
        match self {
            AttrType::List(t) | AttrType::Set(t) | AttrType::Map(t) => Some(t),
            _ => None,
        }
    }

    /// The attribute types of an object.
    pub fn attributes(&self) -> Option<&BTreeMap<String, AttrType>> {
        match self {
            AttrType::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Whether a tree of type `found` can be read where `self` is expected.
    ///
    /// Lists and sets read into each other; everything else must match
    /// attribute for attribute.
    pub fn accepts(&self, found: &AttrType) -> bool {
        match (self, found) {
            (
                AttrType::List(want) | AttrType::Set(want),
                AttrType::List(have) | AttrType::Set(have),
            )
            | (AttrType::Map(want), AttrType::Map(have)) => want.accepts(have),
            (AttrType::Object(want), AttrType::Object(have)) => {
                want.len() == have.len()
                    && want
                        .iter()
                        .all(|(name, ty)| have.get(name).is_some_and(|h| ty.accepts(h)))
            }
            _ => self == found,
        }
    }

    /// Short name of the type's kind, as used in mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttrType::Bool => "bool",
            AttrType::String => "string",
            AttrType::Number => "number",
            AttrType::List(_) => "list",
            AttrType::Set(_) => "set",
            AttrType::Map(_) => "map",
            AttrType::Object(_) => "object",
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Bool | AttrType::String | AttrType::Number => f.write_str(self.kind_name()),
            AttrType::List(t) => write!(f, "list<{t}>"),
            AttrType::Set(t) => write!(f, "set<{t}>"),
            AttrType::Map(t) => write!(f, "map<{t}>"),
            AttrType::Object(attrs) => {
                f.write_str("object{")?;
                for (i, (name, ty)) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
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
    fn display_nests() {
        let ty = AttrType::list(AttrType::object([
            ("name", AttrType::String),
            ("ports", AttrType::set(AttrType::Number)),
        ]));
        insta::assert_snapshot!(ty, @"list<object{name: string, ports: set<number>}>");
    }

    #[test]
    fn accepts_follows_structure() {
        let want = AttrType::object([("tags", AttrType::list(AttrType::String))]);
        assert!(want.accepts(&AttrType::object([("tags", AttrType::set(AttrType::String))])));
        assert!(!want.accepts(&AttrType::object([("tags", AttrType::list(AttrType::Number))])));
        assert!(!want.accepts(&AttrType::object([
            ("tags", AttrType::list(AttrType::String)),
            ("extra", AttrType::Bool),
        ])));
        assert!(!want.accepts(&AttrType::map(AttrType::list(AttrType::String))));
        assert!(AttrType::map(AttrType::Number).accepts(&AttrType::map(AttrType::Number)));
        assert!(!AttrType::String.accepts(&AttrType::list(AttrType::Bool)));
    }
}
