//! Conversion options and the converter registry.
//!
//! An [`Options`] value is the whole context of a conversion call. It is
//! built once by chaining and passed by reference into
//! [`value_from`](crate::value_from) and [`value_to`](crate::value_to); there
//! is no global registry.
//!
//! Converters are tried in registration order and the first one whose
//! predicate accepts the shape wins. User converters are always tried before
//! the [`Registry::primitives`] defaults.

use std::sync::Arc;

use facet_core::{ConstTypeId, Facet, Shape};
use facet_reflect::{Partial, Peek};
use facet_walk::WalkPath;

use crate::{AttrError, AttrErrorKind, AttrType, AttrValue, Number, Payload, State};

/// Why a from-converter is asked for a value it cannot see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// The value is `None`, or the element of an empty container.
    Null,
    /// The value is an unknown [`Unknowable`](crate::Unknowable).
    Unknown,
}

/// What an empty list, set or map converts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// A known value with no elements.
    #[default]
    Empty,
    /// A null value.
    Null,
}

/// Where a converter runs, and a way back into the engine.
pub struct Scope<'a> {
    pub(crate) options: &'a Options,
    pub(crate) path: &'a WalkPath,
}

impl<'a> Scope<'a> {
    /// Path of the node being converted.
    pub fn path(&self) -> &WalkPath {
        self.path
    }

    /// The options of the running conversion.
    pub fn options(&self) -> &Options {
        self.options
    }

    /// Convert a nested value, reporting paths below this node.
    pub fn value_from<'facet, U: Facet<'facet>>(&self, value: &U) -> Result<AttrValue, AttrError> {
        crate::from::value_from_at(value, self.options, self.path)
    }

    /// Read a nested value, reporting paths below this node.
    pub fn value_to<'facet, U: Facet<'facet>>(&self, tree: &AttrValue) -> Result<U, AttrError> {
        crate::to::value_to_at(tree, self.options, self.path)
    }

    /// The attribute type of `shape` under these options.
    pub fn type_of(&self, shape: &'static Shape) -> Result<AttrType, AttrError> {
        crate::from::type_of_at(shape, self.options, self.path)
    }
}

type ShapePredicate = dyn Fn(&'static Shape) -> bool + Send + Sync;
type FromFn = dyn for<'mem, 'facet> Fn(Peek<'mem, 'facet>, &Scope<'_>) -> Result<AttrValue, AttrError>
    + Send
    + Sync;
type AbsentFn = dyn Fn(Absence, &Scope<'_>) -> Result<AttrValue, AttrError> + Send + Sync;
type ToFn = dyn for<'p> Fn(&AttrValue, &Scope<'_>, Partial<'p, true>) -> Result<Partial<'p, true>, AttrError>
    + Send
    + Sync;

/// A converter from a domain value to an [`AttrValue`].
///
/// When it matches, its output is used verbatim, Null and Unknown encoding
/// included, and the engine does not look inside the value.
#[derive(Clone)]
pub struct FromConverter {
    name: String,
    matches: Arc<ShapePredicate>,
    convert: Arc<FromFn>,
    absent: Arc<AbsentFn>,
}

impl FromConverter {
    /// A converter for every shape `matches` accepts.
    ///
    /// `convert` gets the live value. `absent` is called instead when the
    /// value is `None` or unknown, and must still produce a value of the
    /// right type.
    pub fn when<M, C, A>(name: impl Into<String>, matches: M, convert: C, absent: A) -> Self
    where
        M: Fn(&'static Shape) -> bool + Send + Sync + 'static,
        C: for<'mem, 'facet> Fn(Peek<'mem, 'facet>, &Scope<'_>) -> Result<AttrValue, AttrError>
            + Send
            + Sync
            + 'static,
        A: Fn(Absence, &Scope<'_>) -> Result<AttrValue, AttrError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            matches: Arc::new(matches),
            convert: Arc::new(convert),
            absent: Arc::new(absent),
        }
    }

    /// A converter for `T`, whose attribute form is the form of `W`.
    ///
    /// Absent values become a null or unknown value of `W`'s attribute type,
    /// so a `T` that converts to a string would use `W = String`.
    pub fn for_type<T, W, F>(convert: F) -> Self
    where
        T: for<'a> Facet<'a>,
        W: for<'a> Facet<'a>,
        F: Fn(&T, &Scope<'_>) -> Result<AttrValue, AttrError> + Send + Sync + 'static,
    {
        let id = T::SHAPE.id;
        Self::when(
            T::SHAPE.to_string(),
            move |shape| shape.id == id,
            move |peek, scope| {
                let value = peek.get::<T>().map_err(|_| {
                    AttrError::new(AttrErrorKind::ConverterMismatch {
                        expected: T::SHAPE.to_string(),
                        found: peek.shape().to_string(),
                    })
                })?;
                convert(value, scope)
            },
            |absence, scope| {
                let ty = scope.type_of(W::SHAPE)?;
                Ok(match absence {
                    Absence::Null => AttrValue::null(ty),
                    Absence::Unknown => AttrValue::unknown(ty),
                })
            },
        )
    }

    /// What the converter handles, for logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn matches(&self, shape: &'static Shape) -> bool {
        (self.matches)(shape)
    }

    pub(crate) fn convert(&self, peek: Peek<'_, '_>, scope: &Scope<'_>) -> Result<AttrValue, AttrError> {
        (self.convert)(peek, scope)
    }

    pub(crate) fn absent(&self, absence: Absence, scope: &Scope<'_>) -> Result<AttrValue, AttrError> {
        (self.absent)(absence, scope)
    }
}

/// A converter from an [`AttrValue`] to a domain value.
///
/// A matching converter receives unknown trees unless
/// [`Options::zero_unknowns`] turns those into Null first. Null trees never
/// reach it: the engine writes the target's zero value instead, unless the
/// converter was built with [`ToConverter::passing_nulls`].
#[derive(Clone)]
pub struct ToConverter {
    name: String,
    matches: Arc<ShapePredicate>,
    apply: Arc<ToFn>,
    zero_nulls: bool,
}

impl ToConverter {
    /// A converter producing a `T`.
    ///
    /// `convert` sees known and unknown trees. A null tree yields the zero
    /// value of `T`: its `Default` when it has one, and otherwise a value
    /// whose fields are each zeroed.
    pub fn for_type<T, F>(convert: F) -> Self
    where
        T: for<'a> Facet<'a>,
        F: Fn(&AttrValue, &Scope<'_>) -> Result<T, AttrError> + Send + Sync + 'static,
    {
        let id = T::SHAPE.id;
        Self {
            name: T::SHAPE.to_string(),
            matches: Arc::new(move |shape: &'static Shape| shape.id == id),
            apply: Arc::new(setter(move |tree, scope, wip| {
                let value = convert(tree, scope)?;
                wip.set(value).map_err(AttrError::reflect)
            })),
            zero_nulls: true,
        }
    }

    /// Hand null trees to the converter instead of zeroing the target.
    #[must_use]
    pub fn passing_nulls(mut self) -> Self {
        self.zero_nulls = false;
        self
    }

    /// What the converter handles, for logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn matches(&self, shape: &'static Shape) -> bool {
        (self.matches)(shape)
    }

    pub(crate) fn zeroes_nulls(&self) -> bool {
        self.zero_nulls
    }

    pub(crate) fn apply<'p>(
        &self,
        tree: &AttrValue,
        scope: &Scope<'_>,
        wip: Partial<'p, true>,
    ) -> Result<Partial<'p, true>, AttrError> {
        (self.apply)(tree, scope, wip)
    }
}

// Pins the closure to the higher-ranked signature of `ToFn`.
fn setter<F>(f: F) -> F
where
    F: for<'p> Fn(&AttrValue, &Scope<'_>, Partial<'p, true>) -> Result<Partial<'p, true>, AttrError>,
{
    f
}

/// An ordered list of converters.
#[derive(Clone, Default)]
pub struct Registry {
    from: Vec<FromConverter>,
    to: Vec<ToConverter>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// To-converters for bool, strings, `char` and every integer and float
    /// width.
    ///
    /// Null reads as the type's zero value. Numbers must fit exactly:
    /// a fractional or out-of-range number is an [`AttrErrorKind::Inexact`]
    /// error, never truncated.
    pub fn primitives() -> Self {
        Self::new()
            .to_converter(ToConverter::for_type::<bool, _>(|tree, _| {
                primitive(tree, AttrType::Bool, |payload| match payload {
                    Payload::Bool(b) => Some(Ok(*b)),
                    _ => None,
                })
            }))
            .to_converter(ToConverter::for_type::<String, _>(|tree, _| {
                primitive(tree, AttrType::String, |payload| match payload {
                    Payload::String(s) => Some(Ok(s.clone())),
                    _ => None,
                })
            }))
            .to_converter(ToConverter::for_type::<char, _>(|tree, _| {
                primitive(tree, AttrType::String, |payload| match payload {
                    Payload::String(s) => {
                        let mut chars = s.chars();
                        Some(match (chars.next(), chars.next()) {
                            (Some(c), None) => Ok(c),
                            _ => Err(AttrError::new(AttrErrorKind::InvalidPayload {
                                ty: AttrType::String,
                                reason: format!("{s:?} is not a single char"),
                            })),
                        })
                    }
                    _ => None,
                })
            }))
            .to_converter(integer::<u8>())
            .to_converter(integer::<u16>())
            .to_converter(integer::<u32>())
            .to_converter(integer::<u64>())
            .to_converter(integer::<u128>())
            .to_converter(integer::<usize>())
            .to_converter(integer::<i8>())
            .to_converter(integer::<i16>())
            .to_converter(integer::<i32>())
            .to_converter(integer::<i64>())
            .to_converter(integer::<i128>())
            .to_converter(integer::<isize>())
            .to_converter(ToConverter::for_type::<f64, _>(|tree, _| {
                number(tree, |n| n.to_f64().ok_or_else(|| inexact::<f64>(n)))
            }))
            .to_converter(ToConverter::for_type::<f32, _>(|tree, _| {
                number(tree, |n| {
                    let wide = n.to_f64().ok_or_else(|| inexact::<f32>(n))?;
                    let narrow = wide as f32;
                    if narrow.is_finite() != wide.is_finite() {
                        return Err(inexact::<f32>(n));
                    }
                    Ok(narrow)
                })
            }))
    }

    /// Append a from-converter.
    #[must_use]
    pub fn from_converter(mut self, converter: FromConverter) -> Self {
        self.from.push(converter);
        self
    }

    /// Append a to-converter.
    #[must_use]
    pub fn to_converter(mut self, converter: ToConverter) -> Self {
        self.to.push(converter);
        self
    }

    fn find_from(&self, shape: &'static Shape) -> Option<&FromConverter> {
        self.from.iter().find(|c| c.matches(shape))
    }

    fn find_to(&self, shape: &'static Shape) -> Option<&ToConverter> {
        self.to.iter().find(|c| c.matches(shape))
    }
}

fn primitive<T: Default>(
    tree: &AttrValue,
    expected: AttrType,
    read: impl FnOnce(&Payload) -> Option<Result<T, AttrError>>,
) -> Result<T, AttrError> {
    if *tree.ty() != expected {
        return Err(AttrError::new(AttrErrorKind::TypeMismatch {
            expected: expected.to_string(),
            found: tree.ty().clone(),
        }));
    }
    match tree.state() {
        State::Null => Ok(T::default()),
        State::Unknown => Err(AttrError::new(AttrErrorKind::UnknownValue {
            target: expected.to_string(),
        })),
        State::Known(payload) => read(payload).unwrap_or_else(|| {
            Err(AttrError::new(AttrErrorKind::InvalidPayload {
                ty: expected,
                reason: "payload of another type".to_owned(),
            }))
        }),
    }
}

fn number<T: Default>(
    tree: &AttrValue,
    convert: impl FnOnce(Number) -> Result<T, AttrError>,
) -> Result<T, AttrError> {
    primitive(tree, AttrType::Number, |payload| match payload {
        Payload::Number(n) => Some(convert(*n)),
        _ => None,
    })
}

fn inexact<T: for<'a> Facet<'a>>(number: Number) -> AttrError {
    AttrError::new(AttrErrorKind::Inexact {
        number,
        target: T::SHAPE.to_string(),
    })
}

fn integer<T>() -> ToConverter
where
    T: for<'a> Facet<'a> + TryFrom<i128> + Default,
{
    ToConverter::for_type::<T, _>(|tree, _| {
        number(tree, |n| {
            n.to_i128()
                .and_then(|i| T::try_from(i).ok())
                .ok_or_else(|| inexact::<T>(n))
        })
    })
}

/// Everything a conversion call needs to know.
///
/// ```rust,ignore
/// let options = Options::default()
///     .from_converter(FromConverter::for_type::<IpAddr, String, _>(|ip, _| {
///         Ok(AttrValue::string(ip.to_string()))
///     }))
///     .zero_unknowns();
/// ```
#[derive(Clone)]
pub struct Options {
    root: WalkPath,
    user: Registry,
    defaults: Registry,
    empty_policy: Option<Arc<dyn Fn(&WalkPath, &'static Shape) -> EmptyPolicy + Send + Sync>>,
    zero_unknowns: bool,
    set_elements: Vec<ConstTypeId>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            root: WalkPath::root(),
            user: Registry::new(),
            defaults: Registry::primitives(),
            empty_policy: None,
            zero_unknowns: false,
            set_elements: Vec::new(),
        }
    }
}

impl core::fmt::Debug for Options {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names = |r: &Registry| -> (Vec<String>, Vec<String>) {
            (
                r.from.iter().map(|c| c.name.clone()).collect(),
                r.to.iter().map(|c| c.name.clone()).collect(),
            )
        };
        let (user_from, user_to) = names(&self.user);
        f.debug_struct("Options")
            .field("root", &self.root)
            .field("from_converters", &user_from)
            .field("to_converters", &user_to)
            .field("has_empty_policy", &self.empty_policy.is_some())
            .field("zero_unknowns", &self.zero_unknowns)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Same as [`Options::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Report paths relative to `root`.
    #[must_use]
    pub fn with_root(mut self, root: WalkPath) -> Self {
        self.root = root;
        self
    }

    /// Register a from-converter after the ones already registered.
    #[must_use]
    pub fn from_converter(mut self, converter: FromConverter) -> Self {
        self.user = self.user.from_converter(converter);
        self
    }

    /// Register a to-converter after the ones already registered.
    #[must_use]
    pub fn to_converter(mut self, converter: ToConverter) -> Self {
        self.user = self.user.to_converter(converter);
        self
    }

    /// Replace the low-priority default converters.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Registry) -> Self {
        self.defaults = defaults;
        self
    }

    /// Decide per node what an empty container converts to.
    ///
    /// Without a policy, empty containers stay known and empty.
    #[must_use]
    pub fn empty_as_null_when(
        mut self,
        policy: impl Fn(&WalkPath, &'static Shape) -> EmptyPolicy + Send + Sync + 'static,
    ) -> Self {
        self.empty_policy = Some(Arc::new(policy));
        self
    }

    /// Treat unknown trees exactly like null ones in
    /// [`value_to`](crate::value_to).
    #[must_use]
    pub fn zero_unknowns(mut self) -> Self {
        self.zero_unknowns = true;
        self
    }

    /// Convert lists of `T` to sets instead.
    #[must_use]
    pub fn set_elements<T: for<'a> Facet<'a>>(mut self) -> Self {
        self.set_elements.push(T::SHAPE.id);
        self
    }

    /// The path prefix of every reported path.
    pub fn root(&self) -> &WalkPath {
        &self.root
    }

    /// Whether unknown trees read as null.
    pub fn zeroes_unknowns(&self) -> bool {
        self.zero_unknowns
    }

    pub(crate) fn find_from(&self, shape: &'static Shape) -> Option<&FromConverter> {
        self.user.find_from(shape).or_else(|| self.defaults.find_from(shape))
    }

    pub(crate) fn find_to(&self, shape: &'static Shape) -> Option<&ToConverter> {
        self.user.find_to(shape).or_else(|| self.defaults.find_to(shape))
    }

    pub(crate) fn empty_policy(&self, path: &WalkPath, shape: &'static Shape) -> EmptyPolicy {
        match &self.empty_policy {
            Some(policy) => policy(path, shape),
            None => EmptyPolicy::Empty,
        }
    }

    pub(crate) fn is_set_element(&self, shape: &'static Shape) -> bool {
        self.set_elements.contains(&shape.id)
    }
}
