//! The host object model that arrays are marshaled to and from.
//!
//! `Host` is the boundary: attribute lookup, constructing host objects by
//! class, and wrapping a native buffer as a host array. `HostHeap` is an
//! in-memory host that keeps track of how many host objects are alive.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hashbrown::HashSet;
use indexmap::IndexMap;
use jagged_error::{DbError, ErrorKind, Result};
use parking_lot::Mutex;
use tracing::trace;

use crate::arrays::primitive::PrimitiveArray;
use crate::arrays::scalar::ScalarValue;

/// Classes of host objects that take part in marshaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostClass {
    /// Host view over a flat primitive buffer.
    NumpyArray,
    /// Integer index wrapper, with attribute `array`.
    Index,
    /// Attributes `offsets`, `content`, `identity`.
    ListOffsetArray,
    /// Attributes `ref`, `fieldloc`, `width`, `array`.
    Identity,
}

impl HostClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NumpyArray => "NumpyArray",
            Self::Index => "Index",
            Self::ListOffsetArray => "ListOffsetArray",
            Self::Identity => "Identity",
        }
    }

    /// Attribute names, in constructor argument order.
    pub const fn attributes(&self) -> &'static [&'static str] {
        match self {
            Self::NumpyArray => &[],
            Self::Index => &["array"],
            Self::ListOffsetArray => &["offsets", "content", "identity"],
            Self::Identity => &["ref", "fieldloc", "width", "array"],
        }
    }
}

impl fmt::Display for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A value on the host side of the boundary.
///
/// Cloning a value is a reference increment on the host, dropping it a
/// decrement.
#[derive(Debug, Clone)]
pub enum HostValue {
    None,
    Scalar(ScalarValue),
    Str(Arc<str>),
    List(Arc<[HostValue]>),
    Object(HostObject),
}

impl HostValue {
    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }

    pub fn try_as_object(&self) -> Result<&HostObject> {
        match self {
            HostValue::Object(obj) => Ok(obj),
            other => Err(DbError::new("Expected host object")
                .with_kind(ErrorKind::Marshal)
                .with_field("value", other.type_name())),
        }
    }

    /// Get the object if it's of the given class.
    pub fn try_as_class(&self, class: HostClass) -> Result<&HostObject> {
        let obj = self.try_as_object()?;
        if obj.class() != class {
            return Err(DbError::new("Unexpected host class")
                .with_kind(ErrorKind::Marshal)
                .with_field("expected", class)
                .with_field("have", obj.class()));
        }
        Ok(obj)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::None => "None",
            HostValue::Scalar(_) => "scalar",
            HostValue::Str(_) => "str",
            HostValue::List(_) => "list",
            HostValue::Object(obj) => obj.class().as_str(),
        }
    }
}

impl From<ScalarValue> for HostValue {
    fn from(value: ScalarValue) -> Self {
        HostValue::Scalar(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Str(value.into())
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(value: Vec<HostValue>) -> Self {
        HostValue::List(value.into())
    }
}

/// Reference counted host object.
#[derive(Clone)]
pub struct HostObject {
    inner: Arc<HostObjectInner>,
}

struct HostObjectInner {
    class: HostClass,
    attrs: IndexMap<&'static str, HostValue>,
    /// Backing buffer for `NumpyArray` objects.
    buffer: Option<PrimitiveArray>,
    _live: LiveToken,
}

impl HostObject {
    pub fn class(&self) -> HostClass {
        self.inner.class
    }

    pub fn attr(&self, name: &str) -> Option<&HostValue> {
        self.inner.attrs.get(name)
    }

    pub fn attr_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inner.attrs.keys().copied()
    }

    pub fn buffer(&self) -> Option<&PrimitiveArray> {
        self.inner.buffer.as_ref()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("class", &self.inner.class)
            .field("attrs", &self.inner.attrs)
            .field("buffer", &self.inner.buffer)
            .finish()
    }
}

/// Decrements the heap's live object count when the owning object is
/// released.
struct LiveToken {
    live: Arc<AtomicUsize>,
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Operations the marshaler needs from the host.
pub trait Host {
    /// Look up an attribute, returning a new reference to it.
    fn getattr(&self, value: &HostValue, name: &str) -> Result<HostValue>;

    /// Call the constructor for `class` with positional arguments.
    ///
    /// The constructed object takes its own references to the arguments,
    /// callers keep ownership of theirs.
    fn construct(&self, class: HostClass, args: &[HostValue]) -> Result<HostValue>;

    /// Wrap a native primitive array as a host array without copying.
    fn new_array(&self, array: PrimitiveArray) -> Result<HostValue>;
}

/// In-memory host.
#[derive(Debug, Default)]
pub struct HostHeap {
    live: Arc<AtomicUsize>,
    rejected: Mutex<HashSet<HostClass>>,
}

impl HostHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of host objects currently alive.
    pub fn live_objects(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Make every following `construct` call for `class` fail.
    pub fn reject_constructor(&self, class: HostClass) {
        self.rejected.lock().insert(class);
    }

    pub fn allow_constructor(&self, class: HostClass) {
        self.rejected.lock().remove(&class);
    }

    /// Create an object with arbitrary attributes, skipping the constructor
    /// checks.
    ///
    /// Hosts can hold objects that don't match what their constructors would
    /// produce (e.g. attributes reassigned after construction). This is how
    /// such objects are built.
    pub fn new_object(
        &self,
        class: HostClass,
        attrs: impl IntoIterator<Item = (&'static str, HostValue)>,
    ) -> HostValue {
        self.alloc(class, attrs.into_iter().collect(), None)
    }

    fn alloc(
        &self,
        class: HostClass,
        attrs: IndexMap<&'static str, HostValue>,
        buffer: Option<PrimitiveArray>,
    ) -> HostValue {
        self.live.fetch_add(1, Ordering::Relaxed);
        HostValue::Object(HostObject {
            inner: Arc::new(HostObjectInner {
                class,
                attrs,
                buffer,
                _live: LiveToken {
                    live: self.live.clone(),
                },
            }),
        })
    }
}

impl Host for HostHeap {
    fn getattr(&self, value: &HostValue, name: &str) -> Result<HostValue> {
        let obj = value.try_as_object()?;
        obj.attr(name).cloned().ok_or_else(|| {
            DbError::new("Host object has no attribute")
                .with_kind(ErrorKind::Marshal)
                .with_field("class", obj.class())
                .with_field("attribute", name.to_string())
        })
    }

    fn construct(&self, class: HostClass, args: &[HostValue]) -> Result<HostValue> {
        if self.rejected.lock().contains(&class) {
            trace!(%class, "rejecting constructor call");
            return Err(DbError::new("Host constructor failed")
                .with_kind(ErrorKind::Marshal)
                .with_field("class", class));
        }

        let names = class.attributes();
        if class == HostClass::NumpyArray || names.len() != args.len() {
            return Err(DbError::new("Wrong number of constructor arguments")
                .with_kind(ErrorKind::Marshal)
                .with_field("class", class)
                .with_field("expected", names.len())
                .with_field("got", args.len()));
        }

        match class {
            HostClass::Index => {
                let is_integer = args[0]
                    .try_as_class(HostClass::NumpyArray)?
                    .buffer()
                    .map(|buf| buf.datatype().is_integer())
                    .unwrap_or(false);
                if !is_integer {
                    return Err(DbError::new("Index requires an integer array")
                        .with_kind(ErrorKind::Marshal));
                }
            }
            HostClass::ListOffsetArray => {
                args[0].try_as_class(HostClass::Index)?;
                let content = args[1].try_as_object()?;
                if !matches!(
                    content.class(),
                    HostClass::NumpyArray | HostClass::ListOffsetArray
                ) {
                    return Err(DbError::new("Content must be an array")
                        .with_kind(ErrorKind::Marshal)
                        .with_field("have", content.class()));
                }
                if !args[2].is_none() {
                    args[2].try_as_class(HostClass::Identity)?;
                }
            }
            HostClass::Identity => {
                args[3].try_as_class(HostClass::NumpyArray)?;
            }
            HostClass::NumpyArray => (),
        }

        let attrs = names.iter().copied().zip(args.iter().cloned()).collect();

        Ok(self.alloc(class, attrs, None))
    }

    fn new_array(&self, array: PrimitiveArray) -> Result<HostValue> {
        Ok(self.alloc(HostClass::NumpyArray, IndexMap::new(), Some(array)))
    }
}
