//! S-expression values
//!
//! One unit of R data is a payload (a closed tagged union) plus a list of
//! named attributes. Attributes are themselves S-expressions, so the type
//! is recursive; the whole tree is a strict ownership tree with no sharing.

use std::fmt;

use super::na::{is_na_integer, is_na_real, Logical};

/// Payload of an S-expression.
///
/// Every wire type the decoder interprets has a variant here; anything it
/// does not interpret survives as `Raw` and re-encodes byte-identically.
#[derive(Debug, Clone)]
pub enum SexpData {
    /// The R NULL value. No payload.
    Null,

    /// Integer vector; `NA_INTEGER` (`i32::MIN`) marks missing elements.
    Integers(Vec<i32>),

    /// Double vector; the NA bit pattern marks missing elements.
    Doubles(Vec<f64>),

    /// Logical vector of tri-state elements.
    Logicals(Vec<Logical>),

    /// Character vector; `None` marks missing elements.
    Strings(Vec<Option<String>>),

    /// Date vector as days since 1970-01-01; `NA_INTEGER` marks missing
    /// elements. Not a distinct wire type: this is an integer vector whose
    /// `class` attribute is `"Date"`, recognized at decode time.
    Dates(Vec<i32>),

    /// Generic vector (untagged list) of child values.
    List(Vec<Sexp>),

    /// Named list of (key, value) entries. Also the wire representation of
    /// every attribute list.
    TaggedList(Vec<(String, Sexp)>),

    /// A symbol name, as used for attribute and list keys.
    Symbol(String),

    /// An uninterpreted wire object: original type tag plus payload bytes,
    /// kept verbatim so it can be forwarded or re-sent unmodified.
    Raw { ty: u8, data: Vec<u8> },
}

/// One unit of R data: a payload plus named attributes.
///
/// Values are built either by callers (to be sent) or by the decoder (from
/// bytes received), and are not mutated afterwards; attribute attachment
/// happens at construction via [`Sexp::with_attribute`].
#[derive(Debug, Clone)]
pub struct Sexp {
    data: SexpData,
    attributes: Vec<(String, Sexp)>,
}

impl Sexp {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Wrap a payload with no attributes.
    pub fn new(data: SexpData) -> Self {
        Self {
            data,
            attributes: Vec::new(),
        }
    }

    /// The R NULL value.
    pub fn null() -> Self {
        Self::new(SexpData::Null)
    }

    /// An integer vector.
    pub fn integers(values: impl Into<Vec<i32>>) -> Self {
        Self::new(SexpData::Integers(values.into()))
    }

    /// A double vector.
    pub fn doubles(values: impl Into<Vec<f64>>) -> Self {
        Self::new(SexpData::Doubles(values.into()))
    }

    /// A logical vector.
    pub fn logicals(values: impl Into<Vec<Logical>>) -> Self {
        Self::new(SexpData::Logicals(values.into()))
    }

    /// A character vector; `None` entries are NA.
    pub fn strings(values: Vec<Option<String>>) -> Self {
        Self::new(SexpData::Strings(values))
    }

    /// A one-element character vector.
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(SexpData::Strings(vec![Some(value.into())]))
    }

    /// A date vector, in days since 1970-01-01.
    ///
    /// Attaches `class = "Date"` so the value round-trips as a date; the
    /// encoder never injects attributes on its own.
    pub fn dates(days: impl Into<Vec<i32>>) -> Self {
        Self::new(SexpData::Dates(days.into())).with_attribute("class", Sexp::string("Date"))
    }

    /// An untagged list.
    pub fn list(children: Vec<Sexp>) -> Self {
        Self::new(SexpData::List(children))
    }

    /// A named list.
    pub fn tagged_list(entries: Vec<(String, Sexp)>) -> Self {
        Self::new(SexpData::TaggedList(entries))
    }

    /// A symbol name.
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(SexpData::Symbol(name.into()))
    }

    /// An uninterpreted wire object.
    pub fn raw(ty: u8, data: Vec<u8>) -> Self {
        Self::new(SexpData::Raw { ty, data })
    }

    /// Attach one attribute, replacing any existing attribute of the same
    /// name. Chainable.
    pub fn with_attribute(mut self, name: impl Into<String>, value: Sexp) -> Self {
        let name = name.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
        self
    }

    /// Replace the whole attribute list.
    pub fn with_attributes(mut self, attributes: Vec<(String, Sexp)>) -> Self {
        self.attributes = attributes;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The payload.
    pub fn data(&self) -> &SexpData {
        &self.data
    }

    /// Consume the value, returning the payload and dropping attributes.
    pub fn into_data(self) -> SexpData {
        self.data
    }

    /// The attribute list, in the order it arrived or was built.
    pub fn attributes(&self) -> &[(String, Sexp)] {
        &self.attributes
    }

    /// Look up one attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Sexp> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Whether any attributes are attached.
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Whether the payload is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self.data, SexpData::Null)
    }

    /// Element count of the payload. NULL has zero elements; `Raw` counts
    /// its bytes.
    pub fn len(&self) -> usize {
        match &self.data {
            SexpData::Null => 0,
            SexpData::Integers(v) => v.len(),
            SexpData::Doubles(v) => v.len(),
            SexpData::Logicals(v) => v.len(),
            SexpData::Strings(v) => v.len(),
            SexpData::Dates(v) => v.len(),
            SexpData::List(v) => v.len(),
            SexpData::TaggedList(v) => v.len(),
            SexpData::Symbol(_) => 1,
            SexpData::Raw { data, .. } => data.len(),
        }
    }

    /// Whether the payload has zero elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer elements, for both integer and date vectors.
    pub fn as_integers(&self) -> Option<&[i32]> {
        match &self.data {
            SexpData::Integers(v) | SexpData::Dates(v) => Some(v),
            _ => None,
        }
    }

    /// Double elements.
    pub fn as_doubles(&self) -> Option<&[f64]> {
        match &self.data {
            SexpData::Doubles(v) => Some(v),
            _ => None,
        }
    }

    /// Logical elements.
    pub fn as_logicals(&self) -> Option<&[Logical]> {
        match &self.data {
            SexpData::Logicals(v) => Some(v),
            _ => None,
        }
    }

    /// String elements.
    pub fn as_strings(&self) -> Option<&[Option<String>]> {
        match &self.data {
            SexpData::Strings(v) => Some(v),
            _ => None,
        }
    }

    /// A single string view: the first element of a character vector (if
    /// present and not NA) or a symbol's name.
    pub fn as_string(&self) -> Option<&str> {
        match &self.data {
            SexpData::Strings(v) => v.first().and_then(|s| s.as_deref()),
            SexpData::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Children of an untagged list.
    pub fn as_list(&self) -> Option<&[Sexp]> {
        match &self.data {
            SexpData::List(v) => Some(v),
            _ => None,
        }
    }

    /// Entries of a named list.
    pub fn as_tagged_list(&self) -> Option<&[(String, Sexp)]> {
        match &self.data {
            SexpData::TaggedList(v) => Some(v),
            _ => None,
        }
    }
}

// =============================================================================
// Equality
// =============================================================================

impl PartialEq for Sexp {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && attributes_eq(&self.attributes, &other.attributes)
    }
}

/// Attribute order is preserved for wire fidelity but does not affect
/// meaning, so equality ignores it. Attribute names never repeat.
fn attributes_eq(a: &[(String, Sexp)], b: &[(String, Sexp)]) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(name, value)| b.iter().any(|(n, v)| n == name && v == value))
}

impl PartialEq for SexpData {
    fn eq(&self, other: &Self) -> bool {
        use SexpData::*;
        match (self, other) {
            (Null, Null) => true,
            (Integers(a), Integers(b)) => a == b,
            (Doubles(a), Doubles(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| double_eq(*x, *y))
            }
            (Logicals(a), Logicals(b)) => a == b,
            (Strings(a), Strings(b)) => a == b,
            (Dates(a), Dates(b)) => a == b,
            (List(a), List(b)) => a == b,
            (TaggedList(a), TaggedList(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Raw { ty: a, data: x }, Raw { ty: b, data: y }) => a == b && x == y,
            _ => false,
        }
    }
}

/// Element equality with NA awareness: the NA double is a NaN and would
/// never equal itself under IEEE comparison.
fn double_eq(a: f64, b: f64) -> bool {
    a == b || a.to_bits() == b.to_bits()
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for Sexp {
    /// Renders roughly like R's `deparse`: `c(1L, NA, 3L)`,
    /// `list(x = 1.5)`, `structure(..., class = "Date")`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attributes.is_empty() {
            return write!(f, "{}", self.data);
        }
        write!(f, "structure({}", self.data)?;
        for (name, value) in &self.attributes {
            write!(f, ", {} = {}", name, value)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for SexpData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SexpData::Null => write!(f, "NULL"),
            SexpData::Integers(v) | SexpData::Dates(v) => {
                write_vector(f, v, |f, x| {
                    if is_na_integer(*x) {
                        write!(f, "NA")
                    } else {
                        write!(f, "{}L", x)
                    }
                })
            }
            SexpData::Doubles(v) => write_vector(f, v, |f, x| {
                if is_na_real(*x) {
                    write!(f, "NA")
                } else {
                    write!(f, "{}", x)
                }
            }),
            SexpData::Logicals(v) => write_vector(f, v, |f, x| match x.as_bool() {
                Some(true) => write!(f, "TRUE"),
                Some(false) => write!(f, "FALSE"),
                None => write!(f, "NA"),
            }),
            SexpData::Strings(v) => write_vector(f, v, |f, x| match x {
                Some(s) => write!(f, "{:?}", s),
                None => write!(f, "NA"),
            }),
            SexpData::List(children) => {
                write!(f, "list(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            SexpData::TaggedList(entries) => {
                write!(f, "list(")?;
                for (i, (name, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if name.is_empty() {
                        write!(f, "{}", value)?;
                    } else {
                        write!(f, "{} = {}", name, value)?;
                    }
                }
                write!(f, ")")
            }
            SexpData::Symbol(name) => write!(f, "{}", name),
            SexpData::Raw { ty, data } => write!(f, "<raw type {}, {} bytes>", ty, data.len()),
        }
    }
}

/// Atomic vectors print as a bare element when length 1, else `c(...)`.
fn write_vector<T>(
    f: &mut fmt::Formatter<'_>,
    values: &[T],
    mut write_one: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    if values.len() == 1 {
        return write_one(f, &values[0]);
    }
    write!(f, "c(")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_one(f, value)?;
    }
    write!(f, ")")
}
