//! Named parameters
//!
//! Generator and test fields that a caller may override per query are
//! declared as [`Param`]s. Each generator/test reports its named fields
//! through `collect_params`, the template merges them into one table of
//! defaults, and `submit` applies caller overrides on top. The resulting
//! [`NamedValues`] table is frozen for the lifetime of the query instance.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
        }
    }

    /// Parses `text` as a value of `kind`.
    pub fn parse_as(kind: ParamKind, text: &str) -> Result<Self, QueryError> {
        let text = text.trim();
        let bad = || QueryError::InvalidParam(format!("'{}' is not a valid {:?}", text, kind));
        match kind {
            ParamKind::Bool => match text {
                "true" | "1" | "yes" => Ok(ParamValue::Bool(true)),
                "false" | "0" | "no" => Ok(ParamValue::Bool(false)),
                _ => Err(bad()),
            },
            ParamKind::Int => text.parse().map(ParamValue::Int).map_err(|_| bad()),
            ParamKind::Float => text.parse().map(ParamValue::Float).map_err(|_| bad()),
        }
    }

    /// Coerces to `kind` where lossless enough for parameters (int to float).
    fn coerce(self, kind: ParamKind) -> Option<ParamValue> {
        match (self, kind) {
            (v, k) if v.kind() == k => Some(v),
            (ParamValue::Int(i), ParamKind::Float) => Some(ParamValue::Float(i as f32)),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Rust types usable as parameter values.
pub trait ParamType: Copy + fmt::Debug {
    const KIND: ParamKind;
    fn into_value(self) -> ParamValue;
    fn from_value(value: ParamValue) -> Option<Self>;
}

impl ParamType for f32 {
    const KIND: ParamKind = ParamKind::Float;
    fn into_value(self) -> ParamValue {
        ParamValue::Float(self)
    }
    fn from_value(value: ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(v) => Some(v),
            ParamValue::Int(i) => Some(i as f32),
            ParamValue::Bool(_) => None,
        }
    }
}

impl ParamType for bool {
    const KIND: ParamKind = ParamKind::Bool;
    fn into_value(self) -> ParamValue {
        ParamValue::Bool(self)
    }
    fn from_value(value: ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl ParamType for i32 {
    const KIND: ParamKind = ParamKind::Int;
    fn into_value(self) -> ParamValue {
        ParamValue::Int(self)
    }
    fn from_value(value: ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(i) => Some(i),
            _ => None,
        }
    }
}

/// A configuration field that is either a literal or bound to a named parameter.
///
/// In template files a literal is written as-is (`radius = 500.0`) and a bound
/// field as a table (`radius = { param = "Radius", default = 500.0 }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param<T> {
    Value(T),
    Named { param: String, default: T },
}

pub type FloatParam = Param<f32>;
pub type BoolParam = Param<bool>;
pub type IntParam = Param<i32>;

impl<T: ParamType> Param<T> {
    pub fn named(name: impl Into<String>, default: T) -> Self {
        Param::Named {
            param: name.into(),
            default,
        }
    }

    pub fn default_value(&self) -> T {
        match self {
            Param::Value(v) => *v,
            Param::Named { default, .. } => *default,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Param::Value(_) => None,
            Param::Named { param, .. } => Some(param),
        }
    }

    /// Registers this field in `out` when it is bound to a name.
    pub fn collect(&self, out: &mut Vec<NamedValue>) {
        if let Param::Named { param, default } = self {
            out.push(NamedValue::new(param.clone(), default.into_value()));
        }
    }
}

impl<T> From<T> for Param<T> {
    fn from(value: T) -> Self {
        Param::Value(value)
    }
}

impl<T: fmt::Display> fmt::Display for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Value(v) => write!(f, "{}", v),
            Param::Named { param, default } => write!(f, "{}[{}]", param, default),
        }
    }
}

/// One externally settable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: ParamValue,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn kind(&self) -> ParamKind {
        self.value.kind()
    }
}

/// Caller-supplied overrides passed to `submit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    values: Vec<NamedValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn float(mut self, name: impl Into<String>, value: f32) -> Self {
        self.values.push(NamedValue::new(name, ParamValue::Float(value)));
        self
    }

    pub fn bool(mut self, name: impl Into<String>, value: bool) -> Self {
        self.values.push(NamedValue::new(name, ParamValue::Bool(value)));
        self
    }

    pub fn int(mut self, name: impl Into<String>, value: i32) -> Self {
        self.values.push(NamedValue::new(name, ParamValue::Int(value)));
        self
    }

    pub fn push(&mut self, value: NamedValue) {
        self.values.push(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedValue> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Frozen parameter table owned by a query instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedValues {
    values: Vec<NamedValue>,
}

impl NamedValues {
    /// Builds the defaults table, rejecting one name declared with two kinds.
    pub fn from_declared(declared: Vec<NamedValue>) -> Result<Self, QueryError> {
        let mut values: Vec<NamedValue> = Vec::with_capacity(declared.len());
        for value in declared {
            match values.iter().find(|v| v.name == value.name) {
                Some(existing) if existing.kind() != value.kind() => {
                    return Err(QueryError::InvalidTemplate(format!(
                        "parameter '{}' declared as both {:?} and {:?}",
                        value.name,
                        existing.kind(),
                        value.kind()
                    )));
                }
                Some(_) => {}
                None => values.push(value),
            }
        }
        Ok(Self { values })
    }

    /// Applies caller overrides. Unknown names are ignored.
    pub fn apply(&mut self, overrides: &QueryParams) -> Result<(), QueryError> {
        for supplied in overrides.iter() {
            let Some(slot) = self.values.iter_mut().find(|v| v.name == supplied.name) else {
                debug!(param = %supplied.name, "Ignoring parameter not used by template");
                continue;
            };
            slot.value = supplied.value.coerce(slot.kind()).ok_or_else(|| {
                QueryError::InvalidParam(format!(
                    "'{}' expects {:?}, got {:?}",
                    supplied.name,
                    slot.kind(),
                    supplied.kind()
                ))
            })?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }

    /// Current value of `param`, falling back to its declared default.
    pub fn resolve<T: ParamType>(&self, param: &Param<T>) -> T {
        match param {
            Param::Value(v) => *v,
            Param::Named { param, default } => self
                .get(param)
                .and_then(T::from_value)
                .unwrap_or(*default),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
