//! Core data structures for operator dispatch.
//!
//! Defines operator descriptors, the typed per-call request, and the values a
//! call can hand back.

use crate::datafile::DataHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Number of input or output streams of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arity {
    Fixed(u32),
    /// Input-dependent count (`-1` in tool listings)
    Variable,
}

impl Arity {
    /// Parse a count as printed by the tool, normalising output arities
    /// above two to [`Arity::Variable`]
    pub fn from_output_count(count: i64) -> Self {
        match count {
            0..=2 => Arity::Fixed(count as u32),
            _ => Arity::Variable,
        }
    }

    pub fn from_input_count(count: i64) -> Self {
        u32::try_from(count).map_or(Arity::Variable, Arity::Fixed)
    }

    /// Integer encoding used by the tool: `-1` for variable
    pub fn as_i32(&self) -> i32 {
        match self {
            Arity::Fixed(n) => *n as i32,
            Arity::Variable => -1,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// One operator offered by the bound binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    pub name: String,
    pub input_arity: Arity,
    pub output_arity: Arity,
}

impl OperatorDescriptor {
    pub fn new(name: impl Into<String>, input_arity: Arity, output_arity: Arity) -> Self {
        Self {
            name: name.into(),
            input_arity,
            output_arity,
        }
    }

    /// Operators that print to stdout instead of writing a file
    pub fn writes_stdout(&self) -> bool {
        self.output_arity == Arity::Fixed(0)
    }
}

/// A positional operator parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
    List(Vec<Param>),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Text(s) => f.write_str(s),
            Param::Int(i) => write!(f, "{i}"),
            Param::Float(x) => write!(f, "{x}"),
            Param::List(items) => {
                let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Int(value.into())
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl<T: Into<Param>> From<Vec<T>> for Param {
    fn from(values: Vec<T>) -> Self {
        Param::List(values.into_iter().map(Into::into).collect())
    }
}

/// Where an operator writes its result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Output {
    /// Allocate temporary files per the operator's output arity
    #[default]
    Temp,
    /// Run without an output file and parse stdout
    Stdout,
    /// One explicit file, or the file-name prefix of a variable-output operator
    Path(PathBuf),
    /// Explicit files for multi-output operators
    Paths(Vec<PathBuf>),
}

/// How the caller wants the result handed back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnShape {
    #[default]
    RawPath,
    ParsedLines,
    /// Dense values of the named variable
    Array(String),
    /// Values of the named variable masked by its fill value
    MaskedArray(String),
    /// Open handle(s) on the produced file(s)
    Handle,
}

impl ReturnShape {
    /// Shapes that need the result on disk in the structured-data format
    pub fn needs_structured_data(&self) -> bool {
        matches!(
            self,
            ReturnShape::Array(_) | ReturnShape::MaskedArray(_) | ReturnShape::Handle
        )
    }
}

/// Typed per-call request
///
/// Built fresh for every call with [`InvocationRequest::new`] and the
/// `with_*`-style setters.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    pub operator: String,
    pub params: Vec<Param>,
    /// File paths or nested operator expressions, joined with spaces
    pub input: Vec<String>,
    pub output: Output,
    /// Raw option string such as `-f nc -b F64`
    pub options: Option<String>,
    pub return_shape: Option<ReturnShape>,
    /// Overrides the client's force setting when present
    pub force: Option<bool>,
    pub env: BTreeMap<String, String>,
    /// Secondary delimiter splitting each stdout line into fields
    pub auto_split: Option<String>,
}

impl InvocationRequest {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            ..Default::default()
        }
    }

    pub fn param(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn params<I, P>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.params.extend(params.into_iter().map(Into::into));
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input.push(input.into());
        self
    }

    pub fn inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Output::Path(path.into());
        self
    }

    pub fn outputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.output = Output::Paths(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn to_stdout(mut self) -> Self {
        self.output = Output::Stdout;
        self
    }

    pub fn options(mut self, options: impl Into<String>) -> Self {
        self.options = Some(options.into());
        self
    }

    pub fn return_shape(mut self, shape: ReturnShape) -> Self {
        self.return_shape = Some(shape);
        self
    }

    pub fn return_array(self, variable: impl Into<String>) -> Self {
        self.return_shape(ReturnShape::Array(variable.into()))
    }

    pub fn return_masked_array(self, variable: impl Into<String>) -> Self {
        self.return_shape(ReturnShape::MaskedArray(variable.into()))
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn auto_split(mut self, delimiter: impl Into<String>) -> Self {
        self.auto_split = Some(delimiter.into());
        self
    }
}

/// Dense values of one variable in C order
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

/// Values paired with a per-element missing mask (`true` = missing)
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
    pub mask: Vec<bool>,
}

impl MaskedArray {
    /// Values that are not masked
    pub fn valid(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .zip(&self.mask)
            .filter(|(_, missing)| !**missing)
            .map(|(v, _)| *v)
    }
}

/// What a dispatched call hands back
pub enum CallOutput {
    Path(PathBuf),
    Paths(Vec<PathBuf>),
    /// Stripped stdout lines
    Lines(Vec<String>),
    /// The single stdout line split by the requested delimiter
    Fields(Vec<String>),
    /// Every stdout line split by the requested delimiter
    Table(Vec<Vec<String>>),
    Array(ArrayData),
    Masked(MaskedArray),
    Handle(Box<dyn DataHandle>),
    Handles(Vec<Box<dyn DataHandle>>),
    /// Sentinel returned instead of an error under a lenient policy
    Failed(String),
}

impl CallOutput {
    pub fn is_failed(&self) -> bool {
        matches!(self, CallOutput::Failed(_))
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            CallOutput::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn into_paths(self) -> Option<Vec<PathBuf>> {
        match self {
            CallOutput::Path(path) => Some(vec![path]),
            CallOutput::Paths(paths) => Some(paths),
            _ => None,
        }
    }

    pub fn into_lines(self) -> Option<Vec<String>> {
        match self {
            CallOutput::Lines(lines) | CallOutput::Fields(lines) => Some(lines),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayData> {
        match self {
            CallOutput::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn into_masked(self) -> Option<MaskedArray> {
        match self {
            CallOutput::Masked(masked) => Some(masked),
            _ => None,
        }
    }
}

impl fmt::Debug for CallOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOutput::Path(p) => f.debug_tuple("Path").field(p).finish(),
            CallOutput::Paths(p) => f.debug_tuple("Paths").field(p).finish(),
            CallOutput::Lines(l) => f.debug_tuple("Lines").field(l).finish(),
            CallOutput::Fields(l) => f.debug_tuple("Fields").field(l).finish(),
            CallOutput::Table(t) => f.debug_tuple("Table").field(t).finish(),
            CallOutput::Array(a) => f.debug_tuple("Array").field(a).finish(),
            CallOutput::Masked(m) => f.debug_tuple("Masked").field(m).finish(),
            CallOutput::Handle(h) => f.debug_tuple("Handle").field(&h.path()).finish(),
            CallOutput::Handles(hs) => {
                let paths: Vec<_> = hs.iter().map(|h| h.path()).collect();
                f.debug_tuple("Handles").field(&paths).finish()
            }
            CallOutput::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}
