use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::template::InputTemplate;
use super::BufPair;
use super::Context;
use crate::error::FetchError;
use crate::json_ext::JsonType;

/// A node of the response plan tree.
///
/// Plans are produced by a planner from an already validated operation; the
/// resolver walks them and emits JSON.
#[derive(Debug, Clone)]
pub enum Node {
    Object(Object),
    Array(Array),
    Scalar(Scalar),
    Null,
    EmptyObject,
    EmptyArray,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub nullable: bool,
    /// Key path re-scoping the parent data; empty means "use it unchanged".
    pub path: Vec<String>,
    pub field_sets: Vec<FieldSet>,
    pub fetch: Option<Fetch>,
}

#[derive(Debug, Clone)]
pub struct Array {
    pub nullable: bool,
    pub path: Vec<String>,
    /// Resolve items concurrently. Output order follows the source array
    /// either way.
    pub resolve_asynchronous: bool,
    pub item: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub path: Vec<String>,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Boolean,
    Integer,
    Float,
}

impl ScalarKind {
    pub(crate) fn json_type(self) -> JsonType {
        match self {
            ScalarKind::String => JsonType::String,
            ScalarKind::Boolean => JsonType::Boolean,
            ScalarKind::Integer | ScalarKind::Float => JsonType::Number,
        }
    }
}

/// A group of fields sharing one upstream buffer, optionally gated on the
/// source object's `__typename`.
#[derive(Debug, Clone)]
pub struct FieldSet {
    pub on_type_name: Option<Bytes>,
    /// Buffer in the object's result set to read from; `None` reads the
    /// object's own data.
    pub buffer_id: Option<usize>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Bytes,
    pub value: Node,
}

#[derive(Debug, Clone)]
pub enum Fetch {
    Single(SingleFetch),
    Parallel(ParallelFetch),
}

#[derive(Clone)]
pub struct SingleFetch {
    pub buffer_id: usize,
    pub data_source: Arc<dyn DataSource>,
    pub input_template: InputTemplate,
    /// Disables single-flight for this fetch, e.g. for mutations. Coalescing
    /// also needs to be enabled on the resolver itself.
    pub disallow_single_flight: bool,
}

impl fmt::Debug for SingleFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFetch")
            .field("buffer_id", &self.buffer_id)
            .field(
                "data_source",
                &String::from_utf8_lossy(self.data_source.unique_identifier()),
            )
            .field("disallow_single_flight", &self.disallow_single_flight)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ParallelFetch {
    pub fetches: Vec<SingleFetch>,
}

/// An upstream source of response data.
///
/// `load` writes a complete JSON value into `buf.data` on success and/or
/// appends well-formed error objects, without outer brackets, to
/// `buf.errors`. Returning an error aborts the branch that issued the fetch;
/// errors written to the buffer do not. Implementations must honor
/// cancellation of the passed context.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self, ctx: &Context, input: &[u8], buf: &mut BufPair) -> Result<(), FetchError>;

    /// Stable identifier scoping single-flight coalescing to this source.
    fn unique_identifier(&self) -> &[u8];
}

/// A synchronous response plan: one tree rooted at `data`.
#[derive(Debug, Clone)]
pub struct GraphQLResponse {
    pub data: Node,
}

/// Buffers produced by one object's fetches, keyed by buffer id. Lives only
/// while the object resolves.
pub(crate) struct ResultSet {
    pub(crate) buffers: HashMap<usize, BufPair>,
}

impl ResultSet {
    pub(crate) fn new() -> Self {
        Self {
            buffers: HashMap::with_capacity(8),
        }
    }
}
