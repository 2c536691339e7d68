//! Plan-driven response resolution.
//!
//! [`Resolver::resolve_graphql_response`] walks a plan tree against upstream
//! JSON, issuing data source fetches where the plan asks for them, and writes
//! the `{"errors":[…],"data":…}` envelope to a caller-supplied writer while
//! enforcing GraphQL null-propagation rules.

mod buf_pair;
mod node;
mod pool;
mod singleflight;
mod subscription;
mod template;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use futures::future::BoxFuture;
use futures::lock::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub use buf_pair::BufPair;
pub use node::Array;
pub use node::DataSource;
pub use node::Fetch;
pub use node::Field;
pub use node::FieldSet;
pub use node::GraphQLResponse;
pub use node::Node;
pub use node::Object;
pub use node::ParallelFetch;
pub use node::Scalar;
pub use node::ScalarKind;
pub use node::SingleFetch;
pub use subscription::GraphQLSubscription;
pub use subscription::SubscriptionDataSource;
pub use subscription::SubscriptionTrigger;
pub use template::InputTemplate;
pub use template::TemplateSegment;
pub use template::Variable;
pub use template::VariableSource;
pub use template::Variables;

use crate::error::ResolveError;
use crate::json_ext;
use crate::json_ext::JsonType;
use node::ResultSet;
use pool::Pool;
use singleflight::SharedLoad;

const NULL: &[u8] = b"null";
const TYPENAME: &str = "__typename";

/// Per-request resolution context.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// JSON-encoded operation variables.
    pub variables: Bytes,
    /// Cancels in-flight data source loads when triggered.
    pub cancellation: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(variables: impl Into<Bytes>) -> Self {
        Self {
            variables: variables.into(),
            cancellation: CancellationToken::new(),
        }
    }
}

/// Resolves response plans. One instance is shared across requests; its
/// pools and the single-flight wait map are the only cross-request state.
pub struct Resolver {
    enable_single_flight_loader: bool,
    buf_pair_pool: Pool<BufPair>,
    result_set_pool: Pool<ResultSet>,
    inflight_fetches: Arc<Mutex<HashMap<u64, broadcast::Sender<SharedLoad>>>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Resolver {
    pub fn new(enable_single_flight_loader: bool) -> Self {
        Resolver {
            enable_single_flight_loader,
            buf_pair_pool: Pool::new(|| BufPair::with_capacity(1024)),
            result_set_pool: Pool::new(ResultSet::new),
            inflight_fetches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve `response` against `data` and write the JSON envelope to
    /// `writer` in one pass.
    ///
    /// A non-null violation that reaches the root, with no nullable ancestor
    /// left to absorb it, produces `"data":null`.
    pub async fn resolve_graphql_response<W: Write>(
        &self,
        ctx: &Context,
        response: &GraphQLResponse,
        data: &[u8],
        writer: &mut W,
    ) -> Result<(), ResolveError> {
        tracing::trace!("resolving plan:\n{:#?}", response.data);
        let mut buf = self.get_buf_pair();

        match self.resolve_node(ctx, &response.data, data, &mut buf).await {
            Ok(()) => {}
            Err(ResolveError::NonNullableFieldValueIsNull) => {
                buf.data.clear();
                buf.data.extend_from_slice(NULL);
            }
            Err(err) => {
                self.free_buf_pair(buf);
                return Err(err);
            }
        }

        let result = write_envelope(&buf, writer);
        self.free_buf_pair(buf);
        result
    }

    fn resolve_node<'a>(
        &'a self,
        ctx: &'a Context,
        node: &'a Node,
        data: &'a [u8],
        buf: &'a mut BufPair,
    ) -> BoxFuture<'a, Result<(), ResolveError>> {
        Box::pin(async move {
            match node {
                Node::Object(object) => self.resolve_object(ctx, object, data, buf).await,
                Node::Array(array) => self.resolve_array(ctx, array, data, buf).await,
                Node::Scalar(scalar) => resolve_scalar(scalar, data, buf),
                Node::Null => {
                    buf.data.extend_from_slice(NULL);
                    Ok(())
                }
                Node::EmptyObject => {
                    buf.data.extend_from_slice(b"{}");
                    Ok(())
                }
                Node::EmptyArray => {
                    buf.data.extend_from_slice(b"[]");
                    Ok(())
                }
            }
        })
    }

    async fn resolve_object(
        &self,
        ctx: &Context,
        object: &Object,
        data: &[u8],
        object_buf: &mut BufPair,
    ) -> Result<(), ResolveError> {
        let data: &[u8] = if object.path.is_empty() {
            data
        } else {
            match json_ext::get_path(data, &object.path) {
                Ok((scoped, _)) => scoped,
                Err(_) => &[],
            }
        };

        let mut set = None;
        if let Some(fetch) = &object.fetch {
            let mut result_set = self.get_result_set();
            if let Err(err) = self.resolve_fetch(ctx, fetch, data, &mut result_set).await {
                self.free_result_set(result_set);
                return Err(err);
            }
            for buffer in result_set.buffers.values_mut() {
                buffer.merge_errors_into(object_buf);
            }
            set = Some(result_set);
        }

        let mut field_buf = self.get_buf_pair();
        let result = self
            .resolve_object_fields(ctx, object, data, set.as_ref(), object_buf, &mut field_buf)
            .await;
        self.free_buf_pair(field_buf);
        if let Some(set) = set {
            self.free_result_set(set);
        }
        result
    }

    async fn resolve_object_fields(
        &self,
        ctx: &Context,
        object: &Object,
        data: &[u8],
        set: Option<&ResultSet>,
        object_buf: &mut BufPair,
        field_buf: &mut BufPair,
    ) -> Result<(), ResolveError> {
        let mut type_name_skip = false;
        let mut first = true;
        for field_set in &object.field_sets {
            let field_set_data: &[u8] = match (set, field_set.buffer_id) {
                (Some(set), Some(buffer_id)) => match set.buffers.get(&buffer_id) {
                    Some(buffer) => &buffer.data,
                    None => &[],
                },
                _ => data,
            };

            if let Some(on_type_name) = &field_set.on_type_name {
                let type_name: &[u8] = match json_ext::get_path(field_set_data, &[TYPENAME]) {
                    Ok((value, JsonType::String)) => value,
                    _ => &[],
                };
                if type_name != &on_type_name[..] {
                    type_name_skip = true;
                    continue;
                }
            }

            for field in &field_set.fields {
                if first {
                    object_buf.data.extend_from_slice(b"{");
                    first = false;
                } else {
                    object_buf.data.extend_from_slice(b",");
                }
                object_buf.data.extend_from_slice(b"\"");
                object_buf.data.extend_from_slice(&field.name);
                object_buf.data.extend_from_slice(b"\":");

                match self
                    .resolve_node(ctx, &field.value, field_set_data, field_buf)
                    .await
                {
                    Ok(()) => {}
                    Err(ResolveError::NonNullableFieldValueIsNull) if object.nullable => {
                        object_buf.data.clear();
                        object_buf.data.extend_from_slice(NULL);
                        return Ok(());
                    }
                    Err(err) => return Err(err),
                }
                field_buf.merge_into(object_buf, false);
            }
        }

        if first {
            if !object.nullable {
                if type_name_skip {
                    return Err(ResolveError::TypeNameSkipped);
                }
                return Err(ResolveError::NonNullableFieldValueIsNull);
            }
            object_buf.data.extend_from_slice(NULL);
            return Ok(());
        }
        object_buf.data.extend_from_slice(b"}");
        Ok(())
    }

    async fn resolve_array(
        &self,
        ctx: &Context,
        array: &Array,
        data: &[u8],
        buf: &mut BufPair,
    ) -> Result<(), ResolveError> {
        let items = json_ext::array_each(data, &array.path).unwrap_or_default();

        if items.is_empty() {
            if !array.nullable {
                return Err(ResolveError::NonNullableFieldValueIsNull);
            }
            buf.data.extend_from_slice(NULL);
            return Ok(());
        }

        if array.resolve_asynchronous {
            self.resolve_array_asynchronous(ctx, array, &items, buf).await
        } else {
            self.resolve_array_synchronous(ctx, array, &items, buf).await
        }
    }

    async fn resolve_array_synchronous(
        &self,
        ctx: &Context,
        array: &Array,
        items: &[&[u8]],
        buf: &mut BufPair,
    ) -> Result<(), ResolveError> {
        buf.data.extend_from_slice(b"[");

        let mut item_buf = self.get_buf_pair();
        let mut has_previous_item = false;
        for &item in items {
            match self.resolve_node(ctx, &array.item, item, &mut item_buf).await {
                Ok(()) => {
                    let (data_written, _) = item_buf.merge_into(buf, has_previous_item);
                    if !has_previous_item && data_written != 0 {
                        has_previous_item = true;
                    }
                }
                Err(ResolveError::NonNullableFieldValueIsNull) if array.nullable => {
                    self.free_buf_pair(item_buf);
                    buf.data.clear();
                    buf.data.extend_from_slice(NULL);
                    return Ok(());
                }
                Err(ResolveError::TypeNameSkipped) => continue,
                Err(err) => {
                    self.free_buf_pair(item_buf);
                    return Err(err);
                }
            }
        }
        self.free_buf_pair(item_buf);

        buf.data.extend_from_slice(b"]");
        Ok(())
    }

    async fn resolve_array_asynchronous(
        &self,
        ctx: &Context,
        array: &Array,
        items: &[&[u8]],
        buf: &mut BufPair,
    ) -> Result<(), ResolveError> {
        buf.data.extend_from_slice(b"[");

        let results = join_all(items.iter().map(|&item| async move {
            let mut item_buf = self.get_buf_pair();
            let result = self.resolve_node(ctx, &array.item, item, &mut item_buf).await;
            (result, item_buf)
        }))
        .await;

        let first_error = results.iter().find_map(|(result, _)| match result {
            Err(err) if *err != ResolveError::TypeNameSkipped => Some(err.clone()),
            _ => None,
        });

        if let Some(err) = first_error {
            for (_, item_buf) in results {
                self.free_buf_pair(item_buf);
            }
            if err == ResolveError::NonNullableFieldValueIsNull && array.nullable {
                buf.data.clear();
                buf.data.extend_from_slice(NULL);
                return Ok(());
            }
            return Err(err);
        }

        // merge in original index order regardless of completion order
        let mut has_previous_item = false;
        for (_, mut item_buf) in results {
            let (data_written, _) = item_buf.merge_into(buf, has_previous_item);
            if !has_previous_item && data_written != 0 {
                has_previous_item = true;
            }
            self.free_buf_pair(item_buf);
        }

        buf.data.extend_from_slice(b"]");
        Ok(())
    }

    async fn resolve_fetch(
        &self,
        ctx: &Context,
        fetch: &Fetch,
        data: &[u8],
        set: &mut ResultSet,
    ) -> Result<(), ResolveError> {
        match fetch {
            Fetch::Single(single) => {
                let mut prepared_input = self.get_buf_pair();
                if let Err(err) = single
                    .input_template
                    .render(ctx, data, &mut prepared_input.data)
                {
                    self.free_buf_pair(prepared_input);
                    return Err(err.into());
                }

                let buffer = set
                    .buffers
                    .entry(single.buffer_id)
                    .or_insert_with(|| self.buf_pair_pool.get());
                let result = self
                    .resolve_single_fetch(ctx, single, &prepared_input.data, buffer)
                    .instrument(tracing::info_span!(
                        "fetch",
                        data_source =
                            %String::from_utf8_lossy(single.data_source.unique_identifier()),
                    ))
                    .await;
                self.free_buf_pair(prepared_input);
                result
            }
            Fetch::Parallel(parallel) => {
                let mut prepared_inputs = Vec::with_capacity(parallel.fetches.len());
                for single in &parallel.fetches {
                    let mut prepared_input = self.get_buf_pair();
                    if let Err(err) = single
                        .input_template
                        .render(ctx, data, &mut prepared_input.data)
                    {
                        self.free_buf_pair(prepared_input);
                        for input in prepared_inputs {
                            self.free_buf_pair(input);
                        }
                        return Err(err.into());
                    }
                    prepared_inputs.push(prepared_input);
                }

                // each data source reports failures through its own BufPair,
                // a parallel batch never aborts siblings
                let buffers = join_all(parallel.fetches.iter().zip(&prepared_inputs).map(
                    |(single, prepared_input)| async move {
                        let mut buffer = self.get_buf_pair();
                        let _ = self
                            .resolve_single_fetch(ctx, single, &prepared_input.data, &mut buffer)
                            .await;
                        (single.buffer_id, buffer)
                    },
                ))
                .instrument(tracing::info_span!("parallel_fetch"))
                .await;

                for (buffer_id, buffer) in buffers {
                    set.buffers.insert(buffer_id, buffer);
                }
                for input in prepared_inputs {
                    self.free_buf_pair(input);
                }
                Ok(())
            }
        }
    }

    pub(crate) fn get_buf_pair(&self) -> BufPair {
        self.buf_pair_pool.get()
    }

    pub(crate) fn free_buf_pair(&self, mut buf: BufPair) {
        buf.reset();
        self.buf_pair_pool.put(buf);
    }

    fn get_result_set(&self) -> ResultSet {
        self.result_set_pool.get()
    }

    fn free_result_set(&self, mut set: ResultSet) {
        for (_, buffer) in set.buffers.drain() {
            self.free_buf_pair(buffer);
        }
        self.result_set_pool.put(set);
    }
}

fn resolve_scalar(scalar: &Scalar, data: &[u8], buf: &mut BufPair) -> Result<(), ResolveError> {
    let value = match json_ext::get_path(data, &scalar.path) {
        Ok((value, kind)) if kind == scalar.kind.json_type() => value,
        _ => {
            if !scalar.nullable {
                return Err(ResolveError::NonNullableFieldValueIsNull);
            }
            buf.data.extend_from_slice(NULL);
            return Ok(());
        }
    };

    match scalar.kind {
        ScalarKind::String => {
            buf.data.extend_from_slice(b"\"");
            buf.data.extend_from_slice(value);
            buf.data.extend_from_slice(b"\"");
        }
        ScalarKind::Boolean | ScalarKind::Integer | ScalarKind::Float => {
            buf.data.extend_from_slice(value);
        }
    }
    Ok(())
}

fn write_envelope<W: Write>(buf: &BufPair, writer: &mut W) -> Result<(), ResolveError> {
    let has_errors = buf.has_errors();
    let has_data = buf.has_data();

    write_safe(writer, b"{")?;
    if has_errors {
        write_safe(writer, b"\"errors\":[")?;
        write_safe(writer, &buf.errors)?;
        write_safe(writer, b"]")?;
    }
    if has_data {
        if has_errors {
            write_safe(writer, b",")?;
        }
        write_safe(writer, b"\"data\":")?;
        write_safe(writer, &buf.data)?;
    }
    write_safe(writer, b"}")
}

fn write_safe<W: Write>(writer: &mut W, data: &[u8]) -> Result<(), ResolveError> {
    writer
        .write_all(data)
        .map_err(|err| ResolveError::ResponseWrite {
            reason: err.to_string(),
        })
}
