//! Resolver errors.
use displaydoc::Display;
use thiserror::Error;

/// Error types for response resolution.
///
/// The first two variants are sentinels with well-defined catchers inside the
/// resolver: `NonNullableFieldValueIsNull` stops at the nearest nullable
/// ancestor, `TypeNameSkipped` is consumed by the object and array layers and
/// never surfaces to callers. Everything else is opaque and bubbles out.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// non nullable field value is null
    NonNullableFieldValueIsNull,

    /// field set skipped because of __typename condition
    TypeNameSkipped,

    /// request canceled
    Canceled,

    /// could not write response: {reason}
    ResponseWrite {
        /// The reason the underlying writer failed.
        reason: String,
    },

    /// fetch failed: {0}
    Fetch(#[from] FetchError),
}

/// Error types for fetch preparation and data source loads.
///
/// These abort the branch that issued the fetch. Errors a data source wants
/// surfaced in the response body are written into the `errors` buffer of its
/// [`crate::resolver::BufPair`] instead.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// could not find path: {reason}
    ExecutionPathNotFound {
        /// The reason the path lookup failed.
        reason: String,
    },

    /// could not render fetch input: {reason}
    TemplateRender {
        /// The reason template rendering failed.
        reason: String,
    },

    /// data source '{data_source_id}' failed: {reason}
    DataSource {
        /// Identifier of the failing data source.
        data_source_id: String,

        /// The reason the load failed.
        reason: String,
    },
}
