use bytes::BytesMut;

/// Paired output buffers for one resolution scope.
///
/// `data` is either empty or a syntactically complete JSON value. `errors` is
/// either empty or a comma-separated list of complete JSON error objects
/// without outer brackets; the response assembler adds those. Callers that
/// return a `BufPair` to a pool reset it on release, never on acquire — the
/// bracket-less invariant depends on it.
#[derive(Debug, Default)]
pub struct BufPair {
    pub data: BytesMut,
    pub errors: BytesMut,
}

impl BufPair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            errors: BytesMut::with_capacity(capacity),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Clear both buffers, keeping their capacity.
    pub fn reset(&mut self) {
        self.data.clear();
        self.errors.clear();
    }

    /// Append one GraphQL error object to the errors buffer.
    ///
    /// `locations` and `path` are independently supplied, pre-serialized JSON
    /// byte slices; either may be absent.
    pub fn write_err(&mut self, message: &[u8], locations: Option<&[u8]>, path: Option<&[u8]>) {
        if self.has_errors() {
            self.errors.extend_from_slice(b",");
        }
        self.errors.extend_from_slice(b"{\"message\":\"");
        self.errors.extend_from_slice(message);
        self.errors.extend_from_slice(b"\"");
        if let Some(locations) = locations {
            self.errors.extend_from_slice(b",\"locations\":");
            self.errors.extend_from_slice(locations);
        }
        if let Some(path) = path {
            self.errors.extend_from_slice(b",\"path\":");
            self.errors.extend_from_slice(path);
        }
        self.errors.extend_from_slice(b"}");
    }

    /// Drain both buffers into `to`, returning `(data_written, errors_written)`.
    pub(crate) fn merge_into(&mut self, to: &mut BufPair, prefix_data_with_comma: bool) -> (usize, usize) {
        let data_written = self.merge_data_into(to, prefix_data_with_comma);
        let errors_written = self.merge_errors_into(to);
        (data_written, errors_written)
    }

    pub(crate) fn merge_data_into(&mut self, to: &mut BufPair, prefix_with_comma: bool) -> usize {
        if !self.has_data() {
            return 0;
        }
        let mut written = 0;
        if prefix_with_comma {
            to.data.extend_from_slice(b",");
            written += 1;
        }
        to.data.extend_from_slice(&self.data);
        written += self.data.len();
        self.data.clear();
        written
    }

    pub(crate) fn merge_errors_into(&mut self, to: &mut BufPair) -> usize {
        if !self.has_errors() {
            return 0;
        }
        let mut written = 0;
        if to.has_errors() {
            to.errors.extend_from_slice(b",");
            written += 1;
        }
        to.errors.extend_from_slice(&self.errors);
        written += self.errors.len();
        self.errors.clear();
        written
    }
}
