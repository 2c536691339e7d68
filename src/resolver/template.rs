use bytes::Bytes;
use bytes::BytesMut;

use super::Context;
use crate::error::FetchError;
use crate::json_ext;

/// Describes how to assemble the input of a fetch from static bytes and
/// values drawn from the request variables or the current object.
#[derive(Debug, Clone, Default)]
pub struct InputTemplate {
    pub segments: Vec<TemplateSegment>,
}

#[derive(Debug, Clone)]
pub enum TemplateSegment {
    Static(Bytes),
    Variable {
        source: VariableSource,
        path: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableSource {
    /// The object the enclosing fetch is scoped to.
    Object,
    /// The request's JSON-encoded variables.
    Context,
}

impl InputTemplate {
    /// Concatenate all segments into `out`. A variable path that cannot be
    /// resolved fails the fetch before the data source is called.
    pub fn render(&self, ctx: &Context, data: &[u8], out: &mut BytesMut) -> Result<(), FetchError> {
        for segment in &self.segments {
            match segment {
                TemplateSegment::Static(bytes) => out.extend_from_slice(bytes),
                TemplateSegment::Variable { source, path } => {
                    let source_data = match source {
                        VariableSource::Object => data,
                        VariableSource::Context => ctx.variables.as_ref(),
                    };
                    let (value, _) = json_ext::get_path(source_data, path).map_err(|err| {
                        FetchError::TemplateRender {
                            reason: err.to_string(),
                        }
                    })?;
                    out.extend_from_slice(value);
                }
            }
        }
        Ok(())
    }
}

/// A variable a planner wants rendered into a fetch input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable {
    Context { path: Vec<String> },
    Object { path: Vec<String> },
}

/// Planner-side collection of fetch input variables. Registering the same
/// variable twice yields the same placeholder.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    variables: Vec<Variable>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `variable` and return `(placeholder, already_existed)`.
    /// Placeholders have the shape `$$n$$`, quoted when `quote_value` is set.
    pub fn add_variable(&mut self, variable: Variable, quote_value: bool) -> (String, bool) {
        let (index, exists) = match self.variables.iter().position(|v| *v == variable) {
            Some(index) => (index, true),
            None => {
                self.variables.push(variable);
                (self.variables.len() - 1, false)
            }
        };
        let placeholder = if quote_value {
            format!("\"$${index}$$\"")
        } else {
            format!("$${index}$$")
        };
        (placeholder, exists)
    }
}
