//! The `lines` action: a page of a file's source, decorated as HTML and
//! annotated with SCM and coverage data.

use crate::error::{ServiceError, ServiceResult};
use crate::model::{
    Capability, Identity, LineRange, LineRecord, LineView, LinesResponse, format_scm_date,
};
use crate::services::{ComponentDirectory, HtmlDecorator, PermissionAuthority, SourceLineIndex};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct LinesParams {
    /// File uuid.
    pub uuid: Option<String>,
    /// First line to return. Starts at 1.
    #[serde(default)]
    #[schemars(with = "Option<i64>")]
    pub from: Option<Value>,
    /// Last line to return (inclusive).
    #[serde(default)]
    #[schemars(with = "Option<i64>")]
    pub to: Option<Value>,
}

impl LinesParams {
    pub fn from_value(params: Value) -> ServiceResult<Self> {
        if params.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(params)
            .map_err(|err| ServiceError::BadRequest(format!("invalid lines params: {err}")))
    }
}

/// Reads an optional integer parameter, accepting `10` as well as `"10"`
/// query-string style. `null` counts as absent.
fn int_param(name: &str, value: Option<&Value>) -> ServiceResult<Option<i64>> {
    let invalid = |raw: &dyn std::fmt::Display| {
        ServiceError::BadRequest(format!("The '{name}' parameter must be an integer, got '{raw}'"))
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_i64().map(Some).ok_or_else(|| invalid(number)),
        Some(Value::String(text)) => text.trim().parse().map(Some).map_err(|_| invalid(text)),
        Some(other) => Err(invalid(other)),
    }
}

pub struct LinesAction<'a> {
    components: &'a dyn ComponentDirectory,
    permissions: &'a dyn PermissionAuthority,
    index: &'a dyn SourceLineIndex,
    decorator: &'a dyn HtmlDecorator,
    max_lines: i64,
}

impl<'a> LinesAction<'a> {
    pub fn new(
        components: &'a dyn ComponentDirectory,
        permissions: &'a dyn PermissionAuthority,
        index: &'a dyn SourceLineIndex,
        decorator: &'a dyn HtmlDecorator,
    ) -> Self {
        Self {
            components,
            permissions,
            index,
            decorator,
            max_lines: 0,
        }
    }

    /// Caps how many lines one call may return; 0 leaves it unbounded.
    pub fn with_max_lines(mut self, max_lines: i64) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn handle(&self, identity: &Identity, params: LinesParams) -> ServiceResult<LinesResponse> {
        let uuid = params
            .uuid
            .as_deref()
            .filter(|uuid| !uuid.is_empty())
            .ok_or_else(|| ServiceError::missing_param("uuid"))?;

        let component = self
            .components
            .resolve(uuid)?
            .ok_or_else(|| ServiceError::NotFound(format!("Component with uuid '{uuid}' not found")))?;

        if !self
            .permissions
            .has_capability(identity, Capability::CodeViewer, &component.key)?
        {
            log::debug!("{identity} may not view source of {}", component.key);
            return Err(ServiceError::insufficient_privileges());
        }

        // Bounds are only read once the caller is known to be allowed in.
        let from = int_param("from", params.from.as_ref())?;
        let to = int_param("to", params.to.as_ref())?;
        let range = LineRange::from_request(from, to).limited_to(self.max_lines);
        let lines = self.index.lines(uuid, range.from, range.to)?;
        if lines.is_empty() {
            return Err(ServiceError::NotFound(format!("File '{uuid}' has no sources")));
        }
        log::debug!(
            "lines {uuid} [{}, {}] -> {} lines",
            range.from,
            range.to,
            lines.len()
        );

        let sources = lines.iter().map(|line| self.view(line)).collect();
        Ok(LinesResponse { sources })
    }

    pub fn handle_value(&self, identity: &Identity, params: Value) -> ServiceResult<Value> {
        let params = LinesParams::from_value(params)?;
        let response = self.handle(identity, params)?;
        serde_json::to_value(response).map_err(|err| ServiceError::Internal(err.into()))
    }

    fn view(&self, line: &LineRecord) -> LineView {
        LineView {
            line: line.line,
            code: self.decorator.decorate(
                &line.source,
                line.highlighting.as_deref(),
                line.symbols.as_deref(),
            ),
            scm_author: line.scm_author.clone(),
            scm_revision: line.scm_revision.clone(),
            scm_date: line.scm_date.as_ref().map(format_scm_date),
            line_hits: line.line_hits,
            conditions: line.conditions,
            covered_conditions: line.covered_conditions,
            duplicated: !line.duplications.is_empty(),
        }
    }
}
