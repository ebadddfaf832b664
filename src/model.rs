use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format used for `scmDate` in responses, e.g. `2014-03-20T10:12:33+0000`.
pub const SCM_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub uuid: String,
    pub key: String,
    pub project_key: String,
    pub path: Option<String>,
    pub name: Option<String>,
}

/// One indexed line of a file, with SCM and coverage data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineRecord {
    pub file_uuid: String,
    pub line: i64,
    pub source: String,
    pub highlighting: Option<String>,
    pub symbols: Option<String>,
    pub scm_author: Option<String>,
    pub scm_revision: Option<String>,
    pub scm_date: Option<DateTime<Utc>>,
    pub line_hits: i64,
    pub conditions: i64,
    pub covered_conditions: i64,
    pub duplications: Vec<i64>,
}

/// Inclusive line range requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub from: i64,
    pub to: i64,
}

impl LineRange {
    pub const FIRST_LINE: i64 = 1;
    pub const UNBOUNDED: i64 = i64::MAX;

    /// Builds a range from raw request values. A missing `from` starts at the
    /// first line and a missing `to` reads to the end of the file.
    pub fn from_request(from: Option<i64>, to: Option<i64>) -> Self {
        Self {
            from: Self::clamp_from(from.unwrap_or(Self::FIRST_LINE)),
            to: to.unwrap_or(Self::UNBOUNDED),
        }
    }

    /// Lower bounds below the first line are raised to it instead of rejected.
    pub fn clamp_from(from: i64) -> i64 {
        from.max(Self::FIRST_LINE)
    }

    /// Caps the range so that it spans at most `max_lines` lines.
    pub fn limited_to(self, max_lines: i64) -> Self {
        if max_lines <= 0 {
            return self;
        }
        let cap = self.from.saturating_add(max_lines - 1);
        Self {
            from: self.from,
            to: self.to.min(cap),
        }
    }
}

/// The caller a request is made on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub login: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self { login: None }
    }

    pub fn user(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.login {
            Some(login) => f.write_str(login),
            None => f.write_str("<anonymous>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Browse the source code of a project's files.
    CodeViewer,
    User,
    Admin,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::CodeViewer => "codeviewer",
            Capability::User => "user",
            Capability::Admin => "admin",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "codeviewer" => Ok(Capability::CodeViewer),
            "user" => Ok(Capability::User),
            "admin" => Ok(Capability::Admin),
            other => anyhow::bail!("unknown permission: {other}"),
        }
    }
}

/// Per-line object of a `lines` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineView {
    pub line: i64,
    pub code: String,
    pub scm_author: Option<String>,
    pub scm_revision: Option<String>,
    pub scm_date: Option<String>,
    pub line_hits: i64,
    pub conditions: i64,
    pub covered_conditions: i64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinesResponse {
    pub sources: Vec<LineView>,
}

pub fn format_scm_date(date: &DateTime<Utc>) -> String {
    date.format(SCM_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn from_is_clamped_to_first_line() {
        assert_eq!(LineRange::clamp_from(-5), 1);
        assert_eq!(LineRange::clamp_from(0), 1);
        assert_eq!(LineRange::clamp_from(1), 1);
        assert_eq!(LineRange::clamp_from(12), 12);
    }

    #[test]
    fn missing_bounds_default_to_whole_file() {
        let range = LineRange::from_request(None, None);
        assert_eq!(range, LineRange { from: 1, to: i64::MAX });
    }

    #[test]
    fn limit_caps_upper_bound_only() {
        let range = LineRange::from_request(Some(10), None).limited_to(5);
        assert_eq!(range, LineRange { from: 10, to: 14 });
        let range = LineRange::from_request(Some(10), Some(11)).limited_to(5);
        assert_eq!(range, LineRange { from: 10, to: 11 });
        let range = LineRange::from_request(Some(10), None).limited_to(0);
        assert_eq!(range.to, i64::MAX);
    }

    #[test]
    fn duplicated_is_omitted_when_false() {
        let mut view = LineView {
            line: 3,
            code: "x".to_string(),
            scm_author: None,
            scm_revision: Some("abc".to_string()),
            scm_date: None,
            line_hits: 0,
            conditions: 0,
            covered_conditions: 0,
            duplicated: false,
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(
            value,
            json!({
                "line": 3,
                "code": "x",
                "scmAuthor": null,
                "scmRevision": "abc",
                "scmDate": null,
                "lineHits": 0,
                "conditions": 0,
                "coveredConditions": 0,
            })
        );

        view.duplicated = true;
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["duplicated"], json!(true));
    }

    #[test]
    fn scm_date_uses_fixed_format() {
        let date = Utc.with_ymd_and_hms(2014, 3, 20, 10, 12, 33).unwrap();
        assert_eq!(format_scm_date(&date), "2014-03-20T10:12:33+0000");
    }

    #[test]
    fn capability_names_round_trip() {
        for cap in [Capability::CodeViewer, Capability::User, Capability::Admin] {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
        assert!("root".parse::<Capability>().is_err());
    }
}
