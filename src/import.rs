//! Loading of components, grants and indexed lines from a JSON dataset.

use crate::model::{Capability, Component};
use crate::util;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub grants: Vec<GrantInput>,
    #[serde(default)]
    pub lines: Vec<LineInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantInput {
    /// `None` grants the permission to anyone, anonymous callers included.
    #[serde(default)]
    pub login: Option<String>,
    pub permission: Capability,
    pub project_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineInput {
    pub file_uuid: String,
    pub line: i64,
    pub source: String,
    #[serde(default)]
    pub highlighting: Option<String>,
    #[serde(default)]
    pub symbols: Option<String>,
    #[serde(default)]
    pub scm_author: Option<String>,
    #[serde(default)]
    pub scm_revision: Option<String>,
    #[serde(default)]
    pub scm_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_hits: i64,
    #[serde(default)]
    pub conditions: i64,
    #[serde(default)]
    pub covered_conditions: i64,
    #[serde(default)]
    pub duplications: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub components: usize,
    pub grants: usize,
    pub files: usize,
    pub lines: usize,
}

pub fn parse_dataset(source: &str) -> Result<Dataset> {
    let dataset: Dataset = serde_json::from_str(source).with_context(|| "parse dataset JSON")?;
    validate(&dataset)?;
    Ok(dataset)
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let content = util::read_to_string(path)?;
    parse_dataset(&content).with_context(|| format!("load dataset {}", path.display()))
}

fn validate(dataset: &Dataset) -> Result<()> {
    for component in &dataset.components {
        if component.uuid.trim().is_empty() {
            anyhow::bail!("component '{}' has an empty uuid", component.key);
        }
        if component.key.trim().is_empty() {
            anyhow::bail!("component {} has an empty key", component.uuid);
        }
    }
    for line in &dataset.lines {
        if line.line < 1 {
            anyhow::bail!(
                "line numbers start at 1, got {} for '{}'",
                line.line,
                line.file_uuid
            );
        }
        if line.covered_conditions > line.conditions {
            anyhow::bail!(
                "line {} of '{}' covers {} of {} conditions",
                line.line,
                line.file_uuid,
                line.covered_conditions,
                line.conditions
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_dataset() {
        let dataset = parse_dataset(
            r#"{
              "components": [{"uuid": "u1", "key": "p:a.rs", "project_key": "p", "path": null, "name": null}],
              "grants": [{"login": null, "permission": "codeviewer", "project_key": "p"}],
              "lines": [{"file_uuid": "u1", "line": 1, "source": "fn main() {}",
                         "scm_date": "2014-03-20T10:12:33Z", "duplications": [2]}]
            }"#,
        )
        .unwrap();
        assert_eq!(dataset.components.len(), 1);
        assert_eq!(dataset.grants[0].permission, Capability::CodeViewer);
        assert!(dataset.grants[0].login.is_none());
        let line = &dataset.lines[0];
        assert_eq!(line.line_hits, 0);
        assert_eq!(line.duplications, vec![2]);
        assert_eq!(line.scm_date.unwrap().timestamp(), 1_395_310_353);
    }

    #[test]
    fn rejects_line_zero() {
        let err = parse_dataset(r#"{"lines": [{"file_uuid": "u1", "line": 0, "source": ""}]}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("start at 1"), "got: {err}");
    }

    #[test]
    fn rejects_unknown_permission() {
        let result = parse_dataset(
            r#"{"grants": [{"login": "bob", "permission": "root", "project_key": "p"}]}"#,
        );
        assert!(result.is_err());
    }
}
