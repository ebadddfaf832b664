use crate::db::Db;
use crate::model::LineRecord;
use anyhow::Result;

/// Read access to indexed source lines.
pub trait SourceLineIndex {
    /// Lines of `file_uuid` numbered within `[from, to]`, in ascending order.
    /// An empty vector means nothing is indexed in that range.
    fn lines(&self, file_uuid: &str, from: i64, to: i64) -> Result<Vec<LineRecord>>;
}

impl SourceLineIndex for Db {
    fn lines(&self, file_uuid: &str, from: i64, to: i64) -> Result<Vec<LineRecord>> {
        self.lines_for_file(file_uuid, from, to)
    }
}
