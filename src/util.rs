use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn default_db_path(root: &Path) -> PathBuf {
    root.join(".srclines").join("srclines.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_lives_under_hidden_dir() {
        let path = default_db_path(Path::new("/srv/data"));
        assert_eq!(path, PathBuf::from("/srv/data/.srclines/srclines.sqlite"));
    }

    #[test]
    fn read_error_names_the_file() {
        let err = read_to_string(Path::new("/definitely/not/here.json"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("/definitely/not/here.json"), "got: {err}");
    }
}
