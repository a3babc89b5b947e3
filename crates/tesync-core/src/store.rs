//! Loading and atomically replacing configuration files.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::document::{parse_document, ConfigDocument};
use crate::error::Result;

/// Parse the document at `path`. A missing file is an empty document.
pub fn load_document(path: &Path) -> Result<ConfigDocument> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_document(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigDocument::new()),
        Err(e) => Err(e.into()),
    }
}

/// Replace `path` with `text`: write a temp file next to it, then rename.
/// Readers see either the old or the new content, never a mix.
pub fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Append `text` to `path` (created if missing) through [`write_atomic`].
pub fn append_atomic(path: &Path, text: &str) -> Result<()> {
    let mut content = match std::fs::read_to_string(path) {
        Ok(existing) => existing,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(text);
    write_atomic(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let doc = load_document(&dir.path().join("main.tf")).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.tf");
        write_atomic(&path, "old\n").unwrap();
        write_atomic(&path, "new\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
        // no temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/tf/main.tf");
        write_atomic(&path, "x\n").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imports.tf");
        append_atomic(&path, "a").unwrap();
        append_atomic(&path, "b\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.tf");
        std::fs::write(&path, "resource {").unwrap();
        assert!(load_document(&path).is_err());
    }
}
