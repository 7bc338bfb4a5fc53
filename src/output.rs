//! Output management module
//!
//! Surviving lines are written to a temporary file next to the target and
//! renamed over it on commit. Until `commit` succeeds the target path is
//! never touched; dropping an uncommitted writer deletes the temporary file.
//! On unix the replacement keeps the target's permission bits, and a new
//! target gets the usual `0o666` less the umask.

use crate::error::{LinedupError, Result, Stage};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default buffer size for file writing (8MB)
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Buffered writer that replaces its target atomically
pub struct AtomicOutput {
    writer: BufWriter<NamedTempFile>,
    path: PathBuf,
}

impl AtomicOutput {
    /// Create the temporary file in the target's directory
    ///
    /// The directory must already exist.
    pub fn new(path: PathBuf, buffer_size: usize) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".linedup-").suffix(".tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Subject to the umask, like a plain `File::create`
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }

        let temp = builder
            .tempfile_in(&dir)
            .map_err(|e| LinedupError::io(&path, Stage::Output, e))?;
        keep_permissions(&temp, &path)?;

        Ok(Self {
            writer: BufWriter::with_capacity(buffer_size, temp),
            path,
        })
    }

    /// Write a line followed by `\n`
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line).map_err(|e| self.error(e))
    }

    /// Flush and move the temporary file over the target
    pub fn commit(self) -> Result<PathBuf> {
        let Self { writer, path, .. } = self;

        let temp = writer
            .into_inner()
            .map_err(|e| LinedupError::io(&path, Stage::Output, e.into_error()))?;
        temp.persist(&path)
            .map_err(|e| LinedupError::io(&path, Stage::Output, e.error))?;

        Ok(path)
    }

    fn error(&self, source: std::io::Error) -> LinedupError {
        LinedupError::io(&self.path, Stage::Output, source)
    }
}

/// Give the temporary file the permission bits of an existing target
#[cfg(unix)]
fn keep_permissions(temp: &NamedTempFile, target: &Path) -> Result<()> {
    if let Ok(metadata) = std::fs::metadata(target) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| LinedupError::io(target, Stage::Output, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn keep_permissions(_temp: &NamedTempFile, _target: &Path) -> Result<()> {
    Ok(())
}

/// Where surviving lines go
pub enum OutputMode {
    /// Atomic file output
    File(AtomicOutput),
    /// Nothing is written (dry run)
    Discard,
}

impl OutputMode {
    pub fn file(path: PathBuf, buffer_size: usize) -> Result<Self> {
        Ok(Self::File(AtomicOutput::new(path, buffer_size)?))
    }

    pub fn discard() -> Self {
        Self::Discard
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        match self {
            Self::File(out) => out.write_line(line),
            Self::Discard => Ok(()),
        }
    }

    /// Commit file output; returns the path written, if any
    pub fn finish(self) -> Result<Option<PathBuf>> {
        match self {
            Self::File(out) => out.commit().map(Some),
            Self::Discard => Ok(None),
        }
    }
}

/// Ensure the directory that will hold `output` exists
pub fn ensure_output_dir(output: &Path) -> anyhow::Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_atomic_output_commit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.txt");

        let mut writer = AtomicOutput::new(path.clone(), 1024).unwrap();
        writer.write_line("hello").unwrap();
        writer.write_line("world").unwrap();

        assert!(!path.exists());

        writer.commit().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "hello\nworld\n");
        assert_eq!(entries(temp_dir.path()), vec!["test.txt"]);
    }

    #[test]
    fn test_dropped_output_leaves_target_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.txt");
        std::fs::write(&path, "previous\n").unwrap();

        {
            let mut writer = AtomicOutput::new(path.clone(), 1024).unwrap();
            writer.write_line("partial").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous\n");
        assert_eq!(entries(temp_dir.path()), vec!["test.txt"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("out.txt");

        let err = AtomicOutput::new(path, 1024).err().unwrap();
        assert_eq!(err.stage(), Stage::Output);
    }

    #[cfg(unix)]
    #[test]
    fn test_replacement_keeps_target_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.txt");
        std::fs::write(&path, "previous\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        let mut writer = AtomicOutput::new(path.clone(), 1024).unwrap();
        writer.write_line("fresh").unwrap();
        writer.commit().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_discard_writes_nothing() {
        let mut output = OutputMode::discard();
        output.write_line("a").unwrap();
        output.write_line("b").unwrap();
        assert_eq!(output.finish().unwrap(), None);
    }

    #[test]
    fn test_ensure_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("a").join("b").join("out.txt");
        ensure_output_dir(&output).unwrap();
        assert!(output.parent().unwrap().is_dir());
    }
}
