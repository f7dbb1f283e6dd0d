//! Persisted artifacts produced by tasks.
//!
//! A [`Target`] is either a [`TextTarget`] or a [`BinaryTarget`]. Both share
//! the [`Artifact`] capability: existence check, validity check, scoped read
//! and scoped atomic write.
//!
//! Writes never touch the final location until they are committed. An
//! [`AtomicWriter`] stages bytes in a hidden temporary file next to the
//! target and renames it into place on [`commit`](AtomicWriter::commit).
//! Dropping the writer without committing removes the staged file, so
//! `exists()` only ever observes complete artifacts.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::task::TaskError;

/// Content kind of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// UTF-8 text.
    Text,
    /// Opaque bytes.
    Binary,
}

/// Capability shared by all target variants.
pub trait Artifact {
    /// Location of the artifact.
    fn path(&self) -> &Path;

    /// Whether a committed artifact is present.
    fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Check that an existing artifact is complete.
    fn verify(&self) -> Result<(), TaskError>;

    /// Open the artifact for buffered reading.
    fn open_read(&self) -> Result<BufReader<File>, TaskError> {
        let path = self.path();
        File::open(path)
            .map(BufReader::new)
            .map_err(|e| TaskError::io(path, e))
    }

    /// Open a staged writer that commits to this artifact's location.
    fn open_write(&self) -> Result<AtomicWriter, TaskError> {
        AtomicWriter::create(self.path())
    }
}

/// A text artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextTarget {
    path: PathBuf,
}

/// A binary artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryTarget {
    path: PathBuf,
}

/// A persisted artifact produced by a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Text(TextTarget),
    Binary(BinaryTarget),
}

impl TextTarget {
    /// Create a text target at the given location.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the whole artifact as a string.
    pub fn read_string(&self) -> Result<String, TaskError> {
        let mut reader = self.open_read()?;
        let mut buf = String::new();
        reader.read_to_string(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => {
                TaskError::Decode(format!("'{}' is not valid UTF-8", self.path.display()))
            }
            _ => TaskError::io(&self.path, e),
        })?;
        Ok(buf)
    }

    /// Atomically replace the artifact with `contents`.
    pub fn write_string(&self, contents: &str) -> Result<(), TaskError> {
        let mut writer = self.open_write()?;
        writer
            .write_all(contents.as_bytes())
            .map_err(|e| TaskError::io(&self.path, e))?;
        writer.commit()
    }

    /// Read and deserialize a JSON artifact.
    pub fn read_json<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        let text = self.read_string()?;
        serde_json::from_str(&text)
            .map_err(|e| TaskError::Decode(format!("'{}': {}", self.path.display(), e)))
    }

    /// Atomically replace the artifact with the JSON form of `value`.
    pub fn write_json<T: Serialize>(&self, value: &T) -> Result<(), TaskError> {
        let text = serde_json::to_string(value)
            .map_err(|e| TaskError::ExecutionFailed(format!("failed to encode JSON: {e}")))?;
        self.write_string(&text)
    }
}

impl BinaryTarget {
    /// Create a binary target at the given location.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the whole artifact.
    pub fn read_bytes(&self) -> Result<Vec<u8>, TaskError> {
        std::fs::read(&self.path).map_err(|e| TaskError::io(&self.path, e))
    }

    /// Atomically replace the artifact with `bytes`.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<(), TaskError> {
        let mut writer = self.open_write()?;
        writer
            .write_all(bytes)
            .map_err(|e| TaskError::io(&self.path, e))?;
        writer.commit()
    }
}

impl Artifact for TextTarget {
    fn path(&self) -> &Path {
        &self.path
    }

    fn verify(&self) -> Result<(), TaskError> {
        let bytes = std::fs::read(&self.path).map_err(|e| TaskError::io(&self.path, e))?;
        if bytes.is_empty() || std::str::from_utf8(&bytes).is_err() {
            return Err(TaskError::PartialArtifact(self.path.clone()));
        }
        Ok(())
    }
}

impl Artifact for BinaryTarget {
    fn path(&self) -> &Path {
        &self.path
    }

    fn verify(&self) -> Result<(), TaskError> {
        let meta = std::fs::metadata(&self.path).map_err(|e| TaskError::io(&self.path, e))?;
        if meta.len() == 0 {
            return Err(TaskError::PartialArtifact(self.path.clone()));
        }
        Ok(())
    }
}

impl Target {
    /// Create a text target.
    pub fn text(path: impl Into<PathBuf>) -> Self {
        Target::Text(TextTarget::new(path))
    }

    /// Create a binary target.
    pub fn binary(path: impl Into<PathBuf>) -> Self {
        Target::Binary(BinaryTarget::new(path))
    }

    /// Content kind of this target.
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Text(_) => TargetKind::Text,
            Target::Binary(_) => TargetKind::Binary,
        }
    }

    /// Borrow as a text target, if it is one.
    pub fn as_text(&self) -> Option<&TextTarget> {
        match self {
            Target::Text(t) => Some(t),
            Target::Binary(_) => None,
        }
    }

    /// Borrow as a binary target, if it is one.
    pub fn as_binary(&self) -> Option<&BinaryTarget> {
        match self {
            Target::Binary(t) => Some(t),
            Target::Text(_) => None,
        }
    }
}

impl Artifact for Target {
    fn path(&self) -> &Path {
        match self {
            Target::Text(t) => t.path(),
            Target::Binary(t) => t.path(),
        }
    }

    fn verify(&self) -> Result<(), TaskError> {
        match self {
            Target::Text(t) => t.verify(),
            Target::Binary(t) => t.verify(),
        }
    }
}

/// Staged writer for a target location.
///
/// Bytes go to a temporary file in the target's directory. Nothing is visible
/// at the target location until [`commit`](Self::commit) renames the staged
/// file into place. Dropping the writer discards the staged file.
#[derive(Debug)]
pub struct AtomicWriter {
    destination: PathBuf,
    staged: BufWriter<NamedTempFile>,
}

impl AtomicWriter {
    /// Stage a new write for `destination`, creating parent directories.
    pub fn create(destination: impl Into<PathBuf>) -> Result<Self, TaskError> {
        let destination = destination.into();
        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| TaskError::io(&dir, e))?;

        let prefix = format!(
            ".{}.",
            destination
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| TaskError::io(&dir, e))?;

        Ok(Self {
            destination,
            staged: BufWriter::new(file),
        })
    }

    /// Final location of the artifact.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Path of the staged file.
    ///
    /// External processes may write the artifact here directly; whatever is
    /// at this path when [`commit`](Self::commit) runs becomes the artifact.
    pub fn staging_path(&self) -> &Path {
        self.staged.get_ref().path()
    }

    /// Flush and atomically move the staged file into place.
    pub fn commit(self) -> Result<(), TaskError> {
        let destination = self.destination;
        let file = self
            .staged
            .into_inner()
            .map_err(|e| TaskError::io(&destination, e.into_error()))?;
        file.as_file()
            .sync_all()
            .map_err(|e| TaskError::io(&destination, e))?;
        file.persist(&destination)
            .map_err(|e| TaskError::io(&destination, e.error))?;
        Ok(())
    }
}

impl Write for AtomicWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.staged.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.staged.flush()
    }
}
