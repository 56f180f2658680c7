//! Named-resource providers for model weights and `live/config.json`.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

/// Opaque provider of named model assets.
///
/// Paths are forward-slash relative names such as `live/config.json`.
pub trait AssetSource: Send + Sync {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>>;

    /// Read a whole asset into memory.
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Assets laid out under a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let rel = Path::new(path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("asset path must stay inside the asset root: {path}"),
            ));
        }
        Ok(self.root.join(rel))
    }
}

impl AssetSource for DirAssets {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full)?;
        Ok(Box::new(file))
    }
}

/// In-memory assets, e.g. bundled with the binary.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), data.into());
    }

    pub fn with(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }
}

impl AssetSource for MemoryAssets {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        let data = self.files.get(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("asset not found: {path}"))
        })?;
        Ok(Box::new(Cursor::new(data.as_slice())))
    }
}
