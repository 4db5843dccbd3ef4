use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Result;
use crate::types::CompressedImage;

/// Write-once, sequentially numbered storage for observations.
pub trait ArtifactSink {
    fn store(&mut self, image: &CompressedImage) -> Result<PathBuf>;
}

/// Files named `<dir>/<prefix><index:04>.png`; the directory is created on first write.
pub struct DirSink {
    dir: PathBuf,
    prefix: String,
    next: u32,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, start: u32) -> Self {
        Self { dir: dir.into(), prefix: prefix.into(), next: start }
    }

    pub fn next_index(&self) -> u32 {
        self.next
    }
}

impl ArtifactSink for DirSink {
    fn store(&mut self, image: &CompressedImage) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}{:04}.png", self.prefix, self.next));
        fs::write(&path, image.bytes())?;
        debug!(target: "capture", "wrote {} ({} bytes)", path.display(), image.bytes().len());
        self.next += 1;
        Ok(path)
    }
}

/// Keeps images in memory; for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    pub images: Vec<CompressedImage>,
}

impl ArtifactSink for MemorySink {
    fn store(&mut self, image: &CompressedImage) -> Result<PathBuf> {
        self.images.push(image.clone());
        Ok(PathBuf::from(format!("memory:{:04}", self.images.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::types::PixelBuffer;

    fn tiny() -> CompressedImage {
        codec::encode(PixelBuffer::new(2, 2, vec![7; 12]))
    }

    #[test]
    fn test_dir_sink_numbers_sequentially() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dumps");
        let mut sink = DirSink::new(&dir, "screen_", 7);

        let a = sink.store(&tiny()).unwrap();
        let b = sink.store(&tiny()).unwrap();
        assert_eq!(a, dir.join("screen_0007.png"));
        assert_eq!(b, dir.join("screen_0008.png"));
        assert_eq!(sink.next_index(), 9);
        assert_eq!(fs::read(&a).unwrap(), tiny().bytes());
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::default();
        sink.store(&tiny()).unwrap();
        assert_eq!(sink.images.len(), 1);
    }
}
