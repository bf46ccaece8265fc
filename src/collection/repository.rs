use crate::error::Result;
use crate::frame::mirror;
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const IMAGE_EXTENSION: &str = ".jpg";
const MIRROR_SUFFIX: &str = "_flipped";
const STAGING_EXTENSION: &str = ".tmp";

/// Paths written by one save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPair {
    pub sequence: u64,
    pub original: PathBuf,
    pub mirrored: PathBuf,
}

/// Storage of captured image pairs, keyed by class and mode prefix.
///
/// Counts are always derived from storage, never cached, so external
/// deletions are picked up on the next call.
pub trait ImageRepository: Send + Sync {
    /// Create the class location if needed
    fn ensure_class(&self, class_id: u32) -> Result<()>;

    /// Number of originals stored for (class, mode)
    fn count(&self, class_id: u32, prefix: &str) -> Result<usize>;

    /// Largest stored sequence number plus one, or 0 when none exist
    fn next_sequence(&self, class_id: u32, prefix: &str) -> Result<u64>;

    /// Store an original and its horizontal mirror under the next sequence number
    fn save_pair(&self, class_id: u32, prefix: &str, image: &RgbImage) -> Result<SavedPair>;

    /// Remove every original and mirror for (class, mode); returns files removed
    fn delete_all(&self, class_id: u32, prefix: &str) -> Result<usize>;
}

/// What a file name means for a given prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoredFile {
    Original(u64),
    Mirrored(u64),
}

fn classify(file_name: &str, prefix: &str) -> Option<StoredFile> {
    let stem = file_name
        .strip_prefix(prefix)?
        .strip_prefix('_')?
        .strip_suffix(IMAGE_EXTENSION)?;

    if let Some(number) = stem.strip_suffix(MIRROR_SUFFIX) {
        return number.parse().ok().map(StoredFile::Mirrored);
    }
    stem.parse().ok().map(StoredFile::Original)
}

/// `<root>/<class-id>/<prefix>_<n>.jpg` plus `<prefix>_<n>_flipped.jpg`
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: PathBuf,
}

impl DirectoryRepository {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn class_dir(&self, class_id: u32) -> PathBuf {
        self.root.join(class_id.to_string())
    }

    fn scan(&self, class_id: u32, prefix: &str) -> Result<Vec<(PathBuf, StoredFile)>> {
        let dir = self.class_dir(class_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(kind) = classify(name, prefix) {
                files.push((entry.path(), kind));
            }
        }
        Ok(files)
    }

    /// Hidden name the file is written under before it is moved into place
    fn staging_path(final_path: &Path) -> PathBuf {
        let mut name = std::ffi::OsString::from(".");
        if let Some(file_name) = final_path.file_name() {
            name.push(file_name);
        }
        name.push(STAGING_EXTENSION);
        final_path.with_file_name(name)
    }

    /// Encode both images under staging names, then rename mirror and original into place.
    ///
    /// Nothing is left behind on failure: an original is only visible once its mirror is.
    fn write_pair(image: &RgbImage, original: &Path, mirrored: &Path) -> Result<()> {
        let original_staging = Self::staging_path(original);
        let mirrored_staging = Self::staging_path(mirrored);
        let discard_staging = || {
            let _ = fs::remove_file(&original_staging);
            let _ = fs::remove_file(&mirrored_staging);
        };

        let staged = image
            .save_with_format(&original_staging, ImageFormat::Jpeg)
            .and_then(|()| mirror(image).save_with_format(&mirrored_staging, ImageFormat::Jpeg));
        if let Err(e) = staged {
            discard_staging();
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&mirrored_staging, mirrored) {
            discard_staging();
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&original_staging, original) {
            warn!(
                "Could not move {} into place, removing its mirror",
                original.display()
            );
            discard_staging();
            let _ = fs::remove_file(mirrored);
            return Err(e.into());
        }
        Ok(())
    }

    fn originals(&self, class_id: u32, prefix: &str) -> Result<Vec<u64>> {
        Ok(self
            .scan(class_id, prefix)?
            .into_iter()
            .filter_map(|(_, kind)| match kind {
                StoredFile::Original(n) => Some(n),
                StoredFile::Mirrored(_) => None,
            })
            .collect())
    }
}

impl ImageRepository for DirectoryRepository {
    fn ensure_class(&self, class_id: u32) -> Result<()> {
        let dir = self.class_dir(class_id);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("Created class directory: {}", dir.display());
        }
        Ok(())
    }

    fn count(&self, class_id: u32, prefix: &str) -> Result<usize> {
        Ok(self.originals(class_id, prefix)?.len())
    }

    fn next_sequence(&self, class_id: u32, prefix: &str) -> Result<u64> {
        Ok(self
            .originals(class_id, prefix)?
            .into_iter()
            .max()
            .map_or(0, |max| max + 1))
    }

    fn save_pair(&self, class_id: u32, prefix: &str, image: &RgbImage) -> Result<SavedPair> {
        self.ensure_class(class_id)?;
        let sequence = self.next_sequence(class_id, prefix)?;
        let dir = self.class_dir(class_id);

        let base = format!("{}_{}", prefix, sequence);
        let original = dir.join(format!("{}{}", base, IMAGE_EXTENSION));
        let mirrored = dir.join(format!("{}{}{}", base, MIRROR_SUFFIX, IMAGE_EXTENSION));

        Self::write_pair(image, &original, &mirrored)?;
        debug!(
            "Saved image pair: {} and {}",
            original.display(),
            mirrored.display()
        );

        Ok(SavedPair {
            sequence,
            original,
            mirrored,
        })
    }

    fn delete_all(&self, class_id: u32, prefix: &str) -> Result<usize> {
        let mut deleted = 0;
        for (path, _) in self.scan(class_id, prefix)? {
            fs::remove_file(&path)?;
            deleted += 1;
        }
        info!(
            "Deleted {} files for prefix '{}' in class {}",
            deleted, prefix, class_id
        );
        Ok(deleted)
    }
}
