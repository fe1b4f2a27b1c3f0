//! Class-per-folder dataset splits
//!
//! A split lives at `<data_dir>/<split>/<class_label>/<image>`. Class labels are
//! the sorted folder names, so the same set of folders always maps to the same
//! indices.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{ClassifierError, Result};

/// Accepted image file extensions (lowercase)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Named dataset split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// Folder name of the split under the data directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One image on disk with its class index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSample {
    pub path: PathBuf,
    pub label: usize,
}

/// The scanned contents of one split directory
#[derive(Debug, Clone)]
pub struct ImageFolder {
    pub root: PathBuf,
    pub split: Split,
    pub class_names: Vec<String>,
    pub samples: Vec<ImageSample>,
}

/// Check whether a path has one of the accepted image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

impl ImageFolder {
    /// Scan `<data_dir>/<split>`
    ///
    /// Fails with `DatasetDirectoryInvalid` when the split directory is
    /// missing, has no class folders, or contains no images at all.
    pub fn open(data_dir: &Path, split: Split) -> Result<Self> {
        let root = data_dir.join(split.dir_name());
        info!("Scanning {} split at {:?}", split, root);

        if !root.is_dir() {
            return Err(ClassifierError::dataset(&root, "directory does not exist"));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(ClassifierError::dataset(&root, "no class folders found"));
        }

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let before = samples.len();

            for entry in WalkDir::new(root.join(class_name))
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if entry.file_type().is_file() && is_image_file(path) {
                    samples.push(ImageSample {
                        path: path.to_path_buf(),
                        label,
                    });
                }
            }

            debug!(
                "Class '{}' (label {}): {} images",
                class_name,
                label,
                samples.len() - before
            );
        }

        if samples.is_empty() {
            return Err(ClassifierError::dataset(&root, "no images found"));
        }

        info!(
            "Found {} images in {} classes",
            samples.len(),
            class_names.len()
        );

        Ok(Self {
            root,
            split,
            class_names,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_sorts_classes_and_labels() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "train", &["zebra", "ant"], 2);

        let folder = ImageFolder::open(dir.path(), Split::Train).unwrap();

        assert_eq!(folder.class_names, vec!["ant", "zebra"]);
        assert_eq!(folder.len(), 4);
        assert!(folder.samples[..2].iter().all(|s| s.label == 0));
        assert!(folder.samples[2..].iter().all(|s| s.label == 1));
    }

    #[test]
    fn test_non_image_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "test", &["a"], 1);
        std::fs::write(dir.path().join("test/a/notes.txt"), "hello").unwrap();

        let folder = ImageFolder::open(dir.path(), Split::Test).unwrap();
        assert_eq!(folder.len(), 1);
    }

    #[test]
    fn test_missing_split_directory() {
        let dir = TempDir::new().unwrap();
        let err = ImageFolder::open(dir.path(), Split::Val).unwrap_err();
        assert!(matches!(err, ClassifierError::DatasetDirectoryInvalid { .. }));
    }

    #[test]
    fn test_split_without_classes() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("train")).unwrap();
        let err = ImageFolder::open(dir.path(), Split::Train).unwrap_err();
        assert!(err.to_string().contains("no class folders"));
    }

    #[test]
    fn test_split_with_empty_classes() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("train/a")).unwrap();
        let err = ImageFolder::open(dir.path(), Split::Train).unwrap_err();
        assert!(err.to_string().contains("no images"));
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("x/cat.JPG")));
        assert!(is_image_file(Path::new("dog.png")));
        assert!(!is_image_file(Path::new("list.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }
}
