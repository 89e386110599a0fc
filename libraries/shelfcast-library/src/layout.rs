//! Book directory classification.
//!
//! A title directory is classified by file extension, case-insensitively,
//! with each group kept in lexicographic order: consolidated containers
//! (`.m4b`), parts (`.mp3`), raster covers (`.png`, `.jpg`/`.jpeg`),
//! companion e-books (`.epub`), and one optional `.opf` side-car.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct BookFolder {
    pub dir: PathBuf,
    /// The title directory's name; the stable half of the book id.
    pub folder_name: String,
    pub containers: Vec<PathBuf>,
    pub parts: Vec<PathBuf>,
    pub png_covers: Vec<PathBuf>,
    pub jpg_covers: Vec<PathBuf>,
    pub epubs: Vec<PathBuf>,
    pub opf: Option<PathBuf>,
}

/// How the directory will be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookShape<'a> {
    /// One consolidated container, normalized before streaming.
    Single(&'a Path),
    /// Ordered parts stitched virtually.
    Multi(&'a [PathBuf]),
}

impl BookFolder {
    pub fn read(dir: &Path) -> std::io::Result<Self> {
        let folder_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut folder = BookFolder {
            dir: dir.to_path_buf(),
            folder_name,
            ..Default::default()
        };

        let mut names: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        names.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));

        for path in names {
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            match ext.to_lowercase().as_str() {
                "m4b" => folder.containers.push(path),
                "mp3" => folder.parts.push(path),
                "png" => folder.png_covers.push(path),
                "jpg" | "jpeg" => folder.jpg_covers.push(path),
                "epub" => folder.epubs.push(path),
                "opf" => {
                    if folder.opf.is_none() {
                        folder.opf = Some(path);
                    }
                }
                _ => {}
            }
        }

        Ok(folder)
    }

    /// The classification rule: any `.m4b` wins, else `.mp3` parts, else
    /// the directory is skipped.
    pub fn shape(&self) -> Option<BookShape<'_>> {
        if let Some(container) = self.containers.first() {
            return Some(BookShape::Single(container));
        }
        if !self.parts.is_empty() {
            return Some(BookShape::Multi(&self.parts));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn container_beats_parts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "02.mp3");
        touch(dir.path(), "01.mp3");
        touch(dir.path(), "b.m4b");
        touch(dir.path(), "a.m4b");

        let folder = BookFolder::read(dir.path()).unwrap();
        match folder.shape().unwrap() {
            BookShape::Single(container) => {
                assert_eq!(container.file_name().unwrap(), "a.m4b");
            }
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn parts_are_sorted_lexicographically() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "10.mp3");
        touch(dir.path(), "02.mp3");
        touch(dir.path(), "01.MP3");

        let folder = BookFolder::read(dir.path()).unwrap();
        let names: Vec<&str> = folder
            .parts
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["01.MP3", "02.mp3", "10.mp3"]);
    }

    #[test]
    fn empty_directory_has_no_shape() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "cover.jpg");
        let folder = BookFolder::read(dir.path()).unwrap();
        assert!(folder.shape().is_none());
        assert_eq!(folder.jpg_covers.len(), 1);
    }

    #[test]
    fn side_files_are_grouped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "01.mp3");
        touch(dir.path(), "cover.PNG");
        touch(dir.path(), "back.jpeg");
        touch(dir.path(), "book.epub");
        touch(dir.path(), "metadata.opf");

        let folder = BookFolder::read(dir.path()).unwrap();
        assert_eq!(folder.png_covers.len(), 1);
        assert_eq!(folder.jpg_covers.len(), 1);
        assert_eq!(folder.epubs.len(), 1);
        assert!(folder.opf.is_some());
    }
}
