use super::DiscoveredVideo;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const VIDEO_EXTENSIONS: [&str; 7] = ["mkv", "mp4", "avi", "mov", "wmv", "flv", "webm"];

/// A directory holding this file is skipped together with everything below it.
const IGNORE_MARKER: &str = ".nomedia";

pub struct LibraryScanner {
    root: PathBuf,
}

impl LibraryScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walks the library and returns every video file, sorted by path.
    /// Blocking; run it on the blocking pool.
    pub fn discover(&self) -> Vec<DiscoveredVideo> {
        let mut videos = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !Self::is_skipped(e))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry during scan");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_video(entry.path()) {
                continue;
            }

            let file_size = entry.metadata().map(|m| m.len() as i64).unwrap_or(0);
            videos.push(DiscoveredVideo {
                video_path: entry.path().to_string_lossy().into_owned(),
                filename: entry.file_name().to_string_lossy().into_owned(),
                file_size,
            });
        }

        videos.sort_by(|a, b| a.video_path.cmp(&b.video_path));
        videos
    }

    pub fn discover_paths(&self) -> HashSet<String> {
        self.discover().into_iter().map(|v| v.video_path).collect()
    }

    fn is_skipped(entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            return true;
        }
        entry.file_type().is_dir() && entry.path().join(IGNORE_MARKER).exists()
    }
}

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_videos_and_honours_hidden_and_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Show/Season 1")).unwrap();
        fs::create_dir_all(root.join(".trash")).unwrap();
        fs::create_dir_all(root.join("Private")).unwrap();

        fs::write(root.join("Show/Season 1/e01.MKV"), b"x").unwrap();
        fs::write(root.join("movie.mp4"), b"xyz").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();
        fs::write(root.join(".hidden.mp4"), b"x").unwrap();
        fs::write(root.join(".trash/old.mp4"), b"x").unwrap();
        fs::write(root.join("Private/secret.mp4"), b"x").unwrap();
        fs::write(root.join("Private").join(IGNORE_MARKER), b"").unwrap();

        let found = LibraryScanner::new(root).discover();
        let names: Vec<&str> = found.iter().map(|v| v.filename.as_str()).collect();
        assert_eq!(names, vec!["e01.MKV", "movie.mp4"]);
        assert_eq!(found[1].file_size, 3);
    }
}
