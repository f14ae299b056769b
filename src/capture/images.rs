//! File-backed source: a single still image or a directory of them

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::capture::frame::{Frame, PixelFormat};
use crate::capture::source::FrameSource;
use crate::error::SourceError;
use crate::utils::is_image_path;

/// Replays still images in filename order, one frame per file
pub struct ImageDirSource {
    root: PathBuf,
    pending: VecDeque<PathBuf>,
    sequence: u64,
    closed: bool,
}

impl ImageDirSource {
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let open_err = |reason: String| SourceError::Open {
            identifier: path.display().to_string(),
            reason,
        };

        let pending: VecDeque<PathBuf> = if path.is_dir() {
            let mut files = std::fs::read_dir(path)
                .map_err(|e| open_err(e.to_string()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_path(p))
                .collect::<Vec<_>>();
            files.sort();
            files.into()
        } else if path.is_file() {
            VecDeque::from([path.to_path_buf()])
        } else {
            return Err(open_err("no such file or directory".into()));
        };

        if pending.is_empty() {
            return Err(open_err("directory contains no images".into()));
        }

        info!("Image source ready: {} file(s)", pending.len());

        Ok(Self {
            root: path.to_path_buf(),
            pending,
            sequence: 0,
            closed: false,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageDirSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.closed {
            return Ok(None);
        }
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let rgb = image::open(&path)
            .map_err(|e| SourceError::Read(format!("{}: {}", path.display(), e)))?
            .into_rgb8();

        self.sequence += 1;
        debug!("Loaded {} as frame {}", path.display(), self.sequence);

        let (width, height) = rgb.dimensions();
        Ok(Some(Frame::new(
            self.sequence,
            width,
            height,
            PixelFormat::Rgb24,
            rgb.into_raw(),
        )))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.pending.clear();
            debug!("Image source {} closed", self.root.display());
        }
    }

    fn describe(&self) -> String {
        format!("images at {}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_reads_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 2, Rgb([200, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(3, 3, Rgb([0, 200, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageDirSource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.read_frame().unwrap().unwrap();
        assert_eq!((first.width(), first.height()), (3, 3));
        assert_eq!(first.pixel(0, 0), Some([0, 200, 0]));
        assert_eq!(first.sequence(), 1);

        let second = source.read_frame().unwrap().unwrap();
        assert_eq!((second.width(), second.height()), (4, 2));
        assert_eq!(second.sequence(), 2);

        assert!(source.read_frame().unwrap().is_none());
        source.close();
        source.close();
    }

    #[test]
    fn test_open_missing_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageDirSource::open(dir.path()).is_err());
        assert!(ImageDirSource::open(&dir.path().join("missing.png")).is_err());
    }
}
