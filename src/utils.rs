use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// What a `video_source` identifier resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Capture device path, e.g. `/dev/video0`
    Device(String),
    ImageDir(PathBuf),
    ImageFile(PathBuf),
    VideoFile(PathBuf),
}

impl SourceSpec {
    /// All-digit identifiers are device indices; everything else is a path.
    pub fn parse(identifier: &str) -> Self {
        let identifier = identifier.trim();

        if !identifier.is_empty() && identifier.chars().all(|c| c.is_ascii_digit()) {
            return SourceSpec::Device(format!("/dev/video{}", identifier));
        }
        if identifier.starts_with("/dev/video") {
            return SourceSpec::Device(identifier.to_string());
        }

        let path = Path::new(identifier);
        if path.is_dir() {
            SourceSpec::ImageDir(path.to_path_buf())
        } else if is_image_path(path) {
            SourceSpec::ImageFile(path.to_path_buf())
        } else {
            SourceSpec::VideoFile(path.to_path_buf())
        }
    }
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Auto-detect the first capture device offering MJPEG or YUYV
#[cfg(feature = "v4l2-capture")]
pub fn auto_detect_device() -> Option<String> {
    use tracing::info;
    use v4l::{capability::Flags, video::Capture, Device, FourCC};

    info!("Auto-detecting capture devices...");

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }
        if let Ok(formats) = dev.enum_formats() {
            if formats
                .iter()
                .any(|fmt| fmt.fourcc == FourCC::new(b"MJPG") || fmt.fourcc == FourCC::new(b"YUYV"))
            {
                info!("Found capture device: {} - {}", path, caps.card);
                return Some(path);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_index() {
        assert_eq!(SourceSpec::parse("0"), SourceSpec::Device("/dev/video0".into()));
        assert_eq!(SourceSpec::parse(" 2 "), SourceSpec::Device("/dev/video2".into()));
        assert_eq!(
            SourceSpec::parse("/dev/video4"),
            SourceSpec::Device("/dev/video4".into())
        );
    }

    #[test]
    fn test_parse_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            SourceSpec::parse(dir.path().to_str().unwrap()),
            SourceSpec::ImageDir(dir.path().to_path_buf())
        );
        assert_eq!(
            SourceSpec::parse("shot.JPG"),
            SourceSpec::ImageFile(PathBuf::from("shot.JPG"))
        );
        assert_eq!(
            SourceSpec::parse("movies/test_movie_008.mp4"),
            SourceSpec::VideoFile(PathBuf::from("movies/test_movie_008.mp4"))
        );
    }
}
