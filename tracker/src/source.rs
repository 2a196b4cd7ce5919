use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbImage;
use tracing::{debug, info};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to list frames in {path}: {source}")]
    List {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no image files found in {0}")]
    Empty(PathBuf),
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Supplies frames to the control loop.
pub trait FrameSource {
    /// Next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError>;

    /// While paused the last frame is returned again instead of advancing.
    fn set_paused(&mut self, paused: bool);
}

/// A directory of image files played back in file-name order.
pub struct ImageSequence {
    frames: Vec<PathBuf>,
    position: usize,
    width: u32,
    paused: bool,
    last: Option<RgbImage>,
}

impl ImageSequence {
    pub fn open(dir: &Path, width: u32) -> Result<Self, SourceError> {
        let entries = std::fs::read_dir(dir).map_err(|source| SourceError::List {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        if frames.is_empty() {
            return Err(SourceError::Empty(dir.to_path_buf()));
        }
        frames.sort();

        info!(dir = %dir.display(), frames = frames.len(), width, "opened frame sequence");
        Ok(Self {
            frames,
            position: 0,
            width,
            paused: false,
            last: None,
        })
    }

    fn decode(&self, path: &Path) -> Result<RgbImage, SourceError> {
        let frame = image::open(path)
            .map_err(|source| SourceError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        Ok(resize_to_width(frame, self.width))
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        if self.paused {
            if let Some(last) = &self.last {
                return Ok(Some(last.clone()));
            }
        }
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        // Advance first so an undecodable file is skipped on the next call.
        self.position += 1;
        let frame = self.decode(path)?;
        debug!(path = %path.display(), position = self.position, "decoded frame");
        self.last = Some(frame.clone());
        Ok(Some(frame))
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Scale to `width` keeping the aspect ratio. A width of 0 keeps the frame.
pub fn resize_to_width(frame: RgbImage, width: u32) -> RgbImage {
    let (w, h) = frame.dimensions();
    if width == 0 || w == width || w == 0 {
        return frame;
    }
    let height = ((u64::from(h) * u64::from(width)) / u64::from(w)).max(1) as u32;
    image::imageops::resize(&frame, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("servo-track-src-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        RgbImage::from_pixel(40, 20, Rgb([shade, 0, 0]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn plays_in_name_order_then_ends() {
        let dir = temp_dir();
        write_frame(&dir, "frame_002.png", 20);
        write_frame(&dir, "frame_001.png", 10);
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequence::open(&dir, 40).unwrap();
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0[0], 10);
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0[0], 20);
        assert!(source.next_frame().unwrap().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn paused_repeats_last_frame() {
        let dir = temp_dir();
        write_frame(&dir, "a.png", 10);
        write_frame(&dir, "b.png", 20);

        let mut source = ImageSequence::open(&dir, 40).unwrap();
        source.next_frame().unwrap();
        source.set_paused(true);
        for _ in 0..3 {
            assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0[0], 10);
        }
        source.set_paused(false);
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0[0], 20);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn undecodable_frame_is_skipped() {
        let dir = temp_dir();
        std::fs::write(dir.join("a.png"), b"not really a png").unwrap();
        write_frame(&dir, "b.png", 20);

        let mut source = ImageSequence::open(&dir, 40).unwrap();
        assert!(matches!(source.next_frame(), Err(SourceError::Decode { .. })));
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0[0], 20);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = temp_dir();
        assert!(matches!(ImageSequence::open(&dir, 600), Err(SourceError::Empty(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn resize_keeps_aspect() {
        let frame = RgbImage::new(1200, 800);
        assert_eq!(resize_to_width(frame, 600).dimensions(), (600, 400));
        let same = RgbImage::new(600, 10);
        assert_eq!(resize_to_width(same, 600).dimensions(), (600, 10));
    }
}
