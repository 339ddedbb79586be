//! Card background: a decoded raster or a solid fill.

use std::path::Path;

use image::RgbaImage;
use tracing::warn;

/// An opaque sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xFF, 0xFF, 0xFF);

    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// What the card is drawn on. The raster is owned for the duration of one render.
#[derive(Debug, Clone)]
pub enum BackgroundSpec {
    Raster(RgbaImage),
    Solid(Rgb),
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        BackgroundSpec::Solid(Rgb::WHITE)
    }
}

impl BackgroundSpec {
    /// Decodes an encoded raster (PNG, JPEG, WebP).
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(BackgroundSpec::Raster(decoded.to_rgba8()))
    }

    /// Loads a raster from disk, degrading to `fallback` when the file is absent
    /// or cannot be decoded.
    pub fn from_file(path: &Path, fallback: Rgb) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::from_encoded(&bytes).unwrap_or_else(|e| {
                warn!("Background {} is not a decodable image: {e}", path.display());
                BackgroundSpec::Solid(fallback)
            }),
            Err(e) => {
                warn!("Background {} unavailable: {e}", path.display());
                BackgroundSpec::Solid(fallback)
            }
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, BackgroundSpec::Raster(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb::WHITE.hex(), "#FFFFFF");
        assert_eq!(Rgb(0x11, 0x0A, 0x00).hex(), "#110A00");
    }

    #[test]
    fn test_from_encoded_decodes_png() {
        let spec = BackgroundSpec::from_encoded(&encoded_png(4, 3)).unwrap();
        match spec {
            BackgroundSpec::Raster(img) => assert_eq!(img.dimensions(), (4, 3)),
            BackgroundSpec::Solid(_) => panic!("expected raster"),
        }
    }

    #[test]
    fn test_from_encoded_rejects_garbage() {
        assert!(BackgroundSpec::from_encoded(b"definitely not an image").is_err());
    }

    #[test]
    fn test_from_file_missing_falls_back_to_solid() {
        let spec = BackgroundSpec::from_file(Path::new("/no/such/background.png"), Rgb::WHITE);
        assert!(matches!(spec, BackgroundSpec::Solid(Rgb::WHITE)));
    }

    #[test]
    fn test_from_file_reads_raster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        std::fs::write(&path, encoded_png(8, 8)).unwrap();
        assert!(BackgroundSpec::from_file(&path, Rgb::WHITE).is_raster());
    }
}
