//! The process-wide card font.
//!
//! One TrueType/OpenType file is loaded at startup and shared read-only by every
//! request. It serves two consumers: the layout engine, which measures candidate
//! lines with [`FontRegistry::measure`], and the SVG rasteriser, which resolves
//! the registered family through [`FontRegistry::fontdb`].
//!
//! Widths are the sum of nominal horizontal advances. Shaping can shift Tamil
//! clusters by a few pixels, which the canvas margin absorbs.
//!
//! Measurement only ever consults the registered face. Installed system fonts
//! can be added to the rasteriser's database as glyph fallback, so a character
//! the card font lacks is still drawn, measured as a space.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use ttf_parser::Face;
use usvg::fontdb::{self, Database, Family, Query};

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("font data could not be parsed")]
    Parse,

    #[error("font has no family name")]
    NoFamily,
}

/// The single registered card font.
#[derive(Clone)]
pub struct FontRegistry {
    family: String,
    fontdb: Arc<Database>,
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
}

impl std::fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRegistry")
            .field("family", &self.family)
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl FontRegistry {
    /// Reads and registers the font at `path`.
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(data)
    }

    /// Registers a font from its raw bytes. The first face of a collection is used.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FontError> {
        let face = Face::parse(&data, 0).map_err(|_| FontError::Parse)?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 4);

        let mut db = Database::new();
        db.load_font_data(data.clone());

        // Take the name fontdb indexed so SVG `font-family` lookups always match.
        let family = db
            .faces()
            .next()
            .and_then(|info| info.families.first())
            .map(|(name, _)| name.clone())
            .ok_or(FontError::NoFamily)?;
        db.set_sans_serif_family(family.clone());

        Ok(Self {
            family,
            fontdb: Arc::new(db),
            data: Arc::new(data),
            units_per_em,
            space_advance,
        })
    }

    /// Adds the host's installed fonts as rasteriser fallback faces.
    ///
    /// The registered family stays the sans-serif default and the only face
    /// used for measurement.
    pub fn with_system_fallback(mut self) -> Self {
        let mut db = (*self.fontdb).clone();
        db.load_system_fonts();
        self.fontdb = Arc::new(db);
        self
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// True when the registered face maps `c` to a glyph.
    pub fn has_glyph(&self, c: char) -> bool {
        Face::parse(&self.data, 0)
            .map(|face| face.glyph_index(c).is_some())
            .unwrap_or(false)
    }

    pub fn fontdb(&self) -> Arc<Database> {
        Arc::clone(&self.fontdb)
    }

    /// True when `family` resolves to a loaded face.
    pub fn resolves(&self, family: &str) -> bool {
        let families = [Family::Name(family)];
        self.fontdb
            .query(&Query {
                families: &families,
                weight: fontdb::Weight::NORMAL,
                stretch: fontdb::Stretch::Normal,
                style: fontdb::Style::Normal,
            })
            .is_some()
    }

    /// Rendered width of `text` in pixels at `size_px`.
    ///
    /// Characters the font has no glyph for count as a space.
    pub fn measure(&self, text: &str, size_px: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, 0) else {
            return 0.0;
        };
        let advance: u32 = text
            .chars()
            .filter(|c| *c != '\n')
            .map(|c| {
                face.glyph_index(c)
                    .and_then(|g| face.glyph_hor_advance(g))
                    .unwrap_or(self.space_advance) as u32
            })
            .sum();
        advance as f32 * size_px / self.units_per_em as f32
    }
}


// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
