//! Quad key encoding of tile indices.
//!
//! A quad key holds one base-4 digit per zoom level. Each digit picks a
//! quadrant of its parent tile: `0` north-west, `1` north-east, `2` south-west,
//! `3` south-east. The root tile is the empty key.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::types::{ProjectionError, TileIndex, MAX_ZOOM};

/// File stem used for the root tile, whose quad key is empty.
pub const ROOT_FILE_STEM: &str = "root";

/// Base-4 tile identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QuadKey(String);

impl QuadKey {
    /// Encodes a tile index.
    pub fn from_tile(tile: &TileIndex) -> Self {
        let mut key = String::with_capacity(tile.zoom as usize);
        for level in (1..=tile.zoom).rev() {
            let mask = 1u32 << (level - 1);
            let mut digit = b'0';
            if tile.x & mask != 0 {
                digit += 1;
            }
            if tile.y & mask != 0 {
                digit += 2;
            }
            key.push(digit as char);
        }
        QuadKey(key)
    }

    /// Parses and validates a quad key string.
    pub fn parse(key: &str) -> Result<Self, ProjectionError> {
        if key.len() > MAX_ZOOM as usize {
            return Err(ProjectionError::InvalidQuadKey {
                key: key.to_string(),
                reason: format!("longer than {} digits", MAX_ZOOM),
            });
        }
        if let Some(bad) = key.chars().find(|c| !matches!(c, '0'..='3')) {
            return Err(ProjectionError::InvalidQuadKey {
                key: key.to_string(),
                reason: format!("'{}' is not a base-4 digit", bad),
            });
        }
        Ok(QuadKey(key.to_string()))
    }

    /// Parses a quad key that must address a tile at `zoom`.
    pub fn parse_at_zoom(key: &str, zoom: u8) -> Result<Self, ProjectionError> {
        let parsed = Self::parse(key)?;
        if parsed.zoom() != zoom {
            return Err(ProjectionError::InvalidQuadKey {
                key: key.to_string(),
                reason: format!("expected {} digits for zoom {}", zoom, zoom),
            });
        }
        Ok(parsed)
    }

    /// Decodes the key back into its tile index.
    pub fn to_tile(&self) -> TileIndex {
        let zoom = self.0.len() as u8;
        let mut x = 0u32;
        let mut y = 0u32;
        for (i, digit) in self.0.bytes().enumerate() {
            let mask = 1u32 << (zoom as usize - i - 1);
            match digit {
                b'1' => x |= mask,
                b'2' => y |= mask,
                b'3' => {
                    x |= mask;
                    y |= mask;
                }
                _ => {}
            }
        }
        TileIndex { x, y, zoom }
    }

    /// Zoom level addressed by the key.
    pub fn zoom(&self) -> u8 {
        self.0.len() as u8
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name used for files produced for this tile.
    pub fn file_stem(&self) -> &str {
        if self.0.is_empty() {
            ROOT_FILE_STEM
        } else {
            &self.0
        }
    }
}

impl fmt::Display for QuadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QuadKey {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&TileIndex> for QuadKey {
    fn from(tile: &TileIndex) -> Self {
        Self::from_tile(tile)
    }
}
