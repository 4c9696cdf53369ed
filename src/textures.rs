//! Sprite textures for smoke puffs.
//!
//! A sprite texture is plain RGBA8 data. The alpha channel shapes the puff;
//! the sprite shader multiplies it with age-based fade and tint.
//!
//! # Example
//!
//! ```ignore
//! // Procedural soft disc
//! let tex = SpriteTexture::soft_disc(64);
//!
//! // Or an image from disk
//! let tex = SpriteTexture::from_file("assets/smoke.png")?;
//! ```

use std::path::Path;

use crate::error::TextureError;

/// RGBA8 image used as the sprite mask.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteTexture {
    /// Raw RGBA pixel data (width * height * 4 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl SpriteTexture {
    /// Wrap raw RGBA data. Returns `None` on a size mismatch or empty image.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 || data.len() != (width * height * 4) as usize {
            return None;
        }
        Some(Self { data, width, height })
    }

    /// Decode an image file (PNG or JPEG).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let bytes = std::fs::read(path.as_ref())?;
        let img = image::load_from_memory(&bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        log::info!(
            "loaded sprite texture '{}' ({}x{})",
            path.as_ref().display(),
            width,
            height
        );
        Ok(Self {
            data: img.into_raw(),
            width,
            height,
        })
    }

    /// White disc with a smooth radial alpha falloff.
    pub fn soft_disc(size: u32) -> Self {
        Self::puff(size, 0.0, 0)
    }

    /// Soft disc whose alpha is broken up by hash noise.
    ///
    /// `roughness` in `[0, 1]` is how much of the alpha the noise may remove.
    pub fn puff(size: u32, roughness: f32, seed: u32) -> Self {
        let size = size.max(2);
        let roughness = roughness.clamp(0.0, 1.0);
        let half = (size as f32 - 1.0) * 0.5;
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 - half) / half;
                let dy = (y as f32 - half) / half;
                let r = (dx * dx + dy * dy).sqrt();
                let falloff = (1.0 - r).clamp(0.0, 1.0);
                let falloff = falloff * falloff * (3.0 - 2.0 * falloff);
                let grain = hash_noise(x, y, seed) as f32 / 255.0;
                let alpha = falloff * (1.0 - roughness * grain);
                data.extend_from_slice(&[255, 255, 255, (alpha * 255.0).round() as u8]);
            }
        }
        Self {
            data,
            width: size,
            height: size,
        }
    }
}

/// Simple hash-based noise function.
fn hash_noise(x: u32, y: u32, seed: u32) -> u8 {
    let mut n = x
        .wrapping_mul(374761393)
        .wrapping_add(y.wrapping_mul(668265263))
        .wrapping_add(seed.wrapping_mul(1013904223));
    n = (n ^ (n >> 13)).wrapping_mul(1274126177);
    n = n ^ (n >> 16);
    (n & 255) as u8
}
