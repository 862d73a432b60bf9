use crate::config::SpriteConfig;
use crate::error::{Result, SpriteError};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

/// Copy all of `src` into `canvas` with its top-left at (dx, dy).
///
/// Pixels are replaced, not blended; anything falling outside `canvas` is clipped.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    for yy in 0..sh {
        if dy + yy >= ch {
            break;
        }
        for xx in 0..sw {
            if dx + xx >= cw {
                break;
            }
            canvas.put_pixel(dx + xx, dy + yy, *src.get_pixel(xx, yy));
        }
    }
}

/// Encode an RGBA buffer as PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(|e| SpriteError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Composite file name as referenced from the CSS:
/// `{image_dist}{prefix}{base}[_{index}].{format}`.
///
/// The index suffix is only added when the unit produced more than one packed batch.
pub fn composite_name(cfg: &SpriteConfig, base: &str, index: usize, total: usize) -> String {
    let suffix = if total > 1 {
        format!("_{index}")
    } else {
        String::new()
    };
    format!(
        "{}{}{}{}.{}",
        cfg.image_dist, cfg.prefix, base, suffix, cfg.format
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn blit_clips_to_canvas() {
        let src = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let mut canvas = RgbaImage::new(6, 6);
        blit_rgba(&src, &mut canvas, 4, 4);
        assert_eq!(*canvas.get_pixel(5, 5), Rgba([1, 2, 3, 255]));
        assert_eq!(*canvas.get_pixel(3, 3), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn names_carry_index_only_for_multiple_batches() {
        let cfg = SpriteConfig::default();
        assert_eq!(composite_name(&cfg, "icons", 0, 1), "./img/sprite_icons.png");
        assert_eq!(composite_name(&cfg, "icons", 1, 2), "./img/sprite_icons_1.png");
    }
}
