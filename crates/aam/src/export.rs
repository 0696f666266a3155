//! 8-bit grayscale export of synthesized instances (feature `image`).

use std::path::Path;

use aam_core::{MaskedImage, PartsImage};

use crate::compose::AamInstance;

#[inline]
fn to_u8(v: f64) -> u8 {
    if v.is_finite() {
        v.round().clamp(0.0, 255.0) as u8
    } else {
        0
    }
}

/// Channel 0 of the masked pixels; everything outside the mask is black.
pub fn masked_image_to_gray(img: &MaskedImage) -> ::image::GrayImage {
    let mut out = ::image::GrayImage::new(img.width() as u32, img.height() as u32);
    for (x, y) in img.mask.true_pixels() {
        let v = to_u8(img.image.pixel(x, y)[0]);
        out.put_pixel(x as u32, y as u32, ::image::Luma([v]));
    }
    out
}

/// Channel 0 of every part, tiled left to right in part order.
pub fn parts_to_gray(parts: &PartsImage) -> ::image::GrayImage {
    let ps = parts.patch_shape;
    let mut out = ::image::GrayImage::new((ps.width * parts.n_parts) as u32, ps.height as u32);
    for i in 0..parts.n_parts {
        let Some(patch) = parts.part(i) else { break };
        for y in 0..ps.height {
            for x in 0..ps.width {
                let v = to_u8(patch[(y * ps.width + x) * parts.n_channels]);
                out.put_pixel((i * ps.width + x) as u32, y as u32, ::image::Luma([v]));
            }
        }
    }
    out
}

pub fn instance_to_gray(instance: &AamInstance) -> ::image::GrayImage {
    match instance {
        AamInstance::Image(img) => masked_image_to_gray(img),
        AamInstance::Parts(parts) => parts_to_gray(parts),
    }
}

/// Save as PNG (or whatever format the extension names).
pub fn save_instance_image(
    instance: &AamInstance,
    path: impl AsRef<Path>,
) -> Result<(), ::image::ImageError> {
    let path = path.as_ref();
    let gray = instance_to_gray(instance);
    gray.save(path)?;
    log::info!(
        "wrote {}x{} instance image to {}",
        gray.width(),
        gray.height(),
        path.display()
    );
    Ok(())
}
