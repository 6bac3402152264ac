use std::path::Path;

use crate::error::LoadError;
use crate::render::backend::TextureImage;

/// Decode an image file to RGBA8.
pub fn load_texture(path: &Path) -> Result<TextureImage, LoadError> {
    let img = image::open(path).map_err(|source| match source {
        image::ImageError::IoError(source) => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => LoadError::Image {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(LoadError::Invalid {
            path: path.to_path_buf(),
            reason: "image has no pixels".into(),
        });
    }
    Ok(TextureImage {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}
