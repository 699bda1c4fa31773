use domain::TodoError;
use image::imageops::FilterType;
use image::ImageFormat;
use std::io::Cursor;

/// 縦横比を保ったまま幅 `width` に縮小し、PNG として書き出す
pub fn resize_to_width(bytes: &[u8], width: u32) -> Result<Vec<u8>, TodoError> {
    let source = image::load_from_memory(bytes)
        .map_err(|e| TodoError::Image(format!("画像のデコードに失敗: {e}")))?;

    if source.width() == 0 || width == 0 {
        return Err(TodoError::Image("幅0の画像はリサイズできません".to_string()));
    }

    let height = scaled_height(source.width(), source.height(), width);
    let resized = source.resize_exact(width, height, FilterType::Triangle);

    let mut buffer = Cursor::new(Vec::new());
    resized
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| TodoError::Image(format!("画像のエンコードに失敗: {e}")))?;

    Ok(buffer.into_inner())
}

fn scaled_height(source_width: u32, source_height: u32, width: u32) -> u32 {
    let scaled = (u64::from(source_height) * u64::from(width) + u64::from(source_width) / 2)
        / u64::from(source_width);
    u32::try_from(scaled.max(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let resized = resize_to_width(&png_bytes(300, 200), 150).unwrap();
        let decoded = image::load_from_memory(&resized).unwrap();

        assert_eq!(decoded.dimensions(), (150, 100));
        assert_eq!(image::guess_format(&resized).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_small_image_is_scaled_up() {
        let resized = resize_to_width(&png_bytes(50, 25), 150).unwrap();
        let decoded = image::load_from_memory(&resized).unwrap();
        assert_eq!(decoded.dimensions(), (150, 75));
    }

    #[test]
    fn test_scaled_height_never_zero() {
        assert_eq!(scaled_height(3000, 1, 150), 1);
        assert_eq!(scaled_height(400, 300, 150), 113);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = resize_to_width(b"not an image", 150);
        assert!(matches!(result, Err(TodoError::Image(_))));
    }
}
