use crate::utils::error::StageError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;

/// 上传图像大小上限（50MB）
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// 从文件路径加载图像
    ///
    /// 路径不存在或不可读返回 `ImageNotFound`，无法解码返回 `UnsupportedImage`。
    pub fn from_path(path: &Path) -> Result<DynamicImage> {
        if !path.is_file() {
            return Err(StageError::ImageNotFound(path.to_path_buf()));
        }

        let reader = ImageReader::open(path)
            .map_err(|_| StageError::ImageNotFound(path.to_path_buf()))?
            .with_guessed_format()
            .map_err(|_| StageError::ImageNotFound(path.to_path_buf()))?;

        let image = reader.decode().map_err(|e| {
            StageError::UnsupportedImage(format!("{}: {}", path.display(), e))
        })?;

        Ok(image)
    }

    /// 解码base64字符串（允许 data URL 前缀），返回原始字节
    pub fn decode_base64(base64_data: &str) -> Result<Vec<u8>> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;
        Self::ensure_size(image_bytes.len())?;

        Ok(image_bytes)
    }

    /// 检查字节数是否超过上限
    pub fn ensure_size(len: usize) -> Result<()> {
        if len > MAX_IMAGE_BYTES {
            return Err(StageError::FileTooLarge(len, MAX_IMAGE_BYTES));
        }
        Ok(())
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 根据内容推断临时文件扩展名
    pub fn file_suffix(bytes: &[u8]) -> String {
        Self::detect_format(bytes)
            .and_then(|format| format.extensions_str().first().copied())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_else(|| ".bin".to_string())
    }
}
