use crate::config::PreprocessConfig;
use crate::image::ImageLoader;
use crate::utils::error::StageError;
use crate::Result;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{Array4, ArrayView4};
use std::path::Path;

/// 模型输入张量，NHWC布局，batch维度为1，数值范围[0, 1]
#[derive(Debug, Clone)]
pub struct PreprocessedTensor {
    data: Array4<f32>,
}

impl PreprocessedTensor {
    pub fn new(data: Array4<f32>) -> Result<Self> {
        let shape = data.shape();
        if shape[0] != 1 || shape[3] != 3 {
            return Err(StageError::Internal(format!(
                "expected tensor shape [1, H, W, 3], got {:?}",
                shape
            )));
        }
        Ok(Self { data })
    }

    /// (batch, height, width, channels)
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array4<f32> {
        self.data
    }
}

/// 图像预处理接口，便于在流水线测试中替换
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, path: &Path) -> Result<PreprocessedTensor>;
}

/// 默认预处理：解码、双线性拉伸到固定尺寸、RGB、除以255、添加batch维
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            filter: FilterType::Triangle,
        }
    }

    /// 对已解码的图像做张量化
    pub fn tensor_from_image(&self, image: &DynamicImage) -> Result<PreprocessedTensor> {
        // 不保持宽高比，直接拉伸
        let resized = image.resize_exact(self.width, self.height, self.filter);
        let rgb = resized.to_rgb8();

        let (width, height) = (self.width as usize, self.height as usize);
        let data = Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
            rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });

        PreprocessedTensor::new(data)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

impl Preprocessor for ImagePreprocessor {
    fn preprocess(&self, path: &Path) -> Result<PreprocessedTensor> {
        let image = ImageLoader::from_path(path)?;
        tracing::debug!(
            "Decoded {} ({}x{}), resizing to {}x{}",
            path.display(),
            image.width(),
            image.height(),
            self.width,
            self.height
        );
        self.tensor_from_image(&image)
    }
}
