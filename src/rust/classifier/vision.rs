use image::imageops::FilterType;
use ndarray::{Array4, ArrayD};

use super::error::ClassifierError;
use super::preprocess::{InferenceInput, InputContract, Preprocessor};

/// ImageNet channel statistics the MRI network was fine-tuned with.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes an uploaded image into a normalized `[1, 3, size, size]` tensor.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    allowed_extensions: Vec<String>,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
        }
    }
}

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.mean = mean;
        self.std = std;
        self
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    fn describe_allowed(&self) -> String {
        self.allowed_extensions.join("/")
    }
}

impl Preprocessor for ImagePreprocessor {
    fn validate(&self, input: &InferenceInput) -> Result<(), ClassifierError> {
        let accepted = input
            .extension()
            .map(|ext| self.allowed_extensions.iter().any(|a| *a == ext))
            .unwrap_or(false);
        if !accepted {
            return Err(ClassifierError::UnsupportedFormat(format!(
                "Invalid file type. Please upload an image ({}).",
                self.describe_allowed()
            )));
        }
        // A declared image type outside the allow-list contradicts the extension.
        if let Some(declared) = input.content_type.as_deref() {
            let declared = declared.trim().to_ascii_lowercase();
            if let Some(subtype) = declared.strip_prefix("image/") {
                let subtype = subtype.split(';').next().unwrap_or_default().trim();
                if !self.allowed_extensions.iter().any(|a| a == subtype) {
                    return Err(ClassifierError::UnsupportedFormat(format!(
                        "Invalid content type '{}'. Please upload an image ({}).",
                        declared,
                        self.describe_allowed()
                    )));
                }
            }
        }
        if input.bytes.is_empty() {
            return Err(ClassifierError::UnsupportedFormat("Uploaded image is empty".into()));
        }
        Ok(())
    }

    fn preprocess(&self, input: &InferenceInput) -> Result<ArrayD<f32>, ClassifierError> {
        self.validate(input)?;

        let decoded = image::load_from_memory(&input.bytes)
            .map_err(|e| ClassifierError::UnsupportedFormat(format!("Failed to decode image: {}", e)))?;
        let resized = decoded.resize_exact(self.size, self.size, FilterType::Triangle);
        let rgb = resized.to_rgb8();

        let side = self.size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - self.mean[c]) / self.std[c];
            }
        }

        Ok(tensor.into_dyn())
    }

    fn input_contract(&self) -> InputContract {
        let side = self.size as usize;
        InputContract::new(vec![Some(1), Some(3), Some(side), Some(side)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(width: u32, height: u32, color: [u8; 3], format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, format)
            .expect("encode test image");
        buf.into_inner()
    }

    #[test]
    fn test_jpeg_yields_fixed_shape() {
        let input = InferenceInput::new(encode(224, 224, [120, 80, 40], ImageFormat::Jpeg))
            .with_file_name("scan.jpg");
        let tensor = ImagePreprocessor::new().preprocess(&input).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_any_resolution_is_resized() {
        let input = InferenceInput::new(encode(64, 300, [0, 0, 0], ImageFormat::Png))
            .with_file_name("SCAN.PNG");
        let tensor = ImagePreprocessor::new().preprocess(&input).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_normalization_constants() {
        let input = InferenceInput::new(encode(8, 8, [255, 255, 255], ImageFormat::Png))
            .with_file_name("white.png");
        let tensor = ImagePreprocessor::new().preprocess(&input).unwrap();
        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            let actual = tensor[[0, c, 100, 100]];
            assert!((actual - expected).abs() < 1e-4, "channel {}: {} vs {}", c, actual, expected);
        }
    }

    #[test]
    fn test_rejects_unlisted_extension() {
        let preprocessor = ImagePreprocessor::new();
        let bytes = encode(8, 8, [1, 2, 3], ImageFormat::Png);
        for name in ["scan.gif", "scan.bmp", "scan", "scan.png.txt"] {
            let input = InferenceInput::new(bytes.clone()).with_file_name(name);
            assert!(matches!(
                preprocessor.validate(&input),
                Err(ClassifierError::UnsupportedFormat(_))
            ), "{} should be rejected", name);
        }
        assert!(preprocessor.validate(&InferenceInput::new(bytes)).is_err());
    }

    #[test]
    fn test_declared_content_type() {
        let preprocessor = ImagePreprocessor::new();
        let bytes = encode(8, 8, [1, 2, 3], ImageFormat::Png);
        for declared in ["image/png", "image/jpeg", "IMAGE/JPG", "application/octet-stream"] {
            let input = InferenceInput::new(bytes.clone())
                .with_file_name("scan.png")
                .with_content_type(declared);
            assert!(preprocessor.validate(&input).is_ok(), "{} should be accepted", declared);
        }
        for declared in ["image/gif", "image/webp; charset=binary"] {
            let input = InferenceInput::new(bytes.clone())
                .with_file_name("scan.png")
                .with_content_type(declared);
            assert!(matches!(
                preprocessor.validate(&input),
                Err(ClassifierError::UnsupportedFormat(_))
            ), "{} should be rejected", declared);
        }
    }

    #[test]
    fn test_custom_normalization() {
        let preprocessor = ImagePreprocessor::new().with_normalization([0.0; 3], [1.0; 3]);
        assert_eq!(preprocessor.allowed_extensions(), ["jpg", "jpeg", "png"]);
        let input = InferenceInput::new(encode(4, 4, [255, 0, 255], ImageFormat::Png))
            .with_file_name("plain.png");
        let tensor = preprocessor.preprocess(&input).unwrap();
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-2);
        assert!(tensor[[0, 1, 0, 0]].abs() < 1e-2);
    }

    #[test]
    fn test_rejects_undecodable_bytes() {
        let input = InferenceInput::new(b"definitely not a jpeg".to_vec()).with_file_name("scan.jpg");
        assert!(matches!(
            ImagePreprocessor::new().preprocess(&input),
            Err(ClassifierError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_contract_matches_output() {
        let preprocessor = ImagePreprocessor::new().with_size(32);
        let input = InferenceInput::new(encode(10, 10, [9, 9, 9], ImageFormat::Png))
            .with_file_name("a.png");
        let tensor = preprocessor.preprocess(&input).unwrap();
        assert!(preprocessor.input_contract().check(tensor.shape()).is_ok());
    }
}
