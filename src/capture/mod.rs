// 图像采集模块 - 摄像头拍摄和文件上传，统一输出为编码后的图片

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub mod camera;
pub mod ffmpeg;

pub use camera::{CameraDevice, CameraSession, CameraStream, StreamConstraints};
pub use ffmpeg::FfmpegCamera;

/// 采集错误
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("摄像头权限被拒绝")]
    PermissionDenied,
    #[error("摄像头不可用: {0}")]
    DeviceUnavailable(String),
    #[error("摄像头流已关闭")]
    StreamClosed,
    #[error("读取图片失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("不支持的图片格式")]
    UnsupportedFormat,
    #[error("图片编码失败: {0}")]
    Encode(String),
}

impl CaptureError {
    /// 展示给用户的提示
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied | Self::DeviceUnavailable(_) | Self::StreamClosed => {
                "카메라를 시작할 수 없습니다. 권한을 확인해주세요."
            }
            Self::Io(_) => "이미지 파일을 읽을 수 없습니다.",
            Self::UnsupportedFormat => "지원하지 않는 이미지 형식입니다.",
            Self::Encode(_) => "이미지를 처리할 수 없습니다.",
        }
    }
}

/// 编码后的图片（mime 类型 + 原始字节）
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// base64 编码内容（不含 data URL 前缀）
    pub fn base64_payload(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// 自包含的 data URL
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_payload())
    }

    /// 解析 `data:<mime>;base64,<payload>`
    pub fn from_data_url(url: &str) -> Result<Self, CaptureError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| CaptureError::Encode("不是 data URL".to_string()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| CaptureError::Encode("data URL 缺少内容".to_string()))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| CaptureError::Encode("data URL 不是 base64 编码".to_string()))?;
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        Ok(Self::new(mime_type, bytes))
    }
}

/// 支持的图片格式对应的 mime 类型
fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

/// 将一帧画面编码为 JPEG
pub fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<EncodedImage, CaptureError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(CaptureError::Encode("画面尺寸为空".to_string()));
    }

    // JPEG 不支持透明通道
    let rgb = frame.to_rgb8();
    let mut buf = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder
        .encode_image(&rgb)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    debug!(
        "画面已编码为 JPEG: {}x{}, {} 字节",
        rgb.width(),
        rgb.height(),
        buf.len()
    );
    Ok(EncodedImage::new("image/jpeg", buf))
}

/// 读取并校验本地图片文件
pub async fn read_image_file(path: &Path) -> Result<EncodedImage, CaptureError> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(CaptureError::Encode("文件为空".to_string()));
    }

    let format = image::guess_format(&bytes).map_err(|_| CaptureError::UnsupportedFormat)?;
    let mime_type = mime_for_format(format).ok_or(CaptureError::UnsupportedFormat)?;

    // 完整解码一次，拒绝损坏的文件
    let bytes = tokio::task::spawn_blocking(move || {
        image::load_from_memory_with_format(&bytes, format)
            .map(|_| bytes)
            .map_err(|e| CaptureError::Encode(e.to_string()))
    })
    .await
    .map_err(|e| CaptureError::Encode(e.to_string()))??;

    info!("已读取图片 {:?} ({}, {} 字节)", path, mime_type, bytes.len());
    Ok(EncodedImage::new(mime_type, bytes))
}

/// 取景框提示（仅作参考，不做校验）
#[derive(Debug, Clone, PartialEq)]
pub struct GuideOverlay {
    /// 相对画面的宽度比例
    pub width_ratio: f32,
    /// 相对画面的高度比例
    pub height_ratio: f32,
    pub hint: &'static str,
}

impl Default for GuideOverlay {
    fn default() -> Self {
        Self {
            width_ratio: 0.75,
            height_ratio: 0.5,
            hint: "창문을 사각형 안에 맞춰주세요",
        }
    }
}

impl GuideOverlay {
    /// 居中的取景框 (x, y, width, height)
    pub fn rect_for(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let w = (frame_width as f32 * self.width_ratio).round() as u32;
        let h = (frame_height as f32 * self.height_ratio).round() as u32;
        ((frame_width - w) / 2, (frame_height - h) / 2, w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn sample_frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([200, 180, 90])))
    }

    #[test]
    fn test_data_url_round_trip() {
        let image = EncodedImage::new("image/png", vec![1, 2, 3, 250]);
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(EncodedImage::from_data_url(&url).unwrap(), image);
    }

    #[test]
    fn test_from_data_url_rejects_malformed() {
        assert!(EncodedImage::from_data_url("https://example.com/a.jpg").is_err());
        assert!(EncodedImage::from_data_url("data:image/png,raw").is_err());
        assert!(EncodedImage::from_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_encode_jpeg_produces_decodable_image() {
        let encoded = encode_jpeg(&sample_frame(), 80).unwrap();
        assert_eq!(encoded.mime_type(), "image/jpeg");
        assert_eq!(&encoded.bytes()[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(encoded.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_encode_jpeg_rejects_empty_frame() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(encode_jpeg(&empty, 80), Err(CaptureError::Encode(_))));
    }

    #[tokio::test]
    async fn test_read_png_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("window.png");
        sample_frame().save(&path).unwrap();

        let image = read_image_file(&path).await.unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert!(!image.is_empty());
    }

    #[tokio::test]
    async fn test_read_rejects_non_image_and_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello window").await.unwrap();
        assert!(matches!(
            read_image_file(&path).await,
            Err(CaptureError::UnsupportedFormat)
        ));

        assert!(matches!(
            read_image_file(&dir.path().join("missing.jpg")).await,
            Err(CaptureError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_read_rejects_truncated_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        let full = encode_png(&sample_frame());
        tokio::fs::write(&path, &full[..full.len() / 2]).await.unwrap();

        assert!(matches!(
            read_image_file(&path).await,
            Err(CaptureError::Encode(_))
        ));
    }

    fn encode_png(frame: &DynamicImage) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        frame.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_guide_overlay_is_centered() {
        let guide = GuideOverlay::default();
        assert_eq!(guide.rect_for(1280, 720), (160, 180, 960, 360));
    }
}
