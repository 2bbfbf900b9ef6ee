// 摄像头抽象 - 设备打开、取帧和作用域内的资源释放

use async_trait::async_trait;
use image::DynamicImage;
use tracing::{debug, info};

use super::{encode_jpeg, CaptureError, EncodedImage};
use crate::models::{CameraFacing, CameraSettings};

/// 打开摄像头流时的期望参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: CameraFacing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

impl From<&CameraSettings> for StreamConstraints {
    fn from(settings: &CameraSettings) -> Self {
        Self {
            facing: settings.facing,
            ideal_width: settings.width,
            ideal_height: settings.height,
        }
    }
}

/// 摄像头设备
#[async_trait]
pub trait CameraDevice: Send + Sync {
    fn name(&self) -> &str;

    /// 打开视频流（独占设备，直到流被停止）
    async fn open(&self, constraints: &StreamConstraints)
        -> Result<Box<dyn CameraStream>, CaptureError>;
}

/// 已打开的视频流
#[async_trait]
pub trait CameraStream: Send {
    /// 获取当前画面
    async fn grab_frame(&mut self) -> Result<DynamicImage, CaptureError>;

    /// 停止所有轨道，释放设备
    fn stop(&mut self);
}

/// 摄像头会话 - 离开作用域时一定会停止视频流
pub struct CameraSession {
    stream: Option<Box<dyn CameraStream>>,
    jpeg_quality: u8,
}

impl CameraSession {
    pub fn new(stream: Box<dyn CameraStream>, jpeg_quality: u8) -> Self {
        info!("摄像头会话已开始");
        Self {
            stream: Some(stream),
            jpeg_quality,
        }
    }

    /// 快门：取当前一帧并编码为 JPEG
    pub async fn capture_still(&mut self) -> Result<EncodedImage, CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::StreamClosed)?;
        let frame = stream.grab_frame().await?;
        let quality = self.jpeg_quality;
        tokio::task::spawn_blocking(move || encode_jpeg(&frame, quality))
            .await
            .map_err(|e| CaptureError::Encode(e.to_string()))?
    }

    /// 主动释放
    pub fn release(mut self) {
        self.stop_stream();
    }

    fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("摄像头视频流已停止");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("active", &self.stream.is_some())
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}
