// FFmpeg 摄像头实现 - 子进程持续写入单帧文件

use async_trait::async_trait;
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::camera::{CameraDevice, CameraStream, StreamConstraints};
use super::CaptureError;

/// 等待第一帧的最长时间
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(8);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 获取FFmpeg可执行文件的路径
pub fn find_ffmpeg() -> Option<PathBuf> {
    // 常见安装路径
    let common_paths = [
        "/opt/homebrew/bin/ffmpeg", // Apple Silicon Homebrew
        "/usr/local/bin/ffmpeg",    // Intel Homebrew
        "/opt/local/bin/ffmpeg",    // MacPorts
        "/usr/bin/ffmpeg",
    ];

    for path_str in &common_paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            debug!("使用系统FFmpeg: {:?}", path);
            return Some(path);
        }
    }

    // 尝试 PATH 环境变量中的 ffmpeg
    let status = std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(s) if s.success() => Some(PathBuf::from("ffmpeg")),
        _ => None,
    }
}

/// 通过 ffmpeg 读取平台视频设备的摄像头
pub struct FfmpegCamera {
    ffmpeg_path: Option<PathBuf>,
    /// 设备名（为空时使用平台默认设备）
    device: Option<String>,
}

impl FfmpegCamera {
    pub fn new(device: Option<String>) -> Self {
        Self {
            ffmpeg_path: find_ffmpeg(),
            device,
        }
    }

    /// 平台相关的输入参数
    fn input_args(&self, constraints: &StreamConstraints) -> Vec<String> {
        let size = format!("{}x{}", constraints.ideal_width, constraints.ideal_height);

        #[cfg(target_os = "macos")]
        let args = vec![
            "-f".to_string(),
            "avfoundation".to_string(),
            "-framerate".to_string(),
            "30".to_string(),
            "-video_size".to_string(),
            size,
            "-i".to_string(),
            self.device.clone().unwrap_or_else(|| "0".to_string()),
        ];

        #[cfg(target_os = "windows")]
        let args = vec![
            "-f".to_string(),
            "dshow".to_string(),
            "-video_size".to_string(),
            size,
            "-i".to_string(),
            format!(
                "video={}",
                self.device.clone().unwrap_or_else(|| "Integrated Camera".to_string())
            ),
        ];

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let args = vec![
            "-f".to_string(),
            "v4l2".to_string(),
            "-video_size".to_string(),
            size,
            "-i".to_string(),
            self.device.clone().unwrap_or_else(|| "/dev/video0".to_string()),
        ];

        args
    }

    /// 完整的 ffmpeg 参数：持续覆盖同一个帧文件
    fn build_args(&self, constraints: &StreamConstraints, frame_path: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];
        args.extend(self.input_args(constraints));
        args.extend([
            "-an".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            "-update".to_string(),
            "1".to_string(),
            "-y".to_string(),
            frame_path.to_string_lossy().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl CameraDevice for FfmpegCamera {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn CameraStream>, CaptureError> {
        let ffmpeg = self
            .ffmpeg_path
            .clone()
            .ok_or_else(|| CaptureError::DeviceUnavailable("未找到FFmpeg".to_string()))?;

        let dir = tempfile::Builder::new().prefix("smart-window-camera").tempdir()?;
        let frame_path = dir.path().join("frame.jpg");
        let args = self.build_args(constraints, &frame_path);

        info!("打开摄像头: {:?} {}", ffmpeg, args.join(" "));

        let mut command = Command::new(&ffmpeg);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Windows下隐藏控制台窗口
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let child = command
            .spawn()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("启动FFmpeg失败: {}", e)))?;

        let mut stream = FfmpegStream {
            child: Some(child),
            frame_path,
            _dir: dir,
        };
        stream.wait_for_first_frame().await?;
        Ok(Box::new(stream))
    }
}

/// ffmpeg 子进程持有设备，停止即结束进程
pub struct FfmpegStream {
    child: Option<Child>,
    frame_path: PathBuf,
    _dir: TempDir,
}

impl FfmpegStream {
    async fn wait_for_first_frame(&mut self) -> Result<(), CaptureError> {
        let deadline = tokio::time::Instant::now() + FIRST_FRAME_TIMEOUT;

        loop {
            if let Ok(meta) = tokio::fs::metadata(&self.frame_path).await {
                if meta.len() > 0 {
                    return Ok(());
                }
            }

            self.ensure_running()?;

            if tokio::time::Instant::now() >= deadline {
                self.stop();
                return Err(CaptureError::DeviceUnavailable(
                    "等待摄像头画面超时".to_string(),
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// 子进程提前退出说明设备不可用或无权限
    fn ensure_running(&mut self) -> Result<(), CaptureError> {
        let child = self.child.as_mut().ok_or(CaptureError::StreamClosed)?;
        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                self.child = None;
                warn!("FFmpeg 已退出: {}", status);
                Err(CaptureError::DeviceUnavailable(format!(
                    "摄像头进程已退出 ({})",
                    status
                )))
            }
            Err(e) => Err(CaptureError::Io(e)),
        }
    }
}

#[async_trait]
impl CameraStream for FfmpegStream {
    async fn grab_frame(&mut self) -> Result<DynamicImage, CaptureError> {
        self.ensure_running()?;

        // 帧文件可能正在被覆盖，解码失败时稍后重试
        let mut last_error = String::new();
        for _ in 0..3 {
            let bytes = tokio::fs::read(&self.frame_path).await?;
            match image::load_from_memory(&bytes) {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    last_error = e.to_string();
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
        Err(CaptureError::Encode(last_error))
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!("停止FFmpeg失败: {}", e);
            }
            info!("摄像头已释放");
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.stop();
    }
}
