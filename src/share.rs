// 分享服务 - 优先系统分享，不可用时复制到剪贴板

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const SHARE_TITLE: &str = "창문 사이즈 측정 결과";

/// 系统分享面板
#[async_trait]
pub trait NativeShare: Send + Sync {
    async fn share(&self, title: &str, text: &str) -> Result<()>;
}

/// 剪贴板
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn copy(&self, text: &str) -> Result<()>;
}

/// 分享结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    CopiedToClipboard,
    /// 两种方式都不可用，由界面直接显示文本
    Unavailable,
}

impl ShareOutcome {
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Shared => None,
            Self::CopiedToClipboard => Some("결과가 클립보드에 복사되었습니다."),
            Self::Unavailable => Some("공유 기능을 사용할 수 없습니다. 아래 내용을 복사해주세요."),
        }
    }
}

#[derive(Default)]
pub struct ShareService {
    native: Option<Box<dyn NativeShare>>,
    clipboard: Option<Box<dyn Clipboard>>,
}

impl ShareService {
    pub fn new(native: Option<Box<dyn NativeShare>>, clipboard: Option<Box<dyn Clipboard>>) -> Self {
        Self { native, clipboard }
    }

    /// 使用当前平台可用的剪贴板命令
    pub fn detect() -> Self {
        let clipboard = CommandClipboard::detect().map(|c| Box::new(c) as Box<dyn Clipboard>);
        if clipboard.is_none() {
            warn!("未找到可用的剪贴板命令，分享时将直接输出文本");
        }
        Self::new(None, clipboard)
    }

    pub async fn share(&self, text: &str) -> ShareOutcome {
        if let Some(native) = &self.native {
            match native.share(SHARE_TITLE, text).await {
                Ok(()) => return ShareOutcome::Shared,
                Err(e) => warn!("系统分享失败，改用剪贴板: {:#}", e),
            }
        }

        if let Some(clipboard) = &self.clipboard {
            match clipboard.copy(text).await {
                Ok(()) => {
                    info!("分享内容已复制到剪贴板");
                    return ShareOutcome::CopiedToClipboard;
                }
                Err(e) => warn!("复制到剪贴板失败: {:#}", e),
            }
        }

        ShareOutcome::Unavailable
    }
}

/// 通过外部命令写入剪贴板（pbcopy / wl-copy / xclip / clip）
pub struct CommandClipboard {
    program: PathBuf,
    args: Vec<&'static str>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<PathBuf>, args: Vec<&'static str>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn candidates() -> Vec<(&'static str, Vec<&'static str>)> {
        #[cfg(target_os = "macos")]
        let list = vec![("pbcopy", vec![])];

        #[cfg(target_os = "windows")]
        let list = vec![("clip", vec![])];

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let list = {
            let mut list = Vec::new();
            if std::env::var_os("WAYLAND_DISPLAY").is_some() {
                list.push(("wl-copy", vec![]));
            }
            list.push(("xclip", vec!["-selection", "clipboard"]));
            list.push(("xsel", vec!["--clipboard", "--input"]));
            list
        };

        list
    }

    /// 在 PATH 中查找第一个可用的剪贴板命令
    pub fn detect() -> Option<Self> {
        let paths = std::env::var_os("PATH")?;
        for (name, args) in Self::candidates() {
            for dir in std::env::split_paths(&paths) {
                let program = dir.join(if cfg!(windows) {
                    format!("{}.exe", name)
                } else {
                    name.to_string()
                });
                if program.is_file() {
                    debug!("使用剪贴板命令: {:?}", program);
                    return Some(Self::new(program, args));
                }
            }
        }
        None
    }
}

#[async_trait]
impl Clipboard for CommandClipboard {
    async fn copy(&self, text: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("启动剪贴板命令失败: {:?}", self.program))?;

        let mut stdin = child.stdin.take().context("无法写入剪贴板命令")?;
        stdin.write_all(text.as_bytes()).await?;
        drop(stdin);

        let status = child.wait().await?;
        if !status.success() {
            bail!("剪贴板命令退出异常: {}", status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClipboard {
        copied: std::sync::Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Clipboard for RecordingClipboard {
        async fn copy(&self, text: &str) -> Result<()> {
            self.copied.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct FailingShare;

    #[async_trait]
    impl NativeShare for FailingShare {
        async fn share(&self, _title: &str, _text: &str) -> Result<()> {
            bail!("share sheet dismissed")
        }
    }

    struct OkShare;

    #[async_trait]
    impl NativeShare for OkShare {
        async fn share(&self, title: &str, _text: &str) -> Result<()> {
            assert_eq!(title, SHARE_TITLE);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_native_share_preferred() {
        let service = ShareService::new(Some(Box::new(OkShare)), None);
        assert_eq!(service.share("text").await, ShareOutcome::Shared);
    }

    #[tokio::test]
    async fn test_falls_back_to_clipboard() {
        let clipboard = RecordingClipboard::default();
        let copied = clipboard.copied.clone();
        let service = ShareService::new(Some(Box::new(FailingShare)), Some(Box::new(clipboard)));

        let outcome = service.share("[창문 측정 결과]").await;
        assert_eq!(outcome, ShareOutcome::CopiedToClipboard);
        assert_eq!(
            outcome.user_message(),
            Some("결과가 클립보드에 복사되었습니다.")
        );
        assert_eq!(copied.lock().unwrap().as_slice(), ["[창문 측정 결과]"]);
    }

    #[tokio::test]
    async fn test_unavailable_without_targets() {
        let service = ShareService::default();
        assert_eq!(service.share("text").await, ShareOutcome::Unavailable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_clipboard_pipes_text() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clip.txt");
        let script = format!("cat > '{}'", out.display());
        let clipboard = CommandClipboard {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c", Box::leak(script.into_boxed_str())],
        };

        clipboard.copy("가로 120cm").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "가로 120cm");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_clipboard_reports_failure() {
        let clipboard = CommandClipboard::new("/bin/sh", vec!["-c", "exit 3"]);
        assert!(clipboard.copy("x").await.is_err());
    }
}
