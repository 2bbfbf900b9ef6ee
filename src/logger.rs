// 日志系统 - 按天轮转的日志文件，可选同时输出到终端

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

/// 默认日志目录
pub fn default_log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// 初始化日志系统
///
/// 终端界面占用 stdout，终端日志写到 stderr，且只在 verbose 时开启
pub fn init(log_dir: &Path, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("创建日志目录失败: {:?}", log_dir))?;

    // 配置日志输出到文件（每天轮转）
    let file_appender = tracing_appender::rolling::daily(log_dir, "smart-window.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // 保持 guard 在整个程序生命周期
    std::mem::forget(guard);

    let writer = if verbose {
        BoxMakeWriter::new(std::io::stderr.and(non_blocking))
    } else {
        BoxMakeWriter::new(non_blocking)
    };

    // 使用本地时区
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_timer(timer)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!("日志文件位置: {:?}", log_dir);
    Ok(())
}
