//! 应用程序初始化和启动
//!
//! 负责启动流程：
//! - 数据目录和配置加载
//! - 记录存储初始化
//! - 估算服务、摄像头、分享服务创建
//! - Flow Actor 启动

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::actors::{FlowActor, FlowHandle, FlowServices};
use crate::capture::{FfmpegCamera, StreamConstraints};
use crate::event_bus::EventBus;
use crate::flow::FlowMachine;
use crate::llm;
use crate::location::NoLocation;
use crate::models::ProviderKind;
use crate::settings::SettingsManager;
use crate::share::ShareService;
use crate::storage::{self, RecordStore};

/// 启动参数
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub data_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    /// 仅对本次运行生效，不写回配置
    pub provider: Option<ProviderKind>,
}

/// 运行中的应用
pub struct App {
    pub flow: FlowHandle,
    pub event_bus: Arc<EventBus>,
    pub settings: Arc<SettingsManager>,
}

/// 平台默认的数据目录
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join("Library/Application Support/smart-window")
    } else if cfg!(target_os = "windows") {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join("smart-window")
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".local/share/smart-window")
    }
}

impl AppOptions {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// 初始化各模块并启动 Flow Actor（需要在 tokio 运行时中调用）
pub async fn start(options: AppOptions) -> Result<App> {
    info!("初始化智能窗户测量...");

    let data_dir = options.resolved_data_dir();
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("创建数据目录失败: {:?}", data_dir))?;
    info!("数据目录: {:?}", data_dir);

    // 加载配置
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| data_dir.join("config.json"));
    let settings = Arc::new(SettingsManager::new(config_path).await?);
    let mut config = settings.get().await;
    if let Some(provider) = options.provider {
        info!("命令行指定估算提供商: {}", provider.as_str());
        config.llm_provider = provider;
    }

    // 初始化记录存储
    let backend = storage::open_backend(&config.storage, &data_dir).await?;
    let store = RecordStore::load(backend).await;

    // 初始化估算服务（共享HTTP客户端）
    let client = llm::build_http_client(config.request_timeout_secs)?;
    let provider = llm::build_provider(&config, client);
    if !provider.is_configured() {
        warn!(
            "未检测到 {} 环境变量，分析时会提示凭证错误",
            config.api_key_env
        );
    }

    let services = FlowServices {
        provider,
        camera: Arc::new(FfmpegCamera::new(config.camera.device.clone())),
        location: Arc::new(NoLocation),
        share: ShareService::detect(),
        constraints: StreamConstraints::from(&config.camera),
        jpeg_quality: config.camera.jpeg_quality,
        location_lookup: config.location_lookup,
    };

    let event_bus = Arc::new(EventBus::new(100));
    let machine = FlowMachine::new(store, config.history_limit);
    let (actor, flow) = FlowActor::new(machine, services, event_bus.clone());
    tokio::spawn(actor.run());

    if !flow.health_check().await {
        anyhow::bail!("Flow Actor 启动失败");
    }
    info!("初始化完成");

    Ok(App {
        flow,
        event_bus,
        settings,
    })
}
