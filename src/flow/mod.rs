// 流程模块 - 拍摄、分析、确认到保存的状态机

pub mod machine;
pub mod state;
pub mod view;

pub use machine::FlowMachine;
pub use state::{CaptureView, FlowState, Review, ReviewDraft};
pub use view::{ReviewView, ViewModel};

use thiserror::Error;

use crate::capture::{CaptureError, EncodedImage};
use crate::event_bus::AppEvent;
use crate::storage::StoreError;

/// 流程操作错误（状态保持不变）
#[derive(Debug, Error)]
pub enum FlowError {
    /// 已有估算请求在进行中
    #[error("正在分析中，请稍候")]
    Busy,
    #[error("当前状态 {state} 不支持操作 {action}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("尺寸必须为有限正数: {0}")]
    InvalidDimension(f64),
    #[error("记录不存在: {0}")]
    RecordNotFound(String),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// 流程执行任务已停止
    #[error("流程服务不可用")]
    Unavailable,
}

/// 状态转换后需要调用方执行的副作用
#[derive(Debug)]
pub enum Effect {
    /// 打开摄像头，结果带着 ticket 回报
    OpenCamera { ticket: u64 },
    /// 对图片发起一次估算
    RunEstimation { ticket: u64, image: EncodedImage },
    /// 中止进行中的估算
    AbortEstimation,
    /// 尽力查询当前位置
    LookupLocation { epoch: u64 },
    /// 向订阅者发布事件
    Publish(AppEvent),
}
