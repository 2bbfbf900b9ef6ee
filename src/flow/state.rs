// 流程状态 - 用带数据的枚举描述各阶段，非法组合无法表示

use crate::capture::{CameraSession, CaptureError, EncodedImage};
use crate::models::{Centimeters, EstimationResult, MeasurementRecord};

/// 拍摄阶段的子状态
#[derive(Debug)]
pub enum CaptureView {
    /// 正在打开摄像头
    Opening { ticket: u64 },
    /// 取景中，持有摄像头会话
    Live(CameraSession),
    /// 快门已按下，会话已取出
    Shooting,
    /// 摄像头不可用或拍摄失败，等待用户返回
    Failed(CaptureError),
}

/// 保存前可编辑的估算结果
#[derive(Debug, Clone)]
pub struct ReviewDraft {
    pub image: EncodedImage,
    pub estimate: EstimationResult,
    pub location_name: String,
    /// 用户是否手动填写过位置
    pub location_edited: bool,
    /// 草稿代次，用于丢弃过期的位置查询结果
    pub epoch: u64,
}

impl ReviewDraft {
    pub fn new(image: EncodedImage, estimate: EstimationResult, epoch: u64) -> Self {
        Self {
            image,
            estimate,
            location_name: String::new(),
            location_edited: false,
            epoch,
        }
    }

    pub fn width(&self) -> Centimeters {
        self.estimate.width
    }

    pub fn height(&self) -> Centimeters {
        self.estimate.height
    }

    /// 由草稿生成记录（ID 和时间由调用方分配）
    pub fn to_record(&self, id: String, timestamp: i64) -> MeasurementRecord {
        MeasurementRecord {
            id,
            width_cm: self.estimate.width,
            height_cm: self.estimate.height,
            location_name: MeasurementRecord::normalize_location(&self.location_name),
            image_url: self.image.to_data_url(),
            timestamp,
            notes: None,
            confidence: self.estimate.confidence,
        }
    }
}

/// 结果页：新估算的草稿或已保存记录的只读视图
#[derive(Debug)]
pub enum Review {
    Editing(ReviewDraft),
    Viewing(MeasurementRecord),
}

/// 应用流程状态
#[derive(Debug)]
pub enum FlowState {
    Idle,
    Capturing(CaptureView),
    Analyzing { image: EncodedImage, ticket: u64 },
    Reviewing(Review),
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing(CaptureView::Opening { .. }) => "capturing.opening",
            Self::Capturing(CaptureView::Live(_)) => "capturing.live",
            Self::Capturing(CaptureView::Shooting) => "capturing.shooting",
            Self::Capturing(CaptureView::Failed(_)) => "capturing.failed",
            Self::Analyzing { .. } => "analyzing",
            Self::Reviewing(Review::Editing(_)) => "reviewing.editing",
            Self::Reviewing(Review::Viewing(_)) => "reviewing.viewing",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::Idle
    }
}
