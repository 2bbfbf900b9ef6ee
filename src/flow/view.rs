// 界面快照 - 从流程状态派生的只读数据，可跨任务传递

use super::state::{CaptureView, FlowState, Review};
use crate::capture::{EncodedImage, GuideOverlay};
use crate::models::{confidence_percent, MeasurementRecord};

/// 结果页展示的数据
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewView {
    /// 新估算可编辑，已保存记录只读
    pub editable: bool,
    pub record_id: Option<String>,
    pub width_cm: f64,
    pub height_cm: f64,
    pub location_name: String,
    pub confidence_percent: u32,
    pub reasoning: Option<String>,
    pub image_mime: String,
    pub image_len: usize,
    /// 已保存记录的测量时间
    pub measured_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewModel {
    Home {
        recent: Vec<MeasurementRecord>,
        total: usize,
    },
    Capture {
        live: bool,
        error: Option<String>,
        guide: GuideOverlay,
    },
    Processing,
    Review(ReviewView),
}

impl ViewModel {
    pub fn from_state(state: &FlowState, recent: &[MeasurementRecord], total: usize) -> Self {
        match state {
            FlowState::Idle => Self::Home {
                recent: recent.to_vec(),
                total,
            },
            FlowState::Capturing(view) => {
                let (live, error) = match view {
                    CaptureView::Opening { .. } => (false, None),
                    CaptureView::Live(_) | CaptureView::Shooting => (true, None),
                    CaptureView::Failed(e) => (false, Some(e.user_message().to_string())),
                };
                Self::Capture {
                    live,
                    error,
                    guide: GuideOverlay::default(),
                }
            }
            FlowState::Analyzing { .. } => Self::Processing,
            FlowState::Reviewing(Review::Editing(draft)) => Self::Review(ReviewView {
                editable: true,
                record_id: None,
                width_cm: draft.width().value(),
                height_cm: draft.height().value(),
                location_name: draft.location_name.clone(),
                confidence_percent: confidence_percent(draft.estimate.confidence),
                reasoning: Some(draft.estimate.reasoning.clone()),
                image_mime: draft.image.mime_type().to_string(),
                image_len: draft.image.len(),
                measured_at: None,
            }),
            FlowState::Reviewing(Review::Viewing(record)) => {
                let (image_mime, image_len) = match EncodedImage::from_data_url(&record.image_url) {
                    Ok(image) => (image.mime_type().to_string(), image.len()),
                    Err(_) => (String::new(), 0),
                };
                Self::Review(ReviewView {
                    editable: false,
                    record_id: Some(record.id.clone()),
                    width_cm: record.width_cm.value(),
                    height_cm: record.height_cm.value(),
                    location_name: record.location_name.clone(),
                    confidence_percent: record.confidence_percent(),
                    reasoning: None,
                    image_mime,
                    image_len,
                    measured_at: Some(record.formatted_time()),
                })
            }
        }
    }
}
