// 流程状态机 - 持有当前状态和注入的记录存储
//
// 所有转换在同一个执行任务里顺序调用，副作用以 Effect 返回给调用方执行

use std::mem;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{CaptureView, FlowState, Review, ReviewDraft};
use super::view::ViewModel;
use super::{Effect, FlowError};
use crate::capture::{CameraSession, CaptureError, EncodedImage};
use crate::event_bus::AppEvent;
use crate::llm::{EstimationError, EstimationResult};
use crate::models::{Centimeters, MeasurementRecord};
use crate::storage::{RecordStore, StoreError};

const PERSIST_FAILED_MESSAGE: &str =
    "기록을 기기에 저장하지 못했습니다. 다음 변경 시 다시 저장됩니다.";

pub struct FlowMachine {
    state: FlowState,
    store: RecordStore,
    next_ticket: u64,
    next_epoch: u64,
    /// 首页展示的最近记录数
    history_limit: usize,
}

impl FlowMachine {
    pub fn new(store: RecordStore, history_limit: usize) -> Self {
        Self {
            state: FlowState::Idle,
            store,
            next_ticket: 0,
            next_epoch: 0,
            history_limit,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// 首页的最近记录
    pub fn recent(&self) -> &[MeasurementRecord] {
        self.store.recent(self.history_limit)
    }

    pub fn view(&self) -> ViewModel {
        ViewModel::from_state(&self.state, self.recent(), self.store.len())
    }

    fn invalid(&self, action: &'static str) -> FlowError {
        match self.state {
            FlowState::Analyzing { .. } => FlowError::Busy,
            _ => FlowError::InvalidTransition {
                state: self.state.name(),
                action,
            },
        }
    }

    fn fresh_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn fresh_record_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.store.contains(&id) {
                return id;
            }
        }
    }

    // ==================== 拍摄 ====================

    /// 打开摄像头
    pub fn begin_capture(&mut self) -> Result<Vec<Effect>, FlowError> {
        if !self.state.is_idle() {
            return Err(self.invalid("begin_capture"));
        }
        let ticket = self.fresh_ticket();
        self.state = FlowState::Capturing(CaptureView::Opening { ticket });
        info!("开始拍摄, ticket={}", ticket);
        Ok(vec![Effect::OpenCamera { ticket }])
    }

    fn is_opening(&self, ticket: u64) -> bool {
        matches!(
            self.state,
            FlowState::Capturing(CaptureView::Opening { ticket: current }) if current == ticket
        )
    }

    /// 摄像头已打开；已离开拍摄页时立即释放
    pub fn camera_opened(&mut self, ticket: u64, session: CameraSession) {
        if self.is_opening(ticket) {
            self.state = FlowState::Capturing(CaptureView::Live(session));
        } else {
            debug!("丢弃过期的摄像头会话, ticket={}", ticket);
            session.release();
        }
    }

    pub fn camera_failed(&mut self, ticket: u64, error: CaptureError) {
        if self.is_opening(ticket) {
            warn!("摄像头打开失败: {}", error);
            self.state = FlowState::Capturing(CaptureView::Failed(error));
        } else {
            debug!("忽略过期的摄像头错误: {}", error);
        }
    }

    /// 取景中取出摄像头会话，状态转为拍摄中
    pub fn take_capture(&mut self) -> Result<CameraSession, FlowError> {
        match mem::take(&mut self.state) {
            FlowState::Capturing(CaptureView::Live(session)) => {
                self.state = FlowState::Capturing(CaptureView::Shooting);
                Ok(session)
            }
            other => {
                self.state = other;
                Err(self.invalid("take_capture"))
            }
        }
    }

    /// 快门：取当前画面并进入分析，无论成功与否都释放摄像头
    pub async fn shutter(&mut self) -> Result<Vec<Effect>, FlowError> {
        let mut session = self.take_capture()?;
        let result = session.capture_still().await;
        session.release();

        match result {
            Ok(image) => self.capture_succeeded(image),
            Err(e) => {
                self.capture_failed(e)?;
                Ok(Vec::new())
            }
        }
    }

    /// 拍摄得到图片（摄像头随旧状态一起释放）
    pub fn capture_succeeded(&mut self, image: EncodedImage) -> Result<Vec<Effect>, FlowError> {
        if !matches!(self.state, FlowState::Capturing(_)) {
            return Err(self.invalid("capture_succeeded"));
        }
        Ok(self.start_analysis(image))
    }

    pub fn capture_failed(&mut self, error: CaptureError) -> Result<(), FlowError> {
        if !matches!(self.state, FlowState::Capturing(_)) {
            return Err(self.invalid("capture_failed"));
        }
        warn!("拍摄失败: {}", error);
        self.state = FlowState::Capturing(CaptureView::Failed(error));
        Ok(())
    }

    // ==================== 分析 ====================

    /// 上传图片，跳过拍摄直接分析
    pub fn submit_upload(&mut self, image: EncodedImage) -> Result<Vec<Effect>, FlowError> {
        if !self.state.is_idle() {
            return Err(self.invalid("submit_upload"));
        }
        Ok(self.start_analysis(image))
    }

    fn start_analysis(&mut self, image: EncodedImage) -> Vec<Effect> {
        let ticket = self.fresh_ticket();
        info!("开始分析图片: {:?}, ticket={}", image, ticket);
        self.state = FlowState::Analyzing {
            image: image.clone(),
            ticket,
        };
        vec![
            Effect::Publish(AppEvent::AnalysisStarted { ticket }),
            Effect::RunEstimation { ticket, image },
        ]
    }

    fn is_current_analysis(&self, ticket: u64) -> bool {
        matches!(
            self.state,
            FlowState::Analyzing { ticket: current, .. } if current == ticket
        )
    }

    /// 估算成功，进入可编辑的结果页
    pub fn analysis_succeeded(&mut self, ticket: u64, estimate: EstimationResult) -> Vec<Effect> {
        if !self.is_current_analysis(ticket) {
            debug!("忽略过期的估算结果, ticket={}", ticket);
            return Vec::new();
        }
        let image = match mem::take(&mut self.state) {
            FlowState::Analyzing { image, .. } => image,
            other => {
                self.state = other;
                return Vec::new();
            }
        };

        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let confidence = estimate.confidence;
        info!(
            "估算完成: {}x{}cm, 置信度 {}",
            estimate.width, estimate.height, confidence
        );
        self.state = FlowState::Reviewing(Review::Editing(ReviewDraft::new(
            image, estimate, epoch,
        )));

        vec![
            Effect::Publish(AppEvent::AnalysisCompleted { ticket, confidence }),
            Effect::LookupLocation { epoch },
        ]
    }

    /// 估算失败，回到首页，记录列表不变
    pub fn analysis_failed(&mut self, ticket: u64, error: &EstimationError) -> Vec<Effect> {
        if !self.is_current_analysis(ticket) {
            debug!("忽略过期的估算错误, ticket={}: {}", ticket, error);
            return Vec::new();
        }
        warn!("估算失败: {}", error);
        self.state = FlowState::Idle;
        vec![Effect::Publish(AppEvent::AnalysisFailed {
            kind: error.kind(),
            message: error.user_message().to_string(),
        })]
    }

    // ==================== 结果编辑 ====================

    fn draft_mut(&mut self, action: &'static str) -> Result<&mut ReviewDraft, FlowError> {
        let err = self.invalid(action);
        match &mut self.state {
            FlowState::Reviewing(Review::Editing(draft)) => Ok(draft),
            _ => Err(err),
        }
    }

    pub fn set_width(&mut self, value: f64) -> Result<(), FlowError> {
        let draft = self.draft_mut("set_width")?;
        draft.estimate.width = Centimeters::new(value).ok_or(FlowError::InvalidDimension(value))?;
        Ok(())
    }

    pub fn set_height(&mut self, value: f64) -> Result<(), FlowError> {
        let draft = self.draft_mut("set_height")?;
        draft.estimate.height =
            Centimeters::new(value).ok_or(FlowError::InvalidDimension(value))?;
        Ok(())
    }

    pub fn set_location(&mut self, name: &str) -> Result<(), FlowError> {
        let draft = self.draft_mut("set_location")?;
        draft.location_name = name.to_string();
        draft.location_edited = true;
        Ok(())
    }

    /// 位置查询结果：仅在同一草稿且用户未手动填写时采用
    pub fn location_resolved(&mut self, epoch: u64, name: Option<String>) -> bool {
        let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
            return false;
        };
        match &mut self.state {
            FlowState::Reviewing(Review::Editing(draft))
                if draft.epoch == epoch && !draft.location_edited =>
            {
                debug!("已填入查询到的位置: {}", name);
                draft.location_name = name;
                true
            }
            _ => {
                debug!("丢弃过期的位置结果, epoch={}", epoch);
                false
            }
        }
    }

    // ==================== 保存与记录 ====================

    /// 保存草稿为记录并回到首页
    pub async fn save(&mut self) -> Result<Vec<Effect>, FlowError> {
        self.save_at(Utc::now().timestamp_millis()).await
    }

    async fn save_at(&mut self, now_ms: i64) -> Result<Vec<Effect>, FlowError> {
        let draft = match mem::take(&mut self.state) {
            FlowState::Reviewing(Review::Editing(draft)) => draft,
            other => {
                self.state = other;
                return Err(self.invalid("save"));
            }
        };

        // 新记录的时间不早于当前最新记录
        let timestamp = self
            .store
            .newest_timestamp()
            .map_or(now_ms, |newest| newest.max(now_ms));
        let id = self.fresh_record_id();
        let record = draft.to_record(id.clone(), timestamp);

        let mut effects = vec![Effect::Publish(AppEvent::RecordSaved { id: id.clone() })];
        match self.store.prepend(record).await {
            Ok(()) => info!("记录已保存: {}", id),
            Err(StoreError::Persist(e)) => {
                warn!("记录已加入列表但写入存储失败: {:#}", e);
                effects.push(Effect::Publish(AppEvent::Notification {
                    message: PERSIST_FAILED_MESSAGE.to_string(),
                }));
            }
            Err(e) => {
                self.state = FlowState::Reviewing(Review::Editing(draft));
                return Err(e.into());
            }
        }
        Ok(effects)
    }

    /// 打开已保存记录的只读结果页
    pub fn open_record(&mut self, id: &str) -> Result<(), FlowError> {
        if !self.state.is_idle() {
            return Err(self.invalid("open_record"));
        }
        let record = self
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| FlowError::RecordNotFound(id.to_string()))?;
        self.state = FlowState::Reviewing(Review::Viewing(record));
        Ok(())
    }

    /// 按ID删除记录；未确认时不做任何改变
    pub async fn delete(&mut self, id: &str, confirmed: bool) -> Result<Vec<Effect>, FlowError> {
        if matches!(self.state, FlowState::Analyzing { .. }) {
            return Err(FlowError::Busy);
        }
        if !confirmed {
            debug!("用户取消删除: {}", id);
            return Ok(Vec::new());
        }

        let mut effects = Vec::new();
        match self.store.remove(id).await {
            Ok(true) => {
                info!("记录已删除: {}", id);
                effects.push(Effect::Publish(AppEvent::RecordDeleted { id: id.to_string() }));
            }
            Ok(false) => debug!("记录不存在，无需删除: {}", id),
            Err(e) => {
                warn!("记录已从列表移除但写入存储失败: {}", e);
                effects.push(Effect::Publish(AppEvent::RecordDeleted { id: id.to_string() }));
                effects.push(Effect::Publish(AppEvent::Notification {
                    message: PERSIST_FAILED_MESSAGE.to_string(),
                }));
            }
        }
        self.state = FlowState::Idle;
        Ok(effects)
    }

    /// 结果页上的删除：已保存记录按ID删除，未保存的草稿直接丢弃
    pub async fn delete_current(&mut self, confirmed: bool) -> Result<Vec<Effect>, FlowError> {
        let target = match &self.state {
            FlowState::Reviewing(Review::Viewing(record)) => Some(record.id.clone()),
            FlowState::Reviewing(Review::Editing(_)) => None,
            _ => return Err(self.invalid("delete")),
        };
        match target {
            Some(id) => self.delete(&id, confirmed).await,
            None => {
                if confirmed {
                    info!("丢弃未保存的估算结果");
                    self.state = FlowState::Idle;
                }
                Ok(Vec::new())
            }
        }
    }

    /// 当前结果页的分享文本
    pub fn share_text(&self) -> Result<String, FlowError> {
        match &self.state {
            FlowState::Reviewing(Review::Viewing(record)) => Ok(record.share_text()),
            FlowState::Reviewing(Review::Editing(draft)) => Ok(draft
                .to_record(String::new(), Utc::now().timestamp_millis())
                .share_text()),
            _ => Err(self.invalid("share")),
        }
    }

    /// 返回首页，丢弃临时状态并释放摄像头
    pub fn cancel(&mut self) -> Vec<Effect> {
        let previous = mem::take(&mut self.state);
        match previous {
            FlowState::Idle => Vec::new(),
            FlowState::Analyzing { ticket, .. } => {
                info!("取消分析, ticket={}", ticket);
                vec![Effect::AbortEstimation]
            }
            other => {
                debug!("返回首页: {}", other.name());
                Vec::new()
            }
        }
    }
}
