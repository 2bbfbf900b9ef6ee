// Flow Actor - 在单个任务中驱动流程状态机
//
// 用户命令经 mpsc 顺序处理；估算、开摄像头、位置查询在后台任务中执行，
// 完成后以内部消息回到 Actor，由 ticket/epoch 判断是否过期

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::capture::{
    read_image_file, CameraDevice, CameraSession, CameraStream, CaptureError, EncodedImage,
    StreamConstraints,
};
use crate::event_bus::{AppEvent, EventBus};
use crate::flow::{Effect, FlowError, FlowMachine, ViewModel};
use crate::llm::{EstimationError, EstimationProvider, EstimationResult};
use crate::location::{lookup_with_timeout, LocationProvider};
use crate::share::{ShareOutcome, ShareService};

/// 位置查询超时时间
const LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

type Reply<T> = oneshot::Sender<Result<T, FlowError>>;

/// 流程命令
pub enum FlowCommand {
    /// 打开摄像头
    BeginCapture { reply: Reply<()> },

    /// 快门
    Shutter { reply: Reply<()> },

    /// 上传图片
    Upload {
        image: EncodedImage,
        reply: Reply<()>,
    },

    SetWidth { value: f64, reply: Reply<()> },
    SetHeight { value: f64, reply: Reply<()> },
    SetLocation { name: String, reply: Reply<()> },

    /// 保存当前草稿
    Save { reply: Reply<()> },

    /// 打开已保存记录
    Open { id: String, reply: Reply<()> },

    /// 删除当前结果页的内容
    DeleteCurrent { confirmed: bool, reply: Reply<()> },

    /// 按ID删除记录
    Delete {
        id: String,
        confirmed: bool,
        reply: Reply<()>,
    },

    /// 分享当前结果
    Share { reply: Reply<(String, ShareOutcome)> },

    /// 返回首页
    Cancel { reply: Reply<()> },

    /// 获取界面快照
    Snapshot { reply: oneshot::Sender<ViewModel> },

    /// 健康检查
    HealthCheck { reply: oneshot::Sender<()> },
}

/// 后台任务完成后回送的内部消息
enum Completion {
    CameraOpened {
        ticket: u64,
        result: Result<Box<dyn CameraStream>, CaptureError>,
    },
    AnalysisFinished {
        ticket: u64,
        result: Result<EstimationResult, EstimationError>,
    },
    LocationResolved {
        epoch: u64,
        name: Option<String>,
    },
}

/// Actor 依赖的外部服务
pub struct FlowServices {
    pub provider: Arc<dyn EstimationProvider>,
    pub camera: Arc<dyn CameraDevice>,
    pub location: Arc<dyn LocationProvider>,
    pub share: ShareService,
    pub constraints: StreamConstraints,
    pub jpeg_quality: u8,
    /// 是否在结果页预填位置
    pub location_lookup: bool,
}

/// Flow Actor（直接持有状态机，无需锁）
pub struct FlowActor {
    receiver: mpsc::Receiver<FlowCommand>,
    completions: mpsc::UnboundedReceiver<Completion>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    machine: FlowMachine,
    services: FlowServices,
    event_bus: Arc<EventBus>,
    analysis_task: Option<JoinHandle<()>>,
    last_view: Option<ViewModel>,
}

impl FlowActor {
    /// 创建新的Actor
    pub fn new(
        machine: FlowMachine,
        services: FlowServices,
        event_bus: Arc<EventBus>,
    ) -> (Self, FlowHandle) {
        let (sender, receiver) = mpsc::channel(32);
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let actor = Self {
            receiver,
            completions,
            completion_tx,
            machine,
            services,
            event_bus,
            analysis_task: None,
            last_view: None,
        };
        (actor, FlowHandle { sender })
    }

    /// 运行Actor，所有 Handle 被丢弃后退出
    pub async fn run(mut self) {
        tracing::info!("Flow Actor 已启动");
        self.publish_view();

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(done) = self.completions.recv() => self.handle_completion(done),
            }
            self.publish_view();
        }

        if let Some(task) = self.analysis_task.take() {
            task.abort();
        }
        // 退出前释放摄像头
        self.machine.cancel();
        tracing::info!("Flow Actor 已停止");
    }

    async fn handle_command(&mut self, cmd: FlowCommand) {
        match cmd {
            FlowCommand::BeginCapture { reply } => {
                let result = self.machine.begin_capture();
                self.finish(result, reply);
            }

            FlowCommand::Shutter { reply } => {
                let result = self.machine.shutter().await;
                self.finish(result, reply);
            }

            FlowCommand::Upload { image, reply } => {
                let result = self.machine.submit_upload(image);
                self.finish(result, reply);
            }

            FlowCommand::SetWidth { value, reply } => {
                let _ = reply.send(self.machine.set_width(value));
            }

            FlowCommand::SetHeight { value, reply } => {
                let _ = reply.send(self.machine.set_height(value));
            }

            FlowCommand::SetLocation { name, reply } => {
                let _ = reply.send(self.machine.set_location(&name));
            }

            FlowCommand::Save { reply } => {
                let result = self.machine.save().await;
                self.finish(result, reply);
            }

            FlowCommand::Open { id, reply } => {
                let _ = reply.send(self.machine.open_record(&id));
            }

            FlowCommand::DeleteCurrent { confirmed, reply } => {
                let result = self.machine.delete_current(confirmed).await;
                self.finish(result, reply);
            }

            FlowCommand::Delete {
                id,
                confirmed,
                reply,
            } => {
                let result = self.machine.delete(&id, confirmed).await;
                self.finish(result, reply);
            }

            FlowCommand::Share { reply } => {
                let result = match self.machine.share_text() {
                    Ok(text) => {
                        let outcome = self.services.share.share(&text).await;
                        Ok((text, outcome))
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }

            FlowCommand::Cancel { reply } => {
                let effects = self.machine.cancel();
                self.run_effects(effects);
                let _ = reply.send(Ok(()));
            }

            FlowCommand::Snapshot { reply } => {
                let _ = reply.send(self.machine.view());
            }

            FlowCommand::HealthCheck { reply } => {
                // 立即响应，表明Actor正常运行
                let _ = reply.send(());
            }
        }
    }

    /// 执行副作用并回复调用方
    fn finish(&mut self, result: Result<Vec<Effect>, FlowError>, reply: Reply<()>) {
        let result = result.map(|effects| self.run_effects(effects));
        let _ = reply.send(result);
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::CameraOpened { ticket, result } => match result {
                Ok(stream) => {
                    let session = CameraSession::new(stream, self.services.jpeg_quality);
                    self.machine.camera_opened(ticket, session);
                }
                Err(e) => self.machine.camera_failed(ticket, e),
            },

            Completion::AnalysisFinished { ticket, result } => {
                let effects = match result {
                    Ok(estimate) => self.machine.analysis_succeeded(ticket, estimate),
                    Err(e) => self.machine.analysis_failed(ticket, &e),
                };
                self.run_effects(effects);
            }

            Completion::LocationResolved { epoch, name } => {
                self.machine.location_resolved(epoch, name);
            }
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenCamera { ticket } => {
                    let camera = self.services.camera.clone();
                    let constraints = self.services.constraints.clone();
                    let tx = self.completion_tx.clone();
                    tokio::spawn(async move {
                        let result = camera.open(&constraints).await;
                        // Actor 已停止时流随消息一起被丢弃
                        let _ = tx.send(Completion::CameraOpened { ticket, result });
                    });
                }

                Effect::RunEstimation { ticket, image } => {
                    if let Some(task) = self.analysis_task.take() {
                        task.abort();
                    }
                    let provider = self.services.provider.clone();
                    let tx = self.completion_tx.clone();
                    self.analysis_task = Some(tokio::spawn(async move {
                        let result = provider.estimate(&image).await;
                        let _ = tx.send(Completion::AnalysisFinished { ticket, result });
                    }));
                }

                Effect::AbortEstimation => {
                    if let Some(task) = self.analysis_task.take() {
                        task.abort();
                        tracing::info!("已中止进行中的估算请求");
                    }
                }

                Effect::LookupLocation { epoch } => {
                    if !self.services.location_lookup {
                        continue;
                    }
                    let location = self.services.location.clone();
                    let tx = self.completion_tx.clone();
                    tokio::spawn(async move {
                        let name = lookup_with_timeout(location.as_ref(), LOCATION_TIMEOUT).await;
                        let _ = tx.send(Completion::LocationResolved { epoch, name });
                    });
                }

                Effect::Publish(event) => self.event_bus.publish(event),
            }
        }
    }

    /// 界面快照变化时发布
    fn publish_view(&mut self) {
        let view = self.machine.view();
        if self.last_view.as_ref() != Some(&view) {
            self.last_view = Some(view.clone());
            self.event_bus.publish(AppEvent::StateChanged { view });
        }
    }
}

/// Flow Handle（用于与Actor通信，可克隆）
#[derive(Clone)]
pub struct FlowHandle {
    sender: mpsc::Sender<FlowCommand>,
}

impl FlowHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, FlowError>>) -> FlowCommand,
    ) -> Result<T, FlowError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| FlowError::Unavailable)?;
        rx.await.map_err(|_| FlowError::Unavailable)?
    }

    pub async fn begin_capture(&self) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::BeginCapture { reply }).await
    }

    pub async fn shutter(&self) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::Shutter { reply }).await
    }

    pub async fn upload(&self, image: EncodedImage) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::Upload { image, reply }).await
    }

    /// 读取本地图片并上传
    pub async fn upload_file(&self, path: PathBuf) -> Result<(), FlowError> {
        let image = read_image_file(&path).await?;
        self.upload(image).await
    }

    pub async fn set_width(&self, value: f64) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::SetWidth { value, reply }).await
    }

    pub async fn set_height(&self, value: f64) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::SetHeight { value, reply }).await
    }

    pub async fn set_location(&self, name: String) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::SetLocation { name, reply }).await
    }

    pub async fn save(&self) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::Save { reply }).await
    }

    pub async fn open(&self, id: String) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::Open { id, reply }).await
    }

    pub async fn delete_current(&self, confirmed: bool) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::DeleteCurrent { confirmed, reply })
            .await
    }

    pub async fn delete(&self, id: String, confirmed: bool) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::Delete {
            id,
            confirmed,
            reply,
        })
        .await
    }

    /// 分享当前结果，返回分享文本和分享方式
    pub async fn share(&self) -> Result<(String, ShareOutcome), FlowError> {
        self.request(|reply| FlowCommand::Share { reply }).await
    }

    pub async fn cancel(&self) -> Result<(), FlowError> {
        self.request(|reply| FlowCommand::Cancel { reply }).await
    }

    /// 获取界面快照
    pub async fn snapshot(&self) -> Result<ViewModel, FlowError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(FlowCommand::Snapshot { reply })
            .await
            .map_err(|_| FlowError::Unavailable)?;
        rx.await.map_err(|_| FlowError::Unavailable)
    }

    /// 健康检查（5秒超时）
    pub async fn health_check(&self) -> bool {
        let (reply, rx) = oneshot::channel();

        if self
            .sender
            .send(FlowCommand::HealthCheck { reply })
            .await
            .is_err()
        {
            tracing::warn!("Flow Actor 健康检查失败: 通道已关闭");
            return false;
        }

        match tokio::time::timeout(Duration::from_secs(5), rx).await {
            Ok(Ok(())) => {
                tracing::debug!("Flow Actor 健康检查成功");
                true
            }
            Ok(Err(_)) => {
                tracing::warn!("Flow Actor 健康检查失败: 响应通道已关闭");
                false
            }
            Err(_) => {
                tracing::warn!("Flow Actor 健康检查超时");
                false
            }
        }
    }
}
