// 事件总线 - 流程执行方与界面之间的解耦通信
//
// 使用 tokio::sync::broadcast 实现发布/订阅模式

use tokio::sync::broadcast;

use crate::flow::ViewModel;
use crate::llm::EstimationErrorKind;

/// 应用事件枚举
#[derive(Debug, Clone)]
pub enum AppEvent {
    // --- 界面事件 ---

    /// 流程状态变化后的最新界面快照
    StateChanged { view: ViewModel },

    // --- 分析事件 ---

    /// 已发起估算请求
    AnalysisStarted { ticket: u64 },

    /// 估算结果已进入结果页
    AnalysisCompleted { ticket: u64, confidence: f64 },

    /// 估算失败（需要阻塞式提示用户）
    AnalysisFailed {
        kind: EstimationErrorKind,
        message: String,
    },

    // --- 记录事件 ---

    /// 记录已保存
    RecordSaved { id: String },

    /// 记录已删除
    RecordDeleted { id: String },

    // --- 系统事件 ---

    /// 一般提示信息
    Notification { message: String },
}

/// 事件总线
///
/// 支持多个订阅者同时接收事件
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// 创建新的事件总线
    ///
    /// # 参数
    /// - `capacity`: 事件缓冲区大小
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件
    ///
    /// 没有订阅者时事件会被丢弃
    pub fn publish(&self, event: AppEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                tracing::trace!("事件已发布，订阅者数量: {}", receiver_count);
            }
            Err(_) => {
                tracing::trace!("事件已发布但无订阅者");
            }
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// 获取当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_basic() {
        let bus = EventBus::new(100);
        let mut receiver = bus.subscribe();

        bus.publish(AppEvent::RecordSaved {
            id: "abc".to_string(),
        });

        match receiver.recv().await {
            Ok(AppEvent::RecordSaved { id }) => assert_eq!(id, "abc"),
            _ => panic!("未收到预期事件"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(100);
        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(AppEvent::AnalysisFailed {
            kind: EstimationErrorKind::Credential,
            message: "missing".to_string(),
        });

        // 两个订阅者都应该收到事件
        assert!(receiver1.try_recv().is_ok());
        assert!(receiver2.try_recv().is_ok());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(AppEvent::Notification {
            message: "nobody listening".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
