// Actor模块 - 使用Actor模式管理并发状态
//
// 流程状态机只由一个任务持有，通过消息传递访问，无需锁

pub mod flow_actor;

pub use flow_actor::{FlowActor, FlowCommand, FlowHandle, FlowServices};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::camera::fake::FakeCamera;
    use crate::capture::StreamConstraints;
    use crate::event_bus::EventBus;
    use crate::flow::FlowMachine;
    use crate::llm::GeminiProvider;
    use crate::location::NoLocation;
    use crate::models::GeminiConfig;
    use crate::share::ShareService;
    use crate::storage::{MemoryBackend, RecordStore};
    use std::sync::Arc;

    async fn create_actor() -> (FlowActor, FlowHandle) {
        let store = RecordStore::load(Arc::new(MemoryBackend::new())).await;
        let provider = GeminiProvider::new(reqwest::Client::new(), &GeminiConfig::default(), None);
        let services = FlowServices {
            provider: Arc::new(provider),
            camera: Arc::new(FakeCamera::default()),
            location: Arc::new(NoLocation),
            share: ShareService::default(),
            constraints: StreamConstraints::default(),
            jpeg_quality: 80,
            location_lookup: false,
        };
        FlowActor::new(FlowMachine::new(store, 5), services, Arc::new(EventBus::new(16)))
    }

    #[tokio::test]
    async fn test_flow_actor_health_check() {
        let (actor, handle) = create_actor().await;

        // 在后台运行Actor
        tokio::spawn(async move {
            actor.run().await;
        });

        let is_healthy = handle.health_check().await;
        assert!(is_healthy, "FlowActor应该是健康的");
    }

    #[tokio::test]
    async fn test_health_check_fails_when_actor_stopped() {
        // 创建Actor但不运行，模拟Actor无响应
        let (actor, handle) = create_actor().await;
        drop(actor);

        let is_healthy = handle.health_check().await;
        assert!(!is_healthy, "停止的Actor应该健康检查失败");
    }
}
