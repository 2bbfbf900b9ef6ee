// 位置查询 - 为结果页预填当前位置名称（尽力而为）

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// 位置提供者
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// 当前位置的可读名称，无法获取时返回 None
    async fn current_location_name(&self) -> Option<String>;
}

/// 不提供位置（默认）
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_location_name(&self) -> Option<String> {
        None
    }
}

/// 固定的位置名称
pub struct FixedLocation(pub String);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location_name(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// 带超时的位置查询
pub async fn lookup_with_timeout(
    provider: &dyn LocationProvider,
    timeout: Duration,
) -> Option<String> {
    match tokio::time::timeout(timeout, provider.current_location_name()).await {
        Ok(name) => {
            let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
            debug!("位置查询结果: {:?}", name);
            name
        }
        Err(_) => {
            warn!("位置查询超时 ({}ms)", timeout.as_millis());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowLocation;

    #[async_trait]
    impl LocationProvider for SlowLocation {
        async fn current_location_name(&self) -> Option<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Some("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_no_location_returns_none() {
        assert!(lookup_with_timeout(&NoLocation, Duration::from_secs(1))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_fixed_location_is_trimmed() {
        let provider = FixedLocation("  거실  ".to_string());
        assert_eq!(
            lookup_with_timeout(&provider, Duration::from_secs(1)).await.as_deref(),
            Some("거실")
        );
        let blank = FixedLocation("   ".to_string());
        assert!(lookup_with_timeout(&blank, Duration::from_secs(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out() {
        assert!(lookup_with_timeout(&SlowLocation, Duration::from_millis(50))
            .await
            .is_none());
    }
}
