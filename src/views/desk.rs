//! Wiring from [`ClientConfig`] to the services and screens.

use std::sync::Arc;

use crate::client::{ApiClient, RequestCache, RequestContext, ServiceResult, StaffService, TaskService};
use crate::config::{clamp_cache_ttl, ClientConfig};

use super::{StaffDirectory, TaskBoard};

/// Services for one session, sharing a transport and the task cache.
#[derive(Clone)]
pub struct Desk {
    staff: StaffService,
    tasks: TaskService,
    page_size: usize,
}

impl Desk {
    /// Build an HTTP client for `config` and the services on top of it.
    pub fn from_config(config: &ClientConfig, context: RequestContext) -> ServiceResult<Self> {
        let client = ApiClient::from_config(config, context)?;
        Ok(Self::with_client(client, config))
    }

    /// Services over an existing client. The cache TTL is clamped to the supported range.
    pub fn with_client(client: ApiClient, config: &ClientConfig) -> Self {
        let ttl_ms = u64::try_from(config.cache_ttl.as_millis()).unwrap_or(u64::MAX);
        let cache = Arc::new(RequestCache::new(clamp_cache_ttl(ttl_ms)));
        tracing::debug!(
            cache_ttl_ms = ttl_ms,
            page_size = config.page_size,
            "Client services ready"
        );
        Self {
            staff: StaffService::new(client.clone()),
            tasks: TaskService::new(client, cache),
            page_size: config.page_size.max(1),
        }
    }

    pub fn staff(&self) -> &StaffService {
        &self.staff
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn directory(&self) -> StaffDirectory {
        StaffDirectory::new(self.staff.clone(), self.page_size)
    }

    pub fn board(&self) -> TaskBoard {
        TaskBoard::new(self.tasks.clone(), self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::FakeTransport;
    use std::time::Duration;

    fn desk(cache_ttl: Duration, page_size: usize) -> Desk {
        let transport = Arc::new(FakeTransport::replying(200, r#"{"success":true,"data":[]}"#));
        let client = ApiClient::new(transport, RequestContext::new("tok", "acme"));
        let config = ClientConfig {
            cache_ttl,
            page_size,
            ..ClientConfig::default()
        };
        Desk::with_client(client, &config)
    }

    #[test]
    fn test_cache_ttl_is_clamped() {
        let long = desk(Duration::from_secs(60), 10);
        assert_eq!(
            long.tasks().cache().ttl_for("tasks.getAllTasks"),
            Duration::from_secs(5)
        );

        let short = desk(Duration::from_millis(500), 10);
        assert_eq!(
            short.tasks().cache().ttl_for("tasks.getAllTasks"),
            Duration::from_secs(2)
        );

        let default = desk(ClientConfig::default().cache_ttl, 10);
        assert_eq!(
            default.tasks().cache().ttl_for("tasks.getAllTasks"),
            Duration::from_secs(3)
        );
    }

    #[tokio::test]
    async fn test_screens_use_configured_page_size() {
        let configured = desk(Duration::from_secs(3), 7);
        assert_eq!(configured.directory().list().page_size(), 7);
        assert_eq!(configured.board().with_list(|list| list.page_size()).await, 7);

        assert_eq!(desk(Duration::from_secs(3), 0).page_size(), 1);
    }
}
