use async_trait::async_trait;

use crate::{domain::UserId, Result};

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}

/// Outbound transport port.
///
/// Failures are returned to the caller as-is; retry and timeout policy belongs to
/// the implementation.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, user_id: UserId, html: &str) -> Result<()>;
}
