use async_trait::async_trait;

use crate::Result;

/// Navigation of the hub workspace that new project workspaces are linked
/// from.
#[async_trait]
pub trait HubNavigation: Send + Sync {
    /// Adds a navigation link titled `title` pointing at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub navigation cannot be updated.
    async fn register_link(&self, title: &str, url: &str) -> Result<()>;
}
