//! Notifications API.

use crate::client::VeloClient;
use crate::error::Result;
use crate::types::{Notification, NotificationListQuery, Paginated, UnreadCount};

/// Notifications API client.
pub struct NotificationsApi {
    client: VeloClient,
}

impl NotificationsApi {
    pub(crate) fn new(client: VeloClient) -> Self {
        Self { client }
    }

    /// List the caller's notifications.
    pub async fn list(&self, query: NotificationListQuery) -> Result<Paginated<Notification>> {
        self.client.get_with_query("notifications/", &query).await
    }

    /// Count of unread notifications.
    pub async fn unread_count(&self) -> Result<UnreadCount> {
        self.client.get("notifications/unread-count/").await
    }

    /// Mark one notification as read.
    pub async fn mark_read(&self, id: i64) -> Result<Notification> {
        self.client
            .post(&format!("notifications/{}/read/", id), &serde_json::json!({}))
            .await
    }

    /// Mark all notifications as read.
    pub async fn mark_all_read(&self) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post("notifications/mark-all-read/", &serde_json::json!({}))
            .await?;
        Ok(())
    }
}
