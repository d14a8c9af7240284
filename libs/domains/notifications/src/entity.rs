//! Sea-ORM entity for the notifications table.

use crate::models::{Channel, Notification, NotificationMetadata, NotificationStatus, Priority};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

/// Sea-ORM Entity for the notifications table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub recipient_id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub channel: Channel,
    pub priority: Priority,
    pub status: NotificationStatus,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub sent_at: Option<DateTimeWithTimeZone>,
    pub delivered_at: Option<DateTimeWithTimeZone>,
    pub read_at: Option<DateTimeWithTimeZone>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub scheduled_for: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Conversion from Sea-ORM Model to the domain Notification
impl From<Model> for Notification {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            recipient_id: model.recipient_id,
            title: model.title,
            content: model.content,
            channel: model.channel,
            priority: model.priority,
            status: model.status,
            metadata: serde_json::from_value(model.metadata).unwrap_or_default(),
            sent_at: model.sent_at.map(Into::into),
            delivered_at: model.delivered_at.map(Into::into),
            read_at: model.read_at.map(Into::into),
            failure_reason: model.failure_reason,
            retry_count: model.retry_count.max(0) as u32,
            scheduled_for: model.scheduled_for.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

// Conversion from the domain Notification to a row snapshot
impl From<&Notification> for Model {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            recipient_id: notification.recipient_id.clone(),
            title: notification.title.clone(),
            content: notification.content.clone(),
            channel: notification.channel,
            priority: notification.priority,
            status: notification.status,
            metadata: metadata_json(&notification.metadata),
            sent_at: notification.sent_at.map(Into::into),
            delivered_at: notification.delivered_at.map(Into::into),
            read_at: notification.read_at.map(Into::into),
            failure_reason: notification.failure_reason.clone(),
            retry_count: notification.retry_count as i32,
            scheduled_for: notification.scheduled_for.map(Into::into),
            created_at: notification.created_at.into(),
            updated_at: notification.updated_at.into(),
        }
    }
}

// Conversion from the domain Notification to a Sea-ORM ActiveModel for writes
impl From<&Notification> for ActiveModel {
    fn from(notification: &Notification) -> Self {
        ActiveModel {
            id: Set(notification.id),
            recipient_id: Set(notification.recipient_id.clone()),
            title: Set(notification.title.clone()),
            content: Set(notification.content.clone()),
            channel: Set(notification.channel),
            priority: Set(notification.priority),
            status: Set(notification.status),
            metadata: Set(metadata_json(&notification.metadata)),
            sent_at: Set(notification.sent_at.map(Into::into)),
            delivered_at: Set(notification.delivered_at.map(Into::into)),
            read_at: Set(notification.read_at.map(Into::into)),
            failure_reason: Set(notification.failure_reason.clone()),
            retry_count: Set(notification.retry_count as i32),
            scheduled_for: Set(notification.scheduled_for.map(Into::into)),
            created_at: Set(notification.created_at.into()),
            updated_at: Set(notification.updated_at.into()),
        }
    }
}

fn metadata_json(metadata: &NotificationMetadata) -> Json {
    // A string map always serializes to a JSON object.
    serde_json::to_value(metadata).unwrap_or(Json::Object(serde_json::Map::new()))
}
