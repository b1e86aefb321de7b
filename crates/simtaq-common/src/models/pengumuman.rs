//! Announcements, in-app notifications and Web Push subscriptions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Pengumuman {
    pub id: Uuid,
    pub judul: String,
    pub isi: String,
    pub kategori: Option<String>,
    /// `None` means every role.
    pub target_role: Option<Role>,
    pub tanggal_mulai: Option<NaiveDate>,
    pub tanggal_selesai: Option<NaiveDate>,
    pub is_pinned: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PengumumanRequest {
    #[validate(length(min = 3, max = 200, message = "Judul minimal 3 karakter"))]
    pub judul: String,
    #[validate(length(min = 1, message = "Isi pengumuman wajib diisi"))]
    pub isi: String,
    pub kategori: Option<String>,
    pub target_role: Option<Role>,
    pub tanggal_mulai: Option<NaiveDate>,
    pub tanggal_selesai: Option<NaiveDate>,
    #[serde(default)]
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Option<Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Browser `PushSubscription.toJSON()` shape.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

/// Notification content delivered to devices and mirrored in-app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    pub icon: String,
    pub badge: String,
    #[serde(default)]
    pub data: Value,
}

impl PushPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            title: title.into(),
            body: body.into(),
            data: serde_json::json!({ "url": url }),
            url,
            icon: "/logo-man1.png".into(),
            badge: "/logo-man1.png".into(),
        }
    }

    /// JSON stored with the in-app notification. Payload-less pushes make the
    /// device fetch this row, so `url`, `icon` and `badge` must travel here.
    pub fn notification_data(&self) -> Value {
        let mut data = match &self.data {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        for (key, value) in [("url", &self.url), ("icon", &self.icon), ("badge", &self.badge)] {
            data.entry(key).or_insert_with(|| Value::String(value.clone()));
        }
        Value::Object(data)
    }

    /// Payload broadcast when an announcement is published.
    pub fn announcement(id: Uuid, judul: &str) -> Self {
        let body = if judul.trim().is_empty() {
            "Pengumuman baru".to_string()
        } else {
            judul.to_string()
        };
        let url = format!("/pengumuman?id={id}");
        Self {
            data: serde_json::json!({ "id": id, "url": url }),
            ..Self::new("SIMTAQ", body, url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_payload() {
        let id = Uuid::nil();
        let p = PushPayload::announcement(id, "Libur Idul Fitri");
        assert_eq!(p.title, "SIMTAQ");
        assert_eq!(p.body, "Libur Idul Fitri");
        assert_eq!(p.url, format!("/pengumuman?id={id}"));
        assert_eq!(p.data["url"], p.url.as_str());

        let blank = PushPayload::announcement(id, "  ");
        assert_eq!(blank.body, "Pengumuman baru");
    }

    #[test]
    fn notification_data_carries_link_and_icon() {
        let id = Uuid::nil();
        let data = PushPayload::announcement(id, "Libur").notification_data();
        assert_eq!(data["id"], id.to_string());
        assert_eq!(data["url"], format!("/pengumuman?id={id}"));
        assert_eq!(data["icon"], "/logo-man1.png");
        assert_eq!(data["badge"], "/logo-man1.png");

        let bare = PushPayload {
            data: Value::Null,
            ..PushPayload::new("Tasmi'", "Hasil terbit", "/siswa/tasmi")
        };
        assert_eq!(bare.notification_data()["url"], "/siswa/tasmi");
    }
}
