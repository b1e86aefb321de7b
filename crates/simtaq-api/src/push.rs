//! Web Push fan-out.
//!
//! Every push is mirrored as an in-app notification row whose `data` holds the
//! target url and icon. The push itself carries no payload: the service worker
//! wakes up and fetches `/api/notifications`. Delivery goes through a [`PushTransport`]; the
//! production one signs a VAPID JWT (ES256) per request and posts with reqwest.

use async_trait::async_trait;
use futures_util::future::join_all;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use simtaq_common::{
    config::PushConfig,
    models::{
        pengumuman::{PushPayload, PushSubscription},
        user::Role,
    },
};
use simtaq_db::repository::{notifications, push_subscriptions, users};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Result of one delivery attempt as reported by the push service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Endpoint expired or unsubscribed (404/410). The subscription is deactivated.
    Gone,
    /// 401/403: the push service rejected our VAPID credentials.
    VapidRejected(u16),
    Failed(String),
}

impl DeliveryOutcome {
    /// Classify an HTTP status returned by a push service.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Delivered,
            404 | 410 => Self::Gone,
            401 | 403 => Self::VapidRejected(status),
            other => Self::Failed(format!("push service returned HTTP {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    pub deactivated: usize,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, subscription: &PushSubscription) -> DeliveryOutcome;
}

#[derive(Debug, Serialize)]
struct VapidClaims<'a> {
    aud: String,
    exp: i64,
    sub: &'a str,
}

/// Sends payload-less Web Push requests signed with the server's VAPID key.
pub struct VapidTransport {
    client: reqwest::Client,
    key: EncodingKey,
    public_key: String,
    subject: String,
    ttl_secs: u32,
}

impl VapidTransport {
    /// Build from config. `Ok(None)` when VAPID keys are not configured.
    pub fn from_config(cfg: &PushConfig, client: reqwest::Client) -> anyhow::Result<Option<Self>> {
        let (Some(public_key), Some(key_path)) = (
            cfg.vapid_public_key.as_deref().filter(|k| !k.is_empty()),
            cfg.vapid_private_key_path.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Ok(None);
        };

        let pem = std::fs::read(key_path)
            .map_err(|e| anyhow::anyhow!("cannot read VAPID private key {key_path}: {e}"))?;
        let key = EncodingKey::from_ec_pem(&pem)?;

        Ok(Some(Self {
            client,
            key,
            public_key: public_key.to_string(),
            subject: cfg.subject.clone(),
            ttl_secs: cfg.ttl_secs,
        }))
    }

    fn authorization(&self, endpoint: &str) -> anyhow::Result<String> {
        let audience = url::Url::parse(endpoint)?.origin().ascii_serialization();
        let claims = VapidClaims {
            aud: audience,
            // push services reject tokens valid for more than 24h
            exp: (chrono::Utc::now() + chrono::Duration::hours(12)).timestamp(),
            sub: &self.subject,
        };
        let token = encode(&Header::new(Algorithm::ES256), &claims, &self.key)?;
        Ok(format!("vapid t={token}, k={}", self.public_key))
    }
}

#[async_trait]
impl PushTransport for VapidTransport {
    async fn send(&self, subscription: &PushSubscription) -> DeliveryOutcome {
        let authorization = match self.authorization(&subscription.endpoint) {
            Ok(value) => value,
            Err(e) => return DeliveryOutcome::Failed(e.to_string()),
        };

        let result = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl_secs.to_string())
            .header("Urgency", "normal")
            .header(reqwest::header::AUTHORIZATION, authorization)
            .body(Vec::new())
            .send()
            .await;

        match result {
            Ok(response) => DeliveryOutcome::from_status(response.status().as_u16()),
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }
}

/// Send to every subscription concurrently. Returns the summary and the
/// ids of subscriptions whose endpoint is gone.
pub async fn deliver(
    transport: &dyn PushTransport,
    subscriptions: &[PushSubscription],
) -> (PushSummary, Vec<Uuid>) {
    let outcomes = join_all(subscriptions.iter().map(|s| transport.send(s))).await;

    let mut summary = PushSummary {
        total: subscriptions.len(),
        ..Default::default()
    };
    let mut gone = Vec::new();

    for (subscription, outcome) in subscriptions.iter().zip(outcomes) {
        match outcome {
            DeliveryOutcome::Delivered => summary.delivered += 1,
            DeliveryOutcome::Gone => {
                summary.failed += 1;
                gone.push(subscription.id);
            }
            DeliveryOutcome::VapidRejected(status) => {
                summary.failed += 1;
                tracing::error!(
                    status,
                    endpoint = %subscription.endpoint,
                    "Push service rejected VAPID credentials; check push.vapid_* configuration"
                );
            }
            DeliveryOutcome::Failed(reason) => {
                summary.failed += 1;
                tracing::warn!(endpoint = %subscription.endpoint, %reason, "Push delivery failed");
            }
        }
    }

    (summary, gone)
}

/// Who a notification goes to.
#[derive(Debug, Clone)]
pub enum Audience {
    Users(Vec<Uuid>),
    /// Active users of these roles.
    Roles(Vec<Role>),
}

/// Writes in-app notifications and pushes to subscribed devices.
#[derive(Clone)]
pub struct PushDispatcher {
    pool: PgPool,
    transport: Option<Arc<dyn PushTransport>>,
}

impl PushDispatcher {
    pub fn new(pool: PgPool, transport: Option<Arc<dyn PushTransport>>) -> Self {
        if transport.is_none() {
            tracing::warn!("VAPID keys not configured, web push disabled (in-app notifications still work)");
        }
        Self { pool, transport }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Fire-and-forget variant of [`notify`](Self::notify).
    pub fn spawn_notify(&self, audience: Audience, kind: &'static str, payload: PushPayload) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.notify(audience, kind, payload).await;
        });
    }

    /// Mirror the payload into the notification table, then push. Never fails:
    /// errors are logged and reflected in the summary.
    pub async fn notify(&self, audience: Audience, kind: &str, payload: PushPayload) -> PushSummary {
        let user_ids = match &audience {
            Audience::Users(ids) => ids.clone(),
            Audience::Roles(roles) => match users::active_ids_by_roles(&self.pool, roles).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to resolve notification audience");
                    return PushSummary::default();
                }
            },
        };
        if user_ids.is_empty() {
            return PushSummary::default();
        }

        if let Err(e) = notifications::create_for_users(
            &self.pool,
            &user_ids,
            &payload.title,
            &payload.body,
            kind,
            Some(&payload.notification_data()),
        )
        .await
        {
            tracing::warn!(error = %e, kind, "Failed to write in-app notifications");
        }

        let Some(transport) = &self.transport else {
            return PushSummary::default();
        };

        let subscriptions = match &audience {
            Audience::Users(ids) => push_subscriptions::active_for_users(&self.pool, ids).await,
            Audience::Roles(roles) => push_subscriptions::active_for_roles(&self.pool, roles).await,
        };
        let subscriptions = match subscriptions {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load push subscriptions");
                return PushSummary::default();
            }
        };

        let (mut summary, gone) = deliver(transport.as_ref(), &subscriptions).await;
        match push_subscriptions::deactivate_many(&self.pool, &gone).await {
            Ok(n) => summary.deactivated = n as usize,
            Err(e) => tracing::warn!(error = %e, "Failed to deactivate expired subscriptions"),
        }

        tracing::info!(
            kind,
            total = summary.total,
            delivered = summary.delivered,
            failed = summary.failed,
            deactivated = summary.deactivated,
            "Push fan-out complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct FakeTransport;

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn send(&self, subscription: &PushSubscription) -> DeliveryOutcome {
            match subscription.endpoint.rsplit('/').next() {
                Some("ok") => DeliveryOutcome::Delivered,
                Some("gone") => DeliveryOutcome::from_status(410),
                Some("vapid") => DeliveryOutcome::from_status(403),
                _ => DeliveryOutcome::Failed("connection reset".into()),
            }
        }
    }

    fn subscription(path: &str) -> PushSubscription {
        PushSubscription {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            endpoint: format!("https://fcm.googleapis.com/fcm/send/{path}"),
            p256dh: "BNc".into(),
            auth: "tBH".into(),
            user_agent: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_classification() {
        assert_eq!(DeliveryOutcome::from_status(201), DeliveryOutcome::Delivered);
        assert_eq!(DeliveryOutcome::from_status(404), DeliveryOutcome::Gone);
        assert_eq!(DeliveryOutcome::from_status(410), DeliveryOutcome::Gone);
        assert_eq!(DeliveryOutcome::from_status(401), DeliveryOutcome::VapidRejected(401));
        assert!(matches!(DeliveryOutcome::from_status(500), DeliveryOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn fan_out_summary_and_gone_ids() {
        let subs = vec![
            subscription("ok"),
            subscription("ok"),
            subscription("gone"),
            subscription("vapid"),
            subscription("flaky"),
        ];
        let (summary, gone) = deliver(&FakeTransport, &subs).await;

        assert_eq!(summary.total, 5);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.failed, 3);
        assert_eq!(gone, vec![subs[2].id]);
    }

    #[tokio::test]
    async fn empty_fan_out() {
        let (summary, gone) = deliver(&FakeTransport, &[]).await;
        assert_eq!(summary, PushSummary::default());
        assert!(gone.is_empty());
    }

    #[test]
    fn transport_disabled_without_keys() {
        let cfg = simtaq_common::config::from_overrides(&[]).unwrap();
        let transport = VapidTransport::from_config(&cfg.push, reqwest::Client::new()).unwrap();
        assert!(transport.is_none());
    }
}
