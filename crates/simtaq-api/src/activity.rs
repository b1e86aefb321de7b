//! Fire-and-forget activity log writer.
//!
//! Handlers call [`record`] after a successful change. Inside a transaction,
//! use `activity_logs::insert` on the transaction instead so the row commits
//! together with the change.

use simtaq_common::models::activity::{ActivityAction, NewActivity};
use simtaq_db::repository::activity_logs;
use sqlx::PgPool;

use crate::middleware::{AuthContext, ClientInfo};

/// Spawn the insert and return immediately. Failures are logged and dropped.
pub fn record(pool: &PgPool, entry: NewActivity) {
    let pool = pool.clone();
    tokio::spawn(async move {
        if let Err(e) = activity_logs::insert(&pool, &entry).await {
            tracing::warn!(
                error = %e,
                action = %entry.action.as_str(),
                actor_id = %entry.actor_id,
                "Failed to write activity log"
            );
        }
    });
}

/// Entry attributed to the session user, with the caller's address attached.
pub fn by(ctx: &AuthContext, client: &ClientInfo, action: ActivityAction, title: impl Into<String>) -> NewActivity {
    NewActivity::new(ctx.user_id, ctx.role, action, title)
        .actor_name(ctx.name.clone())
        .client(client.ip.clone(), client.user_agent.clone())
}
