mod database;
mod dispatch;
mod reply;
pub mod types;

use crate::config::{DatabaseConfig, ModelConfig, WhatsAppConfig};
use crate::relay::database::RelayDatabase;
use crate::relay::dispatch::{TextDispatcher, WhatsAppDispatcher};
use crate::relay::reply::{OpenAiChatModel, ReplyGenerator};
use crate::relay::types::{
    InboundTextMessage, MessageHistoryEntry, WebhookEvent, EXPECTED_WEBHOOK_OBJECT,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::log::{debug, error, info, warn};

/// Sent instead of a generated reply once a tenant has used up its quota.
/// This attempt does not count against the quota and is not kept in history.
const LIMIT_REACHED_REPLY: &str =
    "Atingimos o limite de mensagens automáticas de hoje. 🙏 \
     Um atendente da nossa equipe irá responder você em breve!";

/// Terminal state of one inbound webhook delivery. Every variant is
/// acknowledged to the platform with a success status; the distinction only
/// drives logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Wrong object tag, undecodable payload, or no processable text message.
    Ignored,
    /// The receiving number has no tenant mapping configured.
    UnmappedNumber,
    /// The mapping points at a tenant row that no longer exists.
    TenantMissing,
    /// The store failed mid-pipeline; logged, never propagated.
    StoreFailed,
    /// Quota gate closed; the fixed limit message was dispatched instead.
    LimitBlocked,
    /// The platform send failed, so nothing was counted or recorded.
    DeliveryFailed,
    /// Reply delivered, counter incremented, history row written.
    Replied,
}

struct RelayInner {
    database: RelayDatabase,
    generator: ReplyGenerator,
    dispatcher: Box<dyn TextDispatcher>,
}

#[derive(Clone)]
pub struct RelayManager {
    inner: Arc<RelayInner>,
}
impl RelayManager {
    pub async fn connect(
        database: DatabaseConfig,
        whatsapp: WhatsAppConfig,
        model: ModelConfig,
    ) -> Result<Self> {
        let database = RelayDatabase::connect(database).await?;
        let generator = ReplyGenerator::new(Box::new(OpenAiChatModel::new(model)?));
        let dispatcher = Box::new(WhatsAppDispatcher::new(whatsapp)?);

        Ok(Self::new(database, generator, dispatcher))
    }

    fn new(
        database: RelayDatabase,
        generator: ReplyGenerator,
        dispatcher: Box<dyn TextDispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                database,
                generator,
                dispatcher,
            }),
        }
    }

    /// Drives one webhook delivery through validate → resolve → quota →
    /// generate → deliver → account. Infallible by contract: internal
    /// failures are logged and mapped to an outcome, so the transport layer
    /// can always acknowledge with a success status.
    pub async fn handle_event(&self, payload: serde_json::Value) -> PipelineOutcome {
        let event: WebhookEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                debug!("Discarding undecodable webhook payload: {e}");
                return PipelineOutcome::Ignored;
            }
        };

        if event.object != EXPECTED_WEBHOOK_OBJECT {
            debug!("Discarding webhook with object tag '{}'", event.object);
            return PipelineOutcome::Ignored;
        }

        let message = match event.extract_text_message() {
            Some(message) => message,
            None => {
                debug!("Webhook carried no processable text message");
                return PipelineOutcome::Ignored;
            }
        };

        self.process_message(message).await
    }

    async fn process_message(&self, message: InboundTextMessage) -> PipelineOutcome {
        let inner = &self.inner;

        let tenant_id = match inner.database.resolve_tenant(&message.routing_key).await {
            Ok(Some(tenant_id)) => tenant_id,
            Ok(None) => {
                // A delivery for an unmapped number means the platform-side
                // configuration and ours have drifted apart.
                error!(
                    "No tenant mapping for receiving number '{}', dropping message",
                    message.routing_key
                );
                return PipelineOutcome::UnmappedNumber;
            }
            Err(e) => {
                error!("Tenant mapping lookup failed: {e:?}");
                return PipelineOutcome::StoreFailed;
            }
        };

        let record = match inner.database.get_tenant_record(tenant_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                error!("Phone mapping points at missing tenant #{tenant_id}, dropping message");
                return PipelineOutcome::TenantMissing;
            }
            Err(e) => {
                error!("Tenant record load failed for tenant #{tenant_id}: {e:?}");
                return PipelineOutcome::StoreFailed;
            }
        };

        if !record.within_limit() {
            info!(
                "Tenant #{tenant_id} is at its message limit ({}/{}), sending handoff reply",
                record.tenant.message_count, record.tenant.message_limit
            );
            if !inner
                .dispatcher
                .send_text(&message.sender, LIMIT_REACHED_REPLY)
                .await
            {
                warn!("Failed to deliver limit-reached reply to {}", message.sender);
            }
            return PipelineOutcome::LimitBlocked;
        }

        let reply = inner.generator.generate(&record, &message.body).await;

        if !inner.dispatcher.send_text(&message.sender, &reply).await {
            warn!(
                "Dropping reply for tenant #{tenant_id}: delivery to {} failed",
                message.sender
            );
            return PipelineOutcome::DeliveryFailed;
        }

        // The user has the reply; account for it. Read-then-write on the
        // counter, so two near-simultaneous messages can undercount (see the
        // quota race test). Write failures here are logged and swallowed.
        let new_count = record.tenant.message_count + 1;
        if let Err(e) = inner.database.update_message_count(tenant_id, new_count).await {
            error!("Failed to update message counter for tenant #{tenant_id}: {e:?}");
        }

        let entry =
            MessageHistoryEntry::new(tenant_id, &message.sender, &message.body, &reply);
        match inner.database.insert_history(&entry).await {
            Ok(history_id) => debug!("Stored history row #{history_id} for tenant #{tenant_id}"),
            Err(e) => error!("Failed to store history for tenant #{tenant_id}: {e:?}"),
        }

        PipelineOutcome::Replied
    }
}
