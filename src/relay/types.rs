use serde::Deserialize;

/// Object tag the platform puts on business-account webhook deliveries.
/// Anything else is accepted and dropped without further processing.
pub const EXPECTED_WEBHOOK_OBJECT: &str = "whatsapp_business_account";

/// Maximum stored length for either side of a history row, in characters.
pub const HISTORY_TEXT_MAX_LEN: usize = 1000;

#[derive(Debug, Clone)]
pub struct Tenant {
    pub tenant_id: i64,
    pub business_name: String,
    pub working_hours: String,
    pub contact_phone: String,
    pub address: String,
    pub message_count: i64,
    pub message_limit: i64,
    pub last_message_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub price: String,
    pub duration: String,
}

/// A tenant joined with its services, loaded in a single store call so the
/// quota gate and the prompt builder always see one consistent snapshot.
#[derive(Debug, Clone)]
pub struct TenantRecord {
    pub tenant: Tenant,
    pub services: Vec<Service>,
}
impl TenantRecord {
    /// Strict less-than: a tenant sitting exactly at its limit is blocked.
    pub fn within_limit(&self) -> bool {
        self.tenant.message_count < self.tenant.message_limit
    }
}

#[derive(Debug, Clone)]
pub struct MessageHistoryEntry {
    pub tenant_id: i64,
    pub sender_phone: String,
    pub user_message: String,
    pub bot_response: String,
}
impl MessageHistoryEntry {
    /// Both texts are truncated independently before they ever hit the store.
    pub fn new(tenant_id: i64, sender_phone: &str, user_message: &str, bot_response: &str) -> Self {
        Self {
            tenant_id,
            sender_phone: sender_phone.to_string(),
            user_message: truncate_chars(user_message, HISTORY_TEXT_MAX_LEN),
            bot_response: truncate_chars(bot_response, HISTORY_TEXT_MAX_LEN),
        }
    }
}

/// Char-boundary safe truncation; byte slicing would panic on multi-byte text.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

/// Platform event envelope: `{object, entry: [{changes: [{value: {...}}]}]}`.
/// Every level is optional on the wire, so everything below defaults.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub object: String,

    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: Option<WebhookChangeValue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChangeValue {
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,

    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub from: Option<String>,

    #[serde(rename = "type")]
    #[serde(default)]
    pub message_type: Option<String>,

    #[serde(default)]
    pub text: Option<WebhookMessageText>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMessageText {
    #[serde(default)]
    pub body: String,
}

/// One processable inbound message pulled out of the envelope. Ephemeral:
/// only the text survives, copied into history after a delivered reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTextMessage {
    /// Display number of the receiving business line, used to resolve the tenant.
    pub routing_key: String,
    pub sender: String,
    pub body: String,
}

impl WebhookEvent {
    /// Takes only the first message of the batch, and only if it is a plain
    /// text message with a non-empty trimmed body and sender. Everything
    /// else (statuses, media, reactions, empty batches) yields `None`.
    pub fn extract_text_message(&self) -> Option<InboundTextMessage> {
        let value = self.entry.first()?.changes.first()?.value.as_ref()?;

        let routing_key = value
            .metadata
            .as_ref()?
            .display_phone_number
            .as_deref()?
            .trim();

        let message = value.messages.first()?;
        if message.message_type.as_deref() != Some("text") {
            return None;
        }

        let sender = message.from.as_deref()?.trim();
        let body = message.text.as_ref()?.body.trim();
        if routing_key.is_empty() || sender.is_empty() || body.is_empty() {
            return None;
        }

        Some(InboundTextMessage {
            routing_key: routing_key.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
        })
    }
}
