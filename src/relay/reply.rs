use crate::config::ModelConfig;
use crate::relay::types::TenantRecord;
use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;
use tracing::log::{debug, error};

const MODEL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

/// Single-turn completion against a hosted chat model. The trait seam keeps
/// the pipeline testable without a network round-trip.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

pub struct OpenAiChatModel {
    config: ModelConfig,
    client: Client,
}
impl OpenAiChatModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = Client::builder().timeout(MODEL_TIMEOUT).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let request_body = ChatCompletionRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_text.to_string(),
                },
            ],
        };

        debug!("Sending chat completion request to {}", self.config.api_base);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            bail!("Chat completion API error: {status} - {error_text}");
        }

        let completion: ChatCompletionResponse = response.json().await?;
        match completion.choices.into_iter().next() {
            Some(choice) => Ok(choice.message.content),
            None => bail!("Chat completion response contained no choices!"),
        }
    }
}

pub struct ReplyGenerator {
    model: Box<dyn ChatModel>,
}
impl ReplyGenerator {
    pub fn new(model: Box<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Always returns text: any model failure degrades to a fixed apology
    /// pointing at the tenant's contact phone instead of an error.
    pub async fn generate(&self, record: &TenantRecord, user_text: &str) -> String {
        let system_prompt = build_system_prompt(record);

        match self.model.complete(&system_prompt, user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    "Model call failed for tenant #{}, using fallback reply: {e:?}",
                    record.tenant.tenant_id
                );
                fallback_reply(&record.tenant.contact_phone)
            }
        }
    }
}

fn fallback_reply(contact_phone: &str) -> String {
    format!(
        "Desculpe, estou com dificuldades técnicas no momento. 😔 \
         Por favor, ligue para {contact_phone} e a nossa equipe terá prazer em atender você!"
    )
}

/// Renders the per-tenant instruction block from the current record. Built
/// fresh on every call, so there is no cross-request state to go stale.
fn build_system_prompt(record: &TenantRecord) -> String {
    let tenant = &record.tenant;
    let mut prompt = format!(
        "Você é o assistente virtual de atendimento da {}.\n\n\
         Informações do negócio:\n\
         - Horário de funcionamento: {}\n\
         - Telefone: {}\n\
         - Endereço: {}\n\n\
         Serviços oferecidos:\n",
        tenant.business_name, tenant.working_hours, tenant.contact_phone, tenant.address
    );

    if record.services.is_empty() {
        let _ = writeln!(
            prompt,
            "- Entre em contato pelo telefone {} para conhecer os nossos serviços.",
            tenant.contact_phone
        );
    } else {
        for service in &record.services {
            let _ = writeln!(
                prompt,
                "- {}: {} ({})",
                service.name, service.price, service.duration
            );
        }
    }

    let _ = write!(
        prompt,
        "\nRegras de atendimento:\n\
         - Responda sempre em português brasileiro.\n\
         - Seja simpático e direto, com respostas curtas.\n\
         - Para agendamentos, oriente o cliente a ligar para {}.\n\
         - Use emojis com moderação.",
        tenant.contact_phone
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::types::{Service, Tenant};
    use anyhow::anyhow;

    fn record(services: Vec<Service>) -> TenantRecord {
        TenantRecord {
            tenant: Tenant {
                tenant_id: 1,
                business_name: "Studio Bella Sobrancelhas".to_string(),
                working_hours: "Seg a Sáb, 9h às 19h".to_string(),
                contact_phone: "+5511988887777".to_string(),
                address: "Rua das Flores, 123 - São Paulo".to_string(),
                message_count: 0,
                message_limit: 100,
                last_message_at: None,
            },
            services,
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String> {
            Ok(format!("echo: {user_text}"))
        }
    }

    #[test]
    fn test_prompt_lists_services_in_order() {
        let record = record(vec![
            Service {
                name: "Design de sobrancelhas".to_string(),
                price: "R$ 50,00".to_string(),
                duration: "40 min".to_string(),
            },
            Service {
                name: "Henna".to_string(),
                price: "R$ 35,00".to_string(),
                duration: "30 min".to_string(),
            },
        ]);

        let prompt = build_system_prompt(&record);
        assert!(prompt.contains("Studio Bella Sobrancelhas"));
        assert!(prompt.contains("Seg a Sáb, 9h às 19h"));
        assert!(prompt.contains("- Design de sobrancelhas: R$ 50,00 (40 min)"));
        assert!(prompt.contains("- Henna: R$ 35,00 (30 min)"));

        let design = prompt.find("Design de sobrancelhas").unwrap();
        let henna = prompt.find("Henna").unwrap();
        assert!(design < henna);
    }

    #[test]
    fn test_prompt_without_services_invites_contact() {
        let prompt = build_system_prompt(&record(Vec::new()));
        assert!(prompt
            .contains("Entre em contato pelo telefone +5511988887777 para conhecer os nossos serviços."));
        assert!(!prompt.contains("()"));
    }

    #[tokio::test]
    async fn test_generate_returns_model_reply() {
        let generator = ReplyGenerator::new(Box::new(EchoModel));
        let reply = generator.generate(&record(Vec::new()), "Olá!").await;
        assert_eq!(reply, "echo: Olá!");
    }

    #[tokio::test]
    async fn test_generate_falls_back_with_contact_phone() {
        let generator = ReplyGenerator::new(Box::new(FailingModel));
        let reply = generator
            .generate(&record(Vec::new()), "Quanto custa?")
            .await;

        assert!(reply.contains("+5511988887777"));
    }
}
