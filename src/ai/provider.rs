use async_openai::Client;
use async_openai::config::Config;
use async_openai::types::evals::InputTextContent;
use async_openai::types::responses::{
    CreateResponse, InputContent, InputItem, InputMessage, InputParam, InputRole, Item,
    MessageItem, OutputItem, OutputMessageContent, RefusalContent, ResponseFormatJsonSchema,
    ResponseTextParam, TextResponseFormatConfiguration, Truncation,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::{AppError, AppResult};

/// The generative model behind every testimonial operation.
///
/// `submit` sends one prompt together with the JSON schema the answer must
/// follow and returns the raw text of the answer. Decoding is left to the
/// caller. Output is not deterministic: the same prompt can yield different
/// text on every call.
pub trait Provider: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    fn submit<'a>(
        &'a self,
        prompt: &'a str,
        format: &'a ResponseFormatJsonSchema,
    ) -> BoxFuture<'a, AppResult<String>>;
}

/// Provider backed by the OpenAI Responses API of any compatible server.
pub struct OpenAIProvider<C: Config> {
    client: Client<C>,
    model: String,
    temperature: f32,
}

impl<C: Config> OpenAIProvider<C> {
    pub fn new(client: Client<C>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

impl<C: Config> Provider for OpenAIProvider<C> {
    fn name(&self) -> &str {
        &self.model
    }

    fn submit<'a>(
        &'a self,
        prompt: &'a str,
        format: &'a ResponseFormatJsonSchema,
    ) -> BoxFuture<'a, AppResult<String>> {
        async move {
            let request = CreateResponse {
                model: Some(self.model.clone()),
                input: InputParam::Items(vec![InputItem::Item(Item::Message(
                    MessageItem::Input(InputMessage {
                        content: vec![InputContent::InputText(InputTextContent {
                            text: prompt.to_string(),
                        })],
                        role: InputRole::User,
                        status: None,
                    }),
                ))]),
                background: Some(false),
                store: Some(false),
                stream: Some(false),
                temperature: Some(self.temperature),
                text: Some(ResponseTextParam {
                    format: TextResponseFormatConfiguration::JsonSchema(format.clone()),
                    verbosity: None,
                }),
                truncation: Some(Truncation::Disabled),
                ..Default::default()
            };

            let response = self.client.responses().create(request).await?;
            debug!("AI Response: {:?}", response);
            collect_output_text(&response.output)
        }
        .boxed()
    }
}

/// Concatenate the text parts of every output message.
fn collect_output_text(output: &[OutputItem]) -> AppResult<String> {
    let mut response_content = String::new();
    let mut refusal_reason = None;
    for out in output {
        if let OutputItem::Message(msg) = out {
            for content in &msg.content {
                match content {
                    OutputMessageContent::OutputText(text) => {
                        response_content.push_str(&text.text)
                    }
                    OutputMessageContent::Refusal(RefusalContent { refusal }) => {
                        error!("AI refused prompt: {}", refusal);
                        refusal_reason = Some(refusal.clone());
                    }
                }
            }
        }
    }

    if response_content.trim().is_empty() {
        return Err(match refusal_reason {
            Some(reason) => AppError::Provider(format!("the model refused the prompt: {reason}")),
            None => AppError::Provider("the model returned no output text".to_string()),
        });
    }
    Ok(response_content)
}
