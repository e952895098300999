pub mod customize_testimonial;
pub mod generate_testimonial;
pub mod prompt;
pub mod provider;
pub mod query;

use std::time::Duration;

use async_openai::Client;
use async_openai::config::{Config, OpenAIConfig};
use schemars::{JsonSchema, schema_for};
use serde_json::Value;

use crate::AppResult;

/// Title, description and JSON schema of a structured response type.
///
/// Title and description come from the type's doc comment: a leading
/// `# name` line becomes the title.
pub trait SchemaInfo: JsonSchema {
    fn schema_value() -> Value {
        schema_for!(Self).as_value().to_owned()
    }

    fn title() -> String {
        Self::schema_value()
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| Self::schema_name().into_owned())
    }

    fn description() -> String {
        Self::schema_value()
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_default()
    }
}

impl<T: JsonSchema> SchemaInfo for T {}

/// Build an async-openai client for an OpenAI-compatible server.
#[tracing::instrument(name = "Connecting to LLM server", level = "debug", skip(api_key))]
pub fn get_client(
    api_base: &str,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Client<Box<dyn Config>>> {
    let mut config = OpenAIConfig::default().with_api_base(api_base);
    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(Client::with_config(Box::new(config) as Box<dyn Config>).with_http_client(http_client))
}
