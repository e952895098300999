use std::collections::HashMap;

use async_openai::types::responses::ResponseFormatJsonSchema;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use super::SchemaInfo;
use super::prompt::PromptTemplate;
use crate::{AppError, AppResult};

/// A structured model response together with the prompt that asks for it.
pub trait Query: JsonSchema + Serialize + for<'de> Deserialize<'de> + SchemaInfo {
    /// zstd-compressed prompt template.
    const PROMPT: &'static [u8];

    fn response_format() -> ResponseFormatJsonSchema {
        ResponseFormatJsonSchema {
            description: Some(Self::description()),
            schema: Some(schema_for!(Self).as_value().to_owned()),
            name: Self::title(),
            strict: Some(true),
        }
    }

    /// The decompressed, unrendered template.
    fn template() -> AppResult<String> {
        let raw = zstd::decode_all(std::io::Cursor::new(Self::PROMPT))?;
        Ok(String::from_utf8(raw)?)
    }

    fn prompt(vars: &HashMap<&str, &str>) -> AppResult<String> {
        let template = Self::template()?;
        let template = PromptTemplate::new(&template);
        for name in template.placeholders() {
            if !vars.contains_key(name) {
                debug!("No value for `{name}` in the {} prompt", Self::title());
            }
        }
        Ok(template.render(vars))
    }

    /// Semantic checks that the schema alone cannot express.
    fn validate(&self) -> AppResult<()> {
        Ok(())
    }

    /// Strictly decode a model response. Nothing is stripped or repaired:
    /// anything other than exactly one matching JSON object is rejected.
    fn from_str(s: &str) -> AppResult<Self> {
        trace!("Raw content: {s}");

        let mut jd = serde_json::Deserializer::from_str(s.trim());
        let parsed: Self = match serde_path_to_error::deserialize(&mut jd) {
            Ok(res) => res,
            Err(e) => {
                error!("Failed to deserialize {}: {e}", Self::title());
                error!("Response content was: {s}");
                error!("Failed to parse JSON at path: {}", e.path());
                return Err(schema_error::<Self>(e.to_string()));
            }
        };
        if let Err(e) = jd.end() {
            error!("Trailing content after {} object: {e}", Self::title());
            return Err(schema_error::<Self>(format!(
                "unexpected content after the JSON object: {e}"
            )));
        }

        parsed.validate()?;
        Ok(parsed)
    }
}

fn schema_error<Q: SchemaInfo>(reason: String) -> AppError {
    AppError::SchemaValidation {
        schema: Q::title(),
        reason,
    }
}

/// Reject text fields that are empty or whitespace only.
pub fn require_text<Q: SchemaInfo>(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        error!("Model returned blank `{field}` for {}", Q::title());
        return Err(schema_error::<Q>(format!("`{field}` must not be empty")));
    }
    Ok(())
}

/// Implement [`Query`] for a response type whose named field must hold text.
#[macro_export]
#[allow(clippy::crate_in_macro_def)]
macro_rules! impl_query {
    ($struct_name:ident, $prompt:ident, $text_field:ident) => {
        impl crate::ai::query::Query for $struct_name {
            const PROMPT: &'static [u8] = $prompt;

            fn validate(&self) -> crate::AppResult<()> {
                crate::ai::query::require_text::<Self>(
                    stringify!($text_field),
                    &self.$text_field,
                )
            }
        }
    };
}
