use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use testi_ai_include_zstd::include_zstd;

use super::provider::Provider;
use super::query::Query;
use crate::{AppError, AppResult, impl_query};

static GENERATE_TESTIMONIAL_PROMPT: &[u8] =
    include_zstd!("src/ai/prompts/generate_testimonial_prompt.md");

/// Fewest characters of product details worth sending to the model.
pub const MIN_DETAILS_CHARS: usize = 20;

/// Free-text description of the product or service to praise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub product_or_service_details: String,
}

impl GenerationRequest {
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            product_or_service_details: details.into(),
        }
    }

    /// Caller-side length check. [`generate_testimonial`] itself never calls it.
    pub fn validate(&self) -> AppResult<()> {
        if self.product_or_service_details.chars().count() < MIN_DETAILS_CHARS {
            return Err(AppError::Validation(format!(
                "Please provide at least {MIN_DETAILS_CHARS} characters for better results."
            )));
        }
        Ok(())
    }
}

/// # testimonial_draft
/// A realistic and human-like testimonial draft based on the product or service details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestimonialDraft {
    /// The testimonial text, written as a satisfied customer.
    pub testimonial_draft: String,
}

impl Display for TestimonialDraft {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.testimonial_draft)
    }
}

impl_query!(
    TestimonialDraft,
    GENERATE_TESTIMONIAL_PROMPT,
    testimonial_draft
);

/// Render the generation prompt for the given request.
pub fn generation_prompt(request: &GenerationRequest) -> AppResult<String> {
    let mut vars = HashMap::new();
    vars.insert(
        "product_or_service_details",
        request.product_or_service_details.as_str(),
    );
    TestimonialDraft::prompt(&vars)
}

/// Ask the model for a testimonial draft. One round trip, no retries.
#[tracing::instrument(
    name = "Generating a testimonial draft with LLM",
    level = "debug",
    skip_all,
    fields(provider = provider.name())
)]
pub async fn generate_testimonial<P: Provider + ?Sized>(
    provider: &P,
    request: &GenerationRequest,
) -> AppResult<TestimonialDraft> {
    let prompt = generation_prompt(request)?;
    let raw = provider
        .submit(&prompt, &TestimonialDraft::response_format())
        .await?;
    TestimonialDraft::from_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::ScriptedProvider;
    use crate::error::ErrorKind;

    const KANBAN: &str =
        "A project management tool with Kanban boards and real-time chat for remote teams.";

    fn draft_json(text: &str) -> String {
        serde_json::json!({ "testimonialDraft": text }).to_string()
    }

    #[tokio::test]
    async fn generates_a_non_empty_draft() {
        let provider = ScriptedProvider::replying(&draft_json(
            "Our remote team finally stopped losing track of tasks.",
        ));
        let draft = generate_testimonial(&provider, &GenerationRequest::new(KANBAN))
            .await
            .unwrap();
        assert!(!draft.testimonial_draft.is_empty());
        assert_eq!(provider.calls(), 1);
        assert_eq!(provider.formats(), vec!["testimonial_draft".to_string()]);
    }

    #[tokio::test]
    async fn prompt_embeds_details_verbatim() {
        let details = "Cold brew kit {{tone}} with \"quotes\" and\nnewlines for home baristas.";
        let provider = ScriptedProvider::replying(&draft_json("Great coffee."));
        generate_testimonial(&provider, &GenerationRequest::new(details))
            .await
            .unwrap();
        let prompt = &provider.prompts()[0];
        assert!(prompt.contains(details));
        assert!(prompt.contains("Craft a compelling, realistic, human-like testimonial"));
        assert!(!prompt.contains("{{product_or_service_details}}"));
    }

    #[tokio::test]
    async fn provider_failures_surface_unchanged() {
        let provider = ScriptedProvider::failing();
        let err = generate_testimonial(&provider, &GenerationRequest::new(KANBAN))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn rejects_responses_that_do_not_match_the_schema() {
        let bad = [
            draft_json(""),
            draft_json("   \n"),
            r#"{"testimonialDraft": 42}"#.to_string(),
            r#"{"draft": "wrong field"}"#.to_string(),
            r#"{"testimonialDraft": "ok", "rating": 5}"#.to_string(),
            r#"{"testimonialDraft": "ok"} and some chatter"#.to_string(),
            "```json\n{\"testimonialDraft\": \"fenced\"}\n```".to_string(),
            "Sure! Here is your testimonial.".to_string(),
        ];
        for raw in bad {
            let provider = ScriptedProvider::replying(&raw);
            let err = generate_testimonial(&provider, &GenerationRequest::new(KANBAN))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SchemaValidation, "accepted {raw:?}");
        }
    }

    #[test]
    fn accepts_surrounding_whitespace() {
        let draft = TestimonialDraft::from_str("\n  {\"testimonialDraft\": \"Solid.\"}  \n").unwrap();
        assert_eq!(draft.to_string(), "Solid.");
    }

    #[test]
    fn details_need_twenty_characters() {
        assert!(GenerationRequest::new("x".repeat(19)).validate().is_err());
        assert!(GenerationRequest::new("x".repeat(20)).validate().is_ok());
        // Characters, not bytes.
        assert!(GenerationRequest::new("é".repeat(19)).validate().is_err());
        let err = GenerationRequest::new("too short").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn schema_is_strict() {
        let format = TestimonialDraft::response_format();
        assert_eq!(format.strict, Some(true));
        let schema = format.schema.unwrap();
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
        assert_eq!(schema["required"], serde_json::json!(["testimonialDraft"]));
    }

    #[test]
    fn request_uses_camel_case_on_the_wire() {
        let req: GenerationRequest =
            serde_json::from_str(&format!(r#"{{"productOrServiceDetails": "{KANBAN}"}}"#))
                .unwrap();
        assert_eq!(req.product_or_service_details, KANBAN);
    }
}
