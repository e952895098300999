use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use testi_ai_include_zstd::include_zstd;

use super::provider::Provider;
use super::query::Query;
use crate::{AppError, AppResult, impl_query};

static CUSTOMIZE_TESTIMONIAL_PROMPT: &[u8] =
    include_zstd!("src/ai/prompts/customize_testimonial_prompt.md");

/// A draft plus optional free-form tone and length directives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationRequest {
    pub testimonial_draft: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
}

impl CustomizationRequest {
    pub fn new(draft: impl Into<String>) -> Self {
        Self {
            testimonial_draft: draft.into(),
            tone: None,
            length: None,
        }
    }

    pub fn tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    pub fn length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }

    /// Caller-side check that there is a draft to revise.
    pub fn validate(&self) -> AppResult<()> {
        if self.testimonial_draft.trim().is_empty() {
            return Err(AppError::Validation(
                "A testimonial draft is required.".to_string(),
            ));
        }
        Ok(())
    }
}

/// # customized_testimonial
/// The testimonial draft revised to the requested tone and length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomizedTestimonial {
    /// The revised testimonial text.
    pub customized_testimonial: String,
}

impl Display for CustomizedTestimonial {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.customized_testimonial)
    }
}

impl_query!(
    CustomizedTestimonial,
    CUSTOMIZE_TESTIMONIAL_PROMPT,
    customized_testimonial
);

/// Render the customization prompt. Absent directives render as empty text.
pub fn customization_prompt(request: &CustomizationRequest) -> AppResult<String> {
    let mut vars = HashMap::new();
    vars.insert("testimonial_draft", request.testimonial_draft.as_str());
    vars.insert("tone", request.tone.as_deref().unwrap_or_default());
    vars.insert("length", request.length.as_deref().unwrap_or_default());
    CustomizedTestimonial::prompt(&vars)
}

/// Ask the model to revise a draft. One round trip, no retries.
#[tracing::instrument(
    name = "Customizing a testimonial draft with LLM",
    level = "debug",
    skip_all,
    fields(provider = provider.name(), tone = ?request.tone, length = ?request.length)
)]
pub async fn customize_testimonial<P: Provider + ?Sized>(
    provider: &P,
    request: &CustomizationRequest,
) -> AppResult<CustomizedTestimonial> {
    let prompt = customization_prompt(request)?;
    let raw = provider
        .submit(&prompt, &CustomizedTestimonial::response_format())
        .await?;
    CustomizedTestimonial::from_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::ScriptedProvider;
    use crate::error::ErrorKind;

    const DRAFT: &str = "Since we switched, our remote team never misses a deadline.";

    fn customized_json(text: &str) -> String {
        serde_json::json!({ "customizedTestimonial": text }).to_string()
    }

    #[tokio::test]
    async fn customizes_with_tone_and_length() {
        let provider = ScriptedProvider::replying(&customized_json(
            "Deadlines? We only know them from stories now.",
        ));
        let request = CustomizationRequest::new(DRAFT).tone("humorous").length("short");
        let result = customize_testimonial(&provider, &request).await.unwrap();
        assert!(!result.customized_testimonial.is_empty());

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains(DRAFT));
        assert!(prompt.contains("Tone: humorous\n"));
        assert!(prompt.contains("Length: short\n"));
        assert!(prompt.contains("Revise the following testimonial to match this tone and length"));
        assert_eq!(provider.formats(), vec!["customized_testimonial".to_string()]);
    }

    #[tokio::test]
    async fn absent_and_empty_directives_still_render() {
        let requests = [
            CustomizationRequest::new(DRAFT),
            CustomizationRequest::new(DRAFT).tone("").length(""),
            CustomizationRequest::new(DRAFT).length("long"),
        ];
        for request in requests {
            let provider = ScriptedProvider::replying(&customized_json(DRAFT));
            let result = customize_testimonial(&provider, &request).await.unwrap();
            assert!(!result.customized_testimonial.is_empty());

            let prompt = &provider.prompts()[0];
            assert!(prompt.contains("Tone: "));
            assert!(prompt.contains("Length: "));
            assert!(!prompt.contains("{{"), "unrendered placeholder in {prompt}");
        }
    }

    #[test]
    fn omitted_directive_is_an_empty_line() {
        let prompt = customization_prompt(&CustomizationRequest::new(DRAFT)).unwrap();
        assert!(prompt.contains("Tone: \nLength: \n"));
    }

    #[tokio::test]
    async fn blank_revision_is_a_schema_error() {
        let provider = ScriptedProvider::replying(&customized_json(""));
        let err = customize_testimonial(&provider, &CustomizationRequest::new(DRAFT))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaValidation);
    }

    #[tokio::test]
    async fn generation_shaped_answer_is_rejected() {
        let provider = ScriptedProvider::replying(r#"{"testimonialDraft": "wrong shape"}"#);
        let err = customize_testimonial(&provider, &CustomizationRequest::new(DRAFT))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaValidation);
    }

    #[tokio::test]
    async fn provider_failures_surface_unchanged() {
        let provider = ScriptedProvider::failing();
        let err = customize_testimonial(&provider, &CustomizationRequest::new(DRAFT))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[test]
    fn optional_fields_may_be_missing_on_the_wire() {
        let req: CustomizationRequest =
            serde_json::from_str(r#"{"testimonialDraft": "Nice."}"#).unwrap();
        assert_eq!(req, CustomizationRequest::new("Nice."));
        let req: CustomizationRequest = serde_json::from_str(
            r#"{"testimonialDraft": "Nice.", "tone": "friendly", "length": "short"}"#,
        )
        .unwrap();
        assert_eq!(req.tone.as_deref(), Some("friendly"));
        assert_eq!(req.length.as_deref(), Some("short"));
    }

    #[test]
    fn blank_draft_fails_caller_validation() {
        assert!(CustomizationRequest::new("  ").validate().is_err());
        assert!(CustomizationRequest::new(DRAFT).validate().is_ok());
    }
}
