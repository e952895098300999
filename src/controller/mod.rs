//! Presentation controller: owns the session and runs provider calls for it.

pub mod choices;
pub mod session;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::AppResult;
use crate::ai::customize_testimonial::customize_testimonial;
use crate::ai::generate_testimonial::{GenerationRequest, generate_testimonial};
use crate::ai::provider::Provider;
use choices::{Length, Tone};
use session::{Session, Ticket};

/// What a finished call did to the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// The text now displayed.
    Displayed(String),
    /// A newer request took over; nothing changed.
    Superseded,
    /// The selection was recorded but there is no draft to customize yet.
    Waiting,
}

/// Drives a [`Session`] against a [`Provider`].
///
/// Methods take `&self` and may run concurrently. The session lock is never
/// held while the provider is working.
pub struct Controller<P: ?Sized> {
    provider: Arc<P>,
    session: Mutex<Session>,
}

impl<P: Provider + ?Sized> Controller<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            session: Mutex::new(Session::new()),
        }
    }

    /// Copy of the current session state.
    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Generate a new draft from product details.
    ///
    /// Too-short details are rejected before anything changes. On failure the
    /// session records a notice and keeps whatever was displayed.
    #[tracing::instrument(name = "Generating testimonial", level = "info", skip_all)]
    pub async fn generate(&self, details: impl Into<String>) -> AppResult<Update> {
        let request = GenerationRequest::new(details);
        request.validate()?;
        let ticket = self.session.lock().await.generate_requested()?;

        let result = generate_testimonial(self.provider.as_ref(), &request).await;

        let mut session = self.session.lock().await;
        match result {
            Ok(draft) => {
                let text = draft.testimonial_draft;
                if session.generate_succeeded(ticket, text.clone()) {
                    info!("New testimonial draft ready");
                    Ok(Update::Displayed(text))
                } else {
                    Ok(Update::Superseded)
                }
            }
            Err(err) => Self::report(&mut session, ticket, err),
        }
    }

    pub async fn select_tone(&self, tone: Tone) -> AppResult<Update> {
        self.customize(Some(tone), None).await
    }

    pub async fn select_length(&self, length: Length) -> AppResult<Update> {
        self.customize(None, Some(length)).await
    }

    /// Re-run customization with the current selection.
    pub async fn refresh(&self) -> AppResult<Update> {
        self.customize(None, None).await
    }

    #[tracing::instrument(name = "Customizing testimonial", level = "info", skip(self))]
    async fn customize(&self, tone: Option<Tone>, length: Option<Length>) -> AppResult<Update> {
        let Some((ticket, request)) = self.session.lock().await.customize_requested(tone, length)
        else {
            return Ok(Update::Waiting);
        };

        let result = customize_testimonial(self.provider.as_ref(), &request).await;

        let mut session = self.session.lock().await;
        match result {
            Ok(customized) => {
                let text = customized.customized_testimonial;
                if session.customize_succeeded(ticket, text.clone()) {
                    Ok(Update::Displayed(text))
                } else {
                    Ok(Update::Superseded)
                }
            }
            Err(err) => Self::report(&mut session, ticket, err),
        }
    }

    fn report(session: &mut Session, ticket: Ticket, err: crate::AppError) -> AppResult<Update> {
        match session.failed(ticket, &err) {
            Some(notice) => {
                warn!("{} {}", notice.message, notice.detail);
                Err(err)
            }
            None => Ok(Update::Superseded),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::AppError;
    use crate::ai::provider::testing::ScriptedProvider;
    use crate::error::ErrorKind;

    const KANBAN: &str =
        "A project management tool with Kanban boards and real-time chat for remote teams.";
    const ORIGINAL: &str = "Our team finally ships on time.";

    /// Generation answers with [`ORIGINAL`]; customization echoes the tone.
    fn echo_provider() -> ScriptedProvider {
        ScriptedProvider::new(|prompt| {
            if let Some(tone) = tone_in(prompt) {
                Ok(serde_json::json!({ "customizedTestimonial": format!("{tone} version") })
                    .to_string())
            } else {
                Ok(serde_json::json!({ "testimonialDraft": ORIGINAL }).to_string())
            }
        })
    }

    fn tone_in(prompt: &str) -> Option<&str> {
        prompt
            .lines()
            .find_map(|line| line.strip_prefix("Tone: "))
    }

    #[tokio::test]
    async fn generate_then_customize() {
        let controller = Controller::new(Arc::new(echo_provider()));
        assert_eq!(
            controller.generate(KANBAN).await.unwrap(),
            Update::Displayed(ORIGINAL.to_string())
        );
        assert_eq!(
            controller.select_tone(Tone::Humorous).await.unwrap(),
            Update::Displayed("humorous version".to_string())
        );

        let session = controller.snapshot().await;
        assert_eq!(session.displayed(), Some("humorous version"));
        assert_eq!(session.original(), Some(ORIGINAL));
    }

    #[tokio::test]
    async fn short_details_never_reach_the_provider() {
        let provider = Arc::new(echo_provider());
        let controller = Controller::new(provider.clone());
        let err = controller.generate("too short").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(provider.calls(), 0);
        assert!(!controller.snapshot().await.is_busy());
    }

    #[tokio::test]
    async fn selection_before_any_draft_waits() {
        let provider = Arc::new(echo_provider());
        let controller = Controller::new(provider.clone());
        assert_eq!(
            controller.select_length(Length::Long).await.unwrap(),
            Update::Waiting
        );
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn customizations_always_start_from_the_original() {
        let provider = Arc::new(echo_provider());
        let controller = Controller::new(provider.clone());
        controller.generate(KANBAN).await.unwrap();
        controller.select_tone(Tone::Friendly).await.unwrap();
        controller.select_length(Length::Short).await.unwrap();

        let last_prompt = provider.prompts().pop().unwrap();
        assert!(last_prompt.contains(ORIGINAL));
        assert!(!last_prompt.contains("friendly version"));
        assert!(last_prompt.contains("Tone: friendly\n"));
        assert!(last_prompt.contains("Length: short\n"));
    }

    #[tokio::test]
    async fn later_selection_wins_even_when_answered_first() {
        let provider = Arc::new(echo_provider().with_delay(|prompt| match tone_in(prompt) {
            Some("friendly") => Duration::from_millis(150),
            Some(_) => Duration::from_millis(10),
            None => Duration::ZERO,
        }));
        let controller = Controller::new(provider);
        controller.generate(KANBAN).await.unwrap();

        let (slow, fast) = tokio::join!(
            controller.select_tone(Tone::Friendly),
            controller.select_tone(Tone::Humorous)
        );
        assert_eq!(slow.unwrap(), Update::Superseded);
        assert_eq!(fast.unwrap(), Update::Displayed("humorous version".to_string()));

        let session = controller.snapshot().await;
        assert_eq!(session.displayed(), Some("humorous version"));
        assert_eq!(session.tone(), Tone::Humorous);
        assert!(!session.is_customizing());
    }

    #[tokio::test]
    async fn provider_failure_keeps_the_displayed_draft() {
        let provider = ScriptedProvider::new(|prompt| {
            if tone_in(prompt).is_some() {
                Err(AppError::Provider("connection reset".to_string()))
            } else {
                Ok(serde_json::json!({ "testimonialDraft": ORIGINAL }).to_string())
            }
        });
        let controller = Controller::new(Arc::new(provider));
        controller.generate(KANBAN).await.unwrap();

        let err = controller.select_tone(Tone::Humorous).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);

        let session = controller.snapshot().await;
        assert_eq!(session.displayed(), Some(ORIGINAL));
        assert_eq!(
            session.notice().map(|n| n.message),
            Some("Failed to customize testimonial.")
        );
    }

    #[tokio::test]
    async fn failed_regeneration_changes_nothing() {
        let calls = AtomicUsize::new(0);
        let provider = ScriptedProvider::new(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(serde_json::json!({ "testimonialDraft": ORIGINAL }).to_string())
            } else {
                Err(AppError::Provider("503 from upstream".to_string()))
            }
        });
        let controller = Controller::new(Arc::new(provider));
        controller.generate(KANBAN).await.unwrap();

        let err = controller.generate(KANBAN).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        let session = controller.snapshot().await;
        assert_eq!(session.displayed(), Some(ORIGINAL));
        assert_eq!(session.original(), Some(ORIGINAL));
        assert_eq!(
            session.notice().map(|n| n.message),
            Some("Failed to generate testimonial.")
        );
    }

    #[tokio::test]
    async fn second_generation_while_pending_is_rejected() {
        let provider =
            Arc::new(echo_provider().with_delay(|_| Duration::from_millis(50)));
        let controller = Controller::new(provider.clone());
        let (first, second) = tokio::join!(controller.generate(KANBAN), controller.generate(KANBAN));
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err().kind(), ErrorKind::InFlight);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_answer_is_reported_like_any_failure() {
        let controller = Controller::new(Arc::new(ScriptedProvider::replying("not json")));
        let err = controller.generate(KANBAN).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaValidation);
        let session = controller.snapshot().await;
        assert_eq!(session.displayed(), None);
        assert!(session.notice().is_some());
    }
}
