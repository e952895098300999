use tracing::debug;

use super::choices::{Length, Tone};
use crate::ai::customize_testimonial::CustomizationRequest;
use crate::{AppError, AppResult};

/// Identifies one provider call issued by the session.
///
/// Tickets increase monotonically; a result is applied only while its ticket
/// is still the one the session is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Generate,
    Customize,
}

impl Operation {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::Generate => "Failed to generate testimonial.",
            Operation::Customize => "Failed to customize testimonial.",
        }
    }
}

/// User-visible report of a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub operation: Operation,
    pub message: &'static str,
    pub detail: String,
}

/// State behind the testimonial screen.
///
/// Every change goes through one of the transition methods. The original
/// draft is written only by [`Session::generate_succeeded`]; customizations
/// always start from it, never from what is currently displayed.
#[derive(Debug, Clone, Default)]
pub struct Session {
    tone: Tone,
    length: Length,
    original: Option<String>,
    displayed: Option<String>,
    generation: Option<Ticket>,
    customization: Option<Ticket>,
    last_ticket: u64,
    notice: Option<Notice>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn length(&self) -> Length {
        self.length
    }

    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    pub fn displayed(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_some()
    }

    pub fn is_customizing(&self) -> bool {
        self.customization.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.is_generating() || self.is_customizing()
    }

    fn next_ticket(&mut self) -> Ticket {
        self.last_ticket += 1;
        Ticket(self.last_ticket)
    }

    /// Start a generation. Only one may be pending at a time.
    pub fn generate_requested(&mut self) -> AppResult<Ticket> {
        if self.generation.is_some() {
            return Err(AppError::InFlight("testimonial generation"));
        }
        let ticket = self.next_ticket();
        self.generation = Some(ticket);
        debug!(?ticket, "Generation requested");
        Ok(ticket)
    }

    /// Store a fresh draft as both original and displayed text.
    ///
    /// Selections return to their defaults and any pending customization of
    /// the previous draft is dropped.
    pub fn generate_succeeded(&mut self, ticket: Ticket, draft: String) -> bool {
        if self.generation != Some(ticket) {
            debug!(?ticket, "Ignoring stale generation result");
            return false;
        }
        self.generation = None;
        self.customization = None;
        self.tone = Tone::default();
        self.length = Length::default();
        self.original = Some(draft.clone());
        self.displayed = Some(draft);
        self.notice = None;
        true
    }

    /// Record a tone and/or length selection.
    ///
    /// When an original draft exists, returns the request to run together
    /// with a ticket that supersedes any earlier customization.
    pub fn customize_requested(
        &mut self,
        tone: Option<Tone>,
        length: Option<Length>,
    ) -> Option<(Ticket, CustomizationRequest)> {
        if let Some(tone) = tone {
            self.tone = tone;
        }
        if let Some(length) = length {
            self.length = length;
        }
        let original = self.original.clone()?;
        let ticket = self.next_ticket();
        if let Some(previous) = self.customization.replace(ticket) {
            debug!(?previous, ?ticket, "Superseding pending customization");
        }
        let request = CustomizationRequest::new(original)
            .tone(self.tone.as_str())
            .length(self.length.as_str());
        Some((ticket, request))
    }

    /// Display a customized draft if it answers the latest request.
    pub fn customize_succeeded(&mut self, ticket: Ticket, customized: String) -> bool {
        if self.customization != Some(ticket) {
            debug!(?ticket, "Ignoring superseded customization result");
            return false;
        }
        self.customization = None;
        self.displayed = Some(customized);
        self.notice = None;
        true
    }

    /// Record a failed call. Displayed text and the original draft are kept.
    ///
    /// Returns the notice to show, or `None` when the call had already been
    /// superseded.
    pub fn failed(&mut self, ticket: Ticket, error: &AppError) -> Option<&Notice> {
        let operation = if self.generation == Some(ticket) {
            self.generation = None;
            Operation::Generate
        } else if self.customization == Some(ticket) {
            self.customization = None;
            Operation::Customize
        } else {
            debug!(?ticket, "Ignoring failure of superseded call");
            return None;
        };
        self.notice = Some(Notice {
            operation,
            message: operation.failure_message(),
            detail: error.to_string(),
        });
        self.notice.as_ref()
    }
}
