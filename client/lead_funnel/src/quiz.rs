//! Quiz step controller.
//!
//! ```text
//! Capital ──► Motivation ──► Readiness ──► Contact ──► Done
//!    │  ◄──────────┘ ◄───────────┘ ◄──────────┘         │
//!    └──► (leave funnel)                  (leave funnel)◄┘
//! ```
//!
//! Forward moves out of the single-choice steps are gated on the step's
//! answer. Leaving `Contact` runs validation and, when it passes, dispatches
//! the lead on a detached task and enters `Done` without waiting for it. A
//! one-shot timer clears the answers shortly after `Done` is reached.
//!
//! The controller must be driven from within a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::analytics::{names, EventSink, Visitor};
use crate::errors::Result;
use crate::i18n::{Language, Messages};
use crate::lead::{self, DeliveryStatus, LeadPayload, LeadRequest, LeadSink};
use crate::phone::{DeleteKey, PhoneEdit, PhoneReconciler};
use crate::store::{
    wire_value, Capital, LeadAnswers, LeadField, Motivation, Readiness, StepDataStore,
};
use crate::validation::{validate_contact, ValidationResult};

/// Steps shown by the progress indicator (the confirmation step is not counted).
pub const TOTAL_STEPS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Capital,
    Motivation,
    Readiness,
    Contact,
    Done,
}

impl Step {
    pub fn position(&self) -> u8 {
        match self {
            Self::Capital => 0,
            Self::Motivation => 1,
            Self::Readiness => 2,
            Self::Contact => 3,
            Self::Done => 4,
        }
    }

    pub fn from_position(position: u8) -> Option<Self> {
        match position {
            0 => Some(Self::Capital),
            1 => Some(Self::Motivation),
            2 => Some(Self::Readiness),
            3 => Some(Self::Contact),
            4 => Some(Self::Done),
            _ => None,
        }
    }

    fn next(&self) -> Option<Self> {
        Self::from_position(self.position() + 1)
    }

    fn previous(&self) -> Option<Self> {
        self.position().checked_sub(1).and_then(Self::from_position)
    }
}

/// Result of a navigation request.
#[derive(Debug)]
pub enum Transition {
    Moved { from: Step, to: Step },
    /// The request was refused and the step is unchanged.
    Stayed,
    /// The contact step failed validation.
    Rejected(ValidationResult),
    /// The lead was dispatched and the controller is now at [`Step::Done`].
    ///
    /// The handle reports the delivery outcome; the controller never awaits it.
    Submitted {
        delivery: JoinHandle<DeliveryStatus>,
    },
    /// The visitor left the funnel for the entry page.
    Exit,
}

/// External collaborators of the controller.
#[derive(Clone)]
pub struct FunnelServices {
    pub events: Arc<dyn EventSink>,
    pub leads: Arc<dyn LeadSink>,
    pub visitor: Arc<Visitor>,
}

#[derive(Debug, Clone, Copy)]
pub struct QuizSettings {
    pub language: Language,
    /// Delay between entering [`Step::Done`] and clearing the answers.
    pub reset_delay: Duration,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            language: Language::Ru,
            reset_delay: Duration::from_millis(500),
        }
    }
}

pub struct QuizController {
    step: Step,
    store: StepDataStore,
    phone: PhoneReconciler,
    services: FunnelServices,
    settings: QuizSettings,
    errors: ValidationResult,
    started: bool,
    pending_reset: Option<JoinHandle<()>>,
}

impl QuizController {
    pub fn new(store: StepDataStore, services: FunnelServices, settings: QuizSettings) -> Self {
        let answers = store.get();
        Self {
            step: Step::Capital,
            phone: PhoneReconciler::new(
                &answers.phone_country_code,
                &answers.phone_national_number,
            ),
            store,
            services,
            settings,
            errors: ValidationResult::default(),
            started: false,
            pending_reset: None,
        }
    }

    /// Announce the funnel. Only the first call emits events.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        info!("Quiz funnel started");
        self.services.events.log_event(names::PAGE_VIEW, None);
        self.services.events.log_event(names::QUIZ_START, None);
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// `(current, total)` as shown by the progress indicator.
    pub fn progress(&self) -> (u8, u8) {
        ((self.step.position() + 1).min(TOTAL_STEPS), TOTAL_STEPS)
    }

    pub fn store(&self) -> &StepDataStore {
        &self.store
    }

    pub fn answers(&self) -> LeadAnswers {
        self.store.get()
    }

    pub fn messages(&self) -> &'static Messages {
        self.settings.language.messages()
    }

    /// Errors of the latest contact submission attempt.
    pub fn errors(&self) -> &ValidationResult {
        &self.errors
    }

    // ─── Answers ──────────────────────────────────────────

    pub fn select_capital(&mut self, capital: Capital) {
        self.store.set_capital(Some(capital));
    }

    pub fn select_motivation(&mut self, motivation: Motivation) {
        self.store.set_motivation(Some(motivation));
    }

    pub fn select_readiness(&mut self, readiness: Readiness) {
        self.store.set_readiness(Some(readiness));
    }

    pub fn set_name(&mut self, name: &str) {
        self.store.set_name(name);
    }

    pub fn set_email(&mut self, email: &str) {
        self.store.set_email(email);
    }

    /// Set any field from its textual form.
    pub fn set_field(&mut self, field: LeadField, value: &str) -> Result<()> {
        self.store.set(field, value)?;
        debug!("Field {} updated", field.as_str());
        self.sync_phone();
        Ok(())
    }

    // ─── Phone field ──────────────────────────────────────

    /// Reconcile a raw edit of the phone field and store the resulting pair.
    pub fn edit_phone(&mut self, text: &str, caret: Option<usize>) -> PhoneEdit {
        let edit = self.phone.apply_user_edit(text, caret);
        self.store.set_phone(&edit.country_code, &edit.national_number);
        self.sync_phone();
        edit
    }

    /// Current phone field text, after adopting any external change.
    pub fn phone_display(&mut self) -> &str {
        self.sync_phone();
        self.phone.display()
    }

    pub fn phone_focus(&mut self, caret: usize) -> usize {
        self.sync_phone();
        self.phone.on_focus(caret)
    }

    pub fn phone_blocks_delete(&mut self, key: DeleteKey, selection: (usize, usize)) -> bool {
        self.sync_phone();
        self.phone.blocks_delete(key, selection)
    }

    fn sync_phone(&mut self) {
        let answers = self.store.get();
        if self
            .phone
            .sync_external(&answers.phone_country_code, &answers.phone_national_number)
        {
            debug!("Phone field replaced by external write");
        }
    }

    // ─── Navigation ───────────────────────────────────────

    /// Whether a forward request would be considered from the current step.
    pub fn can_advance(&self) -> bool {
        let answers = self.store.get();
        match self.step {
            Step::Capital => answers.capital.is_some(),
            Step::Motivation => answers.motivation.is_some(),
            Step::Readiness => answers.readiness.is_some(),
            Step::Contact => true,
            Step::Done => false,
        }
    }

    pub fn forward(&mut self) -> Transition {
        if !self.can_advance() {
            debug!("Forward refused at {:?}", self.step);
            return Transition::Stayed;
        }
        match self.step {
            Step::Contact => self.submit(),
            from => match from.next() {
                Some(to) => {
                    self.enter(to);
                    Transition::Moved { from, to }
                }
                None => Transition::Stayed,
            },
        }
    }

    pub fn back(&mut self) -> Transition {
        match self.step {
            Step::Capital | Step::Done => {
                info!("Leaving quiz funnel from {:?}", self.step);
                Transition::Exit
            }
            from => match from.previous() {
                Some(to) => {
                    self.enter(to);
                    Transition::Moved { from, to }
                }
                None => Transition::Exit,
            },
        }
    }

    /// Start over at [`Step::Capital`] with empty answers.
    pub fn restart(&mut self) {
        if let Some(pending) = self.pending_reset.take() {
            pending.abort();
        }
        self.store.reset();
        self.errors = ValidationResult::default();
        self.sync_phone();
        self.step = Step::Capital;
    }

    fn enter(&mut self, to: Step) {
        self.step = to;
        if matches!(to, Step::Motivation | Step::Readiness | Step::Contact) {
            let answers = self.store.get();
            self.services.events.log_event(
                names::QUIZ_STEP,
                Some(json!({
                    "step": to.position(),
                    "capital": wire_value(answers.capital, Capital::as_str),
                    "motivation": wire_value(answers.motivation, Motivation::as_str),
                    "readiness": wire_value(answers.readiness, Readiness::as_str),
                })),
            );
        }
    }

    fn submit(&mut self) -> Transition {
        let answers = self.store.get();
        let result = validate_contact(&answers, self.messages());

        if !result.is_ok() {
            debug!("Contact step rejected with {} error(s)", result.errors().len());
            self.services.events.log_event(
                names::QUIZ_VALIDATION_ERROR,
                Some(json!({ "errors": result.messages() })),
            );
            self.errors = result.clone();
            return Transition::Rejected(result);
        }
        self.errors = ValidationResult::default();

        let payload = LeadPayload::from_answers(&answers);
        self.services
            .events
            .log_event(names::QUIZ_COMPLETE, serde_json::to_value(&payload).ok());

        let request = LeadRequest {
            lead: payload,
            utm_params: self.services.visitor.utm.clone(),
            user_data: self.services.visitor.user_data(),
        };
        let delivery = lead::dispatch(self.services.leads.clone(), request);

        self.enter(Step::Done);
        self.schedule_reset();
        Transition::Submitted { delivery }
    }

    fn schedule_reset(&mut self) {
        if let Some(previous) = self.pending_reset.take() {
            previous.abort();
        }
        let store = self.store.clone();
        let delay = self.settings.reset_delay;
        self.pending_reset = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.reset();
            debug!("Answers cleared after submission");
        }));
    }
}
