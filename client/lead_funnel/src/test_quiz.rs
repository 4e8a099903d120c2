use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::analytics::{ClientContext, EventSink, IpCache, Visitor};
use crate::errors::{FunnelError, Result};
use crate::i18n::Language;
use crate::lead::{DeliveryStatus, LeadRequest, LeadResponse, LeadSink};
use crate::quiz::{FunnelServices, QuizController, QuizSettings, Step, Transition};
use crate::store::{Capital, LeadField, Motivation, Readiness, StepDataStore};
use crate::test_logs;
use crate::validation::ContactField;

#[derive(Default)]
struct RecordingEvents {
    events: Mutex<Vec<(String, Option<Value>)>>,
}

impl RecordingEvents {
    fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn last(&self, name: &str) -> Option<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .and_then(|(_, data)| data.clone())
    }
}

impl EventSink for RecordingEvents {
    fn log_event(&self, event: &str, data: Option<Value>) {
        self.events.lock().unwrap().push((event.to_string(), data));
    }
}

#[derive(Default)]
struct RecordingLeads {
    requests: Mutex<Vec<LeadRequest>>,
}

#[async_trait]
impl LeadSink for RecordingLeads {
    async fn submit(&self, request: &LeadRequest) -> Result<LeadResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(LeadResponse {
            telegram_sent: true,
        })
    }
}

struct UnreachableLeads;

#[async_trait]
impl LeadSink for UnreachableLeads {
    async fn submit(&self, _request: &LeadRequest) -> Result<LeadResponse> {
        Err(FunnelError::UnexpectedResponse {
            endpoint: "http://127.0.0.1:9/api/lead".to_string(),
            status: 503,
            content_type: "text/html".to_string(),
        })
    }
}

struct Harness {
    quiz: QuizController,
    store: StepDataStore,
    events: Arc<RecordingEvents>,
}

fn harness_with(leads: Arc<dyn LeadSink>) -> Harness {
    let events = Arc::new(RecordingEvents::default());
    let visitor = Visitor::new(
        ClientContext {
            user_agent: "test-agent".to_string(),
            language: "en-US".to_string(),
            platform: "linux-x86_64".to_string(),
            screen_width: 1280,
            screen_height: 720,
            timezone: "UTC".to_string(),
        },
        "https://funnel.example.com/quiz?utm_source=google&utm_campaign=spring",
        "",
        IpCache::new(),
    );
    let store = StepDataStore::new();
    let services = FunnelServices {
        events: events.clone(),
        leads,
        visitor: Arc::new(visitor),
    };
    let quiz = QuizController::new(
        store.clone(),
        services,
        QuizSettings {
            language: Language::En,
            reset_delay: Duration::from_millis(500),
        },
    );
    Harness {
        quiz,
        store,
        events,
    }
}

fn harness() -> (Harness, Arc<RecordingLeads>) {
    let leads = Arc::new(RecordingLeads::default());
    (harness_with(leads.clone()), leads)
}

fn answer_choices(quiz: &mut QuizController) {
    quiz.select_capital(Capital::From300To1000);
    assert!(matches!(quiz.forward(), Transition::Moved { .. }));
    quiz.select_motivation(Motivation::Crypto);
    assert!(matches!(quiz.forward(), Transition::Moved { .. }));
    quiz.select_readiness(Readiness::ReadyNow);
    assert!(matches!(quiz.forward(), Transition::Moved { .. }));
    assert_eq!(quiz.step(), Step::Contact);
}

fn fill_contact(quiz: &mut QuizController) {
    quiz.set_name("Jane");
    quiz.edit_phone("+41791234567", None);
    quiz.set_email("jane@x.com");
}

#[tokio::test]
async fn forward_advances_one_step_and_stops_at_done() {
    let (mut h, _) = harness();
    let expected = [Step::Motivation, Step::Readiness, Step::Contact];

    h.quiz.select_capital(Capital::UpTo200);
    h.quiz.select_motivation(Motivation::Scale);
    h.quiz.select_readiness(Readiness::NotSure);
    for to in expected {
        let from = h.quiz.step();
        match h.quiz.forward() {
            Transition::Moved { from: f, to: t } => {
                assert_eq!(f, from);
                assert_eq!(t, to);
                assert_eq!(t.position(), f.position() + 1);
            }
            other => panic!("unexpected transition {other:?}"),
        }
    }

    fill_contact(&mut h.quiz);
    assert!(matches!(h.quiz.forward(), Transition::Submitted { .. }));
    assert_eq!(h.quiz.step(), Step::Done);

    assert!(matches!(h.quiz.forward(), Transition::Stayed));
    assert_eq!(h.quiz.step(), Step::Done);
}

#[tokio::test]
async fn forward_without_answer_is_a_no_op() {
    let (mut h, _) = harness();
    assert!(!h.quiz.can_advance());
    assert!(matches!(h.quiz.forward(), Transition::Stayed));
    assert_eq!(h.quiz.step(), Step::Capital);

    h.quiz.select_capital(Capital::Over1000);
    h.quiz.forward();
    assert!(matches!(h.quiz.forward(), Transition::Stayed));
    assert_eq!(h.quiz.step(), Step::Motivation);

    h.quiz.select_motivation(Motivation::ExtraIncome);
    h.quiz.forward();
    // Unsetting an answer closes the gate again.
    h.quiz.set_field(LeadField::Readiness, "").unwrap();
    assert!(matches!(h.quiz.forward(), Transition::Stayed));
    assert_eq!(h.quiz.step(), Step::Readiness);
}

#[tokio::test]
async fn back_from_first_step_exits_the_funnel() {
    let (mut h, _) = harness();
    assert!(matches!(h.quiz.back(), Transition::Exit));
    assert_eq!(h.quiz.step(), Step::Capital);
}

#[tokio::test]
async fn back_decrements_and_keeps_answers() {
    let (mut h, _) = harness();
    answer_choices(&mut h.quiz);

    assert!(matches!(
        h.quiz.back(),
        Transition::Moved {
            from: Step::Contact,
            to: Step::Readiness
        }
    ));
    assert!(matches!(h.quiz.back(), Transition::Moved { .. }));
    assert!(matches!(h.quiz.back(), Transition::Moved { .. }));
    assert_eq!(h.quiz.step(), Step::Capital);
    assert_eq!(h.store.get().capital, Some(Capital::From300To1000));
}

#[tokio::test]
async fn start_emits_once_and_steps_carry_choices_only() {
    let (mut h, _) = harness();
    h.quiz.start();
    h.quiz.start();
    assert_eq!(h.events.names(), vec!["page_view", "quiz_start"]);

    h.quiz.set_name("Jane");
    answer_choices(&mut h.quiz);
    h.quiz.back();

    let names = h.events.names();
    assert_eq!(names.iter().filter(|n| *n == "quiz_step").count(), 4);

    let step = h.events.last("quiz_step").unwrap();
    assert_eq!(step["step"], 2);
    assert_eq!(step["capital"], "300-1000");
    assert_eq!(step["motivation"], "crypto");
    assert_eq!(step["readiness"], "ready-now");
    assert!(step.get("name").is_none());
    assert!(step.get("email").is_none());
}

#[tokio::test]
async fn blank_name_is_rejected_without_transition() {
    let (mut h, leads) = harness();
    answer_choices(&mut h.quiz);

    h.quiz.set_name("");
    h.quiz.set_field(LeadField::PhoneCountryCode, "+1").unwrap();
    h.quiz.set_field(LeadField::PhoneNationalNumber, "5551234567").unwrap();
    h.quiz.set_email("a@b.com");

    match h.quiz.forward() {
        Transition::Rejected(result) => {
            assert_eq!(result.errors().len(), 1);
            assert!(result.has(ContactField::Name));
        }
        other => panic!("unexpected transition {other:?}"),
    }
    assert_eq!(h.quiz.step(), Step::Contact);
    assert_eq!(h.quiz.errors().messages(), vec!["Enter your name".to_string()]);
    assert!(leads.requests.lock().unwrap().is_empty());

    let event = h.events.last("quiz_validation_error").unwrap();
    assert_eq!(event["errors"], serde_json::json!(["Enter your name"]));
}

#[tokio::test(start_paused = true)]
async fn valid_submission_reaches_done_and_clears_answers() {
    let (mut h, leads) = harness();
    answer_choices(&mut h.quiz);
    fill_contact(&mut h.quiz);

    let delivery = match h.quiz.forward() {
        Transition::Submitted { delivery } => delivery,
        other => panic!("unexpected transition {other:?}"),
    };
    assert_eq!(h.quiz.step(), Step::Done);
    assert!(h.quiz.errors().is_ok());
    assert_eq!(
        delivery.await.unwrap(),
        DeliveryStatus::Delivered {
            telegram_sent: true
        }
    );

    {
        let requests = leads.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let lead = &requests[0].lead;
        assert_eq!(lead.name, "Jane");
        assert_eq!(lead.phone, "+41791234567");
        assert_eq!(lead.email, "jane@x.com");
        assert_eq!(lead.capital, "300-1000");
        assert_eq!(lead.motivation, "crypto");
        assert_eq!(lead.readiness, "ready-now");
        assert_eq!(requests[0].utm_params.utm_source.as_deref(), Some("google"));
        assert_eq!(requests[0].utm_params.utm_campaign.as_deref(), Some("spring"));
    }

    let complete = h.events.last("quiz_complete").unwrap();
    assert_eq!(complete["phone"], "+41791234567");

    // Still populated until the reset timer fires.
    assert!(!h.store.get().is_empty());
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(h.store.get().is_empty());
    assert_eq!(h.quiz.phone_display(), "");
    assert_eq!(h.quiz.step(), Step::Done);
}

#[tokio::test(start_paused = true)]
async fn restart_after_done_starts_empty() {
    let (mut h, _) = harness();
    answer_choices(&mut h.quiz);
    fill_contact(&mut h.quiz);
    assert!(matches!(h.quiz.forward(), Transition::Submitted { .. }));

    h.store.reset();
    h.quiz.restart();
    assert_eq!(h.quiz.step(), Step::Capital);
    assert!(h.quiz.answers().is_empty());
    assert_eq!(h.quiz.progress(), (1, 4));

    // The aborted timer must not wipe answers given after the restart.
    h.quiz.select_capital(Capital::UpTo200);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.store.get().capital, Some(Capital::UpTo200));
}

#[tokio::test]
async fn failed_delivery_still_shows_confirmation() {
    let (logs, _guard) = test_logs::capture();
    let mut h = harness_with(Arc::new(UnreachableLeads));
    answer_choices(&mut h.quiz);
    fill_contact(&mut h.quiz);

    let delivery = match h.quiz.forward() {
        Transition::Submitted { delivery } => delivery,
        other => panic!("unexpected transition {other:?}"),
    };
    assert_eq!(delivery.await.unwrap(), DeliveryStatus::Failed);
    assert_eq!(h.quiz.step(), Step::Done);
    assert!(h.quiz.errors().is_ok());
    assert_eq!(logs.warnings_containing("Error sending lead (silent mode)"), 1);
}

#[tokio::test]
async fn back_from_done_leaves_the_funnel() {
    let (mut h, _) = harness();
    answer_choices(&mut h.quiz);
    fill_contact(&mut h.quiz);
    h.quiz.forward();

    assert!(matches!(h.quiz.back(), Transition::Exit));
    assert_eq!(h.quiz.step(), Step::Done);
    assert_eq!(h.quiz.progress(), (4, 4));
}

#[tokio::test]
async fn phone_edits_flow_into_the_store() {
    let (mut h, _) = harness();
    h.quiz.edit_phone("+41791234567", None);
    assert_eq!(h.store.get().phone_country_code, "+41");
    assert_eq!(h.store.get().phone_national_number, "791234567");

    let edit = h.quiz.edit_phone("791234567", Some(0));
    assert_eq!(edit.display, "+41791234567");
    assert_eq!(edit.caret, Some(3));

    h.quiz.edit_phone("", None);
    assert_eq!(h.quiz.phone_display(), "+41");
    assert_eq!(h.store.get().phone_national_number, "");

    // An external write replaces the field text.
    h.store.set_phone("+49", "15123456789");
    assert_eq!(h.quiz.phone_display(), "+4915123456789");
    assert_eq!(h.quiz.phone_focus(1), 3);
}
