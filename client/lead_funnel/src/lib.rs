//! # Lead Funnel
//!
//! Client-side core of a lead-capture quiz: three single-choice questions,
//! a contact form and a confirmation step.
//!
//! | Concern            | Module                        |
//! |--------------------|-------------------------------|
//! | Step sequencing    | [`quiz`]                      |
//! | Answers            | [`store`]                     |
//! | Phone field        | [`phone`]                     |
//! | Contact validation | [`validation`]                |
//! | Lead submission    | [`lead`]                      |
//! | Visitor analytics  | [`analytics`], [`event_log`], [`ip`] |
//! | Strings            | [`i18n`]                      |
//!
//! Nothing here is fatal to the process: malformed phone input is repaired
//! in place, validation failures become user-facing messages, and transport
//! failures are logged and swallowed.

pub mod analytics;
pub mod config;
pub mod errors;
pub mod event_log;
pub mod i18n;
pub mod ip;
pub mod lead;
pub mod phone;
pub mod quiz;
pub mod store;
pub mod validation;

#[cfg(test)]
mod test_logs;
#[cfg(test)]
mod test_quiz;

pub use errors::{FunnelError, Result};
pub use quiz::{FunnelServices, QuizController, QuizSettings, Step, Transition};
pub use store::{Capital, LeadAnswers, LeadField, Motivation, Readiness, StepDataStore};
