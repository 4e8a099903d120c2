//! Answers collected across the quiz steps.
//!
//! The three single-choice answers are typed enums so the record can never
//! hold an arbitrary string; the contact fields are free text. The phone
//! number is stored decomposed into its country calling code and national
//! number, the composed text belongs to [`crate::phone::PhoneReconciler`].

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::errors::{FunnelError, Result};

/// Starting capital the visitor is willing to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capital {
    #[serde(rename = "up-to-200")]
    UpTo200,
    #[serde(rename = "300-1000")]
    From300To1000,
    #[serde(rename = "over-1000")]
    Over1000,
}

/// What drives the visitor to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Motivation {
    ExtraIncome,
    ChangeJob,
    Crypto,
    Scale,
}

/// How soon the visitor is ready to start after a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Readiness {
    ReadyNow,
    ReadyWeek,
    NeedDetails,
    NotSure,
}

impl Capital {
    pub const ALL: [Capital; 3] = [Self::UpTo200, Self::From300To1000, Self::Over1000];

    /// Wire value sent to the lead endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpTo200 => "up-to-200",
            Self::From300To1000 => "300-1000",
            Self::Over1000 => "over-1000",
        }
    }
}

impl Motivation {
    pub const ALL: [Motivation; 4] = [
        Self::ExtraIncome,
        Self::ChangeJob,
        Self::Crypto,
        Self::Scale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtraIncome => "extra-income",
            Self::ChangeJob => "change-job",
            Self::Crypto => "crypto",
            Self::Scale => "scale",
        }
    }
}

impl Readiness {
    pub const ALL: [Readiness; 4] = [
        Self::ReadyNow,
        Self::ReadyWeek,
        Self::NeedDetails,
        Self::NotSure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadyNow => "ready-now",
            Self::ReadyWeek => "ready-week",
            Self::NeedDetails => "need-details",
            Self::NotSure => "not-sure",
        }
    }
}

macro_rules! impl_option_from_str {
    ($ty:ident, $field:literal) => {
        impl FromStr for $ty {
            type Err = FunnelError;

            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|option| option.as_str() == s)
                    .ok_or_else(|| FunnelError::UnknownOption {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_option_from_str!(Capital, "capital");
impl_option_from_str!(Motivation, "motivation");
impl_option_from_str!(Readiness, "readiness");

/// Wire value of an optional answer; unset answers are sent as `""`.
pub fn wire_value<T, F>(answer: Option<T>, as_str: F) -> &'static str
where
    F: Fn(&T) -> &'static str,
{
    answer.as_ref().map(as_str).unwrap_or("")
}

/// Individually addressable fields of [`LeadAnswers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadField {
    Name,
    PhoneCountryCode,
    PhoneNationalNumber,
    Email,
    Readiness,
    Motivation,
    Capital,
}

impl LeadField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::PhoneCountryCode => "phoneCountryCode",
            Self::PhoneNationalNumber => "phoneNationalNumber",
            Self::Email => "email",
            Self::Readiness => "readiness",
            Self::Motivation => "motivation",
            Self::Capital => "capital",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadAnswers {
    pub name: String,
    /// `+` followed by 1-4 digits, empty until set.
    pub phone_country_code: String,
    /// Digits only, at most 15.
    pub phone_national_number: String,
    pub email: String,
    pub readiness: Option<Readiness>,
    pub motivation: Option<Motivation>,
    pub capital: Option<Capital>,
}

impl LeadAnswers {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Replace exactly one field from its textual form.
    ///
    /// Enum fields accept their wire value or `""` (unset); anything else is
    /// rejected and the record is left untouched.
    pub fn set(&mut self, field: LeadField, value: &str) -> Result<()> {
        match field {
            LeadField::Name => self.name = value.to_string(),
            LeadField::PhoneCountryCode => self.phone_country_code = value.to_string(),
            LeadField::PhoneNationalNumber => self.phone_national_number = value.to_string(),
            LeadField::Email => self.email = value.to_string(),
            LeadField::Readiness => self.readiness = parse_optional(value)?,
            LeadField::Motivation => self.motivation = parse_optional(value)?,
            LeadField::Capital => self.capital = parse_optional(value)?,
        }
        Ok(())
    }
}

fn parse_optional<T: FromStr<Err = FunnelError>>(value: &str) -> Result<Option<T>> {
    if value.is_empty() {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

/// Shared handle over the funnel's [`LeadAnswers`].
///
/// Clones share the same record, which lets the one-shot reset timer clear
/// the answers after the controller has moved on.
#[derive(Debug, Clone, Default)]
pub struct StepDataStore {
    inner: Arc<Mutex<LeadAnswers>>,
}

impl StepDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current answers.
    pub fn get(&self) -> LeadAnswers {
        self.lock().clone()
    }

    pub fn set(&self, field: LeadField, value: &str) -> Result<()> {
        self.lock().set(field, value)
    }

    pub fn set_name(&self, name: &str) {
        self.lock().name = name.to_string();
    }

    pub fn set_email(&self, email: &str) {
        self.lock().email = email.to_string();
    }

    pub fn set_capital(&self, capital: Option<Capital>) {
        self.lock().capital = capital;
    }

    pub fn set_motivation(&self, motivation: Option<Motivation>) {
        self.lock().motivation = motivation;
    }

    pub fn set_readiness(&self, readiness: Option<Readiness>) {
        self.lock().readiness = readiness;
    }

    /// Write the decomposed phone pair in one step.
    pub fn set_phone(&self, country_code: &str, national_number: &str) {
        let mut answers = self.lock();
        answers.phone_country_code = country_code.to_string();
        answers.phone_national_number = national_number.to_string();
    }

    pub fn reset(&self) {
        *self.lock() = LeadAnswers::default();
    }

    fn lock(&self) -> MutexGuard<'_, LeadAnswers> {
        // A panic while holding the lock cannot leave the record half-written.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
