//! Contact-step validation.

use serde::Serialize;

use crate::i18n::Messages;
use crate::phone;
use crate::store::LeadAnswers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactField {
    Name,
    Phone,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: ContactField,
    pub message: String,
}

/// Every failure found in one submission attempt, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<FieldError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has(&self, field: ContactField) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Messages in display order.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    fn push(&mut self, field: ContactField, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }
}

/// Check the contact fields, collecting all failures.
pub fn validate_contact(answers: &LeadAnswers, messages: &Messages) -> ValidationResult {
    let mut result = ValidationResult::default();

    if answers.name.trim().is_empty() {
        result.push(ContactField::Name, messages.contact.name_error);
    }

    if !phone::is_valid_phone(&answers.phone_country_code, &answers.phone_national_number) {
        result.push(ContactField::Phone, messages.contact.phone_error);
    }

    let email = answers.email.trim();
    if email.is_empty() || !email.contains('@') {
        result.push(ContactField::Email, messages.contact.email_error);
    }

    result
}
