//! Phone field reconciliation.
//!
//! The phone input shows a single line of text (`+41791234567`) while the
//! answers only ever hold the decomposed pair (`+41`, `791234567`). The
//! [`PhoneReconciler`] keeps both sides consistent:
//!
//! * user edits are parsed against the numbering plan and split into the
//!   pair, with a manual fallback for numbers that are still being typed;
//! * an edit that wipes out a known country code has the prefix restored;
//! * external writes (e.g. a reset) overwrite the text, while the echo of the
//!   reconciler's own write is ignored;
//! * the caret can never rest inside the country-code prefix, and deletions
//!   that would touch the prefix are suppressed.

use std::sync::OnceLock;

use phonenumber::metadata::DATABASE;
use phonenumber::{Mode, PhoneNumber};
use regex::Regex;
use tracing::debug;

/// Maximum number of digits kept in the national number.
pub const MAX_NATIONAL_DIGITS: usize = 15;

/// `+` followed by 1-4 digits at the start of the text.
fn prefix_pattern() -> Option<&'static Regex> {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    PREFIX
        .get_or_init(|| Regex::new(r"(?s)^(\+[0-9]{1,4})(.*)$").ok())
        .as_ref()
}

/// Where the latest state transition of a [`PhoneReconciler`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Text typed into the field.
    User,
    /// The country code / national number pair was written from outside.
    External,
}

/// Key that removes text from the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKey {
    Backspace,
    Delete,
}

/// Result of reconciling one user edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneEdit {
    pub country_code: String,
    pub national_number: String,
    pub display: String,
    /// Caret position (in characters) after the edit, if one was supplied.
    pub caret: Option<usize>,
}

/// A phone number split by the numbering-plan parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPhone {
    /// `+` and the country calling code, e.g. `+41`.
    pub country_code: String,
    /// National significant number, e.g. `791234567`.
    pub national_number: String,
    /// E.164 form, e.g. `+41791234567`.
    pub international: String,
}

/// Parse `text` as an international number and split it.
///
/// Returns `None` when the text does not parse under a numbering plan, or
/// when its national number has no possible length in that plan. Ranges the
/// plan has not assigned yet (e.g. `+1 555 123 4567`) are accepted.
pub fn parse_phone(text: &str) -> Option<ParsedPhone> {
    let number = phonenumber::parse(None, text).ok()?;

    let international = number.format().mode(Mode::E164).to_string();
    let country_code = format!("+{}", number.code().value());
    // E.164 keeps the national number's leading zeros, unlike its numeric value.
    let national_number = international
        .strip_prefix(&country_code)
        .map(str::to_string)?;

    if !has_possible_length(&number, &national_number) {
        return None;
    }

    Some(ParsedPhone {
        country_code,
        national_number,
        international,
    })
}

fn has_possible_length(number: &PhoneNumber, national_number: &str) -> bool {
    let length = national_number.chars().count() as u16;
    DATABASE
        .by_code(&number.code().value())
        .map_or(false, |regions| {
            regions.iter().any(|meta| {
                meta.descriptors()
                    .general()
                    .possible_length()
                    .contains(&length)
            })
        })
}

/// `true` when the pair forms a dialable number.
pub fn is_valid_phone(country_code: &str, national_number: &str) -> bool {
    let country_code = country_code.trim();
    let national_number = national_number.trim();
    if country_code.is_empty() || national_number.is_empty() {
        return false;
    }
    parse_phone(&format!("{country_code}{national_number}")).is_some()
}

/// Canonical international form of the pair.
///
/// Falls back to the raw concatenation with everything but digits and `+`
/// removed when the parser rejects it.
pub fn to_international(country_code: &str, national_number: &str) -> String {
    let raw = format!("{country_code}{national_number}");
    match parse_phone(&raw) {
        Some(parsed) => parsed.international,
        None => {
            debug!("Phone normalization fell back to raw digits for {raw:?}");
            raw.chars()
                .filter(|c| c.is_ascii_digit() || *c == '+')
                .collect()
        }
    }
}

/// Text shown for a decomposed pair.
pub fn compose(country_code: &str, national_number: &str) -> String {
    match (country_code.is_empty(), national_number.is_empty()) {
        (true, true) => String::new(),
        (false, true) => country_code.to_string(),
        _ => format!("{country_code}{national_number}"),
    }
}

fn digits_only(text: &str, limit: usize) -> String {
    text.chars().filter(char::is_ascii_digit).take(limit).collect()
}

fn truncate_digits(national_number: &str) -> String {
    national_number.chars().take(MAX_NATIONAL_DIGITS).collect()
}

/// Position just after the `digits`-th digit of `display`.
fn caret_after_digits(display: &str, digits: usize) -> usize {
    if digits == 0 {
        return 0;
    }
    let mut seen = 0;
    for (idx, c) in display.chars().enumerate() {
        if c.is_ascii_digit() {
            seen += 1;
            if seen == digits {
                return idx + 1;
            }
        }
    }
    display.chars().count()
}

/// Reconciles the phone field's text with the decomposed answer pair.
#[derive(Debug, Clone)]
pub struct PhoneReconciler {
    display: String,
    country_code: String,
    national_number: String,
    origin: Origin,
}

impl Default for PhoneReconciler {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl PhoneReconciler {
    /// Start from an existing pair, as if it had been written externally.
    pub fn new(country_code: &str, national_number: &str) -> Self {
        Self {
            display: compose(country_code, national_number),
            country_code: country_code.to_string(),
            national_number: national_number.to_string(),
            origin: Origin::External,
        }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn national_number(&self) -> &str {
        &self.national_number
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Length of the protected prefix, in characters.
    fn prefix_len(&self) -> usize {
        self.country_code.chars().count()
    }

    /// Adopt a pair written from outside the field.
    ///
    /// A pair identical to the one currently held is either the echo of the
    /// reconciler's own last edit or a no-op, and leaves the text untouched.
    /// Returns `true` when the displayed text was replaced.
    pub fn sync_external(&mut self, country_code: &str, national_number: &str) -> bool {
        if country_code == self.country_code && national_number == self.national_number {
            if self.origin == Origin::User {
                debug!("Ignoring echo of own phone edit");
            }
            return false;
        }

        self.country_code = country_code.to_string();
        self.national_number = national_number.to_string();
        self.display = compose(country_code, national_number);
        self.origin = Origin::External;
        true
    }

    /// Reconcile a raw edit of the field's text.
    ///
    /// `caret` is the caret position (in characters of `text`) reported by
    /// the input surface, if any. It is carried over to the normalized text
    /// by the number of digits in front of it.
    pub fn apply_user_edit(&mut self, text: &str, caret: Option<usize>) -> PhoneEdit {
        // The origin is recorded before the new pair is handed to any setter,
        // so the resulting external notification is recognised as an echo.
        self.origin = Origin::User;

        let mut digits_before =
            caret.map(|pos| text.chars().take(pos).filter(char::is_ascii_digit).count());

        if text.trim().is_empty() {
            self.national_number.clear();
            self.display = self.country_code.clone();
            return self.edit_result(digits_before);
        }

        let repaired = self.restore_prefix(text.trim());
        if repaired != text.trim() {
            let restored = self.country_code.chars().filter(char::is_ascii_digit).count();
            digits_before = digits_before.map(|n| n + restored);
        }

        match parse_phone(&repaired) {
            Some(parsed) => {
                debug!("Phone parsed: {} {}", parsed.country_code, parsed.national_number);
                self.country_code = parsed.country_code;
                self.national_number = truncate_digits(&parsed.national_number);
            }
            None => {
                let (country_code, rest) = self.split_prefix(&repaired);
                debug!("Phone extracted manually: {country_code} {rest}");
                self.national_number = digits_only(&rest, MAX_NATIONAL_DIGITS);
                self.country_code = country_code;
            }
        }

        self.display = compose(&self.country_code, &self.national_number);
        self.edit_result(digits_before)
    }

    /// Re-insert the known country code when the edit removed it.
    fn restore_prefix(&self, text: &str) -> String {
        if self.country_code.is_empty() || prefix_pattern().is_some_and(|re| re.is_match(text)) {
            return text.to_string();
        }
        debug!("Restoring deleted phone prefix {}", self.country_code);
        let rest = text.trim_start_matches('+');
        format!("{}{}", self.country_code, rest)
    }

    /// Split text the parser rejected into a prefix and the remainder.
    fn split_prefix(&self, text: &str) -> (String, String) {
        if !self.country_code.is_empty() {
            if let Some(rest) = text.strip_prefix(self.country_code.as_str()) {
                return (self.country_code.clone(), rest.to_string());
            }
        }
        match prefix_pattern().and_then(|re| re.captures(text)) {
            Some(caps) => (caps[1].to_string(), caps[2].to_string()),
            None => (self.country_code.clone(), text.to_string()),
        }
    }

    fn edit_result(&self, digits_before: Option<usize>) -> PhoneEdit {
        PhoneEdit {
            country_code: self.country_code.clone(),
            national_number: self.national_number.clone(),
            display: self.display.clone(),
            caret: digits_before
                .map(|digits| self.clamp_caret(caret_after_digits(&self.display, digits))),
        }
    }

    /// Move a caret out of the prefix and inside the text.
    pub fn clamp_caret(&self, caret: usize) -> usize {
        let len = self.display.chars().count();
        caret.min(len).max(self.prefix_len().min(len))
    }

    /// Caret position to use when the field gains focus.
    pub fn on_focus(&self, caret: usize) -> usize {
        self.clamp_caret(caret)
    }

    /// `true` when a delete key press must be swallowed because it would
    /// remove part of the country-code prefix.
    ///
    /// `selection` is `(start, end)` in characters; a collapsed caret has
    /// `start == end`.
    pub fn blocks_delete(&self, key: DeleteKey, selection: (usize, usize)) -> bool {
        let prefix = self.prefix_len();
        if prefix == 0 {
            return false;
        }
        let (start, end) = if selection.0 <= selection.1 {
            selection
        } else {
            (selection.1, selection.0)
        };

        if start != end {
            return start < prefix;
        }
        match key {
            DeleteKey::Backspace => start <= prefix,
            DeleteKey::Delete => start < prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn established() -> PhoneReconciler {
        let mut phone = PhoneReconciler::default();
        phone.apply_user_edit("+41791234567", None);
        phone
    }

    #[test]
    fn full_number_is_split_by_the_parser() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("+41791234567", None);
        assert_eq!(edit.country_code, "+41");
        assert_eq!(edit.national_number, "791234567");
        assert_eq!(edit.display, "+41791234567");
        assert_eq!(phone.origin(), Origin::User);
    }

    #[test]
    fn formatted_input_is_normalized() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("+41 79 123 45 67", None);
        assert_eq!(edit.country_code, "+41");
        assert_eq!(edit.national_number, "791234567");
        assert_eq!(edit.display, "+41791234567");
    }

    #[test]
    fn deleted_prefix_is_restored() {
        let mut phone = established();
        let edit = phone.apply_user_edit("791234567", None);
        assert_eq!(edit.country_code, "+41");
        assert_eq!(edit.national_number, "791234567");
        assert_eq!(edit.display, "+41791234567");
    }

    #[test]
    fn incomplete_number_keeps_known_prefix() {
        let mut phone = established();
        let edit = phone.apply_user_edit("+417912", None);
        assert_eq!(edit.country_code, "+41");
        assert_eq!(edit.national_number, "7912");
        assert_eq!(edit.display, "+417912");
    }

    #[test]
    fn unknown_prefix_falls_back_to_pattern() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("+44 12", None);
        assert_eq!(edit.country_code, "+44");
        assert_eq!(edit.national_number, "12");
        assert_eq!(edit.display, "+4412");
    }

    #[test]
    fn national_number_is_capped_at_fifteen_digits() {
        let mut phone = established();
        let edit = phone.apply_user_edit("+41123456789012345678", None);
        assert_eq!(edit.country_code, "+41");
        assert_eq!(edit.national_number, "123456789012345");
        assert_eq!(edit.national_number.len(), MAX_NATIONAL_DIGITS);
    }

    #[test]
    fn cap_applies_without_known_prefix() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("+1 2345 6789 0123 4567 89", None);
        assert!(edit.national_number.len() <= MAX_NATIONAL_DIGITS);
        assert!(edit.national_number.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn clearing_keeps_country_code() {
        let mut phone = established();
        let edit = phone.apply_user_edit("   ", None);
        assert_eq!(edit.country_code, "+41");
        assert_eq!(edit.national_number, "");
        assert_eq!(edit.display, "+41");
    }

    #[test]
    fn clearing_an_empty_field_stays_empty() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("", Some(0));
        assert_eq!(edit.display, "");
        assert_eq!(edit.caret, Some(0));
    }

    #[test]
    fn text_without_prefix_and_no_known_code() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("79-123", None);
        assert_eq!(edit.country_code, "");
        assert_eq!(edit.national_number, "79123");
        assert_eq!(edit.display, "79123");
    }

    #[test]
    fn external_write_replaces_display() {
        let mut phone = established();
        assert!(phone.sync_external("", ""));
        assert_eq!(phone.display(), "");
        assert_eq!(phone.origin(), Origin::External);

        assert!(phone.sync_external("+49", ""));
        assert_eq!(phone.display(), "+49");
    }

    #[test]
    fn echo_of_own_edit_is_ignored() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("+41791234567", None);
        assert!(!phone.sync_external(&edit.country_code, &edit.national_number));
        assert_eq!(phone.origin(), Origin::User);
        assert_eq!(phone.display(), "+41791234567");
    }

    #[test]
    fn caret_inside_prefix_is_moved_after_it() {
        let mut phone = established();
        let edit = phone.apply_user_edit("+41791234567", Some(1));
        assert_eq!(edit.caret, Some(3));
        assert_eq!(phone.on_focus(0), 3);
        assert_eq!(phone.on_focus(5), 5);
        assert_eq!(phone.on_focus(99), 12);
    }

    #[test]
    fn caret_follows_digits_through_normalization() {
        let mut phone = PhoneReconciler::default();
        // "+41 79 1|23 45 67"
        let edit = phone.apply_user_edit("+41 79 123 45 67", Some(8));
        assert_eq!(edit.display, "+41791234567");
        assert_eq!(edit.caret, Some(6));
    }

    #[test]
    fn caret_accounts_for_restored_prefix() {
        let mut phone = established();
        // "79123|4567" with the "+41" removed.
        let edit = phone.apply_user_edit("791234567", Some(5));
        assert_eq!(edit.display, "+41791234567");
        assert_eq!(edit.caret, Some(8));
    }

    #[test]
    fn caret_at_end_stays_at_end() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("+41 79 123 45 67", Some(16));
        assert_eq!(edit.caret, Some(12));
    }

    #[test]
    fn non_ascii_digits_never_form_a_prefix() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("+\u{664}\u{661}\u{667}\u{669}\u{661}\u{662}", None);
        let code_digits = edit.country_code.strip_prefix('+').unwrap_or(&edit.country_code);
        assert!(code_digits.chars().all(|c| c.is_ascii_digit()));
        assert!(edit.national_number.chars().all(|c| c.is_ascii_digit()));
        assert!(edit.display.is_ascii());
    }

    #[test]
    fn line_break_after_prefix_keeps_it() {
        let mut phone = PhoneReconciler::default();
        let edit = phone.apply_user_edit("+41\n79", None);
        assert_eq!(edit.country_code, "+41");
        assert_eq!(edit.national_number, "79");

        let mut phone = established();
        let edit = phone.apply_user_edit("+41\n79", None);
        assert_eq!(edit.country_code, "+41");
        assert_eq!(edit.display, "+4179");
    }

    #[test]
    fn deletes_touching_prefix_are_blocked() {
        let phone = established();
        assert!(phone.blocks_delete(DeleteKey::Backspace, (3, 3)));
        assert!(!phone.blocks_delete(DeleteKey::Backspace, (4, 4)));
        assert!(phone.blocks_delete(DeleteKey::Delete, (2, 2)));
        assert!(!phone.blocks_delete(DeleteKey::Delete, (3, 3)));
        assert!(phone.blocks_delete(DeleteKey::Delete, (2, 6)));
        assert!(phone.blocks_delete(DeleteKey::Backspace, (6, 1)));
        assert!(!phone.blocks_delete(DeleteKey::Backspace, (3, 8)));
    }

    #[test]
    fn nothing_is_blocked_without_prefix() {
        let phone = PhoneReconciler::default();
        assert!(!phone.blocks_delete(DeleteKey::Backspace, (0, 0)));
    }

    #[test]
    fn validity_and_normalization() {
        assert!(is_valid_phone("+41", "791234567"));
        assert!(!is_valid_phone("+41", ""));
        assert!(!is_valid_phone("", "791234567"));
        assert!(!is_valid_phone("+41", "12"));
        assert!(!is_valid_phone("+41", "7912"));
        // Unassigned but correctly sized ranges are dialable as far as the form goes.
        assert!(is_valid_phone("+1", "5551234567"));
        assert!(!is_valid_phone("+1", "555123456"));

        assert_eq!(to_international("+41", "791234567"), "+41791234567");
        assert_eq!(to_international("+41", "12 3"), "+41123");
    }

    #[test]
    fn compose_follows_display_rule() {
        assert_eq!(compose("", ""), "");
        assert_eq!(compose("+41", ""), "+41");
        assert_eq!(compose("+41", "79"), "+4179");
    }
}
