use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use super::super::domain::Attachment;

pub const MISSING_FILE: &str = "Arquivo é obrigatório";
pub const UNSUPPORTED_FILE: &str = "Tipo de arquivo não permitido";

pub fn only_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Brazilian taxpayer id: 11 digits, not all equal, two mod-11 check digits.
pub fn is_valid_cpf(raw: &str) -> bool {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 {
        return false;
    }
    if digits.iter().all(|digit| *digit == digits[0]) {
        return false;
    }

    cpf_check_digit(&digits[..9]) == digits[9] && cpf_check_digit(&digits[..10]) == digits[10]
}

/// Weights run from `len + 1` down to 2.
fn cpf_check_digit(digits: &[u32]) -> u32 {
    let top_weight = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(position, digit)| digit * (top_weight - position as u32))
        .sum();
    match sum % 11 {
        0 | 1 => 0,
        remainder => 11 - remainder,
    }
}

pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Whole years elapsed, minus one while this year's birthday is still ahead.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

pub fn is_adult(raw: &str, today: NaiveDate) -> bool {
    parse_birth_date(raw)
        .map(|birth| age_on(birth, today) >= 18)
        .unwrap_or(false)
}

pub fn is_valid_postal_code(raw: &str) -> bool {
    static CEP: OnceLock<Regex> = OnceLock::new();
    CEP.get_or_init(|| Regex::new(r"^\d{5}-?\d{3}$").expect("static CEP pattern"))
        .is_match(raw.trim())
}

/// Landline numbers have 10 digits, mobiles 11.
pub fn is_valid_phone(raw: &str) -> bool {
    matches!(only_digits(raw).len(), 10 | 11)
}

pub fn is_valid_email(raw: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let email = raw.trim();
    if email.starts_with('.') || email.contains("..") {
        return false;
    }
    EMAIL
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
                .expect("static e-mail pattern")
        })
        .is_match(email)
}

/// Schema-level rule for document scans and selfies, matched on MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRule {
    accepted: Vec<mime::Mime>,
    max_size_mb: f64,
}

impl Default for AttachmentRule {
    fn default() -> Self {
        Self::with_max_size_mb(crate::config::DEFAULT_ATTACHMENT_MAX_MB)
    }
}

impl AttachmentRule {
    pub fn with_max_size_mb(max_size_mb: f64) -> Self {
        Self {
            accepted: vec![mime::APPLICATION_PDF, mime::IMAGE_JPEG, mime::IMAGE_PNG],
            max_size_mb,
        }
    }

    pub fn max_size_mb(&self) -> f64 {
        self.max_size_mb
    }

    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * 1024.0 * 1024.0).floor() as u64
    }

    pub fn check(&self, file: &Attachment) -> Result<(), String> {
        let essence = file
            .mime_type()
            .trim()
            .to_ascii_lowercase()
            .parse::<mime::Mime>()
            .ok();
        let accepted = essence.is_some_and(|actual| {
            self.accepted
                .iter()
                .any(|allowed| allowed.essence_str() == actual.essence_str())
        });
        if !accepted {
            return Err(UNSUPPORTED_FILE.to_string());
        }
        if file.size() > self.max_size_bytes() {
            return Err(format!(
                "O arquivo deve ter no máximo {}MB",
                self.max_size_mb
            ));
        }
        Ok(())
    }

    pub fn check_required(&self, file: Option<&Attachment>) -> Result<(), String> {
        match file {
            Some(file) => self.check(file),
            None => Err(MISSING_FILE.to_string()),
        }
    }

    pub fn check_optional(&self, file: Option<&Attachment>) -> Result<(), String> {
        file.map_or(Ok(()), |file| self.check(file))
    }
}
