//! Declarative validation for each wizard step and for the merged record.

pub mod rules;
mod steps;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{Attachment, Field, KycStep};

pub use rules::AttachmentRule;
pub use steps::{
    AddressDraft, AddressInfo, DocumentDraft, DocumentInfo, PersonalDraft, PersonalInfo,
    SelfieDraft,
};

/// Field name to message, one message per invalid field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.insert(field, message);
        errors
    }

    /// Keeps the first message recorded for a field.
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.insert(field, message);
        }
    }

    /// Earliest step owning an invalid field.
    pub fn first_step(&self) -> Option<KycStep> {
        self.0.keys().map(|field| field.step()).min()
    }

    pub fn for_step(&self, step: KycStep) -> FieldErrors {
        self.filtered(|field| field.step() == step)
    }

    pub fn filtered(&self, keep: impl Fn(Field) -> bool) -> FieldErrors {
        FieldErrors(
            self.0
                .iter()
                .filter(|(field, _)| keep(**field))
                .map(|(field, message)| (*field, message.clone()))
                .collect(),
        )
    }
}

/// Inputs the rules need beyond the values themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationContext {
    pub today: NaiveDate,
    pub attachments: AttachmentRule,
}

impl ValidationContext {
    pub fn on(today: NaiveDate) -> Self {
        Self {
            today,
            attachments: AttachmentRule::default(),
        }
    }

    pub fn with_attachment_rule(mut self, rule: AttachmentRule) -> Self {
        self.attachments = rule;
        self
    }
}

/// Rules owned by one step's value record.
pub trait StepSchema {
    type Output;
    const STEP: KycStep;

    fn field_value(&self, field: Field) -> Option<&str>;
    fn field_value_mut(&mut self, field: Field) -> Option<&mut String>;
    fn validate(&self, context: &ValidationContext) -> Result<Self::Output, FieldErrors>;
}

/// Values accumulated across every step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormValues {
    pub personal: PersonalDraft,
    pub address: AddressDraft,
    pub document: DocumentDraft,
    pub selfie: SelfieDraft,
}

impl FormValues {
    pub fn step_values(&self, step: KycStep) -> StepValues {
        match step {
            KycStep::Personal => StepValues::Personal(self.personal.clone()),
            KycStep::Address => StepValues::Address(self.address.clone()),
            KycStep::Document => StepValues::Document(self.document.clone()),
            KycStep::Selfie => StepValues::Selfie(self.selfie.clone()),
            KycStep::Review => StepValues::Review,
        }
    }

    /// Replaces the record section owned by `values`.
    pub fn merge(&mut self, values: StepValues) {
        match values {
            StepValues::Personal(personal) => self.personal = personal,
            StepValues::Address(address) => self.address = address,
            StepValues::Document(document) => self.document = document,
            StepValues::Selfie(selfie) => self.selfie = selfie,
            StepValues::Review => {}
        }
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match field.step() {
            KycStep::Personal => self.personal.field_value(field),
            KycStep::Address => self.address.field_value(field),
            KycStep::Document => self.document.field_value(field),
            KycStep::Selfie | KycStep::Review => None,
        }
    }

    pub fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field.step() {
            KycStep::Personal => self.personal.field_value_mut(field),
            KycStep::Address => self.address.field_value_mut(field),
            KycStep::Document => self.document.field_value_mut(field),
            KycStep::Selfie | KycStep::Review => None,
        }
    }

    pub fn attachment(&self, field: Field) -> Option<&Attachment> {
        match field {
            Field::DocumentFront => self.document.document_front.as_ref(),
            Field::DocumentBack => self.document.document_back.as_ref(),
            Field::Selfie => self.selfie.selfie.as_ref(),
            _ => None,
        }
    }

    pub fn attachment_mut(&mut self, field: Field) -> Option<&mut Option<Attachment>> {
        match field {
            Field::DocumentFront => Some(&mut self.document.document_front),
            Field::DocumentBack => Some(&mut self.document.document_back),
            Field::Selfie => Some(&mut self.selfie.selfie),
            _ => None,
        }
    }

    /// Errors for one step; the review step has no fields.
    pub fn validate_step(&self, step: KycStep, context: &ValidationContext) -> FieldErrors {
        let outcome = match step {
            KycStep::Personal => self.personal.validate(context).map(|_| ()),
            KycStep::Address => self.address.validate(context).map(|_| ()),
            KycStep::Document => self.document.validate(context).map(|_| ()),
            KycStep::Selfie => self.selfie.validate(context).map(|_| ()),
            KycStep::Review => Ok(()),
        };
        outcome.err().unwrap_or_default()
    }

    /// Whole-form pass: every step's rules, all errors collected.
    pub fn validate_all(&self, context: &ValidationContext) -> Result<KycSubmission, FieldErrors> {
        let personal = self.personal.validate(context);
        let address = self.address.validate(context);
        let document = self.document.validate(context);
        let selfie = self.selfie.validate(context);

        match (personal, address, document, selfie) {
            (Ok(personal), Ok(address), Ok(document), Ok(selfie)) => Ok(KycSubmission {
                personal,
                address,
                document,
                selfie,
            }),
            (personal, address, document, selfie) => {
                let mut errors = FieldErrors::default();
                for step_errors in [
                    personal.err(),
                    address.err(),
                    document.err(),
                    selfie.err(),
                ]
                .into_iter()
                .flatten()
                {
                    errors.extend(step_errors);
                }
                Err(errors)
            }
        }
    }
}

/// One step's values, tagged by the step that owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "values", rename_all = "snake_case")]
pub enum StepValues {
    Personal(PersonalDraft),
    Address(AddressDraft),
    Document(DocumentDraft),
    Selfie(SelfieDraft),
    Review,
}

impl StepValues {
    pub fn step(&self) -> KycStep {
        match self {
            StepValues::Personal(_) => KycStep::Personal,
            StepValues::Address(_) => KycStep::Address,
            StepValues::Document(_) => KycStep::Document,
            StepValues::Selfie(_) => KycStep::Selfie,
            StepValues::Review => KycStep::Review,
        }
    }
}

/// Finalized payload handed to the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmission {
    pub personal: PersonalInfo,
    pub address: AddressInfo,
    pub document: DocumentInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selfie: Option<Attachment>,
}

impl KycSubmission {
    pub fn attachments(&self) -> impl Iterator<Item = (Field, &Attachment)> {
        [
            (Field::DocumentFront, Some(&self.document.document_front)),
            (Field::DocumentBack, Some(&self.document.document_back)),
            (Field::Selfie, self.selfie.as_ref()),
        ]
        .into_iter()
        .filter_map(|(field, file)| file.map(|file| (field, file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::default();
        errors.insert(Field::Email, "E-mail inválido");
        errors.insert(Field::Email, "outra mensagem");
        assert_eq!(errors.get(Field::Email), Some("E-mail inválido"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn errors_serialize_by_field_name() {
        let mut errors = FieldErrors::default();
        errors.insert(Field::ZipCode, "CEP inválido");
        errors.insert(Field::FullName, "Informe seu nome completo");
        let json = serde_json::to_value(&errors).expect("serializes");
        assert_eq!(json["zipCode"], "CEP inválido");
        assert_eq!(json["fullName"], "Informe seu nome completo");
        assert_eq!(errors.first_step(), Some(KycStep::Personal));
    }

    #[test]
    fn empty_record_fails_every_required_step() {
        let context = ValidationContext::on(NaiveDate::from_ymd_opt(2025, 6, 15).expect("date"));
        let errors = FormValues::default().validate_all(&context).unwrap_err();
        assert_eq!(errors.first_step(), Some(KycStep::Personal));
        assert!(errors.get(Field::DocumentBack).is_some());
        assert!(errors.get(Field::Selfie).is_none());
        assert!(!errors.for_step(KycStep::Address).is_empty());
    }

    #[test]
    fn merge_replaces_only_the_tagged_section() {
        let mut record = FormValues::default();
        record.address.city = "Recife".to_string();
        record.merge(StepValues::Personal(PersonalDraft {
            full_name: "Ana Lima".to_string(),
            ..PersonalDraft::default()
        }));
        assert_eq!(record.personal.full_name, "Ana Lima");
        assert_eq!(record.address.city, "Recife");
        assert_eq!(record.text(Field::City), Some("Recife"));
    }
}
