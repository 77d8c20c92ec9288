use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Ordered pages of the intake wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStep {
    Personal,
    Address,
    Document,
    Selfie,
    Review,
}

impl KycStep {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Personal,
            Self::Address,
            Self::Document,
            Self::Selfie,
            Self::Review,
        ]
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Personal => 0,
            Self::Address => 1,
            Self::Document => 2,
            Self::Selfie => 3,
            Self::Review => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ordered().get(index).copied()
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Address => "address",
            Self::Document => "document",
            Self::Selfie => "selfie",
            Self::Review => "review",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Personal => "Dados Pessoais",
            Self::Address => "Endereço",
            Self::Document => "Documento",
            Self::Selfie => "Selfie",
            Self::Review => "Revisão",
        }
    }

    pub fn descriptor(self) -> StepDescriptor {
        let descriptor = StepDescriptor::new(self.id(), self.title());
        match self {
            Self::Personal => descriptor.with_description("Informe seus dados pessoais"),
            Self::Address => descriptor.with_description("Onde você mora"),
            Self::Document => {
                descriptor.with_description("Informe os dados do documento e faça o upload")
            }
            Self::Selfie => descriptor
                .with_description("Tire uma selfie ou envie uma foto")
                .optional(),
            Self::Review => descriptor.with_description("Confira seus dados antes de enviar"),
        }
    }

    pub fn descriptors() -> Vec<StepDescriptor> {
        Self::ordered().into_iter().map(Self::descriptor).collect()
    }
}

/// Immutable description of one wizard page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl StepDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            optional: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Every named input of the form, addressed by its payload key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    FullName,
    Email,
    Phone,
    Cpf,
    BirthDate,
    Country,
    ZipCode,
    State,
    City,
    Street,
    Number,
    Complement,
    DocumentType,
    DocumentNumber,
    IssuingCountry,
    DocumentFront,
    DocumentBack,
    Selfie,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::FullName,
        Field::Email,
        Field::Phone,
        Field::Cpf,
        Field::BirthDate,
        Field::Country,
        Field::ZipCode,
        Field::State,
        Field::City,
        Field::Street,
        Field::Number,
        Field::Complement,
        Field::DocumentType,
        Field::DocumentNumber,
        Field::IssuingCountry,
        Field::DocumentFront,
        Field::DocumentBack,
        Field::Selfie,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Field::FullName => "fullName",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Cpf => "cpf",
            Field::BirthDate => "birthDate",
            Field::Country => "country",
            Field::ZipCode => "zipCode",
            Field::State => "state",
            Field::City => "city",
            Field::Street => "street",
            Field::Number => "number",
            Field::Complement => "complement",
            Field::DocumentType => "documentType",
            Field::DocumentNumber => "documentNumber",
            Field::IssuingCountry => "issuingCountry",
            Field::DocumentFront => "documentFront",
            Field::DocumentBack => "documentBack",
            Field::Selfie => "selfie",
        }
    }

    pub const fn step(self) -> KycStep {
        match self {
            Field::FullName | Field::Email | Field::Phone | Field::Cpf | Field::BirthDate => {
                KycStep::Personal
            }
            Field::Country
            | Field::ZipCode
            | Field::State
            | Field::City
            | Field::Street
            | Field::Number
            | Field::Complement => KycStep::Address,
            Field::DocumentType
            | Field::DocumentNumber
            | Field::IssuingCountry
            | Field::DocumentFront
            | Field::DocumentBack => KycStep::Document,
            Field::Selfie => KycStep::Selfie,
        }
    }

    /// Attachment fields are written through their upload slot, never as text.
    pub const fn attachment_slot(self) -> Option<AttachmentSlot> {
        match self {
            Field::DocumentFront => Some(AttachmentSlot::DocumentFront),
            Field::DocumentBack => Some(AttachmentSlot::DocumentBack),
            Field::Selfie => Some(AttachmentSlot::Selfie),
            _ => None,
        }
    }

    pub fn for_step(step: KycStep) -> impl Iterator<Item = Field> {
        Self::ALL.into_iter().filter(move |field| field.step() == step)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown form field '{0}'")]
pub struct UnknownField(pub String);

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == value)
            .ok_or_else(|| UnknownField(value.to_string()))
    }
}

const ATTACHMENT_ACCEPT: &str = ".pdf,.jpg,.jpeg,.png";

/// File inputs owned by the wizard independently of the mounted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentSlot {
    DocumentFront,
    DocumentBack,
    Selfie,
}

impl AttachmentSlot {
    pub const ALL: [AttachmentSlot; 3] = [
        AttachmentSlot::DocumentFront,
        AttachmentSlot::DocumentBack,
        AttachmentSlot::Selfie,
    ];

    pub const fn field(self) -> Field {
        match self {
            AttachmentSlot::DocumentFront => Field::DocumentFront,
            AttachmentSlot::DocumentBack => Field::DocumentBack,
            AttachmentSlot::Selfie => Field::Selfie,
        }
    }

    pub const fn step(self) -> KycStep {
        self.field().step()
    }

    pub const fn label(self) -> &'static str {
        match self {
            AttachmentSlot::DocumentFront => "Frente do documento",
            AttachmentSlot::DocumentBack => "Verso do documento",
            AttachmentSlot::Selfie => "Selfie",
        }
    }

    /// Value for the bound file input's `accept` attribute. Every slot takes what the
    /// attachment rule accepts.
    pub const fn accept(self) -> &'static str {
        ATTACHMENT_ACCEPT
    }
}

/// Identity document kinds accepted by the document step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Rg,
    Cnh,
    Passport,
}

impl DocumentType {
    pub const fn value(self) -> &'static str {
        match self {
            DocumentType::Rg => "rg",
            DocumentType::Cnh => "cnh",
            DocumentType::Passport => "passport",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::Rg => "RG",
            DocumentType::Cnh => "CNH",
            DocumentType::Passport => "Passaporte",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rg" => Some(DocumentType::Rg),
            "cnh" => Some(DocumentType::Cnh),
            "passport" => Some(DocumentType::Passport),
            _ => None,
        }
    }
}

/// Value/label pair offered by select inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

pub const DOCUMENT_TYPE_OPTIONS: [SelectOption; 3] = [
    SelectOption {
        value: "rg",
        label: "RG",
    },
    SelectOption {
        value: "cnh",
        label: "CNH",
    },
    SelectOption {
        value: "passport",
        label: "Passaporte",
    },
];

pub const COUNTRY_OPTIONS: [SelectOption; 4] = [
    SelectOption {
        value: "br",
        label: "Brasil",
    },
    SelectOption {
        value: "us",
        label: "Estados Unidos",
    },
    SelectOption {
        value: "uk",
        label: "Reino Unido",
    },
    SelectOption {
        value: "pt",
        label: "Portugal",
    },
];

/// Captured or selected file. Cloning shares the underlying bytes.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    name: String,
    size: u64,
    mime_type: String,
    #[serde(skip)]
    data: Arc<[u8]>,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Lowercased text after the last dot of the name, if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip_through_from_str() {
        for field in Field::ALL {
            assert_eq!(field.name().parse::<Field>(), Ok(field));
        }
        assert!("nickname".parse::<Field>().is_err());
    }

    #[test]
    fn step_fields_partition_the_form() {
        let personal: Vec<_> = Field::for_step(KycStep::Personal).collect();
        assert_eq!(personal.len(), 5);
        assert_eq!(Field::for_step(KycStep::Review).count(), 0);
        assert_eq!(AttachmentSlot::DocumentBack.step(), KycStep::Document);
    }

    #[test]
    fn descriptors_mark_selfie_as_optional() {
        let descriptors = KycStep::descriptors();
        assert_eq!(descriptors.len(), 5);
        assert!(descriptors[KycStep::Selfie.index()].optional);
        assert!(!descriptors[KycStep::Document.index()].optional);
        assert_eq!(descriptors[0].id, "personal");
    }

    #[test]
    fn attachment_extension_is_lowercased() {
        let file = Attachment::new("Scan.PDF", "application/pdf", vec![0u8; 4]);
        assert_eq!(file.extension().as_deref(), Some("pdf"));
        assert_eq!(file.size(), 4);
        let bare = Attachment::new("scan", "", Vec::new());
        assert_eq!(bare.extension(), None);
    }
}
