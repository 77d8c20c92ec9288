use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::domain::{Attachment, DocumentType, Field, KycStep};
use super::rules::{
    is_adult, is_valid_cpf, is_valid_email, is_valid_phone, is_valid_postal_code,
    parse_birth_date,
};
use super::{FieldErrors, StepSchema, ValidationContext};

/// Raw personal inputs as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalDraft {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub cpf: String,
    pub birth_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub cpf: String,
    pub birth_date: NaiveDate,
}

impl StepSchema for PersonalDraft {
    type Output = PersonalInfo;
    const STEP: KycStep = KycStep::Personal;

    fn field_value(&self, field: Field) -> Option<&str> {
        match field {
            Field::FullName => Some(&self.full_name),
            Field::Email => Some(&self.email),
            Field::Phone => Some(&self.phone),
            Field::Cpf => Some(&self.cpf),
            Field::BirthDate => Some(&self.birth_date),
            _ => None,
        }
    }

    fn field_value_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::FullName => Some(&mut self.full_name),
            Field::Email => Some(&mut self.email),
            Field::Phone => Some(&mut self.phone),
            Field::Cpf => Some(&mut self.cpf),
            Field::BirthDate => Some(&mut self.birth_date),
            _ => None,
        }
    }

    fn validate(&self, context: &ValidationContext) -> Result<PersonalInfo, FieldErrors> {
        let mut errors = FieldErrors::default();

        let full_name = self.full_name.trim();
        if full_name.chars().count() < 3 {
            errors.insert(Field::FullName, "Informe seu nome completo");
        }
        if !is_valid_email(&self.email) {
            errors.insert(Field::Email, "E-mail inválido");
        }
        if !is_valid_phone(&self.phone) {
            errors.insert(Field::Phone, "Telefone inválido");
        }
        if !is_valid_cpf(self.cpf.trim()) {
            errors.insert(Field::Cpf, "CPF inválido");
        }
        let birth_date = parse_birth_date(&self.birth_date)
            .filter(|_| is_adult(&self.birth_date, context.today));
        if birth_date.is_none() {
            errors.insert(Field::BirthDate, "É necessário ser maior de 18 anos");
        }

        match birth_date {
            Some(birth_date) if errors.is_empty() => Ok(PersonalInfo {
                full_name: full_name.to_string(),
                email: self.email.trim().to_string(),
                phone: self.phone.trim().to_string(),
                cpf: self.cpf.trim().to_string(),
                birth_date,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressDraft {
    pub country: String,
    pub zip_code: String,
    pub state: String,
    pub city: String,
    pub street: String,
    pub number: String,
    pub complement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub country: String,
    pub zip_code: String,
    pub state: String,
    pub city: String,
    pub street: String,
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
}

impl StepSchema for AddressDraft {
    type Output = AddressInfo;
    const STEP: KycStep = KycStep::Address;

    fn field_value(&self, field: Field) -> Option<&str> {
        match field {
            Field::Country => Some(&self.country),
            Field::ZipCode => Some(&self.zip_code),
            Field::State => Some(&self.state),
            Field::City => Some(&self.city),
            Field::Street => Some(&self.street),
            Field::Number => Some(&self.number),
            Field::Complement => Some(&self.complement),
            _ => None,
        }
    }

    fn field_value_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Country => Some(&mut self.country),
            Field::ZipCode => Some(&mut self.zip_code),
            Field::State => Some(&mut self.state),
            Field::City => Some(&mut self.city),
            Field::Street => Some(&mut self.street),
            Field::Number => Some(&mut self.number),
            Field::Complement => Some(&mut self.complement),
            _ => None,
        }
    }

    fn validate(&self, _context: &ValidationContext) -> Result<AddressInfo, FieldErrors> {
        let mut errors = FieldErrors::default();

        // Selected from a list, so only emptiness is checked.
        if self.country.is_empty() {
            errors.insert(Field::Country, "País é obrigatório");
        }
        if !is_valid_postal_code(&self.zip_code) {
            errors.insert(Field::ZipCode, "CEP inválido");
        }
        let required = [
            (Field::State, &self.state, "Estado é obrigatório"),
            (Field::City, &self.city, "Cidade é obrigatória"),
            (Field::Street, &self.street, "Endereço é obrigatório"),
            (Field::Number, &self.number, "Número é obrigatório"),
        ];
        for (field, value, message) in required {
            if value.trim().is_empty() {
                errors.insert(field, message);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(AddressInfo {
            country: self.country.clone(),
            zip_code: self.zip_code.trim().to_string(),
            state: self.state.trim().to_string(),
            city: self.city.trim().to_string(),
            street: self.street.trim().to_string(),
            number: self.number.trim().to_string(),
            complement: Some(self.complement.trim())
                .filter(|complement| !complement.is_empty())
                .map(str::to_string),
        })
    }
}

/// Document inputs; the scans are mirrored in from the wizard's upload slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentDraft {
    pub document_type: String,
    pub document_number: String,
    pub issuing_country: String,
    #[serde(skip_deserializing)]
    pub document_front: Option<Attachment>,
    #[serde(skip_deserializing)]
    pub document_back: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub document_type: DocumentType,
    pub document_number: String,
    pub issuing_country: String,
    pub document_front: Attachment,
    pub document_back: Attachment,
}

impl StepSchema for DocumentDraft {
    type Output = DocumentInfo;
    const STEP: KycStep = KycStep::Document;

    fn field_value(&self, field: Field) -> Option<&str> {
        match field {
            Field::DocumentType => Some(&self.document_type),
            Field::DocumentNumber => Some(&self.document_number),
            Field::IssuingCountry => Some(&self.issuing_country),
            _ => None,
        }
    }

    fn field_value_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::DocumentType => Some(&mut self.document_type),
            Field::DocumentNumber => Some(&mut self.document_number),
            Field::IssuingCountry => Some(&mut self.issuing_country),
            _ => None,
        }
    }

    fn validate(&self, context: &ValidationContext) -> Result<DocumentInfo, FieldErrors> {
        let mut errors = FieldErrors::default();

        let document_type = DocumentType::parse(self.document_type.trim());
        if document_type.is_none() {
            errors.insert(Field::DocumentType, "Selecione o tipo de documento");
        }
        let document_number = self.document_number.trim();
        if document_number.chars().count() < 5 {
            errors.insert(Field::DocumentNumber, "Número do documento inválido");
        }
        if self.issuing_country.is_empty() {
            errors.insert(Field::IssuingCountry, "País emissor é obrigatório");
        }
        if let Err(message) = context
            .attachments
            .check_required(self.document_front.as_ref())
        {
            errors.insert(Field::DocumentFront, message);
        }
        if let Err(message) = context
            .attachments
            .check_required(self.document_back.as_ref())
        {
            errors.insert(Field::DocumentBack, message);
        }

        match (document_type, &self.document_front, &self.document_back) {
            (Some(document_type), Some(front), Some(back)) if errors.is_empty() => {
                Ok(DocumentInfo {
                    document_type,
                    document_number: document_number.to_string(),
                    issuing_country: self.issuing_country.clone(),
                    document_front: front.clone(),
                    document_back: back.clone(),
                })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfieDraft {
    pub selfie: Option<Attachment>,
}

impl StepSchema for SelfieDraft {
    type Output = Option<Attachment>;
    const STEP: KycStep = KycStep::Selfie;

    fn field_value(&self, _field: Field) -> Option<&str> {
        None
    }

    fn field_value_mut(&mut self, _field: Field) -> Option<&mut String> {
        None
    }

    fn validate(&self, context: &ValidationContext) -> Result<Option<Attachment>, FieldErrors> {
        context
            .attachments
            .check_optional(self.selfie.as_ref())
            .map(|_| self.selfie.clone())
            .map_err(|message| FieldErrors::single(Field::Selfie, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ValidationContext {
        ValidationContext::on(NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date"))
    }

    fn joao() -> PersonalDraft {
        PersonalDraft {
            full_name: "João da Silva".to_string(),
            email: "joao@example.com".to_string(),
            phone: "11987654321".to_string(),
            cpf: "529.982.247-25".to_string(),
            birth_date: "1990-01-01".to_string(),
        }
    }

    fn scan(name: &str) -> Attachment {
        Attachment::new(name, "application/pdf", vec![0u8; 2048])
    }

    #[test]
    fn personal_step_accepts_valid_applicant() {
        let info = joao().validate(&context()).expect("valid personal data");
        assert_eq!(info.full_name, "João da Silva");
        assert_eq!(
            info.birth_date,
            NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid date")
        );
    }

    #[test]
    fn personal_step_collects_one_message_per_field() {
        let draft = PersonalDraft {
            full_name: " A ".to_string(),
            email: "bad".to_string(),
            phone: "123".to_string(),
            cpf: "000.000.000-00".to_string(),
            birth_date: "2020-01-01".to_string(),
        };
        let errors = draft.validate(&context()).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.get(Field::Cpf), Some("CPF inválido"));
        assert_eq!(
            errors.get(Field::BirthDate),
            Some("É necessário ser maior de 18 anos")
        );
    }

    #[test]
    fn address_step_accepts_both_postal_layouts() {
        let mut draft = AddressDraft {
            country: "br".to_string(),
            zip_code: "12345-678".to_string(),
            state: "SP".to_string(),
            city: "São Paulo".to_string(),
            street: "Av Paulista".to_string(),
            number: "100".to_string(),
            complement: "Ap 1".to_string(),
        };
        let info = draft.validate(&context()).expect("valid address");
        assert_eq!(info.complement.as_deref(), Some("Ap 1"));

        draft.zip_code = "12345678".to_string();
        draft.complement = "  ".to_string();
        let info = draft.validate(&context()).expect("valid address");
        assert_eq!(info.complement, None);
    }

    #[test]
    fn address_step_rejects_blank_required_fields() {
        let draft = AddressDraft {
            country: "br".to_string(),
            zip_code: "1234".to_string(),
            state: " ".to_string(),
            ..AddressDraft::default()
        };
        let errors = draft.validate(&context()).unwrap_err();
        assert_eq!(errors.get(Field::ZipCode), Some("CEP inválido"));
        assert_eq!(errors.get(Field::State), Some("Estado é obrigatório"));
        assert_eq!(errors.get(Field::Number), Some("Número é obrigatório"));
        assert_eq!(errors.get(Field::Country), None);
        assert_eq!(errors.get(Field::Complement), None);
    }

    #[test]
    fn document_step_requires_both_scans() {
        let draft = DocumentDraft {
            document_type: "rg".to_string(),
            document_number: "12.345.678-9".to_string(),
            issuing_country: "br".to_string(),
            document_front: Some(scan("frente.pdf")),
            document_back: None,
        };
        let errors = draft.validate(&context()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get(Field::DocumentBack), Some("Arquivo é obrigatório"));
    }

    #[test]
    fn document_step_checks_enum_and_scan_type() {
        let draft = DocumentDraft {
            document_type: "cpf".to_string(),
            document_number: "1234".to_string(),
            issuing_country: String::new(),
            document_front: Some(Attachment::new("frente.txt", "text/plain", vec![0u8; 4])),
            document_back: Some(scan("verso.pdf")),
        };
        let errors = draft.validate(&context()).unwrap_err();
        assert!(errors.get(Field::DocumentType).is_some());
        assert!(errors.get(Field::DocumentNumber).is_some());
        assert!(errors.get(Field::IssuingCountry).is_some());
        assert_eq!(
            errors.get(Field::DocumentFront),
            Some("Tipo de arquivo não permitido")
        );
    }

    #[test]
    fn selfie_is_optional_but_checked_when_present() {
        assert_eq!(SelfieDraft::default().validate(&context()), Ok(None));

        let oversized = SelfieDraft {
            selfie: Some(Attachment::new(
                "selfie.jpg",
                "image/jpeg",
                vec![0u8; 6 * 1024 * 1024],
            )),
        };
        let errors = oversized.validate(&context()).unwrap_err();
        assert_eq!(
            errors.get(Field::Selfie),
            Some("O arquivo deve ter no máximo 5MB")
        );
    }
}
