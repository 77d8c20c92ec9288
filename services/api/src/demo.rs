use crate::infra::{parse_date, RecordingSubmissionGateway, TracingNotifier};
use chrono::{Local, NaiveDate, Utc};
use clap::Args;
use image::{Rgb, RgbImage};
use kyc_intake::config::IntakeConfig;
use kyc_intake::error::AppError;
use kyc_intake::workflows::kyc::uploads::{
    CameraConstraints, MediaDevices, MediaError, VideoStream,
};
use kyc_intake::workflows::kyc::{
    Attachment, AttachmentSlot, Field, FieldErrors, KycWizard, ServiceError, SlotStatus,
    StepOutcome, SubmitOutcome, WizardError,
};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Front scan of the identity document. A placeholder PDF is used when omitted.
    #[arg(long)]
    pub(crate) front: Option<PathBuf>,
    /// Back scan of the identity document. A placeholder PDF is used when omitted.
    #[arg(long)]
    pub(crate) back: Option<PathBuf>,
    /// Selfie image to upload instead of capturing one from the synthetic camera.
    #[arg(long)]
    pub(crate) selfie: Option<PathBuf>,
    /// Skip the selfie step entirely.
    #[arg(long, conflicts_with = "selfie")]
    pub(crate) no_selfie: bool,
    /// Date birth dates are validated against (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

const SAMPLE_PERSONAL: [(Field, &str); 5] = [
    (Field::FullName, "Maria Oliveira Santos"),
    (Field::Email, "maria.santos@example.com"),
    (Field::Phone, "(81) 99876-5432"),
    (Field::Cpf, "529.982.247-25"),
    (Field::BirthDate, "1988-03-21"),
];

const SAMPLE_ADDRESS: [(Field, &str); 7] = [
    (Field::Country, "br"),
    (Field::ZipCode, "50030-230"),
    (Field::State, "PE"),
    (Field::City, "Recife"),
    (Field::Street, "Rua da Aurora"),
    (Field::Number, "325"),
    (Field::Complement, "Apto 702"),
];

const SAMPLE_DOCUMENT: [(Field, &str); 3] = [
    (Field::DocumentType, "rg"),
    (Field::DocumentNumber, "12.345.678-9"),
    (Field::IssuingCountry, "br"),
];

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        front,
        back,
        selfie,
        no_selfie,
        today,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let mut wizard = KycWizard::new(&IntakeConfig::default()).with_today(today);

    println!("KYC intake demo ({today})");

    fill(&mut wizard, &SAMPLE_PERSONAL)?;
    advance(&mut wizard)?;
    fill(&mut wizard, &SAMPLE_ADDRESS)?;
    advance(&mut wizard)?;

    fill(&mut wizard, &SAMPLE_DOCUMENT)?;
    attach(
        &mut wizard,
        AttachmentSlot::DocumentFront,
        load_or_placeholder(front.as_deref(), "documento-frente.pdf")?,
    )?;
    attach(
        &mut wizard,
        AttachmentSlot::DocumentBack,
        load_or_placeholder(back.as_deref(), "documento-verso.pdf")?,
    )?;
    advance(&mut wizard)?;

    if let Some(path) = selfie {
        attach(&mut wizard, AttachmentSlot::Selfie, load_file(&path)?)?;
    } else if !no_selfie {
        wizard.open_camera(&SyntheticCamera).await.map_err(intake)?;
        let status = wizard.capture_selfie(Utc::now()).map_err(intake)?;
        println!("- selfie captured from synthetic camera ({status:?})");
    }
    advance(&mut wizard)?;

    if let Some(review) = wizard.review() {
        println!("\nReview");
        println!(
            "- {}: {} <{}>",
            review.personal.title,
            review.personal.values.full_name,
            review.personal.values.email
        );
        println!(
            "- {}: {}, {} - {}/{}",
            review.address.title,
            review.address.values.street,
            review.address.values.number,
            review.address.values.city,
            review.address.values.state
        );
        println!(
            "- {}: front={} back={}",
            review.document.title,
            review.document.values.file_front,
            review.document.values.file_back
        );
        println!("- {}: {}", review.selfie.title, review.selfie.values.has_selfie);
    }

    let gateway = RecordingSubmissionGateway::default();
    match wizard.submit(&gateway, &TracingNotifier).await.map_err(intake)? {
        SubmitOutcome::Accepted(receipt) => {
            println!(
                "\nSubmitted as {} at {} ({} receipt(s) issued by the gateway)",
                receipt.reference,
                receipt.received_at.to_rfc3339(),
                gateway.issued()
            );
        }
        SubmitOutcome::Invalid { step, errors } => {
            println!("\nSubmission blocked at step {step:?}");
            print_errors(&errors);
        }
        SubmitOutcome::Failed(err) => println!("\nSubmission failed: {err}"),
    }

    let view = serde_json::to_string_pretty(&wizard.view()).map_err(std::io::Error::from)?;
    println!("\nFinal wizard state\n{view}");
    Ok(())
}

fn intake(err: WizardError) -> AppError {
    AppError::from(ServiceError::from(err))
}

fn fill(wizard: &mut KycWizard, fields: &[(Field, &str)]) -> Result<(), AppError> {
    for (field, value) in fields {
        wizard.on_field_change(*field, *value).map_err(intake)?;
    }
    Ok(())
}

fn advance(wizard: &mut KycWizard) -> Result<(), AppError> {
    let step = wizard.current_step();
    match wizard.next().map_err(intake)? {
        StepOutcome::Advanced { .. } => {
            println!("- {step:?} accepted, progress {}%", wizard.progress());
        }
        StepOutcome::Invalid { errors } => {
            println!("- {step:?} needs attention");
            print_errors(&errors);
        }
    }
    Ok(())
}

fn attach(wizard: &mut KycWizard, slot: AttachmentSlot, file: Attachment) -> Result<(), AppError> {
    let name = file.name().to_string();
    let status = wizard.set_attachment(slot, Some(file)).map_err(intake)?;
    if status == SlotStatus::Rejected {
        let reason = wizard
            .slot(slot)
            .error()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("- {name} rejected for {slot:?}: {reason}");
    } else {
        println!("- {name} attached to {slot:?}");
    }
    Ok(())
}

fn print_errors(errors: &FieldErrors) {
    for (field, message) in errors.iter() {
        println!("  - {field}: {message}");
    }
}

fn load_or_placeholder(path: Option<&Path>, fallback: &str) -> Result<Attachment, AppError> {
    match path {
        Some(path) => load_file(path),
        None => Ok(Attachment::new(
            fallback,
            mime::APPLICATION_PDF.as_ref(),
            b"%PDF-1.4\n%demo\n".to_vec(),
        )),
    }
}

fn load_file(path: &Path) -> Result<Attachment, AppError> {
    let data = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok(Attachment::new(name, mime_type.essence_str(), data))
}

/// Camera that always yields the same gradient frame.
struct SyntheticCamera;

struct SyntheticStream {
    width: u32,
    height: u32,
    live: bool,
}

impl MediaDevices for SyntheticCamera {
    type Stream = SyntheticStream;

    async fn open_video(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<SyntheticStream, MediaError> {
        Ok(SyntheticStream {
            width: constraints.ideal_width.min(320),
            height: constraints.ideal_height.min(240),
            live: true,
        })
    }
}

impl VideoStream for SyntheticStream {
    fn grab_frame(&mut self) -> Result<RgbImage, MediaError> {
        if !self.live {
            return Err(MediaError::Other("stream stopped".to_string()));
        }
        Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 160])
        }))
    }

    fn stop_tracks(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
