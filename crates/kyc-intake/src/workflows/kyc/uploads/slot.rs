use serde::Serialize;
use tracing::debug;

use super::super::domain::Attachment;
use super::constraints::{FileConstraints, FileRejection, DEFAULT_UPLOAD_MAX_MB};
use super::preview::{PreviewRegistry, PreviewUrl};

/// Options for a single-file upload control.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub accept: Option<String>,
    pub max_size_mb: f64,
    pub preview: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            accept: None,
            max_size_mb: DEFAULT_UPLOAD_MAX_MB,
            preview: true,
        }
    }
}

/// Drag/drop or input event carrying candidate files.
#[derive(Debug, Default)]
pub struct FileEvent {
    files: Vec<Attachment>,
    default_prevented: bool,
}

impl FileEvent {
    pub fn new(files: Vec<Attachment>) -> Self {
        Self {
            files,
            default_prevented: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    fn first_file(&self) -> Option<Attachment> {
        self.files.first().cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Empty,
    Holding,
    Rejected,
}

/// Attributes the presentation layer binds to the file input element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputProps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
}

/// Lifecycle of one upload slot: empty, holding a validated file, or rejected.
#[derive(Debug)]
pub struct FileSlot {
    constraints: FileConstraints,
    preview_enabled: bool,
    previews: PreviewRegistry,
    file: Option<Attachment>,
    error: Option<FileRejection>,
    preview: Option<PreviewUrl>,
    dragging: bool,
    input_value: Option<String>,
}

impl FileSlot {
    pub fn new(options: UploadOptions, previews: PreviewRegistry) -> Self {
        Self {
            constraints: FileConstraints::new(options.accept.as_deref(), options.max_size_mb),
            preview_enabled: options.preview,
            previews,
            file: None,
            error: None,
            preview: None,
            dragging: false,
            input_value: None,
        }
    }

    pub fn file(&self) -> Option<&Attachment> {
        self.file.as_ref()
    }

    pub fn error(&self) -> Option<&FileRejection> {
        self.error.as_ref()
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview.as_ref().map(PreviewUrl::as_str)
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn input_value(&self) -> Option<&str> {
        self.input_value.as_deref()
    }

    pub fn constraints(&self) -> &FileConstraints {
        &self.constraints
    }

    pub fn status(&self) -> SlotStatus {
        match (&self.file, &self.error) {
            (Some(_), _) => SlotStatus::Holding,
            (None, Some(_)) => SlotStatus::Rejected,
            (None, None) => SlotStatus::Empty,
        }
    }

    pub fn input_props(&self) -> InputProps {
        InputProps {
            accept: self.constraints.accept().map(str::to_string),
        }
    }

    /// `None` empties the slot. A rejected candidate leaves the slot without a file.
    pub fn set_file(&mut self, candidate: Option<Attachment>) -> Result<(), FileRejection> {
        // Any previous preview is released before the new file is considered.
        self.preview = None;

        let Some(candidate) = candidate else {
            self.file = None;
            self.error = None;
            return Ok(());
        };

        if let Err(rejection) = self.constraints.validate(&candidate) {
            debug!(
                file = candidate.name(),
                size = candidate.size(),
                reason = %rejection,
                "upload rejected"
            );
            self.file = None;
            self.error = Some(rejection.clone());
            return Err(rejection);
        }

        if self.preview_enabled {
            self.preview = Some(self.previews.create(&candidate));
        }
        self.error = None;
        self.file = Some(candidate);
        Ok(())
    }

    pub fn remove_file(&mut self) {
        self.preview = None;
        self.file = None;
        self.error = None;
        self.input_value = None;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn on_input_change(&mut self, event: &FileEvent) -> Result<(), FileRejection> {
        let candidate = event.first_file();
        self.input_value = candidate.as_ref().map(|file| file.name().to_string());
        self.set_file(candidate)
    }

    pub fn on_drag_over(&mut self, event: &mut FileEvent) {
        event.prevent_default();
        self.dragging = true;
    }

    pub fn on_drag_leave(&mut self, event: &mut FileEvent) {
        event.prevent_default();
        self.dragging = false;
    }

    pub fn on_drop(&mut self, event: &mut FileEvent) -> Result<(), FileRejection> {
        event.prevent_default();
        self.dragging = false;
        self.set_file(event.first_file())
    }
}
