//! Single-file upload slots, local previews, and camera capture.

pub mod camera;
pub mod constraints;
pub mod preview;
pub mod slot;

pub use camera::{
    CameraConstraints, CameraError, CameraSession, FacingMode, MediaDevices, MediaError,
    VideoStream,
};
pub use constraints::{AcceptPattern, FileConstraints, FileRejection, DEFAULT_UPLOAD_MAX_MB};
pub use preview::{PreviewRegistry, PreviewUrl};
pub use slot::{FileEvent, FileSlot, InputProps, SlotStatus, UploadOptions};
