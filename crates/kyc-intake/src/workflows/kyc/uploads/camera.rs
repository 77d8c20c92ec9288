//! Live camera capture for the selfie step.
//!
//! A [`CameraSession`] owns the video stream for as long as it is alive. Tracks are
//! stopped on explicit close, right after a successful capture, and on drop, so a
//! session that goes out of scope on step navigation never keeps the device busy.

use std::future::Future;
use std::io::Cursor;

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{debug, info, warn};

use super::super::domain::Attachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// Requested stream properties. Facing mode is a preference, not a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Raw failure reported by the media layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    PermissionDenied,
    DeviceNotFound,
    Other(String),
}

impl MediaError {
    /// Classifies a browser `DOMException` name.
    pub fn from_dom_exception(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                Self::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                Self::DeviceNotFound
            }
            _ => Self::Other(format!("{name}: {message}")),
        }
    }
}

/// User-facing camera failures; each message points back to file upload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Permissão para usar a câmera negada. Autorize o acesso nas configurações do navegador ou envie uma foto pelo upload.")]
    PermissionDenied,
    #[error("Nenhuma câmera foi encontrada neste dispositivo. Envie uma foto pelo upload.")]
    NoDeviceFound,
    #[error("Não foi possível acessar a câmera. Tente novamente ou envie uma foto pelo upload.")]
    Unavailable { detail: String },
    #[error("A câmera não está ativa.")]
    NotActive,
    #[error("Não foi possível processar a foto capturada. Tente novamente.")]
    Encoding { detail: String },
}

impl From<MediaError> for CameraError {
    fn from(value: MediaError) -> Self {
        match value {
            MediaError::PermissionDenied => Self::PermissionDenied,
            MediaError::DeviceNotFound => Self::NoDeviceFound,
            MediaError::Other(detail) => Self::Unavailable { detail },
        }
    }
}

/// Live stream handle provided by the host.
pub trait VideoStream: Send {
    fn grab_frame(&mut self) -> Result<RgbImage, MediaError>;
    fn stop_tracks(&mut self);
    fn is_live(&self) -> bool;
}

/// Host capability that acquires video streams.
pub trait MediaDevices: Send + Sync {
    type Stream: VideoStream + 'static;

    fn open_video(
        &self,
        constraints: &CameraConstraints,
    ) -> impl Future<Output = Result<Self::Stream, MediaError>> + Send;
}

pub struct CameraSession {
    stream: Option<Box<dyn VideoStream>>,
    jpeg_quality: u8,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("active", &self.is_active())
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl CameraSession {
    pub async fn open<M: MediaDevices>(
        devices: &M,
        constraints: &CameraConstraints,
        jpeg_quality: u8,
    ) -> Result<Self, CameraError> {
        match devices.open_video(constraints).await {
            Ok(stream) => {
                info!(facing = ?constraints.facing, "camera stream acquired");
                Ok(Self {
                    stream: Some(Box::new(stream)),
                    jpeg_quality: jpeg_quality.clamp(1, 100),
                })
            }
            Err(err) => {
                let err = CameraError::from(err);
                warn!(error = ?err, "camera acquisition failed");
                Err(err)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.as_ref().is_some_and(|stream| stream.is_live())
    }

    /// Encodes the current frame as a JPEG file and releases the camera.
    pub fn capture(&mut self, captured_at: DateTime<Utc>) -> Result<Attachment, CameraError> {
        let stream = self.stream.as_mut().ok_or(CameraError::NotActive)?;
        let frame = stream.grab_frame().map_err(CameraError::from)?;
        self.close();

        let bytes = encode_jpeg(&frame, self.jpeg_quality)?;
        let name = format!("selfie-{}.jpg", captured_at.timestamp_millis());
        debug!(file = %name, size = bytes.len(), "selfie captured");
        Ok(Attachment::new(name, mime::IMAGE_JPEG.as_ref(), bytes))
    }

    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            debug!("camera tracks stopped");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, CameraError> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(frame)
        .map_err(|err| CameraError::Encoding {
            detail: err.to_string(),
        })?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeStream {
        stopped: Arc<AtomicBool>,
    }

    impl VideoStream for FakeStream {
        fn grab_frame(&mut self) -> Result<RgbImage, MediaError> {
            Ok(RgbImage::from_pixel(8, 6, image::Rgb([200, 120, 80])))
        }

        fn stop_tracks(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn is_live(&self) -> bool {
            !self.stopped.load(Ordering::SeqCst)
        }
    }

    struct FakeDevices {
        outcome: Result<(), MediaError>,
        stopped: Arc<AtomicBool>,
    }

    impl FakeDevices {
        fn working() -> Self {
            Self {
                outcome: Ok(()),
                stopped: Arc::new(AtomicBool::new(false)),
            }
        }

        fn failing(error: MediaError) -> Self {
            Self {
                outcome: Err(error),
                stopped: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl MediaDevices for FakeDevices {
        type Stream = FakeStream;

        async fn open_video(
            &self,
            _constraints: &CameraConstraints,
        ) -> Result<Self::Stream, MediaError> {
            self.outcome.clone().map(|_| FakeStream {
                stopped: self.stopped.clone(),
            })
        }
    }

    #[tokio::test]
    async fn capture_encodes_jpeg_and_releases_tracks() {
        let devices = FakeDevices::working();
        let mut session = CameraSession::open(&devices, &CameraConstraints::default(), 92)
            .await
            .expect("camera opens");
        assert!(session.is_active());

        let captured_at = DateTime::from_timestamp(1_750_000_000, 0).expect("valid timestamp");
        let selfie = session.capture(captured_at).expect("frame captured");

        assert_eq!(selfie.name(), "selfie-1750000000000.jpg");
        assert_eq!(selfie.mime_type(), "image/jpeg");
        assert_eq!(&selfie.data()[..2], &[0xFF, 0xD8]);
        assert!(devices.stopped.load(Ordering::SeqCst));
        assert!(!session.is_active());
        assert_eq!(session.capture(captured_at), Err(CameraError::NotActive));
    }

    #[tokio::test]
    async fn dropping_session_stops_tracks() {
        let devices = FakeDevices::working();
        let session = CameraSession::open(&devices, &CameraConstraints::default(), 92)
            .await
            .expect("camera opens");
        drop(session);
        assert!(devices.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn acquisition_failures_are_classified() {
        let cases = [
            (MediaError::PermissionDenied, CameraError::PermissionDenied),
            (MediaError::DeviceNotFound, CameraError::NoDeviceFound),
            (
                MediaError::Other("AbortError: busy".to_string()),
                CameraError::Unavailable {
                    detail: "AbortError: busy".to_string(),
                },
            ),
        ];

        for (media_error, expected) in cases {
            let devices = FakeDevices::failing(media_error);
            let err = CameraSession::open(&devices, &CameraConstraints::default(), 92)
                .await
                .unwrap_err();
            assert_eq!(err, expected);
            assert!(err.to_string().contains("upload"));
        }
    }

    #[test]
    fn dom_exception_names_map_to_classes() {
        assert_eq!(
            MediaError::from_dom_exception("NotAllowedError", "denied"),
            MediaError::PermissionDenied
        );
        assert_eq!(
            MediaError::from_dom_exception("NotFoundError", "none"),
            MediaError::DeviceNotFound
        );
        assert_eq!(
            MediaError::from_dom_exception("NotReadableError", "in use"),
            MediaError::Other("NotReadableError: in use".to_string())
        );
    }
}
