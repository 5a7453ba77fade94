//! Editing sessions.
//!
//! [`CropEditor`] holds the interactive geometry and is driven synchronously
//! from the host's UI thread. [`CropSession`] wraps an editor and runs image
//! loads and crops on worker threads:
//! - at most one load and one crop are in flight; starting another cancels
//!   the previous one of the same kind
//! - results come back over a channel and are applied by [`CropSession::poll`]
//!   on the caller's thread, once each
//! - results of superseded requests are discarded
//! - dropping the session cancels whatever is still running

mod editor;
mod task;

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::compose::OutputTarget;
use crate::crop::{CropPlan, CroppedImage};
use crate::decode::{DecodeError, ImageLoader, LoadedImage, SourceOption, SourceResolver};
use crate::error::{CropError, CropFailureKind};
use crate::options::CropOptions;
use crate::result::CropResult;

pub use editor::CropEditor;
use task::TaskSlot;

/// Outcome of a background request, delivered by [`CropSession::poll`].
#[derive(Debug)]
pub enum SessionEvent {
    /// The image is now shown by the editor.
    ImageLoaded {
        sequence: u64,
        reference: String,
        width: u32,
        height: u32,
    },
    /// The editor was reset to its empty state.
    LoadFailed {
        sequence: u64,
        reference: String,
        error: CropError,
    },
    CropCompleted { sequence: u64, cropped: CroppedImage },
    /// The crop window is unchanged, so the crop can be retried.
    CropFailed {
        sequence: u64,
        result: CropResult,
        error: CropError,
    },
}

enum TaskMessage {
    Loaded {
        sequence: u64,
        reference: String,
        result: Result<LoadedImage, DecodeError>,
    },
    Cropped {
        sequence: u64,
        plan: CropPlan,
        result: Result<CroppedImage, CropError>,
    },
}

/// An editor plus its background load and crop tasks.
pub struct CropSession {
    editor: CropEditor,
    loader: ImageLoader,
    sender: Sender<TaskMessage>,
    receiver: Receiver<TaskMessage>,
    load_slot: TaskSlot,
    crop_slot: TaskSlot,
}

impl std::fmt::Debug for CropSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CropSession")
            .field("editor", &self.editor)
            .field("loading", &self.load_slot.is_running())
            .field("cropping", &self.crop_slot.is_running())
            .finish_non_exhaustive()
    }
}

impl CropSession {
    /// Validate `options` and create an empty session reading images through
    /// `resolver`.
    pub fn new(options: CropOptions, resolver: Arc<dyn SourceResolver>) -> Result<Self, CropError> {
        let loader = ImageLoader::new(resolver, &options);
        let editor = CropEditor::new(options)?;
        let (sender, receiver) = mpsc::channel();
        Ok(Self {
            editor,
            loader,
            sender,
            receiver,
            load_slot: TaskSlot::default(),
            crop_slot: TaskSlot::default(),
        })
    }

    pub fn editor(&self) -> &CropEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut CropEditor {
        &mut self.editor
    }

    /// Places the resolver offers images from.
    pub fn source_options(&self) -> Vec<SourceOption> {
        self.loader.resolver().source_options()
    }

    pub fn is_loading(&self) -> bool {
        self.load_slot.is_running()
    }

    pub fn is_cropping(&self) -> bool {
        self.crop_slot.is_running()
    }

    /// Start loading `reference` in the background, cancelling any load in
    /// flight. Returns the request's sequence number.
    pub fn load(&mut self, reference: impl Into<String>) -> Result<u64, CropError> {
        let reference = reference.into();
        let (sequence, cancel) = self.load_slot.begin();
        let loader = self.loader.clone();
        let sender = self.sender.clone();
        let task_reference = reference.clone();

        let spawned = std::thread::Builder::new()
            .name("cropper-load".into())
            .spawn(move || {
                let result = loader.load(&task_reference, &cancel);
                let _ = sender.send(TaskMessage::Loaded {
                    sequence,
                    reference: task_reference,
                    result,
                });
            });
        if let Err(err) = spawned {
            self.load_slot.cancel();
            return Err(CropError::ImageLoadFailure(DecodeError::from(err)));
        }
        debug!(sequence, %reference, "load started");
        Ok(sequence)
    }

    /// Show an image the host already decoded, superseding any load in
    /// flight.
    pub fn set_image(&mut self, image: LoadedImage) {
        self.load_slot.cancel();
        self.crop_slot.cancel();
        self.editor.set_image(image);
    }

    /// Start cropping the current window in the background, cancelling any
    /// crop in flight.
    ///
    /// The geometry is captured now; later edits do not affect this request.
    pub fn crop(&mut self, target: OutputTarget) -> Result<u64, CropError> {
        let job = self.editor.crop_job(target)?;
        let (sequence, cancel) = self.crop_slot.begin();
        let sender = self.sender.clone();

        let spawned = std::thread::Builder::new()
            .name("cropper-crop".into())
            .spawn(move || {
                let result = job.run(&cancel);
                let _ = sender.send(TaskMessage::Cropped {
                    sequence,
                    plan: job.plan,
                    result,
                });
            });
        if let Err(err) = spawned {
            self.crop_slot.cancel();
            return Err(CropError::CropFailure(CropFailureKind::Worker(err.to_string())));
        }
        debug!(sequence, "crop started");
        Ok(sequence)
    }

    pub fn cancel_load(&mut self) {
        self.load_slot.cancel();
    }

    pub fn cancel_crop(&mut self) {
        self.crop_slot.cancel();
    }

    /// Apply every result that has arrived, without blocking.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            if let Some(event) = self.apply(message) {
                events.push(event);
            }
        }
        events
    }

    /// Wait up to `timeout` for the next current result.
    pub fn poll_blocking(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(message) => {
                    if let Some(event) = self.apply(message) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn apply(&mut self, message: TaskMessage) -> Option<SessionEvent> {
        match message {
            TaskMessage::Loaded {
                sequence,
                reference,
                result,
            } => {
                if !self.load_slot.complete(sequence) {
                    warn!(sequence, %reference, "discarding stale load result");
                    return None;
                }
                match result {
                    Ok(image) => {
                        let (width, height) = image.dimensions();
                        self.crop_slot.cancel();
                        self.editor.set_image(image);
                        Some(SessionEvent::ImageLoaded {
                            sequence,
                            reference,
                            width,
                            height,
                        })
                    }
                    Err(err) => {
                        warn!(sequence, %reference, error = %err, "image load failed");
                        self.crop_slot.cancel();
                        self.editor.clear_image();
                        Some(SessionEvent::LoadFailed {
                            sequence,
                            reference,
                            error: CropError::ImageLoadFailure(err),
                        })
                    }
                }
            }
            TaskMessage::Cropped {
                sequence,
                plan,
                result,
            } => {
                if !self.crop_slot.complete(sequence) {
                    warn!(sequence, "discarding stale crop result");
                    return None;
                }
                match result {
                    Ok(cropped) => Some(SessionEvent::CropCompleted { sequence, cropped }),
                    Err(error) => {
                        warn!(sequence, error = %error, "crop failed");
                        Some(SessionEvent::CropFailed {
                            sequence,
                            result: plan.failure(&error),
                            error,
                        })
                    }
                }
            }
        }
    }
}

impl Drop for CropSession {
    fn drop(&mut self) {
        self.load_slot.cancel();
        self.crop_slot.cancel();
    }
}
