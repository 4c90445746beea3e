//! Copy-text, copy-image and download actions for one rendered code.
//!
//! Every [`ActionController`] owns its own feedback state. Failures end here:
//! they are recorded as that instance's feedback and message line and never
//! leak into sibling controllers.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ActionError, RasterError};
use crate::host::{HostServices, ScopedHandle};
use crate::raster::to_raster;
use crate::render::SurfaceRef;
use crate::sanitize::download_filename;

/// How long success or failure feedback stays on a button.
pub const FEEDBACK_DURATION: Duration = Duration::from_millis(1500);

pub const SUCCESS_GLYPH: &str = "✔️";
pub const FAILURE_GLYPH: &str = "❌";

/// The three actions offered for every code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CopyText,
    CopyImage,
    Download,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::CopyText, ActionKind::CopyImage, ActionKind::Download];

    /// Label shown while the button is idle.
    pub fn idle_label(self) -> &'static str {
        match self {
            ActionKind::CopyText => "📋",
            ActionKind::CopyImage => "🖼️",
            ActionKind::Download => "💾",
        }
    }

    /// Tooltip of the button.
    pub fn title(self) -> &'static str {
        match self {
            ActionKind::CopyText => "Copy Input String",
            ActionKind::CopyImage => "Copy QR Code Image",
            ActionKind::Download => "Download QR Code (PNG)",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::CopyText => "Copy text",
            ActionKind::CopyImage => "Copy image",
            ActionKind::Download => "Download",
        })
    }
}

/// Transient state of one action button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedbackState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Busy,
    Success,
    Error,
}

/// Everything a front end needs to draw one action button.
///
/// Labels are single glyphs in every state, so the button keeps its
/// footprint when the feedback changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonView {
    pub kind: ActionKind,
    pub label: &'static str,
    pub title: &'static str,
    pub tone: Tone,
    pub enabled: bool,
}

/// What an action controller acts on: a text, the size it is rendered at,
/// and the surface holding the rendering.
#[derive(Debug, Clone)]
pub struct ActionBinding {
    pub text: String,
    pub size: f64,
    pub surface: SurfaceRef,
}

#[derive(Debug, Default)]
struct ButtonState {
    state: FeedbackState,
    generation: u64,
}

#[derive(Debug, Default)]
struct Feedback {
    buttons: [ButtonState; 3],
    message: Option<String>,
}

/// Runs the actions for one bound code and tracks their feedback.
pub struct ActionController {
    binding: ActionBinding,
    host: HostServices,
    feedback: Arc<Mutex<Feedback>>,
    display_for: Duration,
}

impl ActionController {
    pub fn new(binding: ActionBinding, host: HostServices) -> Self {
        Self {
            binding,
            host,
            feedback: Arc::default(),
            display_for: FEEDBACK_DURATION,
        }
    }

    /// Overrides how long feedback stays visible.
    pub fn with_feedback_duration(mut self, duration: Duration) -> Self {
        self.display_for = duration;
        self
    }

    pub fn binding(&self) -> &ActionBinding {
        &self.binding
    }

    /// Writes the bound text to the clipboard.
    pub async fn copy_text(&self) -> Result<(), ActionError> {
        self.run(ActionKind::CopyText, async {
            if self.binding.text.is_empty() {
                return Err(ActionError::NoText);
            }
            self.host
                .clipboard
                .write_text(&self.binding.text)
                .await
                .map_err(ActionError::host(ActionKind::CopyText))
        })
        .await
    }

    /// Rasterizes the bound code and writes the PNG to the clipboard.
    pub async fn copy_image(&self) -> Result<(), ActionError> {
        self.run(ActionKind::CopyImage, async {
            self.require_surface()?;
            let payload = to_raster(&self.binding.surface, self.binding.size).await?;
            if !self.host.clipboard.supports_images() {
                return Err(ActionError::ClipboardImageUnsupported);
            }
            self.host
                .clipboard
                .write_image(payload.bytes(), payload.mime_type())
                .await
                .map_err(ActionError::host(ActionKind::CopyImage))
        })
        .await
    }

    /// Rasterizes the bound code and hands it to the download service as
    /// `<sanitized text>_qrcode.png`.
    ///
    /// The temporary download handle is released on every exit path.
    pub async fn download_image(&self) -> Result<(), ActionError> {
        self.run(ActionKind::Download, async {
            self.require_surface()?;
            let payload = to_raster(&self.binding.surface, self.binding.size).await?;
            let filename = download_filename(&self.binding.text);
            let handle = ScopedHandle::acquire(self.host.downloads.as_ref(), payload)
                .await
                .map_err(ActionError::host(ActionKind::Download))?;
            handle
                .save(&filename)
                .await
                .map_err(ActionError::host(ActionKind::Download))
        })
        .await
    }

    /// Current state of one button.
    pub fn feedback(&self, kind: ActionKind) -> FeedbackState {
        self.lock().buttons[kind.index()].state.clone()
    }

    /// The message line of this instance, set by the last failed action and
    /// cleared when the next action starts.
    pub fn message(&self) -> Option<String> {
        self.lock().message.clone()
    }

    /// Whether any action of this instance is still running.
    pub fn is_busy(&self) -> bool {
        self.lock()
            .buttons
            .iter()
            .any(|b| b.state == FeedbackState::Pending)
    }

    pub fn button(&self, kind: ActionKind) -> ButtonView {
        let feedback = self.lock();
        Self::view(&feedback, kind)
    }

    pub fn buttons(&self) -> [ButtonView; 3] {
        let feedback = self.lock();
        ActionKind::ALL.map(|kind| Self::view(&feedback, kind))
    }

    fn view(feedback: &Feedback, kind: ActionKind) -> ButtonView {
        let busy = feedback.buttons.iter().any(|b| b.state == FeedbackState::Pending);
        let state = &feedback.buttons[kind.index()].state;
        let (label, tone) = match state {
            FeedbackState::Idle => (kind.idle_label(), Tone::Neutral),
            FeedbackState::Pending => (kind.idle_label(), Tone::Busy),
            FeedbackState::Succeeded => (SUCCESS_GLYPH, Tone::Success),
            FeedbackState::Failed(_) => (FAILURE_GLYPH, Tone::Error),
        };
        ButtonView {
            kind,
            label,
            title: kind.title(),
            tone,
            enabled: !busy && *state == FeedbackState::Idle,
        }
    }

    fn require_surface(&self) -> Result<(), ActionError> {
        if self.binding.surface.is_attached() {
            Ok(())
        } else {
            Err(RasterError::RefInvalid.into())
        }
    }

    async fn run<F>(&self, kind: ActionKind, op: F) -> Result<(), ActionError>
    where
        F: Future<Output = Result<(), ActionError>>,
    {
        let generation = self.begin(kind);
        let result = op.await;
        self.finish(kind, generation, &result);
        result
    }

    fn begin(&self, kind: ActionKind) -> u64 {
        let generation = {
            let mut feedback = self.lock();
            feedback.message = None;
            let button = &mut feedback.buttons[kind.index()];
            button.generation += 1;
            button.state = FeedbackState::Pending;
            button.generation
        };
        // A host service that never answers must not lock the instance.
        self.schedule_reset(kind, generation, Reset::IfPending);
        generation
    }

    fn finish(&self, kind: ActionKind, generation: u64, result: &Result<(), ActionError>) {
        {
            let mut feedback = self.lock();
            if feedback.buttons[kind.index()].generation != generation {
                return;
            }
            match result {
                Ok(()) => {
                    debug!(action = %kind, text = %self.binding.text, "action succeeded");
                    feedback.buttons[kind.index()].state = FeedbackState::Succeeded;
                }
                Err(err) => {
                    warn!(action = %kind, text = %self.binding.text, error = %err, "action failed");
                    feedback.buttons[kind.index()].state = FeedbackState::Failed(err.to_string());
                    feedback.message = Some(message_line(kind, err));
                }
            }
        }
        self.schedule_reset(kind, generation, Reset::Always);
    }

    /// Reverts the button to idle after the display duration unless a newer
    /// invocation has taken it over. Does not keep the controller alive.
    ///
    /// The operation itself keeps running; if it completes after a pending
    /// reset, its outcome is still shown and reset in turn.
    fn schedule_reset(&self, kind: ActionKind, generation: u64, reset: Reset) {
        let feedback = Arc::downgrade(&self.feedback);
        let delay = self.display_for;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(feedback) = feedback.upgrade() else {
                return;
            };
            let mut feedback = feedback.lock().unwrap_or_else(PoisonError::into_inner);
            let button = &mut feedback.buttons[kind.index()];
            let applies = match reset {
                Reset::Always => true,
                Reset::IfPending => button.state == FeedbackState::Pending,
            };
            if button.generation == generation && applies {
                debug!(action = %kind, ?reset, "feedback reset");
                button.state = FeedbackState::Idle;
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, Feedback> {
        self.feedback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ActionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionController")
            .field("binding", &self.binding)
            .field("feedback", &*self.lock())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum Reset {
    Always,
    IfPending,
}

fn message_line(kind: ActionKind, err: &ActionError) -> String {
    match err {
        // Already carries the operation name.
        ActionError::Host { .. } => err.to_string(),
        _ => format!("{kind} failed: {err}"),
    }
}
