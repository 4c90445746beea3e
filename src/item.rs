//! One rendered code: its surface, its actions, and its enlarge trigger.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::actions::{ActionBinding, ActionController, FEEDBACK_DURATION};
use crate::error::RenderError;
use crate::host::HostServices;
use crate::render::{CodeRenderer, SurfaceNode, SurfaceRef};

/// Tooltip of a list item's code.
pub const ENLARGE_HINT: &str = "Click to enlarge";

/// Collaborators every item is mounted with.
#[derive(Clone)]
pub struct RenderContext {
    pub renderer: Arc<dyn CodeRenderer>,
    pub host: HostServices,
    pub feedback_duration: Duration,
}

impl RenderContext {
    pub fn new(renderer: Arc<dyn CodeRenderer>, host: HostServices) -> Self {
        Self {
            renderer,
            host,
            feedback_duration: FEEDBACK_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Space,
    Escape,
    Other,
}

/// How the code region of an item was activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Pointer,
    Key(Key),
}

/// Where an item is shown. Only list items offer to enlarge themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    List,
    Enlarged,
}

/// An item asking to be shown in the enlarged view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnlargeRequest {
    pub text: String,
}

/// Renders one line of input as a code and wires its actions.
///
/// The item owns its surface exclusively; dropping the item detaches it.
pub struct ItemRenderer {
    text: String,
    size: f64,
    placement: Placement,
    surface: SurfaceRef,
    actions: ActionController,
    render_error: Option<RenderError>,
}

impl ItemRenderer {
    /// Mounts a list item for `text` at `size`. Returns `None` for empty text.
    ///
    /// A text the renderer cannot encode still mounts: the surface keeps its
    /// caption but no vector node, and the error is kept for display.
    pub fn mount(text: &str, size: f64, ctx: &RenderContext) -> Option<Self> {
        Self::mount_in(text, size, Placement::List, ctx)
    }

    pub fn mount_in(text: &str, size: f64, placement: Placement, ctx: &RenderContext) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        let surface = SurfaceRef::detached();
        let mut nodes = vec![SurfaceNode::Caption(format!("--- QR Code for: {text} ---"))];
        let render_error = match ctx.renderer.render(text, size) {
            Ok(node) => {
                nodes.push(SurfaceNode::Vector(node));
                None
            }
            Err(err) => {
                warn!(text, error = %err, "could not render code");
                Some(err)
            }
        };
        surface.mount(nodes);

        let binding = ActionBinding {
            text: text.to_string(),
            size,
            surface: surface.clone(),
        };
        let actions = ActionController::new(binding, ctx.host.clone()).with_feedback_duration(ctx.feedback_duration);
        Some(Self {
            text: text.to_string(),
            size,
            placement,
            surface,
            actions,
            render_error,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Tooltip of the code region: the enlarge hint for list items.
    pub fn title(&self) -> Option<&'static str> {
        match self.placement {
            Placement::List => Some(ENLARGE_HINT),
            Placement::Enlarged => None,
        }
    }

    pub fn surface(&self) -> &SurfaceRef {
        &self.surface
    }

    pub fn actions(&self) -> &ActionController {
        &self.actions
    }

    pub fn render_error(&self) -> Option<&RenderError> {
        self.render_error.as_ref()
    }

    /// Handles an activation of the code region. On a list item, pointer
    /// activation and the Enter and Space keys ask for the enlarged view.
    pub fn activate(&self, activation: Activation) -> Option<EnlargeRequest> {
        if self.placement == Placement::Enlarged {
            return None;
        }
        match activation {
            Activation::Pointer | Activation::Key(Key::Enter | Key::Space) => Some(EnlargeRequest {
                text: self.text.clone(),
            }),
            Activation::Key(_) => None,
        }
    }
}

impl Drop for ItemRenderer {
    fn drop(&mut self) {
        self.surface.detach();
    }
}

impl std::fmt::Debug for ItemRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemRenderer")
            .field("text", &self.text)
            .field("size", &self.size)
            .field("placement", &self.placement)
            .field("render_error", &self.render_error)
            .finish_non_exhaustive()
    }
}
