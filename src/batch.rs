//! The batch of codes generated from multi-line input, plus the single
//! enlarged view shared by all of them.

use tracing::{debug, info};

use crate::item::{Activation, ItemRenderer, Placement, RenderContext};

/// Size of codes in the list, in pixels.
pub const LIST_SIZE: f64 = 128.0;

/// Upper bound of the enlarged code, in pixels.
pub const MAX_ENLARGED_SIZE: f64 = 512.0;

/// Visible area of the host, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Sizes used by a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizePolicy {
    pub list_size: f64,
    pub max_enlarged_size: f64,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            list_size: LIST_SIZE,
            max_enlarged_size: MAX_ENLARGED_SIZE,
        }
    }
}

impl SizePolicy {
    /// Size of the enlarged code: 70% of the viewport width, 60% of its
    /// height, never more than the cap.
    pub fn enlarged_size(&self, viewport: Viewport) -> f64 {
        (viewport.width * 0.7)
            .min(viewport.height * 0.6)
            .min(self.max_enlarged_size)
    }
}

/// Splits input into items: one per line, trimmed, blank lines dropped.
/// Order and duplicates are kept.
///
/// # Example
///
/// ```rust
/// use qrbatch::batch::split_items;
///
/// assert_eq!(split_items("a\n\nb\n  \nc"), vec!["a", "b", "c"]);
/// assert!(split_items("").is_empty());
/// ```
pub fn split_items(input: &str) -> Vec<String> {
    input
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// One-slot cache holding the enlarged item, keyed by its text.
#[derive(Debug)]
pub struct EnlargedSlot {
    key: String,
    item: ItemRenderer,
}

impl EnlargedSlot {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn item(&self) -> &ItemRenderer {
        &self.item
    }
}

/// Owns the input text, the generated items and the enlarged view.
pub struct BatchCoordinator {
    ctx: RenderContext,
    policy: SizePolicy,
    enlarged_size: f64,
    input: String,
    items: Vec<ItemRenderer>,
    enlarged: Option<EnlargedSlot>,
}

impl BatchCoordinator {
    pub fn new(ctx: RenderContext, viewport: Viewport) -> Self {
        Self::with_policy(ctx, SizePolicy::default(), viewport)
    }

    pub fn with_policy(ctx: RenderContext, policy: SizePolicy, viewport: Viewport) -> Self {
        Self {
            ctx,
            enlarged_size: policy.enlarged_size(viewport),
            policy,
            input: String::new(),
            items: Vec::new(),
            enlarged: None,
        }
    }

    /// Replaces the input text. Nothing is rendered until [`Self::generate`].
    pub fn set_input_text(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input_text(&self) -> &str {
        &self.input
    }

    /// Replaces the whole list with one item per non-blank input line.
    ///
    /// The enlarged view is left as it is: regenerating never opens or
    /// closes it.
    pub fn generate(&mut self) -> &[ItemRenderer] {
        let lines = split_items(&self.input);
        let size = self.policy.list_size;
        self.items = lines
            .iter()
            .filter_map(|line| ItemRenderer::mount(line, size, &self.ctx))
            .collect();
        info!(items = self.items.len(), "generated batch");
        &self.items
    }

    pub fn items(&self) -> &[ItemRenderer] {
        &self.items
    }

    /// Texts of the current items, in order.
    pub fn item_list(&self) -> Vec<&str> {
        self.items.iter().map(ItemRenderer::text).collect()
    }

    /// Shows `text` in the enlarged view.
    ///
    /// Opening the text that is already enlarged keeps the live item and
    /// its feedback; any other text replaces it. Empty text is ignored.
    pub fn open_enlarged(&mut self, text: &str) -> Option<&ItemRenderer> {
        let reuse = self.enlarged.as_ref().is_some_and(|slot| slot.key == text);
        if !reuse {
            let Some(item) = ItemRenderer::mount_in(text, self.enlarged_size, Placement::Enlarged, &self.ctx) else {
                debug!("ignoring request to enlarge empty text");
                return self.enlarged();
            };
            debug!(text, size = self.enlarged_size, "opening enlarged view");
            self.enlarged = Some(EnlargedSlot {
                key: text.to_string(),
                item,
            });
        }
        self.enlarged()
    }

    /// Closes the enlarged view, discarding its item and feedback.
    pub fn close_enlarged(&mut self) {
        if self.enlarged.take().is_some() {
            debug!("closed enlarged view");
        }
    }

    pub fn enlarged(&self) -> Option<&ItemRenderer> {
        self.enlarged.as_ref().map(EnlargedSlot::item)
    }

    pub fn enlarged_slot(&self) -> Option<&EnlargedSlot> {
        self.enlarged.as_ref()
    }

    /// Text currently shown enlarged, if any.
    pub fn enlarged_selection(&self) -> Option<&str> {
        self.enlarged.as_ref().map(EnlargedSlot::key)
    }

    /// Forwards an activation to the list item at `index` and opens the
    /// enlarged view if the item asks for it.
    pub fn activate(&mut self, index: usize, activation: Activation) -> Option<&ItemRenderer> {
        let request = self.items.get(index)?.activate(activation)?;
        self.open_enlarged(&request.text)
    }

    /// Recomputes the enlarged size for views opened from now on.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.enlarged_size = self.policy.enlarged_size(viewport);
    }

    pub fn list_size(&self) -> f64 {
        self.policy.list_size
    }

    pub fn enlarged_size(&self) -> f64 {
        self.enlarged_size
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("policy", &self.policy)
            .field("enlarged_size", &self.enlarged_size)
            .field("items", &self.items.len())
            .field("enlarged", &self.enlarged_selection())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::actions::{ActionKind, FeedbackState};
    use crate::host::{HostServices, MemoryClipboard, MemoryDownloads};
    use crate::item::Key;
    use crate::render::QrSvgRenderer;

    fn batch(clipboard: MemoryClipboard) -> BatchCoordinator {
        let host = HostServices::new(Arc::new(clipboard), Arc::new(MemoryDownloads::new()));
        let ctx = RenderContext::new(Arc::new(QrSvgRenderer::default()), host);
        BatchCoordinator::new(ctx, Viewport::new(1000.0, 800.0))
    }

    #[test]
    fn split_trims_and_drops_blank_lines() {
        assert_eq!(split_items("a\n\nb\n  \nc"), vec!["a", "b", "c"]);
        assert!(split_items("").is_empty());
        assert_eq!(split_items("  x \r\ny\r\n"), vec!["x", "y"]);
        assert_eq!(split_items("dup\ndup"), vec!["dup", "dup"]);
    }

    #[test]
    fn enlarged_size_is_clamped() {
        let policy = SizePolicy::default();
        assert_eq!(policy.enlarged_size(Viewport::new(1000.0, 800.0)), 480.0);
        assert_eq!(policy.enlarged_size(Viewport::new(400.0, 1000.0)), 280.0);
        assert_eq!(policy.enlarged_size(Viewport::new(4000.0, 4000.0)), 512.0);
    }

    #[test]
    fn input_is_only_stored_until_generate() {
        let mut batch = batch(MemoryClipboard::new());
        batch.set_input_text("a\nb");
        assert_eq!(batch.input_text(), "a\nb");
        assert!(batch.items().is_empty());

        batch.generate();
        assert_eq!(batch.item_list(), vec!["a", "b"]);
    }

    #[test]
    fn generate_replaces_list_and_detaches_old_surfaces() {
        let mut batch = batch(MemoryClipboard::new());
        batch.set_input_text("one\ntwo");
        batch.generate();
        let old = batch.items()[0].surface().clone();

        batch.set_input_text("three");
        batch.generate();
        assert_eq!(batch.item_list(), vec!["three"]);
        assert!(!old.is_attached());
        assert!(batch.items().iter().all(|i| i.size() == LIST_SIZE));
    }

    #[test]
    fn generate_keeps_enlarged_selection() {
        let mut batch = batch(MemoryClipboard::new());
        batch.set_input_text("x\ny");
        batch.generate();
        batch.open_enlarged("x");

        batch.set_input_text("completely\ndifferent");
        batch.generate();
        assert_eq!(batch.enlarged_selection(), Some("x"));

        batch.close_enlarged();
        batch.generate();
        assert_eq!(batch.enlarged_selection(), None);
    }

    #[test]
    fn enlarged_item_uses_its_own_surface_and_size() {
        let mut batch = batch(MemoryClipboard::new());
        batch.set_input_text("hello");
        batch.generate();

        let enlarged = batch.activate(0, Activation::Pointer).unwrap();
        assert_eq!(enlarged.text(), "hello");
        assert_eq!(enlarged.size(), 480.0);
        assert_eq!(enlarged.title(), None);
        let enlarged_surface = enlarged.surface().clone();
        assert!(!enlarged_surface.same_surface(batch.items()[0].surface()));
    }

    #[test]
    fn activation_rules() {
        let mut batch = batch(MemoryClipboard::new());
        batch.set_input_text("a\nb");
        batch.generate();

        assert!(batch.activate(1, Activation::Key(Key::Escape)).is_none());
        assert_eq!(batch.enlarged_selection(), None);
        assert!(batch.activate(5, Activation::Pointer).is_none());

        batch.activate(1, Activation::Key(Key::Enter));
        assert_eq!(batch.enlarged_selection(), Some("b"));
        batch.activate(0, Activation::Key(Key::Space));
        assert_eq!(batch.enlarged_selection(), Some("a"));
    }

    #[test]
    fn empty_text_does_not_open() {
        let mut batch = batch(MemoryClipboard::new());
        assert!(batch.open_enlarged("").is_none());
        assert_eq!(batch.enlarged_selection(), None);
    }

    #[test]
    fn viewport_change_applies_to_next_open() {
        let mut batch = batch(MemoryClipboard::new());
        batch.open_enlarged("a");
        batch.set_viewport(Viewport::new(300.0, 300.0));
        assert_eq!(batch.enlarged().unwrap().size(), 480.0);

        batch.close_enlarged();
        assert_eq!(batch.open_enlarged("a").unwrap().size(), 180.0);
    }

    #[tokio::test]
    async fn reopening_starts_from_idle() {
        let mut batch = batch(MemoryClipboard::text_only());
        let enlarged = batch.open_enlarged("X").unwrap();
        assert!(enlarged.actions().copy_image().await.is_err());
        assert!(matches!(enlarged.actions().feedback(ActionKind::CopyImage), FeedbackState::Failed(_)));
        let old_surface = enlarged.surface().clone();

        batch.close_enlarged();
        assert_eq!(batch.enlarged_selection(), None);
        assert!(!old_surface.is_attached());

        let reopened = batch.open_enlarged("X").unwrap();
        assert_eq!(reopened.actions().feedback(ActionKind::CopyImage), FeedbackState::Idle);
        assert_eq!(reopened.actions().message(), None);
    }

    #[tokio::test]
    async fn opening_same_text_keeps_live_item() {
        let mut batch = batch(MemoryClipboard::text_only());
        let first = batch.open_enlarged("X").unwrap();
        assert!(first.actions().copy_image().await.is_err());
        let surface = first.surface().clone();

        let again = batch.open_enlarged("X").unwrap();
        assert!(again.surface().same_surface(&surface));
        assert!(again.actions().message().is_some());
        let slot = batch.enlarged_slot().unwrap();
        assert_eq!(slot.key(), "X");
        assert!(slot.item().surface().same_surface(&surface));

        let other = batch.open_enlarged("Y").unwrap();
        assert_eq!(other.actions().message(), None);
        assert!(!surface.is_attached());
    }

    #[tokio::test]
    async fn duplicate_items_are_isolated() {
        let mut batch = batch(MemoryClipboard::text_only());
        batch.set_input_text("https://a.example\nhello\nhello");
        let items = batch.generate();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].text(), "hello");
        assert_eq!(items[2].text(), "hello");
        assert!(!items[1].surface().same_surface(items[2].surface()));

        assert!(items[1].actions().copy_image().await.is_err());
        assert!(matches!(items[1].actions().feedback(ActionKind::CopyImage), FeedbackState::Failed(_)));
        assert!(items[1].actions().message().is_some());

        assert_eq!(items[2].actions().feedback(ActionKind::CopyImage), FeedbackState::Idle);
        assert_eq!(items[2].actions().message(), None);
        assert_eq!(items[0].actions().feedback(ActionKind::CopyImage), FeedbackState::Idle);

        // The failed item still works for other actions.
        items[1].actions().copy_text().await.unwrap();
    }
}
