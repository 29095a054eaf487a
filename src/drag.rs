//! Drag surface adapter
//!
//! The drag-and-drop capability is supplied by the embedder through a single
//! [`DragSurfaceProvider`]. [`DragBinding`] wraps the surface it creates and
//! decides whether the current arrangement differs from the last confirmed
//! order (the "dirty" state that shows the save trigger).

use anyhow::Result;
use std::future::pending;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::constants;
use crate::token::TokenId;

/// Options handed to the drag capability when a surface is created
#[derive(Debug, Clone, PartialEq)]
pub struct DragOptions {
    pub animation_ms: u32,
    pub ghost_class: &'static str,
    pub drag_class: &'static str,
    /// Only rows carrying this class can be dragged
    pub draggable_class: &'static str,
    /// Rows are picked up by this handle
    pub handle_selector: &'static str,
    /// Attribute read to report a row's id
    pub id_attr: &'static str,
}

impl Default for DragOptions {
    fn default() -> Self {
        Self {
            animation_ms: constants::drag::ANIMATION_MS,
            ghost_class: constants::drag::GHOST_CLASS,
            drag_class: constants::drag::DRAG_CLASS,
            draggable_class: constants::dom::DRAGGABLE_CLASS,
            handle_selector: constants::dom::HANDLE_SELECTOR,
            id_attr: constants::dom::DATA_ID_ATTR,
        }
    }
}

/// Reported by a surface every time the user releases a dragged row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureEnd;

pub type GestureSink = UnboundedSender<GestureEnd>;

/// A live drag-reorderable list
pub trait DragSurface {
    /// Ids of the draggable rows in their current on-screen order
    fn to_array(&self) -> Vec<TokenId>;

    /// Release listeners; the surface must not report gestures afterwards
    fn destroy(&mut self);
}

/// Constructs drag surfaces over the verified rows
pub trait DragSurfaceProvider {
    type Surface: DragSurface;

    /// Fails when the capability is unavailable (library missing, no constructor)
    fn create(&mut self, options: &DragOptions, on_end: GestureSink) -> Result<Self::Surface>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    Dirty,
}

impl DirtyState {
    pub fn is_dirty(self) -> bool {
        matches!(self, DirtyState::Dirty)
    }
}

/// A drag surface bound to the order it was created for
///
/// Dropping the binding destroys the surface and closes its gesture channel,
/// so a later binding never receives gestures from an old surface.
pub struct DragBinding<S: DragSurface> {
    surface: S,
    baseline: Vec<TokenId>,
    gestures: UnboundedReceiver<GestureEnd>,
    dirty: DirtyState,
}

impl<S: DragSurface> DragBinding<S> {
    pub fn bind<P>(provider: &mut P, options: &DragOptions, baseline: Vec<TokenId>) -> Result<Self>
    where
        P: DragSurfaceProvider<Surface = S>,
    {
        let (sink, gestures) = mpsc::unbounded_channel();
        let surface = provider.create(options, sink)?;
        info!(rows = baseline.len(), "Drag surface bound");
        Ok(Self {
            surface,
            baseline,
            gestures,
            dirty: DirtyState::Clean,
        })
    }

    pub fn baseline(&self) -> &[TokenId] {
        &self.baseline
    }

    pub fn dirty(&self) -> DirtyState {
        self.dirty
    }

    pub fn snapshot(&self) -> Vec<TokenId> {
        self.surface.to_array()
    }

    /// Compare a snapshot against the baseline and remember the result
    pub fn compare(&mut self, snapshot: &[TokenId]) -> DirtyState {
        self.dirty = if snapshot == self.baseline.as_slice() {
            DirtyState::Clean
        } else {
            DirtyState::Dirty
        };
        self.dirty
    }

    pub fn on_gesture_end(&mut self) -> DirtyState {
        let snapshot = self.snapshot();
        let state = self.compare(&snapshot);
        debug!(order = ?snapshot, dirty = state.is_dirty(), "Drag gesture ended");
        state
    }

    /// Adopt a newly confirmed order as the clean state
    pub fn rebaseline(&mut self, baseline: Vec<TokenId>) {
        self.baseline = baseline;
        self.dirty = DirtyState::Clean;
    }

    /// Resolves on the next gesture end, or never once the surface is gone
    pub async fn next_gesture(&mut self) -> GestureEnd {
        match self.gestures.recv().await {
            Some(gesture) => gesture,
            None => pending().await,
        }
    }
}

impl<S: DragSurface> Drop for DragBinding<S> {
    fn drop(&mut self) {
        self.gestures.close();
        self.surface.destroy();
        debug!("Drag surface destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeState {
        order: Vec<TokenId>,
        sinks: Vec<GestureSink>,
        destroyed: usize,
    }

    #[derive(Clone, Default)]
    struct FakeProvider {
        state: Rc<RefCell<FakeState>>,
        unavailable: bool,
    }

    struct FakeSurface {
        state: Rc<RefCell<FakeState>>,
    }

    impl DragSurface for FakeSurface {
        fn to_array(&self) -> Vec<TokenId> {
            self.state.borrow().order.clone()
        }

        fn destroy(&mut self) {
            let mut state = self.state.borrow_mut();
            state.destroyed += 1;
            state.sinks.clear();
        }
    }

    impl DragSurfaceProvider for FakeProvider {
        type Surface = FakeSurface;

        fn create(&mut self, _options: &DragOptions, on_end: GestureSink) -> Result<FakeSurface> {
            if self.unavailable {
                anyhow::bail!("no constructor exported");
            }
            self.state.borrow_mut().sinks.push(on_end);
            Ok(FakeSurface { state: self.state.clone() })
        }
    }

    fn ids(list: &[&str]) -> Vec<TokenId> {
        list.iter().map(|id| TokenId::from(*id)).collect()
    }

    #[test]
    fn test_dirty_detection_is_a_pure_comparison() {
        let mut provider = FakeProvider::default();
        let mut binding = DragBinding::bind(&mut provider, &DragOptions::default(), ids(&["a", "b", "c"])).unwrap();

        assert_eq!(binding.compare(&ids(&["a", "b", "c"])), DirtyState::Clean);
        assert_eq!(binding.compare(&ids(&["b", "a", "c"])), DirtyState::Dirty);
        assert_eq!(binding.compare(&ids(&["a", "b", "c"])), DirtyState::Clean);
    }

    #[test]
    fn test_gesture_end_is_idempotent() {
        let mut provider = FakeProvider::default();
        provider.state.borrow_mut().order = ids(&["b", "a"]);
        let mut binding = DragBinding::bind(&mut provider, &DragOptions::default(), ids(&["a", "b"])).unwrap();

        assert_eq!(binding.on_gesture_end(), DirtyState::Dirty);
        assert_eq!(binding.on_gesture_end(), DirtyState::Dirty);
        assert!(binding.dirty().is_dirty());
    }

    #[test]
    fn test_rebaseline_clears_dirty() {
        let mut provider = FakeProvider::default();
        let mut binding = DragBinding::bind(&mut provider, &DragOptions::default(), ids(&["a", "b"])).unwrap();
        binding.compare(&ids(&["b", "a"]));

        binding.rebaseline(ids(&["b", "a"]));
        assert_eq!(binding.dirty(), DirtyState::Clean);
        assert_eq!(binding.baseline(), ids(&["b", "a"]).as_slice());
    }

    #[test]
    fn test_drop_destroys_surface_and_releases_listeners() {
        let mut provider = FakeProvider::default();
        let binding = DragBinding::bind(&mut provider, &DragOptions::default(), ids(&["a"])).unwrap();
        assert_eq!(provider.state.borrow().sinks.len(), 1);

        drop(binding);
        assert_eq!(provider.state.borrow().destroyed, 1);
        assert!(provider.state.borrow().sinks.is_empty());
    }

    #[test]
    fn test_unavailable_capability_is_an_error() {
        let mut provider = FakeProvider {
            unavailable: true,
            ..FakeProvider::default()
        };
        assert!(DragBinding::bind(&mut provider, &DragOptions::default(), Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_gestures_reach_only_the_live_binding() {
        let mut provider = FakeProvider::default();
        let first = DragBinding::bind(&mut provider, &DragOptions::default(), ids(&["a"])).unwrap();
        let stale_sink = provider.state.borrow().sinks[0].clone();
        drop(first);

        let mut second = DragBinding::bind(&mut provider, &DragOptions::default(), ids(&["a"])).unwrap();
        assert!(stale_sink.send(GestureEnd).is_err());

        let live_sink = provider.state.borrow().sinks[0].clone();
        live_sink.send(GestureEnd).unwrap();
        assert_eq!(second.next_gesture().await, GestureEnd);
    }
}
