//! In-memory host page
//!
//! Behaves like the host editor as far as the engine can tell: a container of
//! rows with color swatches, attributes and classes, a single save trigger, and
//! a drag capability that reorders draggable rows. Clones share the same page,
//! so a caller can keep a handle while the engine owns another.

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tokio::sync::watch;
use tracing::debug;

use super::{HostMarkers, HostPage, MutationFeed, RowView};
use crate::color::Rgb;
use crate::drag::{DragOptions, DragSurface, DragSurfaceProvider, GestureEnd, GestureSink};
use crate::normalize::NormalizedOrder;
use crate::token::{TokenId, TokenSettings};

#[derive(Debug, Clone, Default)]
struct SimRow {
    swatch: Option<String>,
    attributes: BTreeMap<String, String>,
    classes: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct SimTrigger {
    id: String,
    label: String,
    visible: bool,
}

struct ActiveSurface {
    serial: u64,
    options: DragOptions,
    sink: GestureSink,
}

#[derive(Default)]
struct PageState {
    container: bool,
    rows: Vec<SimRow>,
    trigger: Option<SimTrigger>,
    trigger_installs: usize,
    drag_unavailable: bool,
    surface: Option<ActiveSurface>,
    surfaces_created: u64,
}

#[derive(Clone)]
pub struct SimulatedPage {
    state: Rc<RefCell<PageState>>,
    mutations: Rc<watch::Sender<u64>>,
}

impl Default for SimulatedPage {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPage {
    /// An empty page without the token container
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            state: Rc::new(RefCell::new(PageState::default())),
            mutations: Rc::new(tx),
        }
    }

    pub fn mutations(&self) -> MutationFeed {
        self.mutations.subscribe()
    }

    fn notify(&self) {
        self.mutations.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Mount the container with untagged rows showing the given backgrounds
    pub fn mount<I, S>(&self, swatches: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.state.borrow_mut();
            state.container = true;
            state.rows = swatches
                .into_iter()
                .map(|swatch| SimRow {
                    swatch: Some(swatch.into()),
                    ..SimRow::default()
                })
                .collect();
        }
        self.notify();
    }

    /// Re-render the rows from settings the way the host editor does
    pub fn render(&self, settings: &TokenSettings) {
        let order = NormalizedOrder::from_map(settings.tokens());
        let swatches: Vec<String> = order
            .items()
            .iter()
            .map(|item| match Rgb::parse_rgba(&item.token.rgba) {
                Some(rgb) => rgb.to_string(),
                None => item.token.rgba.clone(),
            })
            .collect();
        self.mount(swatches);
    }

    pub fn unmount(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.container = false;
            state.rows.clear();
        }
        self.notify();
    }

    /// Change the background of one row (host-side edit)
    pub fn set_swatch(&self, index: usize, swatch: impl Into<String>) {
        if let Some(row) = self.state.borrow_mut().rows.get_mut(index) {
            row.swatch = Some(swatch.into());
        }
        self.notify();
    }

    /// Make the drag capability fail to construct
    pub fn set_drag_unavailable(&self, unavailable: bool) {
        self.state.borrow_mut().drag_unavailable = unavailable;
    }

    /// Drag the row at `from` so it lands at `to`, as a user would
    ///
    /// Returns false when no drag surface is active or the row is not
    /// draggable. A completed drag reports a gesture end to the live surface.
    pub fn drag(&self, from: usize, to: usize) -> bool {
        let sink = {
            let mut state = self.state.borrow_mut();
            let Some(surface) = state.surface.as_ref() else {
                return false;
            };
            let draggable_class = surface.options.draggable_class;
            let sink = surface.sink.clone();

            let movable = state
                .rows
                .get(from)
                .is_some_and(|row| row.classes.contains(draggable_class));
            if !movable || to >= state.rows.len() {
                return false;
            }
            let row = state.rows.remove(from);
            state.rows.insert(to, row);
            sink
        };
        self.notify();
        let _ = sink.send(GestureEnd);
        true
    }

    pub fn trigger_visible(&self) -> bool {
        self.state.borrow().trigger.as_ref().is_some_and(|t| t.visible)
    }

    pub fn trigger_installs(&self) -> usize {
        self.state.borrow().trigger_installs
    }

    pub fn trigger_label(&self) -> Option<String> {
        self.state.borrow().trigger.as_ref().map(|t| t.label.clone())
    }

    /// Value of `attr` on every row, in rendered order
    pub fn row_attribute(&self, attr: &str) -> Vec<Option<String>> {
        self.state
            .borrow()
            .rows
            .iter()
            .map(|row| row.attributes.get(attr).cloned())
            .collect()
    }

    pub fn has_live_surface(&self) -> bool {
        self.state.borrow().surface.is_some()
    }

    pub fn surfaces_created(&self) -> u64 {
        self.state.borrow().surfaces_created
    }
}

impl HostPage for SimulatedPage {
    fn has_container(&self, _markers: &HostMarkers) -> bool {
        self.state.borrow().container
    }

    fn rows(&self, markers: &HostMarkers) -> Option<Vec<RowView>> {
        let state = self.state.borrow();
        if !state.container {
            return None;
        }
        Some(
            state
                .rows
                .iter()
                .map(|row| RowView {
                    swatch: row.swatch.clone(),
                    id: row.attributes.get(markers.id_attr).map(|id| TokenId::new(id.as_str())),
                    draggable: row.classes.contains(markers.draggable_class),
                })
                .collect(),
        )
    }

    fn tag_row(&mut self, markers: &HostMarkers, index: usize, id: &TokenId) {
        let mut state = self.state.borrow_mut();
        if let Some(row) = state.rows.get_mut(index) {
            row.classes.insert(markers.draggable_class.to_string());
            row.attributes.insert(markers.id_attr.to_string(), id.to_string());
        }
    }

    fn install_trigger(&mut self, markers: &HostMarkers) {
        let mut state = self.state.borrow_mut();
        if state.trigger.as_ref().is_some_and(|t| t.id == markers.trigger_id) {
            debug!(id = markers.trigger_id, "Save trigger already present");
            return;
        }
        state.trigger = Some(SimTrigger {
            id: markers.trigger_id.to_string(),
            label: markers.trigger_label.to_string(),
            visible: false,
        });
        state.trigger_installs += 1;
    }

    fn set_trigger_visible(&mut self, _markers: &HostMarkers, visible: bool) {
        if let Some(trigger) = self.state.borrow_mut().trigger.as_mut() {
            trigger.visible = visible;
        }
    }
}

/// Drag surface over the simulated rows
pub struct SimSurface {
    state: Rc<RefCell<PageState>>,
    serial: u64,
    id_attr: &'static str,
    draggable_class: &'static str,
}

impl DragSurface for SimSurface {
    fn to_array(&self) -> Vec<TokenId> {
        self.state
            .borrow()
            .rows
            .iter()
            .filter(|row| row.classes.contains(self.draggable_class))
            .filter_map(|row| row.attributes.get(self.id_attr))
            .map(|id| TokenId::new(id.as_str()))
            .collect()
    }

    fn destroy(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.surface.as_ref().is_some_and(|s| s.serial == self.serial) {
            state.surface = None;
        }
    }
}

impl DragSurfaceProvider for SimulatedPage {
    type Surface = SimSurface;

    fn create(&mut self, options: &DragOptions, on_end: GestureSink) -> Result<SimSurface> {
        let mut state = self.state.borrow_mut();
        if state.drag_unavailable {
            bail!("drag module exported no usable constructor");
        }
        state.surfaces_created += 1;
        let serial = state.surfaces_created;
        state.surface = Some(ActiveSurface {
            serial,
            options: options.clone(),
            sink: on_end,
        });
        Ok(SimSurface {
            state: self.state.clone(),
            serial,
            id_attr: options.id_attr,
            draggable_class: options.draggable_class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::ColorToken;
    use tokio::sync::mpsc;

    #[test]
    fn test_render_shows_rows_in_normalized_order() {
        let page = SimulatedPage::new();
        let settings: TokenSettings = [
            (TokenId::from("a"), ColorToken::new(1, "rgba(1,2,3,1)")),
            (TokenId::from("b"), ColorToken::new(0, "rgba(4,5,6,1)")),
        ]
        .into_iter()
        .collect();

        page.render(&settings);
        let rows = page.rows(&HostMarkers::default()).unwrap();
        let swatches: Vec<_> = rows.iter().map(|r| r.swatch.clone().unwrap()).collect();
        assert_eq!(swatches, vec!["rgb(4, 5, 6)", "rgb(1, 2, 3)"]);
    }

    #[test]
    fn test_trigger_installed_once() {
        let mut page = SimulatedPage::new();
        let markers = HostMarkers::default();
        page.install_trigger(&markers);
        page.install_trigger(&markers);

        assert_eq!(page.trigger_installs(), 1);
        assert_eq!(page.trigger_label().as_deref(), Some(markers.trigger_label));
        assert!(!page.trigger_visible());
        page.set_trigger_visible(&markers, true);
        assert!(page.trigger_visible());
    }

    #[test]
    fn test_drag_requires_live_surface_and_tagged_rows() {
        let mut page = SimulatedPage::new();
        let markers = HostMarkers::default();
        page.mount(["rgb(1, 1, 1)", "rgb(2, 2, 2)"]);
        assert!(!page.drag(0, 1));

        let (sink, mut gestures) = mpsc::unbounded_channel();
        let mut surface = page.create(&DragOptions::default(), sink).unwrap();
        assert!(!page.drag(0, 1), "untagged rows are not draggable");

        page.tag_row(&markers, 0, &TokenId::from("x"));
        page.tag_row(&markers, 1, &TokenId::from("y"));
        assert!(page.drag(0, 1));
        assert_eq!(gestures.try_recv(), Ok(GestureEnd));
        assert_eq!(surface.to_array(), vec![TokenId::from("y"), TokenId::from("x")]);

        surface.destroy();
        assert!(!page.has_live_surface());
        assert!(!page.drag(0, 1));
    }

    #[test]
    fn test_rows_report_tags_once_verified() {
        let mut page = SimulatedPage::new();
        let markers = HostMarkers::default();
        page.mount(["rgb(1, 1, 1)", "rgb(2, 2, 2)"]);

        let rows = page.rows(&markers).unwrap();
        assert!(rows.iter().all(|row| row.id.is_none() && !row.draggable));

        page.tag_row(&markers, 1, &TokenId::from("y"));
        let rows = page.rows(&markers).unwrap();
        assert_eq!(rows[0], RowView { swatch: Some("rgb(1, 1, 1)".to_string()), id: None, draggable: false });
        assert_eq!(rows[1].id, Some(TokenId::from("y")));
        assert!(rows[1].draggable);
    }

    #[test]
    fn test_unmount_removes_container() {
        let page = SimulatedPage::new();
        let markers = HostMarkers::default();
        page.mount(["rgb(1, 1, 1)"]);
        assert!(page.has_container(&markers));

        page.unmount();
        assert!(!page.has_container(&markers));
        assert_eq!(page.rows(&markers), None);
    }

    #[test]
    fn test_unavailable_drag_capability() {
        let mut page = SimulatedPage::new();
        page.set_drag_unavailable(true);
        let (sink, _gestures) = mpsc::unbounded_channel();
        assert!(page.create(&DragOptions::default(), sink).is_err());
    }

    #[test]
    fn test_mutations_are_announced() {
        let page = SimulatedPage::new();
        let feed = page.mutations();
        page.mount(["rgb(0, 0, 0)"]);
        assert!(feed.has_changed().unwrap());
    }
}
