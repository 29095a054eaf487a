//! Host page seam
//!
//! The rendered token list belongs to the host page, which may re-render it at
//! any time. The engine only reads rows, tags verified ones and toggles the
//! save trigger through [`HostPage`]. Mutations are announced on a
//! [`MutationFeed`].

use tokio::sync::watch;

use crate::constants;
use crate::token::TokenId;

pub mod readiness;
pub mod sim;

pub use readiness::ready_when;
pub use sim::SimulatedPage;

/// Subscription to host mutations; the value is a change counter
pub type MutationFeed = watch::Receiver<u64>;

/// Markers identifying the host elements the engine works with
///
/// Locating rows and their swatches is up to the [`HostPage`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMarkers {
    pub container: &'static str,
    pub draggable_class: &'static str,
    pub id_attr: &'static str,
    pub trigger_id: &'static str,
    pub trigger_label: &'static str,
}

impl Default for HostMarkers {
    fn default() -> Self {
        Self {
            container: constants::dom::CONTAINER_SELECTOR,
            draggable_class: constants::dom::DRAGGABLE_CLASS,
            id_attr: constants::dom::DATA_ID_ATTR,
            trigger_id: constants::dom::SAVE_TRIGGER_ID,
            trigger_label: constants::dom::SAVE_TRIGGER_LABEL,
        }
    }
}

/// What the engine can see of one rendered row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowView {
    /// Swatch background as rendered, None when the row has no swatch
    pub swatch: Option<String>,
    /// Id tag, present once the row was verified
    pub id: Option<TokenId>,
    pub draggable: bool,
}

/// User actions surfaced by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The save trigger was clicked
    SaveRequested,
    /// The page is going away
    Shutdown,
}

pub trait HostPage {
    fn has_container(&self, markers: &HostMarkers) -> bool;

    /// Rows in rendered order, None when the container is missing
    fn rows(&self, markers: &HostMarkers) -> Option<Vec<RowView>>;

    /// Set the id attribute and draggable class on row `index`
    fn tag_row(&mut self, markers: &HostMarkers, index: usize, id: &TokenId);

    /// Insert the (hidden) save trigger; repeated calls keep the single trigger
    fn install_trigger(&mut self, markers: &HostMarkers);

    fn set_trigger_visible(&mut self, markers: &HostMarkers, visible: bool);
}
