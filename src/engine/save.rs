//! Save coordinator
//!
//! Turns the dragged arrangement into new `order` values on the last fetched
//! token map and hands the whole map to the bridge in one write.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Engine, Phase};
use crate::bridge::EngineSignal;
use crate::drag::DragSurfaceProvider;
use crate::error::Diagnostic;
use crate::host::HostPage;
use crate::normalize::NormalizedOrder;
use crate::token::{OrderedItemMap, TokenId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderChange {
    pub id: TokenId,
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Entries whose `order` was rewritten
    pub changed: Vec<OrderChange>,
    /// Snapshot ids with no entry in the map
    pub stale: Vec<TokenId>,
}

/// Rewrite `order` from snapshot positions, looked up by id
///
/// Entries already at their snapshot position are left alone. Ids missing
/// from the map are collected in [`SaveOutcome::stale`].
pub fn apply_snapshot(tokens: &mut OrderedItemMap, snapshot: &[TokenId]) -> SaveOutcome {
    let mut outcome = SaveOutcome::default();

    for (position, id) in snapshot.iter().enumerate() {
        let Some(token) = tokens.get_mut(id) else {
            outcome.stale.push(id.clone());
            continue;
        };
        let position = u32::try_from(position).unwrap_or(u32::MAX);
        if token.order != position {
            debug!(id = %id, from = token.order, to = position, "order changed");
            outcome.changed.push(OrderChange {
                id: id.clone(),
                from: token.order,
                to: position,
            });
            token.order = position;
        }
    }
    outcome
}

impl<H, P> Engine<H, P>
where
    H: HostPage,
    P: DragSurfaceProvider,
{
    /// Commit the dragged order (save trigger clicked)
    pub fn save(&mut self, now: Instant) -> Option<SaveOutcome> {
        if self.phase != Phase::Bound {
            debug!(phase = ?self.phase, "Save requested while not bound, ignoring");
            return None;
        }
        let Some(binding) = self.binding.as_mut() else {
            debug!("Save requested without a drag surface, ignoring");
            return None;
        };
        if !binding.dirty().is_dirty() {
            debug!("Save requested but order is unchanged, ignoring");
            return None;
        }
        let Some(settings) = self.settings.as_mut() else {
            warn!("Save requested without fetched settings, ignoring");
            return None;
        };

        let snapshot = binding.snapshot();
        let outcome = apply_snapshot(settings.tokens_mut(), &snapshot);
        let committed = settings.clone();
        let order = NormalizedOrder::from_map(committed.tokens());
        binding.rebaseline(order.ids().to_vec());

        self.host.set_trigger_visible(&self.markers, false);
        for id in &outcome.stale {
            self.record(Diagnostic::StaleReference(id.clone()));
        }

        info!(changed = outcome.changed.len(), stale = outcome.stale.len(), "Committing new token order");
        self.order = Some(order);
        self.emit(EngineSignal::OrderChanged(committed));

        // Host re-renders after the write; confirm rather than assume.
        // Stays Bound until then so the re-render itself is not verified mid-way.
        self.reverify_at = Some(now + self.config.settle_delay());
        Some(outcome)
    }
}
