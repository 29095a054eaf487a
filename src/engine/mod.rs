//! Reconciliation engine
//!
//! Keeps the host's rendered token rows consistent with the normalized order
//! fetched through the bridge, and only attaches drag capability once every
//! row has been verified.
//!
//! A reconciliation pass compares the row count first (structural drift), then
//! each row's swatch against the expected token (content drift). Structural
//! drift halts the pass, detaches the drag surface and waits for the host to
//! re-render; content drift triggers a reset: tear down, drop the order, fetch
//! again. Resets are guarded by a cooldown lock so bursts of mismatches
//! collapse into a single round trip.
//!
//! While bound, a host mutation that leaves every row tagged and draggable is
//! the drag surface moving rows and is ignored. Anything else (rows re-rendered
//! without tags, rows added or removed, the container gone) re-runs the pass,
//! unless the user has unsaved changes or a save is settling.
//!
//! All state lives in [`Engine`]; the async [`Engine::run`] loop only routes
//! wake-ups (bridge replies, host events, mutations, gestures, timers) to the
//! synchronous handlers below.

use std::collections::VecDeque;
use std::future::pending;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeSignal, EngineSignal};
use crate::color::Rgb;
use crate::config::EngineConfig;
use crate::constants;
use crate::drag::{DragBinding, DragOptions, DragSurfaceProvider};
use crate::error::Diagnostic;
use crate::host::{ready_when, HostEvent, HostMarkers, HostPage, MutationFeed};
use crate::normalize::NormalizedOrder;
use crate::token::TokenSettings;

pub mod save;

pub use save::{apply_snapshot, OrderChange, SaveOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No order yet; one has been requested from the bridge
    AwaitingOrder,
    /// Order known, rendered rows not (yet) confirmed
    Verifying,
    /// Rows verified and drag surface attached
    Bound,
}

/// Result of comparing the rendered rows with the expected order
enum Verdict {
    NoOrder,
    NoContainer,
    Mismatch(Diagnostic),
    Verified,
}

/// Receiving ends the event loop listens on
pub struct EngineChannels {
    pub bridge: UnboundedReceiver<BridgeSignal>,
    pub host_events: UnboundedReceiver<HostEvent>,
    pub mutations: MutationFeed,
}

enum Wake {
    Bridge(BridgeSignal),
    BridgeClosed,
    Host(HostEvent),
    Mutated,
    FeedClosed,
    Gesture,
    Timer,
}

pub struct Engine<H: HostPage, P: DragSurfaceProvider> {
    config: EngineConfig,
    markers: HostMarkers,
    drag_options: DragOptions,
    host: H,
    provider: P,
    signals: UnboundedSender<EngineSignal>,

    phase: Phase,
    /// Last fetched raw map; saves are applied to it by id
    settings: Option<TokenSettings>,
    order: Option<NormalizedOrder>,
    binding: Option<DragBinding<P::Surface>>,
    drag_unavailable: bool,

    /// Held until the deadline; Some means a reset is cooling down
    reset_lock: Option<Instant>,
    /// A reset was coalesced while the lock was held
    reset_coalesced: bool,
    order_requested_at: Option<Instant>,
    reverify_at: Option<Instant>,

    resets: usize,
    diagnostics: VecDeque<Diagnostic>,
}

impl<H: HostPage, P: DragSurfaceProvider> Engine<H, P> {
    pub fn new(config: EngineConfig, host: H, provider: P, signals: UnboundedSender<EngineSignal>) -> Self {
        Self {
            config,
            markers: HostMarkers::default(),
            drag_options: DragOptions::default(),
            host,
            provider,
            signals,
            phase: Phase::AwaitingOrder,
            settings: None,
            order: None,
            binding: None,
            drag_unavailable: false,
            reset_lock: None,
            reset_coalesced: false,
            order_requested_at: None,
            reverify_at: None,
            resets: 0,
            diagnostics: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn order(&self) -> Option<&NormalizedOrder> {
        self.order.as_ref()
    }

    pub fn settings(&self) -> Option<&TokenSettings> {
        self.settings.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.dirty().is_dirty())
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Resets started so far (coalesced requests not counted)
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Most recent diagnostics, oldest first
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        if self.diagnostics.len() == constants::timing::DIAGNOSTIC_HISTORY {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }

    fn emit(&self, signal: EngineSignal) {
        if self.signals.send(signal).is_err() {
            warn!("Bridge relay is gone, signal dropped");
        }
    }

    /// Insert the save trigger and ask for the first order
    pub fn start(&mut self, now: Instant) {
        info!(key = %self.config.setting_key, "Starting reconciliation engine");
        self.host.install_trigger(&self.markers);
        self.host.set_trigger_visible(&self.markers, false);
        self.request_order(now);
    }

    fn request_order(&mut self, now: Instant) {
        self.phase = Phase::AwaitingOrder;

        // A reply may still be on its way; re-ask only once it is overdue
        if let Some(at) = self.order_requested_at
            && now < at + self.config.reset_cooldown()
        {
            debug!("Order already requested, waiting for the bridge");
            return;
        }
        debug!("Requesting initial order");
        self.order_requested_at = Some(now);
        self.emit(EngineSignal::RequestOrder);
    }

    /// Fresh order from the bridge
    pub fn on_bridge(&mut self, signal: BridgeSignal, now: Instant) {
        match signal {
            BridgeSignal::InitialOrder(settings) => {
                let order = NormalizedOrder::from_map(settings.tokens());
                info!(tokens = order.len(), "Received initial order");
                self.order_requested_at = None;
                self.settings = Some(settings);
                self.order = Some(order);
                self.phase = Phase::Verifying;
                self.reconcile(now);
            }
        }
    }

    /// Host re-rendered something
    pub fn on_mutation(&mut self, now: Instant) {
        match self.phase {
            Phase::Verifying => self.reconcile(now),
            Phase::AwaitingOrder => self.request_order(now),
            Phase::Bound => {
                if self.is_dirty() || self.reverify_at.is_some() {
                    debug!("Rows changed while dirty or settling, keeping binding");
                } else if self.rows_still_tagged() {
                    debug!("Rows moved by the drag surface");
                } else {
                    info!("Host re-rendered bound rows, re-verifying");
                    self.reconcile(now);
                }
            }
        }
    }

    /// Every rendered row still carries a known id and the draggable flag
    fn rows_still_tagged(&self) -> bool {
        let (Some(order), Some(rows)) = (self.order.as_ref(), self.host.rows(&self.markers)) else {
            return false;
        };
        rows.len() == order.len()
            && rows
                .iter()
                .all(|row| row.draggable && row.id.as_ref().is_some_and(|id| order.ids().contains(id)))
    }

    pub fn on_gesture_end(&mut self) {
        if self.phase != Phase::Bound {
            return;
        }
        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        let state = binding.on_gesture_end();
        self.host.set_trigger_visible(&self.markers, state.is_dirty());
    }

    /// Earliest pending timer
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.reset_lock, self.reverify_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every timer whose deadline has passed
    pub fn on_timers(&mut self, now: Instant) {
        if self.reset_lock.is_some_and(|deadline| deadline <= now) {
            self.reset_lock = None;
            debug!("Reset lock released");
            self.emit(EngineSignal::ResetComplete);
            if std::mem::take(&mut self.reset_coalesced) && self.phase == Phase::Verifying {
                self.reconcile(now);
            }
        }
        if self.reverify_at.is_some_and(|deadline| deadline <= now) {
            self.reverify_at = None;
            debug!("Settle delay elapsed, re-verifying");
            self.reconcile(now);
        }
    }

    /// One reconciliation pass
    pub fn reconcile(&mut self, now: Instant) {
        match self.verify() {
            Verdict::NoOrder => self.request_order(now),
            Verdict::NoContainer => {
                debug!(container = self.markers.container, "Token container not rendered, waiting");
                self.unbind();
            }
            Verdict::Mismatch(diagnostic @ Diagnostic::ContentMismatch { .. }) => {
                self.record(diagnostic);
                self.reset(now);
            }
            Verdict::Mismatch(diagnostic) => {
                self.unbind();
                self.record(diagnostic);
            }
            Verdict::Verified => self.bind(),
        }
    }

    fn verify(&mut self) -> Verdict {
        let Self { host, order, markers, .. } = self;
        let Some(order) = order.as_ref() else {
            return Verdict::NoOrder;
        };
        let Some(rows) = host.rows(markers) else {
            return Verdict::NoContainer;
        };

        if rows.len() != order.len() {
            return Verdict::Mismatch(Diagnostic::StructuralMismatch {
                on_screen: rows.len(),
                expected: order.len(),
            });
        }

        for (index, (row, item)) in rows.iter().zip(order.items()).enumerate() {
            let Some(expected) = Rgb::parse_rgba(&item.token.rgba) else {
                return Verdict::Mismatch(Diagnostic::InvalidColor {
                    id: item.id.clone(),
                    rgba: item.token.rgba.clone(),
                });
            };
            let actual = row.swatch.as_deref().and_then(Rgb::parse_css);
            if actual != Some(expected) {
                return Verdict::Mismatch(Diagnostic::ContentMismatch {
                    index,
                    id: item.id.clone(),
                    expected: expected.to_string(),
                    actual: row.swatch.clone(),
                });
            }
            host.tag_row(markers, index, &item.id);
        }
        Verdict::Verified
    }

    /// Detach the drag surface and wait for a successful pass
    fn unbind(&mut self) {
        if self.binding.take().is_some() {
            info!("Rows no longer match the order, drag surface detached");
        }
        self.host.set_trigger_visible(&self.markers, false);
        self.phase = Phase::Verifying;
    }

    fn bind(&mut self) {
        let Some(ids) = self.order.as_ref().map(|order| order.ids().to_vec()) else {
            return;
        };

        if let Some(binding) = self.binding.as_mut() {
            binding.rebaseline(ids);
        } else if self.drag_unavailable {
            debug!("Drag capability unavailable, rows stay static");
            self.phase = Phase::Verifying;
            return;
        } else {
            match DragBinding::bind(&mut self.provider, &self.drag_options, ids) {
                Ok(binding) => self.binding = Some(binding),
                Err(e) => {
                    self.drag_unavailable = true;
                    self.phase = Phase::Verifying;
                    self.record(Diagnostic::MissingDependency(format!("{e:#}")));
                    return;
                }
            }
        }

        self.host.set_trigger_visible(&self.markers, false);
        self.phase = Phase::Bound;
        info!(rows = self.order.as_ref().map_or(0, NormalizedOrder::len), "Token rows verified");
    }

    fn reset(&mut self, now: Instant) {
        if self.reset_lock.is_some() {
            self.reset_coalesced = true;
            self.phase = Phase::Verifying;
            self.record(Diagnostic::ReentrantReset);
            return;
        }

        info!("Color mismatch detected, resetting");
        self.reset_lock = Some(now + self.config.reset_cooldown());
        self.resets += 1;
        self.binding = None;
        self.reverify_at = None;
        self.host.set_trigger_visible(&self.markers, false);
        self.settings = None;
        self.order = None;
        self.order_requested_at = None;
        self.request_order(now);
    }

    /// Drive the engine until the host shuts down
    ///
    /// Waits for the token container to appear before the first request.
    pub async fn run(&mut self, channels: EngineChannels) {
        let EngineChannels {
            mut bridge,
            mut host_events,
            mut mutations,
        } = channels;

        let markers = self.markers.clone();
        let host = &self.host;
        if ready_when(mutations.clone(), || host.has_container(&markers)).await.is_err() {
            warn!("Host closed before the token container appeared");
            return;
        }
        mutations.borrow_and_update();
        self.start(Instant::now());

        let mut bridge_open = true;
        let mut feed_open = true;

        loop {
            let deadline = self.next_deadline();
            let wake = tokio::select! {
                signal = bridge.recv(), if bridge_open => match signal {
                    Some(signal) => Wake::Bridge(signal),
                    None => Wake::BridgeClosed,
                },
                event = host_events.recv() => match event {
                    Some(event) => Wake::Host(event),
                    None => Wake::Host(HostEvent::Shutdown),
                },
                changed = mutations.changed(), if feed_open => match changed {
                    Ok(()) => Wake::Mutated,
                    Err(_) => Wake::FeedClosed,
                },
                _ = next_gesture(&mut self.binding) => Wake::Gesture,
                _ = sleep_until_deadline(deadline) => Wake::Timer,
            };

            let now = Instant::now();
            match wake {
                Wake::Bridge(signal) => self.on_bridge(signal, now),
                Wake::BridgeClosed => {
                    warn!("Bridge relay stopped, no further orders will arrive");
                    bridge_open = false;
                }
                Wake::Host(HostEvent::SaveRequested) => {
                    self.save(now);
                }
                Wake::Host(HostEvent::Shutdown) => {
                    info!("Host shut down, stopping engine");
                    break;
                }
                Wake::Mutated => self.on_mutation(now),
                Wake::FeedClosed => {
                    debug!("Mutation feed closed");
                    feed_open = false;
                }
                Wake::Gesture => self.on_gesture_end(),
                Wake::Timer => self.on_timers(now),
            }
        }
    }
}

async fn next_gesture<S: crate::drag::DragSurface>(binding: &mut Option<DragBinding<S>>) {
    match binding {
        Some(binding) => {
            binding.next_gesture().await;
        }
        None => pending::<()>().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}
