//! Page-fit controller — debounces change signals, serializes fit cycles, applies scales.
//!
//! # Architecture
//! - `FitController` is a cheap, cloneable handle. It sends commands to one actor task and
//!   reads the actor's published `FitSnapshot` from a `watch` channel.
//! - The actor owns `FitState` outright; nothing else reads or writes it.
//! - Measurement probes run in their own task and report back tagged with the reset epoch,
//!   so a probe that outlives a `reset()` is discarded on arrival.
//!
//! # Cycle
//! `Idle → Scheduled → Measuring → Applying → Idle`. The lock is taken when measuring
//! starts and held through the post-apply cooldown. Notifications that arrive while locked
//! are dropped, not queued: an actively edited document keeps producing them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::layout::calculator::{decide, relative_change, FitDecision, FitZone};
use crate::layout::policy::{FitPolicy, PolicyError};
use crate::layout::surface::{MeasureError, Measurement, PageId, RenderSurface};

// ────────────────────────────────────────────────────────────────────────────
// Observer seam
// ────────────────────────────────────────────────────────────────────────────

/// One-shot signal that content had to be compressed (or could not fit at all).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverflowWarning {
    pub measured_height: f32,
    pub page_height: f32,
    pub proposed_scale: f32,
    pub cannot_fit: bool,
    pub context_key: Option<String>,
}

impl OverflowWarning {
    pub fn message(&self) -> &'static str {
        if self.cannot_fit {
            "Content could not fit on one page even at the smallest font size."
        } else {
            "Content was shrunk to fit on one page."
        }
    }
}

/// Side effects of the controller, delivered on the controller task. Keep them cheap.
pub trait FitObserver: Send + Sync {
    /// The override changed. `None` means render at the base scale.
    fn on_scale_changed(&self, scale: Option<f32>);

    fn on_overflow_warning(&self, warning: &OverflowWarning);
}

// ────────────────────────────────────────────────────────────────────────────
// Observable state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPhase {
    Idle,
    Scheduled,
    Measuring,
    Applying,
}

/// Point-in-time copy of the controller state, published after every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSnapshot {
    pub phase: FitPhase,
    pub current_scale: Option<f32>,
    pub base_scale: Option<f32>,
    pub locked: bool,
    pub warning_active: bool,
    pub adjustments_applied: u64,
    pub context_key: Option<String>,
}

impl Default for FitSnapshot {
    fn default() -> Self {
        Self {
            phase: FitPhase::Idle,
            current_scale: None,
            base_scale: None,
            locked: false,
            warning_active: false,
            adjustments_applied: 0,
            context_key: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

enum Command {
    Notify,
    Reset {
        base_scale: f32,
        context_key: String,
    },
}

/// Handle to a running fit controller. The controller task stops once every handle is dropped.
#[derive(Clone)]
pub struct FitController {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<FitSnapshot>,
}

impl FitController {
    /// Validates `policy` and starts the controller task on the current tokio runtime.
    pub fn spawn(
        policy: FitPolicy,
        page: PageId,
        surface: Arc<dyn RenderSurface>,
        observer: Arc<dyn FitObserver>,
    ) -> Result<Self, PolicyError> {
        policy.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (measured_tx, measured_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(FitSnapshot::default());

        let actor = FitActor {
            policy,
            page,
            surface,
            observer,
            state: FitState::default(),
            measured_tx,
            snapshot_tx,
        };
        tokio::spawn(actor.run(commands_rx, measured_rx));

        Ok(Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
        })
    }

    /// Signals that the rendered content may have changed size.
    pub fn notify(&self) {
        if self.commands.send(Command::Notify).is_err() {
            debug!("fit controller stopped; notify ignored");
        }
    }

    /// Starts over from `base_scale`: drops any override, pending cycle, or warning and
    /// schedules a forced evaluation. `context_key` only labels logs.
    pub fn reset(&self, base_scale: f32, context_key: impl Into<String>) {
        let command = Command::Reset {
            base_scale,
            context_key: context_key.into(),
        };
        if self.commands.send(command).is_err() {
            debug!("fit controller stopped; reset ignored");
        }
    }

    pub fn current_scale(&self) -> Option<f32> {
        self.snapshot.borrow().current_scale
    }

    pub fn snapshot(&self) -> FitSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FitSnapshot> {
        self.snapshot.clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Actor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct FitState {
    current_scale: Option<f32>,
    base_scale: Option<f32>,
    locked: bool,
    last_adjustment_at: Option<Instant>,
    warning_active: bool,
    context_key: Option<String>,
    adjustments_applied: u64,
    /// Bumped by every reset; probe results from an older epoch are stale.
    epoch: u64,
    /// Next evaluation bypasses the spacing check (set by reset).
    forced: bool,
    measuring: bool,
    evaluate_at: Option<Instant>,
    unlock_at: Option<Instant>,
    warning_clear_at: Option<Instant>,
    snap_back_at: Option<Instant>,
}

struct MeasuredEvent {
    epoch: u64,
    outcome: Result<Measurement, MeasureError>,
}

struct FitActor {
    policy: FitPolicy,
    page: PageId,
    surface: Arc<dyn RenderSurface>,
    observer: Arc<dyn FitObserver>,
    state: FitState,
    measured_tx: mpsc::UnboundedSender<MeasuredEvent>,
    snapshot_tx: watch::Sender<FitSnapshot>,
}

impl FitActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut measured: mpsc::UnboundedReceiver<MeasuredEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Notify) => self.on_notify(),
                    Some(Command::Reset { base_scale, context_key }) => {
                        self.on_reset(base_scale, context_key)
                    }
                    None => break,
                },
                Some(event) = measured.recv() => self.on_measured(event),
                _ = sleep_until_opt(self.state.evaluate_at) => self.on_evaluate(),
                _ = sleep_until_opt(self.state.unlock_at) => self.on_unlock(),
                _ = sleep_until_opt(self.state.warning_clear_at) => {
                    self.state.warning_clear_at = None;
                    self.state.warning_active = false;
                }
                _ = sleep_until_opt(self.state.snap_back_at) => self.on_snap_back(),
            }
            self.publish();
        }
        debug!(context_key = ?self.state.context_key, "fit controller stopped");
    }

    fn on_notify(&mut self) {
        if self.state.locked {
            debug!("fit cycle in flight; change notification dropped");
            return;
        }
        // Each notification restarts the single pending timer.
        self.state.evaluate_at = Some(Instant::now() + self.policy.settle_delay);
    }

    fn on_reset(&mut self, base_scale: f32, context_key: String) {
        if !base_scale.is_finite() || base_scale <= 0.0 {
            warn!(base_scale, context_key = %context_key, "ignoring reset to a non-positive base scale");
            return;
        }

        let state = &mut self.state;
        state.epoch += 1;
        state.locked = false;
        state.measuring = false;
        state.unlock_at = None;
        state.snap_back_at = None;
        state.warning_active = false;
        state.warning_clear_at = None;
        state.base_scale = Some(base_scale);
        state.context_key = Some(context_key);
        state.forced = true;
        state.evaluate_at = Some(Instant::now() + self.policy.settle_delay);
        let had_override = state.current_scale.take().is_some();

        info!(
            base_scale,
            context_key = ?self.state.context_key,
            "fit state reset"
        );

        if had_override {
            self.observer.on_scale_changed(None);
        }
    }

    fn on_evaluate(&mut self) {
        self.state.evaluate_at = None;

        if self.state.locked {
            return;
        }
        if self.state.base_scale.is_none() {
            debug!("no base scale yet; evaluation skipped");
            return;
        }

        if !self.state.forced {
            if let Some(last) = self.state.last_adjustment_at {
                let earliest = last + self.policy.debounce_interval;
                if Instant::now() < earliest {
                    self.state.evaluate_at = Some(earliest);
                    return;
                }
            }
        }

        self.state.forced = false;
        self.state.locked = true;
        self.state.measuring = true;

        let epoch = self.state.epoch;
        let page = self.page;
        let timeout = self.policy.measure_timeout;
        let surface = Arc::clone(&self.surface);
        let tx = self.measured_tx.clone();

        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, surface.measure(page)).await {
                Ok(result) => result,
                Err(_) => Err(MeasureError::TimedOut(timeout)),
            };
            // The controller may have stopped in the meantime.
            let _ = tx.send(MeasuredEvent { epoch, outcome });
        });
    }

    fn on_measured(&mut self, event: MeasuredEvent) {
        if event.epoch != self.state.epoch {
            debug!(
                stale_epoch = event.epoch,
                epoch = self.state.epoch,
                "discarding measurement from before reset"
            );
            return;
        }
        self.state.measuring = false;

        let measurement = match event.outcome {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "measurement unavailable; fit cycle skipped");
                self.release();
                return;
            }
        };
        let Some(base_scale) = self.state.base_scale else {
            self.release();
            return;
        };

        let decision = decide(
            measurement.content_height,
            measurement.page_height,
            self.state.current_scale,
            base_scale,
            &self.policy,
        );
        debug!(
            measured = measurement.content_height,
            page = measurement.page_height,
            zone = ?decision.zone,
            proposed = decision.proposed_scale,
            apply = decision.should_apply,
            "fit decision"
        );

        if decision.should_warn_overflow {
            self.raise_warning(&decision, &measurement);
        } else if decision.zone == FitZone::WithinBand {
            self.state.warning_active = false;
            self.state.warning_clear_at = None;
        }

        if decision.should_apply {
            let floor = self.policy.scale_floor(base_scale);
            let ceiling = self.policy.scale_ceiling(base_scale);
            self.apply(decision.proposed_scale.clamp(floor, ceiling));
            // Keep the lock while the surface re-lays out at the new scale.
            self.state.unlock_at = Some(Instant::now() + self.policy.cooldown);
            return;
        }

        self.release();

        let content_fits = matches!(
            decision.zone,
            FitZone::WithinBand | FitZone::NearMissSparse | FitZone::TooSparse
        );
        if let Some(current) = self.state.current_scale {
            if content_fits && relative_change(current, base_scale) <= self.policy.snap_back_band {
                self.state.snap_back_at = Some(Instant::now() + self.policy.snap_back_delay);
            }
        }
    }

    fn apply(&mut self, scale: f32) {
        let previous = self.state.current_scale;
        self.state.current_scale = Some(scale);
        self.state.last_adjustment_at = Some(Instant::now());
        self.state.adjustments_applied += 1;
        self.state.snap_back_at = None;

        info!(
            from = ?previous,
            to = scale,
            context_key = ?self.state.context_key,
            "fit scale applied"
        );
        self.observer.on_scale_changed(Some(scale));
    }

    fn raise_warning(&mut self, decision: &FitDecision, measurement: &Measurement) {
        if self.state.warning_active {
            return;
        }
        self.state.warning_active = true;
        self.state.warning_clear_at = Some(Instant::now() + self.policy.warning_display);

        let warning = OverflowWarning {
            measured_height: measurement.content_height,
            page_height: measurement.page_height,
            proposed_scale: decision.proposed_scale,
            cannot_fit: decision.cannot_fit,
            context_key: self.state.context_key.clone(),
        };
        warn!(
            measured = warning.measured_height,
            page = warning.page_height,
            cannot_fit = warning.cannot_fit,
            "content overflows the page"
        );
        self.observer.on_overflow_warning(&warning);
    }

    fn release(&mut self) {
        self.state.locked = false;
        self.state.measuring = false;
    }

    fn on_unlock(&mut self) {
        self.state.unlock_at = None;
        self.release();
    }

    fn on_snap_back(&mut self) {
        self.state.snap_back_at = None;
        if self.state.locked || self.state.evaluate_at.is_some() {
            return;
        }
        if let Some(scale) = self.state.current_scale.take() {
            // Removing the override is a visible rescale; it counts toward spacing.
            self.state.last_adjustment_at = Some(Instant::now());
            info!(from = scale, "fit converged; override removed");
            self.observer.on_scale_changed(None);
        }
    }

    fn phase(&self) -> FitPhase {
        if self.state.measuring {
            FitPhase::Measuring
        } else if self.state.unlock_at.is_some() {
            FitPhase::Applying
        } else if self.state.evaluate_at.is_some() {
            FitPhase::Scheduled
        } else {
            FitPhase::Idle
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(FitSnapshot {
            phase: self.phase(),
            current_scale: self.state.current_scale,
            base_scale: self.state.base_scale,
            locked: self.state.locked,
            warning_active: self.state.warning_active,
            adjustments_applied: self.state.adjustments_applied,
            context_key: self.state.context_key.clone(),
        });
    }
}

/// Sleeps until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
