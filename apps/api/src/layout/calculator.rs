//! Fit Calculator — pure mapping from one measured content height to a scale decision.
//!
//! # Zones (evaluated in order, first match wins)
//! 1. Overflow            `measured > page`                 → shrink, always warn
//! 2. Too sparse          `measured < page × min`           → grow, capped at base × 1.25
//! 3. Near-miss sparse    `measured < page × target × 0.97` → grow gently, capped at base × 1.20, never shrinks
//! 4. Over target, fits   `page × max < measured ≤ page`    → shrink slightly, floored at base × 0.85, never grows
//! 5. Within band                                           → no change
//!
//! A single proportional controller oscillates at the fits/overflows boundary. The zones
//! plus the tolerance gate keep small corrections from ever being applied; only true
//! overflow warns unconditionally.

use serde::{Deserialize, Serialize};

use crate::layout::policy::FitPolicy;

/// Which height zone a measurement fell into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitZone {
    Overflow,
    TooSparse,
    NearMissSparse,
    OverTarget,
    WithinBand,
}

/// Outcome of one fit evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDecision {
    pub zone: FitZone,
    pub proposed_scale: f32,
    /// The proposed scale differs from the current one by more than the tolerance.
    pub should_apply: bool,
    /// Content exceeded the page. Set regardless of `should_apply`.
    pub should_warn_overflow: bool,
    /// Content would still overflow at the scale floor.
    pub cannot_fit: bool,
}

/// Decides how to rescale content measured at `current_scale`.
///
/// `current_scale = None` means no override is active; the base scale is in effect.
pub fn decide(
    measured_height: f32,
    page_height: f32,
    current_scale: Option<f32>,
    base_scale: f32,
    policy: &FitPolicy,
) -> FitDecision {
    let current = current_scale.unwrap_or(base_scale);

    if !(measured_height.is_finite()
        && page_height.is_finite()
        && current.is_finite()
        && measured_height > 0.0
        && page_height > 0.0
        && current > 0.0)
    {
        return hold(current);
    }

    // Scale that would put the content exactly on target, assuming height ∝ scale.
    let on_target = current * (page_height * policy.target_fill_ratio) / measured_height;
    let floor = policy.scale_floor(base_scale);

    let (zone, proposed) = if measured_height > page_height {
        (FitZone::Overflow, on_target.max(floor))
    } else if measured_height < page_height * policy.min_fill_ratio {
        (
            FitZone::TooSparse,
            on_target.min(base_scale * policy.sparse_grow_ceiling),
        )
    } else if measured_height < page_height * policy.target_fill_ratio * policy.near_miss_factor {
        // Never shrinks: an override above the gentle ceiling came from zone 2.
        (
            FitZone::NearMissSparse,
            on_target
                .min(base_scale * policy.near_miss_grow_ceiling)
                .max(current),
        )
    } else if measured_height > page_height * policy.max_fill_ratio {
        // Never grows: a scale already under the safety floor is left where it is.
        (
            FitZone::OverTarget,
            on_target
                .max(base_scale * policy.safety_shrink_floor)
                .min(current),
        )
    } else {
        return FitDecision {
            zone: FitZone::WithinBand,
            ..hold(current)
        };
    };

    let overflow = zone == FitZone::Overflow;

    FitDecision {
        zone,
        proposed_scale: proposed,
        should_apply: relative_change(proposed, current) > policy.tolerance_ratio,
        should_warn_overflow: overflow,
        cannot_fit: overflow && measured_height * floor / current > page_height,
    }
}

/// `|proposed − current| / current`.
pub fn relative_change(proposed: f32, current: f32) -> f32 {
    if current == 0.0 {
        return f32::INFINITY;
    }
    ((proposed - current) / current).abs()
}

fn hold(current: f32) -> FitDecision {
    FitDecision {
        zone: FitZone::WithinBand,
        proposed_scale: current,
        should_apply: false,
        should_warn_overflow: false,
        cannot_fit: false,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
