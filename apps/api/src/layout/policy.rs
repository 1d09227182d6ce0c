//! Fit Policy — immutable thresholds that govern when and how much the page-fit
//! controller rescales content.
//!
//! # Zone thresholds (defaults)
//! - target fill 95.5%, acceptable band 90–98% of page height
//! - near-miss sparse below 97% of target (≈ 92.6% fill)
//! - a proposed scale must move ≥ 20% away from the current one to be applied
//!
//! These are product-tuning knobs, not algorithmic constants, so every one of them
//! can be overridden from configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// A policy that cannot drive a stable fit loop. Raised at construction, never at runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("{field} must be a finite number greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f32 },

    #[error("fill ratios must satisfy min < target < max <= 1 (got {min} / {target} / {max})")]
    BandOrder { min: f32, target: f32, max: f32 },

    #[error("{field} must be at least 1.0 (got {value})")]
    CeilingBelowOne { field: &'static str, value: f32 },

    #[error("{field} must lie in (0, 1] (got {value})")]
    FloorOutOfRange { field: &'static str, value: f32 },

    #[error("{field} must be non-zero")]
    ZeroDuration { field: &'static str },
}

// ────────────────────────────────────────────────────────────────────────────
// Content kinds
// ────────────────────────────────────────────────────────────────────────────

/// How a template renders. Multi-pass content (two-column layouts, late-loading
/// fonts) needs a longer settle delay before its height is trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    #[default]
    SinglePass,
    MultiPass,
}

impl ContentKind {
    pub fn settle_delay(self) -> Duration {
        match self {
            ContentKind::SinglePass => Duration::from_millis(250),
            ContentKind::MultiPass => Duration::from_millis(500),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds for one preview session. Read-only for the lifetime of a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitPolicy {
    /// Desired fraction of page height the content should occupy.
    pub target_fill_ratio: f32,
    pub min_fill_ratio: f32,
    pub max_fill_ratio: f32,
    /// Minimum relative scale change worth applying (hysteresis band).
    pub tolerance_ratio: f32,
    /// Minimum spacing between two applied adjustments.
    pub debounce_interval: Duration,
    /// Wait after a notification before measuring.
    pub settle_delay: Duration,
    /// Absolute scale floor (font size in points).
    pub min_scale: f32,
    /// Growth cap for sparse content, as a multiple of the base scale.
    pub sparse_grow_ceiling: f32,
    /// Growth cap for near-miss sparse content.
    pub near_miss_grow_ceiling: f32,
    /// Shrink floor for the "fits but over target" zone.
    pub safety_shrink_floor: f32,
    /// Fraction of the target below which content counts as a near miss.
    pub near_miss_factor: f32,
    /// Relative distance from base within which an override is snapped back to none.
    pub snap_back_band: f32,
    /// How long the lock is held after applying, so the surface can re-layout.
    pub cooldown: Duration,
    /// How long an overflow warning suppresses further warnings.
    pub warning_display: Duration,
    pub snap_back_delay: Duration,
    /// Upper bound on one measurement probe before the cycle is abandoned.
    pub measure_timeout: Duration,
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self {
            target_fill_ratio: 0.955,
            min_fill_ratio: 0.90,
            max_fill_ratio: 0.98,
            tolerance_ratio: 0.20,
            debounce_interval: Duration::from_millis(300),
            settle_delay: ContentKind::SinglePass.settle_delay(),
            min_scale: 8.0,
            sparse_grow_ceiling: 1.25,
            near_miss_grow_ceiling: 1.20,
            safety_shrink_floor: 0.85,
            near_miss_factor: 0.97,
            snap_back_band: 0.08,
            cooldown: Duration::from_millis(600),
            warning_display: Duration::from_secs(5),
            snap_back_delay: Duration::from_millis(400),
            measure_timeout: Duration::from_secs(2),
        }
    }
}

impl FitPolicy {
    /// Validates `self` and returns it, failing fast on an unusable configuration.
    pub fn new(policy: FitPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(policy)
    }

    /// The default policy with the settle delay tuned for `kind`.
    pub fn for_content(kind: ContentKind) -> Self {
        Self {
            settle_delay: kind.settle_delay(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, value) in [
            ("target_fill_ratio", self.target_fill_ratio),
            ("min_fill_ratio", self.min_fill_ratio),
            ("max_fill_ratio", self.max_fill_ratio),
            ("tolerance_ratio", self.tolerance_ratio),
            ("min_scale", self.min_scale),
            ("near_miss_factor", self.near_miss_factor),
            ("snap_back_band", self.snap_back_band),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PolicyError::NotPositive { field, value });
            }
        }

        if !(self.min_fill_ratio < self.target_fill_ratio
            && self.target_fill_ratio < self.max_fill_ratio
            && self.max_fill_ratio <= 1.0)
        {
            return Err(PolicyError::BandOrder {
                min: self.min_fill_ratio,
                target: self.target_fill_ratio,
                max: self.max_fill_ratio,
            });
        }

        for (field, value) in [
            ("sparse_grow_ceiling", self.sparse_grow_ceiling),
            ("near_miss_grow_ceiling", self.near_miss_grow_ceiling),
        ] {
            if !value.is_finite() || value < 1.0 {
                return Err(PolicyError::CeilingBelowOne { field, value });
            }
        }

        for (field, value) in [
            ("safety_shrink_floor", self.safety_shrink_floor),
            ("near_miss_factor", self.near_miss_factor),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PolicyError::FloorOutOfRange { field, value });
            }
        }

        for (field, value) in [
            ("settle_delay", self.settle_delay),
            ("cooldown", self.cooldown),
            ("measure_timeout", self.measure_timeout),
        ] {
            if value.is_zero() {
                return Err(PolicyError::ZeroDuration { field });
            }
        }

        Ok(())
    }

    /// Lowest scale the controller may ever apply for `base_scale`.
    ///
    /// The absolute floor never rises above the base itself: a document whose
    /// nominal size is already below `min_scale` is not forced to grow on overflow.
    pub fn scale_floor(&self, base_scale: f32) -> f32 {
        self.min_scale.min(base_scale)
    }

    /// Highest scale the controller may ever apply for `base_scale`.
    pub fn scale_ceiling(&self, base_scale: f32) -> f32 {
        base_scale * self.sparse_grow_ceiling.max(self.near_miss_grow_ceiling)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        assert!(FitPolicy::default().validate().is_ok());
        assert!(FitPolicy::new(FitPolicy::for_content(ContentKind::MultiPass)).is_ok());
    }

    #[test]
    fn test_band_order_violation_rejected() {
        let policy = FitPolicy {
            min_fill_ratio: 0.96,
            ..FitPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::BandOrder { .. })
        ));

        let policy = FitPolicy {
            max_fill_ratio: 1.05,
            ..FitPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::BandOrder { .. })
        ));
    }

    #[test]
    fn test_non_positive_tolerance_rejected() {
        let policy = FitPolicy {
            tolerance_ratio: 0.0,
            ..FitPolicy::default()
        };
        assert_eq!(
            policy.validate(),
            Err(PolicyError::NotPositive {
                field: "tolerance_ratio",
                value: 0.0
            })
        );
    }

    #[test]
    fn test_nan_ratio_rejected() {
        let policy = FitPolicy {
            target_fill_ratio: f32::NAN,
            ..FitPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_ceiling_below_one_rejected() {
        let policy = FitPolicy {
            sparse_grow_ceiling: 0.9,
            ..FitPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::CeilingBelowOne { .. })
        ));
    }

    #[test]
    fn test_zero_settle_delay_rejected() {
        let policy = FitPolicy {
            settle_delay: Duration::ZERO,
            ..FitPolicy::default()
        };
        assert_eq!(
            policy.validate(),
            Err(PolicyError::ZeroDuration {
                field: "settle_delay"
            })
        );
    }

    #[test]
    fn test_multi_pass_content_settles_longer() {
        let single = FitPolicy::for_content(ContentKind::SinglePass);
        let multi = FitPolicy::for_content(ContentKind::MultiPass);
        assert!(multi.settle_delay > single.settle_delay);
        assert_eq!(single.tolerance_ratio, multi.tolerance_ratio);
    }

    #[test]
    fn test_scale_bounds() {
        let policy = FitPolicy::default();
        assert_eq!(policy.scale_floor(11.0), 8.0);
        // A base already below the absolute floor is its own floor.
        assert_eq!(policy.scale_floor(6.0), 6.0);
        assert!((policy.scale_ceiling(11.0) - 13.75).abs() < 1e-4);
    }
}
