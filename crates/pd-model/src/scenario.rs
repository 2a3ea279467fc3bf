//! `ScenarioInputs` (spec §3): the immutable record the model builder
//! consumes. Validation is eager and collective (§4.2): every offending
//! field is reported in one `ModelError::InvalidScenario`, never the first.

use crate::error::FieldViolation;
use pd_core::Real;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which controls are released to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ControlMode {
    Tsh,
    Pch,
    Both,
}

impl ControlMode {
    pub fn releases_tsh(self) -> bool {
        matches!(self, ControlMode::Tsh | ControlMode::Both)
    }

    pub fn releases_pch(self) -> bool {
        matches!(self, ControlMode::Pch | ControlMode::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlMode::Tsh => "Tsh",
            ControlMode::Pch => "Pch",
            ControlMode::Both => "both",
        }
    }
}

/// Vial geometry, cm^2 / mL.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VialGeometry {
    pub av_cm2: Real,
    pub ap_cm2: Real,
    pub vfill_ml: Real,
}

/// Product resistance/critical-temperature parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProductParams {
    pub r0: Real,
    pub a1: Real,
    pub a2: Real,
    pub t_pr_crit_c: Real,
    pub c_solid_g_per_ml: Real,
}

/// Heat-transfer correlation coefficients (INV6).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeatTransferParams {
    pub kc: Real,
    pub kp: Real,
    pub kd: Real,
}

/// Equipment capacity envelope (INV9): `mdot_max(Pch) = a*Pch + b`, kg/hr.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EquipmentCapacity {
    pub a: Real,
    pub b: Real,
}

/// A piecewise-constant reference trajectory for a control that is NOT
/// released in the active mode; sampled at mesh points by nearest tau.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedControlTrajectory {
    pub tau: Vec<Real>,
    pub value: Vec<Real>,
}

impl FixedControlTrajectory {
    pub fn constant(value: Real) -> Self {
        Self {
            tau: vec![0.0, 1.0],
            value: vec![value, value],
        }
    }

    /// Sample the piecewise-constant step function at `tau`.
    pub fn sample(&self, tau: Real) -> Real {
        let mut idx = 0;
        for (i, &t) in self.tau.iter().enumerate() {
            if t <= tau {
                idx = i;
            }
        }
        self.value[idx]
    }
}

/// Bounds plus optional ramp cap for one control.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlSpec {
    pub released: bool,
    pub lo: Real,
    pub hi: Real,
    pub ramp_max: Option<Real>,
    pub fixed_trajectory: Option<FixedControlTrajectory>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScenarioInputs {
    pub vial: VialGeometry,
    pub product: ProductParams,
    pub ht: HeatTransferParams,
    pub eq_cap: EquipmentCapacity,
    pub n_vial: u32,
    pub mode: ControlMode,
    pub tsh: ControlSpec,
    pub pch: ControlSpec,
    /// completion target eta for INV10; defaults to
    /// `pd_core::units::constants::COMPLETION_TARGET_ETA`.
    pub completion_eta: Real,
}

impl ScenarioInputs {
    /// Validate every field before a single NLP variable is created,
    /// collecting ALL violations rather than bailing on the first (§4.2
    /// rationale: a malformed bound otherwise surfaces as hundreds of
    /// lines of solver diagnostics far from the cause).
    pub fn validate(&self) -> Vec<FieldViolation> {
        let mut v = Vec::new();

        if self.n_vial == 0 {
            v.push(FieldViolation::new("n_vial", "must be >= 1"));
        }

        self.validate_tsh(&mut v);
        self.validate_pch(&mut v);

        if !(self.completion_eta > 0.0 && self.completion_eta <= 1.0) {
            v.push(FieldViolation::new(
                "completion_eta",
                "must lie in (0, 1]",
            ));
        }
        if self.vial.av_cm2 <= 0.0 {
            v.push(FieldViolation::new("vial.av_cm2", "must be > 0"));
        }
        if self.vial.ap_cm2 <= 0.0 {
            v.push(FieldViolation::new("vial.ap_cm2", "must be > 0"));
        }
        if self.vial.vfill_ml <= 0.0 {
            v.push(FieldViolation::new("vial.vfill_ml", "must be > 0"));
        }
        if self.product.t_pr_crit_c < -80.0 || self.product.t_pr_crit_c > 0.0 {
            v.push(FieldViolation::new(
                "product.t_pr_crit_c",
                "must lie in [-80, 0] degrees Celsius",
            ));
        }

        v
    }

    fn validate_tsh(&self, v: &mut Vec<FieldViolation>) {
        let released = self.mode.releases_tsh();
        if released != self.tsh.released {
            v.push(FieldViolation::new(
                "tsh.released",
                "must match whether Tsh is released under the active control mode",
            ));
        }
        if released {
            if !(self.tsh.lo < self.tsh.hi) {
                v.push(FieldViolation::new("tsh.lo/tsh.hi", "Tsh_min must be < Tsh_max"));
            }
            if self.tsh.lo < -50.0 || self.tsh.hi > 150.0 {
                v.push(FieldViolation::new(
                    "tsh.lo/tsh.hi",
                    "Tsh bounds must lie within [-50, 150] degrees Celsius",
                ));
            }
        } else if self.tsh.fixed_trajectory.is_none() {
            v.push(FieldViolation::new(
                "tsh.fixed_trajectory",
                "a reference trajectory is required when Tsh is not released",
            ));
        }
    }

    fn validate_pch(&self, v: &mut Vec<FieldViolation>) {
        let released = self.mode.releases_pch();
        if released != self.pch.released {
            v.push(FieldViolation::new(
                "pch.released",
                "must match whether Pch is released under the active control mode",
            ));
        }
        if released {
            if !(self.pch.lo < self.pch.hi) {
                v.push(FieldViolation::new("pch.lo/pch.hi", "Pch_min must be < Pch_max"));
            }
            if self.pch.lo < 0.01 || self.pch.hi > 1.0 {
                v.push(FieldViolation::new(
                    "pch.lo/pch.hi",
                    "Pch bounds must lie within (0.01, 1.0) Torr",
                ));
            }
        } else if self.pch.fixed_trajectory.is_none() {
            v.push(FieldViolation::new(
                "pch.fixed_trajectory",
                "a reference trajectory is required when Pch is not released",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scenario() -> ScenarioInputs {
        ScenarioInputs {
            vial: VialGeometry {
                av_cm2: 3.80,
                ap_cm2: 3.14,
                vfill_ml: 2.0,
            },
            product: ProductParams {
                r0: 1.4,
                a1: 16.0,
                a2: 0.0,
                t_pr_crit_c: -5.0,
                c_solid_g_per_ml: 0.05,
            },
            ht: HeatTransferParams {
                kc: 2.75e-4,
                kp: 8.93e-4,
                kd: 0.46,
            },
            eq_cap: EquipmentCapacity { a: -0.182, b: 11.7 },
            n_vial: 398,
            mode: ControlMode::Tsh,
            tsh: ControlSpec {
                released: true,
                lo: -45.0,
                hi: 120.0,
                ramp_max: Some(40.0),
                fixed_trajectory: None,
            },
            pch: ControlSpec {
                released: false,
                lo: 0.15,
                hi: 0.15,
                ramp_max: None,
                fixed_trajectory: Some(FixedControlTrajectory::constant(0.15)),
            },
            completion_eta: 0.99,
        }
    }

    #[test]
    fn valid_scenario_has_no_violations() {
        assert!(sample_scenario().validate().is_empty());
    }

    #[test]
    fn s6_pch_bounds_inverted_is_reported_and_collected_with_others() {
        let mut s = sample_scenario();
        s.mode = ControlMode::Pch;
        s.pch.released = true;
        s.pch.lo = 0.25;
        s.pch.hi = 0.05;
        s.tsh.released = false;
        s.tsh.fixed_trajectory = None; // second, independent violation

        let violations = s.validate();
        assert!(violations.iter().any(|f| f.field == "pch.lo/pch.hi"));
        assert!(violations.iter().any(|f| f.field == "tsh.fixed_trajectory"));
        assert!(violations.len() >= 2, "expected every violation to be collected, got {violations:?}");
    }
}
