//! Grid override paths: a closed, explicitly-matched enum validated at
//! parse time, rather than a dotted-path dictionary resolved by string
//! lookup at apply time.

use std::collections::BTreeMap;

use pd_model::ScenarioInputs;

use crate::error::{BenchError, BenchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridablePath {
    TshLo,
    TshHi,
    TshRampMax,
    PchLo,
    PchHi,
    PchRampMax,
    ProductR0,
    ProductA1,
    ProductA2,
    ProductTPrCritC,
    HtKc,
    HtKp,
    HtKd,
    EqCapA,
    EqCapB,
    VialAvCm2,
    VialApCm2,
    VialVfillMl,
    NVial,
    CompletionEta,
}

impl OverridablePath {
    pub fn parse(path: &str) -> BenchResult<Self> {
        Ok(match path {
            "tsh.lo" => Self::TshLo,
            "tsh.hi" => Self::TshHi,
            "tsh.ramp_max" => Self::TshRampMax,
            "pch.lo" => Self::PchLo,
            "pch.hi" => Self::PchHi,
            "pch.ramp_max" => Self::PchRampMax,
            "product.r0" => Self::ProductR0,
            "product.a1" => Self::ProductA1,
            "product.a2" => Self::ProductA2,
            "product.t_pr_crit_c" => Self::ProductTPrCritC,
            "ht.kc" => Self::HtKc,
            "ht.kp" => Self::HtKp,
            "ht.kd" => Self::HtKd,
            "eq_cap.a" => Self::EqCapA,
            "eq_cap.b" => Self::EqCapB,
            "vial.av_cm2" => Self::VialAvCm2,
            "vial.ap_cm2" => Self::VialApCm2,
            "vial.vfill_ml" => Self::VialVfillMl,
            "n_vial" => Self::NVial,
            "completion_eta" => Self::CompletionEta,
            other => return Err(BenchError::UnknownOverridePath(other.to_string())),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TshLo => "tsh.lo",
            Self::TshHi => "tsh.hi",
            Self::TshRampMax => "tsh.ramp_max",
            Self::PchLo => "pch.lo",
            Self::PchHi => "pch.hi",
            Self::PchRampMax => "pch.ramp_max",
            Self::ProductR0 => "product.r0",
            Self::ProductA1 => "product.a1",
            Self::ProductA2 => "product.a2",
            Self::ProductTPrCritC => "product.t_pr_crit_c",
            Self::HtKc => "ht.kc",
            Self::HtKp => "ht.kp",
            Self::HtKd => "ht.kd",
            Self::EqCapA => "eq_cap.a",
            Self::EqCapB => "eq_cap.b",
            Self::VialAvCm2 => "vial.av_cm2",
            Self::VialApCm2 => "vial.ap_cm2",
            Self::VialVfillMl => "vial.vfill_ml",
            Self::NVial => "n_vial",
            Self::CompletionEta => "completion_eta",
        }
    }
}

/// Applies every `(path, value)` pair to `scenario` in place, failing on
/// the first unrecognized path rather than silently ignoring it.
pub fn apply_overrides(scenario: &mut ScenarioInputs, overrides: &BTreeMap<String, f64>) -> BenchResult<()> {
    for (path, value) in overrides {
        apply_one(scenario, OverridablePath::parse(path)?, *value);
    }
    Ok(())
}

fn apply_one(scenario: &mut ScenarioInputs, path: OverridablePath, value: f64) {
    match path {
        OverridablePath::TshLo => scenario.tsh.lo = value,
        OverridablePath::TshHi => scenario.tsh.hi = value,
        OverridablePath::TshRampMax => scenario.tsh.ramp_max = Some(value),
        OverridablePath::PchLo => scenario.pch.lo = value,
        OverridablePath::PchHi => scenario.pch.hi = value,
        OverridablePath::PchRampMax => scenario.pch.ramp_max = Some(value),
        OverridablePath::ProductR0 => scenario.product.r0 = value,
        OverridablePath::ProductA1 => scenario.product.a1 = value,
        OverridablePath::ProductA2 => scenario.product.a2 = value,
        OverridablePath::ProductTPrCritC => scenario.product.t_pr_crit_c = value,
        OverridablePath::HtKc => scenario.ht.kc = value,
        OverridablePath::HtKp => scenario.ht.kp = value,
        OverridablePath::HtKd => scenario.ht.kd = value,
        OverridablePath::EqCapA => scenario.eq_cap.a = value,
        OverridablePath::EqCapB => scenario.eq_cap.b = value,
        OverridablePath::VialAvCm2 => scenario.vial.av_cm2 = value,
        OverridablePath::VialApCm2 => scenario.vial.ap_cm2 = value,
        OverridablePath::VialVfillMl => scenario.vial.vfill_ml = value,
        OverridablePath::NVial => scenario.n_vial = value as u32,
        OverridablePath::CompletionEta => scenario.completion_eta = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::s1_tsh_baseline;

    #[test]
    fn known_path_round_trips_through_as_str() {
        for raw in ["tsh.lo", "pch.ramp_max", "product.t_pr_crit_c", "n_vial"] {
            let parsed = OverridablePath::parse(raw).unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
    }

    #[test]
    fn unknown_path_is_rejected() {
        assert!(matches!(
            OverridablePath::parse("tsh.nonexistent"),
            Err(BenchError::UnknownOverridePath(_))
        ));
    }

    #[test]
    fn applying_an_override_mutates_only_the_targeted_field() {
        let mut scenario = s1_tsh_baseline();
        let mut overrides = BTreeMap::new();
        overrides.insert("tsh.hi".to_string(), 90.0);
        apply_overrides(&mut scenario, &overrides).unwrap();
        assert_eq!(scenario.tsh.hi, 90.0);
        assert_eq!(scenario.tsh.lo, -45.0);
    }
}
