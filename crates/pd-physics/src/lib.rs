//! Primary-drying physics kernel (spec §4.1): closed-form algebraic
//! relations with no state and no I/O. Every function here is defined on the
//! variable bounds the NLP uses and is continuously differentiable there;
//! callers (the model builder) are responsible for keeping arguments inside
//! those bounds; the kernel only reports genuine domain failures (division
//! blow-up, non-finite results) rather than enforcing bounds itself.

use pd_core::numeric::ensure_finite;
use pd_core::units::constants::{VAPOR_PRESSURE_C1, VAPOR_PRESSURE_C2};
use pd_core::{PdError, Real};

/// Saturation vapor pressure over ice, log form (INV1): returns
/// `(log_psub, psub)` in Torr. Strictly increasing in `tsub_c`.
pub fn psub_sat_log(tsub_c: Real) -> Result<(Real, Real), PdError> {
    let t_k = tsub_c + 273.15;
    if t_k <= 0.0 {
        return Err(PdError::InvalidArg {
            what: "tsub_c (absolute temperature must be positive)",
        });
    }
    let log_psub = VAPOR_PRESSURE_C1.ln() - VAPOR_PRESSURE_C2 / t_k;
    let psub = log_psub.exp();
    ensure_finite("log_psub", log_psub)?;
    ensure_finite("psub", psub)?;
    Ok((log_psub, psub))
}

/// Convenience wrapper returning only `psub` (Torr).
pub fn psub_sat(tsub_c: Real) -> Result<Real, PdError> {
    psub_sat_log(tsub_c).map(|(_, psub)| psub)
}

/// Cake mass-transfer resistance as a function of dried-layer thickness
/// (INV7): `Rp = R0 + A1*Lck/(1+A2*Lck)`, cm^2*hr*Torr/g. Non-decreasing in
/// `lck_cm` for `a1 >= 0, a2 >= 0`.
pub fn rp(lck_cm: Real, r0: Real, a1: Real, a2: Real) -> Result<Real, PdError> {
    if lck_cm < 0.0 {
        return Err(PdError::InvalidArg {
            what: "lck_cm (dried cake length must be non-negative)",
        });
    }
    let value = r0 + a1 * lck_cm / (1.0 + a2 * lck_cm);
    let value = ensure_finite("rp", value)?;
    if value <= 0.0 {
        return Err(PdError::Invariant {
            what: "rp must stay strictly positive (INV7)",
        });
    }
    Ok(value)
}

/// Vial heat-transfer coefficient as a function of chamber pressure
/// (INV6), solved from `Kv*(1+KD*Pch) = KC*(1+KD*Pch) + KP*Pch`:
/// `Kv = KC + KP*Pch/(1+KD*Pch)`, cal*s^-1*K^-1*cm^-2. Strictly increasing
/// in `pch_torr` for `kp > 0`.
pub fn kv(pch_torr: Real, kc: Real, kp: Real, kd: Real) -> Result<Real, PdError> {
    if pch_torr <= 0.0 {
        return Err(PdError::InvalidArg {
            what: "pch_torr (chamber pressure must be positive)",
        });
    }
    let value = kc + kp * pch_torr / (1.0 + kd * pch_torr);
    let value = ensure_finite("kv", value)?;
    if value <= 0.0 {
        return Err(PdError::Invariant {
            what: "kv must stay strictly positive (INV6)",
        });
    }
    Ok(value)
}

/// Initial frozen product height (cm), from fill volume and vial cross
/// section. `c_solid` (solids concentration, g/mL) is carried as an input
/// for API completeness with downstream dry-mass diagnostics; it does not
/// enter the height relation itself (fill volume already reports the
/// as-filled liquid height).
pub fn lpr0(vfill_ml: Real, ap_cm2: Real, c_solid_g_per_ml: Real) -> Result<Real, PdError> {
    if vfill_ml <= 0.0 || ap_cm2 <= 0.0 {
        return Err(PdError::InvalidArg {
            what: "vfill_ml and ap_cm2 must be strictly positive",
        });
    }
    if c_solid_g_per_ml < 0.0 {
        return Err(PdError::InvalidArg {
            what: "c_solid_g_per_ml must be non-negative",
        });
    }
    let value = vfill_ml / ap_cm2;
    ensure_finite("lpr0", value)
}

/// Equipment maximum sublimation capacity, affine upper envelope
/// `mdot_max(Pch) = a*Pch + b`, kg/hr.
pub fn mdot_max(pch_torr: Real, a: Real, b: Real) -> Result<Real, PdError> {
    let value = a * pch_torr + b;
    ensure_finite("mdot_max", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn psub_sat_matches_log_identity() {
        let (log_psub, psub) = psub_sat_log(-20.0).unwrap();
        let t_k = -20.0 + 273.15;
        let expected_log = VAPOR_PRESSURE_C1.ln() - VAPOR_PRESSURE_C2 / t_k;
        assert!((log_psub - expected_log).abs() < 1e-12);
        assert!((psub - expected_log.exp()).abs() < 1e-12 * psub.max(1.0));
    }

    #[test]
    fn kv_matches_closed_form_identity() {
        let (kc, kp, kd, pch) = (2.75e-4, 8.93e-4, 0.46, 0.15);
        let value = kv(pch, kc, kp, kd).unwrap();
        let lhs = value * (1.0 + kd * pch);
        let rhs = kc * (1.0 + kd * pch) + kp * pch;
        assert!((lhs - rhs).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn psub_sat_strictly_increasing(t1 in -60.0f64..-1.0, dt in 0.01f64..5.0) {
            let t2 = t1 + dt;
            let p1 = psub_sat(t1).unwrap();
            let p2 = psub_sat(t2).unwrap();
            prop_assert!(p2 > p1);
        }

        #[test]
        fn rp_non_decreasing_in_lck(lck1 in 0.0f64..3.0, dlck in 0.0f64..2.0, a1 in 0.0f64..30.0, a2 in 0.0f64..1.0) {
            let lck2 = lck1 + dlck;
            let r1 = rp(lck1, 1.4, a1, a2).unwrap();
            let r2 = rp(lck2, 1.4, a1, a2).unwrap();
            prop_assert!(r2 >= r1 - 1e-9);
        }

        #[test]
        fn kv_strictly_increasing_for_positive_kp(pch1 in 0.02f64..0.9, dpch in 0.001f64..0.1) {
            let pch2 = pch1 + dpch;
            let kv1 = kv(pch1, 2.75e-4, 8.93e-4, 0.46).unwrap();
            let kv2 = kv(pch2, 2.75e-4, 8.93e-4, 0.46).unwrap();
            prop_assert!(kv2 > kv1);
        }
    }
}
