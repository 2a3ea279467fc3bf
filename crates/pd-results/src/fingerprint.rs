//! Content-based hashing (§4.7, §6). Hashes cover only input fields, never
//! the trajectory, so trajectory growth alone cannot invalidate the
//! dedup/reuse check (§9 design note).

use serde::Serialize;
use sha2::{Digest, Sha256};

use pd_discretize::ReferenceRecord;
use pd_model::{MeshSpec, ScenarioInputs};
use pd_solver::SolverOptions;

const FINGERPRINT_LEN: usize = 16;

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn short(hex: String) -> String {
    hex.chars().take(FINGERPRINT_LEN).collect()
}

/// `hash.inputs` (§6): scenario + mesh + the grid overrides that produced
/// this case, so `P9` (reproducibility of `hash.inputs`) holds regardless
/// of solver-option churn.
pub fn input_hash(scenario: &ScenarioInputs, mesh_spec: &MeshSpec, task: &str) -> String {
    #[derive(Serialize)]
    struct Key<'a> {
        scenario: &'a ScenarioInputs,
        mesh_spec: &'a MeshSpec,
        task: &'a str,
    }
    let key = Key { scenario, mesh_spec, task };
    let json = serde_json::to_string(&key).unwrap_or_default();
    short(sha256_hex(json.as_bytes()))
}

/// `hash.record` (§6): the full persisted record body, computed by the
/// caller over the already-serialized JSON (excludes the hash block
/// itself, which would otherwise be self-referential).
pub fn record_hash(record_body_json: &str) -> String {
    short(sha256_hex(record_body_json.as_bytes()))
}

/// `option_fingerprint` (§4.7): SHA-256 (first 16 hex chars) over the full
/// solver options dictionary.
pub fn option_fingerprint(options: &SolverOptions) -> String {
    let json = serde_json::to_string(options).unwrap_or_default();
    short(sha256_hex(json.as_bytes()))
}

/// `warmstart.source_hash` (§6): SHA-256 (first 16 hex chars) over the
/// externally supplied reference trajectory the warm-start adapter
/// consumed. `ReferenceRecord` has no `Serialize` impl of its own (the
/// warm-start adapter is the only consumer of its fields, and they're
/// plain `Real`s), so the hash is taken over its `Debug` rendering, which
/// is deterministic for a fixed set of records.
pub fn reference_hash(records: &[ReferenceRecord]) -> String {
    let mut buf = String::new();
    for record in records {
        buf.push_str(&format!("{record:?};"));
    }
    short(sha256_hex(buf.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::Real;
    use pd_model::mesh::DiscMethod;
    use pd_model::scenario::{
        ControlMode, ControlSpec, EquipmentCapacity, FixedControlTrajectory, HeatTransferParams,
        ProductParams, VialGeometry,
    };

    fn scenario() -> ScenarioInputs {
        ScenarioInputs {
            vial: VialGeometry { av_cm2: 3.80, ap_cm2: 3.14, vfill_ml: 2.0 },
            product: ProductParams { r0: 1.4, a1: 16.0, a2: 0.0, t_pr_crit_c: -5.0, c_solid_g_per_ml: 0.05 },
            ht: HeatTransferParams { kc: 2.75e-4, kp: 8.93e-4, kd: 0.46 },
            eq_cap: EquipmentCapacity { a: -0.182, b: 11.7 },
            n_vial: 398,
            mode: ControlMode::Tsh,
            tsh: ControlSpec { released: true, lo: -45.0, hi: 120.0, ramp_max: Some(40.0), fixed_trajectory: None },
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

    fn mesh_spec() -> MeshSpec {
        MeshSpec { method: DiscMethod::BackwardEuler, n_elements: 24, n_collocation: 3, effective_nfe: true }
    }

    #[test]
    fn input_hash_is_stable_and_16_hex_chars() {
        let a = input_hash(&scenario(), &mesh_spec(), "Tsh");
        let b = input_hash(&scenario(), &mesh_spec(), "Tsh");
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
    }

    #[test]
    fn input_hash_differs_when_task_differs() {
        let a = input_hash(&scenario(), &mesh_spec(), "Tsh");
        let b = input_hash(&scenario(), &mesh_spec(), "Pch");
        assert_ne!(a, b);
    }

    #[test]
    fn option_fingerprint_is_stable_for_identical_options() {
        let opts = SolverOptions::default_for_mode(false);
        assert_eq!(option_fingerprint(&opts), option_fingerprint(&opts.clone()));
    }

    fn reference_record(t_hr: Real) -> ReferenceRecord {
        ReferenceRecord {
            t_hr,
            tsub_c: -10.0,
            tbot_c: -9.0,
            tsh_c: -15.0,
            pch_raw: 0.15,
            flux_kg_hr_m2: 0.2,
            frac_dried: 0.1,
        }
    }

    #[test]
    fn reference_hash_is_stable_and_16_hex_chars() {
        let records = vec![reference_record(0.0), reference_record(1.0)];
        let a = reference_hash(&records);
        let b = reference_hash(&records);
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
    }

    #[test]
    fn reference_hash_differs_when_records_differ() {
        let a = reference_hash(&[reference_record(0.0)]);
        let b = reference_hash(&[reference_record(1.0)]);
        assert_ne!(a, b);
    }
}
