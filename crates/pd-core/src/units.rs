//! Physical constants shared across the workspace.
//!
//! Component-boundary values (`ScenarioInputs` fields, trajectory rows) are
//! plain, documented `f64` in the units named by their field doc comments —
//! Torr, Celsius, cm, g/mL, hours. None of it crosses into `uom`-typed
//! quantities: nothing downstream constructs or consumes a typed quantity, so
//! carrying the dependency bought no actual protection against a unit bug.

/// Physical constants referenced symbolically by the physics kernel (§4.1);
/// values are the ones a reader would find in a lyophilization reference
/// table. Non-goal per the outer scope: re-deriving or citing the table's
/// provenance here.
pub mod constants {
    /// Antoine-form constant C1 in `log(Psub) = log(C1) - C2/(Tsub + 273.15)`,
    /// Psub in Torr, Tsub in degrees Celsius.
    pub const VAPOR_PRESSURE_C1: f64 = 2.699e10;
    /// Antoine-form constant C2, kelvin.
    pub const VAPOR_PRESSURE_C2: f64 = 6145.0;
    /// Effective density of the ice/solids column used to convert mass flux
    /// into cake growth, g/cm^3.
    pub const RHO_ICE_EFFECTIVE: f64 = 0.918;
    /// Enthalpy of sublimation, cal/g.
    pub const DELTA_H_SUBLIMATION: f64 = 678.0;
    /// Ice thermal conductivity, cal/(s*cm*K).
    pub const K_ICE: f64 = 5.5e-3;
    /// Completion target fraction for INV10 (`frac_dried(1) >= eta`).
    pub const COMPLETION_TARGET_ETA: f64 = 0.99;
}
