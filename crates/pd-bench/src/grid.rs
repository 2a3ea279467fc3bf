//! Grid configuration and expansion: crosses a Cartesian product of
//! `--vary` override points with the requested discretization methods,
//! producing one `GridCase` per (overrides, method) combination.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};
use crate::overrides::OverridablePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    SequentialBaseline,
    FiniteDifferences,
    Collocation,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::SequentialBaseline => "sequential_baseline",
            Method::FiniteDifferences => "finite_differences",
            Method::Collocation => "collocation",
        }
    }

    pub fn parse(raw: &str) -> BenchResult<Self> {
        match raw {
            "sequential_baseline" => Ok(Method::SequentialBaseline),
            "finite_differences" => Ok(Method::FiniteDifferences),
            "collocation" => Ok(Method::Collocation),
            other => Err(BenchError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarySpec {
    pub path: String,
    pub values: Vec<f64>,
}

/// The full configuration surface for one grid invocation (§6's
/// scenario/task/grid fields plus the mesh and solver knobs needed to
/// resolve each case).
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub scenario: String,
    pub vary: Vec<VarySpec>,
    pub methods: Vec<Method>,
    pub n_elements: usize,
    pub n_collocation: usize,
    pub effective_nfe: bool,
    pub warmstart: bool,
    pub ramp_tsh_max: Option<f64>,
    pub ramp_pch_max: Option<f64>,
    pub force: bool,
}

/// One fully resolved case: a scenario override point crossed with one
/// discretization method. Serializable so an isolated worker process can
/// receive it as a file argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridCase {
    pub scenario_name: String,
    pub overrides: BTreeMap<String, f64>,
    pub method: Method,
    pub n_elements: usize,
    pub n_collocation: usize,
    pub effective_nfe: bool,
    pub warmstart: bool,
    pub ramp_tsh_max: Option<f64>,
    pub ramp_pch_max: Option<f64>,
}

/// Expands `config.vary` into the Cartesian product of override points,
/// crossed with every requested method. Validates every `vary` path up
/// front so a typo surfaces before any case runs rather than mid-grid.
pub fn expand(config: &GridConfig) -> BenchResult<Vec<GridCase>> {
    for spec in &config.vary {
        OverridablePath::parse(&spec.path)?;
    }
    let points = cartesian(&config.vary);
    let methods: &[Method] = if config.methods.is_empty() { &[Method::FiniteDifferences] } else { &config.methods };

    let mut cases = Vec::with_capacity(points.len() * methods.len());
    for overrides in &points {
        for &method in methods {
            cases.push(GridCase {
                scenario_name: config.scenario.clone(),
                overrides: overrides.clone(),
                method,
                n_elements: config.n_elements,
                n_collocation: config.n_collocation,
                effective_nfe: config.effective_nfe,
                warmstart: config.warmstart,
                ramp_tsh_max: config.ramp_tsh_max,
                ramp_pch_max: config.ramp_pch_max,
            });
        }
    }
    Ok(cases)
}

fn cartesian(vary: &[VarySpec]) -> Vec<BTreeMap<String, f64>> {
    let mut acc: Vec<BTreeMap<String, f64>> = vec![BTreeMap::new()];
    for spec in vary {
        let mut next = Vec::with_capacity(acc.len() * spec.values.len().max(1));
        for base in &acc {
            for &v in &spec.values {
                let mut m = base.clone();
                m.insert(spec.path.clone(), v);
                next.push(m);
            }
        }
        acc = next;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vary: Vec<VarySpec>, methods: Vec<Method>) -> GridConfig {
        GridConfig {
            scenario: "s1_tsh_baseline".to_string(),
            vary,
            methods,
            n_elements: 10,
            n_collocation: 3,
            effective_nfe: true,
            warmstart: false,
            ramp_tsh_max: None,
            ramp_pch_max: None,
            force: false,
        }
    }

    #[test]
    fn expansion_crosses_override_points_with_methods() {
        let cfg = config(
            vec![VarySpec { path: "tsh.hi".to_string(), values: vec![90.0, 100.0, 110.0] }],
            vec![Method::FiniteDifferences, Method::Collocation],
        );
        let cases = expand(&cfg).unwrap();
        assert_eq!(cases.len(), 6);
    }

    #[test]
    fn no_vary_specs_still_produces_one_case_per_method() {
        let cfg = config(vec![], vec![Method::FiniteDifferences]);
        let cases = expand(&cfg).unwrap();
        assert_eq!(cases.len(), 1);
    }

    #[test]
    fn unknown_vary_path_is_rejected_before_any_case_is_built() {
        let cfg = config(
            vec![VarySpec { path: "tsh.nonexistent".to_string(), values: vec![1.0] }],
            vec![Method::FiniteDifferences],
        );
        assert!(matches!(expand(&cfg), Err(BenchError::UnknownOverridePath(_))));
    }
}
