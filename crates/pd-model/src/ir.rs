//! The variable/constraint intermediate representation the DAE model
//! builder hands to the discretizer and, ultimately, the solver (§4.2,
//! design note: "immutable continuous-time IR + pure discretization
//! function" to avoid the reference implementation's in-place "transformation
//! factory" mutation bug class).

use crate::mesh::MeshLayout;
use pd_core::Real;

/// Per-mesh-point algebraic/differential fields (§3 ModelState), in the
/// fixed order used to lay out the flat variable vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Lck,
    Tsub,
    Tbot,
    Psub,
    LogPsub,
    Dmdt,
    Kv,
    Rp,
    Tsh,
    Pch,
}

pub const FIELDS: [Field; 10] = [
    Field::Lck,
    Field::Tsub,
    Field::Tbot,
    Field::Psub,
    Field::LogPsub,
    Field::Dmdt,
    Field::Kv,
    Field::Rp,
    Field::Tsh,
    Field::Pch,
];

/// Nominal scale attached to every variable of a given field (§4.2):
/// `Kv*1e3`, `dmdt*0.1`, temperatures at `1`, named in the spec's own
/// examples. The rest bring their natural units closer to O(1) based on
/// their box bounds (`bounds.rs`): `Rp` ranges over orders of magnitude
/// more than a temperature or a pressure, so its scale pulls harder.
fn nominal_scale(field: Field) -> Real {
    match field {
        Field::Lck => 1.0,
        Field::Tsub | Field::Tbot | Field::Tsh => 1.0,
        Field::Psub => 1.0,
        Field::LogPsub => 1.0,
        Field::Dmdt => 0.1,
        Field::Kv => 1e3,
        Field::Rp => 1e-2,
        Field::Pch => 1.0,
    }
}

/// Tags the slack rows added by the ramp/bound layer and the capacity and
/// completion inequalities, so diagnostics can name which physical
/// constraint a slack's activity maps back to.
#[derive(Debug, Clone, PartialEq)]
pub enum SlackTag {
    EquipmentCapacity { mesh_point: usize },
    Completion,
    RampUpper { control: Field, k: usize },
    RampLower { control: Field, k: usize },
}

/// Maps `(field, mesh_point_index)` to a flat index in the NLP's state
/// vector, with scalar `Tf` and an arbitrary number of slack variables
/// appended after the per-point fields.
#[derive(Debug, Clone)]
pub struct VariableLayout {
    pub mesh: MeshLayout,
    field_base: [usize; FIELDS.len()],
    pub tf_index: usize,
    pub slacks: Vec<SlackTag>,
    slack_base: usize,
    pub len: usize,
    /// Nominal scale per flat index, attached at construction time (§4.2)
    /// rather than threaded through a side channel. `scaled = raw * scale`;
    /// `Tf` and slacks carry a scale of `1.0`.
    pub scale: Vec<Real>,
}

impl VariableLayout {
    pub fn new(mesh: MeshLayout, slacks: Vec<SlackTag>) -> Self {
        let n_points = mesh.total_mesh_points();
        let mut field_base = [0usize; FIELDS.len()];
        for (i, base) in field_base.iter_mut().enumerate() {
            *base = i * n_points;
        }
        let tf_index = FIELDS.len() * n_points;
        let slack_base = tf_index + 1;
        let len = slack_base + slacks.len();

        let mut scale = vec![1.0; len];
        for (i, field) in FIELDS.iter().enumerate() {
            let s = nominal_scale(*field);
            scale[field_base[i]..field_base[i] + n_points].fill(s);
        }

        Self {
            mesh,
            field_base,
            tf_index,
            slacks,
            slack_base,
            len,
            scale,
        }
    }

    fn field_slot(field: Field) -> usize {
        FIELDS.iter().position(|f| *f == field).expect("known field")
    }

    pub fn index(&self, field: Field, mesh_point: usize) -> usize {
        self.field_base[Self::field_slot(field)] + mesh_point
    }

    pub fn slack_index(&self, slack_pos: usize) -> usize {
        self.slack_base + slack_pos
    }

    pub fn n_mesh_points(&self) -> usize {
        self.mesh.total_mesh_points()
    }

    pub fn n_slacks(&self) -> usize {
        self.slacks.len()
    }

    pub fn get(&self, x: &[Real], field: Field, mesh_point: usize) -> Real {
        x[self.index(field, mesh_point)]
    }
}
