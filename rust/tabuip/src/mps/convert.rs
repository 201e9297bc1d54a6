use super::{Mps, MpsObjSense, MpsParseError};
use crate::{Bound, ConstraintSense, Expression, Model, ObjectiveSense, VariableID};
use std::collections::HashMap;

/// Floor a bound value read from the file, warning when it was fractional.
/// Explicit integer bounds (`LI`/`UI`) and plain `LO`/`UP` on integer
/// columns share this semantics.
fn floor_bound(column: &str, side: &str, value: f64) -> i64 {
    let floored = value.floor();
    if floored != value && value.is_finite() {
        tracing::warn!(column, side, value, floored, "non-integer bound floored");
    }
    if value == f64::NEG_INFINITY {
        Bound::MINIMUM
    } else if value == f64::INFINITY {
        Bound::MAXIMUM
    } else {
        floored as i64
    }
}

/// Build a [`Model`] from parsed MPS data. Continuous columns are rejected
/// unless `accept_continuous` is set, in which case they are interpreted
/// as integer.
pub fn convert(mps: Mps, accept_continuous: bool) -> Result<Model, MpsParseError> {
    let mut model = Model::new(&mps.name);

    let mut ids: HashMap<String, VariableID> = HashMap::with_capacity(mps.vars.len());
    for name in &mps.vars {
        if mps.real.contains(name) {
            if !accept_continuous {
                return Err(MpsParseError::ContinuousColumn { name: name.clone() });
            }
            tracing::warn!(column = %name, "continuous column read as integer");
        }

        let id = if mps.binary.contains(name) {
            let id = model.binary_variable(name);
            // Explicit bounds may still narrow a binary column.
            let lower = mps.l.get(name).map_or(0, |&v| floor_bound(name, "lower", v));
            let upper = mps.u.get(name).map_or(1, |&v| floor_bound(name, "upper", v));
            let bound = Bound::new(lower.max(0), upper.min(1)).map_err(|_| {
                MpsParseError::EmptyBound {
                    name: name.clone(),
                    lower: lower as f64,
                    upper: upper as f64,
                }
            })?;
            model.variable_mut(id).set_bound(bound);
            id
        } else {
            let lower = match mps.l.get(name) {
                Some(&v) => floor_bound(name, "lower", v),
                None => 0,
            };
            let upper = match mps.u.get(name) {
                Some(&v) => floor_bound(name, "upper", v),
                // The MPS default: no lower bound entry means [0, +inf).
                None => Bound::MAXIMUM,
            };
            let bound = Bound::new(lower, upper).map_err(|_| MpsParseError::EmptyBound {
                name: name.clone(),
                lower: lower as f64,
                upper: upper as f64,
            })?;
            model.integer_variable(name, bound)
        };
        ids.insert(name.clone(), id);
    }

    let mut objective = Expression::default();
    for (column, &coefficient) in &mps.c {
        if let Some(&id) = ids.get(column) {
            objective.add_term(id, coefficient);
        }
    }
    // An RHS entry on the objective row is a constant offset with flipped
    // sign.
    if let Some(&offset) = mps.b.get(&mps.objective_name) {
        objective.add_constant(-offset);
    }
    let sense = match mps.obj_sense {
        MpsObjSense::Min => ObjectiveSense::Minimize,
        MpsObjSense::Max => ObjectiveSense::Maximize,
    };
    model.set_objective(objective, sense);

    for (row, coefficients) in &mps.a {
        let mut expression = Expression::default();
        for (column, &coefficient) in coefficients {
            if let Some(&id) = ids.get(column) {
                expression.add_term(id, coefficient);
            }
        }
        expression.set_constant(-mps.b.get(row).copied().unwrap_or(0.0));
        let sense = if mps.eq.contains(row) {
            ConstraintSense::Equal
        } else if mps.le.contains(row) {
            ConstraintSense::Less
        } else {
            ConstraintSense::Greater
        };
        model.add_constraint(row, expression, sense)?;
    }

    model.setup();
    Ok(model)
}
