use crate::{Bound, ConstraintSense, Expression, Model, ModelError, ObjectiveSense};
use serde::{Deserialize, Serialize};

/// A model serialized by entity names: the `--export-json-instance` format.
/// Exporting right after loading and re-importing yields identical
/// entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceData {
    pub name: String,
    pub is_minimization: bool,
    pub variables: Vec<VariableData>,
    pub objective: ExpressionData,
    pub constraints: Vec<ConstraintData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableData {
    pub name: String,
    pub kind: String,
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub value: i64,
    pub is_fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionData {
    pub terms: Vec<TermData>,
    pub constant: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermData {
    pub variable: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintData {
    pub name: String,
    pub sense: String,
    pub expression: ExpressionData,
    pub is_enabled: bool,
}

fn expression_data(model: &Model, expression: &Expression, scale: f64) -> ExpressionData {
    let mut terms: Vec<TermData> = expression
        .sorted_terms()
        .into_iter()
        .map(|(id, coefficient)| TermData {
            variable: model.variable(id).name().to_string(),
            coefficient: scale * coefficient,
        })
        .collect();
    terms.sort_by(|a, b| a.variable.cmp(&b.variable));
    ExpressionData {
        terms,
        constant: scale * expression.constant(),
    }
}

impl InstanceData {
    pub fn from_model(model: &Model) -> Self {
        let is_minimization = model.objective().is_minimization();
        // The objective is stored negated for maximization; export what
        // the user wrote.
        let scale = model.objective().sign();
        Self {
            name: model.name().to_string(),
            is_minimization,
            variables: model
                .variables()
                .iter()
                .map(|v| VariableData {
                    name: v.name().to_string(),
                    kind: format!("{:?}", v.kind()),
                    lower: v.bound().has_lower().then(|| v.bound().lower()),
                    upper: v.bound().has_upper().then(|| v.bound().upper()),
                    value: v.value(),
                    is_fixed: v.is_fixed(),
                })
                .collect(),
            objective: expression_data(model, model.objective().expression(), scale),
            constraints: model
                .constraints()
                .iter()
                .map(|c| ConstraintData {
                    name: c.name().to_string(),
                    sense: c.sense().label().to_string(),
                    expression: expression_data(model, c.expression(), 1.0),
                    is_enabled: c.is_enabled(),
                })
                .collect(),
        }
    }

    pub fn to_model(&self) -> Result<Model, ModelError> {
        let mut model = Model::new(&self.name);
        for v in &self.variables {
            let lower = v.lower.unwrap_or(Bound::MINIMUM);
            let upper = v.upper.unwrap_or(Bound::MAXIMUM);
            let bound = Bound::new(lower, upper).map_err(|_| ModelError::InvalidBound {
                name: v.name.clone(),
                lower,
                upper,
            })?;
            let id = match v.kind.as_str() {
                "Binary" | "Selection" | "DependentBinary" => model.binary_variable(&v.name),
                _ => model.integer_variable(&v.name, bound),
            };
            if v.kind.as_str() == "Binary" {
                model.variable_mut(id).set_bound(bound);
            }
            if v.is_fixed {
                model.variable_mut(id).fix_to(v.value);
            } else {
                model.variable_mut(id).set_value_if_mutable(v.value);
            }
        }

        let build = |model: &Model, data: &ExpressionData| -> Result<Expression, ModelError> {
            let mut expression = Expression::default();
            for term in &data.terms {
                let id = model
                    .variable_by_name(&term.variable)
                    .ok_or_else(|| ModelError::UnknownVariable(term.variable.clone()))?;
                expression.add_term(id, term.coefficient);
            }
            expression.set_constant(data.constant);
            Ok(expression)
        };

        let objective = build(&model, &self.objective)?;
        let sense = if self.is_minimization {
            ObjectiveSense::Minimize
        } else {
            ObjectiveSense::Maximize
        };
        model.set_objective(objective, sense);

        for c in &self.constraints {
            let expression = build(&model, &c.expression)?;
            let sense = match c.sense.as_str() {
                "=" => ConstraintSense::Equal,
                ">=" => ConstraintSense::Greater,
                _ => ConstraintSense::Less,
            };
            let id = model.add_constraint(&c.name, expression, sense)?;
            if !c.is_enabled {
                model.constraint_mut(id).disable();
            }
        }
        model.setup();
        Ok(model)
    }
}
