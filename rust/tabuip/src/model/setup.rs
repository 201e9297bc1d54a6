use crate::{ConstraintID, ConstraintKind, Model, VariableID, VariableKind};
use fnv::FnvHashMap;

/// Variable arena partitions, rebuilt by [`Model::setup`].
#[derive(Debug, Clone, Default)]
pub struct VariableReference {
    pub all: Vec<VariableID>,
    pub mutable: Vec<VariableID>,
    pub fixed: Vec<VariableID>,
    /// Mutable variables by kind.
    pub binary: Vec<VariableID>,
    pub integer: Vec<VariableID>,
    pub selection: Vec<VariableID>,
    pub dependent_binary: Vec<VariableID>,
    pub dependent_integer: Vec<VariableID>,
}

/// Constraint arena partitions, rebuilt by [`Model::setup`].
#[derive(Debug, Clone, Default)]
pub struct ConstraintReference {
    pub enabled: Vec<ConstraintID>,
    pub disabled: Vec<ConstraintID>,
    by_kind: FnvHashMap<ConstraintKind, Vec<ConstraintID>>,
}

impl ConstraintReference {
    /// Enabled constraints of the given kind.
    pub fn of_kind(&self, kind: ConstraintKind) -> &[ConstraintID] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds(&self) -> impl Iterator<Item = (&ConstraintKind, &Vec<ConstraintID>)> {
        self.by_kind.iter()
    }
}

impl Model {
    /// Recompute every derived index: expression structures, constraint
    /// kinds, reference tables, per-variable sensitivity lists, and all
    /// cached values. Invoked after every structural change; idempotent.
    pub fn setup(&mut self) {
        self.update_expression_structures();
        self.update_constraint_kinds();
        self.build_variable_reference();
        self.build_constraint_reference();
        self.build_related_tables();
        self.build_objective_sensitivities();
        self.update();
    }

    fn update_expression_structures(&mut self) {
        let variables = &self.variables;
        for c in &mut self.constraints {
            c.expression_mut()
                .update_structure(|id| variables[*id].kind().is_binary_or_selection());
        }
        self.objective
            .expression_mut()
            .update_structure(|id| variables[*id].kind().is_binary_or_selection());
    }

    fn update_constraint_kinds(&mut self) {
        let variables = &self.variables;
        for c in &mut self.constraints {
            c.update_kind(variables);
        }
    }

    fn build_variable_reference(&mut self) {
        let mut reference = VariableReference::default();
        for v in &self.variables {
            reference.all.push(v.id());
            if v.is_fixed() {
                reference.fixed.push(v.id());
                continue;
            }
            reference.mutable.push(v.id());
            match v.kind() {
                VariableKind::Binary => reference.binary.push(v.id()),
                VariableKind::Integer => reference.integer.push(v.id()),
                VariableKind::Selection => reference.selection.push(v.id()),
                VariableKind::DependentBinary => reference.dependent_binary.push(v.id()),
                VariableKind::DependentInteger => reference.dependent_integer.push(v.id()),
            }
        }
        self.variable_reference = reference;
    }

    fn build_constraint_reference(&mut self) {
        let mut reference = ConstraintReference::default();
        for c in &self.constraints {
            if c.is_enabled() {
                reference.enabled.push(c.id());
                reference
                    .by_kind
                    .entry(c.kind())
                    .or_default()
                    .push(c.id());
            } else {
                reference.disabled.push(c.id());
            }
        }
        self.constraint_reference = reference;
    }

    fn build_related_tables(&mut self) {
        let n = self.variables.len();
        let mut sensitivities: Vec<Vec<(ConstraintID, f64)>> = vec![Vec::new(); n];
        let mut positive: Vec<Vec<VariableID>> = vec![Vec::new(); self.constraints.len()];
        let mut negative: Vec<Vec<VariableID>> = vec![Vec::new(); self.constraints.len()];

        for c in &self.constraints {
            if !c.is_enabled() {
                continue;
            }
            for (&variable, &coefficient) in c.expression().sensitivities() {
                sensitivities[*variable].push((c.id(), coefficient));
                if self.variables[*variable].is_mutable() {
                    if coefficient > 0.0 {
                        positive[*c.id()].push(variable);
                    } else {
                        negative[*c.id()].push(variable);
                    }
                }
            }
        }

        for (index, mut list) in sensitivities.into_iter().enumerate() {
            list.sort_unstable_by_key(|&(id, _)| id);
            let related: Vec<ConstraintID> = list.iter().map(|&(id, _)| id).collect();
            let binary_unit: Vec<ConstraintID> = related
                .iter()
                .copied()
                .filter(|&id| {
                    let structure = self.constraints[*id].expression().structure();
                    structure.has_only_binary_or_selection_variable
                        && structure.has_only_unit_coefficient
                })
                .collect();
            self.variables[index].set_references(related, list, binary_unit);
        }

        for (index, (mut p, mut n)) in positive.into_iter().zip(negative).enumerate() {
            p.sort_unstable();
            n.sort_unstable();
            self.constraints[index].set_mutable_variable_partitions(p, n);
        }

        let mut consumers: FnvHashMap<VariableID, Vec<VariableID>> = FnvHashMap::default();
        for v in &self.variables {
            if let Some(expression) = v.dependency() {
                for &source in expression.sensitivities().keys() {
                    consumers.entry(source).or_default().push(v.id());
                }
            }
        }
        self.dependency_consumers = consumers;
    }

    fn build_objective_sensitivities(&mut self) {
        let objective = self.objective.expression();
        let sensitivities: Vec<f64> = self
            .variables
            .iter()
            .map(|v| objective.coefficient(v.id()))
            .collect();
        for (variable, sensitivity) in self.variables.iter_mut().zip(sensitivities) {
            variable.set_objective_sensitivity(sensitivity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, ConstraintSense, ObjectiveSense};

    fn model() -> Model {
        let mut model = Model::new("setup");
        let x = model.binary_variable("x");
        let y = model.binary_variable("y");
        let z = model.integer_variable("z", Bound::new(0, 4).unwrap());
        let objective = model.expression().term(x, 1.0).term(z, -2.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let partition = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-1.0)
            .build();
        model
            .add_constraint("part", partition, ConstraintSense::Equal)
            .unwrap();
        let knap = model
            .expression()
            .term(x, 2.0)
            .term(z, 3.0)
            .constant(-6.0)
            .build();
        model.add_constraint("knap", knap, ConstraintSense::Less).unwrap();
        model.setup();
        model
    }

    #[test]
    fn references_partition_variables() {
        let mut model = model();
        assert_eq!(model.variable_reference().mutable.len(), 3);
        assert_eq!(model.variable_reference().binary.len(), 2);
        assert_eq!(model.variable_reference().integer.len(), 1);

        let x = model.variable_by_name("x").unwrap();
        model.variable_mut(x).fix_to(1);
        model.setup();
        assert_eq!(model.variable_reference().mutable.len(), 2);
        assert_eq!(model.variable_reference().fixed.len(), 1);
    }

    #[test]
    fn constraint_kinds_are_classified() {
        let model = model();
        let part = model.constraint_by_name("part").unwrap();
        assert_eq!(model.constraint(part).kind(), ConstraintKind::ExclusiveOr);
        assert_eq!(
            model.constraint_reference().of_kind(ConstraintKind::ExclusiveOr),
            &[part]
        );
    }

    #[test]
    fn sensitivity_lists_are_sorted_and_complete() {
        let model = model();
        let x = model.variable_by_name("x").unwrap();
        let sensitivities = model.variable(x).constraint_sensitivities();
        assert_eq!(sensitivities.len(), 2);
        assert!(sensitivities.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(model.variable(x).objective_sensitivity(), 1.0);

        let knap = model.constraint_by_name("knap").unwrap();
        assert_eq!(model.constraint(knap).positive_mutable_variables().len(), 2);
        assert!(model.constraint(knap).negative_mutable_variables().is_empty());
    }

    #[test]
    fn setup_is_idempotent() {
        let mut model = model();
        let before = model.variable(model.variable_by_name("x").unwrap()).related_hash();
        model.setup();
        model.setup();
        let after = model.variable(model.variable_by_name("x").unwrap()).related_hash();
        assert_eq!(before, after);
    }
}
