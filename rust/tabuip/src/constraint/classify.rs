use crate::{ConstraintSense, Expression, Variable, VariableID};

/// Structural classification of a constraint, derived from its expression,
/// sense, and the kinds of its member variables. Drives specialized
/// neighborhood generators and the dependent-variable extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintKind {
    Unknown,
    /// No variable terms.
    Empty,
    /// Exactly one variable term.
    Singleton,
    /// `x + y = 1` over binaries.
    ExclusiveOr,
    /// `x - y = 0` over binaries.
    ExclusiveNor,
    /// `x + y - 2 z = 0` over binaries.
    TrinomialExclusiveNor,
    /// `x + y = 0` over integers.
    InvertedIntegers,
    /// `x - y = 0` over integers.
    BalancedIntegers,
    /// `x + y = c`, `c != 0`, over integers.
    ConstantSumIntegers,
    /// `x - y = c`, `c != 0`, over integers.
    ConstantDifferenceIntegers,
    /// `a x - y = 0`, `|a| >= 2`, over integers.
    ConstantRatioIntegers,
    /// General two-variable equality.
    Aggregation,
    /// Two-variable inequality with opposite coefficients of equal
    /// magnitude.
    Precedence,
    /// Two-variable inequality with one binary member.
    VariableBound,
    /// `sum x_i - y = 0` over binaries, `y` the key.
    SoftSelection,
    /// `sum x_i = 1` over binaries with unit coefficients.
    SetPartitioning,
    /// `sum x_i <= 1`.
    SetPacking,
    /// `sum x_i >= 1`.
    SetCovering,
    /// `sum x_i = k`, `k >= 2`.
    Cardinality,
    /// `sum x_i <= k`, `k >= 2`.
    InvariantKnapsack,
    /// `sum x_i >= k`, `k >= 2`.
    MultipleCovering,
    /// `sum w_i x_i - C y <= 0` over binaries, one negative coefficient.
    BinPacking,
    /// `sum w_i x_i = c` over binaries with general coefficients.
    EquationKnapsack,
    /// `sum w_i x_i <= c` over binaries with general coefficients.
    Knapsack,
    /// Knapsack over general integers.
    IntegerKnapsack,
    /// Equality with a unit-coefficient key variable whose bound covers the
    /// rest of the expression.
    Intermediate,
    GeneralLinear,
}

impl ConstraintKind {
    pub fn label(&self) -> &'static str {
        match self {
            ConstraintKind::Unknown => "Unknown",
            ConstraintKind::Empty => "Empty",
            ConstraintKind::Singleton => "Singleton",
            ConstraintKind::ExclusiveOr => "Exclusive OR",
            ConstraintKind::ExclusiveNor => "Exclusive NOR",
            ConstraintKind::TrinomialExclusiveNor => "Trinomial Exclusive NOR",
            ConstraintKind::InvertedIntegers => "Inverted Integers",
            ConstraintKind::BalancedIntegers => "Balanced Integers",
            ConstraintKind::ConstantSumIntegers => "Constant Sum Integers",
            ConstraintKind::ConstantDifferenceIntegers => "Constant Difference Integers",
            ConstraintKind::ConstantRatioIntegers => "Constant Ratio Integers",
            ConstraintKind::Aggregation => "Aggregation",
            ConstraintKind::Precedence => "Precedence",
            ConstraintKind::VariableBound => "Variable Bound",
            ConstraintKind::SoftSelection => "Soft Selection",
            ConstraintKind::SetPartitioning => "Set Partitioning",
            ConstraintKind::SetPacking => "Set Packing",
            ConstraintKind::SetCovering => "Set Covering",
            ConstraintKind::Cardinality => "Cardinality",
            ConstraintKind::InvariantKnapsack => "Invariant Knapsack",
            ConstraintKind::MultipleCovering => "Multiple Covering",
            ConstraintKind::BinPacking => "Bin Packing",
            ConstraintKind::EquationKnapsack => "Equation Knapsack",
            ConstraintKind::Knapsack => "Knapsack",
            ConstraintKind::IntegerKnapsack => "Integer Knapsack",
            ConstraintKind::Intermediate => "Intermediate",
            ConstraintKind::GeneralLinear => "General Linear",
        }
    }

    /// Whether this kind defines one variable algebraically in terms of the
    /// others, making it a dependent-variable extraction candidate.
    pub fn is_dependency_defining(&self) -> bool {
        matches!(
            self,
            ConstraintKind::ExclusiveOr
                | ConstraintKind::ExclusiveNor
                | ConstraintKind::InvertedIntegers
                | ConstraintKind::BalancedIntegers
                | ConstraintKind::ConstantSumIntegers
                | ConstraintKind::ConstantDifferenceIntegers
                | ConstraintKind::ConstantRatioIntegers
                | ConstraintKind::Intermediate
        )
    }
}

fn is_integral(value: f64) -> bool {
    value.fract() == 0.0
}

/// Classify `expression <sense> 0`, returning the kind and the key variable
/// for dependency-defining and soft-selection rows.
pub fn classify(
    expression: &Expression,
    sense: ConstraintSense,
    variables: &[Variable],
) -> (ConstraintKind, Option<VariableID>) {
    let terms = expression.sorted_terms();
    let constant = expression.constant();
    let n = terms.len();

    match n {
        0 => return (ConstraintKind::Empty, None),
        1 => return (ConstraintKind::Singleton, None),
        _ => {}
    }

    let is_binary = |id: VariableID| variables[*id].kind().is_binary_or_selection();
    let all_binary = terms.iter().all(|&(id, _)| is_binary(id));
    let all_unit = terms.iter().all(|&(_, c)| c.abs() == 1.0);
    let all_positive = terms.iter().all(|&(_, c)| c > 0.0);
    let negatives: Vec<&(VariableID, f64)> = terms.iter().filter(|&&(_, c)| c < 0.0).collect();

    if n == 2 {
        let [(x, a), (y, b)] = [terms[0], terms[1]];
        if sense == ConstraintSense::Equal {
            if all_binary && a == 1.0 && b == 1.0 && constant == -1.0 {
                return (ConstraintKind::ExclusiveOr, Some(y));
            }
            if all_binary && all_unit && a * b < 0.0 && constant == 0.0 {
                let key = if a < 0.0 { x } else { y };
                return (ConstraintKind::ExclusiveNor, Some(key));
            }
            if !all_binary && a == 1.0 && b == 1.0 && is_integral(constant) {
                if constant == 0.0 {
                    return (ConstraintKind::InvertedIntegers, Some(y));
                }
                return (ConstraintKind::ConstantSumIntegers, Some(y));
            }
            if !all_binary && all_unit && a * b < 0.0 && is_integral(constant) {
                let key = if a < 0.0 { x } else { y };
                if constant == 0.0 {
                    return (ConstraintKind::BalancedIntegers, Some(key));
                }
                return (ConstraintKind::ConstantDifferenceIntegers, Some(key));
            }
            if !all_binary && constant == 0.0 {
                // a x - y = 0 with an integral multiplier
                if b.abs() == 1.0 && a.abs() >= 2.0 && is_integral(a) && a * b < 0.0 {
                    return (ConstraintKind::ConstantRatioIntegers, Some(y));
                }
                if a.abs() == 1.0 && b.abs() >= 2.0 && is_integral(b) && a * b < 0.0 {
                    return (ConstraintKind::ConstantRatioIntegers, Some(x));
                }
            }
            return (ConstraintKind::Aggregation, None);
        }
        // Inequalities over two variables
        if a == -b {
            return (ConstraintKind::Precedence, None);
        }
        if is_binary(x) != is_binary(y) {
            let key = if is_binary(x) { x } else { y };
            return (ConstraintKind::VariableBound, Some(key));
        }
        return (ConstraintKind::GeneralLinear, None);
    }

    if n == 3 && all_binary && sense == ConstraintSense::Equal && constant == 0.0 {
        let doubled: Vec<&(VariableID, f64)> =
            terms.iter().filter(|&&(_, c)| c == -2.0).collect();
        let units = terms.iter().filter(|&&(_, c)| c == 1.0).count();
        if doubled.len() == 1 && units == 2 {
            return (ConstraintKind::TrinomialExclusiveNor, Some(doubled[0].0));
        }
    }

    if all_binary {
        if sense == ConstraintSense::Equal
            && constant == 0.0
            && negatives.len() == 1
            && negatives[0].1 == -1.0
            && terms.iter().filter(|&&(_, c)| c == 1.0).count() == n - 1
        {
            return (ConstraintKind::SoftSelection, Some(negatives[0].0));
        }
        if all_unit && all_positive && is_integral(constant) && constant <= -1.0 {
            let rhs = -constant as i64;
            return match (sense, rhs) {
                (ConstraintSense::Equal, 1) => (ConstraintKind::SetPartitioning, None),
                (ConstraintSense::Equal, _) => (ConstraintKind::Cardinality, None),
                (ConstraintSense::Less, 1) => (ConstraintKind::SetPacking, None),
                (ConstraintSense::Less, _) => (ConstraintKind::InvariantKnapsack, None),
                (ConstraintSense::Greater, 1) => (ConstraintKind::SetCovering, None),
                (ConstraintSense::Greater, _) => (ConstraintKind::MultipleCovering, None),
            };
        }
        if sense == ConstraintSense::Less && negatives.len() == 1 && constant == 0.0 {
            return (ConstraintKind::BinPacking, Some(negatives[0].0));
        }
        if sense == ConstraintSense::Equal && all_positive {
            return (ConstraintKind::EquationKnapsack, None);
        }
        if all_positive && constant < 0.0 {
            return (ConstraintKind::Knapsack, None);
        }
    }

    if sense == ConstraintSense::Equal {
        if let Some(key) = intermediate_key(&terms, constant, variables) {
            return (ConstraintKind::Intermediate, Some(key));
        }
    }

    if !all_binary && all_positive && constant < 0.0 && sense != ConstraintSense::Equal {
        return (ConstraintKind::IntegerKnapsack, None);
    }

    (ConstraintKind::GeneralLinear, None)
}

/// Find a variable `y` with coefficient +-1 in an equality whose bound
/// covers the value range of the remaining expression, so that
/// `y = -(rest + c0) / a` always stays admissible. All other coefficients
/// and the constant must be integral for `y` to remain integer.
fn intermediate_key(
    terms: &[(VariableID, f64)],
    constant: f64,
    variables: &[Variable],
) -> Option<VariableID> {
    if !is_integral(constant) || !terms.iter().all(|&(_, c)| is_integral(c)) {
        return None;
    }
    for &(candidate, coefficient) in terms {
        if coefficient.abs() != 1.0 || variables[*candidate].is_fixed() {
            continue;
        }
        // Range of -(rest + c0) / coefficient over the other bounds
        let (mut low, mut high) = (-constant, -constant);
        let mut bounded = true;
        for &(id, c) in terms {
            if id == candidate {
                continue;
            }
            let bound = variables[*id].bound();
            if !bound.is_finite() {
                bounded = false;
                break;
            }
            let a = -c * bound.lower() as f64;
            let b = -c * bound.upper() as f64;
            low += a.min(b);
            high += a.max(b);
        }
        if !bounded {
            continue;
        }
        let (low, high) = if coefficient > 0.0 {
            (low, high)
        } else {
            (-high, -low)
        };
        let bound = variables[*candidate].bound();
        if bound.lower() as f64 <= low && high <= bound.upper() as f64 {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, VariableKind};

    fn id(i: usize) -> VariableID {
        VariableID::from(i)
    }

    fn binaries(n: usize) -> Vec<Variable> {
        (0..n)
            .map(|i| Variable::binary(id(i), &format!("x{i}")))
            .collect()
    }

    fn integers(n: usize, lower: i64, upper: i64) -> Vec<Variable> {
        (0..n)
            .map(|i| {
                Variable::integer(id(i), &format!("x{i}"), Bound::new(lower, upper).unwrap())
            })
            .collect()
    }

    fn kind_of(
        terms: &[(usize, f64)],
        constant: f64,
        sense: ConstraintSense,
        variables: &[Variable],
    ) -> (ConstraintKind, Option<VariableID>) {
        let expression = Expression::with_terms(
            terms.iter().map(|&(i, c)| (id(i), c)),
            constant,
        );
        classify(&expression, sense, variables)
    }

    #[test]
    fn empty_and_singleton() {
        let variables = binaries(2);
        assert_eq!(
            kind_of(&[], 1.0, ConstraintSense::Less, &variables).0,
            ConstraintKind::Empty
        );
        assert_eq!(
            kind_of(&[(0, 2.0)], -4.0, ConstraintSense::Equal, &variables).0,
            ConstraintKind::Singleton
        );
    }

    #[test]
    fn binary_pairs() {
        let variables = binaries(2);
        assert_eq!(
            kind_of(&[(0, 1.0), (1, 1.0)], -1.0, ConstraintSense::Equal, &variables),
            (ConstraintKind::ExclusiveOr, Some(id(1)))
        );
        assert_eq!(
            kind_of(&[(0, 1.0), (1, -1.0)], 0.0, ConstraintSense::Equal, &variables),
            (ConstraintKind::ExclusiveNor, Some(id(1)))
        );
    }

    #[test]
    fn integer_pairs() {
        let variables = integers(2, -10, 10);
        assert_eq!(
            kind_of(&[(0, 1.0), (1, 1.0)], 0.0, ConstraintSense::Equal, &variables).0,
            ConstraintKind::InvertedIntegers
        );
        assert_eq!(
            kind_of(&[(0, 1.0), (1, -1.0)], 0.0, ConstraintSense::Equal, &variables).0,
            ConstraintKind::BalancedIntegers
        );
        assert_eq!(
            kind_of(&[(0, 1.0), (1, 1.0)], -5.0, ConstraintSense::Equal, &variables).0,
            ConstraintKind::ConstantSumIntegers
        );
        assert_eq!(
            kind_of(&[(0, 1.0), (1, -1.0)], 3.0, ConstraintSense::Equal, &variables).0,
            ConstraintKind::ConstantDifferenceIntegers
        );
        assert_eq!(
            kind_of(&[(0, 3.0), (1, -1.0)], 0.0, ConstraintSense::Equal, &variables),
            (ConstraintKind::ConstantRatioIntegers, Some(id(1)))
        );
        assert_eq!(
            kind_of(&[(0, 3.0), (1, 2.0)], -7.0, ConstraintSense::Equal, &variables).0,
            ConstraintKind::Aggregation
        );
    }

    #[test]
    fn inequality_pairs() {
        let variables = integers(2, 0, 10);
        assert_eq!(
            kind_of(&[(0, 2.0), (1, -2.0)], 0.0, ConstraintSense::Less, &variables).0,
            ConstraintKind::Precedence
        );
        let mut mixed = integers(2, 0, 10);
        mixed[0] = Variable::binary(id(0), "b");
        assert_eq!(
            kind_of(&[(0, 5.0), (1, 1.0)], -8.0, ConstraintSense::Less, &mixed),
            (ConstraintKind::VariableBound, Some(id(0)))
        );
    }

    #[test]
    fn set_families() {
        let variables = binaries(4);
        let terms: Vec<(usize, f64)> = (0..4).map(|i| (i, 1.0)).collect();
        assert_eq!(
            kind_of(&terms, -1.0, ConstraintSense::Equal, &variables).0,
            ConstraintKind::SetPartitioning
        );
        assert_eq!(
            kind_of(&terms, -2.0, ConstraintSense::Equal, &variables).0,
            ConstraintKind::Cardinality
        );
        assert_eq!(
            kind_of(&terms, -1.0, ConstraintSense::Less, &variables).0,
            ConstraintKind::SetPacking
        );
        assert_eq!(
            kind_of(&terms, -3.0, ConstraintSense::Less, &variables).0,
            ConstraintKind::InvariantKnapsack
        );
        assert_eq!(
            kind_of(&terms, -1.0, ConstraintSense::Greater, &variables).0,
            ConstraintKind::SetCovering
        );
        assert_eq!(
            kind_of(&terms, -2.0, ConstraintSense::Greater, &variables).0,
            ConstraintKind::MultipleCovering
        );
    }

    #[test]
    fn trinomial_and_soft_selection() {
        let variables = binaries(4);
        assert_eq!(
            kind_of(
                &[(0, 1.0), (1, 1.0), (2, -2.0)],
                0.0,
                ConstraintSense::Equal,
                &variables
            ),
            (ConstraintKind::TrinomialExclusiveNor, Some(id(2)))
        );
        assert_eq!(
            kind_of(
                &[(0, 1.0), (1, 1.0), (2, 1.0), (3, -1.0)],
                0.0,
                ConstraintSense::Equal,
                &variables
            ),
            (ConstraintKind::SoftSelection, Some(id(3)))
        );
    }

    #[test]
    fn knapsacks() {
        let variables = binaries(3);
        assert_eq!(
            kind_of(
                &[(0, 3.0), (1, 5.0), (2, 7.0)],
                -10.0,
                ConstraintSense::Less,
                &variables
            )
            .0,
            ConstraintKind::Knapsack
        );
        assert_eq!(
            kind_of(
                &[(0, 3.0), (1, 5.0), (2, 7.0)],
                -10.0,
                ConstraintSense::Equal,
                &variables
            )
            .0,
            ConstraintKind::EquationKnapsack
        );
        assert_eq!(
            kind_of(
                &[(0, 3.0), (1, 5.0), (2, -10.0)],
                0.0,
                ConstraintSense::Less,
                &variables
            ),
            (ConstraintKind::BinPacking, Some(id(2)))
        );
        let ints = integers(3, 0, 10);
        assert_eq!(
            kind_of(
                &[(0, 3.0), (1, 5.0), (2, 7.0)],
                -10.0,
                ConstraintSense::Less,
                &ints
            )
            .0,
            ConstraintKind::IntegerKnapsack
        );
    }

    #[test]
    fn intermediate_requires_covering_bound() {
        // x0 + x1 - y = 0 with x in [0, 10]: y needs [0, 20]
        let mut variables = integers(2, 0, 10);
        variables.push(Variable::integer(id(2), "y", Bound::new(0, 20).unwrap()));
        assert_eq!(
            kind_of(
                &[(0, 1.0), (1, 1.0), (2, -1.0)],
                0.0,
                ConstraintSense::Equal,
                &variables
            ),
            (ConstraintKind::Intermediate, Some(id(2)))
        );

        // Too small a bound on y blocks the extraction
        variables[2] = Variable::integer(id(2), "y", Bound::new(0, 5).unwrap());
        assert_eq!(
            kind_of(
                &[(0, 1.0), (1, 1.0), (2, -1.0)],
                0.0,
                ConstraintSense::Equal,
                &variables
            )
            .0,
            ConstraintKind::GeneralLinear
        );
    }
}
