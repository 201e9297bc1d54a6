use crate::{ConstraintID, VariableID};
use getset::CopyGetters;
use smallvec::SmallVec;

/// Structural sense of a move, one per neighborhood generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MoveSense {
    Binary,
    Integer,
    Selection,
    ExclusiveOr,
    ExclusiveNor,
    InvertedIntegers,
    BalancedIntegers,
    ConstantSumIntegers,
    ConstantDifferenceIntegers,
    ConstantRatioIntegers,
    Aggregation,
    Precedence,
    VariableBound,
    SoftSelection,
    TrinomialExclusiveNor,
    Chain,
    TwoFlip,
    UserDefined,
    General,
}

/// One tentative assignment inside a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alteration {
    pub variable: VariableID,
    pub target: i64,
}

impl Alteration {
    pub fn new(variable: VariableID, target: i64) -> Self {
        Self { variable, target }
    }
}

/// A tentative atomic change of one or more variables.
///
/// `related_constraints` is the deduplicated union of the related-constraint
/// sets of all altered variables; the evaluator touches exactly these
/// constraints, nothing else.
#[derive(Debug, Clone, CopyGetters)]
pub struct Move {
    alterations: SmallVec<[Alteration; 2]>,
    related_constraints: Vec<ConstraintID>,
    #[getset(get_copy = "pub")]
    sense: MoveSense,
    #[getset(get_copy = "pub")]
    is_univariable: bool,
    #[getset(get_copy = "pub")]
    is_available: bool,
    /// XOR of the stable hashes of the altered variables.
    #[getset(get_copy = "pub")]
    hash: u64,
    /// Geometric mean of pairwise shared-constraint fractions, in [0, 1].
    /// Only meaningful for chain moves; 0 elsewhere.
    #[getset(get_copy = "pub")]
    overlap_rate: f64,
}

impl Move {
    pub fn new(
        sense: MoveSense,
        alterations: impl IntoIterator<Item = Alteration>,
        related_constraints: Vec<ConstraintID>,
    ) -> Self {
        let alterations: SmallVec<[Alteration; 2]> = alterations.into_iter().collect();
        let hash = alterations
            .iter()
            .fold(0u64, |hash, a| hash ^ a.variable.stable_hash());
        Self {
            is_univariable: alterations.len() == 1,
            hash,
            alterations,
            related_constraints,
            sense,
            is_available: true,
            overlap_rate: 0.0,
        }
    }

    pub fn alterations(&self) -> &[Alteration] {
        &self.alterations
    }

    pub fn related_constraints(&self) -> &[ConstraintID] {
        &self.related_constraints
    }

    pub fn variable_ids(&self) -> impl Iterator<Item = VariableID> + '_ {
        self.alterations.iter().map(|a| a.variable)
    }

    /// The target value for `variable` if this move alters it.
    pub fn target_of(&self, variable: VariableID) -> Option<i64> {
        self.alterations
            .iter()
            .find(|a| a.variable == variable)
            .map(|a| a.target)
    }

    pub fn alters(&self, variable: VariableID) -> bool {
        self.target_of(variable).is_some()
    }

    pub fn set_is_available(&mut self, flag: bool) {
        self.is_available = flag;
    }

    pub fn set_overlap_rate(&mut self, rate: f64) {
        self.overlap_rate = rate;
    }

    /// Compose two moves into a chain candidate. Later alterations override
    /// earlier ones for the same variable; the related-constraint union is
    /// merged sorted-unique.
    pub fn chain(&self, other: &Move) -> Move {
        let mut alterations: SmallVec<[Alteration; 2]> = self.alterations.clone();
        for alteration in &other.alterations {
            if let Some(existing) = alterations
                .iter_mut()
                .find(|a| a.variable == alteration.variable)
            {
                existing.target = alteration.target;
            } else {
                alterations.push(*alteration);
            }
        }
        let mut related_constraints: Vec<ConstraintID> = self
            .related_constraints
            .iter()
            .chain(other.related_constraints.iter())
            .copied()
            .collect();
        related_constraints.sort_unstable();
        related_constraints.dedup();
        Move::new(MoveSense::Chain, alterations, related_constraints)
    }

    /// The symmetric inverse: every alteration retargeted to the current
    /// value recorded in `current_values` (indexed by alteration order).
    pub fn inverse(&self, current_values: &[i64]) -> Move {
        let alterations: SmallVec<[Alteration; 2]> = self
            .alterations
            .iter()
            .zip(current_values)
            .map(|(a, &value)| Alteration::new(a.variable, value))
            .collect();
        let mut inverse = Move::new(self.sense, alterations, self.related_constraints.clone());
        inverse.overlap_rate = self.overlap_rate;
        inverse
    }
}

/// Geometric mean over all alteration pairs of the fraction of constraints
/// the pair shares. `related_of` maps a variable to its sorted related
/// constraint list. Returns 0 for fewer than two alterations or when any
/// pair shares nothing.
pub fn compute_overlap_rate<'a>(
    alterations: &[Alteration],
    related_of: impl Fn(VariableID) -> &'a [ConstraintID],
) -> f64 {
    let n = alterations.len();
    if n < 2 {
        return 0.0;
    }
    let mut log_sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            let a = related_of(alterations[i].variable);
            let b = related_of(alterations[j].variable);
            let total = a.len() + b.len();
            if total == 0 {
                return 0.0;
            }
            let shared = sorted_intersection_size(a, b);
            if shared == 0 {
                return 0.0;
            }
            let fraction = shared as f64 / (total - shared) as f64;
            log_sum += fraction.ln();
            pairs += 1;
        }
    }
    (log_sum / pairs as f64).exp()
}

fn sorted_intersection_size(a: &[ConstraintID], b: &[ConstraintID]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn id(i: usize) -> VariableID {
        VariableID::from(i)
    }

    fn cid(i: usize) -> ConstraintID {
        ConstraintID::from(i)
    }

    #[test]
    fn univariable_flag_and_hash() {
        let single = Move::new(MoveSense::Binary, [Alteration::new(id(0), 1)], vec![]);
        assert!(single.is_univariable());

        let pair = Move::new(
            MoveSense::Selection,
            [Alteration::new(id(0), 0), Alteration::new(id(1), 1)],
            vec![],
        );
        assert!(!pair.is_univariable());
        // Hash is order-independent
        let swapped = Move::new(
            MoveSense::Selection,
            [Alteration::new(id(1), 1), Alteration::new(id(0), 0)],
            vec![],
        );
        assert_eq!(pair.hash(), swapped.hash());
    }

    #[test]
    fn chain_merges_and_overrides() {
        let a = Move::new(
            MoveSense::Integer,
            [Alteration::new(id(0), 3)],
            vec![cid(0), cid(1)],
        );
        let b = Move::new(
            MoveSense::Integer,
            [Alteration::new(id(0), 5), Alteration::new(id(1), 2)],
            vec![cid(1), cid(2)],
        );
        let chained = a.chain(&b);
        assert_eq!(chained.sense(), MoveSense::Chain);
        assert_eq!(chained.target_of(id(0)), Some(5));
        assert_eq!(chained.target_of(id(1)), Some(2));
        assert_eq!(chained.related_constraints(), &[cid(0), cid(1), cid(2)]);
    }

    #[test]
    fn inverse_round_trip() {
        let mv = Move::new(
            MoveSense::Selection,
            [Alteration::new(id(0), 0), Alteration::new(id(1), 1)],
            vec![cid(0)],
        );
        let inverse = mv.inverse(&[1, 0]);
        assert_eq!(inverse.target_of(id(0)), Some(1));
        assert_eq!(inverse.target_of(id(1)), Some(0));
    }

    #[test]
    fn overlap_rate_geometric_mean() {
        let related: Vec<Vec<ConstraintID>> = vec![
            vec![cid(0), cid(1)],
            vec![cid(1), cid(2)],
        ];
        let alterations = [Alteration::new(id(0), 1), Alteration::new(id(1), 1)];
        // shared 1, union 3 => 1/3
        let rate = compute_overlap_rate(&alterations, |v| related[*v].as_slice());
        assert_abs_diff_eq!(rate, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn overlap_rate_zero_when_disjoint() {
        let related: Vec<Vec<ConstraintID>> = vec![vec![cid(0)], vec![cid(1)]];
        let alterations = [Alteration::new(id(0), 1), Alteration::new(id(1), 1)];
        assert_eq!(
            compute_overlap_rate(&alterations, |v| related[*v].as_slice()),
            0.0
        );
    }
}
