use crate::Expression;

/// The objective: a linear expression plus a minimization flag.
///
/// Maximization is represented internally as minimization of the negated
/// expression; `sign()` recovers displayed values.
#[derive(Debug, Clone)]
pub struct Objective {
    expression: Expression,
    is_minimization: bool,
}

impl Default for Objective {
    fn default() -> Self {
        Self::minimize(Expression::default())
    }
}

impl Objective {
    pub fn minimize(expression: Expression) -> Self {
        Self {
            expression,
            is_minimization: true,
        }
    }

    /// Store a maximization objective: the expression is negated and the
    /// sign flag flipped.
    pub fn maximize(mut expression: Expression) -> Self {
        expression.scale(-1.0);
        Self {
            expression,
            is_minimization: false,
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn expression_mut(&mut self) -> &mut Expression {
        &mut self.expression
    }

    pub fn is_minimization(&self) -> bool {
        self.is_minimization
    }

    /// Flip the optimization direction in place, re-negating the stored
    /// expression when the direction actually changes. Used by the CLI
    /// overrides of the MPS `OBJSENSE`.
    pub fn set_is_minimization(&mut self, flag: bool) {
        if self.is_minimization != flag {
            self.expression.scale(-1.0);
            self.is_minimization = flag;
        }
    }

    /// +1 for minimization, -1 for maximization.
    pub fn sign(&self) -> f64 {
        if self.is_minimization {
            1.0
        } else {
            -1.0
        }
    }

    /// The objective value as the user wrote it (undoes the internal
    /// negation for maximization).
    pub fn displayed_value(&self, internal_value: f64) -> f64 {
        self.sign() * internal_value
    }
}

/// User-facing objective sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}
