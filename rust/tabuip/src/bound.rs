use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundError {
    #[error("Lower is larger than Upper: lower({lower}) > upper({upper})")]
    UpperSmallerThanLower { lower: i64, upper: i64 },
}

/// Inclusive integer bound of a decision variable.
///
/// Half-infinite bounds are represented by the far-from-range sentinels
/// [`Bound::MINIMUM`] and [`Bound::MAXIMUM`]. These are the only sentinels
/// in the crate: any value at or beyond them is treated as unbounded, and
/// arithmetic on bound endpoints never overflows because the sentinels
/// leave three quarters of the `i64` range as headroom.
///
/// Invariant
/// ---------
/// - `lower <= upper`
///
/// Examples
/// --------
///
/// ```rust
/// use tabuip::Bound;
///
/// let bound = Bound::new(1, 5).unwrap();
/// assert!(bound.contains(3));
/// assert!(!bound.contains(6));
/// // Default is unbounded on both sides
/// assert!(!Bound::default().has_lower());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bound {
    lower: i64,
    upper: i64,
}

impl Default for Bound {
    fn default() -> Self {
        Self {
            lower: Self::MINIMUM,
            upper: Self::MAXIMUM,
        }
    }
}

impl Bound {
    /// Sentinel for "no lower bound".
    pub const MINIMUM: i64 = i64::MIN / 4;
    /// Sentinel for "no upper bound".
    pub const MAXIMUM: i64 = i64::MAX / 4;

    pub fn new(lower: i64, upper: i64) -> Result<Self, BoundError> {
        if lower > upper {
            return Err(BoundError::UpperSmallerThanLower { lower, upper });
        }
        Ok(Self {
            lower: lower.max(Self::MINIMUM),
            upper: upper.min(Self::MAXIMUM),
        })
    }

    pub fn of_binary() -> Self {
        Self { lower: 0, upper: 1 }
    }

    pub fn lower(&self) -> i64 {
        self.lower
    }

    pub fn upper(&self) -> i64 {
        self.upper
    }

    pub fn set_lower(&mut self, lower: i64) -> Result<(), BoundError> {
        *self = Self::new(lower, self.upper)?;
        Ok(())
    }

    pub fn set_upper(&mut self, upper: i64) -> Result<(), BoundError> {
        *self = Self::new(self.lower, upper)?;
        Ok(())
    }

    pub fn has_lower(&self) -> bool {
        self.lower > Self::MINIMUM
    }

    pub fn has_upper(&self) -> bool {
        self.upper < Self::MAXIMUM
    }

    /// `[lower, upper]` with both endpoints finite.
    pub fn is_finite(&self) -> bool {
        self.has_lower() && self.has_upper()
    }

    /// A single admissible value.
    pub fn is_fixed_point(&self) -> bool {
        self.lower == self.upper
    }

    pub fn contains(&self, value: i64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Clamp `value` into the bound.
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.lower, self.upper)
    }

    /// Intersection of two bounds, `None` when empty.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        Self::new(self.lower.max(other.lower), self.upper.min(other.upper)).ok()
    }
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.has_lower(), self.has_upper()) {
            (true, true) => write!(f, "[{}, {}]", self.lower, self.upper),
            (true, false) => write!(f, "[{}, +inf)", self.lower),
            (false, true) => write!(f, "(-inf, {}]", self.upper),
            (false, false) => write!(f, "(-inf, +inf)"),
        }
    }
}
