//! Triangular fuzzy numbers and their distance metric.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Triangular fuzzy number `(a, b, c)`.
///
/// `b` is the most likely value and `a`/`c` the lower and upper spread.
/// Callers are expected to supply `a <= b <= c`; the ordering is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyVector {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl FuzzyVector {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Normalized Euclidean distance to another vector.
    ///
    /// `sqrt((a1-a2)^2 + (b1-b2)^2 + (c1-c2)^2) / sqrt(3)`
    pub fn distance_to(&self, other: &FuzzyVector) -> f64 {
        let da = self.a - other.a;
        let db = self.b - other.b;
        let dc = self.c - other.c;
        ((da * da + db * db + dc * dc) / 3.0).sqrt()
    }

    /// Componentwise arithmetic mean. Returns `None` for an empty input.
    ///
    /// Accumulates offsets from the first vector, so a set of identical
    /// vectors yields that exact vector.
    pub fn mean<'a, I>(vectors: I) -> Option<FuzzyVector>
    where
        I: IntoIterator<Item = &'a FuzzyVector>,
    {
        let mut iter = vectors.into_iter();
        let origin = *iter.next()?;

        let mut count = 1usize;
        let mut offset = FuzzyVector::new(0.0, 0.0, 0.0);
        for v in iter {
            offset.a += v.a - origin.a;
            offset.b += v.b - origin.b;
            offset.c += v.c - origin.c;
            count += 1;
        }
        let n = count as f64;
        Some(FuzzyVector::new(
            origin.a + offset.a / n,
            origin.b + offset.b / n,
            origin.c + offset.c / n,
        ))
    }

    /// Returns true if all three components are finite.
    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }
}

impl fmt::Display for FuzzyVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.a, self.b, self.c)
    }
}

/// Normalized Euclidean distance between two fuzzy vectors.
pub fn distance(v1: &FuzzyVector, v2: &FuzzyVector) -> f64 {
    v1.distance_to(v2)
}
