// Standard Library Imports
use std::{
    fmt::{self, Display, Formatter},
    iter::Sum,
    ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign},
};

// External Crate Imports
use rust_decimal::Decimal;

// Local Crate Imports
use super::atomic_database::AtomicDatabase;
use crate::{
    Composition, MassKind, Massive, Result,
    parsers::{
        composition::formula,
        errors::{MalformedInputError, final_parser},
    },
};

// Public API ==========================================================================================================

impl Composition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a formula like `C6H12O6`, or `-H2O` for a loss
    pub fn from_formula(text: impl AsRef<str>) -> Result<Self> {
        let text = text.as_ref();
        final_parser(formula)(text)
            .map_err(|e| MalformedInputError::new("formula", text, 1, "formula", 0, e).into())
    }

    #[must_use]
    pub fn count(&self, symbol: &str) -> i64 {
        self.0.get(symbol).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(s, &c)| (s.as_str(), c))
    }

    pub fn monoisotopic_mass(&self, db: &AtomicDatabase) -> Result<Decimal> {
        self.weigh(db, MassKind::Monoisotopic)
    }

    pub fn average_mass(&self, db: &AtomicDatabase) -> Result<Decimal> {
        self.weigh(db, MassKind::Average)
    }

    pub(crate) fn add_count(&mut self, symbol: &str, delta: i64) {
        if delta == 0 {
            return;
        }

        let count = self.0.entry(symbol.to_owned()).or_default();
        *count += delta;
        if *count == 0 {
            self.0.remove(symbol);
        }
    }

    fn weigh(&self, db: &AtomicDatabase, kind: MassKind) -> Result<Decimal> {
        self.iter().try_fold(Decimal::ZERO, |mass, (symbol, count)| {
            let element = db.element(symbol)?;
            Ok(mass + element.mass(kind) * Decimal::from(count))
        })
    }
}

impl<'s> FromIterator<(&'s str, i64)> for Composition {
    fn from_iter<I: IntoIterator<Item = (&'s str, i64)>>(iter: I) -> Self {
        let mut composition = Self::new();
        for (symbol, count) in iter {
            composition.add_count(symbol, count);
        }
        composition
    }
}

impl Massive for Composition {
    fn composition(&self) -> Composition {
        self.clone()
    }

    fn mass(&self, db: &AtomicDatabase, kind: MassKind) -> Result<Decimal> {
        self.weigh(db, kind)
    }

    fn mz(&self, db: &AtomicDatabase, kind: MassKind, charge: i64) -> Result<Decimal> {
        let mass = self.weigh(db, kind)?;
        if charge == 0 {
            return Ok(mass);
        }

        let proton = db.proton_mass()?;
        let charge = Decimal::from(charge);
        Ok((mass + charge * proton) / charge.abs())
    }
}

impl Display for Composition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (symbol, count) in self.iter() {
            if count == 1 {
                write!(f, "{symbol}")?;
            } else {
                write!(f, "{symbol}{count}")?;
            }
        }
        Ok(())
    }
}

// Arithmetic ==========================================================================================================

impl AddAssign<&Composition> for Composition {
    fn add_assign(&mut self, rhs: &Composition) {
        for (symbol, count) in rhs.iter() {
            self.add_count(symbol, count);
        }
    }
}

impl SubAssign<&Composition> for Composition {
    fn sub_assign(&mut self, rhs: &Composition) {
        for (symbol, count) in rhs.iter() {
            self.add_count(symbol, -count);
        }
    }
}

impl MulAssign<i64> for Composition {
    fn mul_assign(&mut self, rhs: i64) {
        if rhs == 0 {
            self.0.clear();
        } else {
            self.0.values_mut().for_each(|c| *c *= rhs);
        }
    }
}

impl AddAssign for Composition {
    fn add_assign(&mut self, rhs: Self) {
        *self += &rhs;
    }
}

impl SubAssign for Composition {
    fn sub_assign(&mut self, rhs: Self) {
        *self -= &rhs;
    }
}

impl Add for Composition {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += &rhs;
        self
    }
}

impl Add<&Composition> for &Composition {
    type Output = Composition;

    fn add(self, rhs: &Composition) -> Composition {
        let mut sum = self.clone();
        sum += rhs;
        sum
    }
}

impl Sub for Composition {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self -= &rhs;
        self
    }
}

impl Sub<&Composition> for &Composition {
    type Output = Composition;

    fn sub(self, rhs: &Composition) -> Composition {
        let mut difference = self.clone();
        difference -= rhs;
        difference
    }
}

impl Neg for Composition {
    type Output = Self;

    fn neg(mut self) -> Self {
        self *= -1;
        self
    }
}

impl Mul<i64> for Composition {
    type Output = Self;

    fn mul(mut self, rhs: i64) -> Self {
        self *= rhs;
        self
    }
}

impl Sum for Composition {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(), |acc, c| acc + c)
    }
}

impl<'c> Sum<&'c Composition> for Composition {
    fn sum<I: Iterator<Item = &'c Composition>>(iter: I) -> Self {
        iter.fold(Self::new(), |mut acc, c| {
            acc += c;
            acc
        })
    }
}

// Module Tests ========================================================================================================
