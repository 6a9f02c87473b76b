use rust_decimal::Decimal;

use crate::{Element, Isotope, MassKind};

impl Element {
    pub(crate) fn mass(&self, kind: MassKind) -> Decimal {
        match kind {
            MassKind::Monoisotopic => self.monoisotopic_mass(),
            MassKind::Average => self.average_mass(),
        }
    }

    // NOTE: Elements are only ever constructed with at least one abundant isotope, so the fallbacks to zero below are
    // never actually taken
    fn monoisotopic_mass(&self) -> Decimal {
        self.isotope_abundances()
            .max_by_key(|i| i.abundance)
            .map_or(Decimal::ZERO, |i| i.relative_mass)
    }

    fn average_mass(&self) -> Decimal {
        self.isotope_abundances()
            .filter_map(|i| i.abundance.map(|a| i.relative_mass * a))
            .sum()
    }

    fn isotope_abundances(&self) -> impl Iterator<Item = &Isotope> {
        self.isotopes.iter().filter(|i| i.abundance.is_some())
    }
}
