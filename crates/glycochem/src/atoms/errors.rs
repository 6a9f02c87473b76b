use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum AtomicLookupError {
    #[diagnostic(help("double-check for typos, or add a new entry to the atomic database"))]
    #[error("the element {0:?} could not be found in the supplied atomic database")]
    Element(String),

    #[diagnostic(help("double-check for typos, or add a new entry to the atomic database"))]
    #[error("the particle {0:?} could not be found in the supplied atomic database")]
    Particle(String),

    #[diagnostic(help("every element needs at least one isotope with a natural abundance to be weighed"))]
    #[error("no natural abundance data could be found for {0} ({1}), though the following isotopes were found: {2}")]
    Abundance(String, String, String),
}

impl AtomicLookupError {
    pub(crate) fn element(symbol: &str) -> Self {
        Self::Element(symbol.to_owned())
    }

    pub(crate) fn particle(symbol: &str) -> Self {
        Self::Particle(symbol.to_owned())
    }

    pub(crate) fn abundance(symbol: &str, name: &str, mass_numbers: impl IntoIterator<Item = u32>) -> Self {
        Self::Abundance(
            name.to_owned(),
            symbol.to_owned(),
            Self::display_vec(mass_numbers),
        )
    }

    // FIXME: Where does this belong?
    pub(crate) fn display_vec<I: ToString>(items: impl IntoIterator<Item = I>) -> String {
        let mut items: Vec<_> = items.into_iter().map(|i| i.to_string()).collect();
        items.sort_unstable();
        format!("[{}]", items.join(", "))
    }
}
