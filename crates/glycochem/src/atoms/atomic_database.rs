// Standard Library Imports
use std::{ops::Deref, str::FromStr};

// External Crate Imports
use ahash::HashMap;
use knuffel::{
    Decode, DecodeScalar,
    ast::{self, Integer, Literal, Radix, TypeName},
    decode::{Context, Kind},
    errors::{DecodeError, ExpectedType},
    span::{Span, Spanned},
    traits::ErrorSpan,
};
use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

// Local Crate Imports
use super::errors::AtomicLookupError;
use crate::{Element, Isotope, Particle};

// Public API ==========================================================================================================

/// Elements, isotopes, and charged particles, loaded as part of a [`Registry`](crate::Registry)
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct AtomicDatabase {
    elements: HashMap<String, Element>,
    particles: HashMap<String, Particle>,
}

impl AtomicDatabase {
    pub(crate) fn element(&self, symbol: &str) -> Result<&Element, AtomicLookupError> {
        self.elements
            .get(symbol)
            .ok_or_else(|| AtomicLookupError::element(symbol))
    }

    pub fn contains_element(&self, symbol: &str) -> bool {
        self.elements.contains_key(symbol)
    }

    pub fn proton_mass(&self) -> Result<Decimal, AtomicLookupError> {
        self.particles
            .get("p")
            .map(|p| p.mass)
            .ok_or_else(|| AtomicLookupError::particle("p"))
    }

    pub(crate) fn from_entries(
        elements: impl IntoIterator<Item = ElementEntry>,
        particles: impl IntoIterator<Item = ParticleEntry>,
    ) -> Self {
        Self {
            elements: elements.into_iter().collect(),
            particles: particles.into_iter().collect(),
        }
    }
}

// KDL File Schema =====================================================================================================

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
pub(crate) struct ElementKdl {
    #[knuffel(span)]
    pub(crate) span: Span,
    #[knuffel(node_name)]
    pub(crate) symbol: ElementSymbol,
    #[knuffel(argument)]
    name: String,
    #[knuffel(children(name = "isotope", non_empty))]
    isotopes: Vec<IsotopeKdl>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
pub(crate) struct ParticleKdl {
    #[knuffel(span)]
    pub(crate) span: Span,
    #[knuffel(node_name)]
    pub(crate) symbol: ParticleSymbol,
    #[knuffel(argument)]
    name: String,
    #[knuffel(child, unwrap(argument))]
    mass: DecimalKdl,
    #[knuffel(child, unwrap(argument))]
    charge: i64,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct IsotopeKdl {
    #[knuffel(argument)]
    mass_number: u32,
    #[knuffel(argument)]
    relative_mass: DecimalKdl,
    #[knuffel(argument)]
    abundance: Option<DecimalKdl>,
}

// Lossless Parsing of KDL Numbers to Decimal ==========================================================================

#[derive(Debug, Default)]
pub(crate) struct DecimalKdl(pub(crate) Decimal);

impl<S: ErrorSpan> DecodeScalar<S> for DecimalKdl {
    fn type_check(type_name: &Option<Spanned<TypeName, S>>, ctx: &mut Context<S>) {
        if let Some(t) = type_name {
            ctx.emit_error(DecodeError::TypeName {
                span: t.span().clone(),
                found: Some(t.deref().clone()),
                expected: ExpectedType::no_type(),
                rust_type: "Decimal",
            });
        }
    }

    fn raw_decode(value: &Spanned<Literal, S>, ctx: &mut Context<S>) -> Result<Self, DecodeError<S>> {
        match &**value {
            Literal::Decimal(ast::Decimal(s)) | Literal::Int(Integer(Radix::Dec, s)) => {
                let res = if s.contains(['e', 'E']) {
                    Decimal::from_scientific(s)
                } else {
                    Decimal::from_str_exact(s)
                };
                match res {
                    Ok(d) => Ok(Self(d)),
                    Err(e) => {
                        ctx.emit_error(DecodeError::conversion(value, Box::new(e)));
                        Ok(Self::default())
                    }
                }
            }
            unsupported => {
                ctx.emit_error(DecodeError::unsupported(
                    value,
                    format!("expected a decimal number, found {}", Kind::from(unsupported)),
                ));
                Ok(Self::default())
            }
        }
    }
}

// Element and Particle Symbol Validation ==============================================================================

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) struct ElementSymbol(pub(crate) String);

impl FromStr for ElementSymbol {
    type Err = InvalidAtomicSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chrs: Vec<_> = s.chars().collect();
        match chrs[..] {
            [f] if f.is_ascii_uppercase() => Ok(Self(s.to_owned())),
            [f, l] if f.is_ascii_uppercase() && l.is_ascii_lowercase() => Ok(Self(s.to_owned())),
            _ => Err(InvalidAtomicSymbolError::Element(s.to_owned())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) struct ParticleSymbol(pub(crate) String);

impl FromStr for ParticleSymbol {
    type Err = InvalidAtomicSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chrs = s.chars();
        match (chrs.next(), chrs.next()) {
            (Some(c), None) if c.is_ascii_lowercase() => Ok(Self(s.to_owned())),
            _ => Err(InvalidAtomicSymbolError::Particle(s.to_owned())),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Diagnostic, Error)]
pub(crate) enum InvalidAtomicSymbolError {
    #[error("expected a single uppercase ASCII letter optionally followed by a lowercase ASCII letter, got {0:?}")]
    Element(String),
    #[error("expected a single lowercase ASCII letter, got {0:?}")]
    Particle(String),
}

// Conversion From Parsed KDL to Internal Representation ===============================================================

pub(crate) type ElementEntry = (String, Element);

impl TryFrom<ElementKdl> for ElementEntry {
    type Error = AtomicLookupError;

    fn try_from(
        ElementKdl {
            symbol,
            name,
            isotopes,
            ..
        }: ElementKdl,
    ) -> Result<Self, Self::Error> {
        let isotopes: Vec<_> = isotopes.into_iter().map(Isotope::from).collect();

        // NOTE: Every element needs natural abundance data, otherwise it can't be weighed without naming an isotope
        if isotopes.iter().all(|i| i.abundance.is_none()) {
            let mass_numbers = isotopes.iter().map(|i| i.mass_number);
            return Err(AtomicLookupError::abundance(&symbol.0, &name, mass_numbers));
        }

        Ok((symbol.0, Element { name, isotopes }))
    }
}

impl From<IsotopeKdl> for Isotope {
    fn from(
        IsotopeKdl {
            mass_number,
            relative_mass,
            abundance,
        }: IsotopeKdl,
    ) -> Self {
        Self {
            mass_number,
            relative_mass: relative_mass.0,
            abundance: abundance.map(|a| a.0),
        }
    }
}

pub(crate) type ParticleEntry = (String, Particle);

impl From<ParticleKdl> for ParticleEntry {
    fn from(
        ParticleKdl {
            symbol,
            name,
            mass,
            charge,
            ..
        }: ParticleKdl,
    ) -> Self {
        (
            symbol.0,
            Particle {
                name,
                mass: mass.0,
                charge,
            },
        )
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use knuffel::Decode;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn element_symbols() {
        assert!(ElementSymbol::from_str("C").is_ok());
        assert!(ElementSymbol::from_str("Na").is_ok());
        assert_eq!(
            ElementSymbol::from_str("d"),
            Err(InvalidAtomicSymbolError::Element("d".to_owned()))
        );
        assert!(ElementSymbol::from_str("DT").is_err());
        assert!(ElementSymbol::from_str("Deu").is_err());
        assert!(ElementSymbol::from_str("").is_err());
    }

    #[test]
    fn particle_symbols() {
        assert!(ParticleSymbol::from_str("p").is_ok());
        assert!(ParticleSymbol::from_str("P").is_err());
        assert!(ParticleSymbol::from_str("pr").is_err());
        assert!(ParticleSymbol::from_str("").is_err());
    }

    #[test]
    fn uppercase_particle_symbol() {
        let kdl = indoc! {r#"
            P "Proton" {
              mass 1.007276466621
              charge +1
            }
        "#};
        let res = knuffel::parse::<Vec<ParticleKdl>>("test", kdl);
        assert!(res.is_err());
    }

    #[test]
    fn element_without_isotopes() {
        let kdl = indoc! {r#"
            D "Deuterium" {
              // isotope 2 2.01410177812 1
            }
        "#};
        let res = knuffel::parse::<Vec<ElementKdl>>("test", kdl);
        assert!(res.is_err());
    }

    #[test]
    fn element_without_abundances() {
        let kdl = indoc! {r#"
            Tc "Technetium" {
              isotope 97 96.9063667
              isotope 98 97.9072124
            }
        "#};
        let mut elements = knuffel::parse::<Vec<ElementKdl>>("test", kdl).unwrap();
        let res = ElementEntry::try_from(elements.remove(0));
        assert_eq!(
            res,
            Err(AtomicLookupError::Abundance(
                "Technetium".to_owned(),
                "Tc".to_owned(),
                "[97, 98]".to_owned()
            ))
        );
    }

    #[test]
    fn build_particle() {
        let kdl = indoc! {r#"
            p "Proton" {
              mass 1.007276466621
              charge +1
            }
        "#};
        let mut particles = knuffel::parse::<Vec<ParticleKdl>>("test", kdl).unwrap();
        let (symbol, particle) = ParticleEntry::from(particles.remove(0));
        assert_eq!(symbol, "p");
        assert_eq!(particle.mass, dec!(1.007276466621));
        assert_eq!(particle.charge, 1);
    }

    #[derive(Debug, Decode)]
    struct Lossless(#[knuffel(argument)] DecimalKdl);

    #[test]
    fn decimal_scientific() {
        let kdl = "lossless 5.485_799_090_65e-4";
        let res = knuffel::parse::<Vec<Lossless>>("test", kdl);
        assert_eq!(res.unwrap()[0].0.0, dec!(0.000548579909065));
    }

    #[test]
    fn decimal_from_integer() {
        let kdl = "lossless 1";
        let res = knuffel::parse::<Vec<Lossless>>("test", kdl);
        assert_eq!(res.unwrap()[0].0.0, dec!(1));
    }

    #[test]
    fn decimal_lack_of_precision() {
        let kdl = "lossless 1e-42";
        let res = knuffel::parse::<Vec<Lossless>>("test", kdl);
        assert!(res.is_err());
    }
}
