// Standard Library Imports
use std::collections::hash_map::Entry;

// External Crate Imports
use ahash::{HashMap, HashMapExt};
use knuffel::{
    Decode,
    span::{Span, Spanned},
};
use miette::{Diagnostic, LabeledSpan, NamedSource};
use thiserror::Error;

// Local Crate Imports
use super::{ModificationDescription, Registry, SubstituentDescription};
use crate::{
    Composition, GlycoError, Modification,
    atoms::{
        atomic_database::{AtomicDatabase, ElementEntry, ElementKdl, ParticleEntry, ParticleKdl},
        errors::AtomicLookupError,
    },
};

// KDL File Schema =====================================================================================================

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
pub(super) struct GlycanDatabaseKdl {
    #[knuffel(child, unwrap(children))]
    elements: Vec<ElementKdl>,
    #[knuffel(child, unwrap(children))]
    particles: Vec<ParticleKdl>,
    #[knuffel(child, unwrap(children))]
    modifications: Vec<ModificationKdl>,
    #[knuffel(child, unwrap(children))]
    substituents: Vec<SubstituentKdl>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct ModificationKdl {
    #[knuffel(span)]
    span: Span,
    #[knuffel(node_name)]
    code: String,
    #[knuffel(argument)]
    name: String,
    #[knuffel(child, unwrap(argument))]
    lost: Option<CompositionKdl>,
    #[knuffel(child, unwrap(argument))]
    gained: Option<CompositionKdl>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct SubstituentKdl {
    #[knuffel(span)]
    span: Span,
    #[knuffel(node_name)]
    abbr: String,
    #[knuffel(argument)]
    name: String,
    #[knuffel(property(name = "nh-derivatizable"), default)]
    nh_derivatizable: bool,
    #[knuffel(child, unwrap(argument))]
    composition: Option<CompositionKdl>,
    #[knuffel(child, unwrap(argument))]
    lost: Option<CompositionKdl>,
    #[knuffel(child, unwrap(argument))]
    attachment: Option<CompositionKdl>,
}

type CompositionKdl = Spanned<String, Span>;

// Contextual Validation Trait  ========================================================================================

type ChemResult<T> = Result<T, ChemistryErrorKind>;

pub(super) trait ValidateInto<'c, T> {
    type Context: 'c;

    fn validate(self, ctx: Self::Context) -> ChemResult<T>;
}

// Glycan Database Validation ==========================================================================================

impl ValidateInto<'_, Registry> for GlycanDatabaseKdl {
    type Context = ();

    fn validate(self, _ctx: Self::Context) -> ChemResult<Registry> {
        let atoms = (self.elements, self.particles).validate(())?;
        let modifications = self.modifications.validate(&atoms)?;
        let substituents = self.substituents.validate(&atoms)?;

        Ok(Registry {
            atoms,
            modifications,
            substituents,
        })
    }
}

// Validate Elements and Particles =====================================================================================

impl ValidateInto<'_, AtomicDatabase> for (Vec<ElementKdl>, Vec<ParticleKdl>) {
    type Context = ();

    fn validate(self, _ctx: Self::Context) -> ChemResult<AtomicDatabase> {
        let (elements, particles) = self;

        let mut seen_elements = HashMap::new();
        for element in elements {
            let symbol = element.symbol.0.clone();
            let span = element.span;
            match seen_elements.entry(symbol) {
                Entry::Occupied(e) => {
                    let (symbol, (first_defined_at, _)) = e.remove_entry();
                    return Err(ChemistryErrorKind::Duplicate(first_defined_at, span, "element", symbol));
                }
                Entry::Vacant(e) => e.insert((span, element)),
            };
        }

        let mut seen_particles = HashMap::new();
        for particle in particles {
            let symbol = particle.symbol.0.clone();
            let span = particle.span;
            match seen_particles.entry(symbol) {
                Entry::Occupied(e) => {
                    let (symbol, (first_defined_at, _)) = e.remove_entry();
                    return Err(ChemistryErrorKind::Duplicate(first_defined_at, span, "particle", symbol));
                }
                Entry::Vacant(e) => e.insert((span, particle)),
            };
        }

        let elements: Vec<_> = seen_elements
            .into_values()
            .map(|(span, e)| ElementEntry::try_from(e).map_err(|e| ChemistryErrorKind::Abundance(span, e)))
            .collect::<Result<_, _>>()?;
        let particles = seen_particles.into_values().map(|(_, p)| ParticleEntry::from(p));

        Ok(AtomicDatabase::from_entries(elements, particles))
    }
}

// Validate Modifications ==============================================================================================

type Modifications = HashMap<Modification, ModificationDescription>;

impl<'a> ValidateInto<'a, Modifications> for Vec<ModificationKdl> {
    type Context = &'a AtomicDatabase;

    fn validate(self, ctx: Self::Context) -> ChemResult<Modifications> {
        let mut seen_modifications: HashMap<_, (Span, ModificationDescription)> = HashMap::new();

        for modification in self {
            let span = modification.span;
            let (code, description) = modification.validate(ctx)?;
            match seen_modifications.entry(code) {
                Entry::Occupied(e) => {
                    let (code, (first_defined_at, _)) = e.remove_entry();
                    let code = code.code().to_owned();
                    return Err(ChemistryErrorKind::Duplicate(first_defined_at, span, "modification", code));
                }
                Entry::Vacant(e) => e.insert((span, description)),
            };
        }

        Ok(seen_modifications.into_iter().map(|(k, (_, v))| (k, v)).collect())
    }
}

type ModificationEntry = (Modification, ModificationDescription);

impl<'a> ValidateInto<'a, ModificationEntry> for ModificationKdl {
    type Context = &'a AtomicDatabase;

    fn validate(self, ctx: Self::Context) -> ChemResult<ModificationEntry> {
        let modification = Modification::from_code(&self.code)
            .ok_or_else(|| ChemistryErrorKind::UnknownModification(self.span, self.code.clone()))?;

        let lost = self.lost.validate(ctx)?;
        let gained = self.gained.validate(ctx)?;

        Ok((
            modification,
            ModificationDescription {
                name: self.name,
                delta: gained - lost,
            },
        ))
    }
}

// Validate Substituents ===============================================================================================

type Substituents = HashMap<String, SubstituentDescription>;

impl<'a> ValidateInto<'a, Substituents> for Vec<SubstituentKdl> {
    type Context = &'a AtomicDatabase;

    fn validate(self, ctx: Self::Context) -> ChemResult<Substituents> {
        let mut seen_substituents = HashMap::new();

        for substituent in self {
            let span = substituent.span;
            let (abbr, description) = substituent.validate(ctx)?;
            match seen_substituents.entry(abbr) {
                Entry::Occupied(e) => {
                    let (abbr, (first_defined_at, _)) = e.remove_entry();
                    return Err(ChemistryErrorKind::Duplicate(first_defined_at, span, "substituent", abbr));
                }
                Entry::Vacant(e) => e.insert((span, description)),
            };
        }

        Ok(seen_substituents.into_iter().map(|(k, (_, v))| (k, v)).collect())
    }
}

type SubstituentEntry = (String, SubstituentDescription);

impl<'a> ValidateInto<'a, SubstituentEntry> for SubstituentKdl {
    type Context = &'a AtomicDatabase;

    fn validate(self, ctx: Self::Context) -> ChemResult<SubstituentEntry> {
        let composition = self.composition.validate(ctx)? - self.lost.validate(ctx)?;
        // NOTE: Unless told otherwise, the residue gives up a hydrogen from one of its hydroxyl groups
        let attachment_loss = match self.attachment {
            Some(attachment) => attachment.validate(ctx)?,
            None => Composition::from_formula("H").map_err(|e| ChemistryErrorKind::Composition(self.span, *e))?,
        };

        Ok((
            self.abbr,
            SubstituentDescription {
                name: self.name,
                composition,
                attachment_loss,
                nh_derivatizable: self.nh_derivatizable,
            },
        ))
    }
}

// ---------------------------------------------------------------------------------------------------------------------

impl<'a> ValidateInto<'a, Composition> for Option<CompositionKdl> {
    type Context = &'a AtomicDatabase;

    fn validate(self, ctx: Self::Context) -> ChemResult<Composition> {
        self.map_or_else(|| Ok(Composition::default()), |c| c.validate(ctx))
    }
}

impl<'a> ValidateInto<'a, Composition> for CompositionKdl {
    type Context = &'a AtomicDatabase;

    fn validate(self, ctx: Self::Context) -> ChemResult<Composition> {
        let span = *self.span();
        let composition = Composition::from_formula(&*self).map_err(|e| ChemistryErrorKind::Composition(span, *e))?;

        if let Some((symbol, _)) = composition.iter().find(|(s, _)| !ctx.contains_element(s)) {
            let error = AtomicLookupError::element(symbol);
            return Err(ChemistryErrorKind::Composition(span, error.into()));
        }

        Ok(composition)
    }
}

// Validation Error Types and Trait Implementations  ===================================================================

#[derive(Debug, Error)]
#[error("failed to validate glycan database file")]
pub(super) struct ChemistryError {
    kdl: NamedSource,
    #[source]
    kind: ChemistryErrorKind,
}

// NOTE: This is manually implemented because the list of labels is dynamic and needs to be extracted from `self.kind`
impl Diagnostic for ChemistryError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.kdl)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(
            self.kind
                .labels()
                .into_iter()
                .map(|(s, l)| LabeledSpan::new_with_span(Some(l.to_owned()), *s)),
        ))
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        Some(&self.kind)
    }
}

#[derive(Debug, Diagnostic, Error)]
pub(super) enum ChemistryErrorKind {
    #[error("the {2} {3:?} has already been defined")]
    #[diagnostic(help("double-check for typos, or remove the duplicate entry"))]
    Duplicate(Span, Span, &'static str, String),

    #[error("the modification {1:?} is not one that GlycoCT can express")]
    #[diagnostic(help("the supported modifications are d, a, aldi, keto, en, sp, sp2, and geminal"))]
    UnknownModification(Span, String),

    #[error("glycan database file contained an element that can't be weighed")]
    Abundance(
        Span,
        #[source]
        #[diagnostic_source]
        AtomicLookupError,
    ),

    #[error("glycan database file contained an invalid chemical composition")]
    Composition(
        Span,
        #[source]
        #[diagnostic_source]
        GlycoError,
    ),
}

impl ChemistryErrorKind {
    fn labels(&self) -> Vec<(&Span, &'static str)> {
        match self {
            Self::Duplicate(s1, s2, _, _) => vec![(s1, "first defined here"), (s2, "then again here")],
            Self::UnknownModification(s, _) => vec![(s, "unknown modification")],
            Self::Abundance(s, _) => vec![(s, "no natural abundance")],
            Self::Composition(s, _) => vec![(s, "invalid chemical composition")],
        }
    }

    pub(super) fn finalize(self, file_name: impl AsRef<str>, kdl: impl AsRef<str>) -> ChemistryError {
        let kdl = NamedSource::new(file_name, kdl.as_ref().to_owned());
        ChemistryError { kdl, kind: self }
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use miette::Diagnostic;

    use crate::testing_tools::render_diagnostic;

    use super::*;

    fn validate(kdl: &str) -> Result<Registry, ChemistryError> {
        let parsed: GlycanDatabaseKdl = knuffel::parse("test", kdl).unwrap();
        parsed.validate(()).map_err(|e| e.finalize("test", kdl))
    }

    const ATOMS: &str = indoc! {r#"
        elements {
          H "Hydrogen" {
            isotope 1 1.00782503223 0.999885
          }
          O "Oxygen" {
            isotope 16 15.99491461957 0.99757
          }
        }
        particles {
          p "Proton" {
            mass 1.007276466621
            charge +1
          }
        }
    "#};

    #[test]
    fn minimal_database() {
        let kdl = format!(
            "{ATOMS}{}",
            indoc! {r#"
                modifications {
                  d "Deoxygenation" {
                    lost "O"
                  }
                }
                substituents {
                  methyl "Methyl"
                }
            "#}
        );
        let registry = validate(&kdl).unwrap();
        let deoxy = &registry.modifications[&Modification::Deoxygenated];
        assert_eq!(deoxy.delta, Composition::from_formula("-O").unwrap());
        let methyl = &registry.substituents["methyl"];
        assert_eq!(methyl.attachment_loss, Composition::from_formula("H").unwrap());
        assert!(!methyl.nh_derivatizable);
    }

    #[test]
    fn duplicate_elements() {
        let kdl = indoc! {r#"
            elements {
              H "Hydrogen" {
                isotope 1 1.00782503223 0.999885
              }
              H "Hydrogen" {
                isotope 2 2.01410177812 0.000115
              }
            }
            particles {}
            modifications {}
            substituents {}
        "#};
        let error = validate(kdl).unwrap_err();
        assert_eq!(error.kind.to_string(), "the element \"H\" has already been defined");
        assert_eq!(error.labels().unwrap().count(), 2);
    }

    #[test]
    fn duplicate_substituents() {
        let kdl = format!(
            "{ATOMS}{}",
            indoc! {r#"
                modifications {}
                substituents {
                  hydroxy "Hydroxy" {
                    composition "HO"
                  }
                  hydroxy "Hydroxyl" {
                    composition "HO"
                  }
                }
            "#}
        );
        let error = validate(&kdl).unwrap_err();
        let rendered = render_diagnostic(&error);
        assert!(rendered.contains("the substituent \"hydroxy\" has already been defined"));
        assert!(rendered.contains("first defined here"));
        assert!(rendered.contains("then again here"));
    }

    #[test]
    fn unknown_modification() {
        let kdl = format!(
            "{ATOMS}{}",
            indoc! {r#"
                modifications {
                  ox "Oxidation"
                }
                substituents {}
            "#}
        );
        let error = validate(&kdl).unwrap_err();
        assert!(matches!(error.kind, ChemistryErrorKind::UnknownModification(_, ref code) if code == "ox"));
    }

    #[test]
    fn composition_with_unknown_element() {
        let kdl = format!(
            "{ATOMS}{}",
            indoc! {r#"
                modifications {}
                substituents {
                  sulfate "Sulfate" {
                    composition "H2O3S"
                  }
                }
            "#}
        );
        let error = validate(&kdl).unwrap_err();
        let rendered = render_diagnostic(&error);
        assert!(rendered.contains("invalid chemical composition"));
        assert!(rendered.contains("the element \"S\" could not be found"));
    }

    #[test]
    fn malformed_composition() {
        let kdl = format!(
            "{ATOMS}{}",
            indoc! {r#"
                modifications {
                  d "Deoxygenation" {
                    lost "o"
                  }
                }
                substituents {}
            "#}
        );
        let error = validate(&kdl).unwrap_err();
        assert!(matches!(error.kind, ChemistryErrorKind::Composition(..)));
    }

    #[test]
    fn element_without_abundance() {
        let kdl = indoc! {r#"
            elements {
              Tc "Technetium" {
                isotope 97 96.9063667
              }
            }
            particles {}
            modifications {}
            substituents {}
        "#};
        let error = validate(kdl).unwrap_err();
        assert!(matches!(error.kind, ChemistryErrorKind::Abundance(..)));
    }
}
