// External Crate Imports
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, one_of},
    combinator::{map, map_opt},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
};
use tracing::warn;

// Local Crate Imports
use crate::{Anomer, Configuration, Modification, Position, Registry, Residue, Stem, SuperClass};

use super::{
    errors::{GlycoErrorKind, ParseResult, expect, map_res},
    primitives::{index, loss_sigil, multiplicity, position, positions, probability, ring_position},
};

// Public API ==========================================================================================================

/// A single line from a `RES` section
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ResLine {
    Residue(u32, Residue),
    Substituent(u32, String),
    /// A placeholder for the repeat unit defined by the `REP` section with the second index
    Repeat(u32, u32),
}

/// Everything on a `LIN` line after its own index, like `1o(4+1)2d`
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Linkage {
    pub parent: u32,
    pub parent_loss: char,
    pub parent_positions: Vec<Position>,
    pub child_positions: Vec<Position>,
    pub child: u32,
    pub child_loss: char,
}

/// A `REP` section header, like `REP1:3o(4+1)2d=1-5`
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RepeatHeader {
    pub repeat: u32,
    pub internal: Linkage,
    pub lower: i64,
    pub upper: i64,
}

/// A linkage template from an `UND` section, whose parent is any of the listed `ParentIDs`
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SubtreeLinkage {
    pub parent_loss: char,
    pub parent_positions: Vec<Position>,
    pub child_positions: Vec<Position>,
    pub child_loss: char,
}

/// Residue Descriptor = Anomer , { "-" , Configuration , Stem } ,
///   "-" , Superclass , "-" , Ring Position , ":" , Ring Position ,
///   { "|" , Modification Site } ;
pub fn residue_descriptor(i: &str) -> ParseResult<Residue> {
    let stereocenters = many0(preceded(char('-'), pair(configuration, stem)));
    let superclass = preceded(char('-'), superclass);
    let ring = preceded(char('-'), separated_pair(ring_position, char(':'), ring_position));
    let modifications = many0(preceded(char('|'), modification_site));

    map(
        tuple((anomer, stereocenters, superclass, ring, modifications)),
        |(anomer, stereocenters, superclass, (ring_start, ring_end), modifications)| {
            let (configuration, stem) = stereocenters.into_iter().unzip();
            Residue {
                anomer,
                configuration,
                stem,
                superclass,
                ring_start,
                ring_end,
                modifications,
            }
        },
    )(i)
}

/// Res Line = Index , "b:" , Residue Descriptor
///   | Index , "s:" , Substituent Name
///   | Index , "r:r" , Index ;
pub fn res_line<'a>(registry: &Registry) -> impl FnMut(&'a str) -> ParseResult<'a, ResLine> {
    move |i| {
        let residue_type = expect(one_of("bsr"), GlycoErrorKind::ExpectedResidueType);
        let (i, (index, residue_type)) = pair(index, terminated(residue_type, char(':')))(i)?;
        match residue_type {
            'b' => map(residue_descriptor, |r| ResLine::Residue(index, r))(i),
            's' => map(substituent_name(registry), |n| ResLine::Substituent(index, n))(i),
            _ => map(preceded(char('r'), self::index), |r| ResLine::Repeat(index, r))(i),
        }
    }
}

/// Lin Line = Index , ":" , Linkage ;
pub fn lin_line(i: &str) -> ParseResult<(u32, Linkage)> {
    pair(terminated(index, char(':')), linkage)(i)
}

/// Rep Header = "REP" , Index , ":" , Linkage , "=" , Multiplicity , "-" , Multiplicity ;
pub fn rep_header(i: &str) -> ParseResult<RepeatHeader> {
    let bounds = separated_pair(multiplicity, char('-'), multiplicity);
    let parser = tuple((
        delimited(tag("REP"), index, char(':')),
        terminated(linkage, char('=')),
        bounds,
    ));
    map(parser, |(repeat, internal, (lower, upper))| RepeatHeader {
        repeat,
        internal,
        lower,
        upper,
    })(i)
}

/// Und Header = "UND" , Index , ":" , Probability , ":" , Probability ;
pub fn und_header(i: &str) -> ParseResult<(u32, &str, &str)> {
    let header = delimited(tag("UND"), index, char(':'));
    let parser = tuple((header, terminated(probability, char(':')), probability));
    expect(parser, GlycoErrorKind::ExpectedUndeterminedHeader)(i)
}

/// Parent Ids = "ParentIDs:" , Index , { "|" , Index } ;
pub fn parent_ids(i: &str) -> ParseResult<Vec<u32>> {
    let parser = preceded(tag("ParentIDs:"), separated_list1(char('|'), index));
    expect(parser, GlycoErrorKind::ExpectedParentIds)(i)
}

/// Subtree Linkage = "SubtreeLinkageID" , Index , ":" ,
///   Loss Sigil , Linkage Positions , Loss Sigil ;
pub fn subtree_linkage(i: &str) -> ParseResult<(u32, SubtreeLinkage)> {
    let header = expect(
        delimited(tag("SubtreeLinkageID"), index, char(':')),
        GlycoErrorKind::ExpectedSubtreeLinkage,
    );
    let parser = pair(header, tuple((loss_sigil, linkage_positions, loss_sigil)));
    map(parser, |(id, (parent_loss, (parent_positions, child_positions), child_loss))| {
        let linkage = SubtreeLinkage {
            parent_loss,
            parent_positions,
            child_positions,
            child_loss,
        };
        (id, linkage)
    })(i)
}

// Private Sub-Parsers =================================================================================================

/// Anomer = "a" | "b" | "o" | "x" ;
fn anomer(i: &str) -> ParseResult<Anomer> {
    let parser = map_opt(one_of("abox"), Anomer::from_code);
    expect(parser, GlycoErrorKind::ExpectedAnomer)(i)
}

/// Configuration = "d" | "l" | "x" ;
fn configuration(i: &str) -> ParseResult<Configuration> {
    let parser = map_opt(one_of("dlx"), Configuration::from_code);
    expect(parser, GlycoErrorKind::ExpectedConfiguration)(i)
}

/// Stem = lowercase , { lowercase } ;
fn stem(i: &str) -> ParseResult<Stem> {
    let letters = expect(take_while1(|c: char| c.is_ascii_lowercase()), GlycoErrorKind::ExpectedStem);
    map_res(letters, |s| Stem::from_code(s).ok_or(GlycoErrorKind::ExpectedStem))(i)
}

/// Superclass = uppercase , { uppercase | digit } ;
fn superclass(i: &str) -> ParseResult<SuperClass> {
    let code = take_while1(|c: char| c.is_ascii_uppercase() || c.is_ascii_digit());
    let code = expect(code, GlycoErrorKind::ExpectedSuperclass);
    map_res(code, |s| SuperClass::from_code(s).ok_or(GlycoErrorKind::ExpectedSuperclass))(i)
}

/// Modification Site = Position , { "," , Position } , ":" , Modification ;
fn modification_site(i: &str) -> ParseResult<(Position, Modification)> {
    let sites = separated_list1(char(','), position);
    let parser = separated_pair(sites, char(':'), modification);
    map(parser, |(sites, modification)| {
        if sites.len() > 1 {
            warn!(
                modification = modification.code(),
                sites = sites.len(),
                "modifications spanning several carbons aren't fully supported, so only the first site is kept"
            );
        }
        // NOTE: `separated_list1` never returns an empty list
        (sites.first().copied().unwrap_or_default(), modification)
    })(i)
}

/// Modification = alphanumeric , { alphanumeric } ;
fn modification(i: &str) -> ParseResult<Modification> {
    let code = take_while1(|c: char| c.is_ascii_alphanumeric());
    let code = expect(code, GlycoErrorKind::ExpectedModification);
    map_res(code, |s| Modification::from_code(s).ok_or(GlycoErrorKind::ExpectedModification))(i)
}

/// Substituent Name = ? any characters except whitespace and ";" ? ;
fn substituent_name<'a>(registry: &Registry) -> impl FnMut(&'a str) -> ParseResult<'a, String> {
    move |i| {
        let name = take_while1(|c: char| !c.is_whitespace() && c != ';');
        let name = expect(name, GlycoErrorKind::ExpectedSubstituentName);
        map_res(name, |n: &str| {
            if registry.has_substituent(n) {
                Ok(n.to_owned())
            } else {
                Err(GlycoErrorKind::UnknownSubstituent)
            }
        })(i)
    }
}

/// Linkage = Index , Loss Sigil , Linkage Positions , Index , Loss Sigil ;
fn linkage(i: &str) -> ParseResult<Linkage> {
    let parser = tuple((index, loss_sigil, linkage_positions, index, loss_sigil));
    map(
        parser,
        |(parent, parent_loss, (parent_positions, child_positions), child, child_loss)| Linkage {
            parent,
            parent_loss,
            parent_positions,
            child_positions,
            child,
            child_loss,
        },
    )(i)
}

/// Linkage Positions = "(" , Positions , ( "+" | "-" ) , Positions , ")" ;
fn linkage_positions(i: &str) -> ParseResult<(Vec<Position>, Vec<Position>)> {
    let separator = alt((char('+'), char('-')));
    let parser = delimited(char('('), separated_pair(positions, separator, positions), char(')'));
    expect(parser, GlycoErrorKind::ExpectedLinkage)(i)
}

// Module Tests ========================================================================================================
