// External Crate Imports
use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use nom::{
    Err, Finish, IResult, Parser,
    combinator::{all_consuming, complete, consumed},
    error::{ErrorKind, FromExternalError, ParseError},
};
use thiserror::Error;

// Public API ==========================================================================================================

/// A line of input that couldn't be understood, along with where it was found
#[derive(Debug, Error)]
#[error("malformed {section} line {line}: {kind}")]
pub struct MalformedInputError {
    src: NamedSource,
    span: SourceSpan,
    line: usize,
    section: String,
    #[source]
    kind: GlycoErrorKind,
}

impl MalformedInputError {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn kind(&self) -> &GlycoErrorKind {
        &self.kind
    }

    pub(crate) fn new(
        name: impl AsRef<str>,
        source: impl AsRef<str>,
        line: usize,
        section: impl Into<String>,
        offset: usize,
        error: LineError,
    ) -> Self {
        // NOTE: The additional space is added so that labels can point just past the end of the input
        let src = NamedSource::new(name, format!("{} ", source.as_ref()));
        let span = SourceSpan::from(offset + error.offset..offset + error.offset + error.length);

        Self {
            src,
            span,
            line,
            section: section.into(),
            kind: error.kind,
        }
    }
}

// NOTE: This is manually implemented since the label text comes from `self.kind`
impl Diagnostic for MalformedInputError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.kind.help()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = self.kind.label().map(str::to_owned);
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(label, self.span))))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum GlycoErrorKind {
    #[error("expected a positive integer index")]
    ExpectedIndex,

    #[diagnostic(help("if you've mistakenly included a leading zero, like H02, try just H2 instead"))]
    #[error("numbers cannot start with 0")]
    ExpectedNoLeadingZero,

    #[error("expected an element symbol (like C or Na) optionally followed by a count")]
    ExpectedElement,

    #[error("expected a residue type of 'b' (base), 's' (substituent), or 'r' (repeat)")]
    ExpectedResidueType,

    #[error("expected an anomer of 'a', 'b', 'o', or 'x'")]
    ExpectedAnomer,

    #[error("expected a configuration of 'd', 'l', or 'x'")]
    ExpectedConfiguration,

    #[diagnostic(help("stems are three lowercase letters, like glc, gal, or man"))]
    #[error("expected a stem")]
    ExpectedStem,

    #[diagnostic(help("superclasses are written in uppercase, like HEX, PEN, or S11"))]
    #[error("expected a superclass")]
    ExpectedSuperclass,

    #[error("expected a ring position, or 'x' if it's unknown")]
    ExpectedRingPosition,

    #[diagnostic(help("the known modifications are d, a, aldi, keto, en, sp, sp2, and geminal"))]
    #[error("expected a modification")]
    ExpectedModification,

    #[error("expected an attachment position, or -1 if it's unknown")]
    ExpectedPosition,

    #[diagnostic(help("the loss sigils are o, d, h, n, and x"))]
    #[error("expected a loss sigil")]
    ExpectedLossSigil,

    #[error("expected a substituent name")]
    ExpectedSubstituentName,

    #[diagnostic(help("double-check for typos, or add a new entry to the substituents section of the registry"))]
    #[error("the substituent could not be found in the supplied registry")]
    UnknownSubstituent,

    #[error("expected an undetermined subtree header, like UND1:100.0:100.0")]
    ExpectedUndeterminedHeader,

    #[error("expected a linkage, like 1o(4+1)2d")]
    ExpectedLinkage,

    #[error("expected a repeat header, like REP1:3o(4+1)2d=1-5")]
    ExpectedRepeatHeader,

    #[diagnostic(help("unknown bounds are written as -1"))]
    #[error("expected a repeat multiplicity")]
    ExpectedMultiplicity,

    #[error("expected a probability, like 100.0")]
    ExpectedProbability,

    #[error("expected a '|' separated list of parent indices, like ParentIDs:1|4")]
    ExpectedParentIds,

    #[error("expected a subtree linkage, like SubtreeLinkageID1:o(4+1)d")]
    ExpectedSubtreeLinkage,

    #[error("could not interpret this line in the current section")]
    UnexpectedLine,

    #[diagnostic(help("check the unparsed region for errors, or remove it from the rest of the line"))]
    #[error("could not interpret the full input")]
    Incomplete,

    #[diagnostic(help(
        "this is an internal error that you shouldn't ever see! If you have gotten this error, \
        then please report it as a bug!"
    ))]
    #[error("internal `nom` error: {0:?}")]
    NomError(ErrorKind),
}

impl GlycoErrorKind {
    fn label(&self) -> Option<&'static str> {
        Some(match self {
            Self::ExpectedIndex => "expected index",
            Self::ExpectedNoLeadingZero => "expected non-zero",
            Self::ExpectedElement => "expected element",
            Self::ExpectedResidueType => "expected 'b', 's', or 'r'",
            Self::ExpectedAnomer => "expected anomer",
            Self::ExpectedConfiguration => "expected configuration",
            Self::ExpectedStem => "unknown stem",
            Self::ExpectedSuperclass => "unknown superclass",
            Self::ExpectedRingPosition => "expected ring position",
            Self::ExpectedModification => "unknown modification",
            Self::ExpectedPosition => "expected position",
            Self::ExpectedLossSigil => "expected loss sigil",
            Self::ExpectedSubstituentName => "expected name",
            Self::UnknownSubstituent => "unknown substituent",
            Self::ExpectedLinkage => "expected linkage",
            Self::ExpectedMultiplicity => "expected multiplicity",
            Self::ExpectedProbability => "expected probability",
            Self::ExpectedParentIds => "expected parent indices",
            Self::Incomplete => "input was valid up until this point",
            Self::NomError(_) => "the region that triggered this bug!",
            _ => return None,
        })
    }
}

impl From<ErrorKind> for GlycoErrorKind {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::Eof => Self::Incomplete,
            kind => Self::NomError(kind),
        }
    }
}

// Parser Error Plumbing ===============================================================================================

pub type ParseResult<'a, O> = IResult<&'a str, O, LabeledParseError<'a>>;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct LabeledParseError<'a> {
    input: &'a str,
    length: usize,
    kind: GlycoErrorKind,
}

impl<'a> LabeledParseError<'a> {
    pub(crate) fn new(input: &'a str, kind: GlycoErrorKind) -> Self {
        Self {
            input,
            length: 0,
            kind,
        }
    }
}

impl<'a> ParseError<&'a str> for LabeledParseError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::new(input, kind.into())
    }

    fn append(_input: &str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    // NOTE: Of two failed alternatives, report the one that made it furthest into the input
    fn or(self, other: Self) -> Self {
        if other.input.len() < self.input.len() {
            other
        } else {
            self
        }
    }
}

// NOTE: External errors (from `nom::combinator::map_res`) are dropped, since the `GlycoErrorKind` wrapping that
// parser describes the problem better than they can
impl<'a, E> FromExternalError<&'a str, E> for LabeledParseError<'a> {
    fn from_external_error(input: &'a str, kind: ErrorKind, _e: E) -> Self {
        Self::from_error_kind(input, kind)
    }
}

/// Where a parser failed, relative to the start of the text it was given
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct LineError {
    pub(crate) offset: usize,
    pub(crate) length: usize,
    pub(crate) kind: GlycoErrorKind,
}

pub(crate) fn final_parser<'a, O, P>(parser: P) -> impl FnMut(&'a str) -> Result<O, LineError>
where
    P: Parser<&'a str, O, LabeledParseError<'a>>,
{
    let mut parser = all_consuming(complete(parser));
    move |input| {
        parser.parse(input).finish().map(|(_, o)| o).map_err(|e| LineError {
            offset: input.len() - e.input.len(),
            length: e.length,
            kind: e.kind,
        })
    }
}

/// Replaces any error from `parser` with one of the given `kind`, pointing at where `parser` started
pub(crate) fn expect<'a, O, P>(mut parser: P, kind: GlycoErrorKind) -> impl FnMut(&'a str) -> ParseResult<'a, O>
where
    P: Parser<&'a str, O, LabeledParseError<'a>>,
{
    move |i| {
        parser
            .parse(i)
            .map_err(|e| e.map(|_| LabeledParseError::new(i, kind.clone())))
    }
}

/// Like `nom::combinator::map_res`, but the failure spans everything `parser` consumed and can't be backtracked
pub(crate) fn map_res<'a, O1, O2, P, F>(parser: P, mut f: F) -> impl FnMut(&'a str) -> ParseResult<'a, O2>
where
    P: Parser<&'a str, O1, LabeledParseError<'a>>,
    F: FnMut(O1) -> Result<O2, GlycoErrorKind>,
{
    let mut parser = consumed(parser);
    move |i| {
        let (rest, (consumed, o1)) = parser.parse(i)?;
        f(o1).map(|o2| (rest, o2)).map_err(|kind| {
            Err::Failure(LabeledParseError {
                input: i,
                length: consumed.len(),
                kind,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use nom::{bytes::complete::tag, character::complete::alpha1};

    use super::*;

    #[test]
    fn final_parser_offsets() {
        let mut parser = final_parser(expect(tag("RES"), GlycoErrorKind::UnexpectedLine));
        assert_eq!(parser("RES"), Ok("RES"));
        let err = parser("LIN").unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.kind, GlycoErrorKind::UnexpectedLine);

        let err = parser("RESX").unwrap_err();
        assert_eq!(err.offset, 3);
        assert_eq!(err.kind, GlycoErrorKind::Incomplete);
    }

    #[test]
    fn map_res_spans_consumed_input() {
        let stem = |s: &str| {
            if s == "glc" {
                Ok(s.len())
            } else {
                Err(GlycoErrorKind::ExpectedStem)
            }
        };
        let mut parser = final_parser(map_res(alpha1, stem));
        assert_eq!(parser("glc"), Ok(3));
        let err = parser("foo").unwrap_err();
        assert_eq!((err.offset, err.length), (0, 3));
        assert_eq!(err.kind, GlycoErrorKind::ExpectedStem);
    }

    #[test]
    fn malformed_input_span() {
        let error = LineError {
            offset: 2,
            length: 3,
            kind: GlycoErrorKind::ExpectedStem,
        };
        let malformed = MalformedInputError::new("input", "RES\n1b:b-dfoo-HEX-1:5", 2, "RES", 4, error);
        assert_eq!(malformed.line(), 2);
        assert_eq!(malformed.section(), "RES");
        assert_eq!(malformed.span, SourceSpan::from(6..9));
        assert_eq!(malformed.to_string(), "malformed RES line 2: expected a stem");
    }
}
