//! Splits GlycoCT text into structures, and each structure into the sections it's built from

// External Crate Imports
use ahash::HashSet;
use tracing::{debug, warn};

// Local Crate Imports
use crate::{
    GlycoError, Registry, Result,
    errors::{GlycoErrorKind, MalformedInputError, StructuralError},
    parsers::{
        errors::{LineError, ParseResult, final_parser},
        glycoct::{
            Linkage, RepeatHeader, ResLine, SubtreeLinkage, lin_line, parent_ids, rep_header, res_line,
            subtree_linkage, und_header,
        },
    },
};

const UNSUPPORTED_SECTIONS: [&str; 5] = ["ALT", "ISO", "NON", "PARAM", "SUBS"];

// Public API ==========================================================================================================

/// The sections of a single structure, before any repeats are expanded
#[derive(Clone, Debug, Default)]
pub(crate) struct Document {
    pub(crate) main: Block,
    pub(crate) repeats: Vec<RepeatSection>,
    pub(crate) undetermined: Vec<UndeterminedSection>,
}

/// A `RES` section and the `LIN` section that follows it, with the line each entry was read from
#[derive(Clone, Debug, Default)]
pub(crate) struct Block {
    pub(crate) residues: Vec<(usize, ResLine)>,
    pub(crate) links: Vec<(usize, Linkage)>,
}

#[derive(Clone, Debug)]
pub(crate) struct RepeatSection {
    pub(crate) line: usize,
    pub(crate) header: RepeatHeader,
    pub(crate) body: Block,
}

#[derive(Clone, Debug)]
pub(crate) struct UndeterminedSection {
    pub(crate) line: usize,
    pub(crate) und: u32,
    pub(crate) parents: Vec<u32>,
    pub(crate) linkage: Option<SubtreeLinkage>,
    pub(crate) body: Block,
}

pub(crate) fn read(registry: &Registry, text: &str) -> Result<Vec<Document>> {
    let mut reader = Reader::new(registry);
    for (line, source) in (1..).zip(text.lines()) {
        if source.trim().is_empty() {
            reader.finish();
            continue;
        }
        for (offset, token) in tokens(source) {
            reader.token(&Token { line, source, offset, text: token })?;
        }
    }
    reader.finish();
    Ok(reader.documents)
}

// Reader State Machine ================================================================================================

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Target {
    Main,
    Repeat(usize),
    Undetermined(usize),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum State {
    Start,
    Res(Target),
    Lin(Target),
    /// After `REP`, waiting for a header
    Rep,
    /// After a `REP` header, waiting for its `RES`
    RepHeader(usize),
    /// After `UND`, waiting for a header
    Und,
    UndParents(usize),
    UndLinkage(usize),
    /// After the subtree linkage, waiting for the subtree's `RES`
    UndBody(usize),
}

impl State {
    const fn section(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Res(_) => "RES",
            Self::Lin(_) => "LIN",
            Self::Rep | Self::RepHeader(_) => "REP",
            Self::Und | Self::UndParents(_) | Self::UndLinkage(_) | Self::UndBody(_) => "UND",
        }
    }

    // NOTE: A new REP header can follow the `REP` keyword, or the body of the previous repeat
    const fn in_repeats(self) -> bool {
        matches!(self, Self::Rep | Self::Res(Target::Repeat(_)) | Self::Lin(Target::Repeat(_)))
    }

    const fn in_undetermined(self) -> bool {
        matches!(
            self,
            Self::Und | Self::Res(Target::Undetermined(_)) | Self::Lin(Target::Undetermined(_))
        )
    }
}

struct Token<'a> {
    line: usize,
    source: &'a str,
    offset: usize,
    text: &'a str,
}

struct Reader<'r> {
    registry: &'r Registry,
    state: State,
    document: Document,
    indices: HashSet<u32>,
    documents: Vec<Document>,
}

impl<'r> Reader<'r> {
    fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            state: State::Start,
            document: Document::default(),
            indices: HashSet::default(),
            documents: Vec::new(),
        }
    }

    fn finish(&mut self) {
        if self.state != State::Start {
            debug!(structure = self.documents.len() + 1, "finished reading structure");
            self.documents.push(std::mem::take(&mut self.document));
            self.indices.clear();
            self.state = State::Start;
        }
    }

    fn enter(&mut self, state: State, line: usize) {
        debug!(line, from = ?self.state, to = ?state, "entering section");
        self.state = state;
    }

    fn token(&mut self, token: &Token) -> Result<()> {
        if UNSUPPORTED_SECTIONS.contains(&token.text) {
            let section = token.text.to_owned();
            return Err(GlycoError::UnsupportedSection { section, line: token.line }.into());
        }

        let line = token.line;
        match (token.text, self.state) {
            ("RES", State::Start) => self.enter(State::Res(Target::Main), line),
            ("RES", State::RepHeader(repeat)) => self.enter(State::Res(Target::Repeat(repeat)), line),
            ("RES", State::UndBody(und)) => self.enter(State::Res(Target::Undetermined(und)), line),
            ("RES", State::Res(_) | State::Lin(_)) => {
                self.finish();
                self.enter(State::Res(Target::Main), line);
            }
            ("LIN", State::Res(target)) => self.enter(State::Lin(target), line),
            ("REP", State::Res(_) | State::Lin(_)) => self.enter(State::Rep, line),
            ("UND", State::Res(_) | State::Lin(_)) => self.enter(State::Und, line),
            ("RES" | "LIN" | "REP" | "UND", _) => return Err(self.unexpected(token)),
            (text, state) if text.starts_with("REP") && state.in_repeats() => {
                let header = self.parse(rep_header, token)?;
                debug!(line, repeat = header.repeat, "read repeat header");
                self.document.repeats.push(RepeatSection {
                    line,
                    header,
                    body: Block::default(),
                });
                self.enter(State::RepHeader(self.document.repeats.len() - 1), line);
            }
            (text, state) if text.starts_with("UND") && state.in_undetermined() => {
                let (und, _, _) = self.parse(und_header, token)?;
                self.document.undetermined.push(UndeterminedSection {
                    line,
                    und,
                    parents: Vec::new(),
                    linkage: None,
                    body: Block::default(),
                });
                self.enter(State::UndParents(self.document.undetermined.len() - 1), line);
            }
            (_, State::Res(target)) => {
                let residue = self.parse(res_line(self.registry), token)?;
                let index = res_index(&residue);
                if !self.indices.insert(index) {
                    return Err(StructuralError::DuplicateIndex { index, line }.into());
                }
                self.block(target).residues.push((line, residue));
            }
            (_, State::Lin(target)) => {
                let (_, linkage) = self.parse(lin_line, token)?;
                self.block(target).links.push((line, linkage));
            }
            (_, State::UndParents(und)) => {
                self.document.undetermined[und].parents = self.parse(parent_ids, token)?;
                self.state = State::UndLinkage(und);
            }
            (_, State::UndLinkage(und)) => {
                let (_, linkage) = self.parse(subtree_linkage, token)?;
                self.document.undetermined[und].linkage = Some(linkage);
                self.state = State::UndBody(und);
            }
            (text, State::UndBody(und)) if text.starts_with("SubtreeLinkageID") => {
                self.parse(subtree_linkage, token)?;
                warn!(
                    line,
                    und = self.document.undetermined[und].und,
                    "only the first subtree linkage of an undetermined section is used"
                );
            }
            _ => return Err(self.unexpected(token)),
        }
        Ok(())
    }

    fn block(&mut self, target: Target) -> &mut Block {
        match target {
            Target::Main => &mut self.document.main,
            Target::Repeat(repeat) => &mut self.document.repeats[repeat].body,
            Target::Undetermined(und) => &mut self.document.undetermined[und].body,
        }
    }

    fn parse<'a, O>(&self, parser: impl FnMut(&'a str) -> ParseResult<'a, O>, token: &Token<'a>) -> Result<O> {
        final_parser(parser)(token.text).map_err(|e| self.malformed(token, e))
    }

    fn unexpected(&self, token: &Token) -> Box<GlycoError> {
        let error = LineError {
            offset: 0,
            length: token.text.len(),
            kind: GlycoErrorKind::UnexpectedLine,
        };
        self.malformed(token, error)
    }

    fn malformed(&self, token: &Token, error: LineError) -> Box<GlycoError> {
        let section = self.state.section();
        MalformedInputError::new("glycoct", token.source, token.line, section, token.offset, error).into()
    }
}

const fn res_index(line: &ResLine) -> u32 {
    match *line {
        ResLine::Residue(index, _) | ResLine::Substituent(index, _) | ResLine::Repeat(index, _) => index,
    }
}

// NOTE: Only ASCII separators are split on, so every separator is exactly one byte wide
fn tokens(line: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    line.split(|c: char| c.is_ascii_whitespace() || c == ';')
        .filter_map(move |token| {
            let start = offset;
            offset += token.len() + 1;
            (!token.is_empty()).then_some((start, token))
        })
}

// Module Tests ========================================================================================================
