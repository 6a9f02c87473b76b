use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of, satisfy, u16, u32},
    combinator::{cut, map, not, opt, recognize, value},
    multi::separated_list1,
    sequence::{pair, preceded},
};

use crate::Position;

use super::errors::{GlycoErrorKind, ParseResult, expect};

/// uppercase
///   = "A" | "B" | "C" | "D" | "E" | "F" | "G"
///   | "H" | "I" | "J" | "K" | "L" | "M" | "N"
///   | "O" | "P" | "Q" | "R" | "S" | "T" | "U"
///   | "V" | "W" | "X" | "Y" | "Z"
///   ;
pub fn uppercase(i: &str) -> ParseResult<char> {
    satisfy(|c| c.is_ascii_uppercase())(i)
}

/// lowercase
///   = "a" | "b" | "c" | "d" | "e" | "f" | "g"
///   | "h" | "i" | "j" | "k" | "l" | "m" | "n"
///   | "o" | "p" | "q" | "r" | "s" | "t" | "u"
///   | "v" | "w" | "x" | "y" | "z"
///   ;
pub fn lowercase(i: &str) -> ParseResult<char> {
    satisfy(|c| c.is_ascii_lowercase())(i)
}

/// Natural = digit - "0" , { digit } ;
pub fn natural(i: &str) -> ParseResult<u32> {
    let not_zero = expect(cut(not(char('0'))), GlycoErrorKind::ExpectedNoLeadingZero);
    preceded(not_zero, u32)(i)
}

/// Index = Natural ;
pub fn index(i: &str) -> ParseResult<u32> {
    expect(natural, GlycoErrorKind::ExpectedIndex)(i)
}

/// Position = "-1" | Natural ;
pub fn position(i: &str) -> ParseResult<Position> {
    let unknown = value(Position::Unknown, tag("-1"));
    let known = map(preceded(not(char('0')), u16), Position::Known);
    expect(alt((unknown, known)), GlycoErrorKind::ExpectedPosition)(i)
}

/// Positions = Position , { "|" , Position } ;
pub fn positions(i: &str) -> ParseResult<Vec<Position>> {
    separated_list1(char('|'), position)(i)
}

/// Ring Position = "x" | "0" | Natural ;
pub fn ring_position(i: &str) -> ParseResult<Option<u16>> {
    let unknown = value(None, char('x'));
    let open_chain = value(Some(0), char('0'));
    let known = map(u16, Some);
    expect(alt((unknown, open_chain, known)), GlycoErrorKind::ExpectedRingPosition)(i)
}

/// Loss Sigil = "o" | "d" | "h" | "n" | "x" ;
pub fn loss_sigil(i: &str) -> ParseResult<char> {
    expect(one_of("odhnx"), GlycoErrorKind::ExpectedLossSigil)(i)
}

/// Multiplicity = [ "-" ] , digit , { digit } ;
pub fn multiplicity(i: &str) -> ParseResult<i64> {
    let number = recognize(pair(opt(char('-')), digit1));
    let parser = nom::combinator::map_res(number, str::parse);
    expect(parser, GlycoErrorKind::ExpectedMultiplicity)(i)
}

/// Probability = digit , { digit } , [ "." , { digit } ] ;
pub fn probability(i: &str) -> ParseResult<&str> {
    let number = recognize(pair(digit1, opt(pair(char('.'), opt(digit1)))));
    expect(number, GlycoErrorKind::ExpectedProbability)(i)
}
