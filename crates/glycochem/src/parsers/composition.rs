use nom::{
    character::complete::char,
    combinator::{map, opt, recognize},
    multi::many1,
    sequence::pair,
};

use crate::Composition;

use super::{
    errors::{GlycoErrorKind, ParseResult, expect},
    primitives::{lowercase, natural, uppercase},
};

/// Formula = [ "-" ] , { Element , [ Count ] }- ;
pub fn formula(i: &str) -> ParseResult<Composition> {
    let parser = pair(opt(char('-')), many1(element_count));
    map(parser, |(negated, counts)| {
        let sign = if negated.is_some() { -1 } else { 1 };
        let mut composition = Composition::new();
        for (symbol, count) in counts {
            composition.add_count(symbol, sign * i64::from(count));
        }
        composition
    })(i)
}

/// Element Count = Element , [ Natural ] ;
fn element_count(i: &str) -> ParseResult<(&str, u32)> {
    let optional_count = map(opt(natural), |c| c.unwrap_or(1));
    pair(element_symbol, optional_count)(i)
}

/// Element = uppercase , [ lowercase ] ;
fn element_symbol(i: &str) -> ParseResult<&str> {
    let parser = recognize(pair(uppercase, opt(lowercase)));
    expect(parser, GlycoErrorKind::ExpectedElement)(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(composition: &Composition) -> Vec<(&str, i64)> {
        composition.iter().collect()
    }

    #[test]
    fn test_element_symbol() {
        assert_eq!(element_symbol("H"), Ok(("", "H")));
        assert_eq!(element_symbol("Na2"), Ok(("2", "Na")));
        assert_eq!(element_symbol("HO"), Ok(("O", "H")));
        assert!(element_symbol("h").is_err());
        assert!(element_symbol("2H").is_err());
    }

    #[test]
    fn test_formula() {
        let (rest, glucose) = formula("C6H12O6").unwrap();
        assert_eq!(rest, "");
        assert_eq!(counts(&glucose), vec![("C", 6), ("H", 12), ("O", 6)]);

        let (_, water) = formula("HOH").unwrap();
        assert_eq!(counts(&water), vec![("H", 2), ("O", 1)]);

        let (_, lost) = formula("-H2O").unwrap();
        assert_eq!(counts(&lost), vec![("H", -2), ("O", -1)]);

        let (_, salt) = formula("NaCl").unwrap();
        assert_eq!(counts(&salt), vec![("Cl", 1), ("Na", 1)]);
    }

    #[test]
    fn test_invalid_formula() {
        assert!(formula("").is_err());
        assert!(formula("-").is_err());
        assert!(formula("h2o").is_err());
        assert!(formula("H02").is_err());
        assert_eq!(formula("H2o"), Ok(("o", formula("H2").unwrap().1)));
    }
}
