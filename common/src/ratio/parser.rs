use crate::ratio::RatioValue;
use crate::{cents_to_ratio, ratio_to_cents, to_anyhow};
use anyhow::bail;
use num_rational::Rational64;
use num_traits::ToPrimitive;
use std::fmt::{Display, Formatter};
use winnow::ascii::{dec_int, multispace0};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, separated};
use winnow::error::{ContextError, StrContext};
use winnow::stream::AsChar;
use winnow::token::{one_of, take_while};
use winnow::{ModalParser, Parser};

#[derive(Debug)]
struct DetailedError {
    msg: String,
}
impl Display for DetailedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}
impl std::error::Error for DetailedError {}

impl DetailedError {
    fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// A numeric literal and whether it was written as a bare integer (no `.` or `/`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Literal {
    pub value: Rational64,
    pub plain_integer: bool,
}

fn digits<'s>() -> impl ModalParser<&'s str, i64, ContextError<StrContext>> {
    at_most_n_digits(0)
}

fn at_most_n_digits<'s>(
    max_digits: usize,
) -> impl ModalParser<&'s str, i64, ContextError<StrContext>> {
    move |input: &mut &'s str| {
        take_while(1.., AsChar::is_dec_digit)
            .try_map(|s: &str| {
                if max_digits == 0 || s.len() <= max_digits {
                    Ok(s)
                } else {
                    Err(DetailedError::new(format!(
                        "maximum allowed digits is {max_digits}"
                    )))
                }
            })
            .context(StrContext::Label("number digit length check"))
            .try_map(str::parse::<i64>)
            .context(StrContext::Label("parse number to i64"))
            .parse_next(input)
    }
}

/// Recognize `[-]a[.nnn][/b]` as an exact rational.
pub(crate) fn literal<'s>() -> impl ModalParser<&'s str, Literal, ContextError<StrContext>> {
    const MAX_DECIMALS: usize = 9;
    (
        opt("-"),
        digits().context(StrContext::Label("numerator")),
        opt(preceded(
            ".",
            cut_err(
                at_most_n_digits(MAX_DECIMALS)
                    .with_taken()
                    .context(StrContext::Label("numerator decimals")),
            ),
        )),
        opt(preceded(
            "/",
            cut_err(digits()).context(StrContext::Label("denominator")),
        )),
    )
        .context(StrContext::Label("number"))
        .try_map(|(sign, whole, frac, denominator)| {
            let plain_integer = frac.is_none() && denominator.is_none();
            let (num_frac, scale) = match frac {
                None => (0, 1),
                Some((v, s)) => (v, 10i64.pow(s.len() as u32)),
            };
            let too_large = || DetailedError::new("number is too large");
            let numerator = whole
                .checked_mul(scale)
                .and_then(|n| n.checked_add(num_frac))
                .ok_or_else(too_large)?;
            let denominator = denominator
                .unwrap_or(1)
                .checked_mul(scale)
                .ok_or_else(too_large)?;
            if denominator == 0 {
                return Err(DetailedError::new("denominator may not be zero"));
            }
            let numerator = if sign.is_some() { -numerator } else { numerator };
            Ok(Literal {
                value: Rational64::new(numerator, denominator),
                plain_integer,
            })
        })
}

pub(crate) fn ratio_value<'s>() -> impl ModalParser<&'s str, Literal, ContextError<StrContext>> {
    literal().context(StrContext::Label("ratio"))
}

/// The width of a repetition interval, given either in cents or as a ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalSpec {
    Cents(f64),
    Ratio(RatioValue),
}

fn interval<'s>() -> impl ModalParser<&'s str, IntervalSpec, ContextError<StrContext>> {
    (
        literal(),
        opt(preceded(multispace0, alt(("cents", "cent", "c")))),
    )
        .context(StrContext::Label("interval"))
        .map(|(lit, suffix)| {
            if suffix.is_some() || lit.plain_integer {
                IntervalSpec::Cents(lit.value.to_f64().unwrap_or(f64::NAN))
            } else {
                IntervalSpec::Ratio(RatioValue::Exact(lit.value))
            }
        })
}

impl IntervalSpec {
    /// A bare integer or a number suffixed with `c`, `cent`, or `cents` is cents; fractions and
    /// decimals are ratios. `700` and `700c` are cents, `3/2` and `2.0` are ratios.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let input = s.trim().to_lowercase();
        interval().parse(input.as_str()).map_err(to_anyhow)
    }

    /// Repetition factor, which must be greater than 1.
    pub fn to_ratio(self) -> anyhow::Result<RatioValue> {
        match self {
            IntervalSpec::Cents(c) => {
                if !(c > 0.0) || !c.is_finite() {
                    bail!("interval in cents must be > 0, not {c}");
                }
                Ok(RatioValue::Float(cents_to_ratio(c)))
            }
            IntervalSpec::Ratio(r) => {
                if !(r.as_float() > 1.0) {
                    bail!("interval ratio must be > 1, not {r}");
                }
                Ok(r)
            }
        }
    }

    pub fn to_cents(self) -> f64 {
        match self {
            IntervalSpec::Cents(c) => c,
            IntervalSpec::Ratio(r) => ratio_to_cents(r.as_float()),
        }
    }
}

/// Exponents `(a, b, c)` of `(6/5)^a * (3/2)^b * 2^c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DanielouExponents {
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

fn exponent<'s>() -> impl ModalParser<&'s str, i32, ContextError<StrContext>> {
    delimited(multispace0, dec_int, multispace0).context(StrContext::Label("integer exponent"))
}

fn exponent_list<'s>() -> impl ModalParser<&'s str, Vec<i32>, ContextError<StrContext>> {
    const SEPARATORS: [char; 3] = [',', ':', ';'];
    delimited(
        take_while(0.., (',', ':', ';', ' ')),
        separated(1.., exponent(), one_of(SEPARATORS)),
        take_while(0.., (',', ':', ';', ' ')),
    )
}

fn danielou<'s>() -> impl ModalParser<&'s str, DanielouExponents, ContextError<StrContext>> {
    alt((
        delimited('[', exponent_list(), ']'),
        delimited('(', exponent_list(), ')'),
        delimited('{', exponent_list(), '}'),
        exponent_list(),
    ))
    .context(StrContext::Label("danielou exponents"))
    .try_map(|parts: Vec<i32>| match parts.as_slice() {
        &[a] => Ok(DanielouExponents { a, b: 0, c: 1 }),
        &[a, b, c] => Ok(DanielouExponents { a, b, c }),
        _ => Err(DetailedError::new("expected 'a,b,c' (for example 0,0,1)")),
    })
}

impl DanielouExponents {
    /// Accepts `a,b,c`, `a:b:c`, `a;b;c`, optionally wrapped in `[]`, `()`, or `{}`. A single
    /// integer `a` means `(a, 0, 1)`.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        danielou().parse(s.trim()).map_err(to_anyhow)
    }
}
