use crate::to_anyhow;
use num_rational::{BigRational, Rational64};
use num_traits::{CheckedDiv, CheckedMul, One, Signed, ToPrimitive, Zero};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::{Div, Mul};
use std::str::FromStr;
use winnow::Parser;

pub(crate) mod parser;

pub use parser::{DanielouExponents, IntervalSpec};

/// A frequency multiplier. Exact arithmetic is kept as long as every operand is exact and
/// the result fits in 64-bit numerator/denominator; anything else falls back to `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatioValue {
    Exact(Rational64),
    Float(f64),
}

impl RatioValue {
    pub fn new(numerator: i64, denominator: i64) -> anyhow::Result<Self> {
        if denominator == 0 {
            anyhow::bail!("ratio denominator may not be zero");
        }
        Ok(Self::Exact(Rational64::new(numerator, denominator)))
    }

    pub fn integer(n: i64) -> Self {
        Self::Exact(Rational64::from_integer(n))
    }

    /// Parse `n`, `n/d`, `n.ddd`, or `n.ddd/d` as an exact value.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        parser::ratio_value()
            .parse(s.trim())
            .map(|lit| Self::Exact(lit.value))
            .map_err(to_anyhow)
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    pub fn as_float(&self) -> f64 {
        match self {
            Self::Exact(r) => r.to_f64().unwrap_or(f64::NAN),
            Self::Float(f) => *f,
        }
    }

    /// Promote to the floating representation.
    pub fn to_float(self) -> Self {
        Self::Float(self.as_float())
    }

    /// Integer power; `k` may be negative. Exact inputs stay exact unless the result
    /// overflows or the base is zero with a negative exponent.
    pub fn power(self, k: i32) -> Self {
        match self {
            Self::Exact(r) => match checked_pow(r, k) {
                Some(v) => Self::Exact(v),
                None => Self::Float(self.as_float().powi(k)),
            },
            Self::Float(f) => Self::Float(f.powi(k)),
        }
    }

    /// Fold into `[1, interval)` by repeated division/multiplication. An interval that is
    /// not a finite value greater than 1, or a value that is not finite and positive, leaves
    /// the input unchanged.
    pub fn reduce_to_interval(self, interval: RatioValue) -> Self {
        let limit = interval.as_float();
        let v = self.as_float();
        if !limit.is_finite() || limit <= 1.0 || !v.is_finite() || v <= 0.0 {
            return self;
        }
        if let (Self::Exact(value), Self::Exact(interval)) = (self, interval)
            && let Some(r) = reduce_exact(value, interval)
        {
            return Self::Exact(r);
        }
        Self::Float(reduce_float(v, limit))
    }

    pub fn reduce_to_octave(self) -> Self {
        self.reduce_to_interval(Self::integer(2))
    }

    /// The product of `base^k` over `terms`, reduced into `[1, interval)`. Exact terms are
    /// multiplied and reduced with arbitrary precision, so exponents far beyond the range of
    /// `i64` or `f64` still reduce correctly. A floating product that overflows is folded in the
    /// log domain. The interval rules of [`Self::reduce_to_interval`] apply.
    pub fn reduced_product(terms: &[(RatioValue, i32)], interval: RatioValue) -> Self {
        if let Self::Exact(limit) = interval
            && limit > Rational64::one()
            && let Some(product) = big_product(terms)
        {
            return from_big(&reduce_big(product, &to_big(limit)));
        }
        let product = terms
            .iter()
            .fold(Self::integer(1), |acc, &(base, k)| acc * base.power(k));
        let limit = interval.as_float();
        let v = product.as_float();
        if v.is_finite() || !limit.is_finite() || limit <= 1.0 {
            return product.reduce_to_interval(interval);
        }
        let log_value: f64 = terms
            .iter()
            .map(|&(base, k)| k as f64 * base.as_float().ln())
            .sum();
        if !log_value.is_finite() {
            return product;
        }
        let mut r = log_value.rem_euclid(limit.ln()).exp();
        if r >= limit {
            r /= limit;
        }
        Self::Float(r.max(1.0))
    }
}

fn to_big(r: Rational64) -> BigRational {
    BigRational::new((*r.numer()).into(), (*r.denom()).into())
}

/// Back to `i64` parts when they fit.
fn from_big(r: &BigRational) -> RatioValue {
    match (r.numer().to_i64(), r.denom().to_i64()) {
        (Some(n), Some(d)) => RatioValue::Exact(Rational64::new(n, d)),
        _ => RatioValue::Float(r.to_f64().unwrap_or(f64::NAN)),
    }
}

/// `None` unless every base is exact and positive.
fn big_product(terms: &[(RatioValue, i32)]) -> Option<BigRational> {
    let mut product = BigRational::one();
    for &(base, k) in terms {
        let RatioValue::Exact(base) = base else {
            return None;
        };
        if !base.is_positive() {
            return None;
        }
        product = product * to_big(base).pow(k);
    }
    Some(product)
}

/// Divides or multiplies by `interval^(2^j)` so the number of steps grows with the number of
/// digits rather than with the exponent.
fn reduce_big(mut value: BigRational, interval: &BigRational) -> BigRational {
    let one = BigRational::one();
    while &value >= interval {
        let mut factor = interval.clone();
        while value >= &factor * &factor {
            factor = &factor * &factor;
        }
        value = &value / &factor;
    }
    while value < one {
        let mut factor = interval.clone();
        while &value * &factor * &factor < one {
            factor = &factor * &factor;
        }
        value = &value * &factor;
    }
    value
}

fn checked_pow(base: Rational64, k: i32) -> Option<Rational64> {
    let base = if k < 0 {
        if base.is_zero() {
            return None;
        }
        base.recip()
    } else {
        base
    };
    let mut result = Rational64::one();
    for _ in 0..k.unsigned_abs() {
        result = result.checked_mul(&base)?;
    }
    Some(result)
}

fn reduce_exact(mut value: Rational64, interval: Rational64) -> Option<Rational64> {
    let one = Rational64::one();
    if !value.is_positive() {
        return None;
    }
    while value >= interval {
        value = value.checked_div(&interval)?;
    }
    while value < one {
        value = value.checked_mul(&interval)?;
    }
    Some(value)
}

fn reduce_float(mut value: f64, interval: f64) -> f64 {
    while value >= interval {
        value /= interval;
    }
    while value < 1.0 {
        value *= interval;
    }
    value
}

impl Mul for RatioValue {
    type Output = RatioValue;

    fn mul(self, rhs: Self) -> Self::Output {
        if let (Self::Exact(a), Self::Exact(b)) = (self, rhs)
            && let Some(r) = a.checked_mul(&b)
        {
            return Self::Exact(r);
        }
        Self::Float(self.as_float() * rhs.as_float())
    }
}

impl Div for RatioValue {
    type Output = RatioValue;

    fn div(self, rhs: Self) -> Self::Output {
        if let (Self::Exact(a), Self::Exact(b)) = (self, rhs)
            && !b.is_zero()
            && let Some(r) = a.checked_div(&b)
        {
            return Self::Exact(r);
        }
        Self::Float(self.as_float() / rhs.as_float())
    }
}

impl From<f64> for RatioValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Rational64> for RatioValue {
    fn from(value: Rational64) -> Self {
        Self::Exact(value)
    }
}

impl Display for RatioValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(r) if r.is_integer() => write!(f, "{}", r.numer()),
            Self::Exact(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for RatioValue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
