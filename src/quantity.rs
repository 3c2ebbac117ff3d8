use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

const MEBIBYTE: i64 = 1_048_576;
const MAX_DIGITS: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("quantity '{0}' is not a valid Kubernetes quantity")]
    Invalid(String),
    #[error("quantity '{0}' is negative")]
    Negative(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    milli: i64,
}

impl Quantity {
    pub const ZERO: Self = Self { milli: 0 };

    pub fn from_milli(milli: i64) -> Self {
        Self {
            milli: milli.max(0),
        }
    }

    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|error: QuantityError| {
            warn!(%error, "treating quantity as zero");
            Self::ZERO
        })
    }

    pub fn from_kube(quantity: &KubeQuantity) -> Self {
        Self::parse_lenient(&quantity.0)
    }

    pub fn milli_value(self) -> i64 {
        self.milli
    }

    pub fn value(self) -> i64 {
        let whole = self.milli / 1_000;
        if self.milli % 1_000 > 0 {
            whole + 1
        } else {
            whole
        }
    }

    pub fn is_zero(self) -> bool {
        self.milli == 0
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            milli: self.milli.saturating_add(other.milli),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Scaling {
    Decimal(i32),
    Binary(u32),
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let raw = value.trim();
        if raw.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (unsigned, negative) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw.strip_prefix('+').unwrap_or(raw), false),
        };
        let split = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(split);

        let invalid = || QuantityError::Invalid(raw.to_string());
        let (mantissa, scale) = parse_decimal(number).ok_or_else(invalid)?;
        let scaling = suffix_scaling(suffix).ok_or_else(invalid)?;
        if negative && mantissa != 0 {
            return Err(QuantityError::Negative(raw.to_string()));
        }

        Ok(Self::from_milli(scale_to_milli(mantissa, scale, scaling)))
    }
}

fn parse_decimal(number: &str) -> Option<(u128, u32)> {
    let (integer, fraction) = number.split_once('.').unwrap_or((number, ""));
    if integer.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.contains('.') || integer.len() + fraction.len() > MAX_DIGITS {
        return None;
    }

    let mut mantissa = 0u128;
    for digit in integer.bytes().chain(fraction.bytes()) {
        mantissa = mantissa * 10 + u128::from(digit - b'0');
    }
    Some((mantissa, fraction.len() as u32))
}

fn suffix_scaling(suffix: &str) -> Option<Scaling> {
    let scaling = match suffix {
        "" => Scaling::Decimal(0),
        "n" => Scaling::Decimal(-9),
        "u" => Scaling::Decimal(-6),
        "m" => Scaling::Decimal(-3),
        "k" => Scaling::Decimal(3),
        "M" => Scaling::Decimal(6),
        "G" => Scaling::Decimal(9),
        "T" => Scaling::Decimal(12),
        "P" => Scaling::Decimal(15),
        "E" => Scaling::Decimal(18),
        "Ki" => Scaling::Binary(1),
        "Mi" => Scaling::Binary(2),
        "Gi" => Scaling::Binary(3),
        "Ti" => Scaling::Binary(4),
        "Pi" => Scaling::Binary(5),
        "Ei" => Scaling::Binary(6),
        _ => {
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            Scaling::Decimal(exponent.parse().ok()?)
        }
    };
    Some(scaling)
}

fn scale_to_milli(mantissa: u128, scale: u32, scaling: Scaling) -> i64 {
    if mantissa == 0 {
        return 0;
    }

    let mut numerator = mantissa.checked_mul(1_000);
    let mut denominator = 10u128.checked_pow(scale);
    match scaling {
        Scaling::Decimal(exponent) if exponent >= 0 => {
            numerator = numerator.and_then(|n| n.checked_mul(10u128.checked_pow(exponent as u32)?));
        }
        Scaling::Decimal(exponent) => {
            denominator = denominator
                .and_then(|d| d.checked_mul(10u128.checked_pow(exponent.unsigned_abs())?));
        }
        Scaling::Binary(power) => {
            numerator = numerator.and_then(|n| n.checked_mul(1_024u128.checked_pow(power)?));
        }
    }

    match (numerator, denominator) {
        (None, _) => i64::MAX,
        // smaller than anything representable, still rounds up to one milli-unit
        (Some(_), None) => 1,
        (Some(numerator), Some(denominator)) => {
            i64::try_from(numerator.div_ceil(denominator)).unwrap_or(i64::MAX)
        }
    }
}

pub fn calc_percentage(dividend: i64, divisor: i64) -> f64 {
    if divisor > 0 {
        round2(dividend as f64 / divisor as f64 * 100.0)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_fraction(fraction: f64) -> String {
    format!("{fraction}%")
}

/// Numeric part of a rendered cell such as `"91.5%"`, `"512Mi"` or `"250m"`.
pub fn parse_magnitude(display: &str) -> f64 {
    ["%", "Mi", "m"]
        .iter()
        .find_map(|&suffix| display.split_once(suffix).map(|(number, _)| number))
        .and_then(|number| number.trim().parse::<f64>().ok())
        .map(round2)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CpuQuantity(i64);

impl CpuQuantity {
    pub fn new(milli: i64) -> Self {
        Self(milli.max(0))
    }

    pub fn from_quantity(quantity: Quantity) -> Self {
        Self(quantity.milli_value())
    }

    pub fn milli(self) -> i64 {
        self.0
    }

    pub fn percentage_of(self, divisor: Self) -> f64 {
        calc_percentage(self.0, divisor.0)
    }
}

impl Display for CpuQuantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryQuantity(i64);

impl MemoryQuantity {
    pub fn new(bytes: i64) -> Self {
        Self(bytes.max(0))
    }

    pub fn from_quantity(quantity: Quantity) -> Self {
        Self(quantity.value())
    }

    pub fn bytes(self) -> i64 {
        self.0
    }

    pub fn percentage_of(self, divisor: Self) -> f64 {
        calc_percentage(self.0, divisor.0)
    }
}

impl Display for MemoryQuantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Mi", self.0 / MEBIBYTE)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CountQuantity(i64);

impl CountQuantity {
    pub fn new(count: i64) -> Self {
        Self(count.max(0))
    }

    pub fn from_quantity(quantity: Quantity) -> Self {
        Self(quantity.value())
    }

    pub fn count(self) -> i64 {
        self.0
    }

    pub fn percentage_of(self, divisor: Self) -> f64 {
        calc_percentage(self.0, divisor.0)
    }
}

impl Display for CountQuantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
