use crate::error::{AlertError, Result};
use crate::units::parse_size;
use disku_common::types::DiskUsage;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

// Percentages are limited to 0%, 1-99% and 100%; sizes only take K..P.
static CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<var>\w+)\s*(?P<op>[<>]=?|==)\s*(?P<val>100%|0%|[1-9]\d?%|[1-9]\d*[KMGTP]?)$",
    )
    .expect("condition regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Equal,
}

impl FromStr for CompareOp {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessEqual),
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::GreaterEqual),
            "==" => Ok(Self::Equal),
            _ => Err(AlertError::parse("operator", s)),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
        };
        f.write_str(symbol)
    }
}

impl CompareOp {
    pub fn check<T: PartialOrd>(self, value: T, threshold: T) -> bool {
        match self {
            Self::LessThan => value < threshold,
            Self::LessEqual => value <= threshold,
            Self::GreaterThan => value > threshold,
            Self::GreaterEqual => value >= threshold,
            Self::Equal => value == threshold,
        }
    }
}

/// The disk usage field a condition looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Used,
    Free,
    Total,
}

impl FromStr for Variable {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "used" => Ok(Self::Used),
            "free" => Ok(Self::Free),
            "total" => Ok(Self::Total),
            _ => Err(AlertError::parse("variable", s)),
        }
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Used => write!(f, "used"),
            Self::Free => write!(f, "free"),
            Self::Total => write!(f, "total"),
        }
    }
}

impl Variable {
    fn bytes(self, usage: &DiskUsage) -> u64 {
        match self {
            Self::Used => usage.used,
            Self::Free => usage.free,
            Self::Total => usage.total,
        }
    }

    fn ratio(self, usage: &DiskUsage) -> f64 {
        match self {
            Self::Used => usage.used_ratio(),
            Self::Free => usage.free_ratio(),
            Self::Total => usage.total as f64 / usage.total as f64,
        }
    }
}

/// Right-hand side of a condition. A percentage literal becomes a
/// [`Threshold::Ratio`] and is compared against `field / total`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Bytes(u64),
    Ratio(f64),
}

/// A single `variable operator threshold` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub variable: Variable,
    pub operator: CompareOp,
    pub threshold: Threshold,
    /// The clause as written in the configuration, e.g. `"FREE   <\t 5G"`.
    pub raw: String,
}

impl FromStr for Condition {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = CONDITION
            .captures(s)
            .ok_or_else(|| AlertError::parse("condition", s))?;

        let value = &caps["val"];
        let threshold = match value.strip_suffix('%') {
            Some(percent) => Threshold::Ratio(
                percent
                    .parse::<u32>()
                    .map_err(|_| AlertError::parse("condition", s))? as f64
                    / 100.0,
            ),
            None => Threshold::Bytes(parse_size(value)?),
        };

        Ok(Self {
            variable: caps["var"].parse()?,
            operator: caps["op"].parse()?,
            threshold,
            raw: s.to_string(),
        })
    }
}

impl Condition {
    pub fn matches(&self, usage: &DiskUsage) -> bool {
        match self.threshold {
            Threshold::Bytes(bytes) => self.operator.check(self.variable.bytes(usage), bytes),
            Threshold::Ratio(ratio) => self.operator.check(self.variable.ratio(usage), ratio),
        }
    }
}

/// An ordered list of conditions evaluated first-match-wins.
///
/// Built once from configuration and never mutated afterwards, so it can be
/// shared freely between concurrent report handlers.
///
/// # Examples
///
/// ```
/// use disku_alert::AlertCheck;
/// use disku_common::types::DiskUsage;
///
/// let check: AlertCheck = "FREE < 5G, USED > 95%".parse().unwrap();
/// let gib = 1u64 << 30;
/// let usage = DiskUsage { total: 100 * gib, used: 97 * gib, free: 3 * gib };
/// assert_eq!(check.evaluate(&usage), Some("FREE < 5G"));
/// ```
#[derive(Debug, Clone)]
pub struct AlertCheck {
    conditions: Vec<Condition>,
}

impl FromStr for AlertCheck {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AlertCheck {
    /// Parses a comma-separated list of conditions. Fails as a whole if any
    /// single condition is malformed.
    pub fn parse(source: &str) -> Result<Self> {
        let conditions = source
            .split(',')
            .map(str::trim)
            .map(|fragment| -> Result<Condition> {
                let cond = fragment.parse::<Condition>().inspect_err(|e| {
                    tracing::error!(condition = fragment, error = %e, "Can not parse condition");
                })?;
                tracing::debug!(
                    variable = %cond.variable,
                    operator = %cond.operator,
                    threshold = ?cond.threshold,
                    "Parsed condition"
                );
                Ok(cond)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { conditions })
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns the raw text of the first condition that holds for `usage`.
    pub fn evaluate(&self, usage: &DiskUsage) -> Option<&str> {
        self.conditions
            .iter()
            .find(|cond| cond.matches(usage))
            .map(|cond| cond.raw.as_str())
    }

    /// Validates a raw JSON sample and evaluates it.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::InvalidSample`] if the sample is missing a field.
    pub fn check(&self, sample: &Value) -> Result<Option<&str>> {
        let usage = parse_sample(sample)?;
        Ok(self.evaluate(&usage))
    }
}

/// Reads `total`, `used` and `free` (keys matched case-insensitively) from a
/// JSON object.
pub fn parse_sample(sample: &Value) -> Result<DiskUsage> {
    let object = sample
        .as_object()
        .ok_or_else(|| AlertError::InvalidSample(format!("expected an object, got {sample}")))?;

    let fields: HashMap<String, &Value> = object
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();

    let field = |name: &str| -> Result<u64> {
        let value = fields
            .get(name)
            .ok_or_else(|| AlertError::InvalidSample(format!("missing field '{name}'")))?;
        value.as_u64().ok_or_else(|| {
            AlertError::InvalidSample(format!(
                "field '{name}' is not a non-negative integer: {value}"
            ))
        })
    };

    Ok(DiskUsage {
        total: field("total")?,
        used: field("used")?,
        free: field("free")?,
    })
}
