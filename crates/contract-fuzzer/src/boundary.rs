//! Boundary value rules
//!
//! Each rule is a record describing which schemas it applies to, which
//! constraint it needs, and how it derives a value at or just past that
//! constraint. The boundary fuzzers are instantiated from [`BOUNDARY_RULES`].

use api_contract::{HttpMethod, Schema, SchemaKind};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;

/// `maxLength` above this is treated as "no usable boundary"
pub const MAX_GENERATED_LENGTH: u64 = 1_048_576;

/// Decimals of the offset applied to decimal bounds (0.01)
const DECIMAL_STEP_SCALE: usize = 2;

/// Exponents past this are not expanded into plain digits
const MAX_EXPONENT: u64 = 1024;

/// Formats with a known invalid sample
const KNOWN_FORMATS: [&str; 8] = [
    "date",
    "date-time",
    "email",
    "uuid",
    "uri",
    "ipv4",
    "ipv6",
    "byte",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryDirection {
    /// Below the lowest accepted value or length
    Left,
    /// Above the highest accepted value or length
    Right,
    /// A literal of another primitive kind
    WrongType,
    /// A value breaking the declared `format`
    Format,
}

pub struct BoundaryRule {
    pub name: &'static str,
    pub description: &'static str,
    pub applies_to: &'static [SchemaKind],
    pub direction: BoundaryDirection,
    /// Primitive kind every produced value parses as
    pub emits: SchemaKind,
    pub skip_for: &'static [HttpMethod],
    defined: fn(&Schema) -> bool,
    compute: fn(&Schema) -> Option<String>,
}

impl BoundaryRule {
    /// Whether the schema's kind is one this rule targets
    pub fn matches(&self, schema: &Schema) -> bool {
        schema
            .effective_kind()
            .map(|kind| self.applies_to.contains(&kind))
            .unwrap_or(false)
    }

    /// Whether the schema carries the constraint this rule needs
    pub fn is_defined(&self, schema: &Schema) -> bool {
        (self.defined)(schema)
    }

    /// Boundary value for `schema`, or `None` when no boundary exists
    pub fn value(&self, schema: &Schema) -> Option<String> {
        if self.matches(schema) && self.is_defined(schema) {
            (self.compute)(schema)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for BoundaryRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryRule")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("applies_to", &self.applies_to)
            .finish()
    }
}

const INTEGER: &[SchemaKind] = &[SchemaKind::Integer];
const NUMBER: &[SchemaKind] = &[SchemaKind::Number];
const NUMERIC: &[SchemaKind] = &[SchemaKind::Integer, SchemaKind::Number];
const STRING: &[SchemaKind] = &[SchemaKind::String];
const BOOLEAN: &[SchemaKind] = &[SchemaKind::Boolean];

pub static BOUNDARY_RULES: &[BoundaryRule] = &[
    BoundaryRule {
        name: "IntegerFieldsLeftBoundaryFuzzer",
        description: "iterate through each Integer field and send values smaller than the minimum representable integer",
        applies_to: INTEGER,
        direction: BoundaryDirection::Left,
        emits: SchemaKind::Integer,
        skip_for: &[],
        defined: always,
        compute: integer_left_boundary,
    },
    BoundaryRule {
        name: "IntegerFieldsRightBoundaryFuzzer",
        description: "iterate through each Integer field and send values larger than the maximum representable integer",
        applies_to: INTEGER,
        direction: BoundaryDirection::Right,
        emits: SchemaKind::Integer,
        skip_for: &[],
        defined: always,
        compute: integer_right_boundary,
    },
    BoundaryRule {
        name: "DecimalFieldsLeftBoundaryFuzzer",
        description: "iterate through each Number field (float or double) and send values smaller than the minimum representable decimal",
        applies_to: NUMBER,
        direction: BoundaryDirection::Left,
        emits: SchemaKind::Number,
        skip_for: &[],
        defined: always,
        compute: decimal_left_boundary,
    },
    BoundaryRule {
        name: "DecimalFieldsRightBoundaryFuzzer",
        description: "iterate through each Number field (float or double) and send values larger than the maximum representable decimal",
        applies_to: NUMBER,
        direction: BoundaryDirection::Right,
        emits: SchemaKind::Number,
        skip_for: &[],
        defined: always,
        compute: decimal_right_boundary,
    },
    BoundaryRule {
        name: "IntegerFieldsBelowMinimumFuzzer",
        description: "iterate through each Integer field with a declared minimum and send the first value below it",
        applies_to: INTEGER,
        direction: BoundaryDirection::Left,
        emits: SchemaKind::Integer,
        skip_for: &[],
        defined: has_minimum,
        compute: integer_below_minimum,
    },
    BoundaryRule {
        name: "IntegerFieldsAboveMaximumFuzzer",
        description: "iterate through each Integer field with a declared maximum and send the first value above it",
        applies_to: INTEGER,
        direction: BoundaryDirection::Right,
        emits: SchemaKind::Integer,
        skip_for: &[],
        defined: has_maximum,
        compute: integer_above_maximum,
    },
    BoundaryRule {
        name: "DecimalFieldsBelowMinimumFuzzer",
        description: "iterate through each Number field with a declared minimum and send a value just below it",
        applies_to: NUMBER,
        direction: BoundaryDirection::Left,
        emits: SchemaKind::Number,
        skip_for: &[],
        defined: has_minimum,
        compute: decimal_below_minimum,
    },
    BoundaryRule {
        name: "DecimalFieldsAboveMaximumFuzzer",
        description: "iterate through each Number field with a declared maximum and send a value just above it",
        applies_to: NUMBER,
        direction: BoundaryDirection::Right,
        emits: SchemaKind::Number,
        skip_for: &[],
        defined: has_maximum,
        compute: decimal_above_maximum,
    },
    BoundaryRule {
        name: "StringFieldsLeftBoundaryFuzzer",
        description: "iterate through each String field with a positive minLength and send values one character shorter",
        applies_to: STRING,
        direction: BoundaryDirection::Left,
        emits: SchemaKind::String,
        skip_for: &[],
        defined: has_positive_min_length,
        compute: string_left_boundary,
    },
    BoundaryRule {
        name: "StringFieldsRightBoundaryFuzzer",
        description: "iterate through each String field with a maxLength and send values one character longer",
        applies_to: STRING,
        direction: BoundaryDirection::Right,
        emits: SchemaKind::String,
        skip_for: &[],
        defined: has_max_length,
        compute: string_right_boundary,
    },
    BoundaryRule {
        name: "StringsInNumericFieldsFuzzer",
        description: "iterate through each Integer and Number field and send string values",
        applies_to: NUMERIC,
        direction: BoundaryDirection::WrongType,
        emits: SchemaKind::String,
        skip_for: &[],
        defined: always,
        compute: string_instead_of_number,
    },
    BoundaryRule {
        name: "StringsInBooleanFieldsFuzzer",
        description: "iterate through each Boolean field and send string values",
        applies_to: BOOLEAN,
        direction: BoundaryDirection::WrongType,
        emits: SchemaKind::String,
        skip_for: &[],
        defined: always,
        compute: string_instead_of_boolean,
    },
    BoundaryRule {
        name: "InvalidValuesInFormattedFieldsFuzzer",
        description: "iterate through each String field with a known format (date, email, uuid, ...) and send values violating it",
        applies_to: STRING,
        direction: BoundaryDirection::Format,
        emits: SchemaKind::String,
        skip_for: &[],
        defined: has_known_format,
        compute: invalid_format_value,
    },
];

/// Look up a rule by fuzzer name
pub fn rule(name: &str) -> Option<&'static BoundaryRule> {
    BOUNDARY_RULES.iter().find(|r| r.name == name)
}

// ============================================================================
// Constraint checks
// ============================================================================

fn always(_: &Schema) -> bool {
    true
}

fn has_minimum(schema: &Schema) -> bool {
    exact_bound(schema.minimum.as_ref()).is_some()
}

fn has_maximum(schema: &Schema) -> bool {
    exact_bound(schema.maximum.as_ref()).is_some()
}

/// A finite bound in exact decimal form
fn exact_bound(bound: Option<&Number>) -> Option<Decimal> {
    let bound = bound?;
    let finite = bound
        .to_string()
        .parse::<f64>()
        .map(f64::is_finite)
        .unwrap_or(false);
    if finite {
        Decimal::parse(&bound.to_string())
    } else {
        None
    }
}

fn has_positive_min_length(schema: &Schema) -> bool {
    schema.min_length.map(|n| n > 0).unwrap_or(false)
}

fn has_max_length(schema: &Schema) -> bool {
    schema
        .max_length
        .map(|n| n < MAX_GENERATED_LENGTH)
        .unwrap_or(false)
}

fn has_known_format(schema: &Schema) -> bool {
    schema
        .format
        .as_deref()
        .map(|f| KNOWN_FORMATS.contains(&f))
        .unwrap_or(false)
}

// ============================================================================
// Value algorithms
// ============================================================================

fn is_int32(schema: &Schema) -> bool {
    schema.format.as_deref() == Some("int32")
}

fn is_float(schema: &Schema) -> bool {
    schema.format.as_deref() == Some("float")
}

fn integer_left_boundary(schema: &Schema) -> Option<String> {
    let min = if is_int32(schema) {
        i32::MIN as i128
    } else {
        i64::MIN as i128
    };
    Some((min - 1).to_string())
}

fn integer_right_boundary(schema: &Schema) -> Option<String> {
    let max = if is_int32(schema) {
        i32::MAX as i128
    } else {
        i64::MAX as i128
    };
    Some((max + 1).to_string())
}

fn decimal_left_boundary(schema: &Schema) -> Option<String> {
    decimal_right_boundary(schema).map(|v| format!("-{}", v))
}

fn decimal_right_boundary(schema: &Schema) -> Option<String> {
    let max = if is_float(schema) {
        f32::MAX as f64
    } else {
        f64::MAX
    };
    Some(one_past(max))
}

/// Integer literal of `max` plus one unit in its last digit, e.g.
/// `f64::MAX` → `17976931348623157000...0001`
fn one_past(max: f64) -> String {
    let scientific = format!("{:e}", max);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let width = exponent.parse::<usize>().unwrap_or(0) + 1;
    let mut digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() >= width {
        // not reachable for f32/f64 extremes, keep a valid literal anyway
        return format!("{}1", digits);
    }
    digits.extend(std::iter::repeat('0').take(width - digits.len() - 1));
    digits.push('1');
    digits
}

fn integer_below_minimum(schema: &Schema) -> Option<String> {
    let min = exact_bound(schema.minimum.as_ref())?;
    let whole = min.trunc();
    let value = if min.is_integral() {
        if schema.exclusive_minimum {
            whole
        } else {
            whole.add(&Decimal::one(0).negated())
        }
    } else if min.negative {
        // ceil(min) - 1 for a negative fraction
        whole.add(&Decimal::one(0).negated())
    } else {
        whole
    };
    Some(value.to_string())
}

fn integer_above_maximum(schema: &Schema) -> Option<String> {
    let max = exact_bound(schema.maximum.as_ref())?;
    let whole = max.trunc();
    let value = if max.is_integral() {
        if schema.exclusive_maximum {
            whole
        } else {
            whole.add(&Decimal::one(0))
        }
    } else if max.negative {
        // floor(max) + 1 for a negative fraction
        whole
    } else {
        whole.add(&Decimal::one(0))
    };
    Some(value.to_string())
}

fn decimal_below_minimum(schema: &Schema) -> Option<String> {
    let min = exact_bound(schema.minimum.as_ref())?;
    if schema.exclusive_minimum {
        return schema.minimum.as_ref().map(Number::to_string);
    }
    Some(step_past(&min, true).to_string())
}

fn decimal_above_maximum(schema: &Schema) -> Option<String> {
    let max = exact_bound(schema.maximum.as_ref())?;
    if schema.exclusive_maximum {
        return schema.maximum.as_ref().map(Number::to_string);
    }
    Some(step_past(&max, false).to_string())
}

/// `bound` moved by 0.01, printed with two more decimals than the bound
fn step_past(bound: &Decimal, downward: bool) -> Decimal {
    let scale = bound.scale + DECIMAL_STEP_SCALE;
    let step = Decimal::one(DECIMAL_STEP_SCALE);
    let step = if downward { step.negated() } else { step };
    bound.rescale(scale).add(&step)
}

// ============================================================================
// Exact decimal text
// ============================================================================

/// Signed decimal kept as digit text, so bounds of any size stay exact
#[derive(Debug, Clone, PartialEq, Eq)]
struct Decimal {
    negative: bool,
    /// Unscaled magnitude without leading zeros
    digits: String,
    /// Digits after the decimal point
    scale: usize,
}

impl Decimal {
    /// Parse a JSON number literal
    fn parse(text: &str) -> Option<Self> {
        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(at) => (&unsigned[..at], unsigned[at + 1..].parse::<i64>().ok()?),
            None => (unsigned, 0),
        };
        if exponent.unsigned_abs() > MAX_EXPONENT {
            return None;
        }
        let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
            return None;
        }

        let mut digits = format!("{}{}", whole, fraction);
        let mut scale = fraction.len() as i64 - exponent;
        if scale < 0 {
            digits.extend(std::iter::repeat('0').take((-scale) as usize));
            scale = 0;
        }
        Some(Self::new(negative, digits, scale as usize))
    }

    fn new(negative: bool, digits: String, scale: usize) -> Self {
        let trimmed = digits.trim_start_matches('0');
        let digits = if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        };
        let negative = negative && digits != "0";
        Self {
            negative,
            digits,
            scale,
        }
    }

    /// `10^-scale`
    fn one(scale: usize) -> Self {
        Self::new(false, "1".to_string(), scale)
    }

    fn negated(&self) -> Self {
        Self::new(!self.negative, self.digits.clone(), self.scale)
    }

    /// Same value with at least `scale` decimals
    fn rescale(&self, scale: usize) -> Self {
        if scale <= self.scale {
            return self.clone();
        }
        let mut digits = self.digits.clone();
        digits.extend(std::iter::repeat('0').take(scale - self.scale));
        Self::new(self.negative, digits, scale)
    }

    fn padded(&self) -> String {
        let width = self.scale + 1;
        if self.digits.len() < width {
            format!("{}{}", "0".repeat(width - self.digits.len()), self.digits)
        } else {
            self.digits.clone()
        }
    }

    fn is_integral(&self) -> bool {
        let padded = self.padded();
        padded[padded.len() - self.scale..].chars().all(|c| c == '0')
    }

    /// Integer part, rounded toward zero
    fn trunc(&self) -> Self {
        let padded = self.padded();
        Self::new(self.negative, padded[..padded.len() - self.scale].to_string(), 0)
    }

    fn add(&self, other: &Self) -> Self {
        let scale = self.scale.max(other.scale);
        let (a, b) = (self.rescale(scale), other.rescale(scale));
        if a.negative == b.negative {
            return Self::new(a.negative, add_magnitudes(&a.digits, &b.digits), scale);
        }
        match compare_magnitudes(&a.digits, &b.digits) {
            Ordering::Less => Self::new(b.negative, sub_magnitudes(&b.digits, &a.digits), scale),
            _ => Self::new(a.negative, sub_magnitudes(&a.digits, &b.digits), scale),
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        if self.scale == 0 {
            return write!(f, "{}", self.digits);
        }
        let padded = self.padded();
        let (whole, fraction) = padded.split_at(padded.len() - self.scale);
        write!(f, "{}.{}", whole, fraction)
    }
}

fn compare_magnitudes(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn add_magnitudes(a: &str, b: &str) -> String {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut carry = 0;
    for i in 0..a.len().max(b.len()) {
        let x = if i < a.len() { a[a.len() - 1 - i] - b'0' } else { 0 };
        let y = if i < b.len() { b[b.len() - 1 - i] - b'0' } else { 0 };
        let sum = x + y + carry;
        out.push(b'0' + sum % 10);
        carry = sum / 10;
    }
    if carry > 0 {
        out.push(b'0' + carry);
    }
    out.iter().rev().map(|&d| d as char).collect()
}

/// `a - b` for `a >= b`
fn sub_magnitudes(a: &str, b: &str) -> String {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut out = Vec::with_capacity(a.len());
    let mut borrow = 0;
    for i in 0..a.len() {
        let x = (a[a.len() - 1 - i] - b'0') as i8;
        let y = if i < b.len() { (b[b.len() - 1 - i] - b'0') as i8 } else { 0 };
        let mut diff = x - y - borrow;
        borrow = 0;
        if diff < 0 {
            diff += 10;
            borrow = 1;
        }
        out.push(b'0' + diff as u8);
    }
    out.iter().rev().map(|&d| d as char).collect()
}

fn string_left_boundary(schema: &Schema) -> Option<String> {
    let min = schema.min_length?;
    Some("a".repeat(min.saturating_sub(1) as usize))
}

fn string_right_boundary(schema: &Schema) -> Option<String> {
    let max = schema.max_length?;
    Some("a".repeat(max as usize + 1))
}

fn string_instead_of_number(_: &Schema) -> Option<String> {
    Some("fuzzString".to_string())
}

fn string_instead_of_boolean(_: &Schema) -> Option<String> {
    Some("notABoolean".to_string())
}

fn invalid_format_value(schema: &Schema) -> Option<String> {
    let value = match schema.format.as_deref()? {
        "date" => "2021-13-45",
        "date-time" => "2021-13-45T25:61:61Z",
        "email" => "missing.at.sign.example.com",
        "uuid" => "not-a-uuid-0000",
        "uri" => "://missing-scheme",
        "ipv4" => "256.256.256.256",
        "ipv6" => "::gggg",
        "byte" => "!!not-base64!!",
        _ => return None,
    };
    Some(value.to_string())
}

/// Whether `value` is a literal of `kind`
pub fn parses_as(kind: SchemaKind, value: &str) -> bool {
    match kind {
        SchemaKind::Integer => {
            let digits = value.strip_prefix('-').unwrap_or(value);
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        }
        SchemaKind::Number => serde_json::from_str::<Value>(value)
            .map(|v| v.is_number())
            .unwrap_or(false),
        SchemaKind::Boolean => value == "true" || value == "false",
        SchemaKind::String => true,
        SchemaKind::Array | SchemaKind::Object => false,
    }
}
