//! INSEE code tables and formats
//! Region codes come from a fixed set; department codes follow `\d{1,3}[ABM]?`

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::ValidationError;

/// Overseas regions (Guadeloupe, Martinique, Guyane, La Réunion, Mayotte)
pub const OVERSEAS_REGION_CODES: [u8; 5] = [1, 2, 3, 4, 5];

/// Metropolitan regions
pub const EU_REGION_CODES: [u8; 13] = [11, 24, 27, 28, 32, 44, 52, 53, 75, 76, 84, 93, 94];

/// Region code → canonical two-digit form
pub static REGION_CODES: LazyLock<HashMap<u8, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    m.insert(1, "01");
    m.insert(2, "02");
    m.insert(3, "03");
    m.insert(4, "04");
    m.insert(5, "05");

    m.insert(11, "11");
    m.insert(24, "24");
    m.insert(27, "27");
    m.insert(28, "28");
    m.insert(32, "32");
    m.insert(44, "44");
    m.insert(52, "52");
    m.insert(53, "53");
    m.insert(75, "75");
    m.insert(76, "76");
    m.insert(84, "84");
    m.insert(93, "93");
    m.insert(94, "94");

    m
});

/// Every valid region code in ascending order
pub fn all_region_codes() -> impl Iterator<Item = RegionCode> {
    OVERSEAS_REGION_CODES
        .into_iter()
        .chain(EU_REGION_CODES)
        .map(RegionCode)
}

/// A region code known to be in [`REGION_CODES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionCode(u8);

impl RegionCode {
    pub fn new(code: u8) -> Result<Self, ValidationError> {
        if REGION_CODES.contains_key(&code) {
            Ok(Self(code))
        } else {
            Err(ValidationError::InvalidRegionCode(code.to_string()))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn canonical(self) -> &'static str {
        REGION_CODES.get(&self.0).copied().unwrap_or("??")
    }
}

/// Accepts both `"1"` and `"01"`
impl FromStr for RegionCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<u8>()
            .map_err(|_| ValidationError::InvalidRegionCode(trimmed.to_string()))
            .and_then(Self::new)
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// Format any stored region code the way the API renders it
pub fn format_region_code(code: i64) -> String {
    format!("{:0>2}", code)
}

/// A department code such as `1`, `75`, `974` or `2A`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DepartmentCode(String);

impl DepartmentCode {
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        if is_department_code(code) {
            Ok(Self(code.to_string()))
        } else {
            Err(ValidationError::InvalidDepartmentCode(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DepartmentCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl fmt::Display for DepartmentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for DepartmentCode {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_department_codes(&self.0, &other.0)
    }
}

impl PartialOrd for DepartmentCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `\d{1,3}[ABM]?`
pub fn is_department_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if !(1..=3).contains(&digits) {
        return false;
    }
    match &bytes[digits..] {
        [] => true,
        [b'A' | b'B' | b'M'] => true,
        _ => false,
    }
}

/// Natural order: numeric prefix first, then suffix (`2` < `2A` < `2B` < `10`).
/// Zero-padded spellings of the same number sort next to each other.
pub fn compare_department_codes(a: &str, b: &str) -> Ordering {
    department_sort_key(a).cmp(&department_sort_key(b))
}

fn department_sort_key(code: &str) -> (u32, &str, &str) {
    let split = code
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(code.len());
    let number = code[..split].parse().unwrap_or(u32::MAX);
    (number, &code[split..], code)
}
