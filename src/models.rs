use serde::Deserialize;

use crate::codes::{DepartmentCode, RegionCode};
use crate::error::ValidationError;

/// Raw record from the towns CSV file
#[derive(Debug, Clone, Deserialize)]
pub struct CsvRecord {
    pub region_code: String,
    pub region_name: String,
    pub department_code: String,
    pub district_code: String,
    pub town_code: String,
    pub town_name: String,
    #[serde(default)]
    pub population: String,
}

/// A CSV record with its numeric columns parsed.
///
/// Codes are only parsed here, not checked against their constraints:
/// that happens when the corresponding entity is first created.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub region_code: u8,
    pub region_name: String,
    pub department_code: String,
    pub district_code: u16,
    pub town_code: u16,
    pub town_name: String,
    pub population: u32,
}

impl CsvRecord {
    pub fn to_import_row(&self) -> Result<ImportRow, ValidationError> {
        let region_code = self.region_code.trim();
        let region_code = region_code
            .parse()
            .map_err(|_| ValidationError::InvalidRegionCode(region_code.to_string()))?;

        Ok(ImportRow {
            region_code,
            region_name: self.region_name.trim().to_string(),
            department_code: self.department_code.trim().to_string(),
            district_code: parse_code("district_code", &self.district_code)?,
            town_code: parse_code("town_code", &self.town_code)?,
            town_name: self.town_name.trim().to_string(),
            population: clean_population(&self.population)?,
        })
    }
}

fn parse_code(field: &'static str, value: &str) -> Result<u16, ValidationError> {
    value.trim().parse().map_err(|_| ValidationError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Normalise a population column: thousands separators are dropped and an
/// empty cell counts as zero (`"1,234"` → 1234, `""` → 0)
pub fn clean_population(raw: &str) -> Result<u32, ValidationError> {
    let digits: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse().map_err(|_| ValidationError::InvalidNumber {
        field: "population",
        value: raw.to_string(),
    })
}

fn require_name(field: &'static str, name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(name.to_string())
    }
}

/// Root of the hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub code: RegionCode,
    pub name: String,
}

impl Region {
    pub fn new(code: u8, name: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            code: RegionCode::new(code)?,
            name: require_name("region_name", name)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Department {
    pub code: DepartmentCode,
    pub region_code: u8,
}

impl Department {
    pub fn new(code: &str, region_code: u8) -> Result<Self, ValidationError> {
        Ok(Self {
            code: DepartmentCode::new(code)?,
            region_code,
        })
    }
}

/// District codes are only unique within their department
#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub code: u16,
    pub department_code: String,
    pub region_code: u8,
}

/// Town codes are only unique within their district
#[derive(Debug, Clone, PartialEq)]
pub struct Town {
    pub code: u16,
    pub name: String,
    pub population: u32,
    pub district_code: u16,
    pub department_code: String,
    pub region_code: u8,
}

impl Town {
    pub fn new(row: &ImportRow) -> Result<Self, ValidationError> {
        Ok(Self {
            code: row.town_code,
            name: require_name("town_name", &row.town_name)?,
            population: row.population,
            district_code: row.district_code,
            department_code: row.department_code.clone(),
            region_code: row.region_code,
        })
    }
}
