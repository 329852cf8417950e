//! Static capability table for the datasets this crate can query.
//!
//! Everything that differs between products (API path, whether values carry a
//! margin of error, how variable codes are suffixed on the wire, which
//! geographies and years exist) is declared here instead of being inferred
//! from the shape of variable codes.

use crate::geography::Geography;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Census API limit on `get` fields per request.
pub const MAX_FIELDS_PER_REQUEST: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dataset {
    Acs1,
    Acs3,
    Acs5,
    Acs1Subject,
    Acs5Subject,
    Acs1Profile,
    Acs5Profile,
    DecennialPl,
    DecennialSf1,
    DecennialDhc,
    Estimates,
    EstimatesCharacteristics,
    Flows,
}

/// What one requested variable turns into in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureKind {
    /// A single count (decennial style).
    Count,
    /// Estimate plus margin of error (survey style).
    Estimate,
}

/// How a bare variable code is spelled in the `get` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireSuffix {
    /// `B01003_001` -> `B01003_001`
    None,
    /// `B01003_001` -> `B01003_001E`, `B01003_001M`
    EstimateMargin,
    /// `MOVEDIN` -> `MOVEDIN`, `MOVEDIN_M`
    Flows,
}

impl WireSuffix {
    /// Wire field names for one variable: the value/estimate field and, when
    /// present, the margin field.
    pub fn fields(self, code: &str) -> (String, Option<String>) {
        match self {
            WireSuffix::None => (code.to_string(), None),
            WireSuffix::EstimateMargin => (format!("{code}E"), Some(format!("{code}M"))),
            WireSuffix::Flows => (code.to_string(), Some(format!("{code}_M"))),
        }
    }

    pub fn fields_per_variable(self) -> usize {
        match self {
            WireSuffix::None => 1,
            WireSuffix::EstimateMargin | WireSuffix::Flows => 2,
        }
    }
}

/// One row of the capability table.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSpec {
    pub path: &'static str,
    pub measure: MeasureKind,
    pub suffix: WireSuffix,
    pub name_field: &'static str,
    /// Fields requested on every call that identify a row beyond its geography.
    pub dimension_fields: &'static [&'static str],
    pub breakdowns: &'static [&'static str],
    pub geographies: &'static [Geography],
    pub max_fields: usize,
}

const ACS_GEOGRAPHIES: &[Geography] = &[
    Geography::Us,
    Geography::Region,
    Geography::Division,
    Geography::State,
    Geography::County,
    Geography::CountySubdivision,
    Geography::Tract,
    Geography::BlockGroup,
    Geography::Place,
    Geography::Zcta,
    Geography::CongressionalDistrict,
    Geography::Cbsa,
    Geography::Puma,
    Geography::SchoolDistrictUnified,
    Geography::StateLegislativeUpper,
    Geography::StateLegislativeLower,
];

// Only areas above the 65,000 population threshold are published.
const ACS1_GEOGRAPHIES: &[Geography] = &[
    Geography::Us,
    Geography::Region,
    Geography::Division,
    Geography::State,
    Geography::County,
    Geography::Place,
    Geography::CongressionalDistrict,
    Geography::Cbsa,
    Geography::Puma,
    Geography::SchoolDistrictUnified,
];

const ACS3_GEOGRAPHIES: &[Geography] = &[
    Geography::Us,
    Geography::Region,
    Geography::Division,
    Geography::State,
    Geography::County,
    Geography::CountySubdivision,
    Geography::Place,
    Geography::CongressionalDistrict,
    Geography::Cbsa,
    Geography::Puma,
    Geography::SchoolDistrictUnified,
];

const DECENNIAL_GEOGRAPHIES: &[Geography] = &Geography::ALL;

const ESTIMATES_GEOGRAPHIES: &[Geography] = &[
    Geography::Us,
    Geography::Region,
    Geography::Division,
    Geography::State,
    Geography::County,
    Geography::Place,
    Geography::Cbsa,
];

const FLOWS_GEOGRAPHIES: &[Geography] = &[
    Geography::County,
    Geography::CountySubdivision,
    Geography::Cbsa,
];

// Identifier and geography columns listed in decennial and PEP catalogs.
const IDENTIFIER_FIELDS: &[&str] = &[
    "NAME", "GEO_ID", "GEOID", "GEOCOMP", "SUMLEVEL", "SUMLEV", "UCGID", "LSAD_NAME",
    "GEONAME", "UNIVERSE", "DATE_CODE", "DATE_DESC", "LASTUPDATE", "US", "REGION",
    "DIVISION", "STATE", "COUNTY", "COUSUB", "PLACE", "TRACT", "BLKGRP", "BLOCK", "CBSA",
];

const fn acs(path: &'static str, geographies: &'static [Geography]) -> DatasetSpec {
    DatasetSpec {
        path,
        measure: MeasureKind::Estimate,
        suffix: WireSuffix::EstimateMargin,
        name_field: "NAME",
        dimension_fields: &[],
        breakdowns: &[],
        geographies,
        max_fields: MAX_FIELDS_PER_REQUEST,
    }
}

const fn decennial(path: &'static str) -> DatasetSpec {
    DatasetSpec {
        path,
        measure: MeasureKind::Count,
        suffix: WireSuffix::None,
        name_field: "NAME",
        dimension_fields: &[],
        breakdowns: &[],
        geographies: DECENNIAL_GEOGRAPHIES,
        max_fields: MAX_FIELDS_PER_REQUEST,
    }
}

impl Dataset {
    pub const ALL: [Dataset; 13] = [
        Dataset::Acs1,
        Dataset::Acs3,
        Dataset::Acs5,
        Dataset::Acs1Subject,
        Dataset::Acs5Subject,
        Dataset::Acs1Profile,
        Dataset::Acs5Profile,
        Dataset::DecennialPl,
        Dataset::DecennialSf1,
        Dataset::DecennialDhc,
        Dataset::Estimates,
        Dataset::EstimatesCharacteristics,
        Dataset::Flows,
    ];

    pub fn spec(self) -> DatasetSpec {
        match self {
            Dataset::Acs1 => acs("acs/acs1", ACS1_GEOGRAPHIES),
            Dataset::Acs3 => acs("acs/acs3", ACS3_GEOGRAPHIES),
            Dataset::Acs5 => acs("acs/acs5", ACS_GEOGRAPHIES),
            Dataset::Acs1Subject => acs("acs/acs1/subject", ACS1_GEOGRAPHIES),
            Dataset::Acs5Subject => acs("acs/acs5/subject", ACS_GEOGRAPHIES),
            Dataset::Acs1Profile => acs("acs/acs1/profile", ACS1_GEOGRAPHIES),
            Dataset::Acs5Profile => acs("acs/acs5/profile", ACS_GEOGRAPHIES),
            Dataset::DecennialPl => decennial("dec/pl"),
            Dataset::DecennialSf1 => decennial("dec/sf1"),
            Dataset::DecennialDhc => decennial("dec/dhc"),
            Dataset::Estimates => DatasetSpec {
                path: "pep/population",
                measure: MeasureKind::Count,
                suffix: WireSuffix::None,
                name_field: "NAME",
                dimension_fields: &[],
                breakdowns: &[],
                geographies: ESTIMATES_GEOGRAPHIES,
                max_fields: MAX_FIELDS_PER_REQUEST,
            },
            Dataset::EstimatesCharacteristics => DatasetSpec {
                path: "pep/charagegroups",
                measure: MeasureKind::Count,
                suffix: WireSuffix::None,
                name_field: "NAME",
                dimension_fields: &[],
                breakdowns: &["AGEGROUP", "SEX", "HISP", "RACE"],
                geographies: ESTIMATES_GEOGRAPHIES,
                max_fields: MAX_FIELDS_PER_REQUEST,
            },
            Dataset::Flows => DatasetSpec {
                path: "acs/flows",
                measure: MeasureKind::Estimate,
                suffix: WireSuffix::Flows,
                name_field: "FULL1_NAME",
                dimension_fields: &["GEOID2", "FULL2_NAME"],
                breakdowns: &[],
                geographies: FLOWS_GEOGRAPHIES,
                max_fields: MAX_FIELDS_PER_REQUEST,
            },
        }
    }

    /// Short tag accepted by [`FromStr`] and printed by [`Display`](fmt::Display).
    pub fn tag(self) -> &'static str {
        match self {
            Dataset::Acs1 => "acs1",
            Dataset::Acs3 => "acs3",
            Dataset::Acs5 => "acs5",
            Dataset::Acs1Subject => "acs1/subject",
            Dataset::Acs5Subject => "acs5/subject",
            Dataset::Acs1Profile => "acs1/profile",
            Dataset::Acs5Profile => "acs5/profile",
            Dataset::DecennialPl => "dec/pl",
            Dataset::DecennialSf1 => "dec/sf1",
            Dataset::DecennialDhc => "dec/dhc",
            Dataset::Estimates => "pep/population",
            Dataset::EstimatesCharacteristics => "pep/charagegroups",
            Dataset::Flows => "flows",
        }
    }

    /// Whether the product was published for `year`.
    pub fn has_year(self, year: i32) -> bool {
        match self {
            Dataset::Acs1 | Dataset::Acs1Subject | Dataset::Acs1Profile => {
                year >= 2005 && year != 2020
            }
            Dataset::Acs3 => (2007..=2013).contains(&year),
            Dataset::Acs5 | Dataset::Acs5Subject | Dataset::Acs5Profile => year >= 2009,
            Dataset::DecennialPl => matches!(year, 2000 | 2010 | 2020),
            Dataset::DecennialSf1 => matches!(year, 2000 | 2010),
            Dataset::DecennialDhc => year == 2020,
            Dataset::Estimates | Dataset::EstimatesCharacteristics => {
                (2015..=2019).contains(&year)
            }
            Dataset::Flows => year >= 2010,
        }
    }

    pub fn supports(self, geography: Geography) -> bool {
        self.spec().geographies.contains(&geography)
    }

    /// Decide whether a raw `variables.json` entry is a requestable variable
    /// and, if so, return the code callers should use for it.
    pub fn catalog_code(self, wire_code: &str, group: Option<&str>) -> Option<String> {
        if matches!(wire_code, "for" | "in" | "ucgid") {
            return None;
        }
        match self.spec().suffix {
            WireSuffix::EstimateMargin => {
                let grouped = group.is_some_and(|g| !g.is_empty() && g != "N/A");
                if !grouped {
                    return None;
                }
                wire_code.strip_suffix('E').map(str::to_string)
            }
            WireSuffix::Flows => {
                if wire_code.ends_with("_M") {
                    None
                } else {
                    Some(wire_code.to_string())
                }
            }
            WireSuffix::None => {
                let spec = self.spec();
                let descriptive = IDENTIFIER_FIELDS.contains(&wire_code)
                    || wire_code == spec.name_field
                    || spec.breakdowns.contains(&wire_code);
                (!descriptive).then(|| wire_code.to_string())
            }
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        let norm = norm.strip_prefix("acs/").unwrap_or(&norm);
        match norm {
            "sf1" => return Ok(Dataset::DecennialSf1),
            "pl" => return Ok(Dataset::DecennialPl),
            "dhc" => return Ok(Dataset::DecennialDhc),
            "estimates" | "pep" => return Ok(Dataset::Estimates),
            _ => {}
        }
        Dataset::ALL
            .into_iter()
            .find(|d| d.tag() == norm || d.spec().path == s.trim())
            .ok_or_else(|| format!("unknown dataset: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acs_wire_fields_carry_estimate_and_margin_suffixes() {
        let (e, m) = Dataset::Acs5.spec().suffix.fields("B01003_001");
        assert_eq!(e, "B01003_001E");
        assert_eq!(m.as_deref(), Some("B01003_001M"));
        let (v, m) = Dataset::DecennialPl.spec().suffix.fields("P1_001N");
        assert_eq!(v, "P1_001N");
        assert!(m.is_none());
    }

    #[test]
    fn acs1_skips_2020() {
        assert!(Dataset::Acs1.has_year(2019));
        assert!(!Dataset::Acs1.has_year(2020));
        assert!(Dataset::Acs1.has_year(2021));
        assert!(!Dataset::Acs5.has_year(2008));
    }

    #[test]
    fn catalog_keeps_only_estimate_codes_for_acs() {
        let d = Dataset::Acs5;
        assert_eq!(d.catalog_code("B01003_001E", Some("B01003")).as_deref(), Some("B01003_001"));
        assert_eq!(d.catalog_code("B01003_001M", Some("B01003")), None);
        assert_eq!(d.catalog_code("B01003_001EA", Some("B01003")), None);
        assert_eq!(d.catalog_code("NAME", Some("N/A")), None);
        assert_eq!(d.catalog_code("for", None), None);
        assert_eq!(
            Dataset::Acs5Profile.catalog_code("DP02_0001PE", Some("DP02")).as_deref(),
            Some("DP02_0001P")
        );
    }

    #[test]
    fn count_catalogs_drop_identifier_columns() {
        let d = Dataset::DecennialPl;
        assert_eq!(d.catalog_code("P1_001N", Some("P1")).as_deref(), Some("P1_001N"));
        assert_eq!(d.catalog_code("NAME", Some("N/A")), None);
        assert_eq!(d.catalog_code("GEO_ID", Some("N/A")), None);
        assert_eq!(d.catalog_code("SUMLEVEL", Some("N/A")), None);

        // PEP measures carry no group, so only known identifiers are dropped.
        let pep = Dataset::EstimatesCharacteristics;
        assert_eq!(pep.catalog_code("POP", Some("N/A")).as_deref(), Some("POP"));
        assert_eq!(pep.catalog_code("AGEGROUP", Some("N/A")), None);
        assert_eq!(Dataset::Estimates.catalog_code("DATE_CODE", None), None);
    }

    #[test]
    fn parses_tags_and_paths() {
        assert_eq!("acs5".parse::<Dataset>().unwrap(), Dataset::Acs5);
        assert_eq!("acs/acs1".parse::<Dataset>().unwrap(), Dataset::Acs1);
        assert_eq!("dec/pl".parse::<Dataset>().unwrap(), Dataset::DecennialPl);
        assert_eq!("acs/acs5/subject".parse::<Dataset>().unwrap(), Dataset::Acs5Subject);
        assert_eq!("sf1".parse::<Dataset>().unwrap(), Dataset::DecennialSf1);
        assert!("acs9".parse::<Dataset>().is_err());
    }

    #[test]
    fn block_is_decennial_only() {
        assert!(Dataset::DecennialSf1.supports(Geography::Block));
        assert!(!Dataset::Acs5.supports(Geography::Block));
        assert!(!Dataset::Acs1.supports(Geography::Tract));
    }
}
