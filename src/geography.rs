//! Enumeration units understood by the Census API and the scoping filters
//! each of them accepts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a scoping filter must, may, or must not be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Required,
    Optional,
    Forbidden,
}

/// Filter-requirement row for one geography.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRule {
    pub state: Filter,
    pub county: Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geography {
    Us,
    Region,
    Division,
    State,
    County,
    CountySubdivision,
    Tract,
    BlockGroup,
    Block,
    Place,
    Zcta,
    CongressionalDistrict,
    Cbsa,
    Puma,
    SchoolDistrictUnified,
    StateLegislativeUpper,
    StateLegislativeLower,
}

impl Geography {
    pub const ALL: [Geography; 17] = [
        Geography::Us,
        Geography::Region,
        Geography::Division,
        Geography::State,
        Geography::County,
        Geography::CountySubdivision,
        Geography::Tract,
        Geography::BlockGroup,
        Geography::Block,
        Geography::Place,
        Geography::Zcta,
        Geography::CongressionalDistrict,
        Geography::Cbsa,
        Geography::Puma,
        Geography::SchoolDistrictUnified,
        Geography::StateLegislativeUpper,
        Geography::StateLegislativeLower,
    ];

    /// Name used in the API's `for`/`in` clauses.
    pub fn wire_name(self) -> &'static str {
        match self {
            Geography::Us => "us",
            Geography::Region => "region",
            Geography::Division => "division",
            Geography::State => "state",
            Geography::County => "county",
            Geography::CountySubdivision => "county subdivision",
            Geography::Tract => "tract",
            Geography::BlockGroup => "block group",
            Geography::Block => "block",
            Geography::Place => "place",
            Geography::Zcta => "zip code tabulation area",
            Geography::CongressionalDistrict => "congressional district",
            Geography::Cbsa => "metropolitan statistical area/micropolitan statistical area",
            Geography::Puma => "public use microdata area",
            Geography::SchoolDistrictUnified => "school district (unified)",
            Geography::StateLegislativeUpper => "state legislative district (upper chamber)",
            Geography::StateLegislativeLower => "state legislative district (lower chamber)",
        }
    }

    pub fn filter_rule(self) -> FilterRule {
        use Filter::*;
        let (state, county) = match self {
            Geography::Us | Geography::Region | Geography::Division => (Forbidden, Forbidden),
            Geography::Cbsa | Geography::Zcta => (Forbidden, Forbidden),
            Geography::State => (Optional, Forbidden),
            Geography::County => (Optional, Optional),
            Geography::CountySubdivision | Geography::Tract | Geography::BlockGroup => {
                (Required, Optional)
            }
            Geography::Block => (Required, Required),
            Geography::Place | Geography::CongressionalDistrict => (Optional, Forbidden),
            Geography::Puma
            | Geography::SchoolDistrictUnified
            | Geography::StateLegislativeUpper
            | Geography::StateLegislativeLower => (Required, Forbidden),
        };
        FilterRule { state, county }
    }

    /// The state filter goes into the `for` clause rather than `in`.
    pub fn state_in_for_clause(self) -> bool {
        matches!(self, Geography::State)
    }

    /// Geographies whose `in` clause needs a county level, wildcarded when the
    /// caller did not pick one.
    pub fn needs_county_level(self) -> bool {
        matches!(
            self,
            Geography::CountySubdivision | Geography::BlockGroup | Geography::Block
        )
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Geography {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        let alias = match norm.as_str() {
            "us" | "nation" => Some(Geography::Us),
            "cousub" => Some(Geography::CountySubdivision),
            "zcta" | "zip code" => Some(Geography::Zcta),
            "cd" => Some(Geography::CongressionalDistrict),
            "cbsa" | "msa" | "metro" => Some(Geography::Cbsa),
            "puma" => Some(Geography::Puma),
            "school district" | "unified school district" => {
                Some(Geography::SchoolDistrictUnified)
            }
            "sldu" => Some(Geography::StateLegislativeUpper),
            "sldl" => Some(Geography::StateLegislativeLower),
            _ => None,
        };
        alias
            .or_else(|| Geography::ALL.into_iter().find(|g| g.wire_name() == norm))
            .ok_or_else(|| format!("unknown geography: {s}"))
    }
}
