//! Reshapes the API's array-of-arrays payload into a [`CanonicalTable`].
//!
//! The first payload row names the columns: the name field, any dimension
//! fields, the wire fields of each requested variable, and finally the
//! geography components (`state`, `county`, `tract`, ...). The entity id is
//! those geography components concatenated in payload order.

use crate::dataset::{DatasetSpec, MeasureKind};
use crate::error::{CensusError, Result};
use crate::models::{OutputShape, Query};
use crate::request::PlannedRequest;
use crate::table::{CanonicalTable, Measure, TidyRow, TidyTable, WideRow, WideTable};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// ACS annotation values standing in for suppressed or inapplicable numbers.
const SENTINELS: [f64; 7] = [
    -111_111_111.0,
    -222_222_222.0,
    -333_333_333.0,
    -555_555_555.0,
    -666_666_666.0,
    -888_888_888.0,
    -999_999_999.0,
];

/// Parsed payload: header plus data rows, every cell as optional text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Payload cells arrive as strings, numbers or `null`.
struct Cell(Option<String>);

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        struct CellVisitor;

        impl<'de> Visitor<'de> for CellVisitor {
            type Value = Cell;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a string, number, or null")
            }

            fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<Cell, E> {
                Ok(Cell(Some(s.to_string())))
            }

            fn visit_string<E: de::Error>(self, s: String) -> std::result::Result<Cell, E> {
                Ok(Cell(Some(s)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Cell, E> {
                Ok(Cell(Some(v.to_string())))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Cell, E> {
                Ok(Cell(Some(v.to_string())))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Cell, E> {
                Ok(Cell(Some(v.to_string())))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Cell, E> {
                Ok(Cell(Some(v.to_string())))
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Cell, E> {
                Ok(Cell(None))
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Cell, E> {
                Ok(Cell(None))
            }
        }

        deserializer.deserialize_any(CellVisitor)
    }
}

/// Parse a response body.
///
/// ### Errors
/// [`CensusError::Decode`] for non-JSON bodies, a missing header row, or rows
/// whose width differs from the header.
pub fn parse_payload(body: &str) -> Result<Payload> {
    let raw: Vec<Vec<Cell>> =
        serde_json::from_str(body).map_err(|e| CensusError::Decode(e.to_string()))?;
    let mut it = raw.into_iter();
    let header: Vec<String> = it
        .next()
        .ok_or_else(|| CensusError::Decode("empty payload: no header row".into()))?
        .into_iter()
        .map(|c| c.0.unwrap_or_default())
        .collect();
    let mut rows = Vec::new();
    for (i, row) in it.enumerate() {
        if row.len() != header.len() {
            return Err(CensusError::Decode(format!(
                "row {} has {} cells, header has {}",
                i + 1,
                row.len(),
                header.len()
            )));
        }
        rows.push(row.into_iter().map(|c| c.0).collect());
    }
    Ok(Payload { header, rows })
}

/// Numeric value of a cell; placeholders and non-numbers become `None`.
pub fn parse_number(cell: Option<&str>) -> Option<f64> {
    let v: f64 = cell?.trim().parse().ok()?;
    if !v.is_finite() || SENTINELS.contains(&v) {
        return None;
    }
    Some(v)
}

fn wire_fields(spec: &DatasetSpec, variables: &[String]) -> Vec<String> {
    variables
        .iter()
        .flat_map(|code| {
            let (value, margin) = spec.suffix.fields(code);
            std::iter::once(value).chain(margin)
        })
        .collect()
}

fn column(header: &[String], name: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| CensusError::Decode(format!("payload lacks column `{name}`")))
}

/// Merge the answers to `planned` (same order) into one payload.
///
/// Chunks of one state group are joined on every column that is not a
/// variable field, in the first chunk's row order; groups are then
/// concatenated.
pub fn combine(spec: &DatasetSpec, planned: &[PlannedRequest], payloads: Vec<Payload>) -> Result<Payload> {
    let mut groups: Vec<Payload> = Vec::new();
    let mut current: Option<(usize, Payload)> = None;
    for (req, payload) in planned.iter().zip(payloads) {
        current = match current {
            Some((group, base)) if group == req.group => {
                Some((group, join(spec, base, payload, &req.variables)?))
            }
            other => {
                if let Some((_, done)) = other {
                    groups.push(done);
                }
                Some((req.group, payload))
            }
        };
    }
    if let Some((_, done)) = current {
        groups.push(done);
    }

    let mut it = groups.into_iter();
    let mut out = it
        .next()
        .ok_or_else(|| CensusError::Decode("no payloads to combine".into()))?;
    for next in it {
        if next.header != out.header {
            return Err(CensusError::Decode(
                "state groups returned different columns".into(),
            ));
        }
        out.rows.extend(next.rows);
    }
    Ok(out)
}

fn join(spec: &DatasetSpec, mut base: Payload, chunk: Payload, variables: &[String]) -> Result<Payload> {
    let fields = wire_fields(spec, variables);
    let field_set: HashSet<&str> = fields.iter().map(String::as_str).collect();

    let key_cols: Vec<(usize, usize)> = chunk
        .header
        .iter()
        .enumerate()
        .filter(|(_, h)| !field_set.contains(h.as_str()))
        .map(|(ci, h)| column(&base.header, h).map(|bi| (bi, ci)))
        .collect::<Result<_>>()?;
    let value_cols: Vec<usize> = fields
        .iter()
        .map(|f| column(&chunk.header, f))
        .collect::<Result<_>>()?;

    let mut by_key: HashMap<Vec<Option<String>>, Vec<Option<String>>> = HashMap::new();
    for row in chunk.rows {
        let key = key_cols.iter().map(|&(_, ci)| row[ci].clone()).collect();
        let values = value_cols.iter().map(|&ci| row[ci].clone()).collect();
        by_key.insert(key, values);
    }

    for row in &mut base.rows {
        let key: Vec<Option<String>> = key_cols.iter().map(|&(bi, _)| row[bi].clone()).collect();
        match by_key.remove(&key) {
            Some(values) => row.extend(values),
            None => row.extend(std::iter::repeat_n(None, fields.len())),
        }
    }
    if !by_key.is_empty() {
        log::warn!(
            "dropped {} entities returned only for {}",
            by_key.len(),
            fields.join(",")
        );
    }
    base.header.extend(fields);
    Ok(base)
}

/// Reshape `payload` into the output shape requested by `query`.
///
/// `variables` is the resolved variable list (the table expansion when the
/// query names a table). Rows the agency did not return are not invented.
///
/// ### Errors
/// [`CensusError::Decode`] when an expected column is absent.
pub fn normalize(payload: &Payload, query: &Query, variables: &[String]) -> Result<CanonicalTable> {
    let spec = query.dataset.spec();
    let header = &payload.header;

    let name_col = column(header, spec.name_field)?;
    let dimensions: Vec<String> = spec
        .dimension_fields
        .iter()
        .map(|d| d.to_string())
        .chain(query.breakdown.iter().cloned())
        .collect();
    let dim_cols: Vec<usize> = dimensions
        .iter()
        .map(|d| column(header, d))
        .collect::<Result<_>>()?;

    let mut var_cols: Vec<(usize, Option<usize>)> = Vec::with_capacity(variables.len());
    for code in variables {
        let (value, margin) = spec.suffix.fields(code);
        let v = column(header, &value)?;
        let m = margin.map(|m| column(header, &m)).transpose()?;
        var_cols.push((v, m));
    }

    let mut claimed: HashSet<usize> = HashSet::from([name_col]);
    claimed.extend(dim_cols.iter().copied());
    for &(v, m) in &var_cols {
        claimed.insert(v);
        claimed.extend(m);
    }
    let geo_cols: Vec<usize> = (0..header.len()).filter(|i| !claimed.contains(i)).collect();

    let stems: Vec<String> = variables
        .iter()
        .map(|c| query.aliases.stem(c).to_string())
        .collect();

    let mut wide_rows = Vec::with_capacity(payload.rows.len());
    for row in &payload.rows {
        let id: String = geo_cols
            .iter()
            .filter_map(|&i| row[i].as_deref())
            .collect();
        let values = var_cols
            .iter()
            .map(|&(v, m)| measure(spec.measure, row[v].as_deref(), m.and_then(|m| row[m].as_deref())))
            .collect();
        wide_rows.push(WideRow {
            id,
            name: row[name_col].clone().unwrap_or_default(),
            dimensions: dim_cols
                .iter()
                .map(|&i| row[i].clone().unwrap_or_default())
                .collect(),
            values,
        });
    }

    let wide = WideTable {
        measure: spec.measure,
        dimensions,
        stems,
        rows: wide_rows,
    };
    Ok(match query.output {
        OutputShape::Wide => CanonicalTable::Wide(wide),
        OutputShape::Tidy => CanonicalTable::Tidy(tidy_from(wide)),
    })
}

fn measure(kind: MeasureKind, value: Option<&str>, margin: Option<&str>) -> Measure {
    match kind {
        MeasureKind::Count => Measure::Count(parse_number(value)),
        MeasureKind::Estimate => Measure::Estimate {
            estimate: parse_number(value),
            moe: parse_number(margin),
        },
    }
}

fn tidy_from(wide: WideTable) -> TidyTable {
    let mut rows = Vec::with_capacity(wide.rows.len() * wide.stems.len());
    for r in wide.rows {
        for (stem, m) in wide.stems.iter().zip(r.values) {
            rows.push(TidyRow {
                id: r.id.clone(),
                name: r.name.clone(),
                dimensions: r.dimensions.clone(),
                variable: stem.clone(),
                measure: m,
            });
        }
    }
    TidyTable {
        measure: wide.measure,
        dimensions: wide.dimensions,
        rows,
    }
}
