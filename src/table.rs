//! The output contract: tidy (long) and wide tables.

use crate::dataset::MeasureKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value(s) for one (entity, variable) cell. `None` marks data the agency
/// did not publish or suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Measure {
    Count(Option<f64>),
    Estimate {
        estimate: Option<f64>,
        moe: Option<f64>,
    },
}

impl Measure {
    pub fn missing(kind: MeasureKind) -> Self {
        match kind {
            MeasureKind::Count => Measure::Count(None),
            MeasureKind::Estimate => Measure::Estimate {
                estimate: None,
                moe: None,
            },
        }
    }

    /// The count or the estimate.
    pub fn value(&self) -> Option<f64> {
        match *self {
            Measure::Count(v) => v,
            Measure::Estimate { estimate, .. } => estimate,
        }
    }

    pub fn moe(&self) -> Option<f64> {
        match *self {
            Measure::Count(_) => None,
            Measure::Estimate { moe, .. } => moe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyRow {
    pub id: String,
    pub name: String,
    /// Values for [`TidyTable::dimensions`], in the same order.
    pub dimensions: Vec<String>,
    pub variable: String,
    pub measure: Measure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyTable {
    pub measure: MeasureKind,
    pub dimensions: Vec<String>,
    pub rows: Vec<TidyRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    pub id: String,
    pub name: String,
    pub dimensions: Vec<String>,
    /// One entry per [`WideTable::stems`] entry.
    pub values: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    pub measure: MeasureKind,
    pub dimensions: Vec<String>,
    /// Column stems: the alias of each variable, or its code.
    pub stems: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl TidyTable {
    /// Pivot into one row per entity, stems in first-seen order.
    pub fn to_wide(&self) -> WideTable {
        let mut stems: Vec<String> = Vec::new();
        let mut stem_idx: HashMap<&str, usize> = HashMap::new();
        for r in &self.rows {
            if !stem_idx.contains_key(r.variable.as_str()) {
                stem_idx.insert(&r.variable, stems.len());
                stems.push(r.variable.clone());
            }
        }

        let mut rows: Vec<WideRow> = Vec::new();
        let mut entity_idx: HashMap<(&str, &[String]), usize> = HashMap::new();
        for r in &self.rows {
            let key = (r.id.as_str(), r.dimensions.as_slice());
            let i = *entity_idx.entry(key).or_insert_with(|| {
                rows.push(WideRow {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    dimensions: r.dimensions.clone(),
                    values: vec![Measure::missing(self.measure); stems.len()],
                });
                rows.len() - 1
            });
            rows[i].values[stem_idx[r.variable.as_str()]] = r.measure;
        }

        WideTable {
            measure: self.measure,
            dimensions: self.dimensions.clone(),
            stems,
            rows,
        }
    }
}

impl WideTable {
    /// Un-pivot back to one row per (entity, variable).
    pub fn to_tidy(&self) -> TidyTable {
        let rows = self
            .rows
            .iter()
            .flat_map(|r| {
                self.stems.iter().zip(&r.values).map(move |(stem, m)| TidyRow {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    dimensions: r.dimensions.clone(),
                    variable: stem.clone(),
                    measure: *m,
                })
            })
            .collect();
        TidyTable {
            measure: self.measure,
            dimensions: self.dimensions.clone(),
            rows,
        }
    }

    /// Value columns: `{stem}` for counts, `{stem}E`/`{stem}M` for estimates.
    pub fn value_columns(&self) -> Vec<String> {
        match self.measure {
            MeasureKind::Count => self.stems.clone(),
            MeasureKind::Estimate => self
                .stems
                .iter()
                .flat_map(|s| [format!("{s}E"), format!("{s}M")])
                .collect(),
        }
    }
}

/// A flat cell for export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Text(&'a str),
    Number(Option<f64>),
}

/// Result of a query, in the shape the caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CanonicalTable {
    Tidy(TidyTable),
    Wide(WideTable),
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        match self {
            CanonicalTable::Tidy(t) => t.rows.len(),
            CanonicalTable::Wide(w) => w.rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn measure(&self) -> MeasureKind {
        match self {
            CanonicalTable::Tidy(t) => t.measure,
            CanonicalTable::Wide(w) => w.measure,
        }
    }

    pub fn as_tidy(&self) -> Option<&TidyTable> {
        match self {
            CanonicalTable::Tidy(t) => Some(t),
            CanonicalTable::Wide(_) => None,
        }
    }

    pub fn as_wide(&self) -> Option<&WideTable> {
        match self {
            CanonicalTable::Wide(w) => Some(w),
            CanonicalTable::Tidy(_) => None,
        }
    }

    pub fn into_tidy(self) -> TidyTable {
        match self {
            CanonicalTable::Tidy(t) => t,
            CanonicalTable::Wide(w) => w.to_tidy(),
        }
    }

    pub fn header(&self) -> Vec<String> {
        let (dims, tail) = match self {
            CanonicalTable::Tidy(t) => {
                let mut tail = vec!["variable".to_string()];
                match t.measure {
                    MeasureKind::Count => tail.push("value".into()),
                    MeasureKind::Estimate => tail.extend(["estimate".into(), "moe".into()]),
                }
                (&t.dimensions, tail)
            }
            CanonicalTable::Wide(w) => (&w.dimensions, w.value_columns()),
        };
        let mut h = vec!["id".to_string(), "name".to_string()];
        h.extend(dims.iter().cloned());
        h.extend(tail);
        h
    }

    /// Rows as flat cells aligned with [`Self::header`].
    pub fn records(&self) -> Vec<Vec<Field<'_>>> {
        fn push_measure<'a>(out: &mut Vec<Field<'a>>, kind: MeasureKind, m: &Measure) {
            out.push(Field::Number(m.value()));
            if kind == MeasureKind::Estimate {
                out.push(Field::Number(m.moe()));
            }
        }

        match self {
            CanonicalTable::Tidy(t) => t
                .rows
                .iter()
                .map(|r| {
                    let mut rec = vec![Field::Text(&r.id), Field::Text(&r.name)];
                    rec.extend(r.dimensions.iter().map(|d| Field::Text(d.as_str())));
                    rec.push(Field::Text(&r.variable));
                    push_measure(&mut rec, t.measure, &r.measure);
                    rec
                })
                .collect(),
            CanonicalTable::Wide(w) => w
                .rows
                .iter()
                .map(|r| {
                    let mut rec = vec![Field::Text(&r.id), Field::Text(&r.name)];
                    rec.extend(r.dimensions.iter().map(|d| Field::Text(d.as_str())));
                    for m in &r.values {
                        push_measure(&mut rec, w.measure, m);
                    }
                    rec
                })
                .collect(),
        }
    }
}
