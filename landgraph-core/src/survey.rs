//! Raw survey record parsing and pre-filtering.
//!
//! Survey inputs are delimited text tables with a mandatory header row: a
//! vertex table (`count area count2050 menace xcoord ycoord`) and an edge
//! table (`from to probdistGAP`), both using 1-based external ids. Columns
//! may appear in any order and extra columns are ignored. All rows are read
//! into memory before any transformation starts, so a malformed row aborts
//! the run before output exists.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use crate::error::SurveyError;
use crate::model::PatchId;

/// One raw habitat patch record, keyed by its 1-based external id.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyVertex {
    /// 1-based external id (the `count` column).
    pub external: u64,
    /// Present-day habitat quality (the `area` column).
    pub area: f64,
    /// Projected 2050 quality under the recorded threat.
    pub count2050: f64,
    /// Threat level as a percentage in `[0, 100]`.
    pub menace: f64,
    /// Planar x coordinate.
    pub x: f64,
    /// Planar y coordinate.
    pub y: f64,
}

/// One raw dispersal adjacency between two external vertex ids.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyEdge {
    /// 1-based external id of one endpoint.
    pub from: u64,
    /// 1-based external id of the other endpoint.
    pub to: u64,
    /// Dispersal probability (the `probdistGAP` column).
    pub probability: f64,
}

const VERTEX_COLUMNS: [&str; 6] = ["count", "area", "count2050", "menace", "xcoord", "ycoord"];
const EDGE_COLUMNS: [&str; 3] = ["from", "to", "probdistGAP"];

/// Reads and validates the vertex table.
///
/// # Errors
/// Returns [`SurveyError`] for I/O failures, a missing header or column,
/// unparsable numbers, duplicate external ids, or a menace value outside
/// `[0, 100]`.
pub fn read_vertices<R: BufRead>(
    reader: R,
    delimiter: char,
) -> Result<Vec<SurveyVertex>, SurveyError> {
    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let table = Table::open(reader, delimiter, &VERTEX_COLUMNS)?;
    for record in table {
        let record = record?;
        let external = record.u64_field(0)?;
        let row = SurveyVertex {
            external,
            area: record.f64_field(1)?,
            count2050: record.f64_field(2)?,
            menace: record.f64_field(3)?,
            x: record.f64_field(4)?,
            y: record.f64_field(5)?,
        };
        if !seen.insert(external) {
            return Err(SurveyError::DuplicateVertex {
                line: record.line,
                external,
            });
        }
        if !row.menace.is_finite() || !(0.0..=100.0).contains(&row.menace) {
            return Err(SurveyError::MenaceOutOfRange {
                external,
                menace: row.menace,
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Reads and validates the edge table.
///
/// # Errors
/// Returns [`SurveyError`] for I/O failures, a missing header or column,
/// unparsable numbers, or a probability outside `[0, 1]`.
pub fn read_edges<R: BufRead>(reader: R, delimiter: char) -> Result<Vec<SurveyEdge>, SurveyError> {
    let mut rows = Vec::new();
    let table = Table::open(reader, delimiter, &EDGE_COLUMNS)?;
    for record in table {
        let record = record?;
        let row = SurveyEdge {
            from: record.u64_field(0)?,
            to: record.u64_field(1)?,
            probability: record.f64_field(2)?,
        };
        if !row.probability.is_finite() || !(0.0..=1.0).contains(&row.probability) {
            return Err(SurveyError::EdgeProbabilityOutOfRange {
                from: row.from,
                to: row.to,
                probability: row.probability,
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Iterator over the data rows of a delimited table with a header.
struct Table<R> {
    lines: std::io::Lines<R>,
    delimiter: char,
    columns: &'static [&'static str],
    positions: Vec<usize>,
    line: usize,
}

/// One data row, resolved against the header's column positions.
struct Record {
    fields: Vec<String>,
    positions: Vec<usize>,
    columns: &'static [&'static str],
    line: usize,
}

impl<R: BufRead> Table<R> {
    fn open(
        reader: R,
        delimiter: char,
        columns: &'static [&'static str],
    ) -> Result<Self, SurveyError> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(source)) => return Err(SurveyError::Io { source }),
            None => return Err(SurveyError::MissingHeader),
        };
        let names: Vec<&str> = header.trim_end().split(delimiter).map(str::trim).collect();
        let mut positions = Vec::with_capacity(columns.len());
        for &column in columns {
            let position = names
                .iter()
                .position(|&name| name == column)
                .ok_or(SurveyError::MissingColumn { column })?;
            positions.push(position);
        }
        Ok(Self {
            lines,
            delimiter,
            columns,
            positions,
            line: 1,
        })
    }
}

impl<R: BufRead> Iterator for Table<R> {
    type Item = Result<Record, SurveyError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(source) => return Some(Err(SurveyError::Io { source })),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            let fields = line
                .trim_end()
                .split(self.delimiter)
                .map(str::to_owned)
                .collect();
            return Some(Ok(Record {
                fields,
                positions: self.positions.clone(),
                columns: self.columns,
                line: self.line,
            }));
        }
    }
}

impl Record {
    fn raw_field(&self, slot: usize) -> Result<&str, SurveyError> {
        let column = self.columns[slot];
        self.fields
            .get(self.positions[slot])
            .map(String::as_str)
            .ok_or(SurveyError::MissingField {
                line: self.line,
                column,
            })
    }

    fn f64_field(&self, slot: usize) -> Result<f64, SurveyError> {
        let raw = self.raw_field(slot)?;
        raw.parse().map_err(|_| SurveyError::MalformedNumber {
            line: self.line,
            column: self.columns[slot],
            value: raw.to_owned(),
        })
    }

    fn u64_field(&self, slot: usize) -> Result<u64, SurveyError> {
        let raw = self.raw_field(slot)?;
        raw.parse().map_err(|_| SurveyError::MalformedNumber {
            line: self.line,
            column: self.columns[slot],
            value: raw.to_owned(),
        })
    }
}

/// An axis-aligned bounding window over vertex coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Smallest x kept by the window (inclusive).
    pub x_min: f64,
    /// Largest x kept by the window (inclusive).
    pub x_max: f64,
    /// Smallest y kept by the window (inclusive).
    pub y_min: f64,
    /// Largest y kept by the window (inclusive).
    pub y_max: f64,
}

impl Bounds {
    /// Bounding box of all vertex coordinates, or `None` for an empty survey.
    #[must_use]
    pub fn from_vertices(rows: &[SurveyVertex]) -> Option<Self> {
        let first = rows.first()?;
        let mut bounds = Self {
            x_min: first.x,
            x_max: first.x,
            y_min: first.y,
            y_max: first.y,
        };
        for row in rows {
            bounds.x_min = bounds.x_min.min(row.x);
            bounds.x_max = bounds.x_max.max(row.x);
            bounds.y_min = bounds.y_min.min(row.y);
            bounds.y_max = bounds.y_max.max(row.y);
        }
        Some(bounds)
    }

    /// Shrinks the window to the lower-left `fraction x fraction` corner.
    ///
    /// `fraction = 1.0` keeps the window unchanged; the historical clip used
    /// `1/8` of each extent.
    #[must_use]
    pub fn lower_left_window(&self, fraction: f64) -> Self {
        Self {
            x_min: self.x_min,
            x_max: self.x_min + (self.x_max - self.x_min) * fraction,
            y_min: self.y_min,
            y_max: self.y_min + (self.y_max - self.y_min) * fraction,
        }
    }

    /// Whether the point lies inside the window (bounds inclusive).
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }
}

/// Maps surviving external ids to dense zero-based patch ids.
///
/// Vertices removed by the bounding filter resolve to `None`; ids that never
/// appeared in the survey are an error.
#[derive(Debug, Clone, Default)]
pub struct DenseIdMap {
    map: HashMap<u64, Option<PatchId>>,
    kept: usize,
}

impl DenseIdMap {
    /// Resolves an external id to its dense patch id.
    ///
    /// # Errors
    /// Returns [`SurveyError::UnknownVertex`] when the id never appeared in
    /// the vertex table.
    pub fn resolve(&self, external: u64) -> Result<Option<PatchId>, SurveyError> {
        self.map
            .get(&external)
            .copied()
            .ok_or(SurveyError::UnknownVertex { external })
    }

    /// Number of vertices that survived the filter.
    #[must_use]
    pub fn kept(&self) -> usize {
        self.kept
    }
}

/// Applies an optional bounding window and renumbers survivors densely.
///
/// Surviving vertices keep their input order and receive ids `0..kept`;
/// filtered-out ids resolve to `None` and must never appear in any output.
#[must_use]
pub fn filter_vertices<'a>(
    rows: &'a [SurveyVertex],
    bounds: Option<&Bounds>,
) -> (Vec<&'a SurveyVertex>, DenseIdMap) {
    let mut kept = Vec::new();
    let mut map = HashMap::with_capacity(rows.len());
    for row in rows {
        let keep = bounds.is_none_or(|window| window.contains(row.x, row.y));
        if keep {
            map.insert(row.external, Some(PatchId::new(kept.len() as u64)));
            kept.push(row);
        } else {
            map.insert(row.external, None);
        }
    }
    let dense = DenseIdMap {
        map,
        kept: kept.len(),
    };
    (kept, dense)
}
