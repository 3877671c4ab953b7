// Tabular codec: DataTable <-> flat 2D table with bracketed column names
//
// A channel of shape (T, d1, ..., dk) becomes d1*...*dk columns named
// `key[i1,...,ik]` in row-major order. Scalar channels (T,) keep their bare
// name.

use ndarray::{Array2, ArrayD, ArrayView1, Axis, IxDyn};
use std::collections::BTreeMap;

use crate::core::data_table::DataTable;
use crate::core::error::{Result, TsError};

/// Row-oriented view of a DataTable: one row per time sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub index: Vec<f64>,
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl Table {
    pub fn new(index: Vec<f64>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != index.len() || values.ncols() != columns.len() {
            return Err(TsError::Type(format!(
                "table values have shape {:?} but index has {} rows and there are {} columns",
                values.shape(),
                index.len(),
                columns.len()
            )));
        }
        Ok(Self {
            index,
            columns,
            values,
        })
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values.column(i))
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }
}

/// Column names for a channel with the given trailing shape.
pub fn column_names(key: &str, trailing_shape: &[usize]) -> Vec<String> {
    if trailing_shape.is_empty() {
        return vec![key.to_string()];
    }
    let n_columns: usize = trailing_shape.iter().product();
    (0..n_columns)
        .map(|flat| {
            let indices: Vec<String> = unravel(flat, trailing_shape)
                .iter()
                .map(|i| i.to_string())
                .collect();
            format!("{}[{}]", key, indices.join(","))
        })
        .collect()
}

// Row-major multi-index of a flat position
fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut out = vec![0; shape.len()];
    for (axis, &dim) in shape.iter().enumerate().rev() {
        out[axis] = flat % dim;
        flat /= dim;
    }
    out
}

/// Flatten every channel of `data` into one table indexed by `index`.
pub fn encode(data: &DataTable, index: &[f64]) -> Result<Table> {
    let n_rows = index.len();
    let mut columns = Vec::new();
    let mut blocks: Vec<(usize, &ArrayD<f64>)> = Vec::new();

    for (key, value) in data.iter() {
        let shape = value.shape();
        if shape[0] != n_rows {
            return Err(TsError::ShapeMismatch {
                key: key.clone(),
                expected: n_rows,
                got: shape[0],
                against: "table index",
            });
        }
        let trailing = &shape[1..];
        let width: usize = trailing.iter().product();
        if width == 0 {
            return Err(TsError::Type(format!(
                "channel '{}' has an empty trailing dimension {:?} and cannot be tabulated",
                key, trailing
            )));
        }
        columns.extend(column_names(key, trailing));
        blocks.push((width, value));
    }

    let mut values = Array2::<f64>::zeros((n_rows, columns.len()));
    let mut offset = 0;
    for (width, value) in blocks {
        // iter() walks in logical row-major order, so row t is a contiguous run
        for (i, v) in value.iter().enumerate() {
            values[[i / width, offset + i % width]] = *v;
        }
        offset += width;
    }

    Table::new(index.to_vec(), columns, values)
}

struct ColumnName {
    base: String,
    indices: Option<Vec<usize>>,
}

fn parse_column(name: &str) -> Result<ColumnName> {
    let Some(open) = name.find('[') else {
        return Ok(ColumnName {
            base: name.to_string(),
            indices: None,
        });
    };
    let base = &name[..open];
    let rest: String = name[open + 1..].chars().filter(|c| !c.is_whitespace()).collect();
    let inner = rest
        .strip_suffix(']')
        .ok_or_else(|| TsError::Type(format!("column '{}' has an unclosed bracket", name)))?;
    let indices = inner
        .split(',')
        .map(|s| {
            s.parse::<usize>().map_err(|_| {
                TsError::Type(format!("column '{}' has a non-integer index '{}'", name, s))
            })
        })
        .collect::<Result<Vec<usize>>>()?;
    if base.is_empty() {
        return Err(TsError::Type(format!("column '{}' has no base name", name)));
    }
    Ok(ColumnName {
        base: base.to_string(),
        indices: Some(indices),
    })
}

/// Rebuild N-dimensional channels from a flat table.
pub fn decode(table: &Table) -> Result<DataTable> {
    let n_rows = table.n_rows();
    let mut scalars: BTreeMap<String, usize> = BTreeMap::new();
    let mut groups: BTreeMap<String, Vec<(Vec<usize>, usize)>> = BTreeMap::new();

    for (i_col, name) in table.columns.iter().enumerate() {
        let parsed = parse_column(name)?;
        match parsed.indices {
            None => {
                if scalars.insert(parsed.base.clone(), i_col).is_some() {
                    return Err(TsError::Type(format!("duplicate column '{}'", name)));
                }
            }
            Some(indices) => groups
                .entry(parsed.base)
                .or_default()
                .push((indices, i_col)),
        }
    }

    let mut data = DataTable::new();

    for (key, i_col) in scalars {
        if groups.contains_key(&key) {
            return Err(TsError::Type(format!(
                "column '{}' appears both with and without indices",
                key
            )));
        }
        let column = table.values.index_axis(Axis(1), i_col).to_owned();
        data.insert(key, column, n_rows)?;
    }

    for (key, mut entries) in groups {
        let n_dims = entries[0].0.len();
        if entries.iter().any(|(idx, _)| idx.len() != n_dims) {
            return Err(TsError::Type(format!(
                "columns of '{}' mix different numbers of indices",
                key
            )));
        }
        let mut trailing = vec![0usize; n_dims];
        for (idx, _) in &entries {
            for (axis, &i) in idx.iter().enumerate() {
                trailing[axis] = trailing[axis].max(i + 1);
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);
        let width: usize = trailing.iter().product();
        if entries.len() != width {
            return Err(TsError::Type(format!(
                "columns of '{}' do not cover the full {:?} grid ({} of {} present)",
                key,
                trailing,
                entries.len(),
                width
            )));
        }

        let mut flat = Vec::with_capacity(n_rows * width);
        for row in 0..n_rows {
            for (_, i_col) in &entries {
                flat.push(table.values[[row, *i_col]]);
            }
        }
        let mut shape = vec![n_rows];
        shape.extend_from_slice(&trailing);
        let value = ArrayD::from_shape_vec(IxDyn(&shape), flat)
            .map_err(|e| TsError::Type(format!("cannot reshape '{}': {}", key, e)))?;
        data.insert(key, value, n_rows)?;
    }

    Ok(data)
}
