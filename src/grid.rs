//! Square input grid held by the coordinator.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// The 31×31 reference image.
const SAMPLE_ROWS: [&str; 31] = [
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000100000000000000000",
    "0000000000001110000000000000000",
    "0000000000111111000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000011101110000000000",
    "0000000000000011111110000000000",
    "0000000000000011111110000000000",
    "0000000000000001111000000000000",
    "0000000000000011111110000000000",
    "0000000000000011101110000000000",
    "0000000000000011101110000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
    "0000000000000000000000000000000",
];

/// An N×N matrix of cells stored row-major.
///
/// Only the zero/non-zero distinction matters to the analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Vec<i32>,
}

impl Grid {
    /// Build a grid of side `size` from row-major `cells`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGrid`] if `size` is zero or `cells` does not
    /// hold exactly `size * size` values.
    pub fn new(size: usize, cells: Vec<i32>) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidGrid("grid must have at least one row".into()));
        }
        if cells.len() != size * size {
            return Err(Error::InvalidGrid(format!(
                "expected {} cells for a {size}x{size} grid, got {}",
                size * size,
                cells.len()
            )));
        }
        Ok(Grid { size, cells })
    }

    /// Build a grid from a list of rows, which must form a square.
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self> {
        let size = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            return Err(Error::InvalidGrid(format!(
                "row {i} has {} cells, expected {size}",
                row.len()
            )));
        }
        Grid::new(size, rows.into_iter().flatten().collect())
    }

    /// An all-zero grid of side `size`.
    pub fn zeros(size: usize) -> Result<Self> {
        Grid::new(size, vec![0; size * size])
    }

    /// The built-in 31×31 reference image.
    pub fn sample() -> Self {
        let cells = SAMPLE_ROWS
            .iter()
            .flat_map(|row| row.bytes().map(|b| i32::from(b - b'0')))
            .collect();
        Grid {
            size: SAMPLE_ROWS.len(),
            cells,
        }
    }

    /// Parse a grid from text.
    ///
    /// One row per line. Cells are separated by whitespace or commas. A line
    /// made of a single run of two or more `0`/`1` characters is dense and
    /// read one character per cell, so `10` is the row `[1, 0]`; any other
    /// single token such as `23` is one cell. Text after `#` and blank lines
    /// are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .collect();

            let row = match tokens.as_slice() {
                [dense] if dense.len() > 1 && dense.bytes().all(|b| matches!(b, b'0' | b'1')) => dense
                    .bytes()
                    .map(|b| i32::from(b - b'0'))
                    .collect(),
                _ => tokens
                    .iter()
                    .map(|t| {
                        t.parse::<i32>().map_err(|e| {
                            Error::InvalidGrid(format!("line {}: `{t}`: {e}", lineno + 1))
                        })
                    })
                    .collect::<Result<Vec<i32>>>()?,
            };
            rows.push(row);
        }
        Grid::from_rows(rows)
    }

    /// Read and parse a grid file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Grid::parse(&text)
    }

    /// Side length N.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Row `i`, if it exists.
    pub fn row(&self, i: usize) -> Option<&[i32]> {
        (i < self.size).then(|| &self.cells[i * self.size..(i + 1) * self.size])
    }

    /// Number of non-zero cells over the whole grid, column 0 included.
    pub fn nonzero(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }

    /// Consume the grid into its row-major cells.
    pub fn into_cells(self) -> Vec<i32> {
        self.cells
    }
}
