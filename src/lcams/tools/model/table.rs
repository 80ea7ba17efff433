use std::fmt;

use tracing::warn;

/// A single spreadsheet value as it travels between the workbook readers,
/// the normalizer, the ledger and the relational loader.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Builds a text cell, collapsing blank strings to [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(value) => value.trim().is_empty(),
            Cell::Number(value) => value.is_nan(),
        }
    }

    /// Normalised textual form used when cells are compared as keys, so that
    /// a term read back from the ledger as `1.0` still equals `1`.
    pub fn key(&self) -> String {
        self.to_string().trim().to_string()
    }

    pub fn matches(&self, expected: &str) -> bool {
        self.key() == expected.trim()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(value) => f.write_str(value),
            Cell::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Cell::Number(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map(Cell::text).unwrap_or_default()
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or_default()
    }
}

/// A rectangular frame with named columns. Every row holds exactly one cell
/// per column; the mutators below keep that invariant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Appends a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    /// Looks up a cell of `row` by column name; unknown columns read as empty.
    pub fn get<'a>(&self, row: &'a [Cell], column: &str) -> &'a Cell {
        self.column_index(column)
            .and_then(|index| row.get(index))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Returns the values of one column, or `None` when it does not exist.
    pub fn column(&self, name: &str) -> Option<Vec<Cell>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Inserts a column at `index`. Missing values are filled with empty cells.
    pub fn insert_column(&mut self, index: usize, name: impl Into<String>, values: Vec<Cell>) {
        let index = index.min(self.columns.len());
        self.columns.insert(index, name.into());
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.insert(index, values.next().unwrap_or_default());
        }
    }

    /// Adds `name` filled with `fill` unless the column already exists.
    pub fn ensure_column(&mut self, name: &str, fill: Cell) {
        if self.has_column(name) {
            return;
        }
        let values = vec![fill; self.rows.len()];
        self.insert_column(self.columns.len(), name, values);
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(index) => {
                self.columns[index] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Replaces empty cells of `column` with `fill`.
    pub fn fill_empty(&mut self, column: &str, fill: &Cell) {
        if let Some(index) = self.column_index(column) {
            for row in &mut self.rows {
                if row[index].is_empty() {
                    row[index] = fill.clone();
                }
            }
        }
    }

    /// Moves `leading` to the front, preserving the order of the others.
    pub fn reorder_leading(&mut self, leading: &[&str]) {
        let mut order: Vec<usize> = leading
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        let rest: Vec<usize> = (0..self.columns.len())
            .filter(|index| !order.contains(index))
            .collect();
        order.extend(rest);
        self.columns = order.iter().map(|&index| self.columns[index].clone()).collect();
        for row in &mut self.rows {
            *row = order.iter().map(|&index| row[index].clone()).collect();
        }
    }

    /// Keeps only the rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&Table, &[Cell]) -> bool) -> usize {
        let before = self.rows.len();
        let rows = std::mem::take(&mut self.rows);
        self.rows = rows.into_iter().filter(|row| keep(self, row)).collect();
        before - self.rows.len()
    }

    /// Renames repeated column labels `name.1`, `name.2`, ... so that every
    /// label addresses one column. Returns the number of renamed columns.
    pub fn dedupe_columns(&mut self) -> usize {
        let mut renamed = 0;
        for index in 1..self.columns.len() {
            let label = self.columns[index].clone();
            if !self.columns[..index].contains(&label) {
                continue;
            }
            let mut suffix = 1;
            let unique = loop {
                let candidate = format!("{label}.{suffix}");
                if !self.columns.contains(&candidate) {
                    break candidate;
                }
                suffix += 1;
            };
            warn!(column = %label, renamed_to = %unique, "duplicate column label renamed");
            self.columns[index] = unique;
            renamed += 1;
        }
        renamed
    }

    /// Appends the rows of `other`, aligning by column name. Columns unknown
    /// to `self` are appended at the end; repeated labels in `other` are
    /// renamed first so that no value is overwritten.
    pub fn concat(&mut self, mut other: Table) {
        other.dedupe_columns();
        for column in &other.columns {
            self.ensure_column(column, Cell::Empty);
        }
        let positions: Vec<usize> = other
            .columns
            .iter()
            .filter_map(|column| self.column_index(column))
            .collect();
        for row in other.rows {
            let mut aligned = vec![Cell::Empty; self.columns.len()];
            for (cell, &position) in row.into_iter().zip(&positions) {
                aligned[position] = cell;
            }
            self.rows.push(aligned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn concat_aligns_columns_by_name() {
        let mut base = table(&["a", "b"], vec![vec![Cell::from(1.0), Cell::from("x")]]);
        let other = table(&["b", "c"], vec![vec![Cell::from("y"), Cell::from(3.0)]]);

        base.concat(other);

        assert_eq!(base.columns, vec!["a", "b", "c"]);
        assert_eq!(base.rows[0], vec![Cell::from(1.0), Cell::from("x"), Cell::Empty]);
        assert_eq!(base.rows[1], vec![Cell::Empty, Cell::from("y"), Cell::from(3.0)]);
    }

    #[test]
    fn concat_keeps_columns_sharing_a_label() {
        let mut ledger = Table::default();
        let import = table(
            &["student_id", "Math", "Math"],
            vec![vec![Cell::from("S1"), Cell::from(12.0), Cell::from(15.0)]],
        );

        ledger.concat(import);

        assert_eq!(ledger.columns, vec!["student_id", "Math", "Math.1"]);
        assert_eq!(
            ledger.rows[0],
            vec![Cell::from("S1"), Cell::from(12.0), Cell::from(15.0)]
        );
    }

    #[test]
    fn numeric_keys_ignore_trailing_zero_fraction() {
        assert!(Cell::Number(1.0).matches("1"));
        assert_eq!(Cell::Number(12.5).key(), "12.5");
        assert!(Cell::text("  ").is_empty());
    }

    #[test]
    fn reorder_leading_moves_named_columns_first() {
        let mut frame = table(
            &["id", "level", "x"],
            vec![vec![Cell::from("S1"), Cell::from("6th"), Cell::from(2.0)]],
        );
        frame.reorder_leading(&["level", "id"]);
        assert_eq!(frame.columns, vec!["level", "id", "x"]);
        assert_eq!(frame.rows[0][0], Cell::from("6th"));
    }
}
