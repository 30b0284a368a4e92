//! Untyped cell grid read from one worksheet.
//!
//! Extraction rules only ever see a `CellGrid`, so they can be exercised with
//! in-memory grids and never touch a workbook file.

use calamine::{Data, Range};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

static EMPTY: Cell = Cell::Empty;

const TEXT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

/// chrono's `%Y` happily reads "24" as year 24, so anything before this is a
/// two-digit year picked up by the wrong format.
const MIN_TEXT_DATE_YEAR: i32 = 1900;

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text rendering used by substring-matching rules. Empty cells render as "".
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => format!("{n}"),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        }
    }

    /// Only numeric cells count; text that happens to look numeric does not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Non-negative whole count, truncating fractional numbers. Numeric text
    /// such as "120" is accepted as well.
    pub fn as_count(&self) -> Option<u32> {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Text(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
            _ => return None,
        };
        if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 {
            Some(value.trunc() as u32)
        } else {
            None
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_text_date(s),
            Cell::Number(n) => serial_to_date(*n),
            _ => None,
        }
    }
}

pub fn parse_text_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    let plausible = |date: NaiveDate| date.year() >= MIN_TEXT_DATE_YEAR;

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .filter_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|dt| dt.date())
        .chain(
            TEXT_DATE_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok()),
        )
        .find(|date| plausible(*date))
}

/// Excel 1900-system serial day number to calendar date.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(n) => Cell::Number(*n),
            Data::Int(n) => Cell::Number(*n as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => {
                if dt.is_duration() {
                    Cell::Number(dt.as_f64())
                } else {
                    dt.as_datetime()
                        .map(|value| Cell::Date(value.date()))
                        .unwrap_or(Cell::Number(dt.as_f64()))
                }
            }
            Data::DateTimeIso(s) => parse_text_date(s)
                .map(Cell::Date)
                .unwrap_or_else(|| Cell::Text(s.clone())),
            Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellGrid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl CellGrid {
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }

    /// Builds a grid anchored at A1, padding whatever blank rows and columns
    /// precede the used range so indices match sheet positions.
    pub fn from_range(range: &Range<Data>) -> Self {
        let (start_row, start_col) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; start_col];
            cells.extend(row.iter().map(Cell::from));
            rows.push(cells);
        }
        Self::from_rows(rows)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Out-of-bounds positions read as empty.
    pub fn get(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Row-major walk over every position inside the grid's bounds.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &Cell)> + '_ {
        (0..self.height())
            .flat_map(move |row| (0..self.width).map(move |col| (row, col, self.get(row, col))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_as_empty() {
        let grid = CellGrid::from_rows(vec![vec![Cell::Text("a".into())], vec![]]);
        assert_eq!(grid.width(), 1);
        assert_eq!(grid.get(1, 0), &Cell::Empty);
        assert_eq!(grid.get(9, 9), &Cell::Empty);
    }

    #[test]
    fn cells_walk_row_major() {
        let grid = CellGrid::from_rows(vec![
            vec![Cell::Number(1.0), Cell::Number(2.0)],
            vec![Cell::Number(3.0)],
        ]);
        let order: Vec<(usize, usize)> = grid.cells().map(|(r, c, _)| (r, c)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn counts_accept_numbers_and_numeric_text() {
        assert_eq!(Cell::Number(120.0).as_count(), Some(120));
        assert_eq!(Cell::Number(87.6).as_count(), Some(87));
        assert_eq!(Cell::Text(" 1,250 ".into()).as_count(), Some(1250));
        assert_eq!(Cell::Number(-3.0).as_count(), None);
        assert_eq!(Cell::Text("n/a".into()).as_count(), None);
    }

    #[test]
    fn dates_parse_from_text_and_serials() {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 12);
        assert_eq!(Cell::Text("2024-10-12".into()).as_date(), expected);
        assert_eq!(Cell::Text("October 12, 2024".into()).as_date(), expected);
        assert_eq!(Cell::Text("10/12/2024".into()).as_date(), expected);
        assert_eq!(Cell::Number(45577.0).as_date(), expected);
        assert_eq!(Cell::Text("sometime in fall".into()).as_date(), None);
    }

    #[test]
    fn two_digit_years_land_in_this_century() {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 12);
        assert_eq!(Cell::Text("10/12/24".into()).as_date(), expected);
        assert_eq!(parse_text_date("0024-10-12"), None);
    }

    #[test]
    fn display_drops_trailing_zero_fraction() {
        assert_eq!(Cell::Number(150.0).display(), "150");
        assert_eq!(Cell::Number(2.5).display(), "2.5");
        assert_eq!(Cell::Empty.display(), "");
    }
}
