//! A1-Style Cell References
//!
//! Parsing and formatting helpers for cell addresses (`B3`) and rectangular
//! ranges (`A1:C5`). Rows and columns are 1-based throughout, matching the
//! addressing convention of the document backends.

use cellflow_core::{CoreError, CoreResult};

/// A 1-based (row, column) coordinate.
pub type Coord = (u32, u32);

/// Convert column letters to a 1-based index (`A` = 1, `AA` = 27).
pub fn column_index(letters: &str) -> CoreResult<u32> {
    if letters.is_empty() {
        return Err(CoreError::invalid_payload("empty column reference"));
    }
    let mut index: u32 = 0;
    for c in letters.chars() {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return Err(CoreError::invalid_payload(format!(
                "invalid column reference `{letters}`"
            )));
        }
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(c as u32 - 'A' as u32 + 1))
            .ok_or_else(|| CoreError::invalid_payload(format!("column `{letters}` out of range")))?;
    }
    Ok(index)
}

/// Convert a 1-based column index to letters (`1` = `A`, `27` = `AA`).
pub fn column_letters(mut index: u32) -> String {
    debug_assert!(index >= 1);
    let mut letters = Vec::new();
    while index > 0 {
        index -= 1;
        letters.push(b'A' + (index % 26) as u8);
        index /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Parse a single cell address like `B3` into `(row, column)`.
pub fn parse_cell(cell: &str) -> CoreResult<Coord> {
    let cell = cell.trim();
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| CoreError::invalid_payload(format!("invalid cell reference `{cell}`")))?;
    let (letters, digits) = cell.split_at(split);
    let col = column_index(letters)?;
    let row: u32 = digits
        .parse()
        .map_err(|_| CoreError::invalid_payload(format!("invalid cell reference `{cell}`")))?;
    if row == 0 {
        return Err(CoreError::invalid_payload(format!(
            "invalid cell reference `{cell}`"
        )));
    }
    Ok((row, col))
}

/// Format a `(row, column)` coordinate as an A1-style address.
pub fn cell_name(row: u32, col: u32) -> String {
    format!("{}{row}", column_letters(col))
}

/// Parse a range like `A1:C5` into its top-left and bottom-right corners.
/// A single cell address parses as a 1x1 range. Corners are normalized so
/// the first coordinate is always the top-left.
pub fn parse_range(range: &str) -> CoreResult<(Coord, Coord)> {
    let range = range.trim();
    let (start, end) = match range.split_once(':') {
        Some((a, b)) => (parse_cell(a)?, parse_cell(b)?),
        None => {
            let c = parse_cell(range)?;
            (c, c)
        }
    };
    Ok((
        (start.0.min(end.0), start.1.min(end.1)),
        (start.0.max(end.0), start.1.max(end.1)),
    ))
}

/// Format a rectangle as an A1-style range, collapsing 1x1 to a single cell.
pub fn range_name(top_left: Coord, bottom_right: Coord) -> String {
    if top_left == bottom_right {
        cell_name(top_left.0, top_left.1)
    } else {
        format!(
            "{}:{}",
            cell_name(top_left.0, top_left.1),
            cell_name(bottom_right.0, bottom_right.1)
        )
    }
}
