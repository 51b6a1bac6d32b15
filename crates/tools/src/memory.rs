//! In-Memory Workbook
//!
//! Reference `SheetBackend` over plain hash maps, guarded by an async
//! read/write lock. Used by the test suites and as a dry-run backend for the
//! demo binary. Structural mutations are serialized by the lock within this
//! process; cross-process serialization stays with the caller.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use cellflow_core::{CellFormat, CoreError, CoreResult};

use crate::backend::{FilterState, SheetBackend};
use crate::cellref::{cell_name, column_index, parse_cell, parse_range, range_name, Coord};

const DEFAULT_COLUMN_WIDTH: f64 = 8.43;
const DEFAULT_ROW_HEIGHT: f64 = 15.0;

#[derive(Debug, Default, Clone)]
struct SheetData {
    cells: HashMap<Coord, Value>,
    formats: HashMap<Coord, CellFormat>,
    col_widths: HashMap<u32, f64>,
    row_heights: HashMap<u32, f64>,
    merges: Vec<String>,
    filter: Option<FilterState>,
    borders: HashMap<String, String>,
    charts: Vec<String>,
    tables: Vec<String>,
    pivots: Vec<String>,
}

impl SheetData {
    /// `(max_row, max_col)` over populated cells, `(0, 0)` when empty.
    fn extent(&self) -> Coord {
        self.cells
            .keys()
            .fold((0, 0), |(r, c), &(row, col)| (r.max(row), c.max(col)))
    }

    fn origin(&self) -> Coord {
        self.cells.keys().fold((u32::MAX, u32::MAX), |(r, c), &(row, col)| {
            (r.min(row), c.min(col))
        })
    }
}

/// Serializable snapshot of a whole sheet, used to reverse `delete_sheet`.
#[derive(Debug, Serialize, Deserialize)]
struct SheetSnapshot {
    cells: Vec<(String, Value)>,
    formats: Vec<(String, CellFormat)>,
    col_widths: Vec<(u32, f64)>,
    row_heights: Vec<(u32, f64)>,
    merges: Vec<String>,
    filter: Option<FilterState>,
    borders: Vec<(String, String)>,
    charts: Vec<String>,
    tables: Vec<String>,
    pivots: Vec<String>,
}

impl From<&SheetData> for SheetSnapshot {
    fn from(data: &SheetData) -> Self {
        Self {
            cells: data
                .cells
                .iter()
                .map(|(&(r, c), v)| (cell_name(r, c), v.clone()))
                .collect(),
            formats: data
                .formats
                .iter()
                .map(|(&(r, c), f)| (cell_name(r, c), f.clone()))
                .collect(),
            col_widths: data.col_widths.iter().map(|(&c, &w)| (c, w)).collect(),
            row_heights: data.row_heights.iter().map(|(&r, &h)| (r, h)).collect(),
            merges: data.merges.clone(),
            filter: data.filter.clone(),
            borders: data.borders.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            charts: data.charts.clone(),
            tables: data.tables.clone(),
            pivots: data.pivots.clone(),
        }
    }
}

impl SheetSnapshot {
    fn into_data(self) -> CoreResult<SheetData> {
        let mut data = SheetData {
            merges: self.merges,
            filter: self.filter,
            charts: self.charts,
            tables: self.tables,
            pivots: self.pivots,
            ..SheetData::default()
        };
        for (cell, value) in self.cells {
            data.cells.insert(parse_cell(&cell)?, value);
        }
        for (cell, format) in self.formats {
            data.formats.insert(parse_cell(&cell)?, format);
        }
        data.col_widths = self.col_widths.into_iter().collect();
        data.row_heights = self.row_heights.into_iter().collect();
        data.borders = self.borders.into_iter().collect();
        Ok(data)
    }
}

struct Inner {
    workbook: String,
    order: Vec<String>,
    sheets: HashMap<String, SheetData>,
    active: (String, String),
}

/// In-memory workbook backend.
pub struct MemoryWorkbook {
    inner: RwLock<Inner>,
}

impl Default for MemoryWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkbook {
    /// Create a workbook with a single empty `Sheet1`.
    pub fn new() -> Self {
        Self::with_sheets(&["Sheet1"])
    }

    /// Create a workbook with the given sheets, all empty.
    pub fn with_sheets(names: &[&str]) -> Self {
        let mut sheets = HashMap::new();
        let mut order = Vec::new();
        for &name in names {
            order.push(name.to_string());
            sheets.insert(name.to_string(), SheetData::default());
        }
        let active_sheet = names.first().copied().unwrap_or("Sheet1").to_string();
        Self {
            inner: RwLock::new(Inner {
                workbook: "Workbook1".to_string(),
                order,
                sheets,
                active: (active_sheet, "A1".to_string()),
            }),
        }
    }
}

fn sheet<'a>(inner: &'a Inner, name: &str) -> CoreResult<&'a SheetData> {
    inner
        .sheets
        .get(name)
        .ok_or_else(|| CoreError::backend(format!("Sheet not found: {name}")))
}

fn sheet_mut<'a>(inner: &'a mut Inner, name: &str) -> CoreResult<&'a mut SheetData> {
    inner
        .sheets
        .get_mut(name)
        .ok_or_else(|| CoreError::backend(format!("Sheet not found: {name}")))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Deterministic cross-type ordering for sorting: numbers, then strings,
/// then booleans, then empty.
fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) => 0,
            Value::String(_) => 1,
            Value::Bool(_) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl SheetBackend for MemoryWorkbook {
    async fn list_sheets(&self) -> CoreResult<Vec<String>> {
        Ok(self.inner.read().await.order.clone())
    }

    async fn sheet_exists(&self, name: &str) -> CoreResult<bool> {
        Ok(self.inner.read().await.sheets.contains_key(name))
    }

    async fn used_range(&self, name: &str) -> CoreResult<String> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        if data.cells.is_empty() {
            return Ok("A1".to_string());
        }
        Ok(range_name(data.origin(), data.extent()))
    }

    async fn headers(&self, name: &str) -> CoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        if data.cells.is_empty() {
            return Ok(Vec::new());
        }
        let (first_row, first_col) = data.origin();
        let (_, last_col) = data.extent();
        Ok((first_col..=last_col)
            .map(|col| {
                data.cells
                    .get(&(first_row, col))
                    .map(display_value)
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn cell_formula(&self, name: &str, cell: &str) -> CoreResult<String> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        let coord = parse_cell(cell)?;
        Ok(match data.cells.get(&coord) {
            Some(Value::String(s)) if s.starts_with('=') => s.clone(),
            _ => String::new(),
        })
    }

    async fn active_cell(&self) -> CoreResult<(String, String)> {
        Ok(self.inner.read().await.active.clone())
    }

    async fn list_tables(&self, name: &str) -> CoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(sheet(&inner, name)?.tables.clone())
    }

    async fn list_charts(&self, name: &str) -> CoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(sheet(&inner, name)?.charts.clone())
    }

    async fn list_pivots(&self, name: &str) -> CoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(sheet(&inner, name)?.pivots.clone())
    }

    async fn range_values(&self, name: &str, range: &str) -> CoreResult<Vec<Vec<Value>>> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        let ((r1, c1), (r2, c2)) = parse_range(range)?;
        Ok((r1..=r2)
            .map(|row| {
                (c1..=c2)
                    .map(|col| data.cells.get(&(row, col)).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect())
    }

    async fn has_filter(&self, name: &str) -> CoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(sheet(&inner, name)?.filter.is_some())
    }

    async fn row_count(&self, name: &str) -> CoreResult<u32> {
        let inner = self.inner.read().await;
        Ok(sheet(&inner, name)?.extent().0)
    }

    async fn column_count(&self, name: &str) -> CoreResult<u32> {
        let inner = self.inner.read().await;
        Ok(sheet(&inner, name)?.extent().1)
    }

    async fn cell_value(&self, name: &str, cell: &str) -> CoreResult<Value> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        let coord = parse_cell(cell)?;
        Ok(data.cells.get(&coord).cloned().unwrap_or(Value::Null))
    }

    async fn row_values(&self, name: &str, row: u32, count: u32) -> CoreResult<Vec<Vec<Value>>> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        let width = data.extent().1.max(1);
        Ok((row..row + count)
            .map(|r| {
                (1..=width)
                    .map(|col| data.cells.get(&(r, col)).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect())
    }

    async fn column_width(&self, name: &str, column: &str) -> CoreResult<f64> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        let col = column_index(column)?;
        Ok(data.col_widths.get(&col).copied().unwrap_or(DEFAULT_COLUMN_WIDTH))
    }

    async fn row_height(&self, name: &str, row: u32) -> CoreResult<f64> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        Ok(data.row_heights.get(&row).copied().unwrap_or(DEFAULT_ROW_HEIGHT))
    }

    async fn filter_state(&self, name: &str) -> CoreResult<Option<FilterState>> {
        let inner = self.inner.read().await;
        Ok(sheet(&inner, name)?.filter.clone())
    }

    async fn border_style(&self, name: &str, range: &str) -> CoreResult<Option<String>> {
        let inner = self.inner.read().await;
        Ok(sheet(&inner, name)?.borders.get(range).cloned())
    }

    async fn range_formats(&self, name: &str, range: &str) -> CoreResult<Value> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        let ((r1, c1), (r2, c2)) = parse_range(range)?;
        let mut snapshot: Vec<(String, Option<CellFormat>)> = Vec::new();
        for row in r1..=r2 {
            for col in c1..=c2 {
                snapshot.push((cell_name(row, col), data.formats.get(&(row, col)).cloned()));
            }
        }
        serde_json::to_value(snapshot).map_err(CoreError::from)
    }

    async fn sheet_snapshot(&self, name: &str) -> CoreResult<Value> {
        let inner = self.inner.read().await;
        let data = sheet(&inner, name)?;
        serde_json::to_value(SheetSnapshot::from(data)).map_err(CoreError::from)
    }

    async fn write_cell(&self, name: &str, cell: &str, value: Value) -> CoreResult<()> {
        let coord = parse_cell(cell)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        if value.is_null() {
            data.cells.remove(&coord);
        } else {
            data.cells.insert(coord, value);
        }
        inner.active = (name.to_string(), cell_name(coord.0, coord.1));
        Ok(())
    }

    async fn write_range(
        &self,
        name: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> CoreResult<()> {
        let ((r1, c1), _) = parse_range(range)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        for (i, row) in values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let coord = (r1 + i as u32, c1 + j as u32);
                if value.is_null() {
                    data.cells.remove(&coord);
                } else {
                    data.cells.insert(coord, value.clone());
                }
            }
        }
        Ok(())
    }

    async fn create_sheet(&self, name: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.sheets.contains_key(name) {
            return Err(CoreError::backend(format!("Sheet already exists: {name}")));
        }
        inner.order.push(name.to_string());
        inner.sheets.insert(name.to_string(), SheetData::default());
        Ok(())
    }

    async fn rename_sheet(&self, from: &str, to: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.sheets.contains_key(to) {
            return Err(CoreError::backend(format!("Sheet already exists: {to}")));
        }
        let data = inner
            .sheets
            .remove(from)
            .ok_or_else(|| CoreError::backend(format!("Sheet not found: {from}")))?;
        inner.sheets.insert(to.to_string(), data);
        if let Some(slot) = inner.order.iter_mut().find(|n| *n == from) {
            *slot = to.to_string();
        }
        if inner.active.0 == from {
            inner.active.0 = to.to_string();
        }
        Ok(())
    }

    async fn delete_sheet(&self, name: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.sheets.remove(name).is_none() {
            return Err(CoreError::backend(format!("Sheet not found: {name}")));
        }
        inner.order.retain(|n| n != name);
        if inner.active.0 == name {
            let fallback = inner.order.first().cloned().unwrap_or_default();
            inner.active = (fallback, "A1".to_string());
        }
        Ok(())
    }

    async fn restore_sheet(&self, name: &str, snapshot: Value) -> CoreResult<()> {
        let snapshot: SheetSnapshot =
            serde_json::from_value(snapshot).map_err(CoreError::from)?;
        let data = snapshot.into_data()?;
        let mut inner = self.inner.write().await;
        if !inner.order.iter().any(|n| n == name) {
            inner.order.push(name.to_string());
        }
        inner.sheets.insert(name.to_string(), data);
        Ok(())
    }

    async fn create_workbook(&self, name: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.workbook = name.to_string();
        if inner.sheets.is_empty() {
            inner.order.push("Sheet1".to_string());
            inner.sheets.insert("Sheet1".to_string(), SheetData::default());
            inner.active = ("Sheet1".to_string(), "A1".to_string());
        }
        Ok(())
    }

    async fn format_range(&self, name: &str, range: &str, format: &CellFormat) -> CoreResult<()> {
        let ((r1, c1), (r2, c2)) = parse_range(range)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        for row in r1..=r2 {
            for col in c1..=c2 {
                let entry = data.formats.entry((row, col)).or_default();
                if format.bold.is_some() {
                    entry.bold = format.bold;
                }
                if format.italic.is_some() {
                    entry.italic = format.italic;
                }
                if format.underline.is_some() {
                    entry.underline = format.underline;
                }
                if format.font_size.is_some() {
                    entry.font_size = format.font_size;
                }
                if format.font_color.is_some() {
                    entry.font_color = format.font_color.clone();
                }
                if format.fill_color.is_some() {
                    entry.fill_color = format.fill_color.clone();
                }
                if format.number_format.is_some() {
                    entry.number_format = format.number_format.clone();
                }
            }
        }
        Ok(())
    }

    async fn restore_formats(&self, name: &str, snapshot: Value) -> CoreResult<()> {
        let snapshot: Vec<(String, Option<CellFormat>)> =
            serde_json::from_value(snapshot).map_err(CoreError::from)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        for (cell, format) in snapshot {
            let coord = parse_cell(&cell)?;
            match format {
                Some(f) => {
                    data.formats.insert(coord, f);
                }
                None => {
                    data.formats.remove(&coord);
                }
            }
        }
        Ok(())
    }

    async fn clear_range(&self, name: &str, range: &str) -> CoreResult<()> {
        let ((r1, c1), (r2, c2)) = parse_range(range)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        for row in r1..=r2 {
            for col in c1..=c2 {
                data.cells.remove(&(row, col));
            }
        }
        Ok(())
    }

    async fn autofit(&self, name: &str) -> CoreResult<()> {
        // Column sizing is cosmetic in the in-memory model.
        let inner = self.inner.read().await;
        sheet(&inner, name).map(|_| ())
    }

    async fn insert_rows(&self, name: &str, row: u32, count: u32) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        data.cells = data
            .cells
            .drain()
            .map(|((r, c), v)| (if r >= row { (r + count, c) } else { (r, c) }, v))
            .collect();
        data.formats = data
            .formats
            .drain()
            .map(|((r, c), v)| (if r >= row { (r + count, c) } else { (r, c) }, v))
            .collect();
        data.row_heights = data
            .row_heights
            .drain()
            .map(|(r, h)| (if r >= row { r + count } else { r }, h))
            .collect();
        Ok(())
    }

    async fn delete_rows(&self, name: &str, row: u32, count: u32) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        let end = row + count;
        data.cells = data
            .cells
            .drain()
            .filter(|&((r, _), _)| r < row || r >= end)
            .map(|((r, c), v)| (if r >= end { (r - count, c) } else { (r, c) }, v))
            .collect();
        data.formats = data
            .formats
            .drain()
            .filter(|&((r, _), _)| r < row || r >= end)
            .map(|((r, c), v)| (if r >= end { (r - count, c) } else { (r, c) }, v))
            .collect();
        data.row_heights = data
            .row_heights
            .drain()
            .filter(|&(r, _)| r < row || r >= end)
            .map(|(r, h)| (if r >= end { r - count } else { r }, h))
            .collect();
        Ok(())
    }

    async fn merge_cells(&self, name: &str, range: &str) -> CoreResult<()> {
        parse_range(range)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        if data.merges.iter().any(|m| m == range) {
            return Err(CoreError::backend(format!("Range already merged: {range}")));
        }
        data.merges.push(range.to_string());
        Ok(())
    }

    async fn unmerge_cells(&self, name: &str, range: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        let before = data.merges.len();
        data.merges.retain(|m| m != range);
        if data.merges.len() == before {
            return Err(CoreError::backend(format!("Range not merged: {range}")));
        }
        Ok(())
    }

    async fn set_borders(&self, name: &str, range: &str, style: Option<&str>) -> CoreResult<()> {
        parse_range(range)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        match style {
            Some(style) => {
                data.borders.insert(range.to_string(), style.to_string());
            }
            None => {
                data.borders.remove(range);
            }
        }
        Ok(())
    }

    async fn set_column_width(&self, name: &str, column: &str, width: f64) -> CoreResult<()> {
        let col = column_index(column)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        data.col_widths.insert(col, width);
        Ok(())
    }

    async fn set_row_height(&self, name: &str, row: u32, height: f64) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        data.row_heights.insert(row, height);
        Ok(())
    }

    async fn apply_filter(&self, name: &str, state: FilterState) -> CoreResult<()> {
        parse_range(&state.range)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        data.filter = Some(state);
        Ok(())
    }

    async fn clear_filter(&self, name: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        data.filter = None;
        Ok(())
    }

    async fn sort_range(
        &self,
        name: &str,
        range: &str,
        column: u32,
        ascending: bool,
    ) -> CoreResult<()> {
        let ((r1, c1), (r2, c2)) = parse_range(range)?;
        let width = (c2 - c1 + 1) as usize;
        let key = (column as usize).min(width - 1);
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        let mut rows: Vec<Vec<Value>> = (r1..=r2)
            .map(|row| {
                (c1..=c2)
                    .map(|col| data.cells.get(&(row, col)).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        rows.sort_by(|a, b| {
            let ord = compare_values(&a[key], &b[key]);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        for (i, row) in rows.into_iter().enumerate() {
            for (j, value) in row.into_iter().enumerate() {
                let coord = (r1 + i as u32, c1 + j as u32);
                if value.is_null() {
                    data.cells.remove(&coord);
                } else {
                    data.cells.insert(coord, value);
                }
            }
        }
        Ok(())
    }

    async fn copy_range(&self, name: &str, from: &str, to: &str) -> CoreResult<()> {
        let ((r1, c1), (r2, c2)) = parse_range(from)?;
        let ((tr, tc), _) = parse_range(to)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        let source: Vec<Vec<Value>> = (r1..=r2)
            .map(|row| {
                (c1..=c2)
                    .map(|col| data.cells.get(&(row, col)).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        for (i, row) in source.into_iter().enumerate() {
            for (j, value) in row.into_iter().enumerate() {
                let coord = (tr + i as u32, tc + j as u32);
                if value.is_null() {
                    data.cells.remove(&coord);
                } else {
                    data.cells.insert(coord, value);
                }
            }
        }
        Ok(())
    }

    async fn create_chart(
        &self,
        name: &str,
        range: &str,
        _chart_type: &str,
        title: &str,
    ) -> CoreResult<String> {
        parse_range(range)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        let chart_name = if title.is_empty() {
            format!("Chart{}", data.charts.len() + 1)
        } else {
            title.to_string()
        };
        if data.charts.iter().any(|c| c == &chart_name) {
            return Err(CoreError::backend(format!(
                "Chart already exists: {chart_name}"
            )));
        }
        data.charts.push(chart_name.clone());
        Ok(chart_name)
    }

    async fn delete_chart(&self, name: &str, chart: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        let before = data.charts.len();
        data.charts.retain(|c| c != chart);
        if data.charts.len() == before {
            return Err(CoreError::backend(format!("Chart not found: {chart}")));
        }
        Ok(())
    }

    async fn create_table(&self, name: &str, range: &str, table: &str) -> CoreResult<()> {
        parse_range(range)?;
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        if data.tables.iter().any(|t| t == table) {
            return Err(CoreError::backend(format!("Table already exists: {table}")));
        }
        data.tables.push(table.to_string());
        Ok(())
    }

    async fn delete_table(&self, name: &str, table: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        let before = data.tables.len();
        data.tables.retain(|t| t != table);
        if data.tables.len() == before {
            return Err(CoreError::backend(format!("Table not found: {table}")));
        }
        Ok(())
    }

    async fn create_pivot(
        &self,
        source_sheet: &str,
        source_range: &str,
        target_sheet: &str,
        _rows: &[String],
        _values: &[String],
    ) -> CoreResult<String> {
        parse_range(source_range)?;
        let mut inner = self.inner.write().await;
        sheet(&inner, source_sheet)?;
        let data = sheet_mut(&mut inner, target_sheet)?;
        let pivot_name = format!("Pivot{}", data.pivots.len() + 1);
        data.pivots.push(pivot_name.clone());
        Ok(pivot_name)
    }

    async fn delete_pivot(&self, name: &str, pivot: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let data = sheet_mut(&mut inner, name)?;
        let before = data.pivots.len();
        data.pivots.retain(|p| p != pivot);
        if data.pivots.len() == before {
            return Err(CoreError::backend(format!("Pivot not found: {pivot}")));
        }
        Ok(())
    }
}
