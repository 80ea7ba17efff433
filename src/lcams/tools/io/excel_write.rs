use std::fs;
use std::path::Path;

use rust_xlsxwriter::Workbook;

use crate::lcams::tools::error::Result;
use crate::lcams::tools::model::{Cell, Table};

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable<'a> {
    pub sheet_name: &'a str,
    pub table: &'a Table,
}

/// Writes the provided sheets to `path`, replacing any existing file.
///
/// The workbook is first saved next to the target and then renamed over it,
/// so a failed write leaves the previous file intact.
pub fn write_workbook(path: &Path, sheets: &[SheetTable<'_>]) -> Result<()> {
    let mut workbook_writer = Workbook::new();

    for sheet in sheets {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(sheet.sheet_name)?;

        let table = sheet.table;
        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            let excel_row = (row_idx + 1) as u32;
            for (col_idx, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Empty => {}
                    Cell::Number(value) if value.is_finite() => {
                        worksheet.write_number(excel_row, col_idx as u16, *value)?;
                    }
                    Cell::Number(_) => {}
                    Cell::Text(value) => {
                        worksheet.write_string(excel_row, col_idx as u16, value)?;
                    }
                }
            }
        }

        if !table.columns.is_empty() {
            let col_end = (table.columns.len() as u16).saturating_sub(1);
            worksheet.autofilter(0, 0, table.rows.len() as u32, col_end)?;
        }
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("xlsx.partial");
    workbook_writer.save(&staging)?;
    fs::rename(&staging, path)?;
    Ok(())
}
