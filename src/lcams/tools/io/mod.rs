pub mod excel_write;
pub mod ledger;
pub mod workbook_read;
