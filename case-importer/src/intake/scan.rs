//! Data block scanning
//!
//! The block starts at a fixed row and ends at the first row whose monitored
//! columns are all blank. Anything below that row is never read, even if it
//! has content.

use std::iter::FusedIterator;

use super::resolve::CellResolver;
use super::workbook::Worksheet;
use crate::config::ColumnRange;

/// Whether every monitored cell of a row is absent or blank after trimming
///
/// A row index with no row object in the sheet counts as empty.
pub fn is_row_empty<W: Worksheet + ?Sized>(
    resolver: &CellResolver<'_, W>,
    row: u32,
    columns: ColumnRange,
) -> bool {
    if !resolver.sheet().has_row(row) {
        return true;
    }
    columns
        .columns()
        .all(|col| resolver.resolve_at(row, col).is_blank())
}

/// Lazy, single-pass iterator over the row indices of the data block
pub struct RowBlock<'a, W: Worksheet + ?Sized> {
    resolver: CellResolver<'a, W>,
    columns: ColumnRange,
    next_row: Option<u32>,
}

impl<'a, W: Worksheet + ?Sized> RowBlock<'a, W> {
    pub fn new(resolver: CellResolver<'a, W>, start_row: u32, columns: ColumnRange) -> Self {
        RowBlock {
            resolver,
            columns,
            next_row: Some(start_row),
        }
    }
}

impl<W: Worksheet + ?Sized> Iterator for RowBlock<'_, W> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let row = self.next_row.take()?;
        if is_row_empty(&self.resolver, row, self.columns) {
            log::info!(
                "Empty row detected at row {}. Stopping processing.",
                row as u64 + 1
            );
            return None;
        }
        self.next_row = row.checked_add(1);
        Some(row)
    }
}

impl<W: Worksheet + ?Sized> FusedIterator for RowBlock<'_, W> {}
