use crate::types::RawTable;

/// Drop absent, blank and lone-`$` cells, trim the rest, keep order.
///
/// A row that comes back empty is the caller's to drop.
pub fn clean_row<S: AsRef<str>>(cells: &[Option<S>]) -> Vec<String> {
    cells
        .iter()
        .filter_map(|cell| cell.as_ref())
        .map(|cell| cell.as_ref().trim())
        .filter(|cell| !cell.is_empty() && *cell != "$")
        .map(str::to_string)
        .collect()
}

/// Clean every row of a raw grid and drop rows left with no cells.
pub fn clean_table(table: &RawTable) -> Vec<Vec<String>> {
    table
        .iter()
        .map(|row| clean_row(row))
        .filter(|row| !row.is_empty())
        .collect()
}
