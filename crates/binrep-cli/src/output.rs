use binrep_engine::Release;

const TAB_WIDTH: usize = 8;

/// Header and value rows describing one release.
pub fn release_rows(release: &Release) -> Vec<Vec<String>> {
    let mut header = vec!["NAME".to_string(), "TIMESTAMP".to_string()];
    let mut row = vec![release.name.to_string(), release.timestamp.to_string()];
    for (i, binary) in release.meta.binaries.iter().enumerate() {
        header.push(format!("BINARY{}", i + 1));
        row.push(format!("{}/{}", binary.name, binary.checksum.short()));
    }
    vec![header, row]
}

/// Align cells on tab stops, padding every column to a multiple of the tab
/// width with at least one tab. The last cell of a row is not padded.
pub fn render_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            let widest = rows
                .iter()
                .filter_map(|r| r.get(col))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0);
            (widest / TAB_WIDTH + 1) * TAB_WIDTH
        })
        .collect();

    let mut out = String::new();
    for row in rows {
        for (col, cell) in row.iter().enumerate() {
            out.push_str(cell);
            if col + 1 < row.len() {
                let pad = widths[col] - cell.chars().count();
                let tabs = pad.div_ceil(TAB_WIDTH);
                out.extend(std::iter::repeat('\t').take(tabs));
            }
        }
        out.push('\n');
    }
    out
}
