//! Left-aligned plain-text tables for command output.

use std::io::{self, Write};

const GAP: &str = "  ";

#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub(crate) fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; missing cells render empty and extra cells are dropped.
    pub(crate) fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(column, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(column))
                    .map(|cell| cell.chars().count())
                    .fold(header.chars().count(), usize::max)
            })
            .collect()
    }

    pub(crate) fn write_to(&self, writer: &mut dyn Write) -> io::Result<()> {
        let widths = self.widths();
        write_line(writer, &widths, self.headers.iter().map(String::as_str))?;
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        write_line(writer, &widths, rule.iter().map(String::as_str))?;
        for row in &self.rows {
            let cells = (0..widths.len()).map(|column| row.get(column).map_or("", String::as_str));
            write_line(writer, &widths, cells)?;
        }
        Ok(())
    }
}

fn write_line<'a>(
    writer: &mut dyn Write,
    widths: &[usize],
    cells: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    let line = widths
        .iter()
        .zip(cells)
        .map(|(width, cell)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(GAP);
    writeln!(writer, "{}", line.trim_end())
}
