//! Box-drawing table renderer for list output.
//!
//! Widths are measured in characters, and cells wider than a column's limit
//! are cut with an ellipsis so long task titles or snippets keep rows on one
//! line.

use colored::Colorize;

/// Cell alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

struct Column {
    header: String,
    align: Align,
    max_width: Option<usize>,
}

/// Collects rows, then renders them inside a Unicode box.
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// All columns left-aligned and unlimited.
    pub fn new(headers: &[&str]) -> Self {
        Self {
            columns: headers
                .iter()
                .map(|h| Column {
                    header: h.to_string(),
                    align: Align::Left,
                    max_width: None,
                })
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Right-align column `col` (numbers, scores).
    pub fn right(mut self, col: usize) -> Self {
        if let Some(column) = self.columns.get_mut(col) {
            column.align = Align::Right;
        }
        self
    }

    /// Cap column `col` at `width` characters.
    pub fn limit(mut self, col: usize, width: usize) -> Self {
        if let Some(column) = self.columns.get_mut(col) {
            column.max_width = Some(width.max(2));
        }
        self
    }

    /// Add a row; missing cells are empty and extra cells dropped.
    pub fn add_row<S: AsRef<str>>(&mut self, cells: &[S]) {
        let row = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let cell = cells.get(i).map(|c| c.as_ref()).unwrap_or("");
                truncate(cell, column.max_width)
            })
            .collect();
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                self.rows
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(column.header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn rule(widths: &[usize], left: char, mid: char, right: char) -> String {
        let segments: Vec<String> = widths.iter().map(|w| "\u{2500}".repeat(w + 2)).collect();
        format!("{left}{}{right}", segments.join(&mid.to_string()))
    }

    fn line(cells: Vec<String>) -> String {
        format!("\u{2502}{}\u{2502}", cells.join("\u{2502}"))
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = vec![Self::rule(&widths, '\u{250c}', '\u{252c}', '\u{2510}')];
        out.push(Self::line(
            self.columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!(" {} ", pad(&c.header, *w, c.align).bold()))
                .collect(),
        ));
        out.push(Self::rule(&widths, '\u{251c}', '\u{253c}', '\u{2524}'));
        for row in &self.rows {
            out.push(Self::line(
                row.iter()
                    .zip(self.columns.iter().zip(&widths))
                    .map(|(cell, (c, w))| format!(" {} ", pad(cell, *w, c.align)))
                    .collect(),
            ));
        }
        out.push(Self::rule(&widths, '\u{2514}', '\u{2534}', '\u{2518}'));
        out.join("\n")
    }

    pub fn print(&self) {
        println!("{}", self.render());
    }
}

fn truncate(text: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if text.chars().count() > max => {
            let cut: String = text.chars().take(max - 1).collect();
            format!("{cut}\u{2026}")
        }
        _ => text.to_string(),
    }
}

fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = " ".repeat(width.saturating_sub(text.chars().count()));
    match align {
        Align::Left => format!("{text}{fill}"),
        Align::Right => format!("{fill}{text}"),
    }
}
