/*
wikitext/tables.rs

`{| ... |}` tables. Prose extraction has no use for tabular data, so tables
are removed from text, HTML and JSON output. Markdown output keeps them as
pipe tables: caption first, then a header row, a separator and the data rows,
every row padded to the widest one.

Tables nest. The parser tracks `{|` / `|}` lines with a depth counter; an
inner table's lines are skipped when the outer one is converted. A table with
no closing `|}` runs to the end of the text.
*/

use itertools::Itertools;
use lazy_regex::regex_captures;

use crate::wikitext::enums::OutputFormat;
use crate::wikitext::scanner::{find_top_level, split_top_level};

/// A table cell with its (already unwrapped) content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub text: String,
    pub header: bool,
    pub colspan: usize,
}

impl TableCell {
    pub fn new(text: impl Into<String>, header: bool) -> Self {
        Self {
            text: text.into(),
            header,
            colspan: 1,
        }
    }
}

/// Parsed table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WikiTable {
    pub caption: Option<String>,
    pub rows: Vec<Vec<TableCell>>,
}

impl WikiTable {
    /// Number of columns of the widest row, spans included.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.iter().map(|c| c.colspan.max(1)).sum::<usize>())
            .max()
            .unwrap_or(0)
    }

    /// Render as a Markdown pipe table.
    pub fn to_markdown(&self) -> String {
        let width = self.width();
        let mut out = String::new();
        if let Some(caption) = self.caption.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(caption);
            out.push_str("\n\n");
        }
        if width == 0 {
            return out.trim_end().to_string();
        }

        let grid: Vec<Vec<String>> = self
            .rows
            .iter()
            .filter(|r| !r.is_empty())
            .map(|row| {
                let mut cells: Vec<String> = Vec::with_capacity(width);
                for cell in row {
                    cells.push(escape_cell(&cell.text));
                    for _ in 1..cell.colspan.max(1) {
                        cells.push(String::new());
                    }
                }
                cells.resize(width, String::new());
                cells
            })
            .collect();

        for (i, row) in grid.iter().enumerate() {
            out.push_str(&format!("| {} |\n", row.iter().join(" | ")));
            if i == 0 {
                out.push_str(&format!("|{}\n", " --- |".repeat(width)));
            }
        }
        out.trim_end().to_string()
    }
}

fn escape_cell(text: &str) -> String {
    text.split_whitespace().join(" ").replace('|', "\\|")
}

/// Parse `attr="x" | content` into `(attrs, content)`. Pipes inside links or
/// templates do not separate.
fn split_cell_attrs(part: &str) -> (&str, &str) {
    match find_top_level(part, '|') {
        Some(i) => (part[..i].trim(), part[i + 1..].trim()),
        None => ("", part.trim()),
    }
}

fn colspan_of(attrs: &str) -> usize {
    regex_captures!(r#"(?i)colspan\s*=\s*["']?(\d+)"#, attrs)
        .and_then(|(_, n)| n.parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, 64)
}

/// Cells of one `|` or `!` line (marker already removed).
fn parse_cells(line: &str, header: bool) -> Vec<TableCell> {
    let line = if header {
        line.replace("!!", "||")
    } else {
        line.to_string()
    };
    // `||` shows up as an empty part between two cells.
    let mut cells = Vec::new();
    let mut group: Vec<&str> = Vec::new();
    let parts = split_top_level(&line, '|');
    for (i, part) in parts.iter().enumerate() {
        let at_sep = part.is_empty() && i > 0 && i + 1 < parts.len();
        if at_sep {
            if !group.is_empty() {
                cells.push(cell_from_group(&group, header));
                group.clear();
            }
            continue;
        }
        group.push(part);
    }
    if !group.is_empty() {
        cells.push(cell_from_group(&group, header));
    }
    cells
}

fn cell_from_group(group: &[&str], header: bool) -> TableCell {
    let joined = group.join("|");
    let (attrs, content) = if group.len() > 1 {
        split_cell_attrs(&joined)
    } else {
        ("", joined.trim())
    };
    let mut cell = TableCell::new(content, header);
    cell.colspan = colspan_of(attrs);
    cell
}

fn is_table_open(line: &str) -> bool {
    line.trim_start_matches([' ', ':']).starts_with("{|")
}

fn is_table_close(line: &str) -> bool {
    line.trim_start().starts_with("|}")
}

/// Parse a table from its lines, `{|` line first.
pub fn parse_table(lines: &[&str]) -> WikiTable {
    let mut table = WikiTable::default();
    let mut depth = 0usize;
    let mut current: Vec<TableCell> = Vec::new();

    for raw in lines {
        let line = raw.trim();
        if is_table_open(line) {
            depth += 1;
            continue;
        }
        if is_table_close(line) {
            depth = depth.saturating_sub(1);
            continue;
        }
        if depth != 1 {
            continue;
        }
        if let Some(caption) = line.strip_prefix("|+") {
            table.caption = Some(split_cell_attrs(caption).1.to_string());
        } else if line.starts_with("|-") {
            if !current.is_empty() {
                table.rows.push(std::mem::take(&mut current));
            }
        } else if let Some(rest) = line.strip_prefix('!') {
            current.extend(parse_cells(rest, true));
        } else if let Some(rest) = line.strip_prefix('|') {
            current.extend(parse_cells(rest, false));
        } else if let Some(last) = current.last_mut() {
            // continuation of a multi-line cell
            if !line.is_empty() {
                last.text.push(' ');
                last.text.push_str(line);
            }
        }
    }
    if !current.is_empty() {
        table.rows.push(current);
    }
    table
}

/// Remove tables from `text`, or convert them for Markdown output.
pub fn process_tables(text: &str, format: OutputFormat) -> String {
    if !text.contains("{|") {
        return text.to_string();
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0usize;

    while i < lines.len() {
        if !is_table_open(lines[i]) {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        }
        let start = i;
        let mut depth = 0usize;
        while i < lines.len() {
            if is_table_open(lines[i]) {
                depth += 1;
            } else if is_table_close(lines[i]) {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            i += 1;
        }
        let end = (i + 1).min(lines.len());
        if format == OutputFormat::Markdown {
            let md = parse_table(&lines[start..end]).to_markdown();
            if !md.is_empty() {
                out.push(String::new());
                out.push(md);
                out.push(String::new());
            }
        }
        i = end;
    }
    out.join("\n")
}
