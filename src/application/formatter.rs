//! Output formatting for story lists.
//!
//! Supports multiple output formats: table, JSON, and Markdown.

use std::io::Write;

use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use serde::Serialize;

use super::render::{Renderer, Star, StoryRow, View};
use crate::domain::{AppError, Result};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Compact table listing.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
    /// Human-readable Markdown format.
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(format!("Unknown format: {s}. Use: table, json, markdown")),
        }
    }
}

/// Formats a story list as a table.
pub fn format_rows_table(view: View, rows: &[StoryRow<'_>]) -> String {
    if rows.is_empty() {
        return view.empty_message().to_string();
    }

    let with_star = rows.iter().any(|r| r.star.is_some());
    let with_delete = rows.iter().any(|r| r.show_delete);

    let mut header = vec!["ID"];
    if with_star {
        header.push("★");
    }
    header.extend(["Title", "Host", "Author", "Posted by"]);
    if with_delete {
        header.push("Delete");
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);

    for row in rows {
        let mut cells = vec![Cell::new(row.story.story_id())];
        if with_star {
            cells.push(match row.star {
                Some(Star::Filled) => Cell::new(Star::Filled.glyph()).fg(Color::Yellow),
                Some(Star::Empty) => Cell::new(Star::Empty.glyph()),
                None => Cell::new(""),
            });
        }
        cells.extend([
            Cell::new(truncate(row.story.title(), 50)),
            Cell::new(&row.host_name),
            Cell::new(truncate(row.story.author(), 20)),
            Cell::new(row.story.username()),
        ]);
        if with_delete {
            cells.push(Cell::new(if row.show_delete { "🗑" } else { "" }));
        }
        table.add_row(cells);
    }

    format!("{}\n{}", view.title(), table)
}

#[derive(Serialize)]
struct ViewDocument<'a> {
    view: View,
    stories: &'a [StoryRow<'a>],
}

/// Formats a story list as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_rows_json(view: View, rows: &[StoryRow<'_>]) -> Result<String> {
    serde_json::to_string_pretty(&ViewDocument {
        view,
        stories: rows,
    })
    .map_err(AppError::json_parse)
}

/// Formats a story list as Markdown.
pub fn format_rows_markdown(view: View, rows: &[StoryRow<'_>]) -> String {
    let mut out = format!("# {}\n\n", view.title());

    if rows.is_empty() {
        out.push_str(&format!("*{}*\n", view.empty_message()));
        return out;
    }

    for row in rows {
        let star = row.star.map_or("", |s| s.glyph());
        let host = if row.host_name.is_empty() {
            String::new()
        } else {
            format!(" ({})", row.host_name)
        };

        let posted = row
            .story
            .created_at()
            .map_or_else(String::new, |at| format!(" on {}", at.format("%Y-%m-%d")));

        out.push_str(&format!(
            "- {star}{}[{}]({}){host} by {}, posted by {}{posted} `{}`\n",
            if star.is_empty() { "" } else { " " },
            row.story.title(),
            row.story.url(),
            row.story.author(),
            row.story.username(),
            row.story.story_id(),
        ));
    }

    out
}

/// Formats a story list in the requested format.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn format_view(
    view: View,
    rows: &[StoryRow<'_>],
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(format_rows_table(view, rows)),
        OutputFormat::Json => format_rows_json(view, rows),
        OutputFormat::Markdown => Ok(format_rows_markdown(view, rows)),
    }
}

/// Renderer that prints lists to stdout.
pub struct TerminalRenderer {
    format: OutputFormat,
}

impl TerminalRenderer {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, view: View, rows: &[StoryRow<'_>]) {
        match format_view(view, rows, self.format) {
            Ok(output) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = writeln!(stdout, "{output}") {
                    tracing::error!(error = %e, "Failed to write output");
                }
            }
            Err(e) => tracing::error!(error = %e, view = ?view, "Failed to format view"),
        }
    }
}

/// Truncates a string to max length (in characters) with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
