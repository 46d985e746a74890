//! Table formatting for classification and staging output.

use crate::resolution::{BatchSummary, Notice, NoticeLevel};
use crate::staging::StagedSolution;
use crate::suggestion::{ClassificationType, SolutionGroup, SuggestionsResult, UncrawledCookie};
use comfy_table::{
    Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

fn offers(solutions: &SolutionGroup) -> String {
    solutions
        .offers
        .iter()
        .map(|offer| format!("{} [{}]", offer.kind, offer.solution_unique_id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One table per non-empty bucket
pub fn create_suggestions_table(result: &SuggestionsResult, bucket: ClassificationType) -> String {
    let mut builder = TableBuilder::new().set_headers(vec![
        "Name",
        "Domain",
        "Seen",
        "Suggestion",
        "Solutions group",
        "Solutions",
    ]);

    for suggestion in result.get_suggestions_by_type(bucket) {
        builder = builder.add_row(vec![
            suggestion.suggestion.name.clone(),
            suggestion.suggestion.domain.clone(),
            suggestion.occurrence.count.to_string(),
            suggestion.suggestion.id.to_string(),
            suggestion.solutions.solutions_unique_id.to_string(),
            offers(&suggestion.solutions),
        ]);
    }

    builder.build()
}

/// Cataloged cookies the crawl never reported
pub fn create_uncrawled_table(cookies: &[UncrawledCookie]) -> String {
    let mut builder = TableBuilder::new().set_headers(vec![
        "Name",
        "Domain",
        "Cookie",
        "Ignore state",
        "Solutions group",
        "Solutions",
    ]);

    for cookie in cookies {
        builder = builder.add_row(vec![
            cookie.name.clone(),
            cookie.domain.clone(),
            cookie.cookie_id.to_string(),
            cookie.ignore_state.as_str().to_string(),
            cookie.solutions.solutions_unique_id.to_string(),
            offers(&cookie.solutions),
        ]);
    }

    builder.build()
}

/// Bucket counts with the resolvable total
pub fn create_summary_table(result: &SuggestionsResult) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        Cell::new("Bucket").add_attribute(Attribute::Bold),
        Cell::new("Suggestions").add_attribute(Attribute::Bold),
    ]);

    for bucket in ClassificationType::ALL {
        let count = result.get_suggestions_by_type(bucket).len();
        let cell = match (bucket, count) {
            (_, 0) => Cell::new(count),
            (ClassificationType::Unproblematic | ClassificationType::Ignored, _) => Cell::new(count),
            _ => Cell::new(count).fg(Color::Yellow),
        };
        table.add_row(vec![Cell::new(bucket.as_str()), cell]);
    }

    table.add_row(vec![
        Cell::new("RESOLVABLE").add_attribute(Attribute::Bold),
        Cell::new(result.get_total_number_of_resolvable_suggestions())
            .add_attribute(Attribute::Bold),
    ]);

    table.to_string()
}

pub fn create_staged_table(entries: &[StagedSolution]) -> String {
    let mut builder = TableBuilder::new().set_headers(vec![
        "Solutions group",
        "Solution",
        "Type",
        "Suggestion",
        "Staged at",
    ]);

    for entry in entries {
        builder = builder.add_row(vec![
            entry.solutions_unique_id.to_string(),
            entry.solution_unique_id.to_string(),
            entry.solution_type.clone(),
            entry.cookie_suggestion_id.to_string(),
            entry.staged_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    builder.build()
}

pub fn create_batch_table(summary: &BatchSummary) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        Cell::new("Result").add_attribute(Attribute::Bold),
        Cell::new("Count").add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("Resolved"), Cell::new(summary.success).fg(Color::Green)]);

    let errors = if summary.errors > 0 {
        Cell::new(summary.errors).fg(Color::Red).add_attribute(Attribute::Bold)
    } else {
        Cell::new(summary.errors)
    };
    table.add_row(vec![Cell::new("Failed"), errors]);
    if summary.still_staged > 0 {
        table.add_row(vec![
            Cell::new("Resolved, still staged"),
            Cell::new(summary.still_staged).fg(Color::Yellow),
        ]);
    }

    table.to_string()
}

/// Single-line rendering of a notice
pub fn format_notice(notice: &Notice) -> String {
    let marker = match notice.level {
        NoticeLevel::Success => "✓",
        NoticeLevel::Error => "✗",
    };
    match notice.count {
        Some(count) => format!("{marker} {} ({count})", notice.key),
        None => format!("{marker} {}", notice.key),
    }
}
