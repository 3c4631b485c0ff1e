//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};

use crate::semantic::{CacheStats, ResultCacheStats};
use crate::types::{ArticleId, SearchResponse};

/// Widest title shown before truncation.
const TITLE_WIDTH: usize = 60;

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
        // Apply rounded corners
        table.apply_modifier(UTF8_ROUND_CORNERS);
        table.set_content_arrangement(ContentArrangement::Dynamic);
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

    /// Add a row of pre-styled cells.
    pub fn add_cells(mut self, cells: Vec<Cell>) -> Self {
        self.table.add_row(cells);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Ranked articles, best first.
pub fn create_results_table(response: &SearchResponse) -> String {
    let mut builder =
        TableBuilder::new().set_headers(vec!["#", "Score", "Title", "Source", "Published"]);

    for (rank, result) in response.articles.iter().enumerate() {
        let article = &result.article;
        let published = article
            .published_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        builder = builder.add_cells(vec![
            Cell::new(rank + 1),
            Cell::new(format!("{:.3}", result.similarity_score)).fg(score_color(
                result.similarity_score,
            )),
            Cell::new(truncate(&article.title, TITLE_WIDTH)),
            Cell::new(&article.source),
            Cell::new(published),
        ]);
    }

    builder.build()
}

/// Raw nearest neighbours from the vector cache.
pub fn create_nearest_table(neighbours: &[(ArticleId, f32)]) -> String {
    let mut builder = TableBuilder::new().set_headers(vec!["#", "Article id", "Score"]);
    for (rank, (id, score)) in neighbours.iter().enumerate() {
        builder = builder.add_row(vec![
            (rank + 1).to_string(),
            id.to_string(),
            format!("{score:.4}"),
        ]);
    }
    builder.build()
}

/// Vector cache and response cache statistics.
pub fn create_cache_stats_table(
    store: Option<&CacheStats>,
    responses: Option<&ResultCacheStats>,
) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    // Apply rounded corners for consistency
    table.apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    match store {
        Some(stats) => {
            table.add_row(vec!["Cache directory", &stats.dir.display().to_string()]);
            table.add_row(vec!["Model", &stats.model_name]);
            table.add_row(vec!["Dimension", &stats.dimension.to_string()]);
            table.add_row(vec!["Cached vectors", &stats.entries.to_string()]);
            table.add_row(vec!["Generation", &stats.generation.to_string()]);
            let updated = stats
                .updated_at
                .and_then(|t| chrono::DateTime::from_timestamp(t as i64, 0))
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string());
            table.add_row(vec!["Last persisted", &updated]);
            if stats.dirty {
                table.add_row(vec![
                    Cell::new("Uncommitted"),
                    Cell::new("yes").fg(Color::Yellow),
                ]);
            }
        }
        None => {
            table.add_row(vec![
                Cell::new("Vector cache"),
                Cell::new("disabled").fg(Color::Yellow),
            ]);
        }
    }

    if let Some(stats) = responses {
        table.add_row(vec![
            "Cached responses",
            &format!("{} ({} valid, {} expired)", stats.total, stats.valid, stats.expired),
        ]);
        table.add_row(vec!["Response TTL", &format!("{}s", stats.ttl.as_secs())]);
    }

    table.to_string()
}

fn score_color(score: f32) -> Color {
    if score >= crate::semantic::thresholds::RELEVANT {
        Color::Green
    } else if score >= crate::semantic::thresholds::RELATED {
        Color::Yellow
    } else {
        Color::Reset
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
