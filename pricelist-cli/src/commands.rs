//! Pricelist subcommands

use anyhow::{Context, Result};
use clap::Subcommand;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use pricelist_core::{Catalog, CellValue, Row, SearchQuery};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List product categories
    Categories {
        /// Only categories whose name contains this text
        #[clap(long)]
        filter: Option<String>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show every product in a category
    Show {
        /// Category name
        category: String,

        /// Print the rendering role of each column instead of the rows
        #[clap(long)]
        roles: bool,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Search products by substring in one or all categories
    Search {
        /// Text to look for (case-insensitive)
        text: String,

        /// Restrict the search to one category
        #[clap(long)]
        category: Option<String>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

impl Command {
    pub async fn execute(self, catalog: &Catalog) -> Result<()> {
        match self {
            Command::Categories { filter, json } => {
                execute_categories(catalog, filter.as_deref(), json).await
            }
            Command::Show {
                category,
                roles,
                json,
            } => execute_show(catalog, &category, roles, json).await,
            Command::Search {
                text,
                category,
                json,
            } => execute_search(catalog, text, category, json).await,
        }
    }
}

/// Table row for the category listing
#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    name: String,
    #[tabled(rename = "Products")]
    products: usize,
    #[tabled(rename = "Columns")]
    columns: usize,
}

async fn execute_categories(catalog: &Catalog, filter: Option<&str>, json: bool) -> Result<()> {
    let names = catalog
        .find_categories(filter.unwrap_or(""))
        .await
        .context("Failed to load categories")?;
    let snapshot = catalog.snapshot().await?;

    let rows: Vec<CategoryRow> = names
        .iter()
        .filter_map(|name| snapshot.category(name))
        .map(|sheet| CategoryRow {
            name: sheet.name.clone(),
            products: sheet.row_count(),
            columns: sheet.columns.len(),
        })
        .collect();

    if json {
        let output: Vec<_> = rows
            .iter()
            .map(|r| serde_json::json!({"name": r.name, "products": r.products, "columns": r.columns}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No categories found.");
        return Ok(());
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
    println!(
        "\nData as of {}",
        snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}

async fn execute_show(catalog: &Catalog, category: &str, roles: bool, json: bool) -> Result<()> {
    if roles {
        let roles = catalog.get_column_roles(category).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&roles)?);
        } else {
            for (column, role) in &roles {
                println!("  {column}: {role:?}");
            }
        }
        return Ok(());
    }

    let sheet = catalog.get_category(category).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sheet)?);
        return Ok(());
    }

    println!("Total Products: {}   Category: {}\n", sheet.row_count(), sheet.name);
    println!("{}", render_rows(&sheet.columns, &sheet.rows));
    Ok(())
}

async fn execute_search(
    catalog: &Catalog,
    text: String,
    category: Option<String>,
    json: bool,
) -> Result<()> {
    let query = match category {
        Some(category) => SearchQuery::in_category(text, category),
        None => SearchQuery::everywhere(text),
    };
    let result = catalog.run_search(&query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.is_empty() {
        println!("No products match '{}'.", query.text);
        return Ok(());
    }

    println!("Found {} product(s):\n", result.count());
    println!("{}", render_rows(&result.columns, &result.rows));
    Ok(())
}

/// Render rows with a dynamic header; cells longer than 40 chars are truncated
fn render_rows(columns: &[String], rows: &[Row]) -> String {
    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for row in rows {
        builder.push_record(columns.iter().map(|column| {
            let text = row.get(column).map(CellValue::to_string).unwrap_or_default();
            truncate(&text, 40)
        }));
    }

    builder
        .build()
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars - 3).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}
