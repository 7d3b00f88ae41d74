// src/schema/mod.rs
pub mod types;

use once_cell::sync::Lazy;
use regex::Regex;

pub use types::{Column, ColumnKind, Value};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier regex should compile")
});

/// True for a plain (optionally schema-qualified) SQL identifier that can be
/// placed in a statement without quoting.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Column layout of a target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    pub primary_key: Option<String>,
}

impl TableSchema {
    /// The daily shop settings export.
    pub fn shopify_data() -> Self {
        use ColumnKind::*;
        let columns = vec![
            Column::required("id", Text),
            Column::required("shop_domain", Text),
            Column::required("application_id", Text),
            Column::new("autocomplete_enabled", Boolean),
            Column::new("user_created_at_least_one_qr", Boolean),
            Column::new("nbr_merchandised_queries", Integer),
            Column::required("nbrs_pinned_items", Text),
            Column::new("showing_logo", Boolean),
            Column::new("has_changed_sort_orders", Boolean),
            Column::new("analytics_enabled", Boolean),
            Column::new("use_metafields", Boolean),
            Column::new("nbr_metafields", Numeric(5)),
            Column::new("use_default_colors", Boolean),
            Column::new("show_products", Boolean),
            Column::new("instant_search_enabled", Boolean),
            Column::new("instant_search_enabled_on_collection", Boolean),
            Column::new("only_using_faceting_on_collection", Boolean),
            Column::new("use_merchandising_for_collection", Boolean),
            Column::required("index_prefix", Text),
            Column::new("indexing_paused", Boolean),
            Column::required("install_channel", Text),
            Column::new("export_date", Date),
            Column::new("has_specific_prefix", Boolean),
        ];
        Self {
            columns,
            primary_key: Some("id".into()),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` for `table`; `None` if `table` is not a
    /// valid identifier.
    pub fn create_table_sql(&self, table: &str) -> Option<String> {
        if !is_valid_identifier(table) {
            return None;
        }
        let defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("    {} {}", c.name, c.kind.sql_type());
                if !c.nullable {
                    def.push_str(" NOT NULL");
                }
                if self.primary_key.as_deref() == Some(c.name.as_str()) {
                    def.push_str(" PRIMARY KEY");
                }
                def
            })
            .collect();
        Some(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            table,
            defs.join(",\n")
        ))
    }
}
