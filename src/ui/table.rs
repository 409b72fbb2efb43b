use crate::language::Language;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

/// One capability table, flattened for display
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct LanguageRow {
    #[tabled(rename = "Language")]
    pub name: String,
    #[tabled(rename = "Extensions")]
    pub extensions: String,
    #[tabled(rename = "Delimiter")]
    pub delimiter: String,
    #[tabled(rename = "Primitives")]
    pub primitives: usize,
    #[tabled(rename = "Generics")]
    pub generics: String,
}

impl From<&Language> for LanguageRow {
    fn from(language: &Language) -> Self {
        Self {
            name: language.name.clone(),
            extensions: language.file_extensions.join(", "),
            delimiter: language.namespace_delimiter.clone(),
            primitives: language.primitive_types.len(),
            generics: language
                .generics
                .map(|(open, close)| format!("{open}{close}"))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn languages_table(rows: &[LanguageRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}
