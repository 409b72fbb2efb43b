pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{diagnostic, error, header, info, section, success, summary_row, type_name, warn};
pub use table::{languages_table, stats_table, LanguageRow, TableBuilder};
pub use theme::{theme, Severity, Theme};
