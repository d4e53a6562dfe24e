use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};

/// Output settings for the command line tool
#[derive(Clone, Debug, Default, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct DisplaySettings {
    /// Border style of tables: "rounded", "ascii" or "markdown"
    /// Default: "rounded"
    pub table_style: Option<TableStyle>,

    /// Colored output. `--no-color` always wins.
    /// Default: true
    pub color: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TableStyle {
    #[default]
    Rounded,
    Ascii,
    Markdown,
}

impl DisplaySettings {
    pub fn table_style(&self) -> TableStyle {
        self.table_style.unwrap_or_default()
    }

    pub fn color(&self) -> bool {
        self.color.unwrap_or(true)
    }
}
