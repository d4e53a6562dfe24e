//! Turning `documented` field docs into TOML comments.

use std::any::type_name;

use documented::{Documented, DocumentedFields};
use toml_edit::{ArrayOfTables, Decor, Item, RawString, Table};
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Appends `docs` to the comment prefix of `decor`, one `#` line per doc line.
///
/// An existing prefix is kept and separated from the new comments by an empty
/// comment line unless it already ends with a blank line.
pub fn append_docs_as_toml_comments(decor: &mut Decor, docs: &str) {
    let comments: String = docs
        .lines()
        .map(|line| {
            if line.is_empty() {
                "#\n".to_string()
            } else {
                format!("# {line}\n")
            }
        })
        .collect();

    let existing = decor
        .prefix()
        .and_then(RawString::as_str)
        .unwrap_or_default();
    let prefix = match existing.lines().last() {
        None => comments,
        Some("") => format!("{existing}{comments}"),
        Some(_) => format!("{existing}#\n{comments}"),
    };
    decor.set_prefix(prefix);
}

/// Comments every key of `table` with the matching field docs of `T`.
///
/// Nested tables also receive the container docs of `T` unless `is_root`.
pub fn annotate_toml_table<T>(table: &mut Table, is_root: bool) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    if !is_root {
        append_docs_as_toml_comments(table.decor_mut(), T::DOCS);
    }

    for (mut key, item) in table.iter_mut() {
        let name = key.get().to_string();
        let Ok(docs) = T::get_field_docs(&name) else {
            warn!(
                field = %name,
                container = type_name::<T>(),
                "no documentation for TOML key"
            );
            continue;
        };

        match item {
            Item::None => return Err(ConfigError::UnexpectedTomlItem(name)),
            Item::Value(_) => append_docs_as_toml_comments(key.leaf_decor_mut(), docs),
            Item::Table(sub_table) => append_docs_as_toml_comments(sub_table.decor_mut(), docs),
            Item::ArrayOfTables(array) => {
                if let Some(first) = array.iter_mut().next() {
                    append_docs_as_toml_comments(first.decor_mut(), docs);
                }
            }
        }
    }

    Ok(())
}

/// Annotates the first table of `array` with the field docs of `T`.
///
/// Entries share one shape, so the remaining tables stay uncommented.
pub fn annotate_toml_array_of_tables<T>(array: &mut ArrayOfTables) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    match array.iter_mut().next() {
        Some(first) => annotate_toml_table::<T>(first, false),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn prefix(decor: &Decor) -> String {
        decor
            .prefix()
            .and_then(RawString::as_str)
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_append_docs_multiline_with_blank() {
        let mut decor = Decor::new("", "");
        append_docs_as_toml_comments(&mut decor, "Line 1\n\nLine 2");
        assert_eq!(prefix(&decor), "# Line 1\n#\n# Line 2\n");
    }

    #[test]
    fn test_append_docs_keeps_existing_prefix() {
        let mut decor = Decor::new("# existing\n", "");
        append_docs_as_toml_comments(&mut decor, "More");
        assert_eq!(prefix(&decor), "# existing\n#\n# More\n");

        let mut decor = Decor::new("\n", "");
        append_docs_as_toml_comments(&mut decor, "More");
        assert_eq!(prefix(&decor), "\n# More\n");
    }

    #[test]
    fn test_annotated_default_config() {
        let doc = Config::default_config().to_annotated_document().unwrap();
        let text = doc.to_string();
        assert!(text.contains("# Path of the package database snapshot"));
        assert!(text.contains("# Artifact types registered"));
        assert!(text.contains("# Border style of tables"));
        assert!(text.contains("# Whether the type's packages can be installed"));
    }
}
