use std::{
    fmt::Display,
    sync::{LazyLock, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use nu_ansi_term::Color;
use pkgdb_config::display::TableStyle;
use tabled::{settings::Style, Table};

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub fn set_color(enabled: bool) {
    *COLOR.write().unwrap_or_else(PoisonError::into_inner) = enabled;
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = *COLOR.read().unwrap_or_else(PoisonError::into_inner);
        if color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

pub fn apply_style(table: &mut Table, style: TableStyle) {
    match style {
        TableStyle::Rounded => table.with(Style::rounded()),
        TableStyle::Ascii => table.with(Style::ascii()),
        TableStyle::Markdown => table.with(Style::markdown()),
    };
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use nu_ansi_term::Color::Red;

    use super::*;

    #[test]
    fn test_format_time() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 15).unwrap();
        assert_eq!(format_time(time), "2024-03-09 08:30:15 UTC");
    }

    #[test]
    fn test_colored_without_color() {
        set_color(false);
        assert_eq!(Colored(Red, "plain").to_string(), "plain");
        set_color(true);
    }
}
