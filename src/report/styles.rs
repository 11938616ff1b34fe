use rust_xlsxwriter::Format;

use crate::config::Settings;

/// Number format for date cells.
pub const DATE_FORMAT: &str = "yyyy-mm-dd";

/// Cell formats shared by every workbook the tool writes.
///
/// Everything sits on the same base font so the output matches the house
/// style of the published reports.
#[derive(Debug, Clone)]
pub struct Styles {
    pub base: Format,
    pub currency: Format,
    pub date: Format,
    pub heading: Format,
}

impl Styles {
    /// Builds the formats for one font.
    ///
    /// # Arguments
    /// * `font_name`: font applied to every cell
    /// * `font_size`: size in points
    /// * `currency_format`: Excel number format for money cells
    pub fn new(font_name: &str, font_size: f64, currency_format: &str) -> Self {
        let base = Format::new()
            .set_font_name(font_name)
            .set_font_size(font_size);
        Self {
            currency: base.clone().set_num_format(currency_format),
            date: base.clone().set_num_format(DATE_FORMAT),
            heading: base.clone().set_bold(),
            base,
        }
    }

    /// Formats from the configured font and currency format.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.font_name,
            settings.font_size,
            &settings.currency_format,
        )
    }

    /// The currency or base format, depending on `currency`.
    pub fn number(&self, currency: bool) -> &Format {
        if currency {
            &self.currency
        } else {
            &self.base
        }
    }
}

impl Default for Styles {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
