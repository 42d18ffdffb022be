//! Heading extractor
//!
//! Pulls the text of the first element matching a CSS selector, by default
//! the product page title `<h1 class="page-title">`.

use crate::extract::{ExtractError, Extractor, Fields};
use crate::ConfigError;
use scraper::{Html, Selector};

/// Extracts `{"title": <text>}` from markup
#[derive(Debug)]
pub struct HeadingExtractor {
    selector: Selector,
    selector_text: String,
}

impl HeadingExtractor {
    /// Creates an extractor for the given CSS selector
    ///
    /// # Example
    ///
    /// ```
    /// use harvest_relay::extract::{Extractor, HeadingExtractor};
    ///
    /// let extractor = HeadingExtractor::new("h1.page-title").unwrap();
    /// let fields = extractor
    ///     .extract(r#"<html><body><h1 class="page-title"> Ring </h1></body></html>"#)
    ///     .unwrap();
    /// assert_eq!(fields["title"], "Ring");
    /// ```
    pub fn new(selector: &str) -> Result<Self, ConfigError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;

        Ok(Self {
            selector: parsed,
            selector_text: selector.to_string(),
        })
    }
}

impl Extractor for HeadingExtractor {
    fn name(&self) -> &'static str {
        "heading"
    }

    fn extract(&self, body: &str) -> Result<Fields, ExtractError> {
        let document = Html::parse_document(body);

        let element = document
            .select(&self.selector)
            .next()
            .ok_or_else(|| ExtractError::MissingElement(self.selector_text.clone()))?;

        let text = element.text().collect::<String>().trim().to_string();
        if text.is_empty() {
            return Err(ExtractError::EmptyElement(self.selector_text.clone()));
        }

        let mut fields = Fields::new();
        fields.insert("title".to_string(), serde_json::Value::String(text));
        Ok(fields)
    }
}
