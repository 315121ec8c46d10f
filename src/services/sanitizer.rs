//! Post body sanitization
//!
//! Bodies arrive as rich-text HTML from the editor. Everything outside a
//! conservative allow-list is stripped before the body is stored.

use std::collections::HashSet;

/// URL schemes allowed in `href` and `src`
const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Allow-list HTML cleaner built on `ammonia`
pub struct HtmlSanitizer {
    cleaner: ammonia::Builder<'static>,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let mut cleaner = ammonia::Builder::default();
        cleaner
            .strip_comments(true)
            .url_schemes(URL_SCHEMES.iter().copied().collect::<HashSet<_>>())
            // Editor output: captioned figures and lazy-loaded inline images
            .add_tags(&["figure", "figcaption"])
            .add_tag_attributes("img", &["loading"])
            .link_rel(Some("noopener noreferrer"));
        Self { cleaner }
    }

    pub fn clean(&self, html: &str) -> String {
        self.cleaner.clean(html).to_string()
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}
