//! Release title and body templates.

use super::{Error, Result};
use handlebars::Handlebars;
use serde::Serialize;

/// Default release title.
pub const DEFAULT_TITLE_TEMPLATE: &str = "{{name}} {{version}}";

/// Default release body.
pub const DEFAULT_BODY_TEMPLATE: &str = "";

#[derive(Serialize)]
struct NotesContext<'a> {
    name: &'a str,
    version: &'a str,
    tag: &'a str,
}

/// Renders release titles and bodies for newly created releases.
#[derive(Debug, Clone)]
pub struct ReleaseNotes {
    title_template: String,
    body_template: String,
}

impl Default for ReleaseNotes {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_TEMPLATE.to_string(), DEFAULT_BODY_TEMPLATE.to_string())
    }
}

impl ReleaseNotes {
    /// Creates notes from handlebars templates.
    ///
    /// Templates may reference `{{name}}`, `{{version}}` and `{{tag}}`.
    pub fn new(title_template: String, body_template: String) -> Self {
        Self {
            title_template,
            body_template,
        }
    }

    /// Renders `(title, body)`.
    pub fn render(&self, name: &str, version: &str, tag: &str) -> Result<(String, String)> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        let context = NotesContext { name, version, tag };
        let title = handlebars
            .render_template(&self.title_template, &context)
            .map_err(|e| Error::Template(e.to_string()))?;
        let body = handlebars
            .render_template(&self.body_template, &context)
            .map_err(|e| Error::Template(e.to_string()))?;

        Ok((title, body))
    }
}
