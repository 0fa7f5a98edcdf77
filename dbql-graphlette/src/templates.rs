use dbql_core::{DbqlError, Result};
use handlebars::Handlebars;
use serde::Serialize;

pub const SHOW_TABLES: &str = "showTables";
pub const PREVIEW_TABLE: &str = "previewTable";

/// SQL statements built from Handlebars templates.
///
/// Identifiers are substituted verbatim: no quoting, no escaping. The same
/// endpoint already accepts arbitrary SQL through `executeQuery`.
pub struct StatementTemplates {
    hbs: Handlebars<'static>,
}

impl StatementTemplates {
    pub fn new() -> Result<Self> {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        hbs.register_escape_fn(handlebars::no_escape);
        hbs.register_template_string(SHOW_TABLES, "SHOW TABLES IN {{database}}")
            .map_err(|e| DbqlError::Template(e.to_string()))?;
        hbs.register_template_string(
            PREVIEW_TABLE,
            "SELECT * FROM {{database}}.{{table}} LIMIT {{limit}}",
        )
        .map_err(|e| DbqlError::Template(e.to_string()))?;
        Ok(Self { hbs })
    }

    pub fn render<T: Serialize>(&self, name: &str, args: &T) -> Result<String> {
        self.hbs
            .render(name, args)
            .map_err(|e| DbqlError::Template(e.to_string()))
    }
}
