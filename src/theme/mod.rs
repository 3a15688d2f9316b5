//! Template rendering
//!
//! Page templates live in `templates/` and are embedded into the binary
//! with rust-embed, then registered with Tera at startup. Features:
//! - base template inheritance (`base.html` is loaded first)
//! - standard variables injected into every page
//! - an error page fallback when a template fails to render

use anyhow::Result;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera};

use crate::models::{User, UserRole};

mod error;

pub use error::ThemeError;

pub const SITE_NAME: &str = "Shelfnet";

/// Embedded page templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct TemplateAssets;

/// Renders the server-side pages
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Load every embedded template
    pub fn new() -> Result<Self> {
        let mut templates: Vec<(String, String)> = Vec::new();
        for name in TemplateAssets::iter() {
            let file = TemplateAssets::get(&name)
                .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|e| ThemeError::TemplateError(format!("{} is not UTF-8: {}", name, e)))?;
            templates.push((name.to_string(), content));
        }
        Self::from_templates(templates)
    }

    /// Build an engine from `(name, source)` pairs
    pub fn from_templates(mut templates: Vec<(String, String)>) -> Result<Self> {
        // Base templates first so children can resolve their parent.
        templates.sort_by(|a, b| {
            let a_is_base = a.0 == "base.html";
            let b_is_base = b.0 == "base.html";
            b_is_base.cmp(&a_is_base).then_with(|| a.0.cmp(&b.0))
        });

        let mut tera = Tera::default();
        for (name, content) in &templates {
            tera.add_raw_template(name, content)
                .map_err(|e| ThemeError::TemplateError(format!("Failed to add template {}: {}", name, e)))?;
        }
        tera.build_inheritance_chains()
            .map_err(|e| ThemeError::TemplateError(format!("Failed to build template inheritance: {}", e)))?;

        tracing::debug!("Loaded {} templates", templates.len());
        Ok(Self { tera })
    }

    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render with the standard variables added to `context`
    pub fn render_page(
        &self,
        template: &str,
        context: &TeraContext,
        vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("site_name", SITE_NAME);
        full_context.insert("request_path", &vars.request_path);
        full_context.insert("year", &vars.year);
        full_context.insert("current_user", &vars.current_user);
        full_context.insert("flash", &vars.flash);
        self.render(template, &full_context)
    }

    /// Render a page, falling back to `error.html` and then to a bare HTML
    /// message when rendering fails
    pub fn render_with_fallback(
        &self,
        template: &str,
        context: &TeraContext,
        vars: &StandardTemplateVars,
    ) -> String {
        match self.render_page(template, context, vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}, trying error template", template, e);
                match self.render_error(500, "Something went wrong.", vars) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::warn!("Failed to render error template: {}", error_template_err);
                        simple_error_page(500, "Something went wrong.")
                    }
                }
            }
        }
    }

    /// The error page for `status`
    pub fn render_error(&self, status: u16, message: &str, vars: &StandardTemplateVars) -> Result<String> {
        let mut context = TeraContext::new();
        context.insert("status", &status);
        context.insert("error_message", message);
        self.render_page("error.html", &context, vars)
    }
}

/// Last-resort page used when even the error template fails
pub fn simple_error_page(status: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Error {status}</title></head>
<body><h1>Error {status}</h1><p>{message}</p></body>
</html>"#,
        status = status,
        message = tera::escape_html(message)
    )
}

/// Variables every page receives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub current_user: Option<CurrentUser>,
    pub request_path: String,
    /// One-shot message carried over from the previous request
    pub flash: Option<String>,
    /// Current year (for the footer)
    pub year: i32,
}

/// The signed-in user as templates see it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub role: UserRole,
    pub can_manage_catalog: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            can_manage_catalog: user.can_manage_catalog(),
        }
    }
}

impl StandardTemplateVars {
    pub fn new(request_path: impl Into<String>) -> Self {
        Self {
            current_user: None,
            request_path: request_path.into(),
            flash: None,
            year: chrono::Utc::now().year(),
        }
    }

    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }

    pub fn with_flash(mut self, flash: Option<String>) -> Self {
        self.flash = flash;
        self
    }
}

use chrono::Datelike;
