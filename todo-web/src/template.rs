//! Server-side page template.
//!
//! The template is read and compiled once at startup so a missing or
//! malformed file stops the process before it accepts any traffic. Rendering
//! produces a complete `String`; handlers never stream a half-rendered page.

use std::path::{Path, PathBuf};

use minijinja::Environment;

use crate::store::TodoItem;

/// Template shipped with the binary, used when no path is configured.
pub const BUILTIN_TEMPLATE: &str = include_str!("../templates/index.html");

/// Name the page is registered under. The `.html` suffix turns on HTML
/// auto-escaping for every interpolated value.
const PAGE_NAME: &str = "index.html";

/// Errors from loading or rendering the page template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The template file could not be read.
    #[error("failed to read template {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The template source does not compile.
    #[error("invalid template: {0}")]
    Compile(#[source] minijinja::Error),

    /// Rendering failed at request time.
    #[error("{0}")]
    Render(#[source] minijinja::Error),
}

/// Compiled list page.
///
/// The template receives a single variable, `todos`, holding the items as
/// objects with `id`, `task` and `done` fields.
#[derive(Debug)]
pub struct PageTemplate {
    env: Environment<'static>,
}

impl PageTemplate {
    /// Read and compile the template at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::ReadFile`] if the file cannot be read, or
    /// [`TemplateError::Compile`] if its contents are not a valid template.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|e| TemplateError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_source(source)
    }

    /// Compile a template from source text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Compile`] on a syntax error.
    pub fn from_source(source: impl Into<String>) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.add_template_owned(PAGE_NAME, source.into())
            .map_err(TemplateError::Compile)?;
        Ok(Self { env })
    }

    /// Compile the template bundled with the binary.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Compile`] if the bundled template is broken.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_source(BUILTIN_TEMPLATE)
    }

    /// Render the page for `items` into a complete HTML document.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Render`] if evaluation fails (for example a
    /// filter error or an undefined value used in an invalid way).
    pub fn render(&self, items: &[TodoItem]) -> Result<String, TemplateError> {
        let page = self
            .env
            .get_template(PAGE_NAME)
            .map_err(TemplateError::Render)?;
        page.render(minijinja::context! { todos => items })
            .map_err(TemplateError::Render)
    }
}
