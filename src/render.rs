//! Document rendering: markdown in, HTML page out.
//!
//! Each document is converted with `pulldown-cmark` and wrapped in a small
//! `maud` layout. Layout strings go through the translation [`Catalog`], so a
//! route built for a locale without a translation records the miss.
//!
//! ```text
//! <!DOCTYPE html>
//! <html lang="{locale}">
//!   <head><title>{page title} · {site title}</title></head>
//!   <body>
//!     <header><nav><a href="/{locale}/">{"Home" translated}</a></nav></header>
//!     <main>{markdown body}</main>
//!   </body>
//! </html>
//! ```

use crate::locale::Catalog;
use crate::route::{Render, RenderError, Route};
use crate::trie::Params;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Renders markdown documents with the site layout.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    catalog: Arc<Catalog>,
    site_title: String,
}

impl MarkdownRenderer {
    pub fn new(catalog: Arc<Catalog>, site_title: impl Into<String>) -> Self {
        Self {
            catalog,
            site_title: site_title.into(),
        }
    }
}

impl Render for MarkdownRenderer {
    fn render(&self, route: &Route, _params: &Params) -> Result<String, RenderError> {
        let source = route
            .source_path()
            .ok_or_else(|| RenderError::NoSource(route.url_path().to_string()))?;
        let markdown = fs::read_to_string(source)?;
        let locale = route
            .locale()
            .unwrap_or_else(|| self.catalog.default_locale());

        let title = extract_title(&markdown).unwrap_or_else(|| stem_title(source));
        let home = self.catalog.translate(locale, "Home");
        let home_href = if locale == self.catalog.default_locale() {
            "/".to_string()
        } else {
            format!("/{locale}/")
        };

        let body = render_markdown(&markdown);
        let page = base_document(
            locale,
            &format!("{} · {}", title, self.site_title),
            html! { a href=(home_href) { (home) } },
            PreEscaped(body),
        );
        Ok(page.into_string())
    }
}

/// Convert markdown to an HTML fragment.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

/// Text of the first level-one ATX heading, if any.
pub fn extract_title(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .map(str::trim_start)
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn stem_title(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().replace(['-', '_'], " "))
        .unwrap_or_default()
}

fn base_document(lang: &str, title: &str, nav: Markup, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(lang) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
            }
            body {
                header.site-header {
                    nav.site-nav { (nav) }
                }
                main { (content) }
            }
        }
    }
}
