//! Server-rendered chat page.

use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::config::SiteConfig;

const PAGE_CSS: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; color: #1f2933; }
h1 { font-size: 1.6rem; margin-bottom: 0.25rem; }
.subtitle { color: #52606d; margin-top: 0; }
form { display: flex; gap: 0.5rem; margin: 1.5rem 0; }
input[type=text] { flex: 1; padding: 0.6rem; font-size: 1rem; border: 1px solid #cbd2d9; border-radius: 4px; }
button { padding: 0.6rem 1.2rem; font-size: 1rem; border: 0; border-radius: 4px; background: #1f6feb; color: #fff; cursor: pointer; }
.notice { color: #b44d12; }
.answer { white-space: pre-wrap; background: #f5f7fa; border-left: 4px solid #1f6feb; padding: 1rem; border-radius: 4px; }
.sources { color: #7b8794; font-size: 0.85rem; }
"#;

/// What the page shows below the form.
#[derive(Debug, Default)]
pub struct PageView<'a> {
    pub query: &'a str,
    pub answer: Option<&'a str>,
    pub notice: Option<&'a str>,
    pub sources: &'a [String],
}

/// Render the chat page. `query` is echoed back into the input field.
#[must_use]
pub fn render_index(site: &SiteConfig, view: &PageView<'_>) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (site.title) }
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                h1 { (site.title) }
                p class="subtitle" { "Ask questions about " (site.topic) "." }

                form method="post" action="/" {
                    input type="text" name="query" value=(view.query)
                        placeholder="e.g. Which lines operate at 345kV?" autofocus;
                    button type="submit" { "Ask" }
                }

                @if let Some(notice) = view.notice {
                    p class="notice" { (notice) }
                }

                @if let Some(answer) = view.answer {
                    section {
                        h2 { "Answer" }
                        div class="answer" { (answer) }
                        @if !view.sources.is_empty() {
                            p class="sources" {
                                "Sources: " (view.sources.join(", "))
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_page_has_form_only() {
        let page = render_index(&SiteConfig::default(), &PageView::default()).into_string();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(r#"name="query""#));
        assert!(page.contains("Clarity Grid Chatbot"));
        assert!(!page.contains("Answer</h2>"));
    }

    #[test]
    fn test_answer_and_query_are_escaped() {
        let view = PageView {
            query: "<script>alert(1)</script>",
            answer: Some("Use <b>345kV</b>"),
            notice: None,
            sources: &[],
        };
        let page = render_index(&SiteConfig::default(), &view).into_string();
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("Use &lt;b&gt;345kV&lt;/b&gt;"));
    }

    #[test]
    fn test_sources_are_listed() {
        let sources = vec!["line-1".to_string(), "line-9".to_string()];
        let view = PageView {
            query: "q",
            answer: Some("a"),
            notice: None,
            sources: &sources,
        };
        let page = render_index(&SiteConfig::default(), &view).into_string();
        assert!(page.contains("Sources: line-1, line-9"));
    }
}
