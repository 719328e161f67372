//! HTML content extraction heuristics.

use scraper::{Html, Selector};

use kiosko_core::types::FetchedArticle;

/// Pull a title, body, and author out of an article page.
///
/// Title preference: `og:title`, then `<title>`, then the first `<h1>`.
/// Body preference: paragraphs inside `<article>`, then all paragraphs.
/// Anything missing comes back empty; the caller validates.
pub fn extract_article(url: &str, html: &str) -> FetchedArticle {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, "meta[property=\"og:title\"]")
        .or_else(|| first_text(&doc, "title"))
        .or_else(|| first_text(&doc, "h1"))
        .unwrap_or_default();

    let text = paragraphs(&doc, "article p")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| paragraphs(&doc, "p").unwrap_or_default());

    let author = meta_content(&doc, "meta[name=\"author\"]")
        .or_else(|| meta_content(&doc, "meta[property=\"article:author\"]"));

    FetchedArticle {
        url: url.to_string(),
        title,
        text,
        author,
    }
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .next()?
        .value()
        .attr("content")
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let text = doc
        .select(&sel)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// Paragraph texts joined with blank lines. `None` when the selector
/// itself is invalid, `Some("")` when it matched nothing useful.
fn paragraphs(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let parts: Vec<String> = doc
        .select(&sel)
        .map(|p| {
            p.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
        .collect();
    Some(parts.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <meta property="og:title" content="Breaking: Something Happened">
            <meta name="author" content="A. Writer">
            <title>Fallback title</title>
          </head>
          <body>
            <h1>Header</h1>
            <article>
              <p>First   paragraph of the article body.</p>
              <p></p>
              <p>Second paragraph, with more details about the event.</p>
            </article>
            <p>Unrelated footer text outside the article.</p>
          </body>
        </html>
    "#;

    #[test]
    fn prefers_og_title_and_article_paragraphs() {
        let a = extract_article("http://e.com/a", PAGE);
        assert_eq!(a.title, "Breaking: Something Happened");
        assert_eq!(
            a.text,
            "First paragraph of the article body.\n\nSecond paragraph, with more details about the event."
        );
        assert_eq!(a.author.as_deref(), Some("A. Writer"));
        assert_eq!(a.url, "http://e.com/a");
    }

    #[test]
    fn falls_back_to_title_tag_and_bare_paragraphs() {
        let html = "<html><head><title>Plain title</title></head>\
                    <body><p>Only paragraph.</p></body></html>";
        let a = extract_article("http://e.com/b", html);
        assert_eq!(a.title, "Plain title");
        assert_eq!(a.text, "Only paragraph.");
        assert_eq!(a.author, None);
    }

    #[test]
    fn empty_page_yields_invalid_article() {
        let a = extract_article("http://e.com/c", "<html></html>");
        assert!(a.title.is_empty());
        assert!(a.text.is_empty());
        assert!(!a.is_valid());
    }
}
