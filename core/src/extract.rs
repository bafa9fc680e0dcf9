use scraper::{Html, Node};

/// Pull the indexable text out of a fetched body. Returns an empty string for
/// content types that are not text.
pub fn document_text(content: &[u8], content_type: &str) -> String {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("text/html") || ct.contains("application/xhtml") {
        html_text(&String::from_utf8_lossy(content))
    } else if ct.starts_with("text/") {
        String::from_utf8_lossy(content).trim().to_string()
    } else {
        String::new()
    }
}

/// Text nodes outside of script and style, trimmed and joined by single spaces.
pub fn html_text(body: &str) -> String {
    let doc = Html::parse_document(body);
    let mut out = String::new();
    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else { continue };
        let ignored = node
            .parent()
            .and_then(|p| p.value().as_element())
            .is_some_and(|e| matches!(e.name(), "script" | "style"));
        if ignored {
            continue;
        }
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(text);
    }
    out
}
