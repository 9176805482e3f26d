// DOM extraction shared by every renderer

use crate::result::{OpenGraphMeta, PageExtract, TwitterMeta};
use crate::urls::resolve_href;
use scraper::{ElementRef, Html, Selector};

/// Build a [`PageExtract`] from serialized DOM. `body_text` is the browser's
/// rendered text when available; otherwise visible text is collected from
/// the markup.
pub fn extract_page(url: &str, html: &str, body_text: Option<&str>) -> PageExtract {
    let document = Html::parse_document(html);
    let metas = meta_pairs(&document);
    let meta = |key: &str| -> Option<String> {
        metas
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
    };

    let raw_text = match body_text {
        Some(text) => text.to_string(),
        None => visible_text(&document),
    };

    PageExtract {
        url: url.to_string(),
        title: first_text(&document, "title"),
        description: meta("description").unwrap_or_default(),
        canonical_link: canonical_link(&document, url),
        robots_meta: meta("robots"),
        normalized_body_text: normalize_body_text(&raw_text),
        outbound_links: outbound_links(&document, url),
        twitter: TwitterMeta {
            card: meta("twitter:card"),
            title: meta("twitter:title"),
            description: meta("twitter:description"),
            image: meta("twitter:image"),
            site: meta("twitter:site"),
        },
        og: OpenGraphMeta {
            title: meta("og:title"),
            description: meta("og:description"),
            image: meta("og:image"),
            url: meta("og:url"),
            kind: meta("og:type"),
        },
    }
}

/// Collapse whitespace, drop non-ASCII punctuation and lower-case.
pub fn normalize_body_text(input: &str) -> String {
    let stripped: String = input
        .chars()
        .filter(|c| !is_non_ascii_punctuation(*c))
        .collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_non_ascii_punctuation(c: char) -> bool {
    if c.is_ascii() || c.is_whitespace() {
        return false;
    }
    matches!(c as u32,
        0x00A1 | 0x00A7 | 0x00AB | 0x00B6 | 0x00B7 | 0x00BB | 0x00BF  // ¡ § « ¶ · » ¿
        | 0x2010..=0x2027   // dashes, quotes, bullets, ellipsis
        | 0x2030..=0x205E   // per mille, primes, guillemets
        | 0x2E00..=0x2E7F   // supplemental punctuation
        | 0x3001..=0x3003
        | 0x3008..=0x3011
        | 0xFE10..=0xFE19
        | 0xFE30..=0xFE4F
        | 0xFF01..=0xFF0F
        | 0xFF1A..=0xFF20)
}

fn first_text(document: &Html, css: &str) -> String {
    let Ok(selector) = Selector::parse(css) else {
        return String::new();
    };
    document
        .select(&selector)
        .map(|el| collapse(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn collapse(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `(name-or-property lowercased, content)` for every `<meta>` tag.
fn meta_pairs(document: &Html) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse("meta[content]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| {
            let attrs = el.value();
            let key = attrs.attr("name").or_else(|| attrs.attr("property"))?;
            let content = attrs.attr("content")?;
            Some((key.trim().to_ascii_lowercase(), collapse(content)))
        })
        .collect()
}

fn canonical_link(document: &Html, page_url: &str) -> Option<String> {
    let selector = Selector::parse("link[rel][href]").ok()?;
    document
        .select(&selector)
        .find(|el| {
            el.value()
                .attr("rel")
                .map(|rel| {
                    rel.split_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("canonical"))
                })
                .unwrap_or(false)
        })
        .and_then(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| resolve_href(page_url, href).unwrap_or_else(|| href.to_string()))
}

/// Absolute anchor targets in document order. Duplicates are kept; callers
/// decide how to count them.
fn outbound_links(document: &Html, page_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_href(page_url, href))
        .collect()
}

fn visible_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&selector).next() else {
        return String::new();
    };

    let mut out = String::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ElementRef::wrap(ancestor)
                .map(|el| {
                    matches!(
                        el.value().name(),
                        "script" | "style" | "noscript" | "template"
                    )
                })
                .unwrap_or(false)
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}
