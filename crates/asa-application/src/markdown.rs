//! Markdown rendering for bot bubbles.
//!
//! Provider text is untrusted. Raw HTML in the source is turned into literal
//! text, images are reduced to their alt text, and links with a scheme
//! outside [`SAFE_SCHEMES`] are neutralized. Bare `http(s)://` URLs in prose
//! become links. The generated HTML then passes
//! through an allow-list sanitizer that drops any tag or attribute outside a
//! small formatting set.

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream, html};

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "hr", "strong", "em", "del", "code", "pre", "blockquote", "ul", "ol", "li", "a",
    "h1", "h2", "h3", "h4", "h5", "h6", "table", "thead", "tbody", "tr", "th", "td",
];

const NEUTRAL_HREF: &str = "#";

/// Converts provider Markdown to sanitized HTML.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut events = Vec::new();
    let mut link_depth = 0usize;
    let mut in_code_block = false;
    for event in TextMergeStream::new(Parser::new_ext(source, options)) {
        match event {
            Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
            Event::Start(Tag::Image { .. }) | Event::End(TagEnd::Image) => {}
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                link_depth += 1;
                let dest_url = if is_safe_url(&dest_url) {
                    dest_url
                } else {
                    CowStr::Borrowed(NEUTRAL_HREF)
                };
                events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }));
            }
            Event::End(TagEnd::Link) => {
                link_depth = link_depth.saturating_sub(1);
                events.push(Event::End(TagEnd::Link));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                events.push(Event::Start(Tag::CodeBlock(kind)));
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                events.push(Event::End(TagEnd::CodeBlock));
            }
            Event::Text(text) if link_depth == 0 && !in_code_block => push_autolinked(&mut events, text),
            other => events.push(other),
        }
    }

    let mut rendered = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut rendered, events.into_iter());
    sanitize_html(&rendered)
}

/// Splits prose around bare `http://` and `https://` URLs, wrapping each URL
/// in a link. Trailing sentence punctuation stays outside the link.
fn push_autolinked<'a>(events: &mut Vec<Event<'a>>, text: CowStr<'a>) {
    let mut rest: &str = &text;
    if find_bare_url(rest).is_none() {
        events.push(Event::Text(text));
        return;
    }

    while let Some((start, end)) = find_bare_url(rest) {
        if start > 0 {
            events.push(Event::Text(CowStr::from(rest[..start].to_string())));
        }
        let url = rest[start..end].to_string();
        events.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(url.clone()),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        events.push(Event::Text(CowStr::from(url)));
        events.push(Event::End(TagEnd::Link));
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        events.push(Event::Text(CowStr::from(rest.to_string())));
    }
}

/// Byte range of the first bare URL in `text`.
fn find_bare_url(text: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    while let Some(found) = text[offset..].find("http") {
        let start = offset + found;
        let tail = &text[start..];
        let scheme_len = if tail.starts_with("https://") {
            8
        } else if tail.starts_with("http://") {
            7
        } else {
            0
        };
        let at_boundary = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());

        if scheme_len > 0 && at_boundary {
            let run = tail
                .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"'))
                .unwrap_or(tail.len());
            let mut url = &tail[..run];
            loop {
                let trimmed = url.trim_end_matches(['.', ',', ';', ':', '!', '?', '\'']);
                let trimmed = match trimmed.strip_suffix(')') {
                    Some(inner) if inner.matches('(').count() < inner.matches(')').count() + 1 => inner,
                    _ => trimmed,
                };
                if trimmed.len() == url.len() {
                    break;
                }
                url = trimmed;
            }
            if url.len() > scheme_len {
                return Some((start, start + url.len()));
            }
        }
        offset = start + 4;
    }
    None
}

/// Escapes user-authored text for literal display.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Relative URLs and the listed schemes are safe. Whitespace and control
/// characters are ignored when reading the scheme, as browsers do.
fn is_safe_url(url: &str) -> bool {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    let scheme_end = normalized.find(':');
    let path_start = normalized.find(['/', '?', '#']);
    match (scheme_end, path_start) {
        (None, _) => true,
        (Some(colon), Some(path)) if path < colon => true,
        (Some(colon), _) => SAFE_SCHEMES.contains(&&normalized[..colon]),
    }
}

/// Rebuilds every tag from an allow-list. Text between tags is copied as is;
/// it is already escaped by the renderer.
fn sanitize_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            output.push_str(&escape_html(&rest[open..]));
            return output;
        };
        if let Some(tag) = sanitize_tag(&after[..close]) {
            output.push_str(&tag);
        }
        rest = &after[close + 1..];
    }

    output.push_str(rest);
    output
}

fn sanitize_tag(inner: &str) -> Option<String> {
    let (closing, body) = match inner.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, inner),
    };
    let body = body.trim_end_matches('/').trim_end();
    let name_end = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let name = body[..name_end].to_ascii_lowercase();
    if !ALLOWED_TAGS.contains(&name.as_str()) {
        return None;
    }
    if closing {
        return Some(format!("</{name}>"));
    }

    let mut tag = format!("<{name}");
    for (attr, value) in parse_attributes(&body[name_end..]) {
        if attribute_allowed(&name, &attr, &value) {
            tag.push_str(&format!(" {attr}=\"{value}\""));
        }
    }
    if matches!(name.as_str(), "br" | "hr") {
        tag.push_str(" /");
    }
    tag.push('>');
    Some(tag)
}

fn attribute_allowed(tag: &str, attr: &str, value: &str) -> bool {
    match (tag, attr) {
        ("a", "href") => is_safe_url(value),
        ("a", "title") => true,
        ("ol", "start") => value.chars().all(|c| c.is_ascii_digit()),
        ("code", "class") => value
            .strip_prefix("language-")
            .is_some_and(|lang| lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')),
        _ => false,
    }
}

/// Parses `name="value"` pairs. Values stay in their escaped form.
fn parse_attributes(mut input: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    loop {
        input = input.trim_start();
        let Some(eq) = input.find('=') else {
            break;
        };
        let name = input[..eq].trim().to_ascii_lowercase();
        let after = input[eq + 1..].trim_start();
        let Some(quoted) = after.strip_prefix('"') else {
            break;
        };
        let Some(end) = quoted.find('"') else {
            break;
        };
        attributes.push((name, quoted[..end].to_string()));
        input = &quoted[end + 1..];
    }
    attributes
}
