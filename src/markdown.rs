// ============================================
// markdown.rs - Report Markdown-to-HTML renderer
// ============================================
// Renders the markdown subset Gemini is prompted to
// produce (bold headings, `### ` headings, `- ` lists,
// `---` rules, **bold** and [label](http..) links) into
// an HTML fragment. Malformed input degrades to
// paragraphs; rendering never fails.

use lazy_static::lazy_static;
use regex::Regex;

/// CSS hook the UI binds to for the disease detail lookup.
pub const DISEASE_LINK_CLASS: &str = "disease-info-link";

lazy_static! {
    static ref DETECTED_DISEASE_HTML: Regex =
        Regex::new(r"<strong>Detected Disease:</strong>([ \t]*)([^<]*)")
            .expect("disease marker pattern is a valid regex");
}

/// Escape special HTML characters in a string.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

// --------------------------------------------
// Block level
// --------------------------------------------

/// One structural unit of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A chunk wrapped in `**`, markers stripped.
    Heading2(String),
    /// A chunk or line opened by `### `, prefix stripped.
    Heading3(String),
    /// A line that is exactly `---`.
    Rule,
    /// A run of `- item` lines, prefixes stripped.
    List(Vec<String>),
    /// Any other non-empty line.
    Paragraph(String),
}

/// Split a report into blocks.
///
/// The trimmed input is cut on blank lines and each chunk is classified as
/// a whole. A chunk that is not a heading, list or rule becomes one block
/// per line, where a `### ` line inside it still counts as a heading.
pub fn parse_blocks(report: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut chunk: Vec<&str> = Vec::new();

    for line in report.trim().lines() {
        if line.trim().is_empty() {
            if !chunk.is_empty() {
                classify_chunk(&chunk.join("\n"), &mut blocks);
                chunk.clear();
            }
        } else {
            chunk.push(line);
        }
    }

    if !chunk.is_empty() {
        classify_chunk(&chunk.join("\n"), &mut blocks);
    }

    blocks
}

fn classify_chunk(chunk: &str, blocks: &mut Vec<Block>) {
    let chunk = chunk.trim();

    if let Some(rest) = chunk.strip_prefix("### ") {
        blocks.push(Block::Heading3(rest.trim().to_string()));
        return;
    }

    if chunk.starts_with("**") && chunk.ends_with("**") {
        // "**" and "***" overlap their own markers and leave an empty title.
        let title = chunk.get(2..chunk.len() - 2).unwrap_or("");
        blocks.push(Block::Heading2(title.to_string()));
        return;
    }

    if chunk.starts_with("- ") {
        let items = chunk
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.strip_prefix("- ").unwrap_or(line).trim().to_string())
            .collect();
        blocks.push(Block::List(items));
        return;
    }

    if chunk == "---" {
        blocks.push(Block::Rule);
        return;
    }

    for line in chunk.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.strip_prefix("### ") {
            Some(rest) => blocks.push(Block::Heading3(rest.trim().to_string())),
            None => blocks.push(Block::Paragraph(line.to_string())),
        }
    }
}

// --------------------------------------------
// Inline level
// --------------------------------------------

/// Inline content of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text(String),
    /// Children are only ever `Text` or `Link`.
    Bold(Vec<Span>),
    Link { label: String, url: String },
}

/// Intermediate unit: links are recognised before bold markers so a
/// `**` inside a link label never opens a bold run.
enum Atom {
    Char(char),
    Link { label: String, url: String },
}

impl Atom {
    fn is_star(&self) -> bool {
        matches!(self, Atom::Char('*'))
    }
}

/// Tokenize one line of text into spans.
pub fn parse_inline(text: &str) -> Vec<Span> {
    let atoms = scan_links(text);
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < atoms.len() {
        if atoms[i].is_star() && atoms.get(i + 1).is_some_and(Atom::is_star) {
            if let Some(close) = find_bold_close(&atoms, i + 2) {
                let inner = &atoms[i + 2..close];
                if !inner.is_empty() && !inner.iter().any(Atom::is_star) {
                    flush_text(&mut plain, &mut spans);
                    spans.push(Span::Bold(collect_spans(inner)));
                    i = close + 2;
                    continue;
                }
            }
        }

        match &atoms[i] {
            Atom::Char(c) => plain.push(*c),
            Atom::Link { label, url } => {
                flush_text(&mut plain, &mut spans);
                spans.push(Span::Link {
                    label: label.clone(),
                    url: url.clone(),
                });
            }
        }
        i += 1;
    }

    flush_text(&mut plain, &mut spans);
    spans
}

/// Index of the first `**` at or after `from`.
fn find_bold_close(atoms: &[Atom], from: usize) -> Option<usize> {
    (from..atoms.len().saturating_sub(1)).find(|&k| atoms[k].is_star() && atoms[k + 1].is_star())
}

fn collect_spans(atoms: &[Atom]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut plain = String::new();
    for atom in atoms {
        match atom {
            Atom::Char(c) => plain.push(*c),
            Atom::Link { label, url } => {
                flush_text(&mut plain, &mut spans);
                spans.push(Span::Link {
                    label: label.clone(),
                    url: url.clone(),
                });
            }
        }
    }
    flush_text(&mut plain, &mut spans);
    spans
}

fn flush_text(plain: &mut String, spans: &mut Vec<Span>) {
    if !plain.is_empty() {
        spans.push(Span::Text(std::mem::take(plain)));
    }
}

fn scan_links(text: &str) -> Vec<Atom> {
    let mut atoms = Vec::with_capacity(text.len());
    let mut remaining = text;

    while let Some(c) = remaining.chars().next() {
        if c == '[' {
            if let Some((label, url, consumed)) = parse_link(remaining) {
                atoms.push(Atom::Link {
                    label: label.to_string(),
                    url: url.to_string(),
                });
                remaining = &remaining[consumed..];
                continue;
            }
        }
        atoms.push(Atom::Char(c));
        remaining = &remaining[c.len_utf8()..];
    }

    atoms
}

/// Match `[label](http(s)://url)` at the start of `s`.
///
/// The label runs to the first `]`; the URL runs to the first whitespace or
/// `)` and must be closed by `)`. Returns the byte length consumed.
fn parse_link(s: &str) -> Option<(&str, &str, usize)> {
    let rest = s.strip_prefix('[')?;
    let close = rest.find(']')?;
    let label = &rest[..close];
    if label.is_empty() {
        return None;
    }

    let target = rest[close + 1..].strip_prefix('(')?;
    let scheme_len = if target.starts_with("https://") {
        "https://".len()
    } else if target.starts_with("http://") {
        "http://".len()
    } else {
        return None;
    };

    let url_end = target
        .find(|c: char| c.is_whitespace() || c == ')')
        .unwrap_or(target.len());
    if url_end <= scheme_len || !target[url_end..].starts_with(')') {
        return None;
    }

    let url = &target[..url_end];
    let consumed = 1 + close + 1 + 1 + url_end + 1;
    Some((label, url, consumed))
}

fn render_spans(spans: &[Span], out: &mut String) {
    for span in spans {
        match span {
            Span::Text(text) => out.push_str(&html_escape(text)),
            Span::Bold(children) => {
                out.push_str("<strong>");
                render_spans(children, out);
                out.push_str("</strong>");
            }
            Span::Link { label, url } => {
                out.push_str("<a href=\"");
                out.push_str(&html_escape(url));
                out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
                out.push_str(&html_escape(label));
                out.push_str("</a>");
            }
        }
    }
}

/// Render bold runs and links in `text`, escaping everything else.
pub fn format_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    render_spans(&parse_inline(text), &mut out);
    out
}

// --------------------------------------------
// Disease marker
// --------------------------------------------

/// Wrap the name after `**Detected Disease:**` in a clickable marker.
///
/// Names that are empty, "Healthy" or "Indeterminate" (any case) are left
/// alone. The name is already escaped, so it is reused verbatim as the
/// attribute value.
pub fn linkify_disease_name(paragraph_html: &str) -> String {
    let Some(caps) = DETECTED_DISEASE_HTML.captures(paragraph_html) else {
        return paragraph_html.to_string();
    };
    let Some(name_match) = caps.get(2) else {
        return paragraph_html.to_string();
    };

    let raw = name_match.as_str();
    let name = raw.trim();
    if name.is_empty()
        || name.eq_ignore_ascii_case("healthy")
        || name.eq_ignore_ascii_case("indeterminate")
    {
        return paragraph_html.to_string();
    }

    let trailing = &raw[raw.trim_end().len()..];
    let mut out = String::with_capacity(paragraph_html.len() + 96);
    out.push_str(&paragraph_html[..name_match.start()]);
    out.push_str(&format!(
        "<span class=\"{}\" data-disease-name=\"{}\" role=\"button\" tabindex=\"0\">{}</span>",
        DISEASE_LINK_CLASS, name, name
    ));
    out.push_str(trailing);
    out.push_str(&paragraph_html[name_match.end()..]);
    out
}

// --------------------------------------------
// Rendering
// --------------------------------------------

/// Render a single block to HTML.
pub fn render_block(block: &Block) -> String {
    match block {
        Block::Heading2(text) => format!("<h2>{}</h2>", format_inline(text)),
        Block::Heading3(text) => format!("<h3>{}</h3>", format_inline(text)),
        Block::Rule => "<hr>".to_string(),
        Block::List(items) => {
            let mut out = String::from("<ul>");
            for item in items {
                out.push_str("<li>");
                out.push_str(&format_inline(item));
                out.push_str("</li>");
            }
            out.push_str("</ul>");
            out
        }
        Block::Paragraph(text) => {
            linkify_disease_name(&format!("<p>{}</p>", format_inline(text)))
        }
    }
}

/// Convert a report to an HTML fragment. Empty input yields "".
pub fn render_to_html(report: &str) -> String {
    parse_blocks(report).iter().map(render_block).collect()
}
