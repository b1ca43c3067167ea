/*!
HTML cleanup for expanded wikitext.

After template expansion the text still carries HTML-like markup: comments,
formatting tags, reference and gallery elements, `<br>`s, entities and the wiki
bold/italic quote runs. `HtmlCleaner::clean` reduces all of it to the shape the
requested output format wants.

Tag handling is a single pass over tag tokens found by a flat regex:
- discard elements (`ref`, `gallery`, `table`, ...) are removed with their
  content; same-name nesting is matched with a stack, and an opener that never
  closes only loses the tag itself
- ignored tags (`span`, `b`, `div`, ...) are unwrapped, keeping their content
- unknown tags are left as literal text

The module also defines the [`HtmlSanitizer`] collaborator interface and a
default stack-based [`TagBalancer`].
*/

use std::collections::HashMap;

use lazy_regex::{regex, regex_captures, regex_replace_all};
use regex::Captures;

use crate::wikitext::enums::OutputFormat;

/// Elements removed together with their content.
pub const DISCARD_ELEMENTS: &[&str] = &[
    "gallery",
    "timeline",
    "noinclude",
    "pre",
    "table",
    "tr",
    "td",
    "th",
    "caption",
    "form",
    "input",
    "select",
    "option",
    "textarea",
    "ul",
    "li",
    "ol",
    "dl",
    "dt",
    "dd",
    "menu",
    "dir",
    "ref",
    "references",
    "img",
    "imagemap",
    "source",
    "small",
    "score",
    "graph",
    "templatedata",
    "style",
    "script",
    "math",
];

/// Tags dropped while their content is kept.
pub const IGNORED_TAGS: &[&str] = &[
    "abbr",
    "b",
    "bdi",
    "bdo",
    "big",
    "blockquote",
    "center",
    "ce",
    "chem",
    "cite",
    "code",
    "data",
    "del",
    "dfn",
    "div",
    "em",
    "font",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hiero",
    "i",
    "includeonly",
    "ins",
    "kbd",
    "mark",
    "nowiki",
    "onlyinclude",
    "p",
    "plaintext",
    "poem",
    "q",
    "s",
    "samp",
    "section",
    "span",
    "strike",
    "strong",
    "sub",
    "sup",
    "syntaxhighlight",
    "time",
    "tt",
    "u",
    "var",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Open,
    Close,
    SelfClosing,
}

#[derive(Debug, Clone)]
struct TagToken {
    start: usize,
    end: usize,
    name: String,
    kind: TagKind,
}

fn tag_token(c: Captures<'_>) -> Option<TagToken> {
    let whole = c.get(0)?;
    let closing = c.get(1).is_some_and(|m| !m.is_empty());
    let self_closing = c.get(3).is_some_and(|m| !m.is_empty());
    let kind = match (closing, self_closing) {
        (true, _) => TagKind::Close,
        (false, true) => TagKind::SelfClosing,
        (false, false) => TagKind::Open,
    };
    Some(TagToken {
        start: whole.start(),
        end: whole.end(),
        name: c.get(2)?.as_str().to_ascii_lowercase(),
        kind,
    })
}

fn tag_tokens(text: &str) -> Vec<TagToken> {
    regex!(r"<(/?)([A-Za-z][A-Za-z0-9]*)\b[^<>]*?(/?)>")
        .captures_iter(text)
        .filter_map(tag_token)
        .collect()
}

/// Pair every discard-element opener with its closer (innermost first).
fn match_discard_pairs(tokens: &[TagToken]) -> HashMap<usize, usize> {
    let mut open: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut pairs = HashMap::new();
    for (i, tok) in tokens.iter().enumerate() {
        if !DISCARD_ELEMENTS.contains(&tok.name.as_str()) {
            continue;
        }
        match tok.kind {
            TagKind::Open => open.entry(tok.name.as_str()).or_default().push(i),
            TagKind::Close => {
                if let Some(o) = open.get_mut(tok.name.as_str()).and_then(Vec::pop) {
                    pairs.insert(o, i);
                }
            }
            TagKind::SelfClosing => {}
        }
    }
    pairs
}

/// Remove `<!-- ... -->` comments. An unterminated comment is left alone.
pub fn remove_comments(text: &str) -> String {
    regex_replace_all!(r"(?s)<!--.*?-->", text, "").into_owned()
}

/// Drop discard elements, unwrap ignored tags and turn breaks into spaces.
pub fn strip_tags(text: &str) -> String {
    let tokens = tag_tokens(text);
    if tokens.is_empty() {
        return text.to_string();
    }
    let pairs = match_discard_pairs(&tokens);

    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut i = 0usize;
    while i < tokens.len() {
        let tok = &tokens[i];
        if tok.start < last {
            // inside a region that was already dropped
            i += 1;
            continue;
        }
        out.push_str(&text[last..tok.start]);
        last = tok.end;
        let name = tok.name.as_str();

        if DISCARD_ELEMENTS.contains(&name) {
            if let Some(&close) = pairs.get(&i) {
                last = tokens[close].end;
                i = close + 1;
                continue;
            }
        } else if name == "br" {
            out.push(' ');
        } else if name == "hr" {
            out.push('\n');
        } else if !IGNORED_TAGS.contains(&name) && name != "wbr" && name != "nobr" {
            out.push_str(&text[tok.start..tok.end]);
        }
        i += 1;
    }
    out.push_str(&text[last..]);
    out
}

/// Render wiki bold/italic quote runs for `format`.
///
/// HTML gets `<b>`/`<i>`, Markdown `**`/`*`; plain text drops bold and puts
/// italics in double quotes. Unpaired runs are removed.
pub fn apply_formatting(text: &str, format: OutputFormat) -> String {
    let text = match format {
        OutputFormat::Html => {
            let t = regex_replace_all!(r"'''''(.*?)'''''", text, "<b><i>${1}</i></b>");
            let t = regex_replace_all!(r"'''(.*?)'''", &t, "<b>${1}</b>");
            regex_replace_all!(r"''(.*?)''", &t, "<i>${1}</i>").into_owned()
        }
        OutputFormat::Markdown => {
            let t = regex_replace_all!(r"'''''(.*?)'''''", text, "***${1}***");
            let t = regex_replace_all!(r"'''(.*?)'''", &t, "**${1}**");
            regex_replace_all!(r"''(.*?)''", &t, "*${1}*").into_owned()
        }
        OutputFormat::Text | OutputFormat::Json => {
            let t = regex_replace_all!(r"'''''(.*?)'''''", text, "\"${1}\"");
            let t = regex_replace_all!(r"'''(.*?)'''", &t, "${1}");
            let t = regex_replace_all!(r#"''"([^"]*?)"''"#, &t, "\"${1}\"");
            let t = regex_replace_all!(r"''(.*?)''", &t, "\"${1}\"");
            regex_replace_all!(r#""("[^"]*?")""#, &t, "${1}").into_owned()
        }
    };
    regex_replace_all!(r"'{2,}", &text, "").into_owned()
}

/// Decode HTML entities. With `keep_markup_escapes`, `&lt;`, `&gt;` and
/// `&amp;` survive so decoded text cannot forge tags in HTML output.
pub fn decode_entities(text: &str, keep_markup_escapes: bool) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let decoded = if keep_markup_escapes {
        let guarded = text
            .replace("&lt;", "\u{e010}")
            .replace("&gt;", "\u{e011}")
            .replace("&amp;", "\u{e012}");
        html_escape::decode_html_entities(&guarded)
            .replace('\u{e010}', "&lt;")
            .replace('\u{e011}', "&gt;")
            .replace('\u{e012}', "&amp;")
    } else {
        html_escape::decode_html_entities(text).into_owned()
    };
    decoded.replace('\u{a0}', " ")
}

/// Escape `&`, `<` and `>` so plain output is safe to embed in HTML.
pub fn escape_text(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// HTML cleanup pass for one output format.
#[derive(Debug, Clone, Copy)]
pub struct HtmlCleaner {
    format: OutputFormat,
}

impl HtmlCleaner {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn clean(&self, text: &str) -> String {
        let text = remove_comments(text);
        let text = strip_tags(&text);
        let text = apply_formatting(&text, self.format);
        let text = decode_entities(&text, self.format == OutputFormat::Html);
        text.replace("<<", "\u{ab}").replace(">>", "\u{bb}")
    }
}

/// Post-pass applied to HTML output: must return tag-balanced markup.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

/// Tags the default sanitizer lets through.
const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "i", "em", "strong", "sub", "sup", "code", "p", "h1", "h2", "h3", "h4", "h5", "h6",
    "ul", "ol", "li", "dl", "dt", "dd", "blockquote",
];

const VOID_TAGS: &[&str] = &["br", "hr"];

/// Default sanitizer: keeps a small set of tags, balances them with a stack,
/// escapes everything else and drops unsafe link targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagBalancer;

impl TagBalancer {
    fn open_tag(name: &str, raw: &str) -> String {
        if name != "a" {
            return format!("<{}>", name);
        }
        match regex_captures!(r#"(?i)href\s*=\s*"([^"]*)""#, raw) {
            Some((_, href)) if !is_unsafe_href(href) => format!("<a href=\"{}\">", href),
            _ => "<a>".to_string(),
        }
    }
}

fn is_unsafe_href(href: &str) -> bool {
    let h = href.trim().to_ascii_lowercase();
    h.starts_with("javascript:") || h.starts_with("data:") || h.starts_with("vbscript:")
}

fn escape_angles(s: &str) -> String {
    s.replace('<', "&lt;").replace('>', "&gt;")
}

impl HtmlSanitizer for TagBalancer {
    fn sanitize(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut stack: Vec<String> = Vec::new();
        let mut last = 0usize;

        for tok in tag_tokens(html) {
            out.push_str(&escape_angles(&html[last..tok.start]));
            last = tok.end;
            let raw = &html[tok.start..tok.end];
            let name = tok.name.as_str();

            if VOID_TAGS.contains(&name) {
                if tok.kind != TagKind::Close {
                    out.push_str(&format!("<{}>", name));
                }
                continue;
            }
            if !ALLOWED_TAGS.contains(&name) {
                out.push_str(&escape_angles(raw));
                continue;
            }
            match tok.kind {
                TagKind::Open => {
                    out.push_str(&Self::open_tag(name, raw));
                    stack.push(tok.name.clone());
                }
                TagKind::SelfClosing => {}
                TagKind::Close => {
                    if stack.iter().any(|t| t == name) {
                        while let Some(top) = stack.pop() {
                            out.push_str(&format!("</{}>", top));
                            if top == name {
                                break;
                            }
                        }
                    }
                }
            }
        }
        out.push_str(&escape_angles(&html[last..]));
        while let Some(top) = stack.pop() {
            out.push_str(&format!("</{}>", top));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discard_elements_with_nesting() {
        let s = "a<ref>x<ref>y</ref>z</ref>b<table><tr><td>1</td></tr></table>c";
        assert_eq!(strip_tags(s), "abc");
    }

    #[test]
    fn unclosed_discard_loses_only_tag() {
        assert_eq!(strip_tags("a<ref name=x>b"), "ab");
    }

    #[test]
    fn self_closing_and_breaks() {
        assert_eq!(strip_tags("a<ref name=\"n\"/>b<br/>c<br>d"), "ab c d");
    }

    #[test]
    fn ignored_tags_unwrap_and_unknown_stay() {
        assert_eq!(strip_tags("<span class=\"x\">in</span> <foo>"), "in <foo>");
    }

    #[test]
    fn comments_removed() {
        assert_eq!(remove_comments("a<!-- x\ny -->b<!-- open"), "ab<!-- open");
    }

    #[test]
    fn formatting_per_format() {
        let s = "'''bold''' and ''it''";
        assert_eq!(apply_formatting(s, OutputFormat::Text), "bold and \"it\"");
        assert_eq!(apply_formatting(s, OutputFormat::Markdown), "**bold** and *it*");
        assert_eq!(apply_formatting(s, OutputFormat::Html), "<b>bold</b> and <i>it</i>");
        assert_eq!(apply_formatting("dangling '' quote", OutputFormat::Text), "dangling  quote");
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("a&nbsp;b &amp; &eacute;", false), "a b & é");
        assert_eq!(decode_entities("&lt;b&gt; &eacute;", true), "&lt;b&gt; é");
        assert_eq!(escape_text("a<b & c"), "a&lt;b &amp; c");
    }

    #[test]
    fn cleaner_pipeline() {
        let c = HtmlCleaner::new(OutputFormat::Text);
        assert_eq!(
            c.clean("Hi <small>tiny</small>''there''<ref>cite</ref> &lt;&lt;q&gt;&gt;"),
            "Hi \"there\" \u{ab}q\u{bb}"
        );
    }

    #[test]
    fn balancer_closes_and_escapes() {
        let b = TagBalancer;
        assert_eq!(b.sanitize("<p><b>x</p>"), "<p><b>x</b></p>");
        assert_eq!(b.sanitize("</i>y<script>z"), "y&lt;script&gt;z");
        assert_eq!(
            b.sanitize("<a href=\"javascript:alert(1)\">l</a>"),
            "<a>l</a>"
        );
        assert_eq!(b.sanitize("a<br/>b"), "a<br>b");
        assert_eq!(b.sanitize("<ul><li>1"), "<ul><li>1</li></ul>");
    }
}
