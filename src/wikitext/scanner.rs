/*!
Bracket scanner for MediaWiki-style markup.

The scanner locates top-level bracketed constructs in a text buffer:
- `{{{...}}}` template parameters
- `{{...}}` template invocations
- `[[...]]` internal links
- `[url label]` external links
- opaque extension tags such as `<math>...</math>`, `<nowiki>...</nowiki>`,
  `<ref>...</ref>`, and `<!-- comments -->`

Brace and link pairs are resolved in one linear pass with an explicit stack per
bracket kind, so nesting depth never turns into recursion or regex
backtracking. Unbalanced openers simply never get a span and read as plain
text. All results are `Span`s (byte ranges) into the scanned buffer.
*/

use std::collections::HashMap;

/// Extension tags whose content is never scanned for nested markup.
pub const OPAQUE_TAGS: &[&str] = &[
    "math",
    "chem",
    "ce",
    "nowiki",
    "pre",
    "ref",
    "references",
    "gallery",
    "timeline",
    "imagemap",
    "source",
    "syntaxhighlight",
    "score",
    "hiero",
    "graph",
    "templatedata",
];

/// URL protocols recognized at the start of a bracketed external link.
pub const URL_PROTOCOLS: &[&str] = &[
    "bitcoin:",
    "ftp://",
    "ftps://",
    "geo:",
    "git://",
    "gopher://",
    "http://",
    "https://",
    "irc://",
    "ircs://",
    "magnet:",
    "mailto:",
    "mms://",
    "news:",
    "nntp://",
    "redis://",
    "sftp://",
    "sip:",
    "sips:",
    "sms:",
    "ssh://",
    "svn://",
    "tel:",
    "telnet://",
    "urn:",
    "worldwind://",
    "xmpp:",
    "//",
];

/// Kind of a scanned span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Plain,
    Template,
    Parameter,
    InternalLink,
    ExternalLink,
    Math,
    Tag,
    Comment,
}

/// Half-open byte range `[start, end)` into a buffer, tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(kind: SpanKind, start: usize, end: usize) -> Self {
        Self { kind, start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The full text covered by this span, delimiters included.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    /// The content between the span's delimiters.
    ///
    /// For tags this is the text between the opening tag's `>` and the closing
    /// tag; self-closing tags have no content.
    pub fn inner<'a>(&self, text: &'a str) -> &'a str {
        let s = self.slice(text);
        match self.kind {
            SpanKind::Plain => s,
            SpanKind::Template | SpanKind::InternalLink => &s[2..s.len() - 2],
            SpanKind::Parameter => &s[3..s.len() - 3],
            SpanKind::ExternalLink => &s[1..s.len() - 1],
            SpanKind::Comment => &s[4..s.len() - 3],
            SpanKind::Math | SpanKind::Tag => {
                let Some(gt) = s.find('>') else {
                    return "";
                };
                if s[..gt].ends_with('/') {
                    return "";
                }
                let body = &s[gt + 1..];
                match body.rfind("</") {
                    Some(p) => &body[..p],
                    None => body,
                }
            }
        }
    }

    /// Name of a tag span (`math`, `ref`, ...), as written in the source.
    pub fn tag_name<'a>(&self, text: &'a str) -> Option<&'a str> {
        if !matches!(self.kind, SpanKind::Math | SpanKind::Tag) {
            return None;
        }
        let s = &self.slice(text)[1..];
        let len = s.bytes().take_while(|b| b.is_ascii_alphanumeric()).count();
        Some(&s[..len])
    }

    /// Shift the span by `offset`, e.g. when a span found in a slice must be
    /// expressed against the enclosing buffer.
    pub fn rebase(&self, offset: usize) -> Span {
        Span::new(self.kind, self.start + offset, self.end + offset)
    }
}

/// Failure memo so repeated unbalanced openers do not rescan the rest of the
/// buffer. A search that found no closer from position `p` cannot succeed
/// from any later position.
#[derive(Debug, Default)]
struct TagMemo {
    comment_unclosed_from: Option<usize>,
    no_gt_from: Option<usize>,
    unclosed: HashMap<&'static str, usize>,
}

/// Scanner over one text buffer.
#[derive(Debug)]
pub struct BracketScanner<'a> {
    text: &'a str,
    lower: String,
    index: HashMap<usize, Span>,
    pos: usize,
    ext_unclosed_before: usize,
}

impl<'a> BracketScanner<'a> {
    /// Build a scanner positioned at the start of `text`.
    pub fn new(text: &'a str) -> Self {
        let lower = text.to_ascii_lowercase();
        let index = index_constructs(text, &lower);
        Self {
            text,
            lower,
            index,
            pos: 0,
            ext_unclosed_before: 0,
        }
    }

    /// Produce the next top-level construct, skipping plain text. Returns
    /// `None` at end of input.
    pub fn next_construct(&mut self) -> Option<Span> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let i = self.pos;
            if let Some(span) = self.index.get(&i).copied() {
                self.pos = span.end;
                return Some(span);
            }
            if bytes[i] == b'['
                && bytes.get(i + 1) != Some(&b'[')
                && let Some(span) = self.match_external_link(i)
            {
                self.pos = span.end;
                return Some(span);
            }
            self.pos += 1;
        }
        None
    }

    /// Iterate over the whole remaining buffer as consecutive spans: plain
    /// text runs interleaved with constructs.
    pub fn segments(self) -> Segments<'a> {
        let last = self.pos;
        Segments {
            scanner: self,
            pending: None,
            last,
        }
    }

    fn match_external_link(&mut self, start: usize) -> Option<Span> {
        if start < self.ext_unclosed_before {
            return None;
        }
        let rest = &self.lower[start + 1..];
        let proto = URL_PROTOCOLS.iter().find(|p| rest.starts_with(**p))?;
        let bytes = self.text.as_bytes();
        let url_start = start + 1 + proto.len();
        let mut i = url_start;
        while i < bytes.len() && !is_url_stop(bytes[i]) {
            i += 1;
        }
        if i == url_start {
            return None;
        }
        while i < bytes.len() {
            match bytes[i] {
                b']' => return Some(Span::new(SpanKind::ExternalLink, start, i + 1)),
                b'\n' => break,
                _ => i += 1,
            }
        }
        self.ext_unclosed_before = i;
        None
    }
}

/// Iterator returned by [`BracketScanner::segments`].
#[derive(Debug)]
pub struct Segments<'a> {
    scanner: BracketScanner<'a>,
    pending: Option<Span>,
    last: usize,
}

impl Iterator for Segments<'_> {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        if let Some(span) = self.pending.take() {
            self.last = span.end;
            return Some(span);
        }
        let start = self.last;
        match self.scanner.next_construct() {
            Some(span) if span.start > start => {
                self.pending = Some(span);
                self.last = span.start;
                Some(Span::new(SpanKind::Plain, start, span.start))
            }
            Some(span) => {
                self.last = span.end;
                Some(span)
            }
            None => {
                let end = self.scanner.text.len();
                if start < end {
                    self.last = end;
                    Some(Span::new(SpanKind::Plain, start, end))
                } else {
                    None
                }
            }
        }
    }
}

fn is_url_stop(b: u8) -> bool {
    b.is_ascii_whitespace() || b < 0x20 || b == 0x7f || matches!(b, b'[' | b']' | b'<' | b'>' | b'"')
}

fn run_length(bytes: &[u8], start: usize, ch: u8) -> usize {
    bytes[start..].iter().take_while(|b| **b == ch).count()
}

/// Split an opening brace run into stacked openers, outermost first.
/// `{{{` is a parameter and wins over `{{` at the same position.
fn push_brace_run(braces: &mut Vec<(usize, usize)>, start: usize, run: usize) {
    let mut offset = start;
    let mut left = run;
    while left >= 2 {
        let width = if left == 3 || left >= 5 { 3 } else { 2 };
        braces.push((offset, width));
        offset += width;
        left -= width;
    }
}

fn close_brace_run(
    braces: &mut Vec<(usize, usize)>,
    spans: &mut HashMap<usize, Span>,
    at: usize,
    run: usize,
) {
    let mut pos = at;
    let mut avail = run;
    while avail >= 2 {
        let Some((start, width)) = braces.pop() else {
            break;
        };
        if width == 3 && avail >= 3 {
            spans.insert(start, Span::new(SpanKind::Parameter, start, pos + 3));
            pos += 3;
            avail -= 3;
        } else if width == 3 {
            // `{{{x}}`: a stray brace followed by a template.
            spans.insert(start + 1, Span::new(SpanKind::Template, start + 1, pos + 2));
            pos += 2;
            avail -= 2;
        } else {
            spans.insert(start, Span::new(SpanKind::Template, start, pos + 2));
            pos += 2;
            avail -= 2;
        }
    }
}

/// Resolve every balanced brace pair, link pair and opaque tag in one pass.
fn index_constructs(text: &str, lower: &str) -> HashMap<usize, Span> {
    let bytes = text.as_bytes();
    let n = bytes.len();
    let mut spans = HashMap::new();
    let mut braces: Vec<(usize, usize)> = Vec::new();
    let mut links: Vec<usize> = Vec::new();
    let mut memo = TagMemo::default();
    let mut i = 0usize;

    while i < n {
        match bytes[i] {
            b'<' => {
                if let Some(span) = match_tag(lower, i, &mut memo) {
                    spans.insert(i, span);
                    i = span.end;
                } else {
                    i += 1;
                }
            }
            b'{' => {
                let run = run_length(bytes, i, b'{');
                push_brace_run(&mut braces, i, run);
                i += run;
            }
            b'}' => {
                let run = run_length(bytes, i, b'}');
                close_brace_run(&mut braces, &mut spans, i, run);
                i += run;
            }
            b'[' if i + 1 < n && bytes[i + 1] == b'[' => {
                links.push(i);
                i += 2;
            }
            b']' if i + 1 < n && bytes[i + 1] == b']' => {
                if let Some(start) = links.pop() {
                    spans.insert(start, Span::new(SpanKind::InternalLink, start, i + 2));
                }
                i += 2;
            }
            _ => i += 1,
        }
    }

    spans
}

/// Match a comment or an opaque extension tag starting at `start`.
fn match_tag(lower: &str, start: usize, memo: &mut TagMemo) -> Option<Span> {
    let rest = &lower[start..];

    if rest.starts_with("<!--") {
        if memo.comment_unclosed_from.is_some_and(|p| start >= p) {
            return None;
        }
        return match rest[4..].find("-->") {
            Some(off) => Some(Span::new(SpanKind::Comment, start, start + 4 + off + 3)),
            None => {
                memo.comment_unclosed_from = Some(start);
                None
            }
        };
    }

    let name_len = rest[1..]
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if name_len == 0 {
        return None;
    }
    let name = &rest[1..1 + name_len];
    let tag = *OPAQUE_TAGS.iter().find(|t| **t == name)?;
    match rest.as_bytes().get(1 + name_len) {
        Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r') => {}
        _ => return None,
    }

    if memo.no_gt_from.is_some_and(|p| start >= p) {
        return None;
    }
    let Some(gt) = rest.find('>') else {
        memo.no_gt_from = Some(start);
        return None;
    };
    let open_end = start + gt + 1;
    let kind = if tag == "math" {
        SpanKind::Math
    } else {
        SpanKind::Tag
    };
    if rest.as_bytes()[gt - 1] == b'/' {
        return Some(Span::new(kind, start, open_end));
    }

    if memo.unclosed.get(tag).is_some_and(|p| open_end >= *p) {
        return None;
    }
    let closing = format!("</{}", tag);
    let mut search = open_end;
    while let Some(off) = lower[search..].find(&closing) {
        let at = search + off + closing.len();
        let tail = &lower[at..];
        let ws = tail.bytes().take_while(|b| b.is_ascii_whitespace()).count();
        if tail.as_bytes().get(ws) == Some(&b'>') {
            return Some(Span::new(kind, start, at + ws + 1));
        }
        search = at;
    }
    memo.unclosed.insert(tag, open_end);
    None
}

/// Split `s` on `sep` at top level only: separators inside templates,
/// parameters, links, tags or comments do not split.
///
/// A trailing separator yields a trailing empty part, so `a|` splits into
/// `["a", ""]`.
pub fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut part_start = 0usize;
    for span in BracketScanner::new(s).segments() {
        if span.kind != SpanKind::Plain {
            continue;
        }
        for (off, ch) in span.slice(s).char_indices() {
            if ch == sep {
                let at = span.start + off;
                parts.push(&s[part_start..at]);
                part_start = at + ch.len_utf8();
            }
        }
    }
    parts.push(&s[part_start..]);
    parts
}

/// Byte index of the first top-level occurrence of `c` in `s`.
pub fn find_top_level(s: &str, c: char) -> Option<usize> {
    BracketScanner::new(s)
        .segments()
        .filter(|span| span.kind == SpanKind::Plain)
        .find_map(|span| span.slice(s).find(c).map(|off| span.start + off))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constructs(s: &str) -> Vec<(SpanKind, &str)> {
        let mut sc = BracketScanner::new(s);
        let mut out = Vec::new();
        while let Some(span) = sc.next_construct() {
            out.push((span.kind, span.slice(s)));
        }
        out
    }

    #[test]
    fn finds_each_kind() {
        let s = "a {{T|x}} b {{{1}}} [[Page|Label]] [http://example.com site] <math>x^2</math> <!-- c -->";
        let found = constructs(s);
        assert_eq!(
            found,
            vec![
                (SpanKind::Template, "{{T|x}}"),
                (SpanKind::Parameter, "{{{1}}}"),
                (SpanKind::InternalLink, "[[Page|Label]]"),
                (SpanKind::ExternalLink, "[http://example.com site]"),
                (SpanKind::Math, "<math>x^2</math>"),
                (SpanKind::Comment, "<!-- c -->"),
            ]
        );
    }

    #[test]
    fn nested_templates_are_one_top_level_span() {
        let s = "{{A|x={{B|{{C}}}}|y=[[L|{{D}}]]}} tail";
        let found = constructs(s);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, "{{A|x={{B|{{C}}}}|y=[[L|{{D}}]]}}");
    }

    #[test]
    fn parameter_with_nested_template_default() {
        let s = "{{{1|{{PAGENAME}}}}}";
        let found = constructs(s);
        assert_eq!(found, vec![(SpanKind::Parameter, s)]);
        let span = BracketScanner::new(s).next_construct().unwrap();
        assert_eq!(span.inner(s), "1|{{PAGENAME}}");
    }

    #[test]
    fn five_braces_is_parameter_around_template() {
        let s = "{{{{{#if:x|a|b}}|d}}}";
        let span = BracketScanner::new(s).next_construct().unwrap();
        assert_eq!(span.kind, SpanKind::Parameter);
        assert_eq!(span.inner(s), "{{#if:x|a|b}}|d");
    }

    #[test]
    fn unbalanced_open_is_plain_text() {
        let s = "{{unterminated";
        assert!(constructs(s).is_empty());
        let segs: Vec<Span> = BracketScanner::new(s).segments().collect();
        assert_eq!(segs, vec![Span::new(SpanKind::Plain, 0, s.len())]);
    }

    #[test]
    fn inner_balanced_survives_outer_unbalanced() {
        let s = "{{outer {{inner}} no close";
        assert_eq!(constructs(s), vec![(SpanKind::Template, "{{inner}}")]);
    }

    #[test]
    fn stray_closers_are_plain() {
        let s = "a }} b ]] c";
        assert!(constructs(s).is_empty());
    }

    #[test]
    fn opaque_tags_hide_brackets() {
        let s = "<nowiki>{{not a template}}</nowiki> {{real}}";
        let found = constructs(s);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, SpanKind::Tag);
        assert_eq!(found[1], (SpanKind::Template, "{{real}}"));
    }

    #[test]
    fn self_closing_ref_and_tag_name() {
        let s = "x<ref name=\"a\" />y";
        let span = BracketScanner::new(s).next_construct().unwrap();
        assert_eq!(span.kind, SpanKind::Tag);
        assert_eq!(span.tag_name(s), Some("ref"));
        assert_eq!(span.inner(s), "");
    }

    #[test]
    fn unclosed_math_is_plain() {
        let s = "<math>x + <math>y";
        assert!(constructs(s).is_empty());
    }

    #[test]
    fn external_link_must_close_on_same_line() {
        assert!(constructs("[http://a.example label\nmore]").is_empty());
        assert!(constructs("[not a link]").is_empty());
    }

    #[test]
    fn segments_cover_input() {
        let s = "héllo {{T}} wörld [[X]]!";
        let joined: String = BracketScanner::new(s)
            .segments()
            .map(|sp| sp.slice(s))
            .collect();
        assert_eq!(joined, s);
    }

    #[test]
    fn split_respects_nesting() {
        let parts = split_top_level("Name|a={{X|1}}|b=2", '|');
        assert_eq!(parts, vec!["Name", "a={{X|1}}", "b=2"]);
        let parts = split_top_level("a|[[L|x]]|", '|');
        assert_eq!(parts, vec!["a", "[[L|x]]", ""]);
    }

    #[test]
    fn find_top_level_skips_nested() {
        assert_eq!(find_top_level("{{a=b}}c=d", '='), Some(8));
        assert_eq!(find_top_level("{{a=b}}", '='), None);
    }

    #[test]
    fn rebase_shifts() {
        let sp = Span::new(SpanKind::Template, 2, 6).rebase(10);
        assert_eq!((sp.start, sp.end, sp.len()), (12, 16, 4));
    }
}
