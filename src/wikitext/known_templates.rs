//! Best-effort renderings for common templates whose bodies are not available.
//!
//! The renderers emit wikitext (`''italic''`, `[url title]`, `<math>`), not
//! final output: the later link, math and formatting passes turn it into the
//! requested format, so `keep_links` and the math mode apply to citations too.

use itertools::Itertools;

use crate::wikitext::argument::TemplateInvocation;
use crate::wikitext::enums::OutputFormat;

/// First non-empty value among `keys` (case-insensitive).
fn param<'a>(inv: &'a TemplateInvocation, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| inv.get_ignore_case(k))
        .map(str::trim)
        .find(|v| !v.is_empty())
}

fn author(inv: &TemplateInvocation) -> Option<String> {
    let last = param(inv, &["author", "last", "author1", "last1"])?;
    Some(match param(inv, &["first", "first1"]) {
        Some(first) => format!("{} {}", first, last),
        None => last.to_string(),
    })
}

fn linked_title(title: &str, url: Option<&str>) -> String {
    match url {
        Some(u) => format!("[{} {}]", u, title),
        None => title.to_string(),
    }
}

fn cite_web(inv: &TemplateInvocation) -> String {
    let title = param(inv, &["title"]);
    let url = param(inv, &["url"]);
    let mut out = match (title, url) {
        (Some(t), Some(u)) => format!("[{} {}]", u, t),
        (Some(t), None) => format!("''{}''", t),
        (None, Some(u)) => u.to_string(),
        (None, None) => String::new(),
    };

    let mut details = Vec::new();
    if let Some(a) = author(inv) {
        details.push(format!("by {}", a));
    }
    if let Some(site) = param(inv, &["website", "work", "publisher"]) {
        details.push(format!("''{}''", site));
    }
    if let Some(date) = param(inv, &["date", "year"]) {
        details.push(date.to_string());
    }
    if let Some(accessed) = param(inv, &["access-date", "accessdate"]) {
        details.push(format!("(accessed {})", accessed));
    }
    if !details.is_empty() {
        if !out.is_empty() {
            out.push_str(". ");
        }
        out.push_str(&details.join(", "));
    }
    out
}

fn cite_journal(inv: &TemplateInvocation) -> String {
    let mut out = String::new();
    if let Some(a) = author(inv) {
        out.push_str(&a);
        out.push_str(". ");
    }
    if let Some(title) = param(inv, &["title"]) {
        out.push_str(&format!(
            "\"{}\". ",
            linked_title(title, param(inv, &["url"]))
        ));
    }
    if let Some(journal) = param(inv, &["journal", "work", "newspaper", "magazine"]) {
        out.push_str(&format!("''{}''", journal));
    }

    let mut details = Vec::new();
    if let Some(volume) = param(inv, &["volume"]) {
        match param(inv, &["issue", "number"]) {
            Some(issue) => details.push(format!("vol. {}, no. {}", volume, issue)),
            None => details.push(format!("vol. {}", volume)),
        }
    }
    if let Some(date) = param(inv, &["date", "year"]) {
        details.push(date.to_string());
    }
    if let Some(pages) = param(inv, &["pages", "page"]) {
        details.push(format!("pp. {}", pages));
    }
    if !details.is_empty() {
        out.push_str(", ");
        out.push_str(&details.join(", "));
    }
    if let Some(doi) = param(inv, &["doi"]) {
        out.push_str(&format!(". DOI: {}", doi));
    }
    out.trim().to_string()
}

fn cite_book(inv: &TemplateInvocation) -> String {
    let mut out = String::new();
    if let Some(a) = author(inv) {
        out.push_str(&a);
        out.push_str(". ");
    }
    let title = param(inv, &["title"]);
    if let (Some(chapter), Some(_)) = (param(inv, &["chapter"]), title) {
        out.push_str(&format!("\"{}\" in ", chapter));
    }
    if let Some(title) = title {
        out.push_str(&format!("''{}''", linked_title(title, param(inv, &["url"]))));
    }

    let details: Vec<String> = [
        param(inv, &["publisher"]).map(str::to_string),
        param(inv, &["date", "year"]).map(str::to_string),
        param(inv, &["pages", "page"]).map(|p| format!("pp. {}", p)),
        param(inv, &["isbn"]).map(|i| format!("ISBN: {}", i)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !details.is_empty() {
        out.push_str(". ");
        out.push_str(&details.join(", "));
    }
    out.trim().to_string()
}

fn quote(inv: &TemplateInvocation, format: OutputFormat) -> String {
    let Some(text) = param(inv, &["1", "text", "quote"]) else {
        return String::new();
    };
    let author = param(inv, &["2", "author", "sign"]);
    match (format, author) {
        (OutputFormat::Markdown, Some(a)) => format!("\n> {}\n>\n> \u{2014} {}\n", text, a),
        (OutputFormat::Markdown, None) => format!("\n> {}\n", text),
        (_, Some(a)) => format!("\"{}\" \u{2014} {}", text, a),
        (_, None) => format!("\"{}\"", text),
    }
}

fn convert(inv: &TemplateInvocation) -> String {
    let values = inv.positional();
    let Some(value) = values.first().filter(|v| !v.is_empty()) else {
        return String::new();
    };
    match values.get(1).copied() {
        Some(conn @ ("-" | "\u{2013}" | "to" | "and" | "or" | "by" | "x")) => {
            let upper = values.get(2).copied().unwrap_or_default();
            let unit = values.get(3).copied().unwrap_or_default();
            let joined = if conn == "-" || conn == "\u{2013}" {
                format!("{}\u{2013}{}", value, upper)
            } else {
                format!("{} {} {}", value, conn, upper)
            };
            format!("{} {}", joined, unit).trim().to_string()
        }
        Some(unit) if !unit.is_empty() => format!("{} {}", value, unit),
        _ => value.to_string(),
    }
}

/// Render `inv` (name normalized, argument values already expanded).
///
/// Returns `None` when the template is not one of the known ones.
pub fn render(inv: &TemplateInvocation, format: OutputFormat) -> Option<String> {
    let name = inv.name.to_lowercase();
    let out = match name.as_str() {
        "cite web" | "citation" | "cite website" => cite_web(inv),
        "cite journal" | "cite paper" | "cite news" | "cite newspaper" | "cite magazine" => {
            cite_journal(inv)
        }
        "cite book" | "cite publication" => cite_book(inv),
        "quote" | "blockquote" | "cquote" => quote(inv, format),
        "convert" | "cvt" => convert(inv),
        "about" | "for" | "other uses" => match param(inv, &["1"]) {
            Some(topic) => format!("''This article is about {}.''", topic),
            None => String::new(),
        },
        "tmath" | "texmath" | "latex" => match param(inv, &["1", "content"]) {
            Some(tex) => format!("<math>{}</math>", tex),
            None => String::new(),
        },
        "math" | "mvar" | "var" | "variable" => {
            param(inv, &["1", "content"]).unwrap_or_default().to_string()
        }
        "lang" => inv.positional().get(1).copied().unwrap_or_default().to_string(),
        "nowrap" | "nobr" | "small" | "big" | "smaller" | "larger" | "nobold" | "noitalic" => {
            param(inv, &["1"]).unwrap_or_default().to_string()
        }
        n if n.starts_with("lang-") => param(inv, &["1"]).unwrap_or_default().to_string(),
        "hlist" | "flatlist" | "plainlist" | "ubl" | "unbulleted list" => {
            inv.positional().iter().filter(|v| !v.is_empty()).join(", ")
        }
        _ => return None,
    };
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_str(inner: &str, format: OutputFormat) -> Option<String> {
        let mut inv = TemplateInvocation::parse(inner);
        inv.name = crate::wikitext::argument::normalize_template_name(&inv.name);
        render(&inv, format)
    }

    #[test]
    fn cite_web_with_link() {
        let out = render_str(
            "cite web|url=https://x.example/a|title=Example|website=Site|date=2020",
            OutputFormat::Text,
        )
        .unwrap();
        assert_eq!(out, "[https://x.example/a Example]. ''Site'', 2020");
    }

    #[test]
    fn cite_journal_details() {
        let out = render_str(
            "cite journal|last=Doe|first=Jane|title=T|journal=J|volume=3|issue=2|pages=1-9|doi=10.1/x",
            OutputFormat::Text,
        )
        .unwrap();
        assert_eq!(out, "Jane Doe. \"T\". ''J'', vol. 3, no. 2, pp. 1-9. DOI: 10.1/x");
    }

    #[test]
    fn cite_book_chapter() {
        let out = render_str(
            "cite book|author=A|title=B|chapter=C|publisher=P|isbn=1",
            OutputFormat::Text,
        )
        .unwrap();
        assert_eq!(out, "A. \"C\" in ''B''. P, ISBN: 1");
    }

    #[test]
    fn quote_per_format() {
        let md = render_str("quote|Be brief.|Someone", OutputFormat::Markdown).unwrap();
        assert!(md.contains("> Be brief."));
        let txt = render_str("quote|text=Be brief.", OutputFormat::Text).unwrap();
        assert_eq!(txt, "\"Be brief.\"");
    }

    #[test]
    fn convert_values() {
        assert_eq!(render_str("convert|5|km|mi", OutputFormat::Text).unwrap(), "5 km");
        assert_eq!(
            render_str("convert|5|-|10|km", OutputFormat::Text).unwrap(),
            "5\u{2013}10 km"
        );
    }

    #[test]
    fn math_templates() {
        assert_eq!(
            render_str("tmath|x^2", OutputFormat::Text).unwrap(),
            "<math>x^2</math>"
        );
        assert_eq!(render_str("mvar|x", OutputFormat::Text).unwrap(), "x");
    }

    #[test]
    fn lang_and_unknown() {
        assert_eq!(render_str("lang|fr|texte", OutputFormat::Text).unwrap(), "texte");
        assert_eq!(render_str("lang-de|Wort", OutputFormat::Text).unwrap(), "Wort");
        assert_eq!(render_str("Infobox person|name=X", OutputFormat::Text), None);
    }
}
