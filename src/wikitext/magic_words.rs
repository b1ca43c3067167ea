//! Magic words: built-in variables and parser functions.
//!
//! Every supported behavior is a variant of the closed [`MagicWord`] enum. A
//! [`MagicWordTable`] maps (case-insensitive) names to variants; language
//! specific tables are built by adding aliases to the generic one. Evaluation
//! is a single exhaustive match in [`evaluate`].
//!
//! Argument text reaches the evaluator unexpanded. The evaluator asks the
//! caller to expand only the arguments it actually needs, so the untaken branch
//! of an `#if` costs nothing.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use lazy_regex::regex_replace_all;
use url::Url;

use crate::wikitext::argument::{lcfirst, ucfirst};
use crate::wikitext::expr;
use crate::wikitext::scanner::find_top_level;

/// Which part of the page title a title variable yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TitlePart {
    /// Title without namespace.
    Page,
    /// Title with namespace.
    Full,
    /// Title without the last subpage component.
    Base,
    /// Last subpage component.
    Sub,
    /// First subpage component.
    Root,
    /// Namespace prefix.
    Namespace,
}

/// Supported magic words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagicWord {
    // variables
    Pipe,
    Equals,
    CurrentYear,
    CurrentMonth,
    CurrentMonth1,
    CurrentMonthName,
    CurrentMonthAbbrev,
    CurrentDay,
    CurrentDay2,
    CurrentDayName,
    CurrentDow,
    CurrentTime,
    CurrentHour,
    CurrentWeek,
    CurrentTimestamp,
    Title { part: TitlePart, encoded: bool },
    SiteName,
    Server,
    ServerName,
    ContentLanguage,
    RevisionId,
    PageId,
    DirectionMark,
    // functions
    Uc,
    Lc,
    UcFirst,
    LcFirst,
    UrlEncode,
    PadLeft,
    PadRight,
    FormatNum,
    Plural,
    If,
    IfEq,
    IfError,
    IfExpr,
    Switch,
    Expr,
    Tag,
    /// Recognized, but evaluates to empty text.
    NoOp,
}

const GENERIC_WORDS: &[(&str, MagicWord)] = &[
    ("!", MagicWord::Pipe),
    ("=", MagicWord::Equals),
    ("currentyear", MagicWord::CurrentYear),
    ("currentmonth", MagicWord::CurrentMonth),
    ("currentmonth2", MagicWord::CurrentMonth),
    ("currentmonth1", MagicWord::CurrentMonth1),
    ("currentmonthname", MagicWord::CurrentMonthName),
    ("currentmonthabbrev", MagicWord::CurrentMonthAbbrev),
    ("currentday", MagicWord::CurrentDay),
    ("currentday2", MagicWord::CurrentDay2),
    ("currentdayname", MagicWord::CurrentDayName),
    ("currentdow", MagicWord::CurrentDow),
    ("currenttime", MagicWord::CurrentTime),
    ("currenthour", MagicWord::CurrentHour),
    ("currentweek", MagicWord::CurrentWeek),
    ("currenttimestamp", MagicWord::CurrentTimestamp),
    ("localyear", MagicWord::CurrentYear),
    ("localmonth", MagicWord::CurrentMonth),
    ("localmonth1", MagicWord::CurrentMonth1),
    ("localmonthname", MagicWord::CurrentMonthName),
    ("localday", MagicWord::CurrentDay),
    ("localday2", MagicWord::CurrentDay2),
    ("localdayname", MagicWord::CurrentDayName),
    ("localtime", MagicWord::CurrentTime),
    ("localhour", MagicWord::CurrentHour),
    ("localtimestamp", MagicWord::CurrentTimestamp),
    ("pagename", MagicWord::Title { part: TitlePart::Page, encoded: false }),
    ("pagenamee", MagicWord::Title { part: TitlePart::Page, encoded: true }),
    ("fullpagename", MagicWord::Title { part: TitlePart::Full, encoded: false }),
    ("fullpagenamee", MagicWord::Title { part: TitlePart::Full, encoded: true }),
    ("basepagename", MagicWord::Title { part: TitlePart::Base, encoded: false }),
    ("basepagenamee", MagicWord::Title { part: TitlePart::Base, encoded: true }),
    ("subpagename", MagicWord::Title { part: TitlePart::Sub, encoded: false }),
    ("subpagenamee", MagicWord::Title { part: TitlePart::Sub, encoded: true }),
    ("rootpagename", MagicWord::Title { part: TitlePart::Root, encoded: false }),
    ("rootpagenamee", MagicWord::Title { part: TitlePart::Root, encoded: true }),
    ("namespace", MagicWord::Title { part: TitlePart::Namespace, encoded: false }),
    ("namespacee", MagicWord::Title { part: TitlePart::Namespace, encoded: true }),
    ("sitename", MagicWord::SiteName),
    ("server", MagicWord::Server),
    ("servername", MagicWord::ServerName),
    ("contentlanguage", MagicWord::ContentLanguage),
    ("contentlang", MagicWord::ContentLanguage),
    ("revisionid", MagicWord::RevisionId),
    ("pageid", MagicWord::PageId),
    ("dirmark", MagicWord::DirectionMark),
    ("directionmark", MagicWord::DirectionMark),
    ("uc", MagicWord::Uc),
    ("lc", MagicWord::Lc),
    ("ucfirst", MagicWord::UcFirst),
    ("lcfirst", MagicWord::LcFirst),
    ("urlencode", MagicWord::UrlEncode),
    ("padleft", MagicWord::PadLeft),
    ("padright", MagicWord::PadRight),
    ("formatnum", MagicWord::FormatNum),
    ("plural", MagicWord::Plural),
    ("#if", MagicWord::If),
    ("#ifeq", MagicWord::IfEq),
    ("#iferror", MagicWord::IfError),
    ("#ifexpr", MagicWord::IfExpr),
    ("#switch", MagicWord::Switch),
    ("#expr", MagicWord::Expr),
    ("#tag", MagicWord::Tag),
    ("#ifexist", MagicWord::NoOp),
    ("#time", MagicWord::NoOp),
    ("#timel", MagicWord::NoOp),
    ("#language", MagicWord::NoOp),
    ("#rel2abs", MagicWord::NoOp),
    ("#titleparts", MagicWord::NoOp),
    ("#invoke", MagicWord::NoOp),
    ("#property", MagicWord::NoOp),
    ("#statements", MagicWord::NoOp),
    ("#formatdate", MagicWord::NoOp),
    ("#dateformat", MagicWord::NoOp),
    ("int", MagicWord::NoOp),
    ("ns", MagicWord::NoOp),
    ("localurl", MagicWord::NoOp),
    ("fullurl", MagicWord::NoOp),
    ("filepath", MagicWord::NoOp),
    ("grammar", MagicWord::NoOp),
    ("gender", MagicWord::NoOp),
    ("displaytitle", MagicWord::NoOp),
    ("defaultsort", MagicWord::NoOp),
];

/// Namespaces recognized when splitting a title for `NAMESPACE`/`PAGENAME`.
const TITLE_NAMESPACES: &[&str] = &[
    "Talk",
    "User",
    "User talk",
    "Wikipedia",
    "Wikipedia talk",
    "File",
    "File talk",
    "MediaWiki",
    "Template",
    "Template talk",
    "Help",
    "Category",
    "Category talk",
    "Portal",
    "Draft",
    "Module",
];

/// Name → behavior table. Immutable once built; cheap to share.
#[derive(Debug, Clone)]
pub struct MagicWordTable {
    language: String,
    words: HashMap<String, MagicWord>,
}

impl MagicWordTable {
    /// Generic table (English names) tagged with `language`.
    pub fn new(language: impl Into<String>) -> Self {
        let words = GENERIC_WORDS
            .iter()
            .map(|(name, word)| (name.to_string(), *word))
            .collect();
        Self {
            language: language.into(),
            words,
        }
    }

    /// Add (or replace) a name for a behavior.
    pub fn with_alias(mut self, name: &str, word: MagicWord) -> Self {
        self.words.insert(name.trim().to_lowercase(), word);
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Look up a name, case-insensitively.
    pub fn lookup(&self, name: &str) -> Option<MagicWord> {
        self.words.get(&name.trim().to_lowercase()).copied()
    }

    /// Resolve a template name into a magic word call.
    ///
    /// `{{uc:hello}}` resolves to `(Uc, Some("hello"))`; `{{PAGENAME}}` to
    /// `(Title, None)`. Returns `None` for ordinary template names.
    pub fn resolve<'a>(&self, name: &'a str) -> Option<(MagicWord, Option<&'a str>)> {
        if let Some(colon) = name.find(':') {
            let (head, rest) = (&name[..colon], &name[colon + 1..]);
            if let Some(word) = self.lookup(head) {
                return Some((word, Some(rest)));
            }
        }
        // `{{#if}}` with no colon still counts as a call with no arguments.
        self.lookup(name).map(|word| (word, None))
    }
}

impl Default for MagicWordTable {
    fn default() -> Self {
        Self::new("en")
    }
}

/// Facts about the page being processed, used by variables.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub title: String,
    pub id: String,
    pub revid: String,
    pub url_base: String,
    pub language: String,
    pub site_name: String,
    pub now: DateTime<Utc>,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            title: String::new(),
            id: String::new(),
            revid: String::new(),
            url_base: String::new(),
            language: "en".to_string(),
            site_name: "Wikipedia".to_string(),
            now: Utc::now(),
        }
    }
}

impl PageContext {
    /// Split the title into `(namespace, rest)`.
    fn split_namespace<'a>(title: &'a str) -> (&'a str, &'a str) {
        if let Some(colon) = title.find(':') {
            let ns = title[..colon].trim();
            if TITLE_NAMESPACES.iter().any(|n| n.eq_ignore_ascii_case(ns)) {
                return (ns, title[colon + 1..].trim_start());
            }
        }
        ("", title)
    }

    fn title_part(title: &str, part: TitlePart) -> String {
        let (ns, page) = Self::split_namespace(title);
        match part {
            TitlePart::Page => page.to_string(),
            TitlePart::Full => title.to_string(),
            TitlePart::Namespace => ns.to_string(),
            TitlePart::Base => match page.rfind('/') {
                Some(i) => page[..i].to_string(),
                None => page.to_string(),
            },
            TitlePart::Sub => match page.rfind('/') {
                Some(i) => page[i + 1..].to_string(),
                None => page.to_string(),
            },
            TitlePart::Root => page.split('/').next().unwrap_or_default().to_string(),
        }
    }
}

/// Percent-encode a title the way page URLs are written: spaces become
/// underscores, `:` and `/` stay readable.
pub fn wiki_encode(s: &str) -> String {
    let underscored = s.replace(' ', "_");
    url::form_urlencoded::byte_serialize(underscored.as_bytes())
        .collect::<String>()
        .replace("%3A", ":")
        .replace("%2F", "/")
}

/// Remove behavior switches such as `__NOTOC__`.
pub fn remove_behavior_switches(text: &str) -> String {
    regex_replace_all!(
        r"(?i)__(?:NOTOC|FORCETOC|TOC|NOEDITSECTION|NEWSECTIONLINK|NONEWSECTIONLINK|NOGALLERY|HIDDENCAT|EXPECTUNUSEDCATEGORY|NOCONTENTCONVERT|NOCC|NOTITLECONVERT|NOTC|START|END|INDEX|NOINDEX|STATICREDIRECT|NOGLOBAL|DISAMBIG|EXPECTED_UNCONNECTED_PAGE)__",
        text,
        ""
    )
    .into_owned()
}

/// Wrap a message the way parser functions report errors.
pub fn error_markup(msg: impl std::fmt::Display) -> String {
    format!("<strong class=\"error\">{}</strong>", msg)
}

fn arg<'a>(args: &[&'a str], i: usize) -> &'a str {
    args.get(i).copied().unwrap_or("")
}

/// Compare two expanded values the way `#ifeq`/`#switch` do: numerically when
/// both sides are numbers, otherwise as strings.
fn values_equal(a: &str, b: &str) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// A finite number written with digits, so `nan` and `inf` stay strings.
fn as_number(s: &str) -> Option<f64> {
    let numeric = s.bytes().any(|b| b.is_ascii_digit())
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !numeric {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn pad(s: &str, len: &str, with: &str, left: bool) -> String {
    let target = len.trim().parse::<usize>().unwrap_or(0).min(500);
    let with = if with.is_empty() { "0" } else { with };
    let have = s.chars().count();
    if have >= target {
        return s.to_string();
    }
    let padding: String = with.chars().cycle().take(target - have).collect();
    if left {
        padding + s
    } else {
        format!("{}{}", s, padding)
    }
}

fn format_num(s: &str, reverse: bool) -> String {
    if reverse {
        return s.replace(',', "");
    }
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int, frac) = match body.find('.') {
        Some(i) => (&body[..i], &body[i..]),
        None => (body, ""),
    };
    if int.is_empty() || !int.bytes().all(|b| b.is_ascii_digit()) {
        return s.to_string();
    }
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}{}", sign, grouped, frac)
}

fn switch(args: &[&str], expand: &mut dyn FnMut(&str) -> String) -> String {
    let value = expand(arg(args, 0)).trim().to_string();
    let cases = args.get(1..).unwrap_or_default();
    let mut found = false;
    let mut default: Option<&str> = None;

    for (i, case) in cases.iter().enumerate() {
        match find_top_level(case, '=') {
            Some(eq) => {
                let key = expand(&case[..eq]).trim().to_string();
                if found || values_equal(&key, &value) {
                    return expand(&case[eq + 1..]).trim().to_string();
                }
                if key == "#default" {
                    default = Some(&case[eq + 1..]);
                }
            }
            None => {
                let key = expand(case).trim().to_string();
                if values_equal(&key, &value) {
                    found = true;
                } else if i + 1 == cases.len() {
                    // a trailing bare value is the default
                    return key;
                }
            }
        }
    }

    default
        .map(|d| expand(d).trim().to_string())
        .unwrap_or_default()
}

/// Evaluate `word` with raw argument texts.
///
/// `expand` expands a raw argument in the caller's frame. The returned text is
/// final: it is not expanded again.
pub fn evaluate(
    word: MagicWord,
    args: &[&str],
    page: &PageContext,
    expand: &mut dyn FnMut(&str) -> String,
) -> String {
    let now = page.now;
    match word {
        MagicWord::Pipe => "|".to_string(),
        MagicWord::Equals => "=".to_string(),
        MagicWord::CurrentYear => now.year().to_string(),
        MagicWord::CurrentMonth => format!("{:02}", now.month()),
        MagicWord::CurrentMonth1 => now.month().to_string(),
        MagicWord::CurrentMonthName => now.format("%B").to_string(),
        MagicWord::CurrentMonthAbbrev => now.format("%b").to_string(),
        MagicWord::CurrentDay => now.day().to_string(),
        MagicWord::CurrentDay2 => format!("{:02}", now.day()),
        MagicWord::CurrentDayName => now.format("%A").to_string(),
        MagicWord::CurrentDow => now.weekday().num_days_from_sunday().to_string(),
        MagicWord::CurrentTime => format!("{:02}:{:02}", now.hour(), now.minute()),
        MagicWord::CurrentHour => format!("{:02}", now.hour()),
        MagicWord::CurrentWeek => now.iso_week().week().to_string(),
        MagicWord::CurrentTimestamp => now.format("%Y%m%d%H%M%S").to_string(),
        MagicWord::Title { part, encoded } => {
            let explicit = args.first().map(|a| expand(a).trim().to_string());
            let title = explicit.as_deref().unwrap_or(&page.title);
            let value = PageContext::title_part(title, part);
            if encoded { wiki_encode(&value) } else { value }
        }
        MagicWord::SiteName => page.site_name.clone(),
        MagicWord::Server => Url::parse(&page.url_base)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_default(),
        MagicWord::ServerName => Url::parse(&page.url_base)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default(),
        MagicWord::ContentLanguage => page.language.clone(),
        MagicWord::RevisionId => page.revid.clone(),
        MagicWord::PageId => page.id.clone(),
        MagicWord::DirectionMark => "\u{200e}".to_string(),
        MagicWord::Uc => expand(arg(args, 0)).trim().to_uppercase(),
        MagicWord::Lc => expand(arg(args, 0)).trim().to_lowercase(),
        MagicWord::UcFirst => ucfirst(expand(arg(args, 0)).trim()),
        MagicWord::LcFirst => lcfirst(expand(arg(args, 0)).trim()),
        MagicWord::UrlEncode => {
            url::form_urlencoded::byte_serialize(expand(arg(args, 0)).trim().as_bytes()).collect()
        }
        MagicWord::PadLeft | MagicWord::PadRight => {
            let s = expand(arg(args, 0)).trim().to_string();
            let len = expand(arg(args, 1));
            let with = expand(arg(args, 2));
            pad(&s, &len, &with, word == MagicWord::PadLeft)
        }
        MagicWord::FormatNum => {
            let s = expand(arg(args, 0)).trim().to_string();
            let flag = expand(arg(args, 1));
            format_num(&s, flag.trim().eq_ignore_ascii_case("R"))
        }
        MagicWord::Plural => {
            let n = expand(arg(args, 0)).trim().replace(',', "");
            let singular = n.parse::<f64>().map(|v| v.abs() == 1.0).unwrap_or(false);
            let branch = if singular { 1 } else { args.len().saturating_sub(1).clamp(1, 2) };
            expand(arg(args, branch)).trim().to_string()
        }
        MagicWord::If => {
            let test = expand(arg(args, 0));
            let branch = if test.trim().is_empty() { 2 } else { 1 };
            expand(arg(args, branch)).trim().to_string()
        }
        MagicWord::IfEq => {
            let a = expand(arg(args, 0));
            let b = expand(arg(args, 1));
            let branch = if values_equal(a.trim(), b.trim()) { 2 } else { 3 };
            expand(arg(args, branch)).trim().to_string()
        }
        MagicWord::IfError => {
            let test = expand(arg(args, 0));
            if test.contains("class=\"error\"") {
                expand(arg(args, 1)).trim().to_string()
            } else if args.len() > 2 {
                expand(arg(args, 2)).trim().to_string()
            } else {
                test.trim().to_string()
            }
        }
        MagicWord::IfExpr => {
            let test = expand(arg(args, 0));
            match expr::evaluate(&test) {
                Ok(v) => {
                    let branch = if v.is_some_and(|v| v != 0.0) { 1 } else { 2 };
                    expand(arg(args, branch)).trim().to_string()
                }
                Err(e) => error_markup(e),
            }
        }
        MagicWord::Switch => switch(args, expand),
        MagicWord::Expr => match expr::eval_to_string(&expand(arg(args, 0))) {
            Ok(s) => s,
            Err(e) => error_markup(e),
        },
        MagicWord::Tag => {
            let name = expand(arg(args, 0)).trim().to_lowercase();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return String::new();
            }
            let content = expand(arg(args, 1));
            let mut attrs = String::new();
            for raw in args.iter().skip(2) {
                let kv = expand(raw);
                if let Some((k, v)) = kv.split_once('=') {
                    let v = v.trim().trim_matches('"');
                    attrs.push_str(&format!(" {}=\"{}\"", k.trim(), v));
                }
            }
            format!("<{0}{1}>{2}</{0}>", name, attrs, content)
        }
        MagicWord::NoOp => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn page() -> PageContext {
        PageContext {
            title: "Help:Contents/Editing".to_string(),
            id: "12".to_string(),
            revid: "34".to_string(),
            url_base: "https://en.wikipedia.org/wiki".to_string(),
            now: Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap(),
            ..PageContext::default()
        }
    }

    fn call(name: &str, args: &[&str]) -> String {
        let table = MagicWordTable::default();
        let word = table.lookup(name).unwrap();
        let mut identity = |s: &str| s.to_string();
        evaluate(word, args, &page(), &mut identity)
    }

    #[test]
    fn resolve_colon_and_variable() {
        let table = MagicWordTable::default();
        assert_eq!(table.resolve("UC:hello"), Some((MagicWord::Uc, Some("hello"))));
        assert_eq!(table.resolve("#if: x "), Some((MagicWord::If, Some(" x "))));
        assert_eq!(
            table.resolve("PAGENAME"),
            Some((MagicWord::Title { part: TitlePart::Page, encoded: false }, None))
        );
        assert_eq!(table.resolve("Infobox person"), None);
        assert_eq!(table.resolve("Foo:bar"), None);
    }

    #[test]
    fn case_functions() {
        assert_eq!(call("uc", &["hello"]), "HELLO");
        assert_eq!(call("LC", &["HeLLo"]), "hello");
        assert_eq!(call("ucfirst", &["word"]), "Word");
        assert_eq!(call("lcfirst", &["Word"]), "word");
    }

    #[test]
    fn conditionals() {
        assert_eq!(call("#if", &["x", " yes ", "no"]), "yes");
        assert_eq!(call("#if", &["  ", "yes", " no "]), "no");
        assert_eq!(call("#if", &["", "yes"]), "");
        assert_eq!(call("#ifeq", &["01", "1", "same", "diff"]), "same");
        assert_eq!(call("#ifeq", &["a", "b", "same", "diff"]), "diff");
        assert_eq!(call("#ifexpr", &["2 > 1", "big", "small"]), "big");
        assert_eq!(call("#iferror", &["ok"]), "ok");
        assert_eq!(
            call("#iferror", &["<strong class=\"error\">x</strong>", "bad", "good"]),
            "bad"
        );
    }

    #[test]
    fn switch_cases() {
        assert_eq!(call("#switch", &["b", "a=1", "b=2", "#default=d"]), "2");
        assert_eq!(call("#switch", &["z", "a=1", "#default=d"]), "d");
        assert_eq!(call("#switch", &["b", "a", "b", "c=3", "d=4"]), "3");
        assert_eq!(call("#switch", &["q", "a=1", "fallback"]), "fallback");
        assert_eq!(call("#switch", &["q", "a=1"]), "");
        assert_eq!(call("#switch", &["nan", "nan=yes", "#default=no"]), "yes");
        assert_eq!(call("#switch", &["1.0", "1=one", "#default=no"]), "one");
    }

    #[test]
    fn non_numeric_words_compare_as_text() {
        assert_eq!(call("#ifeq", &["inf", "infinity", "same", "diff"]), "diff");
        assert_eq!(call("#ifeq", &["NaN", "NaN", "same", "diff"]), "same");
        assert_eq!(call("#ifeq", &["1e3", "1000", "same", "diff"]), "same");
        assert_eq!(call("#ifeq", &["1e999", "1e9999", "same", "diff"]), "diff");
    }

    #[test]
    fn expr_and_errors() {
        assert_eq!(call("#expr", &["2 + 3 * 4"]), "14");
        let err = call("#expr", &["1/0"]);
        assert!(err.contains("class=\"error\""));
        assert!(err.contains("Division by zero"));
    }

    #[test]
    fn padding_and_numbers() {
        assert_eq!(call("padleft", &["7", "3"]), "007");
        assert_eq!(call("padright", &["ab", "5", "xy"]), "abxyx");
        assert_eq!(call("formatnum", &["1234567.25"]), "1,234,567.25");
        assert_eq!(call("formatnum", &["1,234", "R"]), "1234");
        assert_eq!(call("urlencode", &["a b&c"]), "a+b%26c");
    }

    #[test]
    fn variables_from_page_context() {
        assert_eq!(call("pagename", &[]), "Contents/Editing");
        assert_eq!(call("namespace", &[]), "Help");
        assert_eq!(call("basepagename", &[]), "Contents");
        assert_eq!(call("subpagename", &[]), "Editing");
        assert_eq!(call("fullpagenamee", &[]), "Help:Contents/Editing");
        assert_eq!(call("currentyear", &[]), "2024");
        assert_eq!(call("currentmonth", &[]), "03");
        assert_eq!(call("currentmonthname", &[]), "March");
        assert_eq!(call("currenttimestamp", &[]), "20240305070809");
        assert_eq!(call("server", &[]), "https://en.wikipedia.org");
        assert_eq!(call("servername", &[]), "en.wikipedia.org");
        assert_eq!(call("revisionid", &[]), "34");
        assert_eq!(call("!", &[]), "|");
    }

    #[test]
    fn tag_builds_element() {
        assert_eq!(call("#tag", &["math", "x^2"]), "<math>x^2</math>");
        assert_eq!(
            call("#tag", &["ref", "note", "name=a"]),
            "<ref name=\"a\">note</ref>"
        );
    }

    #[test]
    fn plural_and_noop() {
        assert_eq!(call("plural", &["1", "item", "items"]), "item");
        assert_eq!(call("plural", &["3", "item", "items"]), "items");
        assert_eq!(call("#invoke", &["Module", "fn"]), "");
    }

    #[test]
    fn aliases_extend_table() {
        let table = MagicWordTable::new("de").with_alias("#wenn", MagicWord::If);
        assert_eq!(table.lookup("#WENN"), Some(MagicWord::If));
        assert_eq!(table.language(), "de");
    }

    #[test]
    fn behavior_switches_removed() {
        assert_eq!(remove_behavior_switches("a__NOTOC__b __toc__c"), "ab c");
        assert_eq!(remove_behavior_switches("__init__"), "__init__");
    }

    #[test]
    fn lazy_branches() {
        let table = MagicWordTable::default();
        let mut seen = Vec::new();
        let mut record = |s: &str| {
            seen.push(s.to_string());
            s.to_string()
        };
        evaluate(
            table.lookup("#if").unwrap(),
            &["x", "then", "else"],
            &page(),
            &mut record,
        );
        assert_eq!(seen, vec!["x", "then"]);
    }
}
