//! `<math>` handling.
//!
//! Formulas are opaque: nothing inside a `<math>` span is parsed. Depending on
//! the [`MathMode`] a formula is dropped, replaced by a numbered `formula_N`
//! placeholder, or kept as normalized LaTeX between `$` delimiters.

use lazy_regex::{regex_is_match, regex_replace_all};

use crate::wikitext::enums::MathMode;
use crate::wikitext::scanner::{BracketScanner, SpanKind};

/// LaTeX commands rewritten to the symbol they print.
const LATEX_SYMBOLS: &[(&str, &str)] = &[
    ("infty", "\u{221e}"),
    ("sum", "\u{2211}"),
    ("prod", "\u{220f}"),
    ("int", "\u{222b}"),
    ("leq", "\u{2264}"),
    ("le", "\u{2264}"),
    ("geq", "\u{2265}"),
    ("ge", "\u{2265}"),
    ("neq", "\u{2260}"),
    ("ne", "\u{2260}"),
    ("approx", "\u{2248}"),
    ("pm", "\u{b1}"),
    ("times", "\u{d7}"),
    ("cdot", "\u{b7}"),
    ("to", "\u{2192}"),
    ("rightarrow", "\u{2192}"),
    ("alpha", "\u{3b1}"),
    ("beta", "\u{3b2}"),
    ("gamma", "\u{3b3}"),
    ("delta", "\u{3b4}"),
    ("epsilon", "\u{3b5}"),
    ("theta", "\u{3b8}"),
    ("lambda", "\u{3bb}"),
    ("mu", "\u{3bc}"),
    ("pi", "\u{3c0}"),
    ("sigma", "\u{3c3}"),
    ("phi", "\u{3c6}"),
    ("omega", "\u{3c9}"),
    ("Omega", "\u{3a9}"),
    ("Delta", "\u{394}"),
    ("Gamma", "\u{393}"),
    ("Theta", "\u{398}"),
];

/// Normalize a LaTeX formula for inline text: whitespace collapsed, spacing
/// around relations, common symbol commands replaced by Unicode.
pub fn normalize_latex(tex: &str) -> String {
    let mut s = tex.to_string();
    if !regex_is_match!(r"\\begin\{(align|cases|array|matrix)", &s) {
        s = regex_replace_all!(r"\s*&\s*", &s, " ").into_owned();
    }
    s = regex_replace_all!(r"\s+", &s, " ").into_owned();
    s = regex_replace_all!(r"\\\\+", &s, r"\\").into_owned();
    s = regex_replace_all!(r"\\([A-Za-z]+)", &s, |whole: &str, name: &str| {
        LATEX_SYMBOLS
            .iter()
            .find(|(cmd, _)| *cmd == name)
            .map(|(_, sym)| sym.to_string())
            .unwrap_or_else(|| whole.to_string())
    })
    .into_owned();
    s = regex_replace_all!(r"([=<>\u{2264}\u{2265}\u{2260}\u{b1}\u{2213}])", &s, " ${1} ").into_owned();
    s = regex_replace_all!(r"\s+", &s, " ").into_owned();
    s.trim().to_string()
}

/// Whether a formula uses any LaTeX at all; plain ones are kept as text.
fn is_latex(tex: &str) -> bool {
    regex_is_match!(
        r"[\\{}^_$|\u{2211}\u{220f}\u{222b}\u{2264}\u{2265}\u{2260}\u{221e}\u{3b1}-\u{3c9}\u{391}-\u{3a9}]|frac|sum|prod|int|sqrt|begin|end",
        tex
    )
}

/// Replaces `<math>` spans according to a [`MathMode`].
#[derive(Debug, Clone, Copy)]
pub struct MathProcessor {
    mode: MathMode,
}

impl MathProcessor {
    pub fn new(mode: MathMode) -> Self {
        Self { mode }
    }

    /// Render one formula. `open_tag` is the opening `<math ...>` tag, used to
    /// detect display (block) formulas; `counter` numbers placeholders.
    pub fn render(&self, open_tag: &str, tex: &str, counter: &mut usize) -> String {
        match self.mode {
            MathMode::Drop => String::new(),
            MathMode::Placeholder => {
                *counter += 1;
                format!("formula_{}", counter)
            }
            MathMode::Latex => {
                let tex = tex.trim();
                if tex.is_empty() {
                    return String::new();
                }
                if !is_latex(tex) {
                    return format!(" {} ", tex);
                }
                let cleaned = normalize_latex(tex);
                if regex_is_match!(r#"(?i)display\s*=\s*["']?block"#, open_tag) {
                    format!("\n\n$$ {} $$\n\n", cleaned)
                } else {
                    format!(" $ {} $ ", cleaned)
                }
            }
        }
    }

    /// Replace every top-level `<math>` span in `text`.
    pub fn process(&self, text: &str) -> String {
        if !text.contains("<math") && !text.contains("<MATH") {
            return text.to_string();
        }
        let mut counter = 0usize;
        let mut out = String::with_capacity(text.len());
        for span in BracketScanner::new(text).segments() {
            let raw = span.slice(text);
            if span.kind == SpanKind::Math {
                let open_tag = raw.split('>').next().unwrap_or_default();
                out.push_str(&self.render(open_tag, span.inner(text), &mut counter));
            } else {
                out.push_str(raw);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_by_default() {
        let p = MathProcessor::new(MathMode::default());
        assert_eq!(p.process("E <math>mc^2</math> ok"), "E  ok");
    }

    #[test]
    fn placeholders_are_numbered() {
        let p = MathProcessor::new(MathMode::Placeholder);
        assert_eq!(
            p.process("<math>a</math> and <math>b</math>"),
            "formula_1 and formula_2"
        );
    }

    #[test]
    fn latex_inline_and_display() {
        let p = MathProcessor::new(MathMode::Latex);
        assert_eq!(p.process("<math>\\alpha+\\beta=1</math>"), " $ \u{3b1}+\u{3b2} = 1 $ ");
        let display = p.process("<math display=\"block\">x^2</math>");
        assert!(display.contains("$$ x^2 $$"));
        assert_eq!(p.process("<math>2</math>"), " 2 ");
    }

    #[test]
    fn unknown_commands_survive() {
        assert_eq!(normalize_latex("\\frac{a}{b}"), "\\frac{a}{b}");
        assert_eq!(normalize_latex("a  &  b"), "a b");
        assert_eq!(normalize_latex("x\\le y"), "x \u{2264} y");
    }

    #[test]
    fn braces_inside_math_are_opaque() {
        let p = MathProcessor::new(MathMode::Placeholder);
        assert_eq!(p.process("<math>{{x}}</math>{{y}}"), "formula_1{{y}}");
    }
}
