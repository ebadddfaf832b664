//! Rendering of a raw source line into HTML markup.
//!
//! Highlighting rules come as `start,end,cssClass` triples separated by `;`,
//! symbol references as `start,end,symbolId` triples. Offsets count characters
//! of the line, `end` is exclusive. Each rule becomes a `<span>` around the text
//! it covers; symbol references get the `sym-<id> sym` classes so a viewer can
//! highlight every occurrence of the same symbol.

/// Turns a line of text plus its annotations into HTML-safe markup.
pub trait HtmlDecorator {
    fn decorate(&self, source: &str, highlighting: Option<&str>, symbols: Option<&str>) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct HtmlSourceDecorator;

impl HtmlSourceDecorator {
    pub fn new() -> Self {
        Self
    }
}

impl HtmlDecorator for HtmlSourceDecorator {
    fn decorate(&self, source: &str, highlighting: Option<&str>, symbols: Option<&str>) -> String {
        let chars: Vec<char> = source.chars().collect();
        let len = chars.len();

        let mut markups = parse_rules(highlighting, |class| class.to_string());
        markups.extend(parse_rules(symbols, |id| format!("sym-{id} sym")));
        for markup in &mut markups {
            markup.end = markup.end.min(len);
        }
        markups.retain(|markup| markup.start < markup.end);
        // Outer spans open first when several start at the same offset.
        markups.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut out = String::with_capacity(source.len() + markups.len() * 24);
        let mut stack: Vec<usize> = Vec::new();
        let mut next = 0;
        for pos in 0..=len {
            // Closing a span that is not on top of the stack closes the spans
            // nested inside it too; the ones still running are reopened.
            if let Some(first) = stack.iter().position(|&idx| markups[idx].end <= pos) {
                let popped: Vec<usize> = stack.drain(first..).collect();
                for _ in &popped {
                    out.push_str("</span>");
                }
                for idx in popped {
                    if markups[idx].end > pos {
                        open_span(&mut out, &markups[idx].class);
                        stack.push(idx);
                    }
                }
            }
            while next < markups.len() && markups[next].start == pos {
                open_span(&mut out, &markups[next].class);
                stack.push(next);
                next += 1;
            }
            if let Some(&ch) = chars.get(pos) {
                push_escaped(&mut out, ch);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Markup {
    start: usize,
    end: usize,
    class: String,
}

fn parse_rules(raw: Option<&str>, class_for: impl Fn(&str) -> String) -> Vec<Markup> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut markups = Vec::new();
    for rule in raw.split(';').map(str::trim).filter(|rule| !rule.is_empty()) {
        let mut parts = rule.splitn(3, ',');
        let start = parts.next().and_then(|v| v.trim().parse::<usize>().ok());
        let end = parts.next().and_then(|v| v.trim().parse::<usize>().ok());
        let label = parts.next().map(str::trim).filter(|v| !v.is_empty());
        match (start, end, label) {
            (Some(start), Some(end), Some(label)) if is_class_safe(label) => {
                markups.push(Markup {
                    start,
                    end,
                    class: class_for(label),
                });
            }
            _ => log::debug!("Skipping malformed decoration rule: {rule}"),
        }
    }
    markups
}

fn is_class_safe(label: &str) -> bool {
    label
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

fn open_span(out: &mut String, class: &str) {
    out.push_str("<span class=\"");
    out.push_str(class);
    out.push_str("\">");
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        other => out.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decorate(source: &str, highlighting: Option<&str>, symbols: Option<&str>) -> String {
        HtmlSourceDecorator::new().decorate(source, highlighting, symbols)
    }

    #[test]
    fn plain_text_is_escaped() {
        assert_eq!(
            decorate("if (a < b && c > d)", None, None),
            "if (a &lt; b &amp;&amp; c &gt; d)"
        );
        assert_eq!(decorate("", Some("0,3,k"), None), "");
    }

    #[test]
    fn highlighting_and_symbols_become_spans() {
        let html = decorate("public class Foo {", Some("0,6,k;7,12,k"), Some("13,16,1"));
        assert_eq!(
            html,
            "<span class=\"k\">public</span> <span class=\"k\">class</span> \
             <span class=\"sym-1 sym\">Foo</span> {"
        );
    }

    #[test]
    fn nested_spans_close_innermost_first() {
        let html = decorate("/** doc */", Some("0,10,j"), Some("4,7,2"));
        assert_eq!(
            html,
            "<span class=\"j\">/** <span class=\"sym-2 sym\">doc</span> */</span>"
        );
    }

    #[test]
    fn crossing_spans_are_split_to_stay_well_formed() {
        let html = decorate("abcdef", Some("0,4,a"), Some("2,6,1"));
        assert_eq!(
            html,
            "<span class=\"a\">ab<span class=\"sym-1 sym\">cd</span></span>\
             <span class=\"sym-1 sym\">ef</span>"
        );
    }

    #[test]
    fn malformed_and_out_of_range_rules_are_ignored() {
        let html = decorate("let x;", Some("x,y,k;0,3,k;4,99,s;9,12,c;2,2,e;0,1,bad\"class"), None);
        assert_eq!(html, "<span class=\"k\">let</span> <span class=\"s\">x;</span>");
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let html = decorate("é = \"ü\"", Some("4,7,s"), None);
        assert_eq!(html, "é = <span class=\"s\">\"ü\"</span>");
    }
}
