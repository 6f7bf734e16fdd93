//! Plain-text product descriptions

use crate::product::model::NO_DATA;
use scraper::{Html, Node};

/// Elements that start a new line
const LINE_BREAKING: &[&str] = &["br", "p", "div", "li", "tr"];

/// Converts an HTML description to plain text
///
/// Line breaks and block elements become newlines, tags are dropped, entities
/// are decoded and runs of whitespace inside a line collapse to one space.
/// Blank input yields [`NO_DATA`].
pub fn clean_description(raw: &str) -> String {
    if raw.trim().is_empty() || raw == NO_DATA {
        return NO_DATA.to_string();
    }

    let fragment = Html::parse_fragment(raw);
    let mut text = String::new();

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if LINE_BREAKING.contains(&e.name()) => text.push('\n'),
            _ => {}
        }
    }

    let cleaned = text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.is_empty() {
        NO_DATA.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_br_becomes_newline() {
        assert_eq!(
            clean_description("Первая строка<br>Вторая<BR/>Третья"),
            "Первая строка\nВторая\nТретья"
        );
    }

    #[test]
    fn test_tags_and_entities() {
        assert_eq!(
            clean_description("<p><b>Бумага</b> &laquo;Снегурочка&raquo;, 80&nbsp;г/м&sup2;</p>"),
            "Бумага «Снегурочка», 80 г/м²"
        );
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(
            clean_description("  много    пробелов \n\n\n  <br>  конец "),
            "много пробелов\nконец"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_description(""), NO_DATA);
        assert_eq!(clean_description("<br><p> </p>"), NO_DATA);
        assert_eq!(clean_description(NO_DATA), NO_DATA);
    }
}
