//! Interpolation templates: text with `{{ path }}` placeholders.
//!
//! Placeholders are matched non-greedily, so `{{a}} and {{b}}` holds two
//! independent expressions. An opener without a closer is an error.

use super::path::Path;
use super::resolver;
use crate::error::{Error, Result};
use crate::reactive::Tracker;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Interpolation(Path),
}

/// A parsed template. Keeps the raw source so it can be rendered again after
/// the node's text has been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

/// Quick check for an opening delimiter.
pub fn contains_interpolation(text: &str, delimiters: (&str, &str)) -> bool {
    text.contains(delimiters.0)
}

impl Template {
    pub fn parse(text: &str, delimiters: (&str, &str)) -> Result<Self> {
        let (open, close) = delimiters;
        let mut segments = Vec::new();
        let mut rest = text;
        let mut offset = 0;

        while let Some(start) = rest.find(open) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let inner = &rest[start + open.len()..];
            let Some(end) = inner.find(close) else {
                return Err(Error::MalformedTemplate {
                    text: text.to_string(),
                    offset: offset + start,
                });
            };
            segments.push(Segment::Interpolation(Path::parse(&inner[..end])?));

            let consumed = start + open.len() + end + close.len();
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: text.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_interpolation(&self) -> bool {
        self.expressions().next().is_some()
    }

    /// Every placeholder path, in order, duplicates included.
    pub fn expressions(&self) -> impl Iterator<Item = &Path> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Interpolation(path) => Some(path),
            Segment::Literal(_) => None,
        })
    }

    /// Resolve every placeholder against `root` and concatenate.
    pub fn render(&self, root: &Value, tracker: &Tracker) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Interpolation(path) => {
                    let value = resolver::read_path(root, path, tracker)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRACES: (&str, &str) = ("{{", "}}");

    fn expressions(template: &Template) -> Vec<&str> {
        template.expressions().map(Path::as_str).collect()
    }

    #[test]
    fn parses_multiple_placeholders() {
        let template = Template::parse("{{a}} and {{ b.c }}!", BRACES).unwrap();
        assert_eq!(expressions(&template), vec!["a", "b.c"]);
        assert_eq!(
            template.segments(),
            [
                Segment::Interpolation(Path::parse("a").unwrap()),
                Segment::Literal(" and ".into()),
                Segment::Interpolation(Path::parse("b.c").unwrap()),
                Segment::Literal("!".into()),
            ]
        );
    }

    #[test]
    fn plain_text_has_no_interpolation() {
        let template = Template::parse("hello } world", BRACES).unwrap();
        assert!(!template.has_interpolation());
        assert!(!contains_interpolation("hello", BRACES));
    }

    #[test]
    fn unterminated_placeholder_reports_offset() {
        let err = Template::parse("ok {{a}} then {{ b", BRACES).unwrap_err();
        match err {
            Error::MalformedTemplate { offset, .. } => assert_eq!(offset, 14),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn custom_delimiters() {
        let template = Template::parse("[[ msg ]]", ("[[", "]]")).unwrap();
        assert_eq!(expressions(&template), vec!["msg"]);
    }

    #[test]
    fn empty_placeholder_is_a_path_error() {
        assert!(matches!(
            Template::parse("{{ }}", BRACES),
            Err(Error::Path { .. })
        ));
    }
}
