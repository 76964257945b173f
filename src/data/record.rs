use eframe::egui::vec2;
use serde_json::Value;

use crate::util::extract_numeric_tokens;

use super::Point;

pub const FALLBACK_IMAGE_URL: &str =
    "https://scholar.google.com/citations/images/avatar_scholar_256.png";

const FIELD_INTERESTS: usize = 2;
const FIELD_TIME: usize = 3;
const FIELD_NAME: usize = 4;
const FIELD_CITATIONS: usize = 5;
const FIELD_IMAGE_URLS: usize = 6;
const FIELD_SUMMARY: usize = 7;
const FIELD_SCHOLAR_URL: usize = 8;
const FIELD_KEYWORDS: usize = 9;
const FIELD_AFFILIATIONS: usize = 10;
const FIELD_HOMEPAGE: usize = 11;
const FIELD_EMBEDDING: usize = 12;

pub fn parse_record(line: &str, id: u32) -> Option<Point> {
    let parsed: Value = serde_json::from_str(line).ok()?;
    let row = parsed.as_array()?;

    let x = field_f32(row, 0)?;
    let y = field_f32(row, 1)?;
    if !x.is_finite() || !y.is_finite() {
        return None;
    }

    let pos = vec2(x, y);
    Some(Point {
        id,
        pos,
        raw: pos,
        name: field_string(row, FIELD_NAME),
        interests: field_string(row, FIELD_INTERESTS),
        time: field_string(row, FIELD_TIME),
        group: field_string(row, FIELD_KEYWORDS)
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_owned(),
        image_url: parse_image_url(row.get(FIELD_IMAGE_URLS)),
        summary: field_string(row, FIELD_SUMMARY),
        citations: field_f32(row, FIELD_CITATIONS).unwrap_or(0.0).max(0.0) as u32,
        scholar_url: field_string(row, FIELD_SCHOLAR_URL),
        keywords: field_string(row, FIELD_KEYWORDS),
        affiliation: field_string(row, FIELD_AFFILIATIONS),
        homepage: field_string(row, FIELD_HOMEPAGE),
        embedding: parse_embedding(row.get(FIELD_EMBEDDING)),
    })
}

fn field_f32(row: &[Value], index: usize) -> Option<f32> {
    match row.get(index)? {
        Value::Number(number) => number.as_f64().map(|value| value as f32),
        Value::String(text) => text.trim().parse::<f32>().ok(),
        _ => None,
    }
}

fn field_string(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

fn parse_image_url(value: Option<&Value>) -> String {
    let first_url = match value {
        Some(Value::String(text)) => serde_json::from_str::<Vec<String>>(text)
            .ok()
            .and_then(|urls| urls.into_iter().next()),
        Some(Value::Array(urls)) => urls
            .first()
            .and_then(Value::as_str)
            .map(|url| url.to_owned()),
        _ => None,
    };

    first_url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_IMAGE_URL.to_owned())
}

fn parse_embedding(value: Option<&Value>) -> Vec<f32> {
    match value {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|entry| match entry {
                Value::Number(number) => number.as_f64().map(|value| value as f32),
                Value::String(text) => text.trim().parse::<f32>().ok(),
                _ => None,
            })
            .collect(),
        Some(Value::String(text)) => extract_numeric_tokens(text),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_line() -> String {
        concat!(
            "[1.5, -2.25, \"ml, vision\", \"2019\", \"Ada Example\", 1234, ",
            "\"[\\\"https://img.example/a.png\\\"]\", \"studies things\", ",
            "\"https://scholar.example/a\", \"vision, robotics\", \"Example Univ\", ",
            "\"https://example.org\", [0.1, 0.2, 0.3]]"
        )
        .to_owned()
    }

    #[test]
    fn parses_complete_record() {
        let point = parse_record(&full_line(), 7).expect("record should parse");
        assert_eq!(point.id, 7);
        assert_eq!(point.pos.x, 1.5);
        assert_eq!(point.pos.y, -2.25);
        assert_eq!(point.raw, point.pos);
        assert_eq!(point.name, "Ada Example");
        assert_eq!(point.citations, 1234);
        assert_eq!(point.image_url, "https://img.example/a.png");
        assert_eq!(point.group, "vision");
        assert_eq!(point.embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn missing_coordinates_drop_the_record() {
        assert!(parse_record("[\"not-a-number\", 2.0, \"x\"]", 0).is_none());
        assert!(parse_record("[]", 0).is_none());
        assert!(parse_record("not json at all", 0).is_none());
    }

    #[test]
    fn minimal_record_gets_safe_defaults() {
        let point = parse_record("[0.5, 0.25]", 3).expect("coordinates alone are enough");
        assert_eq!(point.name, "");
        assert_eq!(point.citations, 0);
        assert_eq!(point.image_url, FALLBACK_IMAGE_URL);
        assert!(point.embedding.is_empty());
    }

    #[test]
    fn malformed_embedding_string_recovers_tokens() {
        let line = "[1.0, 2.0, \"\", \"\", \"n\", 0, \"\", \"\", \"\", \"\", \"\", \"\", \"[0.5 0.75,, junk -1.5]\"]";
        let point = parse_record(line, 0).expect("record should parse");
        assert_eq!(point.embedding, vec![0.5, 0.75, -1.5]);
    }

    #[test]
    fn missing_image_urls_fall_back() {
        let line = "[1.0, 2.0, \"\", \"\", \"n\", 0, \"not json\", \"\"]";
        let point = parse_record(line, 0).expect("record should parse");
        assert_eq!(point.image_url, FALLBACK_IMAGE_URL);
    }

    #[test]
    fn native_image_url_array_is_accepted() {
        let line = "[1.0, 2.0, \"\", \"\", \"n\", 0, [\"https://img.example/b.png\"]]";
        let point = parse_record(line, 0).expect("record should parse");
        assert_eq!(point.image_url, "https://img.example/b.png");
    }
}
