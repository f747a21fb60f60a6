//! Bracket-path query string parser.
//!
//! The inverse of [`encode`](super::encode): `a[b][0]=x` becomes
//! `{"a": {"b": ["x"]}}`. Values are always strings; `+` decodes to a space;
//! a repeated key collects its values into an array. Maps whose keys are all
//! small indices become arrays ordered by index.

use serde_json::{Map, Value};

use super::QueryError;

/// Deepest bracket nesting accepted in a single key.
pub const MAX_DEPTH: usize = 20;

/// Largest index turned into an array slot; larger indices stay map keys.
const ARRAY_LIMIT: usize = 100;

/// Parse a raw query string (without the leading `?`).
pub fn parse(query: &str) -> Result<Value, QueryError> {
    let mut root = Map::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(raw_key)?;
        let value = decode(raw_value)?;
        let segments = split_key(&key)?;
        insert(&mut root, &segments, Value::String(value), &key)?;
    }

    Ok(compact(Value::Object(root)))
}

fn decode(raw: &str) -> Result<String, QueryError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| QueryError::Encoding(raw.to_string()))
}

/// `filters[slug][$eq]` → `["filters", "slug", "$eq"]`.
fn split_key(key: &str) -> Result<Vec<String>, QueryError> {
    let malformed = || QueryError::MalformedKey(key.to_string());

    let (root, mut rest) = match key.find('[') {
        Some(pos) => (&key[..pos], &key[pos..]),
        None => (key, ""),
    };
    if root.is_empty() || !is_plain_segment(root) {
        return Err(malformed());
    }

    let mut segments = vec![root.to_string()];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or_else(malformed)?;
        let close = inner.find(']').ok_or_else(malformed)?;
        let segment = &inner[..close];
        if segment.contains('[') || !is_plain_segment(segment) {
            return Err(malformed());
        }
        segments.push(segment.to_string());
        rest = &inner[close + 1..];

        if segments.len() > MAX_DEPTH {
            return Err(QueryError::TooDeep(key.to_string()));
        }
    }

    Ok(segments)
}

/// Segments are written back into upstream URLs unescaped, so anything a
/// URL parser treats as structure is refused.
fn is_plain_segment(segment: &str) -> bool {
    !segment.chars().any(|c| {
        matches!(c, '#' | '&' | '=' | '?' | '%' | '/') || c.is_whitespace() || c.is_control()
    })
}

fn insert(
    target: &mut Map<String, Value>,
    segments: &[String],
    value: Value,
    key: &str,
) -> Result<(), QueryError> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(());
    };
    // `a[]=x` appends.
    let slot = if head.is_empty() {
        target.len().to_string()
    } else {
        head.clone()
    };

    if rest.is_empty() {
        match target.get_mut(&slot) {
            None => {
                target.insert(slot, value);
            }
            Some(Value::String(previous)) => {
                let previous = std::mem::take(previous);
                let mut seq = Map::new();
                seq.insert("0".to_string(), Value::String(previous));
                seq.insert("1".to_string(), value);
                target.insert(slot, Value::Object(seq));
            }
            Some(Value::Object(seq)) if is_sequence(seq) => {
                seq.insert(seq.len().to_string(), value);
            }
            Some(_) => return Err(QueryError::Conflict(key.to_string())),
        }
        return Ok(());
    }

    let child = target
        .entry(slot)
        .or_insert_with(|| Value::Object(Map::new()));
    match child {
        Value::Object(inner) => insert(inner, rest, value, key),
        _ => Err(QueryError::Conflict(key.to_string())),
    }
}

fn is_sequence(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.parse::<usize>().is_ok())
}

fn compact(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let indices: Option<Vec<usize>> = map
                .keys()
                .map(|k| k.parse::<usize>().ok().filter(|i| *i <= ARRAY_LIMIT))
                .collect();
            match indices {
                Some(_) if !map.is_empty() => {
                    let mut entries: Vec<(usize, Value)> = map
                        .into_iter()
                        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, compact(v))))
                        .collect();
                    entries.sort_by_key(|(index, _)| *index);
                    Value::Array(entries.into_iter().map(|(_, v)| v).collect())
                }
                _ => Value::Object(map.into_iter().map(|(k, v)| (k, compact(v))).collect()),
            }
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::{
        FilterOperator, Filters, Pagination, Populate, QuerySpec, Relation, encode,
    };

    #[test]
    fn parses_bracket_paths() {
        let value = parse("filters[slug][$eq]=blue-widget&populate[0]=a&populate[1]=b").unwrap();
        assert_eq!(
            value,
            json!({
                "filters": { "slug": { "$eq": "blue-widget" } },
                "populate": ["a", "b"],
            })
        );
    }

    #[test]
    fn decodes_values_and_plus() {
        let value = parse("filters[title][$containsi]=blue+widget%2Fx").unwrap();
        assert_eq!(value["filters"]["title"]["$containsi"], json!("blue widget/x"));
    }

    #[test]
    fn decodes_encoded_brackets_in_keys() {
        let value = parse("filters%5Bslug%5D%5B%24eq%5D=x").unwrap();
        assert_eq!(value, json!({ "filters": { "slug": { "$eq": "x" } } }));
    }

    #[test]
    fn repeated_keys_collect() {
        let value = parse("sort=title&sort=createdAt:desc").unwrap();
        assert_eq!(value, json!({ "sort": ["title", "createdAt:desc"] }));
    }

    #[test]
    fn empty_brackets_append() {
        let value = parse("fields[]=title&fields[]=slug").unwrap();
        assert_eq!(value, json!({ "fields": ["title", "slug"] }));
    }

    #[test]
    fn sparse_indices_are_compacted_in_order() {
        let value = parse("a[5]=z&a[1]=y").unwrap();
        assert_eq!(value, json!({ "a": ["y", "z"] }));
    }

    #[test]
    fn large_indices_stay_keys() {
        let value = parse("a[1000]=x").unwrap();
        assert_eq!(value, json!({ "a": { "1000": "x" } }));
    }

    #[test]
    fn unclosed_bracket_is_rejected() {
        assert_eq!(
            parse("filters[slug=x").unwrap_err(),
            QueryError::MalformedKey("filters[slug".to_string())
        );
    }

    #[test]
    fn missing_root_is_rejected() {
        assert!(matches!(parse("[a]=x"), Err(QueryError::MalformedKey(_))));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(matches!(parse("a[b]c=x"), Err(QueryError::MalformedKey(_))));
    }

    #[test]
    fn scalar_then_map_conflicts() {
        assert!(matches!(parse("a=1&a[b]=2"), Err(QueryError::Conflict(_))));
    }

    #[test]
    fn url_structure_in_keys_is_rejected() {
        for query in [
            "filters[a%23]=x",
            "filters[a%26populate]=x",
            "filters[a%3Db]=x",
            "filters[a%3F]=x",
            "filters[a%2525]=x",
            "filters[a+b]=x",
            "filters[a%0A]=x",
            "sort%23=x",
        ] {
            assert!(
                matches!(parse(query), Err(QueryError::MalformedKey(_))),
                "{query} should be rejected"
            );
        }
    }

    #[test]
    fn operator_and_underscore_segments_are_plain() {
        let value = parse("filters[product_category][id][$in][0]=1").unwrap();
        assert_eq!(value["filters"]["product_category"]["id"]["$in"], json!(["1"]));
    }

    #[test]
    fn depth_is_bounded() {
        let key = format!("a{}", "[b]".repeat(MAX_DEPTH));
        assert!(matches!(parse(&format!("{key}=x")), Err(QueryError::TooDeep(_))));
    }

    #[test]
    fn bad_percent_encoding_is_rejected() {
        assert!(matches!(parse("a=%FF"), Err(QueryError::Encoding(_))));
    }

    #[test]
    fn round_trip_deep_populate() {
        // images → file → formats → variants: four levels of populate.
        let spec = QuerySpec::new()
            .with_populate(Populate::map([
                (
                    "images",
                    Relation::nested(QuerySpec::new().with_populate(Populate::map([(
                        "file",
                        Relation::nested(
                            QuerySpec::new()
                                .with_populate(Populate::map([(
                                    "formats",
                                    Relation::nested(
                                        QuerySpec::new()
                                            .with_populate(Populate::list(["variants"]))
                                            .with_fields(["url"]),
                                    ),
                                )]))
                                .with_sort(["name:asc"]),
                        ),
                    )]))),
                ),
                ("specs", Relation::Include),
            ]))
            .with_filters(
                Filters::new()
                    .with(&["product", "slug"], FilterOperator::Eq, "blue-widget")
                    .with(&["title"], FilterOperator::ContainsI, "lamp & shade"),
            )
            .with_sort(["title:asc", "createdAt:desc"])
            .with_pagination(Pagination::offset(20, 10).with_count(false))
            .with_fields(["title", "slug"]);

        let encoded = encode(&spec);
        let decoded = QuerySpec::parse(&encoded).unwrap();
        assert_eq!(decoded, spec);
        assert_eq!(encode(&decoded), encoded);
    }

    #[test]
    fn round_trip_wildcards() {
        let encoded = "populate[images][populate][file][populate]=%2A";
        let spec = QuerySpec::parse(encoded).unwrap();
        assert_eq!(
            spec.populate,
            Some(Populate::map([(
                "images",
                Relation::nested(
                    QuerySpec::new().with_populate(Populate::map([("file", Relation::populate_all())]))
                ),
            )]))
        );
        assert_eq!(encode(&spec), encoded);
    }
}
