//! Query string parsing

/// Decode a query string into ordered pairs.
///
/// A repeated name keeps the position of its first occurrence and the value
/// of its last one.
pub fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let Some(query) = query else {
        return pairs;
    };

    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if let Some(existing) = pairs.iter_mut().find(|(k, _)| *k == name) {
            existing.1 = value.into_owned();
        } else {
            pairs.push((name.into_owned(), value.into_owned()));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_in_order() {
        let pairs = parse_query(Some("output=image&msg=Hello%20World&emoji=%F0%9F%98%80+x"));
        assert_eq!(
            pairs,
            vec![
                ("output".to_string(), "image".to_string()),
                ("msg".to_string(), "Hello World".to_string()),
                ("emoji".to_string(), "😀 x".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_keeps_first_position_last_value() {
        let pairs = parse_query(Some("a=1&b=2&a=3"));
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "3".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty() {
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
    }
}
