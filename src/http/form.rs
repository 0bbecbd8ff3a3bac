use std::collections::HashMap;
use url::form_urlencoded;

/// Parameter values; `None` for a bare query token without `=`.
pub type Params = HashMap<String, Option<String>>;

/// Parse a query string (`a=1&b&c=x%20y`). Bare tokens are kept with no value.
pub fn parse_query(data: &str) -> Params {
    data.split('&')
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            let (k, v) = decode_pair(item)?;
            Some(if item.contains('=') { (k, Some(v)) } else { (k, None) })
        })
        .collect()
}

/// Parse an `application/x-www-form-urlencoded` body. Tokens without `=` are
/// dropped.
pub fn parse_form(data: &str) -> Params {
    data.split('&')
        .filter(|item| item.contains('='))
        .filter_map(decode_pair)
        .map(|(k, v)| (k, Some(v)))
        .collect()
}

/// Decode one `key=value` token: `%XX` escapes and `+` as space, split on the
/// first `=`. Broken escapes pass through and invalid UTF-8 is replaced.
fn decode_pair(item: &str) -> Option<(String, String)> {
    form_urlencoded::parse(item.as_bytes()).into_owned().next()
}
