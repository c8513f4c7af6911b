use regex::Regex;
use reqwest::Client;
use serde_json::Value;

const AUTOCOMPLETE_URL: &str = "https://ac.finance.naver.com/ac";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerIdentity {
    pub code: String,
    pub name: String,
}

/// Resolves a search term to a ticker code and display name.
///
/// A bare 6-digit code is taken as-is with a placeholder name, no lookup.
/// Anything else goes through the autocomplete endpoint once. Lookup
/// failures of any kind (transport error, malformed body, no matches) come
/// back as `None` so the caller can show a normal "not found" message
/// instead of an error.
pub async fn resolve(client: &Client, term: &str) -> Option<TickerIdentity> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }

    let code_re = Regex::new(r"^\d{6}$").unwrap();
    if code_re.is_match(term) {
        return Some(TickerIdentity {
            code: term.to_string(),
            name: format!("Code:{}", term),
        });
    }

    let body = lookup(client, term).await.ok()?;
    first_match(&body)
}

async fn lookup(client: &Client, term: &str) -> anyhow::Result<Value> {
    let response = client
        .get(AUTOCOMPLETE_URL)
        .query(&[
            ("q", term),
            ("q_enc", "utf-8"),
            ("st", "111"),
            ("frm", "stock"),
            ("r_format", "json"),
            ("r_enc", "utf-8"),
            ("r_unicode", "1"),
            ("t_koreng", "1"),
        ])
        .send()
        .await?
        .error_for_status()?;

    Ok(response.json().await?)
}

/// Pulls the first code/name pair out of the autocomplete body.
///
/// `items` holds one list per category; the first list is the company
/// matches, each a `[[codes...], [names...]]` group.
fn first_match(body: &Value) -> Option<TickerIdentity> {
    let groups = body.get("items")?.get(0)?.as_array()?;
    let group = groups.first()?;
    let code = group.get(0)?.get(0)?.as_str()?;
    let name = group.get(1)?.get(0)?.as_str()?;

    Some(TickerIdentity {
        code: code.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn six_digit_code_resolves_to_itself() {
        let client = Client::new();
        let identity = resolve(&client, " 005930 ").await.unwrap();
        assert_eq!(identity.code, "005930");
        assert_eq!(identity.name, "Code:005930");
    }

    #[tokio::test]
    async fn empty_term_is_not_found() {
        let client = Client::new();
        assert_eq!(resolve(&client, "   ").await, None);
    }

    #[test]
    fn first_match_takes_first_code_name_pair() {
        let body = json!({
            "items": [
                [
                    [["005930"], ["Samsung Electronics"]],
                    [["005935"], ["Samsung Electronics Pref"]]
                ]
            ]
        });
        let identity = first_match(&body).unwrap();
        assert_eq!(identity.code, "005930");
        assert_eq!(identity.name, "Samsung Electronics");
    }

    #[test]
    fn empty_items_is_not_found() {
        assert_eq!(first_match(&json!({ "items": [[]] })), None);
        assert_eq!(first_match(&json!({ "items": [] })), None);
        assert_eq!(first_match(&json!({})), None);
    }

    #[test]
    fn malformed_group_is_not_found() {
        let body = json!({ "items": [[ [["005930"]] ]] });
        assert_eq!(first_match(&body), None);
    }
}
