// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notion payout rows and database query construction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::client::NotionError;

/// Names of the database columns a payout row is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    /// Rich text column holding the recipient address
    pub address: String,
    /// Number column holding the token amount
    pub amount: String,
    /// People column listing who approved the payout
    pub approver: String,
    /// Select column holding the payout month (e.g. `2025.2`)
    pub month: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            address: "地址".to_string(),
            amount: "USDT".to_string(),
            approver: "审核完毕，Signer".to_string(),
            month: "月份".to_string(),
        }
    }
}

/// Which rows count as approved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    /// Only rows created on or after this date.
    pub created_after: Option<NaiveDate>,
    /// Only rows whose month select equals this value.
    pub month: Option<String>,
    /// Only rows approved by this person (matched by display name).
    pub approver: Option<String>,
}

/// One approved payout row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRow {
    /// Notion page ID
    pub page_id: String,
    /// Raw address cell text (may carry trailing notes)
    pub address: String,
    /// Amount as a decimal string in whole token units
    pub amount: String,
    /// Display names of approvers
    pub approvers: Vec<String>,
    /// Month label
    pub month: Option<String>,
    /// When the page was created
    pub created_time: Option<DateTime<Utc>>,
}

impl PayoutRow {
    /// Whether `name` appears among the approvers.
    pub fn approved_by(&self, name: &str) -> bool {
        self.approvers.iter().any(|a| a == name)
    }
}

/// One page of a database query response.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Page size requested from the query endpoint (Notion's maximum).
pub const PAGE_SIZE: u32 = 100;

/// Build the body for `POST /v1/databases/{id}/query`.
pub fn build_query(filter: &RowFilter, props: &PropertyNames, cursor: Option<&str>) -> Value {
    let mut conditions = Vec::new();

    if let Some(date) = filter.created_after {
        conditions.push(json!({
            "timestamp": "created_time",
            "created_time": { "on_or_after": date.format("%Y-%m-%d").to_string() }
        }));
    }

    conditions.push(json!({
        "property": props.approver,
        "people": { "is_not_empty": true }
    }));

    if let Some(month) = &filter.month {
        conditions.push(json!({
            "property": props.month,
            "select": { "equals": month }
        }));
    }

    let mut body = json!({
        "filter": { "and": conditions },
        "page_size": PAGE_SIZE,
    });
    if let Some(cursor) = cursor {
        body["start_cursor"] = Value::String(cursor.to_string());
    }
    body
}

/// Parse a database page into a payout row.
pub fn parse_page(page: &Value, props: &PropertyNames) -> Result<PayoutRow, NotionError> {
    let page_id = page
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| NotionError::InvalidResponse("page without id".to_string()))?
        .to_string();

    let properties = page.get("properties").ok_or_else(|| NotionError::MissingProperty {
        page_id: page_id.clone(),
        property: "properties".to_string(),
    })?;

    let missing = |property: &str| NotionError::MissingProperty {
        page_id: page_id.clone(),
        property: property.to_string(),
    };

    let address = properties
        .get(&props.address)
        .and_then(property_text)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| missing(&props.address))?;

    let amount = properties
        .get(&props.amount)
        .and_then(property_number)
        .ok_or_else(|| missing(&props.amount))?;

    let approvers = properties
        .get(&props.approver)
        .and_then(|p| p.get("people"))
        .and_then(Value::as_array)
        .map(|people| {
            people
                .iter()
                .filter_map(|person| person.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let month = properties
        .get(&props.month)
        .and_then(|p| p.pointer("/select/name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let created_time = page
        .get("created_time")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(PayoutRow {
        page_id,
        address,
        amount,
        approvers,
        month,
        created_time,
    })
}

/// Concatenated plain text of a `rich_text` or `title` property.
fn property_text(property: &Value) -> Option<String> {
    let kind = property.get("type").and_then(Value::as_str).unwrap_or("rich_text");
    let spans = property.get(kind).and_then(Value::as_array)?;

    let text: String = spans
        .iter()
        .filter_map(|span| {
            span.get("plain_text")
                .or_else(|| span.pointer("/text/content"))
                .and_then(Value::as_str)
        })
        .collect();
    Some(text)
}

/// Decimal text of a `number` (or numeric formula) property.
fn property_number(property: &Value) -> Option<String> {
    let number = property
        .get("number")
        .or_else(|| property.pointer("/formula/number"))?;
    match number {
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(address: Value, amount: Value) -> Value {
        json!({
            "object": "page",
            "id": "page-1",
            "created_time": "2025-02-03T08:15:00.000Z",
            "properties": {
                "地址": address,
                "USDT": { "type": "number", "number": amount },
                "审核完毕，Signer": {
                    "type": "people",
                    "people": [{ "object": "user", "id": "u1", "name": "BigSong" }]
                },
                "月份": { "type": "select", "select": { "name": "2025.2" } }
            }
        })
    }

    fn rich_text(content: &str) -> Value {
        json!({
            "type": "rich_text",
            "rich_text": [{
                "type": "text",
                "text": { "content": content },
                "plain_text": content
            }]
        })
    }

    #[test]
    fn test_parse_page_full_row() {
        let value = page(
            rich_text("0xe8dB51eeFd0D9ad2c4f23BD063043cEfCa3cCe77 (ERC20)"),
            json!(0.88),
        );
        let row = parse_page(&value, &PropertyNames::default()).unwrap();

        assert_eq!(row.page_id, "page-1");
        assert_eq!(row.address, "0xe8dB51eeFd0D9ad2c4f23BD063043cEfCa3cCe77 (ERC20)");
        assert_eq!(row.amount, "0.88");
        assert_eq!(row.approvers, vec!["BigSong".to_string()]);
        assert_eq!(row.month.as_deref(), Some("2025.2"));
        assert!(row.created_time.is_some());
        assert!(row.approved_by("BigSong"));
        assert!(!row.approved_by("Someone"));
    }

    #[test]
    fn test_parse_page_integer_amount() {
        let value = page(rich_text("0xabc"), json!(120));
        let row = parse_page(&value, &PropertyNames::default()).unwrap();
        assert_eq!(row.amount, "120");
    }

    #[test]
    fn test_parse_page_missing_amount() {
        let value = page(rich_text("0xabc"), Value::Null);
        let err = parse_page(&value, &PropertyNames::default()).unwrap_err();
        assert!(matches!(
            err,
            NotionError::MissingProperty { ref property, .. } if property == "USDT"
        ));
    }

    #[test]
    fn test_parse_page_empty_address() {
        let value = page(json!({ "type": "rich_text", "rich_text": [] }), json!(1));
        assert!(matches!(
            parse_page(&value, &PropertyNames::default()),
            Err(NotionError::MissingProperty { .. })
        ));
    }

    #[test]
    fn test_parse_page_joins_spans_and_title() {
        let props = PropertyNames {
            address: "Name".to_string(),
            ..PropertyNames::default()
        };
        let value = json!({
            "id": "page-2",
            "properties": {
                "Name": {
                    "type": "title",
                    "title": [
                        { "plain_text": "0x5AFa5a4ff6A6a6e79Ab0" },
                        { "plain_text": "D90a300541f69b3De17D" }
                    ]
                },
                "USDT": { "type": "number", "number": 0.5 }
            }
        });
        let row = parse_page(&value, &props).unwrap();
        assert_eq!(row.address, "0x5AFa5a4ff6A6a6e79Ab0D90a300541f69b3De17D");
        assert!(row.approvers.is_empty());
        assert!(row.month.is_none());
    }

    #[test]
    fn test_build_query_with_all_conditions() {
        let filter = RowFilter {
            created_after: NaiveDate::from_ymd_opt(2025, 2, 1),
            month: Some("2025.2".to_string()),
            approver: Some("BigSong".to_string()),
        };
        let body = build_query(&filter, &PropertyNames::default(), Some("cursor-1"));

        let conditions = body["filter"]["and"].as_array().unwrap();
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[0]["created_time"]["on_or_after"], "2025-02-01");
        assert_eq!(conditions[1]["people"]["is_not_empty"], true);
        assert_eq!(conditions[2]["select"]["equals"], "2025.2");
        assert_eq!(body["start_cursor"], "cursor-1");
        assert_eq!(body["page_size"], 100);
    }

    #[test]
    fn test_build_query_minimal() {
        let body = build_query(&RowFilter::default(), &PropertyNames::default(), None);
        let conditions = body["filter"]["and"].as_array().unwrap();
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0]["property"], "审核完毕，Signer");
        assert!(body.get("start_cursor").is_none());
    }
}
