// Thin reqwest wrapper over the Sheets v4 REST API.
// see: https://developers.google.com/sheets/api/samples/reading

use crate::adapters::auth::AuthorizedSession;
use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use indexmap::IndexMap;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    title: String,
    #[serde(default)]
    sheet_id: i64,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    // API 對空白工作表不回傳 values
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// A spreadsheet resolved by key: its title and the worksheets it holds.
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    key: String,
    title: String,
    worksheets: Vec<Worksheet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    spreadsheet_key: String,
    title: String,
    sheet_id: i64,
}

impl Spreadsheet {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn worksheet(&self, name: &str) -> Result<&Worksheet> {
        self.worksheets
            .iter()
            .find(|ws| ws.title == name)
            .ok_or_else(|| {
                EtlError::not_found(format!(
                    "worksheet '{}' in spreadsheet '{}'",
                    name, self.title
                ))
            })
    }
}

impl Worksheet {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sheet_id(&self) -> i64 {
        self.sheet_id
    }

    /// A1 range covering the whole worksheet.
    fn absolute_range(&self) -> String {
        format!("'{}'", self.title.replace('\'', "''"))
    }
}

pub struct SheetsClient {
    session: AuthorizedSession,
    api_base: Url,
}

impl SheetsClient {
    pub fn new(session: AuthorizedSession, api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base).map_err(|e| EtlError::InvalidConfigValueError {
            field: "api_base".to_string(),
            value: api_base.to_string(),
            reason: e.to_string(),
        })?;
        if api_base.cannot_be_a_base() {
            return Err(EtlError::InvalidConfigValueError {
                field: "api_base".to_string(),
                value: api_base.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }
        Ok(Self { session, api_base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn open_by_key(&self, key: &str) -> Result<Spreadsheet> {
        let mut url = self.endpoint(&[key]);
        url.query_pairs_mut()
            .append_pair("fields", "properties.title,sheets.properties");

        let response = self.session.get(url).await?;
        let metadata: SpreadsheetMetadata =
            read_json(response, || format!("spreadsheet with key '{}'", key)).await?;

        tracing::debug!(
            "Spreadsheet '{}' has {} worksheet(s)",
            metadata.properties.title,
            metadata.sheets.len()
        );

        Ok(Spreadsheet {
            key: key.to_string(),
            title: metadata.properties.title,
            worksheets: metadata
                .sheets
                .into_iter()
                .map(|s| Worksheet {
                    spreadsheet_key: key.to_string(),
                    title: s.properties.title,
                    sheet_id: s.properties.sheet_id,
                })
                .collect(),
        })
    }

    /// All cell values of the worksheet, row-major, as formatted strings.
    pub async fn get_all_values(&self, worksheet: &Worksheet) -> Result<Vec<Vec<Value>>> {
        let range = worksheet.absolute_range();
        let url = self.endpoint(&[&worksheet.spreadsheet_key, "values", &range]);

        let response = self.session.get(url).await?;
        let values: ValueRange =
            read_json(response, || format!("worksheet '{}'", worksheet.title)).await?;
        Ok(values.values)
    }

    /// First row is the header; every following row becomes one record.
    pub async fn get_all_records(&self, worksheet: &Worksheet) -> Result<Vec<Record>> {
        let values = self.get_all_values(worksheet).await?;
        rows_to_records(values)
    }
}

async fn read_json<T, F>(response: Response, resource: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> String,
{
    match response.status() {
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
            let status = response.status();
            Err(EtlError::not_found(format!("{} ({})", resource(), status)))
        }
        _ => Ok(response.error_for_status()?.json().await?),
    }
}

pub fn rows_to_records(mut values: Vec<Vec<Value>>) -> Result<Vec<Record>> {
    if values.is_empty() {
        return Ok(Vec::new());
    }
    let header: Vec<String> = values.remove(0).iter().map(cell_text).collect();

    let mut seen = HashSet::new();
    if let Some(dup) = header.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(EtlError::processing(format!(
            "the header row in the worksheet is not unique: '{}'",
            dup
        )));
    }

    let records = values
        .into_iter()
        .map(|row| {
            let mut cells = row.into_iter();
            let data: IndexMap<String, Value> = header
                .iter()
                .map(|h| {
                    let text = cells.next().map(|v| cell_text(&v)).unwrap_or_default();
                    (h.clone(), numericise(&text))
                })
                .collect();
            Record { data }
        })
        .collect();

    Ok(records)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Integer if it parses as one, then float, otherwise the text itself.
/// Text containing `_` is never converted.
pub fn numericise(text: &str) -> Value {
    if text.contains('_') {
        return Value::String(text.to_string());
    }
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::ServiceAccountCredentials;
    use httpmock::prelude::*;
    use serde_json::json;

    const KEY_FILE: &str = include_str!("../../tests/fixtures/service_account.json");

    fn session_for(server: &MockServer) -> AuthorizedSession {
        let mut value: Value = serde_json::from_str(KEY_FILE).unwrap();
        value["token_uri"] = Value::from(server.url("/token"));
        let creds = ServiceAccountCredentials::from_json_str(&value.to_string()).unwrap();
        AuthorizedSession::new(creds)
    }

    fn mock_token(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200)
                .json_body(json!({"access_token": "tok", "expires_in": 3600}));
        });
    }

    #[test]
    fn test_numericise() {
        assert_eq!(numericise("12"), json!(12));
        assert_eq!(numericise("0"), json!(0));
        assert_eq!(numericise("1.5"), json!(1.5));
        assert_eq!(numericise("29,335.58"), json!("29,335.58"));
        assert_eq!(numericise("4A001H"), json!("4A001H"));
        assert_eq!(numericise("1_000"), json!("1_000"));
        assert_eq!(numericise(""), json!(""));
    }

    #[test]
    fn test_rows_to_records_pads_and_truncates() {
        let values = vec![
            vec![json!("Serial Number"), json!("Count"), json!("Note")],
            vec![json!("4A001H"), json!("3")],
            vec![json!("4A002H"), json!("4"), json!("ok"), json!("extra")],
        ];
        let records = rows_to_records(values).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data["Serial Number"], json!("4A001H"));
        assert_eq!(records[0].data["Count"], json!(3));
        assert_eq!(records[0].data["Note"], json!(""));
        assert_eq!(records[1].data.len(), 3);
        let keys: Vec<&String> = records[1].data.keys().collect();
        assert_eq!(keys, ["Serial Number", "Count", "Note"]);
    }

    #[test]
    fn test_rows_to_records_rejects_duplicate_headers() {
        let values = vec![vec![json!("a"), json!("a")], vec![json!(1), json!(2)]];
        assert!(matches!(
            rows_to_records(values),
            Err(EtlError::ProcessingError { .. })
        ));
    }

    #[test]
    fn test_header_only_sheet_has_no_records() {
        let values = vec![vec![json!("a"), json!("b")]];
        assert!(rows_to_records(values).unwrap().is_empty());
        assert!(rows_to_records(Vec::new()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_by_key_and_read_records() {
        let server = MockServer::start();
        mock_token(&server);
        let meta_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v4/spreadsheets/abc123")
                .header("authorization", "Bearer tok");
            then.status(200).json_body(json!({
                "properties": {"title": "Line 4 Output"},
                "sheets": [
                    {"properties": {"title": "Summary", "sheetId": 0}},
                    {"properties": {"title": "Data", "sheetId": 7}}
                ]
            }));
        });
        let values_mock = server.mock(|when, then| {
            when.method(GET).path("/v4/spreadsheets/abc123/values/'Data'");
            then.status(200).json_body(json!({
                "range": "Data!A1:B3",
                "majorDimension": "ROWS",
                "values": [["Serial Number", "D StdDev OL"], ["4A001H", "0"], ["4A002H", "0.25"]]
            }));
        });

        let client = SheetsClient::new(session_for(&server), &server.url("/v4/spreadsheets")).unwrap();
        let sheet = client.open_by_key("abc123").await.unwrap();
        assert_eq!(sheet.title(), "Line 4 Output");

        let ws = sheet.worksheet("Data").unwrap();
        assert_eq!(ws.sheet_id(), 7);
        let records = client.get_all_records(ws).await.unwrap();

        meta_mock.assert();
        values_mock.assert();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].data["D StdDev OL"], json!(0.25));
    }

    #[tokio::test]
    async fn test_missing_spreadsheet_is_not_found() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(GET).path("/v4/spreadsheets/missing");
            then.status(404).json_body(json!({"error": {"code": 404}}));
        });

        let client = SheetsClient::new(session_for(&server), &server.url("/v4/spreadsheets")).unwrap();
        let err = client.open_by_key("missing").await.unwrap_err();
        assert!(matches!(err, EtlError::NotFoundError { .. }));
    }

    #[tokio::test]
    async fn test_missing_worksheet_is_not_found() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(GET).path("/v4/spreadsheets/abc123");
            then.status(200).json_body(json!({
                "properties": {"title": "Line 4 Output"},
                "sheets": [{"properties": {"title": "Summary", "sheetId": 0}}]
            }));
        });

        let client = SheetsClient::new(session_for(&server), &server.url("/v4/spreadsheets")).unwrap();
        let sheet = client.open_by_key("abc123").await.unwrap();
        assert_eq!(sheet.key(), "abc123");
        assert!(matches!(
            sheet.worksheet("Data"),
            Err(EtlError::NotFoundError { .. })
        ));
    }
}
