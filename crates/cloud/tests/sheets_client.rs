use assert_matches::assert_matches;
use courier_cloud::{SheetsClient, SheetsConfig, SheetsError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_config(server: &MockServer) -> SheetsConfig {
    SheetsConfig {
        api_base: server.uri(),
        spreadsheet_id: "leads".to_string(),
        range: "Contacts!A1:E".to_string(),
        api_key: "test-key".to_string(),
    }
}

#[tokio::test]
async fn fetch_rows_returns_cell_grid() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/leads/values/Contacts!A1:E"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "range": "Contacts!A1:E3",
            "majorDimension": "ROWS",
            "values": [
                ["Name", "Email", "Company", "Segment", "Possibility"],
                ["Ada", "ada@example.com", "Engines Ltd", "Enterprise", "High"],
                ["Bob", "bob@example.com"]
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SheetsClient::new(mock_config(&server)).unwrap();
    let rows = client.fetch_rows().await.unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][1], "Email");
    assert_eq!(rows[1][3], "Enterprise");
    assert_eq!(rows[2], vec!["Bob".to_string(), "bob@example.com".to_string()]);
}

#[tokio::test]
async fn empty_range_yields_no_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/leads/values/Contacts!A1:E"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "range": "Contacts!A1:E",
            "majorDimension": "ROWS"
        })))
        .mount(&server)
        .await;

    let client = SheetsClient::new(mock_config(&server)).unwrap();
    assert!(client.fetch_rows().await.unwrap().is_empty());
}

#[tokio::test]
async fn api_error_carries_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let client = SheetsClient::new(mock_config(&server)).unwrap();
    let err = client.fetch_rows().await.unwrap_err();
    assert_matches!(err, SheetsError::Api { status: 403, ref body } if body.contains("not valid"));
}
