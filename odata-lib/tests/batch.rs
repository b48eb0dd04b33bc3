//! Batch exchanges against a scripted transport.

mod common;

use common::FakeTransport;
use common::client;
use common::header;
use common::url;
use odata_lib::ClientSettings;
use odata_lib::batch::MAX_OPERATIONS;
use odata_lib::command::Command;
use odata_lib::error::Error;
use odata_lib::model::Entry;
use odata_lib::transport::HttpResponse;

fn multipart(boundary: &str, lines: &[&str]) -> HttpResponse {
    HttpResponse::new(202, lines.join("\r\n")).with_header(
        "Content-Type",
        &format!("multipart/mixed; boundary={}", boundary),
    )
}

fn sent_body(transport: &FakeTransport) -> String {
    transport.last().body.unwrap_or_default()
}

#[tokio::test]
async fn test_insert_then_link_to_pending_entry() {
    let transport = FakeTransport::new();
    // Sub-parts come back out of order; routing follows Content-ID.
    transport.respond_with(multipart(
        "batchresponse_1",
        &[
            "--batchresponse_1",
            "Content-Type: multipart/mixed; boundary=changesetresponse_1",
            "",
            "--changesetresponse_1",
            "Content-Type: application/http",
            "Content-Transfer-Encoding: binary",
            "Content-ID: 2",
            "",
            "HTTP/1.1 204 No Content",
            "",
            "--changesetresponse_1",
            "Content-Type: application/http",
            "Content-Transfer-Encoding: binary",
            "Content-ID: 1",
            "",
            "HTTP/1.1 201 Created",
            "Content-Type: application/json",
            "",
            r#"{"ProductID":78,"ProductName":"Tofu"}"#,
            "--changesetresponse_1--",
            "--batchresponse_1--",
            "",
        ],
    ));
    let client = client(&transport, ClientSettings::new());

    let mut batch = client.batch();
    let product = batch.insert_entry(
        Command::collection("Products").set(Entry::new().set("ProductName", "Tofu")),
    );
    let link = batch.link_entry(
        &product,
        "Category",
        Command::collection("Categories").key(1).unwrap(),
    );
    let results = batch.execute().await.unwrap();

    let request = transport.last();
    assert_eq!(request.url, url("$batch"));
    assert!(header(&request, "Content-Type").unwrap().starts_with("multipart/mixed; boundary=batch_"));

    let body = sent_body(&transport);
    assert!(body.contains("Content-ID: 1\r\n\r\nPOST https://example.org/Northwind.svc/Products HTTP/1.1"));
    assert!(body.contains("Content-ID: 2\r\n\r\nPUT $1/Category/$ref HTTP/1.1"));
    assert!(body.contains(r#"{"@odata.id":"https://example.org/Northwind.svc/Categories(1)"}"#));
    // Both writes share one changeset.
    assert_eq!(body.matches("boundary=changeset_").count(), 1);

    assert_eq!(results.len(), 2);
    let created = results.entry(&product).unwrap();
    assert_eq!(created.get_int("ProductID").unwrap(), Some(78));
    assert_eq!(results.get(&link).unwrap().status(), 204);
}

#[tokio::test]
async fn test_binding_to_pending_insert() {
    let transport = FakeTransport::new();
    transport.respond_with(multipart(
        "batchresponse_2",
        &[
            "--batchresponse_2",
            "Content-Type: multipart/mixed; boundary=changesetresponse_2",
            "",
            "--changesetresponse_2",
            "Content-Type: application/http",
            "",
            "HTTP/1.1 201 Created",
            "",
            r#"{"CategoryID":9,"CategoryName":"Tea"}"#,
            "--changesetresponse_2",
            "Content-Type: application/http",
            "",
            "HTTP/1.1 201 Created",
            "",
            r#"{"ProductID":79,"ProductName":"Sencha"}"#,
            "--changesetresponse_2--",
            "--batchresponse_2--",
        ],
    ));
    let client = client(&transport, ClientSettings::new());

    let mut batch = client.batch();
    let category = batch.insert_entry(
        Command::collection("Categories").set(Entry::new().set("CategoryName", "Tea")),
    );
    let product = batch.insert_entry(Command::collection("Products").set(
        Entry::new()
            .set("ProductName", "Sencha")
            .bind("Category", category.reference()),
    ));
    let results = batch.execute().await.unwrap();

    assert!(sent_body(&transport).contains(r#""Category@odata.bind":"$1""#));
    // Without Content-IDs the sub-parts are routed by position.
    assert_eq!(
        results.entry(&category).unwrap().get_string("CategoryName").unwrap(),
        Some("Tea")
    );
    assert_eq!(results.entry(&product).unwrap().get_int("ProductID").unwrap(), Some(79));
}

#[tokio::test]
async fn test_failed_changeset_part_surfaces_protocol_error() {
    let transport = FakeTransport::new();
    transport.respond_with(multipart(
        "batchresponse_3",
        &[
            "--batchresponse_3",
            "Content-Type: application/http",
            "",
            "HTTP/1.1 200 OK",
            "Content-Type: application/json",
            "",
            r#"{"value":[{"ProductID":1}]}"#,
            "--batchresponse_3",
            "Content-Type: multipart/mixed; boundary=changesetresponse_3",
            "",
            "--changesetresponse_3",
            "Content-Type: application/http",
            "Content-ID: 2",
            "",
            "HTTP/1.1 404 Not Found",
            "",
            "--changesetresponse_3--",
            "--batchresponse_3--",
        ],
    ));
    let client = client(&transport, ClientSettings::new());

    let mut batch = client.batch();
    batch.find_entries(Command::collection("Products"));
    let delete = batch.delete_entry(Command::collection("Products").key(99).unwrap());
    batch.if_match(&delete, "W/\"5\"");
    let err = batch.execute().await.unwrap_err();

    match err {
        Error::Protocol(e) => {
            assert_eq!(e.status, 404);
            assert_eq!(e.message, "Not Found");
            assert_eq!(e.content_id.as_deref(), Some("2"));
        }
        other => panic!("expected protocol error, got {:?}", other),
    }

    let body = sent_body(&transport);
    assert!(body.contains("GET https://example.org/Northwind.svc/Products HTTP/1.1"));
    assert!(body.contains("DELETE https://example.org/Northwind.svc/Products(99) HTTP/1.1"));
    assert!(body.contains("If-Match: W/\"5\""));
}

#[tokio::test]
async fn test_reference_to_non_insert_is_rejected() {
    let transport = FakeTransport::new();
    let client = client(&transport, ClientSettings::new());

    let mut batch = client.batch();
    let read = batch.find_entries(Command::collection("Products").key(1).unwrap());
    batch.delete_entry(read);
    let err = batch.execute().await.unwrap_err();

    assert!(matches!(err, Error::InvalidCommand(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_reference_across_changesets_is_rejected() {
    let transport = FakeTransport::new();
    let client = client(&transport, ClientSettings::new());

    let mut batch = client.batch();
    let product = batch.insert_entry(
        Command::collection("Products").set(Entry::new().set("ProductName", "Tofu")),
    );
    batch.find_entries(Command::collection("Categories"));
    batch.link_entry(
        &product,
        "Category",
        Command::collection("Categories").key(1).unwrap(),
    );
    let err = batch.execute().await.unwrap_err();

    assert!(matches!(err, Error::InvalidCommand(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_operation_limit() {
    let transport = FakeTransport::new();
    let client = client(&transport, ClientSettings::new());

    let mut batch = client.batch();
    for id in 0..=MAX_OPERATIONS {
        batch.find_entries(Command::collection("Products").key(id as i32).unwrap());
    }
    assert_eq!(batch.len(), MAX_OPERATIONS + 1);

    let err = batch.execute().await.unwrap_err();
    assert!(matches!(err, Error::InvalidCommand(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_empty_batch_sends_nothing() {
    let transport = FakeTransport::new();
    let client = client(&transport, ClientSettings::new());

    let results = client.batch().execute().await.unwrap();
    assert!(results.is_empty());
    assert!(transport.requests().is_empty());
}
