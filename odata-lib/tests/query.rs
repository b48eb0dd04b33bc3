//! Client terminals against a scripted transport.

mod common;

use common::FakeTransport;
use common::client;
use common::header;
use common::url;
use futures::TryStreamExt;
use odata_lib::ClientSettings;
use odata_lib::command::Command;
use odata_lib::error::Error;
use odata_lib::expr::prop;
use odata_lib::model::Entry;
use odata_lib::model::Value;
use odata_lib::protocol::ProtocolVersion;
use reqwest::Method;
use tokio_util::sync::CancellationToken;

fn v3() -> ClientSettings {
    ClientSettings::new().with_protocol(ProtocolVersion::V3)
}

#[tokio::test]
async fn test_key_filter_reads_single_entry() {
    let transport = FakeTransport::new();
    transport.respond(
        200,
        r#"{"@odata.context":"x","ProductID":1,"ProductName":"Chai","UnitPrice":18.0}"#,
    );
    let client = client(&transport, ClientSettings::new());

    let entry = client
        .query(Command::collection("Products").filter(prop("ProductID").eq(1)).unwrap())
        .find_entry()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(transport.urls(), vec![url("Products(1)")]);
    assert_eq!(entry.get_string("ProductName").unwrap(), Some("Chai"));
    assert_eq!(entry.get_int("ProductID").unwrap(), Some(1));
}

#[tokio::test]
async fn test_non_key_filter_is_query_option() {
    let transport = FakeTransport::new();
    transport.respond(200, r#"{"value":[{"ProductID":2},{"ProductID":3}]}"#);
    let client = client(&transport, ClientSettings::new());

    let feed = client
        .query(Command::collection("Products").filter(prop("ProductID").ne(1)).unwrap())
        .find_entries()
        .await
        .unwrap();

    assert_eq!(transport.urls(), vec![url("Products?$filter=ProductID%20ne%201")]);
    assert_eq!(feed.len(), 2);
}

#[tokio::test]
async fn test_legacy_expand_select_order_scenario() {
    let transport = FakeTransport::new();
    transport.respond(
        200,
        r#"{"d":{"results":[{
            "__metadata":{"uri":"https://example.org/Northwind.svc/Employees(1)","type":"NorthwindModel.Employee"},
            "LastName":"Davolio",
            "Subordinates":{"results":[{
                "__metadata":{"uri":"https://example.org/Northwind.svc/Employees(2)","type":"NorthwindModel.Employee"},
                "LastName":"Fuller"
            }]}
        }]}}"#,
    );
    let client = client(&transport, v3());

    let feed = client
        .query(
            Command::collection("Employees")
                .expand("Subordinates")
                .select(["LastName", "Subordinates"])
                .order_by("LastName"),
        )
        .find_entries()
        .await
        .unwrap();

    let request = transport.last();
    assert_eq!(
        request.url,
        url("Employees?$expand=Subordinates&$select=LastName,Subordinates&$orderby=LastName")
    );
    assert_eq!(header(&request, "DataServiceVersion").as_deref(), Some("3.0"));

    let davolio = &feed.entries()[0];
    assert_eq!(davolio.get_string("LastName").unwrap(), Some("Davolio"));
    // Key decoded from the identity URI.
    assert_eq!(davolio.get_int("EmployeeID").unwrap(), Some(1));
    let subordinates = davolio.get_entries("Subordinates").unwrap().unwrap();
    assert_eq!(subordinates.len(), 1);
    assert_eq!(subordinates[0].get_string("LastName").unwrap(), Some("Fuller"));
}

#[tokio::test]
async fn test_expand_depth_formats_nested() {
    let transport = FakeTransport::new();
    let client = client(&transport, ClientSettings::new());

    let uri = client
        .format(&Command::collection("Employees").expand("Orders/Order_Details/Product"))
        .await
        .unwrap();
    assert_eq!(uri, "Employees?$expand=Orders($expand=Order_Details($expand=Product))");

    let legacy = common::client(&transport, v3());
    let uri = legacy
        .format(&Command::collection("Employees").expand("Orders/Order_Details/Product"))
        .await
        .unwrap();
    assert_eq!(uri, "Employees?$expand=Orders/Order_Details/Product");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_malformed_expand_path_is_rejected() {
    let transport = FakeTransport::new();
    let client = client(&transport, ClientSettings::new());

    for path in ["", "Orders//Order_Details", "Orders/"] {
        let err = client
            .format(&Command::collection("Employees").expand(path))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCommand(_)), "{:?}", path);
    }
    let err = client
        .query(Command::collection("Employees").expand("Orders//").navigate("Orders"))
        .find_entries()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCommand(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_not_found_surfaced_by_default() {
    let transport = FakeTransport::new();
    transport.respond(404, "");
    let client = client(&transport, ClientSettings::new());

    let err = client
        .query(Command::collection("Products").key(99).unwrap())
        .find_entry()
        .await
        .unwrap_err();

    match err {
        Error::Protocol(e) => {
            assert_eq!(e.status, 404);
            assert_eq!(e.message, "Not Found");
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_not_found_tolerated() {
    let transport = FakeTransport::new();
    transport
        .respond(404, r#"{"error":{"code":"","message":"Resource not found for the segment 'Products'."}}"#)
        .respond(404, "")
        .respond(404, "");
    let client = client(&transport, ClientSettings::new().with_ignore_resource_not_found(true));

    let product = Command::collection("Products").key(99).unwrap();
    assert!(client.query(product.clone()).find_entry().await.unwrap().is_none());
    assert!(client.query(Command::collection("Products")).find_entries().await.unwrap().is_empty());
    client.query(product).delete_entry().await.unwrap();
}

#[tokio::test]
async fn test_count() {
    let transport = FakeTransport::new();
    transport.respond(200, "77");
    let client = client(&transport, ClientSettings::new());

    let count = client
        .query(Command::collection("Products").filter(prop("Discontinued").eq(false)).unwrap())
        .count()
        .await
        .unwrap();

    assert_eq!(count, 77);
    assert_eq!(
        transport.urls(),
        vec![url("Products/$count?$filter=Discontinued%20eq%20false")]
    );
}

#[tokio::test]
async fn test_pages_follow_next_link() {
    let transport = FakeTransport::new();
    transport
        .respond(
            200,
            r#"{"value":[{"ProductID":1}],"@odata.nextLink":"https://example.org/Northwind.svc/Products?$skiptoken=1"}"#,
        )
        .respond(200, r#"{"value":[{"ProductID":2}]}"#);
    let client = client(&transport, ClientSettings::new());

    let pages: Vec<_> = client
        .query(Command::collection("Products"))
        .into_pages()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(pages.len(), 2);
    assert!(pages[0].has_more());
    assert!(!pages[1].has_more());
    assert_eq!(
        transport.urls(),
        vec![url("Products"), url("Products?$skiptoken=1")]
    );
}

#[tokio::test]
async fn test_insert_posts_payload() {
    let transport = FakeTransport::new();
    transport.respond(201, r#"{"ProductID":78,"ProductName":"Tofu"}"#);
    let client = client(&transport, ClientSettings::new());

    let created = client
        .query(Command::collection("Products").set(Entry::new().set("ProductName", "Tofu")))
        .insert_entry()
        .await
        .unwrap()
        .unwrap();

    let request = transport.last();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, url("Products"));
    assert_eq!(header(&request, "Prefer").as_deref(), Some("return=representation"));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["ProductName"], "Tofu");
    assert_eq!(created.get_int("ProductID").unwrap(), Some(78));
}

#[tokio::test]
async fn test_update_entries_processes_matches_in_order() {
    let transport = FakeTransport::new();
    transport
        .respond(
            200,
            r#"{"value":[
                {"@odata.etag":"W/\"1\"","ProductID":1},
                {"@odata.etag":"W/\"2\"","ProductID":2}
            ]}"#,
        )
        .respond(204, "")
        .respond(204, "");
    let client = client(&transport, ClientSettings::new());

    let updated = client
        .query(
            Command::collection("Products")
                .filter(prop("UnitPrice").lt(5))
                .unwrap()
                .set_value("Discontinued", true),
        )
        .update_entries()
        .await
        .unwrap();

    assert_eq!(updated, 2);
    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].method, Method::PATCH);
    assert_eq!(requests[1].url, url("Products(1)"));
    assert_eq!(header(&requests[1], "If-Match").as_deref(), Some("W/\"1\""));
    assert_eq!(requests[2].url, url("Products(2)"));
}

#[tokio::test]
async fn test_delete_entries_halts_at_first_failure() {
    let transport = FakeTransport::new();
    transport
        .respond(
            200,
            r#"{"value":[{"ProductID":1},{"ProductID":2},{"ProductID":3}]}"#,
        )
        .respond(204, "")
        .respond(500, r#"{"error":{"code":"X","message":"boom"}}"#);
    let client = client(&transport, ClientSettings::new());

    let err = client
        .query(Command::collection("Products").filter(prop("Discontinued").eq(true)).unwrap())
        .delete_entries()
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(500));
    let urls = transport.urls();
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[2], url("Products(2)"));
}

#[tokio::test]
async fn test_cancelled_before_dispatch() {
    let transport = FakeTransport::new();
    let client = client(&transport, ClientSettings::new());
    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .query(Command::collection("Products"))
        .with_cancellation(token)
        .find_entries()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_legacy_link_entry() {
    let transport = FakeTransport::new();
    transport.respond(204, "");
    let client = client(&transport, v3());

    client
        .query(Command::collection("Products").key(1).unwrap().link("Category"))
        .link_entry(&Command::collection("Categories").key(2).unwrap())
        .await
        .unwrap();

    let request = transport.last();
    assert_eq!(request.method, Method::PUT);
    assert_eq!(request.url, url("Products(1)/$links/Category"));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["uri"], url("Categories(2)"));
}

#[tokio::test]
async fn test_execute_function_reads_typed_feed() {
    let transport = FakeTransport::new();
    transport.respond(200, r#"{"value":[{"ProductID":7,"ProductName":"Uncle Bob's"}]}"#);
    let client = client(&transport, ClientSettings::new());

    let feed = client
        .query(Command::function("GetProductsByRating").parameter("rating", 5))
        .execute_function()
        .await
        .unwrap()
        .into_feed();

    assert_eq!(transport.urls(), vec![url("GetProductsByRating(rating=5)")]);
    assert_eq!(feed.entries()[0].get_int("ProductID").unwrap(), Some(7));
}

#[tokio::test]
async fn test_execute_action_posts_parameters() {
    let transport = FakeTransport::new();
    transport.respond(204, "");
    let client = client(&transport, ClientSettings::new());

    let result = client
        .query(Command::action("Discount").parameter("percentage", 10))
        .execute_action()
        .await
        .unwrap();

    assert_eq!(result.into_value(), Value::Null);
    let request = transport.last();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, url("Discount"));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["percentage"], 10);
}

#[tokio::test]
async fn test_catalog_loaded_once() {
    let transport = FakeTransport::new();
    let client = client(&transport, ClientSettings::new());

    let (a, b) = tokio::join!(client.catalog(), client.catalog());
    assert!(std::sync::Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert!(client.invalidate_metadata());
}
