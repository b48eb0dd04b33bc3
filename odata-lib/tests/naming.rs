//! Lenient name resolution through the client.

mod common;

use std::sync::Arc;

use common::FakeTransport;
use common::client;
use odata_lib::ClientSettings;
use odata_lib::ODataClient;
use odata_lib::command::Command;
use odata_lib::error::Error;
use odata_lib::naming::NameMatch;
use odata_lib::naming::Pluralizer;

fn with_strategy(strategy: NameMatch) -> ODataClient {
    client(&FakeTransport::new(), ClientSettings::new().with_name_match(strategy))
}

#[test]
fn test_pluralizer_round_trip() {
    let pluralizer = Pluralizer::new();
    for (singular, plural) in [
        ("Category", "Categories"),
        ("Product", "Products"),
        ("Person", "People"),
        ("Address", "Addresses"),
    ] {
        assert_eq!(pluralizer.pluralize(singular), plural);
        assert_eq!(pluralizer.singularize(plural), singular);
    }
}

#[tokio::test]
async fn test_best_match_accepts_singular_and_case() {
    let client = with_strategy(NameMatch::BestMatch);

    let uri = client
        .format(&Command::collection("category").key(1).unwrap().navigate("product"))
        .await
        .unwrap();
    assert_eq!(uri, "Categories(1)/Products");

    let uri = client
        .format(&Command::collection("orderdetails").select(["quantity"]))
        .await
        .unwrap();
    assert_eq!(uri, "Order_Details?$select=Quantity");
}

#[tokio::test]
async fn test_strict_requires_exact_names() {
    let client = with_strategy(NameMatch::Strict);

    assert_eq!(
        client.format(&Command::collection("Products")).await.unwrap(),
        "Products"
    );
    let err = client
        .format(&Command::collection("product"))
        .await
        .unwrap_err();
    match err {
        Error::UnresolvableObject { name, .. } => assert_eq!(name, "product"),
        other => panic!("expected unresolvable object, got {:?}", other),
    }
}

#[tokio::test]
async fn test_alphanumeric_ignores_separators_but_not_number() {
    let client = with_strategy(NameMatch::Alphanumeric);

    assert_eq!(
        client.format(&Command::collection("order-details")).await.unwrap(),
        "Order_Details"
    );
    assert!(matches!(
        client.format(&Command::collection("Product")).await,
        Err(Error::UnresolvableObject { .. })
    ));
}

#[tokio::test]
async fn test_unknown_property_is_never_ignored() {
    let client = with_strategy(NameMatch::BestMatch);

    let err = client
        .format(&Command::collection("Products").select(["Colour"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvableObject { .. }));
}

#[tokio::test]
async fn test_shared_pluralizer_with_custom_word() {
    let pluralizer = Arc::new(Pluralizer::new().with_irregular("Staff", "Staffers"));
    assert_eq!(pluralizer.pluralize("Staff"), "Staffers");

    let client = ODataClient::builder()
        .url(common::SERVICE)
        .transport(FakeTransport::new())
        .pluralizer(pluralizer)
        .catalog_source(common::northwind())
        .build();
    assert_eq!(
        client.format(&Command::collection("Employee")).await.unwrap(),
        "Employees"
    );
}
