//! Shared fixtures: a scripted transport and a Northwind-shaped catalog.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use odata_lib::ClientSettings;
use odata_lib::ODataClient;
use odata_lib::error::TransportError;
use odata_lib::metadata::Catalog;
use odata_lib::transport::HttpRequest;
use odata_lib::transport::HttpResponse;
use odata_lib::transport::Transport;
use serde_json::json;

pub const SERVICE: &str = "https://example.org/Northwind.svc";

/// Answers requests from a queue of canned responses and records them.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    responses: VecDeque<HttpResponse>,
    requests: Vec<HttpRequest>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response with `status` and `body`.
    pub fn respond(&self, status: u16, body: &str) -> &Self {
        self.respond_with(HttpResponse::new(status, body))
    }

    pub fn respond_with(&self, response: HttpResponse) -> &Self {
        self.state.lock().unwrap().responses.push_back(response);
        self
    }

    /// Returns the requests sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn last(&self) -> HttpRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        let url = request.url.clone();
        state.requests.push(request);
        state
            .responses
            .pop_front()
            .ok_or_else(|| TransportError::InvalidUrl(format!("no scripted response for {}", url)))
    }
}

/// Builds a client over `transport` with the Northwind catalog.
pub fn client(transport: &FakeTransport, settings: ClientSettings) -> ODataClient {
    ODataClient::builder()
        .url(SERVICE)
        .transport(transport.clone())
        .settings(settings)
        .catalog_source(northwind())
        .build()
}

pub fn url(path: &str) -> String {
    format!("{}/{}", SERVICE, path)
}

pub fn header(request: &HttpRequest, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn northwind() -> Catalog {
    serde_json::from_value(json!({
        "Namespace": "NorthwindModel",
        "EntitySets": [
            { "Name": "Products", "EntityType": "NorthwindModel.Product" },
            { "Name": "Categories", "EntityType": "NorthwindModel.Category" },
            { "Name": "Employees", "EntityType": "NorthwindModel.Employee" },
            { "Name": "Orders", "EntityType": "NorthwindModel.Order" },
            { "Name": "Order_Details", "EntityType": "NorthwindModel.Order_Detail" }
        ],
        "EntityTypes": [
            {
                "Name": "Product",
                "Key": ["ProductID"],
                "Properties": [
                    { "Name": "ProductID", "Type": "Edm.Int32", "Nullable": false },
                    { "Name": "ProductName", "Type": "Edm.String" },
                    { "Name": "UnitPrice", "Type": "Edm.Decimal" },
                    { "Name": "Discontinued", "Type": "Edm.Boolean" }
                ],
                "NavigationProperties": [
                    { "Name": "Category", "TargetType": "NorthwindModel.Category", "Multiplicity": "ZeroOrOne" },
                    { "Name": "Order_Details", "TargetType": "NorthwindModel.Order_Detail", "Multiplicity": "Many" }
                ]
            },
            {
                "Name": "Category",
                "Key": ["CategoryID"],
                "Properties": [
                    { "Name": "CategoryID", "Type": "Edm.Int32", "Nullable": false },
                    { "Name": "CategoryName", "Type": "Edm.String" }
                ],
                "NavigationProperties": [
                    { "Name": "Products", "TargetType": "NorthwindModel.Product", "Multiplicity": "Many" }
                ]
            },
            {
                "Name": "Employee",
                "Key": ["EmployeeID"],
                "Properties": [
                    { "Name": "EmployeeID", "Type": "Edm.Int32", "Nullable": false },
                    { "Name": "LastName", "Type": "Edm.String" },
                    { "Name": "FirstName", "Type": "Edm.String" }
                ],
                "NavigationProperties": [
                    { "Name": "Subordinates", "TargetType": "NorthwindModel.Employee", "Multiplicity": "Many" },
                    { "Name": "Superior", "TargetType": "NorthwindModel.Employee", "Multiplicity": "ZeroOrOne" },
                    { "Name": "Orders", "TargetType": "NorthwindModel.Order", "Multiplicity": "Many" }
                ]
            },
            {
                "Name": "Order",
                "Key": ["OrderID"],
                "Properties": [
                    { "Name": "OrderID", "Type": "Edm.Int32", "Nullable": false },
                    { "Name": "Freight", "Type": "Edm.Decimal" }
                ],
                "NavigationProperties": [
                    { "Name": "Order_Details", "TargetType": "NorthwindModel.Order_Detail", "Multiplicity": "Many" }
                ]
            },
            {
                "Name": "Order_Detail",
                "Key": ["OrderID", "ProductID"],
                "Properties": [
                    { "Name": "OrderID", "Type": "Edm.Int32", "Nullable": false },
                    { "Name": "ProductID", "Type": "Edm.Int32", "Nullable": false },
                    { "Name": "Quantity", "Type": "Edm.Int16" }
                ],
                "NavigationProperties": [
                    { "Name": "Product", "TargetType": "NorthwindModel.Product", "Multiplicity": "One" }
                ]
            }
        ],
        "Functions": [
            {
                "Name": "GetProductsByRating",
                "Kind": "Function",
                "Parameters": [{ "Name": "rating", "Type": "Edm.Int32" }],
                "ReturnType": "Collection(NorthwindModel.Product)",
                "EntitySet": "Products"
            },
            {
                "Name": "Discount",
                "Kind": "Action",
                "Parameters": [{ "Name": "percentage", "Type": "Edm.Int32" }]
            }
        ]
    }))
    .expect("catalog fixture is valid")
}
