//! Shared fixtures: an in-process stand-in for the geocoding provider.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Query,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const MOCK_KEY: &str = "test-key-0001";

/// Header line for the default column map.
pub const HEADER: &str =
    "location,detailed_address,network_type,signal_strength,report_time,reporter,note";

pub struct MockProvider {
    pub url: String,
    task: JoinHandle<()>,
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Deserialize)]
struct GeocodeParams {
    key: String,
    address: String,
    output: String,
}

/// Known addresses and their `"lng,lat"` pairs.
fn lookup(address: &str) -> Option<&'static str> {
    // ---
    match address {
        "1 Harbour Road" => Some("120.864608,32.016212"),
        "2 Market Street" => Some("120.894291,32.041118"),
        "3 River Lane" => Some("120.951300,32.102000"),
        "Old Town Square" => Some("120.870000,32.030000"),
        _ => None,
    }
}

async fn geocode(Query(params): Query<GeocodeParams>) -> Response {
    // ---
    if params.key != MOCK_KEY {
        return Json(json!({ "status": "0", "info": "INVALID_USER_KEY", "infocode": "10001" }))
            .into_response();
    }
    if params.output != "json" {
        return "xml not supported".into_response();
    }

    match params.address.as_str() {
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "status": "1", "geocodes": [{ "location": "120.0,32.0" }] }))
                .into_response()
        }
        "garbage" => "<html>upstream error</html>".into_response(),
        address => match lookup(address) {
            Some(location) => Json(json!({
                "status": "1",
                "info": "OK",
                "count": "1",
                "geocodes": [{ "formatted_address": address, "location": location }]
            }))
            .into_response(),
            None => Json(json!({ "status": "1", "info": "OK", "count": "0", "geocodes": [] }))
                .into_response(),
        },
    }
}

pub async fn spawn_provider() -> MockProvider {
    // ---
    let app = Router::new().route("/v3/geocode/geo", get(geocode));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockProvider {
        url: format!("http://{addr}/v3/geocode/geo"),
        task,
    }
}

/// A loopback port that nothing is listening on.
pub fn unused_port() -> u16 {
    // ---
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Hold a port open and return it along with a free port right after it.
pub fn occupied_port_with_free_successor() -> (std::net::TcpListener, u16) {
    // ---
    for _ in 0..50 {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();
        if port == u16::MAX {
            continue;
        }
        if std::net::TcpListener::bind(("127.0.0.1", port + 1)).is_ok() {
            return (held, port);
        }
    }
    panic!("could not find two adjacent ports");
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Pull the JSON literal assigned to `const <name> = ...;` out of an artifact.
pub fn embedded_json(html: &str, name: &str) -> serde_json::Value {
    // ---
    let marker = format!("const {name} = ");
    let start = html.find(&marker).expect("marker present") + marker.len();
    let end = start + html[start..].find(";\n").expect("statement terminator");
    serde_json::from_str(&html[start..end]).unwrap()
}
