//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts its own mock server on a random port, so the widget store
//! starts from the seeded state, and talks to it over real HTTP through the
//! public client API.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apiclient::{Body, Call, Client, ClientConfig, Error, Headers, HttpMethod};
use mock_server::Widget;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Start the mock server on a random port and return its base URL.
fn spawn_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// Start a bare HTTP/1.1 server that answers every request with `status` and
/// a widget body, keeping connections open. Returns its base URL and the
/// number of connections accepted so far.
fn spawn_counting_server(status: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::spawn(move || serve_connection(stream, status));
        }
    });

    (format!("http://{addr}"), accepted)
}

fn serve_connection(mut stream: TcpStream, status: &str) {
    let body = r#"{"id":7,"name":"gear"}"#;
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let mut pending = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        // Requests carry no body, so the end of the head ends the request.
        while let Some(end) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
            pending.drain(..end + 4);
            if stream.write_all(response.as_bytes()).is_err() {
                return;
            }
        }
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => pending.extend_from_slice(&buf[..n]),
        }
    }
}

fn client(base_url: &str) -> Client {
    Client::new(ClientConfig::new(base_url).with_header("Content-Type", "application/json")).unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u64,
    items: Vec<String>,
    total: f64,
    gift: Option<bool>,
    meta: BTreeMap<String, Value>,
}

#[test]
fn get_decodes_widget_and_pretty_prints_it() {
    let client = client(&spawn_server());

    let response = client.get::<Widget>("/widgets/7").unwrap();
    let widget = response.value.clone().unwrap();
    assert_eq!(
        widget,
        Widget {
            id: 7,
            name: "gear".to_string()
        }
    );
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), serde_json::to_string_pretty(&widget).unwrap());
}

#[test]
fn missing_widget_reports_status_and_server_payload() {
    let client = client(&spawn_server());

    let err = client.get::<Widget>("/widgets/404").unwrap_err();
    assert_eq!(err.status(), Some(404));
    let message = err.to_string();
    assert!(message.contains("404"), "{message}");
    assert!(message.contains("not found"), "{message}");
}

#[test]
fn widget_lifecycle() {
    let client = client(&spawn_server());

    let created = client
        .post::<_, Widget>("/widgets", &json!({ "name": "sprocket" }), None)
        .unwrap();
    assert_eq!(created.status, 201);
    let id = created.value.unwrap().id;

    let updated = client
        .put::<_, Widget>(&format!("/widgets/{id}"), &json!({ "name": "cog" }), None)
        .unwrap();
    assert_eq!(updated.value.unwrap().name, "cog");

    let deleted = client.delete::<Value>(&format!("/widgets/{id}")).unwrap();
    assert_eq!(deleted.status, 204);
    assert!(deleted.value.is_none());
    assert!(deleted.text().is_empty());

    let err = client.delete::<Value>(&format!("/widgets/{id}")).unwrap_err();
    assert!(matches!(err, Error::Protocol { status: 404, .. }), "{err}");
}

#[test]
fn json_round_trips_through_echo() {
    let client = client(&spawn_server());
    let orders = [
        Order {
            id: 1,
            items: vec!["gear".to_string(), "cog".to_string()],
            total: 12.5,
            gift: Some(true),
            meta: BTreeMap::from([("note".to_string(), json!("ünïcødé \"quoted\""))]),
        },
        Order {
            id: u64::MAX,
            items: Vec::new(),
            total: -0.25,
            gift: None,
            meta: BTreeMap::from([("nested".to_string(), json!({ "a": [1, null, {}] }))]),
        },
    ];

    for order in orders {
        let posted = client.post::<_, Order>("/echo", &order, None).unwrap();
        assert_eq!(posted.value.as_ref(), Some(&order));
        let put = client.put::<_, Order>("/echo", &order, None).unwrap();
        assert_eq!(put.into_value(), Some(order));
    }
}

#[test]
fn raw_bytes_pass_through_unchanged() {
    let client = client(&spawn_server());
    let bytes = vec![0u8, 159, 146, 150, b'{', 0xff];

    let raw = client
        .execute_raw(
            Call::new(HttpMethod::Post, "/echo")
                .header("Content-Type", "application/octet-stream")
                .body(Body::Raw(bytes.clone())),
        )
        .unwrap();
    assert_eq!(raw.body, bytes);
}

#[test]
fn raw_json_body_decodes_like_a_value() {
    let client = client(&spawn_server());

    let response = client
        .post_raw::<Widget>("/echo", br#"{"id":3,"name":"raw"}"#.to_vec(), None)
        .unwrap();
    assert_eq!(response.value.unwrap().name, "raw");
    let response = client
        .put_raw::<Widget>("/echo", br#"{"id":4,"name":"raw"}"#.to_vec(), None)
        .unwrap();
    assert_eq!(response.value.unwrap().id, 4);
}

#[test]
fn duplicate_header_names_send_both_values() {
    let base_url = spawn_server();
    let client = Client::new(ClientConfig::new(&base_url).with_header("X-Trace", "1")).unwrap();
    let extra: Headers = BTreeMap::from([("X-Trace".to_string(), "2".to_string())]);

    let response = client
        .execute::<Vec<String>>(Call::new(HttpMethod::Get, "/headers/x-trace").headers(Some(&extra)))
        .unwrap();
    assert_eq!(response.value.unwrap(), vec!["1", "2"]);
}

#[test]
fn per_call_headers_do_not_leak_into_later_calls() {
    let client = client(&spawn_server());
    let extra: Headers = BTreeMap::from([("X-Once".to_string(), "yes".to_string())]);

    let first = client
        .execute::<Vec<String>>(Call::new(HttpMethod::Get, "/headers/x-once").headers(Some(&extra)))
        .unwrap();
    assert_eq!(first.value.unwrap(), vec!["yes"]);
    let second = client.get::<Vec<String>>("/headers/x-once").unwrap();
    assert!(second.value.unwrap().is_empty());
}

#[test]
fn success_range_is_200_to_299() {
    let client = client(&spawn_server());

    for status in [200u16, 201, 202, 226, 299] {
        let response = client.get::<Value>(&format!("/status/{status}")).unwrap();
        assert_eq!(response.status, status);
        assert_eq!(response.value.unwrap()["status"], status);
    }
    for status in [400u16, 401, 404, 418, 500, 503] {
        let err = client.get::<Value>(&format!("/status/{status}")).unwrap_err();
        let Error::Protocol { status_line, body, .. } = &err else {
            panic!("expected protocol error for {status}, got {err}");
        };
        assert!(status_line.starts_with(&status.to_string()));
        assert_eq!(body, &format!("{{\"status\":{status}}}"));
        assert!(err.to_string().starts_with(status_line.as_str()));
        assert!(err.to_string().ends_with(body.as_str()));
    }
}

#[test]
fn malformed_success_body_is_not_silent() {
    let client = client(&spawn_server());

    let err = client.get::<Widget>("/malformed").unwrap_err();
    assert!(matches!(err, Error::Serialization { .. }), "{err}");
}

#[test]
fn malformed_error_body_reports_decode_failure() {
    let client = client(&spawn_server());

    let err = client.get::<Value>("/text/500").unwrap_err();
    assert!(matches!(err, Error::Serialization { .. }), "{err}");
    // Without decoding, the same response is a protocol error carrying the text.
    let err = client.execute_raw(Call::new(HttpMethod::Get, "/text/500")).unwrap_err();
    assert!(err.to_string().contains("plain text failure"), "{err}");
}

#[test]
fn empty_body_yields_no_value() {
    let client = client(&spawn_server());

    let response = client.get::<Widget>("/empty").unwrap();
    assert_eq!(response.status, 204);
    assert!(response.value.is_none());
}

#[test]
fn per_call_timeout_aborts_slow_requests() {
    let client = client(&spawn_server());

    let err = client
        .execute::<Value>(Call::new(HttpMethod::Get, "/slow/2000").timeout(Duration::from_millis(100)))
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");

    let response = client
        .execute::<Value>(Call::new(HttpMethod::Get, "/slow/10").timeout(Duration::from_secs(5)))
        .unwrap();
    assert_eq!(response.value.unwrap(), json!({}));
}

#[test]
fn unreachable_server_is_a_network_error() {
    let client = client("http://127.0.0.1:9");

    let err = client.get::<Value>("/widgets/7").unwrap_err();
    assert!(matches!(err, Error::Network { .. }), "{err}");
}

#[test]
fn concurrent_calls_share_one_client() {
    let base_url = spawn_server();
    let client = Arc::new(
        Client::new(ClientConfig::new(&base_url).idle_conn_timeout(1).disable_keepalives(true)).unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = Arc::clone(&client);
            std::thread::spawn(move || {
                let order = json!({ "worker": i });
                for _ in 0..5 {
                    let echoed = client
                        .post::<_, Value>(
                            "/echo",
                            &order,
                            Some(&BTreeMap::from([(
                                "Content-Type".to_string(),
                                "application/json".to_string(),
                            )])),
                        )
                        .unwrap();
                    assert_eq!(echoed.value.unwrap(), order);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn keepalive_reuses_one_connection() {
    let (base_url, accepted) = spawn_counting_server("200 OK");
    let client = Client::new(ClientConfig::new(&base_url)).unwrap();

    for _ in 0..3 {
        assert_eq!(client.get::<Widget>("/widgets/7").unwrap().status, 200);
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[test]
fn disabled_keepalives_open_a_connection_per_call() {
    let (base_url, accepted) = spawn_counting_server("200 OK");
    let client = Client::new(ClientConfig::new(&base_url).disable_keepalives(true)).unwrap();

    for _ in 0..3 {
        assert_eq!(client.get::<Widget>("/widgets/7").unwrap().status, 200);
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[test]
fn status_line_uses_the_canonical_reason_phrase() {
    let (base_url, _) = spawn_counting_server("200 Fine");
    let client = Client::new(ClientConfig::new(&base_url)).unwrap();

    let response = client.get::<Widget>("/widgets/7").unwrap();
    assert_eq!(response.status_line, "200 OK");
}

#[test]
fn closed_client_refuses_calls() {
    let client = client(&spawn_server());
    assert!(client.get::<Widget>("/widgets/7").is_ok());

    client.close();
    let err = client.get::<Widget>("/widgets/7").unwrap_err();
    assert!(matches!(err, Error::Closed));
    assert_eq!(err.to_string(), "client closed");
}
