// One arena server per test binary, shared by every test in it.
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

static BASE_URL: OnceLock<String> = OnceLock::new();

// Start the server on first use and return its `http://host:port` base URL.
pub fn ensure_server() -> &'static str {
    BASE_URL.get_or_init(|| {
        let bound = Arc::new(OnceLock::<String>::new());
        let bound_in_thread = Arc::clone(&bound);

        // The server gets its own thread and runtime so it outlives each `#[tokio::test]`.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("server runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral port");
                let addr = listener.local_addr().expect("local addr");
                let _ = bound_in_thread.set(format!("http://{addr}"));
                arena_sync::run(listener).await.expect("server failed");
            });
        });

        let url = wait_for_url(&bound);
        wait_until_accepting(&url);
        url
    })
}

fn wait_for_url(bound: &OnceLock<String>) -> String {
    loop {
        if let Some(url) = bound.get() {
            return url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn wait_until_accepting(base_url: &str) {
    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not start accepting connections");
}

// Create a room over HTTP and return its id.
#[allow(dead_code)]
pub async fn create_room(base_url: &str, name: &str) -> String {
    let res = reqwest::Client::new()
        .post(format!("{base_url}/rooms"))
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await
        .expect("create room request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.expect("room body is json");
    body["id"].as_str().expect("room id is a string").to_string()
}

// WebSocket URL for a session of `player_id` in `room_id`.
#[allow(dead_code)]
pub fn ws_url(base_url: &str, room_id: &str, player_id: &str) -> String {
    let host = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");
    format!("ws://{host}/ws?room_id={room_id}&player_id={player_id}")
}
