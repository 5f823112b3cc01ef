mod support;

#[tokio::test]
async fn when_room_is_created_then_it_is_listed_and_fetchable() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();
    let name = format!("arena-{}", uuid::Uuid::new_v4());

    let res = client
        .post(format!("{base_url}/rooms"))
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);

    let created: serde_json::Value = res.json().await.expect("json body");
    let room_id = created["id"].as_str().expect("room id").to_string();
    assert!(room_id.starts_with("room-"));
    assert_eq!(created["name"], name.as_str());
    assert_eq!(created["members"], serde_json::json!([]));

    let rooms: serde_json::Value = client
        .get(format!("{base_url}/rooms"))
        .send()
        .await
        .expect("list should succeed")
        .json()
        .await
        .expect("json body");
    let listed = rooms
        .as_array()
        .expect("rooms array")
        .iter()
        .any(|room| room["id"] == room_id.as_str());
    assert!(listed, "created room should be listed");

    let res = client
        .get(format!("{base_url}/rooms/{room_id}"))
        .send()
        .await
        .expect("get should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn when_room_is_created_without_body_then_id_is_used_as_name() {
    let base_url = support::ensure_server();

    let res = reqwest::Client::new()
        .post(format!("{base_url}/rooms"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);

    let created: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(created["name"], created["id"]);
}

#[tokio::test]
async fn when_room_does_not_exist_then_json_404_is_returned() {
    let base_url = support::ensure_server();

    let res = reqwest::Client::new()
        .get(format!("{base_url}/rooms/room-does-not-exist"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);

    let body: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(body["error"], "room not found");
}

#[tokio::test]
async fn when_room_request_is_not_json_then_400_is_returned() {
    let base_url = support::ensure_server();

    let res = reqwest::Client::new()
        .post(format!("{base_url}/rooms"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
}
