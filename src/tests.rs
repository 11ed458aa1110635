//! End-to-end tests for the scheduler API.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, StorageKind};
use crate::db::{init_database, MemoryStorage, SqliteStorage, Storage};
use crate::search::VolunteerIndex;
use crate::{create_router, AppState};

const TEST_PSK: &str = "test-api-key";

/// A running server with a client that sends the API key.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::build(StorageKind::Memory, Some(TEST_PSK.to_string())).await
    }

    async fn sqlite() -> Self {
        Self::build(StorageKind::Sqlite, Some(TEST_PSK.to_string())).await
    }

    async fn build(storage: StorageKind, psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let index_path = temp_dir.path().join("index");

        let (store, search): (Arc<dyn Storage>, VolunteerIndex) = match storage {
            StorageKind::Sqlite => {
                let pool = init_database(&db_path).await.expect("Failed to init DB");
                let store: Arc<dyn Storage> = Arc::new(SqliteStorage::new(pool));
                (
                    store,
                    VolunteerIndex::open(&index_path).expect("Failed to init search"),
                )
            }
            StorageKind::Memory => {
                let store: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
                (
                    store,
                    VolunteerIndex::in_memory().expect("Failed to init search"),
                )
            }
        };

        let config = Config {
            api_psk: psk.clone(),
            db_path,
            index_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            storage,
            match_location: false,
        };

        let state = AppState {
            store,
            search: Arc::new(search),
            config: Arc::new(config),
        };

        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn patch(&self, path: &str) -> StatusCode {
        self.client
            .patch(self.url(path))
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn delete(&self, path: &str) -> StatusCode {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .unwrap()
            .status()
    }

    /// POST expecting 201, returning the created resource.
    async fn create(&self, path: &str, body: Value) -> Value {
        let (status, value) = self.post(path, body).await;
        assert_eq!(status, StatusCode::CREATED, "POST {} -> {}", path, value);
        value
    }

    async fn volunteer(&self, username: &str, name: &str) -> String {
        let v = self
            .create(
                "/api/volunteers",
                json!({
                    "username": username,
                    "name": name,
                    "email": format!("{}@church.example", username),
                }),
            )
            .await;
        v["id"].as_str().unwrap().to_string()
    }
}

/// Two events at the same instant, a team with one role and one published
/// schedule per event.
struct Roster {
    team: String,
    role: String,
    first_event: String,
    second_event: String,
    first_schedule: String,
    second_schedule: String,
}

async fn roster(fixture: &TestFixture) -> Roster {
    let team = fixture
        .create("/api/teams", json!({ "name": "Media", "color": "#ff9800" }))
        .await;
    let team = team["id"].as_str().unwrap().to_string();
    let role = fixture
        .create(
            &format!("/api/teams/{}/roles", team),
            json!({ "name": "Camera", "requiresTraining": false }),
        )
        .await;
    let role = role["id"].as_str().unwrap().to_string();

    let mut events = Vec::new();
    let mut schedules = Vec::new();
    for name in ["Sunday Service", "Baptism"] {
        let event = fixture
            .create(
                "/api/events",
                json!({
                    "name": name,
                    "startsAt": "2024-06-02T09:00:00",
                    "location": "Main Hall",
                }),
            )
            .await;
        let event_id = event["id"].as_str().unwrap().to_string();
        let schedule = fixture
            .create(
                "/api/schedules",
                json!({ "eventId": event_id, "teamId": team, "status": "published" }),
            )
            .await;
        schedules.push(schedule["id"].as_str().unwrap().to_string());
        events.push(event_id);
    }

    Roster {
        team,
        role,
        first_event: events.remove(0),
        second_event: events.remove(0),
        first_schedule: schedules.remove(0),
        second_schedule: schedules.remove(0),
    }
}

fn assignment(schedule: &str, role: &str, volunteer: &str) -> Value {
    json!({ "scheduleId": schedule, "roleId": role, "volunteerId": volunteer })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_health_via_router_without_server() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let config = Config {
        api_psk: Some(TEST_PSK.to_string()),
        db_path: "unused.sqlite".into(),
        index_path: "unused-index".into(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        storage: StorageKind::Memory,
        match_location: false,
    };
    let app = create_router(AppState {
        store: Arc::new(MemoryStorage::new()),
        search: Arc::new(VolunteerIndex::in_memory().unwrap()),
        config: Arc::new(config),
    });

    let resp = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .oneshot(Request::get("/api/teams").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_auth_rejects_missing_and_wrong_key() {
    let fixture = TestFixture::new().await;
    let anonymous = Client::new();

    let resp = anonymous
        .get(fixture.url("/api/volunteers"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");

    let resp = anonymous
        .get(fixture.url("/api/volunteers"))
        .header("x-api-key", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = anonymous
        .get(fixture.url("/api/volunteers"))
        .bearer_auth(TEST_PSK)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_auth_disabled_without_psk() {
    let fixture = TestFixture::build(StorageKind::Memory, None).await;
    let (status, body) = fixture.get("/api/teams").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!([]));
}

async fn double_booking_is_refused(fixture: &TestFixture) {
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let r = roster(fixture).await;

    let first = fixture
        .create(
            "/api/schedule-details",
            assignment(&r.first_schedule, &r.role, &alice),
        )
        .await;
    assert_eq!(first["volunteerId"], alice.as_str());

    let (status, body) = fixture
        .post(
            "/api/schedule-details",
            assignment(&r.second_schedule, &r.role, &alice),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SCHEDULE_CONFLICT");
    assert_eq!(body["conflict"]["scheduleDetail"]["id"], first["id"]);
    assert_eq!(
        body["conflict"]["schedule"]["eventId"],
        r.first_event.as_str()
    );
    assert_eq!(body["conflict"]["team"]["name"], "Media");
    assert_eq!(body["conflict"]["role"]["name"], "Camera");

    // Nothing was written for the refused assignment
    let (_, details) = fixture
        .get(&format!("/api/schedules/{}/details", r.second_schedule))
        .await;
    assert_eq!(details, json!([]));

    let (_, conflicts) = fixture.get("/api/conflicts").await;
    assert_eq!(conflicts, json!([]));
}

#[tokio::test]
async fn test_double_booking_refused_memory() {
    double_booking_is_refused(&TestFixture::new().await).await;
}

#[tokio::test]
async fn test_double_booking_refused_sqlite() {
    double_booking_is_refused(&TestFixture::sqlite().await).await;
}

#[tokio::test]
async fn test_keep_both_shows_in_conflict_report_and_dashboard() {
    let fixture = TestFixture::new().await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let r = roster(&fixture).await;

    fixture
        .create(
            "/api/schedule-details",
            assignment(&r.first_schedule, &r.role, &alice),
        )
        .await;
    let mut both = assignment(&r.second_schedule, &r.role, &alice);
    both["resolution"] = json!("both");
    fixture.create("/api/schedule-details", both).await;

    let (status, conflicts) = fixture.get("/api/conflicts").await;
    assert_eq!(status, 200);
    let conflicts = conflicts.as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["volunteer"]["id"], alice.as_str());
    assert_eq!(conflicts[0]["eventDate"], "2024-06-02T09:00:00");
    let events: Vec<&str> = conflicts[0]["assignments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["eventId"].as_str().unwrap())
        .collect();
    assert!(events.contains(&r.first_event.as_str()));
    assert!(events.contains(&r.second_event.as_str()));

    let (_, stats) = fixture.get("/api/dashboard/stats").await;
    assert_eq!(stats["conflictCount"], 1);
    assert_eq!(stats["volunteerCount"], 1);
    assert_eq!(stats["teamCount"], 1);

    let (status, services) = fixture
        .get("/api/dashboard/services?from=2024-06-01T00:00:00")
        .await;
    assert_eq!(status, 200);
    let services = services.as_array().unwrap();
    assert_eq!(services.len(), 2);
    for service in services {
        assert_eq!(service["hasConflicts"], true);
        assert_eq!(service["volunteerCount"], 1);
        assert_eq!(service["teamCount"], 1);
        assert_eq!(service["status"], "incomplete");
    }

    let (_, check) = fixture
        .post(
            "/api/conflicts/check",
            json!({ "volunteerId": alice, "eventId": r.first_event }),
        )
        .await;
    assert_eq!(check["hasConflict"], true);
}

#[tokio::test]
async fn test_replace_resolution_removes_existing_assignment() {
    let fixture = TestFixture::sqlite().await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let r = roster(&fixture).await;

    let first = fixture
        .create(
            "/api/schedule-details",
            assignment(&r.first_schedule, &r.role, &alice),
        )
        .await;
    let mut replace = assignment(&r.second_schedule, &r.role, &alice);
    replace["resolution"] = json!("replace");
    let second = fixture.create("/api/schedule-details", replace).await;

    let (status, _) = fixture
        .get(&format!("/api/schedule-details/{}", first["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, assignments) = fixture
        .get(&format!("/api/volunteers/{}/assignments", alice))
        .await;
    let assignments = assignments.as_array().unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0]["detail"]["id"], second["id"]);

    let (_, conflicts) = fixture.get("/api/conflicts").await;
    assert_eq!(conflicts, json!([]));
}

#[tokio::test]
async fn test_filling_a_slot_runs_the_guard() {
    let fixture = TestFixture::new().await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let r = roster(&fixture).await;

    fixture
        .create(
            "/api/schedule-details",
            assignment(&r.first_schedule, &r.role, &alice),
        )
        .await;
    let slot = fixture
        .create(
            "/api/schedule-details",
            json!({ "scheduleId": r.second_schedule, "roleId": r.role }),
        )
        .await;
    assert_eq!(slot["volunteerId"], Value::Null);

    let slot_url = format!("/api/schedule-details/{}", slot["id"].as_str().unwrap());
    let (status, body) = fixture.put(&slot_url, json!({ "volunteerId": alice })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SCHEDULE_CONFLICT");

    let (status, body) = fixture.put(&slot_url, json!({ "status": "confirmed" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["volunteerId"], Value::Null);

    assert_eq!(fixture.delete(&slot_url).await, StatusCode::NO_CONTENT);
    assert_eq!(fixture.delete(&slot_url).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_slot_update_leaves_slot_untouched() {
    let fixture = TestFixture::sqlite().await;
    let bob = fixture.volunteer("bob", "Bob Costa").await;
    let r = roster(&fixture).await;

    let slot = fixture
        .create(
            "/api/schedule-details",
            json!({ "scheduleId": r.second_schedule, "roleId": r.role }),
        )
        .await;
    let slot_url = format!("/api/schedule-details/{}", slot["id"].as_str().unwrap());

    let (status, body) = fixture
        .put(
            &slot_url,
            json!({ "volunteerId": bob, "status": "confirmed", "traineeId": "no-such-volunteer" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (_, detail) = fixture.get(&slot_url).await;
    assert_eq!(detail["volunteerId"], Value::Null);
    assert_eq!(detail["status"], "pending");
    let (_, assignments) = fixture
        .get(&format!("/api/volunteers/{}/assignments", bob))
        .await;
    assert_eq!(assignments, json!([]));
}

#[tokio::test]
async fn test_unavailable_volunteer_is_refused() {
    let fixture = TestFixture::new().await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let r = roster(&fixture).await;

    // 2024-06-02 is a Sunday
    let rule = fixture
        .create(
            "/api/availability-rules",
            json!({
                "volunteerId": alice,
                "dayOfWeek": 0,
                "startTime": "08:00",
                "endTime": "12:00",
                "isAvailable": false,
                "reason": "Travelling",
            }),
        )
        .await;

    let (status, body) = fixture
        .post(
            "/api/schedule-details",
            assignment(&r.first_schedule, &r.role, &alice),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "VOLUNTEER_UNAVAILABLE");
    assert_eq!(body["rule"]["id"], rule["id"]);

    let (_, rules) = fixture
        .get(&format!("/api/volunteers/{}/availability", alice))
        .await;
    assert_eq!(rules.as_array().unwrap().len(), 1);

    let rule_url = format!("/api/availability-rules/{}", rule["id"].as_str().unwrap());
    let (status, _) = fixture.put(&rule_url, json!({ "startTime": "10:00" })).await;
    assert_eq!(status, 200);
    fixture
        .create(
            "/api/schedule-details",
            assignment(&r.first_schedule, &r.role, &alice),
        )
        .await;

    assert_eq!(fixture.delete(&rule_url).await, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_swap_approval_is_guarded_and_final() {
    let fixture = TestFixture::new().await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let bob = fixture.volunteer("bob", "Bob Costa").await;
    let carol = fixture.volunteer("carol", "Carol Dias").await;
    let r = roster(&fixture).await;

    let alice_slot = fixture
        .create(
            "/api/schedule-details",
            assignment(&r.first_schedule, &r.role, &alice),
        )
        .await;
    let alice_slot = alice_slot["id"].as_str().unwrap().to_string();
    fixture
        .create(
            "/api/schedule-details",
            assignment(&r.second_schedule, &r.role, &bob),
        )
        .await;

    // Bob is already serving at the same instant
    let to_bob = fixture
        .create(
            "/api/swap-requests",
            json!({ "requesterId": alice, "scheduleDetailId": alice_slot, "replacementId": bob }),
        )
        .await;
    assert_eq!(to_bob["status"], "pending");
    let to_bob_url = format!("/api/swap-requests/{}", to_bob["id"].as_str().unwrap());

    let (status, body) = fixture
        .put(
            &to_bob_url,
            json!({ "status": "approved", "resolvedBy": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SCHEDULE_CONFLICT");
    let (_, still) = fixture.get(&to_bob_url).await;
    assert_eq!(still["status"], "pending");

    let (status, rejected) = fixture
        .put(
            &to_bob_url,
            json!({ "status": "rejected", "resolvedBy": "admin" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["resolvedBy"], "admin");
    assert!(rejected["resolvedAt"].is_string());

    let (status, body) = fixture.put(&to_bob_url, json!({ "status": "approved" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let to_carol = fixture
        .create(
            "/api/swap-requests",
            json!({ "requesterId": alice, "scheduleDetailId": alice_slot, "replacementId": carol }),
        )
        .await;
    let to_carol_url = format!("/api/swap-requests/{}", to_carol["id"].as_str().unwrap());

    let (status, body) = fixture.put(&to_carol_url, json!({ "status": "pending" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, approved) = fixture
        .put(&to_carol_url, json!({ "status": "approved" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(approved["status"], "approved");

    let (_, detail) = fixture
        .get(&format!("/api/schedule-details/{}", alice_slot))
        .await;
    assert_eq!(detail["volunteerId"], carol.as_str());

    let (_, pending) = fixture.get("/api/swap-requests?status=pending").await;
    assert_eq!(pending, json!([]));
    let (_, stats) = fixture.get("/api/dashboard/stats").await;
    assert_eq!(stats["pendingSwapRequests"], 0);
}

#[tokio::test]
async fn test_swap_requires_requester_to_hold_assignment() {
    let fixture = TestFixture::new().await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let bob = fixture.volunteer("bob", "Bob Costa").await;
    let r = roster(&fixture).await;

    let slot = fixture
        .create(
            "/api/schedule-details",
            assignment(&r.first_schedule, &r.role, &alice),
        )
        .await;

    let (status, body) = fixture
        .post(
            "/api/swap-requests",
            json!({ "requesterId": bob, "scheduleDetailId": slot["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "requesterId");

    let (status, _) = fixture
        .post(
            "/api/swap-requests",
            json!({ "requesterId": alice, "scheduleDetailId": "missing" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_and_not_found_errors() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/volunteers",
            json!({ "username": " ", "name": "", "email": "not-an-email" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["fields"].as_array().unwrap().len() >= 3);

    let resp = fixture
        .client
        .post(fixture.url("/api/teams"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let (status, body) = fixture
        .post(
            "/api/events",
            json!({
                "name": "Vigil",
                "startsAt": "2024-06-02T22:00:00",
                "endsAt": "2024-06-02T21:00:00",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "endsAt");

    let (status, body) = fixture.get("/api/volunteers/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    assert_eq!(
        fixture.delete("/api/events/nope").await,
        StatusCode::NOT_FOUND
    );

    let (status, _) = fixture
        .post(
            "/api/schedules",
            json!({ "eventId": "nope", "teamId": "nope" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    fixture.volunteer("alice", "Alice Martins").await;
    let (status, body) = fixture
        .post(
            "/api/volunteers",
            json!({ "username": "alice", "name": "Other Alice", "email": "a2@church.example" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "username");
}

#[tokio::test]
async fn test_schedule_slots_and_team_membership() {
    let fixture = TestFixture::sqlite().await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let r = roster(&fixture).await;

    let schedule = fixture
        .create(
            "/api/schedules",
            json!({
                "eventId": r.first_event,
                "teamId": r.team,
                "slots": [{ "roleId": r.role, "count": 3 }],
            }),
        )
        .await;
    assert_eq!(schedule["status"], "draft");
    assert_eq!(schedule["details"].as_array().unwrap().len(), 3);

    let (_, listed) = fixture
        .get(&format!("/api/schedules?eventId={}&status=draft", r.first_event))
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, body) = fixture
        .post(
            "/api/schedules",
            json!({
                "eventId": r.first_event,
                "teamId": r.team,
                "slots": [{ "roleId": "foreign-role" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "slots");

    let member = fixture
        .create(
            "/api/team-members",
            json!({ "volunteerId": alice, "teamId": r.team, "roleIds": [r.role] }),
        )
        .await;
    assert_eq!(member["isActive"], true);
    let (_, members) = fixture.get(&format!("/api/teams/{}/members", r.team)).await;
    assert_eq!(members.as_array().unwrap().len(), 1);

    assert_eq!(
        fixture
            .delete(&format!("/api/team-members/{}/{}", alice, r.team))
            .await,
        StatusCode::NO_CONTENT
    );

    // Deleting the team takes its schedules with it
    assert_eq!(
        fixture.delete(&format!("/api/teams/{}", r.team)).await,
        StatusCode::NO_CONTENT
    );
    let (status, _) = fixture
        .get(&format!("/api/schedules/{}", r.first_schedule))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_volunteer_search_follows_writes() {
    let fixture = TestFixture::new().await;
    let ana = fixture.volunteer("ana", "Ana Souza").await;
    fixture.volunteer("marcos", "Marcos Vieira").await;

    let (status, hits) = fixture.get("/api/volunteers/search?q=souza").await;
    assert_eq!(status, 200);
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["volunteer"]["id"], ana.as_str());

    let (status, _) = fixture
        .put(
            &format!("/api/volunteers/{}", ana),
            json!({ "name": "Ana Lima" }),
        )
        .await;
    assert_eq!(status, 200);
    let (_, hits) = fixture.get("/api/volunteers/search?q=lima").await;
    assert_eq!(hits.as_array().unwrap().len(), 1);

    assert_eq!(
        fixture.delete(&format!("/api/volunteers/{}", ana)).await,
        StatusCode::NO_CONTENT
    );
    let (_, hits) = fixture.get("/api/volunteers/search?q=lima").await;
    assert_eq!(hits, json!([]));
}

#[tokio::test]
async fn test_swap_notifications_reach_leader_and_requester() {
    let fixture = TestFixture::new().await;
    let leader = fixture.volunteer("lena", "Lena Rocha").await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;
    let r = roster(&fixture).await;

    let event = fixture
        .create(
            "/api/events",
            json!({ "name": "Evening Prayer", "startsAt": "2024-06-02T19:00:00" }),
        )
        .await;
    let schedule = fixture
        .create(
            "/api/schedules",
            json!({ "eventId": event["id"], "teamId": r.team, "createdBy": leader }),
        )
        .await;
    let slot = fixture
        .create(
            "/api/schedule-details",
            assignment(schedule["id"].as_str().unwrap(), &r.role, &alice),
        )
        .await;
    let swap = fixture
        .create(
            "/api/swap-requests",
            json!({ "requesterId": alice, "scheduleDetailId": slot["id"] }),
        )
        .await;

    let leader_unread = format!("/api/volunteers/{}/unread-notifications", leader);
    let (_, unread) = fixture.get(&leader_unread).await;
    assert_eq!(unread.as_array().unwrap().len(), 1);
    assert_eq!(unread[0]["type"], "swap_request");
    assert_eq!(unread[0]["relatedId"], swap["id"]);

    let read_url = format!(
        "/api/notifications/{}/read",
        unread[0]["id"].as_str().unwrap()
    );
    assert_eq!(fixture.patch(&read_url).await, StatusCode::NO_CONTENT);
    let (_, unread) = fixture.get(&leader_unread).await;
    assert_eq!(unread, json!([]));
    let (_, all) = fixture
        .get(&format!("/api/volunteers/{}/notifications", leader))
        .await;
    assert_eq!(all[0]["isRead"], true);

    let swap_url = format!("/api/swap-requests/{}", swap["id"].as_str().unwrap());
    let (status, _) = fixture.put(&swap_url, json!({ "status": "rejected" })).await;
    assert_eq!(status, 200);
    let (_, inbox) = fixture
        .get(&format!("/api/volunteers/{}/notifications", alice))
        .await;
    assert_eq!(inbox[0]["type"], "swap_request_update");
    assert_eq!(inbox[0]["title"], "Swap request rejected");
}

#[tokio::test]
async fn test_notification_endpoints() {
    let fixture = TestFixture::sqlite().await;
    let alice = fixture.volunteer("alice", "Alice Martins").await;

    let note = fixture
        .create(
            "/api/notifications",
            json!({ "volunteerId": alice, "type": "schedule_published", "title": "June rota" }),
        )
        .await;
    assert_eq!(note["isRead"], false);

    let (status, body) = fixture
        .post(
            "/api/notifications",
            json!({ "volunteerId": alice, "type": "carrier_pigeon", "title": "Hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "type");

    let (status, _) = fixture
        .post(
            "/api/notifications",
            json!({ "volunteerId": "nobody", "title": "Hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = fixture.get("/api/volunteers/nobody/notifications").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let note_url = format!("/api/notifications/{}", note["id"].as_str().unwrap());
    assert_eq!(fixture.delete(&note_url).await, StatusCode::NO_CONTENT);
    assert_eq!(fixture.delete(&note_url).await, StatusCode::NOT_FOUND);
    assert_eq!(
        fixture.patch(&format!("{}/read", note_url)).await,
        StatusCode::NOT_FOUND
    );
}
