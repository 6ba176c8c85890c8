use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use inkwell_api::router;
use inkwell_api::state::{AppState, AppStateInner};
use inkwell_core::{Workspace, WorkspaceConfig};
use inkwell_db::Database;
use inkwell_types::api::Claims;

const SECRET: &str = "test-secret-for-inkwell-api";

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let workspace = Workspace::new(
            db,
            WorkspaceConfig {
                share_base_url: "https://docs.example".into(),
                ..WorkspaceConfig::default()
            },
        );
        let state = AppStateInner::new(workspace, SECRET);
        Self {
            router: router(state.clone()),
            state,
        }
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, value)
    }

    /// A fresh project owned by a fresh user.
    async fn project(&self) -> (Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let (status, body) = self.call("POST", "/projects", Some(owner), Some(json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let project: Uuid = serde_json::from_value(body["project_id"].clone()).unwrap();
        (project, owner)
    }

    async fn add(&self, project: Uuid, owner: Uuid, level: &str) -> Uuid {
        let user = Uuid::new_v4();
        let (status, _) = self
            .call(
                "POST",
                &format!("/projects/{}/collaborators", project),
                Some(owner),
                Some(json!({ "user_id": user, "level": level })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        user
    }

    async fn file(&self, project: Uuid, user: Uuid, path: &str, content: &str) -> Uuid {
        let (status, body) = self
            .call(
                "POST",
                &format!("/projects/{}/files", project),
                Some(user),
                Some(json!({ "path": path, "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(body["id"].clone()).unwrap()
    }
}

fn token(user: Uuid) -> String {
    let claims = Claims {
        sub: user,
        username: format!("user-{}", &user.to_string()[..8]),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));

    let (status, _) = app.call("POST", "/projects", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/projects")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn collaborator_levels_gate_capabilities() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;
    let editor = app.add(project, owner, "editor").await;

    let (status, body) = app
        .call("GET", &format!("/projects/{}/capabilities/write", project), Some(editor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    let (_, body) = app
        .call(
            "GET",
            &format!("/projects/{}/capabilities/manage_permissions", project),
            Some(editor),
            None,
        )
        .await;
    assert_eq!(body["allowed"], false);

    let (status, _) = app
        .call("GET", &format!("/projects/{}/capabilities/fly", project), Some(editor), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Editors cannot grant access.
    let (status, _) = app
        .call(
            "POST",
            &format!("/projects/{}/collaborators", project),
            Some(editor),
            Some(json!({ "user_id": Uuid::new_v4(), "level": "viewer" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app
        .call("GET", &format!("/projects/{}/collaborators", project), Some(owner), None)
        .await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn owner_cannot_be_demoted_or_removed() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;
    let uri = format!("/projects/{}/collaborators/{}", project, owner);

    let (status, _) = app
        .call("PATCH", &uri, Some(owner), Some(json!({ "level": "editor" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.call("DELETE", &uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.call("POST", "/projects", Some(owner), Some(json!({ "project_id": project }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;

    let (status, _) = app
        .call(
            "POST",
            &format!("/projects/{}/collaborators", project),
            Some(owner),
            Some(json!({ "user_id": "nope", "level": "editor" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            &format!("/projects/{}/files", project),
            Some(owner),
            Some(json!({ "path": "a.md", "mode": 644 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restore_keeps_every_version() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;
    let editor = app.add(project, owner, "editor").await;
    let file = app.file(project, owner, "story.md", "A").await;
    let file_uri = format!("/projects/{}/files/{}", project, file);

    let (status, body) = app
        .call("PUT", &file_uri, Some(owner), Some(json!({ "content": "B" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "B");

    let (status, body) = app
        .call("POST", &format!("{}/versions/1/restore", file_uri), Some(editor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "A");

    let (_, body) = app
        .call("GET", &format!("{}/versions", file_uri), Some(editor), None)
        .await;
    let entries: Vec<(String, Value, String)> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["kind"].as_str().unwrap().to_string(),
                e["version_id"].clone(),
                e["content"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        entries,
        vec![
            ("snapshot".to_string(), json!(2), "B".to_string()),
            ("snapshot".to_string(), json!(1), "A".to_string()),
            ("current".to_string(), Value::Null, "A".to_string()),
        ]
    );

    let (status, body) = app
        .call("GET", &format!("{}/versions/2", file_uri), Some(editor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "B");

    let (status, _) = app
        .call("GET", &format!("{}/versions/9", file_uri), Some(editor), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn viewers_read_but_cannot_write() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;
    let viewer = app.add(project, owner, "viewer").await;
    let file = app.file(project, owner, "notes.md", "hello").await;
    let file_uri = format!("/projects/{}/files/{}", project, file);

    let (status, body) = app.call("GET", &file_uri, Some(viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "hello");

    let (status, _) = app
        .call("PUT", &file_uri, Some(viewer), Some(json!({ "content": "mine now" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &file_uri, Some(viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("GET", &file_uri, Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn share_links_are_redeemed_until_they_expire() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;
    let editor = app.add(project, owner, "editor").await;
    let share_uri = format!("/projects/{}/share", project);

    let (status, _) = app.call("POST", &share_uri, Some(editor), Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call("POST", &share_uri, Some(owner), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(
        body["url"].as_str().unwrap(),
        format!("https://docs.example/shared/{}", token)
    );

    let stranger = Uuid::new_v4();
    let (status, body) = app
        .call("GET", &format!("/shared/{}", token), Some(stranger), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project_id"], json!(project));

    // Links minted directly with a past expiry still resolve, but redeem as gone.
    let expired = app
        .state
        .workspace
        .permissions
        .generate_share_link(project, owner, Some(Utc::now() - Duration::minutes(1)))
        .unwrap();
    let (status, _) = app
        .call("GET", &format!("/shared/{}", expired.token), Some(stranger), None)
        .await;
    assert_eq!(status, StatusCode::GONE);

    let (status, _) = app
        .call("GET", "/shared/not-a-real-token", Some(stranger), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_threads_over_http() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;
    let viewer = app.add(project, owner, "viewer").await;
    let file = app.file(project, owner, "ch1.md", "text").await;
    let comments_uri = format!("/projects/{}/files/{}/comments", project, file);

    let (status, top) = app
        .call("POST", &comments_uri, Some(viewer), Some(json!({ "content": "typo in line 2" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, reply) = app
        .call(
            "POST",
            &comments_uri,
            Some(owner),
            Some(json!({ "content": "fixed", "parent_id": top["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .call(
            "POST",
            &comments_uri,
            Some(viewer),
            Some(json!({ "content": "thanks", "parent_id": reply["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let top_id = top["id"].as_str().unwrap();
    let (status, body) = app
        .call("POST", &format!("/comments/{}/resolve", top_id), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_resolved"], true);

    let (_, body) = app
        .call("GET", &format!("{}?include_resolved=false", comments_uri), Some(viewer), None)
        .await;
    assert!(body.as_array().unwrap().is_empty());
    let (_, body) = app.call("GET", &comments_uri, Some(viewer), None).await;
    assert_eq!(body[0]["replies"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(
            "PATCH",
            &format!("/comments/{}", top_id),
            Some(owner),
            Some(json!({ "content": "not mine" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            "POST",
            &format!("/comments/{}/reactions", top_id),
            Some(owner),
            Some(json!({ "emoji": "eyes" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"], true);

    let (status, body) = app
        .call("DELETE", &format!("/comments/{}", top_id), Some(viewer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);

    let (status, _) = app
        .call("POST", &format!("/comments/{}/resolve", top_id), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn activity_is_newest_first_and_needs_read() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;
    let editor = app.add(project, owner, "editor").await;
    app.file(project, editor, "a.md", "").await;

    let (status, body) = app
        .call("GET", &format!("/projects/{}/activity?limit=2", project), Some(editor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["file_created", "collaborator_added"]);

    let (status, _) = app
        .call("GET", &format!("/projects/{}/activity?limit=0", project), Some(editor), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call("GET", &format!("/projects/{}/activity", project), Some(Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn opening_a_file_marks_presence() {
    let app = TestApp::new();
    let (project, owner) = app.project().await;
    let viewer = app.add(project, owner, "viewer").await;
    let file = app.file(project, owner, "a.md", "").await;
    let file_uri = format!("/projects/{}/files/{}", project, file);
    let presence_uri = format!("{}/presence", file_uri);

    let (_, body) = app.call("GET", &file_uri, Some(owner), None).await;
    assert_eq!(body["active_users"], json!([owner]));

    let (status, body) = app.call("POST", &presence_uri, Some(viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_users"].as_array().unwrap().len(), 2);

    let (status, _) = app.call("DELETE", &presence_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("DELETE", &presence_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.call("GET", &presence_uri, Some(viewer), None).await;
    assert_eq!(body["active_users"], json!([viewer]));

    let (status, _) = app.call("POST", &presence_uri, Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
