use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use geopost::{
    AppConfig, AppState, InMemoryRepository, create_router,
    error::RepositoryError,
    models::{NewPost, Post, PostChanges, PostListResponse, PostResponse, TokenResponse, User},
    repository::{Repository, RepositoryState},
};
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::net::TcpListener;
use tower::ServiceExt;
use uuid::Uuid;

// --- Test Doubles ---

/// Counts every store call. Used to prove the guard rejects before the store.
#[derive(Default)]
struct CountingRepo {
    calls: AtomicUsize,
}

impl CountingRepo {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Repository for CountingRepo {
    async fn create_user(&self, _: &str, _: &str, _: &str) -> Result<User, RepositoryError> {
        self.hit();
        Ok(User::default())
    }
    async fn find_user_by_username(&self, _: &str) -> Result<Option<User>, RepositoryError> {
        self.hit();
        Ok(None)
    }
    async fn create_post(&self, _: NewPost, _: Uuid) -> Result<Post, RepositoryError> {
        self.hit();
        Ok(Post::default())
    }
    async fn list_posts_by_owner(&self, _: Uuid) -> Result<Vec<Post>, RepositoryError> {
        self.hit();
        Ok(vec![])
    }
    async fn update_post(&self, _: Uuid, _: Uuid, _: PostChanges) -> Result<Option<Post>, RepositoryError> {
        self.hit();
        Ok(None)
    }
    async fn delete_post(&self, _: Uuid, _: Uuid) -> Result<bool, RepositoryError> {
        self.hit();
        Ok(false)
    }
}

// --- Helpers ---

fn app_with(repo: RepositoryState) -> Router {
    create_router(AppState::new(repo, AppConfig::default()))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, bytes)
}

async fn register_and_login(app: &Router, username: &str, email: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/register",
        None,
        Some(json!({"username": username, "password": "pw1", "email": email})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, bytes) = send(
        app,
        Method::POST,
        "/login",
        None,
        Some(json!({"username": username, "password": "pw1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let login: TokenResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(login.success);
    login.token
}

fn post_body() -> Value {
    json!({
        "title": "t",
        "body": "b",
        "geolocation": {"type": "Point", "coordinates": [1, 2]}
    })
}

// --- Tests ---

#[tokio::test]
async fn test_health_check() {
    let app = app_with(Arc::new(InMemoryRepository::new()));
    let (status, bytes) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"ok");
}

#[tokio::test]
async fn test_posts_routes_reject_before_store() {
    let repo = Arc::new(CountingRepo::default());
    let app = app_with(repo.clone());
    let id = Uuid::new_v4();

    let requests = [
        (Method::GET, "/posts".to_string(), None),
        (Method::POST, "/posts".to_string(), Some(post_body())),
        (Method::PUT, format!("/posts/{}", id), Some(post_body())),
        (Method::DELETE, format!("/posts/{}", id), None),
    ];

    for (method, uri, body) in requests {
        let (status, bytes) = send(&app, method.clone(), &uri, None, body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert!(bytes.is_empty(), "403 must carry no body for {method} {uri}");

        let (status, bytes) = send(&app, method.clone(), &uri, Some("garbage"), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri} with bad token");
        assert!(bytes.is_empty());
    }

    assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_valid_token_in_malformed_header_is_403() {
    let app = app_with(Arc::new(InMemoryRepository::new()));
    let token = register_and_login(&app, "alice", "a@x.com").await;

    // `send` prefixes "Bearer ", so these become "Bearer  <tok>" and "Bearer <tok> trailing".
    for header_tail in [format!(" {token}"), format!("{token} trailing")] {
        let (status, bytes) = send(&app, Method::GET, "/posts", Some(&header_tail), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(bytes.is_empty());
    }

    let (status, _) = send(&app, Method::GET, "/posts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_registration_one_success_one_failure() {
    let app = app_with(Arc::new(InMemoryRepository::new()));
    let body = json!({"username": "alice", "password": "pw1", "email": "a@x.com"});

    let (first, _) = send(&app, Method::POST, "/register", None, Some(body.clone())).await;
    let (second, bytes) = send(&app, Method::POST, "/register", None, Some(body)).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["success"], false);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_401() {
    let app = app_with(Arc::new(InMemoryRepository::new()));
    register_and_login(&app, "alice", "a@x.com").await;

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({"username": "alice", "password": "nope"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["message"], "Invalid username or password");
}

#[tokio::test]
async fn test_malformed_json_body_is_400() {
    let app = app_with(Arc::new(InMemoryRepository::new()));
    let token = register_and_login(&app, "alice", "a@x.com").await;

    let (status, bytes) = send(&app, Method::POST, "/posts", Some(&token), Some(json!("not an object"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["success"], false);
}

#[tokio::test]
async fn test_ownership_isolation_between_users() {
    let app = app_with(Arc::new(InMemoryRepository::new()));
    let alice = register_and_login(&app, "alice", "a@x.com").await;
    let bob = register_and_login(&app, "bob", "b@x.com").await;

    let (status, bytes) = send(&app, Method::POST, "/posts", Some(&alice), Some(post_body())).await;
    assert_eq!(status, StatusCode::OK);
    let created: PostResponse = serde_json::from_slice(&bytes).unwrap();
    let post_uri = format!("/posts/{}", created.post.id);

    // Bob cannot see it.
    let (_, bytes) = send(&app, Method::GET, "/posts", Some(&bob), None).await;
    let bob_list: PostListResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(bob_list.posts.is_empty());

    // Bob cannot update or delete it, and is told it does not exist.
    let (status, _) = send(&app, Method::PUT, &post_uri, Some(&bob), Some(json!({"title": "hijack"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, bytes) = send(&app, Method::DELETE, &post_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["message"], "Post not found or user not authorized");

    // A post that never existed looks identical.
    let (status, _) = send(&app, Method::DELETE, &format!("/posts/{}", Uuid::new_v4()), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Alice's post is untouched.
    let (_, bytes) = send(&app, Method::GET, "/posts", Some(&alice), None).await;
    let alice_list: PostListResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(alice_list.posts, vec![created.post.clone()]);

    // What was sent comes back value-for-value.
    let sent = post_body();
    let listed = serde_json::to_value(&alice_list.posts[0]).unwrap();
    assert_eq!(listed["title"], sent["title"]);
    assert_eq!(listed["body"], "b");
    assert_eq!(listed["geolocation"], json!({"type": "Point", "coordinates": [1.0, 2.0]}));
}

#[tokio::test]
async fn test_owner_update_then_delete() {
    let app = app_with(Arc::new(InMemoryRepository::new()));
    let alice = register_and_login(&app, "alice", "a@x.com").await;

    let (_, bytes) = send(&app, Method::POST, "/posts", Some(&alice), Some(post_body())).await;
    let created: PostResponse = serde_json::from_slice(&bytes).unwrap();
    let post_uri = format!("/posts/{}", created.post.id);

    let (status, bytes) = send(
        &app,
        Method::PUT,
        &post_uri,
        Some(&alice),
        Some(json!({"body": "edited", "geolocation": {"type": "Point", "coordinates": [3, 4]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(updated["post"]["title"], "t");
    assert_eq!(updated["post"]["body"], "edited");
    assert_eq!(updated["post"]["geolocation"], json!({"type": "Point", "coordinates": [3.0, 4.0]}));
    assert_eq!(updated["post"]["createdBy"], json!(created.post.created_by));

    let (status, bytes) = send(&app, Method::DELETE, &post_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let deleted: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(deleted, json!({"success": true, "message": "Post deleted successfully"}));

    let (_, bytes) = send(&app, Method::GET, "/posts", Some(&alice), None).await;
    let list: PostListResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(list.posts.is_empty());
}

#[tokio::test]
async fn test_full_scenario_over_http() {
    let app = app_with(Arc::new(InMemoryRepository::new()));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();

    // Register + login alice
    let resp = client
        .post(format!("{}/register", address))
        .json(&json!({"username": "alice", "password": "pw1", "email": "a@x.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let registered: Value = resp.json().await.unwrap();
    let alice_id = registered["user"]["id"].clone();

    let resp = client
        .post(format!("{}/login", address))
        .json(&json!({"username": "alice", "password": "pw1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let token = resp.json::<TokenResponse>().await.unwrap().token;

    // Create
    let resp = client
        .post(format!("{}/posts", address))
        .bearer_auth(&token)
        .json(&post_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["post"]["createdBy"], alice_id);
    let post_id = created["post"]["id"].as_str().unwrap().to_string();

    // List
    let resp = client
        .get(format!("{}/posts", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let list: Value = resp.json().await.unwrap();
    assert_eq!(list["posts"].as_array().unwrap().len(), 1);
    assert_eq!(list["posts"][0]["id"], post_id.as_str());
    assert_eq!(list["posts"][0]["title"], "t");
    assert_eq!(list["posts"][0]["body"], "b");
    assert_eq!(
        list["posts"][0]["geolocation"],
        json!({"type": "Point", "coordinates": [1.0, 2.0]})
    );
    assert_eq!(list["posts"][0]["active"], true);

    // Another user's token cannot update it
    let resp = client
        .post(format!("{}/register", address))
        .json(&json!({"username": "mallory", "password": "pw1", "email": "m@x.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = client
        .post(format!("{}/login", address))
        .json(&json!({"username": "mallory", "password": "pw1"}))
        .send()
        .await
        .unwrap();
    let other_token = resp.json::<TokenResponse>().await.unwrap().token;

    let resp = client
        .put(format!("{}/posts/{}", address, post_id))
        .bearer_auth(&other_token)
        .json(&post_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
