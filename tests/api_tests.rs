// tests/api_tests.rs
//
// End-to-end tests against a real Postgres instance. They run the full
// router on an ephemeral port and talk HTTP to it. Set DATABASE_URL to a
// scratch database to enable them; without it every test is a no-op skip.

use chrono::{Duration, Utc};
use exam_backend::{config::Config, create_router, state::AppState, utils::crypto};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

const TEST_JWT_SECRET: &str = "integration-test-jwt-secret";
const TEST_PASSWORD_SECRET: &str = "integration-test-password-secret";
const TEST_PASSWORD: &str = "secret-password";

async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let config = Config {
        database_url,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_expiration: 3600,
        password_secret: TEST_PASSWORD_SECRET.to_string(),
        rust_log: "info".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let app = create_router(AppState {
        pool: pool.clone(),
        config,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some((format!("http://{}", addr), pool))
}

fn unique_username(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

async fn register_student(client: &reqwest::Client, base: &str, username: &str) -> Value {
    let resp = client
        .post(format!("{base}/api/users/register"))
        .json(&json!({
            "username": username,
            "password": TEST_PASSWORD,
            "role": "STUDENT",
            "fullName": "Test Student",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

async fn login(client: &reqwest::Client, base: &str, username: &str) -> String {
    let resp = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({"username": username, "password": TEST_PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["data"]["accessToken"].as_str().unwrap().to_string()
}

async fn seed_user(pool: &PgPool, username: &str, role: &str) -> i64 {
    let encrypted = crypto::encrypt_password(TEST_PASSWORD_SECRET, TEST_PASSWORD).unwrap();
    sqlx::query_scalar(
        "INSERT INTO users (username, password, full_name, role)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(username)
    .bind(&encrypted)
    .bind(format!("{role} {username}"))
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_subject(pool: &PgPool, label: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO subjects (label, value, name, question_number, time_limit)
         VALUES ($1, lower($1), $1, 10, 45) RETURNING id",
    )
    .bind(label)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_topic(pool: &PgPool, subject_id: i64, quotas: [i64; 4]) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO topics
            (title, subject_id, num_of_level1, num_of_level2, num_of_level3, num_of_level4)
         VALUES ('Topic', $1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(subject_id)
    .bind(quotas[0])
    .bind(quotas[1])
    .bind(quotas[2])
    .bind(quotas[3])
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_question(
    pool: &PgPool,
    subject_id: i64,
    topic_id: i64,
    creator_id: i64,
    level: i64,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO questions (title, answers, level, subject_id, topic_id, creator_id)
         VALUES ('What is 2 + 2?',
                 '[{\"label\": \"A\", \"value\": \"4\", \"isCorrect\": true}]',
                 $1, $2, $3, $4)
         RETURNING id",
    )
    .bind(level)
    .bind(subject_id)
    .bind(topic_id)
    .bind(creator_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn register_rejects_non_student_roles() {
    let Some((base, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/users/register"))
        .json(&json!({
            "username": unique_username("eve"),
            "password": TEST_PASSWORD,
            "role": "TEACHER",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "NO_EXECUTE_PERMISSION");
}

#[tokio::test]
async fn register_requires_password() {
    let Some((base, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/users/register"))
        .json(&json!({
            "username": unique_username("nopass"),
            "role": "STUDENT",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "PASSWORD_IS_REQUIRED");
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let Some((base, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let username = unique_username("dup");

    register_student(&client, &base, &username).await;

    let resp = client
        .post(format!("{base}/api/users/register"))
        .json(&json!({
            "username": username,
            "password": TEST_PASSWORD,
            "role": "STUDENT",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "USER_ALREADY_EXISTS");
}

#[tokio::test]
async fn login_and_me_roundtrip() {
    let Some((base, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let username = unique_username("alice");

    let registered = register_student(&client, &base, &username).await;
    assert!(registered["data"].get("password").is_none());

    let token = login(&client, &base, &username).await;

    let resp = client
        .get(format!("{base}/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["username"], username.as_str());
    assert_eq!(body["data"]["role"], "STUDENT");

    // Without a token the same endpoint is closed.
    let resp = client.get(format!("{base}/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let Some((base, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let username = unique_username("bob");
    register_student(&client, &base, &username).await;

    for (user, pass) in [
        (username.as_str(), "wrong-password"),
        ("no_such_user_anywhere", TEST_PASSWORD),
    ] {
        let resp = client
            .post(format!("{base}/api/auth/login"))
            .json(&json!({"username": user, "password": pass}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "USERNAME_OR_PASSWORD_INCORRECT");
    }
}

#[tokio::test]
async fn exam_publish_time_gates_visibility_and_edits() {
    let Some((base, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let teacher = unique_username("teacher");
    seed_user(&pool, &teacher, "TEACHER").await;
    let token = login(&client, &base, &teacher).await;
    let subject_id = seed_subject(&pool, &unique_username("math")).await;

    // Scheduled for tomorrow: invisible but editable.
    let resp = client
        .post(format!("{base}/api/exams"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Scheduled exam",
            "subjectId": subject_id,
            "questionIds": [],
            "publishAt": (Utc::now() + Duration::days(1)).to_rfc3339(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let scheduled_id = body["data"]["id"].as_i64().unwrap();

    let resp = client
        .get(format!("{base}/api/exams/{scheduled_id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].is_null());

    let resp = client
        .put(format!("{base}/api/exams/{scheduled_id}"))
        .bearer_auth(&token)
        .json(&json!({"title": "Renamed before publish"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Published immediately: visible but frozen.
    let resp = client
        .post(format!("{base}/api/exams"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Live exam",
            "subjectId": subject_id,
            "questionIds": [],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let live_id = body["data"]["id"].as_i64().unwrap();

    let resp = client
        .get(format!("{base}/api/exams/{live_id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["title"], "Live exam");
    assert_eq!(body["data"]["creatorName"], format!("TEACHER {teacher}"));

    let resp = client
        .put(format!("{base}/api/exams/{live_id}"))
        .bearer_auth(&token)
        .json(&json!({"title": "Too late"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "CANT_EDIT_PUBLISHED_EXAM");
}

#[tokio::test]
async fn following_twice_leaves_two_entries() {
    let Some((base, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let student = unique_username("student");
    let registered = register_student(&client, &base, &student).await;
    let student_id = registered["data"]["id"].as_i64().unwrap();
    let token = login(&client, &base, &student).await;

    let teacher_id = seed_user(&pool, &unique_username("followee"), "TEACHER").await;

    for _ in 0..2 {
        let resp = client
            .post(format!("{base}/api/users/follow"))
            .bearer_auth(&token)
            .json(&json!({"followIds": [teacher_id]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let following: Vec<i64> = sqlx::query_scalar("SELECT following FROM users WHERE id = $1")
        .bind(student_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(following, vec![teacher_id, teacher_id]);

    let followers: Vec<i64> = sqlx::query_scalar("SELECT followers FROM users WHERE id = $1")
        .bind(teacher_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(followers, vec![student_id, student_id]);

    // An empty id list is a client error, not a no-op.
    let resp = client
        .post(format!("{base}/api/users/follow"))
        .bearer_auth(&token)
        .json(&json!({"followIds": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "FOLLOW_IDS_IS_REQUIRED");
}

#[tokio::test]
async fn question_deletion_is_owner_gated() {
    let Some((base, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let owner = unique_username("owner");
    seed_user(&pool, &owner, "TEACHER").await;
    let owner_token = login(&client, &base, &owner).await;

    let other = unique_username("other");
    seed_user(&pool, &other, "TEACHER").await;
    let other_token = login(&client, &base, &other).await;

    let subject_id = seed_subject(&pool, &unique_username("physics")).await;
    let topic_id = seed_topic(&pool, subject_id, [0, 0, 0, 0]).await;

    let resp = client
        .post(format!("{base}/api/questions"))
        .bearer_auth(&owner_token)
        .json(&json!({
            "title": "What is the unit of force?",
            "answers": [{"label": "A", "value": "Newton", "isCorrect": true}],
            "level": 1,
            "subjectId": subject_id,
            "topicId": topic_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let question_id = body["data"]["id"].as_i64().unwrap();

    let resp = client
        .delete(format!("{base}/api/questions/{question_id}"))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .delete(format!("{base}/api/questions/{question_id}"))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let status: String = sqlx::query_scalar("SELECT status FROM questions WHERE id = $1")
        .bind(question_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "INACTIVE");
}

#[tokio::test]
async fn statistics_reports_average_and_tied_extremes() {
    let Some((base, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let student = unique_username("grinder");
    register_student(&client, &base, &student).await;
    let token = login(&client, &base, &student).await;

    let subject_id = seed_subject(&pool, &unique_username("chemistry")).await;

    for score in [5.0, 8.0, 8.0] {
        let resp = client
            .post(format!("{base}/api/exam-history"))
            .bearer_auth(&token)
            .json(&json!({
                "examId": null,
                "subjectId": subject_id,
                "result": [],
                "score": score,
                "periodTime": 600,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["title"], "Đề thi ngẫu nhiên");
    }

    let resp = client
        .get(format!(
            "{base}/api/exam-history/statistic?subjectId={subject_id}"
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    let stats = body["data"].as_array().unwrap();
    assert_eq!(stats.len(), 1);
    let stat = &stats[0];

    assert_eq!(stat["averageScore"], 7.0);
    assert_eq!(stat["maxScore"]["score"], 8.0);
    assert_eq!(stat["maxScore"]["historyIds"].as_array().unwrap().len(), 2);
    assert_eq!(stat["minScore"]["score"], 5.0);
    assert_eq!(stat["minScore"]["historyIds"].as_array().unwrap().len(), 1);
    assert_eq!(stat["histories"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn attempt_submission_bumps_exam_usage() {
    let Some((base, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let teacher_id = seed_user(&pool, &unique_username("prof"), "TEACHER").await;
    let subject_id = seed_subject(&pool, &unique_username("biology")).await;
    let exam_id: i64 = sqlx::query_scalar(
        "INSERT INTO exams (title, subject_id, creator_id) VALUES ('Final', $1, $2) RETURNING id",
    )
    .bind(subject_id)
    .bind(teacher_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    let student = unique_username("taker");
    register_student(&client, &base, &student).await;
    let token = login(&client, &base, &student).await;

    let resp = client
        .post(format!("{base}/api/exam-history"))
        .bearer_auth(&token)
        .json(&json!({
            "examId": exam_id,
            "subjectId": subject_id,
            "result": [{"questionId": 1, "answer": "A"}],
            "score": 9.5,
            "periodTime": 1200,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["title"], "Final");

    let num_of_use: i64 = sqlx::query_scalar("SELECT num_of_use FROM exams WHERE id = $1")
        .bind(exam_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(num_of_use, 1);
}

#[tokio::test]
async fn random_generation_fills_topic_quotas_easy_to_hard() {
    let Some((base, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let teacher = unique_username("composer");
    let teacher_id = seed_user(&pool, &teacher, "TEACHER").await;
    let token = login(&client, &base, &teacher).await;

    let subject_id = seed_subject(&pool, &unique_username("history")).await;
    let topic_id = seed_topic(&pool, subject_id, [2, 1, 0, 0]).await;
    for level in [1, 1, 1, 2, 2] {
        seed_question(&pool, subject_id, topic_id, teacher_id, level).await;
    }

    let resp = client
        .get(format!("{base}/api/exams/generate?subjectId={subject_id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let draft = &body["data"];

    let questions = draft["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);

    let levels: Vec<i64> = questions
        .iter()
        .map(|q| q["level"].as_i64().unwrap())
        .collect();
    let mut sorted = levels.clone();
    sorted.sort();
    assert_eq!(levels, sorted);
    assert_eq!(levels.iter().filter(|&&l| l == 1).count(), 2);
    assert_eq!(levels.iter().filter(|&&l| l == 2).count(), 1);

    assert_eq!(
        draft["questionIds"].as_array().unwrap().len(),
        questions.len()
    );
    assert_eq!(draft["subjectId"].as_i64().unwrap(), subject_id);

    // Missing subject is a 404, not an empty draft.
    let resp = client
        .get(format!("{base}/api/exams/generate?subjectId=999999999"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
