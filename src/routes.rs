// src/routes.rs

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, exam, exam_history, question, subject, topic, user},
    state::AppState,
    utils::jwt,
};

/// Builds the full application router.
///
/// Every group except login and user creation sits behind the bearer-token
/// middleware. Topic writes additionally require a staff role; all other
/// role and ownership rules live in the handlers themselves.
pub fn create_router(state: AppState) -> Router {
    let require_auth = middleware::from_fn_with_state(state.clone(), jwt::auth_middleware);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/logout", post(auth::logout))
                .route("/me", get(auth::me))
                .layer(require_auth.clone()),
        );

    // POST / checks the (optional) token itself: creating a student needs
    // none, creating a teacher needs an admin's.
    let user_routes = Router::new()
        .route("/register", post(user::register))
        .route("/", post(user::create))
        .merge(
            Router::new()
                .route("/", get(user::list_users))
                .route("/following", get(user::find_following))
                .route("/follow", post(user::follow))
                .route("/unfollow", post(user::unfollow))
                .route("/{id}", put(user::update_user).delete(user::delete_user))
                .layer(require_auth.clone()),
        );

    let subject_routes = Router::new()
        .route("/", get(subject::list_subjects))
        .route("/{id}", get(subject::get_subject))
        .layer(require_auth.clone());

    let topic_routes = Router::new()
        .route("/", get(topic::list_topics))
        .route("/{id}", get(topic::get_topic))
        .merge(
            Router::new()
                .route("/", post(topic::create_topic))
                .route(
                    "/{id}",
                    put(topic::update_topic).delete(topic::delete_topic),
                )
                .layer(middleware::from_fn(jwt::staff_middleware)),
        )
        .layer(require_auth.clone());

    let question_routes = Router::new()
        .route(
            "/",
            get(question::list_questions).post(question::create_question),
        )
        .route(
            "/{id}",
            get(question::get_question)
                .put(question::update_question)
                .delete(question::delete_question),
        )
        .layer(require_auth.clone());

    let exam_routes = Router::new()
        .route("/", get(exam::list_exams).post(exam::create_exam))
        .route("/generate", get(exam::generate_random_exam))
        .route(
            "/{id}",
            get(exam::get_exam)
                .put(exam::update_exam)
                .delete(exam::delete_exam),
        )
        .layer(require_auth.clone());

    let history_routes = Router::new()
        .route(
            "/",
            get(exam_history::list_exam_histories).post(exam_history::create_exam_history),
        )
        .route("/statistic", get(exam_history::statistic))
        .route(
            "/{id}",
            get(exam_history::get_exam_history).delete(exam_history::delete_exam_history),
        )
        .layer(require_auth);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/subjects", subject_routes)
        .nest("/api/topics", topic_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/exam-history", history_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
