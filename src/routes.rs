// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, authoring, catalog, certificate, enrollment, organization, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware, org_admin_middleware},
};

/// Assembles the main application router.
///
/// * Public catalog and certificate verification (optional auth).
/// * Learner routes: enrollments, progress, quizzes, certificates.
/// * Organization portal and platform admin routes.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(auth_layer.clone()),
        );

    let course_routes = Router::new()
        .route("/", get(catalog::list_courses))
        .route("/{id}", get(catalog::get_course))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ))
        .merge(
            Router::new()
                .route("/{id}/enroll", post(enrollment::enroll))
                .layer(auth_layer.clone()),
        );

    let enrollment_routes = Router::new()
        .route("/", get(enrollment::list_my_enrollments))
        .route("/{id}/progress", get(enrollment::get_enrollment_progress))
        .route(
            "/{id}/lessons/{lesson_id}/progress",
            post(enrollment::record_lesson_progress),
        )
        .route("/{id}/certificate", post(certificate::request_certificate))
        .layer(auth_layer.clone());

    let quiz_routes = Router::new()
        .route("/{id}", get(quiz::get_quiz_for_taking))
        .route("/{id}/submit", post(quiz::submit_quiz))
        .route("/{id}/attempts", get(quiz::list_my_attempts))
        .route("/{id}/attempts/best", get(quiz::best_attempt))
        .layer(auth_layer.clone());

    let certificate_routes = Router::new()
        .route("/verify/{code}", get(certificate::verify_certificate))
        .merge(
            Router::new()
                .route("/", get(certificate::list_my_certificates))
                .layer(auth_layer.clone()),
        );

    let org_routes = Router::new()
        .route("/members", get(organization::list_members))
        .route(
            "/enrollments",
            get(organization::enrollment_report).post(organization::enroll_member),
        )
        // Auth first, then the role check
        .layer(middleware::from_fn(org_admin_middleware))
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", put(admin::update_user))
        .route(
            "/organizations",
            get(admin::list_organizations).post(admin::create_organization),
        )
        .route(
            "/courses",
            get(admin::list_all_courses).post(admin::create_course),
        )
        .route(
            "/courses/{id}",
            get(admin::get_course_outline)
                .put(admin::update_course)
                .delete(admin::delete_course),
        )
        .route("/courses/{id}/modules", post(admin::create_module))
        .route(
            "/modules/{id}",
            put(admin::update_module).delete(admin::delete_module),
        )
        .route("/modules/{id}/lessons", post(admin::create_lesson))
        .route("/modules/{id}/quiz", post(authoring::create_quiz))
        .route(
            "/lessons/{id}",
            put(admin::update_lesson).delete(admin::delete_lesson),
        )
        .route(
            "/quizzes/{id}",
            get(authoring::get_quiz_with_answers)
                .put(authoring::update_quiz)
                .delete(authoring::delete_quiz),
        )
        .route("/quizzes/{id}/questions", post(authoring::add_question))
        .route("/quizzes/{id}/attempts", get(authoring::list_quiz_attempts))
        .route(
            "/questions/{id}",
            put(authoring::update_question).delete(authoring::delete_question),
        )
        .route(
            "/certificates/{id}/document",
            put(certificate::set_certificate_document),
        )
        .route("/stats", get(admin::stats))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/enrollments", enrollment_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/certificates", certificate_routes)
        .nest("/api/org", org_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
