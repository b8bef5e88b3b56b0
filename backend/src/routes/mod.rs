//! Route definitions for the dance studio platform

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{
    handlers,
    middleware::{auth_middleware, back_office_middleware},
    AppState,
};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public, `/me` protected)
        .nest("/auth", auth_routes(state.clone()))
        // Studio pages addressed by subdomain (public)
        .nest("/public", public_routes())
        // Payment provider webhooks (signature-checked)
        .route("/webhooks/billing", post(handlers::webhooks::billing_webhook))
        // Cron triggers (bearer cron secret)
        .nest("/cron", cron_routes())
        // Protected routes - back office
        .nest("/admin", admin_routes(state.clone()))
        // Protected routes - instructor portal
        .nest("/instructor", instructor_routes(state.clone()))
        // Protected routes - parent portal
        .nest("/parent", parent_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
        .route(
            "/me",
            get(handlers::me).route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/studio", get(handlers::public::studio_profile))
        .route("/classes", get(handlers::public::class_schedule))
        .route("/media", get(handlers::public::public_media))
}

fn cron_routes() -> Router<AppState> {
    Router::new()
        .route("/dispatch-messages", post(handlers::webhooks::dispatch_messages))
        .route("/recurring-billing", post(handlers::webhooks::recurring_billing))
}

/// Back-office routes (owners and admins, permission-checked per handler)
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/studio", studio_routes())
        .nest("/staff", staff_routes())
        .nest("/classes", class_routes())
        .nest("/families", family_routes())
        .nest("/students", student_routes())
        .nest("/enrollments", enrollment_routes())
        .nest("/attendance", attendance_routes())
        .nest("/invoices", invoice_routes())
        .nest("/tuition-plans", tuition_plan_routes())
        .nest("/messages", message_routes())
        .nest("/announcements", announcement_routes())
        .nest("/media", media_routes())
        .nest("/waivers", waiver_routes())
        .nest("/reports", report_routes())
        .route_layer(middleware::from_fn(back_office_middleware))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn studio_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::studio::get_studio).put(handlers::studio::update_studio),
        )
        .route(
            "/users",
            get(handlers::studio::list_users).post(handlers::studio::invite_user),
        )
        .route("/users/:id/active", put(handlers::studio::set_user_active))
}

fn staff_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::staff::list_staff).post(handlers::staff::create_staff),
        )
        .route(
            "/:id",
            get(handlers::staff::get_staff)
                .put(handlers::staff::update_staff)
                .delete(handlers::staff::deactivate_staff),
        )
}

fn class_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::classes::list_classes).post(handlers::classes::create_class),
        )
        .route(
            "/:id",
            get(handlers::classes::get_class)
                .put(handlers::classes::update_class)
                .delete(handlers::classes::delete_class),
        )
        .route("/:id/roster", get(handlers::classes::class_roster))
        .route("/:id/promote-next", post(handlers::enrollments::promote_next))
}

fn family_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::families::list_families).post(handlers::families::create_family),
        )
        .route(
            "/:id",
            get(handlers::families::get_family)
                .put(handlers::families::update_family)
                .delete(handlers::families::delete_family),
        )
        .route("/:id/students", post(handlers::families::create_student))
        .route("/:id/balance", get(handlers::families::family_balance))
        .route("/:id/payments", get(handlers::billing::family_payments))
        .route("/:id/waivers", get(handlers::families::family_waivers))
        .route("/:id/billing-customer", post(handlers::families::link_billing_customer))
}

fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::families::list_students))
        .route(
            "/:id",
            get(handlers::families::get_student)
                .put(handlers::families::update_student)
                .delete(handlers::families::deactivate_student),
        )
        .route("/:id/attendance", get(handlers::attendance::student_summary))
}

fn enrollment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::enrollments::list_enrollments).post(handlers::enrollments::enroll),
        )
        .route(
            "/:id",
            get(handlers::enrollments::get_enrollment).delete(handlers::enrollments::cancel_enrollment),
        )
        .route("/:id/approve", post(handlers::enrollments::approve_enrollment))
        .route("/:id/promote", post(handlers::enrollments::promote_enrollment))
        .route("/:id/drop", post(handlers::enrollments::drop_enrollment))
}

fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/classes/:class_id",
            get(handlers::attendance::list_sessions).post(handlers::attendance::mark_attendance),
        )
        .route("/classes/:class_id/:date", get(handlers::attendance::session_sheet))
}

fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::billing::list_invoices).post(handlers::billing::create_invoice),
        )
        .route("/:id", get(handlers::billing::get_invoice))
        .route("/:id/issue", post(handlers::billing::issue_invoice))
        .route("/:id/payments", post(handlers::billing::record_payment))
        .route("/:id/void", post(handlers::billing::void_invoice))
}

fn tuition_plan_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::billing::list_plans).post(handlers::billing::create_plan),
        )
        .route(
            "/:id",
            get(handlers::billing::get_plan).put(handlers::billing::update_plan),
        )
        .route("/:id/pause", post(handlers::billing::pause_plan))
        .route("/:id/resume", post(handlers::billing::resume_plan))
        .route("/:id/cancel", post(handlers::billing::cancel_plan))
}

fn message_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::messages::list_messages).post(handlers::messages::create_message),
        )
        .route("/preview", post(handlers::messages::preview_recipients))
        .route(
            "/:id",
            get(handlers::messages::get_message)
                .put(handlers::messages::update_message)
                .delete(handlers::messages::delete_message),
        )
        .route("/:id/schedule", post(handlers::messages::schedule_message))
        .route("/:id/cancel", post(handlers::messages::cancel_message))
        .route("/:id/send", post(handlers::messages::send_now))
        .route("/:id/deliveries", get(handlers::messages::list_deliveries))
}

fn announcement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::content::list_announcements).post(handlers::content::create_announcement),
        )
        .route(
            "/:id",
            put(handlers::content::update_announcement).delete(handlers::content::delete_announcement),
        )
}

fn media_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::content::list_media).post(handlers::content::create_media),
        )
        .route("/:id", delete(handlers::content::delete_media))
}

fn waiver_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::content::list_waivers).post(handlers::content::create_waiver),
        )
        .route(
            "/:id",
            get(handlers::content::get_waiver).put(handlers::content::update_waiver),
        )
        .route("/:id/signatures", get(handlers::content::list_signatures))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::reporting::get_dashboard))
        .route("/class-roster", get(handlers::reporting::get_class_roster_report))
        .route(
            "/outstanding-invoices",
            get(handlers::reporting::get_outstanding_invoices_report),
        )
        .route(
            "/class-utilization",
            get(handlers::reporting::get_class_utilization_report),
        )
        .route("/revenue", get(handlers::reporting::get_revenue_report))
}

/// Instructor portal (protected)
fn instructor_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/classes", get(handlers::instructor::my_classes))
        .route("/classes/:class_id/roster", get(handlers::instructor::class_roster))
        .route(
            "/classes/:class_id/attendance",
            get(handlers::instructor::list_sessions).post(handlers::instructor::mark_attendance),
        )
        .route(
            "/classes/:class_id/attendance/:date",
            get(handlers::instructor::session_sheet),
        )
        .route("/announcements", get(handlers::instructor::announcements))
        .route("/media", get(handlers::instructor::media))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Parent portal (protected)
fn parent_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/family", get(handlers::parent::my_family))
        .route("/students", post(handlers::parent::add_student))
        .route("/classes", get(handlers::parent::class_schedule))
        .route(
            "/enrollments",
            get(handlers::parent::my_enrollments).post(handlers::parent::request_enrollment),
        )
        .route("/enrollments/:id/cancel", post(handlers::parent::cancel_enrollment))
        .route("/enrollments/:id/drop", post(handlers::parent::drop_enrollment))
        .route("/invoices", get(handlers::parent::my_invoices))
        .route("/invoices/:id", get(handlers::parent::get_invoice))
        .route("/balance", get(handlers::parent::my_balance))
        .route("/payments", get(handlers::parent::my_payments))
        .route("/waivers", get(handlers::parent::my_waivers))
        .route("/waivers/:id/sign", post(handlers::parent::sign_waiver))
        .route("/announcements", get(handlers::parent::announcements))
        .route("/media", get(handlers::parent::media))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
