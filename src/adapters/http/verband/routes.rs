//! Axum router configuration for the Verband membership endpoints.

use axum::{
    middleware,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};

use super::super::middleware::auth_middleware;
use super::handlers::{
    cancel_membership, confirm_payment, get_membership, get_public_config, health,
    issue_invoice_number, issue_mandate, list_history, list_mandates, list_memberships,
    list_payments, list_settings, register_admin, register_public, renew_membership,
    revoke_mandate, set_fee_exemption, sign_membership, update_membership, update_setting,
    update_settings, VerbandAppState,
};

/// Mount point of the membership API.
pub const API_PREFIX: &str = "/api/verbandsmitgliedschaften";

/// Unauthenticated routes for the public registration form.
///
/// # Routes
/// - `POST /anmeldung` - Self-registration
/// - `GET /config` - Prices, VAT and contract term
pub fn public_routes() -> Router<VerbandAppState> {
    Router::new()
        .route("/anmeldung", post(register_public))
        .route("/config", get(get_public_config))
}

/// Admin routes. Every handler requires a valid bearer token.
///
/// # Routes
///
/// ## Memberships
/// - `GET /` - List (`typ`, `status`, `limit`)
/// - `POST /` - Administrative registration
/// - `GET /:id` - Detail with history and dojo statistics
/// - `PUT /:id` - Partial update
/// - `DELETE /:id` - Cancel
/// - `POST /:id/beitragsfrei` - Toggle fee exemption
/// - `POST /:id/verlaengern` - Renew
/// - `POST /:id/unterschreiben` - Sign
/// - `GET /:id/historie` - Audit trail
///
/// ## Payments and SEPA
/// - `POST /rechnungsnummern` - Reserve an invoice number for a manual invoice
/// - `GET /:id/zahlungen` - Payments
/// - `POST /zahlungen/:zahlungs_id/bezahlt` - Confirm payment
/// - `GET /:id/sepa` - Mandates
/// - `POST /:id/sepa` - Issue mandate
/// - `DELETE /sepa/:sepa_id` - Revoke mandate
///
/// ## Settings
/// - `GET /einstellungen` - List
/// - `PUT /einstellungen` - Bulk update
/// - `PUT /einstellungen/:key` - Single update
pub fn admin_routes() -> Router<VerbandAppState> {
    Router::new()
        .route("/", membership_collection())
        .route("/einstellungen", get(list_settings).put(update_settings))
        .route("/einstellungen/:key", put(update_setting))
        .route("/rechnungsnummern", post(issue_invoice_number))
        .route("/zahlungen/:zahlungs_id/bezahlt", post(confirm_payment))
        .route("/sepa/:sepa_id", delete(revoke_mandate))
        .route(
            "/:id",
            get(get_membership)
                .put(update_membership)
                .delete(cancel_membership),
        )
        .route("/:id/beitragsfrei", post(set_fee_exemption))
        .route("/:id/verlaengern", post(renew_membership))
        .route("/:id/unterschreiben", post(sign_membership))
        .route("/:id/historie", get(list_history))
        .route("/:id/zahlungen", get(list_payments))
        .route("/:id/sepa", get(list_mandates).post(issue_mandate))
}

/// List and administrative registration.
///
/// Nesting maps `/` to the bare prefix, so the collection is also mounted
/// at `<prefix>/` by [`verband_router`].
fn membership_collection() -> MethodRouter<VerbandAppState> {
    get(list_memberships).post(register_admin)
}

/// Create the complete service router.
///
/// The auth middleware only wraps the admin routes; `/health` and the
/// public routes never look at the `Authorization` header.
///
/// # Example
///
/// ```ignore
/// let app = verband_router(state).layer(TraceLayer::new_for_http());
/// axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
/// ```
pub fn verband_router(state: VerbandAppState) -> Router {
    let auth = middleware::from_fn_with_state(state.session_validator.clone(), auth_middleware);
    let admin = admin_routes().route_layer(auth.clone());
    let api = Router::new().nest("/public", public_routes()).merge(admin);

    Router::new()
        .route("/health", get(health))
        .route(
            &format!("{API_PREFIX}/"),
            membership_collection().route_layer(auth),
        )
        .nest(API_PREFIX, api)
        .with_state(state)
}
