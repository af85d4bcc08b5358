//! HTTP handlers for the Verband membership endpoints.
//!
//! These handlers connect Axum routes to application layer command/query
//! handlers. Admin handlers take the actor from the bearer token; the
//! public registration records itself as self-registration.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRef, Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::application::handlers::{
    CancelMembershipCommand, CancelMembershipHandler, ConfirmPaymentCommand,
    ConfirmPaymentHandler, GetMembershipHandler, GetMembershipQuery, GetPublicConfigHandler,
    IssueInvoiceNumberCommand, IssueInvoiceNumberHandler, IssueMandateCommand, IssueMandateHandler, ListMembershipsHandler, ListMembershipsQuery,
    ListSettingsHandler, MembershipRecordsHandler, MembershipRecordsQuery,
    RegisterMembershipHandler, RenewMembershipCommand, RenewMembershipHandler,
    RevokeMandateCommand, RevokeMandateHandler, SetFeeExemptionCommand, SetFeeExemptionHandler,
    SignMembershipCommand, SignMembershipHandler, UpdateMembershipCommand,
    UpdateMembershipHandler, UpdateSettingsCommand, UpdateSettingsHandler,
};
use crate::application::AuditTrail;
use crate::domain::foundation::{Actor, AuthenticatedUser, MandateId, MembershipId, PaymentId};
use crate::domain::membership::{Consent, MembershipUpdate};
use crate::ports::{
    DojoStatsProvider, MembershipFilter, MembershipReader, SessionValidator, SettingsRepository,
    SettingsResolver, VerbandStore,
};

use super::super::error::{optional_body, ApiError, ApiJson, ApiQuery};
use super::super::middleware::{ClientIp, RequireAuth, TrustedProxy};
use super::dto::{
    BulkSettingsRequest, CancelParams, ConfirmPaymentRequest, FeeExemptionRequest,
    InvoiceNumberRequest, InvoiceNumberResponse, ListParams, MandateIssuedResponse, MandateRequest, MembershipDetailResponse, MembershipListResponse,
    MembershipResponse, RegistrationRequest, RegistrationResponse, RenewalResponse,
    SettingResponse, SettingValueRequest, SettingsUpdatedResponse, SignRequest, StatusResponse,
    SuccessResponse, UpdateResponse, FeeExemptionResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// `settings` and `settings_repository` normally point at the same caching
/// resolver, so writes through the repository invalidate the cache.
#[derive(Clone)]
pub struct VerbandAppState {
    pub store: Arc<dyn VerbandStore>,
    pub reader: Arc<dyn MembershipReader>,
    pub settings: Arc<dyn SettingsResolver>,
    pub settings_repository: Arc<dyn SettingsRepository>,
    pub dojo_stats: Arc<dyn DojoStatsProvider>,
    pub audit: Arc<AuditTrail>,
    pub session_validator: Arc<dyn SessionValidator>,
    /// Take the client address from `X-Forwarded-For`.
    pub trusted_proxy: TrustedProxy,
}

impl FromRef<VerbandAppState> for TrustedProxy {
    fn from_ref(state: &VerbandAppState) -> Self {
        state.trusted_proxy
    }
}

impl VerbandAppState {
    /// Create handlers on demand from the shared state.
    pub fn register_handler(&self) -> RegisterMembershipHandler {
        RegisterMembershipHandler::new(self.store.clone(), self.settings.clone(), self.audit.clone())
    }

    pub fn sign_handler(&self) -> SignMembershipHandler {
        SignMembershipHandler::new(self.store.clone(), self.audit.clone())
    }

    pub fn renew_handler(&self) -> RenewMembershipHandler {
        RenewMembershipHandler::new(self.store.clone(), self.settings.clone(), self.audit.clone())
    }

    pub fn fee_exemption_handler(&self) -> SetFeeExemptionHandler {
        SetFeeExemptionHandler::new(self.store.clone(), self.settings.clone(), self.audit.clone())
    }

    pub fn cancel_handler(&self) -> CancelMembershipHandler {
        CancelMembershipHandler::new(self.store.clone(), self.audit.clone())
    }

    pub fn confirm_payment_handler(&self) -> ConfirmPaymentHandler {
        ConfirmPaymentHandler::new(self.store.clone(), self.audit.clone())
    }

    pub fn update_handler(&self) -> UpdateMembershipHandler {
        UpdateMembershipHandler::new(self.store.clone(), self.audit.clone())
    }

    pub fn invoice_number_handler(&self) -> IssueInvoiceNumberHandler {
        IssueInvoiceNumberHandler::new(self.store.clone())
    }

    pub fn issue_mandate_handler(&self) -> IssueMandateHandler {
        IssueMandateHandler::new(self.store.clone(), self.audit.clone())
    }

    pub fn revoke_mandate_handler(&self) -> RevokeMandateHandler {
        RevokeMandateHandler::new(self.store.clone(), self.audit.clone())
    }

    pub fn get_membership_handler(&self) -> GetMembershipHandler {
        GetMembershipHandler::new(self.reader.clone(), self.dojo_stats.clone())
    }

    pub fn list_handler(&self) -> ListMembershipsHandler {
        ListMembershipsHandler::new(self.reader.clone())
    }

    pub fn records_handler(&self) -> MembershipRecordsHandler {
        MembershipRecordsHandler::new(self.reader.clone())
    }

    pub fn public_config_handler(&self) -> GetPublicConfigHandler {
        GetPublicConfigHandler::new(self.settings.clone())
    }

    pub fn list_settings_handler(&self) -> ListSettingsHandler {
        ListSettingsHandler::new(self.settings_repository.clone())
    }

    pub fn update_settings_handler(&self) -> UpdateSettingsHandler {
        UpdateSettingsHandler::new(self.settings_repository.clone())
    }
}

fn admin(user: &AuthenticatedUser, ip: Option<String>) -> Actor {
    Actor::from_user(user, ip)
}

fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    ApiError: From<T::Err>,
{
    Ok(raw.parse::<T>()?)
}

// ════════════════════════════════════════════════════════════════════════════════
// Public endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /public/anmeldung - Self-registration
pub async fn register_public(
    State(state): State<VerbandAppState>,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<RegistrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .register_handler()
        .handle(request.into_command(Actor::public(ip)))
        .await?;
    Ok(Json(RegistrationResponse::from(&result)))
}

/// GET /public/config - Prices and terms for the registration form
pub async fn get_public_config(State(state): State<VerbandAppState>) -> impl IntoResponse {
    Json(state.public_config_handler().handle().await)
}

// ════════════════════════════════════════════════════════════════════════════════
// Membership endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST / - Administrative registration
pub async fn register_admin(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<RegistrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .register_handler()
        .handle(request.into_command(admin(&user, ip)))
        .await?;
    Ok((StatusCode::CREATED, Json(RegistrationResponse::from(&result))))
}

/// GET / - List memberships
pub async fn list_memberships(
    State(state): State<VerbandAppState>,
    RequireAuth(_user): RequireAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = MembershipFilter::new(params.typ, params.status, params.limit)?;
    let memberships = state
        .list_handler()
        .handle(ListMembershipsQuery { filter })
        .await?;

    Ok(Json(MembershipListResponse {
        success: true,
        mitgliedschaften: memberships.iter().map(MembershipResponse::from).collect(),
    }))
}

/// GET /:id - Membership with history and dojo statistics
pub async fn get_membership(
    State(state): State<VerbandAppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let membership_id: MembershipId = parse_id(&id)?;
    let result = state
        .get_membership_handler()
        .handle(GetMembershipQuery { membership_id })
        .await?;

    Ok(Json(MembershipDetailResponse {
        success: true,
        mitgliedschaft: MembershipResponse::from(&result.membership),
        historie: result.history,
        dojo_stats: result.dojo_stats,
    }))
}

/// PUT /:id - Partial administrative update
pub async fn update_membership(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<MembershipUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .update_handler()
        .handle(UpdateMembershipCommand {
            membership_id: parse_id(&id)?,
            update,
            actor: admin(&user, ip),
        })
        .await?;

    Ok(Json(UpdateResponse {
        success: true,
        geaenderte_felder: result.changed_fields,
    }))
}

/// POST /:id/beitragsfrei - Toggle fee exemption
pub async fn set_fee_exemption(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<FeeExemptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .fee_exemption_handler()
        .handle(SetFeeExemptionCommand {
            membership_id: parse_id(&id)?,
            beitragsfrei: request.beitragsfrei,
            actor: admin(&user, ip),
        })
        .await?;

    let message = if request.beitragsfrei {
        "Mitgliedschaft ist beitragsfrei"
    } else {
        "Beitragsfreiheit aufgehoben"
    };
    Ok(Json(FeeExemptionResponse {
        success: true,
        message: message.to_string(),
        storniert: result.storniert,
    }))
}

/// POST /:id/verlaengern - Renew for one contract term
pub async fn renew_membership(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .renew_handler()
        .handle(RenewMembershipCommand {
            membership_id: parse_id(&id)?,
            actor: admin(&user, ip),
        })
        .await?;
    Ok(Json(RenewalResponse::from(&result)))
}

/// DELETE /:id - Cancel (the record is kept)
pub async fn cancel_membership(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<CancelParams>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .cancel_handler()
        .handle(CancelMembershipCommand {
            membership_id: parse_id(&id)?,
            grund: params.grund,
            actor: admin(&user, ip),
        })
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /:id/unterschreiben - Capture consent and signature
pub async fn sign_membership(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<SignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .sign_handler()
        .handle(SignMembershipCommand {
            membership_id: parse_id(&id)?,
            consent: Consent::new(request.agb_akzeptiert, request.datenschutz_akzeptiert),
            unterschrift: request.unterschrift_digital,
            actor: admin(&user, ip),
        })
        .await?;

    Ok(Json(StatusResponse {
        success: true,
        status: result.membership.status,
    }))
}

/// GET /:id/historie - Audit trail, newest first
pub async fn list_history(
    State(state): State<VerbandAppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let query = MembershipRecordsQuery {
        membership_id: parse_id(&id)?,
    };
    Ok(Json(state.records_handler().history(query).await?))
}

// ════════════════════════════════════════════════════════════════════════════════
// Payment endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /:id/zahlungen - Payments, latest billing period first
pub async fn list_payments(
    State(state): State<VerbandAppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let query = MembershipRecordsQuery {
        membership_id: parse_id(&id)?,
    };
    Ok(Json(state.records_handler().payments(query).await?))
}

/// POST /rechnungsnummern - Reserve an invoice number for a manual invoice
pub async fn issue_invoice_number(
    State(state): State<VerbandAppState>,
    RequireAuth(_user): RequireAuth,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: InvoiceNumberRequest = optional_body(&body)?;
    let number = state
        .invoice_number_handler()
        .handle(IssueInvoiceNumberCommand {
            datum: request.datum,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceNumberResponse {
            success: true,
            rechnungsnummer: number,
        }),
    ))
}

/// POST /zahlungen/:zahlungs_id/bezahlt - Confirm a payment
pub async fn confirm_payment(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(zahlungs_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = parse_id(&zahlungs_id)?;
    let request: ConfirmPaymentRequest = optional_body(&body)?;
    let result = state
        .confirm_payment_handler()
        .handle(ConfirmPaymentCommand {
            payment_id,
            zahlungsart: request.zahlungsart,
            transaktions_id: request.transaktions_id,
            actor: admin(&user, ip),
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "rechnungsnummer": result.payment.rechnungsnummer,
        "status": result.membership.status,
    })))
}

// ════════════════════════════════════════════════════════════════════════════════
// SEPA endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /:id/sepa - Mandates, newest first
pub async fn list_mandates(
    State(state): State<VerbandAppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let query = MembershipRecordsQuery {
        membership_id: parse_id(&id)?,
    };
    Ok(Json(state.records_handler().mandates(query).await?))
}

/// POST /:id/sepa - Issue a mandate, revoking the previous one
pub async fn issue_mandate(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<MandateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .issue_mandate_handler()
        .handle(IssueMandateCommand {
            membership_id: parse_id(&id)?,
            details: request.details,
            unterschrieben_von: request.unterschrieben_von,
            actor: admin(&user, ip),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MandateIssuedResponse {
            success: true,
            mandatsreferenz: result.mandate.mandatsreferenz,
            widerrufen: result.revoked,
        }),
    ))
}

/// DELETE /sepa/:sepa_id - Revoke a mandate
pub async fn revoke_mandate(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(sepa_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mandate_id: MandateId = parse_id(&sepa_id)?;
    state
        .revoke_mandate_handler()
        .handle(RevokeMandateCommand {
            mandate_id,
            actor: admin(&user, ip),
        })
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Settings endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /einstellungen - All settings
pub async fn list_settings(
    State(state): State<VerbandAppState>,
    RequireAuth(_user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.list_settings_handler().handle().await?;
    let body: Vec<SettingResponse> = settings.into_iter().map(SettingResponse::from).collect();
    Ok(Json(body))
}

/// PUT /einstellungen - Bulk update, all or nothing
pub async fn update_settings(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(request): ApiJson<BulkSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let values = request
        .einstellungen
        .into_iter()
        .map(|entry| (entry.schluessel, entry.wert))
        .collect();
    let keys = state
        .update_settings_handler()
        .handle(UpdateSettingsCommand { values })
        .await?;

    tracing::info!(user_id = %user.id, count = keys.len(), "Settings changed by admin");
    Ok(Json(SettingsUpdatedResponse {
        success: true,
        aktualisiert: keys,
    }))
}

/// PUT /einstellungen/:key - Single update
pub async fn update_setting(
    State(state): State<VerbandAppState>,
    RequireAuth(user): RequireAuth,
    Path(key): Path<String>,
    ApiJson(request): ApiJson<SettingValueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keys = state
        .update_settings_handler()
        .handle(UpdateSettingsCommand {
            values: vec![(key, request.wert)],
        })
        .await?;

    tracing::info!(user_id = %user.id, "Setting changed by admin");
    Ok(Json(SettingsUpdatedResponse {
        success: true,
        aktualisiert: keys,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Health
// ════════════════════════════════════════════════════════════════════════════════

/// GET /health - Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
