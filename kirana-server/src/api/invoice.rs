//! Invoice endpoints: generation and the authenticated download proxy

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::Redirect,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::invoice::Invoice;
use uuid::Uuid;

use super::{ApiResult, AppJson};
use crate::auth::{AuthContext, org_id};
use crate::db::{orders, organizations};
use crate::invoice::{InvoiceOptions, generate_invoice as compute_invoice};
use crate::objectstore::pdf::render_invoice_pdf;
use crate::state::AppState;

/// POST /api/generate-invoice
#[derive(Debug, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub order_id: Uuid,
    /// Defaults to the business profile's rate (18% when unset)
    pub tax_rate_percent: Option<f64>,
    #[serde(default)]
    pub is_interstate: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateInvoiceResponse {
    pub order_id: Uuid,
    pub invoice: Invoice,
    /// Authenticated proxy route; the signed blob URL is minted there
    pub download_url: String,
}

pub async fn generate_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<GenerateInvoiceRequest>,
) -> ApiResult<GenerateInvoiceResponse> {
    let org = org_id(&auth)?;

    let profile = organizations::get_business_profile(&state.pool, org)
        .await
        .map_err(AppError::from)?;

    let (business_name, gst_number, profile_rate) = match profile {
        Some(p) => (p.business_name, p.gst_number, Some(p.tax_rate_percent)),
        None => (
            state.config.default_business_name.clone(),
            state.config.default_gst_number.clone(),
            None,
        ),
    };

    let tax_rate_percent = req
        .tax_rate_percent
        .and_then(Decimal::from_f64)
        .or(profile_rate)
        .unwrap_or(Decimal::from(18));

    // An order can hold a sequence without an invoice snapshot (rows from
    // before snapshots were stored). Recompute under the existing sequence
    // and attach; no new number is allocated.
    let existing = orders::get(&state.pool, org, req.order_id)
        .await
        .map_err(AppError::from)?;
    if let (Some(sequence), None) = (existing.invoice_sequence, &existing.invoice) {
        let invoice = compute_invoice(
            &existing,
            &InvoiceOptions {
                business_name: business_name.clone(),
                gst_number: gst_number.clone(),
                invoice_sequence: sequence,
                tax_rate_percent,
                is_interstate: req.is_interstate,
            },
        )?;
        orders::attach_invoice(&state.pool, org, existing.id, &invoice, sequence)
            .await
            .map_err(AppError::from)?;
        return finish(&state, existing.id, invoice).await;
    }

    let (order, invoice) = orders::generate_and_attach_invoice(
        &state.pool,
        org,
        req.order_id,
        |order, sequence| {
            compute_invoice(
                order,
                &InvoiceOptions {
                    business_name: business_name.clone(),
                    gst_number: gst_number.clone(),
                    invoice_sequence: sequence,
                    tax_rate_percent,
                    is_interstate: req.is_interstate,
                },
            )
        },
    )
    .await
    .map_err(AppError::from)?;

    finish(&state, order.id, invoice).await
}

/// Upload the PDF (best-effort; the invoice is already committed) and
/// shape the response with the authenticated download pointer.
async fn finish(
    state: &AppState,
    order_id: Uuid,
    invoice: Invoice,
) -> ApiResult<GenerateInvoiceResponse> {
    let pdf = render_invoice_pdf(&invoice);
    if let Err(e) = state
        .store
        .upload_invoice_pdf(&invoice.invoice_number, pdf)
        .await
    {
        tracing::warn!(
            invoice_number = %invoice.invoice_number,
            "Invoice PDF upload failed: {e}"
        );
    }

    Ok(Json(GenerateInvoiceResponse {
        order_id,
        invoice,
        download_url: format!("/api/orders/{order_id}/download"),
    }))
}

/// GET /api/orders/:id/download
///
/// Verifies the caller's org owns the order and an invoice exists, then
/// redirects to a short-TTL signed URL. The blob URL itself is never part
/// of any API payload.
pub async fn download_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let org = org_id(&auth)?;

    let order = orders::get(&state.pool, org, id)
        .await
        .map_err(AppError::from)?;
    let invoice = order
        .invoice
        .as_ref()
        .ok_or_else(|| AppError::new(ErrorCode::InvoiceMissing))?;

    let url = state.store.presign_download(&invoice.invoice_number).await?;
    Ok(Redirect::temporary(&url))
}
