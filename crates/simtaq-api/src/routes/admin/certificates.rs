//! Certificate administration: background templates, signers, award
//! recipients, and the PDFs themselves.
//!
//! Issuing is idempotent per tasmi' or award: the first print records a
//! numbered row in `certificates`, later prints reuse it.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use printpdf::image_crate::{self, GenericImageView};
use serde::Deserialize;
use simtaq_common::{
    config,
    error::{SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        activity::ActivityAction,
        certificate::{
            AwardRecipient, AwardRecipientDetail, AwardRecipientRequest, Certificate, CertificateKind,
            CertificateSigner, CertificateTemplate, SignerPosition, SignerRequest,
        },
        tasmi::TasmiDetail,
        Pagination,
    },
    validation::{page_params, validate_request},
};
use simtaq_db::repository::{
    certificates::{self, NewCertificate, NewTemplate},
    siswa, tasmi,
};
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use super::Paged;
use crate::{
    activity,
    certificate::{render_batch_pdf, render_pdf, CertificateData, PaperSize, SignerBlock},
    middleware::{AuthContext, ClientInfo},
    routes::uploads,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/certificates/templates", get(list_templates).post(upload_template))
        .route("/admin/certificates/templates/{id}", axum::routing::delete(delete_template))
        .route("/admin/certificates/templates/{id}/activate", patch(activate_template))
        .route("/admin/certificates/signers", get(list_signers).put(save_signer))
        .route("/admin/certificates/signers/{posisi}/ttd", post(upload_signer_ttd))
        .route("/admin/certificates/awards", get(list_awards).post(create_award))
        .route("/admin/certificates/awards/{id}", put(update_award).delete(delete_award))
        .route("/admin/certificates/awards/{id}/pdf", post(print_award))
        .route("/admin/certificates/tasmi", get(list_passed_tasmi))
        .route("/admin/certificates/tasmi/{id}/pdf", post(print_tasmi))
        .route("/admin/certificates/tasmi/bulk", post(bulk_tasmi))
        .route("/admin/certificates/awards/bulk", post(bulk_awards))
        .route("/admin/certificates/issued", get(list_issued))
        .route("/admin/certificates/issued/{id}/pdf", get(download_issued))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// GET /api/admin/certificates/templates
async fn list_templates(State(state): State<Arc<AppState>>) -> SimtaqResult<Json<Vec<CertificateTemplate>>> {
    Ok(Json(certificates::list_templates(&state.db.pg).await?))
}

/// Pixel size of an uploaded image, decoded off the async runtime.
async fn image_dimensions(bytes: Vec<u8>) -> SimtaqResult<(u32, u32)> {
    tokio::task::spawn_blocking(move || image_crate::load_from_memory(&bytes).map(|img| img.dimensions()))
        .await
        .map_err(SimtaqError::internal)?
        .map_err(|_| SimtaqError::validation("File gambar tidak dapat dibaca"))
}

/// POST /api/admin/certificates/templates (multipart: `file`, optional `nama`)
///
/// The new template becomes the active one.
async fn upload_template(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    multipart: Multipart,
) -> SimtaqResult<(StatusCode, Json<CertificateTemplate>)> {
    let form = uploads::read_image_form(multipart, &state.storage).await?;
    let (width, height) = image_dimensions(form.image.bytes.clone()).await?;

    let id = generate_id();
    let key = format!("templates/template_{id}.{}", form.image.extension());
    let stored = uploads::store(&state.storage, &key, &form.image.bytes).await?;
    let nama = form.field("nama").unwrap_or(&form.image.filename).to_string();

    let template = certificates::create_template(
        &state.db.pg,
        NewTemplate {
            id,
            nama: &nama,
            filename: &form.image.filename,
            file_path: &stored.public_url,
            width: width as i32,
            height: height as i32,
            uploaded_by: ctx.user_id,
        },
    )
    .await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUploadTemplate, "Mengunggah template sertifikat")
            .description(nama)
            .metadata(serde_json::json!({ "templateId": id, "width": width, "height": height })),
    );
    tracing::info!(template_id = %id, width, height, size = stored.size, "Certificate template uploaded");

    Ok((StatusCode::CREATED, Json(template)))
}

/// PATCH /api/admin/certificates/templates/{id}/activate
async fn activate_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<CertificateTemplate>> {
    let template = certificates::activate_template(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Template"))?;
    Ok(Json(template))
}

/// DELETE /api/admin/certificates/templates/{id}
async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let removed = certificates::delete_template(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Template"))?;
    uploads::remove_by_url(&state.storage, Some(&removed.file_path)).await;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Signers
// ---------------------------------------------------------------------------

/// GET /api/admin/certificates/signers
async fn list_signers(State(state): State<Arc<AppState>>) -> SimtaqResult<Json<Vec<CertificateSigner>>> {
    Ok(Json(certificates::list_signers(&state.db.pg).await?))
}

/// PUT /api/admin/certificates/signers
async fn save_signer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignerRequest>,
) -> SimtaqResult<Json<CertificateSigner>> {
    validate_request(&body)?;
    Ok(Json(certificates::upsert_signer(&state.db.pg, generate_id(), &body).await?))
}

fn parse_posisi(raw: &str) -> SimtaqResult<SignerPosition> {
    match raw.to_ascii_uppercase().as_str() {
        "KIRI" => Ok(SignerPosition::Kiri),
        "KANAN" => Ok(SignerPosition::Kanan),
        _ => Err(SimtaqError::validation("Posisi penandatangan harus KIRI atau KANAN")),
    }
}

/// POST /api/admin/certificates/signers/{posisi}/ttd (multipart: `file`)
///
/// The signer must be saved first.
async fn upload_signer_ttd(
    State(state): State<Arc<AppState>>,
    Path(posisi): Path<String>,
    multipart: Multipart,
) -> SimtaqResult<Json<CertificateSigner>> {
    let posisi = parse_posisi(&posisi)?;
    let previous = certificates::list_signers(&state.db.pg)
        .await?
        .into_iter()
        .find(|s| s.posisi == posisi)
        .ok_or_else(|| SimtaqError::not_found("Penandatangan"))?;

    let form = uploads::read_image_form(multipart, &state.storage).await?;
    let key = format!(
        "signers/ttd_{}_{}.{}",
        format!("{posisi:?}").to_lowercase(),
        Utc::now().timestamp_millis(),
        form.image.extension()
    );
    let stored = uploads::store(&state.storage, &key, &form.image.bytes).await?;

    let signer = certificates::set_signer_ttd(&state.db.pg, posisi, &stored.public_url)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Penandatangan"))?;
    uploads::remove_by_url(&state.storage, previous.ttd_path.as_deref()).await;

    Ok(Json(signer))
}

// ---------------------------------------------------------------------------
// Award recipients
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AwardQuery {
    event_name: Option<String>,
}

/// GET /api/admin/certificates/awards?eventName=
async fn list_awards(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AwardQuery>,
) -> SimtaqResult<Json<Vec<AwardRecipientDetail>>> {
    let event = query.event_name.as_deref().map(str::trim).filter(|e| !e.is_empty());
    Ok(Json(certificates::list_awards(&state.db.pg, event).await?))
}

async fn check_award_student(state: &AppState, body: &AwardRecipientRequest) -> SimtaqResult<()> {
    if siswa::find_by_id(&state.db.pg, body.siswa_id).await?.is_none() {
        return Err(SimtaqError::not_found("Siswa"));
    }
    Ok(())
}

/// POST /api/admin/certificates/awards
async fn create_award(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AwardRecipientRequest>,
) -> SimtaqResult<(StatusCode, Json<AwardRecipient>)> {
    validate_request(&body)?;
    check_award_student(&state, &body).await?;
    let created = certificates::create_award(&state.db.pg, generate_id(), &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/certificates/awards/{id}
async fn update_award(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AwardRecipientRequest>,
) -> SimtaqResult<Json<AwardRecipient>> {
    validate_request(&body)?;
    check_award_student(&state, &body).await?;
    let updated = certificates::update_award(&state.db.pg, id, &body)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Penerima penghargaan"))?;
    Ok(Json(updated))
}

/// DELETE /api/admin/certificates/awards/{id}
async fn delete_award(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    if !certificates::delete_award(&state.db.pg, id).await? {
        return Err(SimtaqError::not_found("Penerima penghargaan"));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// PDFs
// ---------------------------------------------------------------------------

/// GET /api/admin/certificates/tasmi: passed tasmi' eligible for a certificate.
async fn list_passed_tasmi(State(state): State<Arc<AppState>>) -> SimtaqResult<Json<Vec<TasmiDetail>>> {
    Ok(Json(tasmi::list_passed(&state.db.pg).await?))
}

#[derive(Debug, Default, Deserialize)]
struct PrintQuery {
    #[serde(default)]
    paper: PaperSize,
}

fn tasmi_capaian(detail: &TasmiDetail) -> String {
    let mut text = format!(
        "Telah menyelesaikan Tahfidzul Qur'an Juz {}",
        detail.tasmi.juz_yang_ditasmi.trim()
    );
    if let Some(predikat) = detail.tasmi.predikat.as_deref().filter(|p| !p.is_empty()) {
        text.push_str(&format!(" dengan predikat {predikat}"));
    }
    text
}

fn award_capaian(award: &AwardRecipientDetail) -> String {
    match award.recipient.capaian.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(capaian) => capaian.to_string(),
        None => format!("{} - {}", award.recipient.kategori, award.recipient.event_name),
    }
}

async fn signer_block(state: &AppState, signer: Option<&CertificateSigner>) -> Option<SignerBlock> {
    let signer = signer?;
    let ttd = match signer.ttd_path.as_deref() {
        Some(url) => uploads::read_by_url(&state.storage, url).await,
        None => None,
    };
    Some(SignerBlock {
        jabatan: signer.jabatan.clone(),
        nama: signer.nama.clone(),
        nip: signer.nip.clone(),
        ttd,
    })
}

/// Signers, city and decoded-once template bytes shared by every page of a print.
struct PrintKit {
    kota: String,
    kiri: Option<SignerBlock>,
    kanan: Option<SignerBlock>,
    templates: HashMap<Uuid, Option<Arc<[u8]>>>,
}

impl PrintKit {
    async fn load(state: &AppState) -> SimtaqResult<Self> {
        let signers = certificates::list_signers(&state.db.pg).await?;
        let kiri = signers.iter().find(|s| s.posisi == SignerPosition::Kiri);
        let kanan = signers.iter().find(|s| s.posisi == SignerPosition::Kanan);
        Ok(Self {
            kota: config::get().school.city.clone(),
            kiri: signer_block(state, kiri).await,
            kanan: signer_block(state, kanan).await,
            templates: HashMap::new(),
        })
    }

    async fn template(&mut self, state: &AppState, id: Option<Uuid>) -> SimtaqResult<Option<Arc<[u8]>>> {
        let Some(id) = id else { return Ok(None) };
        if let Some(cached) = self.templates.get(&id) {
            return Ok(cached.clone());
        }
        let bytes: Option<Arc<[u8]>> = match certificates::find_template(&state.db.pg, id).await? {
            Some(t) => uploads::read_by_url(&state.storage, &t.file_path).await.map(Arc::from),
            None => None,
        };
        self.templates.insert(id, bytes.clone());
        Ok(bytes)
    }

    async fn page(
        &mut self,
        state: &AppState,
        certificate: &Certificate,
        nama_siswa: String,
        capaian: String,
        tanggal: NaiveDate,
    ) -> SimtaqResult<CertificateData> {
        Ok(CertificateData {
            nama_siswa,
            capaian,
            kota: self.kota.clone(),
            tanggal: Some(tanggal),
            certificate_number: Some(certificate.certificate_number.clone()),
            signer_kiri: self.kiri.clone(),
            signer_kanan: self.kanan.clone(),
            template: self.template(state, certificate.template_id).await?,
        })
    }
}

/// Collect template, signers and place for one certificate.
async fn certificate_data(
    state: &AppState,
    certificate: &Certificate,
    nama_siswa: String,
    capaian: String,
    tanggal: NaiveDate,
) -> SimtaqResult<CertificateData> {
    PrintKit::load(state)
        .await?
        .page(state, certificate, nama_siswa, capaian, tanggal)
        .await
}

fn pdf_response(bytes: Vec<u8>, certificate_number: &str) -> Response {
    let filename = format!("sertifikat_{}.pdf", certificate_number.replace('/', "_"));
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        Body::from(bytes),
    )
        .into_response()
}

/// Existing certificate for the source, or a freshly numbered one.
async fn issue_once(
    state: &AppState,
    ctx: &AuthContext,
    kind: CertificateKind,
    siswa_id: Uuid,
    tasmi_id: Option<Uuid>,
    award_recipient_id: Option<Uuid>,
) -> SimtaqResult<Certificate> {
    if let Some(existing) = certificates::find_issued(&state.db.pg, tasmi_id, award_recipient_id).await? {
        return Ok(existing);
    }
    let template_id = certificates::active_template(&state.db.pg).await?.map(|t| t.id);
    let issued = certificates::issue(
        &state.db.pg,
        NewCertificate {
            id: generate_id(),
            kind,
            siswa_id,
            tasmi_id,
            award_recipient_id,
            template_id,
            generated_by: ctx.user_id,
        },
        Utc::now().date_naive(),
    )
    .await?;
    tracing::info!(certificate = %issued.certificate_number, ?kind, "Certificate issued");
    Ok(issued)
}

async fn load_passed_tasmi(state: &AppState, id: Uuid) -> SimtaqResult<TasmiDetail> {
    let detail = tasmi::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Tasmi"))?;
    if detail.tasmi.is_passed != Some(true) {
        return Err(SimtaqError::validation("Sertifikat hanya untuk tasmi' yang lulus"));
    }
    Ok(detail)
}

/// POST /api/admin/certificates/tasmi/{id}/pdf?paper=A4|F4
async fn print_tasmi(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Query(query): Query<PrintQuery>,
) -> SimtaqResult<Response> {
    let detail = load_passed_tasmi(&state, id).await?;
    let certificate = issue_once(&state, &ctx, CertificateKind::Tasmi, detail.tasmi.siswa_id, Some(id), None).await?;

    let tanggal = detail.tasmi.tanggal_ujian.unwrap_or_else(|| certificate.created_at.date_naive());
    let data = certificate_data(&state, &certificate, detail.siswa_nama.clone(), tasmi_capaian(&detail), tanggal).await?;
    let bytes = render_pdf(data, query.paper).await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminCetakSertifikat, "Mencetak sertifikat tasmi'")
            .description(format!("{} ({})", detail.siswa_nama, certificate.certificate_number))
            .metadata(serde_json::json!({ "certificateId": certificate.id, "tasmiId": id })),
    );

    Ok(pdf_response(bytes, &certificate.certificate_number))
}

/// POST /api/admin/certificates/awards/{id}/pdf?paper=A4|F4
async fn print_award(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Query(query): Query<PrintQuery>,
) -> SimtaqResult<Response> {
    let award = certificates::find_award(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Penerima penghargaan"))?;
    let certificate = issue_once(
        &state,
        &ctx,
        CertificateKind::Award,
        award.recipient.siswa_id,
        None,
        Some(id),
    )
    .await?;

    let data = certificate_data(
        &state,
        &certificate,
        award.siswa_nama.clone(),
        award_capaian(&award),
        award.recipient.event_date,
    )
    .await?;
    let bytes = render_pdf(data, query.paper).await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminCetakSertifikat, "Mencetak sertifikat penghargaan")
            .description(format!("{} ({})", award.siswa_nama, certificate.certificate_number))
            .metadata(serde_json::json!({ "certificateId": certificate.id, "awardRecipientId": id })),
    );

    Ok(pdf_response(bytes, &certificate.certificate_number))
}

// ---------------------------------------------------------------------------
// Bulk printing
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkTasmiRequest {
    selected_ids: Option<Vec<Uuid>>,
    kelas_id: Option<Uuid>,
    tahun: Option<i32>,
    #[serde(default = "default_true")]
    skip_issued: bool,
    print_date: Option<NaiveDate>,
    #[serde(default)]
    paper: PaperSize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkAwardRequest {
    selected_ids: Option<Vec<Uuid>>,
    event_name: Option<String>,
    #[serde(default = "default_true")]
    skip_issued: bool,
    print_date: Option<NaiveDate>,
    #[serde(default)]
    paper: PaperSize,
}

/// Outcome counters of one bulk print.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BatchCounts {
    total: usize,
    success: usize,
    failed: usize,
    skipped: usize,
}

impl BatchCounts {
    /// 400 when no page survived.
    fn ensure_pages(&self) -> SimtaqResult<()> {
        if self.success > 0 {
            return Ok(());
        }
        if self.total > 0 && self.skipped == self.total {
            return Err(SimtaqError::validation("Semua sertifikat sudah terbit"));
        }
        Err(SimtaqError::validation("Tidak ada sertifikat yang dapat dicetak"))
    }
}

fn batch_response(bytes: Vec<u8>, counts: BatchCounts, filename: &str) -> Response {
    let mut response = crate::report::pdf_attachment(bytes, filename);
    let headers = response.headers_mut();
    for (name, value) in [
        ("x-total-count", counts.total),
        ("x-success-count", counts.success),
        ("x-failed-count", counts.failed),
        ("x-skipped-count", counts.skipped),
    ] {
        headers.insert(name, HeaderValue::from(value));
    }
    response
}

/// Issue then lay out one page; a failure is logged and counted by the caller.
async fn batch_page(
    state: &AppState,
    ctx: &AuthContext,
    kit: &mut PrintKit,
    source: BatchSource<'_>,
    print_date: Option<NaiveDate>,
) -> SimtaqResult<CertificateData> {
    let (certificate, nama, capaian, tanggal) = match source {
        BatchSource::Tasmi(detail) => {
            let t = &detail.tasmi;
            let certificate = issue_once(state, ctx, CertificateKind::Tasmi, t.siswa_id, Some(t.id), None).await?;
            let tanggal = t.tanggal_ujian.unwrap_or_else(|| certificate.created_at.date_naive());
            (certificate, detail.siswa_nama.clone(), tasmi_capaian(detail), tanggal)
        }
        BatchSource::Award(award) => {
            let r = &award.recipient;
            let certificate = issue_once(state, ctx, CertificateKind::Award, r.siswa_id, None, Some(r.id)).await?;
            (certificate, award.siswa_nama.clone(), award_capaian(award), r.event_date)
        }
    };
    let data = kit
        .page(state, &certificate, nama, capaian, print_date.unwrap_or(tanggal))
        .await?;
    data.validate()?;
    Ok(data)
}

enum BatchSource<'a> {
    Tasmi(&'a TasmiDetail),
    Award(&'a AwardRecipientDetail),
}

/// POST /api/admin/certificates/tasmi/bulk
async fn bulk_tasmi(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<BulkTasmiRequest>,
) -> SimtaqResult<Response> {
    let filter = tasmi::ResultFilter {
        kelas_id: body.kelas_id,
        tahun: body.tahun,
        ids: body.selected_ids.as_deref().filter(|ids| !ids.is_empty()),
        ..Default::default()
    };
    let rows = tasmi::list_for_certificates(&state.db.pg, &filter).await?;

    let mut counts = BatchCounts { total: rows.len(), ..Default::default() };
    let mut kit = PrintKit::load(&state).await?;
    let mut pages = Vec::new();
    for row in &rows {
        if body.skip_issued && row.certificate_id.is_some() {
            counts.skipped += 1;
            continue;
        }
        match batch_page(&state, &ctx, &mut kit, BatchSource::Tasmi(&row.detail), body.print_date).await {
            Ok(page) => {
                pages.push(page);
                counts.success += 1;
            }
            Err(e) => {
                tracing::warn!(tasmi_id = %row.detail.tasmi.id, "Bulk certificate failed: {e}");
                counts.failed += 1;
            }
        }
    }
    counts.ensure_pages()?;

    let bytes = render_batch_pdf(pages, body.paper).await?;
    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminCetakSertifikat, "Mencetak sertifikat tasmi' massal")
            .description(format!("{} sertifikat", counts.success))
            .metadata(serde_json::json!({
                "total": counts.total,
                "success": counts.success,
                "failed": counts.failed,
                "skipped": counts.skipped,
            })),
    );
    tracing::info!(?counts, "Bulk tasmi' certificates rendered");

    let filename = format!("sertifikat_tasmi_{}.pdf", Utc::now().format("%Y%m%d_%H%M%S"));
    Ok(batch_response(bytes, counts, &filename))
}

/// POST /api/admin/certificates/awards/bulk
async fn bulk_awards(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<BulkAwardRequest>,
) -> SimtaqResult<Response> {
    let event = body.event_name.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let mut rows = certificates::list_awards(&state.db.pg, event).await?;
    if let Some(ids) = body.selected_ids.as_deref().filter(|ids| !ids.is_empty()) {
        rows.retain(|a| ids.contains(&a.recipient.id));
    }

    let mut counts = BatchCounts { total: rows.len(), ..Default::default() };
    let mut kit = PrintKit::load(&state).await?;
    let mut pages = Vec::new();
    for award in &rows {
        if body.skip_issued && award.certificate_number.is_some() {
            counts.skipped += 1;
            continue;
        }
        match batch_page(&state, &ctx, &mut kit, BatchSource::Award(award), body.print_date).await {
            Ok(page) => {
                pages.push(page);
                counts.success += 1;
            }
            Err(e) => {
                tracing::warn!(award_recipient_id = %award.recipient.id, "Bulk certificate failed: {e}");
                counts.failed += 1;
            }
        }
    }
    counts.ensure_pages()?;

    let bytes = render_batch_pdf(pages, body.paper).await?;
    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminCetakSertifikat, "Mencetak sertifikat penghargaan massal")
            .description(format!("{} sertifikat", counts.success))
            .metadata(serde_json::json!({
                "eventName": event,
                "total": counts.total,
                "success": counts.success,
                "failed": counts.failed,
                "skipped": counts.skipped,
            })),
    );
    tracing::info!(?counts, "Bulk award certificates rendered");

    let filename = format!("sertifikat_penghargaan_{}.pdf", Utc::now().format("%Y%m%d_%H%M%S"));
    Ok(batch_response(bytes, counts, &filename))
}

#[derive(Debug, Deserialize)]
struct IssuedQuery {
    page: Option<i64>,
    limit: Option<i64>,
    kind: Option<CertificateKind>,
}

/// GET /api/admin/certificates/issued?kind=TASMI|AWARD
async fn list_issued(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IssuedQuery>,
) -> SimtaqResult<Json<Paged<Certificate>>> {
    let (page, limit) = page_params(query.page, query.limit, 20);
    let total = certificates::count_certificates(&state.db.pg, query.kind).await?;
    let pagination = Pagination::new(page, limit, total);
    let data = certificates::list_certificates(&state.db.pg, query.kind, limit, pagination.offset()).await?;
    Ok(Json(Paged { data, pagination }))
}

/// GET /api/admin/certificates/issued/{id}/pdf: re-render from the stored record.
async fn download_issued(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PrintQuery>,
) -> SimtaqResult<Response> {
    let certificate = certificates::find_certificate(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Sertifikat"))?;

    let (nama, capaian, tanggal) = match (certificate.tasmi_id, certificate.award_recipient_id) {
        (Some(tasmi_id), _) => {
            let detail = tasmi::find_detail(&state.db.pg, tasmi_id)
                .await?
                .ok_or_else(|| SimtaqError::not_found("Tasmi"))?;
            let tanggal = detail.tasmi.tanggal_ujian.unwrap_or_else(|| certificate.created_at.date_naive());
            (detail.siswa_nama.clone(), tasmi_capaian(&detail), tanggal)
        }
        (None, Some(award_id)) => {
            let award = certificates::find_award(&state.db.pg, award_id)
                .await?
                .ok_or_else(|| SimtaqError::not_found("Penerima penghargaan"))?;
            (award.siswa_nama.clone(), award_capaian(&award), award.recipient.event_date)
        }
        (None, None) => return Err(SimtaqError::not_found("Sumber sertifikat")),
    };

    let data = certificate_data(&state, &certificate, nama, capaian, tanggal).await?;
    let bytes = render_pdf(data, query.paper).await?;
    Ok(pdf_response(bytes, &certificate.certificate_number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signer_position_from_path() {
        assert_eq!(parse_posisi("kiri").unwrap(), SignerPosition::Kiri);
        assert_eq!(parse_posisi("KANAN").unwrap(), SignerPosition::Kanan);
        assert!(parse_posisi("tengah").is_err());
    }

    #[test]
    fn pdf_headers() {
        let response = pdf_response(vec![b'%'], "CERT/TASMI/20250603/0001");
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"sertifikat_CERT_TASMI_20250603_0001.pdf\""
        );
    }

    #[test]
    fn paper_defaults_to_a4() {
        assert_eq!(PrintQuery::default().paper, PaperSize::A4);
    }

    #[test]
    fn bulk_defaults_skip_issued() {
        let body: BulkTasmiRequest = serde_json::from_str(r#"{"kelasId": null}"#).unwrap();
        assert!(body.skip_issued);
        assert_eq!(body.paper, PaperSize::A4);
        let body: BulkAwardRequest = serde_json::from_str(r#"{"skipIssued": false, "paper": "F4"}"#).unwrap();
        assert!(!body.skip_issued);
        assert_eq!(body.paper, PaperSize::F4);
    }

    #[test]
    fn empty_batches_are_rejected() {
        let all_skipped = BatchCounts { total: 3, skipped: 3, ..Default::default() };
        match all_skipped.ensure_pages() {
            Err(SimtaqError::Validation { message, .. }) => assert_eq!(message, "Semua sertifikat sudah terbit"),
            other => panic!("unexpected {other:?}"),
        }
        let all_failed = BatchCounts { total: 2, failed: 2, ..Default::default() };
        assert!(all_failed.ensure_pages().is_err());
        assert!(BatchCounts::default().ensure_pages().is_err());
        let partial = BatchCounts { total: 3, success: 1, failed: 1, skipped: 1 };
        assert!(partial.ensure_pages().is_ok());
    }

    #[test]
    fn batch_headers_carry_counts() {
        let counts = BatchCounts { total: 4, success: 2, failed: 1, skipped: 1 };
        let response = batch_response(vec![b'%'], counts, "sertifikat_tasmi.pdf");
        let headers = response.headers();
        assert_eq!(headers["x-total-count"], "4");
        assert_eq!(headers["x-success-count"], "2");
        assert_eq!(headers["x-failed-count"], "1");
        assert_eq!(headers["x-skipped-count"], "1");
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    }
}
