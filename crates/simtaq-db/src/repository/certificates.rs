//! Certificate templates, signers, award recipients and issued certificates.

use chrono::NaiveDate;
use simtaq_common::models::certificate::{
    AwardRecipient, AwardRecipientDetail, AwardRecipientRequest, Certificate, CertificateKind,
    CertificateSigner, CertificateTemplate, SignerPosition, SignerRequest, certificate_number,
    certificate_number_prefix,
};
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

pub struct NewTemplate<'a> {
    pub id: Uuid,
    pub nama: &'a str,
    pub filename: &'a str,
    pub file_path: &'a str,
    pub width: i32,
    pub height: i32,
    pub uploaded_by: Uuid,
}

/// Store a template and make it the only active one.
pub async fn create_template(pool: &PgPool, t: NewTemplate<'_>) -> Result<CertificateTemplate, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE certificate_templates SET is_active = FALSE WHERE is_active")
        .execute(&mut *tx)
        .await?;
    let template = sqlx::query_as::<_, CertificateTemplate>(
        r#"
        INSERT INTO certificate_templates (id, nama, filename, file_path, width, height, is_active, uploaded_by, uploaded_at)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, NOW())
        RETURNING *
        "#,
    )
    .bind(t.id)
    .bind(t.nama)
    .bind(t.filename)
    .bind(t.file_path)
    .bind(t.width)
    .bind(t.height)
    .bind(t.uploaded_by)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(template)
}

pub async fn list_templates(pool: &PgPool) -> Result<Vec<CertificateTemplate>, sqlx::Error> {
    sqlx::query_as::<_, CertificateTemplate>(
        "SELECT * FROM certificate_templates ORDER BY uploaded_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_template(pool: &PgPool, id: Uuid) -> Result<Option<CertificateTemplate>, sqlx::Error> {
    sqlx::query_as::<_, CertificateTemplate>("SELECT * FROM certificate_templates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn active_template(pool: &PgPool) -> Result<Option<CertificateTemplate>, sqlx::Error> {
    sqlx::query_as::<_, CertificateTemplate>(
        "SELECT * FROM certificate_templates WHERE is_active LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

pub async fn activate_template(pool: &PgPool, id: Uuid) -> Result<Option<CertificateTemplate>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE certificate_templates SET is_active = FALSE WHERE is_active AND id <> $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let template = sqlx::query_as::<_, CertificateTemplate>(
        "UPDATE certificate_templates SET is_active = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    if template.is_some() {
        tx.commit().await?;
    } else {
        tx.rollback().await?;
    }
    Ok(template)
}

pub async fn delete_template(pool: &PgPool, id: Uuid) -> Result<Option<CertificateTemplate>, sqlx::Error> {
    sqlx::query_as::<_, CertificateTemplate>("DELETE FROM certificate_templates WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await
}

// ---------------------------------------------------------------------------
// Signers
// ---------------------------------------------------------------------------

pub async fn list_signers(pool: &PgPool) -> Result<Vec<CertificateSigner>, sqlx::Error> {
    sqlx::query_as::<_, CertificateSigner>("SELECT * FROM certificate_signers ORDER BY posisi DESC")
        .fetch_all(pool)
        .await
}

pub async fn upsert_signer(pool: &PgPool, id: Uuid, req: &SignerRequest) -> Result<CertificateSigner, sqlx::Error> {
    sqlx::query_as::<_, CertificateSigner>(
        r#"
        INSERT INTO certificate_signers (id, posisi, jabatan, nama, nip, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (posisi) DO UPDATE SET
            jabatan = EXCLUDED.jabatan,
            nama = EXCLUDED.nama,
            nip = EXCLUDED.nip,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.posisi)
    .bind(req.jabatan.trim())
    .bind(req.nama.trim())
    .bind(req.nip.as_deref())
    .fetch_one(pool)
    .await
}

pub async fn set_signer_ttd(
    pool: &PgPool,
    posisi: SignerPosition,
    ttd_path: &str,
) -> Result<Option<CertificateSigner>, sqlx::Error> {
    sqlx::query_as::<_, CertificateSigner>(
        "UPDATE certificate_signers SET ttd_path = $2, updated_at = NOW() WHERE posisi = $1 RETURNING *",
    )
    .bind(posisi)
    .bind(ttd_path)
    .fetch_optional(pool)
    .await
}

// ---------------------------------------------------------------------------
// Award recipients
// ---------------------------------------------------------------------------

const AWARD_SELECT: &str = r#"
    SELECT a.*, u.name AS siswa_nama, s.nis AS siswa_nis, k.nama AS kelas_nama,
           c.certificate_number
    FROM award_recipients a
    JOIN siswa s ON s.id = a.siswa_id
    JOIN users u ON u.id = s.user_id
    LEFT JOIN kelas k ON k.id = s.kelas_id
    LEFT JOIN certificates c ON c.award_recipient_id = a.id
"#;

pub async fn create_award(pool: &PgPool, id: Uuid, req: &AwardRecipientRequest) -> Result<AwardRecipient, sqlx::Error> {
    sqlx::query_as::<_, AwardRecipient>(
        r#"
        INSERT INTO award_recipients (id, siswa_id, event_name, event_date, kategori, capaian, source_tasmi_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.siswa_id)
    .bind(req.event_name.trim())
    .bind(req.event_date)
    .bind(req.kategori.trim())
    .bind(req.capaian.as_deref())
    .bind(req.source_tasmi_id)
    .fetch_one(pool)
    .await
}

pub async fn update_award(
    pool: &PgPool,
    id: Uuid,
    req: &AwardRecipientRequest,
) -> Result<Option<AwardRecipient>, sqlx::Error> {
    sqlx::query_as::<_, AwardRecipient>(
        r#"
        UPDATE award_recipients SET
            siswa_id = $2, event_name = $3, event_date = $4, kategori = $5, capaian = $6, source_tasmi_id = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.siswa_id)
    .bind(req.event_name.trim())
    .bind(req.event_date)
    .bind(req.kategori.trim())
    .bind(req.capaian.as_deref())
    .bind(req.source_tasmi_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_awards(pool: &PgPool, event_name: Option<&str>) -> Result<Vec<AwardRecipientDetail>, sqlx::Error> {
    sqlx::query_as::<_, AwardRecipientDetail>(&format!(
        "{AWARD_SELECT} WHERE ($1::text IS NULL OR a.event_name = $1) ORDER BY a.event_date DESC, a.kategori, u.name"
    ))
    .bind(event_name)
    .fetch_all(pool)
    .await
}

pub async fn find_award(pool: &PgPool, id: Uuid) -> Result<Option<AwardRecipientDetail>, sqlx::Error> {
    sqlx::query_as::<_, AwardRecipientDetail>(&format!("{AWARD_SELECT} WHERE a.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_award(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM award_recipients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Issued certificates
// ---------------------------------------------------------------------------

pub struct NewCertificate {
    pub id: Uuid,
    pub kind: CertificateKind,
    pub siswa_id: Uuid,
    pub tasmi_id: Option<Uuid>,
    pub award_recipient_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub generated_by: Uuid,
}

/// The certificate already issued for a tasmi' or award, if any.
pub async fn find_issued(
    pool: &PgPool,
    tasmi_id: Option<Uuid>,
    award_recipient_id: Option<Uuid>,
) -> Result<Option<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>(
        r#"
        SELECT * FROM certificates
        WHERE ($1::uuid IS NOT NULL AND tasmi_id = $1)
           OR ($2::uuid IS NOT NULL AND award_recipient_id = $2)
        LIMIT 1
        "#,
    )
    .bind(tasmi_id)
    .bind(award_recipient_id)
    .fetch_optional(pool)
    .await
}

/// Issue a certificate with the next number of the day. The count and the
/// insert share a transaction holding an advisory lock per kind.
pub async fn issue(pool: &PgPool, c: NewCertificate, today: NaiveDate) -> Result<Certificate, sqlx::Error> {
    let prefix = certificate_number_prefix(c.kind, today);
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(&prefix)
        .execute(&mut *tx)
        .await?;

    let (issued_today,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM certificates WHERE certificate_number LIKE $1 || '%'")
            .bind(&prefix)
            .fetch_one(&mut *tx)
            .await?;
    let number = certificate_number(c.kind, today, issued_today + 1);

    let certificate = sqlx::query_as::<_, Certificate>(
        r#"
        INSERT INTO certificates (id, kind, certificate_number, siswa_id, tasmi_id, award_recipient_id,
                                  template_id, generated_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        RETURNING *
        "#,
    )
    .bind(c.id)
    .bind(c.kind)
    .bind(&number)
    .bind(c.siswa_id)
    .bind(c.tasmi_id)
    .bind(c.award_recipient_id)
    .bind(c.template_id)
    .bind(c.generated_by)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(certificate)
}

pub async fn find_certificate(pool: &PgPool, id: Uuid) -> Result<Option<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_certificates(
    pool: &PgPool,
    kind: Option<CertificateKind>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>(
        r#"
        SELECT * FROM certificates
        WHERE ($1::text IS NULL OR kind = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(kind)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_certificates(pool: &PgPool, kind: Option<CertificateKind>) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM certificates WHERE ($1::text IS NULL OR kind = $1)")
        .bind(kind)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
