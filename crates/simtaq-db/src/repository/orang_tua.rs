//! Parent repository and the parent-student link table.

use simtaq_common::models::people::{JenisKelamin, LinkedChild, OrangTua, OrangTuaDetail};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::postgres::like_pattern;

const DETAIL_SELECT: &str = r#"
    SELECT o.id, o.user_id, u.username, u.name, u.email, u.is_active,
           o.no_telepon, o.pekerjaan, o.alamat, o.jenis_kelamin
    FROM orang_tua o
    JOIN users u ON u.id = o.user_id
"#;

const CHILD_SELECT: &str = r#"
    SELECT l.orang_tua_id, s.id AS siswa_id, u.name, s.nis, s.nisn,
           k.nama AS kelas_nama, s.status_siswa, l.hubungan
    FROM orang_tua_siswa l
    JOIN siswa s ON s.id = l.siswa_id
    JOIN users u ON u.id = s.user_id
    LEFT JOIN kelas k ON k.id = s.kelas_id
"#;

#[derive(Debug, Clone)]
pub struct OrangTuaFields<'a> {
    pub no_telepon: Option<&'a str>,
    pub pekerjaan: Option<&'a str>,
    pub alamat: Option<&'a str>,
    pub jenis_kelamin: Option<JenisKelamin>,
}

pub async fn create(
    db: impl PgExecutor<'_>,
    id: Uuid,
    user_id: Uuid,
    fields: OrangTuaFields<'_>,
) -> Result<OrangTua, sqlx::Error> {
    sqlx::query_as::<_, OrangTua>(
        r#"
        INSERT INTO orang_tua (id, user_id, no_telepon, pekerjaan, alamat, jenis_kelamin, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(fields.no_telepon)
    .bind(fields.pekerjaan)
    .bind(fields.alamat)
    .bind(fields.jenis_kelamin)
    .fetch_one(db)
    .await
}

pub async fn update(
    db: impl PgExecutor<'_>,
    id: Uuid,
    fields: OrangTuaFields<'_>,
) -> Result<OrangTua, sqlx::Error> {
    sqlx::query_as::<_, OrangTua>(
        r#"
        UPDATE orang_tua SET
            no_telepon = COALESCE($2, no_telepon),
            pekerjaan = COALESCE($3, pekerjaan),
            alamat = COALESCE($4, alamat),
            jenis_kelamin = COALESCE($5, jenis_kelamin)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(fields.no_telepon)
    .bind(fields.pekerjaan)
    .bind(fields.alamat)
    .bind(fields.jenis_kelamin)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<OrangTua>, sqlx::Error> {
    sqlx::query_as::<_, OrangTua>("SELECT * FROM orang_tua WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_user_id(pool: &PgPool, user_id: Uuid) -> Result<Option<OrangTua>, sqlx::Error> {
    sqlx::query_as::<_, OrangTua>("SELECT * FROM orang_tua WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<OrangTuaDetail>, sqlx::Error> {
    sqlx::query_as::<_, OrangTuaDetail>(&format!("{DETAIL_SELECT} WHERE o.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &PgPool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<OrangTuaDetail>, sqlx::Error> {
    let pattern = search.filter(|s| !s.trim().is_empty()).map(like_pattern);
    sqlx::query_as::<_, OrangTuaDetail>(&format!(
        "{DETAIL_SELECT} WHERE ($1::text IS NULL OR u.name ILIKE $1 OR u.username ILIKE $1) \
         ORDER BY u.name LIMIT $2 OFFSET $3"
    ))
    .bind(pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count(pool: &PgPool, search: Option<&str>) -> Result<i64, sqlx::Error> {
    let pattern = search.filter(|s| !s.trim().is_empty()).map(like_pattern);
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM orang_tua o JOIN users u ON u.id = o.user_id
        WHERE ($1::text IS NULL OR u.name ILIKE $1 OR u.username ILIKE $1)
        "#,
    )
    .bind(pattern)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Link a child. Re-linking updates the relation label.
pub async fn link(
    db: impl PgExecutor<'_>,
    orang_tua_id: Uuid,
    siswa_id: Uuid,
    hubungan: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO orang_tua_siswa (orang_tua_id, siswa_id, hubungan, created_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (orang_tua_id, siswa_id) DO UPDATE SET hubungan = EXCLUDED.hubungan
        "#,
    )
    .bind(orang_tua_id)
    .bind(siswa_id)
    .bind(hubungan)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn unlink(
    db: impl PgExecutor<'_>,
    orang_tua_id: Uuid,
    siswa_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orang_tua_siswa WHERE orang_tua_id = $1 AND siswa_id = $2")
        .bind(orang_tua_id)
        .bind(siswa_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn children(pool: &PgPool, orang_tua_id: Uuid) -> Result<Vec<LinkedChild>, sqlx::Error> {
    sqlx::query_as::<_, LinkedChild>(&format!(
        "{CHILD_SELECT} WHERE l.orang_tua_id = $1 ORDER BY u.name"
    ))
    .bind(orang_tua_id)
    .fetch_all(pool)
    .await
}

/// Children of many parents at once, for listings.
pub async fn children_of_many(
    pool: &PgPool,
    orang_tua_ids: &[Uuid],
) -> Result<Vec<LinkedChild>, sqlx::Error> {
    sqlx::query_as::<_, LinkedChild>(&format!(
        "{CHILD_SELECT} WHERE l.orang_tua_id = ANY($1) ORDER BY u.name"
    ))
    .bind(orang_tua_ids)
    .fetch_all(pool)
    .await
}

pub async fn is_parent_of(pool: &PgPool, orang_tua_id: Uuid, siswa_id: Uuid) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM orang_tua_siswa WHERE orang_tua_id = $1 AND siswa_id = $2)",
    )
    .bind(orang_tua_id)
    .bind(siswa_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// User ids of every parent linked to a student.
pub async fn parent_user_ids(db: impl PgExecutor<'_>, siswa_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT o.user_id FROM orang_tua_siswa l
        JOIN orang_tua o ON o.id = l.orang_tua_id
        WHERE l.siswa_id = $1
        "#,
    )
    .bind(siswa_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Whether a parent user has at least one AKTIF child.
pub async fn has_active_child(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM orang_tua o
            JOIN orang_tua_siswa l ON l.orang_tua_id = o.id
            JOIN siswa s ON s.id = l.siswa_id
            WHERE o.user_id = $1 AND s.status_siswa = 'AKTIF'
        )
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(row.0)
}

/// Set every parent of a student active iff they still have an AKTIF child.
pub async fn sync_parent_activity(conn: &mut PgConnection, siswa_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users u SET
            is_active = EXISTS(
                SELECT 1 FROM orang_tua_siswa l2
                JOIN siswa s2 ON s2.id = l2.siswa_id
                WHERE l2.orang_tua_id = o.id AND s2.status_siswa = 'AKTIF'
            ),
            updated_at = NOW()
        FROM orang_tua o
        JOIN orang_tua_siswa l ON l.orang_tua_id = o.id
        WHERE l.siswa_id = $1 AND u.id = o.user_id
        "#,
    )
    .bind(siswa_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Activate every parent user linked to a student.
pub async fn activate_parents(db: impl PgExecutor<'_>, siswa_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users u SET is_active = TRUE, updated_at = NOW()
        FROM orang_tua o
        JOIN orang_tua_siswa l ON l.orang_tua_id = o.id
        WHERE l.siswa_id = $1 AND u.id = o.user_id
        "#,
    )
    .bind(siswa_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}
