//! Repository tests against a real PostgreSQL database.
//!
//! Each test gets a fresh database with the crate migrations applied.
//!
//! Run with: `DATABASE_URL=postgres://... cargo test -p simtaq-db --test postgres_integration`

use chrono::{Duration, NaiveDate, Utc};
use simtaq_common::models::{
    academic::TahunAjaranRequest,
    certificate::CertificateKind,
    people::{StatusSiswa, ValidationStatus},
    user::Role,
};
use simtaq_db::repository::{
    certificates, guru, orang_tua, rate_limits, siswa, tahun_ajaran, tasmi, users,
};
use sqlx::PgPool;
use uuid::Uuid;

async fn make_user(pool: &PgPool, username: &str, role: Role, is_active: bool) -> Uuid {
    users::create_user(
        pool,
        users::NewUser {
            id: Uuid::now_v7(),
            username,
            name: username,
            email: None,
            password_hash: "x",
            role,
            is_active,
        },
    )
    .await
    .unwrap()
    .id
}

async fn make_siswa(pool: &PgPool, nis: &str) -> (Uuid, Uuid) {
    let user_id = make_user(pool, nis, Role::Siswa, true).await;
    let row = siswa::create(
        pool,
        siswa::NewSiswa {
            id: Uuid::now_v7(),
            user_id,
            nis,
            nisn: None,
            jenis_kelamin: None,
            tanggal_lahir: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            alamat: None,
            no_telepon: None,
            kelas_id: None,
            status: ValidationStatus::Approved,
        },
    )
    .await
    .unwrap();
    (row.id, user_id)
}

async fn make_parent(pool: &PgPool, username: &str, is_active: bool, children: &[Uuid]) -> Uuid {
    let user_id = make_user(pool, username, Role::OrangTua, is_active).await;
    let parent = orang_tua::create(
        pool,
        Uuid::now_v7(),
        user_id,
        orang_tua::OrangTuaFields {
            no_telepon: None,
            pekerjaan: None,
            alamat: None,
            jenis_kelamin: None,
        },
    )
    .await
    .unwrap();
    for child in children {
        orang_tua::link(pool, parent.id, *child, Some("Ayah")).await.unwrap();
    }
    user_id
}

async fn make_guru(pool: &PgPool, username: &str) -> Uuid {
    let user_id = make_user(pool, username, Role::Guru, true).await;
    guru::create(
        pool,
        Uuid::now_v7(),
        user_id,
        guru::GuruFields {
            nip: None,
            jenis_kelamin: None,
            tanggal_lahir: None,
            no_telepon: None,
            alamat: None,
        },
    )
    .await
    .unwrap()
    .id
}

async fn is_active(pool: &PgPool, user_id: Uuid) -> bool {
    users::find_by_id(pool, user_id).await.unwrap().unwrap().is_active
}

/// Mirrors the admin status change: student row, student account, then parents.
async fn change_status(pool: &PgPool, siswa_id: Uuid, user_id: Uuid, status: StatusSiswa) {
    let mut tx = pool.begin().await.unwrap();
    siswa::set_status_siswa(&mut *tx, siswa_id, status).await.unwrap();
    users::set_active(&mut *tx, user_id, status == StatusSiswa::Aktif).await.unwrap();
    orang_tua::sync_parent_activity(&mut *tx, siswa_id).await.unwrap();
    tx.commit().await.unwrap();
}

// ============================================================================
// Student status cascade
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn parent_stays_active_while_any_child_is_active(pool: PgPool) {
    let (kakak, kakak_user) = make_siswa(&pool, "1001").await;
    let (adik, adik_user) = make_siswa(&pool, "1002").await;
    let parent = make_parent(&pool, "wali", true, &[kakak, adik]).await;

    change_status(&pool, kakak, kakak_user, StatusSiswa::Lulus).await;
    assert!(!is_active(&pool, kakak_user).await);
    assert!(is_active(&pool, parent).await);

    let lulus = siswa::find_by_id(&pool, kakak).await.unwrap().unwrap();
    assert_eq!(lulus.status_siswa, StatusSiswa::Lulus);
    assert!(lulus.tanggal_keluar.is_some());

    change_status(&pool, adik, adik_user, StatusSiswa::Pindah).await;
    assert!(!is_active(&pool, parent).await);

    change_status(&pool, adik, adik_user, StatusSiswa::Aktif).await;
    assert!(is_active(&pool, parent).await);
    assert!(is_active(&pool, adik_user).await);
    let back = siswa::find_by_id(&pool, adik).await.unwrap().unwrap();
    assert!(back.tanggal_keluar.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn approval_activates_linked_parents(pool: PgPool) {
    let (anak, _) = make_siswa(&pool, "2001").await;
    let (lain, _) = make_siswa(&pool, "2002").await;
    let parent = make_parent(&pool, "ibu", false, &[anak]).await;
    let unrelated = make_parent(&pool, "tetangga", false, &[lain]).await;

    let activated = orang_tua::activate_parents(&pool, anak).await.unwrap();
    assert_eq!(activated, 1);
    assert!(is_active(&pool, parent).await);
    assert!(!is_active(&pool, unrelated).await);
}

// ============================================================================
// Exclusive activation
// ============================================================================

fn year(nama: &str, semester: i32) -> TahunAjaranRequest {
    TahunAjaranRequest {
        nama: nama.into(),
        semester,
        tanggal_mulai: NaiveDate::from_ymd_opt(2025, 7, 14).unwrap(),
        tanggal_selesai: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
        target_hafalan: Some(3),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn only_one_school_year_is_active(pool: PgPool) {
    let ganjil = tahun_ajaran::create(&pool, Uuid::now_v7(), &year("2025/2026", 1)).await.unwrap();
    let genap = tahun_ajaran::create(&pool, Uuid::now_v7(), &year("2025/2026", 2)).await.unwrap();

    tahun_ajaran::activate(&pool, ganjil.id).await.unwrap().unwrap();
    tahun_ajaran::activate(&pool, genap.id).await.unwrap().unwrap();

    let active = tahun_ajaran::find_active(&pool).await.unwrap().unwrap();
    assert_eq!(active.id, genap.id);
    let all = tahun_ajaran::list(&pool).await.unwrap();
    assert_eq!(all.iter().filter(|y| y.is_active).count(), 1);

    assert!(tahun_ajaran::activate(&pool, Uuid::now_v7()).await.unwrap().is_none());
    assert_eq!(tahun_ajaran::find_active(&pool).await.unwrap().unwrap().id, genap.id);

    assert!(!tahun_ajaran::delete(&pool, genap.id).await.unwrap());
    assert!(tahun_ajaran::delete(&pool, ganjil.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn only_one_certificate_template_is_active(pool: PgPool) {
    let admin = make_user(&pool, "admin", Role::Admin, true).await;
    let template = |nama: &'static str| certificates::NewTemplate {
        id: Uuid::now_v7(),
        nama,
        filename: "template.png",
        file_path: "/uploads/certificates/template.png",
        width: 3508,
        height: 2480,
        uploaded_by: admin,
    };

    let first = certificates::create_template(&pool, template("Lama")).await.unwrap();
    let second = certificates::create_template(&pool, template("Baru")).await.unwrap();
    assert_eq!(certificates::active_template(&pool).await.unwrap().unwrap().id, second.id);

    certificates::activate_template(&pool, first.id).await.unwrap().unwrap();
    let templates = certificates::list_templates(&pool).await.unwrap();
    let active: Vec<_> = templates.iter().filter(|t| t.is_active).map(|t| t.id).collect();
    assert_eq!(active, vec![first.id]);
}

// ============================================================================
// Rate limits
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn failures_lock_then_clear(pool: PgPool) {
    let key = "reset-password:203.0.113.9:budi";
    let window = Duration::minutes(15);

    for expected in 1..=2 {
        let rl = rate_limits::record_failure(&pool, key, 3, window).await.unwrap();
        assert_eq!(rl.attempts, expected);
        assert_eq!(rl.locked_for(Utc::now()), None);
    }

    let locked = rate_limits::record_failure(&pool, key, 3, window).await.unwrap();
    assert_eq!(locked.attempts, 3);
    let left = locked.locked_for(Utc::now()).expect("locked after third failure");
    assert!(left > Duration::minutes(14));

    rate_limits::clear(&pool, key).await.unwrap();
    assert!(rate_limits::find(&pool, key).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn stale_failures_start_a_new_window(pool: PgPool) {
    let key = "reset-password:203.0.113.9:siti";
    let window = Duration::minutes(15);
    for _ in 0..3 {
        rate_limits::record_failure(&pool, key, 3, window).await.unwrap();
    }

    sqlx::query("UPDATE rate_limits SET updated_at = NOW() - INTERVAL '16 minutes' WHERE key = $1")
        .bind(key)
        .execute(&pool)
        .await
        .unwrap();

    let fresh = rate_limits::record_failure(&pool, key, 3, window).await.unwrap();
    assert_eq!(fresh.attempts, 1);
    assert_eq!(fresh.locked_for(Utc::now()), None);
}

// ============================================================================
// Certificate numbering
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn certificate_numbers_are_sequential_per_kind_and_day(pool: PgPool) {
    let admin = make_user(&pool, "admin", Role::Admin, true).await;
    let (siswa_id, _) = make_siswa(&pool, "3001").await;
    let today = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
    let new = |kind| certificates::NewCertificate {
        id: Uuid::now_v7(),
        kind,
        siswa_id,
        tasmi_id: None,
        award_recipient_id: None,
        template_id: None,
        generated_by: admin,
    };

    let issued = futures_util::future::join_all(
        (0..5).map(|_| certificates::issue(&pool, new(CertificateKind::Tasmi), today)),
    )
    .await;
    let mut numbers: Vec<String> = issued
        .into_iter()
        .map(|c| c.unwrap().certificate_number)
        .collect();
    numbers.sort();
    let expected: Vec<String> = (1..=5).map(|n| format!("CERT/TASMI/20250614/{n:04}")).collect();
    assert_eq!(numbers, expected);

    let award = certificates::issue(&pool, new(CertificateKind::Award), today).await.unwrap();
    assert_eq!(award.certificate_number, "CERT/AWARD/20250614/0001");

    let next_day = today.succ_opt().unwrap();
    let tomorrow = certificates::issue(&pool, new(CertificateKind::Tasmi), next_day).await.unwrap();
    assert_eq!(tomorrow.certificate_number, "CERT/TASMI/20250615/0001");
}

// ============================================================================
// Tasmi' registration
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn one_open_tasmi_registration_per_student(pool: PgPool) {
    let (siswa_id, _) = make_siswa(&pool, "4001").await;
    let pengampu = make_guru(&pool, "ustadz").await;
    let registration = || tasmi::NewTasmi {
        id: Uuid::now_v7(),
        siswa_id,
        kelas_id: None,
        guru_pengampu_id: pengampu,
        jumlah_hafalan: 3,
        juz_yang_ditasmi: "28, 29, 30",
        jam_tasmi: "08:00",
        tanggal_tasmi: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
        catatan: None,
    };

    let first = tasmi::create(&pool, registration()).await.unwrap();
    let duplicate = tasmi::create(&pool, registration()).await.unwrap_err();
    match duplicate {
        sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
        other => panic!("expected unique violation, got {other:?}"),
    }

    tasmi::approve(&pool, first.id, pengampu, NaiveDate::from_ymd_opt(2025, 6, 21).unwrap(), None)
        .await
        .unwrap();
    assert!(tasmi::create(&pool, registration()).await.is_err());

    let (other, _) = make_siswa(&pool, "4002").await;
    let other_open = tasmi::create(&pool, tasmi::NewTasmi { siswa_id: other, ..registration() }).await.unwrap();
    tasmi::cancel(&pool, other_open.id, other).await.unwrap().unwrap();
    tasmi::create(&pool, tasmi::NewTasmi { siswa_id: other, ..registration() }).await.unwrap();
}
