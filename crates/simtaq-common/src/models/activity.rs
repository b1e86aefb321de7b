//! Activity log: "who did what" rows written after mutating operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::user::Role;

/// Action codes, formatted `ROLE_ACTION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    AdminLogin,
    AdminLogout,
    GuruLogin,
    GuruLogout,
    SiswaLogin,
    SiswaLogout,
    OrtuLogin,
    OrtuLogout,

    UserUbahPassword,
    UserResetPassword,
    UserBuatKodePemulihan,

    SiswaDaftarTasmi,
    SiswaBatalTasmi,
    SiswaUpdateStatus,

    GuruInputPenilaian,
    GuruEditPenilaian,
    GuruHapusPenilaian,
    GuruUbahPresensi,
    GuruUploadTtd,
    GuruJadwalTasmi,
    GuruTolakTasmi,
    GuruNilaiTasmi,
    GuruPublishTasmi,

    AdminTambahSiswa,
    AdminUbahSiswa,
    AdminHapusSiswa,
    AdminValidasiSiswa,
    AdminTambahUser,
    AdminUbahUser,
    AdminHapusUser,
    AdminResetPassword,
    AdminSetTarget,
    AdminTambahKelas,
    AdminUbahKelas,
    AdminHapusKelas,
    AdminTambahTahun,
    AdminUbahTahun,
    AdminBuatPengumuman,
    AdminUbahPengumuman,
    AdminHapusPengumuman,
    AdminUploadTemplate,
    AdminCetakSertifikat,
}

/// Display grouping of action codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityCategory {
    Penilaian,
    Tasmi,
    Profil,
    Hafalan,
    Laporan,
    Target,
    Presensi,
    Pengguna,
    Sistem,
}

impl ActivityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Penilaian => "PENILAIAN",
            Self::Tasmi => "TASMI",
            Self::Profil => "PROFIL",
            Self::Hafalan => "HAFALAN",
            Self::Laporan => "LAPORAN",
            Self::Target => "TARGET",
            Self::Presensi => "PRESENSI",
            Self::Pengguna => "PENGGUNA",
            Self::Sistem => "SISTEM",
        }
    }
}

impl ActivityAction {
    /// Wire name, e.g. `GURU_INPUT_PENILAIAN`.
    pub fn as_str(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn login_for(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminLogin,
            Role::Guru => Self::GuruLogin,
            Role::Siswa => Self::SiswaLogin,
            Role::OrangTua => Self::OrtuLogin,
        }
    }

    pub fn logout_for(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminLogout,
            Role::Guru => Self::GuruLogout,
            Role::Siswa => Self::SiswaLogout,
            Role::OrangTua => Self::OrtuLogout,
        }
    }

    pub fn category(&self) -> ActivityCategory {
        use ActivityAction::*;
        match self {
            GuruInputPenilaian | GuruEditPenilaian | GuruHapusPenilaian => {
                ActivityCategory::Penilaian
            }
            SiswaDaftarTasmi | SiswaBatalTasmi | GuruJadwalTasmi | GuruTolakTasmi
            | GuruNilaiTasmi | GuruPublishTasmi => ActivityCategory::Tasmi,
            GuruUploadTtd | UserUbahPassword | UserResetPassword | UserBuatKodePemulihan => {
                ActivityCategory::Profil
            }
            GuruUbahPresensi => ActivityCategory::Presensi,
            AdminSetTarget => ActivityCategory::Target,
            AdminCetakSertifikat => ActivityCategory::Laporan,
            AdminTambahSiswa | AdminUbahSiswa | AdminHapusSiswa | AdminValidasiSiswa
            | SiswaUpdateStatus | AdminTambahUser | AdminUbahUser | AdminHapusUser
            | AdminResetPassword => ActivityCategory::Pengguna,
            _ => ActivityCategory::Sistem,
        }
    }
}

/// A stored activity row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub actor_role: Role,
    pub actor_name: Option<String>,
    pub action: String,
    pub category: String,
    pub title: String,
    pub description: Option<String>,
    pub target_user_id: Option<Uuid>,
    pub target_role: Option<Role>,
    pub target_name: Option<String>,
    pub metadata: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for a new activity row.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub actor_id: Uuid,
    pub actor_role: Role,
    pub actor_name: Option<String>,
    pub action: ActivityAction,
    pub title: String,
    pub description: Option<String>,
    pub target_user_id: Option<Uuid>,
    pub target_role: Option<Role>,
    pub target_name: Option<String>,
    pub metadata: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewActivity {
    pub fn new(
        actor_id: Uuid,
        actor_role: Role,
        action: ActivityAction,
        title: impl Into<String>,
    ) -> Self {
        Self {
            actor_id,
            actor_role,
            actor_name: None,
            action,
            title: title.into(),
            description: None,
            target_user_id: None,
            target_role: None,
            target_name: None,
            metadata: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn actor_name(mut self, name: impl Into<String>) -> Self {
        self.actor_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn target(mut self, user_id: Uuid, role: Role, name: impl Into<String>) -> Self {
        self.target_user_id = Some(user_id);
        self.target_role = Some(role);
        self.target_name = Some(name.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Relative time in Indonesian, e.g. "5 menit lalu".
pub fn format_time_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const UNITS: [(&str, i64); 6] = [
        ("tahun", 31_536_000),
        ("bulan", 2_592_000),
        ("minggu", 604_800),
        ("hari", 86_400),
        ("jam", 3_600),
        ("menit", 60),
    ];

    let seconds = (now - at).num_seconds();
    UNITS
        .iter()
        .find(|(_, len)| seconds / len >= 1)
        .map(|(name, len)| format!("{} {name} lalu", seconds / len))
        .unwrap_or_else(|| "Baru saja".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn action_codes_and_categories() {
        assert_eq!(ActivityAction::GuruInputPenilaian.as_str(), "GURU_INPUT_PENILAIAN");
        assert_eq!(ActivityAction::login_for(Role::OrangTua).as_str(), "ORTU_LOGIN");
        assert_eq!(ActivityAction::SiswaDaftarTasmi.category(), ActivityCategory::Tasmi);
        assert_eq!(ActivityAction::SiswaUpdateStatus.category(), ActivityCategory::Pengguna);
        assert_eq!(ActivityAction::AdminLogin.category(), ActivityCategory::Sistem);
    }

    #[test]
    fn time_ago_units() {
        let now = Utc::now();
        assert_eq!(format_time_ago(now - Duration::seconds(30), now), "Baru saja");
        assert_eq!(format_time_ago(now - Duration::minutes(5), now), "5 menit lalu");
        assert_eq!(format_time_ago(now - Duration::hours(2), now), "2 jam lalu");
        assert_eq!(format_time_ago(now - Duration::days(9), now), "1 minggu lalu");
        assert_eq!(format_time_ago(now - Duration::days(400), now), "1 tahun lalu");
    }
}
