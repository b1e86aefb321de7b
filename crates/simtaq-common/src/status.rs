//! Who may log in and act, derived from account and student status.

use serde::Serialize;

use crate::models::people::StatusSiswa;
use crate::models::user::Role;

/// Result of an access check: `reason` is shown to the user when not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AccessCheck {
    fn allowed() -> Self {
        Self { allowed: true, reason: None }
    }

    fn denied(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Facts needed to decide access for one account.
#[derive(Debug, Clone, Copy)]
pub struct AccountFacts {
    pub role: Role,
    pub is_active: bool,
    /// Only for students.
    pub status_siswa: Option<StatusSiswa>,
    /// Only for parents.
    pub has_active_child: bool,
}

pub fn check_user_access(facts: AccountFacts) -> AccessCheck {
    if facts.is_active {
        return AccessCheck::allowed();
    }

    match facts.role {
        Role::Admin | Role::Guru => AccessCheck::denied("Akun dinonaktifkan oleh admin"),
        Role::Siswa => AccessCheck::denied(match facts.status_siswa {
            Some(StatusSiswa::Lulus) => {
                "Akun Anda tidak aktif karena telah lulus. Silakan hubungi admin sekolah."
            }
            Some(StatusSiswa::Pindah) => {
                "Akun Anda tidak aktif karena telah pindah sekolah. Silakan hubungi admin sekolah."
            }
            Some(StatusSiswa::Keluar) => "Akun Anda tidak aktif. Silakan hubungi admin sekolah.",
            _ => "Akun Anda sudah tidak aktif. Silakan hubungi admin sekolah.",
        }),
        Role::OrangTua if !facts.has_active_child => AccessCheck::denied(
            "Akun Anda tidak aktif karena tidak ada anak yang berstatus aktif. Silakan hubungi admin sekolah.",
        ),
        Role::OrangTua => {
            AccessCheck::denied("Akun dinonaktifkan oleh admin. Silakan hubungi admin sekolah.")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    Aktif,
    TidakAktif,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParentBadge {
    BelumTerhubung,
    AdminDeactivated,
}

/// How a parent account is shown in admin listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentDisplayStatus {
    pub display_status: DisplayStatus,
    pub has_active_child: bool,
    pub children_count: usize,
    pub admin_deactivated: bool,
    pub badge: Option<ParentBadge>,
}

pub fn parent_display_status(is_active: bool, children: &[StatusSiswa]) -> ParentDisplayStatus {
    let has_active_child = children.contains(&StatusSiswa::Aktif);
    let flag = |active| if active { DisplayStatus::Aktif } else { DisplayStatus::TidakAktif };

    if children.is_empty() {
        return ParentDisplayStatus {
            display_status: flag(is_active),
            has_active_child: false,
            children_count: 0,
            admin_deactivated: !is_active,
            badge: Some(ParentBadge::BelumTerhubung),
        };
    }

    let admin_deactivated = has_active_child && !is_active;
    ParentDisplayStatus {
        display_status: flag(has_active_child),
        has_active_child,
        children_count: children.len(),
        admin_deactivated,
        badge: admin_deactivated.then_some(ParentBadge::AdminDeactivated),
    }
}

/// Student operations gated by life-cycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiswaAction {
    ViewHafalan,
    ViewNilai,
    ViewPresensi,
    ViewProfile,
    AddHafalan,
    SubmitTasmi,
    UpdatePresensi,
}

impl SiswaAction {
    fn is_view(&self) -> bool {
        matches!(
            self,
            Self::ViewHafalan | Self::ViewNilai | Self::ViewPresensi | Self::ViewProfile
        )
    }
}

/// History stays visible after a student leaves; new activity requires AKTIF.
pub fn can_perform(status: StatusSiswa, action: SiswaAction) -> bool {
    action.is_view() || status == StatusSiswa::Aktif
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(role: Role, is_active: bool) -> AccountFacts {
        AccountFacts {
            role,
            is_active,
            status_siswa: None,
            has_active_child: false,
        }
    }

    #[test]
    fn active_accounts_pass() {
        for role in [Role::Admin, Role::Guru, Role::Siswa, Role::OrangTua] {
            assert!(check_user_access(facts(role, true)).allowed);
        }
    }

    #[test]
    fn inactive_reasons() {
        let guru = check_user_access(facts(Role::Guru, false));
        assert_eq!(guru.reason.as_deref(), Some("Akun dinonaktifkan oleh admin"));

        let lulus = check_user_access(AccountFacts {
            status_siswa: Some(StatusSiswa::Lulus),
            ..facts(Role::Siswa, false)
        });
        assert!(lulus.reason.unwrap().contains("telah lulus"));

        let pindah = check_user_access(AccountFacts {
            status_siswa: Some(StatusSiswa::Pindah),
            ..facts(Role::Siswa, false)
        });
        assert!(pindah.reason.unwrap().contains("pindah sekolah"));

        let still_aktif = check_user_access(AccountFacts {
            status_siswa: Some(StatusSiswa::Aktif),
            ..facts(Role::Siswa, false)
        });
        assert!(still_aktif.reason.unwrap().starts_with("Akun Anda sudah tidak aktif"));

        let orphan = check_user_access(facts(Role::OrangTua, false));
        assert!(orphan.reason.unwrap().contains("tidak ada anak"));

        let blocked = check_user_access(AccountFacts {
            has_active_child: true,
            ..facts(Role::OrangTua, false)
        });
        assert!(blocked.reason.unwrap().starts_with("Akun dinonaktifkan oleh admin"));
    }

    #[test]
    fn parent_badges() {
        let unlinked = parent_display_status(true, &[]);
        assert_eq!(unlinked.display_status, DisplayStatus::Aktif);
        assert_eq!(unlinked.badge, Some(ParentBadge::BelumTerhubung));

        let overridden = parent_display_status(false, &[StatusSiswa::Lulus, StatusSiswa::Aktif]);
        assert_eq!(overridden.display_status, DisplayStatus::Aktif);
        assert!(overridden.admin_deactivated);
        assert_eq!(overridden.badge, Some(ParentBadge::AdminDeactivated));
        assert_eq!(overridden.children_count, 2);

        let graduated = parent_display_status(true, &[StatusSiswa::Lulus]);
        assert_eq!(graduated.display_status, DisplayStatus::TidakAktif);
        assert_eq!(graduated.badge, None);
    }

    #[test]
    fn action_gating() {
        assert!(can_perform(StatusSiswa::Lulus, SiswaAction::ViewNilai));
        assert!(!can_perform(StatusSiswa::Lulus, SiswaAction::SubmitTasmi));
        assert!(can_perform(StatusSiswa::Aktif, SiswaAction::AddHafalan));
        assert!(!can_perform(StatusSiswa::Pindah, SiswaAction::UpdatePresensi));
    }
}
