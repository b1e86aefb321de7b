//! User accounts and roles.
//!
//! A person logs in with `username` + password. Students and their parents share
//! the student's NIS as username, so uniqueness is on `(username, role)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A SIMTAQ login account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Full display name
    pub name: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub recovery_code_hash: Option<String>,
    pub recovery_code_created_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The four account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Guru,
    Siswa,
    OrangTua,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Guru => "GURU",
            Role::Siswa => "SISWA",
            Role::OrangTua => "ORANG_TUA",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Guru => "Guru",
            Role::Siswa => "Siswa",
            Role::OrangTua => "Orang Tua",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "GURU" => Ok(Role::Guru),
            "SISWA" => Ok(Role::Siswa),
            "ORANG_TUA" | "ORANGTUA" => Ok(Role::OrangTua),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Public projection of a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub needs_recovery_setup: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            needs_recovery_setup: u.recovery_code_hash.is_none(),
            id: u.id,
            username: u.username,
            name: u.name,
            email: u.email,
            role: u.role,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64, message = "Username wajib diisi"))]
    pub username: String,
    #[validate(length(min = 1, max = 128, message = "Password wajib diisi"))]
    pub password: String,
    /// Narrows the lookup when a student and a parent share the same username.
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Password lama wajib diisi"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "Password baru minimal 8 karakter"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Username wajib diisi"))]
    pub username: String,
    pub role: Role,
    #[validate(length(min = 1, message = "Kode pemulihan wajib diisi"))]
    pub recovery_code: String,
    #[validate(length(min = 8, max = 128, message = "Password baru minimal 8 karakter"))]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::OrangTua).unwrap(), "\"ORANG_TUA\"");
        let role: Role = serde_json::from_str("\"GURU\"").unwrap();
        assert_eq!(role, Role::Guru);
        assert_eq!("orangtua".parse::<Role>().unwrap(), Role::OrangTua);
        assert!("KEPALA".parse::<Role>().is_err());
    }
}
