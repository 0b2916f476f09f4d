use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    Organizer,
    RegisteredUser,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::Admin => "admin",
            UserRole::Organizer => "organizer",
            UserRole::RegisteredUser => "registered_user",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "super_admin" | "superadmin" => Ok(UserRole::SuperAdmin),
            "admin" => Ok(UserRole::Admin),
            "organizer" => Ok(UserRole::Organizer),
            "registered_user" | "registereduser" => Ok(UserRole::RegisteredUser),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Role-tagged user as resolved through the identity directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_organizer(&self) -> bool {
        self.role == UserRole::Organizer
    }
}

/// Directory entry as written in a seed fixture; timestamps are set on load.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl SeedUser {
    pub fn into_user(self, at: DateTime<Utc>) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role,
            created_at: at,
            updated_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_header_spellings() {
        assert_eq!("organizer".parse::<UserRole>(), Ok(UserRole::Organizer));
        assert_eq!("SuperAdmin".parse::<UserRole>(), Ok(UserRole::SuperAdmin));
        assert_eq!(
            " registered_user ".parse::<UserRole>(),
            Ok(UserRole::RegisteredUser)
        );
        assert!("guest".parse::<UserRole>().is_err());
    }
}
