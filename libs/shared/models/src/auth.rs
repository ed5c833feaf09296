use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Tenant slug claim. Absent on global-realm tokens.
    pub tenant: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    Doctor,
    Patient,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            "doctor" => Some(Role::Doctor),
            "patient" => Some(Role::Patient),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }
}

/// Platform-level operator with no tenant affiliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

/// A user whose identity lives inside one tenant schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantUser {
    pub id: Uuid,
    pub tenant: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

/// The two user realms share most fields; modelling them as variants of
/// one union keeps a single projection for logging and response shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "realm", rename_all = "snake_case")]
pub enum AuthUser {
    Global(GlobalUser),
    Tenant(TenantUser),
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        match self {
            AuthUser::Global(u) => u.id,
            AuthUser::Tenant(u) => u.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            AuthUser::Global(u) => u.role,
            AuthUser::Tenant(u) => u.role,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            AuthUser::Global(u) => u.email.as_deref(),
            AuthUser::Tenant(u) => u.email.as_deref(),
        }
    }

    /// Tenant slug this identity belongs to, if any.
    pub fn tenant(&self) -> Option<&str> {
        match self {
            AuthUser::Global(_) => None,
            AuthUser::Tenant(u) => Some(u.tenant.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_parse() {
        for role in [Role::Admin, Role::Staff, Role::Doctor, Role::Patient] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn auth_user_projection_covers_both_realms() {
        let id = Uuid::new_v4();
        let global = AuthUser::Global(GlobalUser {
            id,
            email: Some("ops@clinic.example".to_string()),
            role: Role::Admin,
            created_at: None,
        });
        assert_eq!(global.id(), id);
        assert_eq!(global.tenant(), None);

        let tenant = AuthUser::Tenant(TenantUser {
            id,
            tenant: "clinic_42".to_string(),
            email: None,
            role: Role::Doctor,
            created_at: None,
        });
        assert_eq!(tenant.role(), Role::Doctor);
        assert_eq!(tenant.tenant(), Some("clinic_42"));
    }
}
