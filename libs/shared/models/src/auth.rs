use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Who may do what is decided by role plus ownership; identity itself is
/// established at the perimeter and trusted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    ClinicAdmin,
    SuperAdmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::ClinicAdmin => write!(f, "clinic_admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "clinic_admin" => Ok(Role::ClinicAdmin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The authenticated requester attached to every request by the auth
/// middleware. `clinic_id` is present for clinic admins and scopes their
/// actions to their own clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub clinic_id: Option<Uuid>,
}

impl Actor {
    pub fn patient(id: Uuid) -> Self {
        Self { id, role: Role::Patient, clinic_id: None }
    }

    pub fn clinic_admin(id: Uuid, clinic_id: Uuid) -> Self {
        Self { id, role: Role::ClinicAdmin, clinic_id: Some(clinic_id) }
    }

    pub fn super_admin(id: Uuid) -> Self {
        Self { id, role: Role::SuperAdmin, clinic_id: None }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub clinic_id: Option<Uuid>,
}
