use serde::{Deserialize, Serialize};

/// Role announced to the realtime channel on connect. Backup events are
/// restricted to administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Administrador,
    Tecnico,
    Consulta,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Administrador => "administrador",
            UserRole::Tecnico => "tecnico",
            UserRole::Consulta => "consulta",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Administrador)
    }
}
