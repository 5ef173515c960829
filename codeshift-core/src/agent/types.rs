//! Agent kinds
//!
//! - Revisor: reads repository files and produces a judgment
//! - Processador: transforms a structured payload without reading a repository

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of step agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Revisor,
    Processador,
}

impl AgentKind {
    /// Get all agent kinds
    pub fn all() -> &'static [AgentKind] {
        &[AgentKind::Revisor, AgentKind::Processador]
    }

    /// Get the name used in workflow definitions
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Revisor => "revisor",
            AgentKind::Processador => "processador",
        }
    }

    /// Get a description of what this agent kind does
    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::Revisor => "Reads repository files and produces an analysis",
            AgentKind::Processador => "Transforms the previous step's result",
        }
    }

    /// Whether this agent reads from the repository
    pub fn reads_repository(&self) -> bool {
        matches!(self, AgentKind::Revisor)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "revisor" => Ok(AgentKind::Revisor),
            "processador" => Ok(AgentKind::Processador),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("revisor".parse::<AgentKind>().unwrap(), AgentKind::Revisor);
        assert_eq!(" Processador ".parse::<AgentKind>().unwrap(), AgentKind::Processador);
        assert!("executor".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_reads_repository() {
        assert!(AgentKind::Revisor.reads_repository());
        assert!(!AgentKind::Processador.reads_repository());
    }

    #[test]
    fn test_display_roundtrips() {
        for kind in AgentKind::all() {
            assert_eq!(kind.to_string().parse::<AgentKind>().unwrap(), *kind);
        }
    }
}
