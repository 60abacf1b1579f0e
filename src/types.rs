use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Build variant selected on the command line with `--prod`.
///
/// Production enables minification, renames bundles with a `.min` suffix and
/// passes the production flag to the deploy command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn from_prod_flag(prod: bool) -> Self {
        if prod { Mode::Production } else { Mode::Development }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Mode::Production)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

/// Behaviour when a watch trigger arrives for a binding that is already part
/// of the active run.
///
/// - `Queue`: remember the trigger and start a new run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued run and only keep the latest
///   trigger. The running tasks themselves are never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

impl FromStr for TriggerWhileRunningBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(TriggerWhileRunningBehaviour::Queue),
            "cancel" => Ok(TriggerWhileRunningBehaviour::Cancel),
            other => Err(format!(
                "invalid watch.while_running: {other} (expected \"queue\" or \"cancel\")"
            )),
        }
    }
}
