//! Bootstrap policy file.
//!
//! One rule per line: `p, <role>, <pattern>, <method>`. Blank lines and lines
//! starting with `#` are ignored.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use portcullis_auth::Policy;

use crate::policy_engine::PolicyEngine;
use crate::policy_store::StoreError;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("seed line {line}: {reason}")]
    Line { line: usize, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn parse_seed(input: &str) -> Result<Vec<Policy>, SeedError> {
    let mut out = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let err = |reason: String| SeedError::Line {
            line: idx + 1,
            reason,
        };
        match fields.as_slice() {
            ["p", role, pattern, method] => {
                let policy = Policy::new(*role, pattern.to_string(), method.to_string())
                    .map_err(|e| err(e.to_string()))?;
                out.push(policy);
            }
            [kind, ..] if *kind != "p" => {
                return Err(err(format!("unsupported rule type `{kind}`")));
            }
            _ => return Err(err(format!("expected 4 fields, found {}", fields.len()))),
        }
    }
    Ok(out)
}

/// Add every rule in `path` through the engine. Returns how many were new.
pub async fn seed_from_file(
    engine: &Arc<PolicyEngine>,
    path: impl AsRef<Path>,
    deadline: Duration,
) -> Result<usize, SeedError> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;
    let policies = parse_seed(&contents)?;
    let total = policies.len();

    let mut inserted = 0;
    for policy in policies {
        if engine.add_policy(policy, deadline).await? {
            inserted += 1;
        }
    }
    tracing::info!(path = %path.display(), total, inserted, "policy seed applied");
    Ok(inserted)
}
