//! Fault-code reference lookup
//!
//! Maps numeric CID/FMI and EID fault codes to human-readable descriptions.
//! Tables are loaded once at startup from TOML files and shared read-only
//! across all sessions. Both describe functions are total: malformed or
//! unknown codes yield the sentinel, never an error.

use guru_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Returned when a code has no entry in the reference tables
pub const DESCRIPTION_NOT_FOUND: &str = "Description not found";

/// TOML table file shape: `[codes]` with integer keys
#[derive(Debug, Deserialize)]
struct CodeTable {
    codes: HashMap<String, String>,
}

/// Static fault-code description tables
pub struct ReferenceTables {
    cid: HashMap<i64, String>,
    fmi: HashMap<i64, String>,
    eid: HashMap<i64, String>,
}

impl ReferenceTables {
    pub fn new(
        cid: HashMap<i64, String>,
        fmi: HashMap<i64, String>,
        eid: HashMap<i64, String>,
    ) -> Self {
        Self { cid, fmi, eid }
    }

    /// Load tables from `<dir>/{cid,fmi,eid}_descriptions.toml`
    pub fn load(dir: &Path) -> Result<Self> {
        let cid = load_table(&dir.join("cid_descriptions.toml"))?;
        let fmi = load_table(&dir.join("fmi_descriptions.toml"))?;
        let eid = load_table(&dir.join("eid_descriptions.toml"))?;

        tracing::info!(
            cid = cid.len(),
            fmi = fmi.len(),
            eid = eid.len(),
            "Reference tables loaded"
        );
        Ok(Self::new(cid, fmi, eid))
    }

    /// Describe a `"<CID>-<FMI>"` code as `"<CID desc> - <FMI desc>"`.
    ///
    /// Malformed codes and codes absent from either table yield the
    /// sentinel.
    pub fn describe_cid_fmi(&self, code: &str) -> String {
        let mut parts = code.splitn(2, '-');
        let cid = parts.next().and_then(|p| p.trim().parse::<i64>().ok());
        let fmi = parts.next().and_then(|p| p.trim().parse::<i64>().ok());

        match (cid, fmi) {
            (Some(cid), Some(fmi)) => {
                match (self.cid.get(&cid), self.fmi.get(&fmi)) {
                    (Some(cid_desc), Some(fmi_desc)) => format!("{} - {}", cid_desc, fmi_desc),
                    _ => DESCRIPTION_NOT_FOUND.to_string(),
                }
            }
            _ => DESCRIPTION_NOT_FOUND.to_string(),
        }
    }

    /// Describe a single-integer EID code
    pub fn describe_eid(&self, code: &str) -> String {
        code.trim()
            .parse::<i64>()
            .ok()
            .and_then(|eid| self.eid.get(&eid).cloned())
            .unwrap_or_else(|| DESCRIPTION_NOT_FOUND.to_string())
    }
}

/// Parse one TOML table file into an integer-keyed map
fn load_table(path: &Path) -> Result<HashMap<i64, String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let table: CodeTable = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    let mut codes = HashMap::with_capacity(table.codes.len());
    for (key, description) in table.codes {
        let code = key.parse::<i64>().map_err(|_| {
            Error::Config(format!(
                "Non-numeric code key '{}' in {}",
                key,
                path.display()
            ))
        })?;
        codes.insert(code, description);
    }
    Ok(codes)
}
