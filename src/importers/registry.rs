//! CVM fund registry (cadastro) importer.
//!
//! The registry is assembled from three CVM files:
//! - `registro_fundo.csv` (inside `registro_fundo_classe.zip`): one row per
//!   fund with type, legal name and operating status;
//! - `registro_classe.csv` (same archive): share classes, used as a fallback
//!   source for the fund classification;
//! - `cad_fi_hist_classe.csv` (inside `cad_fi_hist.zip`): classification
//!   history, from which the current class is taken.
//!
//! Only funds "Em Funcionamento Normal" of type FI, FIF or FIDC are kept.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};

use super::{cell, parse_date, read_zip_csv, RawTable};
use crate::cnpj::canonicalize;
use crate::config::FundsConfig;
use crate::error::{FundsError, Result};
use crate::http::Transport;
use crate::utils::fold_text;

const CLASS_HISTORY_ARCHIVE: &str = "FI/CAD/DADOS/cad_fi_hist.zip";
const CLASS_HISTORY_MEMBER: &str = "cad_fi_hist_classe.csv";
const REGISTRY_ARCHIVE: &str = "FI/CAD/DADOS/registro_fundo_classe.zip";
const FUND_MEMBER: &str = "registro_fundo.csv";
const SHARE_CLASS_MEMBER: &str = "registro_classe.csv";

const ACCEPTED_FUND_TYPES: [&str; 3] = ["FI", "FIF", "FIDC"];

/// Fund classification used by the class allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FundClass {
    RendaFixa,
    Acoes,
    Multimercado,
    Cambial,
    CurtoPrazo,
    Referenciado,
}

impl FundClass {
    pub const ALL: [FundClass; 6] = [
        FundClass::RendaFixa,
        FundClass::Acoes,
        FundClass::Multimercado,
        FundClass::Cambial,
        FundClass::CurtoPrazo,
        FundClass::Referenciado,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FundClass::RendaFixa => "Renda Fixa",
            FundClass::Acoes => "Ações",
            FundClass::Multimercado => "Multimercado",
            FundClass::Cambial => "Cambial",
            FundClass::CurtoPrazo => "Curto Prazo",
            FundClass::Referenciado => "Referenciado",
        }
    }

    /// Recognize a CVM class label. Accepts the short form ("Ações") and
    /// the historical long form ("Fundo de Ações"), ignoring case and accents.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded = fold_text(label.trim());
        let stripped = folded
            .strip_prefix("FUNDO DE ")
            .or_else(|| folded.strip_prefix("FUNDO "))
            .unwrap_or(&folded);
        match stripped {
            "RENDA FIXA" => Some(FundClass::RendaFixa),
            "ACOES" => Some(FundClass::Acoes),
            "MULTIMERCADO" => Some(FundClass::Multimercado),
            "CAMBIAL" => Some(FundClass::Cambial),
            "CURTO PRAZO" => Some(FundClass::CurtoPrazo),
            "REFERENCIADO" => Some(FundClass::Referenciado),
            _ => None,
        }
    }
}

impl fmt::Display for FundClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FundClass {
    type Err = FundsError;

    fn from_str(s: &str) -> Result<Self> {
        FundClass::from_label(s).ok_or_else(|| FundsError::UnknownClass {
            classes: vec![s.to_string()],
        })
    }
}

/// Validate a class allow-list, reporting every unknown name at once.
pub fn parse_class_filter(classes: &[String]) -> Result<Vec<FundClass>> {
    let mut parsed = Vec::with_capacity(classes.len());
    let mut invalid = Vec::new();
    for name in classes {
        match FundClass::from_label(name) {
            Some(class) => parsed.push(class),
            None => invalid.push(name.clone()),
        }
    }
    if !invalid.is_empty() {
        return Err(FundsError::UnknownClass { classes: invalid });
    }
    Ok(parsed)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FundStatus {
    OperatingNormally,
    Other(String),
}

impl FundStatus {
    pub fn from_label(label: &str) -> Self {
        match fold_text(label.trim()).as_str() {
            "EM FUNCIONAMENTO NORMAL" | "OPERATING NORMALLY" => FundStatus::OperatingNormally,
            _ => FundStatus::Other(label.trim().to_string()),
        }
    }

    pub fn is_operating(&self) -> bool {
        matches!(self, FundStatus::OperatingNormally)
    }
}

/// One registered fund, as of the registry download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundRegistryEntry {
    pub cnpj: String,
    pub legal_name: String,
    pub fund_type: String,
    /// Raw classification label as published (may be outside [`FundClass`])
    pub class_label: Option<String>,
    pub class: Option<FundClass>,
    pub status: FundStatus,
    pub adaptation_date: Option<NaiveDate>,
}

impl FundRegistryEntry {
    pub fn new(cnpj: &str, legal_name: &str, class_label: Option<&str>, status: &str) -> Self {
        let class_label = class_label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        Self {
            cnpj: canonicalize(cnpj),
            legal_name: legal_name.trim().to_string(),
            fund_type: "FI".to_string(),
            class: class_label.as_deref().and_then(FundClass::from_label),
            class_label,
            status: FundStatus::from_label(status),
            adaptation_date: None,
        }
    }

    /// Funds without a published class pass any allow-list.
    fn passes_class_filter(&self, allowed: &[FundClass]) -> bool {
        if allowed.is_empty() || self.class_label.is_none() {
            return true;
        }
        self.class.map(|c| allowed.contains(&c)).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
struct ClassPeriod {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    label: String,
}

/// Current class per fund from `cad_fi_hist_classe.csv`: the open-ended
/// period with the latest start, or the latest-starting period when every
/// period is closed.
fn current_classes(history: &RawTable) -> Result<HashMap<String, String>> {
    let cnpj_idx = history.require_column("CNPJ_FUNDO")?;
    let class_idx = history.require_column("CLASSE")?;
    let start_idx = history.column("DT_INI_CLASSE");
    let end_idx = history.column("DT_FIM_CLASSE");

    let mut periods: HashMap<String, Vec<ClassPeriod>> = HashMap::new();
    for row in &history.rows {
        let label = cell(row, class_idx);
        if label.is_empty() {
            continue;
        }
        periods
            .entry(canonicalize(cell(row, cnpj_idx)))
            .or_default()
            .push(ClassPeriod {
                start: start_idx.and_then(|i| parse_date(cell(row, i))),
                end: end_idx.and_then(|i| parse_date(cell(row, i))),
                label: label.to_string(),
            });
    }

    Ok(periods
        .into_iter()
        .filter_map(|(cnpj, mut list)| {
            list.sort_by_key(|p| (p.end.is_none(), p.start));
            list.pop().map(|p| (cnpj, p.label))
        })
        .collect())
}

/// Classification per share-class identifier from `registro_classe.csv`.
fn share_class_labels(classes: &RawTable) -> HashMap<String, String> {
    let (Some(cnpj_idx), Some(class_idx)) = (
        classes.column("CNPJ_Classe"),
        classes.column("Classificacao"),
    ) else {
        return HashMap::new();
    };

    let mut labels = HashMap::new();
    for row in &classes.rows {
        let label = cell(row, class_idx);
        if label.is_empty() {
            continue;
        }
        labels
            .entry(canonicalize(cell(row, cnpj_idx)))
            .or_insert_with(|| label.to_string());
    }
    labels
}

/// Assemble registry entries from the three parsed CVM tables.
///
/// Pure: no filtering by class happens here, see [`filter_by_class`].
pub fn build_registry(
    funds: &RawTable,
    share_classes: &RawTable,
    class_history: &RawTable,
) -> Result<Vec<FundRegistryEntry>> {
    let cnpj_idx = funds.require_column("CNPJ_Fundo")?;
    let type_idx = funds.require_column("Tipo_Fundo")?;
    let name_idx = funds.require_column("Denominacao_Social")?;
    let status_idx = funds.require_column("Situacao")?;
    let adaptation_idx = funds.column("Data_Adaptacao_RCVM175");

    let history = current_classes(class_history)?;
    let fallback = share_class_labels(share_classes);

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for row in &funds.rows {
        let status = FundStatus::from_label(cell(row, status_idx));
        let fund_type = cell(row, type_idx);
        if !status.is_operating() || !ACCEPTED_FUND_TYPES.contains(&fund_type) {
            continue;
        }

        let cnpj = canonicalize(cell(row, cnpj_idx));
        if !seen.insert(cnpj.clone()) {
            warn!("Duplicate fund {} in CVM registry, keeping first entry", cnpj);
            continue;
        }

        let class_label = history
            .get(&cnpj)
            .or_else(|| fallback.get(&cnpj))
            .cloned();

        entries.push(FundRegistryEntry {
            class: class_label.as_deref().and_then(FundClass::from_label),
            class_label,
            cnpj,
            legal_name: cell(row, name_idx).to_string(),
            fund_type: fund_type.to_string(),
            status,
            adaptation_date: adaptation_idx.and_then(|i| parse_date(cell(row, i))),
        });
    }

    Ok(entries)
}

/// Keep entries whose class is in `allowed` (or which have no class).
pub fn filter_by_class(entries: Vec<FundRegistryEntry>, allowed: &[FundClass]) -> Vec<FundRegistryEntry> {
    entries
        .into_iter()
        .filter(|e| e.passes_class_filter(allowed))
        .collect()
}

/// Download and assemble the registry of operating funds.
///
/// `classes` is an optional allow-list of class names (see
/// [`FundClass::ALL`]); unknown names fail before any download.
pub fn fetch_registry(
    transport: &dyn Transport,
    config: &FundsConfig,
    classes: &[String],
) -> Result<Vec<FundRegistryEntry>> {
    let allowed = parse_class_filter(classes)?;
    let started = Instant::now();

    let history_bytes = transport.get(&format!("{}/{}", config.cvm_base_url, CLASS_HISTORY_ARCHIVE))?;
    let registry_bytes = transport.get(&format!("{}/{}", config.cvm_base_url, REGISTRY_ARCHIVE))?;

    let class_history = read_zip_csv(&history_bytes, CLASS_HISTORY_MEMBER)?;
    let funds = read_zip_csv(&registry_bytes, FUND_MEMBER)?;
    let share_classes = read_zip_csv(&registry_bytes, SHARE_CLASS_MEMBER)?;

    let entries = filter_by_class(build_registry(&funds, &share_classes, &class_history)?, &allowed);

    info!(
        "Registry finished in {:.2} minutes ({} funds)",
        started.elapsed().as_secs_f64() / 60.0,
        entries.len()
    );
    Ok(entries)
}
