//! Shared fixtures for the integration tests: in-memory CVM archives served
//! through a `MemoryTransport`.

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::io::Write;
use zip::write::SimpleFileOptions;

use cotas::FundsConfig;

pub const REPORT_HEADER: &str =
    "TP_FUNDO_CLASSE;CNPJ_FUNDO_CLASSE;ID_SUBCLASSE;DT_COMPTC;VL_TOTAL;VL_QUOTA;VL_PATRIM_LIQ;CAPTC_DIA;RESG_DIA;NR_COTST";

/// Build an in-memory ZIP containing the given (name, content) members,
/// encoded as ISO-8859-1 like the files CVM publishes.
pub fn zip_archive(members: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .with_context(|| format!("adding {} to archive", name))?;
        let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(content);
        writer.write_all(&encoded)?;
    }
    Ok(writer.finish()?.into_inner())
}

pub fn class_history_url(config: &FundsConfig) -> String {
    format!("{}/FI/CAD/DADOS/cad_fi_hist.zip", config.cvm_base_url)
}

pub fn registry_url(config: &FundsConfig) -> String {
    format!("{}/FI/CAD/DADOS/registro_fundo_classe.zip", config.cvm_base_url)
}

/// Class history archive with one open-ended class per (cnpj, class) pair.
pub fn class_history_zip(classes: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut csv = String::from("CNPJ_FUNDO;DT_INI_CLASSE;DT_FIM_CLASSE;CLASSE");
    for (cnpj, class) in classes {
        csv.push_str(&format!("\n{};2015-01-01;;{}", cnpj, class));
    }
    zip_archive(&[("cad_fi_hist_classe.csv", &csv)])
}

/// Registry archive listing operating FI funds as (cnpj, legal name).
pub fn registry_zip(funds: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut csv = String::from("CNPJ_Fundo;Tipo_Fundo;Denominacao_Social;Situacao");
    for (cnpj, name) in funds {
        csv.push_str(&format!("\n{};FI;{};Em Funcionamento Normal", cnpj, name));
    }
    zip_archive(&[
        ("registro_fundo.csv", &csv),
        ("registro_classe.csv", "CNPJ_Classe;Denominacao_Social;Situacao;Classificacao"),
    ])
}

/// Monthly daily-report archive from (cnpj, date, quota) rows.
pub fn daily_report_zip(year: i32, month: u32, rows: &[(&str, &str, f64)]) -> Result<Vec<u8>> {
    let mut csv = String::from(REPORT_HEADER);
    for (cnpj, date, quota) in rows {
        csv.push_str(&format!(
            "\nFI;{};;{};1000000.0;{};50000000.0;0;0;500",
            cnpj, date, quota
        ));
    }
    let member = format!("inf_diario_fi_{:04}{:02}.csv", year, month);
    zip_archive(&[(&member, &csv)])
}
