use crate::models::Lead;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const NAME_COLUMN: &str = "Nome Completo";
const PHONE_COLUMN: &str = "Telefone";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("O arquivo deve conter a coluna \"{0}\".")]
    MissingColumn(&'static str),
    #[error("A planilha enviada está vazia.")]
    EmptySheet,
    #[error("Erro ao ler o arquivo CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Erro ao ler a planilha: {0}")]
    Spreadsheet(#[from] calamine::Error),
}

/// Parses an uploaded sheet into leads, dispatching on the file extension.
/// Anything that is not an Excel workbook is treated as CSV.
///
/// Rows whose name or phone cell is blank are dropped, not errors: real
/// sheets arrive with trailing half-filled lines and the campaign should
/// dial everyone else anyway.
pub fn parse_leads(filename: &str, data: &[u8]) -> Result<Vec<Lead>, IngestError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();
    match extension.as_str() {
        "xls" | "xlsx" => parse_spreadsheet(data),
        _ => parse_csv(data),
    }
}

struct ColumnMap {
    name: usize,
    phone: usize,
    national_id: Option<usize>,
    enrollment_id: Option<usize>,
    employer: Option<usize>,
}

/// Header matching is trimmed and case-insensitive; a stray BOM on the first
/// header is ignored.
fn resolve_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Result<ColumnMap, IngestError> {
    let mut name = None;
    let mut phone = None;
    let mut national_id = None;
    let mut enrollment_id = None;
    let mut employer = None;

    for (index, header) in headers.enumerate() {
        let normalized = header.trim_start_matches('\u{feff}').trim().to_lowercase();
        match normalized.as_str() {
            "nome completo" => name = name.or(Some(index)),
            "telefone" => phone = phone.or(Some(index)),
            "cpf" => national_id = national_id.or(Some(index)),
            "matricula" | "matrícula" => enrollment_id = enrollment_id.or(Some(index)),
            "empregador" => employer = employer.or(Some(index)),
            _ => {}
        }
    }

    Ok(ColumnMap {
        name: name.ok_or(IngestError::MissingColumn(NAME_COLUMN))?,
        phone: phone.ok_or(IngestError::MissingColumn(PHONE_COLUMN))?,
        national_id,
        enrollment_id,
        employer,
    })
}

fn build_lead(columns: &ColumnMap, cell: impl Fn(usize) -> String) -> Option<Lead> {
    let optional = |index: Option<usize>| index.map(&cell).unwrap_or_default();
    let lead = Lead {
        full_name: cell(columns.name),
        phone_raw: cell(columns.phone),
        national_id: optional(columns.national_id),
        enrollment_id: optional(columns.enrollment_id),
        employer: optional(columns.employer),
    };
    if lead.full_name.is_empty() || lead.phone_raw.is_empty() {
        debug!(name = %lead.full_name, "dropping row without name or phone");
        None
    } else {
        Some(lead)
    }
}

fn parse_csv(data: &[u8]) -> Result<Vec<Lead>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);
    let headers = reader.headers()?.clone();
    let columns = resolve_columns(headers.iter())?;

    let mut leads = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |index: usize| record.get(index).unwrap_or("").trim().to_string();
        if let Some(lead) = build_lead(&columns, cell) {
            leads.push(lead);
        }
    }
    Ok(leads)
}

fn parse_spreadsheet(data: &[u8]) -> Result<Vec<Lead>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(IngestError::EmptySheet)??;

    let mut rows = range.rows();
    let header_cells: Vec<String> = rows
        .next()
        .ok_or(IngestError::EmptySheet)?
        .iter()
        .map(cell_to_string)
        .collect();
    let columns = resolve_columns(header_cells.iter().map(String::as_str))?;

    let mut leads = Vec::new();
    for row in rows {
        let cell = |index: usize| row.get(index).map(cell_to_string).unwrap_or_default();
        if let Some(lead) = build_lead(&columns, cell) {
            leads.push(lead);
        }
    }
    Ok(leads)
}

/// Spreadsheet cells come back typed; phone and document columns routinely
/// arrive as floats, so integral floats render without the trailing `.0`.
fn cell_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}
