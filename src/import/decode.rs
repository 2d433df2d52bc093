use encoding_rs::WINDOWS_1252;

use crate::error::{AppError, AppResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Upload bytes as text: UTF-8 when valid, otherwise Latin-1 (decoded with the
/// Windows-1252 superset, as browsers do).
pub fn decode_upload(bytes: &[u8], max_bytes: usize) -> AppResult<String> {
    if bytes.len() > max_bytes {
        return Err(AppError::validation(
            "file",
            format!("file exceeds the {max_bytes} byte limit"),
        ));
    }
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            tracing::debug!("import upload is not UTF-8, decoding as Latin-1");
            let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
            Ok(text.into_owned())
        }
    }
}

/// Header row plus data records with their 1-based line numbers. Records the
/// reader could not parse are kept apart with the reader's reason.
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<(usize, Vec<String>)>,
    pub malformed: Vec<(usize, String)>,
}

pub fn read_table<R: std::io::Read>(source: R) -> AppResult<CsvTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::validation("file", format!("unreadable header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::validation("file", "CSV file is empty or has no header row"));
    }

    let mut rows = Vec::new();
    let mut malformed = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let line = err
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(idx + 2);
                malformed.push((line, format!("malformed CSV record: {err}")));
                continue;
            }
        };
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push((line, cells));
    }
    Ok(CsvTable {
        headers,
        rows,
        malformed,
    })
}
