// ==========================================
// 棒料发料窗口 - 到货清单 CSV 解析
// ==========================================
// 表头: piece_no,material_id,length,weight,receipt_date,
//       grn_no,supplier,batch_no,unit_cost,location
// 日期: YYYY-MM-DD 或 YYYYMMDD
// 规则: 逐行校验并收集全部行错误；有任一错误则整批拒绝
// ==========================================

use crate::domain::piece::PieceReceipt;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 5] = ["piece_no", "material_id", "length", "weight", "receipt_date"];

#[derive(Debug, Deserialize)]
struct RawReceiptRow {
    piece_no: Option<String>,
    material_id: Option<String>,
    length: Option<String>,
    weight: Option<String>,
    receipt_date: Option<String>,
    grn_no: Option<String>,
    supplier: Option<String>,
    batch_no: Option<String>,
    unit_cost: Option<String>,
    location: Option<String>,
}

pub struct ReceiptCsvParser;

impl ReceiptCsvParser {
    /// 解析 CSV 文件
    pub fn parse_path(path: &Path) -> ImportResult<Vec<PieceReceipt>> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => {}
            other => {
                return Err(ImportError::UnsupportedFormat(
                    other.unwrap_or("").to_string(),
                ))
            }
        }

        let file = File::open(path)?;
        Self::parse_reader(file)
    }

    /// 从任意输入流解析
    pub fn parse_reader<R: Read>(input: R) -> ImportResult<Vec<PieceReceipt>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许可选列缺失
            .trim(Trim::All)
            .from_reader(input);

        let headers: StringRecord = reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h.eq_ignore_ascii_case(column)) {
                return Err(ImportError::MissingColumn(column.to_string()));
            }
        }
        let headers = StringRecord::from(
            headers
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect::<Vec<_>>(),
        );

        let mut receipts = Vec::new();
        let mut errors = Vec::new();

        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }

            let row: RawReceiptRow = match record.deserialize(Some(&headers)) {
                Ok(row) => row,
                Err(e) => {
                    errors.push(ImportError::Row {
                        line,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            match convert_row(row) {
                Ok(receipt) => receipts.push(receipt),
                Err(message) => errors.push(ImportError::Row { line, message }),
            }
        }

        if !errors.is_empty() {
            return Err(ImportError::InvalidRows(errors));
        }
        if receipts.is_empty() {
            return Err(ImportError::EmptyFile);
        }
        Ok(receipts)
    }
}

fn convert_row(row: RawReceiptRow) -> Result<PieceReceipt, String> {
    let piece_no = non_empty(row.piece_no).ok_or("件号为空")?;

    let material_id = required(row.material_id, "material_id")?
        .parse::<i64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or("material_id 必须为正整数")?;

    let length = required(row.length, "length")?
        .parse::<i64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or("长度必须为正整数")?;

    let weight = required(row.weight, "weight")?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or("重量必须为正数")?;

    let date_raw = required(row.receipt_date, "receipt_date")?;
    let receipt_date = parse_date(&date_raw)
        .ok_or_else(|| format!("到货日期格式错误: {}（期望 YYYY-MM-DD 或 YYYYMMDD）", date_raw))?;

    let unit_cost = match non_empty(row.unit_cost) {
        Some(raw) => Some(
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| format!("单价格式错误: {}", raw))?,
        ),
        None => None,
    };

    Ok(PieceReceipt {
        piece_no,
        material_id,
        length,
        weight,
        receipt_date,
        grn_no: non_empty(row.grn_no),
        supplier_name: non_empty(row.supplier),
        batch_no: non_empty(row.batch_no),
        unit_cost,
        location_code: non_empty(row.location),
        rack_no: None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    non_empty(value).ok_or_else(|| format!("{} 为空", field))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_rows() {
        let csv = "\
piece_no,material_id,length,weight,receipt_date,grn_no,supplier,batch_no,unit_cost,location
P-001,1,6000,59.2,2024-03-01,GRN-9,Acme Steel,B1,120.5,A-01
P-002,1,4500,44.4,20240302,,,,,
";
        let receipts = ReceiptCsvParser::parse_reader(csv.as_bytes()).unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].piece_no, "P-001");
        assert_eq!(receipts[0].supplier_name.as_deref(), Some("Acme Steel"));
        assert_eq!(receipts[0].unit_cost, Some(120.5));
        assert_eq!(
            receipts[1].receipt_date,
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
        assert_eq!(receipts[1].grn_no, None);
    }

    #[test]
    fn test_collects_every_row_error() {
        let csv = "\
piece_no,material_id,length,weight,receipt_date
P-001,1,0,10,2024-03-01
,1,6000,10,2024-03-01
P-003,1,6000,10,03/01/2024
P-004,1,6000,10,2024-03-01
";
        match ReceiptCsvParser::parse_reader(csv.as_bytes()) {
            Err(ImportError::InvalidRows(errors)) => {
                assert_eq!(errors.len(), 3);
                match &errors[0] {
                    ImportError::Row { line, .. } => assert_eq!(*line, 2),
                    other => panic!("expected Row error, got {:?}", other),
                }
            }
            other => panic!("expected InvalidRows, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "piece_no,material_id,length\nP-1,1,6000\n";
        assert!(matches!(
            ReceiptCsvParser::parse_reader(csv.as_bytes()),
            Err(ImportError::MissingColumn(c)) if c == "weight"
        ));
    }

    #[test]
    fn test_parse_path_checks_extension() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "piece_no,material_id,length,weight,receipt_date").unwrap();
        let result = ReceiptCsvParser::parse_path(temp_file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));

        let result = ReceiptCsvParser::parse_path(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }
}
