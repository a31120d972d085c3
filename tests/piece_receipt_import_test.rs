// ==========================================
// 到货清单导入集成测试
// ==========================================
// 职责: CSV → 校验 → 单事务登记 → 审计；任一行无效整批不入库
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod piece_receipt_import_test {
    use material_issue_window::app::{commands, AppState};
    use material_issue_window::importer::ImportError;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{create_test_db, seed_material};

    fn setup() -> (NamedTempFile, AppState) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path).unwrap();
        seed_material(state.conn.clone(), 1, "EN8-40", None);
        (temp_file, state)
    }

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_import_registers_pieces_in_fifo_order() {
        let (_tmp, state) = setup();
        let csv = write_csv(
            "\
Piece_No,Material_ID,Length,Weight,Receipt_Date,GRN_No,Supplier,Location
P-200,1,6000,59.2,2024-03-05,GRN-2,Acme Steel,A-02
P-100,1,5000,49.3,20240301,GRN-1,Acme Steel,A-01
",
        );

        let summary = state
            .receipt_importer
            .import_file(csv.path(), "store")
            .unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.piece_ids.len(), 2);
        assert!(!summary.batch_id.is_empty());
        assert!(summary.file_name.ends_with(".csv"));

        let available = state.piece_api.get_available_pieces(1).unwrap();
        let nos: Vec<&str> = available.iter().map(|p| p.piece_no.as_str()).collect();
        assert_eq!(nos, vec!["P-100", "P-200"]);
        assert_eq!(available[0].grn_no.as_deref(), Some("GRN-1"));
        assert_eq!(available[0].location_code.as_deref(), Some("A-01"));

        let logs = state
            .action_log_repo
            .find_by_entity("MATERIAL_PIECE", &summary.piece_ids[0].to_string())
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_type, "ReceivePiece");
    }

    #[test]
    fn test_any_invalid_row_rejects_whole_file() {
        let (_tmp, state) = setup();
        let csv = write_csv(
            "\
piece_no,material_id,length,weight,receipt_date
P-1,1,6000,59.2,2024-03-05
P-2,1,-10,59.2,2024-03-05
P-3,1,6000,59.2,2024/03/05
",
        );

        match state.receipt_importer.import_file(csv.path(), "store") {
            Err(ImportError::InvalidRows(rows)) => assert_eq!(rows.len(), 2),
            other => panic!("expected InvalidRows, got {:?}", other),
        }
        assert!(state.piece_api.list_pieces(1, None).unwrap().is_empty());
    }

    #[test]
    fn test_missing_required_column_and_bad_file() {
        let (_tmp, state) = setup();
        let csv = write_csv("piece_no,material_id,length,receipt_date\nP-1,1,6000,2024-03-05\n");
        assert!(matches!(
            state.receipt_importer.import_file(csv.path(), "store"),
            Err(ImportError::MissingColumn(col)) if col == "weight"
        ));

        assert!(matches!(
            state
                .receipt_importer
                .import_file(Path::new("/nonexistent/receipts.csv"), "store"),
            Err(ImportError::FileNotFound(_))
        ));

        let header_only = write_csv("piece_no,material_id,length,weight,receipt_date\n");
        assert!(matches!(
            state.receipt_importer.import_file(header_only.path(), "store"),
            Err(ImportError::EmptyFile)
        ));
    }

    #[tokio::test]
    async fn test_import_command_returns_json_summary() {
        let (_tmp, state) = setup();
        let csv = write_csv(
            "piece_no,material_id,length,weight,receipt_date\nP-9,1,3000,29.6,2024-03-05\n",
        );

        let json = commands::import_piece_receipts(
            &state,
            csv.path().to_string_lossy().to_string(),
            "store".to_string(),
        )
        .await
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["imported"], 1);

        let listed = commands::list_available_pieces(&state, 1, Some(2000))
            .await
            .unwrap();
        let pieces: serde_json::Value = serde_json::from_str(&listed).unwrap();
        assert_eq!(pieces.as_array().map(|a| a.len()), Some(1));

        let err = commands::import_piece_receipts(
            &state,
            "/nonexistent/receipts.csv".to_string(),
            "store".to_string(),
        )
        .await
        .unwrap_err();
        let value: serde_json::Value = serde_json::from_str(&err).unwrap();
        assert_eq!(value["code"], "IMPORT_ERROR");
    }
}
