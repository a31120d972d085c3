// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证多连接并发下的条件更新与草案预留冲突
// 场景: 每个线程持有独立连接（对应多个进程/窗口同时操作同一库）
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod concurrent_control_test {
    use material_issue_window::domain::issue_window::NewIssueWindowDraft;
    use material_issue_window::domain::types::PieceStatus;
    use material_issue_window::repository::{
        IssueWindowDraftRepository, MaterialPieceRepository, RepositoryError, SaveDraftOptions,
    };
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::test_helpers::{bar, create_test_db, cut, date, open_shared, receipt, seed_material};

    fn setup_piece(db_path: &str, piece_no: &str) -> i64 {
        let conn = open_shared(db_path);
        seed_material(conn.clone(), 1, "EN8-40", None);
        MaterialPieceRepository::new(conn)
            .insert_receipt(&receipt(piece_no, 1, 6000, date(2024, 3, 1)))
            .unwrap()
    }

    #[test]
    fn test_concurrent_allocate_only_one_wins() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let piece_id = setup_piece(&db_path, "P-1");

        const WORKERS: usize = 4;
        let barrier = Arc::new(Barrier::new(WORKERS));
        let handles: Vec<_> = (0..WORKERS)
            .map(|i| {
                let db_path = db_path.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let repo = MaterialPieceRepository::new(open_shared(&db_path));
                    barrier.wait();
                    repo.allocate(piece_id, 100 + i as i64).unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|applied| *applied)
            .count();
        assert_eq!(winners, 1);

        let piece = MaterialPieceRepository::new(open_shared(&db_path))
            .find_by_id(piece_id)
            .unwrap()
            .unwrap();
        assert_eq!(piece.status, PieceStatus::Allocated);
    }

    #[test]
    fn test_concurrent_save_draft_same_piece_conflicts() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let piece_id = setup_piece(&db_path, "P-1");

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let db_path = db_path.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let repo = IssueWindowDraftRepository::from_connection(open_shared(&db_path));
                    let draft = NewIssueWindowDraft {
                        requisition_ids: vec![10 + i],
                        notes: None,
                        bar_assignments: vec![bar(
                            1,
                            piece_id,
                            "P-1",
                            6000,
                            vec![cut(1, 10 + i, 1500)],
                        )],
                    };
                    barrier.wait();
                    repo.save_draft(&draft, &SaveDraftOptions::new(format!("planner-{}", i)))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let saved: Vec<i64> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        assert_eq!(saved.len(), 1, "恰好一个草案保存成功: {:?}", results);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(RepositoryError::ReservationConflict {
                requested: 1,
                reserved: 0
            })
        )));

        // 失败方整体回滚：只剩一个草案，棒料归属于成功方
        let conn = open_shared(&db_path);
        let drafts: i64 = conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM issue_window_draft", [], |row| row.get(0))
            .unwrap();
        assert_eq!(drafts, 1);

        let piece = MaterialPieceRepository::new(conn)
            .find_by_id(piece_id)
            .unwrap()
            .unwrap();
        assert_eq!(piece.status, PieceStatus::Reserved);
        assert_eq!(piece.reserved_by_draft_id, Some(saved[0]));
    }

    #[test]
    fn test_concurrent_drafts_on_distinct_pieces_get_distinct_numbers() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let first = setup_piece(&db_path, "P-1");
        let second = {
            let conn = open_shared(&db_path);
            MaterialPieceRepository::new(conn)
                .insert_receipt(&receipt("P-2", 1, 6000, date(2024, 3, 1)))
                .unwrap()
        };

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|piece_id| {
                let db_path = db_path.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let repo = IssueWindowDraftRepository::from_connection(open_shared(&db_path));
                    let draft = NewIssueWindowDraft {
                        requisition_ids: vec![10],
                        notes: None,
                        bar_assignments: vec![bar(1, piece_id, "P", 6000, vec![cut(1, 10, 1000)])],
                    };
                    barrier.wait();
                    let id = repo
                        .save_draft(&draft, &SaveDraftOptions::new("planner"))
                        .unwrap();
                    repo.find_header(id).unwrap().unwrap().draft_number
                })
            })
            .collect();

        let mut numbers: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 2);
    }
}
