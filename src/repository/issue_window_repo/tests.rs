use super::*;
use crate::domain::issue_window::{BarAssignmentInput, CutInput, NewIssueWindowDraft};
use crate::domain::material::MaterialSnapshot;
use crate::domain::piece::PieceReceipt;
use crate::domain::types::PieceStatus;
use crate::repository::error::RepositoryError;
use crate::repository::material_master_repo::MaterialMasterRepository;
use crate::repository::material_piece_repo::MaterialPieceRepository;
use chrono::NaiveDate;

struct Fixture {
    conn: Arc<Mutex<Connection>>,
    drafts: IssueWindowDraftRepository,
    pieces: MaterialPieceRepository,
}

fn setup() -> Fixture {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::ensure_schema(&conn).unwrap();
    let conn = Arc::new(Mutex::new(conn));

    MaterialMasterRepository::new(conn.clone())
        .upsert(&MaterialSnapshot {
            material_id: 1,
            material_code: "EN8-40".to_string(),
            material_name: "EN8 Round 40".to_string(),
            grade: Some("EN8".to_string()),
            diameter: Some(40.0),
            min_usable_length: None,
        })
        .unwrap();

    Fixture {
        drafts: IssueWindowDraftRepository::from_connection(conn.clone()),
        pieces: MaterialPieceRepository::new(conn.clone()),
        conn,
    }
}

fn add_piece(fx: &Fixture, piece_no: &str, length: i64) -> i64 {
    fx.pieces
        .insert_receipt(&PieceReceipt {
            piece_no: piece_no.to_string(),
            material_id: 1,
            length,
            weight: 60.0,
            receipt_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            grn_no: None,
            supplier_name: None,
            batch_no: None,
            unit_cost: None,
            location_code: None,
            rack_no: None,
        })
        .unwrap()
}

fn cut(item_id: i64, length: i64) -> CutInput {
    CutInput {
        requisition_item_id: item_id,
        requisition_id: 10,
        cut_length: length,
        part_name: Some(format!("PART-{}", item_id)),
        job_card_no: Some("JC-7".to_string()),
        requisition_no: Some("REQ-10".to_string()),
    }
}

fn bar(piece_id: i64, piece_no: &str, lengths: &[i64]) -> BarAssignmentInput {
    BarAssignmentInput {
        material_id: 1,
        piece_id,
        piece_no: piece_no.to_string(),
        piece_current_length: 6000,
        cuts: lengths
            .iter()
            .enumerate()
            .map(|(i, l)| cut(i as i64 + 1, *l))
            .collect(),
    }
}

fn march(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

#[test]
fn test_save_draft_computes_scrap_and_reserves() {
    let fx = setup();
    let a = add_piece(&fx, "P-1", 6000);
    let b = add_piece(&fx, "P-2", 6000);

    let draft = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: Some("first shift".to_string()),
        bar_assignments: vec![
            bar(a, "P-1", &[2000, 1500]),
            bar(b, "P-2", &[2000, 1500, 2300]),
        ],
    };
    let id = fx
        .drafts
        .save_draft(&draft, &SaveDraftOptions::new("planner").at(march(15)))
        .unwrap();

    let detail = fx.drafts.get_draft_detail(id).unwrap().unwrap();
    assert_eq!(detail.header.draft_number, "MIS-202403-001");
    assert_eq!(detail.header.status, DraftStatus::Draft);
    assert_eq!(detail.bar_assignments.len(), 2);

    let first = &detail.bar_assignments[0];
    assert_eq!(first.total_cut_length, 3500);
    assert_eq!(first.remaining_length, 2500);
    assert!(!first.will_be_scrap);
    assert_eq!(first.min_usable_length, 300);
    assert_eq!(first.material_code, "EN8-40");

    let second = &detail.bar_assignments[1];
    assert_eq!(second.total_cut_length, 5800);
    assert_eq!(second.remaining_length, 200);
    assert!(second.will_be_scrap);
    assert_eq!(
        second.cuts.iter().map(|c| c.cut_index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    for piece_id in [a, b] {
        let piece = fx.pieces.find_by_id(piece_id).unwrap().unwrap();
        assert_eq!(piece.status, PieceStatus::Reserved);
        assert_eq!(piece.reserved_by_draft_id, Some(id));
    }
}

#[test]
fn test_overcut_is_rejected_before_any_write() {
    let fx = setup();
    let a = add_piece(&fx, "P-1", 6000);

    let draft = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: None,
        bar_assignments: vec![bar(a, "P-1", &[4000, 2500])],
    };
    let result = fx.drafts.save_draft(&draft, &SaveDraftOptions::new("planner"));
    assert!(matches!(result, Err(RepositoryError::ValidationError(_))));

    assert!(fx.drafts.get_draft_summaries(None, 100).unwrap().is_empty());
    assert_eq!(
        fx.pieces.find_by_id(a).unwrap().unwrap().status,
        PieceStatus::Available
    );
}

#[test]
fn test_reservation_conflict_rolls_back_everything() {
    let fx = setup();
    let a = add_piece(&fx, "P-1", 6000);
    let b = add_piece(&fx, "P-2", 6000);
    fx.pieces.allocate(b, 99).unwrap();

    let draft = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: None,
        bar_assignments: vec![bar(a, "P-1", &[1000]), bar(b, "P-2", &[1000])],
    };
    let result = fx.drafts.save_draft(&draft, &SaveDraftOptions::new("planner"));
    match result {
        Err(RepositoryError::ReservationConflict {
            requested,
            reserved,
        }) => {
            assert_eq!(requested, 2);
            assert_eq!(reserved, 1);
        }
        other => panic!("expected ReservationConflict, got {:?}", other),
    }

    assert!(fx.drafts.get_draft_summaries(None, 100).unwrap().is_empty());
    assert_eq!(
        fx.pieces.find_by_id(a).unwrap().unwrap().status,
        PieceStatus::Available
    );

    let guard = fx.conn.lock().unwrap();
    let bars: i64 = guard
        .query_row("SELECT COUNT(*) FROM issue_window_bar_assignment", [], |r| r.get(0))
        .unwrap();
    let seq: i64 = guard
        .query_row("SELECT COUNT(*) FROM issue_window_number_seq", [], |r| r.get(0))
        .unwrap();
    assert_eq!(bars, 0);
    assert_eq!(seq, 0, "编号水位也应回滚");
}

#[test]
fn test_same_piece_in_two_bars_is_reserved_once() {
    let fx = setup();
    let a = add_piece(&fx, "P-1", 6000);

    let draft = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: None,
        bar_assignments: vec![bar(a, "P-1", &[1000]), bar(a, "P-1", &[2000])],
    };
    let id = fx
        .drafts
        .save_draft(&draft, &SaveDraftOptions::new("planner"))
        .unwrap();
    assert_eq!(fx.drafts.list_pieces_of_draft(id).unwrap(), vec![a]);
}

#[test]
fn test_state_machine_guards() {
    let fx = setup();
    let a = add_piece(&fx, "P-1", 6000);
    let draft = NewIssueWindowDraft {
        requisition_ids: vec![10, 11],
        notes: None,
        bar_assignments: vec![bar(a, "P-1", &[1000])],
    };
    let id = fx
        .drafts
        .save_draft(&draft, &SaveDraftOptions::new("planner"))
        .unwrap();

    // 未定稿不可发料
    assert!(!fx.drafts.mark_issued(id, "store", "shop").unwrap());
    assert!(fx.drafts.finalize_draft(id, "planner").unwrap());
    assert!(!fx.drafts.finalize_draft(id, "planner").unwrap());

    // 定稿后不可删除，且预留保持
    assert!(!fx.drafts.delete_draft(id, "planner").unwrap());
    assert_eq!(
        fx.pieces.find_by_id(a).unwrap().unwrap().status,
        PieceStatus::Reserved
    );

    assert!(fx.drafts.mark_issued(id, "store", "shop").unwrap());
    let header = fx.drafts.find_header(id).unwrap().unwrap();
    assert_eq!(header.status, DraftStatus::Issued);
    assert_eq!(header.issued_by.as_deref(), Some("store"));
    assert_eq!(header.received_by.as_deref(), Some("shop"));
    assert!(header.finalized_at.is_some());
    assert!(header.issued_at.is_some());

    let summaries = fx
        .drafts
        .get_draft_summaries(Some(DraftStatus::Issued), 100)
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].requisition_count, 2);
    assert_eq!(summaries[0].bar_count, 1);
    assert_eq!(summaries[0].cut_count, 1);
}

#[test]
fn test_delete_missing_draft_returns_false() {
    let fx = setup();
    assert!(!fx.drafts.delete_draft(404, "planner").unwrap());
    assert!(fx.drafts.get_draft_detail(404).unwrap().is_none());
}

#[test]
fn test_claimed_length_must_match_live_piece() {
    let fx = setup();
    let short = add_piece(&fx, "P-1", 1000);

    // bar() 声称 6000，实际只有 1000
    let draft = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: None,
        bar_assignments: vec![bar(short, "P-1", &[2000])],
    };
    match fx.drafts.save_draft(&draft, &SaveDraftOptions::new("planner")) {
        Err(RepositoryError::PieceLengthConflict {
            piece_id,
            expected,
            actual,
        }) => {
            assert_eq!(piece_id, short);
            assert_eq!(expected, 6000);
            assert_eq!(actual, 1000);
        }
        other => panic!("expected PieceLengthConflict, got {:?}", other),
    }

    assert!(fx.drafts.get_draft_summaries(None, 100).unwrap().is_empty());
    assert_eq!(
        fx.pieces.find_by_id(short).unwrap().unwrap().status,
        PieceStatus::Available
    );
    let bars: i64 = fx
        .conn
        .lock()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM issue_window_bar_assignment", [], |r| r.get(0))
        .unwrap();
    assert_eq!(bars, 0);
}

#[test]
fn test_consume_after_planning_is_caught_at_save() {
    let fx = setup();
    let a = add_piece(&fx, "P-1", 6000);
    let draft = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: None,
        bar_assignments: vec![bar(a, "P-1", &[5000])],
    };

    // 规划后、保存前被车间消耗
    assert!(fx.pieces.consume(a, 2000, 10.0).unwrap());

    let result = fx.drafts.save_draft(&draft, &SaveDraftOptions::new("planner"));
    assert!(matches!(
        result,
        Err(RepositoryError::PieceLengthConflict {
            expected: 6000,
            actual: 4000,
            ..
        })
    ));
    let piece = fx.pieces.find_by_id(a).unwrap().unwrap();
    assert_eq!(piece.status, PieceStatus::Available);
    assert_eq!(piece.current_length, 4000);
    assert!(fx.drafts.get_draft_summaries(None, 100).unwrap().is_empty());
}

#[test]
fn test_split_bars_over_live_length_or_unknown_piece_are_rejected() {
    let fx = setup();
    let a = add_piece(&fx, "P-1", 6000);

    // 每条分配单独都放得下，合计 7000 超过 6000
    let split = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: None,
        bar_assignments: vec![bar(a, "P-1", &[4000]), bar(a, "P-1", &[3000])],
    };
    assert!(matches!(
        fx.drafts.save_draft(&split, &SaveDraftOptions::new("planner")),
        Err(RepositoryError::ValidationError(_))
    ));

    let unknown = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: None,
        bar_assignments: vec![bar(4242, "P-X", &[1000])],
    };
    assert!(matches!(
        fx.drafts.save_draft(&unknown, &SaveDraftOptions::new("planner")),
        Err(RepositoryError::NotFound { .. })
    ));
    assert!(fx.drafts.get_draft_summaries(None, 100).unwrap().is_empty());
}

#[test]
fn test_reserved_piece_is_only_issued_through_its_finalized_draft() {
    let fx = setup();
    let a = add_piece(&fx, "P-1", 6000);
    let draft = NewIssueWindowDraft {
        requisition_ids: vec![10],
        notes: None,
        bar_assignments: vec![bar(a, "P-1", &[1000])],
    };
    let d1 = fx
        .drafts
        .save_draft(&draft, &SaveDraftOptions::new("planner"))
        .unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    // 直接发放、退回、分配都绕不过草案预留
    assert!(!fx.pieces.issue(a, 999, day, "store").unwrap());
    assert!(!fx.pieces.return_piece(a).unwrap());
    assert!(!fx.pieces.allocate(a, 5).unwrap());
    let piece = fx.pieces.find_by_id(a).unwrap().unwrap();
    assert_eq!(piece.status, PieceStatus::Reserved);
    assert_eq!(piece.reserved_by_draft_id, Some(d1));

    // 同一根棒料不能再进入第二个草案
    assert!(matches!(
        fx.drafts.save_draft(&draft, &SaveDraftOptions::new("planner")),
        Err(RepositoryError::ReservationConflict {
            requested: 1,
            reserved: 0
        })
    ));

    // 草案未定稿时不能按草案发放
    assert!(!fx.pieces.issue_reserved(a, d1, 999, day, "store").unwrap());

    assert!(fx.drafts.finalize_draft(d1, "planner").unwrap());
    assert!(!fx.pieces.issue_reserved(a, d1 + 1, 999, day, "store").unwrap());
    assert!(fx.pieces.issue_reserved(a, d1, 999, day, "store").unwrap());

    let piece = fx.pieces.find_by_id(a).unwrap().unwrap();
    assert_eq!(piece.status, PieceStatus::Issued);
    assert_eq!(piece.reserved_by_draft_id, None);
    assert_eq!(piece.issued_job_card_id, Some(999));
    assert!(!fx.pieces.issue_reserved(a, d1, 999, day, "store").unwrap());
}
