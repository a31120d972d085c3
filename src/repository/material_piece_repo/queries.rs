use super::*;
use rusqlite::OptionalExtension;
use std::collections::HashMap;

impl MaterialPieceRepository {
    // ==========================================
    // FIFO 查询
    // ==========================================

    /// 可用棒料（先到先用）
    ///
    /// 仅返回 AVAILABLE 且 current_length > 0；按 receipt_date 升序，piece_id 兜底保证稳定。
    pub fn get_available_pieces(&self, material_id: i64) -> RepositoryResult<Vec<MaterialPiece>> {
        let conn = self.get_conn()?;
        Self::get_available_pieces_on(&conn, material_id)
    }

    pub(crate) fn get_available_pieces_on(
        conn: &Connection,
        material_id: i64,
    ) -> RepositoryResult<Vec<MaterialPiece>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM material_piece
            WHERE material_id = ?1
              AND status = 'AVAILABLE'
              AND current_length > 0
            ORDER BY receipt_date ASC, piece_id ASC
            "#,
            PIECE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let pieces = stmt
            .query_map(params![material_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pieces)
    }

    /// 满足长度要求的可用棒料
    ///
    /// 同一到货日期内短料优先，减少大料被切碎。
    pub fn get_available_pieces_meeting_length(
        &self,
        material_id: i64,
        required_length: i64,
    ) -> RepositoryResult<Vec<MaterialPiece>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM material_piece
            WHERE material_id = ?1
              AND status = 'AVAILABLE'
              AND current_length > 0
              AND current_length >= ?2
            ORDER BY receipt_date ASC, current_length ASC, piece_id ASC
            "#,
            PIECE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let pieces = stmt
            .query_map(params![material_id, required_length], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pieces)
    }

    /// 可用总长度（无可用棒料时为 0）
    pub fn total_available_length(&self, material_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(current_length), 0)
            FROM material_piece
            WHERE material_id = ?1 AND status = 'AVAILABLE' AND current_length > 0
            "#,
            params![material_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    // ==========================================
    // 单件/批量查询
    // ==========================================

    pub fn find_by_id(&self, piece_id: i64) -> RepositoryResult<Option<MaterialPiece>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM material_piece WHERE piece_id = ?1", PIECE_COLUMNS);
        let piece = conn
            .query_row(&sql, params![piece_id], map_row)
            .optional()?;
        Ok(piece)
    }

    /// 按 ID 集合批量查询（结果按 piece_id 升序，缺失的 ID 直接跳过）
    pub fn find_by_ids(&self, piece_ids: &[i64]) -> RepositoryResult<Vec<MaterialPiece>> {
        if piece_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM material_piece
            WHERE piece_id IN (SELECT value FROM json_each(?1))
            ORDER BY piece_id ASC
            "#,
            PIECE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let pieces = stmt
            .query_map(params![format_ids(piece_ids)?], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pieces)
    }

    /// 某材料的全部棒料，可按状态过滤
    pub fn list_by_material(
        &self,
        material_id: i64,
        status: Option<PieceStatus>,
    ) -> RepositoryResult<Vec<MaterialPiece>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM material_piece
            WHERE material_id = ?1
              AND (?2 IS NULL OR status = ?2)
            ORDER BY receipt_date ASC, piece_id ASC
            "#,
            PIECE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let pieces = stmt
            .query_map(params![material_id, status.map(|s| s.as_str())], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pieces)
    }

    /// 被某草案预留的棒料
    pub fn list_reserved_by_draft(&self, draft_id: i64) -> RepositoryResult<Vec<MaterialPiece>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM material_piece
            WHERE reserved_by_draft_id = ?1 AND status = 'RESERVED'
            ORDER BY piece_id ASC
            "#,
            PIECE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let pieces = stmt
            .query_map(params![draft_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pieces)
    }

    /// 当前长度（加入调用方事务）；不存在的 ID 不出现在结果中
    pub(crate) fn current_lengths_on(
        conn: &Connection,
        piece_ids: &[i64],
    ) -> RepositoryResult<HashMap<i64, i64>> {
        if piece_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut stmt = conn.prepare(
            r#"
            SELECT piece_id, current_length
            FROM material_piece
            WHERE piece_id IN (SELECT value FROM json_each(?1))
            "#,
        )?;
        let lengths = stmt
            .query_map(params![format_ids(piece_ids)?], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(lengths)
    }
}
