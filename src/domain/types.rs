// ==========================================
// 棒料发料窗口 - 领域类型定义
// ==========================================
// 棒料件状态机 + 发料窗口草案状态机
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 棒料件状态 (Piece Status)
// ==========================================
// 状态字段即互斥锁：所有写入都是 "WHERE status = 期望状态" 的条件更新
//
// AVAILABLE ──reserve──▶ RESERVED ──release──▶ AVAILABLE
//     │                     │
//     │                     └──issue_reserved(草案已定稿)──▶ ISSUED
//     ├──allocate──▶ ALLOCATED ──issue──▶ ISSUED ──consume(=0)──▶ CONSUMED
//     └──────────────issue──────────────▶ ISSUED
// ALLOCATED / ISSUED ──return──▶ AVAILABLE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceStatus {
    Available, // 在库可用
    Reserved,  // 被发料窗口草案预留
    Allocated, // 已分配给领料单
    Issued,    // 已发放到工卡
    Consumed,  // 已耗尽
}

impl PieceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PieceStatus::Available => "AVAILABLE",
            PieceStatus::Reserved => "RESERVED",
            PieceStatus::Allocated => "ALLOCATED",
            PieceStatus::Issued => "ISSUED",
            PieceStatus::Consumed => "CONSUMED",
        }
    }

    /// 从数据库字符串解析；未知值返回 None（调用方决定如何报错）
    pub fn parse(s: &str) -> Option<PieceStatus> {
        match s.trim().to_uppercase().as_str() {
            "AVAILABLE" => Some(PieceStatus::Available),
            "RESERVED" => Some(PieceStatus::Reserved),
            "ALLOCATED" => Some(PieceStatus::Allocated),
            "ISSUED" => Some(PieceStatus::Issued),
            "CONSUMED" => Some(PieceStatus::Consumed),
            _ => None,
        }
    }

    /// 状态机允许的迁移（由 PieceTransition 的源/目标状态导出）
    pub fn can_transition_to(&self, next: PieceStatus) -> bool {
        PieceTransition::ALL
            .iter()
            .any(|t| t.target() == next && t.sources().contains(self))
    }

    /// 是否仍可出现在 FIFO 候选池中
    pub fn is_pickable(&self) -> bool {
        matches!(self, PieceStatus::Available)
    }
}

impl fmt::Display for PieceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 棒料件迁移 (Piece Transition)
// ==========================================
// 每个迁移的源状态集合直接绑定到仓储的条件 UPDATE，SQL 中不再硬编码状态字面量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceTransition {
    Reserve,       // 草案预留
    Release,       // 草案释放
    Allocate,      // 分配给领料单
    Issue,         // 直接发放（不经草案）
    IssueReserved, // 按已定稿草案发放其预留棒料
    Consume,       // 消耗（长度归零时进入目标状态）
    Return,        // 退回
}

impl PieceTransition {
    pub const ALL: [PieceTransition; 7] = [
        PieceTransition::Reserve,
        PieceTransition::Release,
        PieceTransition::Allocate,
        PieceTransition::Issue,
        PieceTransition::IssueReserved,
        PieceTransition::Consume,
        PieceTransition::Return,
    ];

    pub fn sources(&self) -> &'static [PieceStatus] {
        use PieceStatus::*;
        match self {
            PieceTransition::Reserve => &[Available],
            PieceTransition::Release => &[Reserved],
            PieceTransition::Allocate => &[Available],
            PieceTransition::Issue => &[Available, Allocated],
            PieceTransition::IssueReserved => &[Reserved],
            PieceTransition::Consume => &[Available, Allocated, Issued],
            PieceTransition::Return => &[Allocated, Issued],
        }
    }

    pub fn target(&self) -> PieceStatus {
        match self {
            PieceTransition::Reserve => PieceStatus::Reserved,
            PieceTransition::Release | PieceTransition::Return => PieceStatus::Available,
            PieceTransition::Allocate => PieceStatus::Allocated,
            PieceTransition::Issue | PieceTransition::IssueReserved => PieceStatus::Issued,
            PieceTransition::Consume => PieceStatus::Consumed,
        }
    }

    /// 源状态的数据库字符串列表
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources().iter().map(PieceStatus::as_str).collect()
    }
}

// ==========================================
// 发料窗口草案状态 (Draft Status)
// ==========================================
// DRAFT → FINALIZED → ISSUED，单向；DRAFT 可删除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftStatus {
    Draft,
    Finalized,
    Issued,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "DRAFT",
            DraftStatus::Finalized => "FINALIZED",
            DraftStatus::Issued => "ISSUED",
        }
    }

    pub fn parse(s: &str) -> Option<DraftStatus> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Some(DraftStatus::Draft),
            "FINALIZED" => Some(DraftStatus::Finalized),
            "ISSUED" => Some(DraftStatus::Issued),
            _ => None,
        }
    }

    pub const ALL: [DraftStatus; 3] = [DraftStatus::Draft, DraftStatus::Finalized, DraftStatus::Issued];

    /// 不允许跳级，不允许回退
    pub fn can_transition_to(&self, next: DraftStatus) -> bool {
        matches!(
            (self, next),
            (DraftStatus::Draft, DraftStatus::Finalized)
                | (DraftStatus::Finalized, DraftStatus::Issued)
        )
    }

    /// 迁移到 next 要求的前驱状态；next 不可达时为 None
    pub fn source_of(next: DraftStatus) -> Option<DraftStatus> {
        DraftStatus::ALL
            .into_iter()
            .find(|s| s.can_transition_to(next))
    }

    /// 仅 DRAFT 状态允许删除
    pub fn is_deletable(&self) -> bool {
        matches!(self, DraftStatus::Draft)
    }

    /// 该状态下允许按草案发放其预留棒料
    pub fn allows_piece_issue(&self) -> bool {
        matches!(self, DraftStatus::Finalized | DraftStatus::Issued)
    }

    /// 满足谓词的状态的数据库字符串列表
    pub fn names_where(pred: impl Fn(&DraftStatus) -> bool) -> Vec<&'static str> {
        DraftStatus::ALL
            .iter()
            .filter(|s| pred(*s))
            .map(DraftStatus::as_str)
            .collect()
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
