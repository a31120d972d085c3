// ==========================================
// 棒料发料窗口 - 命令行入口
// ==========================================
// 用法:
//   material-issue available <material_id> [required_length]
//   material-issue drafts [status]
//   material-issue detail <draft_id>...
//   material-issue import-receipts <file.csv> <operator>
//   material-issue finalize <draft_id> <operator>
//   material-issue delete <draft_id> <operator>
//   material-issue issue <draft_id> <issued_by> <received_by>
//   material-issue issue-piece <piece_id> <draft_id> <job_card_id> <YYYY-MM-DD> <issued_by>
//
// 数据库路径: MATERIAL_ISSUE_DB_PATH，否则用户数据目录
// 日志格式: MATERIAL_ISSUE_LOG_FORMAT=json 输出 JSON 行
// ==========================================

use material_issue_window::app::{commands, get_default_db_path, AppState};

const USAGE: &str = "用法: material-issue <available|drafts|detail|import-receipts|finalize|delete|issue|issue-piece> [参数...]";

fn parse_i64(arg: Option<String>, name: &str) -> Result<i64, String> {
    let raw = arg.ok_or_else(|| format!("缺少参数: {}\n{}", name, USAGE))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|e| format!("参数 {} 不是整数: {} ({})", name, raw, e))
}

fn required(arg: Option<String>, name: &str) -> Result<String, String> {
    arg.ok_or_else(|| format!("缺少参数: {}\n{}", name, USAGE))
}

async fn run(state: &AppState, mut args: impl Iterator<Item = String>) -> Result<String, String> {
    let command = args.next().ok_or_else(|| USAGE.to_string())?;

    match command.as_str() {
        "available" => {
            let material_id = parse_i64(args.next(), "material_id")?;
            let required_length = match args.next() {
                Some(v) => Some(parse_i64(Some(v), "required_length")?),
                None => None,
            };
            commands::list_available_pieces(state, material_id, required_length).await
        }
        "drafts" => commands::list_issue_window_drafts(state, args.next()).await,
        "detail" => {
            let ids = args
                .map(|a| parse_i64(Some(a), "draft_id"))
                .collect::<Result<Vec<_>, _>>()?;
            match ids.as_slice() {
                [] => Err(format!("缺少参数: draft_id\n{}", USAGE)),
                [single] => commands::get_issue_window_draft_detail(state, *single).await,
                _ => commands::get_issue_window_draft_details(state, ids).await,
            }
        }
        "import-receipts" => {
            let file = required(args.next(), "file")?;
            let operator = required(args.next(), "operator")?;
            commands::import_piece_receipts(state, file, operator).await
        }
        "finalize" => {
            let draft_id = parse_i64(args.next(), "draft_id")?;
            let operator = required(args.next(), "operator")?;
            commands::finalize_issue_window_draft(state, draft_id, operator).await
        }
        "delete" => {
            let draft_id = parse_i64(args.next(), "draft_id")?;
            let operator = required(args.next(), "operator")?;
            commands::delete_issue_window_draft(state, draft_id, operator).await
        }
        "issue" => {
            let draft_id = parse_i64(args.next(), "draft_id")?;
            let issued_by = required(args.next(), "issued_by")?;
            let received_by = required(args.next(), "received_by")?;
            commands::mark_issue_window_issued(state, draft_id, issued_by, received_by).await
        }
        "issue-piece" => {
            let piece_id = parse_i64(args.next(), "piece_id")?;
            let draft_id = parse_i64(args.next(), "draft_id")?;
            let job_card_id = parse_i64(args.next(), "job_card_id")?;
            let issued_date = required(args.next(), "issued_date")?;
            let issued_by = required(args.next(), "issued_by")?;
            commands::issue_reserved_piece(
                state,
                piece_id,
                draft_id,
                job_card_id,
                issued_date,
                issued_by,
            )
            .await
        }
        other => Err(format!("未知命令: {}\n{}", other, USAGE)),
    }
}

#[tokio::main]
async fn main() {
    material_issue_window::logging::init_from_env();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", material_issue_window::APP_NAME, material_issue_window::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    match run(&state, std::env::args().skip(1)).await {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
