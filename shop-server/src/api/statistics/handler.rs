//! Statistics API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::stats::{StatsAggregator, StatsRange, StatsReport};
use crate::utils::{AppError, AppResult, time};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// YYYY-MM-DD（含当天起始）
    pub start_date: Option<String>,
    /// YYYY-MM-DD（含当天结束）
    pub end_date: Option<String>,
}

/// GET /api/statistics?start_date=&end_date= - 销售报表（管理员）
pub async fn report(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<StatsReport>> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }

    let start = match &query.start_date {
        Some(s) => Some(time::parse_date_millis(s).ok_or_else(|| {
            AppError::Validation(format!("Invalid start_date: {s}"))
        })?),
        None => None,
    };
    let end = match &query.end_date {
        // 解析为次日零点，再退一毫秒得到含当天的上界
        Some(s) => Some(
            time::parse_date_end_millis(s)
                .ok_or_else(|| AppError::Validation(format!("Invalid end_date: {s}")))?
                - 1,
        ),
        None => None,
    };
    if let (Some(s), Some(e)) = (start, end)
        && s > e
    {
        return Err(AppError::Validation(
            "start_date must not be after end_date".to_string(),
        ));
    }

    let report = StatsAggregator::new(state.db.clone())
        .report(StatsRange { start, end })
        .await?;
    Ok(Json(report))
}
