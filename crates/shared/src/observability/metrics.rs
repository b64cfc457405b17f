//! 业务指标模块
//!
//! 基于 metrics crate 记录会员积分相关指标。指标导出由宿主进程安装的 recorder 决定，
//! 未安装 recorder 时记录操作为空操作。

/// 注册指标描述
pub fn register_descriptions(service_name: &str) {
    metrics::describe_counter!(
        "loyalty_redemptions_total",
        "Total number of reward redemptions by result"
    );
    metrics::describe_counter!(
        "loyalty_points_adjustments_total",
        "Total number of points ledger mutations by operation"
    );
    metrics::describe_counter!(
        "loyalty_tier_changes_total",
        "Total number of tier reassignments by direction"
    );
    metrics::describe_counter!(
        "loyalty_concurrency_retries_total",
        "Total number of optimistic concurrency retries"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 记录兑换结果
#[inline]
pub fn record_redemption(result: &str) {
    metrics::counter!("loyalty_redemptions_total", "result" => result.to_string()).increment(1);
}

/// 记录积分变动
#[inline]
pub fn record_points_adjustment(operation: &str) {
    metrics::counter!(
        "loyalty_points_adjustments_total",
        "op" => operation.to_string()
    )
    .increment(1);
}

/// 记录等级变化
#[inline]
pub fn record_tier_change(direction: &str) {
    metrics::counter!(
        "loyalty_tier_changes_total",
        "direction" => direction.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        register_descriptions("test-service");
        record_redemption("success");
        record_points_adjustment("add");
        record_tier_change("upgrade");
    }
}
