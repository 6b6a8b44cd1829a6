//! Generated HTML fragments for the dynamic report regions

use crate::format::{display_timestamp, format_yen, group_thousands, html_escape};
use crate::normalizer::NormalizationSummary;
use crate::statistics::UtilizationSummary;
use crate::types::{LicenseStatistics, TierPolicy, UserLicenseRecord};
use chrono::NaiveDateTime;

/// Everything the renderer needs for one report
#[derive(Debug, Clone, Copy)]
pub struct ReportView<'a> {
    pub statistics: &'a LicenseStatistics,
    pub utilization: UtilizationSummary,
    pub records: &'a [UserLicenseRecord],
    pub summary: &'a NormalizationSummary,
    pub policy: &'a TierPolicy,
    pub generated_at: NaiveDateTime,
}

pub fn timestamp_line(generated_at: &NaiveDateTime) -> String {
    format!("レポート生成日時: {}", display_timestamp(generated_at))
}

pub fn user_count_sentence(user_count: usize) -> String {
    format!("対象ユーザー数: {}名", group_thousands(user_count as u64))
}

pub fn footer_line(generated_at: &NaiveDateTime) -> String {
    format!(
        "Microsoft 365 ライセンス管理ツール | 自動生成レポート ({})",
        display_timestamp(generated_at)
    )
}

fn summary_card(label: &str, value: &str, note: &str, extra_class: Option<&str>) -> String {
    let class = match extra_class {
        Some(extra) => format!("summary-card {}", extra),
        None => "summary-card".to_string(),
    };
    format!(
        concat!(
            "\n    <div class=\"{}\">",
            "<div class=\"card-label\">{}</div>",
            "<div class=\"card-value\">{}</div>",
            "<div class=\"card-note\">{}</div></div>"
        ),
        class,
        html_escape(label),
        html_escape(value),
        html_escape(note)
    )
}

/// Overall cards followed by one card per plan
pub fn summary_cards(view: &ReportView<'_>) -> String {
    let stats = view.statistics;
    let mut html = String::new();

    html.push_str(&summary_card(
        "総購入ライセンス",
        &group_thousands(stats.total_purchased()),
        &format!("{}プラン", stats.plan_count()),
        None,
    ));
    html.push_str(&summary_card(
        "割り当て済み",
        &group_thousands(stats.total_assigned()),
        "利用中のライセンス",
        None,
    ));
    html.push_str(&summary_card(
        "未使用",
        &group_thousands(stats.total_unused()),
        "削減候補のライセンス",
        None,
    ));
    html.push_str(&summary_card(
        "利用率",
        &format!("{:.1}%", view.utilization.rate),
        view.utilization.level.label(),
        Some(view.utilization.level.css_class()),
    ));
    html.push_str(&summary_card(
        "月額コスト合計",
        &format_yen(view.summary.total_monthly_cost),
        &format!("平均 {}/ユーザー", format_yen(view.summary.average_monthly_cost)),
        None,
    ));

    for (name, plan) in stats.plans() {
        html.push_str(&summary_card(
            name,
            &format!(
                "{} / {}",
                group_thousands(u64::from(plan.assigned)),
                group_thousands(u64::from(plan.total))
            ),
            &format!("利用率 {:.1}% ・ 未使用 {}", plan.utilization_rate, plan.available),
            Some("plan-card"),
        ));
    }

    html.push('\n');
    html
}

/// Table rows; an empty string for an empty user list
pub fn table_rows(records: &[UserLicenseRecord], policy: &TierPolicy) -> String {
    records
        .iter()
        .map(|record| {
            format!(
                concat!(
                    "\n<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td>",
                    "<td class=\"cost\">{}</td><td>{}</td><td>{}</td></tr>"
                ),
                policy.row_class(&record.license_type).css_class(),
                record.sequence_no,
                html_escape(&record.display_name),
                html_escape(&record.department_code),
                html_escape(&record.license_type),
                format_yen(record.monthly_cost),
                html_escape(&record.utilization_status),
                html_escape(&record.optimization_status),
            )
        })
        .collect()
}

/// Dropdown options: "all" plus each distinct license label in row order
pub fn filter_options(records: &[UserLicenseRecord]) -> String {
    let mut labels: Vec<&str> = Vec::new();
    for record in records {
        let label = record.license_type.as_str();
        if !label.is_empty() && !labels.contains(&label) {
            labels.push(label);
        }
    }

    let mut html = String::from("<option value=\"\">すべてのライセンス</option>");
    for label in labels {
        let escaped = html_escape(label);
        html.push_str(&format!("<option value=\"{}\">{}</option>", escaped, escaped));
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowClass;

    fn record(no: usize, name: &str, license: &str) -> UserLicenseRecord {
        UserLicenseRecord {
            sequence_no: no,
            display_name: name.to_string(),
            department_code: String::new(),
            license_count: 1,
            license_type: license.to_string(),
            monthly_cost: 1000,
            last_signin: None,
            utilization_status: "利用中".to_string(),
            optimization_status: "最適".to_string(),
            email: String::new(),
            created_at: String::new(),
            analyzed_at: String::new(),
        }
    }

    #[test]
    fn test_empty_user_list() {
        assert_eq!(user_count_sentence(0), "対象ユーザー数: 0名");
        assert_eq!(table_rows(&[], &TierPolicy::default()), "");
    }

    #[test]
    fn test_row_classes() {
        let policy = TierPolicy::default();
        let rows = table_rows(
            &[
                record(1, "A", "Microsoft 365 E3"),
                record(2, "B", "Exchange Online Basic"),
                record(3, "C", "Business Basic"),
            ],
            &policy,
        );
        let classes: Vec<&str> = rows
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.split('"').nth(1).unwrap())
            .collect();
        assert_eq!(
            classes,
            vec![
                RowClass::Normal.css_class(),
                RowClass::Attention.css_class(),
                RowClass::Info.css_class()
            ]
        );
    }

    #[test]
    fn test_cells_are_escaped() {
        let rows = table_rows(&[record(1, "<script>x</script>", "E3")], &TierPolicy::default());
        assert!(rows.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!rows.contains("<script>"));
    }

    #[test]
    fn test_filter_options_are_distinct() {
        let options = filter_options(&[
            record(1, "A", "Microsoft 365 E3"),
            record(2, "B", "Microsoft 365 E3"),
            record(3, "C", ""),
        ]);
        assert_eq!(
            options,
            concat!(
                "<option value=\"\">すべてのライセンス</option>",
                "<option value=\"Microsoft 365 E3\">Microsoft 365 E3</option>"
            )
        );
    }
}
