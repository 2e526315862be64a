//! Terminal rendering for metrics, risks and answers.
//!
//! Missing values always print as "N/A"; nothing here invents a number.

use finlens_core::{MetricPair, MetricsRecord, Profitability, QueryResponse, RiskSummary};

pub const NOT_AVAILABLE: &str = "N/A";

/// Millions, with thousands separators: `1234.5` -> `$1,234.5M`.
pub fn format_millions(value: Option<f64>) -> String {
    match value {
        Some(v) => {
            let sign = if v < 0.0 { "-" } else { "" };
            format!("{sign}${}M", group_thousands(v.abs()))
        }
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.1}%"))
}

pub fn format_eps(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.2}"))
}

/// Year-over-year change, when both periods are known and the base is non-zero.
pub fn change_percent(pair: &MetricPair) -> Option<f64> {
    match (pair.current, pair.previous) {
        (Some(current), Some(previous)) if previous != 0.0 => {
            Some((current - previous) / previous.abs() * 100.0)
        }
        _ => None,
    }
}

fn group_thousands(value: f64) -> String {
    let rounded = format!("{value:.1}");
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), "0"));

    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if fraction == "0" {
        grouped
    } else {
        format!("{grouped}.{fraction}")
    }
}

fn pair_line(label: &str, pair: &MetricPair, format: fn(Option<f64>) -> String) -> String {
    let change = change_percent(pair)
        .map(|c| format!("  ({c:+.1}% YoY)"))
        .unwrap_or_default();
    format!(
        "   {:<14} {:>14}  (prev {}){}",
        label,
        format(pair.current),
        format(pair.previous),
        change
    )
}

fn profitability_badge(status: Profitability) -> &'static str {
    match status {
        Profitability::Profitable => "🟢",
        Profitability::LossMaking => "🔴",
        Profitability::Breakeven => "🟡",
        Profitability::Unknown => "⚪",
    }
}

pub fn render_metrics(record: &MetricsRecord) -> String {
    let text = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let status = record.profitability();

    let lines = [
        "📈 Key Metrics".to_string(),
        format!("   {:<14} {}", "Company", text(&record.company_name)),
        format!("   {:<14} {}", "Fiscal year", text(&record.fiscal_year)),
        format!("   {:<14} {:>14}", "Total assets", format_millions(record.assets)),
        pair_line("Revenue", &record.revenue, format_millions),
        pair_line("Net profit", &record.net_profit, format_millions),
        pair_line("Profit margin", &record.profit_margin, format_percent),
        pair_line("EPS", &record.eps, format_eps),
        String::new(),
        format!("📊 Profitability Status: {} {}", profitability_badge(status), status),
    ];
    lines.join("\n")
}

pub fn render_risks(risks: Option<&RiskSummary>) -> String {
    match risks {
        Some(summary) => format!("⚠️  Risk Factors & Highlights\n{}", summary.as_str()),
        None => format!("⚠️  Risk Factors & Highlights\n{NOT_AVAILABLE}"),
    }
}

pub fn render_answer(response: &QueryResponse) -> String {
    let mut out = format!("🤖 {}", response.answer);
    if !response.sources.is_empty() {
        let pages: Vec<String> = response.sources.iter().map(|s| s.page.to_string()).collect();
        out.push_str(&format!("\n   📎 pages {}", pages.join(", ")));
    }
    out
}
