//! Server-rendered dashboard page.

use std::fmt::Write;

use super::types::{ActivitySummary, DashboardView, Section};
use crate::normalize::{Block, NetworkStats, Transaction, Wallet};

const STYLE: &str = "body{font-family:sans-serif;margin:2rem;background:#f6f7f9;color:#1d2330}\
section{background:#fff;border-radius:6px;padding:1rem 1.5rem;margin-bottom:1.5rem}\
table{border-collapse:collapse;width:100%}td,th{text-align:left;padding:.3rem .6rem;border-bottom:1px solid #e3e6eb}\
.badge{font-size:.75rem;padding:.15rem .5rem;border-radius:4px;margin-left:.5rem}\
.live{background:#d7f5df;color:#13632b}.stale{background:#fdf0cc;color:#7a5300}\
.unavailable{background:#f9d9d9;color:#8a1c1c}.estimated{color:#b26b00;cursor:help}\
.mono{font-family:monospace}";

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn badge<T>(section: &Section<T>) -> String {
    match section {
        Section::Live { .. } => r#"<span class="badge live">live</span>"#.to_string(),
        Section::Stale { as_of, cause, .. } => format!(
            r#"<span class="badge stale" title="{}">stale (as of {})</span>"#,
            escape_html(&cause.to_string()),
            as_of.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        Section::Unavailable { .. } => {
            r#"<span class="badge unavailable">unavailable</span>"#.to_string()
        }
    }
}

fn marker(estimated: &[String], field: &str) -> &'static str {
    if estimated.iter().any(|f| f == field) {
        r#"<span class="estimated" title="estimated">*</span>"#
    } else {
        ""
    }
}

fn short(hash: &str) -> String {
    if hash.is_ascii() && hash.len() > 14 {
        format!("{}…{}", &hash[..8], &hash[hash.len() - 4..])
    } else {
        hash.to_string()
    }
}

fn open_section<T>(out: &mut String, title: &str, section: &Section<T>) {
    let _ = write!(
        out,
        r#"<section data-state="{}"><h2>{}{}</h2>"#,
        section.state(),
        title,
        badge(section)
    );
    if let Section::Unavailable { reason } = section {
        let _ = write!(out, "<p>No data available: {}</p>", escape_html(reason));
    }
}

fn wallet_section(out: &mut String, section: &Section<Wallet>) {
    open_section(out, "Wallet", section);
    if let Some(wallet) = section.data() {
        let _ = write!(
            out,
            r#"<p class="mono">{}</p><p><strong>{}{} QUAI</strong></p><p>Updated {}</p>"#,
            escape_html(&wallet.address),
            wallet.balance,
            marker(&wallet.estimated, "balance"),
            wallet.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    out.push_str("</section>");
}

fn stats_section(out: &mut String, section: &Section<NetworkStats>) {
    open_section(out, "Network", section);
    if let Some(stats) = section.data() {
        let latest = stats
            .latest_block
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        let gas_price = stats
            .gas_price_gwei
            .as_ref()
            .map_or_else(|| "-".to_string(), |g| format!("{} gwei", g));
        let _ = write!(
            out,
            "<table><tr><th>Status</th><td>{}</td></tr>\
             <tr><th>Latest block</th><td>{}</td></tr>\
             <tr><th>Transactions ({} blocks)</th><td>{}</td></tr>\
             <tr><th>Active addresses</th><td>{}</td></tr>\
             <tr><th>Avg gas used</th><td>{}</td></tr>\
             <tr><th>Tx / second</th><td>{:.2}</td></tr>\
             <tr><th>Gas price</th><td>{}</td></tr></table>",
            stats.status.as_str(),
            latest,
            stats.blocks_sampled,
            stats.total_transactions,
            stats.active_addresses,
            stats.avg_gas_used,
            stats.tx_per_second,
            gas_price
        );
    }
    out.push_str("</section>");
}

fn transactions_section(out: &mut String, section: &Section<Vec<Transaction>>) {
    open_section(out, "Recent transactions", section);
    match section.data() {
        Some(txs) if txs.is_empty() => out.push_str("<p>No transactions found.</p>"),
        Some(txs) => {
            out.push_str(
                "<table><tr><th>Hash</th><th>Direction</th><th>From</th><th>To</th>\
                 <th>Value</th><th>Time</th></tr>",
            );
            for tx in txs {
                let _ = write!(
                    out,
                    r#"<tr><td class="mono">{}</td><td>{}</td><td class="mono">{}</td><td class="mono">{}</td><td>{}{}</td><td>{}{}</td></tr>"#,
                    escape_html(&short(&tx.tx_hash)),
                    tx.direction.as_str(),
                    escape_html(&short(&tx.from_address)),
                    escape_html(&short(&tx.to_address)),
                    tx.value,
                    marker(&tx.estimated, "value"),
                    tx.timestamp.format("%Y-%m-%d %H:%M"),
                    marker(&tx.estimated, "timestamp")
                );
            }
            out.push_str("</table>");
        }
        None => {}
    }
    out.push_str("</section>");
}

fn blocks_section(out: &mut String, section: &Section<Vec<Block>>) {
    open_section(out, "Latest blocks", section);
    if let Some(blocks) = section.data() {
        out.push_str("<table><tr><th>Block</th><th>Transactions</th><th>Gas used</th><th>Time</th></tr>");
        for block in blocks {
            let _ = write!(
                out,
                "<tr><td>{}</td><td>{}{}</td><td>{}{}</td><td>{}{}</td></tr>",
                block.block_number,
                block.tx_count,
                marker(&block.estimated, "tx_count"),
                block.gas_used,
                marker(&block.estimated, "gasUsed"),
                block.timestamp.format("%H:%M:%S"),
                marker(&block.estimated, "timestamp")
            );
        }
        out.push_str("</table>");
    }
    out.push_str("</section>");
}

fn activity_section(out: &mut String, activity: &ActivitySummary) {
    let _ = write!(
        out,
        "<section><h2>Activity</h2><p>Incoming: {} &middot; Outgoing: {}</p>",
        activity.incoming, activity.outgoing
    );
    if !activity.tx_per_block.is_empty() {
        out.push_str("<table><tr><th>Block</th><th>Transactions</th></tr>");
        for point in &activity.tx_per_block {
            let _ = write!(
                out,
                "<tr><td>{}</td><td>{}</td></tr>",
                point.block_number, point.tx_count
            );
        }
        out.push_str("</table>");
    }
    out.push_str("</section>");
}

/// Render the whole dashboard. Every section shows one of its three states.
pub fn render_dashboard(view: &DashboardView) -> String {
    let mut out = String::with_capacity(16 * 1024);
    let _ = write!(
        out,
        r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8"><title>QuaiScan Dashboard</title><style>{}</style></head><body><h1>QuaiScan Dashboard</h1><p>Generated {}</p>"#,
        STYLE,
        view.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    wallet_section(&mut out, &view.wallet);
    stats_section(&mut out, &view.stats);
    transactions_section(&mut out, &view.transactions);
    blocks_section(&mut out, &view.blocks);
    activity_section(&mut out, &view.activity);

    if view.refresh_secs > 0 {
        let _ = write!(
            out,
            "<script>setTimeout(function(){{window.location.reload();}},{});</script>",
            view.refresh_secs * 1000
        );
    }
    out.push_str("</body></html>");
    out
}
