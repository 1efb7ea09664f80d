use super::ui;
use crate::core::{RateOrigin, ResolvedRate};
use comfy_table::Cell;

pub const ASSET_CODE: &str = "BTC";
pub const FIAT_CODE: &str = "CZK";

fn format_age(secs: i64) -> String {
    match secs {
        s if s < 60 => format!("{}s", s.max(0)),
        s if s < 3_600 => format!("{}m {}s", s / 60, s % 60),
        s if s < 86_400 => format!("{}h {}m", s / 3_600, (s % 3_600) / 60),
        s => format!("{}d {}h", s / 86_400, (s % 86_400) / 3_600),
    }
}

fn stale_note(resolved: &ResolvedRate, now: i64) -> Option<String> {
    (resolved.origin == RateOrigin::Stale).then(|| {
        ui::style_text(
            &format!(
                "Feeds unavailable, using a rate from {} ago",
                format_age(resolved.cached.age_secs(now))
            ),
            ui::StyleType::Warning,
        )
    })
}

/// Renders the current rate with its age and origin.
pub fn display_rate(resolved: &ResolvedRate, now: i64) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Derived at"),
        ui::header_cell("Age"),
        ui::header_cell("Source"),
    ]);

    let derived_at = resolved
        .cached
        .fetched_at()
        .map_or("N/A".to_string(), |dt| {
            dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
        });

    table.add_row(vec![
        Cell::new(format!("{ASSET_CODE}/{FIAT_CODE}")),
        ui::number_cell(format!("{:.2}", resolved.rate())),
        Cell::new(derived_at),
        ui::number_cell(format_age(resolved.cached.age_secs(now))),
        Cell::new(resolved.origin.to_string()),
    ]);

    let mut output = format!(
        "{}\n\n{}",
        ui::style_text("Exchange rate", ui::StyleType::Title),
        table
    );
    if let Some(note) = stale_note(resolved, now) {
        output.push_str(&format!("\n\n{note}"));
    }
    output
}

/// Renders `amount from = converted to`, noting a stale rate when used.
pub fn display_conversion(
    amount: f64,
    from: &str,
    converted: f64,
    to: &str,
    precision: i32,
    resolved: &ResolvedRate,
    now: i64,
) -> String {
    let places = usize::try_from(precision).unwrap_or(0);
    let mut output = format!(
        "{amount} {from} = {} {to} {}",
        ui::style_text(&format!("{converted:.places$}"), ui::StyleType::Value),
        ui::style_text(
            &format!("(1 {ASSET_CODE} = {:.2} {FIAT_CODE})", resolved.rate()),
            ui::StyleType::Subtle
        ),
    );
    if let Some(note) = stale_note(resolved, now) {
        output.push_str(&format!("\n{note}"));
    }
    output
}
