use anyhow::Context;
use comfy_table::{presets::NOTHING, *};
use itertools::izip;
use polars::prelude::*;

use coviddash::COL;

/// Format a count with thousands separators, e.g. `1234567` -> `1,234,567`.
pub fn format_count(value: i64) -> String {
    let digits = value.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0 {
        format!("-{out}")
    } else {
        out
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

/// Print the most recent row of the global table as a two-column summary.
/// Optional columns are skipped when the persisted file lacks them.
pub fn display_global_summary(global: &DataFrame) -> anyhow::Result<()> {
    let latest = global
        .sort([COL::DATE], SortMultipleOptions::default())?
        .tail(Some(1));
    let date = latest
        .column(COL::DATE)?
        .date()?
        .as_date_iter()
        .next()
        .flatten()
        .context("Global table has no rows")?;

    let mut table = base_table();
    let mut add_row = |label: &str, value: String| {
        table.add_row(vec![
            Cell::new(label).add_attribute(Attribute::Bold),
            Cell::new(value),
        ]);
    };

    if let Some(confirmed) = latest.column(COL::CONFIRMED)?.i64()?.get(0) {
        add_row("Total confirmed", format_count(confirmed));
    }
    if let Some(deaths) = latest.column(COL::DEATHS)?.i64()?.get(0) {
        add_row("Total deaths", format_count(deaths));
    }
    if let Ok(series) = latest.column(COL::NEW_CONFIRMED_7DMA) {
        if let Some(dma) = series.f64()?.get(0) {
            add_row("New cases (7-day MA)", format_count(dma.round() as i64));
        }
    }
    if let Ok(series) = latest.column(COL::CFR) {
        if let Some(cfr) = series.f64()?.get(0) {
            add_row("Global CFR", format!("{:.2}%", cfr * 100.0));
        }
    }

    println!("\nGlobal snapshot — {date}");
    println!("{}", table);
    Ok(())
}

/// Print the top countries by cumulative confirmed cases on the latest date.
pub fn display_top_countries(country: &DataFrame, max_results: usize) -> anyhow::Result<()> {
    let latest = country
        .clone()
        .lazy()
        .filter(col(COL::DATE).eq(col(COL::DATE).max()))
        .sort(
            [COL::CONFIRMED],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .limit(max_results as u32)
        .collect()?;

    let mut table = base_table();
    table.set_header(vec![
        Cell::new("Country").add_attribute(Attribute::Bold),
        Cell::new("Confirmed").add_attribute(Attribute::Bold),
        Cell::new("Deaths").add_attribute(Attribute::Bold),
    ]);
    for (name, confirmed, deaths) in izip!(
        latest.column(COL::COUNTRY)?.str()?,
        latest.column(COL::CONFIRMED)?.i64()?,
        latest.column(COL::DEATHS)?.i64()?,
    ) {
        table.add_row(vec![
            name.unwrap_or_default().to_string(),
            format_count(confirmed.unwrap_or_default()),
            format_count(deaths.unwrap_or_default()),
        ]);
    }

    println!("\n{}", table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_get_thousands_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(format_count(-45678), "-45,678");
    }
}
