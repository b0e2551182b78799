use super::normalizer::clean_cell_text;
use super::report::{AuditReport, PerBureau, Tradeline};
use super::rules::FieldRuleRegistry;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, trace};

const MAX_HEADING_CHARS: usize = 120;

static BUREAU_ALIASES: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

/// Canonical bureau name for a header cell, ignoring case, whitespace and marks such as `®`.
pub fn canonical_bureau(label: &str) -> Option<&'static str> {
    let key: String = label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    bureau_aliases().get(key.as_str()).copied()
}

fn bureau_aliases() -> &'static HashMap<&'static str, &'static str> {
    BUREAU_ALIASES.get_or_init(|| {
        const ALIASES: &[(&str, &str)] = &[
            ("transunion", "TransUnion"),
            ("tu", "TransUnion"),
            ("experian", "Experian"),
            ("exp", "Experian"),
            ("xpn", "Experian"),
            ("equifax", "Equifax"),
            ("eqf", "Equifax"),
            ("efx", "Equifax"),
        ];
        ALIASES.iter().copied().collect()
    })
}

/// Extracts one tradeline per bureau-layout table, in document order. Validation is left
/// to the caller.
pub fn parse(document: &str, rules: &FieldRuleRegistry) -> AuditReport {
    let html = Html::parse_document(document);
    let tradelines = html
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|element| element.value().name() == "table")
        .filter_map(|table| read_tradeline(table, rules))
        .collect();

    AuditReport { tradelines }
}

fn read_tradeline(table: ElementRef<'_>, rules: &FieldRuleRegistry) -> Option<Tradeline> {
    let mut rows = table_rows(table).into_iter();
    let columns = bureau_columns(&row_cells(rows.next()?))?;

    let mut per_bureau = PerBureau::default();
    for bureau in columns.iter().flatten() {
        per_bureau.entry(bureau);
    }

    for row in rows {
        let cells = row_cells(row);
        let Some(label) = cells.first() else {
            continue;
        };
        let Some(rule) = rules.find_rule(label) else {
            trace!(label = %label, "row label has no field rule");
            continue;
        };

        for (column, cell) in columns.iter().zip(cells.iter().skip(1)) {
            let Some(bureau) = column else {
                continue;
            };
            let fields = per_bureau.entry(bureau);
            for (key, value, raw) in rule.extract(cell) {
                fields.insert(key, value, raw);
            }
        }
    }

    Some(Tradeline::new(creditor_heading(table), per_bureau))
}

/// Bureau name per data column, or `None` when the header names no known bureau.
///
/// Unrecognized headers keep their own text as the bureau name. Blank headers and repeats of
/// an earlier column's bureau are not read.
fn bureau_columns(header: &[String]) -> Option<Vec<Option<String>>> {
    if header.len() < 2 {
        return None;
    }

    let mut recognized = false;
    let mut columns: Vec<Option<String>> = Vec::with_capacity(header.len() - 1);
    for (offset, cell) in header[1..].iter().enumerate() {
        let name = match canonical_bureau(cell) {
            Some(canonical) => {
                recognized = true;
                canonical.to_string()
            }
            None if cell.is_empty() => {
                columns.push(None);
                continue;
            }
            None => cell.clone(),
        };

        if columns.iter().flatten().any(|existing| *existing == name) {
            debug!(bureau = %name, column = offset + 1, "repeated bureau column ignored");
            columns.push(None);
        } else {
            columns.push(Some(name));
        }
    }

    recognized.then_some(columns)
}

/// Direct rows of `table`, looking through row groups but never into nested tables.
fn table_rows<'a>(table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|element| element.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(element_text)
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_cell_text(&element.text().collect::<String>())
}

fn creditor_heading(table: ElementRef<'_>) -> Option<String> {
    let caption = table
        .children()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "caption")
        .map(element_text)
        .filter(|text| !text.is_empty());

    caption.or_else(|| {
        let previous = table.prev_siblings().find_map(ElementRef::wrap)?;
        if previous.value().name() == "table" {
            return None;
        }
        let text = element_text(previous);
        (!text.is_empty() && text.chars().count() <= MAX_HEADING_CHARS).then_some(text)
    })
}
