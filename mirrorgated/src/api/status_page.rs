//! HTML overview of every catalog service and the health of its instance groups.

use std::fmt::Write;
use html_escape::{encode_double_quoted_attribute, encode_text};
use shared::types::{AvailabilityRecord, ServiceDefinition};
use crate::catalog::Catalog;
use crate::state_manager::Snapshot;

const AVAILABLE_COLOR: &str = "green";
const UNAVAILABLE_COLOR: &str = "red";
const PENDING_COLOR: &str = "grey";

/// Render the status page, services in catalog order
pub fn render(catalog: &Catalog, snapshot: &Snapshot) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>mirrorgated</title></head>\n<body>\n",
    );

    for def in catalog.services() {
        match snapshot.get(&def.service_type) {
            Some(records) => render_probed(&mut page, def, records),
            None => render_pending(&mut page, def),
        }
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn render_probed(page: &mut String, def: &ServiceDefinition, records: &[AvailabilityRecord]) {
    let available = records.iter().filter(|r| r.available).count();
    render_heading(page, &def.service_type, &format!("{}/{}", available, records.len()));

    let links: Vec<String> = records
        .iter()
        .map(|record| {
            let color = if record.available { AVAILABLE_COLOR } else { UNAVAILABLE_COLOR };
            link(record.base_url(), &record.identifier, color)
        })
        .collect();
    page.push_str(&links.join("<br/>\n"));
    page.push('\n');
}

fn render_pending(page: &mut String, def: &ServiceDefinition) {
    render_heading(page, &def.service_type, "pending");

    let links: Vec<String> = def
        .instance_groups
        .iter()
        .map(|group| {
            let href = group.members().first().map(String::as_str).unwrap_or_default();
            link(href, &group.identifier(), PENDING_COLOR)
        })
        .collect();
    page.push_str(&links.join("<br/>\n"));
    page.push('\n');
}

fn render_heading(page: &mut String, service_type: &str, summary: &str) {
    let _ = writeln!(page, "<h3>{} ({})</h3>", encode_text(service_type), encode_text(summary));
}

fn link(href: &str, text: &str, color: &str) -> String {
    format!(
        "- <a href=\"{}\" style=\"color:{}\">{}</a>",
        encode_double_quoted_attribute(href),
        color,
        encode_text(text)
    )
}
