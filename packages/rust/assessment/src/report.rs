//! Markdown report for a finished assessment.

use chrono::{DateTime, Utc};

use grantlens_shared::{Grant, format_usd};

/// Render a downloadable report: grant header, the assessment, and a footer.
pub fn render_report(grant: &Grant, assessment: &str, generated_at: DateTime<Utc>) -> String {
    let title = if grant.recipient.is_empty() {
        "Unnamed recipient"
    } else {
        &grant.recipient
    };
    let link = if grant.link.is_empty() {
        "N/A".to_string()
    } else {
        format!("<{}>", grant.link)
    };

    let mut out = String::new();
    out.push_str(&format!("# Impact Assessment: {title}\n\n"));
    out.push_str("| Field | Value |\n|---|---|\n");
    out.push_str(&format!("| Agency | {} |\n", cell(&grant.agency)));
    out.push_str(&format!("| Date | {} |\n", cell(&grant.date)));
    out.push_str(&format!("| Value | {} |\n", format_usd(grant.value)));
    out.push_str(&format!("| Savings | {} |\n", format_usd(grant.savings)));
    out.push_str(&format!("| Link | {link} |\n\n"));

    if !grant.description.is_empty() {
        out.push_str(&format!("> {}\n\n", grant.description.replace('\n', "\n> ")));
    }

    out.push_str(assessment.trim());
    out.push_str(&format!(
        "\n\n---\n_Generated {}_\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out
}

/// Escape a value for a Markdown table cell.
fn cell(value: &str) -> String {
    if value.is_empty() {
        "N/A".into()
    } else {
        value.replace('|', "\\|").replace('\n', " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn report_has_header_body_and_timestamp() {
        let grant = Grant {
            date: "3/14/2025".into(),
            agency: "DOE".into(),
            recipient: "Acme Carbon".into(),
            value: 1_500_000.0,
            savings: 2500.4,
            link: "https://example.com/a".into(),
            description: "Pilot\nplant".into(),
        };
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 9, 30, 0).unwrap();
        let report = render_report(&grant, "\n## Bottom Line\nKeep it.\n", at);

        assert!(report.starts_with("# Impact Assessment: Acme Carbon\n"));
        assert!(report.contains("| Value | $1,500,000 |"));
        assert!(report.contains("| Savings | $2,500 |"));
        assert!(report.contains("| Link | <https://example.com/a> |"));
        assert!(report.contains("> Pilot\n> plant"));
        assert!(report.contains("## Bottom Line\nKeep it."));
        assert!(report.ends_with("_Generated 2025-04-01 09:30 UTC_\n"));
    }

    #[test]
    fn empty_fields_render_placeholders() {
        let report = render_report(&Grant::default(), "text", Utc::now());
        assert!(report.starts_with("# Impact Assessment: Unnamed recipient"));
        assert!(report.contains("| Agency | N/A |"));
        assert!(report.contains("| Link | N/A |"));
        assert!(!report.contains("> "));
    }

    #[test]
    fn pipes_are_escaped_in_cells() {
        let grant = Grant {
            agency: "A|B".into(),
            ..Grant::default()
        };
        let report = render_report(&grant, "", Utc::now());
        assert!(report.contains("| Agency | A\\|B |"));
    }
}
