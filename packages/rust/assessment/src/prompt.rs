//! Cancellation-impact prompt construction.

use grantlens_shared::Grant;

/// System instruction every assessment session is created with.
pub const SYSTEM_INSTRUCTION: &str = "You are a policy, energy, and macroeconomics analyst. \
Be precise, cite reputable sources when asserting facts, and keep assumptions \
separate from verified data.";

/// Default cap on description characters embedded in a prompt.
pub const DEFAULT_DESCRIPTION_CAP: usize = 5000;

/// Placeholder for empty optional values.
const NOT_AVAILABLE: &str = "N/A";

/// Build the assessment prompt for one grant.
///
/// Every grant field is embedded; the description is cut to at most
/// `description_cap` characters. An empty `extra_context` or link is
/// rendered as `N/A`.
pub fn build_prompt(grant: &Grant, extra_context: &str, description_cap: usize) -> String {
    let link = non_empty_or_na(&grant.link);
    let context = non_empty_or_na(extra_context.trim());
    let description = truncate_chars(&grant.description, description_cap);

    format!(
        r#"Assess the impact of CANCELING the following government grant.

GRANT:
- Date: {date}
- Agency: {agency}
- Recipient: {recipient}
- Value_USD: {value}
- Stated_Savings_USD: {savings}
- Link: {link}
- Description: {description}

ADDITIONAL CONTEXT:
{context}

ANALYSIS:
1) Stakeholders: direct and indirect (businesses, residents, local/state/federal bodies, international actors).
2) Impact analysis, short term (0-12 months) and long term (1-10 years), covering:
   - employment (jobs created, retained, displaced)
   - prices, energy costs, and consumer effects
   - supply chains, technology readiness, emissions targets
   - regional effects (county, state, tribal lands where relevant)
   - national security and strategic competitiveness where relevant
   - public health, safety, and environmental externalities
3) Dependencies and spillovers: linked programs, matched funding, private co-investment, tax incentives, permitting timelines.
4) Risk register: what could go wrong if canceled versus kept, with likelihood and severity.
5) Mitigations and alternatives if canceled: substitute funding, phase-down, private financing, policy instruments.
6) KPIs to monitor, leading and lagging, with suggested data sources.
7) Pork check: if the evidence suggests the grant is wasteful or non-strategic, say why and propose a better allocation.
8) GAP Analysis Summary table with columns: Current State | Gap if Canceled | Impact Level (Low/Med/High) | Mitigation.

SOURCES:
Name credible public sources (EIA, EPA, BEA, BLS, CRS, peer-reviewed studies) for factual claims. If you cannot verify a figure, state the assumption explicitly.

OUTPUT:
Clean Markdown with a heading per section above, ending with a one-paragraph **Bottom Line**. No HTML, no code blocks except for the table.
"#,
        date = grant.date,
        agency = grant.agency,
        recipient = grant.recipient,
        value = grant.value,
        savings = grant.savings,
    )
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn non_empty_or_na(value: &str) -> &str {
    if value.is_empty() { NOT_AVAILABLE } else { value }
}
