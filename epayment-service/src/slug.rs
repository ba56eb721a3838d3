/// Turn an arbitrary title into a URL-safe slug.
///
/// Letters are lowercased; ASCII letters, digits, `_` and `-` survive; whitespace,
/// `.` and `/` become dashes; everything else is dropped. Runs of dashes collapse
/// to one and leading/trailing dashes are trimmed. Request numbers are always
/// compared in this form, so the gateway may echo them back in any case.
pub fn sanitize_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let mapped = match c {
            'a'..='z' | '0'..='9' | '_' => Some(c),
            '-' | '.' | '/' => Some('-'),
            c if c.is_whitespace() => Some('-'),
            _ => None,
        };
        if let Some(m) = mapped {
            if m == '-' && out.ends_with('-') {
                continue;
            }
            out.push(m);
        }
    }
    out.trim_matches('-').to_string()
}

/// `{prefix}-{site_id}-{form_id}-{entry_id}`, the site id only present on multi-site installs.
pub fn payment_request_number(prefix: &str, site_id: Option<u32>, form_id: i64, entry_id: i64) -> String {
    let raw = match site_id {
        Some(site) => format!("{prefix}-{site}-{form_id}-{entry_id}"),
        None => format!("{prefix}-{form_id}-{entry_id}"),
    };
    sanitize_title(&raw)
}
