use chrono::NaiveDate;
use common_money::format_two_decimals;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::repo::Entry;
use crate::settings::Form;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)(?::([^{}]+))?\}").expect("static pattern"));

#[derive(Clone, Copy)]
enum Encoding {
    Html,
    Query,
}

/// Substitutes `{tag}` placeholders in confirmation messages and redirect query strings.
pub struct MergeContext<'a> {
    pub form: &'a Form,
    pub entry: &'a Entry,
    pub today: NaiveDate,
}

impl<'a> MergeContext<'a> {
    pub fn new(form: &'a Form, entry: &'a Entry, today: NaiveDate) -> Self {
        Self { form, entry, today }
    }

    /// Replace known tags for display in HTML; substituted values are escaped,
    /// unknown tags are left as written.
    pub fn render_html(&self, template: &str) -> String {
        self.replace(template, Encoding::Html)
    }

    /// Replace known tags in a query string; substituted values are URL-encoded.
    pub fn render_query(&self, template: &str) -> String {
        self.replace(template, Encoding::Query)
    }

    fn replace(&self, template: &str, encoding: Encoding) -> String {
        TAG.replace_all(template, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let arg = caps.get(2).map(|m| m.as_str());
            match (self.value(name, arg), encoding) {
                (Some(value), Encoding::Html) => html_escape::encode_text(&value).into_owned(),
                (Some(value), Encoding::Query) => urlencoding::encode(&value).into_owned(),
                (None, _) => whole.to_string(),
            }
        })
        .into_owned()
    }

    fn value(&self, name: &str, arg: Option<&str>) -> Option<String> {
        let entry = self.entry;
        let value = match (name, arg) {
            ("form_id", None) => self.form.id.to_string(),
            ("form_title", None) => self.form.title.clone(),
            ("entry_id", None) => entry.id.to_string(),
            ("payment_request_number", None) => entry.payment_request_number.clone().unwrap_or_default(),
            ("payment_amount", None) => entry.payment_amount.as_ref().map(format_two_decimals).unwrap_or_default(),
            ("payment_status", None) => entry.payment_status.map(|s| s.as_str().to_string()).unwrap_or_default(),
            ("payment_date", None) => entry.payment_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            ("date_mdy", None) => self.today.format("%m/%d/%Y").to_string(),
            ("source_url", None) => entry.source_url.clone(),
            ("meta", Some(key)) => entry.meta.get(key.trim()).cloned().unwrap_or_default(),
            ("field", Some(key)) => entry.fields.get(key.trim()).cloned().unwrap_or_default(),
            _ => return None,
        };
        Some(value)
    }
}
