use bigdecimal::BigDecimal;
use common_money::NormalizedMoney;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::settings::{AccountOverrideSettings, FormSettings};

static REVENUE_CATEGORY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^RC[0-9]{4}$").expect("static pattern"));
static FUND: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FD[0-9]{3}$").expect("static pattern"));
static FUNCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FN[0-9]{3}$").expect("static pattern"));
static COST_CENTRE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CC[0-9]{5}$").expect("static pattern"));
static PROGRAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PM[0-9]{6}$").expect("static pattern"));
static PROJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PJ[0-9]{6}$").expect("static pattern"));

const LEDGER_MIN: i64 = 4000;
const LEDGER_MAX: i64 = 4999;

/// A validated ledger override group, ready to be encoded onto a payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountOverrideGroup {
    pub ledger_id: BigDecimal,
    pub revenue_category_id: String,
    pub fund_id: String,
    pub function_id: String,
    pub cost_centre_id: String,
    pub program_id: Option<String>,
    pub project_id: Option<String>,
}

/// Validate the form's override groups. Empty when the toggle is off or nothing
/// is configured; the first invalid field fails the whole set.
pub fn validate(settings: &FormSettings) -> Result<Vec<AccountOverrideGroup>, ValidationError> {
    if !settings.workday_override || settings.override_groups.is_empty() {
        return Ok(Vec::new());
    }
    settings
        .override_groups
        .iter()
        .enumerate()
        .map(|(i, group)| validate_group(i + 1, group))
        .collect()
}

fn validate_group(n: usize, raw: &AccountOverrideSettings) -> Result<AccountOverrideGroup, ValidationError> {
    let ledger_id = BigDecimal::from_str(raw.ledger_id.trim())
        .ok()
        .filter(|v| *v >= BigDecimal::from(LEDGER_MIN) && *v <= BigDecimal::from(LEDGER_MAX))
        .ok_or(ValidationError::LedgerId(n))?;
    let revenue_category_id = matching(&REVENUE_CATEGORY, &raw.revenue_category_id, ValidationError::RevenueCategoryId(n))?;
    let fund_id = matching(&FUND, &raw.fund_id, ValidationError::FundId(n))?;
    let function_id = matching(&FUNCTION, &raw.function_id, ValidationError::FunctionId(n))?;
    let cost_centre_id = matching(&COST_CENTRE, &raw.cost_centre_id, ValidationError::CostCentreId(n))?;
    let program_id = present(&raw.program_id)
        .map(|v| matching(&PROGRAM, v, ValidationError::ProgramId(n)))
        .transpose()?;
    let project_id = present(&raw.project_id)
        .map(|v| matching(&PROJECT, v, ValidationError::ProjectId(n)))
        .transpose()?;
    if program_id.is_some() && project_id.is_some() {
        return Err(ValidationError::ProgramAndProject(n));
    }
    Ok(AccountOverrideGroup {
        ledger_id,
        revenue_category_id,
        fund_id,
        function_id,
        cost_centre_id,
        program_id,
        project_id,
    })
}

fn matching(pattern: &Regex, value: &str, err: ValidationError) -> Result<String, ValidationError> {
    let value = value.trim();
    if pattern.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(err)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Flatten groups into `acct{NN}{Field}` form fields, numbered from `01`. Every
/// group carries the full order amount.
pub fn encode(groups: &[AccountOverrideGroup], amount: &NormalizedMoney) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        let prefix = format!("acct{:02}", i + 1);
        fields.push((format!("{prefix}LedgerId"), render_ledger(&group.ledger_id)));
        fields.push((format!("{prefix}RevenueCategoryId"), group.revenue_category_id.clone()));
        fields.push((format!("{prefix}FundId"), group.fund_id.clone()));
        fields.push((format!("{prefix}FunctionId"), group.function_id.clone()));
        fields.push((format!("{prefix}CostCenterId"), group.cost_centre_id.clone()));
        if let Some(program) = &group.program_id {
            fields.push((format!("{prefix}ProgramId"), program.clone()));
        }
        if let Some(project) = &group.project_id {
            fields.push((format!("{prefix}ProjectId"), project.clone()));
        }
        fields.push((format!("{prefix}PaymentAmount"), amount.to_string()));
    }
    fields
}

fn render_ledger(ledger: &BigDecimal) -> String {
    if ledger.is_integer() {
        ledger.with_scale(0).to_string()
    } else {
        ledger.normalized().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> AccountOverrideSettings {
        AccountOverrideSettings {
            ledger_id: "4010".into(),
            revenue_category_id: "RC1234".into(),
            fund_id: "FD123".into(),
            function_id: "FN123".into(),
            cost_centre_id: "CC12345".into(),
            program_id: None,
            project_id: None,
        }
    }

    fn settings(groups: Vec<AccountOverrideSettings>) -> FormSettings {
        FormSettings { workday_override: true, override_groups: groups, ..Default::default() }
    }

    #[test]
    fn toggle_off_or_empty_means_no_fields() {
        let off = FormSettings { workday_override: false, override_groups: vec![group()], ..Default::default() };
        assert!(validate(&off).unwrap().is_empty());
        assert!(validate(&settings(vec![])).unwrap().is_empty());
    }

    #[test]
    fn valid_group_encodes_in_order() {
        let mut g = group();
        g.program_id = Some("PM123456".into());
        g.project_id = Some("  ".into());
        let groups = validate(&settings(vec![g])).unwrap();
        let fields = encode(&groups, &NormalizedMoney::from_cents(14290));
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "acct01LedgerId",
                "acct01RevenueCategoryId",
                "acct01FundId",
                "acct01FunctionId",
                "acct01CostCenterId",
                "acct01ProgramId",
                "acct01PaymentAmount"
            ]
        );
        assert_eq!(fields[0].1, "4010");
        assert_eq!(fields[6].1, "142.90");
    }

    #[test]
    fn ledger_bounds() {
        for (ledger, ok) in [("3999", false), ("4000", true), ("4999", true), ("5000", false), ("", false), ("abc", false)] {
            let mut g = group();
            g.ledger_id = ledger.into();
            assert_eq!(validate(&settings(vec![g])).is_ok(), ok, "ledger {ledger}");
        }
    }

    #[test]
    fn field_patterns_reported_with_group_number() {
        let mut g = group();
        g.revenue_category_id = "RC123".into();
        assert_eq!(validate(&settings(vec![g])), Err(ValidationError::RevenueCategoryId(1)));
        let mut g = group();
        g.fund_id = "fd123".into();
        assert_eq!(validate(&settings(vec![g])), Err(ValidationError::FundId(1)));
        let mut g = group();
        g.function_id = "FN1234".into();
        assert_eq!(validate(&settings(vec![g])), Err(ValidationError::FunctionId(1)));
        let mut g = group();
        g.cost_centre_id = "CC1234".into();
        assert_eq!(validate(&settings(vec![g])), Err(ValidationError::CostCentreId(1)));
        let mut g = group();
        g.project_id = Some("PJ12345".into());
        assert_eq!(validate(&settings(vec![g])), Err(ValidationError::ProjectId(1)));
    }

    #[test]
    fn program_and_project_are_exclusive() {
        let mut g = group();
        g.program_id = Some("PM123456".into());
        g.project_id = Some("PJ123456".into());
        let err = validate(&settings(vec![g])).unwrap_err();
        assert_eq!(err, ValidationError::ProgramAndProject(1));
        assert!(err.to_string().contains("group [1]"));
    }

    #[test]
    fn every_group_is_encoded() {
        let mut second = group();
        second.ledger_id = "4020".into();
        second.project_id = Some("PJ654321".into());
        let groups = validate(&settings(vec![group(), second])).unwrap();
        let fields = encode(&groups, &NormalizedMoney::from_cents(5000));
        let get = |key: &str| fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        assert_eq!(get("acct01LedgerId"), Some("4010"));
        assert_eq!(get("acct02LedgerId"), Some("4020"));
        assert_eq!(get("acct02ProjectId"), Some("PJ654321"));
        assert_eq!(get("acct01ProjectId"), None);
        assert_eq!(get("acct01PaymentAmount"), Some("50.00"));
        assert_eq!(get("acct02PaymentAmount"), Some("50.00"));
        assert_eq!(fields.len(), 13);
    }

    #[test]
    fn failure_in_later_group_names_that_group() {
        let mut second = group();
        second.fund_id = "FD12".into();
        assert_eq!(validate(&settings(vec![group(), second])), Err(ValidationError::FundId(2)));
        let mut second = group();
        second.program_id = Some("PM123456".into());
        second.project_id = Some("PJ123456".into());
        let err = validate(&settings(vec![group(), second])).unwrap_err();
        assert_eq!(err, ValidationError::ProgramAndProject(2));
        assert!(err.to_string().contains("group [2]"));
    }

    #[test]
    fn fractional_ledger_is_kept() {
        let mut g = group();
        g.ledger_id = "4010.50".into();
        let groups = validate(&settings(vec![g])).unwrap();
        let fields = encode(&groups, &NormalizedMoney::from_cents(100));
        assert_eq!(fields[0].1, "4010.5");
    }
}
