use common_crypto::SecretString;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Prod,
    /// Anything other than `prod` is treated as the test environment.
    #[default]
    #[serde(other)]
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Test => "test",
        }
    }
}

/// One environment's merchant credentials as issued during onboarding.
#[derive(Debug, Clone, Default)]
pub struct MerchantCredentials {
    pub merchant_id: String,
    pub merchant_store_id: String,
    pub proxy_key: SecretString,
    pub merchant_update_secret: SecretString,
}

impl MerchantCredentials {
    fn from_env(suffix: &str) -> Self {
        Self {
            merchant_id: trimmed_var(&format!("UPAY_MERCHANT_ID_{suffix}")),
            merchant_store_id: trimmed_var(&format!("UPAY_MERCHANT_STORE_ID_{suffix}")),
            proxy_key: SecretString::new(trimmed_var(&format!("UPAY_MERCHANT_PROXY_KEY_{suffix}"))),
            merchant_update_secret: SecretString::new(trimmed_var(&format!(
                "UPAY_MERCHANT_UPDATE_SECRET_{suffix}"
            ))),
        }
    }
}

/// Site-wide integration settings, built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct PluginSettings {
    pub onboarding_complete: bool,
    /// A competing payment integration is installed; every form is forced onto test credentials.
    pub legacy_plugin_active: bool,
    pub test: MerchantCredentials,
    pub prod: MerchantCredentials,
}

impl PluginSettings {
    pub fn from_env() -> Self {
        Self {
            onboarding_complete: flag("UPAY_ONBOARDING_COMPLETE"),
            legacy_plugin_active: flag("UPAY_LEGACY_PLUGIN_ACTIVE"),
            test: MerchantCredentials::from_env("TEST"),
            prod: MerchantCredentials::from_env("PROD"),
        }
    }

    pub fn credentials(&self, environment: Environment) -> &MerchantCredentials {
        match environment {
            Environment::Test => &self.test,
            Environment::Prod => &self.prod,
        }
    }
}

/// One ledger override group as entered in the form settings. Values are raw
/// strings; [`crate::account_override::validate`] decides whether they are usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountOverrideSettings {
    #[serde(default)]
    pub ledger_id: String,
    #[serde(default)]
    pub revenue_category_id: String,
    #[serde(default)]
    pub fund_id: String,
    #[serde(default)]
    pub function_id: String,
    #[serde(default)]
    pub cost_centre_id: String,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormSettings {
    #[serde(default)]
    pub is_epayment_form: bool,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub workday_override: bool,
    #[serde(default)]
    pub override_groups: Vec<AccountOverrideSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationKind {
    Message,
    Page,
    Redirect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub is_default: bool,
    #[serde(rename = "type")]
    pub kind: ConfirmationKind,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub query_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub settings: FormSettings,
    #[serde(default)]
    pub confirmations: Vec<Confirmation>,
}

impl Form {
    pub fn is_payment_form(&self) -> bool {
        self.settings.is_epayment_form
    }

    pub fn default_confirmation(&self) -> Option<&Confirmation> {
        self.confirmations.iter().find(|c| c.is_default)
    }
}

fn trimmed_var(name: &str) -> String {
    env::var(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

pub(crate) fn flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
