use crate::settings::{Environment, Form, MerchantCredentials, PluginSettings};

/// The environment a form actually talks to.
///
/// Production only when the form asks for it and no legacy payment integration
/// is active; a legacy install always forces test.
pub fn resolve_environment(settings: &PluginSettings, form: &Form) -> Environment {
    if settings.legacy_plugin_active {
        return Environment::Test;
    }
    form.settings.environment
}

/// Credentials for the form's effective environment. Unset values are blank
/// strings; the payment request builder rejects them before anything is sent.
pub fn resolve<'a>(settings: &'a PluginSettings, form: &Form) -> (&'a MerchantCredentials, Environment) {
    let environment = resolve_environment(settings, form);
    tracing::debug!(form_id = form.id, environment = environment.as_str(), "resolved merchant environment");
    (settings.credentials(environment), environment)
}
