use super::*;

#[test]
fn default_config_is_valid() {
    assert!(validate(&HarborConfig::default()).is_ok());
}

#[test]
fn max_extensions_out_of_range() {
    let mut config = HarborConfig::default();
    config.extensions.max_extensions = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("extensions.max_extensions"));
}

#[test]
fn quota_out_of_range() {
    let mut config = HarborConfig::default();
    config.storage.quota_kb = 2 * 1024 * 1024;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("storage.quota_kb"));
}

#[test]
fn empty_new_tab_url_rejected() {
    let mut config = HarborConfig::default();
    config.tabs.new_tab_url = "  ".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("tabs.new_tab_url"));
}

#[test]
fn bad_locale_rejected() {
    let mut config = HarborConfig::default();
    config.extensions.user_locale = "en US".into();
    assert!(validate(&config).is_err());

    config.extensions.user_locale = "pt_BR".into();
    assert!(validate(&config).is_ok());
}

#[test]
fn errors_are_collected() {
    let mut config = HarborConfig::default();
    config.extensions.max_extensions = 0;
    config.tabs.new_tab_url.clear();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("max_extensions"));
    assert!(err.contains("new_tab_url"));
    assert!(err.contains("; "));
}
