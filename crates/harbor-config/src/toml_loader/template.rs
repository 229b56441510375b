//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Harbor Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[extensions]
# dir = ""                # empty: <data_dir>/harbor/extensions
# enabled = true
# user_locale = ""        # empty: derived from $LANG, else en_US
# max_extensions = 64     # 1-512

[storage]
# persist_local = true    # false keeps storage.local in memory
# dir = ""                # empty: <data_dir>/harbor/extension-storage
# quota_kb = 10240        # 1-1048576

[tabs]
# new_tab_url = "about:blank"
# lazy_background_tabs = true

[notifications]
# enabled = true

[logging]
# level = "info"          # trace, debug, info, warn, error
"##
    .to_string()
}
