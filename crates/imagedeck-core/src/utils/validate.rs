use std::sync::LazyLock;

use regex::Regex;

use crate::models::ConfigChanges;

static IMAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("image name pattern"));

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("digits pattern"));

static LOCALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}_[A-Z]{2}").expect("locale pattern"));

static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-\d+$").expect("range pattern"));

/// Image names may only contain ASCII letters, digits and '-'
pub fn is_valid_image_name(name: &str) -> bool {
    IMAGE_NAME.is_match(name)
}

/// Check one config value. Fields without a rule accept any non-blank value.
fn is_valid_config_value(field: &str, value: &str) -> bool {
    match field {
        "total_client_no" | "maxswapsize" | "client_system_boot_timeout" => DIGITS.is_match(value),
        "account_passwd_length" => {
            DIGITS.is_match(value) && value.parse::<u32>().is_ok_and(|n| (1..=128).contains(&n))
        }
        "language" => LOCALE.is_match(value),
        "drbl_server_as_NAT_server" => value == "yes" || value == "no",
        "range" => RANGE.is_match(value),
        _ => true,
    }
}

/// Return `section.field` for every unknown or invalid change, in section order
pub fn invalid_config_fields(changes: &ConfigChanges) -> Vec<String> {
    changes
        .iter()
        .filter(|(section, field, value)| {
            !section.knows(field) || !is_valid_config_value(field, value)
        })
        .map(|(section, field, _)| format!("{}.{}", section, field))
        .collect()
}

/// Strip any `Bearer ` prefix (case-insensitive, repeated) and apply it once
pub fn normalize_bearer(token: &str) -> String {
    let mut raw = token.trim();
    while let Some(prefix) = raw.get(..7) {
        if !prefix.eq_ignore_ascii_case("bearer ") {
            break;
        }
        raw = raw[7..].trim_start();
    }
    format!("Bearer {}", raw)
}
