use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Writable fields of the `[general]` section of the DRBL configuration
pub const GENERAL_FIELDS: &[&str] = &[
    "domain",
    "nisdomain",
    "localswapfile",
    "client_init",
    "login_gdm_opt",
    "maxswapsize",
    "ocs_img_repo_dir",
    "total_client_no",
    "account_passwd_length",
    "hostname",
    "purge_client",
    "set_client_system_select",
    "use_graphic_pxelinux_menu",
    "client_system_boot_timeout",
    "language",
    "drbl_server_as_NAT_server",
    "clonezilla_mode",
];

/// Writable fields of the `[eth1]` section
pub const ETH1_FIELDS: &[&str] = &["interface", "range"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    General,
    Eth1,
}

impl ConfigSection {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigSection::General => "general",
            ConfigSection::Eth1 => "eth1",
        }
    }

    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            ConfigSection::General => GENERAL_FIELDS,
            ConfigSection::Eth1 => ETH1_FIELDS,
        }
    }

    pub fn knows(&self, field: &str) -> bool {
        self.fields().contains(&field)
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(ConfigSection::General),
            "eth1" => Ok(ConfigSection::Eth1),
            other => Err(format!("unknown config section '{}'", other)),
        }
    }
}

/// Changed configuration fields, grouped by section.
///
/// Only fields with a non-blank value are ever recorded, so whatever this
/// serializes to is exactly the set of changes; untouched fields are never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigChanges {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    general: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    eth1: BTreeMap<String, String>,
}

impl ConfigChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change. The value is trimmed; a blank value removes the field.
    pub fn set(&mut self, section: ConfigSection, field: &str, value: &str) -> &mut Self {
        let map = self.section_mut(section);
        let value = value.trim();
        if value.is_empty() {
            map.remove(field);
        } else {
            map.insert(field.to_string(), value.to_string());
        }
        self
    }

    /// Parse `section.field=value`, e.g. `general.hostname=lab-server`.
    pub fn parse_assignment(input: &str) -> Result<(ConfigSection, String, String), String> {
        let (key, value) = input
            .split_once('=')
            .ok_or_else(|| format!("expected section.field=value, got '{}'", input))?;
        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| format!("expected section.field, got '{}'", key))?;
        let section: ConfigSection = section.parse()?;
        Ok((section, field.trim().to_string(), value.to_string()))
    }

    pub fn get(&self, section: ConfigSection, field: &str) -> Option<&str> {
        self.section(section).get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_empty() && self.eth1.is_empty()
    }

    pub fn len(&self) -> usize {
        self.general.len() + self.eth1.len()
    }

    /// Iterate `(section, field, value)` over every recorded change
    pub fn iter(&self) -> impl Iterator<Item = (ConfigSection, &str, &str)> {
        self.general
            .iter()
            .map(|(k, v)| (ConfigSection::General, k.as_str(), v.as_str()))
            .chain(
                self.eth1
                    .iter()
                    .map(|(k, v)| (ConfigSection::Eth1, k.as_str(), v.as_str())),
            )
    }

    fn section(&self, section: ConfigSection) -> &BTreeMap<String, String> {
        match section {
            ConfigSection::General => &self.general,
            ConfigSection::Eth1 => &self.eth1,
        }
    }

    fn section_mut(&mut self, section: ConfigSection) -> &mut BTreeMap<String, String> {
        match section {
            ConfigSection::General => &mut self.general,
            ConfigSection::Eth1 => &mut self.eth1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_values_are_not_recorded() {
        let mut changes = ConfigChanges::new();
        changes
            .set(ConfigSection::General, "hostname", "  ")
            .set(ConfigSection::Eth1, "range", "");
        assert!(changes.is_empty());
    }

    #[test]
    fn test_blank_value_removes_previous_change() {
        let mut changes = ConfigChanges::new();
        changes.set(ConfigSection::General, "hostname", "lab");
        changes.set(ConfigSection::General, "hostname", " ");
        assert!(changes.is_empty());
    }

    #[test]
    fn test_serializes_only_changed_sections() {
        let mut changes = ConfigChanges::new();
        changes.set(ConfigSection::General, "hostname", " lab-server ");
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            json!({"general": {"hostname": "lab-server"}})
        );

        changes.set(ConfigSection::Eth1, "range", "10-20");
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            json!({"general": {"hostname": "lab-server"}, "eth1": {"range": "10-20"}})
        );
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_parse_assignment() {
        let (section, field, value) =
            ConfigChanges::parse_assignment("general.language=pl_PL.UTF-8").unwrap();
        assert_eq!(section, ConfigSection::General);
        assert_eq!(field, "language");
        assert_eq!(value, "pl_PL.UTF-8");

        let (section, field, _) = ConfigChanges::parse_assignment("ETH1.range=1-5").unwrap();
        assert_eq!(section, ConfigSection::Eth1);
        assert_eq!(field, "range");

        assert!(ConfigChanges::parse_assignment("hostname=lab").is_err());
        assert!(ConfigChanges::parse_assignment("general.hostname").is_err());
        assert!(ConfigChanges::parse_assignment("eth0.range=1-5").is_err());
    }

    #[test]
    fn test_section_knows_fields() {
        assert!(ConfigSection::General.knows("drbl_server_as_NAT_server"));
        assert!(!ConfigSection::General.knows("range"));
        assert!(ConfigSection::Eth1.knows("range"));
    }
}
