use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::ScrubError;
use crate::model::{ChannelKind, Section};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine settings. Every table is optional in TOML; omitted fields take the
/// built-in channel set's values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub registry: RegistryConfig,
    pub windows: WindowConfig,
    pub folders: FolderConfig,
    pub cleaner: CleanerConfig,
    pub disposition: DispositionConfig,
    pub lookup: LookupConfig,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Workbook file name under the storage root.
    pub artifact: String,
    /// Status file written next to the artifact after each successful build.
    pub last_updated_file: String,
    pub sheets: SectionSheets,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            artifact: "List Cleaner.xlsx".into(),
            last_updated_file: "last_updated.json".into(),
            sheets: SectionSheets::default(),
        }
    }
}

/// Sheet name of each registry section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SectionSheets {
    pub general: String,
    pub dnc: String,
    pub crm_duplicates: String,
    pub rolling_outbound: String,
    pub from_other_list: String,
    pub unique_id: String,
}

impl Default for SectionSheets {
    fn default() -> Self {
        Self {
            general: "ContMgt+MVP+JC+PD+RC".into(),
            dnc: "DNC".into(),
            crm_duplicates: "PD-Remove".into(),
            rolling_outbound: "Outbound-2weeks".into(),
            from_other_list: "FromOtherList".into(),
            unique_id: "UniqueDB ID".into(),
        }
    }
}

impl SectionSheets {
    pub fn name(&self, section: Section) -> &str {
        match section {
            Section::General => &self.general,
            Section::Dnc => &self.dnc,
            Section::CrmDuplicates => &self.crm_duplicates,
            Section::RollingOutbound => &self.rolling_outbound,
            Section::FromOtherList => &self.from_other_list,
            Section::UniqueId => &self.unique_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Windows + folders
// ---------------------------------------------------------------------------

/// Rolling windows, in days, for outbound activity per channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub contact_center_outbound: u32,
    pub rc_outbound: u32,
    pub jc_sent: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            contact_center_outbound: 14,
            rc_outbound: 30,
            jc_sent: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FolderConfig {
    /// Channel folders whose files are all read and unioned instead of
    /// taking only the latest file.
    pub concatenate: Vec<String>,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            concatenate: vec!["contact_center".into(), "rc".into()],
        }
    }
}

impl FolderConfig {
    pub fn concatenated_channels(&self) -> Vec<ChannelKind> {
        self.concatenate
            .iter()
            .filter_map(|key| ChannelKind::from_folder_key(key))
            .collect()
    }

    pub fn is_concatenated(&self, kind: ChannelKind) -> bool {
        self.concatenate
            .iter()
            .any(|key| ChannelKind::from_folder_key(key) == Some(kind))
    }
}

// ---------------------------------------------------------------------------
// Cleaner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanerConfig {
    /// Phone slot columns in priority order (slot 1 first).
    pub slot_columns: Vec<String>,
    pub record_id_column: String,
    pub deal_id_column: String,
    pub contact_type_column: String,
    /// Contact-type tags that mark an organizational contact (case-insensitive).
    pub organization_types: Vec<String>,
    /// Prepended to the input file name when exporting.
    pub output_prefix: String,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            slot_columns: (1..=5).map(|i| format!("phone{i}")).collect(),
            record_id_column: "contact_id".into(),
            deal_id_column: "contact_deal_id".into(),
            contact_type_column: "contact_type".into(),
            organization_types: vec!["company".into(), "organization".into()],
            output_prefix: "(Clean file) ".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Disposition + lookup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispositionConfig {
    /// Codes that suppress a number with no time bound.
    pub permanent_codes: Vec<String>,
    /// Codes that suppress only while the latest matching event is recent.
    pub windowed_codes: Vec<String>,
    pub window_months: u32,
}

impl Default for DispositionConfig {
    fn default() -> Self {
        Self {
            permanent_codes: vec!["DNC".into(), "WRONG_NUMBER".into()],
            windowed_codes: vec!["NOT_INTERESTED".into()],
            window_months: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupConfig {
    /// Name stamped on every row the resolver fills.
    pub resolver_name: String,
    /// Joins several identifiers found for one phone.
    pub separator: String,
    pub source_phone_column: String,
    pub source_id_column: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            resolver_name: "List Scrub Resolver".into(),
            separator: " | ".into(),
            source_phone_column: "phone_number".into(),
            source_id_column: "Deal - ID".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ScrubError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| ScrubError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScrubError> {
        let windows = [
            ("contact_center_outbound", self.windows.contact_center_outbound),
            ("rc_outbound", self.windows.rc_outbound),
            ("jc_sent", self.windows.jc_sent),
        ];
        for (name, days) in windows {
            if days == 0 {
                return Err(ScrubError::ConfigValidation(format!(
                    "window '{name}' must be at least 1 day"
                )));
            }
        }

        if self.disposition.window_months == 0 {
            return Err(ScrubError::ConfigValidation(
                "disposition window_months must be at least 1".into(),
            ));
        }

        let slots = self.cleaner.slot_columns.len();
        if slots == 0 || slots > 5 {
            return Err(ScrubError::ConfigValidation(format!(
                "cleaner needs 1 to 5 slot columns, got {slots}"
            )));
        }

        let mut seen = BTreeSet::new();
        for section in Section::ALL {
            let name = self.registry.sheets.name(section);
            if name.trim().is_empty() {
                return Err(ScrubError::ConfigValidation(format!(
                    "section '{section}' has an empty sheet name"
                )));
            }
            if !seen.insert(name) {
                return Err(ScrubError::ConfigValidation(format!(
                    "sheet name '{name}' is used by more than one section"
                )));
            }
        }

        for key in &self.folders.concatenate {
            if ChannelKind::from_folder_key(key).is_none() {
                return Err(ScrubError::ConfigValidation(format!(
                    "concatenate folder '{key}' is not a known channel"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
