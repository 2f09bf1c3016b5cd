use std::collections::BTreeSet;

use chrono::{Duration, Local, NaiveDateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Every export source that feeds the registry, keyed by its storage folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// JustCall SMS message details.
    Jc,
    /// MVP SMS logs.
    Mvp,
    /// CRM deal export carrying unique database identifiers.
    PdDb,
    /// CRM person phone export.
    PdPhone,
    /// CRM duplicate/remove list.
    PdRemove,
    /// External do-not-call list.
    Sly,
    /// Call-center logs, one file per drop.
    ContactCenter,
    /// RingCentral SMS logs, one file per drop.
    Rc,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 8] = [
        Self::Jc,
        Self::Mvp,
        Self::PdDb,
        Self::PdPhone,
        Self::PdRemove,
        Self::Sly,
        Self::ContactCenter,
        Self::Rc,
    ];

    pub fn folder_key(&self) -> &'static str {
        match self {
            Self::Jc => "jc",
            Self::Mvp => "mvp",
            Self::PdDb => "pd_db",
            Self::PdPhone => "pd_phone",
            Self::PdRemove => "pd_remove",
            Self::Sly => "sly",
            Self::ContactCenter => "contact_center",
            Self::Rc => "rc",
        }
    }

    /// Case-insensitive lookup by folder name.
    pub fn from_folder_key(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.folder_key() == name)
    }

    /// Section receiving the channel's unconditionally included entries.
    /// Windowed outbound entries always go to [`Section::RollingOutbound`].
    pub fn primary_section(&self) -> Section {
        match self {
            Self::Jc | Self::Mvp | Self::PdPhone | Self::ContactCenter | Self::Rc => Section::General,
            Self::PdDb => Section::UniqueId,
            Self::PdRemove => Section::CrmDuplicates,
            Self::Sly => Section::Dnc,
        }
    }

    /// Channels with a rolling outbound window. Each build refreshes the
    /// rolling outbound section from these alone.
    pub fn emits_outbound(&self) -> bool {
        matches!(self, Self::Jc | Self::ContactCenter | Self::Rc)
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.folder_key())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Logical number pools of the suppression registry, in workbook order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    General,
    Dnc,
    CrmDuplicates,
    RollingOutbound,
    FromOtherList,
    UniqueId,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Self::General,
        Self::Dnc,
        Self::CrmDuplicates,
        Self::RollingOutbound,
        Self::FromOtherList,
        Self::UniqueId,
    ];

    /// All sections except the identifier pool hold canonical phone numbers.
    pub fn is_phone_bearing(&self) -> bool {
        !matches!(self, Self::UniqueId)
    }

    /// Header written on the first row of the section's sheet.
    pub fn column_header(&self) -> &'static str {
        match self {
            Self::UniqueId => "Deal - Unique Database ID",
            _ => "Phone Number",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Dnc => write!(f, "dnc"),
            Self::CrmDuplicates => write!(f, "crm_duplicates"),
            Self::RollingOutbound => write!(f, "rolling_outbound"),
            Self::FromOtherList => write!(f, "from_other_list"),
            Self::UniqueId => write!(f, "unique_id"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inclusion policy
// ---------------------------------------------------------------------------

/// Which instant a rolling window is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowReference {
    /// Each row's own event timestamp, compared with the run clock.
    Now,
    /// The export's ingest (last-modified) time stands in for every row.
    IngestTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InclusionPolicy {
    Unconditional,
    RollingWindow { days: u32, reference: WindowReference },
}

impl InclusionPolicy {
    /// Whether an entry stamped `at` is admitted when the run clock reads `now`.
    /// Undated entries never pass a rolling window.
    pub fn admits(&self, at: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
        match self {
            Self::Unconditional => true,
            Self::RollingWindow { days, .. } => match at {
                Some(at) => at >= now - Duration::days(i64::from(*days)),
                None => false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Run clock
// ---------------------------------------------------------------------------

/// The instant a run treats as "now", in local wall time and in UTC.
/// Call-center logs are stamped in local time; SMS gateways and storage in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    pub local: NaiveDateTime,
    pub utc: NaiveDateTime,
}

impl RunClock {
    pub fn now() -> Self {
        Self {
            local: Local::now().naive_local(),
            utc: Utc::now().naive_utc(),
        }
    }

    /// A clock pinned to one instant with no local offset.
    pub fn fixed(at: NaiveDateTime) -> Self {
        Self { local: at, utc: at }
    }
}

// ---------------------------------------------------------------------------
// Normalizer output
// ---------------------------------------------------------------------------

/// Canonical entries extracted from one channel export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutput {
    pub channel: ChannelKind,
    /// Entries admitted unconditionally; bound for the channel's primary section.
    pub unconditional: BTreeSet<String>,
    /// Outbound entries admitted by `policy`; bound for the rolling outbound section.
    pub windowed: BTreeSet<String>,
    /// Policy applied to `windowed` (Unconditional when the channel has none).
    pub policy: InclusionPolicy,
    /// Values dropped because they could not be normalized.
    pub dropped: usize,
}

impl ChannelOutput {
    pub fn new(channel: ChannelKind, policy: InclusionPolicy) -> Self {
        Self {
            channel,
            unconditional: BTreeSet::new(),
            windowed: BTreeSet::new(),
            policy,
            dropped: 0,
        }
    }
}
