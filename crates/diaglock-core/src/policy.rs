//! Carrier allow-list policy.
//!
//! Each carrier variant maps to a fixed list of opcodes that stay usable while
//! the diagnostic interface is locked. The lists are literal data so they can
//! be audited next to the carrier requirement they implement.

use diaglock_provider::{BoardInfo, Operator};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First byte of a diagnostic command packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const TESTMODE_RESET: Opcode = Opcode(0x29);
    pub const DLOAD_RESET: Opcode = Opcode(0x3A);
    pub const ASYNC_HDLC_FLAG: Opcode = Opcode(0x7E);
    pub const PORT_LOCK: Opcode = Opcode(0xA1);
    pub const WEB_DOWNLOAD: Opcode = Opcode(0xEF);
    pub const AT_COMMAND_LOCK: Opcode = Opcode(0xF8);
    pub const TESTMODE: Opcode = Opcode(0xFA);

    pub fn value(self) -> u8 {
        self.0
    }

    /// Opcode carried by `packet`, if any.
    pub fn from_packet(packet: &[u8]) -> Option<Self> {
        packet.first().copied().map(Opcode)
    }
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        Opcode(value)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl FromStr for Opcode {
    type Err = String;

    /// Accepts `0x`-prefixed hex or plain decimal.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => trimmed.parse::<u8>(),
        };
        parsed
            .map(Opcode)
            .map_err(|err| format!("invalid opcode `{trimmed}`: {err}"))
    }
}

/// One permitted opcode and what it is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowEntry {
    pub opcode: Opcode,
    pub meaning: &'static str,
}

const fn entry(opcode: Opcode, meaning: &'static str) -> AllowEntry {
    AllowEntry { opcode, meaning }
}

/// Named, immutable set of opcodes that bypass the lock.
#[derive(Debug, PartialEq, Eq)]
pub struct AllowList {
    name: &'static str,
    entries: &'static [AllowEntry],
}

impl AllowList {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &'static [AllowEntry] {
        self.entries
    }

    pub fn contains(&self, opcode: Opcode) -> bool {
        self.entries.iter().any(|entry| entry.opcode == opcode)
    }

    /// Documented meaning of `opcode` within this list.
    pub fn describe(&self, opcode: Opcode) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|entry| entry.opcode == opcode)
            .map(|entry| entry.meaning)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Opcodes every variant keeps open unless it says otherwise.
pub static DEFAULT_ALLOW_LIST: AllowList = AllowList {
    name: "default",
    entries: &[
        entry(Opcode::TESTMODE_RESET, "testmode reset"),
        entry(Opcode::DLOAD_RESET, "dload reset"),
        entry(Opcode::ASYNC_HDLC_FLAG, "async hdlc flag"),
        entry(Opcode::PORT_LOCK, "port lock"),
        entry(Opcode::WEB_DOWNLOAD, "web download"),
        entry(Opcode::TESTMODE, "testmode"),
    ],
};

/// Verizon builds: the default list plus the AT-command lock.
pub static VERIZON_ALLOW_LIST: AllowList = AllowList {
    name: "verizon",
    entries: &[
        entry(Opcode::TESTMODE_RESET, "testmode reset"),
        entry(Opcode::DLOAD_RESET, "dload reset"),
        entry(Opcode::ASYNC_HDLC_FLAG, "async hdlc flag"),
        entry(Opcode::PORT_LOCK, "port lock"),
        entry(Opcode::WEB_DOWNLOAD, "web download"),
        entry(Opcode::AT_COMMAND_LOCK, "vzw at lock"),
        entry(Opcode::TESTMODE, "testmode"),
    ],
};

/// Sprint: only the port lock stays reachable.
pub static SPRINT_ALLOW_LIST: AllowList = AllowList {
    name: "sprint",
    entries: &[entry(Opcode::PORT_LOCK, "port lock")],
};

/// Verizon postpaid/prepaid on unified builds.
pub static AT_COMMAND_LOCK_ALLOW_LIST: AllowList = AllowList {
    name: "at-command-lock",
    entries: &[entry(Opcode::AT_COMMAND_LOCK, "vzw at lock")],
};

/// Deployment target selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    /// Default allow-list, lock state only changes through the attribute.
    #[default]
    Generic,
    /// Default allow-list plus the AT-command lock.
    Verizon,
    /// Restricted allow-list, lock seeded from the identity record.
    Sprint,
    /// One image for every carrier; variant resolved from board identity.
    Unified,
}

impl BuildProfile {
    pub const ALL: [BuildProfile; 4] = [
        BuildProfile::Generic,
        BuildProfile::Verizon,
        BuildProfile::Sprint,
        BuildProfile::Unified,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildProfile::Generic => "generic",
            BuildProfile::Verizon => "verizon",
            BuildProfile::Sprint => "sprint",
            BuildProfile::Unified => "unified",
        }
    }

    /// Resolve the carrier variant whose allow-list applies right now.
    ///
    /// Fixed profiles ignore the board; `Unified` asks it on every call.
    pub fn resolve_variant<B: BoardInfo + ?Sized>(self, board: &B) -> CarrierVariant {
        match self {
            BuildProfile::Generic => CarrierVariant::Default,
            BuildProfile::Verizon => CarrierVariant::Verizon,
            BuildProfile::Sprint => CarrierVariant::Sprint,
            BuildProfile::Unified => CarrierVariant::from_operator(&board.operator()),
        }
    }

    /// Whether the lock state is seeded from the shared-memory identity record.
    pub fn seeds_from_identity<B: BoardInfo + ?Sized>(self, board: &B) -> bool {
        match self {
            BuildProfile::Sprint => true,
            BuildProfile::Unified => board.operator().is_sprint(),
            BuildProfile::Generic | BuildProfile::Verizon => false,
        }
    }

    /// Whether the factory exemption can ever apply on this profile.
    pub fn allows_factory_exemption(self) -> bool {
        !matches!(self, BuildProfile::Sprint)
    }

    /// Whether trusted in-process callers get a state mutator.
    pub fn exports_mutator(self) -> bool {
        matches!(self, BuildProfile::Sprint | BuildProfile::Unified)
    }
}

impl fmt::Display for BuildProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildProfile {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase();
        BuildProfile::ALL
            .into_iter()
            .find(|profile| profile.as_str() == wanted)
            .ok_or_else(|| {
                format!("unknown profile `{raw}` (expected generic, verizon, sprint or unified)")
            })
    }
}

/// Key into the policy table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CarrierVariant {
    Default,
    Verizon,
    Sprint,
    VerizonPostpaid,
    VerizonPrepaid,
    /// Operator a unified build does not name explicitly.
    Unrecognized(String),
}

impl CarrierVariant {
    pub fn from_operator(operator: &Operator) -> Self {
        match operator {
            Operator::SprUs => CarrierVariant::Sprint,
            Operator::VzwPostpaid => CarrierVariant::VerizonPostpaid,
            Operator::VzwPrepaid => CarrierVariant::VerizonPrepaid,
            Operator::Other(code) => CarrierVariant::Unrecognized(code.clone()),
        }
    }

    /// Allow-list for this variant.
    ///
    /// Unrecognized variants fall back to the default list rather than to an
    /// empty one.
    pub fn allow_list(&self) -> &'static AllowList {
        match self {
            CarrierVariant::Default | CarrierVariant::Unrecognized(_) => &DEFAULT_ALLOW_LIST,
            CarrierVariant::Verizon => &VERIZON_ALLOW_LIST,
            CarrierVariant::Sprint => &SPRINT_ALLOW_LIST,
            CarrierVariant::VerizonPostpaid | CarrierVariant::VerizonPrepaid => {
                &AT_COMMAND_LOCK_ALLOW_LIST
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, CarrierVariant::Unrecognized(_))
    }
}

impl fmt::Display for CarrierVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarrierVariant::Default => f.write_str("default"),
            CarrierVariant::Verizon => f.write_str("verizon"),
            CarrierVariant::Sprint => f.write_str("sprint"),
            CarrierVariant::VerizonPostpaid => f.write_str("verizon-postpaid"),
            CarrierVariant::VerizonPrepaid => f.write_str("verizon-prepaid"),
            CarrierVariant::Unrecognized(code) => write!(f, "unrecognized ({code})"),
        }
    }
}

impl FromStr for CarrierVariant {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(CarrierVariant::Default),
            "verizon" | "vzw" => Ok(CarrierVariant::Verizon),
            "sprint" | "spr" => Ok(CarrierVariant::Sprint),
            "verizon-postpaid" | "vzw-postpaid" => Ok(CarrierVariant::VerizonPostpaid),
            "verizon-prepaid" | "vzw-prepaid" => Ok(CarrierVariant::VerizonPrepaid),
            other => Err(format!("unknown carrier variant `{other}`")),
        }
    }
}

/// Every list the table can hand out, for audit output.
pub fn all_allow_lists() -> [&'static AllowList; 4] {
    [
        &DEFAULT_ALLOW_LIST,
        &VERIZON_ALLOW_LIST,
        &SPRINT_ALLOW_LIST,
        &AT_COMMAND_LOCK_ALLOW_LIST,
    ]
}
