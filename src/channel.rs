// Transaction channels - canonical integer codes + short aliases
// Rules reference channels by name ("TELLER") or alias ("IBK"); the
// database and the comparison layer only ever see the integer code.

use serde::{Deserialize, Serialize};

/// Channel through which a transaction was initiated.
///
/// Each channel has a canonical integer code (the stored representation)
/// and the digital channels carry a short alias. Rule documents may use
/// either spelling; both resolve to the same code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Automated teller machine withdrawal/deposit
    Atm,

    /// In-branch teller transaction
    Teller,

    /// Internet banking (alias: IBK)
    InternetBanking,

    /// Mobile banking app (alias: MBK)
    MobileBanking,
}

impl Channel {
    /// Canonical integer code, as stored in the transaction table.
    pub fn code(&self) -> i64 {
        match self {
            Channel::Atm => 1,
            Channel::Teller => 2,
            Channel::InternetBanking => 3,
            Channel::MobileBanking => 4,
        }
    }

    /// Full canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Atm => "ATM",
            Channel::Teller => "TELLER",
            Channel::InternetBanking => "INTERNET_BANKING",
            Channel::MobileBanking => "MOBILE_BANKING",
        }
    }

    /// Short alias, where one exists (digital channels only).
    pub fn alias(&self) -> Option<&'static str> {
        match self {
            Channel::InternetBanking => Some("IBK"),
            Channel::MobileBanking => Some("MBK"),
            _ => None,
        }
    }

    /// Resolve a channel name or alias, case-insensitive.
    /// Returns None for unknown names - rule values naming an unknown
    /// channel compare as false rather than failing the whole rule.
    pub fn parse(name: &str) -> Option<Channel> {
        match name.to_uppercase().as_str() {
            "ATM" => Some(Channel::Atm),
            "TELLER" => Some(Channel::Teller),
            "INTERNET_BANKING" | "IBK" => Some(Channel::InternetBanking),
            "MOBILE_BANKING" | "MBK" => Some(Channel::MobileBanking),
            _ => None,
        }
    }

    /// Reverse lookup from a stored code.
    pub fn from_code(code: i64) -> Option<Channel> {
        match code {
            1 => Some(Channel::Atm),
            2 => Some(Channel::Teller),
            3 => Some(Channel::InternetBanking),
            4 => Some(Channel::MobileBanking),
            _ => None,
        }
    }
}
