use radius_proto::Code;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one RADIUS check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Access-Accept (0)
    Accept,
    /// Access-Reject or any failure (-1)
    Reject,
    /// Access-Challenge (1)
    Challenge,
}

impl Verdict {
    /// Counter value the hosting framework uses for this outcome
    pub fn code(self) -> i32 {
        match self {
            Verdict::Accept => 0,
            Verdict::Reject => -1,
            Verdict::Challenge => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Verdict::Accept),
            -1 => Some(Verdict::Reject),
            1 => Some(Verdict::Challenge),
            _ => None,
        }
    }

    pub fn is_accept(self) -> bool {
        self == Verdict::Accept
    }
}

impl From<Code> for Verdict {
    /// Anything other than Accept or Challenge is a rejection
    fn from(code: Code) -> Self {
        match code {
            Code::AccessAccept => Verdict::Accept,
            Code::AccessChallenge => Verdict::Challenge,
            _ => Verdict::Reject,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accept => f.write_str("accept"),
            Verdict::Reject => f.write_str("reject"),
            Verdict::Challenge => f.write_str("challenge"),
        }
    }
}
