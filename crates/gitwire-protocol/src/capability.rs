//! Protocol capabilities.
//!
//! See: https://git-scm.com/docs/protocol-capabilities

use crate::{ProtocolError, Result};
use std::fmt;
use std::str::FromStr;

/// A capability name.
///
/// Well-known names get their own variant; anything else is kept verbatim
/// in [`Capability::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `multi_ack`
    MultiAck,
    /// `multi_ack_detailed`
    MultiAckDetailed,
    /// `no-done`
    NoDone,
    /// `thin-pack`
    ThinPack,
    /// `side-band`
    Sideband,
    /// `side-band-64k`
    Sideband64k,
    /// `ofs-delta`
    OfsDelta,
    /// `agent`
    Agent,
    /// `object-format`
    ObjectFormat,
    /// `symref`
    Symref,
    /// `shallow`
    Shallow,
    /// `deepen-since`
    DeepenSince,
    /// `deepen-not`
    DeepenNot,
    /// `deepen-relative`
    DeepenRelative,
    /// `no-progress`
    NoProgress,
    /// `include-tag`
    IncludeTag,
    /// `report-status`
    ReportStatus,
    /// `delete-refs`
    DeleteRefs,
    /// `quiet`
    Quiet,
    /// `atomic`
    Atomic,
    /// `push-options`
    PushOptions,
    /// `allow-tip-sha1-in-want`
    AllowTipSha1InWant,
    /// `allow-reachable-sha1-in-want`
    AllowReachableSha1InWant,
    /// `push-cert`
    PushCert,
    /// `filter`
    Filter,
    /// Any other capability name.
    Other(String),
}

/// Every well-known capability.
pub const KNOWN: &[Capability] = &[
    Capability::MultiAck,
    Capability::MultiAckDetailed,
    Capability::NoDone,
    Capability::ThinPack,
    Capability::Sideband,
    Capability::Sideband64k,
    Capability::OfsDelta,
    Capability::Agent,
    Capability::ObjectFormat,
    Capability::Symref,
    Capability::Shallow,
    Capability::DeepenSince,
    Capability::DeepenNot,
    Capability::DeepenRelative,
    Capability::NoProgress,
    Capability::IncludeTag,
    Capability::ReportStatus,
    Capability::DeleteRefs,
    Capability::Quiet,
    Capability::Atomic,
    Capability::PushOptions,
    Capability::AllowTipSha1InWant,
    Capability::AllowReachableSha1InWant,
    Capability::PushCert,
    Capability::Filter,
];

impl Capability {
    /// Returns the wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::MultiAck => "multi_ack",
            Self::MultiAckDetailed => "multi_ack_detailed",
            Self::NoDone => "no-done",
            Self::ThinPack => "thin-pack",
            Self::Sideband => "side-band",
            Self::Sideband64k => "side-band-64k",
            Self::OfsDelta => "ofs-delta",
            Self::Agent => "agent",
            Self::ObjectFormat => "object-format",
            Self::Symref => "symref",
            Self::Shallow => "shallow",
            Self::DeepenSince => "deepen-since",
            Self::DeepenNot => "deepen-not",
            Self::DeepenRelative => "deepen-relative",
            Self::NoProgress => "no-progress",
            Self::IncludeTag => "include-tag",
            Self::ReportStatus => "report-status",
            Self::DeleteRefs => "delete-refs",
            Self::Quiet => "quiet",
            Self::Atomic => "atomic",
            Self::PushOptions => "push-options",
            Self::AllowTipSha1InWant => "allow-tip-sha1-in-want",
            Self::AllowReachableSha1InWant => "allow-reachable-sha1-in-want",
            Self::PushCert => "push-cert",
            Self::Filter => "filter",
            Self::Other(name) => name,
        }
    }

    /// Parses a wire name. Unknown names become [`Capability::Other`].
    pub fn parse(name: &str) -> Self {
        KNOWN
            .iter()
            .find(|c| c.as_str() == name)
            .cloned()
            .unwrap_or_else(|| Self::Other(name.to_string()))
    }

    /// Returns true unless this is [`Capability::Other`].
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    fn requires_argument(&self) -> bool {
        matches!(
            self,
            Self::Agent | Self::ObjectFormat | Self::Symref | Self::PushCert
        )
    }

    fn allows_multiple_arguments(&self) -> bool {
        matches!(self, Self::Symref)
    }
}

impl FromStr for Capability {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An insertion-ordered set of capabilities with their arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityList {
    entries: Vec<(Capability, Vec<String>)>,
}

impl CapabilityList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no capability is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of capabilities set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Parses space separated `name[=value]` tokens, adding them to the
    /// list in order.
    pub fn decode(&mut self, raw: &[u8]) -> Result<()> {
        let raw = std::str::from_utf8(raw)
            .map_err(|_| ProtocolError::InvalidCapability("not UTF-8".to_string()))?;
        for token in raw.split(' ').filter(|t| !t.is_empty()) {
            match token.split_once('=') {
                Some((name, value)) => self.add(Capability::parse(name), [value])?,
                None => self.add(Capability::parse(token), None::<&str>)?,
            }
        }
        Ok(())
    }

    /// Returns true if the capability is set.
    pub fn supports(&self, capability: &Capability) -> bool {
        self.entries.iter().any(|(c, _)| c == capability)
    }

    /// Returns the arguments of a capability, empty if unset.
    pub fn get(&self, capability: &Capability) -> &[String] {
        self.entries
            .iter()
            .find(|(c, _)| c == capability)
            .map(|(_, args)| args.as_slice())
            .unwrap_or_default()
    }

    /// Sets a capability, replacing any previous arguments.
    pub fn set<I, S>(&mut self, capability: Capability, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delete(&capability);
        self.add(capability, args)
    }

    /// Adds a capability, appending to its arguments if already set.
    pub fn add<I, S>(&mut self, capability: Capability, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.is_empty() && capability.requires_argument() {
            return Err(ProtocolError::InvalidCapability(format!(
                "{capability} requires an argument"
            )));
        }
        if args.iter().any(|a| a.is_empty() || a.contains(' ')) {
            return Err(ProtocolError::InvalidCapability(format!(
                "{capability} has an invalid argument"
            )));
        }

        match self.entries.iter_mut().find(|(c, _)| *c == capability) {
            Some((_, existing)) => {
                if !args.is_empty()
                    && !existing.is_empty()
                    && !capability.allows_multiple_arguments()
                {
                    return Err(ProtocolError::InvalidCapability(format!(
                        "{capability} does not allow multiple arguments"
                    )));
                }
                existing.extend(args);
            }
            None => self.entries.push((capability, args)),
        }
        Ok(())
    }

    /// Removes a capability.
    pub fn delete(&mut self, capability: &Capability) {
        self.entries.retain(|(c, _)| c != capability);
    }

    /// Iterates over capabilities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Capability, &[String])> {
        self.entries.iter().map(|(c, args)| (c, args.as_slice()))
    }
}

impl fmt::Display for CapabilityList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (capability, args) in &self.entries {
            if args.is_empty() {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{capability}")?;
                first = false;
            }
            for arg in args {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{capability}={arg}")?;
                first = false;
            }
        }
        Ok(())
    }
}
