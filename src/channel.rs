// src/channel.rs

//! Snap channels
//!
//! A channel names an update stream of a snap using the format
//! `track/risk/branch`, where every part but the risk may be omitted:
//!
//! - `stable` - risk only, on the default track
//! - `18` - track only, implicitly its `stable` risk
//! - `18/edge`, `edge/hotfix-1`, `18/candidate/fix-1`
//!
//! # Risks
//!
//! From most to least stable: `stable`, `candidate`, `beta`, `edge`.
//!
//! # Resolution
//!
//! Seeds combine a default channel (from the model or policy) with an
//! override channel (from options). An override without a track narrows the
//! default's track to a new risk/branch, an override with a track replaces
//! it. A model may pin a track, in which case overrides must stay on it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Stability level within a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Risk {
    #[default]
    Stable,
    Candidate,
    Beta,
    Edge,
}

impl Risk {
    /// All risks, most stable first
    pub const ALL: [Risk; 4] = [Risk::Stable, Risk::Candidate, Risk::Beta, Risk::Edge];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Risk::Stable => "stable",
            Risk::Candidate => "candidate",
            Risk::Beta => "beta",
            Risk::Edge => "edge",
        }
    }

    /// Parse a risk name, `None` if the string is not a risk
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from parsing or resolving channels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel name cannot be empty")]
    Empty,

    #[error("channel name has too many components: {0}")]
    TooManyComponents(String),

    #[error("invalid risk in channel name: {0}")]
    InvalidRisk(String),

    #[error("invalid track in channel name: {0}")]
    InvalidTrack(String),

    #[error("invalid branch in channel name: {0}")]
    InvalidBranch(String),

    #[error("cannot switch pinned track {track:?} to channel {channel:?}")]
    PinnedTrackSwitch { track: String, channel: String },
}

/// A parsed channel
///
/// `track` and `branch` are empty when absent. Parsing is verbatim: a
/// `latest` track is kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    pub track: String,
    pub risk: Risk,
    pub branch: String,
}

fn valid_part(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

impl Channel {
    /// Parse a channel keeping its components as written
    pub fn parse_verbatim(s: &str) -> Result<Self, ChannelError> {
        if s.is_empty() {
            return Err(ChannelError::Empty);
        }
        let parts: Vec<&str> = s.split('/').collect();

        let (track, risk, branch) = match parts.as_slice() {
            [one] => match Risk::parse(one) {
                Some(risk) => ("", risk, ""),
                None => (*one, Risk::Stable, ""),
            },
            [first, second] => {
                if let Some(risk) = Risk::parse(first) {
                    ("", risk, *second)
                } else {
                    let risk = Risk::parse(second)
                        .ok_or_else(|| ChannelError::InvalidRisk(s.to_string()))?;
                    (*first, risk, "")
                }
            }
            [track, risk, branch] => {
                let risk =
                    Risk::parse(risk).ok_or_else(|| ChannelError::InvalidRisk(s.to_string()))?;
                (*track, risk, *branch)
            }
            _ => return Err(ChannelError::TooManyComponents(s.to_string())),
        };

        if parts.len() > 1 && parts.iter().any(|p| p.is_empty()) {
            return Err(ChannelError::InvalidBranch(s.to_string()));
        }
        if !track.is_empty() && (!valid_part(track) || Risk::parse(track).is_some()) {
            return Err(ChannelError::InvalidTrack(s.to_string()));
        }
        if !branch.is_empty() && !valid_part(branch) {
            return Err(ChannelError::InvalidBranch(s.to_string()));
        }

        Ok(Self {
            track: track.to_string(),
            risk,
            branch: branch.to_string(),
        })
    }

    /// Parse a channel normalizing the `latest` track away
    pub fn parse(s: &str) -> Result<Self, ChannelError> {
        let mut ch = Self::parse_verbatim(s)?;
        if ch.track == "latest" {
            ch.track.clear();
        }
        Ok(ch)
    }

    /// The channel without its track, `risk[/branch]`
    pub fn risk_and_branch(&self) -> String {
        if self.branch.is_empty() {
            self.risk.to_string()
        } else {
            format!("{}/{}", self.risk, self.branch)
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.track.is_empty() {
            write!(f, "{}/", self.track)?;
        }
        f.write_str(&self.risk_and_branch())
    }
}

impl FromStr for Channel {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::parse_verbatim(s)
    }
}

/// Resolve an override channel relative to a default channel
///
/// An empty override keeps the default. An override carrying a track
/// replaces the default. Otherwise the override's risk/branch is moved onto
/// the default's track.
pub fn resolve(channel: &str, new_channel: &str) -> Result<String, ChannelError> {
    if new_channel.is_empty() {
        return Ok(channel.to_string());
    }
    if channel.is_empty() {
        return Ok(new_channel.to_string());
    }
    let current = Channel::parse_verbatim(channel)?;
    let new = Channel::parse_verbatim(new_channel)?;
    if !new.track.is_empty() || current.track.is_empty() {
        return Ok(new_channel.to_string());
    }
    Ok(format!("{}/{}", current.track, new.risk_and_branch()))
}

/// Resolve an override channel against a pinned track
///
/// The override may only choose a risk/branch on the pinned track. Without
/// an override, or with one naming just the track, the pinned track itself
/// (implicitly its stable risk) is returned.
pub fn resolve_pinned(track: &str, new_channel: &str) -> Result<String, ChannelError> {
    if track.is_empty() {
        return Ok(new_channel.to_string());
    }
    if new_channel.is_empty() {
        return Ok(track.to_string());
    }
    // a bare track parses as track with stable risk
    if new_channel == track {
        return Ok(track.to_string());
    }
    let new = Channel::parse_verbatim(new_channel)?;
    if !new.track.is_empty() && new.track != track {
        return Err(ChannelError::PinnedTrackSwitch {
            track: track.to_string(),
            channel: new_channel.to_string(),
        });
    }
    Ok(format!("{}/{}", track, new.risk_and_branch()))
}
