use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context};

/// A package release identifier such as `0.7.10`, `1:2.0~beta1` or
/// `1.3.0-rc.2+kodi21`.
///
/// Ordering rules:
/// - an optional numeric epoch (`N:`) dominates everything else;
/// - release segments are compared pairwise, missing trailing segments count
///   as zero, numeric segments compare numerically and sort before text;
/// - a pre-release (introduced by `-` or `~`) sorts before the plain release,
///   its dot-separated identifiers follow semver precedence;
/// - build metadata (after `+`) never affects ordering.
#[derive(Debug, Clone)]
pub struct VersionId {
    raw: String,
    epoch: u64,
    release: Vec<Segment>,
    pre: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Numeric(u64),
    Text(String),
}

impl Segment {
    fn parse(input: &str) -> anyhow::Result<Self> {
        if input.is_empty() {
            return Err(anyhow!("empty version segment"));
        }
        if input.bytes().all(|b| b.is_ascii_digit()) {
            let value = input
                .parse::<u64>()
                .with_context(|| format!("numeric version segment out of range: {input}"))?;
            return Ok(Self::Numeric(value));
        }
        Ok(Self::Text(input.to_string()))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const ZERO: Segment = Segment::Numeric(0);

impl VersionId {
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(anyhow!("version must not be empty"));
        }
        if let Some(bad) = raw
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '+' | ':' | '~' | '-')))
        {
            return Err(anyhow!("invalid character '{bad}' in version '{raw}'"));
        }

        let without_build = raw.split_once('+').map_or(raw, |(head, _)| head);
        let (epoch, rest) = match without_build.split_once(':') {
            Some((epoch, rest)) => {
                let epoch = epoch
                    .parse::<u64>()
                    .with_context(|| format!("invalid epoch in version '{raw}'"))?;
                (epoch, rest)
            }
            None => (0, without_build),
        };

        let (release, pre) = match rest.find(['-', '~']) {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
            None => (rest, None),
        };

        let release = release
            .split('.')
            .map(Segment::parse)
            .collect::<anyhow::Result<Vec<_>>>()
            .with_context(|| format!("invalid release part in version '{raw}'"))?;
        let pre = match pre {
            Some(pre) => pre
                .split(['.', '-', '~'])
                .map(Segment::parse)
                .collect::<anyhow::Result<Vec<_>>>()
                .with_context(|| format!("invalid pre-release part in version '{raw}'"))?,
            None => Vec::new(),
        };

        Ok(Self {
            raw: raw.to_string(),
            epoch,
            release,
            pre,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    fn cmp_release(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for idx in 0..len {
            let left = self.release.get(idx).unwrap_or(&ZERO);
            let right = other.release.get(idx).unwrap_or(&ZERO);
            match left.cmp(right) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }

    fn cmp_pre(&self, other: &Self) -> Ordering {
        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.pre.cmp(&other.pre),
        }
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.cmp_release(other))
            .then_with(|| self.cmp_pre(other))
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionId {}

impl FromStr for VersionId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
