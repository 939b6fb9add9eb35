use semver::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbedVersion {
    Parsed(Version),
    Unparseable(String),
}

impl ProbedVersion {
    pub fn parsed(&self) -> Option<&Version> {
        match self {
            Self::Parsed(version) => Some(version),
            Self::Unparseable(_) => None,
        }
    }

    pub fn major(&self) -> Option<u64> {
        self.parsed().map(|version| version.major)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Parsed(version) => version.to_string(),
            Self::Unparseable(raw) if raw.trim().is_empty() => "<empty>".to_string(),
            Self::Unparseable(raw) => format!("<unparseable: {}>", raw.trim()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSupport {
    AtTarget,
    OneMajorBelow,
    Unsupported,
}

impl VersionSupport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AtTarget => "at-target",
            Self::OneMajorBelow => "one-major-below",
            Self::Unsupported => "unsupported",
        }
    }
}

pub fn classify_version(version: &ProbedVersion, target_major: u64) -> VersionSupport {
    match version.major() {
        Some(major) if major == target_major => VersionSupport::AtTarget,
        Some(major) if major.checked_add(1) == Some(target_major) => {
            VersionSupport::OneMajorBelow
        }
        _ => VersionSupport::Unsupported,
    }
}

/// Parses `pveversion` output such as `pve-manager/8.4.1/2a5fa54a8503f96d (running kernel: 6.8.12-9-pve)`.
///
/// Bare triplets (`8.4.1`, `8.4-1`) are accepted too. Anything else yields
/// [`ProbedVersion::Unparseable`] carrying the raw text.
pub fn parse_pveversion(output: &str) -> ProbedVersion {
    let trimmed = output.trim();
    let candidate = match trimmed.split_once("pve-manager/") {
        Some((_, rest)) => rest.split('/').next().unwrap_or_default(),
        None => trimmed.split_whitespace().next().unwrap_or_default(),
    };

    match parse_version_triplet(candidate) {
        Some(version) => ProbedVersion::Parsed(version),
        None => ProbedVersion::Unparseable(trimmed.to_string()),
    }
}

pub fn parse_version_triplet(raw: &str) -> Option<Version> {
    let mut parts = raw.trim().splitn(3, ['.', '-']);
    let major = parse_leading_number(parts.next()?)?;
    let minor = parse_leading_number(parts.next()?)?;
    let patch = match parts.next() {
        Some(part) => parse_leading_number(part)?,
        None => 0,
    };
    Some(Version::new(major, minor, patch))
}

fn parse_leading_number(part: &str) -> Option<u64> {
    let digits: String = part.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
