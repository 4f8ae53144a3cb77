use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Firmware details from a `#config-version=` banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    /// Hardware/platform code, e.g. `FGT60F`.
    pub platform: Option<String>,
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
    pub build: Option<u32>,
    /// `vdom=1` in the banner options.
    pub vdom_mode: bool,
    /// Banner text after `=`.
    pub raw: String,
}

impl Display for FirmwareVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)?;
        if let Some(patch) = self.patch {
            write!(f, ".{patch}")?;
        }
        if let Some(build) = self.build {
            write!(f, ",build{build}")?;
        }
        Ok(())
    }
}

/// Parse the text after `#config-version=`.
///
/// `FGT60F-7.2.5-FW-build1517-230606:opmode=0:vdom=1:user=admin` yields
/// platform `FGT60F`, version 7.2.5, build 1517 and VDOM mode. Returns `None`
/// when no `major.minor` token is present.
pub fn parse_version_banner(banner: &str) -> Option<FirmwareVersion> {
    let mut parts = banner.trim().split(':');
    let head = parts.next().unwrap_or_default();
    let vdom_mode = parts.any(|opt| opt.trim() == "vdom=1");

    let tokens: Vec<&str> = head.split('-').collect();
    let (position, (major, minor, patch)) = tokens
        .iter()
        .enumerate()
        .find_map(|(idx, token)| dotted_version(token).map(|v| (idx, v)))?;
    let platform = (position > 0).then(|| tokens[..position].join("-"));
    let build = tokens.iter().find_map(|token| {
        token
            .strip_prefix("build")
            .and_then(|digits| digits.parse::<u32>().ok())
    });

    Some(FirmwareVersion {
        platform,
        major,
        minor,
        patch,
        build,
        vdom_mode,
        raw: banner.trim().to_string(),
    })
}

fn dotted_version(token: &str) -> Option<(u32, u32, Option<u32>)> {
    let token = token.strip_prefix('v').unwrap_or(token);
    let mut numbers = token.split('.');
    let major = numbers.next()?.parse().ok()?;
    let minor = numbers.next()?.parse().ok()?;
    let patch = match numbers.next() {
        Some(p) => Some(p.parse().ok()?),
        None => None,
    };
    if numbers.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}
