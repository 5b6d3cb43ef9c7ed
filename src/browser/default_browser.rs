//! OS default-browser probes
//!
//! Each platform answers "which browser handles https links" differently:
//! the Windows registry, the macOS LaunchServices database or the desktop
//! environment's xdg setting. One probe is picked per process and queried
//! through [`DefaultBrowserProbe`]; a probe that cannot answer returns
//! `None` instead of failing.

use std::process::Command;

use tracing::debug;

use super::registry::SUPPORTED_BROWSERS;
use crate::types::{BrowserDescriptor, Platform};

/// Source of the OS-configured default browser handler
pub trait DefaultBrowserProbe: Send + Sync + std::fmt::Debug {
    /// Raw handler identifier (ProgId, bundle id, desktop entry)
    fn handler_id(&self) -> Option<String>;
}

/// Windows: `UserChoice` ProgId of the https URL association
#[derive(Debug, Default)]
pub struct RegistryProbe;

/// macOS: `LSHandlerRoleAll` of the https/http LaunchServices handler
#[derive(Debug, Default)]
pub struct LaunchServicesProbe;

/// Linux: `xdg-settings`, falling back to the `x-scheme-handler/https` mime default
#[derive(Debug, Default)]
pub struct DesktopSettingProbe;

/// Probe that never knows; used on unsupported platforms and in tests
#[derive(Debug, Default)]
pub struct NoProbe;

/// Probe with a fixed answer
#[derive(Debug, Clone)]
pub struct FixedProbe(pub Option<String>);

impl DefaultBrowserProbe for RegistryProbe {
    fn handler_id(&self) -> Option<String> {
        let output = run(
            "reg",
            &[
                "query",
                r"HKCU\Software\Microsoft\Windows\Shell\Associations\UrlAssociations\https\UserChoice",
                "/v",
                "ProgId",
            ],
        )?;
        parse_reg_query(&output)
    }
}

impl DefaultBrowserProbe for LaunchServicesProbe {
    fn handler_id(&self) -> Option<String> {
        let output = run(
            "defaults",
            &[
                "read",
                "com.apple.LaunchServices/com.apple.launchservices.secure",
                "LSHandlers",
            ],
        )?;
        parse_launch_services(&output)
    }
}

impl DefaultBrowserProbe for DesktopSettingProbe {
    fn handler_id(&self) -> Option<String> {
        run("xdg-settings", &["get", "default-web-browser"])
            .and_then(|out| parse_desktop_entry(&out))
            .or_else(|| {
                run("xdg-mime", &["query", "default", "x-scheme-handler/https"])
                    .and_then(|out| parse_desktop_entry(&out))
            })
    }
}

impl DefaultBrowserProbe for NoProbe {
    fn handler_id(&self) -> Option<String> {
        None
    }
}

impl DefaultBrowserProbe for FixedProbe {
    fn handler_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// The probe strategy for a platform, chosen once at registry construction
pub fn probe_for(platform: Platform) -> Box<dyn DefaultBrowserProbe> {
    match platform {
        Platform::Windows => Box::new(RegistryProbe),
        Platform::MacOs => Box::new(LaunchServicesProbe),
        Platform::Linux => Box::new(DesktopSettingProbe),
    }
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!("{} exited with {}", program, output.status);
            None
        }
        Err(e) => {
            debug!("Could not run {}: {}", program, e);
            None
        }
    }
}

/// Extract the `ProgId` value from `reg query` output
pub fn parse_reg_query(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("ProgId"))
        .and_then(|line| line.split_once("REG_SZ"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Find the https (else http) handler in `defaults read ... LSHandlers` output
pub fn parse_launch_services(output: &str) -> Option<String> {
    let mut https = None;
    let mut http = None;
    let mut role_all: Option<String> = None;
    let mut scheme: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if let Some(value) = plist_value(line, "LSHandlerRoleAll") {
            if value != "-" {
                role_all = Some(value);
            }
        } else if let Some(value) = plist_value(line, "LSHandlerURLScheme") {
            scheme = Some(value);
        } else if line == "}," || line == "}" {
            // End of one handler dictionary; nested dictionaries close with "};"
            match (scheme.take().as_deref(), role_all.take()) {
                (Some("https"), Some(handler)) => https = https.or(Some(handler)),
                (Some("http"), Some(handler)) => http = http.or(Some(handler)),
                _ => {}
            }
        }
    }

    https.or(http)
}

fn plist_value(line: &str, key: &str) -> Option<String> {
    let rest = line.strip_prefix(key)?.trim_start().strip_prefix('=')?;
    Some(
        rest.trim()
            .trim_end_matches(';')
            .trim_matches('"')
            .to_string(),
    )
}

/// First non-empty line of xdg output (`firefox.desktop`)
pub fn parse_desktop_entry(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Map a raw handler id to a browser descriptor.
///
/// Matching is a case-insensitive substring test; the longest matching
/// handler id wins so that `com.operasoftware.OperaGX` resolves to Opera GX
/// rather than Opera.
pub fn browser_for_handler(
    platform: Platform,
    handler: &str,
) -> Option<&'static BrowserDescriptor> {
    let handler = handler.to_lowercase();

    SUPPORTED_BROWSERS
        .iter()
        .flat_map(|descriptor| {
            descriptor
                .handler_ids
                .iter()
                .filter(move |(p, _)| *p == platform)
                .map(move |(_, id)| (id.to_lowercase(), descriptor))
        })
        .filter(|(id, _)| handler.contains(id.as_str()))
        .max_by_key(|(id, _)| id.len())
        .map(|(_, descriptor)| descriptor)
}
