//! Supported browser catalogue and installation detection

use tracing::{debug, info};

use super::default_browser::{DefaultBrowserProbe, browser_for_handler, probe_for};
use crate::types::{
    BrowserDescriptor, CookieFamily, DetectedBrowser, PathHint,
    PathRoot::{Absolute, Home, LocalAppData, ProgramFiles, ProgramFilesX86, RoamingAppData},
    Platform::{self, Linux, MacOs, Windows},
    PlatformDirs,
};

const ALL: &[Platform] = &[Windows, MacOs, Linux];

/// Every browser the enroller can take a session from
pub static SUPPORTED_BROWSERS: &[BrowserDescriptor] = &[
    BrowserDescriptor {
        id: "chrome",
        name: "Google Chrome",
        platforms: ALL,
        family: CookieFamily::Chromium,
        priority: 2,
        install_hints: &[
            PathHint::new(Windows, ProgramFiles, "Google/Chrome/Application/chrome.exe"),
            PathHint::new(Windows, ProgramFilesX86, "Google/Chrome/Application/chrome.exe"),
            PathHint::new(MacOs, Absolute, "/Applications/Google Chrome.app"),
        ],
        profile_roots: &[
            PathHint::new(Windows, LocalAppData, "Google/Chrome/User Data"),
            PathHint::new(MacOs, Home, "Library/Application Support/Google/Chrome"),
            PathHint::new(Linux, Home, ".config/google-chrome"),
            PathHint::new(Linux, Home, ".config/chromium"),
        ],
        safe_storage: Some("Chrome Safe Storage"),
        secret_application: Some("chrome"),
        handler_ids: &[
            (Windows, "ChromeHTML"),
            (MacOs, "com.google.chrome"),
            (Linux, "google-chrome"),
            (Linux, "chromium"),
        ],
    },
    BrowserDescriptor {
        id: "firefox",
        name: "Mozilla Firefox",
        platforms: ALL,
        family: CookieFamily::Gecko,
        priority: 3,
        install_hints: &[
            PathHint::new(Windows, ProgramFiles, "Mozilla Firefox/firefox.exe"),
            PathHint::new(Windows, ProgramFilesX86, "Mozilla Firefox/firefox.exe"),
            PathHint::new(MacOs, Absolute, "/Applications/Firefox.app"),
        ],
        profile_roots: &[
            PathHint::new(Windows, RoamingAppData, "Mozilla/Firefox"),
            PathHint::new(MacOs, Home, "Library/Application Support/Firefox"),
            PathHint::new(Linux, Home, ".mozilla/firefox"),
            PathHint::new(Linux, Home, "snap/firefox/common/.mozilla/firefox"),
        ],
        safe_storage: None,
        secret_application: None,
        handler_ids: &[
            (Windows, "FirefoxURL"),
            (MacOs, "org.mozilla.firefox"),
            (Linux, "firefox"),
        ],
    },
    BrowserDescriptor {
        id: "edge",
        name: "Microsoft Edge",
        platforms: ALL,
        family: CookieFamily::Chromium,
        priority: 4,
        install_hints: &[
            PathHint::new(Windows, ProgramFiles, "Microsoft/Edge/Application/msedge.exe"),
            PathHint::new(Windows, ProgramFilesX86, "Microsoft/Edge/Application/msedge.exe"),
            PathHint::new(MacOs, Absolute, "/Applications/Microsoft Edge.app"),
        ],
        profile_roots: &[
            PathHint::new(Windows, LocalAppData, "Microsoft/Edge/User Data"),
            PathHint::new(MacOs, Home, "Library/Application Support/Microsoft Edge"),
            PathHint::new(Linux, Home, ".config/microsoft-edge"),
        ],
        safe_storage: Some("Microsoft Edge Safe Storage"),
        secret_application: Some("microsoft-edge"),
        handler_ids: &[
            (Windows, "MSEdgeHTM"),
            (MacOs, "com.microsoft.edgemac"),
            (Linux, "microsoft-edge"),
        ],
    },
    BrowserDescriptor {
        id: "safari",
        name: "Safari",
        platforms: &[MacOs],
        family: CookieFamily::Keychain,
        priority: 5,
        install_hints: &[
            PathHint::new(MacOs, Absolute, "/Applications/Safari.app"),
            PathHint::new(MacOs, Home, "Library/Safari"),
        ],
        profile_roots: &[
            PathHint::new(MacOs, Home, "Library/Containers/com.apple.Safari/Data/Library/Cookies"),
            PathHint::new(MacOs, Home, "Library/Cookies"),
        ],
        safe_storage: None,
        secret_application: None,
        handler_ids: &[(MacOs, "com.apple.safari")],
    },
    BrowserDescriptor {
        id: "brave",
        name: "Brave Browser",
        platforms: ALL,
        family: CookieFamily::Chromium,
        priority: 6,
        install_hints: &[
            PathHint::new(Windows, ProgramFiles, "BraveSoftware/Brave-Browser/Application/brave.exe"),
            PathHint::new(Windows, ProgramFilesX86, "BraveSoftware/Brave-Browser/Application/brave.exe"),
            PathHint::new(MacOs, Absolute, "/Applications/Brave Browser.app"),
        ],
        profile_roots: &[
            PathHint::new(Windows, LocalAppData, "BraveSoftware/Brave-Browser/User Data"),
            PathHint::new(MacOs, Home, "Library/Application Support/BraveSoftware/Brave-Browser"),
            PathHint::new(Linux, Home, ".config/BraveSoftware/Brave-Browser"),
        ],
        safe_storage: Some("Brave Safe Storage"),
        secret_application: Some("brave"),
        handler_ids: &[
            (Windows, "BraveHTML"),
            (MacOs, "com.brave.browser"),
            (Linux, "brave"),
        ],
    },
    BrowserDescriptor {
        id: "opera",
        name: "Opera",
        platforms: ALL,
        family: CookieFamily::Chromium,
        priority: 7,
        install_hints: &[
            PathHint::new(Windows, LocalAppData, "Programs/Opera/opera.exe"),
            PathHint::new(Windows, ProgramFiles, "Opera/opera.exe"),
            PathHint::new(MacOs, Absolute, "/Applications/Opera.app"),
        ],
        profile_roots: &[
            PathHint::new(Windows, RoamingAppData, "Opera Software/Opera Stable"),
            PathHint::new(MacOs, Home, "Library/Application Support/com.operasoftware.Opera"),
            PathHint::new(Linux, Home, ".config/opera"),
        ],
        safe_storage: Some("Opera Safe Storage"),
        secret_application: Some("opera"),
        handler_ids: &[
            (Windows, "OperaStable"),
            (MacOs, "com.operasoftware.opera"),
            (Linux, "opera"),
        ],
    },
    BrowserDescriptor {
        id: "opera_gx",
        name: "Opera GX",
        platforms: &[Windows, MacOs],
        family: CookieFamily::Chromium,
        priority: 8,
        install_hints: &[
            PathHint::new(Windows, LocalAppData, "Programs/Opera GX/opera.exe"),
            PathHint::new(Windows, ProgramFiles, "Opera GX/opera.exe"),
            PathHint::new(MacOs, Absolute, "/Applications/Opera GX.app"),
        ],
        profile_roots: &[
            PathHint::new(Windows, RoamingAppData, "Opera Software/Opera GX Stable"),
            PathHint::new(MacOs, Home, "Library/Application Support/com.operasoftware.OperaGX"),
        ],
        safe_storage: Some("Opera Safe Storage"),
        secret_application: Some("opera"),
        handler_ids: &[
            (Windows, "Opera GXStable"),
            (Windows, "Opera.GX"),
            (MacOs, "com.operasoftware.operagx"),
        ],
    },
];

/// Look up a descriptor by its stable id
pub fn find_descriptor(id: &str) -> Option<&'static BrowserDescriptor> {
    SUPPORTED_BROWSERS.iter().find(|d| d.id == id)
}

/// Enumerates, detects and orders browsers for one platform
#[derive(Debug)]
pub struct BrowserRegistry {
    platform: Platform,
    dirs: PlatformDirs,
    probe: Box<dyn DefaultBrowserProbe>,
}

impl BrowserRegistry {
    /// Create a registry with an explicit default-browser probe
    pub fn new(platform: Platform, dirs: PlatformDirs, probe: Box<dyn DefaultBrowserProbe>) -> Self {
        Self {
            platform,
            dirs,
            probe,
        }
    }

    /// Registry for the running OS and user
    pub fn for_current_platform() -> Self {
        let platform = Platform::current();
        Self::new(platform, PlatformDirs::from_env(), probe_for(platform))
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn dirs(&self) -> &PlatformDirs {
        &self.dirs
    }

    /// Browsers that exist on this platform
    pub fn list_supported(&self) -> Vec<&'static BrowserDescriptor> {
        SUPPORTED_BROWSERS
            .iter()
            .filter(|d| d.supports(self.platform))
            .collect()
    }

    /// The OS default browser, if the probe knows it and we support it
    pub fn detect_default(&self) -> Option<&'static BrowserDescriptor> {
        let handler = self.probe.handler_id()?;
        let descriptor = browser_for_handler(self.platform, &handler);
        match descriptor {
            Some(d) => debug!("Default browser handler {} -> {}", handler, d.id),
            None => debug!("Default browser handler {} is not supported", handler),
        }
        descriptor
    }

    /// Browsers with at least one install or profile path on disk
    pub fn detect_installed(&self) -> Vec<DetectedBrowser> {
        let default = self.detect_default();

        let detected: Vec<DetectedBrowser> = self
            .list_supported()
            .into_iter()
            .filter_map(|descriptor| {
                let evidence: Vec<_> = descriptor
                    .install_hints
                    .iter()
                    .chain(descriptor.profile_roots.iter())
                    .filter(|hint| hint.platform == self.platform)
                    .filter_map(|hint| self.dirs.resolve(hint))
                    .filter(|path| path.exists())
                    .collect();

                if evidence.is_empty() {
                    return None;
                }

                Some(DetectedBrowser {
                    descriptor,
                    evidence,
                    is_default: default.is_some_and(|d| d.id == descriptor.id),
                })
            })
            .collect();

        info!(
            "Detected {} installed browser(s): {}",
            detected.len(),
            detected.iter().map(|b| b.id()).collect::<Vec<_>>().join(", ")
        );
        detected
    }

    /// Best browser to take a session from, if any is installed
    pub fn recommend(&self) -> Option<DetectedBrowser> {
        sort_by_priority(self.detect_installed()).into_iter().next()
    }
}

/// Order browsers for session extraction.
///
/// The default browser comes first, then Chromium-family before Gecko before
/// Keychain, then descriptor priority, then id. The key is total, so the
/// order is deterministic and sorting twice changes nothing.
pub fn sort_by_priority(mut browsers: Vec<DetectedBrowser>) -> Vec<DetectedBrowser> {
    browsers.sort_by_key(|b| {
        (
            !b.is_default,
            b.descriptor.family.rank(),
            b.descriptor.priority,
            b.descriptor.id,
        )
    });
    browsers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::default_browser::{FixedProbe, NoProbe};
    use std::path::Path;
    use tempfile::TempDir;

    fn registry(home: &Path, handler: Option<&str>) -> BrowserRegistry {
        BrowserRegistry::new(
            Platform::Linux,
            PlatformDirs::rooted_at(home),
            Box::new(FixedProbe(handler.map(str::to_string))),
        )
    }

    fn detected(id: &str, is_default: bool) -> DetectedBrowser {
        DetectedBrowser {
            descriptor: find_descriptor(id).unwrap(),
            evidence: Vec::new(),
            is_default,
        }
    }

    fn ids(browsers: &[DetectedBrowser]) -> Vec<&'static str> {
        browsers.iter().map(|b| b.id()).collect()
    }

    #[test]
    fn test_catalogue_ids_are_unique() {
        let mut ids: Vec<_> = SUPPORTED_BROWSERS.iter().map(|d| d.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), SUPPORTED_BROWSERS.len());
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_safari_only_on_macos() {
        let temp = TempDir::new().unwrap();
        let linux = registry(temp.path(), None);
        assert!(linux.list_supported().iter().all(|d| d.id != "safari"));

        let mac = BrowserRegistry::new(
            Platform::MacOs,
            PlatformDirs::rooted_at(temp.path()),
            Box::new(NoProbe),
        );
        assert!(mac.list_supported().iter().any(|d| d.id == "safari"));
    }

    #[test]
    fn test_detect_installed_from_profile_dirs() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".mozilla/firefox")).unwrap();
        std::fs::create_dir_all(temp.path().join(".config/chromium")).unwrap();

        let registry = registry(temp.path(), None);
        let installed = registry.detect_installed();

        assert_eq!(ids(&installed), vec!["chrome", "firefox"]);
        assert_eq!(
            installed[0].evidence,
            vec![temp.path().join(".config/chromium")]
        );
        assert!(installed.iter().all(|b| !b.is_default));
    }

    #[test]
    fn test_detect_default_marks_installed_browser() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".mozilla/firefox")).unwrap();
        std::fs::create_dir_all(temp.path().join(".config/google-chrome")).unwrap();

        let registry = registry(temp.path(), Some("firefox.desktop"));
        assert_eq!(registry.detect_default().map(|d| d.id), Some("firefox"));

        let recommended = registry.recommend().unwrap();
        assert_eq!(recommended.id(), "firefox");
        assert!(recommended.is_default);
    }

    #[test]
    fn test_detect_default_unknown_handler_is_none() {
        let temp = TempDir::new().unwrap();
        let registry = registry(temp.path(), Some("vivaldi-stable.desktop"));
        assert!(registry.detect_default().is_none());
    }

    #[test]
    fn test_sort_default_first_then_chromium_family() {
        let browsers = vec![
            detected("firefox", false),
            detected("opera", false),
            detected("edge", true),
            detected("chrome", false),
        ];
        let sorted = sort_by_priority(browsers);
        assert_eq!(ids(&sorted), vec!["edge", "chrome", "opera", "firefox"]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let browsers = vec![
            detected("safari", false),
            detected("brave", false),
            detected("firefox", true),
            detected("opera_gx", false),
            detected("chrome", false),
        ];
        let once = sort_by_priority(browsers);
        let twice = sort_by_priority(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once[0].id(), "firefox");
    }

    #[test]
    fn test_recommend_none_when_nothing_installed() {
        let temp = TempDir::new().unwrap();
        assert!(registry(temp.path(), Some("firefox.desktop")).recommend().is_none());
    }
}
