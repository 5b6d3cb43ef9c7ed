//! Browser descriptors and detection results

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Operating systems the registry knows how to inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// The platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

/// Cookie storage family; selects the cookie adapter for a browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieFamily {
    /// Encrypted SQLite `Cookies` database under a Chromium user-data dir
    Chromium,
    /// `cookies.sqlite` inside a Firefox profile
    Gecko,
    /// Safari's binary cookie jar in the OS-managed container
    Keychain,
}

impl CookieFamily {
    /// Compatibility rank used after the default browser when ordering
    pub fn rank(self) -> u8 {
        match self {
            CookieFamily::Chromium => 0,
            CookieFamily::Gecko => 1,
            CookieFamily::Keychain => 2,
        }
    }
}

/// Well-known directory a [`PathHint`] is relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathRoot {
    Home,
    LocalAppData,
    RoamingAppData,
    ProgramFiles,
    ProgramFilesX86,
    Absolute,
}

/// One candidate location for a browser on one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathHint {
    pub platform: Platform,
    pub root: PathRoot,
    pub relative: &'static str,
}

impl PathHint {
    pub const fn new(platform: Platform, root: PathRoot, relative: &'static str) -> Self {
        Self {
            platform,
            root,
            relative,
        }
    }
}

/// Static description of a supported browser
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct BrowserDescriptor {
    /// Stable identifier (`chrome`, `firefox`, ...)
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Platforms the browser ships on
    pub platforms: &'static [Platform],
    /// Cookie storage family
    pub family: CookieFamily,
    /// Lower is preferred within a family
    pub priority: u8,
    /// Executable/application bundle locations
    #[serde(skip)]
    pub install_hints: &'static [PathHint],
    /// User-data (profile root) locations
    #[serde(skip)]
    pub profile_roots: &'static [PathHint],
    /// Keychain service holding the cookie key on macOS (Chromium only)
    #[serde(skip)]
    pub safe_storage: Option<&'static str>,
    /// Secret Service `application` attribute on Linux (Chromium only)
    #[serde(skip)]
    pub secret_application: Option<&'static str>,
    /// Default-browser handler ids (ProgId, bundle id, desktop entry)
    #[serde(skip)]
    pub handler_ids: &'static [(Platform, &'static str)],
}

impl BrowserDescriptor {
    /// Whether the browser exists on the given platform at all
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    /// Profile roots for one platform, resolved against `dirs`
    pub fn profile_roots_for(&self, platform: Platform, dirs: &PlatformDirs) -> Vec<PathBuf> {
        self.profile_roots
            .iter()
            .filter(|hint| hint.platform == platform)
            .filter_map(|hint| dirs.resolve(hint))
            .collect()
    }
}

/// A browser found on this machine during one detection run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedBrowser {
    pub descriptor: &'static BrowserDescriptor,
    /// Paths that proved the installation
    pub evidence: Vec<PathBuf>,
    pub is_default: bool,
}

impl DetectedBrowser {
    pub fn id(&self) -> &'static str {
        self.descriptor.id
    }
}

/// Resolved well-known directories for the current user
#[derive(Debug, Clone, Default)]
pub struct PlatformDirs {
    pub home: Option<PathBuf>,
    pub local_app_data: Option<PathBuf>,
    pub roaming_app_data: Option<PathBuf>,
    pub program_files: Option<PathBuf>,
    pub program_files_x86: Option<PathBuf>,
}

impl PlatformDirs {
    /// Directories of the current user, as reported by the OS
    pub fn from_env() -> Self {
        Self {
            home: dirs::home_dir(),
            local_app_data: dirs::data_local_dir(),
            roaming_app_data: dirs::data_dir(),
            program_files: std::env::var_os("ProgramFiles").map(PathBuf::from),
            program_files_x86: std::env::var_os("ProgramFiles(x86)").map(PathBuf::from),
        }
    }

    /// Directories rooted under a single home (used by tests and sandboxes)
    pub fn rooted_at(home: &Path) -> Self {
        Self {
            home: Some(home.to_path_buf()),
            local_app_data: Some(home.join("AppData").join("Local")),
            roaming_app_data: Some(home.join("AppData").join("Roaming")),
            program_files: Some(home.join("Program Files")),
            program_files_x86: Some(home.join("Program Files (x86)")),
        }
    }

    pub fn resolve(&self, hint: &PathHint) -> Option<PathBuf> {
        let base = match hint.root {
            PathRoot::Home => self.home.as_ref()?,
            PathRoot::LocalAppData => self.local_app_data.as_ref()?,
            PathRoot::RoamingAppData => self.roaming_app_data.as_ref()?,
            PathRoot::ProgramFiles => self.program_files.as_ref()?,
            PathRoot::ProgramFilesX86 => self.program_files_x86.as_ref()?,
            PathRoot::Absolute => return Some(PathBuf::from(hint.relative)),
        };
        Some(base.join(hint.relative))
    }
}
