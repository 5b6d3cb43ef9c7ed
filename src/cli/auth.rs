//! Sign-in for CLI commands: browser cookies or identifier + secret

use std::time::Duration;

use clap::Args;
use tracing::{info, warn};

use crate::{
    AuthFailure, Error, Result,
    browser::{BrowserRegistry, find_descriptor, sort_by_priority},
    config::Settings,
    cookies::{CookieScope, extract_cookies, extract_first_usable},
    session::{Session, SessionManager, ValidatedSession},
};

/// Environment variable holding the account secret for `--email`
pub const PASSWORD_ENV: &str = "ENROLLER_PASSWORD";

const VALIDATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Default, Args)]
pub struct AuthArgs {
    /// Reuse this browser's session (chrome, firefox, edge, safari, brave, opera, opera_gx)
    #[arg(long, value_name = "BROWSER", conflicts_with = "email")]
    pub browser: Option<String>,

    /// Sign in with this account instead; the secret is read from ENROLLER_PASSWORD
    #[arg(long, value_name = "EMAIL")]
    pub email: Option<String>,
}

/// Build, validate and preload a session
pub async fn authenticate(settings: &Settings, args: &AuthArgs) -> Result<ValidatedSession> {
    let manager = SessionManager::new(settings.platform.clone())?;

    let session = match &args.email {
        Some(email) => {
            let secret = std::env::var(PASSWORD_ENV).map_err(|_| {
                Error::auth(
                    AuthFailure::MalformedInput,
                    format!("{} must be set when using --email", PASSWORD_ENV),
                )
            })?;
            manager.from_credentials(email, &secret).await?
        }
        None => from_browser(&manager, settings, args.browser.as_deref())?,
    };

    let validated = validate_with_retry(&manager, &session).await?;
    if let Err(e) = manager.load_enrolled_courses(&validated).await {
        warn!("Could not load enrolled courses: {}", e);
    }
    Ok(validated)
}

fn from_browser(
    manager: &SessionManager,
    settings: &Settings,
    browser: Option<&str>,
) -> Result<std::sync::Arc<Session>> {
    let registry = BrowserRegistry::for_current_platform();
    let scope = CookieScope::from_settings(
        registry.platform(),
        registry.dirs().clone(),
        &settings.platform,
    );

    let (id, jar) = match browser {
        Some(id) => {
            let descriptor = find_descriptor(id).ok_or_else(|| Error::unsupported_browser(id))?;
            (descriptor.id, extract_cookies(descriptor, &scope)?)
        }
        None => {
            let candidates = sort_by_priority(registry.detect_installed());
            info!(
                "Trying browsers in order: {}",
                candidates
                    .iter()
                    .map(|b| b.id())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let (chosen, jar) = extract_first_usable(&candidates, &scope)?;
            (chosen.id(), jar)
        }
    };

    manager.from_cookies(jar, id)
}

/// Transport failures are retried; auth failures are final
async fn validate_with_retry(
    manager: &SessionManager,
    session: &std::sync::Arc<Session>,
) -> Result<ValidatedSession> {
    let mut attempt = 1;
    loop {
        match manager.validate(session).await {
            Err(e) if e.is_retryable() && attempt < VALIDATE_ATTEMPTS => {
                let delay = Duration::from_secs(1 << (attempt - 1));
                warn!("Session check failed ({}), retrying in {:?}", e, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
