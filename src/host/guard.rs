//! Scoped ownership of a [`HostSession`].
//!
//! A launched host is a real OS process. [`HostGuard`] makes "quit exactly
//! once" hold on every path out of a conversion: an explicit
//! [`HostGuard::release`] on the normal path, `Drop` on early returns and
//! panics. A failing quit is logged, never returned, so it cannot replace
//! the conversion's own result.

use super::{AutomationHost, HostSession};
use crate::error::{CleanupError, Sheet2PdfError};
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

pub struct HostGuard {
    host_name: String,
    session: Option<Box<dyn HostSession>>,
}

impl HostGuard {
    /// Launch a new session of `host`.
    pub fn launch(host: &dyn AutomationHost) -> Result<Self, Sheet2PdfError> {
        let session = host.launch()?;
        debug!("{} session launched", host.name());
        Ok(Self {
            host_name: host.name().to_string(),
            session: Some(session),
        })
    }

    /// Quit the session now. Returns the cleanup problem, if any, after
    /// logging it.
    pub fn release(mut self) -> Option<CleanupError> {
        self.quit_session()
    }

    fn quit_session(&mut self) -> Option<CleanupError> {
        let mut session = self.session.take()?;
        match session.quit() {
            Ok(()) => {
                debug!("{} session released", self.host_name);
                None
            }
            Err(e) => {
                let err = CleanupError::QuitHost {
                    host: self.host_name.clone(),
                    detail: e.to_string(),
                };
                warn!("{}", err);
                Some(err)
            }
        }
    }
}

impl Deref for HostGuard {
    type Target = dyn HostSession;

    fn deref(&self) -> &Self::Target {
        match self.session.as_deref() {
            Some(s) => s,
            None => unreachable!("host session used after release"),
        }
    }
}

impl DerefMut for HostGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.session.as_deref_mut() {
            Some(s) => s,
            None => unreachable!("host session used after release"),
        }
    }
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        if self.session.is_some() {
            debug!("{} session dropped without release; quitting", self.host_name);
            let _ = self.quit_session();
        }
    }
}
