use errand_atoms::error::{Error, Result};

/// Collects failures of the steps that follow a committed state write.
/// Every step still runs; the caller gets `Unavailable` if any failed.
#[derive(Debug, Default)]
pub(crate) struct SideEffects {
    failures: Vec<String>,
}

impl SideEffects {
    pub(crate) fn record<T, E: std::fmt::Display>(&mut self, step: &str, result: std::result::Result<T, E>) {
        if let Err(e) = result {
            tracing::error!(step, error = %e, "side effect failed after commit");
            self.failures.push(format!("{step}: {e}"));
        }
    }

    pub(crate) fn fail(&mut self, step: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(step, %message, "side effect failed after commit");
        self.failures.push(format!("{step}: {message}"));
    }

    pub(crate) fn finish(self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(Error::Unavailable(format!(
            "committed, but side effects failed: {}",
            self.failures.join("; ")
        )))
    }
}
