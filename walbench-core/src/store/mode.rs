//! Journal mode and pragma control

use super::StoreHandle;
use crate::engine::{Engine, Session};
use crate::{DurabilityMode, Pragma, Result};
use tracing::{debug, info, warn};

impl<E: Engine> StoreHandle<E> {
    /// Current journal mode as reported by the engine
    pub fn get_mode(&mut self) -> Result<DurabilityMode> {
        let reported = self.session()?.query_pragma("journal_mode")?;
        Ok(DurabilityMode::from_engine(reported.as_deref()))
    }

    /// Switch the journal mode, skipping the write when it is already in effect
    pub fn set_mode(&mut self, mode: DurabilityMode) -> Result<()> {
        if self.get_mode()? == mode {
            debug!("{} already in {} mode", self.name(), mode);
            return Ok(());
        }

        let reported = self.session()?.set_journal_mode(mode)?;
        if DurabilityMode::from_engine(reported.as_deref()) != mode {
            // e.g. in-memory databases answer "memory" to a WAL request
            warn!(
                "{} reported journal mode {:?} after requesting {}",
                self.name(),
                reported,
                mode
            );
        } else {
            info!("Switched {} to {} mode", self.name(), mode);
        }
        Ok(())
    }

    /// Switch to the mode called `name`; unknown names change nothing
    pub fn set_mode_named(&mut self, name: &str) -> Result<Option<DurabilityMode>> {
        match DurabilityMode::parse(name) {
            Some(mode) => {
                self.set_mode(mode)?;
                Ok(Some(mode))
            }
            None => {
                warn!("Ignoring unknown journal mode {:?}", name);
                Ok(None)
            }
        }
    }

    /// Apply `pragmas` to the primary session in the given order
    ///
    /// Order matters: a `busy_timeout` placed before `journal_mode` lets the
    /// mode switch wait out other connections instead of failing. Applied
    /// pragmas are also replayed on the writer sessions of later runs.
    pub fn apply_pragmas(&mut self, pragmas: &[Pragma]) -> Result<()> {
        for pragma in pragmas {
            self.session()?.set_pragma(pragma)?;
            self.applied.push(pragma.clone());
            debug!("Applied pragma {}", pragma);
        }
        Ok(())
    }
}
