//! Module contract.
//!
//! A module is an independent subsystem that owns a schema set and reacts
//! to lifecycle transitions. All hooks are optional; the default
//! implementations do nothing and succeed.

use strum_macros::{AsRefStr, Display};

use crate::error::ConfigError;
use crate::spec::Spec;

/// Lifecycle phase a hook belongs to, used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Init,
    Setup,
    Start,
    Stop,
    Cleanup,
    Exit,
}

/// An independent subsystem driven by the [`ModuleRegistry`].
///
/// The coordinator guarantees: within one start, `setup` precedes the
/// configuration push which precedes `start`, each phase walking modules
/// in registration order; teardown walks them in reverse. A module that
/// completed `setup` always sees `cleanup`, and one that completed `start`
/// sees `stop` before that.
///
/// [`ModuleRegistry`]: crate::registry::ModuleRegistry
pub trait Module {
    fn name(&self) -> &str;

    /// The schema set this module claims. Parsed directives whose name
    /// matches one of these specs are pushed into the module during the
    /// parse phase.
    fn specs(&mut self) -> &mut [Spec] {
        &mut []
    }

    /// Called once at registration.
    fn init(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Called at the beginning of every start, before the configuration
    /// is parsed.
    fn setup(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Called after the whole configuration was parsed and pushed.
    fn start(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// First teardown pass. Peers may still reference each other here.
    fn stop(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Second teardown pass, after every module has stopped. Safe to
    /// release shared resources.
    fn cleanup(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Called once at unregistration.
    fn exit(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }
}
