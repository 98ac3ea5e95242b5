//! Declarative schema specifications.
//!
//! A [`Spec`] binds one directive name to a handler together with its
//! cardinality policy and optional default. Modules hand their spec sets
//! to the coordinator; the dispatcher matches parsed entries against them
//! in registration order.
//!
//! A spec set is handled in three steps shared by the top level and the
//! nested-block handler: [`start_handling`] resets the call counters and
//! asserts the spec invariants, each matched entry goes through
//! [`Spec::handle_entry`], and [`finish_handling`] applies defaults and
//! reports required directives that never appeared.

use tracing::debug;

use crate::entry::{is_identifier, Entry};
use crate::error::ConfigError;
use crate::parser::EntryParser;

pub type HandlerResult = Result<(), ConfigError>;

/// The operation a spec invokes when its directive is matched.
///
/// Handlers receive the parsed entry and the active parser. Most handlers
/// ignore the parser; the nested-block handler continues reading from it.
pub type Handler = Box<dyn FnMut(&Entry, &mut EntryParser<'_>) -> HandlerResult>;

pub struct Spec {
    name: String,
    handler: Handler,
    deflt: Option<String>,
    allow_none: bool,
    allow_repeat: bool,
    call_counter: u32,
}

impl Spec {
    pub fn new(name: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            handler,
            deflt: None,
            allow_none: false,
            allow_repeat: false,
            call_counter: 0,
        }
    }

    /// Textual default body, i.e. what would follow the directive name up
    /// to the `;`. Applied when the directive never appears in the input.
    ///
    /// Defaults live in source code, so one that does not parse is a
    /// programming error and panics right here.
    pub fn with_default(mut self, deflt: impl Into<String>) -> Self {
        let deflt = deflt.into();
        let text = default_entry_text(&self.name, &deflt);
        let mut parser = EntryParser::new(&text);
        match parser.parse_entry() {
            // A default must be exactly one fully-terminated directive.
            Ok(Some(_)) if parser.cur().is_none() => {}
            bad => panic!("invalid built-in default for '{}': {:?}", self.name, bad),
        }
        self.deflt = Some(deflt);
        self
    }

    /// Absence of the directive is not an error even without a default.
    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    /// The directive may appear more than once.
    pub fn allow_repeat(mut self) -> Self {
        self.allow_repeat = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call_count(&self) -> u32 {
        self.call_counter
    }

    /// Run the handler for one matched entry, enforcing cardinality.
    pub(crate) fn handle_entry(
        &mut self,
        entry: &Entry,
        parser: &mut EntryParser<'_>,
    ) -> HandlerResult {
        if self.call_counter > 0 && !self.allow_repeat {
            return Err(ConfigError::Duplicate {
                name: entry.name.clone(),
            });
        }
        (self.handler)(entry, parser)?;
        self.call_counter += 1;
        Ok(())
    }

    /// Synthesize `"<name> <deflt>;"` and push it through the normal
    /// parse-and-handle path. The default was validated at construction,
    /// so failure here means the handler rejects its own default.
    fn apply_default(&mut self) -> HandlerResult {
        let deflt = self.deflt.clone().unwrap_or_default();
        let text = default_entry_text(&self.name, &deflt);
        debug!(spec = %self.name, "applying default value");

        let mut parser = EntryParser::new(&text);
        let entry = match parser.parse_entry() {
            Ok(Some(entry)) if parser.cur().is_none() => entry,
            bad => panic!("invalid built-in default for '{}': {:?}", self.name, bad),
        };
        if let Err(e) = self.handle_entry(&entry, &mut parser) {
            panic!("built-in default for '{}' was rejected: {}", self.name, e);
        }
        Ok(())
    }
}

fn default_entry_text(name: &str, deflt: &str) -> String {
    format!("{name} {deflt};")
}

/// Reset call counters and sanity-check every spec before a parse.
pub(crate) fn start_handling(specs: &mut [Spec]) {
    for spec in specs.iter_mut() {
        assert!(
            is_identifier(&spec.name),
            "spec name is not a valid identifier: '{}'",
            spec.name
        );
        spec.call_counter = 0;
    }
}

pub(crate) fn find_spec<'s>(specs: &'s mut [Spec], name: &str) -> Option<&'s mut Spec> {
    specs.iter_mut().find(|s| s.name == name)
}

/// Settle specs that were never matched during the parse: apply the
/// default if there is one, tolerate the absence if `allow_none`, fail
/// otherwise.
pub(crate) fn finish_handling(specs: &mut [Spec]) -> HandlerResult {
    for spec in specs.iter_mut() {
        if spec.call_counter > 0 {
            continue;
        }
        if spec.deflt.is_some() {
            spec.apply_default()?;
        } else if !spec.allow_none {
            return Err(ConfigError::MissingRequired {
                name: spec.name.clone(),
            });
        }
    }
    Ok(())
}
