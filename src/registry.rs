//! The module coordinator.
//!
//! Owns the ordered list of registered modules and drives them through
//! the configuration lifecycle: `setup` on every module, one
//! parse-and-dispatch pass pushing directives into the matching specs,
//! then `start` on every module. Any failure rolls the already-processed
//! modules back in reverse order, so a failed start leaves nothing
//! half-started.

use tracing::{debug, error, info, warn};

use crate::error::ConfigError;
use crate::module::{Module, Phase};
use crate::parser::EntryParser;
use crate::spec::{find_spec, finish_handling, start_handling};

#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
    running: bool,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Add a module to the list and call its `init` hook.
    ///
    /// After registration the module receives lifecycle events and its
    /// share of the parsed configuration. Registration order is
    /// preserved; it decides both dispatch precedence and teardown order.
    pub fn register(&mut self, mut module: Box<dyn Module>) -> Result<(), ConfigError> {
        let name = module.name().to_string();
        if self.running {
            error!(module = %name, "can't register while the framework is running");
            return Err(ConfigError::AlreadyRunning { module: name });
        }

        info!(module = %name, "register module");
        module
            .init()
            .map_err(|e| lifecycle_error(&name, Phase::Init, e))?;
        self.modules.push(module);
        Ok(())
    }

    /// Remove a module from the list and call its `exit` hook.
    ///
    /// Permitted while running (forced unload), but dangerous: peers may
    /// still reference the departing module, so it is only warned about.
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn Module>> {
        if self.running {
            warn!(
                module = %name,
                "module is unregistered while the framework is running; \
                 other modules may still reference it"
            );
        }

        let idx = self.modules.iter().position(|m| m.name() == name)?;
        let mut module = self.modules.remove(idx);
        if let Err(e) = module.exit() {
            warn!(module = %name, error = %e, "exit hook failed");
        }
        Some(module)
    }

    /// Unregister every module, last registered first.
    ///
    /// Stops the framework beforehand if it is still running. Part of the
    /// global shutdown path, so it never fails.
    pub fn shutdown(&mut self) {
        debug!("stopping and unregistering all modules");
        if self.running {
            self.stop_all();
        }
        while let Some(mut module) = self.modules.pop() {
            if let Err(e) = module.exit() {
                warn!(module = %module.name(), error = %e, "exit hook failed");
            }
        }
    }

    /// Start all modules and push the parsed configuration to them.
    ///
    /// The distinct `setup`/`start` passes exist so modules can hook both
    /// before and after the configuration parse. On error the state is
    /// rolled back: started modules are stopped and set-up modules are
    /// cleaned up, in reverse order.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn start_all(&mut self, cfg_text: &str) -> Result<(), ConfigError> {
        debug!("setting up modules");
        for i in 0..self.modules.len() {
            if let Err(e) = self.modules[i].setup() {
                let err = lifecycle_error(self.modules[i].name(), Phase::Setup, e);
                self.rollback_cleanup(i);
                return Err(err);
            }
        }

        debug!("parsing configuration and pushing it to modules");
        if let Err(e) = self.dispatch(cfg_text) {
            self.rollback_cleanup(self.modules.len());
            return Err(e);
        }

        debug!("starting modules");
        for i in 0..self.modules.len() {
            if let Err(e) = self.modules[i].start() {
                let err = lifecycle_error(self.modules[i].name(), Phase::Start, e);
                self.rollback_stop(i);
                self.rollback_cleanup(self.modules.len());
                return Err(err);
            }
        }

        self.running = true;
        info!("modules are started");
        Ok(())
    }

    /// Stop all registered modules, in reverse registration order.
    ///
    /// Done in two passes: `stop` on every module, then `cleanup` on
    /// every module. Modules may reference each other while stopping;
    /// only after every `stop` has returned is it safe to release shared
    /// resources. Hook errors are logged and ignored so a misbehaving
    /// module cannot wedge shutdown.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn stop_all(&mut self) {
        debug!("stopping modules");
        self.rollback_stop(self.modules.len());
        self.rollback_cleanup(self.modules.len());
        self.running = false;
    }

    /// Parse `cfg_text` and fan each entry out to the first matching spec
    /// across all modules, in registration order.
    fn dispatch(&mut self, cfg_text: &str) -> Result<(), ConfigError> {
        for module in self.modules.iter_mut() {
            start_handling(module.specs());
        }

        let mut parser = EntryParser::new(cfg_text);
        if let Err(e) = self.dispatch_entries(&mut parser) {
            error!(
                "configuration parsing error:\n{}\n^^^^^^^^",
                parser.context_snippet()
            );
            return Err(e);
        }

        for module in self.modules.iter_mut() {
            finish_handling(module.specs())?;
        }
        Ok(())
    }

    fn dispatch_entries(&mut self, parser: &mut EntryParser<'_>) -> Result<(), ConfigError> {
        while let Some(entry) = parser.parse_entry()? {
            let mut handled = false;
            for i in 0..self.modules.len() {
                if let Some(spec) = find_spec(self.modules[i].specs(), &entry.name) {
                    spec.handle_entry(&entry, parser)?;
                    handled = true;
                    break;
                }
            }
            if !handled {
                return Err(ConfigError::UnknownDirective {
                    name: entry.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Stop `modules[..end]` in reverse. Errors are logged and ignored.
    fn rollback_stop(&mut self, end: usize) {
        for module in self.modules[..end].iter_mut().rev() {
            debug!(module = %module.name(), "stop");
            if let Err(e) = module.stop() {
                warn!(module = %module.name(), error = %e, "stop hook failed");
            }
        }
    }

    /// Clean up `modules[..end]` in reverse. Errors are logged and
    /// ignored.
    fn rollback_cleanup(&mut self, end: usize) {
        for module in self.modules[..end].iter_mut().rev() {
            debug!(module = %module.name(), "cleanup");
            if let Err(e) = module.cleanup() {
                warn!(module = %module.name(), error = %e, "cleanup hook failed");
            }
        }
    }
}

fn lifecycle_error(module: &str, phase: Phase, source: ConfigError) -> ConfigError {
    error!(module, %phase, error = %source, "module hook failed");
    ConfigError::Lifecycle {
        module: module.to_string(),
        phase,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{set_int, IntBounds};
    use crate::spec::Spec;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type EventLog = Rc<RefCell<Vec<String>>>;

    /// Test module that records every hook invocation in a shared log and
    /// can be told to fail in one phase.
    struct Recorder {
        name: &'static str,
        log: EventLog,
        fail_in: Option<Phase>,
        specs: Vec<Spec>,
    }

    impl Recorder {
        fn new(name: &'static str, log: EventLog) -> Self {
            Self {
                name,
                log,
                fail_in: None,
                specs: Vec::new(),
            }
        }

        fn failing(name: &'static str, log: EventLog, phase: Phase) -> Self {
            Self {
                fail_in: Some(phase),
                ..Self::new(name, log)
            }
        }

        fn with_specs(mut self, specs: Vec<Spec>) -> Self {
            self.specs = specs;
            self
        }

        fn hook(&mut self, phase: Phase) -> Result<(), ConfigError> {
            self.log.borrow_mut().push(format!("{}:{phase}", self.name));
            if self.fail_in == Some(phase) {
                return Err(ConfigError::BadValue {
                    directive: self.name.into(),
                    reason: "injected failure".into(),
                });
            }
            Ok(())
        }
    }

    impl Module for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn specs(&mut self) -> &mut [Spec] {
            &mut self.specs
        }
        fn init(&mut self) -> Result<(), ConfigError> {
            self.hook(Phase::Init)
        }
        fn setup(&mut self) -> Result<(), ConfigError> {
            self.hook(Phase::Setup)
        }
        fn start(&mut self) -> Result<(), ConfigError> {
            self.hook(Phase::Start)
        }
        fn stop(&mut self) -> Result<(), ConfigError> {
            self.hook(Phase::Stop)
        }
        fn cleanup(&mut self) -> Result<(), ConfigError> {
            self.hook(Phase::Cleanup)
        }
        fn exit(&mut self) -> Result<(), ConfigError> {
            self.hook(Phase::Exit)
        }
    }

    fn log() -> EventLog {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn events(log: &EventLog) -> Vec<String> {
        log.borrow().clone()
    }

    #[test]
    fn test_successful_start_order() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.register(Box::new(Recorder::new("b", log.clone()))).unwrap();
        reg.start_all("").unwrap();
        assert!(reg.is_running());
        assert_eq!(
            events(&log),
            vec!["a:init", "b:init", "a:setup", "b:setup", "a:start", "b:start"]
        );
    }

    #[test]
    fn test_stop_all_two_reverse_passes() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.register(Box::new(Recorder::new("b", log.clone()))).unwrap();
        reg.start_all("").unwrap();
        log.borrow_mut().clear();

        reg.stop_all();
        assert!(!reg.is_running());
        assert_eq!(
            events(&log),
            vec!["b:stop", "a:stop", "b:cleanup", "a:cleanup"]
        );
    }

    #[test]
    fn test_setup_failure_rolls_back_predecessors_only() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.register(Box::new(Recorder::failing("b", log.clone(), Phase::Setup)))
            .unwrap();
        reg.register(Box::new(Recorder::new("c", log.clone()))).unwrap();

        let err = reg.start_all("").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Lifecycle {
                phase: Phase::Setup,
                ..
            }
        ));
        assert!(!reg.is_running());
        assert_eq!(
            events(&log),
            vec![
                "a:init", "b:init", "c:init", "a:setup", "b:setup", "a:cleanup"
            ]
        );
    }

    #[test]
    fn test_parse_failure_cleans_up_all() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.register(Box::new(Recorder::new("b", log.clone()))).unwrap();

        let err = reg.start_all("nobody_claims_this 1;").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDirective { .. }));
        assert_eq!(
            events(&log),
            vec![
                "a:init", "b:init", "a:setup", "b:setup", "b:cleanup", "a:cleanup"
            ]
        );
    }

    #[test]
    fn test_start_failure_stops_started_and_cleans_all() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.register(Box::new(Recorder::new("b", log.clone()))).unwrap();
        reg.register(Box::new(Recorder::failing("c", log.clone(), Phase::Start)))
            .unwrap();

        let err = reg.start_all("").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Lifecycle {
                phase: Phase::Start,
                ..
            }
        ));
        assert!(!reg.is_running());
        assert_eq!(
            events(&log),
            vec![
                "a:init", "b:init", "c:init", // registration
                "a:setup", "b:setup", "c:setup", // phase 1
                "a:start", "b:start", "c:start", // phase 3, c fails
                "b:stop", "a:stop", // started modules, reverse
                "c:cleanup", "b:cleanup", "a:cleanup", // all, reverse
            ]
        );
    }

    #[test]
    fn test_rollback_completeness_property() {
        // Every module that saw setup sees exactly one cleanup, every one
        // that saw start sees exactly one stop, and stops precede
        // cleanups.
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.register(Box::new(Recorder::failing("b", log.clone(), Phase::Start)))
            .unwrap();
        let _ = reg.start_all("").unwrap_err();

        let evs = events(&log);
        for m in ["a", "b"] {
            let count = |suffix: &str| {
                evs.iter()
                    .filter(|e| **e == format!("{m}:{suffix}"))
                    .count()
            };
            assert_eq!(count("setup"), 1);
            assert_eq!(count("cleanup"), 1);
            assert!(count("start") >= count("stop"));
        }
        let last_stop = evs.iter().rposition(|e| e.ends_with(":stop"));
        let first_cleanup = evs.iter().position(|e| e.ends_with(":cleanup")).unwrap();
        if let Some(last_stop) = last_stop {
            assert!(last_stop < first_cleanup);
        }
    }

    #[test]
    fn test_dispatch_fills_module_storage() {
        let log = log();
        let port = Rc::new(Cell::new(0));
        let specs = vec![Spec::new("listen", set_int(port.clone(), IntBounds::default()))];
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("net", log).with_specs(specs)))
            .unwrap();
        reg.start_all("listen 8001;").unwrap();
        assert_eq!(port.get(), 8001);
    }

    #[test]
    fn test_first_registered_module_wins_dispatch() {
        let log = log();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("m1", log.clone()).with_specs(vec![
            Spec::new("opt", set_int(first.clone(), IntBounds::default())),
        ])))
        .unwrap();
        reg.register(Box::new(Recorder::new("m2", log).with_specs(vec![
            Spec::new("opt", set_int(second.clone(), IntBounds::default())),
        ])))
        .unwrap();
        reg.start_all("opt 7;").unwrap();
        assert_eq!(first.get(), 7);
        assert_eq!(second.get(), 0);
    }

    #[test]
    fn test_register_while_running_forbidden() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.start_all("").unwrap();

        let err = reg
            .register(Box::new(Recorder::new("late", log)))
            .unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyRunning { .. }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_init_failure_aborts_registration() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        let err = reg
            .register(Box::new(Recorder::failing("bad", log, Phase::Init)))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Lifecycle {
                phase: Phase::Init,
                ..
            }
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_unregister_calls_exit() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        assert!(reg.unregister("a").is_some());
        assert!(reg.unregister("a").is_none());
        assert_eq!(events(&log), vec!["a:init", "a:exit"]);
    }

    #[test]
    fn test_unregister_while_running_is_permitted() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.start_all("").unwrap();
        assert!(reg.unregister("a").is_some());
        assert!(reg.is_running());
        assert!(events(&log).contains(&"a:exit".to_string()));
    }

    #[test]
    fn test_shutdown_unregisters_in_reverse() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log.clone()))).unwrap();
        reg.register(Box::new(Recorder::new("b", log.clone()))).unwrap();
        reg.start_all("").unwrap();

        reg.shutdown();
        assert!(reg.is_empty());
        assert!(!reg.is_running());
        let evs = events(&log);
        let exits: Vec<&String> = evs.iter().filter(|e| e.ends_with(":exit")).collect();
        assert_eq!(exits, ["b:exit", "a:exit"]);
    }

    #[test]
    fn test_restart_resets_call_counters() {
        // A non-repeatable directive must be accepted again on the next
        // start cycle.
        let log = log();
        let port = Rc::new(Cell::new(0));
        let specs = vec![Spec::new("listen", set_int(port.clone(), IntBounds::default()))];
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("net", log).with_specs(specs)))
            .unwrap();

        reg.start_all("listen 8001;").unwrap();
        reg.stop_all();
        reg.start_all("listen 9001;").unwrap();
        assert_eq!(port.get(), 9001);
    }

    #[test]
    fn test_syntax_error_during_dispatch() {
        let log = log();
        let mut reg = ModuleRegistry::new();
        reg.register(Box::new(Recorder::new("a", log))).unwrap();
        let err = reg.start_all("{ stray brace;").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(!reg.is_running());
    }
}
