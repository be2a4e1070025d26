use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use comboflow_core::{
    EngineConfig, FocusTracker, InputEvent, MatchEngine, PolicyGate, SnapshotHandle,
    SubstitutionExecutor, TriggerFired,
};
use crossbeam_channel::{select, unbounded, Sender};
use tracing::{debug, warn};

enum Control {
    ManualTrigger,
    Shutdown,
}

enum Work {
    Substitute(TriggerFired),
    Shutdown,
}

/// Wires the event queue, match engine and substitution executor into
/// the two concurrency domains the engine needs: a consumer thread that
/// keeps draining keystrokes, and a worker thread where substitutions
/// may suspend on scripts or prompts without stalling the consumer.
pub struct Runtime;

impl Runtime {
    pub fn start(
        snapshots: SnapshotHandle,
        gate: Arc<PolicyGate>,
        config: EngineConfig,
        executor: SubstitutionExecutor,
        focus: Arc<dyn FocusTracker>,
    ) -> RuntimeHandle {
        let (input_tx, input_rx) = unbounded::<InputEvent>();
        let (control_tx, control_rx) = unbounded::<Control>();
        let (work_tx, work_rx) = unbounded::<Work>();

        let engine = Arc::new(Mutex::new(MatchEngine::new(
            config,
            snapshots,
            Arc::clone(&gate),
        )));

        let consumer = {
            let engine = Arc::clone(&engine);
            let focus = Arc::clone(&focus);
            let work_tx = work_tx.clone();
            thread::spawn(move || loop {
                select! {
                    recv(control_rx) -> msg => match msg {
                        Ok(Control::ManualTrigger) => {
                            let app = focus.active_app();
                            let fired = lock(&engine).trigger_manual(app.as_deref());
                            if let Some(trigger) = fired {
                                let _ = work_tx.send(Work::Substitute(trigger));
                            }
                        }
                        Ok(Control::Shutdown) | Err(_) => {
                            let _ = work_tx.send(Work::Shutdown);
                            break;
                        }
                    },
                    recv(input_rx) -> msg => match msg {
                        Ok(event) => {
                            let app = focus.active_app();
                            let fired = lock(&engine).handle_event(event, app.as_deref());
                            if let Some(trigger) = fired {
                                let _ = work_tx.send(Work::Substitute(trigger));
                            }
                        }
                        Err(_) => {
                            let _ = work_tx.send(Work::Shutdown);
                            break;
                        }
                    },
                }
            })
        };

        let worker = {
            let engine = Arc::clone(&engine);
            let mut executor = executor;
            thread::spawn(move || {
                while let Ok(work) = work_rx.recv() {
                    match work {
                        Work::Substitute(trigger) => {
                            match executor.execute(&trigger) {
                                Ok(()) => debug!(keyword = %trigger.typed_keyword, "expanded"),
                                Err(err) => {
                                    warn!(keyword = %trigger.typed_keyword, %err, "substitution aborted");
                                }
                            }
                            lock(&engine).substitution_complete();
                        }
                        Work::Shutdown => break,
                    }
                }
            })
        };

        RuntimeHandle {
            input_tx,
            control_tx,
            gate,
            consumer: Some(consumer),
            worker: Some(worker),
        }
    }
}

/// Live handle to a started runtime.
pub struct RuntimeHandle {
    input_tx: Sender<InputEvent>,
    control_tx: Sender<Control>,
    gate: Arc<PolicyGate>,
    consumer: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl RuntimeHandle {
    /// Queue endpoint for event sources (the rdev listener, or a test
    /// harness feeding synthetic keystrokes).
    pub fn events(&self) -> Sender<InputEvent> {
        self.input_tx.clone()
    }

    pub fn pause(&self) {
        self.gate.pause();
    }

    pub fn resume(&self) {
        self.gate.resume();
    }

    /// Fire the combo-picker shortcut against the current buffer.
    pub fn trigger_manual(&self) {
        let _ = self.control_tx.send(Control::ManualTrigger);
    }

    /// Stop both engine threads. The keystroke listener thread, if one
    /// was started, stays detached (the OS hook cannot be unhooked) but
    /// its events go nowhere once the queue closes.
    pub fn shutdown(mut self) {
        let _ = self.control_tx.send(Control::Shutdown);
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.join();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn lock<T>(mutex: &Arc<Mutex<T>>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use comboflow_core::{
        Catalog, Combo, InjectionError, InputInjector, PolicyConfig, UnknownFocus,
        VariableProviders,
    };
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Backspaces(usize),
        Keystrokes(String),
    }

    struct RecordingInjector(Arc<Mutex<Vec<Call>>>);

    impl InputInjector for RecordingInjector {
        fn simulate_keystrokes(
            &mut self,
            text: &str,
            _delay: Duration,
        ) -> Result<(), InjectionError> {
            self.0.lock().unwrap().push(Call::Keystrokes(text.to_string()));
            Ok(())
        }

        fn simulate_backspaces(&mut self, count: usize) -> Result<(), InjectionError> {
            self.0.lock().unwrap().push(Call::Backspaces(count));
            Ok(())
        }

        fn simulate_left_arrows(&mut self, _count: usize) -> Result<(), InjectionError> {
            Ok(())
        }

        fn paste_via_clipboard(&mut self, _text: &str) -> Result<(), InjectionError> {
            Ok(())
        }
    }

    fn wait_for(calls: &Arc<Mutex<Vec<Call>>>, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.lock().unwrap().len() < count {
            assert!(Instant::now() < deadline, "timed out waiting for injection");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn start_with_combo() -> (Catalog, RuntimeHandle, Arc<Mutex<Vec<Call>>>) {
        let mut catalog = Catalog::new();
        let group = catalog.default_group().id;
        catalog
            .add_combo(Combo::new("", "btw", "by the way", group))
            .unwrap();

        let gate = Arc::new(PolicyGate::new(PolicyConfig::default(), catalog.handle()));
        let calls: Arc<Mutex<Vec<Call>>> = Arc::default();
        let executor = SubstitutionExecutor::new(
            Box::new(RecordingInjector(Arc::clone(&calls))),
            VariableProviders::system(),
            Arc::clone(&gate),
        );
        let handle = Runtime::start(
            catalog.handle(),
            gate,
            EngineConfig::default(),
            executor,
            Arc::new(UnknownFocus),
        );
        (catalog, handle, calls)
    }

    #[test]
    fn typed_keyword_is_expanded_end_to_end() {
        let (_catalog, handle, calls) = start_with_combo();
        let events = handle.events();
        for c in "btw".chars() {
            events.send(InputEvent::Char(c)).unwrap();
        }
        wait_for(&calls, 2);
        {
            let calls = calls.lock().unwrap();
            assert_eq!(calls[0], Call::Backspaces(3));
            assert_eq!(calls[1], Call::Keystrokes("by the way".to_string()));
        }

        // Give the worker a moment to finish the transaction and reset
        // the engine; the buffer is then empty and the same keyword
        // fires again immediately.
        thread::sleep(Duration::from_millis(200));
        for c in "btw".chars() {
            events.send(InputEvent::Char(c)).unwrap();
        }
        wait_for(&calls, 4);
        handle.shutdown();
    }

    #[test]
    fn paused_runtime_expands_nothing() {
        let (_catalog, handle, calls) = start_with_combo();
        handle.pause();
        let events = handle.events();
        for c in "btw ".chars() {
            events.send(InputEvent::Char(c)).unwrap();
        }
        thread::sleep(Duration::from_millis(100));
        assert!(calls.lock().unwrap().is_empty());
        handle.shutdown();
    }

    #[test]
    fn manual_trigger_fires_the_picker() {
        let mut catalog = Catalog::new();
        let group = catalog.default_group().id;
        catalog
            .add_combo(Combo::new("", "sig", "Kind regards", group))
            .unwrap();
        let gate = Arc::new(PolicyGate::new(PolicyConfig::default(), catalog.handle()));
        let manual_calls: Arc<Mutex<Vec<Call>>> = Arc::default();
        let executor = SubstitutionExecutor::new(
            Box::new(RecordingInjector(Arc::clone(&manual_calls))),
            VariableProviders::system(),
            Arc::clone(&gate),
        );
        let handle = Runtime::start(
            catalog.handle(),
            gate,
            EngineConfig {
                trigger_policy: comboflow_core::TriggerPolicy::Manual,
                ..EngineConfig::default()
            },
            executor,
            Arc::new(UnknownFocus),
        );

        let events = handle.events();
        for c in "sig".chars() {
            events.send(InputEvent::Char(c)).unwrap();
        }
        // Let the consumer drain the queue before invoking the picker;
        // the two channels are not ordered relative to each other.
        thread::sleep(Duration::from_millis(300));
        assert!(manual_calls.lock().unwrap().is_empty());

        handle.trigger_manual();
        wait_for(&manual_calls, 2);
        assert_eq!(
            manual_calls.lock().unwrap()[1],
            Call::Keystrokes("Kind regards".to_string())
        );
        handle.shutdown();
    }
}
