//! Component lifecycle state machine
//!
//! ```text
//! PRE_INITIALIZED ──initialize──► READY ──start──► STARTING ──► RUNNING
//!                                   ▲  │                           │
//!                         RESETTING─┘  └dispose► DISPOSING ► DISPOSED
//!                             ▲                                    stop
//!                             │                                    ▼
//!                          STOPPED ◄──────────── STOPPING ◄────────┘
//!                             │ resume
//!                             └──► RESUMING ──► RUNNING
//!
//! RUNNING ──degrade──► DEGRADING ──► DEGRADED     (most states) ──fault──► FAULTING ──► FAULTED
//! ```
//!
//! Every transition first enters its `-ING` state, runs the component's hook
//! and settles only when the hook succeeds. A failing hook leaves the
//! component parked in the transitional state and the error is returned.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentState {
    PreInitialized,
    Ready,
    Starting,
    Running,
    Stopping,
    Stopped,
    Resuming,
    Resetting,
    Disposing,
    Disposed,
    Degrading,
    Degraded,
    Faulting,
    Faulted,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentState::PreInitialized => "PRE_INITIALIZED",
            ComponentState::Ready => "READY",
            ComponentState::Starting => "STARTING",
            ComponentState::Running => "RUNNING",
            ComponentState::Stopping => "STOPPING",
            ComponentState::Stopped => "STOPPED",
            ComponentState::Resuming => "RESUMING",
            ComponentState::Resetting => "RESETTING",
            ComponentState::Disposing => "DISPOSING",
            ComponentState::Disposed => "DISPOSED",
            ComponentState::Degrading => "DEGRADING",
            ComponentState::Degraded => "DEGRADED",
            ComponentState::Faulting => "FAULTING",
            ComponentState::Faulted => "FAULTED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentTrigger {
    Initialize,
    Start,
    StartCompleted,
    Stop,
    StopCompleted,
    Resume,
    ResumeCompleted,
    Reset,
    ResetCompleted,
    Dispose,
    DisposeCompleted,
    Degrade,
    DegradeCompleted,
    Fault,
    FaultCompleted,
}

impl ComponentState {
    pub fn transition(&self, trigger: ComponentTrigger) -> Result<Self, ComponentError> {
        use ComponentState as S;
        use ComponentTrigger as T;

        let next = match (self, trigger) {
            (S::PreInitialized, T::Initialize) => S::Ready,
            (S::Ready, T::Reset) => S::Resetting,
            (S::Ready, T::Start) => S::Starting,
            (S::Ready, T::Dispose) => S::Disposing,
            (S::Resetting, T::ResetCompleted) => S::Ready,
            (S::Starting, T::StartCompleted) => S::Running,
            (S::Starting, T::Stop) => S::Stopping,
            (S::Starting, T::Fault) => S::Faulting,
            (S::Running, T::Stop) => S::Stopping,
            (S::Running, T::Degrade) => S::Degrading,
            (S::Running, T::Fault) => S::Faulting,
            (S::Resuming, T::Stop) => S::Stopping,
            (S::Resuming, T::ResumeCompleted) => S::Running,
            (S::Resuming, T::Fault) => S::Faulting,
            (S::Stopping, T::StopCompleted) => S::Stopped,
            (S::Stopping, T::Fault) => S::Faulting,
            (S::Stopped, T::Reset) => S::Resetting,
            (S::Stopped, T::Resume) => S::Resuming,
            (S::Stopped, T::Dispose) => S::Disposing,
            (S::Stopped, T::Fault) => S::Faulting,
            (S::Degrading, T::DegradeCompleted) => S::Degraded,
            (S::Degraded, T::Resume) => S::Resuming,
            (S::Degraded, T::Stop) => S::Stopping,
            (S::Degraded, T::Fault) => S::Faulting,
            (S::Disposing, T::DisposeCompleted) => S::Disposed,
            (S::Faulting, T::FaultCompleted) => S::Faulted,
            (state, trigger) => {
                return Err(ComponentError::InvalidTransition {
                    state: *state,
                    trigger,
                });
            }
        };
        Ok(next)
    }

    /// True for the `-ING` states a component passes through during a transition
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            ComponentState::Starting
                | ComponentState::Stopping
                | ComponentState::Resuming
                | ComponentState::Resetting
                | ComponentState::Disposing
                | ComponentState::Degrading
                | ComponentState::Faulting
        )
    }
}

/// Identity and lifecycle state embedded in every component
#[derive(Debug)]
pub struct ComponentCore {
    id: String,
    state: Cell<ComponentState>,
}

impl ComponentCore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Cell::new(ComponentState::PreInitialized),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ComponentState {
        self.state.get()
    }

    fn set_state(&self, state: ComponentState) {
        self.state.set(state);
    }
}

/// Lifecycle shared by every long-lived subsystem
///
/// Implementors provide [`Component::core`] and override the `on_*` hooks
/// they need; the provided methods drive the state machine.
pub trait Component {
    fn core(&self) -> &ComponentCore;

    fn component_id(&self) -> &str {
        self.core().id()
    }

    fn state(&self) -> ComponentState {
        self.core().state()
    }

    fn is_ready(&self) -> bool {
        self.state() == ComponentState::Ready
    }

    fn is_running(&self) -> bool {
        self.state() == ComponentState::Running
    }

    fn is_stopped(&self) -> bool {
        self.state() == ComponentState::Stopped
    }

    fn is_disposed(&self) -> bool {
        self.state() == ComponentState::Disposed
    }

    fn on_start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_resume(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_reset(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_dispose(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_degrade(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_fault(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// PRE_INITIALIZED → READY (no hook)
    fn initialize(&self) -> Result<(), ComponentError> {
        let core = self.core();
        match core.state().transition(ComponentTrigger::Initialize) {
            Ok(next) => {
                core.set_state(next);
                log::info!("{}: {next}", core.id());
            }
            Err(_) => log::warn!(
                "{}: cannot initialize from state {}",
                core.id(),
                core.state()
            ),
        }
        Ok(())
    }

    fn start(&self) -> Result<(), ComponentError> {
        run_transition(
            self,
            ComponentTrigger::Start,
            ComponentTrigger::StartCompleted,
            |c| c.on_start(),
        )
    }

    fn stop(&self) -> Result<(), ComponentError> {
        run_transition(
            self,
            ComponentTrigger::Stop,
            ComponentTrigger::StopCompleted,
            |c| c.on_stop(),
        )
    }

    fn resume(&self) -> Result<(), ComponentError> {
        run_transition(
            self,
            ComponentTrigger::Resume,
            ComponentTrigger::ResumeCompleted,
            |c| c.on_resume(),
        )
    }

    fn reset(&self) -> Result<(), ComponentError> {
        run_transition(
            self,
            ComponentTrigger::Reset,
            ComponentTrigger::ResetCompleted,
            |c| c.on_reset(),
        )
    }

    fn dispose(&self) -> Result<(), ComponentError> {
        run_transition(
            self,
            ComponentTrigger::Dispose,
            ComponentTrigger::DisposeCompleted,
            |c| c.on_dispose(),
        )
    }

    fn degrade(&self) -> Result<(), ComponentError> {
        run_transition(
            self,
            ComponentTrigger::Degrade,
            ComponentTrigger::DegradeCompleted,
            |c| c.on_degrade(),
        )
    }

    fn fault(&self) -> Result<(), ComponentError> {
        run_transition(
            self,
            ComponentTrigger::Fault,
            ComponentTrigger::FaultCompleted,
            |c| c.on_fault(),
        )
    }
}

fn run_transition<C, F>(
    component: &C,
    trigger: ComponentTrigger,
    completed: ComponentTrigger,
    hook: F,
) -> Result<(), ComponentError>
where
    C: Component + ?Sized,
    F: FnOnce(&C) -> anyhow::Result<()>,
{
    let core = component.core();
    let current = core.state();
    let transitional = match current.transition(trigger) {
        Ok(state) => state,
        Err(_) => {
            log::warn!(
                "{}: ignoring {trigger:?} from state {current}",
                core.id()
            );
            return Ok(());
        }
    };
    core.set_state(transitional);
    log::info!("{}: {transitional}", core.id());

    if let Err(source) = hook(component) {
        log::error!(
            "{}: {trigger:?} hook failed, parked in {transitional}: {source:#}",
            core.id()
        );
        return Err(ComponentError::HookFailed {
            component: core.id().to_string(),
            trigger,
            state: transitional,
            source,
        });
    }

    let settled = transitional.transition(completed)?;
    core.set_state(settled);
    log::info!("{}: {settled}", core.id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Widget {
        core: ComponentCore,
        fail_start: Cell<bool>,
        calls: RefCell<Vec<&'static str>>,
    }

    impl Widget {
        fn new() -> Self {
            Self {
                core: ComponentCore::new("Widget"),
                fail_start: Cell::new(false),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Component for Widget {
        fn core(&self) -> &ComponentCore {
            &self.core
        }

        fn on_start(&self) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("start");
            if self.fail_start.get() {
                anyhow::bail!("cannot connect");
            }
            Ok(())
        }

        fn on_stop(&self) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("stop");
            Ok(())
        }
    }

    #[test]
    fn test_full_lifecycle() {
        let widget = Widget::new();
        assert_eq!(widget.state(), ComponentState::PreInitialized);

        widget.initialize().unwrap();
        widget.start().unwrap();
        assert!(widget.is_running());
        widget.stop().unwrap();
        assert!(widget.is_stopped());
        widget.resume().unwrap();
        assert!(widget.is_running());
        widget.stop().unwrap();
        widget.reset().unwrap();
        assert!(widget.is_ready());
        widget.dispose().unwrap();
        assert!(widget.is_disposed());
        assert_eq!(*widget.calls.borrow(), vec!["start", "stop", "stop"]);
    }

    #[test]
    fn test_failing_hook_parks_in_transitional_state() {
        let widget = Widget::new();
        widget.initialize().unwrap();
        widget.fail_start.set(true);

        let err = widget.start().unwrap_err();
        assert!(matches!(
            err,
            ComponentError::HookFailed {
                state: ComponentState::Starting,
                trigger: ComponentTrigger::Start,
                ..
            }
        ));
        assert_eq!(widget.state(), ComponentState::Starting);
        assert!(widget.state().is_transitional());

        // Still allowed to fault out of STARTING
        widget.fault().unwrap();
        assert_eq!(widget.state(), ComponentState::Faulted);
    }

    #[test]
    fn test_invalid_trigger_is_noop() {
        let widget = Widget::new();
        widget.stop().unwrap();
        assert_eq!(widget.state(), ComponentState::PreInitialized);
        assert!(widget.calls.borrow().is_empty());

        widget.initialize().unwrap();
        widget.initialize().unwrap();
        assert_eq!(widget.state(), ComponentState::Ready);
    }

    #[test]
    fn test_degrade_and_resume() {
        let widget = Widget::new();
        widget.initialize().unwrap();
        widget.start().unwrap();
        widget.degrade().unwrap();
        assert_eq!(widget.state(), ComponentState::Degraded);
        widget.resume().unwrap();
        assert!(widget.is_running());
    }

    #[test]
    fn test_transition_table_rejects_disposed() {
        for trigger in [
            ComponentTrigger::Start,
            ComponentTrigger::Reset,
            ComponentTrigger::Fault,
        ] {
            assert!(ComponentState::Disposed.transition(trigger).is_err());
        }
    }
}
