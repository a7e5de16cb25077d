//! Replays a validated flow as a sequence of input gestures.
//!
//! Traversal starts at the Start node and runs a node once every node
//! with an edge into it has completed. Nodes not connected to any edge
//! are skipped. A node failure is reported and the flow continues —
//! stopping is the caller's call, via [`ExecutorCommand::Stop`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration as StdDuration;

use rand::Rng;
use tapflow_schema::{DelayConfig, DurationRange, Flow, Node, NodeConfig};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::InputBackend;
use crate::error::EngineError;
use crate::events::{ExecutorCommand, ExecutorEvent, ExecutorState};

/// Pause between scroll gestures when a click node scrolls in several
/// directions.
const SCROLL_GESTURE_PAUSE: StdDuration = StdDuration::from_millis(100);

/// How a run ended. Failed nodes do not change the outcome; they are
/// reported through [`ExecutorEvent::NodeFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
    TimedOut,
}

pub struct FlowExecutor<B: InputBackend> {
    flow: Flow,
    backend: B,
    event_tx: Sender<ExecutorEvent>,
    deadline: StdDuration,
}

impl<B: InputBackend> FlowExecutor<B> {
    pub fn new(flow: Flow, backend: B, event_tx: Sender<ExecutorEvent>) -> Self {
        Self {
            flow,
            backend,
            event_tx,
            deadline: StdDuration::from_secs(600),
        }
    }

    /// Replace the default 10-minute overall deadline.
    pub fn with_deadline(mut self, deadline: StdDuration) -> Self {
        self.deadline = deadline;
        self
    }

    fn emit(&self, event: ExecutorEvent) {
        let _ = self.event_tx.try_send(event);
    }

    fn log(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{}", msg);
        self.emit(ExecutorEvent::Log(msg));
    }

    /// Run the flow to one of the three outcomes. Fails up front if the
    /// flow is empty or has no Start node.
    pub async fn run(
        self,
        mut command_rx: Receiver<ExecutorCommand>,
    ) -> Result<RunOutcome, EngineError> {
        if self.flow.nodes.is_empty() {
            return Err(EngineError::NoNodes);
        }
        let start = self.flow.start_node().ok_or(EngineError::NoStartNode)?.id;

        self.emit(ExecutorEvent::StateChanged(ExecutorState::Running));
        let name = self.flow.metadata.name.as_deref().unwrap_or("(unnamed)");
        self.log(format!("starting flow {name}"));

        let deadline = self.deadline;
        let outcome = tokio::select! {
            outcome = self.traverse(start, &mut command_rx) => outcome,
            _ = sleep(deadline) => {
                warn!("flow execution timed out after {:?}", deadline);
                self.emit(ExecutorEvent::FlowTimedOut);
                RunOutcome::TimedOut
            }
        };
        self.emit(ExecutorEvent::StateChanged(ExecutorState::Idle));
        Ok(outcome)
    }

    async fn traverse(
        &self,
        start: Uuid,
        command_rx: &mut Receiver<ExecutorCommand>,
    ) -> RunOutcome {
        // Only nodes touched by an edge take part; stray nodes on the
        // canvas are ignored. The Start node always takes part so a
        // single-node flow still runs.
        let mut connected: HashSet<Uuid> = self
            .flow
            .edges
            .iter()
            .flat_map(|e| [e.source, e.target])
            .collect();
        connected.insert(start);

        let mut dependencies: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        let mut dependents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for edge in &self.flow.edges {
            dependencies.entry(edge.target).or_default().insert(edge.source);
            dependents.entry(edge.source).or_default().push(edge.target);
        }

        let mut completed: HashSet<Uuid> = HashSet::new();
        let mut queued: HashSet<Uuid> = HashSet::from([start]);
        let mut queue: VecDeque<Uuid> = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            if let Ok(ExecutorCommand::Stop) = command_rx.try_recv() {
                self.log("execution stopped");
                self.emit(ExecutorEvent::FlowStopped);
                return RunOutcome::Stopped;
            }

            // Validation guarantees edges reference known ids.
            let Some(node) = self.flow.node(id) else {
                continue;
            };

            self.emit(ExecutorEvent::NodeStarted(id));
            self.log(format!(
                "running {} ({})",
                node.metadata.label,
                node.kind().display_name()
            ));

            tokio::select! {
                result = self.execute_node(node) => match result {
                    Ok(()) => self.emit(ExecutorEvent::NodeCompleted(id)),
                    Err(e) => {
                        error!("node {} failed: {}", node.metadata.label, e);
                        self.emit(ExecutorEvent::NodeFailed(id, e));
                    }
                },
                _ = wait_for_stop(command_rx) => {
                    self.log(format!("execution stopped during {}", node.metadata.label));
                    self.emit(ExecutorEvent::FlowStopped);
                    return RunOutcome::Stopped;
                }
            }

            completed.insert(id);
            for &next in dependents.get(&id).map(Vec::as_slice).unwrap_or_default() {
                if queued.contains(&next) || !connected.contains(&next) {
                    continue;
                }
                let ready = dependencies
                    .get(&next)
                    .is_none_or(|deps| deps.iter().all(|d| completed.contains(d)));
                if ready {
                    queued.insert(next);
                    queue.push_back(next);
                }
            }
        }

        if completed.len() < connected.len() {
            warn!(
                "{} connected node(s) were unreachable from the Start node",
                connected.len() - completed.len()
            );
        }

        self.log("flow execution completed");
        self.emit(ExecutorEvent::FlowCompleted);
        RunOutcome::Completed
    }

    async fn execute_node(&self, node: &Node) -> Result<(), String> {
        match &node.config {
            NodeConfig::Start => {
                self.log("flow started");
                Ok(())
            }

            NodeConfig::MouseClick(c) => {
                for i in 0..c.click_count {
                    if c.release_after_press {
                        self.backend
                            .mouse_down(c.button)
                            .await
                            .map_err(|e| format!("mouse down failed: {e}"))?;
                        sleep(c.press_release_delay.to_std()).await;
                        self.backend
                            .mouse_up(c.button)
                            .await
                            .map_err(|e| format!("mouse up failed: {e}"))?;
                    } else {
                        self.backend
                            .click(c.button)
                            .await
                            .map_err(|e| format!("click failed: {e}"))?;
                    }
                    if i + 1 < c.click_count {
                        sleep(c.click_delay.to_std()).await;
                    }
                }

                if let Some(scroll) = &c.scroll {
                    for &direction in scroll.directions() {
                        self.backend
                            .scroll(direction, scroll.lines())
                            .await
                            .map_err(|e| format!("scroll failed: {e}"))?;
                        sleep(SCROLL_GESTURE_PAUSE).await;
                    }
                }
                Ok(())
            }

            NodeConfig::MouseMove(c) => self
                .backend
                .move_mouse(c.target, c.duration.to_std(), c.smooth)
                .await
                .map_err(|e| format!("mouse move failed: {e}")),

            NodeConfig::KeyPress(c) => {
                let last = c.keys.len().saturating_sub(1);
                for (i, combo) in c.keys.iter().enumerate() {
                    self.backend
                        .key_tap(combo)
                        .await
                        .map_err(|e| format!("key tap {:?} failed: {e}", combo.key()))?;
                    if c.sequential && i < last {
                        sleep(c.interval.to_std()).await;
                    }
                }
                Ok(())
            }

            NodeConfig::Delay(c) => {
                let millis = match c {
                    DelayConfig::Fixed(duration) => duration.to_milliseconds(),
                    DelayConfig::Random(range) => sample_range_ms(range),
                };
                self.log(format!("delaying for {millis:.0} ms"));
                sleep(StdDuration::from_secs_f64(millis / 1_000.0)).await;
                Ok(())
            }

            NodeConfig::TypeString(c) => {
                if c.clear_before {
                    self.backend
                        .clear_text()
                        .await
                        .map_err(|e| format!("clear failed: {e}"))?;
                }
                self.backend
                    .type_text(&c.text, c.typing_speed.to_std())
                    .await
                    .map_err(|e| format!("typing failed: {e}"))?;
                if c.press_enter {
                    self.backend
                        .press_enter()
                        .await
                        .map_err(|e| format!("press enter failed: {e}"))?;
                }
                Ok(())
            }
        }
    }
}

/// Resolves only when a Stop command arrives; pends forever if the
/// command channel closes, so a dropped sender never cancels a node.
async fn wait_for_stop(rx: &mut Receiver<ExecutorCommand>) {
    loop {
        match rx.recv().await {
            Some(ExecutorCommand::Stop) => return,
            None => std::future::pending::<()>().await,
        }
    }
}

/// Uniform sample of a delay, in milliseconds.
fn sample_range_ms(range: &DurationRange) -> f64 {
    let min = range.min().to_milliseconds();
    let max = range.max().to_milliseconds();
    if min >= max {
        return min;
    }
    rand::rng().random_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tapflow_schema::{
        Coordinate, Duration, KeyCombination, KeyPressConfig, MouseButton, MouseClickConfig,
        MouseMoveConfig, MoveTarget, Position, ScrollConfig, ScrollDirection, TimeUnit,
        TypeStringConfig,
    };
    use tokio::sync::mpsc;

    /// Records every gesture; optionally fails each click.
    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<String>>,
        fail_clicks: bool,
    }

    impl RecordingBackend {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InputBackend for &RecordingBackend {
        async fn mouse_down(&self, button: MouseButton) -> Result<()> {
            self.record(format!("mouse_down({button:?})"));
            Ok(())
        }

        async fn mouse_up(&self, button: MouseButton) -> Result<()> {
            self.record(format!("mouse_up({button:?})"));
            Ok(())
        }

        async fn click(&self, button: MouseButton) -> Result<()> {
            if self.fail_clicks {
                return Err(anyhow!("no pointer device"));
            }
            self.record(format!("click({button:?})"));
            Ok(())
        }

        async fn move_mouse(
            &self,
            target: MoveTarget,
            _duration: StdDuration,
            _smooth: bool,
        ) -> Result<()> {
            self.record(format!("move_mouse({target:?})"));
            Ok(())
        }

        async fn scroll(&self, direction: ScrollDirection, lines: u32) -> Result<()> {
            self.record(format!("scroll({direction:?}, {lines})"));
            Ok(())
        }

        async fn key_tap(&self, combo: &KeyCombination) -> Result<()> {
            self.record(format!("key_tap({})", combo.key()));
            Ok(())
        }

        async fn type_text(&self, text: &str, _per_key: StdDuration) -> Result<()> {
            self.record(format!("type_text({text})"));
            Ok(())
        }

        async fn clear_text(&self) -> Result<()> {
            self.record("clear_text");
            Ok(())
        }

        async fn press_enter(&self) -> Result<()> {
            self.record("press_enter");
            Ok(())
        }
    }

    fn click_config(count: u32, release_after_press: bool) -> NodeConfig {
        NodeConfig::MouseClick(MouseClickConfig {
            button: MouseButton::Left,
            click_count: count,
            click_delay: Duration::millis(10),
            press_release_delay: Duration::millis(5),
            release_after_press,
            scroll: None,
        })
    }

    fn type_config(text: &str) -> NodeConfig {
        NodeConfig::TypeString(TypeStringConfig {
            text: text.to_string(),
            typing_speed: Duration::millis(10),
            clear_before: true,
            press_enter: true,
        })
    }

    fn channels() -> (
        Sender<ExecutorEvent>,
        Receiver<ExecutorEvent>,
        Sender<ExecutorCommand>,
        Receiver<ExecutorCommand>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(128);
        let (command_tx, command_rx) = mpsc::channel(8);
        (event_tx, event_rx, command_tx, command_rx)
    }

    fn drain(rx: &mut Receiver<ExecutorEvent>) -> Vec<ExecutorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn runs_nodes_in_edge_order() {
        let backend = RecordingBackend::default();
        let mut flow = Flow::new("ordered");
        let start = flow.add_node(NodeConfig::Start, Position::default());
        let click = flow.add_node(click_config(2, true), Position::default());
        let typing = flow.add_node(type_config("hello"), Position::default());
        flow.add_edge(start, click);
        flow.add_edge(click, typing);

        let (event_tx, mut event_rx, _command_tx, command_rx) = channels();
        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(
            backend.calls(),
            [
                "mouse_down(Left)",
                "mouse_up(Left)",
                "mouse_down(Left)",
                "mouse_up(Left)",
                "clear_text",
                "type_text(hello)",
                "press_enter",
            ]
        );

        let events = drain(&mut event_rx);
        let started: Vec<Uuid> = events
            .iter()
            .filter_map(|e| match e {
                ExecutorEvent::NodeStarted(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(started, [start, click, typing]);
        assert!(events.contains(&ExecutorEvent::FlowCompleted));
        assert_eq!(
            events.last(),
            Some(&ExecutorEvent::StateChanged(ExecutorState::Idle))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn join_node_runs_once_after_both_sources() {
        let backend = RecordingBackend::default();
        let mut flow = Flow::new("diamond");
        let start = flow.add_node(NodeConfig::Start, Position::default());
        let left = flow.add_node(type_config("left"), Position::default());
        let right = flow.add_node(type_config("right"), Position::default());
        let join = flow.add_node(type_config("join"), Position::default());
        flow.add_edge(start, left);
        flow.add_edge(start, right);
        flow.add_edge(left, join);
        flow.add_edge(right, join);

        let (event_tx, mut event_rx, _command_tx, command_rx) = channels();
        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        let started: Vec<Uuid> = drain(&mut event_rx)
            .iter()
            .filter_map(|e| match e {
                ExecutorEvent::NodeStarted(id) => Some(*id),
                _ => None,
            })
            .collect();
        // Each node runs exactly once; the join waits for both branches.
        assert_eq!(started.len(), 4);
        assert_eq!(started[0], start);
        assert_eq!(started[3], join);
        let typed: Vec<String> = backend
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("type_text"))
            .collect();
        assert_eq!(typed.len(), 3);
        assert_eq!(typed[2], "type_text(join)");
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_key_presses_tap_in_order() {
        let backend = RecordingBackend::default();
        let mut flow = Flow::new("shortcut");
        let start = flow.add_node(NodeConfig::Start, Position::default());
        let press = flow.add_node(
            NodeConfig::KeyPress(KeyPressConfig {
                keys: vec![
                    KeyCombination::new("tab", vec![]).unwrap(),
                    KeyCombination::new("a", vec![]).unwrap(),
                    KeyCombination::new("enter", vec![]).unwrap(),
                ],
                sequential: true,
                interval: Duration::millis(25),
            }),
            Position::default(),
        );
        flow.add_edge(start, press);

        let (event_tx, _event_rx, _command_tx, command_rx) = channels();
        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(
            backend.calls(),
            ["key_tap(tab)", "key_tap(a)", "key_tap(enter)"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn mouse_move_passes_target_to_backend() {
        let backend = RecordingBackend::default();
        let mut flow = Flow::new("move");
        let start = flow.add_node(NodeConfig::Start, Position::default());
        let hop = flow.add_node(
            NodeConfig::MouseMove(MouseMoveConfig {
                target: MoveTarget::Absolute(Coordinate { x: 100.0, y: 50.0 }),
                duration: Duration::millis(500),
                smooth: true,
            }),
            Position::default(),
        );
        flow.add_edge(start, hop);

        let (event_tx, _event_rx, _command_tx, command_rx) = channels();
        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(
            backend.calls(),
            ["move_mouse(Absolute(Coordinate { x: 100.0, y: 50.0 }))"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn click_scrolls_each_direction_after_clicking() {
        let backend = RecordingBackend::default();
        let mut flow = Flow::new("scroll");
        let start = flow.add_node(NodeConfig::Start, Position::default());
        let click = flow.add_node(
            NodeConfig::MouseClick(MouseClickConfig {
                button: MouseButton::Left,
                click_count: 1,
                click_delay: Duration::millis(10),
                press_release_delay: Duration::millis(5),
                release_after_press: false,
                scroll: Some(
                    ScrollConfig::new(
                        vec![ScrollDirection::Down, ScrollDirection::Right],
                        3,
                    )
                    .unwrap(),
                ),
            }),
            Position::default(),
        );
        flow.add_edge(start, click);

        let (event_tx, _event_rx, _command_tx, command_rx) = channels();
        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(
            backend.calls(),
            ["click(Left)", "scroll(Down, 3)", "scroll(Right, 3)"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn node_failure_is_reported_and_flow_continues() {
        let backend = RecordingBackend {
            fail_clicks: true,
            ..Default::default()
        };
        let mut flow = Flow::new("failing");
        let start = flow.add_node(NodeConfig::Start, Position::default());
        let click = flow.add_node(click_config(1, false), Position::default());
        let typing = flow.add_node(type_config("after"), Position::default());
        flow.add_edge(start, click);
        flow.add_edge(click, typing);

        let (event_tx, mut event_rx, _command_tx, command_rx) = channels();
        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        // The typing node still ran after the click failed.
        assert!(backend.calls().contains(&"type_text(after)".to_string()));

        let events = drain(&mut event_rx);
        assert!(events.iter().any(|e| matches!(
            e,
            ExecutorEvent::NodeFailed(id, msg) if *id == click && msg.contains("no pointer device")
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_command_halts_before_the_next_node() {
        let backend = RecordingBackend::default();
        let mut flow = Flow::new("stopped");
        flow.add_node(NodeConfig::Start, Position::default());

        let (event_tx, mut event_rx, command_tx, command_rx) = channels();
        command_tx.send(ExecutorCommand::Stop).await.unwrap();

        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Stopped);
        assert!(backend.calls().is_empty());
        assert!(drain(&mut event_rx).contains(&ExecutorEvent::FlowStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_times_the_flow_out() {
        let backend = RecordingBackend::default();
        let mut flow = Flow::new("slow");
        let start = flow.add_node(NodeConfig::Start, Position::default());
        let wait = flow.add_node(
            NodeConfig::Delay(DelayConfig::Fixed(
                Duration::new(10.0, TimeUnit::Seconds).unwrap(),
            )),
            Position::default(),
        );
        flow.add_edge(start, wait);

        let (event_tx, mut event_rx, _command_tx, command_rx) = channels();
        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .with_deadline(StdDuration::from_millis(50))
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::TimedOut);
        assert!(drain(&mut event_rx).contains(&ExecutorEvent::FlowTimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn unconnected_nodes_are_skipped() {
        let backend = RecordingBackend::default();
        let mut flow = Flow::new("stray");
        let start = flow.add_node(NodeConfig::Start, Position::default());
        let click = flow.add_node(click_config(1, false), Position::default());
        let stray = flow.add_node(type_config("never"), Position::default());
        flow.add_edge(start, click);

        let (event_tx, mut event_rx, _command_tx, command_rx) = channels();
        let outcome = FlowExecutor::new(flow, &backend, event_tx)
            .run(command_rx)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert!(!backend.calls().contains(&"type_text(never)".to_string()));
        assert!(
            !drain(&mut event_rx)
                .iter()
                .any(|e| matches!(e, ExecutorEvent::NodeStarted(id) if *id == stray))
        );
    }

    #[tokio::test]
    async fn empty_flow_and_missing_start_are_rejected() {
        let (event_tx, _event_rx, _command_tx, command_rx) = channels();
        let executor = FlowExecutor::new(Flow::new("empty"), NullBackend, event_tx);
        assert!(matches!(
            executor.run(command_rx).await,
            Err(EngineError::NoNodes)
        ));

        let mut flow = Flow::new("no start");
        flow.add_node(click_config(1, false), Position::default());
        let (event_tx, _event_rx, _command_tx, command_rx) = channels();
        let executor = FlowExecutor::new(flow, NullBackend, event_tx);
        assert!(matches!(
            executor.run(command_rx).await,
            Err(EngineError::NoStartNode)
        ));
    }

    #[test]
    fn random_delay_samples_stay_in_range() {
        let min = Duration::millis(100);
        let max = Duration::millis(200);
        let range = DurationRange::new(min, max).unwrap();
        for _ in 0..100 {
            let sample = sample_range_ms(&range);
            assert!((100.0..=200.0).contains(&sample));
        }
    }

    #[test]
    fn degenerate_random_range_is_its_single_point() {
        let d = Duration::millis(150);
        let range = DurationRange::new(d, d).unwrap();
        assert_eq!(sample_range_ms(&range), 150.0);
    }
}
