//! Minimal step-graph driver shared by the ingestion and query pipelines.
//!
//! A [`Workflow`] registers named [`Step`]s and the transition out of each
//! one: a fixed successor, a router choosing among declared successors, or
//! the end of the run. [`Workflow::compile`] checks the wiring once; the
//! resulting [`CompiledWorkflow`] is immutable and can be run any number of
//! times, each run threading one caller-owned state record through the
//! steps in order.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pdfrag_shared::{PdfRagError, Result};
use tracing::{debug, info, instrument};

/// One unit of work in a pipeline, mutating the shared state record.
#[async_trait]
pub trait Step<S>: Send + Sync {
    async fn run(&self, state: &mut S) -> Result<()>;
}

/// Picks the next step from the state left behind by the current one.
pub type Router<S> = Box<dyn Fn(&S) -> &'static str + Send + Sync>;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a step starts.
    fn step(&self, workflow: &str, step: &str);
    /// Called after the terminal step succeeds.
    fn done(&self, workflow: &str, elapsed: Duration);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn step(&self, _workflow: &str, _step: &str) {}
    fn done(&self, _workflow: &str, _elapsed: Duration) {}
}

enum Transition<S> {
    Fixed(String),
    Conditional {
        targets: Vec<String>,
        router: Router<S>,
    },
    End,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Uncompiled pipeline graph.
pub struct Workflow<S> {
    name: String,
    steps: HashMap<String, Box<dyn Step<S>>>,
    transitions: HashMap<String, Transition<S>>,
    entry: Option<String>,
    problems: Vec<String>,
}

impl<S: Send> Workflow<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: HashMap::new(),
            transitions: HashMap::new(),
            entry: None,
            problems: Vec::new(),
        }
    }

    pub fn add_step(mut self, name: impl Into<String>, step: impl Step<S> + 'static) -> Self {
        let name = name.into();
        if self.steps.insert(name.clone(), Box::new(step)).is_some() {
            self.problems.push(format!("step '{name}' registered twice"));
        }
        self
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Always continue from `from` to `to`.
    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let to = to.into();
        self.add_transition(from.into(), Transition::Fixed(to))
    }

    /// Continue from `from` to whichever of `targets` the router names.
    pub fn add_conditional_edge<F>(self, from: impl Into<String>, targets: &[&str], router: F) -> Self
    where
        F: Fn(&S) -> &'static str + Send + Sync + 'static,
    {
        let transition = Transition::Conditional {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            router: Box::new(router),
        };
        self.add_transition(from.into(), transition)
    }

    /// Mark `name` as a terminal step.
    pub fn set_finish(self, name: impl Into<String>) -> Self {
        self.add_transition(name.into(), Transition::End)
    }

    fn add_transition(mut self, from: String, transition: Transition<S>) -> Self {
        if self.transitions.contains_key(&from) {
            self.problems
                .push(format!("step '{from}' has more than one outgoing transition"));
        } else {
            self.transitions.insert(from, transition);
        }
        self
    }

    /// Validate the graph and freeze it.
    pub fn compile(self) -> Result<CompiledWorkflow<S>> {
        let mut problems = self.problems;

        let entry = match self.entry {
            Some(entry) if self.steps.contains_key(&entry) => entry,
            Some(entry) => {
                problems.push(format!("entry step '{entry}' is not registered"));
                entry
            }
            None => {
                problems.push("no entry step set".to_string());
                String::new()
            }
        };

        for (from, transition) in &self.transitions {
            if !self.steps.contains_key(from) {
                problems.push(format!("transition from unknown step '{from}'"));
            }
            let targets: Vec<&String> = match transition {
                Transition::Fixed(to) => vec![to],
                Transition::Conditional { targets, .. } => targets.iter().collect(),
                Transition::End => Vec::new(),
            };
            for to in targets {
                if !self.steps.contains_key(to) {
                    problems.push(format!("edge '{from}' -> '{to}' targets an unknown step"));
                }
            }
        }

        let mut dangling: Vec<&String> = self
            .steps
            .keys()
            .filter(|name| !self.transitions.contains_key(*name))
            .collect();
        dangling.sort();
        for name in dangling {
            problems.push(format!("step '{name}' has no outgoing transition"));
        }

        if !problems.is_empty() {
            return Err(PdfRagError::config(format!(
                "invalid workflow '{}': {}",
                self.name,
                problems.join("; ")
            )));
        }

        Ok(CompiledWorkflow {
            name: self.name,
            steps: self.steps,
            transitions: self.transitions,
            entry,
        })
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Validated, runnable pipeline graph.
pub struct CompiledWorkflow<S> {
    name: String,
    steps: HashMap<String, Box<dyn Step<S>>>,
    transitions: HashMap<String, Transition<S>>,
    entry: String,
}

impl<S: Send> CompiledWorkflow<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run from the entry step to a terminal step, returning the final state.
    ///
    /// Steps run strictly one after another. The first failing step aborts
    /// the run; a step is never entered twice.
    #[instrument(skip_all, fields(workflow = %self.name))]
    pub async fn run(&self, mut state: S, progress: &dyn ProgressReporter) -> Result<S> {
        let start = Instant::now();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = self.entry.clone();

        loop {
            if !visited.insert(current.clone()) {
                return Err(PdfRagError::precondition(format!(
                    "workflow '{}' would revisit step '{current}'",
                    self.name
                )));
            }

            let step = self.steps.get(&current).ok_or_else(|| {
                PdfRagError::config(format!("workflow '{}' has no step '{current}'", self.name))
            })?;

            progress.step(&self.name, &current);
            debug!(step = %current, "running step");
            step.run(&mut state).await?;

            current = match self.transitions.get(&current) {
                Some(Transition::Fixed(next)) => next.clone(),
                Some(Transition::Conditional { targets, router }) => {
                    let next = router(&state);
                    if !targets.iter().any(|t| t == next) {
                        return Err(PdfRagError::config(format!(
                            "router after '{current}' chose undeclared step '{next}'"
                        )));
                    }
                    debug!(from = %current, to = next, "conditional edge taken");
                    next.to_string()
                }
                Some(Transition::End) | None => break,
            };
        }

        let elapsed = start.elapsed();
        progress.done(&self.name, elapsed);
        info!(
            steps = visited.len(),
            elapsed_ms = elapsed.as_millis(),
            "workflow complete"
        );

        Ok(state)
    }
}
