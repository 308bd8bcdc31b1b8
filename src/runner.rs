//! Processing runner
//!
//! Walks files in diff order × concerns in declared order × signals in
//! declared order, driving each signal's watch and report. Evaluation is
//! parallel but the emitted sequence always matches the sequential
//! traversal: tasks are dispatched keyed by their position and collected in
//! that order.
//!
//! No signal failure aborts the run; failures are recorded next to the
//! offending signal and every non-failing signal still reports.

use std::{
   collections::BTreeMap,
   sync::atomic::{AtomicBool, Ordering},
};

use rayon::prelude::*;

use crate::{
   config::{OrRef, RuleSet, Signal},
   error::VigilError,
   provider::ContentProvider,
   report,
   types::{ChangeKind, FileChange, FileVersions, ReportOutput, RunOutput, SignalFailure},
   watch,
};

/// The revision pair a run compares
#[derive(Debug, Clone)]
pub struct Refs {
   pub base: String,
   pub head: String,
}

/// Everything a run needs besides the parsed diff and the ruleset
pub struct ProcessContext<'a> {
   pub provider: &'a dyn ContentProvider,
   pub refs:     Refs,
   cancel:       Option<&'a AtomicBool>,
}

impl<'a> ProcessContext<'a> {
   pub fn new(provider: &'a dyn ContentProvider, base: &str, head: &str) -> Self {
      Self {
         provider,
         refs: Refs { base: base.to_string(), head: head.to_string() },
         cancel: None,
      }
   }

   /// Attach a cancellation flag; pending tasks observed after it is set
   /// fail with an abort error instead of running their extractors
   pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
      self.cancel = Some(cancel);
      self
   }

   fn cancelled(&self) -> bool {
      self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
   }
}

struct Task<'a> {
   file:       &'a FileChange,
   concern_id: &'a str,
   label:      String,
   signal_ref: &'a OrRef<Signal>,
}

enum Outcome {
   Skip,
   Fired {
      report:  ReportOutput,
      context: Option<BTreeMap<String, String>>,
   },
   Failed(SignalFailure),
}

fn failure(task: &Task<'_>, error: &VigilError) -> Outcome {
   Outcome::Failed(SignalFailure {
      concern: task.concern_id.to_string(),
      signal:  task.label.clone(),
      file:    task.file.effective_path().map(str::to_string),
      error:   error.to_string(),
   })
}

fn process_signal(rules: &RuleSet, ctx: &ProcessContext<'_>, task: &Task<'_>) -> Outcome {
   if ctx.cancelled() {
      return failure(task, &VigilError::Aborted);
   }

   let signal = match rules.resolve_signal(task.signal_ref) {
      Ok(signal) => signal,
      Err(e) => return failure(task, &e),
   };
   let watch_config = match rules.resolve_watch(&signal.watch) {
      Ok(config) => config,
      Err(e) => return failure(task, &e),
   };

   let Some(path) = task.file.effective_path() else {
      return Outcome::Skip;
   };
   match watch_config.includes(path) {
      Ok(true) => {},
      Ok(false) => return Outcome::Skip,
      Err(e) => return failure(task, &e),
   }

   // Materialize both sides lazily; absence is a value, not an error
   let old = if task.file.kind == ChangeKind::Add {
      None
   } else {
      let old_path = task.file.old_path.as_deref().unwrap_or(path);
      match ctx.provider.fetch(&ctx.refs.base, old_path) {
         Ok(content) => content,
         Err(e) => return failure(task, &e),
      }
   };
   let new = if task.file.kind == ChangeKind::Delete {
      None
   } else {
      let new_path = task.file.new_path.as_deref().unwrap_or(path);
      match ctx.provider.fetch(&ctx.refs.head, new_path) {
         Ok(content) => content,
         Err(e) => return failure(task, &e),
      }
   };
   let versions = FileVersions { old, new };

   let result = match watch::apply(watch_config, &versions, Some(path)) {
      Ok(Some(result)) => result,
      Ok(None) => return Outcome::Skip,
      Err(e) => return failure(task, &e),
   };

   let report_config = match rules.resolve_report(&signal.report) {
      Ok(config) => config,
      Err(e) => return failure(task, &e),
   };
   match report::render(report_config, &result, path) {
      Ok(rendered) => Outcome::Fired {
         report:  ReportOutput {
            concern:  task.concern_id.to_string(),
            signal:   task.label.clone(),
            content:  rendered.content,
            metadata: rendered.metadata,
            notify:   signal.notify.clone(),
         },
         context: signal.context.clone(),
      },
      Err(e) => failure(task, &e),
   }
}

fn build_tasks<'a>(files: &'a [FileChange], rules: &'a RuleSet) -> Vec<Task<'a>> {
   let mut tasks = Vec::new();
   for file in files {
      for (concern_id, concern) in &rules.concerns {
         for (index, signal_ref) in concern.signals.iter().enumerate() {
            tasks.push(Task {
               file,
               concern_id,
               label: signal_ref.label(index),
               signal_ref,
            });
         }
      }
   }
   tasks
}

fn fold(tasks: &[Task<'_>], outcomes: Vec<Outcome>) -> RunOutput {
   let mut output = RunOutput::default();
   for (task, outcome) in tasks.iter().zip(outcomes) {
      match outcome {
         Outcome::Skip => {},
         Outcome::Fired { report, context } => {
            if let Some(pairs) = context {
               let shared = output.concerns.entry(task.concern_id.to_string()).or_default();
               shared.extend(pairs);
            }
            output.reports.push(report);
         },
         Outcome::Failed(f) => output.failures.push(f),
      }
   }
   output
}

/// Run the ruleset over the changed files, evaluating signals in parallel
///
/// The emitted `reports` sequence matches [`run_sequential`] exactly.
pub fn run(files: &[FileChange], rules: &RuleSet, ctx: &ProcessContext<'_>) -> RunOutput {
   let tasks = build_tasks(files, rules);
   let outcomes: Vec<Outcome> = tasks
      .par_iter()
      .map(|task| process_signal(rules, ctx, task))
      .collect();
   fold(&tasks, outcomes)
}

/// Single-threaded variant of [`run`] with identical output
pub fn run_sequential(files: &[FileChange], rules: &RuleSet, ctx: &ProcessContext<'_>) -> RunOutput {
   let tasks = build_tasks(files, rules);
   let outcomes: Vec<Outcome> = tasks
      .iter()
      .map(|task| process_signal(rules, ctx, task))
      .collect();
   fold(&tasks, outcomes)
}
