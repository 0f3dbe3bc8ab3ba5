//! Call-stack analyzer.
//!
//! Walks a transaction's `callTracer` tree depth-first in execution order,
//! keeping a [`CallingContext`] that mirrors the live call stack: which
//! selectors are currently active on which contract. Entering a contract that
//! is already on the stack is reentrancy-shaped:
//!
//! ```text
//!   contract not active                -> push selector, no finding
//!   contract active, same selector     -> HARD  (same function re-entered)
//!   contract active, other selector    -> LIGHT (cross-function re-entry)
//! ```
//!
//! Leaving a frame pops what entering it pushed, so the context only ever
//! describes the active path, never call history.
//!
//! The transaction's own top-level frame is not entered into the context:
//! analysis starts from the calls it makes.

use ethereum_types::Address;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::AnalysisError;
use crate::severity::SuspicionType;
use crate::types::{CallFrame, Selector};

/// EVM call depth limit; no real trace can nest deeper.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Selectors active on each contract along the call path being walked.
///
/// Owned by a single traversal. Each entered frame pushes its selector onto
/// its contract's list (even when already present), and exiting pops it, so
/// the lists are stacks and exits always remove the most recent entry.
#[derive(Debug, Default)]
pub struct CallingContext {
    active: FxHashMap<Address, Vec<Selector>>,
}

impl CallingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame entering `to` with `selector` and classify the entry.
    pub fn enter(&mut self, to: Address, selector: Selector) -> SuspicionType {
        let selectors = self.active.entry(to).or_default();
        let finding = if selectors.is_empty() {
            SuspicionType::None
        } else if selectors.contains(&selector) {
            SuspicionType::Hard
        } else {
            SuspicionType::Light
        };
        selectors.push(selector);
        finding
    }

    /// Undo the most recent [`enter`](Self::enter) on `to`.
    pub fn exit(&mut self, to: Address) {
        let Some(selectors) = self.active.get_mut(&to) else {
            return;
        };
        selectors.pop();
        if selectors.is_empty() {
            self.active.remove(&to);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Selectors currently active on `to`, outermost first.
    pub fn active_selectors(&self, to: &Address) -> &[Selector] {
        self.active.get(to).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Work item of the explicit traversal stack.
enum Step<'a> {
    Enter { frame: &'a CallFrame, depth: usize },
    Exit { to: Address },
}

/// Stateless analyzer producing one verdict per call trace.
#[derive(Debug, Clone, Copy)]
pub struct CallStackAnalyzer {
    max_depth: usize,
}

impl Default for CallStackAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl CallStackAnalyzer {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Analyze the calls made under `root` and return the combined verdict.
    ///
    /// A root without calls yields [`SuspicionType::None`].
    pub fn analyze(&self, root: &CallFrame) -> Result<SuspicionType, AnalysisError> {
        let mut context = CallingContext::new();
        let verdict = self.walk(&root.calls, &mut context, |_| {})?;
        debug_assert!(
            context.is_empty(),
            "calling context must be empty after a full traversal"
        );
        Ok(verdict)
    }

    /// Iterative pre-order walk. `on_enter` sees the running verdict after
    /// every entered frame.
    fn walk<F>(
        &self,
        calls: &[CallFrame],
        context: &mut CallingContext,
        mut on_enter: F,
    ) -> Result<SuspicionType, AnalysisError>
    where
        F: FnMut(SuspicionType),
    {
        let mut verdict = SuspicionType::None;
        let mut stack: Vec<Step<'_>> = calls
            .iter()
            .rev()
            .map(|frame| Step::Enter { frame, depth: 1 })
            .collect();

        while let Some(step) = stack.pop() {
            match step {
                Step::Exit { to } => context.exit(to),
                Step::Enter { frame, depth } => {
                    if depth > self.max_depth {
                        return Err(AnalysisError::TraceTooDeep {
                            max_depth: self.max_depth,
                        });
                    }
                    // No destination: nothing to track and nothing below it.
                    let Some(to) = frame.to else {
                        continue;
                    };

                    let selector = frame.selector();
                    if let Some(outer) = context.active_selectors(&to).first() {
                        trace!(contract = ?to, %selector, %outer, depth, "contract re-entered while active");
                    }
                    verdict = verdict.join(context.enter(to, selector));
                    on_enter(verdict);

                    stack.push(Step::Exit { to });
                    stack.extend(
                        frame
                            .calls
                            .iter()
                            .rev()
                            .map(|child| Step::Enter {
                                frame: child,
                                depth: depth + 1,
                            }),
                    );
                }
            }
        }

        Ok(verdict)
    }
}
