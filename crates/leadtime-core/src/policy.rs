// Copyright (C) 2026  Leadtime Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Ordered resolution steps: annotation, then adapters, then fallback
//!
//! The first step that yields a fact wins. A step that is deferred (adapter
//! rate limited, backing off or unreachable) ends the walk for this cycle
//! without consulting later steps, so a transient outage never lets the
//! fallback publish a different answer than the primary source would.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::adapter::SourceAdapter;
use crate::error::AdapterError;
use crate::record::{MetricKind, RawFact, Workload};
use crate::resolver::Resolver;

/// One step of the resolution policy
#[derive(Clone)]
pub enum ResolutionStep {
    /// Read the workload's own annotations; never performs I/O
    Annotation,
    /// Ask a primary source adapter
    Adapter(Arc<dyn SourceAdapter>),
    /// Ask a fallback provider once every earlier step found nothing
    Fallback(Arc<dyn SourceAdapter>),
}

impl fmt::Debug for ResolutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStep::Annotation => f.write_str("Annotation"),
            ResolutionStep::Adapter(a) => write!(f, "Adapter({})", a.name()),
            ResolutionStep::Fallback(a) => write!(f, "Fallback({})", a.name()),
        }
    }
}

/// Per-cycle inputs shared by every step attempt
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    /// Resolver holding the annotation names
    pub resolver: &'a Resolver,
    /// Kind of record being resolved
    pub kind: MetricKind,
    /// Adapters suspended for this cycle
    pub suspended: &'a HashSet<String>,
}

/// Why a workload could not be resolved this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferReason {
    /// Adapter is sitting out cycles after a rate limit
    BackingOff,
    /// Adapter rate limited this call
    RateLimited(Option<Duration>),
    /// Adapter could not be reached
    Unavailable(String),
}

/// A workload postponed to a later cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferral {
    /// Adapter responsible
    pub adapter: String,
    /// Why
    pub reason: DeferReason,
}

impl Deferral {
    /// Short label for logs
    pub fn reason_label(&self) -> &'static str {
        match self.reason {
            DeferReason::BackingOff => "backing_off",
            DeferReason::RateLimited(_) => "rate_limited",
            DeferReason::Unavailable(_) => "unavailable",
        }
    }
}

/// Result of attempting one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A fact to resolve from
    Found(RawFact),
    /// Nothing here; try the next step
    Nothing,
    /// Stop for this cycle
    Deferred(Deferral),
}

impl ResolutionStep {
    /// Adapter behind this step, if any
    pub fn adapter(&self) -> Option<&Arc<dyn SourceAdapter>> {
        match self {
            ResolutionStep::Annotation => None,
            ResolutionStep::Adapter(a) | ResolutionStep::Fallback(a) => Some(a),
        }
    }

    /// Try this step for one workload
    pub async fn attempt(&self, workload: &Workload, ctx: &AttemptContext<'_>) -> StepOutcome {
        let adapter = match self {
            ResolutionStep::Annotation => {
                return match ctx.resolver.annotation_fact(workload, ctx.kind) {
                    Some(fact) => StepOutcome::Found(fact),
                    None => StepOutcome::Nothing,
                };
            }
            ResolutionStep::Adapter(a) | ResolutionStep::Fallback(a) => a,
        };

        let name = adapter.name();
        if !adapter.supports(workload) {
            return StepOutcome::Nothing;
        }
        if ctx.suspended.contains(name) {
            return StepOutcome::Deferred(Deferral {
                adapter: name.to_string(),
                reason: DeferReason::BackingOff,
            });
        }

        match adapter.fetch(workload).await {
            Ok(fact) => StepOutcome::Found(fact),
            Err(AdapterError::NotFound(detail)) | Err(AdapterError::Unsupported(detail)) => {
                debug!(
                    adapter = name,
                    app = %workload.app_name,
                    namespace = %workload.namespace,
                    detail = %detail,
                    "Adapter has no data for workload"
                );
                StepOutcome::Nothing
            }
            Err(AdapterError::RateLimited { retry_after }) => StepOutcome::Deferred(Deferral {
                adapter: name.to_string(),
                reason: DeferReason::RateLimited(retry_after),
            }),
            Err(AdapterError::Unavailable(detail)) => StepOutcome::Deferred(Deferral {
                adapter: name.to_string(),
                reason: DeferReason::Unavailable(detail),
            }),
        }
    }
}

/// What the policy gathered for one workload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gathered {
    /// Zero or one fact; facts from different steps are never merged
    pub facts: Vec<RawFact>,
    /// Set when a step postponed the workload
    pub deferral: Option<Deferral>,
    /// Adapters that answered without rate limiting
    pub answered: Vec<String>,
}

/// Ordered list of steps evaluated per workload
#[derive(Debug, Clone, Default)]
pub struct ResolutionPolicy {
    steps: Vec<ResolutionStep>,
}

impl ResolutionPolicy {
    /// Create a policy from explicit steps
    pub fn new(steps: Vec<ResolutionStep>) -> Self {
        Self { steps }
    }

    /// Annotation first, then `adapters` in order, then the optional fallback
    pub fn standard(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        fallback: Option<Arc<dyn SourceAdapter>>,
    ) -> Self {
        let mut steps = vec![ResolutionStep::Annotation];
        steps.extend(adapters.into_iter().map(ResolutionStep::Adapter));
        steps.extend(fallback.map(ResolutionStep::Fallback));
        Self { steps }
    }

    /// Steps in evaluation order
    pub fn steps(&self) -> &[ResolutionStep] {
        &self.steps
    }

    /// Names of every adapter the policy may call
    pub fn adapter_names(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(ResolutionStep::adapter)
            .map(|a| a.name().to_string())
            .collect()
    }

    /// Walk the steps until one finds a fact or defers
    pub async fn gather(&self, workload: &Workload, ctx: &AttemptContext<'_>) -> Gathered {
        let mut gathered = Gathered::default();

        for step in &self.steps {
            let outcome = step.attempt(workload, ctx).await;

            if let Some(adapter) = step.adapter() {
                let answered = match &outcome {
                    StepOutcome::Found(_) => true,
                    StepOutcome::Nothing => adapter.supports(workload),
                    StepOutcome::Deferred(_) => false,
                };
                if answered {
                    gathered.answered.push(adapter.name().to_string());
                }
            }

            match outcome {
                StepOutcome::Found(fact) => {
                    gathered.facts.push(fact);
                    break;
                }
                StepOutcome::Nothing => continue,
                StepOutcome::Deferred(deferral) => {
                    gathered.deferral = Some(deferral);
                    break;
                }
            }
        }

        gathered
    }
}
