//! Compiled plan execution.
//!
//! Subqueries are evaluated in plan order into sample bitmaps; each body may
//! only read names evaluated before it.

use std::collections::{HashMap, HashSet};

use cohort_filter::SampleId;
use cohort_filter_compiler::{CompiledPlan, CompiledSubquery, PlanExecutor, SetOp, SubqueryBody};
use roaring::RoaringBitmap;
use tracing::{debug, trace};

use crate::error::{ExecError, ExecResult};
use crate::eval::bind;
use crate::store::MemoryStore;
use crate::traverser::AncestryTraverser;

impl MemoryStore {
    /// Evaluates a plan and returns the root subquery's samples.
    pub fn execute_bitmap(&self, plan: &CompiledPlan) -> ExecResult<RoaringBitmap> {
        let mut results: HashMap<&str, RoaringBitmap> = HashMap::with_capacity(plan.subqueries.len());

        for subquery in &plan.subqueries {
            let samples = self.evaluate(subquery, &results)?;
            trace!(subquery = %subquery.name, samples = samples.len(), "evaluated subquery");
            results.insert(subquery.name.as_str(), samples);
        }

        let root = results
            .remove(plan.root.as_str())
            .ok_or_else(|| ExecError::MissingRoot(plan.root.clone()))?;
        debug!(
            subqueries = plan.subqueries.len(),
            samples = root.len(),
            "executed plan"
        );
        Ok(root)
    }

    fn evaluate(
        &self,
        subquery: &CompiledSubquery,
        results: &HashMap<&str, RoaringBitmap>,
    ) -> ExecResult<RoaringBitmap> {
        let read = |name: &str| {
            results.get(name).ok_or_else(|| ExecError::UnknownSubquery {
                subquery: subquery.name.clone(),
                name: name.to_string(),
            })
        };

        match &subquery.body {
            SubqueryBody::Select { table, predicate } => {
                let bound = bind(&subquery.name, predicate, &subquery.values)?;
                let mut samples = RoaringBitmap::new();
                for row in self.rows(*table) {
                    if bound.matches(row)? {
                        samples.insert(row.sample);
                    }
                }
                Ok(samples)
            }
            SubqueryBody::Expand { of } => Ok(AncestryTraverser::new(self).expand(read(of.as_str())?)),
            SubqueryBody::Combine { op, inputs } => {
                let mut inputs = inputs.iter();
                let Some(first) = inputs.next() else {
                    return Ok(RoaringBitmap::new());
                };
                let mut combined = read(first.as_str())?.clone();
                for name in inputs {
                    let next = read(name.as_str())?;
                    match op {
                        Some(SetOp::Intersect) => combined &= next,
                        Some(SetOp::Union) | None => combined |= next,
                    }
                }
                Ok(combined)
            }
            SubqueryBody::Matched { of } => Ok(read(of.as_str())?.clone()),
            SubqueryBody::Complement { of } => Ok(self.samples() - read(of.as_str())?),
            SubqueryBody::Universe => Ok(self.samples().clone()),
        }
    }
}

impl PlanExecutor for MemoryStore {
    type Error = ExecError;

    fn execute(&self, plan: &CompiledPlan) -> Result<HashSet<SampleId>, Self::Error> {
        Ok(self.execute_bitmap(plan)?.iter().collect())
    }
}
