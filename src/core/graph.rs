//! Explicit task graph with dependency-ordered execution.
//!
//! The graph is a plain object handed to `run` — there is no process-wide
//! registry. `run` executes the transitive dependency closure of the
//! requested tasks, each at most once per invocation; tasks with no ordering
//! relation between them execute concurrently on scoped threads. Cycles and
//! unknown dependencies are rejected before any action runs.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{Error, Result};

pub type TaskAction<C> = Box<dyn Fn(&C) -> Result<()> + Send + Sync>;

struct Task<C> {
    name: String,
    needs: Vec<String>,
    action: TaskAction<C>,
}

pub struct TaskGraph<C> {
    tasks: Vec<Task<C>>,
    index: HashMap<String, usize>,
}

impl<C: Sync> TaskGraph<C> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a task. Names are unique; a duplicate is a configuration
    /// error, not a replacement.
    pub fn task(
        &mut self,
        name: &str,
        needs: &[&str],
        action: impl Fn(&C) -> Result<()> + Send + Sync + 'static,
    ) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(Error::pipeline_duplicate_task(name));
        }
        self.index.insert(name.to_string(), self.tasks.len());
        self.tasks.push(Task {
            name: name.to_string(),
            needs: needs.iter().map(|n| n.to_string()).collect(),
            action: Box::new(action),
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Execute the requested tasks plus their transitive dependencies.
    ///
    /// `completed` carries task names that already ran in this pipeline
    /// invocation; they satisfy dependencies but are not re-executed, and
    /// every task that succeeds here is added to it. Returns the names that
    /// actually executed, in completion order.
    pub fn run(&self, names: &[&str], ctx: &C, completed: &mut HashSet<String>) -> Result<Vec<String>> {
        let selected = self.select_closure(names, completed)?;
        let order = self.order_selection(&selected)?;

        let mut executed = Vec::with_capacity(order.len());
        let mut done: HashSet<usize> = HashSet::new();
        let mut pending: VecDeque<usize> = order.into_iter().collect();

        while !pending.is_empty() {
            let mut ready = Vec::new();
            let mut blocked = VecDeque::new();

            for &idx in &pending {
                let task = &self.tasks[idx];
                let deps_met = task.needs.iter().all(|need| {
                    completed.contains(need)
                        || self
                            .index
                            .get(need)
                            .map(|i| done.contains(i))
                            .unwrap_or(false)
                });
                if deps_met {
                    ready.push(idx);
                } else {
                    blocked.push_back(idx);
                }
            }

            // order_selection guarantees progress: a non-empty pending set
            // always yields at least one ready task.
            if ready.is_empty() {
                return Err(Error::internal_unexpected(
                    "Task scheduling stalled with no ready tasks",
                ));
            }

            let batch = self.execute_batch(&ready, ctx);

            let mut first_failure: Option<Error> = None;
            for (idx, result) in batch {
                let name = self.tasks[idx].name.clone();
                match result {
                    Ok(()) => {
                        done.insert(idx);
                        completed.insert(name.clone());
                        executed.push(name);
                    }
                    Err(err) => {
                        if first_failure.is_none() {
                            first_failure = Some(Error::pipeline_task_failed(&name, &err));
                        }
                    }
                }
            }

            if let Some(err) = first_failure {
                return Err(err);
            }

            pending = blocked;
        }

        Ok(executed)
    }

    /// Walk the dependency closure of the requested names, skipping tasks
    /// that already completed in this invocation.
    fn select_closure(&self, names: &[&str], completed: &HashSet<String>) -> Result<Vec<usize>> {
        let mut selected = Vec::new();
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();

        for name in names {
            stack.push(name);
        }

        while let Some(name) = stack.pop() {
            if completed.contains(name) {
                continue;
            }
            let idx = *self
                .index
                .get(name)
                .ok_or_else(|| Error::pipeline_unknown_task(name))?;
            if !seen.insert(idx) {
                continue;
            }
            selected.push(idx);
            for need in &self.tasks[idx].needs {
                stack.push(need);
            }
        }

        Ok(selected)
    }

    /// Topologically order the selection, rejecting cycles before any
    /// action executes. Registration order breaks ties so runs are
    /// deterministic.
    fn order_selection(&self, selected: &[usize]) -> Result<Vec<usize>> {
        let members: HashSet<usize> = selected.iter().copied().collect();
        let mut indegree: HashMap<usize, usize> = HashMap::new();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();

        for &idx in selected {
            indegree.entry(idx).or_insert(0);
            for need in &self.tasks[idx].needs {
                if let Some(&need_idx) = self.index.get(need) {
                    if members.contains(&need_idx) {
                        *indegree.entry(idx).or_insert(0) += 1;
                        dependents.entry(need_idx).or_default().push(idx);
                    }
                }
            }
        }

        // Descending sort so pop() yields the lowest registration index,
        // keeping runs deterministic.
        let mut queue: Vec<usize> = indegree
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&idx, _)| idx)
            .collect();
        queue.sort_unstable_by(|a, b| b.cmp(a));

        let mut ordered = Vec::with_capacity(selected.len());
        while let Some(idx) = queue.pop() {
            ordered.push(idx);
            if let Some(children) = dependents.get(&idx) {
                for &child in children {
                    if let Some(count) = indegree.get_mut(&child) {
                        *count -= 1;
                        if *count == 0 {
                            queue.push(child);
                        }
                    }
                }
            }
            queue.sort_unstable_by(|a, b| b.cmp(a));
        }

        if ordered.len() != selected.len() {
            let mut pending: Vec<String> = indegree
                .iter()
                .filter(|(_, &count)| count > 0)
                .map(|(&idx, _)| self.tasks[idx].name.clone())
                .collect();
            pending.sort();
            return Err(Error::pipeline_cycle(pending));
        }

        Ok(ordered)
    }

    /// Run one wave of independent tasks, on threads when there is more
    /// than one of them.
    fn execute_batch(&self, ready: &[usize], ctx: &C) -> Vec<(usize, Result<()>)> {
        if ready.len() == 1 {
            let idx = ready[0];
            return vec![(idx, (self.tasks[idx].action)(ctx))];
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = ready
                .iter()
                .map(|&idx| (idx, scope.spawn(move || (self.tasks[idx].action)(ctx))))
                .collect();

            handles
                .into_iter()
                .map(|(idx, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(Error::internal_unexpected(format!(
                            "Task '{}' panicked",
                            self.tasks[idx].name
                        )))
                    });
                    (idx, result)
                })
                .collect()
        })
    }
}

impl<C: Sync> Default for TaskGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}
