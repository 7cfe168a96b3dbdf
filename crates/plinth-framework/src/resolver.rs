//! Requirement resolution.
//!
//! [`plan`] walks the requirement graph depth-first from one plugin and
//! returns the plugins that must become RESOLVED, dependencies first.  It
//! never mutates anything: the plugin registry commits the plan under its
//! lock, so a failed resolution leaves every state untouched.
//!
//! Each plugin carries a mark while the walk runs:
//!
//! - unmarked: not visited yet,
//! - [`Mark::InProgress`]: on the current DFS path,
//! - [`Mark::Done`]: fully resolved within this plan.
//!
//! Reaching an in-progress plugin again is a cycle.  Cycles are always
//! rejected, including ones that pass only through optional requirements.
//!
//! When several installed plugins satisfy a requirement, the highest
//! version wins and the lowest id breaks ties.

use std::collections::{BTreeMap, HashMap};

use plinth_core::{
    FrameworkError, FrameworkResult, PluginId, PluginRecord, PluginState, Requirement, Resolution,
};

/// What the resolver needs to know about one installed plugin.
pub(crate) type View<'a> = BTreeMap<PluginId, (&'a PluginRecord, PluginState)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

struct Walk<'v, 'a> {
    view: &'v View<'a>,
    marks: HashMap<PluginId, Mark>,
    path: Vec<PluginId>,
    order: Vec<PluginId>,
}

/// The best installed plugin for `req`, if any.
pub(crate) fn best_candidate(view: &View<'_>, req: &Requirement) -> Option<PluginId> {
    view.iter()
        .filter(|(_, (record, state))| {
            *state != PluginState::Uninstalled && req.matches(&record.name, &record.version)
        })
        .max_by(|(a_id, (a, _)), (b_id, (b, _))| {
            a.version.cmp(&b.version).then_with(|| b_id.cmp(a_id))
        })
        .map(|(id, _)| *id)
}

/// Computes the resolution order for `target`.
///
/// Returns an empty plan when `target` is already resolved.
pub(crate) fn plan(view: &View<'_>, target: PluginId) -> FrameworkResult<Vec<PluginId>> {
    let Some((_, state)) = view.get(&target) else {
        return Err(FrameworkError::UnknownPlugin(target));
    };
    if state.is_resolved() {
        return Ok(Vec::new());
    }

    let mut walk = Walk {
        view,
        marks: HashMap::new(),
        path: Vec::new(),
        order: Vec::new(),
    };
    walk.visit(target, target)?;
    Ok(walk.order)
}

impl Walk<'_, '_> {
    fn visit(&mut self, id: PluginId, target: PluginId) -> FrameworkResult<()> {
        let view = self.view;
        let Some((record, _)) = view.get(&id) else {
            return Err(FrameworkError::UnknownPlugin(id));
        };

        self.marks.insert(id, Mark::InProgress);
        self.path.push(id);

        for req in &record.requirements {
            let Some(candidate) = best_candidate(view, req) else {
                if req.resolution == Resolution::Optional {
                    continue;
                }
                return Err(FrameworkError::UnsatisfiedRequirement {
                    plugin: id,
                    name: record.name.clone(),
                    requirement: req.clone(),
                });
            };

            match self.marks.get(&candidate) {
                Some(Mark::Done) => continue,
                Some(Mark::InProgress) => return Err(self.cycle(candidate, target)),
                None => {}
            }
            if view[&candidate].1.is_resolved() {
                continue;
            }
            self.visit(candidate, target)?;
        }

        self.path.pop();
        self.marks.insert(id, Mark::Done);
        self.order.push(id);
        Ok(())
    }

    fn cycle(&self, back_to: PluginId, target: PluginId) -> FrameworkError {
        let start = self.path.iter().position(|id| *id == back_to).unwrap_or(0);
        let name_of = |id: &PluginId| self.view[id].0.name.clone();
        let mut cycle: Vec<String> = self.path[start..].iter().map(name_of).collect();
        cycle.push(name_of(&back_to));
        FrameworkError::CyclicRequirement {
            plugin: target,
            name: name_of(&target),
            cycle,
        }
    }
}
