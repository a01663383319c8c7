// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Plugin Dependency Resolver
 * Deterministic topological ordering of the enabled plugin set
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::errors::{EngineError, EngineResult};
use crate::plugin::Plugin;

/// Order the enabled plugin set so that every plugin runs after its
/// declared dependencies.
///
/// Dependency values are plugin code names resolved within the enabled
/// set; a name that resolves to nothing is treated as already satisfied
/// and logged at WARN. Ties are broken by ascending plugin id, so the
/// order is deterministic for a given enabled set. A cycle yields
/// `DependencyCycle` and the caller must not schedule any of the input.
pub fn execution_order(plugins: &[Arc<dyn Plugin>]) -> EngineResult<Vec<Arc<dyn Plugin>>> {
    let by_id: BTreeMap<u32, Arc<dyn Plugin>> = plugins
        .iter()
        .map(|p| (p.descriptor().id, Arc::clone(p)))
        .collect();
    let name_to_id: HashMap<&str, u32> = plugins
        .iter()
        .map(|p| (p.descriptor().name.as_str(), p.descriptor().id))
        .collect();

    // edges run dependency -> dependent
    let mut dependents: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut in_degree: BTreeMap<u32, usize> = by_id.keys().map(|id| (*id, 0)).collect();

    for plugin in by_id.values() {
        let descriptor = plugin.descriptor();
        for dep_name in &descriptor.dependencies {
            match name_to_id.get(dep_name.as_str()) {
                Some(dep_id) => {
                    dependents.entry(*dep_id).or_default().push(descriptor.id);
                    *in_degree.entry(descriptor.id).or_default() += 1;
                }
                None => {
                    warn!(
                        "[Resolver] plugin {} depends on unknown plugin '{}'; treating as satisfied",
                        descriptor.name, dep_name
                    );
                }
            }
        }
    }

    let mut ready: BTreeSet<u32> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(by_id.len());
    while let Some(id) = ready.iter().next().copied() {
        ready.remove(&id);
        order.push(Arc::clone(&by_id[&id]));

        if let Some(next) = dependents.get(&id) {
            for dependent in next {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
    }

    if order.len() != by_id.len() {
        let remaining: BTreeSet<u32> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| *id)
            .collect();
        return Err(EngineError::DependencyCycle {
            cycle: find_cycle(&by_id, &name_to_id, &remaining),
        });
    }

    Ok(order)
}

/// Walk dependency edges among the unorderable remainder until a node
/// repeats, and return that loop by code name.
fn find_cycle(
    by_id: &BTreeMap<u32, Arc<dyn Plugin>>,
    name_to_id: &HashMap<&str, u32>,
    remaining: &BTreeSet<u32>,
) -> Vec<String> {
    let start = match remaining.iter().next() {
        Some(id) => *id,
        None => return Vec::new(),
    };

    let mut path: Vec<u32> = Vec::new();
    let mut current = start;
    loop {
        if let Some(position) = path.iter().position(|id| *id == current) {
            let mut cycle: Vec<String> = path[position..]
                .iter()
                .map(|id| by_id[id].descriptor().name.clone())
                .collect();
            cycle.push(by_id[&current].descriptor().name.clone());
            return cycle;
        }
        path.push(current);

        let next = by_id[&current]
            .descriptor()
            .dependencies
            .iter()
            .filter_map(|name| name_to_id.get(name.as_str()).copied())
            .find(|id| remaining.contains(id));
        match next {
            Some(id) => current = id,
            // every node in `remaining` has an unsettled dependency, so
            // the walk cannot actually fall off the cycle
            None => return path.iter().map(|id| by_id[id].descriptor().name.clone()).collect(),
        }
    }
}
