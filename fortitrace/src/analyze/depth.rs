use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::Group;

/// Nesting depth of a group. A group whose members are all leaves has depth 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDepth {
    Depth(usize),
    /// The group is part of, or contains, a membership cycle.
    Cycle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepthReport {
    pub depths: BTreeMap<String, GroupDepth>,
    /// Each cycle once, rotated to start at its smallest name.
    pub cycles: Vec<Vec<String>>,
}

/// Depth of every group in `groups`, found by memoized depth-first search.
pub fn group_depths(groups: &BTreeMap<String, Group>) -> DepthReport {
    let mut walk = Walk {
        groups,
        memo: BTreeMap::new(),
        path: Vec::new(),
        cycles: Vec::new(),
    };
    for name in groups.keys() {
        walk.depth(name);
    }
    DepthReport {
        depths: walk.memo,
        cycles: walk.cycles,
    }
}

struct Walk<'g> {
    groups: &'g BTreeMap<String, Group>,
    memo: BTreeMap<String, GroupDepth>,
    path: Vec<String>,
    cycles: Vec<Vec<String>>,
}

impl Walk<'_> {
    fn depth(&mut self, name: &str) -> GroupDepth {
        let groups = self.groups;
        let Some(group) = groups.get(name) else {
            return GroupDepth::Depth(0);
        };
        if let Some(depth) = self.memo.get(name) {
            return *depth;
        }
        if let Some(start) = self.path.iter().position(|n| n == name) {
            let cycle = self.path[start..].to_vec();
            self.record(cycle);
            return GroupDepth::Cycle;
        }

        self.path.push(name.to_string());
        let mut result = GroupDepth::Depth(1);
        // Every member is visited even after a cycle so that all cycles get recorded.
        for member in &group.members {
            match (self.depth(member), result) {
                (GroupDepth::Cycle, _) => result = GroupDepth::Cycle,
                (GroupDepth::Depth(inner), GroupDepth::Depth(current)) => {
                    result = GroupDepth::Depth(current.max(inner + 1));
                }
                (GroupDepth::Depth(_), GroupDepth::Cycle) => {}
            }
        }
        self.path.pop();
        self.memo.insert(name.to_string(), result);
        result
    }

    fn record(&mut self, mut cycle: Vec<String>) {
        let start = cycle
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map_or(0, |(idx, _)| idx);
        cycle.rotate_left(start);
        if !self.cycles.contains(&cycle) {
            self.cycles.push(cycle);
        }
    }
}
