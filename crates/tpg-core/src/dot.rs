//! Graphviz DOT rendering of a graph, per `spec.md` §6 "Visualization
//! output": teams are nodes (labeled with their contained program IDs and
//! actions, root teams styled distinctly), action-map entries are edges
//! labeled with the program ID that wins the bid leading to them. A thin,
//! dependency-free consumer of the public read API - it never touches
//! graph internals directly.

use std::fmt::Write as _;

use crate::graph::TangledProgramGraph;
use crate::id::TeamId;

/// Builds a team's node label: its contained program IDs, each followed by
/// its assigned action in parens where one is set, comma-separated.
fn team_label<A: std::fmt::Display, X>(graph: &TangledProgramGraph<A, X>, team_id: TeamId) -> String {
    let team = graph.team(team_id).expect("valid team");
    team.programs()
        .iter()
        .map(|&pid| match graph.program(pid).and_then(|p| p.action()) {
            Some(action) => format!("{pid}({action})"),
            None => format!("{pid}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders the whole graph as a DOT digraph. Root teams are drawn as
/// doubly-bordered nodes; every other team is a plain box. Each team node
/// is labeled with its contained program IDs and their actions.
pub fn to_dot<A: std::fmt::Display, X>(graph: &TangledProgramGraph<A, X>) -> String {
    let mut out = String::new();
    out.push_str("digraph tpg {\n");
    out.push_str("    rankdir=LR;\n");

    let roots: std::collections::HashSet<TeamId> = graph.root_teams().iter().copied().collect();
    let mut team_ids: Vec<TeamId> = graph.team_ids().collect();
    team_ids.sort();

    for team_id in &team_ids {
        let shape = if roots.contains(team_id) {
            "doublecircle"
        } else {
            "box"
        };
        let label = team_label(graph, *team_id);
        let _ = writeln!(out, "    \"{team_id}\" [shape={shape} label=\"{label}\"];");
    }

    for team_id in &team_ids {
        let team = graph.team(*team_id).expect("from team_ids");
        let mut entries: Vec<(_, _)> = team.action_map().iter().collect();
        entries.sort_by_key(|(program, _)| **program);
        for (program_id, dest) in entries {
            let _ = writeln!(
                out,
                "    \"{team_id}\" -> \"{dest}\" [label=\"{program_id}\"];"
            );
        }
    }

    out.push_str("}\n");
    out
}

/// Renders only the subgraph reachable from `root`, using the same visual
/// conventions as [`to_dot`].
pub fn to_dot_from<A: std::fmt::Display, X>(
    graph: &TangledProgramGraph<A, X>,
    root: TeamId,
) -> String {
    let reach = crate::traversal::reachable_from(graph, [root]);
    let mut out = String::new();
    out.push_str("digraph tpg {\n");
    out.push_str("    rankdir=LR;\n");

    let mut team_ids: Vec<TeamId> = reach.teams().collect();
    team_ids.sort();

    for team_id in &team_ids {
        let shape = if *team_id == root { "doublecircle" } else { "box" };
        let label = team_label(graph, *team_id);
        let _ = writeln!(out, "    \"{team_id}\" [shape={shape} label=\"{label}\"];");
    }

    for team_id in &team_ids {
        let team = graph.team(*team_id).expect("from reachability");
        let mut entries: Vec<(_, _)> = team.action_map().iter().collect();
        entries.sort_by_key(|(program, _)| **program);
        for (program_id, dest) in entries {
            if reach.contains(*dest) {
                let _ = writeln!(
                    out,
                    "    \"{team_id}\" -> \"{dest}\" [label=\"{program_id}\"];"
                );
            }
        }
    }

    out.push_str("}\n");
    out
}
