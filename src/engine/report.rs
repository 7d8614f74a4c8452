// src/engine/report.rs

//! Slow-node reporting, run after a successful build in verbose mode.

use std::time::Duration;

use tracing::info;

use super::BuildGraph;

/// Maximum number of nodes listed by [`log_slow_nodes`].
pub const SLOW_NODE_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SlowNode {
    pub name: String,
    pub self_time: Duration,
    /// Share of the graph's total time, 0.0..=100.0.
    pub percent: f64,
}

/// The `limit` slowest nodes, slowest first. Nodes that took no time are
/// left out; ties keep graph order.
pub fn slow_nodes(graph: &BuildGraph, limit: usize) -> Vec<SlowNode> {
    let total = graph.total_time().as_secs_f64();

    let mut nodes: Vec<_> = graph
        .nodes
        .iter()
        .filter(|n| !n.self_time.is_zero())
        .collect();
    nodes.sort_by(|a, b| b.self_time.cmp(&a.self_time));

    nodes
        .into_iter()
        .take(limit)
        .map(|n| SlowNode {
            name: n.name.clone(),
            self_time: n.self_time,
            percent: if total > 0.0 {
                n.self_time.as_secs_f64() / total * 100.0
            } else {
                0.0
            },
        })
        .collect()
}

pub fn log_slow_nodes(graph: &BuildGraph) {
    let slow = slow_nodes(graph, SLOW_NODE_LIMIT);
    if slow.is_empty() {
        return;
    }

    info!(total = ?graph.total_time(), "slowest build nodes:");
    for node in slow {
        info!(
            "  {:<32} {:.1?} ({:.1}%)",
            node.name, node.self_time, node.percent
        );
    }
}
