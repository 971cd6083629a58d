//! Conversion of REST and WebSocket node shapes into `NodeRecord`.
//!
//! REST groups nodes into `online/active/offline` buckets; the socket sends a
//! flat array with a `connection.connected` flag. Both end up as one list
//! sorted by reference code, one record per code.

use aeronyx_core::{NodeConnection, NodePerformance, NodeRecord, NodeStatus};
use aeronyx_rest::{parse_timestamp, NodesOverview, RestNode};
use aeronyx_ws::WsNode;
use std::collections::BTreeMap;
use tracing::warn;

/// Flatten an overview. A node's own `status` wins over its bucket.
pub fn from_overview(overview: &NodesOverview) -> Vec<NodeRecord> {
    let buckets = [
        (NodeStatus::Active, &overview.nodes.online),
        (NodeStatus::Active, &overview.nodes.active),
        (NodeStatus::Offline, &overview.nodes.offline),
    ];

    let mut by_code = BTreeMap::new();
    for (bucket_status, nodes) in buckets {
        for node in nodes {
            if let Some(record) = from_rest_node(node, bucket_status) {
                by_code.insert(record.reference_code.clone(), record);
            }
        }
    }
    by_code.into_values().collect()
}

pub fn from_rest_node(node: &RestNode, bucket_status: NodeStatus) -> Option<NodeRecord> {
    let reference_code = node.reference_code.trim();
    if reference_code.is_empty() {
        warn!(name = %node.name, "Dropping REST node without reference code");
        return None;
    }

    let status = parse_status(node.status.as_deref()).unwrap_or(bucket_status);
    let perf = &node.performance;
    Some(NodeRecord {
        reference_code: reference_code.to_string(),
        name: node.name.clone(),
        status,
        performance: NodePerformance::new(
            perf.cpu_usage,
            perf.memory_usage,
            perf.storage_usage,
            perf.bandwidth_usage,
        ),
        earnings: node.total_earnings.unwrap_or_default(),
        connection: NodeConnection {
            connected: status == NodeStatus::Active,
            last_heartbeat: None,
            last_seen: node.last_seen.as_deref().and_then(parse_timestamp),
        },
        created_at: node.created_at.as_deref().and_then(parse_timestamp),
        updated_at: node.updated_at.as_deref().and_then(parse_timestamp),
    })
}

/// Flatten a `real_time_update` node array. Later duplicates win.
pub fn from_ws_nodes(nodes: &[WsNode]) -> Vec<NodeRecord> {
    let mut by_code = BTreeMap::new();
    for node in nodes {
        if let Some(record) = from_ws_node(node) {
            by_code.insert(record.reference_code.clone(), record);
        }
    }
    by_code.into_values().collect()
}

pub fn from_ws_node(node: &WsNode) -> Option<NodeRecord> {
    let reference_code = node.reference_code.trim();
    if reference_code.is_empty() {
        warn!(name = %node.name, "Dropping pushed node without reference code");
        return None;
    }

    let connected = node.connection.connected;
    let status = parse_status(node.status.as_deref()).unwrap_or(if connected {
        NodeStatus::Active
    } else {
        NodeStatus::Offline
    });
    let perf = &node.performance;
    Some(NodeRecord {
        reference_code: reference_code.to_string(),
        name: node.name.clone(),
        status,
        performance: NodePerformance::new(perf.cpu, perf.memory, perf.disk, perf.network),
        earnings: node.earnings.unwrap_or_default(),
        connection: NodeConnection {
            connected,
            last_heartbeat: node
                .connection
                .last_heartbeat
                .as_deref()
                .and_then(parse_timestamp),
            last_seen: node.connection.last_seen.as_deref().and_then(parse_timestamp),
        },
        created_at: node.created_at.as_deref().and_then(parse_timestamp),
        updated_at: node.updated_at.as_deref().and_then(parse_timestamp),
    })
}

fn parse_status(raw: Option<&str>) -> Option<NodeStatus> {
    let raw = raw?;
    match raw.parse() {
        Ok(status) => Some(status),
        Err(_) => {
            warn!(status = %raw, "Unknown node status, falling back");
            None
        }
    }
}
