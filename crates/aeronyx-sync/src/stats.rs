//! Statistics derived from a node list.

use aeronyx_core::{NodeRecord, NodeStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Always recomputed from records, never stored on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_nodes: usize,
    pub active_nodes: usize,
    pub offline_nodes: usize,
    pub pending_nodes: usize,
    pub suspended_nodes: usize,
    pub total_earnings: Decimal,
    /// Rounded mean of `(cpu + memory) / 2` over active nodes.
    pub resource_utilization: u32,
    /// Rounded mean network usage over active nodes.
    pub network_contribution: u32,
}

impl DashboardStats {
    pub fn from_records(records: &[NodeRecord]) -> Self {
        let mut stats = Self {
            total_nodes: records.len(),
            ..Self::default()
        };

        let mut utilization = 0.0;
        let mut network = 0.0;
        for record in records {
            stats.total_earnings += record.earnings;
            match record.status {
                NodeStatus::Active => {
                    stats.active_nodes += 1;
                    utilization += record.performance.utilization();
                    network += record.performance.network;
                }
                NodeStatus::Offline => stats.offline_nodes += 1,
                NodeStatus::Pending => stats.pending_nodes += 1,
                NodeStatus::Suspended => stats.suspended_nodes += 1,
            }
        }

        if stats.active_nodes > 0 {
            let n = stats.active_nodes as f64;
            stats.resource_utilization = rounded_percent(utilization / n);
            stats.network_contribution = rounded_percent(network / n);
        }
        stats
    }
}

fn rounded_percent(v: f64) -> u32 {
    v.round().clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeronyx_core::NodePerformance;
    use rust_decimal_macros::dec;

    fn node(code: &str, status: NodeStatus, perf: NodePerformance, earnings: Decimal) -> NodeRecord {
        let mut record = NodeRecord::new(code, code, status);
        record.performance = perf;
        record.earnings = earnings;
        record
    }

    #[test]
    fn test_counts_and_sums() {
        let records = vec![
            node("A", NodeStatus::Active, NodePerformance::new(40.0, 60.0, 0.0, 20.0), dec!(1.5)),
            node("B", NodeStatus::Active, NodePerformance::new(25.0, 40.0, 0.0, 35.0), dec!(2.25)),
            node("C", NodeStatus::Offline, NodePerformance::new(99.0, 99.0, 0.0, 99.0), dec!(0.25)),
            node("D", NodeStatus::Pending, NodePerformance::default(), Decimal::ZERO),
            node("E", NodeStatus::Suspended, NodePerformance::default(), dec!(1)),
        ];
        let stats = DashboardStats::from_records(&records);

        assert_eq!(stats.total_nodes, 5);
        assert_eq!(stats.active_nodes, 2);
        assert_eq!(stats.offline_nodes, 1);
        assert_eq!(stats.pending_nodes, 1);
        assert_eq!(stats.suspended_nodes, 1);
        assert_eq!(stats.total_earnings, dec!(5.00));
        // (50 + 32.5) / 2 = 41.25; offline nodes do not count
        assert_eq!(stats.resource_utilization, 41);
        // (20 + 35) / 2 = 27.5
        assert_eq!(stats.network_contribution, 28);
    }

    #[test]
    fn test_no_active_nodes() {
        let records = vec![node("A", NodeStatus::Offline, NodePerformance::new(80.0, 80.0, 0.0, 80.0), dec!(1))];
        let stats = DashboardStats::from_records(&records);
        assert_eq!(stats.resource_utilization, 0);
        assert_eq!(stats.network_contribution, 0);
        assert_eq!(DashboardStats::from_records(&[]), DashboardStats::default());
    }
}
