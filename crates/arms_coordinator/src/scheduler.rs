//! Phase scheduler. Partitions processors into ordered phase groups.
//!
//! Every processor belongs to exactly one [`Phase`]. Within a phase the
//! group is sorted by ascending priority; processors with equal priority keep
//! their registration order (the sort is stable).

use crate::descriptor::{Phase, ProcessorDescriptor};

/// Processor indices grouped by phase, each group in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseGroups {
    groups: [Vec<usize>; 3],
}

impl PhaseGroups {
    /// Indices of the processors that run in `phase`, in execution order.
    #[must_use]
    pub fn group(&self, phase: Phase) -> &[usize] {
        &self.groups[phase.index()]
    }

    /// Total number of scheduled processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }
}

/// Computes phase groups from descriptors given in registration order.
///
/// The returned indices refer to positions in `descriptors`.
#[must_use]
pub fn compute_phase_groups(descriptors: &[&ProcessorDescriptor]) -> PhaseGroups {
    let mut groups = PhaseGroups::default();

    for (idx, descriptor) in descriptors.iter().enumerate() {
        groups.groups[descriptor.phase().index()].push(idx);
    }

    for group in &mut groups.groups {
        // `sort_by_key` is stable, so equal priorities keep registration order.
        group.sort_by_key(|&idx| descriptors[idx].priority());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_descriptor(name: &str, phase: Phase, priority: i32) -> ProcessorDescriptor {
        ProcessorDescriptor::new(name)
            .in_phase(phase)
            .with_priority(priority)
    }

    fn schedule(descriptors: &[ProcessorDescriptor]) -> PhaseGroups {
        let refs: Vec<&ProcessorDescriptor> = descriptors.iter().collect();
        compute_phase_groups(&refs)
    }

    #[test]
    fn test_no_processors_no_groups() {
        let groups = compute_phase_groups(&[]);
        assert!(groups.is_empty());
        assert!(groups.group(Phase::Tick).is_empty());
    }

    #[test]
    fn test_partition_by_phase() {
        let groups = schedule(&[
            make_descriptor("render", Phase::PostTick, 0),
            make_descriptor("input", Phase::PreTick, 0),
            make_descriptor("physics", Phase::Tick, 0),
        ]);
        assert_eq!(groups.group(Phase::PreTick), &[1]);
        assert_eq!(groups.group(Phase::Tick), &[2]);
        assert_eq!(groups.group(Phase::PostTick), &[0]);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_ascending_priority_within_phase() {
        let groups = schedule(&[
            make_descriptor("late", Phase::Tick, 10),
            make_descriptor("early", Phase::Tick, -5),
            make_descriptor("middle", Phase::Tick, 0),
        ]);
        assert_eq!(groups.group(Phase::Tick), &[1, 2, 0]);
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let groups = schedule(&[
            make_descriptor("a", Phase::PreTick, 1),
            make_descriptor("b", Phase::PreTick, 0),
            make_descriptor("c", Phase::PreTick, 1),
            make_descriptor("d", Phase::PreTick, 0),
        ]);
        assert_eq!(groups.group(Phase::PreTick), &[1, 3, 0, 2]);
    }
}
