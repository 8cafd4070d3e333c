use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::f64::consts::TAU;

use itertools::{Itertools, MinMaxResult};
use tracing::debug;

use crate::config::OrderingConfig;
use crate::geometry::{angle_in_degrees, angle_in_radians, fingerprint, is_zero, Vector};
use crate::image::{Image, ImageId};
use crate::ordering::evaluators::{AcquisitionNumberEvaluator, PhasesPerPosition};

/// Secondary key for frames that share a position: instance number, then frame number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TieBreak {
    pub instance_number: Option<i64>,
    pub frame_number: u32,
}

impl From<&Image> for TieBreak {
    fn from(image: &Image) -> Self {
        Self {
            instance_number: image.instance_number,
            frame_number: image.frame_number,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StackEntry {
    pub image: ImageId,
    /// Position projected onto the group normal
    pub distance: f64,
    pub tie_break: TieBreak,
    /// Ingestion order, the last resort for equal keys
    sequence: usize,
}

impl StackEntry {
    fn cmp_by_position(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.tie_break.cmp(&other.tie_break))
            .then(self.sequence.cmp(&other.sequence))
    }

    fn cmp_by_instance(&self, other: &Self) -> Ordering {
        self.tie_break
            .cmp(&other.tie_break)
            .then(self.sequence.cmp(&other.sequence))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Parallel slices spread along the normal
    Stack,
    /// Frames at about the same depth, told apart by the angle of their normal
    Rotational,
}

/// Frames whose normals agree within the configured tolerance.
#[derive(Debug, Clone)]
pub struct StackGroup {
    fingerprint: String,
    normal: Vector,
    bucket_angle: f64,
    entries: Vec<StackEntry>,
}

impl StackGroup {
    fn new(fingerprint: String, normal: Vector, bucket_angle: f64) -> Self {
        Self {
            fingerprint,
            normal,
            bucket_angle,
            entries: Vec::new(),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Normal of the first frame of the group; all distances are measured along it.
    pub fn normal(&self) -> &Vector {
        &self.normal
    }

    /// Signed angle (radians, in `[0, 2π)`) of the group normal from the volume reference normal.
    pub fn bucket_angle(&self) -> f64 {
        self.bucket_angle
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by distance along the normal, then by tie-break.
    pub fn sorted_entries(&self) -> Vec<&StackEntry> {
        self.entries
            .iter()
            .sorted_by(|a, b| a.cmp_by_position(b))
            .collect()
    }

    /// Smallest distance in the group.
    pub fn representative_distance(&self) -> f64 {
        self.entries
            .iter()
            .map(|entry| entry.distance)
            .min_by(f64::total_cmp)
            .unwrap_or_default()
    }

    /// Distance between the nearest and farthest frame along the normal.
    pub fn spread(&self) -> f64 {
        match self
            .entries
            .iter()
            .map(|entry| entry.distance)
            .minmax_by(f64::total_cmp)
        {
            MinMaxResult::MinMax(min, max) => max - min,
            _ => 0.0,
        }
    }

    pub fn kind(&self, config: &OrderingConfig) -> GroupKind {
        if self.spread() > config.stack_spread_threshold {
            GroupKind::Stack
        } else {
            GroupKind::Rotational
        }
    }
}

/// Everything collected for one volume of a series.
#[derive(Debug, Clone, Default)]
pub struct VolumeAccumulator {
    groups: Vec<StackGroup>,
    reference_normal: Option<Vector>,
    rotation_direction: Option<Vector>,
    phases: PhasesPerPosition,
    acquisition: AcquisitionNumberEvaluator,
    next_sequence: usize,
}

impl VolumeAccumulator {
    pub fn groups(&self) -> &[StackGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.next_sequence
    }

    pub fn is_empty(&self) -> bool {
        self.next_sequence == 0
    }

    pub fn phases(&self) -> &PhasesPerPosition {
        &self.phases
    }

    pub fn acquisition(&self) -> &AcquisitionNumberEvaluator {
        &self.acquisition
    }

    pub fn add(&mut self, id: ImageId, image: &Image, config: &OrderingConfig) {
        let normal = *image.image_orientation.normal();
        let fingerprint = fingerprint(&normal, config.fingerprint_precision);
        let index = match self.find_group(&fingerprint, &normal, config) {
            Some(index) => index,
            None => {
                let bucket_angle = self.bucket_angle(&normal);
                debug!(
                    %fingerprint,
                    bucket_angle,
                    "New stack group for {}",
                    image.sop_instance_uid
                );
                self.groups
                    .push(StackGroup::new(fingerprint, normal, bucket_angle));
                self.groups.len() - 1
            }
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let group = &mut self.groups[index];
        group.entries.push(StackEntry {
            image: id,
            distance: image.distance_along(&group.normal),
            tie_break: TieBreak::from(image),
            sequence,
        });

        self.phases.add(image.position_key());
        self.acquisition.add(image.acquisition_number.as_deref());
    }

    /// Exact fingerprint match over every group first, then the first group whose normal
    /// lies within the tolerance. Groups are tried in creation order.
    fn find_group(&self, fingerprint: &str, normal: &Vector, config: &OrderingConfig) -> Option<usize> {
        self.groups
            .iter()
            .position(|group| group.fingerprint == fingerprint)
            .or_else(|| {
                self.groups.iter().position(|group| {
                    angle_in_degrees(&group.normal, normal)
                        .is_some_and(|angle| angle < config.normal_tolerance_degrees)
                })
            })
    }

    /// The first normal of the volume is the reference at angle 0. The first normal that
    /// is not parallel to it fixes the rotation direction, `(reference × normal) × reference`.
    /// Angles of normals on the far side of that direction are measured the long way round.
    fn bucket_angle(&mut self, normal: &Vector) -> f64 {
        if is_zero(normal) {
            return 0.0;
        }
        let Some(reference) = self.reference_normal else {
            self.reference_normal = Some(*normal);
            return 0.0;
        };
        let Some(angle) = angle_in_radians(&reference, normal) else {
            return 0.0;
        };
        if self.rotation_direction.is_none() {
            let direction = reference.cross(normal).cross(&reference);
            if !is_zero(&direction) {
                self.rotation_direction = Some(direction.normalize());
            }
        }
        match self.rotation_direction {
            Some(direction) if normal.dot(&direction) > 0.0 => angle,
            Some(_) => TAU - angle,
            None => angle,
        }
    }

    /// Geometry is trusted only when each position repeats equally often and a single
    /// acquisition produced the frames.
    pub fn uses_geometry(&self) -> bool {
        self.phases.is_consistent() && self.acquisition.is_uniform()
    }

    pub fn ordered_images(&self, config: &OrderingConfig) -> Vec<ImageId> {
        if self.uses_geometry() {
            self.geometric_order(config)
        } else {
            debug!(
                consistent_phases = self.phases.is_consistent(),
                uniform_acquisition = self.acquisition.is_uniform(),
                "Falling back to instance number order"
            );
            self.instance_order()
        }
    }

    fn instance_order(&self) -> Vec<ImageId> {
        self.groups
            .iter()
            .flat_map(|group| group.entries.iter())
            .sorted_by(|a, b| a.cmp_by_instance(b))
            .map(|entry| entry.image)
            .collect()
    }

    /// Stacks first, by representative distance, then rotational groups by angle.
    fn geometric_order(&self, config: &OrderingConfig) -> Vec<ImageId> {
        let (stacks, rotational): (Vec<GroupSummary>, Vec<GroupSummary>) = self
            .groups
            .iter()
            .map(|group| GroupSummary::new(group, config))
            .partition(|summary| summary.kind == GroupKind::Stack);
        let stacks = stacks.into_iter().sorted_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.angle.total_cmp(&b.angle))
        });
        let rotational = rotational.into_iter().sorted_by(|a, b| {
            a.angle
                .total_cmp(&b.angle)
                .then(a.distance.total_cmp(&b.distance))
        });
        stacks
            .chain(rotational)
            .flat_map(|summary| summary.group.sorted_entries())
            .map(|entry| entry.image)
            .collect()
    }
}

/// Sort keys of a group, computed once before the groups are ordered.
struct GroupSummary<'a> {
    group: &'a StackGroup,
    kind: GroupKind,
    distance: f64,
    angle: f64,
}

impl<'a> GroupSummary<'a> {
    fn new(group: &'a StackGroup, config: &OrderingConfig) -> Self {
        Self {
            group,
            kind: group.kind(config),
            distance: group.representative_distance(),
            angle: group.bucket_angle,
        }
    }
}

/// Volumes of one series, keyed by volume number.
#[derive(Debug, Clone, Default)]
pub struct SeriesAccumulator {
    volumes: BTreeMap<u32, VolumeAccumulator>,
    seen: HashSet<ImageId>,
}

impl SeriesAccumulator {
    /// Returns false if the image was already accumulated.
    pub fn add(
        &mut self,
        volume_number: u32,
        id: ImageId,
        image: &Image,
        config: &OrderingConfig,
    ) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.volumes
            .entry(volume_number)
            .or_default()
            .add(id, image, config);
        true
    }

    pub fn volume(&self, volume_number: u32) -> Option<&VolumeAccumulator> {
        self.volumes.get(&volume_number)
    }

    /// Volumes in ascending volume number.
    pub fn volumes(&self) -> impl Iterator<Item = (u32, &VolumeAccumulator)> {
        self.volumes.iter().map(|(number, volume)| (*number, volume))
    }
}
