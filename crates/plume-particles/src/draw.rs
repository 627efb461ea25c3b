//! Renderer-facing trail data packed from active particles

use crate::emitter::Emitter;
use crate::particle::ParticleRecord;
use bytemuck::{Pod, Zeroable};
use std::ops::Range;

/// One line segment from a particle's previous position to its current one.
/// 32 bytes, laid out as two vec4 rows for vertex upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TrailSegment {
    /// Previous position, w = 1
    pub tail: [f32; 4],
    /// Current position, w = normalized age in [0, 1]
    pub head: [f32; 4],
}

impl TrailSegment {
    pub fn from_particle(p: &ParticleRecord, t: f32) -> Self {
        let tail = p.previous_position;
        let head = p.position;
        Self {
            tail: [tail.x, tail.y, tail.z, 1.0],
            head: [head.x, head.y, head.z, p.age_ratio(t)],
        }
    }
}

/// Draw data for one emitter, consumed by the renderer
pub struct TrailDrawData<'a> {
    pub emitter_index: usize,
    pub segments: &'a [TrailSegment],
}

/// Reusable buffer of packed trail segments, grouped by emitter
#[derive(Default)]
pub struct TrailBuffer {
    segments: Vec<TrailSegment>,
    ranges: Vec<(usize, Range<usize>)>,
}

impl TrailBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repack from scratch. Emitters without active particles get no range.
    pub fn pack(&mut self, emitters: &[Emitter], t: f32) {
        self.segments.clear();
        self.ranges.clear();

        for (index, emitter) in emitters.iter().enumerate() {
            if emitter.active_count() == 0 {
                continue;
            }
            let start = self.segments.len();
            emitter.pool().for_each_active(|_, p| {
                self.segments.push(TrailSegment::from_particle(p, t));
            });
            self.ranges.push((index, start..self.segments.len()));
        }
    }

    /// All packed segments, for a single upload
    pub fn segments(&self) -> &[TrailSegment] {
        &self.segments
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.segments)
    }

    /// Per-emitter slices of the packed segments
    pub fn draw_data(&self) -> Vec<TrailDrawData<'_>> {
        self.ranges
            .iter()
            .map(|(emitter_index, range)| TrailDrawData {
                emitter_index: *emitter_index,
                segments: &self.segments[range.clone()],
            })
            .collect()
    }
}
