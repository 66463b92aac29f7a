//! Static ball tree over segment centers.
//!
//! The filter phase of every spatial query: a radius search over segment
//! centers under geodesic (great-circle) distance, widened by the
//! instrument's maximum segment radius so the result is always a
//! superset of the exact answer.
//!
//! Centers are stored as unit vectors, never as latitude/longitude
//! averages; queries behave identically at longitude 0 and 360 and
//! across the poles.

use crate::cancel::CancelToken;
use crate::geom::{angular_distance, vector_mean, Vec3};
use crate::segment::{PointQuery, TriSegment};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const TREE_MAGIC: &[u8; 8] = b"PDSCTREE";
const TREE_VERSION: u32 = 1;

/// Default number of segment centers per leaf.
pub const DEFAULT_LEAF_CAPACITY: u32 = 32;

#[derive(Debug, Clone)]
enum NodeKind {
    /// Range into the reordered `points`/`segment_ids` arrays.
    Leaf { start: usize, end: usize },
    /// Indices of the two children in `nodes`.
    Branch { left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct Node {
    center: Vec3,
    /// Max angular distance (radians) from `center` to any descendant.
    radius: f64,
    kind: NodeKind,
}

/// Ball tree over the segment centers of one instrument.
#[derive(Debug)]
pub struct SegmentTree {
    nodes: Vec<Node>,
    points: Vec<Vec3>,
    segment_ids: Vec<u64>,
    /// Largest segment radius in the store, radians.
    max_segment_radius_rad: f64,
    body_radius_m: f64,
    leaf_capacity: u32,
}

impl SegmentTree {
    /// Bulk-load a tree from `(segment_id, segment)` pairs.
    pub fn build<'s, I>(segments: I, body_radius_m: f64) -> SegmentTree
    where
        I: IntoIterator<Item = (u64, &'s TriSegment)>,
    {
        let mut points = Vec::new();
        let mut segment_ids = Vec::new();
        let mut max_radius_m: f64 = 0.0;
        for (id, seg) in segments {
            points.push(seg.center());
            segment_ids.push(id);
            max_radius_m = max_radius_m.max(seg.radius_m());
        }
        Self::build_from_centers(
            points,
            segment_ids,
            max_radius_m / body_radius_m,
            body_radius_m,
            DEFAULT_LEAF_CAPACITY,
        )
    }

    pub fn build_from_centers(
        points: Vec<Vec3>,
        segment_ids: Vec<u64>,
        max_segment_radius_rad: f64,
        body_radius_m: f64,
        leaf_capacity: u32,
    ) -> SegmentTree {
        assert_eq!(points.len(), segment_ids.len());
        let mut tree = SegmentTree {
            nodes: Vec::new(),
            points,
            segment_ids,
            max_segment_radius_rad,
            body_radius_m,
            leaf_capacity: leaf_capacity.max(1),
        };
        if tree.points.is_empty() {
            return tree;
        }

        let n = tree.points.len();
        let mut order: Vec<usize> = (0..n).collect();
        tree.build_recursive(&mut order, 0, n);

        let old_points = tree.points.clone();
        let old_ids = tree.segment_ids.clone();
        for (new_pos, &old_pos) in order.iter().enumerate() {
            tree.points[new_pos] = old_points[old_pos];
            tree.segment_ids[new_pos] = old_ids[old_pos];
        }
        tree
    }

    fn build_recursive(&mut self, order: &mut [usize], start: usize, end: usize) -> usize {
        let slice: Vec<Vec3> = order[start..end].iter().map(|&i| self.points[i]).collect();
        let center = vector_mean(&slice);
        let radius = slice
            .iter()
            .map(|p| angular_distance(center, *p))
            .fold(0.0, f64::max);

        if end - start <= self.leaf_capacity as usize {
            let node_idx = self.nodes.len();
            self.nodes.push(Node {
                center,
                radius,
                kind: NodeKind::Leaf { start, end },
            });
            return node_idx;
        }

        // Two-sweep farthest-point anchors, then partition by nearest.
        fn farthest_from(points: &[Vec3], order: &[usize], from: Vec3) -> Vec3 {
            let mut best = from;
            let mut best_d = -1.0;
            for &i in order {
                let d = angular_distance(from, points[i]);
                if d > best_d {
                    best_d = d;
                    best = points[i];
                }
            }
            best
        }
        let anchor_a = farthest_from(&self.points, &order[start..end], self.points[order[start]]);
        let anchor_b = farthest_from(&self.points, &order[start..end], anchor_a);

        let mut split = start;
        for i in start..end {
            let p = self.points[order[i]];
            if angular_distance(anchor_a, p) <= angular_distance(anchor_b, p) {
                order.swap(i, split);
                split += 1;
            }
        }
        // Duplicate centers can put everything on one side; fall back to
        // an even split so recursion always terminates.
        if split == start || split == end {
            split = start + (end - start) / 2;
        }

        let node_idx = self.nodes.len();
        self.nodes.push(Node {
            center,
            radius,
            kind: NodeKind::Leaf { start: 0, end: 0 },
        });

        let left = self.build_recursive(order, start, split);
        let right = self.build_recursive(order, split, end);
        self.nodes[node_idx].kind = NodeKind::Branch { left, right };

        node_idx
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn body_radius_m(&self) -> f64 {
        self.body_radius_m
    }

    /// Largest segment radius in the indexed store, meters.
    pub fn max_segment_radius_m(&self) -> f64 {
        self.max_segment_radius_rad * self.body_radius_m
    }

    /// All segment ids whose center lies within `radius_rad` of `target`.
    ///
    /// The cancellation token is checked at every node visit.
    pub fn radius_search(
        &self,
        target: Vec3,
        radius_rad: f64,
        cancel: &CancelToken,
    ) -> Result<Vec<u64>> {
        let mut hits = Vec::new();
        if self.nodes.is_empty() {
            return Ok(hits);
        }
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            cancel.check()?;
            let node = &self.nodes[idx];
            if angular_distance(target, node.center) > radius_rad + node.radius {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, end } => {
                    for i in start..end {
                        if angular_distance(target, self.points[i]) <= radius_rad {
                            hits.push(self.segment_ids[i]);
                        }
                    }
                }
                NodeKind::Branch { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        Ok(hits)
    }

    /// Filter-phase candidates for a point query: every segment whose
    /// footprint could contain a point within the query radius.
    pub fn query_point(&self, query: &PointQuery, cancel: &CancelToken) -> Result<Vec<u64>> {
        let rho = (query.radius_m() / self.body_radius_m) + self.max_segment_radius_rad;
        self.radius_search(query.xyz(), rho, cancel)
    }

    /// Filter-phase candidates for an overlap query: every segment that
    /// could intersect `segment`.
    pub fn query_segment(&self, segment: &TriSegment, cancel: &CancelToken) -> Result<Vec<u64>> {
        let rho = (segment.radius_m() / self.body_radius_m) + self.max_segment_radius_rad;
        self.radius_search(segment.center(), rho, cancel)
    }

    /// Serialize to `path`: header then node records in pre-order,
    /// written to a temp file and atomically renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tree.tmp");
        let file = File::create(&tmp)?;
        let mut w = BufWriter::new(file);

        w.write_all(TREE_MAGIC)?;
        write_u32(&mut w, TREE_VERSION)?;
        write_u64(&mut w, self.points.len() as u64)?;
        write_f64(&mut w, self.max_segment_radius_rad)?;
        write_f64(&mut w, self.body_radius_m)?;
        write_u32(&mut w, self.leaf_capacity)?;

        if !self.nodes.is_empty() {
            self.write_node(&mut w, 0)?;
        }

        w.flush()?;
        let file = w.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write_node<W: Write>(&self, w: &mut W, idx: usize) -> Result<()> {
        let node = &self.nodes[idx];
        for c in node.center {
            write_f64(w, c)?;
        }
        write_f64(w, node.radius)?;
        match node.kind {
            NodeKind::Leaf { start, end } => {
                write_u8(w, 1)?;
                write_u32(w, (end - start) as u32)?;
                for i in start..end {
                    for c in self.points[i] {
                        write_f64(w, c)?;
                    }
                    write_u64(w, self.segment_ids[i])?;
                }
            }
            NodeKind::Branch { left, right } => {
                write_u8(w, 0)?;
                write_u32(w, 2)?;
                self.write_node(w, left)?;
                self.write_node(w, right)?;
            }
        }
        Ok(())
    }

    /// Load a tree saved by [`SegmentTree::save`]. Bad magic, version
    /// mismatch, or truncation is an [`Error::IndexCorrupt`].
    pub fn load(path: &Path) -> Result<SegmentTree> {
        let file = File::open(path)?;
        let mut r = BufReader::new(file);

        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)
            .map_err(|_| Error::corrupt(path, "truncated header"))?;
        if &magic != TREE_MAGIC {
            return Err(Error::corrupt(path, "bad magic"));
        }
        let version = read_u32(&mut r).map_err(|_| Error::corrupt(path, "truncated header"))?;
        if version != TREE_VERSION {
            return Err(Error::corrupt(
                path,
                format!("schema version {version}, expected {TREE_VERSION}"),
            ));
        }

        let n = read_u64(&mut r).map_err(|_| Error::corrupt(path, "truncated header"))? as usize;
        let max_segment_radius_rad =
            read_f64(&mut r).map_err(|_| Error::corrupt(path, "truncated header"))?;
        let body_radius_m =
            read_f64(&mut r).map_err(|_| Error::corrupt(path, "truncated header"))?;
        let leaf_capacity =
            read_u32(&mut r).map_err(|_| Error::corrupt(path, "truncated header"))?;

        let mut tree = SegmentTree {
            nodes: Vec::new(),
            points: Vec::with_capacity(n),
            segment_ids: Vec::with_capacity(n),
            max_segment_radius_rad,
            body_radius_m,
            leaf_capacity,
        };
        if n > 0 {
            tree.read_node(&mut r, path)?;
        }
        if tree.points.len() != n {
            return Err(Error::corrupt(
                path,
                format!("expected {n} centers, found {}", tree.points.len()),
            ));
        }
        Ok(tree)
    }

    fn read_node<R: Read>(&mut self, r: &mut R, path: &Path) -> Result<usize> {
        let truncated = |_| Error::corrupt(path, "truncated node record");
        let mut center = [0.0; 3];
        for c in &mut center {
            *c = read_f64(r).map_err(truncated)?;
        }
        let radius = read_f64(r).map_err(truncated)?;
        let is_leaf = read_u8(r).map_err(truncated)?;
        let count = read_u32(r).map_err(truncated)? as usize;

        let node_idx = self.nodes.len();
        match is_leaf {
            1 => {
                let start = self.points.len();
                for _ in 0..count {
                    let mut p = [0.0; 3];
                    for c in &mut p {
                        *c = read_f64(r).map_err(truncated)?;
                    }
                    self.points.push(p);
                    self.segment_ids.push(read_u64(r).map_err(truncated)?);
                }
                self.nodes.push(Node {
                    center,
                    radius,
                    kind: NodeKind::Leaf {
                        start,
                        end: start + count,
                    },
                });
            }
            0 => {
                if count != 2 {
                    return Err(Error::corrupt(path, format!("branch with {count} children")));
                }
                self.nodes.push(Node {
                    center,
                    radius,
                    kind: NodeKind::Leaf { start: 0, end: 0 },
                });
                let left = self.read_node(r, path)?;
                let right = self.read_node(r, path)?;
                self.nodes[node_idx].kind = NodeKind::Branch { left, right };
            }
            other => {
                return Err(Error::corrupt(path, format!("bad node tag {other}")));
            }
        }
        Ok(node_idx)
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        for node in &self.nodes {
            let mut stack = vec![node];
            while let Some(n) = stack.pop() {
                match n.kind {
                    NodeKind::Leaf { start, end } => {
                        for i in start..end {
                            assert!(
                                angular_distance(node.center, self.points[i])
                                    <= node.radius + 1e-12,
                                "descendant outside node radius"
                            );
                        }
                    }
                    NodeKind::Branch { left, right } => {
                        stack.push(&self.nodes[left]);
                        stack.push(&self.nodes[right]);
                    }
                }
            }
        }
    }
}

fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u64<W: Write>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u8<R: Read>(r: &mut R) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}
